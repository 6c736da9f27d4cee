use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One ranked result: item and a query-kind-specific strength
///
/// Strength is only meaningful relative to other items in the same result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationItem {
    pub item_id: String,
    pub strength: f32,
}

impl RecommendationItem {
    pub fn new(item_id: impl Into<String>, strength: f32) -> Self {
        Self {
            item_id: item_id.into(),
            strength,
        }
    }
}

/// Per-request knobs for `recommend`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecommendOptions {
    /// Keep the user's already-known items in the candidate pool
    pub consider_known_items: bool,
}

/// Every query kind the recommender answers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Query {
    Recommend {
        user_id: String,
        how_many: usize,
        options: RecommendOptions,
    },
    RecommendToMany {
        user_ids: Vec<String>,
        how_many: usize,
        options: RecommendOptions,
    },
    RecommendToAnonymous {
        item_ids: Vec<String>,
        how_many: usize,
    },
    MostSurprising {
        user_id: String,
        how_many: usize,
    },
    /// Items most similar to a set of reference items
    Similarity {
        item_ids: Vec<String>,
        how_many: usize,
    },
    /// The user's known items that best explain a recommendation of `item_id`
    Because {
        user_id: String,
        item_id: String,
        how_many: usize,
    },
    MostPopular {
        how_many: usize,
    },
}

impl Query {
    pub fn kind(&self) -> &'static str {
        match self {
            Query::Recommend { .. } => "recommend",
            Query::RecommendToMany { .. } => "recommend_to_many",
            Query::RecommendToAnonymous { .. } => "recommend_to_anonymous",
            Query::MostSurprising { .. } => "most_surprising",
            Query::Similarity { .. } => "similarity",
            Query::Because { .. } => "because",
            Query::MostPopular { .. } => "most_popular",
        }
    }

    pub fn how_many(&self) -> usize {
        match self {
            Query::Recommend { how_many, .. }
            | Query::RecommendToMany { how_many, .. }
            | Query::RecommendToAnonymous { how_many, .. }
            | Query::MostSurprising { how_many, .. }
            | Query::Similarity { how_many, .. }
            | Query::Because { how_many, .. }
            | Query::MostPopular { how_many } => *how_many,
        }
    }
}

/// Description of the currently published snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub version: String,
    pub generation: u64,
    pub built_at: DateTime<Utc>,
    pub published_at: DateTime<Utc>,
    pub users: usize,
    pub items: usize,
    pub features: usize,
}
