// ============================================
// Recommender Service
// ============================================
//
// Query entry points over the current model snapshot.
//
// Per query:
//   validate → capture snapshot → select candidates → score → top-N
//
// Every entry point shares one error contract:
//   NotReady        - no model published yet
//   NoSuchUser      - user absent from the captured snapshot
//   InvalidArgument - howMany == 0, bad item arguments, corrupt vectors
//
// The snapshot is captured once and used for the whole query, so a
// concurrent publish never changes an in-flight result.

use crate::config::Config;
use crate::error::{RecommendError, Result};
use crate::models::{ModelInfo, Query, RecommendOptions, RecommendationItem};
use crate::services::candidates::CandidateSelector;
use crate::services::model::FactorModel;
use crate::services::model_manager::ModelManager;
use crate::services::scoring::{check_how_many, top_n, ScoreKind, Scorer};
use crate::utils::{checked_dot, cosine_similarity, to_unit};
use ndarray::Array1;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

pub struct RecommenderService {
    manager: Arc<ModelManager>,
    selector: CandidateSelector,
    scorer: Scorer,
}

impl RecommenderService {
    pub fn new(manager: Arc<ModelManager>, selector: CandidateSelector, scorer: Scorer) -> Self {
        Self {
            manager,
            selector,
            scorer,
        }
    }

    pub fn from_config(manager: Arc<ModelManager>, config: &Config) -> Self {
        Self::new(
            manager,
            CandidateSelector::new(config.max_candidates),
            Scorer::new(),
        )
    }

    pub fn manager(&self) -> &Arc<ModelManager> {
        &self.manager
    }

    pub fn is_ready(&self) -> bool {
        self.manager.is_ready()
    }

    pub fn model_info(&self) -> Result<ModelInfo> {
        self.manager.info()
    }

    /// Dispatch any query kind
    pub fn query(&self, query: &Query) -> Result<Vec<RecommendationItem>> {
        let start = Instant::now();

        let result = match query {
            Query::Recommend {
                user_id,
                how_many,
                options,
            } => self.recommend_with_options(user_id, *how_many, *options),
            Query::RecommendToMany {
                user_ids,
                how_many,
                options,
            } => self.recommend_to_many(user_ids, *how_many, *options),
            Query::RecommendToAnonymous { item_ids, how_many } => {
                self.recommend_to_anonymous(item_ids, *how_many)
            }
            Query::MostSurprising { user_id, how_many } => {
                self.most_surprising(user_id, *how_many)
            }
            Query::Similarity { item_ids, how_many } => {
                self.most_similar_items(item_ids, *how_many)
            }
            Query::Because {
                user_id,
                item_id,
                how_many,
            } => self.because(user_id, item_id, *how_many),
            Query::MostPopular { how_many } => self.most_popular_items(*how_many),
        };

        debug!(
            kind = query.kind(),
            ok = result.is_ok(),
            elapsed_us = start.elapsed().as_micros() as u64,
            "Query completed"
        );

        result
    }

    /// Top items by predicted affinity, excluding the user's known items
    pub fn recommend(&self, user_id: &str, how_many: usize) -> Result<Vec<RecommendationItem>> {
        self.recommend_with_options(user_id, how_many, RecommendOptions::default())
    }

    pub fn recommend_with_options(
        &self,
        user_id: &str,
        how_many: usize,
        options: RecommendOptions,
    ) -> Result<Vec<RecommendationItem>> {
        self.rank_for_user(user_id, how_many, options, ScoreKind::Affinity)
    }

    /// Items the user's model scores high relative to the population baseline
    pub fn most_surprising(
        &self,
        user_id: &str,
        how_many: usize,
    ) -> Result<Vec<RecommendationItem>> {
        self.rank_for_user(
            user_id,
            how_many,
            RecommendOptions::default(),
            ScoreKind::Surprise,
        )
    }

    fn rank_for_user(
        &self,
        user_id: &str,
        how_many: usize,
        options: RecommendOptions,
        kind: ScoreKind,
    ) -> Result<Vec<RecommendationItem>> {
        check_how_many(how_many)?;
        check_user_id(user_id)?;

        let model = self.manager.current_snapshot()?;
        let candidates = self.selector.select_candidates(&model, user_id, options)?;
        let ranked = self
            .scorer
            .score_user(&model, user_id, &candidates, kind, how_many)?;

        debug!(
            user_id = %user_id,
            kind = ?kind,
            version = %model.version(),
            candidates = candidates.len(),
            results = ranked.len(),
            "Ranked items for user"
        );

        Ok(ranked)
    }

    /// Recommendations for a group of users
    ///
    /// Unknown users are skipped; fails with `NoSuchUser` only when none of
    /// them is in the model.
    pub fn recommend_to_many<S: AsRef<str>>(
        &self,
        user_ids: &[S],
        how_many: usize,
        options: RecommendOptions,
    ) -> Result<Vec<RecommendationItem>> {
        check_how_many(how_many)?;
        if user_ids.is_empty() {
            return Err(RecommendError::invalid("no user IDs given"));
        }

        let model = self.manager.current_snapshot()?;

        let known_users: Vec<&str> = user_ids
            .iter()
            .map(AsRef::as_ref)
            .filter(|user_id| model.has_user(user_id))
            .collect();
        if known_users.is_empty() {
            return Err(RecommendError::NoSuchUser(join_ids(user_ids)));
        }

        let mut query: Array1<f32> = Array1::zeros(model.features());
        for user_id in &known_users {
            if let Some(vector) = model.user_vector(user_id) {
                query += &vector;
            }
        }

        let excluded: HashSet<&str> = if options.consider_known_items {
            HashSet::new()
        } else {
            known_users
                .iter()
                .filter_map(|user_id| model.known_items(user_id))
                .flatten()
                .map(String::as_str)
                .collect()
        };

        let candidates =
            self.selector
                .select_for_vector(&model, query.view(), |item_id| excluded.contains(item_id));
        self.scorer
            .score(&model, query.view(), &candidates, ScoreKind::Affinity, how_many)
    }

    /// Recommendations for a user not in the model, described by the items
    /// they interacted with
    pub fn recommend_to_anonymous<S: AsRef<str>>(
        &self,
        item_ids: &[S],
        how_many: usize,
    ) -> Result<Vec<RecommendationItem>> {
        check_how_many(how_many)?;
        if item_ids.is_empty() {
            return Err(RecommendError::invalid("no item IDs given"));
        }

        let model = self.manager.current_snapshot()?;

        let given: HashSet<&str> = item_ids.iter().map(AsRef::as_ref).collect();
        let mut query: Array1<f32> = Array1::zeros(model.features());
        let mut matched = 0;
        for item_id in &given {
            if let Some(vector) = model.item_vector(item_id) {
                query += &vector;
                matched += 1;
            }
        }
        if matched == 0 {
            return Err(RecommendError::invalid(format!(
                "none of the items are known: {}",
                join_ids(item_ids)
            )));
        }

        let candidates =
            self.selector
                .select_for_vector(&model, query.view(), |item_id| given.contains(item_id));
        self.scorer
            .score(&model, query.view(), &candidates, ScoreKind::Affinity, how_many)
    }

    /// Items most similar (mean cosine) to the given items
    pub fn most_similar_items<S: AsRef<str>>(
        &self,
        item_ids: &[S],
        how_many: usize,
    ) -> Result<Vec<RecommendationItem>> {
        check_how_many(how_many)?;
        if item_ids.is_empty() {
            return Err(RecommendError::invalid("no item IDs given"));
        }

        let model = self.manager.current_snapshot()?;

        let given: HashSet<&str> = item_ids.iter().map(AsRef::as_ref).collect();
        let mut query: Array1<f32> = Array1::zeros(model.features());
        for item_id in &given {
            let vector = model
                .item_vector(item_id)
                .ok_or_else(|| unknown_item(item_id))?;
            if let Some(unit) = to_unit(vector) {
                query += &unit;
            }
        }
        query /= given.len() as f32;

        let candidates =
            self.selector
                .select_for_vector(&model, query.view(), |item_id| given.contains(item_id));
        self.scorer
            .score(&model, query.view(), &candidates, ScoreKind::Cosine, how_many)
    }

    /// Cosine similarity of each item to `to_item_id`, in input order
    pub fn similarity_to_item<S: AsRef<str>>(
        &self,
        to_item_id: &str,
        item_ids: &[S],
    ) -> Result<Vec<f32>> {
        let model = self.manager.current_snapshot()?;

        let to_vector = model
            .item_vector(to_item_id)
            .ok_or_else(|| unknown_item(to_item_id))?;

        item_ids
            .iter()
            .map(|item_id| {
                let item_id = item_id.as_ref();
                let vector = model
                    .item_vector(item_id)
                    .ok_or_else(|| unknown_item(item_id))?;
                cosine_similarity(to_vector, vector).ok_or_else(|| dimension_mismatch(&model))
            })
            .collect()
    }

    /// Predicted affinity of the user for one item
    pub fn estimate_preference(&self, user_id: &str, item_id: &str) -> Result<f32> {
        self.estimate_preferences(user_id, &[item_id])
            .map(|estimates| estimates.first().copied().unwrap_or(0.0))
    }

    /// Predicted affinity for each item, 0.0 for items not in the model
    pub fn estimate_preferences<S: AsRef<str>>(
        &self,
        user_id: &str,
        item_ids: &[S],
    ) -> Result<Vec<f32>> {
        check_user_id(user_id)?;
        let model = self.manager.current_snapshot()?;

        let user_vector = model
            .user_vector(user_id)
            .ok_or_else(|| RecommendError::NoSuchUser(user_id.to_string()))?;

        item_ids
            .iter()
            .map(|item_id| match model.item_vector(item_id.as_ref()) {
                Some(vector) => checked_dot(user_vector, vector)
                    .ok_or_else(|| dimension_mismatch(&model)),
                None => Ok(0.0),
            })
            .collect()
    }

    /// The user's known items most similar to `item_id`
    pub fn because(
        &self,
        user_id: &str,
        item_id: &str,
        how_many: usize,
    ) -> Result<Vec<RecommendationItem>> {
        check_how_many(how_many)?;
        check_user_id(user_id)?;

        let model = self.manager.current_snapshot()?;
        if !model.has_user(user_id) {
            return Err(RecommendError::NoSuchUser(user_id.to_string()));
        }

        let item_vector = model
            .item_vector(item_id)
            .ok_or_else(|| unknown_item(item_id))?;
        let query = to_unit(item_vector).unwrap_or_else(|| Array1::zeros(model.features()));

        let mut known: Vec<usize> = model
            .known_items(user_id)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|known_id| model.item_position(known_id))
                    .collect()
            })
            .unwrap_or_default();
        known.sort_unstable();

        self.scorer
            .score(&model, query.view(), &known, ScoreKind::Cosine, how_many)
    }

    /// Items known to the most users
    pub fn most_popular_items(&self, how_many: usize) -> Result<Vec<RecommendationItem>> {
        check_how_many(how_many)?;
        let model = self.manager.current_snapshot()?;

        let scored: Vec<(usize, f32)> = (0..model.num_items())
            .map(|position| (position, model.popularity_at(position)))
            .filter(|&(_, count)| count > 0)
            .map(|(position, count)| (position, count as f32))
            .collect();

        Ok(top_n(&model, scored, how_many))
    }

    pub fn all_user_ids(&self) -> Result<Vec<String>> {
        Ok(self.manager.current_snapshot()?.user_ids().to_vec())
    }

    pub fn all_item_ids(&self) -> Result<Vec<String>> {
        Ok(self.manager.current_snapshot()?.item_ids().to_vec())
    }
}

fn check_user_id(user_id: &str) -> Result<()> {
    if user_id.trim().is_empty() {
        return Err(RecommendError::invalid("user ID must not be empty"));
    }
    Ok(())
}

fn unknown_item(item_id: &str) -> RecommendError {
    RecommendError::invalid(format!("unknown item: {}", item_id))
}

fn dimension_mismatch(model: &FactorModel) -> RecommendError {
    RecommendError::invalid(format!(
        "dimension mismatch in model {}",
        model.version()
    ))
}

fn join_ids<S: AsRef<str>>(ids: &[S]) -> String {
    ids.iter().map(AsRef::as_ref).collect::<Vec<_>>().join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn service_with(model: Option<FactorModel>) -> RecommenderService {
        let manager = Arc::new(ModelManager::new());
        if let Some(model) = model {
            manager.publish(model);
        }
        RecommenderService::new(manager, CandidateSelector::new(1000), Scorer::new())
    }

    fn library() -> FactorModel {
        FactorModel::builder(2)
            .version("library")
            .user("alice", vec![1.0, 0.2])
            .user("bob", vec![0.1, 1.0])
            .user("carol", vec![0.2, 0.9])
            .item("blockbuster", vec![3.0, 3.0])
            .item("drama", vec![0.0, 1.0])
            .item("noir", vec![1.0, 0.0])
            .item("thriller", vec![0.8, 0.3])
            .item("western", vec![0.9, -0.1])
            .known_items("alice", ["noir", "blockbuster"])
            .known_items("bob", ["drama", "blockbuster"])
            .known_items("carol", ["blockbuster"])
            .build()
            .unwrap()
    }

    fn ids(items: &[RecommendationItem]) -> Vec<&str> {
        items.iter().map(|r| r.item_id.as_str()).collect()
    }

    #[test]
    fn test_not_ready_for_every_entry_point() {
        let service = service_with(None);

        let errors = vec![
            service.recommend("alice", 5).unwrap_err(),
            service.most_surprising("alice", 5).unwrap_err(),
            service.recommend_to_many(&["alice"], 5, RecommendOptions::default()).unwrap_err(),
            service.recommend_to_anonymous(&["noir"], 5).unwrap_err(),
            service.most_similar_items(&["noir"], 5).unwrap_err(),
            service.similarity_to_item("noir", &["drama"]).unwrap_err(),
            service.estimate_preferences("alice", &["noir"]).unwrap_err(),
            service.because("alice", "thriller", 5).unwrap_err(),
            service.most_popular_items(5).unwrap_err(),
            service.all_user_ids().unwrap_err(),
            service.all_item_ids().unwrap_err(),
            service.model_info().unwrap_err(),
        ];

        for err in errors {
            assert_eq!(err.kind(), ErrorKind::NotReady, "{}", err);
        }
        assert!(!service.is_ready());
    }

    #[test]
    fn test_recommend_excludes_known_items() {
        let service = service_with(Some(library()));

        let ranked = service.recommend("alice", 10).unwrap();
        assert_eq!(ids(&ranked), ["western", "thriller", "drama"]);

        let with_known = service
            .recommend_with_options(
                "alice",
                1,
                RecommendOptions {
                    consider_known_items: true,
                },
            )
            .unwrap();
        assert_eq!(ids(&with_known), ["blockbuster"]);
    }

    #[test]
    fn test_most_surprising_differs_from_recommend() {
        // "hit" scores high for every user; "cult" only for u1
        let service = service_with(Some(
            FactorModel::builder(2)
                .user("u1", vec![1.0, 0.0])
                .user("u2", vec![0.0, 1.0])
                .user("u3", vec![0.0, 1.0])
                .item("cult", vec![1.0, 0.0])
                .item("hit", vec![10.0, 10.0])
                .item("seen", vec![5.0, 0.0])
                .known_items("u1", ["seen"])
                .build()
                .unwrap(),
        ));

        let recommend = service.recommend("u1", 3).unwrap();
        let surprising = service.most_surprising("u1", 3).unwrap();

        assert_eq!(ids(&recommend), ["hit", "cult"]);
        assert_eq!(ids(&surprising), ["cult", "hit"]);
        assert_ne!(recommend[0].item_id, surprising[0].item_id);
        assert!(surprising[0].strength > surprising[1].strength);
    }

    #[test]
    fn test_unknown_user() {
        let service = service_with(Some(library()));

        assert_eq!(
            service.recommend("mallory", 5).unwrap_err().kind(),
            ErrorKind::NoSuchUser
        );
        assert_eq!(
            service.most_surprising("mallory", 5).unwrap_err().kind(),
            ErrorKind::NoSuchUser
        );
        assert_eq!(
            service.because("mallory", "noir", 5).unwrap_err().kind(),
            ErrorKind::NoSuchUser
        );
        assert_eq!(
            service
                .estimate_preferences("mallory", &["noir"])
                .unwrap_err()
                .kind(),
            ErrorKind::NoSuchUser
        );
    }

    #[test]
    fn test_invalid_arguments() {
        let service = service_with(Some(library()));

        let errors = vec![
            service.recommend("alice", 0).unwrap_err(),
            service.recommend("  ", 3).unwrap_err(),
            service.most_surprising("alice", 0).unwrap_err(),
            service.most_similar_items::<&str>(&[], 3).unwrap_err(),
            service.most_similar_items(&["unknown"], 3).unwrap_err(),
            service.recommend_to_anonymous(&["unknown"], 3).unwrap_err(),
            service.similarity_to_item("unknown", &["noir"]).unwrap_err(),
            service.because("alice", "unknown", 3).unwrap_err(),
            service.most_popular_items(0).unwrap_err(),
        ];

        for err in errors {
            assert_eq!(err.kind(), ErrorKind::InvalidArgument, "{}", err);
        }
    }

    #[test]
    fn test_recommend_to_many_skips_unknown_users() {
        let service = service_with(Some(library()));

        let ranked = service
            .recommend_to_many(&["bob", "carol", "mallory"], 10, RecommendOptions::default())
            .unwrap();

        // Union of bob's and carol's known items is excluded
        assert!(!ids(&ranked).contains(&"drama"));
        assert!(!ids(&ranked).contains(&"blockbuster"));
        assert_eq!(ranked.len(), 3);

        let err = service
            .recommend_to_many(&["mallory"], 10, RecommendOptions::default())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoSuchUser);
    }

    #[test]
    fn test_recommend_to_anonymous() {
        let service = service_with(Some(library()));

        let ranked = service
            .recommend_to_anonymous(&["drama", "not-in-model"], 2)
            .unwrap();

        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].item_id, "blockbuster");
        assert!(!ids(&ranked).contains(&"drama"));
    }

    #[test]
    fn test_most_similar_items() {
        let service = service_with(Some(library()));

        let ranked = service.most_similar_items(&["noir"], 2).unwrap();
        assert_eq!(ids(&ranked), ["western", "thriller"]);
        assert!(ranked[0].strength <= 1.0);
    }

    #[test]
    fn test_similarity_to_item() {
        let service = service_with(Some(library()));

        let similarities = service
            .similarity_to_item("noir", &["noir", "drama"])
            .unwrap();
        assert!((similarities[0] - 1.0).abs() < 1e-6);
        assert!(similarities[1].abs() < 1e-6);
    }

    #[test]
    fn test_estimate_preferences() {
        let service = service_with(Some(library()));

        let estimates = service
            .estimate_preferences("alice", &["noir", "not-in-model", "drama"])
            .unwrap();
        assert_eq!(estimates.len(), 3);
        assert!((estimates[0] - 1.0).abs() < 1e-6);
        assert_eq!(estimates[1], 0.0);
        assert!((estimates[2] - 0.2).abs() < 1e-6);

        let single = service.estimate_preference("alice", "noir").unwrap();
        assert!((single - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_because_ranks_known_items() {
        let service = service_with(Some(library()));

        let reasons = service.because("alice", "western", 5).unwrap();
        assert_eq!(ids(&reasons), ["noir", "blockbuster"]);
    }

    #[test]
    fn test_most_popular_items() {
        let service = service_with(Some(library()));

        let popular = service.most_popular_items(2).unwrap();
        assert_eq!(ids(&popular), ["blockbuster", "drama"]);
        assert_eq!(popular[0].strength, 3.0);
        assert_eq!(popular[1].strength, 1.0);
    }

    #[test]
    fn test_all_ids_and_info() {
        let service = service_with(Some(library()));

        assert_eq!(service.all_user_ids().unwrap(), ["alice", "bob", "carol"]);
        assert_eq!(service.all_item_ids().unwrap().len(), 5);

        let info = service.model_info().unwrap();
        assert_eq!(info.version, "library");
        assert_eq!(info.generation, 1);
    }

    #[test]
    fn test_query_dispatch() {
        let service = service_with(Some(library()));

        let direct = service.most_surprising("bob", 3).unwrap();
        let dispatched = service
            .query(&Query::MostSurprising {
                user_id: "bob".to_string(),
                how_many: 3,
            })
            .unwrap();
        assert_eq!(direct, dispatched);

        let err = service
            .query(&Query::Recommend {
                user_id: "mallory".to_string(),
                how_many: 3,
                options: RecommendOptions::default(),
            })
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoSuchUser);
    }
}
