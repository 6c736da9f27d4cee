// ============================================
// Scorer
// ============================================
//
// Ranks candidate items against a query vector.
//
// Score kinds:
//   Affinity: q · item (predicted preference)
//   Surprise: q · item - baseline(item), baseline = the item's mean
//             predicted affinity over every user in the snapshot
//   Cosine:   q · item / ||item||; with q the mean of unit reference
//             vectors this is the mean cosine similarity to the references
//
// Results are ordered by strength descending, ties by ItemID ascending.

use crate::error::{RecommendError, Result};
use crate::models::RecommendationItem;
use crate::services::model::FactorModel;
use crate::utils::{checked_dot, norm};
use ndarray::ArrayView1;
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScoreKind {
    Affinity,
    Surprise,
    Cosine,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Scorer;

impl Scorer {
    pub fn new() -> Self {
        Self
    }

    /// Score candidates for a user of the snapshot
    pub fn score_user(
        &self,
        model: &FactorModel,
        user_id: &str,
        candidates: &[usize],
        kind: ScoreKind,
        how_many: usize,
    ) -> Result<Vec<RecommendationItem>> {
        let user_vector = model
            .user_vector(user_id)
            .ok_or_else(|| RecommendError::NoSuchUser(user_id.to_string()))?;
        self.score(model, user_vector, candidates, kind, how_many)
    }

    /// Score candidates (item positions) against `query` and keep the top `how_many`
    pub fn score(
        &self,
        model: &FactorModel,
        query: ArrayView1<f32>,
        candidates: &[usize],
        kind: ScoreKind,
        how_many: usize,
    ) -> Result<Vec<RecommendationItem>> {
        check_how_many(how_many)?;

        let mut scored = Vec::with_capacity(candidates.len());
        for &position in candidates {
            let (item_id, item) = model
                .item_id(position)
                .zip(model.item_vector_at(position))
                .ok_or_else(|| {
                    RecommendError::invalid(format!(
                        "candidate position {} outside model {} with {} items",
                        position,
                        model.version(),
                        model.num_items()
                    ))
                })?;
            let affinity = checked_dot(query, item).ok_or_else(|| {
                RecommendError::invalid(format!(
                    "dimension mismatch: query has {} features, item {} has {}",
                    query.len(),
                    item_id,
                    item.len()
                ))
            })?;

            let strength = match kind {
                ScoreKind::Affinity => affinity,
                ScoreKind::Surprise => affinity - model.baseline_at(position),
                ScoreKind::Cosine => {
                    let item_norm = norm(item);
                    if item_norm == 0.0 {
                        0.0
                    } else {
                        affinity / item_norm
                    }
                }
            };

            if !strength.is_finite() {
                return Err(RecommendError::invalid(format!(
                    "non-finite {:?} score for item {}",
                    kind, item_id
                )));
            }

            scored.push((position, strength));
        }

        Ok(top_n(model, scored, how_many))
    }
}

pub(crate) fn check_how_many(how_many: usize) -> Result<()> {
    if how_many == 0 {
        return Err(RecommendError::invalid("howMany must be positive"));
    }
    Ok(())
}

/// Strength descending, then position (= ItemID) ascending
fn rank_order(a: &(usize, f32), b: &(usize, f32)) -> Ordering {
    b.1.total_cmp(&a.1).then(a.0.cmp(&b.0))
}

/// Keep the best `how_many` (position, strength) pairs in rank order
///
/// Positions must belong to `model`; callers validate `how_many`.
pub(crate) fn top_n(
    model: &FactorModel,
    mut scored: Vec<(usize, f32)>,
    how_many: usize,
) -> Vec<RecommendationItem> {
    if scored.len() > how_many {
        scored.select_nth_unstable_by(how_many.saturating_sub(1), rank_order);
        scored.truncate(how_many);
    }
    scored.sort_by(rank_order);

    scored
        .into_iter()
        .filter_map(|(position, strength)| {
            model
                .item_id(position)
                .map(|item_id| RecommendationItem::new(item_id, strength))
        })
        .collect()
}
