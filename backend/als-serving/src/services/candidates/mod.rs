use crate::error::{RecommendError, Result};
use crate::models::RecommendOptions;
use crate::services::model::FactorModel;
use ndarray::ArrayView1;
use tracing::debug;

/// Candidate Selector - 候選集生成
///
/// Produces the item positions eligible for ranking, in ItemID order:
/// 1. Start from the LSH neighbourhood of the query vector (whole catalog
///    when the snapshot has no index, or when the neighbourhood is empty)
/// 2. Drop excluded items (the user's known items by default)
/// 3. Bound the pool to `max_candidates` with an evenly strided sample
///
/// Selection is deterministic for a given snapshot and query.
#[derive(Debug, Clone)]
pub struct CandidateSelector {
    max_candidates: usize,
}

impl CandidateSelector {
    pub fn new(max_candidates: usize) -> Self {
        Self {
            max_candidates: max_candidates.max(1),
        }
    }

    pub fn max_candidates(&self) -> usize {
        self.max_candidates
    }

    /// Candidates for one user, excluding their known items unless
    /// `options.consider_known_items` is set
    pub fn select_candidates(
        &self,
        model: &FactorModel,
        user_id: &str,
        options: RecommendOptions,
    ) -> Result<Vec<usize>> {
        let user_vector = model
            .user_vector(user_id)
            .ok_or_else(|| RecommendError::NoSuchUser(user_id.to_string()))?;

        let known = if options.consider_known_items {
            None
        } else {
            model.known_items(user_id)
        };

        let candidates = self.select_for_vector(model, user_vector, |item_id| {
            known.is_some_and(|items| items.contains(item_id))
        });

        debug!(
            user_id = %user_id,
            known = known.map_or(0, |items| items.len()),
            candidates = candidates.len(),
            "Selected candidates"
        );

        Ok(candidates)
    }

    /// Candidates for an arbitrary query vector
    pub fn select_for_vector<F>(
        &self,
        model: &FactorModel,
        query: ArrayView1<f32>,
        exclude: F,
    ) -> Vec<usize>
    where
        F: Fn(&str) -> bool,
    {
        let eligible = |positions: &mut dyn Iterator<Item = usize>| -> Vec<usize> {
            positions
                .filter(|&position| model.item_id(position).is_some_and(|id| !exclude(id)))
                .collect()
        };

        let mut pool = match model.lsh_index() {
            Some(index) => eligible(&mut index.candidates(query).into_iter()),
            None => Vec::new(),
        };

        if pool.is_empty() {
            pool = eligible(&mut (0..model.num_items()));
        }

        self.bound(pool)
    }

    fn bound(&self, eligible: Vec<usize>) -> Vec<usize> {
        let len = eligible.len();
        if len <= self.max_candidates {
            return eligible;
        }

        // Strictly increasing indices since len > max_candidates
        (0..self.max_candidates)
            .map(|j| eligible[j * len / self.max_candidates])
            .collect()
    }
}
