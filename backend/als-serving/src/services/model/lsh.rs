// ============================================
// Locality-Sensitive Hash over item vectors
// ============================================
//
// Random-hyperplane LSH:
//   signature(v) bit i = 1 if h_i · v > 0
//
// Items are bucketed by signature when a snapshot is built. A query
// vector only considers buckets whose signature is within
// `max_bits_differing` bits (Hamming distance) of its own signature.
//
// Hyperplanes come from a seeded RNG so the same config and items always
// produce the same index.

use crate::error::ModelError;
use ndarray::{Array2, ArrayView1, ArrayView2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Upper bound on signature width (one `u64` per signature)
pub const MAX_HASHES: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LshConfig {
    /// Number of hyperplanes (signature bits)
    pub num_hashes: usize,
    /// Maximum Hamming distance between query and bucket signatures
    pub max_bits_differing: u32,
    /// RNG seed for the hyperplanes
    pub seed: u64,
}

impl Default for LshConfig {
    fn default() -> Self {
        Self {
            num_hashes: 16,
            max_bits_differing: 3,
            seed: 1234,
        }
    }
}

impl LshConfig {
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.num_hashes == 0 || self.num_hashes > MAX_HASHES {
            return Err(ModelError::InvalidLshConfig(format!(
                "num_hashes must be between 1 and {}, got {}",
                MAX_HASHES, self.num_hashes
            )));
        }
        if self.max_bits_differing as usize > self.num_hashes {
            return Err(ModelError::InvalidLshConfig(format!(
                "max_bits_differing ({}) exceeds num_hashes ({})",
                self.max_bits_differing, self.num_hashes
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct LshIndex {
    config: LshConfig,
    /// num_hashes × features
    hyperplanes: Array2<f32>,
    /// signature → item positions (ascending)
    buckets: BTreeMap<u64, Vec<usize>>,
}

impl LshIndex {
    /// Build an index over the rows of `item_factors`
    pub fn build(config: LshConfig, item_factors: ArrayView2<f32>) -> Result<Self, ModelError> {
        config.validate()?;

        let features = item_factors.ncols();
        let mut rng = StdRng::seed_from_u64(config.seed);
        let hyperplanes =
            Array2::from_shape_fn((config.num_hashes, features), |_| rng.gen_range(-1.0f32..1.0));

        let mut index = Self {
            config,
            hyperplanes,
            buckets: BTreeMap::new(),
        };

        for (position, row) in item_factors.outer_iter().enumerate() {
            let signature = index.signature(row);
            index.buckets.entry(signature).or_default().push(position);
        }

        Ok(index)
    }

    pub fn config(&self) -> &LshConfig {
        &self.config
    }

    pub fn num_buckets(&self) -> usize {
        self.buckets.len()
    }

    /// Hyperplane signature of a vector
    pub fn signature(&self, vector: ArrayView1<f32>) -> u64 {
        self.hyperplanes
            .outer_iter()
            .enumerate()
            .fold(0u64, |sig, (bit, plane)| {
                if plane.dot(&vector) > 0.0 {
                    sig | (1u64 << bit)
                } else {
                    sig
                }
            })
    }

    /// Item positions in buckets near the query, ascending
    pub fn candidates(&self, query: ArrayView1<f32>) -> Vec<usize> {
        let query_sig = self.signature(query);

        let mut positions: Vec<usize> = self
            .buckets
            .iter()
            .filter(|(sig, _)| (**sig ^ query_sig).count_ones() <= self.config.max_bits_differing)
            .flat_map(|(_, items)| items.iter().copied())
            .collect();

        positions.sort_unstable();
        positions
    }
}
