use super::lsh::{LshConfig, LshIndex};
use crate::error::ModelError;
use chrono::{DateTime, Utc};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Immutable snapshot of a trained latent-factor model
///
/// Holds user and item factor matrices (rows ordered by ID ascending),
/// each user's known items, and aggregates derived once at build time:
/// - per-item baseline affinity (mean predicted affinity over all users)
/// - per-item popularity (number of users who know the item)
/// - optional LSH index over item vectors
///
/// A snapshot is never mutated after [`FactorModelBuilder::build`]; a refresh
/// builds a new one and publishes it through the model manager.
#[derive(Debug)]
pub struct FactorModel {
    version: String,
    built_at: DateTime<Utc>,
    features: usize,

    user_ids: Vec<String>,
    user_index: HashMap<String, usize>,
    user_factors: Array2<f32>,

    item_ids: Vec<String>,
    item_index: HashMap<String, usize>,
    item_factors: Array2<f32>,

    known_items: HashMap<String, HashSet<String>>,

    item_baseline: Array1<f32>,
    item_popularity: Vec<u32>,
    lsh: Option<LshIndex>,
}

impl FactorModel {
    pub fn builder(features: usize) -> FactorModelBuilder {
        FactorModelBuilder::new(features)
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    /// Number of latent features (k)
    pub fn features(&self) -> usize {
        self.features
    }

    pub fn num_users(&self) -> usize {
        self.user_ids.len()
    }

    pub fn num_items(&self) -> usize {
        self.item_ids.len()
    }

    /// User IDs, ascending
    pub fn user_ids(&self) -> &[String] {
        &self.user_ids
    }

    /// Item IDs, ascending; an item's position here indexes every per-item table
    pub fn item_ids(&self) -> &[String] {
        &self.item_ids
    }

    pub fn has_user(&self, user_id: &str) -> bool {
        self.user_index.contains_key(user_id)
    }

    pub fn user_vector(&self, user_id: &str) -> Option<ArrayView1<'_, f32>> {
        self.user_index
            .get(user_id)
            .map(|&row| self.user_factors.row(row))
    }

    pub fn item_position(&self, item_id: &str) -> Option<usize> {
        self.item_index.get(item_id).copied()
    }

    pub fn item_vector(&self, item_id: &str) -> Option<ArrayView1<'_, f32>> {
        self.item_position(item_id)
            .map(|position| self.item_factors.row(position))
    }

    /// `None` when `position` is outside this snapshot's catalog
    pub fn item_id(&self, position: usize) -> Option<&str> {
        self.item_ids.get(position).map(String::as_str)
    }

    pub fn item_vector_at(&self, position: usize) -> Option<ArrayView1<'_, f32>> {
        (position < self.item_ids.len()).then(|| self.item_factors.row(position))
    }

    pub fn item_factors(&self) -> ArrayView2<'_, f32> {
        self.item_factors.view()
    }

    /// Items the user already interacted with (may be absent for new users)
    pub fn known_items(&self, user_id: &str) -> Option<&HashSet<String>> {
        self.known_items.get(user_id)
    }

    pub fn is_known(&self, user_id: &str, item_id: &str) -> bool {
        self.known_items
            .get(user_id)
            .is_some_and(|items| items.contains(item_id))
    }

    /// Population-level expected affinity of the item at `position`
    pub fn baseline_at(&self, position: usize) -> f32 {
        self.item_baseline[position]
    }

    pub fn popularity_at(&self, position: usize) -> u32 {
        self.item_popularity[position]
    }

    pub fn lsh_index(&self) -> Option<&LshIndex> {
        self.lsh.as_ref()
    }
}

/// Assembles and validates a [`FactorModel`]
///
/// Repeated IDs overwrite earlier vectors.
#[derive(Debug, Clone)]
pub struct FactorModelBuilder {
    features: usize,
    version: String,
    users: BTreeMap<String, Vec<f32>>,
    items: BTreeMap<String, Vec<f32>>,
    known: HashMap<String, HashSet<String>>,
    lsh: Option<LshConfig>,
}

impl FactorModelBuilder {
    pub fn new(features: usize) -> Self {
        Self {
            features,
            version: "unversioned".to_string(),
            users: BTreeMap::new(),
            items: BTreeMap::new(),
            known: HashMap::new(),
            lsh: None,
        }
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn user(mut self, user_id: impl Into<String>, vector: impl Into<Vec<f32>>) -> Self {
        self.users.insert(user_id.into(), vector.into());
        self
    }

    pub fn item(mut self, item_id: impl Into<String>, vector: impl Into<Vec<f32>>) -> Self {
        self.items.insert(item_id.into(), vector.into());
        self
    }

    pub fn known_item(mut self, user_id: impl Into<String>, item_id: impl Into<String>) -> Self {
        self.known
            .entry(user_id.into())
            .or_default()
            .insert(item_id.into());
        self
    }

    pub fn known_items<I, S>(mut self, user_id: impl Into<String>, item_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.known
            .entry(user_id.into())
            .or_default()
            .extend(item_ids.into_iter().map(Into::into));
        self
    }

    /// Build an LSH index over item vectors as part of the snapshot
    pub fn lsh(mut self, config: LshConfig) -> Self {
        self.lsh = Some(config);
        self
    }

    pub fn build(self) -> Result<FactorModel, ModelError> {
        let k = self.features;
        if k == 0 {
            return Err(ModelError::ZeroDimension);
        }

        let (user_ids, user_factors) = to_matrix(self.users, k, "user")?;
        let (item_ids, item_factors) = to_matrix(self.items, k, "item")?;

        let user_index = index_of(&user_ids);
        let item_index = index_of(&item_ids);

        // Mean over users of (u · i) equals (mean u) · i
        let mean_user = user_factors
            .mean_axis(Axis(0))
            .unwrap_or_else(|| Array1::zeros(k));
        let item_baseline = item_factors.dot(&mean_user);

        let mut item_popularity = vec![0u32; item_ids.len()];
        for items in self.known.values() {
            for item_id in items {
                if let Some(&position) = item_index.get(item_id) {
                    item_popularity[position] += 1;
                }
            }
        }

        let lsh = match self.lsh {
            Some(config) => Some(LshIndex::build(config, item_factors.view())?),
            None => None,
        };

        Ok(FactorModel {
            version: self.version,
            built_at: Utc::now(),
            features: k,
            user_ids,
            user_index,
            user_factors,
            item_ids,
            item_index,
            item_factors,
            known_items: self.known,
            item_baseline,
            item_popularity,
            lsh,
        })
    }
}

fn to_matrix(
    vectors: BTreeMap<String, Vec<f32>>,
    k: usize,
    kind: &'static str,
) -> Result<(Vec<String>, Array2<f32>), ModelError> {
    let mut ids = Vec::with_capacity(vectors.len());
    let mut matrix = Array2::zeros((vectors.len(), k));

    for (row, (id, vector)) in vectors.into_iter().enumerate() {
        if id.is_empty() {
            return Err(ModelError::EmptyId(kind));
        }
        if vector.len() != k {
            return Err(ModelError::DimensionMismatch {
                id,
                expected: k,
                actual: vector.len(),
            });
        }
        if vector.iter().any(|x| !x.is_finite()) {
            return Err(ModelError::NonFiniteValue { id });
        }
        matrix.row_mut(row).assign(&ArrayView1::from(&vector[..]));
        ids.push(id);
    }

    Ok((ids, matrix))
}

fn index_of(ids: &[String]) -> HashMap<String, usize> {
    ids.iter()
        .enumerate()
        .map(|(position, id)| (id.clone(), position))
        .collect()
}
