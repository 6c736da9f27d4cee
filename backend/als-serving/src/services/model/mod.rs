/// Factor Model Module
///
/// Immutable snapshot of a trained ALS model: user/item latent vectors,
/// known-interaction sets, and the aggregates queries need (baseline
/// affinity, popularity, optional LSH index).
pub mod factor_model;
pub mod lsh;

pub use factor_model::{FactorModel, FactorModelBuilder};
pub use lsh::{LshConfig, LshIndex};
