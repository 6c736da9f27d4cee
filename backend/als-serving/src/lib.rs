pub mod config;
pub mod error;
pub mod jobs;
pub mod models;
pub mod services;
pub mod utils;

pub use config::Config;
pub use error::{ErrorKind, ModelError, RecommendError, Result};
pub use jobs::{ModelLoader, ModelRefreshJob, RefreshOutcome};
pub use models::{ModelInfo, Query, RecommendOptions, RecommendationItem};
pub use services::{
    CandidateSelector, FactorModel, FactorModelBuilder, LshConfig, ModelManager,
    RecommenderService, ScoreKind, Scorer,
};
