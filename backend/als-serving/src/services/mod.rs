pub mod candidates;
pub mod model;
pub mod model_manager;
pub mod recommender;
pub mod scoring;

pub use candidates::CandidateSelector;
pub use model::{FactorModel, FactorModelBuilder, LshConfig, LshIndex};
pub use model_manager::ModelManager;
pub use recommender::RecommenderService;
pub use scoring::{ScoreKind, Scorer};
