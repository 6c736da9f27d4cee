// ============================================
// Background Jobs Module
// ============================================
//
// Contains background job runners for:
// 1. Periodic model refresh (load a new snapshot, publish it)

pub mod model_refresh;

pub use model_refresh::{ModelLoader, ModelRefreshJob, RefreshOutcome};
