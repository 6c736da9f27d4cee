// ============================================
// Model Manager
// ============================================
//
// Owns the "current snapshot" reference.
//
// State machine:
//   Empty --publish--> Ready --publish--> Ready
//
// Readers clone the Arc under a read lock and then work on their own
// reference; a publish only holds the write lock for the pointer swap.
// Replaced snapshots are freed when the last in-flight query drops them.

use crate::error::{RecommendError, Result};
use crate::models::ModelInfo;
use crate::services::model::FactorModel;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info};

struct Published {
    model: Arc<FactorModel>,
    generation: u64,
    published_at: DateTime<Utc>,
}

pub struct ModelManager {
    current: RwLock<Option<Published>>,
    ready_tx: watch::Sender<bool>,
}

impl Default for ModelManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelManager {
    pub fn new() -> Self {
        let (ready_tx, _) = watch::channel(false);
        Self {
            current: RwLock::new(None),
            ready_tx,
        }
    }

    /// Install `model` as the current snapshot and return its generation
    ///
    /// Queries that already captured a snapshot keep using it.
    pub fn publish(&self, model: FactorModel) -> u64 {
        let model = Arc::new(model);
        let version = model.version().to_string();
        let published_at = Utc::now();

        let (generation, previous) = {
            let mut current = self.current.write();
            let generation = current.as_ref().map_or(1, |p| p.generation + 1);
            let previous = current.replace(Published {
                model,
                generation,
                published_at,
            });
            (generation, previous)
        };

        // Release the old snapshot outside the lock
        drop(previous);

        self.ready_tx.send_replace(true);

        info!(generation, version = %version, "Published model snapshot");
        generation
    }

    /// Capture the current snapshot for the duration of one query
    pub fn current_snapshot(&self) -> Result<Arc<FactorModel>> {
        self.current
            .read()
            .as_ref()
            .map(|published| Arc::clone(&published.model))
            .ok_or_else(|| RecommendError::NotReady("no model has been published".to_string()))
    }

    pub fn is_ready(&self) -> bool {
        self.current.read().is_some()
    }

    /// Generation of the current snapshot, 0 before the first publish
    pub fn generation(&self) -> u64 {
        self.current.read().as_ref().map_or(0, |p| p.generation)
    }

    pub fn info(&self) -> Result<ModelInfo> {
        let current = self.current.read();
        let published = current
            .as_ref()
            .ok_or_else(|| RecommendError::NotReady("no model has been published".to_string()))?;

        Ok(ModelInfo {
            version: published.model.version().to_string(),
            generation: published.generation,
            built_at: published.model.built_at(),
            published_at: published.published_at,
            users: published.model.num_users(),
            items: published.model.num_items(),
            features: published.model.features(),
        })
    }

    /// Wait until the first snapshot is published
    pub async fn await_ready(&self, timeout: Duration) -> Result<Arc<FactorModel>> {
        let mut ready_rx = self.ready_tx.subscribe();

        // The sender lives in `self`, so `wait_for` only returns once ready
        let ready = tokio::time::timeout(timeout, ready_rx.wait_for(|ready| *ready))
            .await
            .is_ok();
        if ready {
            return self.current_snapshot();
        }

        debug!(timeout_ms = timeout.as_millis() as u64, "Timed out waiting for model");
        Err(RecommendError::NotReady(format!(
            "no model published within {}ms",
            timeout.as_millis()
        )))
    }
}
