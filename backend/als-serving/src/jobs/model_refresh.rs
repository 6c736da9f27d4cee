use crate::config::Config;
use crate::services::model::FactorModel;
use crate::services::model_manager::ModelManager;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::time::interval;
use tracing::{debug, error, info};

/// Source of freshly trained snapshots
///
/// Implementations fetch and parse whatever the training job produced and
/// return a fully built model, or `None` when nothing newer is available.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ModelLoader: Send + Sync {
    async fn load(&self) -> anyhow::Result<Option<FactorModel>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// A new snapshot was published with this generation
    Published(u64),
    /// Loader had nothing newer
    Unchanged,
    /// Loader failed; the previous snapshot (if any) stays current
    Failed,
}

/// Background model refresh job
///
/// **Usage**:
/// ```ignore
/// let job = ModelRefreshJob::new(manager, loader, Duration::from_secs(600));
/// let (shutdown_tx, handle) = job.spawn();
///
/// // Later: shutdown
/// shutdown_tx.send(())?;
/// handle.await?;
/// ```
pub struct ModelRefreshJob {
    manager: Arc<ModelManager>,
    loader: Arc<dyn ModelLoader>,
    interval: Duration,
}

impl ModelRefreshJob {
    pub fn new(manager: Arc<ModelManager>, loader: Arc<dyn ModelLoader>, interval: Duration) -> Self {
        Self {
            manager,
            loader,
            interval,
        }
    }

    pub fn from_config(
        manager: Arc<ModelManager>,
        loader: Arc<dyn ModelLoader>,
        config: &Config,
    ) -> Self {
        Self::new(manager, loader, config.refresh_interval())
    }

    /// Spawn the refresh loop; the first load runs immediately
    ///
    /// # Returns
    /// - `watch::Sender<()>` - Send signal to shutdown
    /// - `tokio::task::JoinHandle` - Task handle for awaiting completion
    pub fn spawn(self) -> (watch::Sender<()>, tokio::task::JoinHandle<()>) {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(());

        let handle = tokio::spawn(async move {
            info!(
                interval_secs = self.interval.as_secs(),
                "ModelRefreshJob started"
            );

            let mut timer = interval(self.interval);

            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => {
                        info!("ModelRefreshJob received shutdown signal");
                        break;
                    }
                    _ = timer.tick() => {
                        self.refresh_once().await;
                    }
                }
            }

            info!("ModelRefreshJob stopped");
        });

        (shutdown_tx, handle)
    }

    /// Run a single load-and-publish cycle
    pub async fn refresh_once(&self) -> RefreshOutcome {
        let start = Instant::now();

        match self.loader.load().await {
            Ok(Some(model)) => {
                let version = model.version().to_string();
                let users = model.num_users();
                let items = model.num_items();
                let features = model.features();

                let generation = self.manager.publish(model);

                info!(
                    generation,
                    version = %version,
                    users,
                    items,
                    features,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Model refresh published new snapshot"
                );
                RefreshOutcome::Published(generation)
            }
            Ok(None) => {
                debug!(
                    generation = self.manager.generation(),
                    "No newer model available"
                );
                RefreshOutcome::Unchanged
            }
            Err(e) => {
                error!(
                    error = %e,
                    ready = self.manager.is_ready(),
                    generation = self.manager.generation(),
                    "Model refresh failed; keeping current snapshot"
                );
                RefreshOutcome::Failed
            }
        }
    }
}
