//! Reloads the catalog when the asset bundle changes on disk.
//!
//! The game client rewrites the bundle while patching and keeps it locked
//! for a while, so read failures are retried with a fixed delay until they
//! succeed. A bundle that reads fine but holds no cards is not retried; the
//! old catalog stays live until the next change.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{AssetSource, Catalog};
use crate::error::CatalogError;

fn modified(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// Polls the bundle's modification time and drives reloads.
#[derive(Clone)]
pub struct CatalogWatcher {
    catalog: Arc<Catalog>,
    source: Arc<AssetSource>,
    language: String,
    poll_interval: Duration,
    retry_delay: Duration,
}

impl CatalogWatcher {
    pub fn new(
        catalog: Arc<Catalog>,
        source: AssetSource,
        language: impl Into<String>,
        poll_interval: Duration,
        retry_delay: Duration,
    ) -> Self {
        Self {
            catalog,
            source: Arc::new(source),
            language: language.into(),
            poll_interval,
            retry_delay,
        }
    }

    async fn reload_once(&self) -> Result<usize, CatalogError> {
        let catalog = Arc::clone(&self.catalog);
        let source = Arc::clone(&self.source);
        let language = self.language.clone();
        tokio::task::spawn_blocking(move || catalog.reload(source.as_ref(), &language))
            .await
            .map_err(|e| CatalogError::Extraction {
                path: self.source.path().to_path_buf(),
                reason: e.to_string(),
            })?
    }

    /// Reload, retrying I/O failures until they clear or `cancel` fires.
    pub async fn reload_with_retry(&self, cancel: &CancellationToken) -> Result<usize, CatalogError> {
        let mut attempt = 1u32;
        loop {
            match self.reload_once().await {
                Ok(names) => return Ok(names),
                Err(e) if e.is_transient() => {
                    warn!(
                        error = %e,
                        attempt,
                        retry_in = ?self.retry_delay,
                        "Card source unreadable, retrying"
                    );
                    tokio::select! {
                        _ = cancel.cancelled() => return Err(e),
                        _ = tokio::time::sleep(self.retry_delay) => {}
                    }
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Poll for changes until cancelled. The current modification time is
    /// taken as the baseline before this returns.
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        let baseline = modified(self.source.path());
        tokio::spawn(async move { self.run(baseline, cancel).await })
    }

    async fn run(self, mut last: Option<SystemTime>, cancel: CancellationToken) {
        let path = self.source.path().to_path_buf();
        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        debug!(path = %path.display(), "Watching card source");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {}
            }

            let current = modified(&path);
            if current.is_none() || current == last {
                continue;
            }
            info!(path = %path.display(), "Card source changed, reloading");
            if let Err(e) = self.reload_with_retry(&cancel).await {
                warn!(
                    error = %e,
                    code = e.error_code(),
                    "Card reload failed, keeping previous catalog"
                );
            }
            last = modified(&path).or(current);
        }
        debug!("Card source watcher stopped");
    }
}
