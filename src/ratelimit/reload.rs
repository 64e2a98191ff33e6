//! Configuration reload plumbing.
//!
//! Change notifications arrive at arbitrary cadence, possibly in bursts.
//! The reloader collapses them into at most one pending snapshot rebuild
//! at a time and hands each rebuilt snapshot to the engine; the engine's
//! checks never wait on a rebuild.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::FloodgateConfig;
use crate::error::Result;

use super::limiter::RateLimiter;
use super::snapshot::ConfigSnapshot;

/// A source the reloader pulls fresh snapshots from.
///
/// Implementations decide where configuration lives. The reloader only
/// ever asks for the current state, so no ordering is required between
/// successive change notifications.
#[async_trait]
pub trait ConfigSource: Send + Sync + 'static {
    /// Produce the configuration snapshot as of now.
    async fn load(&self) -> Result<ConfigSnapshot>;
}

/// Re-reads the service configuration file on every reload.
pub struct FileConfigSource {
    path: PathBuf,
}

impl FileConfigSource {
    /// Create a source over the given configuration file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ConfigSource for FileConfigSource {
    async fn load(&self) -> Result<ConfigSnapshot> {
        let config = FloodgateConfig::from_file(&self.path)?;
        Ok(config.rate_limiting)
    }
}

/// Pokes the reloader. Cheap to clone, safe to call from any task.
#[derive(Clone)]
pub struct ReloadHandle {
    tx: mpsc::Sender<()>,
}

impl ReloadHandle {
    /// Signal that the configuration source changed.
    ///
    /// A signal arriving while a rebuild is already pending is dropped,
    /// not queued, so notification storms collapse into a single rebuild.
    pub fn notify(&self) {
        let _ = self.tx.try_send(());
    }
}

/// Background task that rebuilds snapshots and feeds them to the engine.
pub struct ConfigReloader<S> {
    limiter: Arc<RateLimiter>,
    source: S,
    rx: mpsc::Receiver<()>,
}

impl<S: ConfigSource> ConfigReloader<S> {
    /// Create a reloader and the handle used to trigger it.
    pub fn new(limiter: Arc<RateLimiter>, source: S) -> (Self, ReloadHandle) {
        // Capacity 1: one pending rebuild at most, the rest coalesce.
        let (tx, rx) = mpsc::channel(1);

        (
            Self {
                limiter,
                source,
                rx,
            },
            ReloadHandle { tx },
        )
    }

    /// Run until every [`ReloadHandle`] is dropped.
    ///
    /// A failed rebuild keeps the previous snapshot in place; a partially
    /// applied configuration is never observable.
    pub async fn run(mut self) {
        while self.rx.recv().await.is_some() {
            match self.source.load().await {
                Ok(snapshot) => {
                    debug!("Configuration source changed, applying new snapshot");
                    self.limiter.update_config(snapshot);
                }
                Err(e) => {
                    warn!(error = %e, "Configuration reload failed, keeping previous snapshot");
                }
            }
        }

        info!("All reload handles dropped, stopping configuration reloader");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::error::FloodgateError;
    use crate::store::MemoryStore;

    fn limiter() -> Arc<RateLimiter> {
        Arc::new(RateLimiter::new(
            Arc::new(MemoryStore::new()),
            ConfigSnapshot::default(),
        ))
    }

    /// Source that counts loads and takes a while to produce each one.
    struct CountingSource {
        loads: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ConfigSource for CountingSource {
        async fn load(&self) -> Result<ConfigSnapshot> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(ConfigSnapshot::default())
        }
    }

    struct DisablingSource;

    #[async_trait]
    impl ConfigSource for DisablingSource {
        async fn load(&self) -> Result<ConfigSnapshot> {
            Ok(ConfigSnapshot {
                enabled: false,
                ..ConfigSnapshot::default()
            })
        }
    }

    struct BrokenSource;

    #[async_trait]
    impl ConfigSource for BrokenSource {
        async fn load(&self) -> Result<ConfigSnapshot> {
            Err(FloodgateError::Config("unparseable".to_string()))
        }
    }

    #[tokio::test]
    async fn test_reload_applies_new_snapshot() {
        let limiter = limiter();
        assert!(limiter.config().enabled);

        let (reloader, handle) = ConfigReloader::new(limiter.clone(), DisablingSource);
        let task = tokio::spawn(reloader.run());

        handle.notify();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(!limiter.config().enabled);

        drop(handle);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_reload_keeps_previous_snapshot() {
        let limiter = limiter();
        let (reloader, handle) = ConfigReloader::new(limiter.clone(), BrokenSource);
        let task = tokio::spawn(reloader.run());

        handle.notify();
        tokio::time::sleep(Duration::from_millis(50)).await;

        // The default snapshot survives the failed rebuild.
        assert!(limiter.config().enabled);

        drop(handle);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_notification_burst_coalesces() {
        let loads = Arc::new(AtomicUsize::new(0));
        let (reloader, handle) = ConfigReloader::new(
            limiter(),
            CountingSource {
                loads: loads.clone(),
            },
        );
        let task = tokio::spawn(reloader.run());

        // First notification starts a slow rebuild; the burst behind it
        // can occupy at most the single pending slot.
        for _ in 0..10 {
            handle.notify();
        }
        tokio::time::sleep(Duration::from_millis(200)).await;

        let total = loads.load(Ordering::SeqCst);
        assert!(total <= 2, "expected at most 2 rebuilds, saw {total}");
        assert!(total >= 1);

        drop(handle);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_file_source_reads_rate_limiting_section() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "rate_limiting:\n  enabled: false\n  limits:\n    ip:\n      max_requests: 3\n      block_duration_mins: 1\n"
        )
        .unwrap();

        let source = FileConfigSource::new(file.path());
        let snapshot = source.load().await.unwrap();

        assert!(!snapshot.enabled);
        assert_eq!(snapshot.limits.len(), 1);
    }
}
