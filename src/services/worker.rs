use crate::config::ContentConfig;
use crate::services::file_service::{FileService, OrphanReport};
use crate::services::thumbnail_service::ThumbnailService;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{Duration, sleep};

#[derive(Debug, Clone, Copy, Default)]
pub struct CleanupReport {
    pub expired_thumbnails: u64,
    pub orphans: OrphanReport,
}

/// Periodic cache expiry and orphan collection.
pub struct BackgroundWorker {
    thumbnails: Arc<ThumbnailService>,
    file_service: Arc<FileService>,
    config: ContentConfig,
    shutdown: watch::Receiver<bool>,
}

impl BackgroundWorker {
    pub fn new(
        thumbnails: Arc<ThumbnailService>,
        file_service: Arc<FileService>,
        config: ContentConfig,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            thumbnails,
            file_service,
            config,
            shutdown,
        }
    }

    pub async fn run(mut self) {
        tracing::info!(
            "🚀 Background worker started (interval: {}s)",
            self.config.cleanup_interval_secs
        );
        let interval = Duration::from_secs(self.config.cleanup_interval_secs.max(1));

        loop {
            tokio::select! {
                _ = self.shutdown.changed() => {
                    tracing::info!("🛑 Background worker shutting down");
                    break;
                }
                _ = sleep(interval) => {
                    self.perform_cleanup().await;
                }
            }
        }
    }

    /// One pass of every cleanup task. Failures are logged, never fatal.
    pub async fn perform_cleanup(&self) -> CleanupReport {
        tracing::info!("🧹 Running background cleanup tasks...");
        let mut report = CleanupReport::default();

        // 1. Derived artifacts nobody asked for recently
        match self
            .thumbnails
            .sweep_expired(self.config.cache_expiry_days)
            .await
        {
            Ok(count) => report.expired_thumbnails = count,
            Err(e) => tracing::error!("Thumbnail expiry sweep failed: {}", e),
        }

        // 2. Blobs left behind by interrupted writes or deletes
        let grace = Duration::from_secs(self.config.orphan_grace_secs);
        match self.file_service.sweep_orphans(grace).await {
            Ok(orphans) => report.orphans = orphans,
            Err(e) => tracing::error!("Orphan sweep failed: {}", e),
        }

        tracing::info!(
            "✅ Background cleanup completed ({} expired, {} orphans)",
            report.expired_thumbnails,
            report.orphans.total()
        );
        report
    }
}
