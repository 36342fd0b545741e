use crate::api::error::AppError;
use crate::entities::file_resources;
use crate::services::storage::categories;
use chrono::{DateTime, TimeDelta, Utc};
use std::collections::HashSet;
use std::time::Duration;
use tracing::{info, warn};

use super::{FileService, OrphanReport};

impl FileService {
    /// Deletes blobs no registry or cache row accounts for, leaving anything
    /// younger than `grace` alone so in-flight uploads are not collected.
    /// Cache rows whose source resource is gone are purged as well.
    pub async fn sweep_orphans(&self, grace: Duration) -> Result<OrphanReport, AppError> {
        let cutoff = TimeDelta::from_std(grace)
            .ok()
            .and_then(|grace| Utc::now().checked_sub_signed(grace))
            .ok_or_else(|| {
                AppError::BadRequest(format!("Grace period of {:?} is out of range", grace))
            })?;

        let images = self.registry.ids(file_resources::category::IMAGE).await?;
        let assets = self
            .registry
            .ids(file_resources::category::BLOG_ASSET)
            .await?;

        for source_id in self.thumbnails.source_ids().await? {
            if !images.contains(&source_id) {
                self.thumbnails.purge_by_source(&source_id).await?;
            }
        }
        let derived = self.thumbnails.derived_ids().await?;

        let report = OrphanReport {
            files: self
                .sweep_category(categories::FILES, &images, cutoff)
                .await?,
            blog_assets: self
                .sweep_category(categories::BLOG_ASSETS, &assets, cutoff)
                .await?,
            thumbnails: self
                .sweep_category(categories::THUMBNAILS, &derived, cutoff)
                .await?,
        };

        if report.total() > 0 {
            info!(
                "🧹 Removed {} orphan blob(s) (files: {}, blog-assets: {}, thumbnails: {})",
                report.total(),
                report.files,
                report.blog_assets,
                report.thumbnails
            );
        }
        Ok(report)
    }

    async fn sweep_category(
        &self,
        category: &str,
        known: &HashSet<String>,
        cutoff: DateTime<Utc>,
    ) -> Result<usize, AppError> {
        let mut removed = 0;
        for id in self.storage.list(category).await? {
            if known.contains(&id) {
                continue;
            }

            let meta = match self.storage.metadata(category, &id).await {
                Ok(meta) => meta,
                // Deleted since the listing
                Err(e) if e.is_not_found() => continue,
                Err(e) => return Err(e.into()),
            };
            if meta.modified.is_some_and(|modified| modified > cutoff) {
                continue;
            }

            match self.storage.delete(category, &id).await {
                Ok(()) => removed += 1,
                Err(e) => warn!("Failed to delete orphan {}/{}: {}", category, id, e),
            }
        }
        Ok(removed)
    }
}
