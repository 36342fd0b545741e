use crate::api::error::AppError;
use crate::entities::{prelude::*, thumbnail_caches};
use crate::services::storage::{BlobStore, categories};
use crate::utils::id::derive_id;
use crate::utils::keyed_mutex::KeyedMutex;
use chrono::{DateTime, TimeDelta, Utc};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::ImageFormat;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QuerySelect, Set, SqlErr, Statement,
};
use serde::Serialize;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct CacheStats {
    pub entries: u64,
    pub total_bytes: u64,
}

/// On-demand cache of resized images keyed by `(source_id, width, height)`.
///
/// A cache row is only trusted while its derived blob exists; rows whose
/// blob went missing are dropped on the next read and regenerated.
pub struct ThumbnailService {
    db: DatabaseConnection,
    storage: Arc<dyn BlobStore>,
    jpeg_quality: u8,
    generation_locks: KeyedMutex,
}

impl ThumbnailService {
    pub fn new(db: DatabaseConnection, storage: Arc<dyn BlobStore>, jpeg_quality: u8) -> Self {
        Self {
            db,
            storage,
            jpeg_quality,
            generation_locks: KeyedMutex::new(),
        }
    }

    /// Path of a valid cached artifact, bumping its access time. Never reads bytes.
    pub async fn lookup_path(
        &self,
        source_id: &str,
        width: u32,
        height: u32,
    ) -> Result<Option<PathBuf>, AppError> {
        let Some(entry) = self.find_entry(source_id, width, height).await? else {
            return Ok(None);
        };

        if !self
            .storage
            .exists(categories::THUMBNAILS, &entry.thumbnail_id)
            .await?
        {
            self.drop_corrupt_entry(&entry).await;
            return Ok(None);
        }

        self.touch(entry.id).await;
        Ok(Some(
            self.storage.path(categories::THUMBNAILS, &entry.thumbnail_id)?,
        ))
    }

    /// Cached bytes when valid, otherwise decode the original, resize and store.
    ///
    /// Concurrent misses on one key are collapsed: followers wait for the
    /// leader and then read its result from the cache.
    pub async fn get_or_generate(
        &self,
        source_id: &str,
        source_ext: &str,
        width: u32,
        height: u32,
    ) -> Result<Vec<u8>, AppError> {
        if let Some(bytes) = self.cached_bytes(source_id, width, height).await? {
            return Ok(bytes);
        }

        let thumbnail_id = derive_id(source_id, width, height);
        let _guard = self.generation_locks.lock(&thumbnail_id).await;

        if let Some(bytes) = self.cached_bytes(source_id, width, height).await? {
            return Ok(bytes);
        }

        let original = self.storage.get(categories::FILES, source_id).await?;

        let ext = source_ext.to_string();
        let quality = self.jpeg_quality;
        let bytes = tokio::task::spawn_blocking(move || {
            render_thumbnail(&original, &ext, width, height, quality)
        })
        .await
        .map_err(|e| AppError::Internal(format!("Thumbnail task failed: {}", e)))??;

        self.storage
            .save(categories::THUMBNAILS, &thumbnail_id, &bytes)
            .await?;

        self.record_entry(source_id, &thumbnail_id, width, height, bytes.len())
            .await;

        info!(
            "🖼️ Generated thumbnail {} ({}x{}, {} bytes)",
            thumbnail_id,
            width,
            height,
            bytes.len()
        );
        Ok(bytes)
    }

    /// Drops every derived artifact of `source_id`. Returns the rows removed.
    pub async fn purge_by_source(&self, source_id: &str) -> Result<u64, AppError> {
        let entries = ThumbnailCaches::find()
            .filter(thumbnail_caches::Column::SourceFileId.eq(source_id))
            .all(&self.db)
            .await?;

        for entry in &entries {
            if let Err(e) = self
                .storage
                .delete(categories::THUMBNAILS, &entry.thumbnail_id)
                .await
            {
                warn!(
                    "Failed to delete derived blob {}: {}",
                    entry.thumbnail_id, e
                );
            }
        }

        let res = ThumbnailCaches::delete_many()
            .filter(thumbnail_caches::Column::SourceFileId.eq(source_id))
            .exec(&self.db)
            .await?;

        if res.rows_affected > 0 {
            debug!(
                "Purged {} cached thumbnail(s) of {}",
                res.rows_affected, source_id
            );
        }
        Ok(res.rows_affected)
    }

    /// Removes entries not accessed for `days` days. `days` must be at least 1.
    pub async fn sweep_expired(&self, days: i64) -> Result<u64, AppError> {
        if days < 1 {
            return Err(AppError::BadRequest(format!(
                "Expiry must be at least one day (got {})",
                days
            )));
        }
        let cutoff = TimeDelta::try_days(days)
            .and_then(|horizon| Utc::now().checked_sub_signed(horizon))
            .ok_or_else(|| {
                AppError::BadRequest(format!("Expiry of {} days is out of range", days))
            })?;
        self.sweep_expired_before(cutoff).await
    }

    /// Removes entries whose last access is strictly older than `cutoff`.
    pub async fn sweep_expired_before(&self, cutoff: DateTime<Utc>) -> Result<u64, AppError> {
        let expired = ThumbnailCaches::find()
            .filter(thumbnail_caches::Column::LastAccessedAt.lt(cutoff))
            .all(&self.db)
            .await?;

        if expired.is_empty() {
            return Ok(0);
        }

        for entry in &expired {
            if let Err(e) = self
                .storage
                .delete(categories::THUMBNAILS, &entry.thumbnail_id)
                .await
            {
                warn!(
                    "Failed to delete expired thumbnail {}: {}",
                    entry.thumbnail_id, e
                );
            }
        }

        // Re-check the horizon so a row touched since the scan is kept
        let res = ThumbnailCaches::delete_many()
            .filter(thumbnail_caches::Column::Id.is_in(expired.iter().map(|e| e.id)))
            .filter(thumbnail_caches::Column::LastAccessedAt.lt(cutoff))
            .exec(&self.db)
            .await?;

        info!(
            "🧹 Swept {} expired thumbnail(s) older than {}",
            res.rows_affected, cutoff
        );
        self.generation_locks.cleanup();
        Ok(res.rows_affected)
    }

    pub async fn stats(&self) -> Result<CacheStats, AppError> {
        let backend = self.db.get_database_backend();
        let row = self
            .db
            .query_one(Statement::from_string(
                backend,
                "SELECT COUNT(*) AS entries, COALESCE(SUM(size), 0) AS total_bytes FROM thumbnail_caches"
                    .to_string(),
            ))
            .await?;

        let Some(row) = row else {
            return Ok(CacheStats::default());
        };
        let entries: i64 = row.try_get("", "entries")?;
        let total_bytes: i64 = row.try_get("", "total_bytes")?;

        Ok(CacheStats {
            entries: entries.max(0) as u64,
            total_bytes: total_bytes.max(0) as u64,
        })
    }

    /// Ids of every derived blob the cache knows about
    pub async fn derived_ids(&self) -> Result<HashSet<String>, AppError> {
        let ids: Vec<String> = ThumbnailCaches::find()
            .select_only()
            .column(thumbnail_caches::Column::ThumbnailId)
            .into_tuple()
            .all(&self.db)
            .await?;
        Ok(ids.into_iter().collect())
    }

    /// Distinct source ids that have at least one cached artifact
    pub async fn source_ids(&self) -> Result<HashSet<String>, AppError> {
        let ids: Vec<String> = ThumbnailCaches::find()
            .select_only()
            .column(thumbnail_caches::Column::SourceFileId)
            .distinct()
            .into_tuple()
            .all(&self.db)
            .await?;
        Ok(ids.into_iter().collect())
    }

    async fn find_entry(
        &self,
        source_id: &str,
        width: u32,
        height: u32,
    ) -> Result<Option<thumbnail_caches::Model>, AppError> {
        let entry = ThumbnailCaches::find()
            .filter(thumbnail_caches::Column::SourceFileId.eq(source_id))
            .filter(thumbnail_caches::Column::Width.eq(width as i32))
            .filter(thumbnail_caches::Column::Height.eq(height as i32))
            .one(&self.db)
            .await?;
        Ok(entry)
    }

    async fn cached_bytes(
        &self,
        source_id: &str,
        width: u32,
        height: u32,
    ) -> Result<Option<Vec<u8>>, AppError> {
        let Some(entry) = self.find_entry(source_id, width, height).await? else {
            return Ok(None);
        };

        match self
            .storage
            .get(categories::THUMBNAILS, &entry.thumbnail_id)
            .await
        {
            Ok(bytes) => {
                self.touch(entry.id).await;
                Ok(Some(bytes))
            }
            Err(e) if e.is_not_found() => {
                self.drop_corrupt_entry(&entry).await;
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn touch(&self, entry_id: i64) {
        let res = ThumbnailCaches::update_many()
            .col_expr(
                thumbnail_caches::Column::LastAccessedAt,
                Expr::value(Utc::now()),
            )
            .filter(thumbnail_caches::Column::Id.eq(entry_id))
            .exec(&self.db)
            .await;
        if let Err(e) = res {
            warn!("Failed to update thumbnail access time: {}", e);
        }
    }

    async fn drop_corrupt_entry(&self, entry: &thumbnail_caches::Model) {
        warn!(
            "⚠️ Cached thumbnail {} is missing on disk, dropping its cache row",
            entry.thumbnail_id
        );
        if let Err(e) = ThumbnailCaches::delete_by_id(entry.id).exec(&self.db).await {
            error!("Failed to drop corrupt cache row {}: {}", entry.id, e);
        }
    }

    /// Cache rows are advisory: failing to record one only costs a regeneration.
    async fn record_entry(
        &self,
        source_id: &str,
        thumbnail_id: &str,
        width: u32,
        height: u32,
        size: usize,
    ) {
        let storage_path = match self.storage.path(categories::THUMBNAILS, thumbnail_id) {
            Ok(path) => path.to_string_lossy().to_string(),
            Err(e) => {
                warn!("Skipping cache row for {}: {}", thumbnail_id, e);
                return;
            }
        };

        let now = Utc::now();
        let entry = thumbnail_caches::ActiveModel {
            source_file_id: Set(source_id.to_string()),
            width: Set(width as i32),
            height: Set(height as i32),
            thumbnail_id: Set(thumbnail_id.to_string()),
            storage_path: Set(storage_path),
            size: Set(size as i64),
            created_at: Set(now),
            last_accessed_at: Set(now),
            ..Default::default()
        };

        match entry.insert(&self.db).await {
            Ok(_) => {}
            Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                debug!("Thumbnail {} was recorded concurrently", thumbnail_id);
            }
            Err(e) => warn!("Failed to record thumbnail {}: {}", thumbnail_id, e),
        }
    }
}

/// Resize by fill (aspect preserved, centre crop) to exactly `width`x`height`.
///
/// PNG sources stay PNG; everything else is encoded as JPEG.
pub fn render_thumbnail(
    data: &[u8],
    source_ext: &str,
    width: u32,
    height: u32,
    jpeg_quality: u8,
) -> Result<Vec<u8>, AppError> {
    let img = image::load_from_memory(data)?;
    let resized = img.resize_to_fill(width, height, FilterType::Lanczos3);

    let mut out = Vec::new();
    if source_ext.trim_start_matches('.').eq_ignore_ascii_case("png") {
        resized.write_to(&mut std::io::Cursor::new(&mut out), ImageFormat::Png)?;
    } else {
        let rgb = resized.to_rgb8();
        JpegEncoder::new_with_quality(&mut out, jpeg_quality).encode_image(&rgb)?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, GenericImageView, ImageBuffer, Rgb};

    fn sample_jpeg(width: u32, height: u32) -> Vec<u8> {
        let img = ImageBuffer::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, 128])
        });
        let mut out = Vec::new();
        JpegEncoder::new_with_quality(&mut out, 90)
            .encode_image(&img)
            .unwrap();
        out
    }

    #[test]
    fn test_render_fills_exact_dimensions() {
        let data = sample_jpeg(400, 200);
        let out = render_thumbnail(&data, ".jpg", 100, 100, 80).unwrap();
        let thumb = image::load_from_memory(&out).unwrap();
        assert_eq!(thumb.dimensions(), (100, 100));
        assert_eq!(image::guess_format(&out).unwrap(), ImageFormat::Jpeg);
    }

    #[test]
    fn test_png_source_stays_png() {
        let img = DynamicImage::ImageRgb8(ImageBuffer::from_pixel(50, 80, Rgb([10, 20, 30])));
        let mut data = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut data), ImageFormat::Png)
            .unwrap();

        let out = render_thumbnail(&data, ".PNG", 32, 16, 80).unwrap();
        assert_eq!(image::guess_format(&out).unwrap(), ImageFormat::Png);
        assert_eq!(image::load_from_memory(&out).unwrap().dimensions(), (32, 16));
    }

    #[test]
    fn test_render_is_deterministic() {
        let data = sample_jpeg(120, 90);
        let a = render_thumbnail(&data, ".jpg", 60, 60, 80).unwrap();
        let b = render_thumbnail(&data, ".jpg", 60, 60, 80).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_garbage_is_a_decode_error() {
        let err = render_thumbnail(b"definitely not an image", ".jpg", 10, 10, 80).unwrap_err();
        assert!(matches!(err, AppError::Decode(_)));
    }
}
