use crate::api::error::AppError;
use crate::entities::{attachment_relations, file_resources};
use crate::services::ledger::RelationKind;
use crate::services::storage::{StorageError, categories};
use crate::utils::id::extension_of;
use crate::utils::validation::{detect_mime, is_image_extension, validate_upload};
use chrono::Utc;
use tracing::{error, info, warn};

use super::{AttachTarget, FileService, MAX_ID_ATTEMPTS};

impl FileService {
    /// Store an uploaded file, register it and optionally attach it to a document.
    ///
    /// Images land in the `files` category (thumbnail sources), everything
    /// else in `blog-assets`.
    pub async fn upload(
        &self,
        filename: &str,
        data: &[u8],
        attach: Option<AttachTarget>,
    ) -> Result<file_resources::Model, AppError> {
        let ext = extension_of(filename);
        let original_name = validate_upload(filename, &ext, data, &self.config)?;

        let (resource_category, blob_category) = if is_image_extension(&ext) {
            (file_resources::category::IMAGE, categories::FILES)
        } else {
            (file_resources::category::BLOG_ASSET, categories::BLOG_ASSETS)
        };
        let mime_type = detect_mime(data, &ext);

        for attempt in 1..=MAX_ID_ATTEMPTS {
            let id = self.ids.new_id(&ext);

            match self.storage.save_new(blob_category, &id, data).await {
                Ok(()) => {}
                Err(StorageError::AlreadyExists { .. }) => {
                    warn!("Blob id collision on {} (attempt {})", id, attempt);
                    continue;
                }
                Err(e) => return Err(e.into()),
            }

            let now = Utc::now();
            let storage_path = match self.storage.path(blob_category, &id) {
                Ok(path) => path.to_string_lossy().to_string(),
                Err(e) => {
                    self.discard_blob(blob_category, &id).await;
                    return Err(e.into());
                }
            };
            let resource = file_resources::Model {
                id: id.clone(),
                original_name: original_name.clone(),
                extension: ext.clone(),
                mime_type: mime_type.clone(),
                size: data.len() as i64,
                category: resource_category.to_string(),
                storage_path,
                created_at: now,
                updated_at: now,
            };

            let resource = match self.registry.create(resource).await {
                Ok(resource) => resource,
                Err(AppError::Conflict(_)) => {
                    warn!("Registry id collision on {} (attempt {})", id, attempt);
                    self.discard_blob(blob_category, &id).await;
                    continue;
                }
                Err(e) => {
                    self.discard_blob(blob_category, &id).await;
                    return Err(e);
                }
            };

            if let Some(target) = &attach {
                if let Err(e) = self
                    .ledger
                    .link(&target.document_id, &resource.id, target.kind, target.order)
                    .await
                {
                    error!(
                        "Failed to attach {} to {}, rolling back upload: {}",
                        resource.id, target.document_id, e
                    );
                    if let Err(re) = self.registry.delete(&resource.id).await {
                        error!("Rollback of registry row {} failed: {}", resource.id, re);
                    }
                    self.discard_blob(blob_category, &id).await;
                    return Err(e);
                }
            }

            info!(
                "📤 Stored {} as {}/{} ({} bytes)",
                resource.original_name, blob_category, resource.id, resource.size
            );
            return Ok(resource);
        }

        Err(AppError::Conflict(format!(
            "Could not allocate a unique id after {} attempts",
            MAX_ID_ATTEMPTS
        )))
    }

    /// Attach an already registered file to a document. Idempotent.
    pub async fn link_existing(
        &self,
        document_id: &str,
        file_id: &str,
        kind: RelationKind,
        order: i32,
    ) -> Result<attachment_relations::Model, AppError> {
        // 404 before creating a dangling relation
        self.registry.get(file_id).await?;
        self.ledger.link(document_id, file_id, kind, order).await
    }

    async fn discard_blob(&self, category: &str, id: &str) {
        if let Err(e) = self.storage.delete(category, id).await {
            error!("Rollback of blob {}/{} failed: {}", category, id, e);
        }
    }
}
