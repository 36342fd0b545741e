use crate::api::error::AppError;
use crate::entities::file_resources;
use tracing::{debug, info};

use super::{DeleteOutcome, DocumentCleanup, FileService};

impl FileService {
    /// Unlink from `document_id` when given, then remove the file only if
    /// nothing references it any more.
    pub async fn delete_file(
        &self,
        file_id: &str,
        document_id: Option<&str>,
    ) -> Result<DeleteOutcome, AppError> {
        let resource = self.registry.get(file_id).await?;

        let unlinked = match document_id {
            Some(document_id) => self.ledger.unlink(document_id, file_id).await? > 0,
            None => false,
        };

        let remaining = self.ledger.ref_count(file_id).await?;
        if remaining > 0 {
            debug!(
                "File {} still referenced by {} document(s), keeping it",
                file_id, remaining
            );
            return Ok(DeleteOutcome {
                unlinked,
                deleted: false,
            });
        }

        self.remove_resource(&resource).await?;
        Ok(DeleteOutcome {
            unlinked,
            deleted: true,
        })
    }

    /// Document-destroyed hook: drop its relations and collect every file
    /// whose reference count reached zero.
    pub async fn delete_document(&self, document_id: &str) -> Result<DocumentCleanup, AppError> {
        let file_ids = self.ledger.unlink_document(document_id).await?;
        let mut cleanup = DocumentCleanup {
            unlinked: file_ids.len(),
            deleted: Vec::new(),
        };

        for file_id in file_ids {
            if self.ledger.ref_count(&file_id).await? > 0 {
                continue;
            }
            match self.registry.get(&file_id).await {
                Ok(resource) => {
                    self.remove_resource(&resource).await?;
                    cleanup.deleted.push(file_id);
                }
                Err(e) if e.is_not_found() => {
                    debug!("Relation pointed at unknown file {}", file_id);
                }
                Err(e) => return Err(e),
            }
        }

        info!(
            "🗑️ Document {} released {} file(s), deleted {}",
            document_id,
            cleanup.unlinked,
            cleanup.deleted.len()
        );
        Ok(cleanup)
    }

    /// Registry row first, then the blob, then derived artifacts. A crash
    /// in between leaves an orphan blob for the sweep, never a dangling row.
    pub async fn remove_resource(&self, resource: &file_resources::Model) -> Result<(), AppError> {
        self.registry.delete(&resource.id).await?;
        self.storage
            .delete(resource.blob_category(), &resource.id)
            .await?;
        self.thumbnails.purge_by_source(&resource.id).await?;

        info!(
            "🗑️ Deleted {} ({}/{})",
            resource.original_name,
            resource.blob_category(),
            resource.id
        );
        Ok(())
    }
}
