use crate::config::ContentConfig;
use crate::services::ledger::AttachmentLedger;
use crate::services::registry::FileResourceRegistry;
use crate::services::storage::BlobStore;
use crate::services::thumbnail_service::ThumbnailService;
use crate::utils::id::IdAllocator;
use std::sync::Arc;

pub mod delete;
pub mod sweep;
pub mod types;
pub mod upload;

pub use types::{AttachTarget, DeleteOutcome, DocumentCleanup, OrphanReport};

/// Fresh ids tried before an upload gives up on collisions
pub const MAX_ID_ATTEMPTS: usize = 5;

/// Multi-step content workflows. Every step that fails unwinds the ones
/// before it, so callers never observe a row without a blob.
pub struct FileService {
    storage: Arc<dyn BlobStore>,
    registry: FileResourceRegistry,
    ledger: AttachmentLedger,
    thumbnails: Arc<ThumbnailService>,
    config: ContentConfig,
    ids: IdAllocator,
}

impl FileService {
    pub fn new(
        storage: Arc<dyn BlobStore>,
        registry: FileResourceRegistry,
        ledger: AttachmentLedger,
        thumbnails: Arc<ThumbnailService>,
        config: ContentConfig,
    ) -> Self {
        let ids = IdAllocator::new(config.retain_extension);
        Self {
            storage,
            registry,
            ledger,
            thumbnails,
            config,
            ids,
        }
    }
}
