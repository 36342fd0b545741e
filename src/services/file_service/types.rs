use crate::services::ledger::RelationKind;
use serde::Serialize;
use utoipa::ToSchema;

/// Where a fresh upload should be attached, if anywhere
#[derive(Debug, Clone)]
pub struct AttachTarget {
    pub document_id: String,
    pub kind: RelationKind,
    pub order: i32,
}

/// Result of deleting a single file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct DeleteOutcome {
    /// A relation to the given document was removed
    pub unlinked: bool,
    /// The resource, its blob and derived artifacts are gone
    pub deleted: bool,
}

/// Result of the document-destroyed hook
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct DocumentCleanup {
    /// Files the document referenced
    pub unlinked: usize,
    /// Ids of files whose reference count reached zero and were removed
    pub deleted: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct OrphanReport {
    pub files: usize,
    pub blog_assets: usize,
    pub thumbnails: usize,
}

impl OrphanReport {
    pub fn total(&self) -> usize {
        self.files + self.blog_assets + self.thumbnails
    }
}
