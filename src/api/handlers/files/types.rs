use crate::entities::{attachment_relations, file_resources};
use crate::services::ledger::RelationKind;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

/// Page size used when the client names none
pub const DEFAULT_PAGE_SIZE: u64 = 20;

/// Public URL of a stored file
pub fn file_url(id: &str) -> String {
    format!("/files/{}", id)
}

#[derive(Serialize, ToSchema)]
pub struct UploadResponse {
    pub id: String,
    pub filename: String,
    pub url: String,
    pub size: i64,
}

impl From<&file_resources::Model> for UploadResponse {
    fn from(resource: &file_resources::Model) -> Self {
        Self {
            id: resource.id.clone(),
            filename: resource.original_name.clone(),
            url: file_url(&resource.id),
            size: resource.size,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct FileResourceResponse {
    pub id: String,
    pub original_name: String,
    pub extension: String,
    pub mime_type: String,
    pub size: i64,
    pub category: String,
    pub url: String,
    pub created_at: chrono::DateTime<Utc>,
}

impl From<file_resources::Model> for FileResourceResponse {
    fn from(resource: file_resources::Model) -> Self {
        let url = file_url(&resource.id);
        Self {
            id: resource.id,
            original_name: resource.original_name,
            extension: resource.extension,
            mime_type: resource.mime_type,
            size: resource.size,
            category: resource.category,
            url,
            created_at: resource.created_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct FileListResponse {
    pub items: Vec<FileResourceResponse>,
    pub total: u64,
}

#[derive(Deserialize, Validate)]
pub struct ListFilesQuery {
    pub category: Option<String>,
    pub extension: Option<String>,
    pub mime_prefix: Option<String>,
    pub offset: Option<u64>,
    #[validate(range(min = 1, max = 100, message = "limit must be between 1 and 100"))]
    pub limit: Option<u64>,
}

#[derive(Deserialize, Default)]
pub struct DownloadQuery {
    pub thumbnail: Option<bool>,
    pub size: Option<u32>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

#[derive(Deserialize)]
pub struct DeleteFileQuery {
    pub document_id: Option<String>,
}

#[derive(Deserialize, ToSchema, Validate, Default)]
pub struct LinkFileRequest {
    pub kind: Option<RelationKind>,
    #[validate(range(min = 0, message = "order must not be negative"))]
    pub order: Option<i32>,
}

#[derive(Serialize, ToSchema)]
pub struct AttachmentResponse {
    pub document_id: String,
    pub file_id: String,
    pub kind: String,
    pub order: i32,
    pub created_at: chrono::DateTime<Utc>,
    /// Absent when the relation points at a file that no longer exists
    pub file: Option<FileResourceResponse>,
}

impl AttachmentResponse {
    pub fn new(
        relation: attachment_relations::Model,
        file: Option<file_resources::Model>,
    ) -> Self {
        Self {
            document_id: relation.document_id,
            file_id: relation.file_id,
            kind: relation.relation_kind,
            order: relation.display_order,
            created_at: relation.created_at,
            file: file.map(Into::into),
        }
    }
}
