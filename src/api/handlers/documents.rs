use crate::api::error::AppError;
use crate::api::handlers::files::{AttachmentResponse, LinkFileRequest};
use crate::services::file_service::DocumentCleanup;
use axum::{
    Json,
    extract::{Path, State},
};
use std::collections::HashMap;
use validator::Validate;

#[utoipa::path(
    post,
    path = "/documents/{document_id}/files/{file_id}",
    params(
        ("document_id" = String, Path, description = "Document (post) ID"),
        ("file_id" = String, Path, description = "File ID")
    ),
    request_body = LinkFileRequest,
    responses(
        (status = 200, description = "File attached (idempotent)", body = AttachmentResponse),
        (status = 400, description = "Invalid relation"),
        (status = 404, description = "File not found")
    ),
    tag = "documents"
)]
pub async fn link_file(
    State(state): State<crate::AppState>,
    Path((document_id, file_id)): Path<(String, String)>,
    Json(req): Json<LinkFileRequest>,
) -> Result<Json<AttachmentResponse>, AppError> {
    req.validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let relation = state
        .file_service
        .link_existing(
            &document_id,
            &file_id,
            req.kind.unwrap_or_default(),
            req.order.unwrap_or(0),
        )
        .await?;
    let file = state.registry.get(&file_id).await.ok();

    Ok(Json(AttachmentResponse::new(relation, file)))
}

#[utoipa::path(
    get,
    path = "/documents/{document_id}/files",
    params(
        ("document_id" = String, Path, description = "Document (post) ID")
    ),
    responses(
        (status = 200, description = "Attachments ordered by display order", body = Vec<AttachmentResponse>)
    ),
    tag = "documents"
)]
pub async fn list_document_files(
    State(state): State<crate::AppState>,
    Path(document_id): Path<String>,
) -> Result<Json<Vec<AttachmentResponse>>, AppError> {
    let relations = state.ledger.by_document(&document_id).await?;
    let ids: Vec<String> = relations.iter().map(|r| r.file_id.clone()).collect();

    let mut files: HashMap<String, _> = state
        .registry
        .get_many(&ids)
        .await?
        .into_iter()
        .map(|f| (f.id.clone(), f))
        .collect();

    let attachments = relations
        .into_iter()
        .map(|relation| {
            let file = files.remove(&relation.file_id);
            AttachmentResponse::new(relation, file)
        })
        .collect();

    Ok(Json(attachments))
}

#[utoipa::path(
    delete,
    path = "/documents/{document_id}",
    params(
        ("document_id" = String, Path, description = "Document (post) ID")
    ),
    responses(
        (status = 200, description = "Relations removed and unreferenced files deleted", body = DocumentCleanup)
    ),
    tag = "documents"
)]
pub async fn delete_document(
    State(state): State<crate::AppState>,
    Path(document_id): Path<String>,
) -> Result<Json<DocumentCleanup>, AppError> {
    let cleanup = state.file_service.delete_document(&document_id).await?;
    Ok(Json(cleanup))
}
