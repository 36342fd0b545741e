use crate::api::error::AppError;
use crate::services::file_service::DeleteOutcome;
use axum::{
    Json,
    extract::{Path, Query, State},
};

use super::types::*;

#[utoipa::path(
    delete,
    path = "/files/{id}",
    params(
        ("id" = String, Path, description = "File ID"),
        ("document_id" = Option<String>, Query, description = "Unlink from this document first")
    ),
    responses(
        (status = 200, description = "Unlink/delete outcome", body = DeleteOutcome),
        (status = 404, description = "File not found")
    ),
    tag = "files"
)]
pub async fn delete_file(
    State(state): State<crate::AppState>,
    Path(file_id): Path<String>,
    Query(query): Query<DeleteFileQuery>,
) -> Result<Json<DeleteOutcome>, AppError> {
    let outcome = state
        .file_service
        .delete_file(&file_id, query.document_id.as_deref())
        .await?;

    Ok(Json(outcome))
}
