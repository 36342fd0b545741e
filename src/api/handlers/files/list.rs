use crate::api::error::AppError;
use crate::services::registry::ResourceFilter;
use axum::{
    Json,
    extract::{Query, State},
};
use validator::Validate;

use super::types::*;

#[utoipa::path(
    get,
    path = "/files",
    params(
        ("category" = Option<String>, Query, description = "image, blog-asset or thumbnail"),
        ("extension" = Option<String>, Query, description = "File extension, with or without the dot"),
        ("mime_prefix" = Option<String>, Query, description = "MIME type prefix, e.g. image/"),
        ("offset" = Option<u64>, Query, description = "Rows to skip"),
        ("limit" = Option<u64>, Query, description = "Page size (1-100, default 20)")
    ),
    responses(
        (status = 200, description = "Registered files, newest first", body = FileListResponse),
        (status = 400, description = "Invalid paging parameters")
    ),
    tag = "files"
)]
pub async fn list_files(
    State(state): State<crate::AppState>,
    Query(query): Query<ListFilesQuery>,
) -> Result<Json<FileListResponse>, AppError> {
    query
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let filter = ResourceFilter {
        category: query.category,
        extension: query.extension,
        mime_prefix: query.mime_prefix,
    };
    let offset = query.offset.unwrap_or(0);
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE);

    let total = state.registry.count(&filter).await?;
    let items = state
        .registry
        .list_page(&filter, offset, limit)
        .await?
        .into_iter()
        .map(FileResourceResponse::from)
        .collect();

    Ok(Json(FileListResponse { items, total }))
}
