use crate::api::error::AppError;
use crate::entities::file_resources;
use crate::services::storage::StorageError;
use crate::utils::validation::ThumbnailDimensions;
use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::Response,
};
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use std::io::ErrorKind;
use tokio_util::io::ReaderStream;

use super::types::*;

/// Derived artifacts are immutable for a given key
pub const THUMBNAIL_CACHE_CONTROL: &str = "public, max-age=31536000, immutable";

#[utoipa::path(
    get,
    path = "/files/{id}",
    params(
        ("id" = String, Path, description = "File ID"),
        ("thumbnail" = Option<bool>, Query, description = "Serve a resized image instead of the original"),
        ("size" = Option<u32>, Query, description = "Thumbnail width and height"),
        ("width" = Option<u32>, Query, description = "Thumbnail width (default 180)"),
        ("height" = Option<u32>, Query, description = "Thumbnail height (default 180)")
    ),
    responses(
        (status = 200, description = "File or thumbnail stream"),
        (status = 400, description = "Invalid thumbnail dimensions or not an image"),
        (status = 404, description = "File not found"),
        (status = 500, description = "Storage failure or image_decode_failed")
    ),
    tag = "files"
)]
pub async fn download_file(
    State(state): State<crate::AppState>,
    Path(file_id): Path<String>,
    Query(query): Query<DownloadQuery>,
) -> Result<Response, AppError> {
    let resource = state.registry.get(&file_id).await?;

    if query.thumbnail.unwrap_or(false) {
        if !resource.is_image() {
            return Err(AppError::BadRequest(
                "Thumbnails are only available for images".to_string(),
            ));
        }
        let dims = ThumbnailDimensions::resolve(
            query.size,
            query.width,
            query.height,
            state.config.thumbnail_default_size,
            state.config.thumbnail_max_dimension,
        )?;
        return serve_thumbnail(&state, &resource, dims).await;
    }

    let path = state.storage.path(resource.blob_category(), &resource.id)?;
    let file = match tokio::fs::File::open(&path).await {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::warn!("Registered file {} has no blob on disk", resource.id);
            return Err(StorageError::NotFound {
                category: resource.blob_category().to_string(),
                id: resource.id.clone(),
            }
            .into());
        }
        Err(e) => return Err(AppError::Storage(e.into())),
    };

    let (content_type, content_disposition) = resolve_file_headers(&resource);
    let size = file
        .metadata()
        .await
        .map_err(|e| AppError::Storage(e.into()))?
        .len();

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_DISPOSITION, content_disposition)
        .header(header::CONTENT_LENGTH, size)
        .body(Body::from_stream(ReaderStream::new(file)))
        .map_err(|e| AppError::Internal(e.to_string()))
}

/// Zero-copy from the cache when possible, otherwise generate in memory.
async fn serve_thumbnail(
    state: &crate::AppState,
    resource: &file_resources::Model,
    dims: ThumbnailDimensions,
) -> Result<Response, AppError> {
    let content_type = thumbnail_content_type(&resource.extension);

    if let Some(path) = state
        .thumbnails
        .lookup_path(&resource.id, dims.width, dims.height)
        .await?
    {
        match tokio::fs::File::open(&path).await {
            Ok(file) => {
                let size = file
                    .metadata()
                    .await
                    .map_err(|e| AppError::Storage(e.into()))?
                    .len();
                return Response::builder()
                    .status(StatusCode::OK)
                    .header(header::CONTENT_TYPE, content_type)
                    .header(header::CACHE_CONTROL, THUMBNAIL_CACHE_CONTROL)
                    .header(header::CONTENT_LENGTH, size)
                    .body(Body::from_stream(ReaderStream::new(file)))
                    .map_err(|e| AppError::Internal(e.to_string()));
            }
            // Removed between the lookup and the open; regenerate below
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!("Cached thumbnail vanished: {}", path.display());
            }
            Err(e) => return Err(AppError::Storage(e.into())),
        }
    }

    let bytes = state
        .thumbnails
        .get_or_generate(&resource.id, &resource.extension, dims.width, dims.height)
        .await?;

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CACHE_CONTROL, THUMBNAIL_CACHE_CONTROL)
        .header(header::CONTENT_LENGTH, bytes.len())
        .body(Body::from(bytes))
        .map_err(|e| AppError::Internal(e.to_string()))
}

fn thumbnail_content_type(source_ext: &str) -> &'static str {
    if source_ext.trim_start_matches('.').eq_ignore_ascii_case("png") {
        mime::IMAGE_PNG.as_ref()
    } else {
        mime::IMAGE_JPEG.as_ref()
    }
}

pub(crate) fn resolve_file_headers(resource: &file_resources::Model) -> (String, String) {
    let content_type = resource.mime_type.clone();
    let filename = resource.original_name.as_str();

    let ascii_filename = filename
        .chars()
        .filter(|c| c.is_ascii() && !c.is_control() && *c != '"' && *c != '\\' && *c != ';')
        .take(64)
        .collect::<String>();
    let fallback_filename = if ascii_filename.is_empty() {
        "file"
    } else {
        &ascii_filename
    };

    let encoded_filename = utf8_percent_encode(filename, NON_ALPHANUMERIC).to_string();

    let disposition_type = if content_type.starts_with("image/")
        || content_type.starts_with("video/")
        || content_type.starts_with("audio/")
        || content_type.starts_with("text/")
        || content_type == "application/pdf"
    {
        "inline"
    } else {
        "attachment"
    };

    let content_disposition = format!(
        "{}; filename=\"{}\"; filename*=UTF-8''{}",
        disposition_type, fallback_filename, encoded_filename
    );

    (content_type, content_disposition)
}
