use crate::api::error::AppError;
use crate::services::file_service::AttachTarget;
use crate::services::ledger::RelationKind;
use axum::{
    Json,
    extract::{Multipart, State, multipart::MultipartError},
};
use bytes::Bytes;

use super::types::*;

#[utoipa::path(
    post,
    path = "/files",
    request_body(content = Multipart, description = "Multipart form: `file`, optional `document_id`, `kind`, `order`"),
    responses(
        (status = 200, description = "File uploaded successfully", body = UploadResponse),
        (status = 400, description = "Missing file, file too large or extension not allowed"),
        (status = 500, description = "Storage failure")
    ),
    tag = "files"
)]
pub async fn upload_file(
    State(state): State<crate::AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let mut file: Option<(String, Bytes)> = None;
    let mut document_id: Option<String> = None;
    let mut kind = RelationKind::default();
    let mut order = 0;

    let max_size = state.config.max_file_size;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, max_size))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let filename = field.file_name().unwrap_or("upload").to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| multipart_error(e, max_size))?;
                file = Some((filename, data));
            }
            "document_id" => {
                let value = field.text().await.map_err(|e| AppError::BadRequest(e.to_string()))?;
                let value = value.trim();
                if !value.is_empty() {
                    document_id = Some(value.to_string());
                }
            }
            "kind" => {
                let value = field.text().await.map_err(|e| AppError::BadRequest(e.to_string()))?;
                kind = value.parse()?;
            }
            "order" => {
                let value = field.text().await.map_err(|e| AppError::BadRequest(e.to_string()))?;
                order = value
                    .trim()
                    .parse()
                    .map_err(|_| AppError::BadRequest(format!("Invalid order: {}", value)))?;
            }
            _ => {
                tracing::debug!("Ignoring unknown multipart field: {}", name);
            }
        }
    }

    let (filename, data) =
        file.ok_or_else(|| AppError::BadRequest("No file uploaded".to_string()))?;

    let attach = document_id.map(|document_id| AttachTarget {
        document_id,
        kind,
        order,
    });

    let resource = state.file_service.upload(&filename, &data, attach).await?;

    Ok(Json(UploadResponse::from(&resource)))
}

fn multipart_error(e: MultipartError, max_size: usize) -> AppError {
    let err_msg = e.to_string();
    if err_msg.contains("length limit exceeded") {
        AppError::BadRequest(format!(
            "File exceeds the maximum allowed size of {} bytes",
            max_size
        ))
    } else {
        AppError::BadRequest(err_msg)
    }
}
