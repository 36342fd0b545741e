use crate::AppState;
use crate::api::error::AppError;
use crate::services::thumbnail_service::CacheStats;
use axum::{
    Json,
    extract::{Query, State},
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

#[derive(Deserialize, Validate)]
pub struct CleanupQuery {
    #[validate(range(min = 1, max = 3650, message = "days must be between 1 and 3650"))]
    pub days: Option<i64>,
}

#[derive(Serialize, ToSchema)]
pub struct CleanupResponse {
    pub message: String,
    pub cleaned_count: u64,
    pub days: i64,
}

#[utoipa::path(
    post,
    path = "/system/thumbnails/cleanup",
    params(
        ("days" = Option<i64>, Query, description = "Remove thumbnails not accessed for this many days (default 30)")
    ),
    responses(
        (status = 200, description = "Expired thumbnails removed", body = CleanupResponse),
        (status = 400, description = "Invalid days")
    ),
    tag = "system"
)]
pub async fn cleanup_thumbnails(
    State(state): State<AppState>,
    Query(query): Query<CleanupQuery>,
) -> Result<Json<CleanupResponse>, AppError> {
    query
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
    let days = query.days.unwrap_or(state.config.cache_expiry_days);

    let cleaned_count = state.thumbnails.sweep_expired(days).await?;

    Ok(Json(CleanupResponse {
        message: "Thumbnail cleanup completed".to_string(),
        cleaned_count,
        days,
    }))
}

#[utoipa::path(
    get,
    path = "/system/thumbnails/stats",
    responses(
        (status = 200, description = "Thumbnail cache size", body = CacheStats)
    ),
    tag = "system"
)]
pub async fn thumbnail_stats(State(state): State<AppState>) -> Result<Json<CacheStats>, AppError> {
    Ok(Json(state.thumbnails.stats().await?))
}
