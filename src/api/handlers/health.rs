use crate::AppState;
use axum::{Json, extract::State, http::StatusCode};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub database: String,
    pub storage: String,
    pub version: String,
}

impl HealthResponse {
    fn from_checks(db_ok: bool, storage_ok: bool) -> (StatusCode, Self) {
        let healthy = db_ok && storage_ok;
        let status = if healthy {
            StatusCode::OK
        } else {
            StatusCode::SERVICE_UNAVAILABLE
        };
        (
            status,
            Self {
                status: if healthy { "ok" } else { "degraded" }.to_string(),
                database: if db_ok { "connected" } else { "disconnected" }.to_string(),
                storage: if storage_ok { "available" } else { "unavailable" }.to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        )
    }
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Database and blob store reachable", body = HealthResponse),
        (status = 503, description = "A dependency is down", body = HealthResponse)
    ),
    tag = "system"
)]
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let (db_ok, storage_ok) = tokio::join!(
        async { state.db.ping().await.is_ok() },
        state.storage.is_available()
    );
    let (status, body) = HealthResponse::from_checks(db_ok, storage_ok);
    (status, Json(body))
}
