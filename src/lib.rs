pub mod api;
pub mod config;
pub mod entities;
pub mod infrastructure;
pub mod services;
pub mod utils;

use crate::config::ContentConfig;
use crate::services::file_service::FileService;
use crate::services::ledger::AttachmentLedger;
use crate::services::registry::FileResourceRegistry;
use crate::services::storage::BlobStore;
use crate::services::thumbnail_service::ThumbnailService;
use axum::{
    Router,
    http::HeaderValue,
    middleware::from_fn,
    routing::{delete, get, post},
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::files::upload::upload_file,
        api::handlers::files::list::list_files,
        api::handlers::files::download::download_file,
        api::handlers::files::manage::delete_file,
        api::handlers::documents::link_file,
        api::handlers::documents::list_document_files,
        api::handlers::documents::delete_document,
        api::handlers::system::cleanup_thumbnails,
        api::handlers::system::thumbnail_stats,
        api::handlers::health::health_check,
    ),
    components(
        schemas(
            api::handlers::files::UploadResponse,
            api::handlers::files::FileResourceResponse,
            api::handlers::files::FileListResponse,
            api::handlers::files::LinkFileRequest,
            api::handlers::files::AttachmentResponse,
            api::handlers::system::CleanupResponse,
            api::handlers::health::HealthResponse,
            services::file_service::DeleteOutcome,
            services::file_service::DocumentCleanup,
            services::ledger::RelationKind,
            services::thumbnail_service::CacheStats,
        )
    ),
    tags(
        (name = "files", description = "Upload, retrieval and deletion of stored files"),
        (name = "documents", description = "Document attachments"),
        (name = "system", description = "Cache maintenance and health")
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub storage: Arc<dyn BlobStore>,
    pub registry: FileResourceRegistry,
    pub ledger: AttachmentLedger,
    pub thumbnails: Arc<ThumbnailService>,
    pub file_service: Arc<FileService>,
    pub config: ContentConfig,
}

impl AppState {
    /// Wires every content service over one database and blob store.
    pub fn new(db: DatabaseConnection, storage: Arc<dyn BlobStore>, config: ContentConfig) -> Self {
        let registry = FileResourceRegistry::new(db.clone());
        let ledger = AttachmentLedger::new(db.clone());
        let thumbnails = Arc::new(ThumbnailService::new(
            db.clone(),
            storage.clone(),
            config.jpeg_quality,
        ));
        let file_service = Arc::new(FileService::new(
            storage.clone(),
            registry.clone(),
            ledger.clone(),
            thumbnails.clone(),
            config.clone(),
        ));

        Self {
            db,
            storage,
            registry,
            ledger,
            thumbnails,
            file_service,
            config,
        }
    }
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(api::handlers::health::health_check))
        .route(
            "/files",
            post(api::handlers::files::upload_file).get(api::handlers::files::list_files),
        )
        .route(
            "/files/:id",
            get(api::handlers::files::download_file).delete(api::handlers::files::delete_file),
        )
        .route(
            "/documents/:document_id",
            delete(api::handlers::documents::delete_document),
        )
        .route(
            "/documents/:document_id/files",
            get(api::handlers::documents::list_document_files),
        )
        .route(
            "/documents/:document_id/files/:file_id",
            post(api::handlers::documents::link_file),
        )
        .route(
            "/system/thumbnails/cleanup",
            post(api::handlers::system::cleanup_thumbnails),
        )
        .route(
            "/system/thumbnails/stats",
            get(api::handlers::system::thumbnail_stats),
        )
        .layer(cors_layer(&state.config))
        .layer(axum::extract::DefaultBodyLimit::max(
            state.config.max_file_size + 1024 * 1024, // Room for multipart overhead
        ))
        .layer(from_fn(api::middleware::request_id::request_id_middleware))
        .with_state(state)
}

fn cors_layer(config: &ContentConfig) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers(Any);

    if config.allowed_origins.iter().any(|o| o == "*") {
        return base.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();
    base.allow_origin(AllowOrigin::list(origins))
}
