pub mod api;
pub mod config;
pub mod entities;
pub mod infrastructure;
pub mod services;
pub mod utils;

use crate::config::StagingConfig;
use crate::services::attachment_store::AttachmentStore;
use crate::services::blob_store::BlobStoreClient;
use crate::services::staging::UploadStagingService;
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
        api::handlers::health::health_check,
        api::handlers::upload::upload_files,
        api::handlers::upload::upload_action,
        api::handlers::staging::list_staged,
        api::handlers::staging::remove_staged,
        api::handlers::staging::discard_session,
        api::handlers::staging::commit_field,
        api::handlers::staging::rehydrate,
        api::handlers::records::remove_record_field,
        api::handlers::parameters::list_parameters,
        api::handlers::parameters::get_parameter,
        api::handlers::parameters::update_parameter,
    ),
    components(
        schemas(
            api::handlers::health::HealthResponse,
            api::handlers::upload::ActionResponse,
            api::handlers::staging::CommitRequest,
            api::handlers::staging::CommitResponse,
            api::handlers::staging::RehydrateRequest,
            api::handlers::staging::RehydrateResponse,
            api::handlers::records::RemovedAttachments,
            api::handlers::parameters::UpdateParameterRequest,
            services::staging::UploadOutcome,
            services::staging::StagedItem,
            services::attachment_store::PersistedAttachment,
            services::attachment_store::PersistedFile,
            services::attachment_store::ThumbnailVariant,
            services::entry_catalog::FieldKind,
            services::entry_parameter_service::ReferenceItem,
        )
    ),
    tags(
        (name = "staging", description = "Per-session upload staging"),
        (name = "records", description = "Committed attachments"),
        (name = "parameters", description = "Entry parameters"),
        (name = "system", description = "Health")
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub staging: Arc<UploadStagingService>,
    pub store: Arc<dyn AttachmentStore>,
    pub blob_store: Option<Arc<dyn BlobStoreClient>>,
    pub config: StagingConfig,
}

fn cors_layer(config: &StagingConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();

    let allow_origin = if origins.is_empty() || config.allowed_origins.iter().any(|o| o == "*") {
        AllowOrigin::from(Any)
    } else {
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers(Any)
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(api::handlers::health::health_check))
        .route("/upload", post(api::handlers::upload::upload_files))
        .route(
            "/sessions/:session_id",
            delete(api::handlers::staging::discard_session),
        )
        .route(
            "/sessions/:session_id/actions",
            post(api::handlers::upload::upload_action),
        )
        .route(
            "/sessions/:session_id/rehydrate",
            post(api::handlers::staging::rehydrate),
        )
        .route(
            "/sessions/:session_id/fields/:field_name",
            get(api::handlers::staging::list_staged),
        )
        .route(
            "/sessions/:session_id/fields/:field_name/commit",
            post(api::handlers::staging::commit_field),
        )
        .route(
            "/sessions/:session_id/fields/:field_name/:index",
            delete(api::handlers::staging::remove_staged),
        )
        .route(
            "/records/:record_id/fields/:field_name",
            delete(api::handlers::records::remove_record_field),
        )
        .route(
            "/parameters",
            get(api::handlers::parameters::list_parameters),
        )
        .route(
            "/parameters/:key",
            get(api::handlers::parameters::get_parameter)
                .put(api::handlers::parameters::update_parameter),
        )
        .layer(from_fn(api::middleware::request_id::request_id_middleware))
        .layer(cors_layer(&state.config))
        .layer(axum::extract::DefaultBodyLimit::max(
            state.config.max_request_size,
        ))
        .with_state(state)
}
