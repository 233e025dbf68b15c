//! Application assembly: state construction and the router with its layers.

use std::sync::Arc;

use axum::Router;
use axum::http::{HeaderName, HeaderValue, Method, header};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use hermes_core::flags::FeatureFlags;
use hermes_core::lister::DocumentLister;
use hermes_core::metadata::MetadataStore;
use hermes_core::upload::UploadHandler;
use hermes_storage::BlobStore;

use crate::config::ServerConfig;
use crate::requester::{DEPARTMENT_HEADER, ROLES_HEADER};
use crate::routes;
use crate::state::AppState;

/// Build the shared application state over a blob store.
pub fn build_app_state(
    config: &ServerConfig,
    blobs: Arc<dyn BlobStore>,
    flags: FeatureFlags,
) -> Arc<AppState> {
    let metadata = MetadataStore::new(blobs);

    Arc::new(AppState {
        uploads: UploadHandler::new(metadata.clone(), config.upload_policy()),
        lister: DocumentLister::new(metadata.clone()),
        metadata,
        departments: config.department_resolver(),
        flags,
        max_files_per_upload: config.max_files_per_upload,
    })
}

/// Build the Axum router with all routes and middleware.
pub fn build_router(state: Arc<AppState>, config: &ServerConfig) -> Router {
    let allow_origin = match config.cors_origin.as_deref().map(HeaderValue::from_str) {
        Some(Ok(origin)) => AllowOrigin::exact(origin),
        Some(Err(e)) => {
            warn!(error = %e, "invalid HERMES_CORS_ORIGIN, allowing any origin");
            AllowOrigin::from(Any)
        }
        None => AllowOrigin::from(Any),
    };

    let cors = CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static(DEPARTMENT_HEADER),
            HeaderName::from_static(ROLES_HEADER),
        ]);

    let mut app = Router::new()
        .merge(routes::upload::router(config.upload_body_limit()))
        .merge(routes::documents::router())
        .merge(routes::config::router())
        .merge(routes::health::router());

    if let Some(dir) = &config.static_dir {
        info!(path = %dir.display(), "serving static pages");
        app = app.fallback_service(ServeDir::new(dir));
    }

    app.layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        .with_state(state)
}
