//! API server setup and configuration.

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use extractor::{Extractor, ExtractorConfig};

use crate::api::routes;
use crate::config::AppConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub extractor: Arc<Extractor>,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        let extractor_config = ExtractorConfig::new(config.data_dir.clone())
            .with_ytdlp_path(config.ytdlp_path.clone());
        Self {
            config: Arc::new(config),
            extractor: Arc::new(Extractor::new(extractor_config)),
        }
    }
}

/// Build the application router.
pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/extract", post(routes::extract::extract))
        .route("/download/{id}/{filename}", get(routes::download::download));

    Router::new()
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
