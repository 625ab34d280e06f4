pub mod error;
pub mod extract;
pub mod handlers;

use crate::api::VertexClient;
use crate::config::Config;
use crate::poller::Poller;
use axum::Router;
use axum::routing::{get, post};
use reqwest::Client;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use error::{ApiError, ApiResult};

#[derive(Clone)]
pub struct AppState {
    pub client: VertexClient,
    pub poller: Poller,
    /// Model used by the text endpoints.
    pub model_id: String,
    /// Model used by the image-to-video endpoint.
    pub image_model_id: String,
}

impl AppState {
    pub fn new(
        client: VertexClient,
        poller: Poller,
        model_id: impl Into<String>,
        image_model_id: impl Into<String>,
    ) -> Self {
        Self {
            client,
            poller,
            model_id: model_id.into(),
            image_model_id: image_model_id.into(),
        }
    }

    pub fn from_config(config: &Config, http: Client) -> Self {
        Self::new(
            config.vertex_client(http),
            config.poller(),
            &config.model_id,
            &config.image_model_id,
        )
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/veo/generate", post(handlers::generate))
        .route("/api/veo/generate/wait", post(handlers::generate_and_wait))
        .route(
            "/api/veo/generate/image-text/wait",
            post(handlers::generate_image_text_and_wait),
        )
        .route(
            "/api/veo/operations",
            get(handlers::poll_query).post(handlers::poll_body),
        )
        .route("/api/veo/operations/{*name}", get(handlers::poll_path))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
