use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response};
use http_body_util::BodyExt;
use reqwest::Client;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use veo_bridge::auth::{StaticToken, TokenProvider};
use veo_bridge::bridge::{self, AppState};
use veo_bridge::{Poller, VertexClient};

pub const TEXT_MODEL: &str = "veo-3.0-fast-generate-001";
pub const IMAGE_MODEL: &str = "veo-3.0-generate-001";

pub fn model_path(model: &str, method: &str) -> String {
    format!("/v1/projects/proj/locations/us-central1/publishers/google/models/{model}:{method}")
}

/// Router wired to a mock upstream, with a short poll interval.
pub fn build_test_app(server: &mockito::ServerGuard, max_wait: Duration) -> Router {
    build_test_app_with(server, Arc::new(StaticToken::new("tok")), max_wait)
}

pub fn build_test_app_with(
    server: &mockito::ServerGuard,
    credentials: Arc<dyn TokenProvider>,
    max_wait: Duration,
) -> Router {
    let client = VertexClient::new(Client::new(), "proj", "us-central1", credentials)
        .with_base_url(format!("{}/v1", server.url()));
    let state = AppState::new(
        client,
        Poller::new(Duration::from_millis(10), max_wait),
        TEXT_MODEL,
        IMAGE_MODEL,
    );
    bridge::build_router(state)
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    app.oneshot(Request::get(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

pub async fn post_json(app: Router, uri: &str, body: &Value) -> Response<Body> {
    post_raw(app, uri, body.to_string()).await
}

pub async fn post_raw(app: Router, uri: &str, body: impl Into<String>) -> Response<Body> {
    app.oneshot(
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.into()))
            .unwrap(),
    )
    .await
    .unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
