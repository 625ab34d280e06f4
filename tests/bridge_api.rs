mod common;

use axum::http::StatusCode;
use common::{
    IMAGE_MODEL, TEXT_MODEL, body_json, build_test_app, get, model_path, post_json, post_raw,
};
use mockito::Matcher;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use veo_bridge::auth::StaticToken;

const WAIT: Duration = Duration::from_secs(5);

fn done_with_video() -> String {
    json!({
        "name": "op-1",
        "done": true,
        "response": {"videos": [{"bytesBase64Encoded": "AAAA", "mimeType": "video/mp4"}]}
    })
    .to_string()
}

#[tokio::test]
async fn health_reports_ok() {
    let server = mockito::Server::new_async().await;
    let response = get(build_test_app(&server, WAIT), "/health").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn generate_returns_the_operation_name() {
    let mut server = mockito::Server::new_async().await;
    let submit = server
        .mock("POST", model_path(TEXT_MODEL, "predictLongRunning").as_str())
        .match_body(Matcher::PartialJson(json!({
            "instances": [{"prompt": "a lighthouse at dusk"}],
            "parameters": {"durationSeconds": 6, "aspectRatio": "16:9", "resolution": "720p"}
        })))
        .with_status(200)
        .with_body(r#"{"name":"projects/proj/locations/us-central1/operations/op-1"}"#)
        .expect(1)
        .create_async()
        .await;

    let response = post_json(
        build_test_app(&server, WAIT),
        "/api/veo/generate",
        &json!({"prompt": "a lighthouse at dusk"}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["ok"], true);
    assert_eq!(
        body["operationName"],
        "projects/proj/locations/us-central1/operations/op-1"
    );
    submit.assert_async().await;
}

#[tokio::test]
async fn empty_prompt_is_rejected_before_any_upstream_call() {
    let mut server = mockito::Server::new_async().await;
    let submit = server
        .mock("POST", Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let response = post_json(
        build_test_app(&server, WAIT),
        "/api/veo/generate",
        &json!({"prompt": "   "}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["ok"], false);
    submit.assert_async().await;
}

#[tokio::test]
async fn malformed_bodies_get_the_json_error_shape() {
    let mut server = mockito::Server::new_async().await;
    let upstream = server
        .mock("POST", Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let cases = [
        ("/api/veo/generate", "{}".to_string()),
        ("/api/veo/generate", json!({"prompt": "x", "sampleCount": 300}).to_string()),
        ("/api/veo/generate/wait", "{\"prompt\": ".to_string()),
        ("/api/veo/operations", json!({"name": "op-1"}).to_string()),
        ("/api/veo/generate/image-text/wait", "[]".to_string()),
    ];
    for (uri, raw) in cases {
        let response = post_raw(build_test_app(&server, WAIT), uri, raw.clone()).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri} {raw}");
        let body = body_json(response).await;
        assert_eq!(body["ok"], false, "{uri} {raw}");
        assert!(body["error"].as_str().is_some_and(|e| !e.is_empty()));
    }
    upstream.assert_async().await;
}

#[tokio::test]
async fn poll_query_without_a_name_gets_the_json_error_shape() {
    let server = mockito::Server::new_async().await;
    let response = get(build_test_app(&server, WAIT), "/api/veo/operations").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["ok"], false);
}

#[tokio::test]
async fn unsupported_duration_is_a_bad_request() {
    let server = mockito::Server::new_async().await;
    let response = post_json(
        build_test_app(&server, WAIT),
        "/api/veo/generate",
        &json!({"prompt": "waves", "durationSeconds": 7}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(body["error"].as_str().unwrap().contains("4, 6, 8"));
}

#[tokio::test]
async fn upstream_rejection_keeps_status_and_body() {
    let mut server = mockito::Server::new_async().await;
    let _submit = server
        .mock("POST", model_path(TEXT_MODEL, "predictLongRunning").as_str())
        .with_status(429)
        .with_body("RESOURCE_EXHAUSTED")
        .create_async()
        .await;

    let response = post_json(
        build_test_app(&server, WAIT),
        "/api/veo/generate",
        &json!({"prompt": "waves"}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body = body_json(response).await;
    assert_eq!(body["ok"], false);
    assert_eq!(body["status"], 429);
    assert_eq!(body["error"], "RESOURCE_EXHAUSTED");
}

#[tokio::test]
async fn missing_credential_is_service_unavailable() {
    let server = mockito::Server::new_async().await;
    let app = common::build_test_app_with(&server, Arc::new(StaticToken::new("")), WAIT);
    let response = post_json(app, "/api/veo/generate", &json!({"prompt": "waves"})).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn operations_can_be_polled_three_ways() {
    let mut server = mockito::Server::new_async().await;
    let name = "projects/proj/locations/us-central1/operations/op-1";
    let fetch = server
        .mock("POST", model_path(TEXT_MODEL, "fetchPredictOperation").as_str())
        .match_body(Matcher::Json(json!({"operationName": name})))
        .with_status(200)
        .with_body(r#"{"done": false}"#)
        .expect(3)
        .create_async()
        .await;

    let by_path = get(
        build_test_app(&server, WAIT),
        &format!("/api/veo/operations/{name}"),
    )
    .await;
    let by_query = get(
        build_test_app(&server, WAIT),
        &format!("/api/veo/operations?name={name}"),
    )
    .await;
    let by_body = post_json(
        build_test_app(&server, WAIT),
        "/api/veo/operations",
        &json!({"operationName": name}),
    )
    .await;

    for response in [by_path, by_query, by_body] {
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["ok"], true);
        assert_eq!(body["done"], false);
        assert!(body["response"].is_null());
    }
    fetch.assert_async().await;
}

#[tokio::test]
async fn poll_failure_names_the_operation() {
    let mut server = mockito::Server::new_async().await;
    let _fetch = server
        .mock("POST", model_path(TEXT_MODEL, "fetchPredictOperation").as_str())
        .with_status(404)
        .with_body("NOT_FOUND")
        .create_async()
        .await;

    let response = post_json(
        build_test_app(&server, WAIT),
        "/api/veo/operations",
        &json!({"operationName": "op-gone"}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body = body_json(response).await;
    assert_eq!(body["status"], 404);
    assert_eq!(body["operationName"], "op-gone");
}

#[tokio::test]
async fn generate_and_wait_returns_the_finished_response() {
    let mut server = mockito::Server::new_async().await;
    let _submit = server
        .mock("POST", model_path(TEXT_MODEL, "predictLongRunning").as_str())
        .with_status(200)
        .with_body(r#"{"name":"op-1"}"#)
        .create_async()
        .await;
    let _fetch = server
        .mock("POST", model_path(TEXT_MODEL, "fetchPredictOperation").as_str())
        .with_status(200)
        .with_body(done_with_video())
        .create_async()
        .await;

    let response = post_json(
        build_test_app(&server, WAIT),
        "/api/veo/generate/wait",
        &json!({"prompt": "waves", "durationSeconds": 8}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["ok"], true);
    assert_eq!(body["done"], true);
    assert_eq!(body["operationName"], "op-1");
    assert_eq!(body["pollCount"], 1);
    assert_eq!(body["response"]["videos"][0]["bytesBase64Encoded"], "AAAA");
    assert!(body.get("timeout").is_none());
}

#[tokio::test]
async fn done_without_video_is_reported_as_not_ok() {
    let mut server = mockito::Server::new_async().await;
    let _submit = server
        .mock("POST", model_path(TEXT_MODEL, "predictLongRunning").as_str())
        .with_status(200)
        .with_body(r#"{"name":"op-2"}"#)
        .create_async()
        .await;
    let _fetch = server
        .mock("POST", model_path(TEXT_MODEL, "fetchPredictOperation").as_str())
        .with_status(200)
        .with_body(r#"{"done": true, "response": {"videos": [], "raiMediaFilteredCount": 1}}"#)
        .create_async()
        .await;

    let response = post_json(
        build_test_app(&server, WAIT),
        "/api/veo/generate/wait",
        &json!({"prompt": "waves"}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["ok"], false);
    assert_eq!(body["done"], true);
    assert_eq!(body["operationName"], "op-2");
    assert_eq!(body["response"]["raiMediaFilteredCount"], 1);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn wait_budget_exhausted_returns_a_resumable_timeout() {
    let mut server = mockito::Server::new_async().await;
    let _submit = server
        .mock("POST", model_path(TEXT_MODEL, "predictLongRunning").as_str())
        .with_status(200)
        .with_body(r#"{"name":"op-slow"}"#)
        .create_async()
        .await;
    let _fetch = server
        .mock("POST", model_path(TEXT_MODEL, "fetchPredictOperation").as_str())
        .with_status(200)
        .with_body(r#"{"done": false}"#)
        .create_async()
        .await;

    let response = post_json(
        build_test_app(&server, Duration::ZERO),
        "/api/veo/generate/wait",
        &json!({"prompt": "waves"}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["ok"], true);
    assert_eq!(body["done"], false);
    assert_eq!(body["timeout"], true);
    assert_eq!(body["operationName"], "op-slow");
    assert_eq!(body["pollCount"], 1);
}

#[tokio::test]
async fn image_job_uses_the_image_model() {
    let mut server = mockito::Server::new_async().await;
    let submit = server
        .mock("POST", model_path(IMAGE_MODEL, "predictLongRunning").as_str())
        .match_body(Matcher::PartialJson(json!({
            "instances": [{"image": {"bytesBase64Encoded": "AQID", "mimeType": "image/png"}}],
            "parameters": {"durationSeconds": 8}
        })))
        .with_status(200)
        .with_body(r#"{"name":"op-img"}"#)
        .expect(1)
        .create_async()
        .await;
    let _fetch = server
        .mock("POST", model_path(IMAGE_MODEL, "fetchPredictOperation").as_str())
        .with_status(200)
        .with_body(done_with_video())
        .create_async()
        .await;

    let response = post_json(
        build_test_app(&server, WAIT),
        "/api/veo/generate/image-text/wait",
        &json!({"imageBase64": "AQID", "imageMimeType": "image/png"}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["ok"], true);
    assert_eq!(body["operationName"], "op-img");
    submit.assert_async().await;
}

#[tokio::test]
async fn image_job_rejects_other_mime_types() {
    let server = mockito::Server::new_async().await;
    let response = post_json(
        build_test_app(&server, WAIT),
        "/api/veo/generate/image-text/wait",
        &json!({"imageBase64": "AQID", "imageMimeType": "image/gif"}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
