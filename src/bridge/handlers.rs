use super::AppState;
use super::error::{ApiError, ApiResult};
use super::extract::{ApiJson, ApiQuery};
use crate::operation::OperationError;
use crate::poller::{PollOutcome, PollReport};
use crate::request::{AspectRatio, GenerationRequest, Resolution, SourceImage};
use axum::Json;
use axum::extract::{Path, State};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_TEXT_DURATION: u32 = 6;
pub const DEFAULT_IMAGE_DURATION: u32 = 8;
pub const DEFAULT_IMAGE_PROMPT: &str =
    "Animate the scene in the image with natural, gentle motion";
const MAX_DURATION: u32 = 60;
const EMPTY_RESULT_ERROR: &str = "generation finished but no video data was found";

fn default_text_duration() -> u32 {
    DEFAULT_TEXT_DURATION
}

fn default_image_duration() -> u32 {
    DEFAULT_IMAGE_DURATION
}

fn default_aspect_ratio() -> String {
    "16:9".to_string()
}

fn default_sample_count() -> u8 {
    1
}

fn default_true() -> bool {
    true
}

fn default_resolution() -> String {
    "720p".to_string()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobOptions {
    #[serde(default = "default_aspect_ratio")]
    pub aspect_ratio: String,
    #[serde(default = "default_sample_count")]
    pub sample_count: u8,
    #[serde(default = "default_true")]
    pub generate_audio: bool,
    #[serde(default = "default_resolution")]
    pub resolution: String,
    #[serde(default)]
    pub storage_uri: Option<String>,
    #[serde(default)]
    pub negative_prompt: Option<String>,
    #[serde(default)]
    pub seed: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateBody {
    pub prompt: String,
    #[serde(default = "default_text_duration")]
    pub duration_seconds: u32,
    #[serde(flatten)]
    pub options: JobOptions,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageTextBody {
    #[serde(default)]
    pub prompt: String,
    pub image_base64: String,
    pub image_mime_type: String,
    #[serde(default = "default_image_duration")]
    pub duration_seconds: u32,
    #[serde(flatten)]
    pub options: JobOptions,
}

#[derive(Debug, Deserialize)]
pub struct NameQuery {
    pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollBody {
    pub operation_name: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub ok: bool,
    pub operation_name: String,
}

#[derive(Debug, Serialize)]
pub struct PollResponse {
    pub ok: bool,
    pub done: bool,
    pub response: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<OperationError>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WaitResponse {
    pub ok: bool,
    pub done: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,
    pub operation_name: String,
    pub elapsed_seconds: u64,
    pub poll_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<bool>,
}

impl From<PollReport> for WaitResponse {
    fn from(report: PollReport) -> Self {
        let elapsed_seconds = report.elapsed.as_secs();
        let (ok, done, response, error, timeout) = match report.outcome {
            PollOutcome::Succeeded { operation, .. } => {
                (true, true, operation.response, None, None)
            }
            PollOutcome::Empty { operation } => {
                let error = operation
                    .error
                    .and_then(|e| e.message)
                    .map(|m| format!("{EMPTY_RESULT_ERROR}: {m}"))
                    .unwrap_or_else(|| EMPTY_RESULT_ERROR.to_string());
                (
                    false,
                    true,
                    Some(operation.response.unwrap_or_else(|| Value::Object(Default::default()))),
                    Some(error),
                    None,
                )
            }
            PollOutcome::TimedOut => (true, false, None, None, Some(true)),
        };
        Self {
            ok,
            done,
            response,
            operation_name: report.operation_name,
            elapsed_seconds,
            poll_count: report.poll_count,
            error,
            timeout,
        }
    }
}

fn bad_request(msg: impl Into<String>) -> ApiError {
    ApiError::BadRequest(msg.into())
}

fn build_request(
    prompt: String,
    image: Option<SourceImage>,
    duration_seconds: u32,
    options: JobOptions,
) -> ApiResult<GenerationRequest> {
    if !(1..=MAX_DURATION).contains(&duration_seconds) {
        return Err(bad_request(format!(
            "durationSeconds must be between 1 and {MAX_DURATION}"
        )));
    }
    let aspect_ratio: AspectRatio = options.aspect_ratio.parse()?;
    let resolution: Resolution = options.resolution.parse()?;

    let mut request = match image {
        Some(image) => GenerationRequest::image(prompt, image),
        None => GenerationRequest::text(prompt),
    }
    .with_duration(duration_seconds)
    .with_aspect_ratio(aspect_ratio);
    request.sample_count = options.sample_count;
    request.generate_audio = options.generate_audio;
    request.resolution = resolution;
    request.storage_uri = options.storage_uri;
    request.negative_prompt = options.negative_prompt;
    request.seed = options.seed;
    Ok(request)
}

fn text_request(body: GenerateBody) -> ApiResult<GenerationRequest> {
    if body.prompt.trim().is_empty() {
        return Err(bad_request("prompt must not be empty"));
    }
    build_request(body.prompt, None, body.duration_seconds, body.options)
}

fn image_request(body: ImageTextBody) -> ApiResult<GenerationRequest> {
    if body.image_mime_type != "image/jpeg" && body.image_mime_type != "image/png" {
        return Err(bad_request("imageMimeType must be image/jpeg or image/png"));
    }
    let bytes = STANDARD
        .decode(body.image_base64.trim())
        .map_err(|e| bad_request(format!("imageBase64 is not valid base64: {e}")))?;
    let prompt = if body.prompt.trim().is_empty() {
        DEFAULT_IMAGE_PROMPT.to_string()
    } else {
        body.prompt
    };
    build_request(
        prompt,
        Some(SourceImage::new(bytes, body.image_mime_type)),
        body.duration_seconds,
        body.options,
    )
}

/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// POST /api/veo/generate
pub async fn generate(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<GenerateBody>,
) -> ApiResult<Json<SubmitResponse>> {
    let request = text_request(body)?;
    let operation = state.client.submit(&state.model_id, &request).await?;
    Ok(Json(SubmitResponse {
        ok: true,
        operation_name: operation.name,
    }))
}

async fn poll_once(state: &AppState, name: &str) -> ApiResult<Json<PollResponse>> {
    let name = name.trim();
    if name.is_empty() {
        return Err(bad_request("operation name must not be empty"));
    }
    let operation = state.client.fetch_operation(&state.model_id, name).await?;
    Ok(Json(PollResponse {
        ok: true,
        done: operation.done,
        response: operation.response,
        error: operation.error,
    }))
}

/// GET /api/veo/operations/{*name}
pub async fn poll_path(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Json<PollResponse>> {
    poll_once(&state, &name).await
}

/// GET /api/veo/operations?name=...
pub async fn poll_query(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<NameQuery>,
) -> ApiResult<Json<PollResponse>> {
    poll_once(&state, &query.name).await
}

/// POST /api/veo/operations
pub async fn poll_body(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<PollBody>,
) -> ApiResult<Json<PollResponse>> {
    poll_once(&state, &body.operation_name).await
}

async fn submit_and_wait(
    state: &AppState,
    model_id: &str,
    request: &GenerationRequest,
) -> ApiResult<Json<WaitResponse>> {
    let operation = state.client.submit(model_id, request).await?;
    let report = state
        .poller
        .wait(&state.client, model_id, &operation.name)
        .await?;
    Ok(Json(WaitResponse::from(report)))
}

/// POST /api/veo/generate/wait
pub async fn generate_and_wait(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<GenerateBody>,
) -> ApiResult<Json<WaitResponse>> {
    let request = text_request(body)?;
    submit_and_wait(&state, &state.model_id, &request).await
}

/// POST /api/veo/generate/image-text/wait
pub async fn generate_image_text_and_wait(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<ImageTextBody>,
) -> ApiResult<Json<WaitResponse>> {
    let request = image_request(body)?;
    submit_and_wait(&state, &state.image_model_id, &request).await
}
