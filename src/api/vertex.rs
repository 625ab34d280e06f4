use crate::auth::TokenProvider;
use crate::error::{VeoError, VeoResult};
use crate::logi;
use crate::operation::Operation;
use crate::poller::OperationSource;
use crate::request::{self, GenerationRequest};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const BODY_SNIPPET_CHARS: usize = 800;

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Clone)]
pub struct VertexClient {
    http: Client,
    base_url: String,
    project_id: String,
    location: String,
    credentials: Arc<dyn TokenProvider>,
    request_timeout: Duration,
}

impl VertexClient {
    pub fn new(
        http: Client,
        project_id: impl Into<String>,
        location: impl Into<String>,
        credentials: Arc<dyn TokenProvider>,
    ) -> Self {
        let location = location.into();
        Self {
            http,
            base_url: Self::default_base_url(&location),
            project_id: project_id.into(),
            location,
            credentials,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn default_base_url(location: &str) -> String {
        format!("https://{location}-aiplatform.googleapis.com/v1")
    }

    /// Points the client at another API root (regional proxy, test server).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    fn model_url(&self, model_id: &str, method: &str) -> String {
        format!(
            "{}/projects/{}/locations/{}/publishers/google/models/{}:{}",
            self.base_url, self.project_id, self.location, model_id, method
        )
    }

    async fn post_json(
        &self,
        url: String,
        body: &impl serde::Serialize,
    ) -> VeoResult<reqwest::Response> {
        let token = self.credentials.fetch_token().await?;
        let resp = self
            .http
            .post(url)
            .bearer_auth(token)
            .json(body)
            .timeout(self.request_timeout)
            .send()
            .await?;
        Ok(resp)
    }

    /// Starts a generation job. The returned operation is never done.
    pub async fn submit(
        &self,
        model_id: &str,
        request: &GenerationRequest,
    ) -> VeoResult<Operation> {
        let payload = request::build_payload(request, model_id)?;
        tracing::debug!(
            model = model_id,
            duration = payload.parameters.duration_seconds,
            aspect_ratio = %payload.parameters.aspect_ratio,
            has_image = request.image.is_some(),
            "submitting generation request"
        );

        let resp = self
            .post_json(self.model_url(model_id, "predictLongRunning"), &payload)
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            tracing::warn!(
                model = model_id,
                status = status.as_u16(),
                body = %snippet(&body),
                "submission rejected"
            );
            return Err(VeoError::Submission {
                status: status.as_u16(),
                body,
            });
        }

        let raw = resp.text().await?;
        let parsed: SubmitResponse = serde_json::from_str(&raw)
            .map_err(|e| VeoError::UnexpectedResponse(format!("submission body: {e}")))?;
        let name = parsed
            .name
            .filter(|n| !n.is_empty())
            .ok_or_else(|| {
                VeoError::UnexpectedResponse(format!(
                    "submission body has no operation name: {}",
                    snippet(&raw)
                ))
            })?;

        logi(format!("Submitted {} job: {}", model_id, name));
        Ok(Operation::pending(name))
    }

    pub async fn fetch_operation(
        &self,
        model_id: &str,
        operation_name: &str,
    ) -> VeoResult<Operation> {
        let resp = self
            .post_json(
                self.model_url(model_id, "fetchPredictOperation"),
                &json!({ "operationName": operation_name }),
            )
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(VeoError::Poll {
                operation: operation_name.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        let raw = resp.text().await?;
        let mut operation: Operation = serde_json::from_str(&raw)
            .map_err(|e| VeoError::UnexpectedResponse(format!("operation body: {e}")))?;
        if operation.name.is_empty() {
            operation.name = operation_name.to_string();
        }
        Ok(operation)
    }
}

#[async_trait]
impl OperationSource for VertexClient {
    async fn fetch_operation(&self, model_id: &str, operation_name: &str) -> VeoResult<Operation> {
        VertexClient::fetch_operation(self, model_id, operation_name).await
    }
}

fn snippet(body: &str) -> String {
    body.chars().take(BODY_SNIPPET_CHARS).collect()
}
