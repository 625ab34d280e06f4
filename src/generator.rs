use crate::api::VertexClient;
use crate::config::Config;
use crate::error::VeoResult;
use crate::materialize::{Materialized, Materializer};
use crate::operation::Operation;
use crate::platform;
use crate::poller::{PollOutcome, PollReport, Poller};
use crate::request::GenerationRequest;
use crate::{logi, logok, logw};
use anyhow::{Context, Result};
use reqwest::Client;
use std::time::Duration;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, PartialEq)]
pub enum GenerationOutcome {
    Finished {
        report: PollReport,
        materialized: Materialized,
    },
    /// Still running remotely; resume with `report.operation_name`.
    Pending { report: PollReport },
}

impl GenerationOutcome {
    pub fn report(&self) -> &PollReport {
        match self {
            Self::Finished { report, .. } | Self::Pending { report } => report,
        }
    }
}

#[derive(Clone)]
pub struct VideoGenerator {
    client: VertexClient,
    poller: Poller,
    materializer: Materializer,
}

impl VideoGenerator {
    pub fn new(client: VertexClient, poller: Poller, materializer: Materializer) -> Self {
        Self {
            client,
            poller,
            materializer,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let http = build_http_client()?;
        Ok(Self::new(
            config.vertex_client(http),
            config.poller(),
            config.materializer(),
        ))
    }

    pub fn client(&self) -> &VertexClient {
        &self.client
    }

    pub fn poller(&self) -> &Poller {
        &self.poller
    }

    pub fn materializer(&self) -> &Materializer {
        &self.materializer
    }

    pub async fn submit(
        &self,
        model_id: &str,
        request: &GenerationRequest,
    ) -> VeoResult<Operation> {
        self.client.submit(model_id, request).await
    }

    pub async fn wait(&self, model_id: &str, operation_name: &str) -> VeoResult<PollReport> {
        self.poller.wait(&self.client, model_id, operation_name).await
    }

    pub async fn generate(
        &self,
        model_id: &str,
        request: &GenerationRequest,
    ) -> VeoResult<GenerationOutcome> {
        let operation = self.submit(model_id, request).await?;
        self.resume(model_id, &operation.name, &request.prompt).await
    }

    pub async fn resume(
        &self,
        model_id: &str,
        operation_name: &str,
        prompt: &str,
    ) -> VeoResult<GenerationOutcome> {
        let report = self.wait(model_id, operation_name).await?;
        self.finish(report, prompt).await
    }

    async fn finish(&self, report: PollReport, prompt: &str) -> VeoResult<GenerationOutcome> {
        let materialized = match &report.outcome {
            PollOutcome::TimedOut => return Ok(GenerationOutcome::Pending { report }),
            PollOutcome::Empty { .. } => Materialized::Empty,
            PollOutcome::Succeeded { media, .. } => {
                self.materializer
                    .materialize(media, prompt, Some(&report.operation_name))
                    .await?
            }
        };
        Ok(GenerationOutcome::Finished {
            report,
            materialized,
        })
    }
}

pub fn build_http_client() -> Result<Client> {
    Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .gzip(true)
        .build()
        .context("Failed to build HTTP client")
}

/// CLI entry: submit `request` and wait for it. Returns a process exit code.
pub async fn run_generation(config: &Config, request: GenerationRequest) -> Result<i32> {
    let generator = VideoGenerator::from_config(config)?;
    let model_id = if request.image.is_some() {
        &config.image_model_id
    } else {
        &config.model_id
    };

    logi(format!("Model: {}", model_id));
    logi(format!("Prompt: {}", request.prompt));
    let outcome = generator
        .generate(model_id, &request)
        .await
        .context("Video generation failed")?;
    Ok(report_outcome(config, &outcome, model_id))
}

pub async fn run_resume(config: &Config, operation_name: &str, prompt: &str) -> Result<i32> {
    let generator = VideoGenerator::from_config(config)?;
    let model_id = &config.model_id;

    logi(format!("Resuming {}", operation_name));
    let outcome = generator
        .resume(model_id, operation_name, prompt)
        .await
        .with_context(|| format!("Failed to resume {}", operation_name))?;
    Ok(report_outcome(config, &outcome, model_id))
}

fn report_outcome(config: &Config, outcome: &GenerationOutcome, model_id: &str) -> i32 {
    let report = outcome.report();
    match outcome {
        GenerationOutcome::Finished {
            materialized: Materialized::Saved(artifact),
            ..
        } => {
            logok(format!(
                "Video ready after {}s: {}",
                report.elapsed.as_secs(),
                artifact.path.display()
            ));
            if config.open_after_save {
                platform::open_path(&artifact.path);
            }
            0
        }
        GenerationOutcome::Finished {
            materialized: Materialized::Remote { uri, .. },
            ..
        } => {
            logok(format!("Video written to {}", uri));
            0
        }
        GenerationOutcome::Finished {
            materialized: Materialized::Empty,
            ..
        } => {
            logw("Generation finished but no video data was returned (it may have been filtered)");
            2
        }
        GenerationOutcome::Pending { report } => {
            logw(format!(
                "Still running after {}s. Resume with: veo-cli --model {} --resume {}",
                report.elapsed.as_secs(),
                model_id,
                report.operation_name
            ));
            3
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::StaticToken;
    use mockito::Matcher;
    use serde_json::json;
    use std::sync::Arc;

    fn generator(server: &mockito::ServerGuard, out: &std::path::Path) -> VideoGenerator {
        let client = VertexClient::new(
            Client::new(),
            "proj",
            "us-central1",
            Arc::new(StaticToken::new("tok")),
        )
        .with_base_url(server.url());
        VideoGenerator::new(
            client,
            Poller::new(Duration::from_millis(10), Duration::from_secs(5)),
            Materializer::new(out, "test"),
        )
    }

    #[tokio::test]
    async fn resume_saves_a_finished_operation() {
        let mut server = mockito::Server::new_async().await;
        let _fetch = server
            .mock("POST", Matcher::Regex(":fetchPredictOperation$".into()))
            .with_status(200)
            .with_body(
                json!({
                    "name": "op-5",
                    "done": true,
                    "response": {"videos": [{"bytesBase64Encoded": "AQID"}]}
                })
                .to_string(),
            )
            .create_async()
            .await;
        let tmp = tempfile::tempdir().unwrap();

        let outcome = generator(&server, tmp.path())
            .resume("veo-3.0-generate-001", "op-5", "resumed")
            .await
            .unwrap();
        let GenerationOutcome::Finished {
            materialized: Materialized::Saved(artifact),
            report,
        } = outcome
        else {
            panic!("expected a saved video");
        };
        assert_eq!(report.poll_count, 1);
        assert_eq!(std::fs::read(artifact.path).unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn empty_result_is_finished_without_a_file() {
        let mut server = mockito::Server::new_async().await;
        let _fetch = server
            .mock("POST", Matcher::Regex(":fetchPredictOperation$".into()))
            .with_status(200)
            .with_body(r#"{"done":true,"response":{"videos":[]}}"#)
            .create_async()
            .await;
        let tmp = tempfile::tempdir().unwrap();
        let out = tmp.path().join("out");

        let outcome = generator(&server, &out)
            .resume("veo-3.0-generate-001", "op-6", "p")
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            GenerationOutcome::Finished {
                materialized: Materialized::Empty,
                ..
            }
        ));
        assert!(!out.exists());
    }
}
