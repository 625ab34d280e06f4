//! Bearer credential providers.

use crate::error::{VeoError, VeoResult};
use crate::logw;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use tokio::process::Command;

pub const METADATA_TOKEN_URL: &str =
    "http://169.254.169.254/computeMetadata/v1/instance/service-accounts/default/token";
const METADATA_HEADER: &str = "Metadata-Flavor";
const METADATA_HEADER_VALUE: &str = "Google";
pub const TOKEN_ENV_VARS: &[&str] = &["VEO_ACCESS_TOKEN", "GOOGLE_OAUTH_ACCESS_TOKEN"];

#[async_trait]
pub trait TokenProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch_token(&self) -> VeoResult<String>;
}

pub struct StaticToken {
    token: String,
}

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl TokenProvider for StaticToken {
    fn name(&self) -> &str {
        "static"
    }

    async fn fetch_token(&self) -> VeoResult<String> {
        if self.token.trim().is_empty() {
            return Err(VeoError::NoCredential("static token is empty".to_string()));
        }
        Ok(self.token.trim().to_string())
    }
}

pub struct EnvToken {
    vars: Vec<String>,
}

impl EnvToken {
    pub fn new<I, S>(vars: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            vars: vars.into_iter().map(Into::into).collect(),
        }
    }
}

impl Default for EnvToken {
    fn default() -> Self {
        Self::new(TOKEN_ENV_VARS.iter().copied())
    }
}

#[async_trait]
impl TokenProvider for EnvToken {
    fn name(&self) -> &str {
        "environment"
    }

    async fn fetch_token(&self) -> VeoResult<String> {
        for var in &self.vars {
            if let Ok(value) = std::env::var(var) {
                let value = value.trim();
                if !value.is_empty() {
                    return Ok(value.to_string());
                }
            }
        }
        Err(VeoError::NoCredential(format!(
            "none of {} is set",
            self.vars.join(", ")
        )))
    }
}

/// Runs a CLI that prints an access token on stdout,
/// `gcloud auth print-access-token` by default.
pub struct CommandToken {
    program: String,
    args: Vec<String>,
}

impl CommandToken {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    pub fn gcloud(binary: impl Into<String>) -> Self {
        Self::new(
            binary,
            vec!["auth".to_string(), "print-access-token".to_string()],
        )
    }
}

#[async_trait]
impl TokenProvider for CommandToken {
    fn name(&self) -> &str {
        &self.program
    }

    async fn fetch_token(&self) -> VeoResult<String> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .output()
            .await
            .map_err(|e| VeoError::NoCredential(format!("cannot run {}: {e}", self.program)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(VeoError::NoCredential(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if token.is_empty() {
            return Err(VeoError::NoCredential(format!(
                "{} printed no token",
                self.program
            )));
        }
        Ok(token)
    }
}

/// GCE / GKE workload identity metadata server.
pub struct MetadataServerToken {
    http: Client,
    url: String,
}

#[derive(Deserialize)]
struct MetadataTokenResponse {
    access_token: String,
}

impl MetadataServerToken {
    pub fn new(http: Client, url: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
        }
    }
}

#[async_trait]
impl TokenProvider for MetadataServerToken {
    fn name(&self) -> &str {
        "metadata-server"
    }

    async fn fetch_token(&self) -> VeoResult<String> {
        let resp = self
            .http
            .get(&self.url)
            .header(METADATA_HEADER, METADATA_HEADER_VALUE)
            .timeout(std::time::Duration::from_secs(5))
            .send()
            .await
            .map_err(|e| VeoError::NoCredential(format!("metadata server unreachable: {e}")))?;

        if !resp.status().is_success() {
            return Err(VeoError::NoCredential(format!(
                "metadata server HTTP {}",
                resp.status().as_u16()
            )));
        }

        let body: MetadataTokenResponse = resp
            .json()
            .await
            .map_err(|e| VeoError::NoCredential(format!("bad metadata token response: {e}")))?;
        Ok(body.access_token)
    }
}

/// Ordered list of providers; the first success wins.
#[derive(Clone, Default)]
pub struct CredentialChain {
    providers: Vec<Arc<dyn TokenProvider>>,
}

impl CredentialChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, provider: impl TokenProvider + 'static) -> Self {
        self.providers.push(Arc::new(provider));
        self
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

#[async_trait]
impl TokenProvider for CredentialChain {
    fn name(&self) -> &str {
        "chain"
    }

    async fn fetch_token(&self) -> VeoResult<String> {
        let mut failures = Vec::new();
        for provider in &self.providers {
            match provider.fetch_token().await {
                Ok(token) => {
                    tracing::debug!(provider = provider.name(), "credential resolved");
                    return Ok(token);
                }
                Err(err) => {
                    logw(format!("Credential provider {} failed: {}", provider.name(), err));
                    failures.push(format!("{}: {}", provider.name(), err));
                }
            }
        }
        if failures.is_empty() {
            failures.push("no providers configured".to_string());
        }
        Err(VeoError::NoCredential(failures.join("; ")))
    }
}
