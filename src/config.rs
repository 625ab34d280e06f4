use crate::api::VertexClient;
use crate::auth::{
    CommandToken, CredentialChain, EnvToken, METADATA_TOKEN_URL, MetadataServerToken, StaticToken,
};
use crate::materialize::{DEFAULT_PREFIX, Materializer};
use crate::models::{DEFAULT_IMAGE_MODEL, DEFAULT_TEXT_MODEL};
use crate::poller::Poller;
use anyhow::{Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub project_id: String,
    #[serde(default = "default_location")]
    pub location: String,
    #[serde(default = "default_model_id")]
    pub model_id: String,
    #[serde(default = "default_image_model_id")]
    pub image_model_id: String,
    /// Overrides `https://{location}-aiplatform.googleapis.com/v1`.
    #[serde(default)]
    pub api_base_url: Option<String>,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_prefix")]
    pub filename_prefix: String,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_max_wait")]
    pub max_wait_secs: u64,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default = "default_metadata_url")]
    pub metadata_token_url: String,
    #[serde(default = "default_gcloud")]
    pub gcloud_binary: String,
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default)]
    pub open_after_save: bool,
}

fn default_location() -> String {
    "us-central1".to_string()
}

fn default_model_id() -> String {
    DEFAULT_TEXT_MODEL.to_string()
}

fn default_image_model_id() -> String {
    DEFAULT_IMAGE_MODEL.to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("generated_videos")
}

fn default_prefix() -> String {
    DEFAULT_PREFIX.to_string()
}

fn default_poll_interval() -> u64 {
    10
}

fn default_max_wait() -> u64 {
    300
}

fn default_metadata_url() -> String {
    METADATA_TOKEN_URL.to_string()
}

fn default_gcloud() -> String {
    "gcloud".to_string()
}

fn default_bind_addr() -> String {
    "127.0.0.1:8080".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            project_id: String::new(),
            location: default_location(),
            model_id: default_model_id(),
            image_model_id: default_image_model_id(),
            api_base_url: None,
            output_dir: default_output_dir(),
            filename_prefix: default_prefix(),
            poll_interval_secs: default_poll_interval(),
            max_wait_secs: default_max_wait(),
            access_token: None,
            metadata_token_url: default_metadata_url(),
            gcloud_binary: default_gcloud(),
            bind_addr: default_bind_addr(),
            open_after_save: false,
        }
    }
}

impl Config {
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read config: {}", path.as_ref().display()))?;
        let mut config: Config = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config: {}", path.as_ref().display()))?;

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Like [`Config::load`], but a missing file falls back to defaults
    /// plus environment.
    pub async fn load_or_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        if fs::metadata(&path).await.is_ok() {
            return Self::load(path).await;
        }
        Self::from_env()
    }

    pub fn from_env() -> Result<Self> {
        let mut config = Config::default();
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(v) = get("VEO_PROJECT_ID") {
            self.project_id = v;
        }
        if let Some(v) = get("VEO_LOCATION") {
            self.location = v;
        }
        if let Some(v) = get("VEO_MODEL_ID") {
            self.model_id = v;
        }
        if let Some(v) = get("VEO_IMAGE_MODEL_ID") {
            self.image_model_id = v;
        }
        if let Some(v) = get("VEO_API_BASE_URL") {
            self.api_base_url = Some(v);
        }
        if let Some(v) = get("VEO_OUTPUT_DIR") {
            self.output_dir = PathBuf::from(v);
        }
        if let Some(v) = get("VEO_BIND_ADDR") {
            self.bind_addr = v;
        }
        if let Some(v) = get("VEO_ACCESS_TOKEN") {
            self.access_token = Some(v);
        }
        if let Some(v) = get("VEO_POLL_INTERVAL_SECS").and_then(|v| v.parse().ok()) {
            self.poll_interval_secs = v;
        }
        if let Some(v) = get("VEO_MAX_WAIT_SECS").and_then(|v| v.parse().ok()) {
            self.max_wait_secs = v;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.project_id.trim().is_empty() {
            anyhow::bail!("config: project_id missing (set it in config.json or VEO_PROJECT_ID)");
        }
        if self.location.trim().is_empty() {
            anyhow::bail!("config: location missing");
        }
        if self.poll_interval_secs == 0 {
            anyhow::bail!("config: poll_interval_secs must be at least 1");
        }
        Ok(())
    }

    pub fn poller(&self) -> Poller {
        Poller::new(
            Duration::from_secs(self.poll_interval_secs),
            Duration::from_secs(self.max_wait_secs),
        )
    }

    pub fn materializer(&self) -> Materializer {
        Materializer::new(&self.output_dir, &self.filename_prefix)
    }

    /// Static token, environment, gcloud, then the metadata server.
    pub fn credential_chain(&self, http: &Client) -> CredentialChain {
        let mut chain = CredentialChain::new();
        if let Some(token) = self.access_token.as_deref().filter(|t| !t.trim().is_empty()) {
            chain = chain.with(StaticToken::new(token));
        }
        chain
            .with(EnvToken::default())
            .with(CommandToken::gcloud(&self.gcloud_binary))
            .with(MetadataServerToken::new(
                http.clone(),
                &self.metadata_token_url,
            ))
    }

    pub fn vertex_client(&self, http: Client) -> VertexClient {
        let credentials = Arc::new(self.credential_chain(&http));
        let client = VertexClient::new(http, &self.project_id, &self.location, credentials);
        match &self.api_base_url {
            Some(base) => client.with_base_url(base),
            None => client,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[tokio::test]
    async fn load_applies_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.json");
        std::fs::write(&path, r#"{"project_id": "my-proj", "max_wait_secs": 60}"#).unwrap();

        let config = Config::load(&path).await.unwrap();
        assert_eq!(config.project_id, "my-proj");
        assert_eq!(config.location, "us-central1");
        assert_eq!(config.model_id, DEFAULT_TEXT_MODEL);
        assert_eq!(config.max_wait_secs, 60);
        assert_eq!(config.poller().interval(), Duration::from_secs(10));
    }

    #[tokio::test]
    async fn load_reports_the_missing_file() {
        let err = Config::load("/definitely/not/here/config.json").await.unwrap_err();
        assert!(err.to_string().contains("Failed to read config"));
    }

    #[test]
    fn overrides_replace_file_values() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("VEO_PROJECT_ID", "env-proj"),
            ("VEO_LOCATION", "europe-west4"),
            ("VEO_MAX_WAIT_SECS", "45"),
            ("VEO_POLL_INTERVAL_SECS", "not a number"),
            ("VEO_MODEL_ID", "  "),
        ]);
        let mut config = Config {
            project_id: "file-proj".into(),
            ..Config::default()
        };
        config.apply_overrides(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.project_id, "env-proj");
        assert_eq!(config.location, "europe-west4");
        assert_eq!(config.max_wait_secs, 45);
        assert_eq!(config.poll_interval_secs, 10);
        assert_eq!(config.model_id, DEFAULT_TEXT_MODEL);
    }

    #[test]
    fn missing_project_is_rejected() {
        let err = Config::default().validate().unwrap_err();
        assert!(err.to_string().contains("project_id"));
    }

    #[test]
    fn chain_puts_the_configured_token_first() {
        let http = Client::new();
        let mut config = Config::default();
        assert_eq!(config.credential_chain(&http).len(), 3);
        config.access_token = Some("tok".into());
        assert_eq!(config.credential_chain(&http).len(), 4);
    }
}
