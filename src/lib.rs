pub mod api;
pub mod auth;
pub mod bridge;
pub mod config;
pub mod error;
pub mod generator;
pub mod init;
pub mod materialize;
pub mod models;
pub mod operation;
pub mod platform;
pub mod poller;
pub mod request;

pub use api::VertexClient;
pub use auth::{CredentialChain, TokenProvider};
pub use error::{VeoError, VeoResult};
pub use generator::{GenerationOutcome, VideoGenerator};
pub use materialize::{Materialized, Materializer, PersistedArtifact};
pub use operation::Operation;
pub use poller::{PollOutcome, PollReport, Poller};
pub use request::GenerationRequest;

pub(crate) fn logv(tag: &str, message: &str) {
    match tag {
        "WARN" => tracing::warn!(tag, "{}", message),
        _ => tracing::info!(tag, "{}", message),
    }
}

pub(crate) fn logi(message: impl AsRef<str>) {
    logv("INFO", message.as_ref());
}

pub(crate) fn logok(message: impl AsRef<str>) {
    logv("OK", message.as_ref());
}

pub(crate) fn logw(message: impl AsRef<str>) {
    logv("WARN", message.as_ref());
}
