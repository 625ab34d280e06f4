use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum VeoError {
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("submission rejected ({status}): {body}")]
    Submission { status: u16, body: String },

    #[error("status check for {operation} failed ({status}): {body}")]
    Poll {
        operation: String,
        status: u16,
        body: String,
    },

    #[error("media payload is not valid base64: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no credential available: {0}")]
    NoCredential(String),

    #[error("invalid generation request: {0}")]
    InvalidRequest(String),

    /// A 2xx body that does not have the expected shape.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
}

pub type VeoResult<T> = Result<T, VeoError>;

impl VeoError {
    pub(crate) fn write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Write {
            path: path.into(),
            source,
        }
    }

    pub fn remote_status(&self) -> Option<u16> {
        match self {
            Self::Submission { status, .. } | Self::Poll { status, .. } => Some(*status),
            _ => None,
        }
    }
}
