use crate::error::{VeoError, VeoResult};
use crate::models::{self, ModelCapability};
use base64::Engine;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

pub const MAX_PROMPT_CHARS: usize = 2000;
pub const MAX_SAMPLE_COUNT: u8 = 2;

static ASPECT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*(\d+)\s*:\s*(\d+)\s*$").unwrap());

/// Still image used as the first frame of an image-to-video job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceImage {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl SourceImage {
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes,
            mime_type: mime_type.into(),
        }
    }

    /// Reads an image file, taking the MIME type from its extension.
    pub async fn from_path(path: &Path) -> VeoResult<Self> {
        let mime_type = mime_for_image_path(path).ok_or_else(|| {
            VeoError::InvalidRequest(format!("unsupported image format: {}", path.display()))
        })?;
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            VeoError::InvalidRequest(format!("cannot read image {}: {e}", path.display()))
        })?;
        Ok(Self::new(bytes, mime_type))
    }
}

fn mime_for_image_path(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AspectRatio {
    pub width: u32,
    pub height: u32,
}

impl AspectRatio {
    pub const LANDSCAPE: AspectRatio = AspectRatio {
        width: 16,
        height: 9,
    };
    pub const PORTRAIT: AspectRatio = AspectRatio {
        width: 9,
        height: 16,
    };
}

impl Default for AspectRatio {
    fn default() -> Self {
        Self::LANDSCAPE
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.width, self.height)
    }
}

impl FromStr for AspectRatio {
    type Err = VeoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid =
            || VeoError::InvalidRequest(format!("aspect ratio must look like 16:9, got {s:?}"));
        let caps = ASPECT_RE.captures(s).ok_or_else(invalid)?;
        let width: u32 = caps[1].parse().map_err(|_| invalid())?;
        let height: u32 = caps[2].parse().map_err(|_| invalid())?;
        if width == 0 || height == 0 {
            return Err(invalid());
        }
        Ok(Self { width, height })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Resolution {
    #[serde(rename = "480p")]
    P480,
    #[default]
    #[serde(rename = "720p")]
    P720,
    #[serde(rename = "1080p")]
    P1080,
}

impl FromStr for Resolution {
    type Err = VeoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "480p" => Ok(Resolution::P480),
            "720p" => Ok(Resolution::P720),
            "1080p" => Ok(Resolution::P1080),
            other => Err(VeoError::InvalidRequest(format!(
                "resolution must be 480p, 720p or 1080p, got {other:?}"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub image: Option<SourceImage>,
    /// `None` uses the model's default duration.
    pub duration_seconds: Option<u32>,
    pub aspect_ratio: AspectRatio,
    pub sample_count: u8,
    pub generate_audio: bool,
    pub resolution: Resolution,
    pub storage_uri: Option<String>,
    pub negative_prompt: Option<String>,
    pub enhance_prompt: Option<bool>,
    pub person_generation: Option<String>,
    pub seed: Option<u32>,
}

impl GenerationRequest {
    pub fn text(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            image: None,
            duration_seconds: None,
            aspect_ratio: AspectRatio::default(),
            sample_count: 1,
            generate_audio: true,
            resolution: Resolution::default(),
            storage_uri: None,
            negative_prompt: None,
            enhance_prompt: None,
            person_generation: None,
            seed: None,
        }
    }

    pub fn image(prompt: impl Into<String>, image: SourceImage) -> Self {
        Self {
            image: Some(image),
            ..Self::text(prompt)
        }
    }

    pub fn with_duration(mut self, seconds: u32) -> Self {
        self.duration_seconds = Some(seconds);
        self
    }

    pub fn with_aspect_ratio(mut self, ratio: AspectRatio) -> Self {
        self.aspect_ratio = ratio;
        self
    }

    pub fn with_storage_uri(mut self, uri: impl Into<String>) -> Self {
        self.storage_uri = Some(uri.into());
        self
    }

    /// Checks the request against `cap` and returns the effective duration.
    pub fn validate(&self, cap: &ModelCapability) -> VeoResult<u32> {
        if self.prompt.trim().is_empty() && self.image.is_none() {
            return Err(VeoError::InvalidRequest(
                "a prompt or a source image is required".to_string(),
            ));
        }
        if self.prompt.chars().count() > MAX_PROMPT_CHARS {
            return Err(VeoError::InvalidRequest(format!(
                "prompt exceeds {MAX_PROMPT_CHARS} characters"
            )));
        }
        if let Some(image) = &self.image {
            if image.bytes.is_empty() {
                return Err(VeoError::InvalidRequest("source image is empty".to_string()));
            }
            if image.mime_type != "image/png" && image.mime_type != "image/jpeg" {
                return Err(VeoError::InvalidRequest(format!(
                    "source image must be image/png or image/jpeg, got {}",
                    image.mime_type
                )));
            }
        }

        let duration = self.duration_seconds.unwrap_or(cap.default_duration);
        if !cap.durations.contains(duration) {
            return Err(VeoError::InvalidRequest(format!(
                "{} supports durations {} seconds, got {duration}",
                cap.display_name,
                cap.durations.describe()
            )));
        }

        if self.sample_count == 0 || self.sample_count > MAX_SAMPLE_COUNT {
            return Err(VeoError::InvalidRequest(format!(
                "sample count must be between 1 and {MAX_SAMPLE_COUNT}"
            )));
        }
        if let Some(uri) = &self.storage_uri {
            if !uri.starts_with("gs://") || uri.len() <= "gs://".len() {
                return Err(VeoError::InvalidRequest(format!(
                    "storage uri must be a gs:// path, got {uri:?}"
                )));
            }
        }
        Ok(duration)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PredictPayload {
    pub instances: Vec<Instance>,
    pub parameters: Parameters,
}

#[derive(Debug, Clone, Serialize)]
pub struct Instance {
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<WireImage>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WireImage {
    pub bytes_base64_encoded: String,
    pub mime_type: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Parameters {
    pub aspect_ratio: String,
    pub duration_seconds: u32,
    pub sample_count: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generate_audio: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<Resolution>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub negative_prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enhance_prompt: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub person_generation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u32>,
}

pub fn build_payload(request: &GenerationRequest, model_id: &str) -> VeoResult<PredictPayload> {
    let cap = models::capability_for(model_id);
    let duration_seconds = request.validate(&cap)?;

    let image = request.image.as_ref().map(|img| WireImage {
        bytes_base64_encoded: base64::engine::general_purpose::STANDARD.encode(&img.bytes),
        mime_type: img.mime_type.clone(),
    });

    // Audio and resolution are rejected by models without an audio track.
    let (generate_audio, resolution) = if cap.supports_audio {
        (Some(request.generate_audio), Some(request.resolution))
    } else {
        (None, None)
    };

    Ok(PredictPayload {
        instances: vec![Instance {
            prompt: request.prompt.clone(),
            image,
        }],
        parameters: Parameters {
            aspect_ratio: request.aspect_ratio.to_string(),
            duration_seconds,
            sample_count: request.sample_count,
            generate_audio,
            resolution,
            storage_uri: request.storage_uri.clone(),
            negative_prompt: request.negative_prompt.clone(),
            enhance_prompt: request.enhance_prompt,
            person_generation: request.person_generation.clone(),
            seed: request.seed,
        },
    })
}
