//! Long-running operation resource and media recognition.
//!
//! Two completed-response shapes carry media: `response.videos[]` (inline
//! `bytesBase64Encoded` or a `gcsUri`) and `response.predictions[]`. A done
//! operation with neither is "empty", which is a terminal state of its own.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_VIDEO_MIME: &str = "video/mp4";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationError {
    #[serde(default)]
    pub code: Option<i32>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Snapshot of a remote operation. Only ever replaced by a fresh status
/// fetch, never edited locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub done: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<OperationError>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaRef {
    Inline { base64: String, mime_type: String },
    Remote { uri: String, mime_type: String },
}

/// First media entry of a completed operation plus the safety-filter summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedMedia {
    pub media: MediaRef,
    pub filtered_count: u32,
    pub filtered_reasons: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationState {
    Pending,
    Succeeded(GeneratedMedia),
    Empty,
}

impl Operation {
    pub fn pending(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            done: false,
            response: None,
            error: None,
        }
    }

    pub fn state(&self) -> OperationState {
        if !self.done {
            return OperationState::Pending;
        }
        match self.response.as_ref().and_then(extract_media) {
            Some(media) => OperationState::Succeeded(media),
            None => OperationState::Empty,
        }
    }
}

pub fn extract_media(response: &Value) -> Option<GeneratedMedia> {
    let media = response
        .get("videos")
        .and_then(Value::as_array)
        .and_then(|videos| videos.first())
        .and_then(media_from_video)
        .or_else(|| {
            response
                .get("predictions")
                .and_then(Value::as_array)
                .and_then(|predictions| predictions.first())
                .and_then(media_from_prediction)
        })?;

    let filtered_count = response
        .get("raiMediaFilteredCount")
        .and_then(Value::as_u64)
        .map(|n| u32::try_from(n).unwrap_or(u32::MAX))
        .unwrap_or(0);
    let filtered_reasons = response
        .get("raiMediaFilteredReasons")
        .and_then(Value::as_array)
        .map(|reasons| {
            reasons
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    Some(GeneratedMedia {
        media,
        filtered_count,
        filtered_reasons,
    })
}

fn mime_of(entry: &Value) -> String {
    entry
        .get("mimeType")
        .and_then(Value::as_str)
        .filter(|m| !m.is_empty())
        .unwrap_or(DEFAULT_VIDEO_MIME)
        .to_string()
}

fn non_empty_str<'a>(entry: &'a Value, key: &str) -> Option<&'a str> {
    entry
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

fn media_from_video(video: &Value) -> Option<MediaRef> {
    let mime_type = mime_of(video);
    if let Some(data) = non_empty_str(video, "bytesBase64Encoded") {
        return Some(MediaRef::Inline {
            base64: data.to_string(),
            mime_type,
        });
    }
    non_empty_str(video, "gcsUri")
        .or_else(|| non_empty_str(video, "uri"))
        .map(|uri| MediaRef::Remote {
            uri: uri.to_string(),
            mime_type,
        })
}

fn media_from_prediction(prediction: &Value) -> Option<MediaRef> {
    if let Some(media) = media_from_video(prediction) {
        return Some(media);
    }
    let mime_type = mime_of(prediction);
    for key in ["video", "content"] {
        match prediction.get(key) {
            Some(Value::String(data)) if !data.is_empty() => {
                return Some(MediaRef::Inline {
                    base64: data.clone(),
                    mime_type,
                });
            }
            Some(nested) if nested.is_object() => {
                if let Some(media) = media_from_video(nested) {
                    return Some(media);
                }
            }
            _ => {}
        }
    }
    None
}
