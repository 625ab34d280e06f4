//! Video + `_metadata.json` sidecar, each written to a temp file and renamed
//! into place.

use crate::error::{VeoError, VeoResult};
use crate::operation::{GeneratedMedia, MediaRef, Operation, OperationState};
use crate::{logi, logok, logw};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use walkdir::WalkDir;

pub const DEFAULT_PREFIX: &str = "veo_video";
const METADATA_SUFFIX: &str = "_metadata.json";
const MAX_NAME_ATTEMPTS: u32 = 1000;
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "webm", "mov"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaResult {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub size: u64,
    pub filtered_count: u32,
    pub filtered_reasons: Vec<String>,
}

impl MediaResult {
    pub fn from_base64(data: &str, mime_type: impl Into<String>) -> VeoResult<Self> {
        let bytes = STANDARD.decode(data.trim())?;
        Ok(Self {
            size: bytes.len() as u64,
            bytes,
            mime_type: mime_type.into(),
            filtered_count: 0,
            filtered_reasons: Vec::new(),
        })
    }

    pub fn with_filter_summary(mut self, count: u32, reasons: Vec<String>) -> Self {
        self.filtered_count = count;
        self.filtered_reasons = reasons;
        self
    }
}

/// Contents of the `_metadata.json` sidecar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    pub prompt: String,
    pub timestamp: String,
    pub file_size_mb: f64,
    pub mime_type: String,
    #[serde(default)]
    pub filtered_count: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filtered_reasons: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PersistedArtifact {
    pub path: PathBuf,
    pub metadata_path: PathBuf,
    pub size_bytes: u64,
    pub timestamp: String,
    pub prompt: String,
    pub mime_type: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Materialized {
    Saved(PersistedArtifact),
    Remote { uri: String, mime_type: String },
    Empty,
}

#[derive(Debug, Clone)]
pub struct Materializer {
    output_dir: PathBuf,
    prefix: String,
}

impl Materializer {
    pub fn new(output_dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            output_dir: output_dir.into(),
            prefix: prefix.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub async fn materialize_operation(
        &self,
        operation: &Operation,
        prompt: &str,
    ) -> VeoResult<Materialized> {
        match operation.state() {
            OperationState::Succeeded(media) => {
                self.materialize(&media, prompt, Some(&operation.name)).await
            }
            OperationState::Empty => {
                logw(format!("Operation {} has no media to save", operation.name));
                Ok(Materialized::Empty)
            }
            OperationState::Pending => Err(VeoError::InvalidRequest(format!(
                "operation {} is not done yet",
                operation.name
            ))),
        }
    }

    pub async fn materialize(
        &self,
        media: &GeneratedMedia,
        prompt: &str,
        operation_name: Option<&str>,
    ) -> VeoResult<Materialized> {
        match &media.media {
            MediaRef::Remote { uri, mime_type } => {
                logi(format!("Video stored remotely at {}", uri));
                Ok(Materialized::Remote {
                    uri: uri.clone(),
                    mime_type: mime_type.clone(),
                })
            }
            MediaRef::Inline { base64, mime_type } => {
                let result = MediaResult::from_base64(base64, mime_type.as_str())?
                    .with_filter_summary(media.filtered_count, media.filtered_reasons.clone());
                let artifact = self.save(&result, prompt, operation_name).await?;
                Ok(Materialized::Saved(artifact))
            }
        }
    }

    pub async fn save(
        &self,
        result: &MediaResult,
        prompt: &str,
        operation_name: Option<&str>,
    ) -> VeoResult<PersistedArtifact> {
        let timestamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
        let stem = format!("{}_{}", self.prefix, timestamp);
        let metadata = ArtifactMetadata {
            prompt: prompt.to_string(),
            timestamp,
            file_size_mb: size_in_mb(result.size),
            mime_type: result.mime_type.clone(),
            filtered_count: result.filtered_count,
            filtered_reasons: result.filtered_reasons.clone(),
            operation_name: operation_name.map(str::to_string),
        };

        let dir = self.output_dir.clone();
        let ext = extension_for(&result.mime_type);
        let bytes = result.bytes.clone();
        let sidecar = metadata.clone();
        let (path, metadata_path) = tokio::task::spawn_blocking(move || {
            write_artifact(&dir, &stem, ext, &bytes, |path| {
                write_sidecar(&dir, path, &sidecar)
            })
        })
        .await
        .map_err(|e| VeoError::write(&self.output_dir, io::Error::other(e)))??;

        tracing::debug!(path = %path.display(), bytes = result.size, "artifact written");
        logok(format!(
            "Saved {} ({:.2} MB)",
            path.display(),
            metadata.file_size_mb
        ));
        if result.filtered_count > 0 {
            logw(format!(
                "{} video(s) removed by safety filters",
                result.filtered_count
            ));
        }

        Ok(PersistedArtifact {
            path,
            metadata_path,
            size_bytes: result.size,
            timestamp: metadata.timestamp,
            prompt: metadata.prompt,
            mime_type: metadata.mime_type,
        })
    }
}

fn size_in_mb(bytes: u64) -> f64 {
    let mb = bytes as f64 / (1024.0 * 1024.0);
    (mb * 100.0).round() / 100.0
}

fn extension_for(mime_type: &str) -> &'static str {
    match mime_type {
        "video/webm" => "webm",
        "video/quicktime" => "mov",
        _ => "mp4",
    }
}

fn metadata_path_for(video: &Path) -> PathBuf {
    let stem = video
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    video.with_file_name(format!("{stem}{METADATA_SUFFIX}"))
}

fn write_artifact<F>(
    dir: &Path,
    stem: &str,
    ext: &str,
    bytes: &[u8],
    write_metadata: F,
) -> VeoResult<(PathBuf, PathBuf)>
where
    F: FnOnce(&Path) -> VeoResult<()>,
{
    std::fs::create_dir_all(dir).map_err(|e| VeoError::write(dir, e))?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| VeoError::write(dir, e))?;
    tmp.write_all(bytes)
        .and_then(|_| tmp.as_file().sync_all())
        .map_err(|e| VeoError::write(tmp.path(), e))?;

    let mut video_path = None;
    for attempt in 1..=MAX_NAME_ATTEMPTS {
        let candidate = if attempt == 1 {
            dir.join(format!("{stem}.{ext}"))
        } else {
            dir.join(format!("{stem}_{attempt}.{ext}"))
        };
        if metadata_path_for(&candidate).exists() {
            continue;
        }
        match tmp.persist_noclobber(&candidate) {
            Ok(_) => {
                video_path = Some(candidate);
                break;
            }
            Err(err) if err.error.kind() == io::ErrorKind::AlreadyExists => tmp = err.file,
            Err(err) => return Err(VeoError::write(candidate, err.error)),
        }
    }
    let video_path = video_path.ok_or_else(|| {
        VeoError::write(
            dir,
            io::Error::new(io::ErrorKind::AlreadyExists, "no free file name"),
        )
    })?;

    let metadata_path = metadata_path_for(&video_path);
    if let Err(err) = write_metadata(&metadata_path) {
        let _ = std::fs::remove_file(&video_path);
        return Err(err);
    }
    Ok((video_path, metadata_path))
}

fn write_sidecar(dir: &Path, path: &Path, metadata: &ArtifactMetadata) -> VeoResult<()> {
    let json = serde_json::to_vec_pretty(metadata)
        .map_err(|e| VeoError::write(path, io::Error::other(e)))?;
    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| VeoError::write(dir, e))?;
    tmp.write_all(&json).map_err(|e| VeoError::write(path, e))?;
    tmp.persist(path).map_err(|e| VeoError::write(path, e.error))?;
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
pub struct SavedVideo {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub metadata: Option<ArtifactMetadata>,
}

/// Sorted by file name. A missing directory is an empty list.
pub fn list_saved_videos(dir: &Path) -> VeoResult<Vec<SavedVideo>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut videos = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
    {
        let path = entry.path();
        if entry.file_type().is_dir() {
            continue;
        }
        let is_video = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| VIDEO_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
            .unwrap_or(false);
        if !is_video {
            continue;
        }

        let size_bytes = match std::fs::metadata(path) {
            Ok(meta) if meta.is_file() => meta.len(),
            Ok(_) => continue,
            Err(err) => {
                tracing::debug!(path = %path.display(), error = %err, "skipping unreadable");
                continue;
            }
        };
        let metadata = std::fs::read_to_string(metadata_path_for(path))
            .ok()
            .and_then(|raw| serde_json::from_str(&raw).ok());

        videos.push(SavedVideo {
            path: path.to_path_buf(),
            size_bytes,
            metadata,
        });
    }
    Ok(videos)
}
