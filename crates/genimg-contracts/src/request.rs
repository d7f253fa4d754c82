use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::capabilities::{Backend, ModelTier, PersonPolicy};

/// Raw image bytes plus the MIME type the backend should be told about.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageHandle {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl ImageHandle {
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes,
            mime_type: mime_type.into(),
        }
    }

    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let bytes =
            std::fs::read(path).with_context(|| format!("failed reading {}", path.display()))?;
        let mime_type = mime_for_path(path).unwrap_or("image/png");
        Ok(Self::new(bytes, mime_type))
    }

    /// File extension matching the MIME type, `png` when unknown.
    pub fn extension(&self) -> &'static str {
        let lowered = self.mime_type.to_ascii_lowercase();
        if lowered.contains("jpeg") || lowered.contains("jpg") {
            "jpg"
        } else if lowered.contains("webp") {
            "webp"
        } else {
            "png"
        }
    }
}

impl fmt::Debug for ImageHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageHandle")
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

pub fn mime_for_path(path: &Path) -> Option<&'static str> {
    let ext = path
        .extension()
        .and_then(|value| value.to_str())
        .map(|value| value.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        _ => None,
    }
}

/// What the caller wants, before any backend-specific gating.
///
/// Fields the selected backend/tier cannot honour are dropped by the request
/// builder; only aspect ratio and resolution are validated strictly.
#[derive(Debug, Clone, Default)]
pub struct GenerationIntent {
    pub prompt: String,
    /// `None` lets the native backend match the input image.
    pub aspect_ratio: Option<String>,
    pub resolution: Option<String>,
    pub person_policy: Option<PersonPolicy>,
    pub image_count: Option<u32>,
    pub thinking: bool,
    pub grounding: bool,
    /// Ask the native backend for text alongside the image.
    pub with_text: bool,
    pub reference_images: Vec<ImageHandle>,
}

impl GenerationIntent {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Self::default()
        }
    }
}

/// One unit of work: an intent routed to a backend tier under a name.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub name: String,
    pub backend: Backend,
    pub tier: ModelTier,
    pub intent: GenerationIntent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultStatus {
    Success,
    Error,
}

/// Outcome of one request. A success always carries at least one path; an
/// error carries no paths and a detail message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationResult {
    pub name: String,
    pub status: ResultStatus,
    #[serde(default)]
    pub paths: Vec<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub const NO_IMAGE_DETAIL: &str = "no image in response";

impl GenerationResult {
    /// Builds a success, or an error when no path was produced.
    pub fn success(name: impl Into<String>, paths: Vec<PathBuf>) -> Self {
        if paths.is_empty() {
            return Self::failure(name, NO_IMAGE_DETAIL);
        }
        Self {
            name: name.into(),
            status: ResultStatus::Success,
            paths,
            error: None,
        }
    }

    pub fn failure(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: ResultStatus::Error,
            paths: Vec::new(),
            error: Some(detail.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ResultStatus::Success
    }
}
