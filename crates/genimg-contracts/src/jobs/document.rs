use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::capabilities::{Backend, ModelTier, PersonPolicy};
use crate::error::GenError;
use crate::request::{GenerationIntent, GenerationRequest};

pub const DEFAULT_WORKERS: usize = 3;
pub const DEFAULT_ASPECT_RATIO: &str = "1:1";

/// The on-disk batch config.
///
/// ```json
/// {"api": "imagen", "model": "standard", "person_gen": "dont_allow",
///  "images": [{"name": "product", "prompt": "...", "count": 4}]}
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BatchDocument {
    #[serde(default, alias = "backend")]
    pub api: Option<String>,
    #[serde(default, alias = "model_tier", alias = "model-tier")]
    pub model: Option<String>,
    #[serde(default, alias = "person_policy", alias = "person-policy")]
    pub person_gen: Option<PersonPolicy>,
    #[serde(default)]
    pub thinking: Option<bool>,
    #[serde(default, alias = "items")]
    pub images: Vec<BatchItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BatchItem {
    pub name: String,
    pub prompt: String,
    #[serde(default, alias = "aspect_ratio")]
    pub aspect: Option<String>,
    /// Native top tier only.
    #[serde(default)]
    pub size: Option<String>,
    /// Batch backend only.
    #[serde(default)]
    pub count: Option<u32>,
    /// Native top tier only.
    #[serde(default)]
    pub thinking: Option<bool>,
    /// Batch backend only.
    #[serde(default, alias = "person_policy", alias = "person-policy")]
    pub person_gen: Option<PersonPolicy>,
}

impl BatchDocument {
    pub fn parse(raw: &str) -> Result<Self, GenError> {
        serde_json::from_str(raw)
            .map_err(|err| GenError::Configuration(format!("malformed batch config: {err}")))
    }

    pub fn load(path: &Path) -> Result<Self, GenError> {
        let raw = std::fs::read_to_string(path).map_err(|err| {
            GenError::Configuration(format!("cannot read {}: {err}", path.display()))
        })?;
        Self::parse(&raw)
    }

    pub fn backend(&self) -> Result<Backend, GenError> {
        match self.api.as_deref() {
            Some(raw) => raw.parse(),
            None => Ok(Backend::Native),
        }
    }

    /// Expands every item into a request, applying document defaults and
    /// then backend defaults. Aspect and size values are not checked here.
    pub fn requests(&self) -> Result<(Backend, ModelTier, Vec<GenerationRequest>), GenError> {
        let backend = self.backend()?;
        let tier = backend.resolve_tier(self.model.as_deref())?;
        let default_thinking = self.thinking.unwrap_or(false);

        let mut requests = Vec::with_capacity(self.images.len());
        for (idx, item) in self.images.iter().enumerate() {
            let name = item.name.trim();
            if name.is_empty() {
                return Err(GenError::Configuration(format!(
                    "batch item {} has an empty name",
                    idx + 1
                )));
            }
            if item.prompt.trim().is_empty() {
                return Err(GenError::Configuration(format!(
                    "batch item '{name}' has an empty prompt"
                )));
            }
            let intent = GenerationIntent {
                prompt: item.prompt.clone(),
                aspect_ratio: Some(
                    item.aspect
                        .clone()
                        .unwrap_or_else(|| DEFAULT_ASPECT_RATIO.to_string()),
                ),
                resolution: item.size.clone(),
                person_policy: item.person_gen.or(self.person_gen),
                image_count: item.count,
                thinking: item.thinking.unwrap_or(default_thinking),
                ..GenerationIntent::default()
            };
            requests.push(GenerationRequest {
                name: name.to_string(),
                backend,
                tier,
                intent,
            });
        }
        Ok((backend, tier, requests))
    }
}

/// A parsed batch, ready to execute once.
#[derive(Debug, Clone)]
pub struct BatchJob {
    pub backend: Backend,
    pub tier: ModelTier,
    pub requests: Vec<GenerationRequest>,
    pub output_dir: PathBuf,
    pub workers: usize,
}

impl BatchJob {
    pub fn from_document(
        document: &BatchDocument,
        output_dir: impl Into<PathBuf>,
        workers: usize,
    ) -> Result<Self, GenError> {
        let (backend, tier, requests) = document.requests()?;
        Ok(Self {
            backend,
            tier,
            requests,
            output_dir: output_dir.into(),
            workers: workers.max(1),
        })
    }

    pub fn load(path: &Path, output_dir: impl Into<PathBuf>, workers: usize) -> Result<Self, GenError> {
        Self::from_document(&BatchDocument::load(path)?, output_dir, workers)
    }
}

#[cfg(test)]
mod tests {
    use crate::capabilities::{Backend, ModelTier, PersonPolicy};

    use super::{BatchDocument, BatchJob};

    #[test]
    fn item_fields_fall_back_to_document_then_backend_defaults() -> anyhow::Result<()> {
        let doc = BatchDocument::parse(
            r#"{
                "api": "imagen",
                "model": "ultra",
                "person_gen": "allow_adult",
                "images": [
                    {"name": "product", "prompt": "a red mug", "count": 4},
                    {"name": "banner", "prompt": "a skyline", "aspect": "16:9", "person_gen": "allow_all"}
                ]
            }"#,
        )?;
        let (backend, tier, requests) = doc.requests()?;
        assert_eq!(backend, Backend::Batch);
        assert_eq!(tier, ModelTier::Ultra);
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].intent.aspect_ratio.as_deref(), Some("1:1"));
        assert_eq!(requests[0].intent.image_count, Some(4));
        assert_eq!(requests[0].intent.person_policy, Some(PersonPolicy::AllowAdult));
        assert_eq!(requests[1].intent.aspect_ratio.as_deref(), Some("16:9"));
        assert_eq!(requests[1].intent.person_policy, Some(PersonPolicy::AllowAll));
        Ok(())
    }

    #[test]
    fn missing_api_defaults_to_native_flash_and_global_thinking() -> anyhow::Result<()> {
        let doc = BatchDocument::parse(
            r#"{"thinking": true, "items": [
                {"name": "hero", "prompt": "sunset", "size": "2K"},
                {"name": "about", "prompt": "team", "thinking": false}
            ]}"#,
        )?;
        let job = BatchJob::from_document(&doc, "out", 0)?;
        assert_eq!(job.backend, Backend::Native);
        assert_eq!(job.tier, ModelTier::Flash);
        assert_eq!(job.workers, 1);
        assert!(job.requests[0].intent.thinking);
        assert_eq!(job.requests[0].intent.resolution.as_deref(), Some("2K"));
        assert!(!job.requests[1].intent.thinking);
        Ok(())
    }

    #[test]
    fn malformed_documents_are_configuration_errors() {
        for raw in [
            "{not json",
            r#"{"images": [{"name": "a"}]}"#,
            r#"{"api": "dalle", "images": []}"#,
            r#"{"api": "nano", "model": "ultra", "images": []}"#,
            r#"{"images": [{"name": " ", "prompt": "x"}]}"#,
        ] {
            let result = BatchDocument::parse(raw).and_then(|doc| doc.requests().map(|_| ()));
            let err = result.expect_err(raw);
            assert!(err.is_fatal(), "{raw} -> {err}");
        }
    }

    #[test]
    fn load_reports_missing_file() {
        let err = BatchDocument::load(std::path::Path::new("/nonexistent/batch.json")).unwrap_err();
        assert!(err.to_string().contains("cannot read"));
    }
}
