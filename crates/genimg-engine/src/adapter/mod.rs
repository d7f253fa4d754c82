mod batch;
mod native;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use genimg_contracts::request::NO_IMAGE_DETAIL;
use genimg_contracts::{Backend, GenError, GenerationResult, ImageHandle};

use crate::builder::BackendCallConfig;
use crate::output;
use crate::transport::Transport;

pub use batch::BatchAdapter;
pub use native::{NativeAdapter, NativeReply, NativeSettings};

/// Images and text returned by one backend round-trip.
#[derive(Debug, Clone, Default)]
pub struct AdapterReply {
    pub images: Vec<ImageHandle>,
    pub texts: Vec<String>,
}

/// One backend call shape. Both variants return the same reply and result
/// types so callers stay backend-agnostic.
pub trait BackendAdapter: Send + Sync {
    fn backend(&self) -> Backend;

    /// Performs exactly one round-trip. Never retries.
    fn invoke(&self, config: &BackendCallConfig) -> Result<AdapterReply, GenError>;

    /// Invokes and persists every returned image under `output`. A reply
    /// without images is a backend error carrying the model's text, if any.
    fn produce(
        &self,
        name: &str,
        config: &BackendCallConfig,
        output: &Path,
    ) -> Result<Vec<PathBuf>, GenError> {
        let reply = self.invoke(config)?;
        if reply.images.is_empty() {
            let text = reply.texts.join("\n");
            let detail = match text.trim() {
                "" => NO_IMAGE_DETAIL,
                text => text,
            };
            return Err(GenError::Backend(detail.to_string()));
        }
        for text in &reply.texts {
            tracing::info!(name, "model text: {}", text.trim());
        }
        output::persist(&reply.images, output).map_err(|err| GenError::Output(format!("{err:#}")))
    }

    /// Like [`produce`](Self::produce), folding every failure into an error
    /// result.
    fn call(&self, name: &str, config: &BackendCallConfig, output: &Path) -> GenerationResult {
        match self.produce(name, config, output) {
            Ok(paths) => GenerationResult::success(name, paths),
            Err(err) => GenerationResult::failure(name, err.to_string()),
        }
    }
}

/// Both adapters over one shared transport.
#[derive(Clone)]
pub struct AdapterSet {
    native: Arc<NativeAdapter>,
    batch: Arc<BatchAdapter>,
}

impl AdapterSet {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            native: Arc::new(NativeAdapter::new(transport.clone())),
            batch: Arc::new(BatchAdapter::new(transport)),
        }
    }

    pub fn get(&self, backend: Backend) -> &dyn BackendAdapter {
        match backend {
            Backend::Native => self.native.as_ref(),
            Backend::Batch => self.batch.as_ref(),
        }
    }

    pub fn native(&self) -> Arc<NativeAdapter> {
        self.native.clone()
    }
}

fn mismatched(expected: Backend, config: &BackendCallConfig) -> GenError {
    GenError::Configuration(format!(
        "{expected} adapter cannot run a {} call",
        config.backend()
    ))
}

fn decode_image(encoded: &str, mime_type: Option<&str>, origin: &str) -> Result<ImageHandle, GenError> {
    let bytes = BASE64
        .decode(encoded.as_bytes())
        .map_err(|err| GenError::Backend(format!("{origin} image base64 decode failed: {err}")))?;
    Ok(ImageHandle::new(bytes, mime_type.unwrap_or("image/png")))
}

fn image_part(image: &ImageHandle) -> serde_json::Value {
    serde_json::json!({
        "inlineData": {
            "mimeType": image.mime_type,
            "data": BASE64.encode(&image.bytes),
        }
    })
}


#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use anyhow::Result;
    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine as _;
    use genimg_contracts::{Backend, GenError, GenerationIntent, ImageHandle, ModelTier, ResultStatus};
    use serde_json::json;

    use super::scripted::ScriptedTransport;
    use super::{AdapterSet, BackendAdapter};
    use crate::builder::build;
    use crate::dryrun::{solid_png, DryrunTransport};

    #[test]
    fn call_persists_images_and_reports_paths() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let adapters = AdapterSet::new(Arc::new(DryrunTransport::new()));
        let mut intent = GenerationIntent::new("three mugs");
        intent.image_count = Some(3);
        let plan = build(&intent, Backend::Batch, ModelTier::Fast)?;

        let result = adapters
            .get(Backend::Batch)
            .call("mugs", &plan.config, &temp.path().join("out/mugs.png"));
        assert_eq!(result.status, ResultStatus::Success);
        assert_eq!(result.paths.len(), 3);
        assert!(result.paths.iter().all(|path| path.exists()));
        assert!(result.paths[0].ends_with("mugs_1.png"));
        Ok(())
    }

    #[test]
    fn transport_failure_becomes_error_result() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let transport = Arc::new(ScriptedTransport::new(vec![Err("connection reset".into())]));
        let adapters = AdapterSet::new(transport);
        let plan = build(&GenerationIntent::new("x"), Backend::Native, ModelTier::Flash)?;

        let result = adapters
            .get(Backend::Native)
            .call("x", &plan.config, &temp.path().join("x.png"));
        assert_eq!(result.status, ResultStatus::Error);
        assert!(result.paths.is_empty());
        assert_eq!(result.error.as_deref(), Some("connection reset"));
        Ok(())
    }

    #[test]
    fn empty_response_is_no_image_error() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let transport = Arc::new(ScriptedTransport::new(vec![Ok(json!({"predictions": []}))]));
        let adapters = AdapterSet::new(transport);
        let plan = build(&GenerationIntent::new("x"), Backend::Batch, ModelTier::Standard)?;

        let result = adapters
            .get(Backend::Batch)
            .call("x", &plan.config, &temp.path().join("x.png"));
        assert_eq!(result.error.as_deref(), Some("no image in response"));
        Ok(())
    }

    #[test]
    fn text_only_reply_carries_the_text() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let transport = Arc::new(ScriptedTransport::new(vec![Ok(json!({
            "candidates": [{"content": {"role": "model", "parts": [{"text": "I can't draw that."}]}}]
        }))]));
        let adapters = AdapterSet::new(transport);
        let mut intent = GenerationIntent::new("x");
        intent.with_text = true;
        let plan = build(&intent, Backend::Native, ModelTier::Flash)?;

        let result = adapters
            .get(Backend::Native)
            .call("x", &plan.config, &temp.path().join("x.png"));
        assert_eq!(result.status, ResultStatus::Error);
        assert_eq!(result.error.as_deref(), Some("I can't draw that."));
        assert!(!temp.path().join("x.png").exists());
        Ok(())
    }

    #[test]
    fn adapter_rejects_other_backend_config() -> Result<()> {
        let adapters = AdapterSet::new(Arc::new(DryrunTransport::new()));
        let plan = build(&GenerationIntent::new("x"), Backend::Batch, ModelTier::Standard)?;
        assert!(adapters.get(Backend::Native).invoke(&plan.config).is_err());
        Ok(())
    }

    #[test]
    fn native_reply_with_two_images_writes_one_file() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let first = solid_png("first", 0, "1:1")?;
        let last = solid_png("last", 0, "1:1")?;
        let transport = Arc::new(ScriptedTransport::new(vec![Ok(json!({
            "candidates": [{"content": {"role": "model", "parts": [
                {"inlineData": {"mimeType": "image/png", "data": first}},
                {"inlineData": {"mimeType": "image/png", "data": last}}
            ]}}]
        }))]));
        let adapters = AdapterSet::new(transport);
        let plan = build(&GenerationIntent::new("hero shot"), Backend::Native, ModelTier::Flash)?;

        let result = adapters
            .get(Backend::Native)
            .call("hero", &plan.config, &temp.path().join("hero.png"));
        assert_eq!(result.paths, vec![temp.path().join("hero.png")]);
        assert_eq!(std::fs::read(&result.paths[0])?, BASE64.decode(&last)?);
        assert!(!temp.path().join("hero_1.png").exists());
        Ok(())
    }

    #[test]
    fn unwritable_output_is_an_output_error() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let blocker = temp.path().join("file");
        std::fs::write(&blocker, b"x")?;
        let adapters = AdapterSet::new(Arc::new(DryrunTransport::new()));
        let plan = build(&GenerationIntent::new("x"), Backend::Native, ModelTier::Flash)?;

        let err = adapters
            .get(Backend::Native)
            .produce("x", &plan.config, &blocker.join("x.png"))
            .unwrap_err();
        assert!(matches!(err, GenError::Output(_)));
        Ok(())
    }

    #[test]
    fn reference_handles_are_inlined_as_base64() {
        let part = super::image_part(&ImageHandle::new(vec![1, 2, 3], "image/jpeg"));
        assert_eq!(part["inlineData"]["mimeType"], "image/jpeg");
        assert_eq!(part["inlineData"]["data"], "AQID");
    }
}
