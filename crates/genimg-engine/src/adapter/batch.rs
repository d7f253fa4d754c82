use std::sync::Arc;

use genimg_contracts::{Backend, GenError, ImageHandle};
use serde_json::{json, Map, Value};

use super::{decode_image, mismatched, AdapterReply, BackendAdapter};
use crate::builder::{BackendCallConfig, BatchCallConfig};
use crate::transport::Transport;

const METHOD: &str = "predict";

/// Single-turn text-to-image calls returning up to four images.
pub struct BatchAdapter {
    transport: Arc<dyn Transport>,
}

impl BatchAdapter {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    fn payload(config: &BatchCallConfig) -> Value {
        let mut parameters = Map::new();
        parameters.insert("sampleCount".to_string(), json!(config.image_count));
        parameters.insert("aspectRatio".to_string(), json!(config.aspect_ratio));
        if let Some(resolution) = config.resolution {
            parameters.insert("imageSize".to_string(), json!(resolution.as_str()));
        }
        parameters.insert(
            "personGeneration".to_string(),
            json!(config.person_policy.as_str()),
        );
        json!({
            "instances": [{ "prompt": config.prompt }],
            "parameters": parameters,
        })
    }
}

impl BackendAdapter for BatchAdapter {
    fn backend(&self) -> Backend {
        Backend::Batch
    }

    fn invoke(&self, config: &BackendCallConfig) -> Result<AdapterReply, GenError> {
        let BackendCallConfig::Batch(config) = config else {
            return Err(mismatched(Backend::Batch, config));
        };
        let model = config.tier.model_id();
        tracing::debug!(model, count = config.image_count, "batch predict");
        let response = self
            .transport
            .post(model, METHOD, &Self::payload(config))
            .map_err(|err| GenError::from_backend_chain(&err))?;
        Ok(AdapterReply {
            images: extract_predictions(&response)?,
            texts: Vec::new(),
        })
    }
}

fn extract_predictions(response: &Value) -> Result<Vec<ImageHandle>, GenError> {
    let predictions = response
        .get("predictions")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    let mut out = Vec::new();
    for row in predictions {
        let Some(obj) = row.as_object() else {
            continue;
        };
        if let Some(reason) = obj.get("raiFilteredReason").and_then(Value::as_str) {
            tracing::info!(reason, "batch prediction filtered");
            continue;
        }
        let source = obj
            .get("image")
            .and_then(Value::as_object)
            .unwrap_or(obj);
        let Some(encoded) = source
            .get("bytesBase64Encoded")
            .or_else(|| source.get("imageBytes"))
            .and_then(Value::as_str)
        else {
            continue;
        };
        let mime_type = source
            .get("mimeType")
            .or_else(|| source.get("mime_type"))
            .and_then(Value::as_str);
        out.push(decode_image(encoded, mime_type, "batch")?);
    }
    Ok(out)
}
