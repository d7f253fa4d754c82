use std::sync::Arc;

use genimg_contracts::capabilities::THINKING_BUDGET;
use genimg_contracts::{Backend, GenError, ImageHandle};
use serde_json::{json, Map, Value};

use super::{decode_image, image_part, mismatched, AdapterReply, BackendAdapter};
use crate::builder::{BackendCallConfig, NativeCallConfig};
use crate::transport::Transport;

const METHOD: &str = "generateContent";

/// Model and generation config captured once per conversation.
#[derive(Debug, Clone, PartialEq)]
pub struct NativeSettings {
    model: &'static str,
    generation_config: Value,
    tools: Option<Value>,
}

impl NativeSettings {
    pub fn from_config(config: &NativeCallConfig) -> Self {
        let modalities = if config.with_text {
            json!(["TEXT", "IMAGE"])
        } else {
            json!(["IMAGE"])
        };
        let mut generation_config = Map::new();
        generation_config.insert("responseModalities".to_string(), modalities);

        let mut image_config = Map::new();
        if let Some(ratio) = config.aspect_ratio {
            image_config.insert("aspectRatio".to_string(), Value::String(ratio.to_string()));
        }
        if let Some(resolution) = config.resolution {
            image_config.insert(
                "imageSize".to_string(),
                Value::String(resolution.as_str().to_string()),
            );
        }
        if !image_config.is_empty() {
            generation_config.insert("imageConfig".to_string(), Value::Object(image_config));
        }
        if config.thinking {
            generation_config.insert(
                "thinkingConfig".to_string(),
                json!({ "thinkingBudget": THINKING_BUDGET }),
            );
        }

        Self {
            model: config.tier.model_id(),
            generation_config: Value::Object(generation_config),
            tools: config.grounding.then(|| json!([{ "googleSearch": {} }])),
        }
    }

    pub fn model(&self) -> &'static str {
        self.model
    }

    pub fn generation_config(&self) -> &Value {
        &self.generation_config
    }

    fn payload(&self, contents: &[Value]) -> Value {
        let mut payload = Map::new();
        payload.insert("contents".to_string(), Value::Array(contents.to_vec()));
        payload.insert("generationConfig".to_string(), self.generation_config.clone());
        if let Some(tools) = &self.tools {
            payload.insert("tools".to_string(), tools.clone());
        }
        Value::Object(payload)
    }
}

/// Parsed reply of one native turn. `model_content` is the candidate's
/// content verbatim so it can be replayed as conversation history.
#[derive(Debug, Clone)]
pub struct NativeReply {
    pub images: Vec<ImageHandle>,
    pub texts: Vec<String>,
    pub model_content: Value,
}

pub struct NativeAdapter {
    transport: Arc<dyn Transport>,
}

impl NativeAdapter {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// A user turn: prompt text first, then the images in order.
    pub fn user_content(prompt: &str, images: &[ImageHandle]) -> Value {
        let mut parts = vec![json!({ "text": prompt })];
        parts.extend(images.iter().map(image_part));
        json!({ "role": "user", "parts": parts })
    }

    /// Posts the whole conversation and parses the model's turn.
    pub fn exchange(
        &self,
        settings: &NativeSettings,
        contents: &[Value],
    ) -> Result<NativeReply, GenError> {
        tracing::debug!(model = settings.model, turns = contents.len(), "native exchange");
        let response = self
            .transport
            .post(settings.model, METHOD, &settings.payload(contents))
            .map_err(|err| GenError::from_backend_chain(&err))?;
        parse_reply(&response)
    }
}

impl BackendAdapter for NativeAdapter {
    fn backend(&self) -> Backend {
        Backend::Native
    }

    fn invoke(&self, config: &BackendCallConfig) -> Result<AdapterReply, GenError> {
        let BackendCallConfig::Native(config) = config else {
            return Err(mismatched(Backend::Native, config));
        };
        let settings = NativeSettings::from_config(config);
        let contents = [Self::user_content(&config.prompt, &config.reference_images)];
        let mut reply = self.exchange(&settings, &contents)?;
        if reply.images.len() > 1 {
            tracing::debug!(returned = reply.images.len(), "keeping the last native image");
        }
        Ok(AdapterReply {
            images: reply.images.pop().into_iter().collect(),
            texts: reply.texts,
        })
    }
}

fn parse_reply(response: &Value) -> Result<NativeReply, GenError> {
    let candidates = response
        .get("candidates")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    if candidates.is_empty() {
        if let Some(reason) = response
            .pointer("/promptFeedback/blockReason")
            .and_then(Value::as_str)
        {
            return Err(GenError::Backend(format!("prompt blocked ({reason})")));
        }
    }

    let mut images = Vec::new();
    let mut texts = Vec::new();
    for candidate in &candidates {
        if let Some(reason) = candidate.get("finishReason").and_then(Value::as_str) {
            if reason != "STOP" {
                tracing::debug!(finish_reason = reason, "native candidate stopped early");
            }
        }
        let parts = candidate
            .pointer("/content/parts")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        for part in parts {
            if part.get("thought").and_then(Value::as_bool) == Some(true) {
                continue;
            }
            if let Some(text) = part.get("text").and_then(Value::as_str) {
                if !text.trim().is_empty() {
                    texts.push(text.to_string());
                }
                continue;
            }
            let Some(inline) = part
                .get("inlineData")
                .or_else(|| part.get("inline_data"))
                .and_then(Value::as_object)
            else {
                continue;
            };
            let data = inline.get("data").and_then(Value::as_str).unwrap_or_default();
            if data.is_empty() {
                continue;
            }
            let mime_type = inline
                .get("mimeType")
                .or_else(|| inline.get("mime_type"))
                .and_then(Value::as_str);
            images.push(decode_image(data, mime_type, "native")?);
        }
    }

    let model_content = candidates
        .first()
        .and_then(|candidate| candidate.get("content"))
        .cloned()
        .unwrap_or_else(|| json!({ "role": "model", "parts": [] }));
    Ok(NativeReply {
        images,
        texts,
        model_content,
    })
}
