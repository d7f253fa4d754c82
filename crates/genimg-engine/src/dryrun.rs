use std::io::Cursor;
use std::sync::Mutex;

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use crate::transport::Transport;

const LONG_SIDE: u32 = 64;

/// One request seen by [`DryrunTransport`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub model: String,
    pub method: String,
    pub payload: Value,
}

/// Offline transport that answers both wire shapes with solid-colour PNGs
/// derived from the prompt, recording every request. Used by `--dry-run` and
/// by tests.
#[derive(Debug, Default)]
pub struct DryrunTransport {
    requests: Mutex<Vec<RecordedRequest>>,
}

impl DryrunTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of requests answered so far.
    pub fn calls(&self) -> usize {
        self.requests.lock().map(|requests| requests.len()).unwrap_or(0)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    fn record(&self, model: &str, method: &str, payload: &Value) -> usize {
        let Ok(mut requests) = self.requests.lock() else {
            return 0;
        };
        requests.push(RecordedRequest {
            model: model.to_string(),
            method: method.to_string(),
            payload: payload.clone(),
        });
        requests.len() - 1
    }
}

impl Transport for DryrunTransport {
    fn post(&self, model: &str, method: &str, payload: &Value) -> Result<Value> {
        let call = self.record(model, method, payload);
        match method {
            "generateContent" => {
                let prompt = last_user_text(payload).unwrap_or_default();
                let ratio = payload
                    .pointer("/generationConfig/imageConfig/aspectRatio")
                    .and_then(Value::as_str)
                    .unwrap_or("1:1");
                let data = solid_png(&prompt, call as u64, ratio)?;
                Ok(json!({
                    "modelVersion": model,
                    "candidates": [{
                        "content": {
                            "role": "model",
                            "parts": [{"inlineData": {"mimeType": "image/png", "data": data}}]
                        }
                    }]
                }))
            }
            "predict" => {
                let prompt = payload
                    .pointer("/instances/0/prompt")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                let ratio = payload
                    .pointer("/parameters/aspectRatio")
                    .and_then(Value::as_str)
                    .unwrap_or("1:1");
                let count = payload
                    .pointer("/parameters/sampleCount")
                    .and_then(Value::as_u64)
                    .unwrap_or(1);
                let predictions = (0..count)
                    .map(|idx| {
                        solid_png(prompt, call as u64 * 8 + idx, ratio).map(|data| {
                            json!({"mimeType": "image/png", "bytesBase64Encoded": data})
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(json!({ "predictions": predictions }))
            }
            other => bail!("dryrun transport does not implement '{other}'"),
        }
    }
}

fn last_user_text(payload: &Value) -> Option<String> {
    payload
        .get("contents")?
        .as_array()?
        .iter()
        .rev()
        .find(|content| content.get("role").and_then(Value::as_str) == Some("user"))?
        .get("parts")?
        .as_array()?
        .iter()
        .find_map(|part| part.get("text").and_then(Value::as_str))
        .map(str::to_string)
}

fn dims_for_ratio(ratio: &str) -> (u32, u32) {
    let parsed = ratio.split_once(':').and_then(|(w, h)| {
        let w = w.trim().parse::<u32>().ok()?;
        let h = h.trim().parse::<u32>().ok()?;
        (w > 0 && h > 0).then_some((w, h))
    });
    match parsed {
        Some((w, h)) if w >= h => (LONG_SIDE, (LONG_SIDE * h / w).max(1)),
        Some((w, h)) => ((LONG_SIDE * w / h).max(1), LONG_SIDE),
        None => (LONG_SIDE, LONG_SIDE),
    }
}

fn color_from_prompt(prompt: &str, seed: u64) -> (u8, u8, u8) {
    let mut hasher = Sha256::new();
    hasher.update(prompt.as_bytes());
    hasher.update(seed.to_be_bytes());
    let digest = hasher.finalize();
    (digest[0], digest[1], digest[2])
}

pub(crate) fn solid_png(prompt: &str, seed: u64, ratio: &str) -> Result<String> {
    let (width, height) = dims_for_ratio(ratio);
    let (r, g, b) = color_from_prompt(prompt, seed);
    let image = RgbImage::from_pixel(width, height, Rgb([r, g, b]));
    let mut buffer = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(image)
        .write_to(&mut buffer, ImageFormat::Png)
        .context("dryrun image encode failed")?;
    Ok(BASE64.encode(buffer.into_inner()))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{dims_for_ratio, DryrunTransport};
    use crate::transport::Transport;

    #[test]
    fn ratio_drives_dimensions() {
        assert_eq!(dims_for_ratio("16:9"), (64, 36));
        assert_eq!(dims_for_ratio("9:16"), (36, 64));
        assert_eq!(dims_for_ratio("bogus"), (64, 64));
    }

    #[test]
    fn predict_returns_one_prediction_per_sample() -> anyhow::Result<()> {
        let transport = DryrunTransport::new();
        let response = transport.post(
            "imagen-4.0-generate-001",
            "predict",
            &json!({"instances": [{"prompt": "mug"}], "parameters": {"sampleCount": 3}}),
        )?;
        assert_eq!(response["predictions"].as_array().map(Vec::len), Some(3));
        assert_eq!(transport.calls(), 1);
        assert_eq!(transport.requests()[0].method, "predict");
        Ok(())
    }

    #[test]
    fn unknown_method_is_an_error() {
        let transport = DryrunTransport::new();
        assert!(transport.post("m", "countTokens", &json!({})).is_err());
    }
}
