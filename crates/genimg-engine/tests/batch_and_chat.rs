use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use genimg_contracts::jobs::{BatchDocument, BatchJob};
use genimg_contracts::{GenError, ResultStatus};
use genimg_engine::{
    BatchExecutor, ChatConfig, ChatSession, DryrunTransport, Generator, SessionState, Transport,
};
use serde_json::Value;

/// Fails any request whose prompt mentions "explode"; the rest are answered
/// offline with small delays so completions interleave.
struct FlakyTransport {
    inner: DryrunTransport,
}

impl Transport for FlakyTransport {
    fn post(&self, model: &str, method: &str, payload: &Value) -> Result<Value> {
        let prompt = payload
            .pointer("/instances/0/prompt")
            .and_then(Value::as_str)
            .unwrap_or_default();
        if prompt.contains("explode") {
            bail!("{model} request failed (500): internal error");
        }
        let delay = (prompt.len() % 5) as u64 * 3;
        std::thread::sleep(Duration::from_millis(delay));
        self.inner.post(model, method, payload)
    }
}

#[test]
fn batch_isolates_failures_and_reduces_totals() -> Result<()> {
    let temp = tempfile::tempdir()?;
    let document = BatchDocument::parse(
        r#"{
            "api": "imagen",
            "model": "standard",
            "images": [
                {"name": "a", "prompt": "a quiet harbor", "count": 2},
                {"name": "b", "prompt": "this will explode"},
                {"name": "c", "prompt": "city at dusk", "count": 10},
                {"name": "d", "prompt": "forest", "aspect": "2:3"},
                {"name": "e", "prompt": "desert road"},
                {"name": "f", "prompt": "and explode again", "count": 3}
            ]
        }"#,
    )?;
    let job = BatchJob::from_document(&document, temp.path().join("out/deep"), 3)?;
    let generator = Generator::new(Arc::new(FlakyTransport {
        inner: DryrunTransport::new(),
    }));

    let report = BatchExecutor::new(generator).run(&job)?;

    assert_eq!(report.totals.total_items, 6);
    assert_eq!(report.totals.succeeded, 3);
    assert_eq!(report.totals.failed, 3);
    assert_eq!(report.totals.total_images, 2 + 4 + 1);

    let failed: HashSet<_> = report.failures().map(|result| result.name.as_str()).collect();
    assert_eq!(failed, HashSet::from(["b", "d", "f"]));
    for result in &report.results {
        match result.status {
            ResultStatus::Success => {
                assert!(!result.paths.is_empty());
                assert!(result.error.is_none());
            }
            ResultStatus::Error => {
                assert!(result.paths.is_empty());
                assert!(result.error.is_some());
            }
        }
    }
    assert!(temp.path().join("out/deep/c_4.png").exists());
    assert!(!temp.path().join("out/deep/c_5.png").exists());
    assert_eq!(report.headline(), "Generated 7 image(s) from 3/6 configs");

    let summary = temp.path().join("summary.json");
    report.write_summary(&summary)?;
    let value: Value = serde_json::from_str(&std::fs::read_to_string(summary)?)?;
    assert_eq!(value["succeeded"], 3);
    assert_eq!(value["results"].as_array().map(Vec::len), Some(6));
    Ok(())
}

#[test]
fn chat_session_round_trip() -> Result<()> {
    let temp = tempfile::tempdir()?;
    let generator = Generator::new(Arc::new(DryrunTransport::new()));
    let config = ChatConfig {
        output_dir: temp.path().join("chat"),
        ..ChatConfig::default()
    };
    let mut session = ChatSession::new(config, generator.adapters().native())?;

    session.send("A cozy coffee shop interior")?;
    session.send("Add warm morning light")?;
    assert_eq!(session.history().len(), 4);
    let saved = session.save(None)?;
    assert!(saved.starts_with(temp.path().join("chat")));

    session.set_aspect_ratio("16/9")?;
    assert_eq!(session.state(), SessionState::Idle);
    assert!(session.history().is_empty());
    assert_eq!(session.save(None), Err(GenError::NoImage));

    session.send("Same shop, wide shot")?;
    let wide = session.save(Some("wide"))?;
    assert_eq!(wide, temp.path().join("chat/wide.png"));
    let decoded = image::open(&wide)?;
    assert_eq!((decoded.width(), decoded.height()), (64, 36));
    Ok(())
}
