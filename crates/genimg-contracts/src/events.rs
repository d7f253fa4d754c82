use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::Serialize;
use serde_json::{Map, Value};

use crate::capabilities::Backend;
use crate::jobs::{now_utc_iso, BatchTotals};
use crate::request::GenerationResult;

/// Lifecycle events of a batch run, one JSON object per line.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunEvent<'a> {
    BatchStarted {
        backend: Backend,
        model: &'a str,
        items: usize,
        workers: usize,
        output_dir: &'a Path,
    },
    ItemFinished {
        #[serde(flatten)]
        result: &'a GenerationResult,
    },
    BatchFinished {
        #[serde(flatten)]
        totals: BatchTotals,
    },
}

/// Append-only JSONL writer shared across worker threads.
///
/// Every line carries `run_id` and `ts`; fields of the event itself are
/// merged last.
#[derive(Debug, Clone)]
pub struct EventWriter {
    inner: Arc<EventWriterInner>,
}

#[derive(Debug)]
struct EventWriterInner {
    path: PathBuf,
    run_id: String,
    lock: Mutex<()>,
}

impl EventWriter {
    pub fn new(path: impl Into<PathBuf>, run_id: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(EventWriterInner {
                path: path.into(),
                run_id: run_id.into(),
                lock: Mutex::new(()),
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    pub fn run_id(&self) -> &str {
        &self.inner.run_id
    }

    pub fn emit<E: Serialize>(&self, event: &E) -> anyhow::Result<Value> {
        let mut line = Map::new();
        line.insert(
            "run_id".to_string(),
            Value::String(self.inner.run_id.clone()),
        );
        line.insert("ts".to_string(), Value::String(now_utc_iso()));
        match serde_json::to_value(event)? {
            Value::Object(fields) => line.extend(fields),
            other => {
                line.insert("payload".to_string(), other);
            }
        }

        if let Some(parent) = self.inner.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let encoded = serde_json::to_string(&line)?;
        let _guard = self
            .inner
            .lock
            .lock()
            .map_err(|_| anyhow::anyhow!("event writer lock poisoned"))?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.inner.path)?;
        file.write_all(encoded.as_bytes())?;
        file.write_all(b"\n")?;

        Ok(Value::Object(line))
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::{Path, PathBuf};

    use chrono::DateTime;
    use serde_json::Value;

    use super::*;

    #[test]
    fn item_event_flattens_result_fields() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("logs").join("events.jsonl");
        let writer = EventWriter::new(&path, "run-123");

        let result = GenerationResult::success("hero", vec![PathBuf::from("out/hero.png")]);
        let emitted = writer.emit(&RunEvent::ItemFinished { result: &result })?;

        let content = fs::read_to_string(&path)?;
        let parsed: Value = serde_json::from_str(content.lines().next().unwrap_or(""))?;
        assert_eq!(parsed, emitted);
        assert_eq!(parsed["type"], "item_finished");
        assert_eq!(parsed["run_id"], "run-123");
        assert_eq!(parsed["name"], "hero");
        assert_eq!(parsed["paths"][0], "out/hero.png");
        DateTime::parse_from_rfc3339(parsed["ts"].as_str().unwrap_or(""))?;
        Ok(())
    }

    #[test]
    fn emit_appends_one_line_per_event() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("events.jsonl");
        let writer = EventWriter::new(&path, "run-123");

        writer.emit(&RunEvent::BatchStarted {
            backend: Backend::Batch,
            model: "imagen-4.0-generate-001",
            items: 2,
            workers: 3,
            output_dir: Path::new("out"),
        })?;
        writer.emit(&RunEvent::BatchFinished {
            totals: BatchTotals {
                total_items: 2,
                succeeded: 1,
                failed: 1,
                total_images: 4,
            },
        })?;

        let content = fs::read_to_string(&path)?;
        let lines: Vec<Value> = content
            .lines()
            .map(serde_json::from_str)
            .collect::<Result<_, _>>()?;
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["type"], "batch_started");
        assert_eq!(lines[0]["backend"], "batch");
        assert_eq!(lines[1]["type"], "batch_finished");
        assert_eq!(lines[1]["total_images"], 4);
        Ok(())
    }
}
