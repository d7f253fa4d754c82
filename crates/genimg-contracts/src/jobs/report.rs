use std::path::Path;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::request::GenerationResult;

/// Aggregate counts over a finished batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchTotals {
    pub total_items: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub total_images: u64,
}

impl BatchTotals {
    /// Order-independent reduction over a result set.
    pub fn from_results(results: &[GenerationResult]) -> Self {
        results.iter().fold(Self::default(), |mut totals, result| {
            totals.total_items += 1;
            if result.is_success() {
                totals.succeeded += 1;
                totals.total_images += result.paths.len() as u64;
            } else {
                totals.failed += 1;
            }
            totals
        })
    }
}

/// Results of one batch run in completion order, plus totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub run_id: String,
    pub started_at: String,
    pub finished_at: String,
    pub results: Vec<GenerationResult>,
    #[serde(flatten)]
    pub totals: BatchTotals,
}

impl BatchReport {
    pub fn new(
        run_id: impl Into<String>,
        started_at: impl Into<String>,
        finished_at: impl Into<String>,
        results: Vec<GenerationResult>,
    ) -> Self {
        let totals = BatchTotals::from_results(&results);
        Self {
            run_id: run_id.into(),
            started_at: started_at.into(),
            finished_at: finished_at.into(),
            results,
            totals,
        }
    }

    pub fn failures(&self) -> impl Iterator<Item = &GenerationResult> {
        self.results.iter().filter(|result| !result.is_success())
    }

    pub fn headline(&self) -> String {
        format!(
            "Generated {} image(s) from {}/{} configs",
            self.totals.total_images, self.totals.succeeded, self.totals.total_items
        )
    }

    pub fn write_summary(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

pub fn now_utc_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)
}
