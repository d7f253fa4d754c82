mod document;
mod report;

pub use document::{BatchDocument, BatchItem, BatchJob, DEFAULT_ASPECT_RATIO, DEFAULT_WORKERS};
pub use report::{now_utc_iso, BatchReport, BatchTotals};
