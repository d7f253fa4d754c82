use std::collections::VecDeque;
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::{mpsc, Mutex};
use std::thread;

use genimg_contracts::events::{EventWriter, RunEvent};
use genimg_contracts::jobs::{now_utc_iso, BatchJob, BatchReport};
use genimg_contracts::{GenError, GenerationRequest, GenerationResult};
use uuid::Uuid;

use crate::generator::Generator;

/// Runs every request of a job on a fixed-size pool of worker threads and
/// joins on the full set of results.
pub struct BatchExecutor {
    generator: Generator,
    events: Option<EventWriter>,
}

impl BatchExecutor {
    pub fn new(generator: Generator) -> Self {
        Self {
            generator,
            events: None,
        }
    }

    pub fn with_events(mut self, events: EventWriter) -> Self {
        self.events = Some(events);
        self
    }

    pub fn run(&self, job: &BatchJob) -> Result<BatchReport, GenError> {
        self.run_with_progress(job, |_| {})
    }

    /// Like [`run`](Self::run), calling `on_result` on the calling thread
    /// as each item completes. Per-item failures never abort the batch;
    /// only an unusable output directory does.
    pub fn run_with_progress<F>(&self, job: &BatchJob, mut on_result: F) -> Result<BatchReport, GenError>
    where
        F: FnMut(&GenerationResult),
    {
        fs::create_dir_all(&job.output_dir).map_err(|err| {
            GenError::Output(format!("failed to create {}: {err}", job.output_dir.display()))
        })?;

        let run_id = self
            .events
            .as_ref()
            .map(|events| events.run_id().to_string())
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let started_at = now_utc_iso();
        let workers = job.workers.max(1).min(job.requests.len().max(1));
        tracing::info!(
            %run_id,
            items = job.requests.len(),
            workers,
            model = job.tier.model_id(),
            "batch started"
        );
        self.emit(&RunEvent::BatchStarted {
            backend: job.backend,
            model: job.tier.model_id(),
            items: job.requests.len(),
            workers,
            output_dir: &job.output_dir,
        });

        let queue: Mutex<VecDeque<&GenerationRequest>> = Mutex::new(job.requests.iter().collect());
        let mut results = Vec::with_capacity(job.requests.len());

        thread::scope(|scope| {
            let (tx, rx) = mpsc::channel::<GenerationResult>();
            let mut spawned = 0usize;
            for idx in 0..workers {
                let tx = tx.clone();
                let queue = &queue;
                let spawn = thread::Builder::new()
                    .name(format!("genimg-worker-{idx}"))
                    .spawn_scoped(scope, move || self.drain(queue, &job.output_dir, &tx));
                match spawn {
                    Ok(_) => spawned += 1,
                    Err(err) => tracing::warn!(worker = idx, error = %err, "worker spawn failed"),
                }
            }
            if spawned == 0 {
                self.drain(&queue, &job.output_dir, &tx);
            }
            drop(tx);

            for result in rx {
                self.emit(&RunEvent::ItemFinished { result: &result });
                on_result(&result);
                results.push(result);
            }
        });

        let report = BatchReport::new(run_id, started_at, now_utc_iso(), results);
        self.emit(&RunEvent::BatchFinished {
            totals: report.totals,
        });
        tracing::info!(
            succeeded = report.totals.succeeded,
            failed = report.totals.failed,
            images = report.totals.total_images,
            "batch finished"
        );
        Ok(report)
    }

    fn drain(
        &self,
        queue: &Mutex<VecDeque<&GenerationRequest>>,
        output_dir: &Path,
        tx: &mpsc::Sender<GenerationResult>,
    ) {
        loop {
            let next = match queue.lock() {
                Ok(mut pending) => pending.pop_front(),
                Err(_) => None,
            };
            let Some(request) = next else {
                break;
            };
            if tx.send(self.run_isolated(request, output_dir)).is_err() {
                break;
            }
        }
    }

    fn run_isolated(&self, request: &GenerationRequest, output_dir: &Path) -> GenerationResult {
        let output = output_dir.join(format!("{}.png", request.name));
        panic::catch_unwind(AssertUnwindSafe(|| self.generator.run(request, &output)))
            .unwrap_or_else(|_| {
                tracing::error!(name = %request.name, "generation panicked");
                GenerationResult::failure(&request.name, "generation panicked")
            })
    }

    fn emit(&self, event: &RunEvent<'_>) {
        let Some(events) = self.events.as_ref() else {
            return;
        };
        if let Err(err) = events.emit(event) {
            tracing::warn!(path = %events.path().display(), error = %err, "event write failed");
        }
    }
}
