use std::path::{Path, PathBuf};
use std::sync::Arc;

use genimg_contracts::{GenError, GenerationRequest, GenerationResult};

use crate::adapter::AdapterSet;
use crate::builder::build;
use crate::transport::Transport;

/// Builds and dispatches single requests to the matching backend adapter.
#[derive(Clone)]
pub struct Generator {
    adapters: AdapterSet,
}

impl Generator {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            adapters: AdapterSet::new(transport),
        }
    }

    pub fn adapters(&self) -> &AdapterSet {
        &self.adapters
    }

    /// Runs one request and always returns a result; validation failures
    /// become that request's error result.
    pub fn run(&self, request: &GenerationRequest, output: &Path) -> GenerationResult {
        match build(&request.intent, request.backend, request.tier) {
            Ok(plan) => self
                .adapters
                .get(request.backend)
                .call(&request.name, &plan.config, output),
            Err(err) => {
                tracing::warn!(name = %request.name, error = %err, "request rejected");
                GenerationResult::failure(&request.name, err.to_string())
            }
        }
    }

    /// One-shot generation: every failure propagates to the caller.
    pub fn generate(
        &self,
        request: &GenerationRequest,
        output: &Path,
    ) -> Result<Vec<PathBuf>, GenError> {
        let plan = build(&request.intent, request.backend, request.tier)?;
        self.adapters
            .get(request.backend)
            .produce(&request.name, &plan.config, output)
    }
}
