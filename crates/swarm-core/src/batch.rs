//! Batch runner
//!
//! Runs independent pipelines over many files with bounded concurrency.
//! Pipelines share nothing but the experiment log. Each pipeline runs in its
//! own task, so even a panic in one file is reported as an escalation for
//! that file and the rest of the batch carries on.

use crate::orchestrator::{Orchestrator, PipelineReport};
use crate::stages::StageContext;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

/// Default number of files processed at once
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Results of a batch, in input order
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchReport {
    /// One report per input file
    pub reports: Vec<PipelineReport>,
}

impl BatchReport {
    /// Files that ended in `DONE`
    #[must_use]
    pub fn done(&self) -> usize {
        self.reports.iter().filter(|r| r.is_done()).count()
    }

    /// Files that ended in `ESCALATE`
    #[must_use]
    pub fn escalated(&self) -> usize {
        self.reports.len() - self.done()
    }
}

/// Processes files concurrently
#[derive(Debug, Clone)]
pub struct BatchRunner {
    orchestrator: Arc<Orchestrator>,
    concurrency: usize,
}

impl BatchRunner {
    /// Create runner with [`DEFAULT_CONCURRENCY`]
    #[must_use]
    pub fn new(ctx: StageContext) -> Self {
        Self {
            orchestrator: Arc::new(Orchestrator::new(ctx)),
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Set concurrency (at least 1)
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Run every file to completion
    pub async fn run(&self, files: Vec<PathBuf>) -> BatchReport {
        tracing::info!(files = files.len(), concurrency = self.concurrency, "batch started");

        let reports: Vec<PipelineReport> = stream::iter(files)
            .map(|path| {
                let orchestrator = Arc::clone(&self.orchestrator);
                let file = path.display().to_string();
                let handle = tokio::spawn(async move { orchestrator.run(&path).await });
                async move {
                    match handle.await {
                        Ok(report) => report,
                        Err(err) => {
                            tracing::error!(file = %file, error = %err, "pipeline task aborted");
                            PipelineReport::aborted(file, format!("pipeline task aborted: {err}"))
                        }
                    }
                }
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        let batch = BatchReport { reports };
        tracing::info!(done = batch.done(), escalated = batch.escalated(), "batch finished");
        batch
    }
}
