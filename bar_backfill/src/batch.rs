//! Fan-out of [`SymbolPipeline`] over a symbol universe.

use std::{sync::Arc, time::Instant};

use bar_ingestor::models::window::WindowTemplate;
use thiserror::Error;
use tokio::{sync::Semaphore, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::{
    pipeline::SymbolPipeline,
    report::{RunOutcome, RunReport},
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RunError {
    #[error("symbol universe is empty")]
    EmptyUniverse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSettings {
    /// Symbols in flight at once.
    pub concurrency_limit: usize,
    /// Extra attempts for a symbol whose write failed transiently.
    pub symbol_retries: u32,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            concurrency_limit: 4,
            symbol_retries: 0,
        }
    }
}

pub struct BatchRunner {
    pipeline: SymbolPipeline,
    settings: BatchSettings,
    cancel: CancellationToken,
}

impl BatchRunner {
    pub fn new(pipeline: SymbolPipeline, settings: BatchSettings, cancel: CancellationToken) -> Self {
        Self {
            pipeline,
            settings,
            cancel,
        }
    }

    /// Runs every symbol through the pipeline with bounded concurrency.
    ///
    /// Outcomes come back in dispatch order. Once the token is cancelled no new
    /// symbol is started; the ones never started are reported as failed.
    pub async fn run(
        &self,
        symbols: &[String],
        template: &WindowTemplate,
    ) -> Result<RunReport, RunError> {
        if symbols.is_empty() {
            return Err(RunError::EmptyUniverse);
        }

        let started = Instant::now();
        let limit = self.settings.concurrency_limit.max(1);
        let semaphore = Arc::new(Semaphore::new(limit));
        info!(
            symbols = symbols.len(),
            concurrency_limit = limit,
            timeframe = %template.timeframe,
            start = %template.start,
            end = %template.end,
            "run started"
        );

        let mut handles: Vec<(String, Option<JoinHandle<RunOutcome>>)> =
            Vec::with_capacity(symbols.len());
        for symbol in symbols {
            let permit = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => None,
                permit = semaphore.clone().acquire_owned() => permit.ok(),
            };
            let Some(permit) = permit else {
                handles.push((symbol.clone(), None));
                continue;
            };

            let pipeline = self.pipeline.clone();
            let template = template.clone();
            let cancel = self.cancel.clone();
            let retries = self.settings.symbol_retries;
            let task_symbol = symbol.clone();
            let handle = tokio::spawn(async move {
                let _permit = permit;
                process_with_retries(&pipeline, &task_symbol, &template, &cancel, retries).await
            });
            handles.push((symbol.clone(), Some(handle)));
        }

        let mut outcomes = Vec::with_capacity(handles.len());
        for (symbol, handle) in handles {
            let outcome = match handle {
                None => RunOutcome::cancelled(symbol),
                Some(handle) => match handle.await {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        error!(%symbol, error = %e, "pipeline task aborted");
                        RunOutcome::failed(symbol, format!("pipeline task aborted: {e}"), started.elapsed())
                    }
                },
            };
            outcomes.push(outcome);
        }

        let report = RunReport::new(outcomes, started.elapsed());
        info!(
            attempted = report.attempted,
            succeeded = report.succeeded,
            partial = report.partial,
            empty = report.empty,
            failed = report.failed,
            bars = report.bars_ingested,
            dropped = report.dropped_records,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "run finished"
        );
        Ok(report)
    }
}

/// Re-runs a symbol whose write failed transiently, up to `retries` more times.
async fn process_with_retries(
    pipeline: &SymbolPipeline,
    symbol: &str,
    template: &WindowTemplate,
    cancel: &CancellationToken,
    retries: u32,
) -> RunOutcome {
    let started = Instant::now();
    let mut outcome = pipeline.process(symbol, template, cancel).await;

    let mut attempt = 0;
    while outcome.is_transient_failure() && attempt < retries && !cancel.is_cancelled() {
        attempt += 1;
        warn!(symbol, attempt, retries, error = ?outcome.error, "retrying symbol after transient store failure");
        outcome = pipeline.process(symbol, template, cancel).await;
    }

    outcome.elapsed = started.elapsed();
    outcome
}
