//! Fetch → normalize → write for one symbol.
//!
//! Nothing that goes wrong here escapes as an error: every path ends in a
//! [`RunOutcome`], so one bad symbol never takes the run down with it.

use std::{sync::Arc, time::Instant};

use bar_ingestor::{
    models::{bar::RawBarRecord, window::WindowTemplate},
    normalize::normalize_batch,
    providers::{BarSource, errors::FetchError},
};
use bar_store::writer::BarSink;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::report::{OutcomeStatus, RunOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetching,
    Normalizing,
    Writing,
    Done,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineSettings {
    /// A symbol fails when more than this share of its records cannot be normalized.
    pub drop_threshold: f64,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            drop_threshold: 0.2,
        }
    }
}

#[derive(Clone)]
pub struct SymbolPipeline {
    source: Arc<dyn BarSource>,
    sink: Arc<dyn BarSink>,
    settings: PipelineSettings,
}

impl SymbolPipeline {
    pub fn new(
        source: Arc<dyn BarSource>,
        sink: Arc<dyn BarSink>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            source,
            sink,
            settings,
        }
    }

    pub async fn process(
        &self,
        symbol: &str,
        template: &WindowTemplate,
        cancel: &CancellationToken,
    ) -> RunOutcome {
        let span = info_span!("symbol", symbol, timeframe = %template.timeframe);
        self.run(symbol, template, cancel).instrument(span).await
    }

    async fn run(&self, symbol: &str, template: &WindowTemplate, cancel: &CancellationToken) -> RunOutcome {
        let started = Instant::now();
        let fail = |failed_at: Stage, error: String| {
            debug!(stage = ?Stage::Failed);
            error!(?failed_at, %error, "symbol failed");
            RunOutcome::failed(symbol, error, started.elapsed())
        };

        let window = match template.for_symbol(symbol) {
            Ok(window) => window,
            Err(e) => return fail(Stage::Fetching, e.to_string()),
        };

        debug!(stage = ?Stage::Fetching);
        let (records, partial): (Vec<RawBarRecord>, Option<String>) =
            match self.source.fetch(&window, cancel).await {
                Ok(records) => (records, None),
                Err(FetchError::Partial {
                    records,
                    attempts,
                    source,
                    ..
                }) => {
                    let note = format!("incomplete after {attempts} attempts: {source}");
                    warn!(kept = records.len(), %note, "continuing with partial window");
                    (records, Some(note))
                }
                Err(e) => return fail(Stage::Fetching, e.to_string()),
            };

        debug!(stage = ?Stage::Normalizing, records = records.len());
        let batch = normalize_batch(window.symbol(), window.timeframe(), &records);
        let dropped = batch.rejected.len();
        if let Some((index, reason)) = batch.rejected.first() {
            warn!(dropped, total = batch.total(), first_index = index, first_reason = %reason, "dropped records");
        }
        if batch.dropped_fraction() > self.settings.drop_threshold {
            let mut outcome = fail(
                Stage::Normalizing,
                format!(
                    "dropped {dropped} of {} records, above threshold {}",
                    batch.total(),
                    self.settings.drop_threshold
                ),
            );
            outcome.dropped = dropped;
            return outcome;
        }

        let mut outcome = RunOutcome {
            symbol: window.symbol().to_string(),
            status: if partial.is_some() {
                OutcomeStatus::Partial
            } else {
                OutcomeStatus::Ok
            },
            bar_count: 0,
            dropped,
            error: partial,
            elapsed: started.elapsed(),
            transient: false,
        };

        if batch.bars.is_empty() {
            if outcome.status == OutcomeStatus::Ok {
                outcome.status = OutcomeStatus::Empty;
            }
            info!(status = outcome.status.as_str(), "no bars to write");
            outcome.elapsed = started.elapsed();
            return outcome;
        }

        debug!(stage = ?Stage::Writing, bars = batch.bars.len());
        match self.sink.write(&batch.bars).await {
            Ok(result) => {
                outcome.bar_count = result.rows;
                outcome.elapsed = started.elapsed();
                debug!(stage = ?Stage::Done);
                info!(
                    status = outcome.status.as_str(),
                    bars = outcome.bar_count,
                    dropped,
                    elapsed_ms = outcome.elapsed.as_millis() as u64,
                    "symbol ingested"
                );
                outcome
            }
            Err(e) => {
                let mut failed = fail(Stage::Writing, e.to_string());
                failed.dropped = dropped;
                failed.transient = e.is_transient();
                failed
            }
        }
    }
}
