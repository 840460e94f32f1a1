//! Per-symbol outcomes and the run-level report built from them.

use std::{fmt, time::Duration};

use serde::{Serialize, Serializer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    /// Every page fetched and written.
    Ok,
    /// Pagination stopped early; what was fetched was written.
    Partial,
    /// The provider had no bars for the window.
    Empty,
    Failed,
}

impl OutcomeStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            OutcomeStatus::Ok => "ok",
            OutcomeStatus::Partial => "partial",
            OutcomeStatus::Empty => "empty",
            OutcomeStatus::Failed => "failed",
        }
    }
}

/// What happened to one symbol.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunOutcome {
    pub symbol: String,
    pub status: OutcomeStatus,
    /// Rows written to the store.
    pub bar_count: usize,
    /// Raw records that failed normalization.
    pub dropped: usize,
    pub error: Option<String>,
    #[serde(rename = "elapsed_ms", serialize_with = "as_millis")]
    pub elapsed: Duration,
    /// Failed on a store error that may clear up on its own.
    #[serde(skip)]
    pub transient: bool,
}

impl RunOutcome {
    pub fn failed(symbol: impl Into<String>, error: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            symbol: symbol.into(),
            status: OutcomeStatus::Failed,
            bar_count: 0,
            dropped: 0,
            error: Some(error.into()),
            elapsed,
            transient: false,
        }
    }

    /// Never dispatched because the run was cancelled first.
    pub fn cancelled(symbol: impl Into<String>) -> Self {
        Self::failed(symbol, "cancelled", Duration::ZERO)
    }

    pub fn is_failed(&self) -> bool {
        self.status == OutcomeStatus::Failed
    }

    pub fn is_transient_failure(&self) -> bool {
        self.is_failed() && self.transient
    }
}

/// Aggregate of every outcome of a run, in dispatch order.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub outcomes: Vec<RunOutcome>,
    pub attempted: usize,
    pub succeeded: usize,
    pub partial: usize,
    pub empty: usize,
    pub failed: usize,
    pub bars_ingested: usize,
    pub dropped_records: usize,
    #[serde(rename = "elapsed_ms", serialize_with = "as_millis")]
    pub elapsed: Duration,
}

impl RunReport {
    pub fn new(outcomes: Vec<RunOutcome>, elapsed: Duration) -> Self {
        let count = |status: OutcomeStatus| outcomes.iter().filter(|o| o.status == status).count();

        Self {
            attempted: outcomes.len(),
            succeeded: count(OutcomeStatus::Ok),
            partial: count(OutcomeStatus::Partial),
            empty: count(OutcomeStatus::Empty),
            failed: count(OutcomeStatus::Failed),
            bars_ingested: outcomes.iter().map(|o| o.bar_count).sum(),
            dropped_records: outcomes.iter().map(|o| o.dropped).sum(),
            elapsed,
            outcomes,
        }
    }

    /// Every symbol failed.
    pub fn is_run_failure(&self) -> bool {
        self.attempted > 0 && self.failed == self.attempted
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{:<10} {:<8} {:>10} {:>8} {:>10}  error",
            "symbol", "status", "bars", "dropped", "elapsed"
        )?;
        for o in &self.outcomes {
            writeln!(
                f,
                "{:<10} {:<8} {:>10} {:>8} {:>9.2}s  {}",
                o.symbol,
                o.status.as_str(),
                o.bar_count,
                o.dropped,
                o.elapsed.as_secs_f64(),
                o.error.as_deref().unwrap_or("")
            )?;
        }
        write!(
            f,
            "\n{} symbols: {} ok, {} partial, {} empty, {} failed; {} bars ingested, {} records dropped in {:.2}s",
            self.attempted,
            self.succeeded,
            self.partial,
            self.empty,
            self.failed,
            self.bars_ingested,
            self.dropped_records,
            self.elapsed.as_secs_f64()
        )
    }
}

fn as_millis<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(duration.as_millis() as u64)
}
