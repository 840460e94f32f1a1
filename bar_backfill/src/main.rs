use std::{path::PathBuf, process::ExitCode, sync::Arc};

use anyhow::{Context, Result};
use bar_backfill::{
    batch::{BatchRunner, BatchSettings},
    config::IngestConfig,
    pipeline::{PipelineSettings, SymbolPipeline},
    universe,
};
use bar_ingestor::{
    models::{
        timeframe::{Granularity, TimeFrame},
        window::WindowTemplate,
    },
    providers::polygon_rest::PolygonProvider,
};
use bar_store::writer::SqliteBarWriter;
use chrono::NaiveDate;
use clap::{ArgGroup, Parser};
use tokio_util::sync::CancellationToken;
use tracing::warn;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "bar_backfill=info,bar_ingestor=info,bar_store=info";

#[derive(Parser)]
#[command(author, version, about = "Backfill historical bars into the bar store")]
#[command(group(ArgGroup::new("universe_source").required(true).args(["symbols", "universe"])))]
struct Cli {
    /// Path to the config file (backfill.toml)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Comma-separated list of symbols (e.g. "AAPL,MSFT")
    #[arg(long)]
    symbols: Option<String>,

    /// CSV file with a `Symbol` column
    #[arg(long, value_name = "CSV")]
    universe: Option<PathBuf>,

    /// Bar granularity: minute, hour, day, week, month, quarter, year
    #[arg(long, default_value = "day")]
    granularity: Granularity,

    /// Granularity multiplier (e.g. 5 with minute for 5-minute bars)
    #[arg(long, default_value_t = 1)]
    multiplier: u32,

    /// First date of the window (YYYY-MM-DD)
    #[arg(long)]
    start: NaiveDate,

    /// Last date of the window (YYYY-MM-DD)
    #[arg(long)]
    end: NaiveDate,

    /// Request prices without split/dividend adjustment
    #[arg(long)]
    unadjusted: bool,

    /// Print the run report as JSON
    #[arg(long)]
    json: bool,
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    init_tracing();
    let cli = Cli::parse();

    let config = IngestConfig::load(cli.config.as_deref()).context("loading configuration")?;

    let symbols = match (&cli.symbols, &cli.universe) {
        (Some(list), _) => universe::parse_symbol_list(list),
        (None, Some(path)) => universe::load_symbols(path)
            .with_context(|| format!("loading universe from {}", path.display()))?,
        (None, None) => Vec::new(),
    };

    let timeframe = TimeFrame::try_new(cli.multiplier, cli.granularity)?;
    let template = WindowTemplate::new(cli.start, cli.end, timeframe)?.adjusted(!cli.unadjusted);

    let database_url = config.database_url.clone();
    let pool_settings = config.pool_settings();
    let pool = tokio::task::spawn_blocking(move || bar_store::db::open(&database_url, pool_settings))
        .await
        .context("store setup task failed")??;

    let provider = PolygonProvider::new(config.api_key()?, config.polygon_settings())?;
    let pipeline = SymbolPipeline::new(
        Arc::new(provider),
        Arc::new(SqliteBarWriter::new(pool)),
        PipelineSettings {
            drop_threshold: config.drop_threshold,
        },
    );

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, finishing in-flight symbols");
                cancel.cancel();
            }
        }
    });

    let runner = BatchRunner::new(
        pipeline,
        BatchSettings {
            concurrency_limit: config.concurrency_limit,
            symbol_retries: config.symbol_retries,
        },
        cancel,
    );
    let report = runner.run(&symbols, &template).await?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{report}");
    }

    Ok(if report.is_run_failure() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
