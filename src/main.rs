use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use chrono::Local;
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod models;
mod persist;
mod pivot;
mod rank;
mod report;
mod scrape;
mod score;
mod session;
mod store;

use config::{ScrapeConfig, TrendConfig};
use models::Observation;
use session::Session;

const PREVIEW_ROWS: usize = 5;

#[derive(Parser)]
#[command(name = "chart-trend")]
#[command(about = "Scrape a music chart and rank its rising songs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape the chart, merge with history and predict rising songs
    Scrape {
        /// Summary file from an earlier run
        #[arg(long)]
        history: Option<PathBuf>,
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
        #[command(flatten)]
        source: SourceArgs,
        #[command(flatten)]
        trend: TrendArgs,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Predict rising songs from an existing summary file
    Predict {
        #[arg(long)]
        summary: PathBuf,
        #[command(flatten)]
        trend: TrendArgs,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Merge two summary files into a dated summary
    Merge {
        #[arg(long)]
        history: PathBuf,
        #[arg(long)]
        new: PathBuf,
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
    },
}

#[derive(Args)]
struct SourceArgs {
    /// Chart page URL with a `{page}` placeholder
    #[arg(long, env = "CHART_SOURCE_URL", default_value = config::DEFAULT_SOURCE_URL)]
    source_url: String,
    #[arg(long, default_value_t = config::DEFAULT_PAGES)]
    pages: u32,
    #[arg(long, default_value_t = config::DEFAULT_TIMEOUT_SECS)]
    timeout_secs: u64,
    /// Pause between page requests
    #[arg(long, default_value_t = config::DEFAULT_PAUSE_MS)]
    pause_ms: u64,
}

impl From<SourceArgs> for ScrapeConfig {
    fn from(args: SourceArgs) -> Self {
        Self {
            source_url: args.source_url,
            pages: args.pages,
            timeout: Duration::from_secs(args.timeout_secs),
            pause: Duration::from_millis(args.pause_ms),
            ..ScrapeConfig::default()
        }
    }
}

#[derive(Args)]
struct TrendArgs {
    /// Number of songs in the ranked table
    #[arg(long, default_value_t = config::DEFAULT_TOP_K)]
    limit: usize,
    /// Most recent scrape times used for scoring
    #[arg(long, default_value_t = config::DEFAULT_WINDOW)]
    window: usize,
}

impl From<TrendArgs> for TrendConfig {
    fn from(args: TrendArgs) -> Self {
        Self {
            window: args.window,
            top_k: args.limit,
        }
    }
}

#[derive(Args)]
struct OutputArgs {
    /// Write a markdown report here
    #[arg(long)]
    report: Option<PathBuf>,
    /// Write the chart matrix as JSON here
    #[arg(long)]
    chart_json: Option<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chart_trend=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Scrape {
            history,
            out_dir,
            source,
            trend,
            output,
        } => {
            let scrape_config = ScrapeConfig::from(source);
            let http = scrape::HttpSource::new(&scrape_config)?;
            let stamp = scrape::time_label(Local::now().naive_local());

            let report = scrape::scrape_chart(&http, &scrape_config, &stamp).await;
            if let Some(err) = &report.failure {
                eprintln!("Scrape failed: {err}");
            }
            if report.observations.is_empty() {
                println!("No chart entries collected.");
                return Ok(());
            }
            println!(
                "Kept {} of {} entries extracted from {} pages ({} skipped).",
                report.observations.len(),
                report.extracted,
                report.pages_fetched,
                report.skipped
            );
            print!("{}", report::preview(&report.observations, PREVIEW_ROWS));

            let mut session = Session::default();
            session.record_scrape(report.observations);
            if let Some(path) = history {
                match session.load_history(&path) {
                    Ok(count) => println!("Loaded {count} history rows."),
                    Err(err) => eprintln!("Could not read history file: {err}"),
                }
            }

            let merged = session.merged().unwrap_or_default();
            present(&merged, &TrendConfig::from(trend), &output)?;

            let path = persist::export_table(&merged, &out_dir, Local::now().date_naive())?;
            println!("Summary written to {}.", path.display());
        }
        Commands::Predict {
            summary,
            trend,
            output,
        } => {
            let table = persist::import_table(&summary)
                .with_context(|| format!("failed to load {}", summary.display()))?;
            info!(rows = table.len(), "loaded summary");
            present(&table, &TrendConfig::from(trend), &output)?;
        }
        Commands::Merge {
            history,
            new,
            out_dir,
        } => {
            let mut session = Session::default();
            let fresh = persist::import_table(&new)
                .with_context(|| format!("failed to load {}", new.display()))?;
            session.record_scrape(fresh);
            if let Err(err) = session.load_history(&history) {
                eprintln!("Could not read history file: {err}");
            }

            let merged = session.merged().unwrap_or_default();
            let path = persist::export_table(&merged, &out_dir, Local::now().date_naive())?;
            println!("Merged {} rows into {}.", merged.len(), path.display());
        }
    }

    Ok(())
}

fn present(
    table: &[Observation],
    config: &TrendConfig,
    output: &OutputArgs,
) -> anyhow::Result<()> {
    let outcome = session::predict(table, config);

    match &outcome {
        Ok(prediction) => {
            println!("Top {} rising songs:", prediction.ranked.len());
            print!("{}", report::ranked_table(prediction));
            if let Some(path) = &output.chart_json {
                let json = report::chart_json(&prediction.chart)?;
                write_file(path, &json)?;
            }
        }
        Err(err) => {
            warn!(%err, "prediction skipped");
            println!("Not enough history to predict trends ({err}).");
        }
    }

    if let Some(path) = &output.report {
        write_file(path, &report::build_report(table, &outcome))?;
    }
    Ok(())
}

fn write_file(path: &Path, contents: &str) -> anyhow::Result<()> {
    std::fs::write(path, contents).with_context(|| format!("failed to write {}", path.display()))?;
    println!("Wrote {}.", path.display());
    Ok(())
}
