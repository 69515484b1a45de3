//! bizpulse - Business metrics insights from the command line

mod cli;

use anyhow::{Context, Result};
use bizpulse_core::analytics::{
    calculate_seasonality, calculate_trend, detect_outliers, generate_forecast,
    perform_correlation_analysis, OutlierMethod,
};
use bizpulse_core::models::{daily_totals, DateRange, MetricKind, MetricSample, OrgId};
use bizpulse_core::{DataProvider, EngineConfig, GenerationOptions, InMemoryDataProvider, InsightsEngine};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "bizpulse",
    version,
    about = "Business metrics insights engine",
    long_about = "Analyzes business metric series (revenue, orders, sessions, ...) and turns\n\
                  trends, anomalies, channel gaps and forecasts into scored insights.\n\
                  \n\
                  Examples:\n\
                    bizpulse --data fixtures/acme.json analyze\n\
                    bizpulse --data fixtures/acme.json --json analyze --max 5\n\
                    bizpulse --data fixtures/acme.json trend --metric orders\n\
                    bizpulse --data fixtures/acme.json outliers --method iqr\n\
                    bizpulse --data fixtures/acme.json forecast --horizon 14\n\
                    bizpulse --data fixtures/acme.json seasonality --period 7\n\
                    bizpulse --data fixtures/acme.json correlate --metric sessions --with orders\n\
                  \n\
                  Environment Variables:\n\
                    BIZPULSE_DATA                    # Fixture file\n\
                    BIZPULSE_CONFIG                  # Engine config (TOML)\n\
                    BIZPULSE_LOG                     # Log filter (default: warn)"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// JSON fixture with organizations and metric series
    #[arg(long, env = "BIZPULSE_DATA")]
    data: PathBuf,

    /// Organization id (default: first in the fixture)
    #[arg(long)]
    org: Option<String>,

    /// Engine config (default: <config dir>/bizpulse/config.toml)
    #[arg(long, env = "BIZPULSE_CONFIG")]
    config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Debug logging
    #[arg(long, short = 'v', global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Run the full insights engine
    Analyze {
        /// Only keep insights touching these metrics (comma-separated)
        #[arg(long, value_delimiter = ',')]
        metrics: Vec<MetricKind>,
        /// Max insights
        #[arg(long, short = 'n')]
        max: Option<usize>,
        /// Minimum confidence (0-1)
        #[arg(long)]
        min_confidence: Option<f64>,
        /// Analysis window in days
        #[arg(long)]
        window: Option<u32>,
    },
    /// Linear trend of one metric
    Trend {
        #[arg(long, default_value = "revenue")]
        metric: MetricKind,
    },
    /// Outliers in one metric
    Outliers {
        #[arg(long, default_value = "revenue")]
        metric: MetricKind,
        /// zscore or iqr
        #[arg(long, default_value = "zscore")]
        method: OutlierMethod,
    },
    /// Forecast one metric
    Forecast {
        #[arg(long, default_value = "revenue")]
        metric: MetricKind,
        /// Days to forecast
        #[arg(long, default_value = "30")]
        horizon: usize,
    },
    /// Seasonal pattern of one metric
    Seasonality {
        #[arg(long, default_value = "revenue")]
        metric: MetricKind,
        /// Period in days
        #[arg(long, default_value = "7")]
        period: u32,
    },
    /// Correlation between two metrics
    Correlate {
        #[arg(long, default_value = "sessions")]
        metric: MetricKind,
        #[arg(long = "with")]
        other: MetricKind,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = load_config(cli.config.as_deref())?;
    let provider = Arc::new(
        InMemoryDataProvider::load(&cli.data)
            .with_context(|| format!("Failed to load fixture {}", cli.data.display()))?,
    );
    let org = resolve_org(&provider, cli.org)?;
    let as_of = provider
        .latest_timestamp(&org)
        .with_context(|| format!("Organization '{}' has no samples", org))?;

    match cli.command {
        Command::Analyze {
            metrics,
            max,
            min_confidence,
            window,
        } => {
            let mut options = GenerationOptions::new().as_of(as_of).with_metrics(metrics);
            options.max_insights = max;
            options.min_confidence = min_confidence;
            options.window_days = window;
            run_analyze(config, provider, org, options, cli.json).await?;
        }
        Command::Trend { metric } => {
            let series = fetch_daily(&provider, &org, metric, as_of, config.window_days).await?;
            let trend = calculate_trend(&series).ok_or(cli::CliError::NotEnoughData {
                metric,
                samples: series.len(),
                analysis: "trend",
            })?;
            println!("{}", cli::format_trend(metric, &trend, cli.json));
        }
        Command::Outliers { metric, method } => {
            let series = fetch_daily(&provider, &org, metric, as_of, config.window_days).await?;
            let outliers = detect_outliers(&series, method);
            println!("{}", cli::format_outliers(&outliers, cli.json));
        }
        Command::Forecast { metric, horizon } => {
            let series = fetch_daily(&provider, &org, metric, as_of, config.window_days).await?;
            let forecast =
                generate_forecast(&series, horizon).ok_or(cli::CliError::NotEnoughData {
                    metric,
                    samples: series.len(),
                    analysis: "forecast",
                })?;
            println!("{}", cli::format_forecast(&forecast, cli.json));
        }
        Command::Seasonality { metric, period } => {
            let series = fetch_daily(&provider, &org, metric, as_of, config.window_days).await?;
            let result =
                calculate_seasonality(&series, period).ok_or(cli::CliError::NotEnoughData {
                    metric,
                    samples: series.len(),
                    analysis: "seasonality",
                })?;
            println!("{}", cli::format_seasonality(&result, cli.json));
        }
        Command::Correlate { metric, other } => {
            let left = fetch_daily(&provider, &org, metric, as_of, config.window_days).await?;
            let right = fetch_daily(&provider, &org, other, as_of, config.window_days).await?;
            let result = perform_correlation_analysis(&left, &right).ok_or(
                cli::CliError::NotEnoughData {
                    metric: other,
                    samples: right.len(),
                    analysis: "correlation",
                },
            )?;
            println!(
                "{}",
                cli::format_correlation(metric, other, &result, cli.json)
            );
        }
    }

    Ok(())
}

/// Log to stderr, filtered by BIZPULSE_LOG (default warn)
fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env("BIZPULSE_LOG").unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Explicit path, then the user config dir, then defaults
fn load_config(explicit: Option<&Path>) -> Result<EngineConfig> {
    if let Some(path) = explicit {
        return EngineConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()));
    }
    match dirs::config_dir().map(|d| d.join("bizpulse").join("config.toml")) {
        Some(path) => EngineConfig::load_or_default(&path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => Ok(EngineConfig::default()),
    }
}

fn resolve_org(provider: &InMemoryDataProvider, requested: Option<String>) -> Result<OrgId> {
    let available = provider.organizations();
    match requested {
        Some(id) => {
            let org = OrgId::from(id);
            if available.contains(&org) {
                Ok(org)
            } else {
                Err(cli::CliError::UnknownOrg { org, available }.into())
            }
        }
        None => available
            .into_iter()
            .next()
            .context("Fixture contains no organizations"),
    }
}

async fn fetch_daily(
    provider: &InMemoryDataProvider,
    org: &OrgId,
    metric: MetricKind,
    as_of: DateTime<Utc>,
    window_days: u32,
) -> Result<Vec<MetricSample>> {
    let range = DateRange::ending_at(as_of, window_days);
    let samples = provider
        .fetch_series(org, metric, &range)
        .await
        .with_context(|| format!("Failed to fetch {} for {}", metric, org))?;
    Ok(daily_totals(&samples))
}

async fn run_analyze(
    config: EngineConfig,
    provider: Arc<InMemoryDataProvider>,
    org: OrgId,
    options: GenerationOptions,
    json: bool,
) -> Result<()> {
    let engine = InsightsEngine::new(config, provider).context("Invalid engine config")?;

    if !json {
        eprint!("Analyzing {}... ", org);
    }
    let outcome = engine
        .generate_insights(&org, options)
        .await
        .with_context(|| format!("Insight generation failed for {}", org))?;
    if !json {
        eprintln!(
            "✓ {} insights from {} metrics",
            outcome.insights.len(),
            outcome.analyzed_metrics.len()
        );
    }

    println!("{}", cli::format_outcome(&outcome, json));
    Ok(())
}
