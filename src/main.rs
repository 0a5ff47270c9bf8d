//! Quant Pipeline CLI
//!
//! Command-line interface for fetching bars, running the regime-aware signal
//! pipeline and analysing portfolio value series

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use colored::Colorize;
use quant_pipeline::{
    api::YahooClient,
    portfolio::{compute_stats, ValueSeries},
    signals::Signal,
    BarSeries, Pipeline, PipelineConfig, PipelineReport,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "quant_pipeline")]
#[command(about = "Regime-aware directional signals with HMM regimes and a vectorized backtest")]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch daily bars from Yahoo Finance
    Fetch {
        /// Ticker symbol (e.g., SPY)
        #[arg(short, long)]
        ticker: Option<String>,

        /// First date (YYYY-MM-DD)
        #[arg(long)]
        start: Option<NaiveDate>,

        /// End date, exclusive (YYYY-MM-DD)
        #[arg(long)]
        end: Option<NaiveDate>,

        /// Output CSV path
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Run features, regimes, signals and backtest
    Run {
        /// Ticker symbol (e.g., SPY)
        #[arg(short, long)]
        ticker: Option<String>,

        /// First date (YYYY-MM-DD)
        #[arg(long)]
        start: Option<NaiveDate>,

        /// End date, exclusive (YYYY-MM-DD)
        #[arg(long)]
        end: Option<NaiveDate>,

        /// Read bars from CSV instead of fetching
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Signal threshold in (0.5, 1.0]
        #[arg(long)]
        threshold: Option<f64>,

        /// Write the full report as JSON
        #[arg(long)]
        json: Option<PathBuf>,
    },

    /// Statistics of a Date,Value CSV
    Portfolio {
        /// Input CSV file
        #[arg(short, long)]
        input: PathBuf,

        /// Write the report as JSON
        #[arg(long)]
        json: Option<PathBuf>,
    },

    /// Write the default configuration
    InitConfig {
        /// Output TOML path
        #[arg(short, long, default_value = "pipeline.toml")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => PipelineConfig::default(),
    };

    // Initialize logging
    let directive = format!("quant_pipeline={}", config.logging.level);
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(directive.parse()?))
        .init();

    match cli.command {
        Commands::Fetch {
            ticker,
            start,
            end,
            output,
        } => {
            let config = with_run_overrides(config, ticker, start, end, None);
            fetch_data(&config, &output).await?;
        }
        Commands::Run {
            ticker,
            start,
            end,
            input,
            threshold,
            json,
        } => {
            let config = with_run_overrides(config, ticker, start, end, threshold);
            run_pipeline(config, input.as_deref(), json.as_deref()).await?;
        }
        Commands::Portfolio { input, json } => {
            analyse_portfolio(&config, &input, json.as_deref())?;
        }
        Commands::InitConfig { output } => {
            config
                .save(&output)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            println!("{}", format!("Wrote {}", output.display()).green());
        }
    }

    Ok(())
}

/// Command-line flags take precedence over the configuration file
fn with_run_overrides(
    mut config: PipelineConfig,
    ticker: Option<String>,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    threshold: Option<f64>,
) -> PipelineConfig {
    if let Some(ticker) = ticker {
        config.run.ticker = ticker;
    }
    if let Some(start) = start {
        config.run.start = start;
    }
    if let Some(end) = end {
        config.run.end = end;
    }
    if let Some(threshold) = threshold {
        config.run.threshold = threshold;
    }
    config
}

async fn download(config: &PipelineConfig) -> Result<BarSeries> {
    let run = &config.run;
    println!(
        "{}",
        format!("Fetching {} from {} to {}...", run.ticker, run.start, run.end).cyan()
    );

    let client = YahooClient::new(config.data.timeout_secs, config.data.max_retries)?;
    let bars = client
        .get_daily_bars(&run.ticker, run.start, run.end)
        .await
        .with_context(|| format!("Failed to fetch bars for {}", run.ticker))?;

    Ok(BarSeries::new(&run.ticker, bars)?)
}

async fn fetch_data(config: &PipelineConfig, output: &Path) -> Result<()> {
    let series = download(config).await?;
    println!(
        "{}",
        format!("Fetched {} bars for {}", series.len(), series.symbol()).green()
    );

    series.to_csv(output)?;
    println!("{}", format!("Saved to {}", output.display()).green());

    // Show last few bars
    println!("\nLast 5 bars:");
    for bar in series.bars().iter().rev().take(5).rev() {
        let change = (bar.close - bar.open) / bar.open * 100.0;
        let change_str = if change >= 0.0 {
            format!("+{:.2}%", change).green()
        } else {
            format!("{:.2}%", change).red()
        };
        println!(
            "  {} | O: {:.2} H: {:.2} L: {:.2} C: {:.2} | {}",
            bar.date, bar.open, bar.high, bar.low, bar.close, change_str
        );
    }

    Ok(())
}

async fn run_pipeline(
    config: PipelineConfig,
    input: Option<&Path>,
    json: Option<&Path>,
) -> Result<()> {
    let pipeline = Pipeline::new(config)?;

    let series = match input {
        Some(path) => {
            println!("{}", format!("Loading {}...", path.display()).cyan());
            BarSeries::from_csv(path, &pipeline.config().run.ticker)?
        }
        None => download(pipeline.config()).await?,
    };
    println!("Loaded {} bars", series.len());

    println!("{}", "Running pipeline...".cyan());
    let report = pipeline.run(&series)?;
    print_report(&report);

    if let Some(path) = json {
        write_json(&report, path)?;
    }

    Ok(())
}

fn print_report(report: &PipelineReport) {
    println!("\n{}", format!("=== Regimes ({}) ===", report.symbol).bold());
    for summary in &report.regimes.summaries {
        println!("{}", summary);
    }
    if let Some(current) = report.regimes.labels.current() {
        println!("  Current regime: {}", format!("State {}", current).bold());
    }

    println!("\n{}", "=== Direction Model ===".bold());
    println!(
        "  In-sample accuracy: {:.1}% ({} rows)",
        report.training.accuracy * 100.0,
        report.training.actual.len()
    );
    println!("  Intercept: {:.6}", report.training.intercept);
    for importance in report.training.ranked() {
        println!("  {:10} {:>12.6}", importance.feature, importance.coefficient);
    }

    let signals = &report.signals;
    println!("\n{}", "=== Signals ===".bold());
    println!(
        "  Long: {}  Flat: {}  Short: {}",
        signals.count(Signal::Long),
        signals.count(Signal::Flat),
        signals.count(Signal::Short)
    );
    if let Some(latest) = signals.latest() {
        let latest_str = match latest {
            Signal::Long => latest.to_string().green(),
            Signal::Flat => latest.to_string().yellow(),
            Signal::Short => latest.to_string().red(),
        };
        println!("  Latest: {}", latest_str);
    }

    println!("\n{}", "=== Strategy Results ===".bold().green());
    report.backtest.stats.print_summary();

    println!("\n{}", "=== Buy & Hold Benchmark ===".bold().yellow());
    report.benchmark.stats.print_summary();

    // Comparison
    println!("\n{}", "=== Comparison ===".bold());
    let alpha = report.backtest.stats.cumulative_return - report.benchmark.stats.cumulative_return;
    let alpha_str = if alpha >= 0.0 {
        format!("+{:.2}%", alpha * 100.0).green()
    } else {
        format!("{:.2}%", alpha * 100.0).red()
    };
    println!("  Alpha vs Buy&Hold: {}", alpha_str);
    println!(
        "  Drawdown Improvement: {:.2}%",
        (report.backtest.stats.max_drawdown - report.benchmark.stats.max_drawdown) * 100.0
    );
}

fn analyse_portfolio(config: &PipelineConfig, input: &Path, json: Option<&Path>) -> Result<()> {
    println!("{}", format!("Loading {}...", input.display()).cyan());
    let series = ValueSeries::from_csv(input)?;
    println!("Loaded {} observations", series.len());

    let report = compute_stats(&series, config.backtest.periods_per_year);
    println!("\n{}", "=== Portfolio ===".bold());
    println!("{}", report);

    if let Some(path) = json {
        write_json(&report, path)?;
    }

    Ok(())
}

fn write_json<T: Serialize>(value: &T, path: &Path) -> Result<()> {
    let content = serde_json::to_string_pretty(value)?;
    std::fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
    println!("{}", format!("Saved report to {}", path.display()).green());
    Ok(())
}
