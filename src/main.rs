use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use comfy_table::{presets::UTF8_FULL, Table};
use configuration::{Settings, ShareMode};
use indicatif::{ProgressBar, ProgressStyle};
use market_data::CsvDirectoryProvider;
use pipeline::{OptimizeRequest, PortfolioPipeline};
use rust_decimal::Decimal;
use serde::Serialize;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// The main entry point for the MarketMatch portfolio builder.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // An optional .env file may carry MARKETMATCH_* overrides.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let mut settings = match &cli.config {
        Some(path) => configuration::load_config_from(path)?,
        None => configuration::load_config()?,
    };
    cli.window.apply(&mut settings)?;
    let _guard = configuration::init_tracing(&settings.logging)?;
    tracing::debug!(
        data_dir = %settings.market_data.data_dir.display(),
        start = %settings.market_data.start_date,
        end = %settings.market_data.end_date,
        "Configuration loaded."
    );

    match cli.command {
        Commands::Serve(args) => {
            if let Some(port) = args.port {
                settings.server.port = port;
            }
            web_server::run_server(settings).await?;
        }
        Commands::Filter(args) => {
            let tickers = args.resolve()?;
            let pipeline = open_pipeline(settings)?;
            let report = with_spinner("Filtering universe...", pipeline.filter_stocks(&tickers)).await?;
            if args.json {
                return print_json(&report);
            }
            let mut table = table(&["Ticker", "Status", "Reason"]);
            for ticker in &report.accepted {
                table.add_row(vec![ticker.as_str(), "accepted", ""]);
            }
            for rejected in &report.rejected {
                table.add_row(vec![rejected.ticker.as_str(), rejected.code, rejected.reason.as_str()]);
            }
            println!("{table}");
            println!("{} accepted, {} removed", report.total_filtered, report.total_removed);
        }
        Commands::Rate(args) => {
            let tickers = args.resolve()?;
            let pipeline = open_pipeline(settings)?;
            let report = with_spinner("Rating candidates...", pipeline.rate_stocks(&tickers)).await?;
            if args.json {
                return print_json(&report);
            }
            let mut table = table(&["#", "Ticker", "Score", "Cap", "Return", "Tracking"]);
            for (rank, c) in report.ratings.iter().enumerate() {
                table.add_row(vec![
                    (rank + 1).to_string(),
                    c.ticker.clone(),
                    format!("{:.4}", c.score),
                    format!("{:.4}", c.cap_score),
                    format!("{:.4}", c.return_score),
                    format!("{:.4}", c.tracking_score),
                ]);
            }
            println!("{table}");
        }
        Commands::Optimize(args) => {
            let tickers = args.tickers.resolve()?;
            if let Some(mode) = args.share_mode {
                settings.allocation.share_mode = mode;
            }
            let pipeline = open_pipeline(settings)?;
            let request = OptimizeRequest {
                tickers,
                num_stocks: args.num_stocks,
                budget: args.budget,
            };
            let report = with_spinner("Optimizing portfolio...", pipeline.optimize_portfolio(&request)).await?;
            if args.tickers.json {
                return print_json(&report);
            }
            let mut table = table(&["Ticker", "Shares", "Price", "Value", "Fee", "Weight %", "Target %", "Rating"]);
            for line in &report.portfolio {
                table.add_row(vec![
                    line.ticker.clone(),
                    line.shares.to_string(),
                    line.price.to_string(),
                    line.value.round_dp(2).to_string(),
                    line.fee.round_dp(2).to_string(),
                    format!("{:.2}", line.weight),
                    format!("{:.2}", line.target_weight),
                    format!("{:.4}", line.rating),
                ]);
            }
            println!("{table}");

            let s = &report.summary;
            println!("Invested:      {} (fees {})", s.total_value.round_dp(2), s.total_fees.round_dp(2));
            println!("Leftover cash: {}", s.leftover_cash.round_dp(2));
            println!("Return:        {:.2}% vs benchmark {:.2}%", s.portfolio_return, report.tracking.benchmark_return);
            match report.tracking.correlation {
                Some(c) => println!("Correlation:   {:.4}", c),
                None => println!("Correlation:   undefined"),
            }
            println!("Tracking err:  {:.6}", report.tracking.tracking_error);
            for warning in &report.tracking.warnings {
                println!("warning: {}", warning);
            }
        }
        Commands::MarketData(args) => {
            let pipeline = open_pipeline(settings)?;
            let report = with_spinner("Loading benchmark...", pipeline.market_data()).await?;
            if args.json {
                return print_json(&report);
            }
            let mut table = table(&["Index", "Return %"]);
            for (key, value) in &report.performance.per_index {
                table.add_row(vec![key.trim_end_matches("_return").to_string(), format!("{:.2}", value)]);
            }
            table.add_row(vec!["average".to_string(), format!("{:.2}", report.performance.avg_return)]);
            println!("{table}");
        }
    }

    Ok(())
}

// ==============================================================================
// CLI Structure
// ==============================================================================

/// Builds stock portfolios that track a blended market benchmark.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the configuration file (defaults to ./config.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(flatten)]
    window: WindowArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API.
    Serve(ServeArgs),
    /// Show which tickers pass the universe filter.
    Filter(TickerArgs),
    /// Rate the tickers that pass the filter.
    Rate(TickerArgs),
    /// Build and allocate a tracking portfolio.
    Optimize(OptimizeArgs),
    /// Show benchmark performance over the window.
    MarketData(OutputArgs),
}

/// Overrides for the market data section of the configuration.
#[derive(Args)]
struct WindowArgs {
    /// Directory holding instruments.csv, fx.csv and prices/.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// First day of the historical window (YYYY-MM-DD).
    #[arg(long, global = true)]
    start: Option<NaiveDate>,

    /// Last day of the historical window (YYYY-MM-DD).
    #[arg(long, global = true)]
    end: Option<NaiveDate>,
}

impl WindowArgs {
    fn apply(&self, settings: &mut Settings) -> anyhow::Result<()> {
        if let Some(dir) = &self.data_dir {
            settings.market_data.data_dir = dir.clone();
        }
        if let Some(start) = self.start {
            settings.market_data.start_date = start;
        }
        if let Some(end) = self.end {
            settings.market_data.end_date = end;
        }
        settings.validate()?;
        Ok(())
    }
}

#[derive(Args)]
struct ServeArgs {
    /// Overrides `server.port`.
    #[arg(long)]
    port: Option<u16>,
}

#[derive(Args)]
struct OutputArgs {
    /// Print the raw JSON report instead of a table.
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct TickerArgs {
    /// Comma separated tickers, e.g. "RY.TO,AAPL".
    #[arg(long, value_delimiter = ',', conflicts_with = "file")]
    tickers: Vec<String>,

    /// A CSV file whose first column holds the tickers.
    #[arg(long)]
    file: Option<PathBuf>,

    /// Print the raw JSON report instead of a table.
    #[arg(long)]
    json: bool,
}

impl TickerArgs {
    fn resolve(&self) -> anyhow::Result<Vec<String>> {
        match &self.file {
            Some(path) => {
                let file = std::fs::File::open(path)?;
                Ok(market_data::parse_ticker_csv(file)?)
            }
            None => Ok(self.tickers.clone()),
        }
    }
}

#[derive(Args)]
struct OptimizeArgs {
    #[command(flatten)]
    tickers: TickerArgs,

    /// Number of positions (defaults to `optimizer.num_stocks`).
    #[arg(long)]
    num_stocks: Option<usize>,

    /// Cash to invest in the base currency (defaults to `allocation.default_budget`).
    #[arg(long)]
    budget: Option<Decimal>,

    /// Overrides `allocation.share_mode`.
    #[arg(long, value_enum)]
    share_mode: Option<ShareMode>,
}

// ==============================================================================
// Helpers
// ==============================================================================

fn open_pipeline(settings: Settings) -> anyhow::Result<PortfolioPipeline> {
    let provider = CsvDirectoryProvider::open(&settings.market_data.data_dir)?;
    Ok(PortfolioPipeline::new(Arc::new(provider), settings))
}

/// Runs `task` behind a terminal spinner.
async fn with_spinner<T, E>(message: &'static str, task: impl Future<Output = Result<T, E>>) -> anyhow::Result<T>
where
    E: std::error::Error + Send + Sync + 'static,
{
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?);
    spinner.set_message(message);
    spinner.enable_steady_tick(Duration::from_millis(120));
    let result = task.await;
    spinner.finish_and_clear();
    Ok(result?)
}

fn table(header: &[&str]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(header.to_vec());
    table
}

fn print_json<T: Serialize>(report: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}
