use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::error;

use frontier_tools::stocks::{FetchRequest, YahooClient};
use frontier_tools::{config, frontier, returns, visualisation};

#[derive(Parser)]
#[command(name = "frontier")]
#[command(about = "Stock price download and efficient-frontier charting", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download daily closing prices to CSV
    Fetch(FetchArgs),
    /// Append daily log-return columns to a price CSV
    Returns(ReturnsArgs),
    /// Chart Monte Carlo results with the max-Sharpe portfolio highlighted
    Plot(PlotArgs),
}

#[derive(Args)]
struct FetchArgs {
    /// Comma-separated ticker symbols
    #[arg(long, value_delimiter = ',', env = "FRONTIER_TICKERS", default_values_t = config::default_tickers())]
    tickers: Vec<String>,
    /// First day to download (YYYY-MM-DD)
    #[arg(long, env = "FRONTIER_START", default_value = config::DEFAULT_START_DATE)]
    start: String,
    /// Last day to download, inclusive (YYYY-MM-DD)
    #[arg(long, env = "FRONTIER_END", default_value = config::DEFAULT_END_DATE)]
    end: String,
    /// Output CSV file path
    #[arg(short, long, env = "FRONTIER_PRICES", default_value = config::PRICES_CSV)]
    output: PathBuf,
    /// Market-data API base URL
    #[arg(long, env = "FRONTIER_BASE_URL", default_value = config::YAHOO_BASE_URL)]
    base_url: String,
}

#[derive(Args)]
struct ReturnsArgs {
    /// Price CSV to read
    #[arg(short, long, env = "FRONTIER_PRICES", default_value = config::PRICES_CSV)]
    input: PathBuf,
    /// Output CSV file path
    #[arg(short, long, env = "FRONTIER_RETURNS", default_value = config::RETURNS_CSV)]
    output: PathBuf,
}

#[derive(Args)]
struct PlotArgs {
    /// Monte Carlo results CSV (needs Risk, Return and Sharpe columns)
    #[arg(short, long, env = "FRONTIER_RESULTS", default_value = config::RESULTS_CSV)]
    input: PathBuf,
    /// Output HTML file path
    #[arg(short, long, env = "FRONTIER_HTML", default_value = config::VISUALISATION_HTML)]
    output: PathBuf,
    /// Only write the HTML file, do not open a browser
    #[arg(long)]
    no_show: bool,
}

async fn download_prices(args: &FetchArgs) -> anyhow::Result<()> {
    let start = config::parse_date(&args.start)?;
    let end = config::parse_date(&args.end)?;
    let request = FetchRequest::new(args.tickers.as_slice(), start, end)?;

    let client = YahooClient::new()?.with_base_url(args.base_url.as_str());
    let table = client.download_closes(&request).await?;
    table
        .write_csv(&args.output)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;
    Ok(())
}

/// Runs the download and turns its outcome into the line printed to the user.
async fn run_fetch(args: &FetchArgs) -> String {
    match download_prices(args).await {
        Ok(()) => format!("Downloaded and saved close prices to {}", args.output.display()),
        Err(e) => {
            error!("download failed: {:#}", e);
            format!("Error downloading data: {:#}", e)
        }
    }
}

/// Builds the chart and writes the HTML file. Showing it is left to the caller,
/// so the file exists even when the viewer never returns.
fn plot_frontier(args: &PlotArgs) -> anyhow::Result<visualisation::FrontierPlot> {
    let rows = frontier::load_results(&args.input)
        .with_context(|| format!("Failed to load {}", args.input.display()))?;
    let fig = visualisation::frontier_plot(&rows)?;

    fig.write_html(&args.output)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;
    Ok(fig)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        // a failed download is reported, never propagated
        Commands::Fetch(args) => println!("{}", run_fetch(&args).await),
        Commands::Returns(args) => {
            returns::append_daily_returns(&args.input, &args.output)
                .with_context(|| format!("Failed to process {}", args.input.display()))?;
            println!("Saved CSV with daily log returns: {}", args.output.display());
        }
        Commands::Plot(args) => {
            let fig = plot_frontier(&args)?;
            if !args.no_show {
                fig.show();
            }
        }
    }

    Ok(())
}
