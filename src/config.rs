//! Default parameters for every pipeline.
//!
//! Each value can be overridden from the command line or a `FRONTIER_*`
//! environment variable; see `main.rs`.

use chrono::NaiveDate;

use crate::error::{FrontierError, Result};

/// Tickers downloaded when `--tickers` is not given.
pub const DEFAULT_TICKERS: &[&str] = &[
    "AAPL", "MSFT", "GOOGL", "AMZN", "TSLA",
    "AMD", "NFLX", "NVDA", "JPM", "DIS",
];

pub const DEFAULT_START_DATE: &str = "2011-01-01";
pub const DEFAULT_END_DATE: &str = "2025-05-31";

pub const PRICES_CSV: &str = "stocks.csv";
pub const RETURNS_CSV: &str = "stocks_with_DailyReturns.csv";
pub const RESULTS_CSV: &str = "MonteCarloResults.csv";
pub const VISUALISATION_HTML: &str = "Visualisation.html";

pub const YAHOO_BASE_URL: &str = "https://query1.finance.yahoo.com";
pub const REQUEST_TIMEOUT_SECS: u64 = 10;
// Pause between per-ticker requests to stay under the provider's throttle
pub const REQUEST_PAUSE_MS: u64 = 200;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

pub fn default_tickers() -> Vec<String> {
    DEFAULT_TICKERS.iter().map(|t| t.to_string()).collect()
}

/// Parse a `YYYY-MM-DD` calendar date.
pub fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT)
        .map_err(|e| FrontierError::InvalidRequest(format!("bad date '{}': {}", value, e)))
}
