//! Historical closing prices from the Yahoo Finance chart API.
//!
//! This module handles:
//! - Validating the tickers and date range of a download
//! - Fetching one ticker's daily closes per request
//! - Merging every ticker into a forward-filled [`PriceTable`]

use chrono::{DateTime, Days, NaiveDate, NaiveTime};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::{REQUEST_PAUSE_MS, REQUEST_TIMEOUT_SECS, YAHOO_BASE_URL};
use crate::error::{FrontierError, Result};
use crate::prices::PriceTable;

static TICKER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\^?[A-Z0-9][A-Z0-9.\-=]{0,14}$").expect("ticker pattern compiles"));

/// Tickers and the closed date interval to download.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    pub tickers: Vec<String>,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl FetchRequest {
    /// Upper-cases the tickers and rejects empty lists, malformed or repeated
    /// symbols, and `start > end`.
    pub fn new<S: AsRef<str>>(tickers: &[S], start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if tickers.is_empty() {
            return Err(FrontierError::InvalidRequest("ticker list is empty".into()));
        }
        if start > end {
            return Err(FrontierError::InvalidRequest(format!(
                "start date {} is after end date {}",
                start, end
            )));
        }

        let mut seen = HashSet::new();
        let mut normalized = Vec::with_capacity(tickers.len());
        for raw in tickers {
            let ticker = raw.as_ref().trim().to_uppercase();
            if !TICKER_RE.is_match(&ticker) {
                return Err(FrontierError::InvalidRequest(format!("malformed ticker '{}'", raw.as_ref())));
            }
            if !seen.insert(ticker.clone()) {
                return Err(FrontierError::InvalidRequest(format!("duplicate ticker '{}'", ticker)));
            }
            normalized.push(ticker);
        }

        Ok(FetchRequest { tickers: normalized, start, end })
    }
}

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
    #[serde(default)]
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    meta: ChartMeta,
    // Absent when the range holds no trading days
    #[serde(default)]
    timestamp: Vec<i64>,
    #[serde(default)]
    indicators: Indicators,
}

#[derive(Debug, Default, Deserialize)]
struct ChartMeta {
    /// Exchange offset from UTC in seconds.
    #[serde(default)]
    gmtoffset: i64,
}

#[derive(Debug, Default, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<Quote>,
    // Split- and dividend-adjusted closes; missing for some instruments
    #[serde(default)]
    adjclose: Vec<AdjClose>,
}

#[derive(Debug, Default, Deserialize)]
struct AdjClose {
    #[serde(default)]
    adjclose: Vec<Option<f64>>,
}

#[derive(Debug, Default, Deserialize)]
struct Quote {
    #[serde(default)]
    close: Vec<Option<f64>>,
}

pub struct YahooClient {
    http: Client,
    base_url: String,
    pause: Duration,
}

impl YahooClient {
    pub fn new() -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            // The chart endpoint rejects requests without a browser-like agent
            .user_agent("Mozilla/5.0 (compatible; frontier-tools)")
            .build()?;

        Ok(YahooClient {
            http,
            base_url: YAHOO_BASE_URL.to_string(),
            pause: Duration::from_millis(REQUEST_PAUSE_MS),
        })
    }

    /// Point the client at another host (a mock server in tests).
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    #[must_use]
    pub fn with_pause(mut self, pause: Duration) -> Self {
        self.pause = pause;
        self
    }

    /// Daily closes of `ticker` for every trading day in `[start, end]`.
    ///
    /// Days the provider reports without a close are kept as `None`.
    pub async fn fetch_daily_closes(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<(NaiveDate, Option<f64>)>> {
        let period1 = start.and_time(NaiveTime::MIN).and_utc().timestamp();
        // period2 is exclusive upstream; move it past `end` so the end day is included
        let period2 = end
            .checked_add_days(Days::new(1))
            .ok_or_else(|| FrontierError::InvalidRequest(format!("end date {} out of range", end)))?
            .and_time(NaiveTime::MIN)
            .and_utc()
            .timestamp();

        let url = format!("{}/v8/finance/chart/{}", self.base_url, ticker);
        debug!(%url, period1, period2, "requesting chart");

        let resp = self
            .http
            .get(&url)
            .query(&[
                ("period1", period1.to_string()),
                ("period2", period2.to_string()),
                ("interval", "1d".to_string()),
                ("events", "history".to_string()),
            ])
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await?;

        let parsed = serde_json::from_str::<ChartResponse>(&text);
        if let Ok(ChartResponse { chart: Chart { error: Some(err), .. } }) = &parsed {
            return Err(FrontierError::Provider {
                ticker: ticker.to_string(),
                message: format!("{}: {}", err.code, err.description),
            });
        }
        if !status.is_success() {
            return Err(FrontierError::Provider {
                ticker: ticker.to_string(),
                message: format!("something went wrong when requesting [CODE: {}]: {}", status, text),
            });
        }

        let result = parsed?
            .chart
            .result
            .and_then(|r| r.into_iter().next())
            .ok_or_else(|| FrontierError::Provider {
                ticker: ticker.to_string(),
                message: "response carried no chart result".into(),
            })?;

        let series = extract_close_prices(ticker, result)?;
        Ok(series
            .into_iter()
            .filter(|(date, _)| *date >= start && *date <= end)
            .collect())
    }

    /// Download every ticker of `request` and forward-fill the merged table.
    ///
    /// Any failed ticker aborts the whole download.
    pub async fn download_closes(&self, request: &FetchRequest) -> Result<PriceTable> {
        let mut table = PriceTable::new(request.tickers.clone());
        let total = request.tickers.len();

        for (i, ticker) in request.tickers.iter().enumerate() {
            if i > 0 && !self.pause.is_zero() {
                // polite pause to avoid throttling
                tokio::time::sleep(self.pause).await;
            }

            info!("[{}/{}] fetching {} ({} to {})", i + 1, total, ticker, request.start, request.end);
            let series = self.fetch_daily_closes(ticker, request.start, request.end).await?;
            if series.is_empty() {
                warn!("no trading days returned for {}", ticker);
            }
            table.insert_series(ticker, &series);
        }

        table.forward_fill();
        info!("downloaded {} trading days for {} tickers", table.len(), total);
        Ok(table)
    }
}

/// Pair each bar's timestamp with its close, dated on the exchange's calendar.
///
/// Adjusted closes are preferred; raw closes are the fallback.
fn extract_close_prices(ticker: &str, result: ChartResult) -> Result<Vec<(NaiveDate, Option<f64>)>> {
    let provider_err = |message: String| FrontierError::Provider { ticker: ticker.to_string(), message };

    if result.timestamp.is_empty() {
        return Ok(Vec::new());
    }

    let Indicators { quote, adjclose } = result.indicators;
    let adjusted = adjclose.into_iter().next().map(|a| a.adjclose).unwrap_or_default();
    let closes = if adjusted.is_empty() {
        debug!("no adjusted closes for {}, using raw closes", ticker);
        quote.into_iter().next().map(|q| q.close).unwrap_or_default()
    } else {
        adjusted
    };
    if closes.len() != result.timestamp.len() {
        return Err(provider_err(format!(
            "{} timestamps but {} closes",
            result.timestamp.len(),
            closes.len()
        )));
    }

    result
        .timestamp
        .iter()
        .zip(closes)
        .map(|(&ts, close)| {
            let date = DateTime::from_timestamp(ts + result.meta.gmtoffset, 0)
                .ok_or_else(|| provider_err(format!("timestamp {} out of range", ts)))?
                .date_naive();
            Ok((date, close.filter(|c| c.is_finite())))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Weekday};
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    // 09:30 New York, expressed in UTC
    fn open_ts(date: NaiveDate) -> i64 {
        date.and_hms_opt(14, 30, 0).unwrap().and_utc().timestamp()
    }

    fn chart_body(bars: &[(NaiveDate, Option<f64>)]) -> serde_json::Value {
        json!({
            "chart": {
                "result": [{
                    "meta": { "currency": "USD", "gmtoffset": -18000 },
                    "timestamp": bars.iter().map(|(d, _)| open_ts(*d)).collect::<Vec<_>>(),
                    "indicators": { "quote": [{ "close": bars.iter().map(|(_, c)| *c).collect::<Vec<_>>() }] }
                }],
                "error": null
            }
        })
    }

    fn test_client(server: &MockServer) -> YahooClient {
        YahooClient::new().unwrap().with_base_url(server.uri()).with_pause(Duration::ZERO)
    }

    #[test]
    fn test_request_validation() {
        let start = d(2020, 1, 1);
        let end = d(2020, 1, 10);

        let req = FetchRequest::new(&["aapl", " msft "], start, end).unwrap();
        assert_eq!(req.tickers, vec!["AAPL", "MSFT"]);
        assert!(FetchRequest::new(&["BRK.B", "^GSPC"], start, end).is_ok());

        let empty: [&str; 0] = [];
        assert!(FetchRequest::new(&empty, start, end).is_err());
        assert!(FetchRequest::new(&["AAPL"], end, start).is_err());
        assert!(FetchRequest::new(&["AA PL"], start, end).is_err());
        assert!(FetchRequest::new(&["AAPL", "aapl"], start, end).is_err());
        assert!(FetchRequest::new(&["AAPL"], start, start).is_ok());
    }

    #[test]
    fn test_index_symbols_accept_one_leading_caret() {
        let start = d(2020, 1, 1);
        let end = d(2020, 1, 10);

        let req = FetchRequest::new(&["^gspc", "^VIX", "ES=F"], start, end).unwrap();
        assert_eq!(req.tickers, vec!["^GSPC", "^VIX", "ES=F"]);

        assert!(FetchRequest::new(&["^^GSPC"], start, end).is_err());
        assert!(FetchRequest::new(&["^"], start, end).is_err());
        assert!(FetchRequest::new(&["GS^PC"], start, end).is_err());
    }

    #[tokio::test]
    async fn test_single_ticker_download_has_trading_days_only() {
        let server = MockServer::start().await;
        let trading_days = [
            (d(2020, 1, 2), Some(75.09)),
            (d(2020, 1, 3), Some(74.36)),
            (d(2020, 1, 6), Some(74.95)),
            (d(2020, 1, 7), Some(74.60)),
            (d(2020, 1, 8), Some(75.80)),
            (d(2020, 1, 9), Some(77.41)),
            (d(2020, 1, 10), Some(77.58)),
        ];

        Mock::given(method("GET"))
            .and(path("/v8/finance/chart/AAPL"))
            .and(query_param("interval", "1d"))
            .and(query_param("period1", "1577836800"))
            .and(query_param("period2", "1578700800"))
            .respond_with(ResponseTemplate::new(200).set_body_json(chart_body(&trading_days)))
            .expect(1)
            .mount(&server)
            .await;

        let request = FetchRequest::new(&["AAPL"], d(2020, 1, 1), d(2020, 1, 10)).unwrap();
        let table = test_client(&server).download_closes(&request).await.unwrap();

        assert_eq!(table.tickers(), &["AAPL"]);
        assert_eq!(table.len(), 7);
        assert!(table
            .dates()
            .all(|d| !matches!(d.weekday(), Weekday::Sat | Weekday::Sun)));

        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("stocks.csv");
        table.write_csv(&out).unwrap();
        let text = std::fs::read_to_string(&out).unwrap();
        assert!(text.starts_with("Date,AAPL\n2020-01-02,75.09\n"));
        assert!(text.trim_end().ends_with("2020-01-10,77.58"));
    }

    #[tokio::test]
    async fn test_gaps_are_forward_filled_across_tickers() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v8/finance/chart/AAPL"))
            .respond_with(ResponseTemplate::new(200).set_body_json(chart_body(&[
                (d(2020, 1, 2), Some(75.09)),
                (d(2020, 1, 3), None),
                (d(2020, 1, 6), Some(74.95)),
            ])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v8/finance/chart/TSLA"))
            .respond_with(ResponseTemplate::new(200).set_body_json(chart_body(&[
                (d(2020, 1, 3), Some(29.53)),
                (d(2020, 1, 6), Some(30.10)),
            ])))
            .mount(&server)
            .await;

        let request = FetchRequest::new(&["AAPL", "TSLA"], d(2020, 1, 1), d(2020, 1, 10)).unwrap();
        let table = test_client(&server).download_closes(&request).await.unwrap();

        assert_eq!(table.column("AAPL").unwrap(), vec![Some(75.09), Some(75.09), Some(74.95)]);
        assert_eq!(table.column("TSLA").unwrap(), vec![None, Some(29.53), Some(30.10)]);
    }

    #[tokio::test]
    async fn test_adjusted_closes_preferred_over_raw() {
        let server = MockServer::start().await;
        let days = [d(2020, 1, 2), d(2020, 1, 3)];
        Mock::given(method("GET"))
            .and(path("/v8/finance/chart/AAPL"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "chart": {
                    "result": [{
                        "meta": { "gmtoffset": -18000 },
                        "timestamp": days.iter().map(|d| open_ts(*d)).collect::<Vec<_>>(),
                        "indicators": {
                            "quote": [{ "close": [300.35, 297.43] }],
                            "adjclose": [{ "adjclose": [73.84, 73.12] }]
                        }
                    }],
                    "error": null
                }
            })))
            .mount(&server)
            .await;

        let series = test_client(&server)
            .fetch_daily_closes("AAPL", d(2020, 1, 1), d(2020, 1, 10))
            .await
            .unwrap();
        assert_eq!(series, vec![(days[0], Some(73.84)), (days[1], Some(73.12))]);
    }

    #[tokio::test]
    async fn test_bars_outside_range_are_dropped() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v8/finance/chart/AAPL"))
            .respond_with(ResponseTemplate::new(200).set_body_json(chart_body(&[
                (d(2020, 1, 9), Some(77.41)),
                (d(2020, 1, 10), Some(77.58)),
                (d(2020, 1, 13), Some(78.99)),
            ])))
            .mount(&server)
            .await;

        let series = test_client(&server)
            .fetch_daily_closes("AAPL", d(2020, 1, 1), d(2020, 1, 10))
            .await
            .unwrap();
        assert_eq!(series, vec![(d(2020, 1, 9), Some(77.41)), (d(2020, 1, 10), Some(77.58))]);
    }

    #[tokio::test]
    async fn test_provider_error_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v8/finance/chart/NOPE"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "chart": {
                    "result": null,
                    "error": { "code": "Not Found", "description": "No data found, symbol may be delisted" }
                }
            })))
            .mount(&server)
            .await;

        let err = test_client(&server)
            .fetch_daily_closes("NOPE", d(2020, 1, 1), d(2020, 1, 10))
            .await
            .unwrap_err();
        match err {
            FrontierError::Provider { ticker, message } => {
                assert_eq!(ticker, "NOPE");
                assert!(message.contains("symbol may be delisted"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_one_failure_aborts_download() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v8/finance/chart/AAPL"))
            .respond_with(ResponseTemplate::new(200).set_body_json(chart_body(&[(d(2020, 1, 2), Some(75.09))])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v8/finance/chart/MSFT"))
            .respond_with(ResponseTemplate::new(500).set_body_string("upstream unavailable"))
            .mount(&server)
            .await;

        let request = FetchRequest::new(&["AAPL", "MSFT"], d(2020, 1, 1), d(2020, 1, 10)).unwrap();
        let err = test_client(&server).download_closes(&request).await.unwrap_err();
        assert!(err.to_string().contains("500"));
    }

    #[tokio::test]
    async fn test_empty_range_yields_no_rows() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v8/finance/chart/AAPL"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "chart": {
                    "result": [{ "meta": { "gmtoffset": -18000 }, "indicators": { "quote": [{}] } }],
                    "error": null
                }
            })))
            .mount(&server)
            .await;

        let series = test_client(&server)
            .fetch_daily_closes("AAPL", d(2020, 1, 4), d(2020, 1, 5))
            .await
            .unwrap();
        assert!(series.is_empty());
    }
}
