//! Yahoo Finance chart API client
//!
//! Fetches daily OHLCV bars from the public v8 chart endpoint.
//!
//! # Example
//!
//! ```rust,no_run
//! use chrono::NaiveDate;
//! use quant_pipeline::api::YahooClient;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = YahooClient::new(30, 2)?;
//!     let start = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
//!     let end = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
//!     let bars = client.get_daily_bars("SPY", start, end).await?;
//!     println!("Got {} bars", bars.len());
//!     Ok(())
//! }
//! ```

use super::error::{ApiError, ApiResult};
use crate::data::Bar;
use chrono::{DateTime, NaiveDate};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;

/// Yahoo Finance API base URL
const BASE_URL: &str = "https://query1.finance.yahoo.com";

/// The chart endpoint rejects requests without a browser-like agent
const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko)";

/// First retry delay; doubles on every further attempt
const RETRY_BASE_DELAY_MS: u64 = 500;

/// Yahoo Finance client for fetching daily bars
#[derive(Debug, Clone)]
pub struct YahooClient {
    client: Client,
    base_url: String,
    max_retries: u32,
    /// Scale OHLC by the adjusted-close ratio (splits and dividends)
    adjust: bool,
}

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: ChartMeta,
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct ChartMeta {
    /// Exchange offset from UTC in seconds
    #[serde(default)]
    gmtoffset: i64,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<Quote>,
    #[serde(default)]
    adjclose: Vec<AdjClose>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Quote {
    open: Vec<Option<f64>>,
    high: Vec<Option<f64>>,
    low: Vec<Option<f64>>,
    close: Vec<Option<f64>>,
    volume: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct AdjClose {
    #[serde(default)]
    adjclose: Vec<Option<f64>>,
}

impl YahooClient {
    /// Create a client with a request timeout and a retry budget for
    /// transport failures
    pub fn new(timeout_secs: u64, max_retries: u32) -> ApiResult<Self> {
        Self::with_base_url(BASE_URL, timeout_secs, max_retries)
    }

    /// Create a client against another host (mirrors, local fixtures)
    pub fn with_base_url(base_url: &str, timeout_secs: u64, max_retries: u32) -> ApiResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            max_retries,
            adjust: true,
        })
    }

    /// Keep raw (unadjusted) prices
    pub fn unadjusted(mut self) -> Self {
        self.adjust = false;
        self
    }

    /// Fetch daily bars for `[start, end)`
    ///
    /// Transport failures are retried up to `max_retries` times with
    /// exponential backoff; API errors are returned immediately.
    pub async fn get_daily_bars(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> ApiResult<Vec<Bar>> {
        let period1 = start.and_hms_opt(0, 0, 0).map(|d| d.and_utc().timestamp());
        let period2 = end.and_hms_opt(0, 0, 0).map(|d| d.and_utc().timestamp());
        let (period1, period2) = match (period1, period2) {
            (Some(p1), Some(p2)) => (p1, p2),
            _ => return Err(ApiError::ParseError("invalid date range".to_string())),
        };

        let url = format!("{}/v8/finance/chart/{}", self.base_url, symbol);
        let params = [
            ("period1", period1.to_string()),
            ("period2", period2.to_string()),
            ("interval", "1d".to_string()),
            ("events", "history".to_string()),
        ];

        let mut attempt = 0;
        loop {
            match self.fetch(&url, &params).await {
                Ok(body) => {
                    let bars = parse_chart_response(symbol, &body, self.adjust)?;
                    tracing::info!("Fetched {} daily bars for {}", bars.len(), symbol);
                    return Ok(bars);
                }
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    attempt += 1;
                    let delay = Duration::from_millis(RETRY_BASE_DELAY_MS << (attempt - 1));
                    tracing::warn!(
                        "Request for {} failed ({}), retry {}/{} in {:?}",
                        symbol,
                        e,
                        attempt,
                        self.max_retries,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn fetch(&self, url: &str, params: &[(&str, String)]) -> ApiResult<String> {
        let response = self.client.get(url).query(params).send().await?;

        // Error payloads (unknown symbol) arrive with 4xx and a JSON body
        let status = response.status();
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            response.error_for_status_ref()?;
        }

        Ok(response.text().await?)
    }
}

/// Parse a chart endpoint body into date-ordered bars
///
/// Rows with any missing field are skipped. With `adjust`, open, high, low
/// and close are scaled by `adjclose / close`.
pub fn parse_chart_response(symbol: &str, body: &str, adjust: bool) -> ApiResult<Vec<Bar>> {
    let response: ChartResponse =
        serde_json::from_str(body).map_err(|e| ApiError::ParseError(e.to_string()))?;

    if let Some(error) = response.chart.error {
        return Err(ApiError::ApiResponseError {
            code: error.code,
            message: error.description,
        });
    }

    let result = response
        .chart
        .result
        .and_then(|mut r| if r.is_empty() { None } else { Some(r.swap_remove(0)) })
        .ok_or_else(|| ApiError::NoData(symbol.to_string()))?;

    let quote = result.indicators.quote.into_iter().next().unwrap_or_default();
    let adjclose = result
        .indicators
        .adjclose
        .into_iter()
        .next()
        .map(|a| a.adjclose)
        .unwrap_or_default();
    let offset = result.meta.gmtoffset;

    let mut bars: Vec<Bar> = result
        .timestamp
        .iter()
        .enumerate()
        .filter_map(|(i, &ts)| {
            let date = DateTime::from_timestamp(ts + offset, 0)?.date_naive();
            let open = field(&quote.open, i)?;
            let high = field(&quote.high, i)?;
            let low = field(&quote.low, i)?;
            let close = field(&quote.close, i)?;
            let volume = field(&quote.volume, i)?;

            let factor = match field(&adjclose, i) {
                Some(adj) if adjust && close > 0.0 => adj / close,
                _ => 1.0,
            };

            Some(Bar {
                date,
                open: open * factor,
                high: high * factor,
                low: low * factor,
                close: close * factor,
                volume,
            })
        })
        .collect();

    // A live session can repeat the last date; keep the latest row
    bars.sort_by_key(|b| b.date);
    bars.reverse();
    bars.dedup_by_key(|b| b.date);
    bars.reverse();

    if bars.is_empty() {
        return Err(ApiError::NoData(symbol.to_string()));
    }

    Ok(bars)
}

fn field(values: &[Option<f64>], i: usize) -> Option<f64> {
    values.get(i).copied().flatten()
}
