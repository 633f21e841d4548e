use crate::fetcher::traits::MarketDataFetcher;
use crate::model::{AthRecord, FetchError, IndexData, IndexSymbol};
use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use reqwest::Client;
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde::Deserialize;
use std::time::Duration;
use tracing::info;

const CHART_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";

/// Yahoo Finance chart API client. Every request carries the configured
/// timeout and fails fast.
pub struct YahooFetcher {
    client: Client,
}

impl YahooFetcher {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) DcaAlerts/0.1")
            .timeout(timeout)
            .build()?;

        Ok(Self { client })
    }

    fn build_url(symbol: IndexSymbol) -> String {
        format!("{}/{}", CHART_URL, symbol.code().replace('^', "%5E"))
    }

    async fn fetch_chart(&self, symbol: IndexSymbol, range: &str) -> Result<ChartResult, FetchError> {
        let response = self
            .client
            .get(Self::build_url(symbol))
            .query(&[("range", range), ("interval", "1d")])
            .send()
            .await
            .map_err(|e| transport_error(symbol, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::unavailable(symbol, format!("HTTP {}", status)));
        }

        let body: ChartResponse = response
            .json()
            .await
            .map_err(|e| transport_error(symbol, e))?;

        if let Some(api_error) = body.chart.error {
            return Err(FetchError::unavailable(symbol, api_error.to_string()));
        }

        body.chart
            .result
            .into_iter()
            .flatten()
            .next()
            .ok_or_else(|| FetchError::unavailable(symbol, "no chart data in response"))
    }
}

fn transport_error(symbol: IndexSymbol, e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout {
            symbol: symbol.code().to_string(),
        }
    } else {
        FetchError::unavailable(symbol, e.to_string())
    }
}

#[async_trait::async_trait]
impl MarketDataFetcher for YahooFetcher {
    async fn fetch_current(&self, symbol: IndexSymbol) -> Result<IndexData, FetchError> {
        let chart = self.fetch_chart(symbol, "5d").await?;

        let (market_date, price) = chart.latest_close().ok_or_else(|| {
            FetchError::unavailable(
                symbol,
                "no closing price returned, market may be closed or symbol invalid",
            )
        })?;

        info!("Fetched {}: {:.2} (date: {})", symbol, price, market_date);
        Ok(IndexData {
            symbol,
            current_price: price,
            fetched_at: Utc::now(),
            market_date,
        })
    }

    async fn fetch_historical_high(
        &self,
        symbol: IndexSymbol,
        period: &str,
    ) -> Result<AthRecord, FetchError> {
        let chart = self.fetch_chart(symbol, period).await?;

        let (ath_date, ath_value) = chart
            .highest_high()
            .ok_or_else(|| FetchError::unavailable(symbol, "no historical highs returned"))?;

        info!(
            "Fetched historical ATH for {}: {:.2} on {}",
            symbol, ath_value, ath_date
        );
        Ok(AthRecord {
            symbol,
            ath_value,
            ath_date,
            updated_at: Utc::now(),
        })
    }
}

// Yahoo Finance chart response structures

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartApiError>,
}

#[derive(Debug, Deserialize)]
struct ChartApiError {
    code: Option<String>,
    description: Option<String>,
}

impl std::fmt::Display for ChartApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "yahoo chart API error: {} ({})",
            self.code.as_deref().unwrap_or("unknown"),
            self.description.as_deref().unwrap_or("no description")
        )
    }
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    meta: ChartMeta,
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: ChartIndicators,
}

#[derive(Debug, Default, Deserialize)]
struct ChartMeta {
    #[serde(default)]
    gmtoffset: i32,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    #[serde(default)]
    quote: Vec<ChartQuote>,
}

#[derive(Debug, Deserialize)]
struct ChartQuote {
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
}

impl ChartResult {
    /// Trading date of a bar in the exchange's own offset.
    fn market_date(&self, ts: i64) -> Option<NaiveDate> {
        let offset = FixedOffset::east_opt(self.meta.gmtoffset)?;
        DateTime::from_timestamp(ts, 0).map(|dt| dt.with_timezone(&offset).date_naive())
    }

    fn series(&self, values: &[Option<f64>]) -> Vec<(NaiveDate, f64)> {
        self.timestamp
            .iter()
            .zip(values)
            .filter_map(|(&ts, value)| {
                let value = (*value).filter(|v| v.is_finite())?;
                Some((self.market_date(ts)?, value))
            })
            .collect()
    }

    fn closes(&self) -> Vec<(NaiveDate, f64)> {
        self.indicators
            .quote
            .first()
            .map(|q| self.series(&q.close))
            .unwrap_or_default()
    }

    fn highs(&self) -> Vec<(NaiveDate, f64)> {
        self.indicators
            .quote
            .first()
            .map(|q| self.series(&q.high))
            .unwrap_or_default()
    }

    fn latest_close(&self) -> Option<(NaiveDate, Decimal)> {
        let (date, close) = self.closes().pop()?;
        Some((date, Decimal::from_f64(close)?))
    }

    /// First bar carrying the maximum high.
    fn highest_high(&self) -> Option<(NaiveDate, Decimal)> {
        let mut best: Option<(NaiveDate, f64)> = None;
        for (date, high) in self.highs() {
            if best.is_none_or(|(_, b)| high > b) {
                best = Some((date, high));
            }
        }
        let (date, high) = best?;
        Some((date, Decimal::from_f64(high)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const CHART: &str = r#"{
        "chart": {
            "result": [{
                "meta": {"symbol": "^GSPC", "gmtoffset": -14400},
                "timestamp": [1710163800, 1710250200, 1710336600],
                "indicators": {"quote": [{
                    "high": [5200.5, 5264.25, 5264.25],
                    "close": [5175.25, 5250.5, null]
                }]}
            }],
            "error": null
        }
    }"#;

    fn parse(body: &str) -> ChartResponse {
        serde_json::from_str(body).unwrap()
    }

    #[test]
    fn url_escapes_caret() {
        assert_eq!(
            YahooFetcher::build_url(IndexSymbol::Sp500),
            "https://query1.finance.yahoo.com/v8/finance/chart/%5EGSPC"
        );
    }

    #[test]
    fn latest_close_skips_missing_values() {
        let chart = parse(CHART).chart.result.unwrap().remove(0);
        let (date, close) = chart.latest_close().unwrap();

        // 1710250200 is 2024-03-12 13:30 UTC, 09:30 in New York.
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 3, 12).unwrap());
        assert_eq!(close, dec!(5250.5));
    }

    #[test]
    fn highest_high_keeps_first_maximum() {
        let chart = parse(CHART).chart.result.unwrap().remove(0);
        let (date, high) = chart.highest_high().unwrap();

        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 3, 12).unwrap());
        assert_eq!(high, dec!(5264.25));
    }

    #[test]
    fn api_error_is_reported() {
        let body = parse(
            r#"{"chart": {"result": null, "error": {"code": "Not Found", "description": "No data found, symbol may be delisted"}}}"#,
        );
        assert!(body.chart.result.is_none());
        let message = body.chart.error.unwrap().to_string();
        assert!(message.contains("Not Found"));
    }

    #[test]
    fn empty_series_yields_nothing() {
        let body = parse(
            r#"{"chart": {"result": [{"meta": {"gmtoffset": 0}, "indicators": {"quote": [{}]}}], "error": null}}"#,
        );
        let chart = body.chart.result.unwrap().remove(0);
        assert!(chart.latest_close().is_none());
        assert!(chart.highest_high().is_none());
    }
}
