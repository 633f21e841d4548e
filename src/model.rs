// Core structs: IndexSymbol, AthRecord, IndexData, AnalysisResult, Report
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Market indices tracked by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IndexSymbol {
    Sp500,
    Nasdaq100,
    Russell2000,
}

impl IndexSymbol {
    pub const ALL: [IndexSymbol; 3] = [
        IndexSymbol::Sp500,
        IndexSymbol::Nasdaq100,
        IndexSymbol::Russell2000,
    ];

    /// Ticker code used by the data provider and as the key in the ATH file.
    pub fn code(&self) -> &'static str {
        match self {
            IndexSymbol::Sp500 => "^GSPC",
            IndexSymbol::Nasdaq100 => "^NDX",
            IndexSymbol::Russell2000 => "^RUT",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            IndexSymbol::Sp500 => "S&P 500",
            IndexSymbol::Nasdaq100 => "NASDAQ 100",
            IndexSymbol::Russell2000 => "Russell 2000",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.code() == code.trim())
    }
}

impl fmt::Display for IndexSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recommendation {
    Buy,
    Hold,
}

impl Recommendation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Recommendation::Buy => "BUY",
            Recommendation::Hold => "HOLD",
        }
    }
}

/// Point-in-time observation for one index. Never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexData {
    pub symbol: IndexSymbol,
    pub current_price: Decimal,
    pub fetched_at: DateTime<Utc>,
    pub market_date: NaiveDate,
}

/// Persisted all-time high for an index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AthRecord {
    pub symbol: IndexSymbol,
    pub ath_value: Decimal,
    pub ath_date: NaiveDate,
    pub updated_at: DateTime<Utc>,
}

/// Outcome of comparing one observation against its ATH.
///
/// `drop_tier > 0` holds exactly when the recommendation is `Buy`, and a new
/// ATH always carries a zero gap and a `Hold`.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisResult {
    pub symbol: IndexSymbol,
    pub current_price: Decimal,
    pub ath_value: Decimal,
    pub ath_date: NaiveDate,
    pub gap_percent: Decimal,
    pub drop_tier: u32,
    pub recommendation: Recommendation,
    pub is_new_ath: bool,
}

impl AnalysisResult {
    /// Plain-text verdict line shown under each index.
    pub fn headline(&self) -> String {
        if self.is_new_ath {
            return "NEW ATH - HOLD".to_string();
        }
        match self.recommendation {
            Recommendation::Buy => format!(">>> BUY SIGNAL ({}% tier) <<<", self.drop_tier),
            Recommendation::Hold => "HOLD - below threshold".to_string(),
        }
    }
}

/// Aggregate of one evaluation cycle, results in configured symbol order.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub generated_at: DateTime<Utc>,
    pub market_date: NaiveDate,
    pub results: Vec<AnalysisResult>,
}

impl Report {
    pub fn has_buy_signals(&self) -> bool {
        self.results
            .iter()
            .any(|r| r.recommendation == Recommendation::Buy)
    }

    pub fn buy_count(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.recommendation == Recommendation::Buy)
            .count()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid JSON in config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Market data could not be obtained for a symbol.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("data unavailable for {symbol}: {reason}")]
    DataUnavailable { symbol: String, reason: String },
    #[error("request for {symbol} timed out")]
    Timeout { symbol: String },
}

impl FetchError {
    pub fn unavailable(symbol: IndexSymbol, reason: impl Into<String>) -> Self {
        FetchError::DataUnavailable {
            symbol: symbol.code().to_string(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to read ATH file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write ATH file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize ATH records: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification API error: {0}")]
    Api(String),
    #[error("notification endpoint unreachable")]
    Unreachable,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn result(tier: u32, rec: Recommendation, new_ath: bool) -> AnalysisResult {
        AnalysisResult {
            symbol: IndexSymbol::Sp500,
            current_price: dec!(5700),
            ath_value: dec!(6000),
            ath_date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            gap_percent: dec!(-5.00),
            drop_tier: tier,
            recommendation: rec,
            is_new_ath: new_ath,
        }
    }

    #[test]
    fn symbol_codes_round_trip() {
        for symbol in IndexSymbol::ALL {
            assert_eq!(IndexSymbol::from_code(symbol.code()), Some(symbol));
        }
        assert_eq!(IndexSymbol::from_code(" ^NDX "), Some(IndexSymbol::Nasdaq100));
        assert_eq!(IndexSymbol::from_code("^DJI"), None);
    }

    #[test]
    fn headline_reflects_verdict() {
        assert_eq!(
            result(10, Recommendation::Buy, false).headline(),
            ">>> BUY SIGNAL (10% tier) <<<"
        );
        assert_eq!(
            result(0, Recommendation::Hold, false).headline(),
            "HOLD - below threshold"
        );
        assert_eq!(result(0, Recommendation::Hold, true).headline(), "NEW ATH - HOLD");
    }

    #[test]
    fn report_counts_buy_signals() {
        let report = Report {
            generated_at: Utc::now(),
            market_date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            results: vec![
                result(5, Recommendation::Buy, false),
                result(0, Recommendation::Hold, false),
                result(15, Recommendation::Buy, false),
            ],
        };
        assert!(report.has_buy_signals());
        assert_eq!(report.buy_count(), 2);
    }
}
