use crate::model::{AthRecord, FetchError, IndexData, IndexSymbol};

/// Source of market observations. Any failure means "no data" for that
/// symbol and never aborts a batch.
#[async_trait::async_trait]
pub trait MarketDataFetcher: Send + Sync {
    /// Latest close for the index.
    async fn fetch_current(&self, symbol: IndexSymbol) -> Result<IndexData, FetchError>;

    /// Highest intraday high over `period` (a provider range such as `"max"`).
    async fn fetch_historical_high(
        &self,
        symbol: IndexSymbol,
        period: &str,
    ) -> Result<AthRecord, FetchError>;
}
