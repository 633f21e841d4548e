pub mod traits;
pub mod yahoo;

pub use traits::MarketDataFetcher;
pub use yahoo::YahooFetcher;
