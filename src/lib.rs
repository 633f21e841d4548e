pub mod analyzer;
pub mod config;
pub mod fetcher;
pub mod logging;
pub mod model;
pub mod notifier;
pub mod runner;
pub mod storage;
pub mod utils;
