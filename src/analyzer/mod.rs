// Analyzer module: drop-from-ATH analysis.

pub mod drop_analysis;

// Re-export the main analyzer for ease of use.
pub use drop_analysis::DropAnalyzer;
