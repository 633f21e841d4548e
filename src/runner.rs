// Orchestration of one daily evaluation cycle.
use crate::analyzer::DropAnalyzer;
use crate::fetcher::MarketDataFetcher;
use crate::model::{AthRecord, IndexData, IndexSymbol, Report, StorageError};
use crate::notifier::Notifier;
use crate::storage::{AthStore, UpdateOutcome};
use chrono::Utc;
use futures::future::join_all;
use tracing::{error, info, warn};

/// Provider range used when backfilling a missing ATH.
pub const BACKFILL_PERIOD: &str = "max";

/// Process exit status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Success,
    Partial,
    Failure,
}

impl RunStatus {
    pub fn code(self) -> i32 {
        match self {
            RunStatus::Success => 0,
            RunStatus::Partial => 1,
            RunStatus::Failure => 2,
        }
    }

    pub fn from_parts(evaluation: &Evaluation, delivery: &Delivery) -> Self {
        if evaluation.report.is_none() || (delivery.attempted > 0 && delivery.succeeded == 0) {
            return RunStatus::Failure;
        }
        if !evaluation.failed.is_empty() || delivery.succeeded < delivery.attempted {
            return RunStatus::Partial;
        }
        RunStatus::Success
    }
}

/// Output of [`evaluate`]: the report (absent when nothing could be fetched)
/// and the symbols whose current price was unavailable.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub report: Option<Report>,
    pub failed: Vec<IndexSymbol>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Delivery {
    pub attempted: usize,
    pub succeeded: usize,
}

/// Fetches, analyzes and persists every symbol, in the given order.
///
/// Fetch failures skip the symbol. Storage write failures abort the cycle and
/// are returned to the caller.
pub async fn evaluate<F>(
    symbols: &[IndexSymbol],
    fetcher: &F,
    store: &AthStore,
    analyzer: &DropAnalyzer,
) -> Result<Evaluation, StorageError>
where
    F: MarketDataFetcher + ?Sized,
{
    let fetched = join_all(symbols.iter().map(|&symbol| fetcher.fetch_current(symbol))).await;

    let mut observations: Vec<IndexData> = Vec::with_capacity(symbols.len());
    let mut failed = Vec::new();
    for (&symbol, outcome) in symbols.iter().zip(fetched) {
        match outcome {
            Ok(data) => observations.push(data),
            Err(e) => {
                error!("Failed to fetch {}: {}", symbol, e);
                failed.push(symbol);
            }
        }
    }

    if observations.is_empty() {
        error!("Failed to fetch any market data");
        return Ok(Evaluation {
            report: None,
            failed,
        });
    }

    let mut records = store.get_all();
    let mut results = Vec::with_capacity(observations.len());

    for data in &observations {
        if !records.contains_key(&data.symbol) {
            info!("No ATH record for {}, fetching historical ATH...", data.symbol);
            match fetcher.fetch_historical_high(data.symbol, BACKFILL_PERIOD).await {
                Ok(historical) => {
                    let stored = persist(store, historical)?;
                    records.insert(data.symbol, stored);
                }
                Err(e) => warn!(
                    "Failed to fetch historical ATH for {}: {}. Using current price.",
                    data.symbol, e
                ),
            }
        }

        let (result, new_ath) = analyzer.analyze(data, records.get(&data.symbol));
        if let Some(record) = new_ath {
            let stored = persist(store, record)?;
            records.insert(stored.symbol, stored);
        }
        results.push(result);
    }

    let report = Report {
        generated_at: Utc::now(),
        market_date: observations[0].market_date,
        results,
    };

    Ok(Evaluation {
        report: Some(report),
        failed,
    })
}

/// Writes `record` and returns what the store now holds for its symbol.
fn persist(store: &AthStore, record: AthRecord) -> Result<AthRecord, StorageError> {
    match store.update(&record)? {
        UpdateOutcome::Written => Ok(record),
        UpdateOutcome::KeptHigher => Ok(store.get(record.symbol).unwrap_or(record)),
    }
}

/// Hands the report to every notifier and counts the successes.
pub async fn deliver(report: &Report, notifiers: &[Box<dyn Notifier>]) -> Delivery {
    let mut delivery = Delivery::default();
    for notifier in notifiers {
        delivery.attempted += 1;
        if notifier.send(report).await {
            delivery.succeeded += 1;
        } else {
            warn!("Notifier {} failed to deliver the report", notifier.name());
        }
    }
    delivery
}

/// One full cycle: evaluate, notify, and derive the exit status.
pub async fn run<F>(
    symbols: &[IndexSymbol],
    fetcher: &F,
    store: &AthStore,
    analyzer: &DropAnalyzer,
    notifiers: &[Box<dyn Notifier>],
) -> Result<RunStatus, StorageError>
where
    F: MarketDataFetcher + ?Sized,
{
    info!("Starting DCA alerts check");
    info!(
        "Monitoring indices: {}",
        symbols
            .iter()
            .map(|s| s.display_name())
            .collect::<Vec<_>>()
            .join(", ")
    );

    let evaluation = evaluate(symbols, fetcher, store, analyzer).await?;
    let Some(report) = evaluation.report.as_ref() else {
        return Ok(RunStatus::Failure);
    };

    let delivery = deliver(report, notifiers).await;

    if report.has_buy_signals() {
        info!("Buy signals detected for {} index(es)", report.buy_count());
    } else {
        info!("No buy signals - all indices within threshold");
    }

    Ok(RunStatus::from_parts(&evaluation, &delivery))
}
