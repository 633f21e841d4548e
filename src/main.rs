use clap::Parser;
use dca_alerts::analyzer::DropAnalyzer;
use dca_alerts::config::{AppConfig, load_config};
use dca_alerts::fetcher::YahooFetcher;
use dca_alerts::logging;
use dca_alerts::notifier::{ColorMode, ConsoleNotifier, Notifier, Palette, TelegramNotifier};
use dca_alerts::runner::{self, RunStatus};
use dca_alerts::storage::AthStore;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{error, info, warn};

/// Daily check of major indices against their all-time highs.
#[derive(Debug, Parser)]
#[command(
    name = "dca-alerts",
    version,
    after_help = "Exit codes:\n  0  all indices evaluated and notified\n  1  partial: some fetches or notifiers failed\n  2  failure: no data, no notifier succeeded, or a configuration/storage error"
)]
struct Cli {
    /// Path to the JSON configuration file.
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// Log at DEBUG level regardless of configuration.
    #[arg(short, long)]
    verbose: bool,

    /// Disable ANSI colours in the report and logs.
    #[arg(long)]
    no_color: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("Panic occurred: {:?}", panic_info);
    }));

    let color_mode = if cli.no_color {
        ColorMode::Never
    } else {
        ColorMode::Auto
    };
    let palette = Palette::from_mode(color_mode);

    // Config loading logs too, so the subscriber comes first.
    let log_level = logging::init(palette.is_enabled(), cli.verbose);

    let config = match load_config(Some(cli.config.as_path())) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Config load error: {}", e);
            return exit(RunStatus::Failure);
        }
    };
    log_level.apply(config.log_level);

    exit(run(&config, palette).await)
}

async fn run(config: &AppConfig, palette: Palette) -> RunStatus {
    let fetcher = match YahooFetcher::new(Duration::from_secs(config.fetch_timeout_seconds)) {
        Ok(fetcher) => fetcher,
        Err(e) => {
            error!("Failed to build HTTP client: {}", e);
            return RunStatus::Failure;
        }
    };

    let analyzer = match DropAnalyzer::new(config.drop_increment) {
        Ok(analyzer) => analyzer,
        Err(e) => {
            error!("{}", e);
            return RunStatus::Failure;
        }
    };

    let store = AthStore::new(config.ath_storage_path.clone());
    let notifiers = build_notifiers(config, palette);

    match runner::run(&config.indices, &fetcher, &store, &analyzer, &notifiers).await {
        Ok(status) => {
            info!("DCA alerts check finished: {:?}", status);
            status
        }
        Err(e) => {
            error!("Aborting run: {}", e);
            RunStatus::Failure
        }
    }
}

fn build_notifiers(config: &AppConfig, palette: Palette) -> Vec<Box<dyn Notifier>> {
    let mut notifiers: Vec<Box<dyn Notifier>> = vec![Box::new(ConsoleNotifier::new(palette))];

    match &config.telegram {
        Some(tg) => match TelegramNotifier::new(tg.bot_token.clone(), tg.chat_id) {
            Ok(notifier) => notifiers.push(Box::new(notifier)),
            Err(e) => warn!("Telegram notifier unavailable: {}", e),
        },
        None => info!("Telegram notifications disabled"),
    }

    notifiers
}

fn exit(status: RunStatus) -> ExitCode {
    ExitCode::from(status.code() as u8)
}
