// Logging setup: started before the config is read, level applied afterwards.
use tracing::{Level, Subscriber};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{Registry, reload};

/// Handle to the level filter installed at startup.
pub struct LogLevelHandle {
    handle: reload::Handle<LevelFilter, Registry>,
    pinned: bool,
}

impl LogLevelHandle {
    /// Switches to the configured level. A level pinned by `--verbose` wins.
    pub fn apply(&self, level: Level) {
        if self.pinned {
            return;
        }
        if let Err(e) = self.handle.reload(LevelFilter::from_level(level)) {
            eprintln!("Failed to apply log level {}: {}", level, e);
        }
    }
}

/// Builds the fmt subscriber at INFO (DEBUG when `verbose`) with a reloadable
/// level filter.
pub fn subscriber<W>(
    writer: W,
    ansi: bool,
    verbose: bool,
) -> (impl Subscriber + Send + Sync + 'static, LogLevelHandle)
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let initial = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    let (filter, handle) = reload::Layer::new(initial);

    let subscriber = tracing_subscriber::registry().with(filter).with(
        tracing_subscriber::fmt::layer()
            .with_ansi(ansi)
            .with_writer(writer),
    );

    (
        subscriber,
        LogLevelHandle {
            handle,
            pinned: verbose,
        },
    )
}

/// Installs the global subscriber writing to stderr.
pub fn init(ansi: bool, verbose: bool) -> LogLevelHandle {
    let (subscriber, handle) = subscriber(std::io::stderr, ansi, verbose);
    subscriber.init();
    handle
}
