use crate::model::Report;
use crate::notifier::Notifier;
use crate::notifier::format::{Palette, render_text};
use std::io::Write;
use tracing::{debug, error};

/// Prints the report to stdout.
pub struct ConsoleNotifier {
    palette: Palette,
}

impl ConsoleNotifier {
    pub fn new(palette: Palette) -> Self {
        Self { palette }
    }
}

#[async_trait::async_trait]
impl Notifier for ConsoleNotifier {
    fn name(&self) -> &'static str {
        "console"
    }

    async fn send(&self, report: &Report) -> bool {
        let text = render_text(report, &self.palette);

        match write_stdout(&text) {
            Ok(()) => {
                debug!("Report printed to console");
                true
            }
            Err(e) => {
                error!("Failed to write to stdout: {}", e);
                false
            }
        }
    }
}

fn write_stdout(text: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{}", text)?;
    stdout.flush()
}
