// Notifier module: report delivery channels.

pub mod console;
pub mod format;
pub mod telegram;

use crate::model::Report;

pub use console::ConsoleNotifier;
pub use format::{ColorMode, Palette};
pub use telegram::TelegramNotifier;

/// Delivers a finished report.
///
/// Implementations log their own failures and report them through the return
/// value; they never panic or propagate errors.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &'static str;

    async fn send(&self, report: &Report) -> bool;
}
