pub mod sender;

use crate::model::{NotifyError, Report};
use crate::notifier::Notifier;
use crate::notifier::format::{render_plain, report_title};
use reqwest::Client;
use std::time::Duration;
use tracing::{info, warn};

/// Sends the report to a Telegram chat through the bot API.
pub struct TelegramNotifier {
    pub bot_token: String,
    pub chat_id: i64,
    pub client: Client,
}

impl TelegramNotifier {
    pub fn new(bot_token: String, chat_id: i64) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            bot_token,
            chat_id,
            client,
        })
    }

    pub async fn notify_text(&self, text: &str) -> Result<(), NotifyError> {
        sender::send_text(self, text).await
    }
}

/// Message body: a subject-like first line followed by the plain report.
pub fn compose_message(report: &Report) -> String {
    let prefix = if report.has_buy_signals() {
        "[ACTION]"
    } else {
        "[INFO]"
    };
    format!(
        "{} {}\n\n{}",
        prefix,
        report_title(report),
        render_plain(report)
    )
}

#[async_trait::async_trait]
impl Notifier for TelegramNotifier {
    fn name(&self) -> &'static str {
        "telegram"
    }

    async fn send(&self, report: &Report) -> bool {
        match self.notify_text(&compose_message(report)).await {
            Ok(()) => {
                info!("📤 Telegram report sent to chat {}", self.chat_id);
                true
            }
            Err(e) => {
                warn!("❌ Telegram report failed: {}", e);
                false
            }
        }
    }
}
