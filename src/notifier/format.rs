// Report rendering for terminal and chat output.
use crate::model::{AnalysisResult, Recommendation, Report};
use crate::utils::{format_gap, format_price};
use rust_decimal::Decimal;
use std::io::IsTerminal;

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const RED: &str = "\x1b[31m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const BLUE: &str = "\x1b[34m";
const WHITE: &str = "\x1b[37m";
const BRIGHT_RED: &str = "\x1b[91m";
const BRIGHT_GREEN: &str = "\x1b[92m";
const BRIGHT_MAGENTA: &str = "\x1b[95m";
const BRIGHT_CYAN: &str = "\x1b[96m";
const BRIGHT_WHITE: &str = "\x1b[97m";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorMode {
    #[default]
    Auto,
    Always,
    Never,
}

impl ColorMode {
    /// Decides once whether ANSI colours are used, from stdout and the
    /// usual colour environment variables.
    pub fn enabled(self) -> bool {
        match self {
            ColorMode::Always => true,
            ColorMode::Never => false,
            ColorMode::Auto => {
                detect_color(std::io::stdout().is_terminal(), |key| std::env::var(key).ok())
            }
        }
    }
}

fn detect_color(is_tty: bool, env: impl Fn(&str) -> Option<String>) -> bool {
    let set = |key: &str| env(key).is_some_and(|v| !v.is_empty());

    if set("NO_COLOR") {
        return false;
    }
    if set("FORCE_COLOR") || set("CLICOLOR_FORCE") {
        return true;
    }
    if !is_tty {
        return false;
    }
    if env("CLICOLOR").as_deref() == Some("0") {
        return false;
    }
    !matches!(env("TERM").as_deref(), Some("dumb"))
}

/// Colour scheme handed explicitly to the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    enabled: bool,
}

impl Palette {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn plain() -> Self {
        Self { enabled: false }
    }

    pub fn from_mode(mode: ColorMode) -> Self {
        Self::new(mode.enabled())
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn paint(&self, text: &str, codes: &[&str]) -> String {
        if !self.enabled || codes.is_empty() {
            return text.to_string();
        }
        format!("{}{}{}", codes.concat(), text, RESET)
    }

    fn header(&self, text: &str) -> String {
        self.paint(text, &[BRIGHT_CYAN, BOLD])
    }

    fn index_name(&self, text: &str) -> String {
        self.paint(text, &[BRIGHT_WHITE, BOLD])
    }

    fn ath_value(&self, text: &str) -> String {
        self.paint(text, &[BLUE])
    }

    fn current_price(&self, text: &str) -> String {
        self.paint(text, &[WHITE])
    }

    fn gap(&self, gap_percent: Decimal) -> String {
        let color = if gap_percent >= Decimal::ZERO { GREEN } else { RED };
        self.paint(&format_gap(gap_percent), &[color])
    }

    fn verdict(&self, result: &AnalysisResult) -> String {
        let headline = result.headline();
        if result.is_new_ath {
            return self.paint(&headline, &[BRIGHT_MAGENTA, BOLD]);
        }
        match result.recommendation {
            Recommendation::Buy => self.paint(&headline, &[BRIGHT_GREEN, BOLD]),
            Recommendation::Hold => self.paint(&headline, &[YELLOW]),
        }
    }

    fn footer(&self, report: &Report) -> String {
        if report.has_buy_signals() {
            self.paint(
                "ACTION REQUIRED: One or more indices have buy signals.",
                &[BRIGHT_RED, BOLD],
            )
        } else {
            self.paint("No action required at this time.", &[GREEN])
        }
    }
}

pub fn report_title(report: &Report) -> String {
    format!("DCA Market Alert - {}", report.market_date.format("%Y-%m-%d"))
}

/// Renders the full report as text, coloured according to `palette`.
pub fn render_text(report: &Report, palette: &Palette) -> String {
    let mut lines = vec![palette.header(&format!("=== {} ===", report_title(report))), String::new()];

    for result in &report.results {
        lines.push(palette.index_name(&format!(
            "{} ({})",
            result.symbol.display_name(),
            result.symbol.code()
        )));
        lines.push(format!(
            "  ATH:     {} ({})",
            palette.ath_value(&format_price(result.ath_value)),
            result.ath_date.format("%Y-%m-%d")
        ));
        lines.push(format!(
            "  Current: {}",
            palette.current_price(&format_price(result.current_price))
        ));
        lines.push(format!("  Gap:     {}", palette.gap(result.gap_percent)));
        lines.push(format!("  {}", palette.verdict(result)));
        lines.push(String::new());
    }

    lines.push(palette.footer(report));
    lines.join("\n")
}

pub fn render_plain(report: &Report) -> String {
    render_text(report, &Palette::plain())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::IndexSymbol;
    use chrono::{NaiveDate, TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn sample_report() -> Report {
        let day = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        Report {
            generated_at: Utc.with_ymd_and_hms(2024, 3, 15, 22, 0, 0).unwrap(),
            market_date: day,
            results: vec![
                AnalysisResult {
                    symbol: IndexSymbol::Sp500,
                    current_price: dec!(5700.00),
                    ath_value: dec!(6000.00),
                    ath_date: NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(),
                    gap_percent: dec!(-5.00),
                    drop_tier: 5,
                    recommendation: Recommendation::Buy,
                    is_new_ath: false,
                },
                AnalysisResult {
                    symbol: IndexSymbol::Nasdaq100,
                    current_price: dec!(18500.25),
                    ath_value: dec!(18500.25),
                    ath_date: day,
                    gap_percent: Decimal::ZERO,
                    drop_tier: 0,
                    recommendation: Recommendation::Hold,
                    is_new_ath: true,
                },
            ],
        }
    }

    #[test]
    fn plain_report_layout() {
        let text = render_plain(&sample_report());
        let expected = "\
=== DCA Market Alert - 2024-03-15 ===

S&P 500 (^GSPC)
  ATH:     $6,000.00 (2024-01-10)
  Current: $5,700.00
  Gap:     -5.00%
  >>> BUY SIGNAL (5% tier) <<<

NASDAQ 100 (^NDX)
  ATH:     $18,500.25 (2024-03-15)
  Current: $18,500.25
  Gap:     +0.00%
  NEW ATH - HOLD

ACTION REQUIRED: One or more indices have buy signals.";
        assert_eq!(text, expected);
    }

    #[test]
    fn coloured_report_wraps_segments() {
        let text = render_text(&sample_report(), &Palette::new(true));
        assert!(text.contains("\x1b[96m\x1b[1m=== DCA Market Alert - 2024-03-15 ===\x1b[0m"));
        assert!(text.contains("\x1b[31m-5.00%\x1b[0m"));
        assert!(!render_plain(&sample_report()).contains('\x1b'));
    }

    #[test]
    fn quiet_report_has_no_action_footer() {
        let mut report = sample_report();
        report.results.remove(0);
        assert!(render_plain(&report).ends_with("No action required at this time."));
    }

    fn lookup(
        pairs: &'static [(&'static str, &'static str)],
    ) -> impl Fn(&str) -> Option<String> {
        move |key: &str| {
            pairs
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        }
    }

    #[test]
    fn colour_detection_honours_environment() {
        assert!(detect_color(true, lookup(&[("TERM", "xterm-256color")])));
        assert!(!detect_color(false, lookup(&[])));
        assert!(detect_color(false, lookup(&[("FORCE_COLOR", "1")])));
        assert!(!detect_color(true, lookup(&[("NO_COLOR", "1"), ("FORCE_COLOR", "1")])));
        assert!(!detect_color(true, lookup(&[("TERM", "dumb")])));
        assert!(!detect_color(true, lookup(&[("CLICOLOR", "0")])));
        assert!(!ColorMode::Never.enabled());
        assert!(ColorMode::Always.enabled());
    }
}
