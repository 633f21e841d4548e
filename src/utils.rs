// Utility functions
use rust_decimal::{Decimal, RoundingStrategy};

/// Formats a price as dollars with thousands separators, e.g. `$5,700.00`.
pub fn format_price(value: Decimal) -> String {
    let rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let text = format!("{:.2}", rounded.abs());
    let (int_part, frac_part) = text.split_once('.').unwrap_or((text.as_str(), "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
        "-"
    } else {
        ""
    };
    format!("{}${}.{}", sign, grouped, frac_part)
}

/// Formats a gap with an explicit sign, e.g. `+0.00%` or `-5.00%`.
pub fn format_gap(gap_percent: Decimal) -> String {
    let sign = if gap_percent >= Decimal::ZERO { "+" } else { "-" };
    format!("{}{:.2}%", sign, gap_percent.abs())
}
