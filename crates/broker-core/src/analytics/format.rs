//! Compact number rendering for scorecard tiles.
//!
//! ```text
//! |v| ≥ 1e9  →  "1.25B"
//! |v| ≥ 1e6  →  "3.40M"
//! |v| ≥ 1e3  →  "12K"
//! otherwise  →  "950"
//! ```
//!
//! Tiers are picked after rounding, so 999_600 renders as "1.00M" rather
//! than "1000K".

use crate::money::Money;

const BILLION: f64 = 1_000_000_000.0;
const MILLION: f64 = 1_000_000.0;
const THOUSAND: f64 = 1_000.0;

/// Renders `value` with a B/M/K suffix. The sign is preserved.
pub fn format_compact(value: f64) -> String {
    let magnitude = value.abs();
    if hundredths(magnitude / MILLION) >= THOUSAND {
        format!("{:.2}B", value / BILLION)
    } else if (magnitude / THOUSAND).round() >= THOUSAND {
        format!("{:.2}M", value / MILLION)
    } else if magnitude.round() >= THOUSAND {
        format!("{}K", (value / THOUSAND).round() as i64)
    } else {
        format!("{}", value.round() as i64)
    }
}

fn hundredths(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// [`format_compact`] over major currency units.
pub fn format_money_compact(amount: Money) -> String {
    format_compact(amount.to_major_f64())
}
