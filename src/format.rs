//! Display Formatting
//!
//! Pure conversions from raw telemetry values into the short strings shown in
//! the popover. Every function is total: normal inputs never fail and never
//! panic.
//!
//! | value                 | rendering            |
//! |-----------------------|----------------------|
//! | `42` tokens           | `42`                 |
//! | `1_234` tokens        | `1.2K`               |
//! | `1_500_000` tokens    | `1.5M`               |
//! | `$0.001`              | `<$0.01`             |
//! | `$4.52`               | `$4.52`              |
//! | 5 minutes ago         | `5m ago`             |

use chrono::{DateTime, Duration, Utc};

use crate::timestamp::parse_timestamp;

/// Format a token count as `999`, `1.2K` or `1.5M`.
///
/// Thousands and millions are rounded half-up to one decimal place. Values just
/// under one million stay in the `K` unit, so `999_999` renders as `1000.0K`.
pub fn format_token_count(n: u64) -> String {
    if n < 1_000 {
        n.to_string()
    } else if n < 1_000_000 {
        scaled_tenths(n, 1_000, 'K')
    } else {
        scaled_tenths(n, 1_000_000, 'M')
    }
}

// Integer arithmetic keeps the half-up rounding exact.
fn scaled_tenths(n: u64, unit: u64, suffix: char) -> String {
    let step = unit / 10;
    let tenths = (n as u128 + (step / 2) as u128) / step as u128;
    format!("{}.{}{}", tenths / 10, tenths % 10, suffix)
}

/// Format a USD amount with exactly two decimals.
///
/// Positive amounts below one cent render as `<$0.01` so a non-zero cost is
/// never displayed as `$0.00`. Half-cent ties round up, so `0.125` is `$0.13`.
pub fn format_currency(amount: f64) -> String {
    if amount > 0.0 && amount < 0.01 {
        return "<$0.01".to_string();
    }
    format!("${:.2}", round_half_up(amount.max(0.0) * 100.0) / 100.0)
}

// `{:.N}` rounds exact ties to even; display values round ties up.
fn round_half_up(x: f64) -> f64 {
    (x + 0.5).floor()
}

/// Format an ISO-8601 timestamp relative to the current time.
pub fn format_relative_time(timestamp: &str) -> String {
    format_relative_time_at(timestamp, Utc::now())
}

/// Format an ISO-8601 timestamp relative to `now`.
///
/// Unparseable timestamps render as `unknown`.
pub fn format_relative_time_at(timestamp: &str, now: DateTime<Utc>) -> String {
    match parse_timestamp(timestamp) {
        Ok(then) => format_elapsed(now - then),
        Err(_) => "unknown".to_string(),
    }
}

/// Format an elapsed duration using the largest whole unit.
///
/// Counts are truncated, never rounded. Negative durations (clock skew) are
/// treated as `just now`.
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.num_seconds();
    if secs < 60 {
        "just now".to_string()
    } else if secs < 3_600 {
        format!("{}m ago", secs / 60)
    } else if secs < 86_400 {
        format!("{}h ago", secs / 3_600)
    } else {
        format!("{}d ago", secs / 86_400)
    }
}

/// Format a percentage with no decimals, e.g. `73%`. Ties round up.
pub fn format_percentage(pct: f64) -> String {
    format!("{:.0}%", round_half_up(pct))
}
