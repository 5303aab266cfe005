//! Formatting helpers shared across UIs.

use crate::types::Money;
use chrono::{DateTime, Utc};

/// Format a timestamp as relative time (e.g., "2m ago").
pub fn format_relative_time(ts: DateTime<Utc>) -> String {
    format_relative_to(ts, Utc::now())
}

/// Relative-time formatting against an explicit reference instant.
pub fn format_relative_to(ts: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let duration = now.signed_duration_since(ts);

    if duration.num_seconds() < 0 {
        "just now".to_string()
    } else if duration.num_seconds() < 60 {
        format!("{}s ago", duration.num_seconds())
    } else if duration.num_minutes() < 60 {
        format!("{}m ago", duration.num_minutes())
    } else if duration.num_hours() < 24 {
        format!("{}h ago", duration.num_hours())
    } else if duration.num_days() < 7 {
        format!("{}d ago", duration.num_days())
    } else {
        ts.format("%b %d").to_string()
    }
}

/// Format a cost for display, two decimal places (e.g., "$4.21").
pub fn format_cost(cost: Money) -> String {
    format!("${:.2}", cost.as_dollars_f64())
}

/// Format a token count compactly (e.g., "1.2K", "3.4M").
pub fn format_tokens(count: u64) -> String {
    if count >= 1_000_000 {
        format!("{:.1}M", count as f64 / 1_000_000.0)
    } else if count >= 1_000 {
        format!("{:.1}K", count as f64 / 1_000.0)
    } else {
        count.to_string()
    }
}
