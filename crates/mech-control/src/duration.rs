//! Human-readable durations for audit events

/// Format a duration in seconds, two units at most
///
/// `90` becomes `"1 MINUTE, 30 SECONDS"`, `7500` becomes
/// `"2 HOURS, 5 MINUTES"`, and anything not positive is `"NOW"`.
pub fn printable_duration(seconds: i64) -> String {
    if seconds <= 0 {
        return "NOW".to_string();
    }
    if seconds > 86400 {
        period(seconds / 86400, "DAY", (seconds % 86400) / 3600, "HOUR")
    } else if seconds > 3600 {
        period(seconds / 3600, "HOUR", (seconds % 3600) / 60, "MINUTE")
    } else if seconds > 60 {
        period(seconds / 60, "MINUTE", seconds % 60, "SECOND")
    } else {
        period(seconds, "SECOND", 0, "")
    }
}

fn period(high: i64, high_label: &str, low: i64, low_label: &str) -> String {
    let plural = |n: i64| if n > 1 { "S" } else { "" };
    if low > 0 {
        format!(
            "{} {}{}, {} {}{}",
            high,
            high_label,
            plural(high),
            low,
            low_label,
            plural(low)
        )
    } else {
        format!("{} {}{}", high, high_label, plural(high))
    }
}
