//! Time-of-day normalization for order rows.
//!
//! The editing front end delivers the scheduled time in whatever shape its
//! widget produced: a clock string, a combined date-time, a spreadsheet
//! fractional-day number, sometimes with sub-second precision. Everything
//! is folded into a canonical `HH:MM:SS` before it reaches the database;
//! input that cannot be read is stored as NULL, never rejected.

use chrono::{NaiveDateTime, NaiveTime, Timelike};

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Normalize a heterogeneous JSON time value to a whole-second `NaiveTime`.
pub fn normalize_time(value: &serde_json::Value) -> Option<NaiveTime> {
    match value {
        serde_json::Value::String(s) => normalize_time_str(s),
        serde_json::Value::Number(n) => n.as_f64().and_then(normalize_fractional_day),
        _ => None,
    }
}

fn normalize_time_str(s: &str) -> Option<NaiveTime> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    // Clock formats, most specific first. %.f eats an optional fractional
    // part which is then truncated to whole seconds.
    for fmt in ["%H:%M:%S%.f", "%H:%M:%S", "%H:%M"] {
        if let Ok(t) = NaiveTime::parse_from_str(s, fmt) {
            return t.with_nanosecond(0);
        }
    }

    // Combined date-time values, as produced by date-time pickers.
    for fmt in [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return dt.time().with_nanosecond(0);
        }
    }

    None
}

/// Spreadsheet convention: a number in [0, 1) is a fraction of a day.
fn normalize_fractional_day(f: f64) -> Option<NaiveTime> {
    if !(0.0..1.0).contains(&f) {
        return None;
    }
    let total_seconds = (f * SECONDS_PER_DAY) as u32;
    NaiveTime::from_num_seconds_from_midnight_opt(total_seconds, 0)
}

/// Canonical database representation of a normalized time.
pub fn canonical_time_string(t: &NaiveTime) -> String {
    t.format("%H:%M:%S").to_string()
}
