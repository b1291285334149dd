// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for date/time parsing and bucketing.

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveDateTime, SecondsFormat, Utc};

/// Format a UTC timestamp as RFC3339 using a `Z` suffix.
pub fn format_utc_rfc3339(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Parse an upstream timestamp.
///
/// Accepts full RFC 3339 as well as the minute-precision `2024-06-09T10:00Z`
/// form Setmore emits. Offset-less values are taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<FixedOffset>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt);
    }

    let naive_part = raw.strip_suffix('Z').unwrap_or(raw);
    const FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
    ];
    FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(naive_part, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(naive_part, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
        .map(|naive| naive.and_utc().fixed_offset())
}

/// Monday of the week containing `date`.
///
/// Sunday shifts back six days, every other day back `weekday - 1` days.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    let back = date.weekday().num_days_from_monday();
    date - Duration::days(i64::from(back))
}

/// Whole days from `booked` to `start`, rounded up.
pub fn lead_time_days(booked: DateTime<FixedOffset>, start: DateTime<FixedOffset>) -> i64 {
    const DAY_MS: i64 = 24 * 60 * 60 * 1000;
    let diff_ms = (start - booked).num_milliseconds();
    // ceil for both signs
    diff_ms.div_euclid(DAY_MS) + i64::from(diff_ms.rem_euclid(DAY_MS) != 0)
}

/// Convert epoch milliseconds to a UTC timestamp.
pub fn from_epoch_millis(millis: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
}
