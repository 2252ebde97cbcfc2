use std::collections::HashSet;
use std::future::Future;
use std::sync::OnceLock;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use regex::Regex;

static WHITESPACE_RUN: OnceLock<Regex> = OnceLock::new();
static LEADING_FLOAT: OnceLock<Regex> = OnceLock::new();

fn whitespace_run() -> &'static Regex {
    WHITESPACE_RUN.get_or_init(|| Regex::new(r"\s+").expect("static regex"))
}

fn leading_float() -> &'static Regex {
    LEADING_FLOAT.get_or_init(|| {
        Regex::new(r"^[+-]?(?:\d+\.?\d*|\.\d+)(?:[eE][+-]?\d+)?").expect("static regex")
    })
}

/// Collapses every whitespace run to a single space and trims both ends.
pub fn collapse_whitespace(text: &str) -> String {
    whitespace_run().replace_all(text, " ").trim().to_string()
}

/// Reads the numeric prefix of `raw` the way a lenient float parser does:
/// leading whitespace is skipped and trailing garbage ignored. Returns
/// `None` when no digits lead the value, or when it is not finite.
pub fn parse_leading_float(raw: &str) -> Option<f64> {
    let trimmed = raw.trim_start();
    let m = leading_float().find(trimmed)?;
    let value: f64 = m.as_str().parse().ok()?;
    if value.is_finite() {
        Some(value)
    } else {
        None
    }
}

pub fn parse_csv_list(value: &str) -> Result<Vec<String>, String> {
    let raw = value.trim();
    if raw.is_empty() {
        return Err("list is empty".to_string());
    }
    let mut out: Vec<String> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    for part in raw.split(',') {
        let item = part.trim();
        if item.is_empty() {
            continue;
        }
        if seen.insert(item.to_string()) {
            out.push(item.to_string());
        }
    }
    if out.is_empty() {
        return Err("list is empty".to_string());
    }
    Ok(out)
}

pub fn parse_key_value(pair: &str) -> Result<(String, String), String> {
    let (key, value) = pair
        .split_once('=')
        .ok_or_else(|| "expected format KEY=VALUE".to_string())?;
    let key = key.trim();
    if key.is_empty() {
        return Err("key is empty".to_string());
    }
    Ok((key.to_string(), value.to_string()))
}

/// Races `fut` against a timer. Whichever finishes first wins; the
/// loser is dropped, so the result can only ever be observed once.
pub async fn race_timeout<F, T>(fut: F, wait: Duration) -> Option<T>
where
    F: Future<Output = T>,
{
    tokio::time::timeout(wait, fut).await.ok()
}

pub fn unix_timestamp(at: DateTime<Utc>) -> f64 {
    at.timestamp_millis() as f64 / 1000.0
}

pub fn from_unix_timestamp(seconds: f64) -> Option<DateTime<Utc>> {
    if !seconds.is_finite() {
        return None;
    }
    Utc.timestamp_millis_opt((seconds * 1000.0).round() as i64)
        .single()
}

pub fn format_timestamp(at: DateTime<Utc>) -> String {
    let ts = unix_timestamp(at);
    if ts.fract() == 0.0 {
        format!("{}", ts as i64)
    } else {
        format!("{ts}")
    }
}
