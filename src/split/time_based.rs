//! Time-window round-robin splitting.
//!
//! Rows are bucketed by the window their timestamp falls into. Each window
//! is shuffled, then rows are taken one window at a time in chronological
//! order (round robin) and handed out to training, validation and testing
//! in that order. Segments are disjoint.

use super::{SegmentSizes, Segments, SplitPolicy};
use crate::row::Row;
use crate::sampler::SeededSampler;
use crate::{Error, Result};
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, VecDeque};
use tracing::debug;

/// Epoch values above this are taken as milliseconds.
const EPOCH_MILLIS_THRESHOLD: i64 = 100_000_000_000;

/// Window granularity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeWindow {
    /// One hour
    Hour,
    /// One calendar day
    #[default]
    Day,
    /// One ISO week
    Week,
    /// One calendar month
    Month,
}

impl TimeWindow {
    /// Ordinal of the window containing `ts`; increases with time.
    #[must_use]
    pub fn key(self, ts: DateTime<Utc>) -> i64 {
        match self {
            Self::Hour => ts.timestamp().div_euclid(3600),
            Self::Day => i64::from(ts.num_days_from_ce()),
            Self::Week => {
                let week = ts.iso_week();
                i64::from(week.year()) * 100 + i64::from(week.week())
            }
            Self::Month => i64::from(ts.year()) * 12 + i64::from(ts.month0()),
        }
    }
}

/// Parse a timestamp value.
///
/// Accepts RFC 3339 strings, `YYYY-MM-DD`, `YYYY-MM-DD HH:MM:SS`
/// (or with a `T`), and integer epoch seconds (or milliseconds), as numbers
/// or digit strings.
///
/// ```
/// use combo_eval::split::parse_timestamp;
/// use serde_json::json;
///
/// assert!(parse_timestamp(&json!("2024-03-01T12:00:00Z")).is_some());
/// assert!(parse_timestamp(&json!(1_700_000_000)).is_some());
/// assert!(parse_timestamp(&json!("yesterday")).is_none());
/// ```
#[must_use]
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => n.as_i64().and_then(from_epoch),
        Value::String(s) => parse_timestamp_str(s.trim()),
        _ => None,
    }
}

fn from_epoch(value: i64) -> Option<DateTime<Utc>> {
    if value.abs() > EPOCH_MILLIS_THRESHOLD {
        Utc.timestamp_millis_opt(value).single()
    } else {
        Utc.timestamp_opt(value, 0).single()
    }
}

fn parse_timestamp_str(s: &str) -> Option<DateTime<Utc>> {
    if s.is_empty() {
        return None;
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Some(ts.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(naive.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
    }
    if s.bytes().all(|b| b.is_ascii_digit()) {
        return s.parse::<i64>().ok().and_then(from_epoch);
    }
    None
}

/// Round robin over time windows of a timestamp field.
#[derive(Debug, Clone)]
pub struct TimeBasedSplit {
    field: String,
    window: TimeWindow,
}

impl TimeBasedSplit {
    /// Bucket on `field` by `window`.
    #[must_use]
    pub fn new(field: impl Into<String>, window: TimeWindow) -> Self {
        Self {
            field: field.into(),
            window,
        }
    }

    /// Window granularity.
    #[must_use]
    pub const fn window(&self) -> TimeWindow {
        self.window
    }
}

impl SplitPolicy for TimeBasedSplit {
    fn name(&self) -> &'static str {
        "time_based"
    }

    fn split(
        &self,
        rows: &[Row],
        sizes: SegmentSizes,
        sampler: &SeededSampler,
    ) -> Result<Segments> {
        let mut windows: BTreeMap<i64, Vec<Row>> = BTreeMap::new();
        let mut unparsed = 0usize;
        for row in rows {
            match row.get(&self.field).and_then(parse_timestamp) {
                Some(ts) => windows.entry(self.window.key(ts)).or_default().push(row.clone()),
                None => unparsed += 1,
            }
        }

        if windows.is_empty() {
            return Err(Error::Data(format!(
                "no parseable timestamps in field '{}'",
                self.field
            )));
        }
        debug!(
            field = %self.field,
            windows = windows.len(),
            unparsed,
            "time windows"
        );

        let mut queues: Vec<VecDeque<Row>> = windows
            .into_values()
            .enumerate()
            .map(|(i, rows)| sampler.shuffle_salted(&rows, i as u64).into())
            .collect();

        let mut ordered = Vec::with_capacity(rows.len() - unparsed);
        while queues.iter().any(|q| !q.is_empty()) {
            for queue in &mut queues {
                if let Some(row) = queue.pop_front() {
                    ordered.push(row);
                }
            }
        }

        let mut rest = ordered.into_iter();
        let training = rest.by_ref().take(sizes.training).collect();
        let validation = rest.by_ref().take(sizes.validation).collect();
        let testing = rest.take(sizes.testing).collect();
        Ok(Segments {
            training,
            validation,
            testing,
        })
    }
}
