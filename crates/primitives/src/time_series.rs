//! TimeSeriesLog: time-bucketed append log over any store
//!
//! Every record lands under a key derived from the current UTC time at a
//! fixed [`Precision`]:
//!
//! ```text
//! <base>/<yyyy/MM/dd/HH/mm/ss/SSS truncated to precision>/<epoch-ms + nanos>_<random>.<ext>
//! ```
//!
//! All records written within one precision unit share a directory prefix,
//! so a range query is a walk over consecutive prefixes.
//!
//! ## Uniqueness
//!
//! The file name is `epoch-ms + subsecond-nanos` followed by a random
//! number below 10,000. Two writers colliding on both in the same unit
//! silently overwrite each other; nothing at this layer detects it.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Datelike, Months, TimeZone, Utc};
use rand::Rng;
use serde_json::Value;
use stow_core::{Store, StowError, StowResult};
use tracing::debug;

/// Granularity of the time prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Precision {
    /// One prefix per year
    Year,
    /// One prefix per month
    Month,
    /// One prefix per day
    Day,
    /// One prefix per hour
    Hour,
    /// One prefix per minute
    Min,
    /// One prefix per second
    Sec,
    /// One prefix per millisecond
    Ms,
}

impl Precision {
    /// chrono format string of the prefix
    pub fn pattern(self) -> &'static str {
        match self {
            Precision::Year => "%Y",
            Precision::Month => "%Y/%m",
            Precision::Day => "%Y/%m/%d",
            Precision::Hour => "%Y/%m/%d/%H",
            Precision::Min => "%Y/%m/%d/%H/%M",
            Precision::Sec => "%Y/%m/%d/%H/%M/%S",
            Precision::Ms => "%Y/%m/%d/%H/%M/%S/%3f",
        }
    }

    /// Prefix of an instant
    pub fn format(self, at: &DateTime<Utc>) -> String {
        at.format(self.pattern()).to_string()
    }

    /// Distance between consecutive prefixes
    pub fn step(self) -> Step {
        match self {
            Precision::Ms => Step::Millis(1),
            Precision::Sec => Step::Millis(1_000),
            Precision::Min => Step::Millis(60_000),
            Precision::Hour => Step::Millis(3_600_000),
            Precision::Day => Step::Millis(86_400_000),
            Precision::Month => Step::Months(1),
            Precision::Year => Step::Months(12),
        }
    }

    /// Start of the unit containing `at`
    pub fn truncate(self, at: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self.step() {
            Step::Millis(unit) => {
                let ms = at.timestamp_millis();
                Utc.timestamp_millis_opt(ms - ms.rem_euclid(unit)).single()
            }
            Step::Months(_) => {
                let month = if self == Precision::Year { 1 } else { at.month() };
                Utc.with_ymd_and_hms(at.year(), month, 1, 0, 0, 0).single()
            }
        }
    }
}

impl FromStr for Precision {
    type Err = StowError;

    /// Case-insensitive: `YEAR`, `MONTH`, `DAY`, `HOUR`, `MIN`, `SEC`, `MS`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "YEAR" => Ok(Precision::Year),
            "MONTH" => Ok(Precision::Month),
            "DAY" => Ok(Precision::Day),
            "HOUR" => Ok(Precision::Hour),
            "MIN" => Ok(Precision::Min),
            "SEC" => Ok(Precision::Sec),
            "MS" => Ok(Precision::Ms),
            _ => Err(StowError::InvalidPrecision(s.to_string())),
        }
    }
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Precision::Year => "YEAR",
            Precision::Month => "MONTH",
            Precision::Day => "DAY",
            Precision::Hour => "HOUR",
            Precision::Min => "MIN",
            Precision::Sec => "SEC",
            Precision::Ms => "MS",
        };
        f.write_str(name)
    }
}

/// Step between consecutive prefixes
///
/// Months and years vary in length, so they advance on the calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Fixed number of milliseconds
    Millis(i64),
    /// Calendar months
    Months(u32),
}

impl Step {
    /// `at` moved forward by one step, `None` past the representable range
    pub fn advance(self, at: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Step::Millis(ms) => at.checked_add_signed(chrono::Duration::milliseconds(ms)),
            Step::Months(n) => at.checked_add_months(Months::new(n)),
        }
    }
}

/// Value appended to a time series
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    /// Raw bytes, written verbatim
    Bytes(Vec<u8>),
    /// Text, written verbatim
    Text(String),
    /// Object or array, written as JSON
    Json(Value),
}

impl From<Vec<u8>> for Record {
    fn from(v: Vec<u8>) -> Self {
        Record::Bytes(v)
    }
}

impl From<&[u8]> for Record {
    fn from(v: &[u8]) -> Self {
        Record::Bytes(v.to_vec())
    }
}

impl From<String> for Record {
    fn from(v: String) -> Self {
        Record::Text(v)
    }
}

impl From<&str> for Record {
    fn from(v: &str) -> Self {
        Record::Text(v.to_string())
    }
}

impl From<Value> for Record {
    /// Objects and arrays become JSON; a string keeps its text; other
    /// scalars are written in their JSON form
    fn from(v: Value) -> Self {
        match v {
            Value::Object(_) | Value::Array(_) => Record::Json(v),
            Value::String(s) => Record::Text(s),
            other => Record::Text(other.to_string()),
        }
    }
}

/// Time-bucketed log over a store bucket
#[derive(Debug)]
pub struct TimeSeriesLog<S> {
    store: Arc<S>,
    bucket: String,
    base: String,
    precision: Precision,
}

impl<S> Clone for TimeSeriesLog<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            bucket: self.bucket.clone(),
            base: self.base.clone(),
            precision: self.precision,
        }
    }
}

impl<S: Store> TimeSeriesLog<S> {
    /// Create a log writing to `bucket` under `base`
    ///
    /// Trailing `/` on `base` is ignored; an empty base puts the time
    /// prefix at the top of the bucket.
    pub fn new(store: Arc<S>, bucket: impl Into<String>, base: &str, precision: Precision) -> Self {
        Self {
            store,
            bucket: bucket.into(),
            base: base.trim_end_matches('/').to_string(),
            precision,
        }
    }

    /// Precision of this log
    pub fn precision(&self) -> Precision {
        self.precision
    }

    /// Bucket written to
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Base prefix
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Underlying store
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    fn directory(&self, at: &DateTime<Utc>) -> String {
        let prefix = self.precision.format(at);
        if self.base.is_empty() {
            format!("{}/", prefix)
        } else {
            format!("{}/{}/", self.base, prefix)
        }
    }

    /// Append a record timestamped now and return the key written
    ///
    /// `extension` may be given with or without its leading dot.
    ///
    /// # Errors
    ///
    /// `WriteFailed` if the store did not accept the write, or any error
    /// the store itself returns.
    pub fn append(&self, extension: &str, value: impl Into<Record>) -> StowResult<String> {
        self.append_at(Utc::now(), extension, value.into())
    }

    fn append_at(&self, now: DateTime<Utc>, extension: &str, record: Record) -> StowResult<String> {
        let unique = now.timestamp_millis() + i64::from(now.timestamp_subsec_nanos());
        let salt: u32 = rand::thread_rng().gen_range(0..10_000);
        let extension = extension.trim_start_matches('.');
        let mut key = format!("{}{}_{}", self.directory(&now), unique, salt);
        if !extension.is_empty() {
            key.push('.');
            key.push_str(extension);
        }

        let written = match &record {
            Record::Bytes(data) => self.store.write_bytes(&self.bucket, &key, data)?,
            Record::Text(text) => self.store.write_text(&self.bucket, &key, text)?,
            Record::Json(value) => self.store.write_json(&self.bucket, &key, value)?,
        };
        if !written {
            return Err(StowError::write_failed(&self.bucket, &key));
        }
        debug!(target: "stow::time_series", bucket = %self.bucket, key = %key, "Appended record");
        Ok(key)
    }

    /// Every `(key, JSON)` written in `[start_ms, end_ms)`, oldest unit first
    ///
    /// Whole units are scanned: a record in the same unit as `start_ms`
    /// but earlier than it is included. Content that is not JSON comes
    /// back as a JSON string.
    pub fn range_query(&self, start_ms: i64, end_ms: i64) -> Vec<(String, Value)> {
        if end_ms <= start_ms {
            return Vec::new();
        }
        let (Some(start), Some(end)) = (
            Utc.timestamp_millis_opt(start_ms).single(),
            Utc.timestamp_millis_opt(end_ms).single(),
        ) else {
            return Vec::new();
        };
        let Some(mut cursor) = self.precision.truncate(start) else {
            return Vec::new();
        };

        let step = self.precision.step();
        let mut out = Vec::new();
        while cursor < end {
            let prefix = self.directory(&cursor);
            out.extend(self.store.entries_json(&self.bucket, &prefix));
            match step.advance(cursor) {
                Some(next) => cursor = next,
                None => break,
            }
        }
        debug!(target: "stow::time_series", bucket = %self.bucket, start_ms, end_ms, found = out.len(), "Range query");
        out
    }
}

/// `store.time_series(bucket, base, precision)` on shared stores
pub trait TimeSeriesExt {
    /// Backend the log writes to
    type Backend: Store;

    /// Time-bucketed log over this store
    ///
    /// # Errors
    ///
    /// `InvalidPrecision` if `precision` is not one of the known names.
    fn time_series(
        &self,
        bucket: &str,
        base: &str,
        precision: &str,
    ) -> StowResult<TimeSeriesLog<Self::Backend>>;
}

impl<S: Store> TimeSeriesExt for Arc<S> {
    type Backend = S;

    fn time_series(&self, bucket: &str, base: &str, precision: &str) -> StowResult<TimeSeriesLog<S>> {
        Ok(TimeSeriesLog::new(
            Arc::clone(self),
            bucket,
            base,
            precision.parse()?,
        ))
    }
}
