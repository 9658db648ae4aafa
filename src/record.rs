//! ## Persisted sketch records
//! One record exists per `(metric, dimension, day)`. Its identity is
//! `<metric>:<dimension>:<YYYY-MM-DD>` where the day is the UTC calendar day of
//! `window_start`.
//!
//! Record fields:
//! - `blob`        - serialized sketch registers, exactly `2^precision` bytes
//! - `window_*`    - `[day 00:00 UTC, next day 00:00 UTC)`
//! - `version`     - starts at 0, bumped by one on every successful merge-write
//! - `created_at`  - drives the 365-day retention enforced by the store

use std::fmt::{Display, Formatter};

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};

use crate::error::{InputError, SketchError};
use crate::sketch::Sketch;

/// Dimension used when a caller does not provide one
pub const DEFAULT_DIMENSION: &str = "global";
/// Number of days a record is kept after creation
pub const RETENTION_DAYS: i64 = 365;
/// Separator between id components
const ID_SEPARATOR: char = ':';

/// Validated `(metric, dimension)` pair
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "with_serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MetricKey {
    metric: String,
    dimension: String,
}

impl MetricKey {
    /// Create key, defaulting missing or empty dimension to `"global"`
    pub fn new(metric: &str, dimension: Option<&str>) -> Result<Self, InputError> {
        if metric.is_empty() {
            return Err(InputError::EmptyMetric);
        }
        let dimension = dimension
            .filter(|d| !d.is_empty())
            .unwrap_or(DEFAULT_DIMENSION);
        for component in [metric, dimension] {
            if component.contains(ID_SEPARATOR) {
                return Err(InputError::InvalidKey(component.to_string()));
            }
        }
        Ok(Self {
            metric: metric.to_string(),
            dimension: dimension.to_string(),
        })
    }

    #[inline]
    pub fn metric(&self) -> &str {
        &self.metric
    }

    #[inline]
    pub fn dimension(&self) -> &str {
        &self.dimension
    }

    /// Return id of the record holding this key's sketch for given day
    pub fn record_id(&self, bucket: DayBucket) -> RecordId {
        RecordId(format!(
            "{}{sep}{}{sep}{}",
            self.metric,
            self.dimension,
            bucket,
            sep = ID_SEPARATOR
        ))
    }
}

impl Display for MetricKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}{}", self.metric, ID_SEPARATOR, self.dimension)
    }
}

/// Record identity `<metric>:<dimension>:<YYYY-MM-DD>`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "with_serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RecordId(String);

impl RecordId {
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for RecordId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// UTC calendar day at which sketches are persisted and queried
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DayBucket(NaiveDate);

impl DayBucket {
    /// Return day bucket containing `ts`
    #[inline]
    pub fn containing(ts: DateTime<Utc>) -> Self {
        Self(ts.date_naive())
    }

    #[inline]
    pub fn day(&self) -> NaiveDate {
        self.0
    }

    /// Return inclusive window start (midnight UTC)
    #[inline]
    pub fn start(&self) -> DateTime<Utc> {
        Utc.from_utc_datetime(&self.0.and_time(NaiveTime::MIN))
    }

    /// Return exclusive window end (next midnight UTC)
    #[inline]
    pub fn end(&self) -> DateTime<Utc> {
        self.start() + Duration::days(1)
    }
}

impl Display for DayBucket {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

/// Durable sketch record for one `(metric, dimension, day)`
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "with_serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SketchRecord {
    pub id: RecordId,
    pub metric: String,
    pub dimension: String,
    pub blob: Vec<u8>,
    pub precision: u8,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SketchRecord {
    /// Create first version of the record for `key` and `bucket` holding `sketch`
    pub fn new(key: &MetricKey, bucket: DayBucket, sketch: &Sketch, now: DateTime<Utc>) -> Self {
        Self {
            id: key.record_id(bucket),
            metric: key.metric.clone(),
            dimension: key.dimension.clone(),
            blob: sketch.to_bytes(),
            precision: sketch.precision(),
            window_start: bucket.start(),
            window_end: bucket.end(),
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Decode stored blob into sketch
    #[inline]
    pub fn sketch(&self) -> Result<Sketch, SketchError> {
        Sketch::from_bytes(self.precision, &self.blob)
    }

    /// Return time after which the store may delete the record
    #[inline]
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.created_at + Duration::days(RETENTION_DAYS)
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use test_case::test_case;

    fn ts(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test_case("page_view", None => "page_view:global"; "missing dimension")]
    #[test_case("page_view", Some("") => "page_view:global"; "empty dimension")]
    #[test_case("page_view", Some("US") => "page_view:US"; "explicit dimension")]
    fn test_metric_key(metric: &str, dimension: Option<&str>) -> String {
        MetricKey::new(metric, dimension).unwrap().to_string()
    }

    #[test_case("", None => InputError::EmptyMetric; "empty metric")]
    #[test_case("a:b", None => InputError::InvalidKey("a:b".to_string()); "separator in metric")]
    #[test_case("dau", Some("x:y") => InputError::InvalidKey("x:y".to_string()); "separator in dimension")]
    fn test_metric_key_rejected(metric: &str, dimension: Option<&str>) -> InputError {
        MetricKey::new(metric, dimension).unwrap_err()
    }

    #[test_case("2023-10-27T00:00:00Z" => "dau:global:2023-10-27"; "midnight")]
    #[test_case("2023-10-27T23:59:59.999Z" => "dau:global:2023-10-27"; "last millisecond")]
    #[test_case("2023-10-28T01:30:00+05:00" => "dau:global:2023-10-27"; "offset converted to utc")]
    #[test_case("2024-02-29T12:00:00Z" => "dau:global:2024-02-29"; "leap day")]
    fn test_record_id(now: &str) -> String {
        let key = MetricKey::new("dau", None).unwrap();
        key.record_id(DayBucket::containing(ts(now))).to_string()
    }

    #[test]
    fn test_day_bucket_window() {
        let bucket = DayBucket::containing(ts("2023-12-31T18:45:00Z"));
        assert_eq!(bucket.start(), ts("2023-12-31T00:00:00Z"));
        assert_eq!(bucket.end(), ts("2024-01-01T00:00:00Z"));
    }

    #[test]
    fn test_new_record() {
        let key = MetricKey::new("signup", Some("mobile")).unwrap();
        let now = ts("2023-10-27T10:11:12Z");
        let mut sketch = Sketch::new(8).unwrap();
        sketch.add("user_1");

        let record = SketchRecord::new(&key, DayBucket::containing(now), &sketch, now);
        assert_eq!(record.id.as_str(), "signup:mobile:2023-10-27");
        assert_eq!(record.metric, "signup");
        assert_eq!(record.dimension, "mobile");
        assert_eq!(record.blob.len(), 256);
        assert_eq!(record.precision, 8);
        assert_eq!(record.version, 0);
        assert_eq!(record.window_end - record.window_start, Duration::days(1));
        assert_eq!(record.expires_at(), ts("2024-10-26T10:11:12Z"));
        assert_eq!(record.sketch().unwrap(), sketch);
    }

    #[test]
    fn test_corrupt_record_blob() {
        let key = MetricKey::new("signup", None).unwrap();
        let now = ts("2023-10-27T10:11:12Z");
        let mut record =
            SketchRecord::new(&key, DayBucket::containing(now), &Sketch::new(8).unwrap(), now);
        record.blob.truncate(100);
        assert!(matches!(
            record.sketch(),
            Err(SketchError::InvalidBlobLength { actual: 100, .. })
        ));
    }
}
