//! Measurement history handed to the forecast engine.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::id::BuildingId;
use crate::value_object::ValueObject;

/// Sampling interval of a measurement series (and of the forecast built from it).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    FifteenMinutes,
    #[default]
    Hourly,
}

impl Granularity {
    pub fn minutes(self) -> i64 {
        match self {
            Granularity::FifteenMinutes => 15,
            Granularity::Hourly => 60,
        }
    }

    pub fn step(self) -> Duration {
        Duration::minutes(self.minutes())
    }

    /// Number of steps that make up one day.
    pub fn steps_per_day(self) -> usize {
        (24 * 60 / self.minutes()) as usize
    }
}

/// A single consumption reading (kWh consumed during the interval starting at `timestamp`).
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementPoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

impl ValueObject for MeasurementPoint {}

impl MeasurementPoint {
    pub fn new(timestamp: DateTime<Utc>, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// Half-open time range `[start, end)` used to query history.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl ValueObject for TimeRange {}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> DomainResult<Self> {
        if end <= start {
            return Err(DomainError::validation(format!(
                "time range end ({end}) must be after start ({start})"
            )));
        }
        Ok(Self { start, end })
    }

    /// The `days` days immediately preceding `end`.
    ///
    /// Fails with `Validation` when `days` is not positive or reaches past
    /// the representable calendar.
    pub fn trailing_days(end: DateTime<Utc>, days: i64) -> DomainResult<Self> {
        let start = Duration::try_days(days)
            .and_then(|d| end.checked_sub_signed(d))
            .ok_or_else(|| DomainError::validation(format!("{days} days before {end} is out of range")))?;
        Self::new(start, end)
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start && ts < self.end
    }
}

/// Ordered consumption history for one building.
///
/// Readings may arrive unordered, duplicated or with gaps; the forecast engine
/// normalizes them onto the granularity grid before inference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementSeries {
    pub building_id: BuildingId,
    pub granularity: Granularity,
    pub points: Vec<MeasurementPoint>,
}

impl MeasurementSeries {
    pub fn new(building_id: BuildingId, granularity: Granularity, points: Vec<MeasurementPoint>) -> Self {
        Self {
            building_id,
            granularity,
            points,
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Number of readings carrying a usable (finite) value.
    pub fn observation_count(&self) -> usize {
        self.points.iter().filter(|p| p.value.is_finite()).count()
    }

    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.points.iter().map(|p| p.timestamp).max()
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn end() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 31, 0, 0, 0).unwrap()
    }

    #[test]
    fn trailing_days_ends_at_the_given_instant() {
        let r = TimeRange::trailing_days(end(), 30).unwrap();
        assert_eq!(r.end, end());
        assert_eq!(r.end - r.start, Duration::days(30));
        assert!(r.contains(r.start));
        assert!(!r.contains(r.end));
    }

    #[test]
    fn trailing_days_rejects_empty_and_unrepresentable_windows() {
        for days in [0, -3, i64::MAX, i64::MIN] {
            let err = TimeRange::trailing_days(end(), days).unwrap_err();
            assert!(matches!(err, DomainError::Validation(_)), "{days}");
        }
    }
}
