//! Regularization of raw measurement series.
//!
//! Readings are floored onto the granularity grid; duplicates in one slot are
//! averaged; interior gaps are linearly interpolated; leading gaps are
//! back-filled and trailing gaps forward-filled from the nearest reading.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};

use wattcast_core::{DomainError, DomainResult, Granularity, ImputationReport, MeasurementSeries, TimeRange};

/// A gap-free series on the regular grid.
#[derive(Debug, Clone, PartialEq)]
pub struct RegularSeries {
    /// Timestamp of `values[0]`.
    pub start: DateTime<Utc>,
    pub granularity: Granularity,
    pub values: Vec<f64>,
    pub report: ImputationReport,
}

impl RegularSeries {
    pub fn timestamp_at(&self, i: usize) -> DateTime<Utc> {
        self.start + Duration::minutes(i as i64 * self.granularity.minutes())
    }

    /// One step past the last value; the first step a forecast predicts.
    pub fn end(&self) -> DateTime<Utc> {
        self.timestamp_at(self.values.len())
    }
}

fn floor_secs(secs: i64, step: i64) -> i64 {
    secs - secs.rem_euclid(step)
}

/// Place `series` on its granularity grid and fill every missing slot.
///
/// Without `bounds` the grid spans the first through the last usable reading;
/// with `bounds` it spans every slot of the half-open range and readings
/// outside it are ignored.
pub fn impute(series: &MeasurementSeries, bounds: Option<TimeRange>) -> DomainResult<RegularSeries> {
    let granularity = series.granularity;
    let step = granularity.minutes() * 60;

    let window = bounds.map(|r| {
        (
            floor_secs(r.start.timestamp(), step),
            floor_secs(r.end.timestamp() - 1, step),
        )
    });

    let mut buckets: BTreeMap<i64, (f64, usize)> = BTreeMap::new();
    for p in series.points.iter().filter(|p| p.value.is_finite()) {
        let key = floor_secs(p.timestamp.timestamp(), step);
        if let Some((lo, hi)) = window {
            if key < lo || key > hi {
                continue;
            }
        }
        let slot = buckets.entry(key).or_insert((0.0, 0));
        slot.0 += p.value;
        slot.1 += 1;
    }

    let (first_key, last_key) = match (window, buckets.keys().next(), buckets.keys().next_back()) {
        (_, None, _) | (_, _, None) => {
            return Err(DomainError::insufficient_history(format!(
                "building {} has no usable readings",
                series.building_id
            )));
        }
        (Some(w), _, _) => w,
        (None, Some(first), Some(last)) => (*first, *last),
    };

    let len = ((last_key - first_key) / step + 1) as usize;
    let mut slots: Vec<Option<f64>> = vec![None; len];
    for (key, (sum, count)) in &buckets {
        slots[((key - first_key) / step) as usize] = Some(sum / *count as f64);
    }

    let known: Vec<usize> = slots
        .iter()
        .enumerate()
        .filter_map(|(i, v)| v.map(|_| i))
        .collect();
    let imputed_points = len - known.len();

    let mut values = vec![0.0; len];
    for (i, v) in slots.iter().enumerate() {
        if let Some(v) = v {
            values[i] = *v;
        }
    }
    if let (Some(&first), Some(&last)) = (known.first(), known.last()) {
        for v in &mut values[..first] {
            *v = values_at(&slots, first);
        }
        for v in &mut values[last + 1..] {
            *v = values_at(&slots, last);
        }
        for pair in known.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            let (va, vb) = (values_at(&slots, a), values_at(&slots, b));
            for (t, v) in values.iter_mut().enumerate().take(b).skip(a + 1) {
                *v = va + (vb - va) * (t - a) as f64 / (b - a) as f64;
            }
        }
    }

    let start = DateTime::from_timestamp(first_key, 0)
        .ok_or_else(|| DomainError::validation("measurement timestamps are out of range"))?;

    Ok(RegularSeries {
        start,
        granularity,
        values,
        report: ImputationReport {
            imputed_points,
            total_points: len,
        },
    })
}

fn values_at(slots: &[Option<f64>], i: usize) -> f64 {
    slots[i].unwrap_or_default()
}
