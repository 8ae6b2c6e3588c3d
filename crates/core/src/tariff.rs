//! Time-of-day tariff schedule.

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::value_object::ValueObject;

/// A time-of-day interval `[start_hour, end_hour)` with a fixed energy price.
///
/// Bands whose `end_hour` is not after `start_hour` wrap past midnight
/// (e.g. 23→6 covers 23:00–05:59). `end_hour` may be 24.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TariffBand {
    #[serde(default)]
    pub name: String,
    pub start_hour: u32,
    pub end_hour: u32,
    pub price_per_kwh: f64,
}

impl ValueObject for TariffBand {}

impl TariffBand {
    pub fn new(name: impl Into<String>, start_hour: u32, end_hour: u32, price_per_kwh: f64) -> Self {
        Self {
            name: name.into(),
            start_hour,
            end_hour,
            price_per_kwh,
        }
    }

    /// Whether `hour` (0..24) falls inside this band.
    pub fn contains(&self, hour: u32) -> bool {
        let end = self.end_hour % 24;
        if self.start_hour < end {
            hour >= self.start_hour && hour < end
        } else {
            hour >= self.start_hour || hour < end
        }
    }

    /// Label used in recommendation descriptions.
    pub fn label(&self) -> String {
        if self.name.is_empty() {
            format!("{:02}:00-{:02}:00", self.start_hour, self.end_hour % 24)
        } else {
            format!("{} ({:02}:00-{:02}:00)", self.name, self.start_hour, self.end_hour % 24)
        }
    }
}

/// Ordered set of bands that must partition the 24 hours of a day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TariffSchedule {
    #[serde(default = "default_currency")]
    pub currency: String,
    pub bands: Vec<TariffBand>,
}

fn default_currency() -> String {
    "PLN".to_string()
}

impl TariffSchedule {
    pub fn new(currency: impl Into<String>, bands: Vec<TariffBand>) -> Self {
        Self {
            currency: currency.into(),
            bands,
        }
    }

    /// Reference time-of-use schedule (peak 9–21, off-peak 21–23 and 6–9,
    /// super-off-peak 23–6).
    pub fn reference() -> Self {
        Self::new(
            "PLN",
            vec![
                TariffBand::new("peak", 9, 21, 1.05),
                TariffBand::new("off_peak", 21, 23, 0.65),
                TariffBand::new("super_off_peak", 23, 6, 0.45),
                TariffBand::new("off_peak", 6, 9, 0.65),
            ],
        )
    }

    /// Check the bands partition the day exactly and carry usable prices.
    ///
    /// Must run before any cost computation.
    pub fn validate(&self) -> DomainResult<()> {
        if self.bands.is_empty() {
            return Err(DomainError::invalid_tariff("schedule has no bands"));
        }

        let mut coverage = [0u8; 24];
        for (i, band) in self.bands.iter().enumerate() {
            if band.start_hour > 23 || band.end_hour > 24 {
                return Err(DomainError::invalid_tariff(format!(
                    "band #{i} has hours outside the day ({}-{})",
                    band.start_hour, band.end_hour
                )));
            }
            if band.start_hour == band.end_hour % 24 && !(band.start_hour == 0 && band.end_hour == 24) {
                return Err(DomainError::invalid_tariff(format!(
                    "band #{i} is empty or ambiguous ({}-{})",
                    band.start_hour, band.end_hour
                )));
            }
            if !(band.price_per_kwh.is_finite() && band.price_per_kwh >= 0.0) {
                return Err(DomainError::invalid_tariff(format!(
                    "band #{i} has an unusable price ({})",
                    band.price_per_kwh
                )));
            }
            for (hour, slot) in coverage.iter_mut().enumerate() {
                if band.contains(hour as u32) {
                    *slot += 1;
                }
            }
        }

        if let Some(hour) = coverage.iter().position(|c| *c == 0) {
            return Err(DomainError::invalid_tariff(format!("gap: hour {hour} is not covered")));
        }
        if let Some(hour) = coverage.iter().position(|c| *c > 1) {
            return Err(DomainError::invalid_tariff(format!(
                "overlap: hour {hour} is covered by {} bands",
                coverage[hour]
            )));
        }
        Ok(())
    }

    /// Index of the band containing `hour`.
    pub fn band_index_at(&self, hour: u32) -> Option<usize> {
        self.bands.iter().position(|b| b.contains(hour % 24))
    }

    pub fn band_at(&self, hour: u32) -> Option<&TariffBand> {
        self.band_index_at(hour).map(|i| &self.bands[i])
    }

    pub fn price_at(&self, hour: u32) -> DomainResult<f64> {
        self.band_at(hour)
            .map(|b| b.price_per_kwh)
            .ok_or_else(|| DomainError::invalid_tariff(format!("no band covers hour {hour}")))
    }
}
