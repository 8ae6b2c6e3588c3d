//! Segmentation of a forecast into tariff load blocks.

use wattcast_core::{DomainError, DomainResult, ForecastResult, TariffSchedule, TimeWindow};

/// Maximal run of consecutive steps priced by the same tariff band.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadBlock {
    pub band: usize,
    /// Step range `[start, end)` within the predicted series.
    pub start: usize,
    pub end: usize,
    pub energy_kwh: f64,
    pub price_per_kwh: f64,
    pub window: TimeWindow,
}

impl LoadBlock {
    pub fn steps(&self) -> usize {
        self.end - self.start
    }
}

/// Split `forecast` into load blocks. `tariff` must already be validated.
pub fn load_blocks(forecast: &ForecastResult, tariff: &TariffSchedule) -> DomainResult<Vec<LoadBlock>> {
    let step = forecast.granularity.step();
    let mut blocks: Vec<LoadBlock> = Vec::new();

    for (i, p) in forecast.predicted_series.iter().enumerate() {
        let band = tariff
            .band_index_at(p.hour())
            .ok_or_else(|| DomainError::invalid_tariff(format!("no band covers hour {}", p.hour())))?;
        match blocks.last_mut() {
            Some(b) if b.band == band && b.end == i => {
                b.end = i + 1;
                b.energy_kwh += p.value;
                b.window.end = p.timestamp + step;
            }
            _ => blocks.push(LoadBlock {
                band,
                start: i,
                end: i + 1,
                energy_kwh: p.value,
                price_per_kwh: tariff.bands[band].price_per_kwh,
                window: TimeWindow::new(p.timestamp, p.timestamp + step),
            }),
        }
    }
    Ok(blocks)
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::*;
    use wattcast_core::{
        Algorithm, BuildingId, ForecastId, ForecastType, Granularity, Horizon, ImputationReport, ModelId,
        PredictedPoint,
    };

    fn flat_day() -> ForecastResult {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let predicted_series = (0..24)
            .map(|h| PredictedPoint {
                timestamp: start + Duration::hours(h),
                value: 10.0,
                lower_bound: 8.0,
                upper_bound: 12.0,
            })
            .collect();
        ForecastResult {
            id: ForecastId::new(),
            building_id: BuildingId::parse("B001").unwrap(),
            horizon: Horizon::Day,
            forecast_type: ForecastType::EnergyDemand,
            granularity: Granularity::Hourly,
            generated_at: start,
            valid_from: start,
            valid_to: start + Duration::hours(24),
            predicted_series,
            model_id: ModelId::new(),
            model_version: "v1".into(),
            algorithm: Algorithm::Lstm,
            imputation: ImputationReport::default(),
            quality_warnings: vec![],
        }
    }

    #[test]
    fn reference_day_splits_into_five_blocks() {
        let blocks = load_blocks(&flat_day(), &TariffSchedule::reference()).unwrap();
        let spans: Vec<(usize, usize)> = blocks.iter().map(|b| (b.start, b.end)).collect();
        assert_eq!(spans, vec![(0, 6), (6, 9), (9, 21), (21, 23), (23, 24)]);
        assert_eq!(blocks[2].energy_kwh, 120.0);
        assert_eq!(blocks[2].price_per_kwh, 1.05);
        assert_eq!(blocks[2].steps(), 12);
        assert_eq!(blocks[2].window.end - blocks[2].window.start, Duration::hours(12));
    }
}
