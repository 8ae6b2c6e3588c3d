//! Optimization engine: forecast + tariff → ranked recommendations.

use serde::{Deserialize, Serialize};
use tracing::debug;

use wattcast_core::{
    DomainError, DomainResult, ForecastResult, ForecastType, Recommendation, RecommendationAction, SavingsSummary,
    TariffSchedule, TimeWindow,
};

use crate::blocks::{LoadBlock, load_blocks};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    /// Share of a block's energy that can be moved.
    pub shiftable_fraction: f64,
    /// Cap on the energy moved out of one block.
    pub max_shift_kwh: f64,
    /// Recommendations saving this much or less are dropped.
    pub min_savings: f64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            shiftable_fraction: 0.2,
            max_shift_kwh: 100.0,
            min_savings: 0.0,
        }
    }
}

impl OptimizerConfig {
    pub fn validate(&self) -> DomainResult<()> {
        if !(0.0..=1.0).contains(&self.shiftable_fraction) {
            return Err(DomainError::validation("shiftable_fraction must be within 0..=1"));
        }
        if !(self.max_shift_kwh.is_finite() && self.max_shift_kwh >= 0.0) {
            return Err(DomainError::validation("max_shift_kwh must be finite and >= 0"));
        }
        if !(self.min_savings.is_finite() && self.min_savings >= 0.0) {
            return Err(DomainError::validation("min_savings must be finite and >= 0"));
        }
        Ok(())
    }
}

/// Σ value × price over the forecast. `tariff` must already be validated.
pub fn baseline_cost(forecast: &ForecastResult, tariff: &TariffSchedule) -> DomainResult<f64> {
    forecast
        .predicted_series
        .iter()
        .try_fold(0.0, |acc, p| Ok(acc + p.value * tariff.price_at(p.hour())?))
}

#[derive(Debug, Clone, Default)]
pub struct OptimizationEngine {
    config: OptimizerConfig,
}

impl OptimizationEngine {
    pub fn new(config: OptimizerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// Ranked load-shifting recommendations for `forecast` under `tariff`.
    ///
    /// The tariff is validated before anything is priced. Results are sorted
    /// by savings (descending), then by applicable window start.
    pub fn recommend(&self, forecast: &ForecastResult, tariff: &TariffSchedule) -> DomainResult<Vec<Recommendation>> {
        tariff.validate()?;
        if forecast.is_empty() {
            return Err(DomainError::no_forecast(format!(
                "forecast {} has no predicted steps",
                forecast.id
            )));
        }
        if forecast.forecast_type != ForecastType::EnergyDemand {
            return Err(DomainError::validation(format!(
                "optimization needs an energy_demand forecast, got {}",
                forecast.forecast_type
            )));
        }

        let baseline = baseline_cost(forecast, tariff)?;
        let blocks = load_blocks(forecast, tariff)?;

        let mut out: Vec<Recommendation> = blocks
            .iter()
            .filter_map(|source| self.best_shift(source, &blocks, baseline, tariff))
            .collect();

        out.sort_by(|a, b| {
            b.estimated_savings
                .total_cmp(&a.estimated_savings)
                .then(a.applicable_window.start.cmp(&b.applicable_window.start))
        });

        debug!(
            building_id = %forecast.building_id,
            forecast_id = %forecast.id,
            blocks = blocks.len(),
            recommendations = out.len(),
            baseline_cost = baseline,
            "optimization complete"
        );
        Ok(out)
    }

    /// Best cheaper target for `source`; ties go to the earliest target.
    fn best_shift(
        &self,
        source: &LoadBlock,
        blocks: &[LoadBlock],
        baseline: f64,
        tariff: &TariffSchedule,
    ) -> Option<Recommendation> {
        let shift = (self.config.shiftable_fraction * source.energy_kwh).min(self.config.max_shift_kwh);
        if !(shift > 0.0) {
            return None;
        }

        let mut best: Option<(&LoadBlock, f64)> = None;
        for target in blocks.iter().filter(|t| t.price_per_kwh < source.price_per_kwh) {
            let shifted_cost = baseline - shift * source.price_per_kwh + shift * target.price_per_kwh;
            let savings = baseline - shifted_cost;
            match best {
                Some((_, s)) if savings <= s => {}
                _ => best = Some((target, savings)),
            }
        }

        let (target, savings) = best?;
        if !(savings > self.config.min_savings) {
            return None;
        }

        let source_band = &tariff.bands[source.band];
        let target_band = &tariff.bands[target.band];
        let pct = if baseline > 0.0 { savings / baseline * 100.0 } else { 0.0 };
        let applicable_window = TimeWindow::new(
            source.window.start.min(target.window.start),
            source.window.end.max(target.window.end),
        );

        Some(Recommendation {
            description: format!(
                "Shift {shift:.1} kWh from {} ({} to {}) to {} ({} to {}) to save {savings:.2} {}",
                source_band.label(),
                source.window.start.format("%Y-%m-%d %H:%M"),
                source.window.end.format("%H:%M"),
                target_band.label(),
                target.window.start.format("%Y-%m-%d %H:%M"),
                target.window.end.format("%H:%M"),
                tariff.currency,
            ),
            action: RecommendationAction::LoadShift {
                shift_kwh: shift,
                source_band: source_band.name.clone(),
                target_band: target_band.name.clone(),
                source_window: source.window,
                target_window: target.window,
                source_price: source.price_per_kwh,
                target_price: target.price_per_kwh,
            },
            estimated_savings: savings,
            estimated_savings_pct: pct,
            applicable_window,
        })
    }

    /// Total savings over a window of `window_hours`, projected to day/month/year.
    pub fn summarize(&self, recommendations: &[Recommendation], window_hours: f64) -> SavingsSummary {
        let total = recommendations.iter().map(|r| r.estimated_savings).sum();
        SavingsSummary::project(total, window_hours)
    }
}
