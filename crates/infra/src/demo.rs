//! Synthetic buildings, history and baseline models for local runs.

use chrono::{DateTime, Datelike, Duration, Timelike, Utc, Weekday};
use tracing::info;

use wattcast_core::{
    Algorithm, Building, BuildingId, DomainResult, Granularity, MeasurementPoint, MeasurementSeries, ModelId,
    ModelMetadata, ModelStatus, NormalizationStats, PerformanceMetrics,
};
use wattcast_models::{ModelArtifact, ModelManager};

use crate::storage::InMemoryEnergyStore;

pub const DEMO_BUILDINGS: [(&str, &str); 3] = [
    ("B001", "Headquarters"),
    ("B002", "Warehouse North"),
    ("B003", "Research Lab"),
];

/// Office-shaped hourly consumption: busier 08–18, quieter on weekends.
pub fn synthetic_load(ts: DateTime<Utc>, base_kwh: f64) -> f64 {
    let hour = ts.hour();
    let mut value = if (8..18).contains(&hour) { base_kwh * 1.3 } else { base_kwh * 0.7 };
    if matches!(ts.weekday(), Weekday::Sat | Weekday::Sun) {
        value *= 0.8;
    }
    // Deterministic wiggle so the series is not perfectly periodic.
    let wiggle = ((ts.timestamp() / 3600) % 7) as f64 - 3.0;
    (value + wiggle).max(0.0)
}

/// `days` of hourly readings ending at `end` (exclusive).
pub fn synthetic_history(building_id: &BuildingId, end: DateTime<Utc>, days: i64, base_kwh: f64) -> MeasurementSeries {
    let start = end - Duration::days(days);
    let points = (0..days * 24)
        .map(|h| {
            let ts = start + Duration::hours(h);
            MeasurementPoint::new(ts, synthetic_load(ts, base_kwh))
        })
        .collect();
    MeasurementSeries::new(building_id.clone(), Granularity::Hourly, points)
}

/// Baseline model metadata trained "now" for `building_id`.
pub fn baseline_metadata(building_id: &BuildingId, algorithm: Algorithm, base_kwh: f64) -> DomainResult<ModelMetadata> {
    Ok(ModelMetadata {
        model_id: ModelId::new(),
        building_id: building_id.clone(),
        algorithm,
        version: format!("{}-baseline-1", algorithm.as_str().to_lowercase()),
        trained_at: Utc::now(),
        training_samples: 30 * 24,
        normalization: NormalizationStats {
            mean: base_kwh,
            std_dev: base_kwh * 0.3,
        },
        performance: PerformanceMetrics::new(base_kwh * 0.05, base_kwh * 0.08)?,
        status: ModelStatus::Retired,
    })
}

/// Register and promote a baseline model for every algorithm of `building_id`,
/// unless one is already active.
pub fn seed_models(models: &ModelManager, building_id: &BuildingId, base_kwh: f64) -> DomainResult<usize> {
    let mut promoted = 0;
    for algorithm in Algorithm::ALL {
        if models.get_active_model(building_id, algorithm).is_ok() {
            continue;
        }
        let metadata = baseline_metadata(building_id, algorithm, base_kwh)?;
        let id = models.register_model(metadata, ModelArtifact::baseline(algorithm))?;
        models.promote(id)?;
        promoted += 1;
    }
    Ok(promoted)
}

/// Populate `store` and `models` with the demo buildings.
pub fn seed(store: &InMemoryEnergyStore, models: &ModelManager, now: DateTime<Utc>, days: i64) -> DomainResult<()> {
    let end = now
        .with_minute(0)
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(now);
    for (i, (raw_id, name)) in DEMO_BUILDINGS.iter().enumerate() {
        let id = BuildingId::parse(*raw_id)?;
        let base_kwh = 100.0 + 25.0 * i as f64;
        store.insert_building(Building::new(id.clone(), *name));
        store.insert_measurements(synthetic_history(&id, end, days, base_kwh));
        let promoted = seed_models(models, &id, base_kwh)?;
        info!(building_id = %id, promoted, "demo building seeded");
    }
    Ok(())
}
