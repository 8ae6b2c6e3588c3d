use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use chrono::{TimeZone, Utc};
use std::sync::Arc;

use wattcast_core::{BuildingId, ForecastType, Horizon, TariffSchedule};
use wattcast_forecast::{EngineConfig, ForecastEngine};
use wattcast_infra::demo;
use wattcast_models::{ManagerConfig, ModelManager};
use wattcast_optimization::OptimizationEngine;

fn bench_predict_and_recommend(c: &mut Criterion) {
    let building = BuildingId::parse("B001").unwrap();
    let end = Utc.with_ymd_and_hms(2024, 3, 31, 0, 0, 0).unwrap();
    let history = demo::synthetic_history(&building, end, 30, 100.0);

    let models = Arc::new(ModelManager::new(ManagerConfig::default()));
    demo::seed_models(&models, &building, 100.0).unwrap();
    let engine = ForecastEngine::new(models, EngineConfig::default());
    let optimizer = OptimizationEngine::default();
    let tariff = TariffSchedule::reference();

    let mut group = c.benchmark_group("forecast_pipeline");
    for horizon in Horizon::ALL {
        group.bench_with_input(BenchmarkId::new("predict", horizon), &horizon, |b, h| {
            b.iter(|| {
                engine
                    .predict(black_box(&history), *h, ForecastType::EnergyDemand)
                    .unwrap()
            })
        });

        let forecast = engine.predict(&history, horizon, ForecastType::EnergyDemand).unwrap();
        group.bench_with_input(BenchmarkId::new("recommend", horizon), &forecast, |b, f| {
            b.iter(|| optimizer.recommend(black_box(f), &tariff).unwrap())
        });
    }
    group.finish();
}

criterion_group!(benches, bench_predict_and_recommend);
criterion_main!(benches);
