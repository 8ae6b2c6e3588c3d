//! Service wiring: in-memory store, model registry and the forecast service.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use wattcast_core::DomainResult;
use wattcast_infra::{ForecastService, InMemoryEnergyStore, ServiceConfig, demo, open_registry};

/// Everything the HTTP handlers need.
#[derive(Debug)]
pub struct AppServices {
    pub forecasts: ForecastService<InMemoryEnergyStore>,
}

impl AppServices {
    pub fn store(&self) -> &Arc<InMemoryEnergyStore> {
        self.forecasts.store()
    }

    /// Persist registry changes; call once before the process exits.
    pub fn shutdown(&self) -> DomainResult<()> {
        self.forecasts.models().shutdown()
    }
}

pub fn build_services(config: ServiceConfig) -> DomainResult<AppServices> {
    config.validate()?;
    let models = Arc::new(open_registry(config.registry_path.as_deref(), config.registry)?);
    let store = Arc::new(InMemoryEnergyStore::new());

    if config.seed_demo_data {
        demo::seed(&store, &models, Utc::now(), config.history_days)?;
        info!(buildings = demo::DEMO_BUILDINGS.len(), "demo data loaded");
    }

    let forecasts = ForecastService::new(store, models, config)?;
    Ok(AppServices { forecasts })
}
