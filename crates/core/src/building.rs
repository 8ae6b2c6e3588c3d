//! Building metadata served by the storage collaborator.

use serde::{Deserialize, Serialize};

use crate::id::BuildingId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Building {
    pub id: BuildingId,
    pub name: String,
    /// IANA zone name; tariff hours are evaluated in UTC.
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default)]
    pub capacity_kw: Option<f64>,
}

fn default_timezone() -> String {
    "UTC".to_string()
}

impl Building {
    pub fn new(id: BuildingId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            timezone: default_timezone(),
            capacity_kw: None,
        }
    }
}
