use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use wattcast_core::BuildingId;

use crate::Permission;

/// Buildings a principal may act on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildingScope {
    All,
    Only(BTreeSet<BuildingId>),
}

impl BuildingScope {
    pub fn allows(&self, building: &BuildingId) -> bool {
        match self {
            BuildingScope::All => true,
            BuildingScope::Only(set) => set.contains(building),
        }
    }
}

/// A resolved principal as seen by the authorization policy.
///
/// Principals are identified by the `requested_by` name carried on requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub name: String,
    pub buildings: BuildingScope,
    pub permissions: Vec<Permission>,
}

impl Principal {
    pub fn new(name: impl Into<String>, buildings: BuildingScope, permissions: Vec<Permission>) -> Self {
        Self {
            name: name.into(),
            buildings,
            permissions,
        }
    }

    pub fn has_permission(&self, required: &Permission) -> bool {
        self.permissions
            .iter()
            .any(|p| p.is_wildcard() || p == required)
    }
}
