use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Permission identifier.
///
/// Permissions are modeled as opaque strings (e.g. "forecast.request").
/// A special wildcard permission `"*"` grants every permission.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub const WILDCARD: Permission = Permission(Cow::Borrowed("*"));
    pub const FORECAST_READ: Permission = Permission(Cow::Borrowed("forecast.read"));
    pub const FORECAST_REQUEST: Permission = Permission(Cow::Borrowed("forecast.request"));
    pub const OPTIMIZATION_REQUEST: Permission = Permission(Cow::Borrowed("optimization.request"));
    pub const MODELS_READ: Permission = Permission(Cow::Borrowed("models.read"));
    pub const MODELS_MANAGE: Permission = Permission(Cow::Borrowed("models.manage"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_wildcard(&self) -> bool {
        self.as_str() == "*"
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}
