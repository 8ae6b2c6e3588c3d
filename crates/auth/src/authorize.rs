use std::collections::HashMap;

use thiserror::Error;

use wattcast_core::{BuildingId, DomainError};

use crate::{Permission, Principal};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("unknown principal '{0}'")]
    UnknownPrincipal(String),

    #[error("principal '{principal}' may not act on building '{building}'")]
    BuildingNotAllowed { principal: String, building: String },

    #[error("forbidden: missing permission '{0}'")]
    Forbidden(String),
}

impl From<AuthzError> for DomainError {
    fn from(value: AuthzError) -> Self {
        DomainError::not_authorized(value.to_string())
    }
}

/// Authorize a principal for `required` on `building`.
///
/// - No IO
/// - No panics
/// - No business logic (pure policy check)
pub fn authorize(principal: &Principal, building: &BuildingId, required: &Permission) -> Result<(), AuthzError> {
    if !principal.buildings.allows(building) {
        return Err(AuthzError::BuildingNotAllowed {
            principal: principal.name.clone(),
            building: building.to_string(),
        });
    }
    if principal.has_permission(required) {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(required.as_str().to_string()))
    }
}

/// Injected authorization capability consulted before any engine work.
pub trait Authorizer: Send + Sync {
    fn check(&self, requested_by: &str, building: &BuildingId, required: &Permission) -> Result<(), AuthzError>;
}

impl<A: Authorizer + ?Sized> Authorizer for std::sync::Arc<A> {
    fn check(&self, requested_by: &str, building: &BuildingId, required: &Permission) -> Result<(), AuthzError> {
        (**self).check(requested_by, building, required)
    }
}

/// Grants everything; used when the deployment has no access policy configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl Authorizer for AllowAll {
    fn check(&self, _requested_by: &str, _building: &BuildingId, _required: &Permission) -> Result<(), AuthzError> {
        Ok(())
    }
}

/// Fixed principal table, typically loaded from configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticPolicy {
    principals: HashMap<String, Principal>,
}

impl StaticPolicy {
    pub fn new(principals: impl IntoIterator<Item = Principal>) -> Self {
        Self {
            principals: principals.into_iter().map(|p| (p.name.clone(), p)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.principals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.principals.is_empty()
    }
}

impl Authorizer for StaticPolicy {
    fn check(&self, requested_by: &str, building: &BuildingId, required: &Permission) -> Result<(), AuthzError> {
        let principal = self
            .principals
            .get(requested_by)
            .ok_or_else(|| AuthzError::UnknownPrincipal(requested_by.to_string()))?;
        let decision = authorize(principal, building, required);
        if let Err(err) = &decision {
            tracing::warn!(principal = requested_by, building_id = %building, error = %err, "authorization denied");
        }
        decision
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::BuildingScope;

    fn b(id: &str) -> BuildingId {
        BuildingId::parse(id).unwrap()
    }

    fn policy() -> StaticPolicy {
        StaticPolicy::new([
            Principal::new("admin", BuildingScope::All, vec![Permission::WILDCARD]),
            Principal::new(
                "facility-b001",
                BuildingScope::Only(BTreeSet::from([b("B001")])),
                vec![Permission::FORECAST_REQUEST, Permission::FORECAST_READ],
            ),
        ])
    }

    #[test]
    fn wildcard_principal_may_do_anything() {
        let p = policy();
        assert!(p.check("admin", &b("B042"), &Permission::MODELS_MANAGE).is_ok());
    }

    #[test]
    fn scoped_principal_is_limited_to_its_buildings() {
        let p = policy();
        assert!(p.check("facility-b001", &b("B001"), &Permission::FORECAST_REQUEST).is_ok());
        assert!(matches!(
            p.check("facility-b001", &b("B002"), &Permission::FORECAST_REQUEST),
            Err(AuthzError::BuildingNotAllowed { .. })
        ));
    }

    #[test]
    fn missing_permission_is_forbidden() {
        let p = policy();
        assert_eq!(
            p.check("facility-b001", &b("B001"), &Permission::OPTIMIZATION_REQUEST),
            Err(AuthzError::Forbidden("optimization.request".into()))
        );
    }

    #[test]
    fn unknown_principal_maps_to_not_authorized() {
        let err: DomainError = policy()
            .check("mallory", &b("B001"), &Permission::FORECAST_READ)
            .unwrap_err()
            .into();
        assert!(matches!(err, DomainError::NotAuthorized(_)));
    }

    #[test]
    fn allow_all_grants_everything() {
        assert!(AllowAll.check("anyone", &b("B001"), &Permission::MODELS_MANAGE).is_ok());
    }
}
