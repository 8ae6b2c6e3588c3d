//! `wattcast-auth`: building-scoped authorization boundary.
//!
//! This crate is intentionally decoupled from HTTP and storage. Authentication
//! happens upstream; the service only receives the `requested_by` principal
//! name and asks an [`Authorizer`] whether it may act on a building.

pub mod authorize;
pub mod permissions;
pub mod principal;

pub use authorize::{AllowAll, AuthzError, Authorizer, StaticPolicy, authorize};
pub use permissions::Permission;
pub use principal::{BuildingScope, Principal};
