//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Tariff bands, predicted points and time windows are value objects: they
/// carry no identity and two instances with equal attributes are the same
/// value. Entities such as [`crate::ModelMetadata`] or
/// [`crate::ForecastResult`] are identified by their ids instead.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
