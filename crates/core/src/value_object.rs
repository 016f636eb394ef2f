//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects carry no identity and are immutable once built. In this
/// workspace that covers benchmark rows, company profiles and assessment
/// results: two `ComplianceResult`s with the same numbers are the same result.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
