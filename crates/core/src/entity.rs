//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// Emission entries, projects and credit lots are entities: two records with
/// equal field values but different ids are still different records.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}
