//! Entity trait: identity + continuity across state changes.
//!
//! Child entities (documents inside a shipment, receipts inside an invoice) are
//! owned by their aggregate and only reachable through it.

/// Entity marker + minimal interface.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}
