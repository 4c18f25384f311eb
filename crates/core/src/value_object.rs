//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects are immutable and compared by their attribute values
/// (`Currency`, `TaxRate`, `Money`, file references, line items).
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
