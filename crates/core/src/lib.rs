//! Domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! identifiers, the error taxonomy, aggregate traits and money value objects.

pub mod aggregate;
pub mod entity;
pub mod error;
pub mod id;
pub mod money;
pub mod value_object;

pub use aggregate::{Aggregate, AggregateRoot, ExpectedVersion};
pub use entity::Entity;
pub use error::{DomainError, DomainResult, ErrorKind};
pub use id::{AggregateId, ClientId, ConsigneeId, UserId};
pub use money::{Currency, Money, TaxRate};
pub use value_object::ValueObject;
