use chrono::{DateTime, Utc};

/// A domain event.
///
/// Events are immutable facts, versioned for schema evolution and only ever
/// appended.
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Stable event type identifier (e.g. "billing.invoice.issued").
    fn event_type(&self) -> &'static str;

    /// Schema version for this event type.
    fn version(&self) -> u32;

    /// When the event occurred (business time).
    fn occurred_at(&self) -> DateTime<Utc>;
}
