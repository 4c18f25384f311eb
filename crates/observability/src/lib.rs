//! Shared tracing setup for the clearway binaries and tests.

/// Initialize process-wide structured logging with the default filter (`info`).
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init(tracing::LogFormat::from_env(), "info");
}

/// Subscriber construction (filters, output format).
pub mod tracing;
