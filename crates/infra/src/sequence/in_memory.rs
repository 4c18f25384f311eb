use std::collections::HashMap;
use std::sync::Mutex;

use super::{CounterStore, SequenceError};

/// Process-local counters behind a single mutex.
#[derive(Debug, Default)]
pub struct InMemoryCounterStore {
    counters: Mutex<HashMap<String, u64>>,
}

impl InMemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of a series (0 if never incremented).
    pub fn current(&self, series: &str) -> u64 {
        self.counters
            .lock()
            .map(|c| c.get(series).copied().unwrap_or(0))
            .unwrap_or(0)
    }
}

impl CounterStore for InMemoryCounterStore {
    fn increment(&self, series: &str) -> Result<u64, SequenceError> {
        let mut counters = self
            .counters
            .lock()
            .map_err(|_| SequenceError::Unavailable("counter lock poisoned".to_string()))?;

        let slot = counters.entry(series.to_string()).or_insert(0);
        *slot = slot
            .checked_add(1)
            .ok_or_else(|| SequenceError::Overflow(series.to_string()))?;
        Ok(*slot)
    }
}
