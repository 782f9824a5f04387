//! Recording bus implementation for testing.

use parking_lot::Mutex;

use crate::bus::{GraphBus, Injection};

/// A bus that captures every emitted injection for inspection.
#[derive(Debug, Default)]
pub struct RecordingBus {
    injections: Mutex<Vec<Injection>>,
}

impl RecordingBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// All injections emitted so far, in order.
    pub fn injections(&self) -> Vec<Injection> {
        self.injections.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.injections.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.injections.lock().is_empty()
    }
}

impl GraphBus for RecordingBus {
    fn emit(&self, injection: Injection) {
        self.injections.lock().push(injection);
    }
}
