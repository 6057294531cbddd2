use chrono::{Duration, Utc};
use parking_lot::RwLock;
use tiller_core::Timestamp;

use crate::Clock;

/// Fixed clock that only advances when explicitly moved
pub struct ManualClock {
    current: RwLock<Timestamp>,
}

impl ManualClock {
    /// Start at `initial`, or the current wall time if `None`
    pub fn new(initial: Option<Timestamp>) -> Self {
        Self {
            current: RwLock::new(initial.unwrap_or_else(Utc::now)),
        }
    }

    /// Jump forward by `by`
    pub fn advance(&self, by: Duration) {
        let mut current = self.current.write();
        *current += by;
    }

    /// Set an absolute time
    pub fn set(&self, at: Timestamp) {
        *self.current.write() = at;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(None)
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        *self.current.read()
    }

    fn name(&self) -> &str {
        "ManualClock"
    }
}
