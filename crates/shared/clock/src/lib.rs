//! Tiller Clock
//!
//! Time source abstraction so order timestamps and reconciliation recency
//! can be driven deterministically in tests:
//!
//! - [`SystemClock`]: wall-clock time for live and paper sessions
//! - [`ManualClock`]: frozen time that only moves when told to

mod manual;
mod system;

pub use manual::ManualClock;
pub use system::SystemClock;

use tiller_core::Timestamp;

/// Port for time abstraction
pub trait Clock: Send + Sync {
    /// Get the current time according to this clock
    fn now(&self) -> Timestamp;

    /// Get the clock's name/identifier for debugging
    fn name(&self) -> &str {
        "Clock"
    }
}
