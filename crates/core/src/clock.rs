// SPDX-License-Identifier: MIT

//! Clock abstraction for testable time handling.
//!
//! Runners and the Supervisor's backoff loop never call `Instant::now()`
//! directly; they hold a `C: Clock` so tests can advance time deterministically
//! instead of sleeping in wall-clock time.

use std::time::Instant;

/// A clock that provides the current time.
pub trait Clock: Clone + Send + Sync + 'static {
    fn now(&self) -> Instant;
}

/// Real system clock.
#[derive(Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

#[cfg(any(test, feature = "test-support"))]
mod fake {
    use super::Clock;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    /// Fake clock for testing with controllable time.
    #[derive(Clone)]
    pub struct FakeClock {
        current: Arc<Mutex<Instant>>,
    }

    impl FakeClock {
        pub fn new() -> Self {
            Self { current: Arc::new(Mutex::new(Instant::now())) }
        }

        /// Advance the clock by the given duration.
        pub fn advance(&self, duration: Duration) {
            *self.current.lock() += duration;
        }
    }

    impl Default for FakeClock {
        fn default() -> Self {
            Self::new()
        }
    }

    impl Clock for FakeClock {
        fn now(&self) -> Instant {
            *self.current.lock()
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeClock;
