//! Helper functions that need OS/platform specific implementations

use alloc::sync::Arc;
use std::time::{Duration, Instant};
use std::{thread, time};

/// Time source used while polling the EC
///
/// Injected into the mailbox so polling and timeouts can be driven without
/// real delays.
pub trait Clock: Send + Sync {
    /// Monotonic time elapsed since an arbitrary, fixed origin
    fn now(&self) -> Duration;

    /// Sleep a number of microseconds
    fn sleep(&self, micros: u64);
}

impl<T: Clock + ?Sized> Clock for Arc<T> {
    fn now(&self) -> Duration {
        (**self).now()
    }

    fn sleep(&self, micros: u64) {
        (**self).sleep(micros)
    }
}

/// Clock backed by the operating system
#[derive(Debug, Clone, Copy)]
pub struct OsClock {
    origin: Instant,
}

impl OsClock {
    pub fn new() -> Self {
        OsClock {
            origin: Instant::now(),
        }
    }
}

impl Default for OsClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for OsClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn sleep(&self, micros: u64) {
        let duration = time::Duration::from_micros(micros);
        thread::sleep(duration);
    }
}
