//! Bounded retry on transient sharing conflicts

use std::io;
use std::thread;
use std::time::Duration;
use tracing::debug;

/// Default total number of attempts
pub const DEFAULT_ATTEMPTS: u32 = 5;

/// Default pause between attempts
pub const DEFAULT_DELAY: Duration = Duration::from_millis(1);

/// Fixed-delay retry for operations that can fail while another process
/// finishes its own atomic operation.
///
/// With `attempts = n`, the operation is tried up to `n - 1` times with
/// transient failures swallowed, then once more unguarded so a persistent
/// error reaches the caller. Non-transient failures propagate immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    attempts: u32,
    delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_ATTEMPTS,
            delay: DEFAULT_DELAY,
        }
    }
}

impl RetryPolicy {
    pub const fn new(attempts: u32, delay: Duration) -> Self {
        Self { attempts, delay }
    }

    /// A policy that makes exactly one call.
    pub const fn none() -> Self {
        Self {
            attempts: 1,
            delay: Duration::ZERO,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Run `op`, retrying while `is_transient` accepts its error.
    ///
    /// A classifier that accepts nothing makes this a plain call.
    pub fn run<T, C, F>(&self, is_transient: C, mut op: F) -> io::Result<T>
    where
        C: Fn(&io::Error) -> bool,
        F: FnMut() -> io::Result<T>,
    {
        for attempt in 1..self.attempts {
            match op() {
                Ok(value) => return Ok(value),
                Err(e) if is_transient(&e) => {
                    debug!(attempt, error = %e, "transient sharing conflict, retrying");
                    thread::sleep(self.delay);
                }
                Err(e) => return Err(e),
            }
        }
        // final unguarded attempt
        op()
    }
}
