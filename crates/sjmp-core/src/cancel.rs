//! Cooperative cancellation for host worker threads.
//!
//! Host objects that run their own loops (timers, pollers) check a shared
//! `CancellationToken` on every step instead of being aborted from outside.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Granularity of [`CancellationToken::sleep`].
const SLEEP_STEP: Duration = Duration::from_millis(20);

/// A cancellation token shared between a worker and its owner.
///
/// Clones share state: cancelling any clone cancels all of them.
///
/// # Example
///
/// ```
/// use sjmp_core::cancel::CancellationToken;
/// use std::time::Duration;
///
/// let token = CancellationToken::new();
/// let worker_token = token.clone();
/// let worker = std::thread::spawn(move || {
///     let mut ticks = 0u32;
///     while worker_token.sleep(Duration::from_millis(5)).is_ok() {
///         ticks += 1;
///     }
///     ticks
/// });
///
/// token.cancel();
/// worker.join().unwrap();
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Return an error if cancellation has been requested.
    pub fn check(&self) -> Result<(), CancelledError> {
        if self.is_cancelled() {
            Err(CancelledError)
        } else {
            Ok(())
        }
    }

    /// Block the current thread for `duration`, waking early on cancellation.
    pub fn sleep(&self, duration: Duration) -> Result<(), CancelledError> {
        let deadline = Instant::now() + duration;
        loop {
            self.check()?;
            let now = Instant::now();
            if now >= deadline {
                return Ok(());
            }
            thread::sleep(SLEEP_STEP.min(deadline - now));
        }
    }
}

/// Returned when a worker observes cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CancelledError;

impl std::fmt::Display for CancelledError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Operation was cancelled")
    }
}

impl std::error::Error for CancelledError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clone_shares_state() {
        let token1 = CancellationToken::new();
        let token2 = token1.clone();
        assert!(token2.check().is_ok());

        token1.cancel();

        assert!(token1.is_cancelled());
        assert_eq!(token2.check(), Err(CancelledError));
    }

    #[test]
    fn test_sleep_completes() {
        let token = CancellationToken::new();
        let start = Instant::now();
        assert!(token.sleep(Duration::from_millis(30)).is_ok());
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn test_sleep_wakes_on_cancel() {
        let token = CancellationToken::new();
        let canceller = token.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            canceller.cancel();
        });

        let start = Instant::now();
        assert_eq!(token.sleep(Duration::from_secs(30)), Err(CancelledError));
        assert!(start.elapsed() < Duration::from_secs(5));
        handle.join().unwrap();
    }
}
