//! Cooperative shutdown.

use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;

/// A cloneable cancellation token.
///
/// Any clone may request shutdown; every clone observes it. Sleeping
/// through [`ShutdownSignal::wait_timeout`] is cut short by a request.
#[derive(Clone, Default)]
pub struct ShutdownSignal {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request shutdown and wake every sleeper.
    pub fn request(&self) {
        let (lock, cvar) = &*self.inner;
        let mut requested = lock.lock().unwrap_or_else(PoisonError::into_inner);
        *requested = true;
        cvar.notify_all();
    }

    pub fn is_requested(&self) -> bool {
        let (lock, _) = &*self.inner;
        *lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sleep for up to `timeout`.
    ///
    /// Returns `true` if shutdown has been requested.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let (lock, cvar) = &*self.inner;
        let guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        let (guard, _) = cvar
            .wait_timeout_while(guard, timeout, |requested| !*requested)
            .unwrap_or_else(PoisonError::into_inner);
        *guard
    }
}

impl std::fmt::Debug for ShutdownSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShutdownSignal")
            .field("requested", &self.is_requested())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_request_is_shared() {
        let signal = ShutdownSignal::new();
        let clone = signal.clone();
        assert!(!signal.is_requested());

        clone.request();

        assert!(signal.is_requested());
        assert!(signal.wait_timeout(Duration::from_secs(10)));
    }

    #[test]
    fn test_wait_times_out() {
        let signal = ShutdownSignal::new();
        assert!(!signal.wait_timeout(Duration::from_millis(5)));
    }

    #[test]
    fn test_request_interrupts_sleep() {
        let signal = ShutdownSignal::new();
        let clone = signal.clone();
        let start = Instant::now();

        let waker = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            clone.request();
        });

        assert!(signal.wait_timeout(Duration::from_secs(30)));
        assert!(start.elapsed() < Duration::from_secs(30));
        waker.join().unwrap();
    }
}
