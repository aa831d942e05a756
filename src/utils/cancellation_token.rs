use std::{
    sync::{Condvar, Mutex},
    time::Duration,
};

/// A cancellation token shared between a sampler thread and its owner.
///
/// The flag under the mutex is the cancellation state; the condvar wakes any
/// thread parked in [`CancellationToken::sleep_with_cancellation`].
pub(crate) struct CancellationToken {
    mutex: Mutex<bool>,
    cvar: Condvar,
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self {
            mutex: Mutex::new(false),
            cvar: Condvar::new(),
        }
    }
}

impl CancellationToken {
    /// Mark the token as cancelled and wake any sleeping thread.
    ///
    /// Idempotent; once cancelled the token stays cancelled.
    pub fn cancel(&self) {
        let mut guard = self
            .mutex
            .lock()
            .expect("cancellation token lock should not be poisoned");

        if !*guard {
            *guard = true;
            self.cvar.notify_all();
        }
    }

    /// Sleep for up to `duration`, returning early if the token is cancelled.
    ///
    /// Returns the cancellation state after sleeping or being woken up.
    pub fn sleep_with_cancellation(&self, duration: Duration) -> bool {
        let guard = self
            .mutex
            .lock()
            .expect("cancellation token lock should not be poisoned");

        let (result, _) = self
            .cvar
            .wait_timeout(guard, duration)
            .expect("cancellation token lock should not be poisoned");

        *result
    }
}
