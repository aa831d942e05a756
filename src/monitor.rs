//! Background usage monitors.
//!
//! Each monitor owns one sampler thread that periodically reads a
//! kernel-exposed counters file, derives a usage percentage, and publishes it
//! to a shared register. The serving layer only ever performs non-blocking
//! reads of that register.

pub mod cpu;
pub mod error;
pub mod mem;
pub mod mock;

use std::sync::{Arc, RwLock};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::utils::cancellation_token::CancellationToken;

/// Upper bound of every published usage percentage.
pub const MAX_USAGE: u8 = 100;

/// Floor applied to sampling intervals at construction time.
pub const MIN_INTERVAL: Duration = Duration::from_secs(1);

/// A source of usage percentages.
///
/// `start` and `stop` are idempotent: starting a running monitor and stopping
/// a stopped one are no-ops. `stop` blocks until the sampler thread has fully
/// exited and resets the published usage to 0.
pub trait Monitor: Send + Sync {
    /// Begins background sampling.
    fn start(&self);

    /// Cancels background sampling and waits for the sampler to exit.
    fn stop(&self);

    /// Returns the last published usage percentage, in `[0, 100]`.
    ///
    /// 0 before the first successful sample and after `stop`.
    fn usage(&self) -> u8;
}

/// The usage register shared between one sampler thread (sole writer) and any
/// number of concurrent readers.
#[derive(Clone, Debug, Default)]
pub(crate) struct UsageCell(Arc<RwLock<u8>>);

impl UsageCell {
    pub(crate) fn store(&self, usage: u8) {
        *self
            .0
            .write()
            .expect("usage register lock should not be poisoned") = usage;
    }

    pub(crate) fn load(&self) -> u8 {
        *self
            .0
            .read()
            .expect("usage register lock should not be poisoned")
    }
}

/// Handle to a running sampler thread. Held under the monitor's lifecycle
/// lock; `None` there means the monitor is stopped.
pub(crate) struct SamplerTask {
    token: Arc<CancellationToken>,
    handle: JoinHandle<()>,
}

impl SamplerTask {
    pub(crate) fn new(token: Arc<CancellationToken>, handle: JoinHandle<()>) -> Self {
        Self { token, handle }
    }

    /// Cancels the sampler and blocks until its thread has exited.
    pub(crate) fn shut_down(self) {
        self.token.cancel();
        let _ = self.handle.join();
    }
}
