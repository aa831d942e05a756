//! A usage source for exercising the serving layer without touching `/proc`.

use rand::Rng;

use crate::monitor::{Monitor, MAX_USAGE};

/// A [`Monitor`] that performs no I/O and owns no background task: `start`
/// and `stop` are no-ops, and every `usage` call returns a fresh uniformly
/// distributed value.
#[derive(Debug, Clone, Copy, Default)]
pub struct MockMonitor;

impl Monitor for MockMonitor {
    fn start(&self) {}

    fn stop(&self) {}

    fn usage(&self) -> u8 {
        rand::thread_rng().gen_range(0..=MAX_USAGE)
    }
}
