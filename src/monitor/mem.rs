//! Memory usage monitoring backed by the leading lines of `/proc/meminfo`.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crate::log_error;
use crate::monitor::error::{MonitorError, Result};
use crate::monitor::{Monitor, SamplerTask, UsageCell, MAX_USAGE, MIN_INTERVAL};
use crate::utils::cancellation_token::CancellationToken;
use crate::utils::logging::SharedLogger;

const MEM_STATS_FILE: &str = "/proc/meminfo";

/// One instantaneous snapshot of the memory counters, in kB.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct MemStats {
    total: u64,
    available: u64,
}

impl MemStats {
    /// Usage percentage for this snapshot, clamped to `[0, 100]`.
    /// Integer-truncated; a zero total is substituted with 1 to avoid
    /// dividing by zero.
    fn usage(&self) -> u8 {
        let total = if self.total == 0 { 1 } else { self.total };

        let usage = 100u64.saturating_sub(self.available * 100 / total);
        usage.min(u64::from(MAX_USAGE)) as u8
    }
}

/// Parses the first three lines of a memory counters source, which must be a
/// `MemTotal` line, one ignored line, and a `MemAvailable` line:
///
/// ```text
/// MemTotal:       16000000 kB
/// MemFree:          800000 kB
/// MemAvailable:    8000000 kB
/// ```
fn load_mem_stats(reader: impl BufRead) -> Result<MemStats> {
    let mut lines = reader.lines();
    let mut next_line = || -> Result<String> {
        match lines.next() {
            Some(line) => Ok(line?),
            None => Err(MonitorError::InvalidMemStats),
        }
    };

    let total_line = next_line()?;
    let _skipped = next_line()?;
    let available_line = next_line()?;

    Ok(MemStats {
        total: parse_kb_line(&total_line, "MemTotal")?,
        available: parse_kb_line(&available_line, "MemAvailable")?,
    })
}

/// Extracts the kB value from a `<prefix>: <value> kB` line.
fn parse_kb_line(line: &str, prefix: &str) -> Result<u64> {
    if !line.starts_with(prefix) {
        return Err(MonitorError::InvalidMemStats);
    }

    let mut fields = line.split_whitespace();
    let value = fields.nth(1).ok_or(MonitorError::InvalidMemStats)?;
    if fields.next().is_none() {
        // The unit field is required; its absence means the value slot held
        // the unit instead.
        return Err(MonitorError::InvalidMemStats);
    }

    value.parse().map_err(|_| MonitorError::InvalidMemStats)
}

fn read_mem_stats(path: &str) -> Result<MemStats> {
    load_mem_stats(BufReader::new(File::open(path)?))
}

/// Monitors host memory usage by sampling instantaneous counters on an
/// interval. Unlike the CPU monitor, each cycle is stateless, so no warm-up
/// baseline is needed.
pub struct MemMonitor {
    usage: UsageCell,
    interval: Duration,
    logger: SharedLogger,
    task: Mutex<Option<SamplerTask>>,
}

impl MemMonitor {
    /// Creates a stopped monitor. Intervals below [`MIN_INTERVAL`] are raised
    /// to the floor.
    pub fn new(interval: Duration, logger: SharedLogger) -> Self {
        Self {
            usage: UsageCell::default(),
            interval: interval.max(MIN_INTERVAL),
            logger,
            task: Mutex::new(None),
        }
    }
}

impl Monitor for MemMonitor {
    fn start(&self) {
        let mut task = self
            .task
            .lock()
            .expect("sampler slot lock should not be poisoned");
        if task.is_some() {
            return;
        }

        let token = Arc::new(CancellationToken::default());
        let handle = {
            let token = token.clone();
            let usage = self.usage.clone();
            let interval = self.interval;
            let logger = self.logger.clone();

            thread::spawn(move || sample_loop(MEM_STATS_FILE, &token, &usage, interval, &logger))
        };

        *task = Some(SamplerTask::new(token, handle));
    }

    fn stop(&self) {
        let mut task = self
            .task
            .lock()
            .expect("sampler slot lock should not be poisoned");
        if let Some(task) = task.take() {
            task.shut_down();
            self.usage.store(0);
        }
    }

    fn usage(&self) -> u8 {
        self.usage.load()
    }
}

/// The sampler loop. Same self-stop contract as the CPU sampler: on failure
/// it logs, publishes 0, cancels its own token, and returns without joining.
fn sample_loop(
    path: &str, token: &CancellationToken, usage: &UsageCell, interval: Duration,
    logger: &SharedLogger,
) {
    loop {
        let stats = match read_mem_stats(path) {
            Ok(stats) => stats,
            Err(err) => {
                log_error!(logger, "failed to read memory stats from {path}: {err}");
                usage.store(0);
                token.cancel();
                return;
            }
        };

        usage.store(stats.usage());

        if token.sleep_with_cancellation(interval) {
            return;
        }
    }
}
