//! CPU usage monitoring backed by the aggregate line of `/proc/stat`.

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

const CPU_STATS_FILE: &str = "/proc/stat";

/// Minimum number of whitespace-separated fields on the aggregate line,
/// including the leading `cpu` tag.
const MIN_STAT_FIELDS: usize = 11;

/// 0-based position of the idle tick count among the numeric fields
/// (user, nice, system, idle, ...).
const IDLE_FIELD: usize = 3;

/// One snapshot of the aggregate CPU tick counters, cumulative since boot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CpuStats {
    total: u64,
    idle: u64,
}

impl CpuStats {
    /// Usage percentage over the window from `prev` to `self`, clamped to
    /// `[0, 100]`. Integer-truncated; a zero total delta is substituted with
    /// 1 to avoid dividing by zero.
    fn usage_since(&self, prev: &CpuStats) -> u8 {
        let mut total_diff = self.total.saturating_sub(prev.total);
        let idle_diff = self.idle.saturating_sub(prev.idle);

        if total_diff == 0 {
            total_diff = 1;
        }

        let usage = 100u64.saturating_sub(idle_diff * 100 / total_diff);
        usage.min(u64::from(MAX_USAGE)) as u8
    }
}

/// Parses the first line of a CPU counters source.
///
/// The line must begin with the `cpu` tag and carry at least ten numeric
/// fields; total is the sum of all fields, idle the fourth of them.
///
/// ```text
/// cpu  4287477 2 657908 43117172 1758 128015 49404 0 0 0
/// ```
fn load_cpu_stats(reader: impl BufRead) -> Result<CpuStats> {
    let line = match reader.lines().next() {
        Some(line) => line?,
        None => return Err(MonitorError::InvalidCpuStats),
    };

    if !line.starts_with("cpu") {
        return Err(MonitorError::InvalidCpuStats);
    }

    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < MIN_STAT_FIELDS {
        return Err(MonitorError::InvalidCpuStats);
    }

    let mut total = 0u64;
    let mut idle = 0u64;
    for (i, field) in fields[1..].iter().enumerate() {
        let value: u64 = field.parse().map_err(|_| MonitorError::InvalidCpuStats)?;

        if i == IDLE_FIELD {
            idle = value;
        }
        total += value;
    }

    Ok(CpuStats { total, idle })
}

fn read_cpu_stats(path: &str) -> Result<CpuStats> {
    load_cpu_stats(BufReader::new(File::open(path)?))
}

/// Monitors host CPU usage by sampling cumulative tick counters on an
/// interval and publishing the delta-derived percentage.
pub struct CpuMonitor {
    usage: UsageCell,
    interval: Duration,
    logger: SharedLogger,
    task: Mutex<Option<SamplerTask>>,
}

impl CpuMonitor {
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

impl Monitor for CpuMonitor {
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

            thread::spawn(move || sample_loop(CPU_STATS_FILE, &token, &usage, interval, &logger))
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

/// The sampler loop. On any read or parse failure it logs, publishes 0, and
/// cancels its own token before returning; it must never join itself, so a
/// concurrent `stop` cannot deadlock.
fn sample_loop(
    path: &str, token: &CancellationToken, usage: &UsageCell, interval: Duration,
    logger: &SharedLogger,
) {
    // Baseline snapshot so the first published value covers a real window
    // instead of everything since boot.
    let mut prev = match read_cpu_stats(path) {
        Ok(stats) => stats,
        Err(err) => {
            log_error!(logger, "failed to read CPU stats from {path}: {err}");
            usage.store(0);
            token.cancel();
            return;
        }
    };

    if token.sleep_with_cancellation(interval) {
        return;
    }

    loop {
        let current = match read_cpu_stats(path) {
            Ok(stats) => stats,
            Err(err) => {
                log_error!(logger, "failed to read CPU stats from {path}: {err}");
                usage.store(0);
                token.cancel();
                return;
            }
        };

        usage.store(current.usage_since(&prev));
        prev = current;

        if token.sleep_with_cancellation(interval) {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::logging::test::VecLogger;

    const VALID_LINE: &str = "cpu  4287477 2 657908 43117172 1758 128015 49404 0 0 0\n";

    #[test]
    fn parses_the_aggregate_stat_line() {
        let stats = load_cpu_stats(VALID_LINE.as_bytes()).unwrap();

        assert_eq!(
            stats.total,
            4287477 + 2 + 657908 + 43117172 + 1758 + 128015 + 49404
        );
        assert_eq!(stats.idle, 43117172);
    }

    #[test]
    fn accepts_extra_trailing_fields() {
        let stats = load_cpu_stats("cpu 1 2 3 4 5 6 7 8 9 10 11 12\n".as_bytes()).unwrap();

        assert_eq!(stats.idle, 4);
        assert_eq!(stats.total, (1u64..=12).sum::<u64>());
    }

    #[test]
    fn rejects_an_empty_source() {
        assert!(matches!(
            load_cpu_stats("".as_bytes()),
            Err(MonitorError::InvalidCpuStats)
        ));
    }

    #[test]
    fn rejects_a_wrong_tag() {
        assert!(matches!(
            load_cpu_stats("gpu 1 2 3 4 5 6 7 8 9 10\n".as_bytes()),
            Err(MonitorError::InvalidCpuStats)
        ));
    }

    #[test]
    fn rejects_too_few_fields() {
        assert!(matches!(
            load_cpu_stats("cpu 1 2 3 4\n".as_bytes()),
            Err(MonitorError::InvalidCpuStats)
        ));
    }

    #[test]
    fn rejects_a_non_numeric_field() {
        assert!(matches!(
            load_cpu_stats("cpu 1 2 3 four 5 6 7 8 9 10\n".as_bytes()),
            Err(MonitorError::InvalidCpuStats)
        ));
    }

    #[test]
    fn usage_is_derived_from_counter_deltas() {
        let prev = CpuStats {
            total: 1000,
            idle: 400,
        };
        let current = CpuStats {
            total: 2000,
            idle: 800,
        };

        assert_eq!(current.usage_since(&prev), 60);
    }

    #[test]
    fn identical_snapshots_substitute_a_unit_divisor() {
        let stats = CpuStats {
            total: 1000,
            idle: 400,
        };

        assert_eq!(stats.usage_since(&stats), 100);
    }

    #[test]
    fn fully_idle_window_clamps_to_zero() {
        let prev = CpuStats {
            total: 1000,
            idle: 400,
        };
        let current = CpuStats {
            total: 2000,
            idle: 1400,
        };

        assert_eq!(current.usage_since(&prev), 0);
    }

    #[test]
    fn pathological_idle_delta_stays_in_range() {
        let prev = CpuStats {
            total: 1000,
            idle: 400,
        };
        let current = CpuStats {
            total: 1001,
            idle: 5000,
        };

        assert!(current.usage_since(&prev) <= MAX_USAGE);
    }

    #[test]
    fn usage_is_zero_before_the_first_sample() {
        let (_, logger) = VecLogger::shared();
        let monitor = CpuMonitor::new(Duration::from_secs(60), logger);

        monitor.start();
        assert_eq!(monitor.usage(), 0);
        monitor.stop();
    }

    #[test]
    fn interval_floor_is_applied_at_construction() {
        let (_, logger) = VecLogger::shared();
        let monitor = CpuMonitor::new(Duration::from_millis(10), logger);

        assert_eq!(monitor.interval, MIN_INTERVAL);
    }

    #[test]
    fn start_and_stop_are_idempotent() {
        let (_, logger) = VecLogger::shared();
        let monitor = CpuMonitor {
            usage: UsageCell::default(),
            interval: Duration::from_millis(50),
            logger,
            task: Mutex::new(None),
        };

        monitor.start();
        monitor.start();

        thread::sleep(Duration::from_millis(200));
        assert!(monitor.usage() <= MAX_USAGE);

        monitor.stop();
        assert_eq!(monitor.usage(), 0);

        monitor.stop();
        assert_eq!(monitor.usage(), 0);
    }

    #[test]
    fn broken_counters_source_logs_and_self_stops() {
        let (sink, logger) = VecLogger::shared();
        let token = CancellationToken::default();
        let usage = UsageCell::default();
        usage.store(42);

        sample_loop(
            "/definitely/not/a/stats/file",
            &token,
            &usage,
            Duration::from_millis(10),
            &logger,
        );

        assert_eq!(usage.load(), 0);
        // The token was cancelled from inside the loop.
        assert!(token.sleep_with_cancellation(Duration::from_millis(1)));
        assert_eq!(sink.lines().len(), 1);
        assert!(sink.lines()[0].contains("failed to read CPU stats"));
    }
}
