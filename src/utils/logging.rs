//! Logger plumbing.
//!
//! The monitors and the serving layer never log through global state; they
//! are handed a [`SharedLogger`] at construction instead, so tests can run in
//! parallel with independent sinks.

use std::sync::Arc;
use std::time::SystemTime;

use log::{Level, LevelFilter, Log, Record};

/// An externally supplied logger, shared by reference.
pub type SharedLogger = Arc<dyn Log>;

/// Builds the logger used by the binary: timestamped lines on stderr.
pub fn init_logger(min_level: LevelFilter) -> SharedLogger {
    let (_, logger) = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{}][{}][{}] {}",
                humantime::format_rfc3339_seconds(SystemTime::now()),
                record.target(),
                record.level(),
                message
            ))
        })
        .level(min_level)
        .chain(std::io::stderr())
        .into_log();

    Arc::from(logger)
}

/// Routes one record through an injected logger. Use the `log_error!` and
/// `log_info!` macros instead of calling this directly.
#[doc(hidden)]
pub fn log_at(logger: &dyn Log, level: Level, target: &str, args: std::fmt::Arguments<'_>) {
    logger.log(
        &Record::builder()
            .args(args)
            .level(level)
            .target(target)
            .build(),
    );
}

/// Logs an error through an externally supplied logger.
#[macro_export]
macro_rules! log_error {
    ($logger:expr, $($arg:tt)+) => {
        $crate::utils::logging::log_at(
            &*$logger,
            ::log::Level::Error,
            module_path!(),
            format_args!($($arg)+),
        )
    };
}

/// Logs an informational message through an externally supplied logger.
#[macro_export]
macro_rules! log_info {
    ($logger:expr, $($arg:tt)+) => {
        $crate::utils::logging::log_at(
            &*$logger,
            ::log::Level::Info,
            module_path!(),
            format_args!($($arg)+),
        )
    };
}

#[cfg(test)]
pub(crate) mod test {
    use std::sync::{Arc, Mutex};

    use log::{Log, Metadata, Record};

    use super::SharedLogger;

    /// Collects formatted log lines in memory, one sink per test.
    #[derive(Debug, Default)]
    pub(crate) struct VecLogger(Mutex<Vec<String>>);

    impl VecLogger {
        /// Returns a sink handle plus the same sink as a [`SharedLogger`].
        pub(crate) fn shared() -> (Arc<VecLogger>, SharedLogger) {
            let sink = Arc::new(VecLogger::default());
            let logger: SharedLogger = sink.clone();
            (sink, logger)
        }

        pub(crate) fn lines(&self) -> Vec<String> {
            self.0.lock().unwrap().clone()
        }
    }

    impl Log for VecLogger {
        fn enabled(&self, _metadata: &Metadata<'_>) -> bool {
            true
        }

        fn log(&self, record: &Record<'_>) {
            self.0.lock().unwrap().push(record.args().to_string());
        }

        fn flush(&self) {}
    }

    #[test]
    fn macros_route_through_the_injected_logger() {
        let (sink, logger) = VecLogger::shared();

        crate::log_error!(logger, "boom: {}", 7);
        crate::log_info!(logger, "up");

        assert_eq!(sink.lines(), vec!["boom: 7".to_string(), "up".to_string()]);
    }
}
