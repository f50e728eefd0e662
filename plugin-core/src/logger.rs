use log::{Log, Metadata, Record};

/// Function pointer handed to a plug-in so its `log` records cross the dylib boundary
/// and land in the host's logger, exactly as the teacher's `plugin-base::logger` bridges
/// a plugin's log crate instance back to the host's.
pub type LogCallback = fn(record: &Record);

pub(crate) fn log_callback(record: &Record) {
    log::logger().log(record)
}

pub struct ExternalLogger {
    callback: LogCallback,
}

impl ExternalLogger {
    pub fn new(callback: LogCallback) -> Self {
        Self { callback }
    }
}

impl Log for ExternalLogger {
    fn enabled(&self, _: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        (self.callback)(record)
    }

    fn flush(&self) {}
}

/// The manager's log-sink configuration (spec.md §4.6: "stream + enable flag").
///
/// `stream` is a target label rather than an actual `io::Write` — the manager never
/// writes bytes itself, it only decides whether to forward plug-in log records to the
/// host's already-configured `log` backend.
#[derive(Clone, Debug)]
pub struct LogSinkConfig {
    pub stream: String,
    pub enabled: bool,
}

impl Default for LogSinkConfig {
    fn default() -> Self {
        Self {
            stream: "stderr".to_string(),
            enabled: true,
        }
    }
}

pub(crate) fn callback_for(config: &LogSinkConfig) -> Option<LogCallback> {
    config.enabled.then_some(log_callback as LogCallback)
}
