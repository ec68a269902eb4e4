use std::time::Duration;

use hotkeys_input::DEFAULT_TIMEOUT;

/// Maximum number of unhandled keys kept before the oldest is evicted.
pub const DEFAULT_UNHANDLED_CAPACITY: usize = 1000;

/// Lower bound on the reader's sleep between checks.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Configuration knobs of the hotkeys runtime.
#[derive(Clone, Debug)]
pub struct HotkeysOptions {
    /// How long a sequence that may still grow waits for its next byte.
    pub timeout: Duration,
    /// Upper bound on how long the reader sleeps between checks. Values
    /// below [`MIN_POLL_INTERVAL`] are raised to it.
    pub poll_interval: Duration,
    /// Size of the buffer used to drain terminal input.
    pub read_buffer_capacity: usize,
    pub unhandled_capacity: usize,
    /// Restore the terminal when SIGINT, SIGTERM, SIGHUP or SIGQUIT
    /// arrives while hotkeys are active.
    pub restore_on_signal: bool,
}

impl Default for HotkeysOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            poll_interval: Duration::from_millis(50),
            read_buffer_capacity: 1024,
            unhandled_capacity: DEFAULT_UNHANDLED_CAPACITY,
            restore_on_signal: true,
        }
    }
}

impl HotkeysOptions {
    /// Set the ambiguity timeout in seconds. Negative or non-finite values
    /// are treated as zero.
    #[must_use]
    pub fn with_timeout_secs(mut self, seconds: f64) -> Self {
        self.timeout = Duration::try_from_secs_f64(seconds).unwrap_or_default();
        self
    }

    pub(crate) fn reader_poll_interval(&self) -> Duration {
        self.poll_interval.max(MIN_POLL_INTERVAL)
    }
}
