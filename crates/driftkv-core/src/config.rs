//! Configuration for DriftKV
//!
//! Provides flush cadence presets and builder-style setters for the
//! optional error callback.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{StoreError, StoreResult};

/// Callback invoked with a human-readable message for every I/O failure
/// the store swallows (flush failures, wipe failures).
pub type ErrorHandler = Arc<dyn Fn(&str) + Send + Sync>;

/// Suffix appended to the main file path to form the side file path.
pub const SIDE_FILE_SUFFIX: &str = ".changes";

/// DriftKV configuration
#[derive(Clone)]
pub struct Config {
    /// How often the background worker checks the pending queue
    pub flush_interval: Duration,
    /// Sync the side file and its directory to stable storage on every flush
    pub sync_writes: bool,
    /// Optional failure callback; `None` means failures are only logged
    pub on_error: Option<ErrorHandler>,
}

impl Config {
    /// Interactive preset: 100ms cadence, synced writes.
    pub fn interactive() -> Self {
        Self {
            flush_interval: Duration::from_millis(100),
            sync_writes: true,
            on_error: None,
        }
    }

    /// Relaxed preset for stores that change rarely: 1s cadence.
    pub fn relaxed() -> Self {
        Self {
            flush_interval: Duration::from_secs(1),
            sync_writes: true,
            on_error: None,
        }
    }

    /// Fast cadence without fsync, for tests.
    pub fn testing() -> Self {
        Self {
            flush_interval: Duration::from_millis(10),
            sync_writes: false,
            on_error: None,
        }
    }

    /// Override the flush interval.
    pub fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }

    /// Toggle durable sync of the side file.
    pub fn with_sync(mut self, sync_writes: bool) -> Self {
        self.sync_writes = sync_writes;
        self
    }

    /// Install the failure callback.
    pub fn with_error_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(handler));
        self
    }

    /// Validate all configuration parameters
    pub fn validate(&self) -> StoreResult<()> {
        if self.flush_interval.is_zero() {
            return Err(StoreError::InvalidConfig("flush_interval must be > 0".into()));
        }
        if self.flush_interval > Duration::from_secs(3600) {
            return Err(StoreError::InvalidConfig("flush_interval must be <= 1h".into()));
        }
        Ok(())
    }

    /// Forward a failure message to the callback, if any.
    pub(crate) fn report(&self, message: &str) {
        if let Some(handler) = &self.on_error {
            handler(message);
        }
    }
}

impl Default for Config {
    fn default() -> Self { Self::interactive() }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("flush_interval", &self.flush_interval)
            .field("sync_writes", &self.sync_writes)
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}
