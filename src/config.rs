//! # Heat Pump Connection Configuration
//!
//! Connection parameters and polling behaviour for one WT16 controller.
//!
//! ## Bounds
//!
//! - **Scan interval**: 10-300 s, default 60 s
//! - **Error timeout**: 60-3600 s, default 300 s. How long failed cycles are
//!   hidden behind the last good snapshot before an update failure surfaces.
//! - **Read timeout**: 10 s per poll-cycle connection
//! - **Write timeout**: 5 s per write connection

use std::time::Duration;

use crate::bytes::ByteOrder;
use crate::error::ConfigError;
use crate::protocol::SlaveId;
use crate::retry::RetryPolicy;

/// Default Modbus TCP port.
pub const DEFAULT_PORT: u16 = 502;

/// Default Modbus unit id of the controller.
pub const DEFAULT_UNIT_ID: SlaveId = 1;

pub const DEFAULT_SCAN_INTERVAL_SECS: u64 = 60;
pub const MIN_SCAN_INTERVAL_SECS: u64 = 10;
pub const MAX_SCAN_INTERVAL_SECS: u64 = 300;

pub const DEFAULT_ERROR_TIMEOUT_SECS: u64 = 300;
pub const MIN_ERROR_TIMEOUT_SECS: u64 = 60;
pub const MAX_ERROR_TIMEOUT_SECS: u64 = 3600;

pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// Upper bound on the pause between retries.
pub const MAX_RETRY_PAUSE_MS: u64 = 5_000;

/// Configuration of one heat pump.
///
/// # Example
///
/// ```rust
/// use wt16_modbus::HeatPumpConfig;
/// use std::time::Duration;
///
/// let config = HeatPumpConfig::new("192.168.1.50")
///     .with_scan_interval(Duration::from_secs(30))
///     .with_error_timeout(Duration::from_secs(600));
///
/// assert!(config.validate().is_ok());
/// assert_eq!(config.port, 502);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeatPumpConfig {
    /// Host name or IP address of the controller.
    pub host: String,
    pub port: u16,
    /// Modbus unit id sent with every request.
    pub unit_id: SlaveId,
    /// Time between poll cycles.
    pub scan_interval: Duration,
    /// How long failures are suppressed before surfacing.
    pub error_timeout: Duration,
    /// Connect and exchange timeout for poll cycles.
    pub read_timeout: Duration,
    /// Connect and exchange timeout for writes.
    pub write_timeout: Duration,
    /// Word order of the 32-bit run-time counters.
    pub word_order: ByteOrder,
    pub retry: RetryPolicy,
}

impl HeatPumpConfig {
    /// Configuration with defaults for everything but the host.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            unit_id: DEFAULT_UNIT_ID,
            scan_interval: Duration::from_secs(DEFAULT_SCAN_INTERVAL_SECS),
            error_timeout: Duration::from_secs(DEFAULT_ERROR_TIMEOUT_SECS),
            read_timeout: DEFAULT_READ_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            word_order: ByteOrder::default(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_unit_id(mut self, unit_id: SlaveId) -> Self {
        self.unit_id = unit_id;
        self
    }

    pub fn with_scan_interval(mut self, interval: Duration) -> Self {
        self.scan_interval = interval;
        self
    }

    pub fn with_error_timeout(mut self, timeout: Duration) -> Self {
        self.error_timeout = timeout;
        self
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    pub fn with_word_order(mut self, order: ByteOrder) -> Self {
        self.word_order = order;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// `host:port` for log lines
    pub fn peer(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check every value against its accepted range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::EmptyHost);
        }
        if self.port == 0 {
            return Err(ConfigError::InvalidPort);
        }
        check_range(
            "scan_interval",
            self.scan_interval,
            MIN_SCAN_INTERVAL_SECS,
            MAX_SCAN_INTERVAL_SECS,
        )?;
        check_range(
            "error_timeout",
            self.error_timeout,
            MIN_ERROR_TIMEOUT_SECS,
            MAX_ERROR_TIMEOUT_SECS,
        )?;
        if self.read_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout {
                field: "read_timeout",
            });
        }
        if self.write_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout {
                field: "write_timeout",
            });
        }
        if self.retry.pause > Duration::from_millis(MAX_RETRY_PAUSE_MS) {
            return Err(ConfigError::RetryPauseTooLong {
                max_ms: MAX_RETRY_PAUSE_MS,
            });
        }
        Ok(())
    }
}

fn check_range(field: &'static str, value: Duration, min: u64, max: u64) -> Result<(), ConfigError> {
    if value < Duration::from_secs(min) || value > Duration::from_secs(max) {
        return Err(ConfigError::OutOfRange {
            field,
            min,
            max,
            actual: value.as_secs(),
        });
    }
    Ok(())
}
