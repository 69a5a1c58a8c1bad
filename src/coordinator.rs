//! # Poll Coordinator
//!
//! Runs acquisition cycles against one heat pump and decides what the host
//! gets to see.
//!
//! ## Poll cycle
//!
//! One connection is opened per cycle and every entry of the register map
//! is read through it in poll order, each within its retry budget. A cycle
//! succeeds when at least one register could be read and decoded; the
//! connection is closed before the cycle returns either way.
//!
//! ## Failure suppression
//!
//! Failed cycles are hidden behind the last published snapshot for up to
//! `error_timeout`. The first failure opens the [`ErrorWindow`]; the first
//! failure at or past the timeout surfaces as [`UpdateFailed`] and closes
//! the window again. Any successful cycle closes it as well.
//!
//! ## Writes
//!
//! Writes go through a [`Writer`], which shares the connector and follows
//! configuration updates but none of the poll state. Each write opens its
//! own connection, so it never waits for a running poll cycle, and reports
//! the outcome as a plain `bool`.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::client::{ModbusClient, ModbusTcpClient};
use crate::codec::decode_entry;
use crate::config::HeatPumpConfig;
use crate::error::{ConfigError, ModbusError, ModbusResult, UpdateFailed};
use crate::registers::REGISTER_MAP;
use crate::retry::read_with_retry;
use crate::setpoint::{Setpoint, SetpointError};
use crate::snapshot::Snapshot;

/// Success rate (percent) below which a cycle is logged as a warning
pub const LOW_SUCCESS_RATE_PERCENT: f64 = 80.0;

/// Opens client sessions to the device.
///
/// [`TcpConnector`] is the production implementation; tests inject
/// in-memory devices.
pub trait Connector: Send + Sync {
    type Client: ModbusClient;

    fn connect(
        &self,
        host: &str,
        port: u16,
        timeout: Duration,
    ) -> impl Future<Output = ModbusResult<Self::Client>> + Send;
}

/// Connects over Modbus TCP.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector {
    /// Hex-dump every frame at trace level
    pub packet_logging: bool,
}

impl Connector for TcpConnector {
    type Client = ModbusTcpClient;

    async fn connect(
        &self,
        host: &str,
        port: u16,
        timeout: Duration,
    ) -> ModbusResult<ModbusTcpClient> {
        let mut client = ModbusTcpClient::connect(host, port, timeout).await?;
        client.set_packet_logging(self.packet_logging);
        Ok(client)
    }
}

/// Outcome of recording a failed cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowVerdict {
    /// Keep serving the last snapshot
    Suppress,
    /// Timeout reached; surface the failure
    Expired { failing_for: Duration },
}

/// Tracks how long acquisition has been failing without interruption.
#[derive(Debug, Clone)]
pub struct ErrorWindow {
    first_error: Option<Instant>,
    timeout: Duration,
}

impl ErrorWindow {
    pub fn new(timeout: Duration) -> Self {
        Self {
            first_error: None,
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn is_open(&self) -> bool {
        self.first_error.is_some()
    }

    /// When the current run of failures started
    pub fn first_error(&self) -> Option<Instant> {
        self.first_error
    }

    pub fn reset(&mut self) {
        self.first_error = None;
    }

    /// Record a failed cycle at `now`.
    ///
    /// The first failure always suppresses. Later failures expire the
    /// window once `now - first_error >= timeout`, which also resets it.
    pub fn record_failure(&mut self, now: Instant) -> WindowVerdict {
        let Some(first) = self.first_error else {
            self.first_error = Some(now);
            return WindowVerdict::Suppress;
        };

        let failing_for = now.saturating_duration_since(first);
        if failing_for >= self.timeout {
            self.first_error = None;
            WindowVerdict::Expired { failing_for }
        } else {
            WindowVerdict::Suppress
        }
    }
}

/// Result of one successful poll cycle.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub snapshot: Snapshot,
    /// Registers read and decoded
    pub succeeded: usize,
    /// Registers attempted
    pub total: usize,
}

impl CycleReport {
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.succeeded as f64 / self.total as f64 * 100.0
    }
}

/// Run one acquisition pass against the device described by `config`.
pub(crate) async fn run_cycle<C: Connector>(
    config: &HeatPumpConfig,
    connector: &C,
) -> ModbusResult<CycleReport> {
    let peer = config.peer();

    let mut client = connector
        .connect(&config.host, config.port, config.read_timeout)
        .await
        .map_err(|e| ModbusError::connection(format!("Unable to connect to {}: {}", peer, e)))?;

    debug!("Connected to heat pump at {}, reading registers...", peer);

    let mut snapshot = Snapshot::empty();
    let mut succeeded = 0;
    let total = REGISTER_MAP.len();

    for spec in REGISTER_MAP {
        let Some(payload) =
            read_with_retry(&mut client, config.unit_id, spec, &config.retry).await
        else {
            continue;
        };
        match decode_entry(spec, &payload, config.word_order) {
            Ok(value) => {
                snapshot.insert(spec.key, value);
                succeeded += 1;
            }
            Err(e) => warn!("Could not decode register {} ({}): {}", spec.address, spec.key, e),
        }
    }

    let _ = client.close().await;
    snapshot.stamp(Utc::now());

    let report = CycleReport {
        snapshot,
        succeeded,
        total,
    };
    if report.success_rate() < LOW_SUCCESS_RATE_PERCENT {
        warn!(
            "Low success rate reading registers: {:.1}% ({}/{})",
            report.success_rate(),
            succeeded,
            total
        );
    } else {
        debug!(
            "Successfully read {:.1}% of registers ({}/{})",
            report.success_rate(),
            succeeded,
            total
        );
    }

    if succeeded == 0 {
        return Err(ModbusError::connection(format!(
            "Failed to read any registers from heat pump at {}",
            peer
        )));
    }
    Ok(report)
}

/// Polls one heat pump and applies the failure suppression policy.
///
/// # Example
///
/// ```rust,no_run
/// use wt16_modbus::{Coordinator, HeatPumpConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let mut coordinator = Coordinator::new(HeatPumpConfig::new("192.168.1.50"))?;
/// let snapshot = coordinator.refresh().await?;
/// println!("Outside: {:?}", snapshot.get_f64("aussentemperatur"));
/// # Ok(())
/// # }
/// ```
pub struct Coordinator<C: Connector = TcpConnector> {
    config: HeatPumpConfig,
    /// Publishes configuration updates to writers and pollers
    config_tx: watch::Sender<HeatPumpConfig>,
    connector: Arc<C>,
    window: ErrorWindow,
    published: Option<Snapshot>,
}

impl Coordinator<TcpConnector> {
    /// Coordinator talking Modbus TCP.
    pub fn new(config: HeatPumpConfig) -> Result<Self, ConfigError> {
        Self::with_connector(config, TcpConnector::default())
    }
}

impl<C: Connector> Coordinator<C> {
    pub fn with_connector(config: HeatPumpConfig, connector: C) -> Result<Self, ConfigError> {
        config.validate()?;
        let (config_tx, _) = watch::channel(config.clone());
        Ok(Self {
            window: ErrorWindow::new(config.error_timeout),
            config,
            config_tx,
            connector: Arc::new(connector),
            published: None,
        })
    }

    pub fn config(&self) -> &HeatPumpConfig {
        &self.config
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Receiver that sees every accepted configuration update
    pub fn subscribe_config(&self) -> watch::Receiver<HeatPumpConfig> {
        self.config_tx.subscribe()
    }

    /// Write handle that can be used without holding on to the coordinator.
    pub fn writer(&self) -> Writer<C> {
        Writer {
            config: self.subscribe_config(),
            connector: Arc::clone(&self.connector),
        }
    }

    pub fn error_window(&self) -> &ErrorWindow {
        &self.window
    }

    /// Last snapshot handed to the host, if any
    pub fn snapshot(&self) -> Option<&Snapshot> {
        self.published.as_ref()
    }

    /// Replace the configuration. The error window starts over.
    pub fn update_config(&mut self, config: HeatPumpConfig) -> Result<(), ConfigError> {
        config.validate()?;
        info!(
            "Configuration for {} updated (scan interval {:?}, error timeout {:?})",
            config.peer(),
            config.scan_interval,
            config.error_timeout
        );
        self.window = ErrorWindow::new(config.error_timeout);
        self.config_tx.send_replace(config.clone());
        self.config = config;
        Ok(())
    }

    /// Run one acquisition pass without touching published state.
    ///
    /// Fails when the device cannot be reached or when no register at all
    /// could be read.
    pub async fn poll_cycle(&self) -> ModbusResult<CycleReport> {
        run_cycle(&self.config, self.connector.as_ref()).await
    }

    /// Configuration and connector for a cycle run without the coordinator
    pub(crate) fn cycle_inputs(&self) -> (HeatPumpConfig, Arc<C>) {
        (self.config.clone(), Arc::clone(&self.connector))
    }

    /// Poll once and apply the failure suppression policy.
    ///
    /// Returns the fresh snapshot on success. While the error window is
    /// open, failures return the last published snapshot (or an empty one);
    /// once it expires the failure is returned as [`UpdateFailed`].
    pub async fn refresh(&mut self) -> Result<Snapshot, UpdateFailed> {
        let result = self.poll_cycle().await;
        self.apply_cycle(result)
    }

    /// Publish the outcome of a cycle, subject to the error window.
    pub fn apply_cycle(
        &mut self,
        result: ModbusResult<CycleReport>,
    ) -> Result<Snapshot, UpdateFailed> {
        match result {
            Ok(report) => {
                if self.window.is_open() {
                    info!("Communication with {} restored", self.config.peer());
                }
                self.window.reset();
                self.published = Some(report.snapshot.clone());
                Ok(report.snapshot)
            }
            Err(e) => match self.window.record_failure(Instant::now()) {
                WindowVerdict::Suppress => {
                    warn!(
                        "Poll of {} failed, keeping last data: {}",
                        self.config.peer(),
                        e
                    );
                    Ok(self.published.clone().unwrap_or_default())
                }
                WindowVerdict::Expired { failing_for } => {
                    error!(
                        "Heat pump at {} unreachable for {}s: {}",
                        self.config.peer(),
                        failing_for.as_secs(),
                        e
                    );
                    Err(UpdateFailed {
                        reason: e.to_string(),
                        failing_for,
                    })
                }
            },
        }
    }

    /// Write one holding register on a dedicated connection.
    ///
    /// See [`Writer::write_register`].
    pub async fn write_register(&self, address: u16, value: u16) -> bool {
        self.writer().write_register(address, value).await
    }

    /// Change a thermostat target and refresh on success.
    ///
    /// Returns whether the device accepted the write; invalid temperatures
    /// are rejected before anything is sent.
    pub async fn set_temperature(
        &mut self,
        setpoint: Setpoint,
        celsius: f64,
    ) -> Result<bool, SetpointError> {
        let written = self.writer().write_setpoint(setpoint, celsius).await?;
        if written {
            if let Err(e) = self.refresh().await {
                warn!("Refresh after setting {} failed: {}", setpoint, e);
            }
        }
        Ok(written)
    }
}

/// Write access to one heat pump.
///
/// Cheap to clone. Holds only the connector and the latest configuration,
/// so writes run concurrently with poll cycles on their own connections.
pub struct Writer<C: Connector = TcpConnector> {
    config: watch::Receiver<HeatPumpConfig>,
    connector: Arc<C>,
}

impl<C: Connector> Clone for Writer<C> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            connector: Arc::clone(&self.connector),
        }
    }
}

impl<C: Connector> Writer<C> {
    /// Configuration the next write will use
    pub fn config(&self) -> HeatPumpConfig {
        self.config.borrow().clone()
    }

    /// Write one holding register on a dedicated connection.
    ///
    /// Returns `true` only when the device echoed the write. Every failure
    /// (unreachable host, exhausted retries, exception response) is logged
    /// and reported as `false`.
    pub async fn write_register(&self, address: u16, value: u16) -> bool {
        let config = self.config();
        let policy = &config.retry;
        let mut attempt = 0;

        let mut client = loop {
            match self
                .connector
                .connect(&config.host, config.port, config.write_timeout)
                .await
            {
                Ok(client) => break client,
                Err(e) => {
                    debug!("Write connection attempt {} failed: {}", attempt + 1, e);
                    if attempt >= policy.retries {
                        error!(
                            "Error writing to register {}: unable to connect to {}: {}",
                            address,
                            config.peer(),
                            e
                        );
                        return false;
                    }
                    attempt += 1;
                    tokio::time::sleep(policy.pause).await;
                }
            }
        };

        let written = loop {
            match client.write_06(config.unit_id, address, value).await {
                Ok(()) => break true,
                Err(e) => {
                    debug!("Write attempt {} failed: {}", attempt + 1, e);
                    if !policy.prepare_retry(&mut client, attempt, &e).await {
                        error!(
                            "Failed to write register {} after {} attempts: {}",
                            address,
                            policy.attempts(),
                            e
                        );
                        break false;
                    }
                    attempt += 1;
                }
            }
        };

        let _ = client.close().await;
        if written {
            info!("Wrote {} to register {}", value, address);
        }
        written
    }

    /// Encode and write a thermostat target. Does not refresh.
    pub async fn write_setpoint(
        &self,
        setpoint: Setpoint,
        celsius: f64,
    ) -> Result<bool, SetpointError> {
        let raw = setpoint.encode(celsius)?;
        Ok(self.write_register(setpoint.register(), raw).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::NO_ACTIVE_FAULT;
    use crate::testing::{self, Device, MockConnector, SharedDevice};
    use crate::value::SnapshotValue;

    fn config() -> HeatPumpConfig {
        testing::config()
    }

    fn coordinator(device: Device) -> (Coordinator<MockConnector>, SharedDevice) {
        testing::coordinator_with(config(), device)
    }

    #[test]
    fn test_error_window_policy() {
        let start = Instant::now();
        let mut window = ErrorWindow::new(Duration::from_secs(300));

        assert_eq!(window.record_failure(start), WindowVerdict::Suppress);
        assert!(window.is_open());
        assert_eq!(
            window.record_failure(start + Duration::from_secs(299)),
            WindowVerdict::Suppress
        );
        assert_eq!(
            window.record_failure(start + Duration::from_secs(300)),
            WindowVerdict::Expired {
                failing_for: Duration::from_secs(300)
            }
        );
        assert!(!window.is_open());

        // A fresh run of failures starts over
        assert_eq!(
            window.record_failure(start + Duration::from_secs(301)),
            WindowVerdict::Suppress
        );
        window.reset();
        assert!(window.first_error().is_none());
    }

    #[tokio::test]
    async fn test_full_cycle_decodes_every_register() {
        let (coordinator, _) = coordinator(Device::fully_populated());

        let report = coordinator.poll_cycle().await.unwrap();
        assert_eq!(report.succeeded, REGISTER_MAP.len());
        assert_eq!(report.total, REGISTER_MAP.len());

        let snapshot = &report.snapshot;
        assert_eq!(snapshot.len(), REGISTER_MAP.len());
        assert_eq!(snapshot.get_f64("aussentemperatur"), Some(-10.0));
        assert_eq!(snapshot.get_f64("raum_ist_temperatur"), Some(21.5));
        assert_eq!(snapshot.get_f64("wp1_verfluessigungsdruck_evi"), Some(2.15));
        assert_eq!(snapshot.get("wp1_volumenstrom"), Some(&SnapshotValue::Integer(215)));
        assert_eq!(snapshot.get_f64("warmwasser_soll_temperatur"), Some(48.0));
        assert_eq!(snapshot.get_bool("stroemungswaechter_wp1"), Some(true));
        assert_eq!(snapshot.get_bool("up_heizen_wp1"), Some(false));
        assert_eq!(
            snapshot.get("wp1_letzte_laufzeit_pumpe"),
            Some(&SnapshotValue::Integer(65536))
        );
        assert_eq!(snapshot.get_text("aktive_fehlermeldung"), Some(NO_ACTIVE_FAULT));
    }

    #[tokio::test]
    async fn test_single_success_is_a_successful_cycle() {
        let mut device = Device {
            reachable: true,
            ..Default::default()
        };
        device.input.insert(15, 50);
        let (mut coordinator, device) = coordinator(device);

        // Open the window first
        device.lock().unwrap().reachable = false;
        coordinator.refresh().await.unwrap();
        assert!(coordinator.error_window().is_open());

        device.lock().unwrap().reachable = true;
        let snapshot = coordinator.refresh().await.unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.get_f64("aussentemperatur"), Some(5.0));
        assert!(!coordinator.error_window().is_open());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_suppressed_until_timeout() {
        let (mut coordinator, device) = coordinator(Device::fully_populated());

        let good = coordinator.refresh().await.unwrap();
        device.lock().unwrap().reachable = false;

        // Before the timeout the last snapshot is served unchanged
        assert_eq!(coordinator.refresh().await.unwrap(), good);
        tokio::time::advance(Duration::from_secs(299)).await;
        assert_eq!(coordinator.refresh().await.unwrap(), good);

        tokio::time::advance(Duration::from_secs(1)).await;
        let err = coordinator.refresh().await.unwrap_err();
        assert_eq!(err.failing_for, Duration::from_secs(300));
        assert!(!coordinator.error_window().is_open());

        // Next failure starts a new window
        assert_eq!(coordinator.refresh().await.unwrap(), good);
    }

    #[tokio::test]
    async fn test_first_failure_without_history_is_empty() {
        let (mut coordinator, _) = coordinator(Device::default());

        let snapshot = coordinator.refresh().await.unwrap();
        assert!(snapshot.is_empty());
        assert!(coordinator.snapshot().is_none());
    }

    #[tokio::test]
    async fn test_every_register_failing_is_a_failed_cycle() {
        let (mut coordinator, device) = coordinator(Device {
            reachable: true,
            ..Default::default()
        });

        assert!(coordinator.poll_cycle().await.is_err());
        assert!(coordinator.refresh().await.unwrap().is_empty());
        assert!(coordinator.error_window().is_open());
        // One connection per cycle
        assert_eq!(device.lock().unwrap().connects, 2);
    }

    #[tokio::test]
    async fn test_update_config_resets_window() {
        let (mut coordinator, _) = coordinator(Device::default());
        coordinator.refresh().await.unwrap();
        assert!(coordinator.error_window().is_open());

        let updated = config().with_error_timeout(Duration::from_secs(600));
        coordinator.update_config(updated).unwrap();
        assert!(!coordinator.error_window().is_open());
        assert_eq!(coordinator.error_window().timeout(), Duration::from_secs(600));

        let invalid = config().with_scan_interval(Duration::from_secs(1));
        assert!(coordinator.update_config(invalid).is_err());
    }

    #[tokio::test]
    async fn test_write_register_outcomes() {
        let (coordinator, device) = coordinator(Device::fully_populated());

        assert!(coordinator.write_register(723, 215).await);
        assert_eq!(device.lock().unwrap().writes, vec![(723, 215)]);

        device.lock().unwrap().reject_writes = true;
        assert!(!coordinator.write_register(723, 215).await);

        device.lock().unwrap().reachable = false;
        let connects_before = device.lock().unwrap().connects;
        assert!(!coordinator.write_register(723, 215).await);
        assert_eq!(device.lock().unwrap().connects - connects_before, 3);
    }

    #[tokio::test]
    async fn test_write_does_not_touch_snapshot() {
        let (mut coordinator, _) = coordinator(Device::fully_populated());
        let before = coordinator.refresh().await.unwrap();

        assert!(coordinator.write_register(1, 500).await);
        assert_eq!(coordinator.snapshot(), Some(&before));
    }

    #[tokio::test]
    async fn test_set_temperature_writes_and_refreshes() {
        let (mut coordinator, device) = coordinator(Device::fully_populated());

        assert_eq!(coordinator.set_temperature(Setpoint::Room, 21.5).await, Ok(true));
        assert_eq!(device.lock().unwrap().writes, vec![(723, 215)]);
        assert_eq!(
            coordinator.snapshot().and_then(|s| s.get_f64("raum_soll_temperatur")),
            Some(21.5)
        );

        assert!(coordinator.set_temperature(Setpoint::HotWater, 70.0).await.is_err());
        assert_eq!(device.lock().unwrap().writes.len(), 1);
    }

    #[tokio::test]
    async fn test_writer_follows_config_updates() {
        let (mut coordinator, device) = coordinator(Device::fully_populated());
        let writer = coordinator.writer();

        coordinator.update_config(config().with_unit_id(7)).unwrap();
        assert_eq!(writer.config().unit_id, 7);
        assert_eq!(writer.clone().config(), coordinator.config().clone());

        assert_eq!(writer.write_setpoint(Setpoint::HotWater, 50.0).await, Ok(true));
        assert_eq!(device.lock().unwrap().writes, vec![(1, 500)]);
        // Writers never publish
        assert!(coordinator.snapshot().is_none());

        // Rejected configurations never reach writers
        let invalid = config().with_scan_interval(Duration::from_secs(1));
        assert!(coordinator.update_config(invalid).is_err());
        assert_eq!(writer.config().unit_id, 7);
    }
}
