//! Connection check
//!
//! A one-shot test a host runs before accepting a device: connect, read the
//! room temperature input register, and classify whatever went wrong.

use std::fmt;
use std::io;

use tracing::debug;

use crate::client::ModbusClient;
use crate::config::HeatPumpConfig;
use crate::coordinator::{Connector, TcpConnector};
use crate::error::ModbusError;

/// Input register read by the check
pub const PROBE_REGISTER: u16 = 12;

/// Classified result of a connection check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProbeOutcome {
    Success,
    /// No session could be opened
    CannotConnect,
    ConnectionRefused,
    Timeout,
    /// Any other socket-level failure
    NetworkError,
    /// The device answered, but not with register data
    ModbusError,
}

impl ProbeOutcome {
    pub fn is_success(self) -> bool {
        self == ProbeOutcome::Success
    }

    /// Stable identifier for host-side error messages
    pub fn as_str(self) -> &'static str {
        match self {
            ProbeOutcome::Success => "success",
            ProbeOutcome::CannotConnect => "cannot_connect",
            ProbeOutcome::ConnectionRefused => "connection_refused",
            ProbeOutcome::Timeout => "timeout",
            ProbeOutcome::NetworkError => "network_error",
            ProbeOutcome::ModbusError => "modbus_error",
        }
    }

    /// Map a transport error onto an outcome.
    pub fn classify(error: &ModbusError) -> Self {
        match error {
            ModbusError::Io(err) => match err.kind() {
                io::ErrorKind::ConnectionRefused => ProbeOutcome::ConnectionRefused,
                io::ErrorKind::TimedOut => ProbeOutcome::Timeout,
                _ => ProbeOutcome::NetworkError,
            },
            ModbusError::Timeout { .. } => ProbeOutcome::Timeout,
            ModbusError::Connection { .. } | ModbusError::Configuration { .. } => {
                ProbeOutcome::CannotConnect
            }
            ModbusError::Protocol { .. }
            | ModbusError::Frame { .. }
            | ModbusError::Exception { .. }
            | ModbusError::InvalidFunction { .. }
            | ModbusError::InvalidData { .. } => ProbeOutcome::ModbusError,
        }
    }
}

impl fmt::Display for ProbeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Check a device through `connector`.
///
/// Uses the write timeout, so an unreachable host is reported quickly. No
/// retries are made.
pub async fn probe_with<C: Connector>(connector: &C, config: &HeatPumpConfig) -> ProbeOutcome {
    let mut client = match connector
        .connect(&config.host, config.port, config.write_timeout)
        .await
    {
        Ok(client) => client,
        Err(e) => {
            debug!("Probe of {} could not connect: {}", config.peer(), e);
            return ProbeOutcome::classify(&e);
        }
    };

    let result = client.read_04(config.unit_id, PROBE_REGISTER, 1).await;
    let _ = client.close().await;

    match result {
        Ok(words) if words.len() == 1 => ProbeOutcome::Success,
        Ok(words) => {
            debug!("Probe of {} returned {} registers", config.peer(), words.len());
            ProbeOutcome::ModbusError
        }
        Err(e) => {
            debug!("Probe read from {} failed: {}", config.peer(), e);
            ProbeOutcome::classify(&e)
        }
    }
}

/// Check a device over Modbus TCP.
pub async fn probe(config: &HeatPumpConfig) -> ProbeOutcome {
    probe_with(&TcpConnector::default(), config).await
}
