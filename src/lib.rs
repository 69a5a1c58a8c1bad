//! # WT16 Modbus - Data Acquisition Core for the Weider WT16 Heat Pump
//!
//! **License:** MIT
//!
//! Polls a WT16 controller over Modbus TCP, decodes its register map into a
//! flat key/value snapshot, and keeps the last good snapshot alive through
//! short communication outages.
//!
//! ## Features
//!
//! - **Fixed register map**: 48 entries covering temperatures, pressures,
//!   pump states, run-time counters and the active fault text
//! - **Resilient polling**: per-register retries with reconnect on
//!   connection-class errors; partial reads still publish
//! - **Failure suppression**: failed cycles are hidden behind the last
//!   snapshot until a configurable error timeout expires
//! - **Setpoint writes**: single-register writes on their own connection,
//!   with echo verification
//!
//! ## Supported Function Codes
//!
//! | Code | Function | Used for |
//! |------|----------|----------|
//! | 0x02 | Read Discrete Inputs | Pump, compressor and lock states |
//! | 0x03 | Read Holding Registers | Temperature targets |
//! | 0x04 | Read Input Registers | Measurements, counters, fault text |
//! | 0x06 | Write Single Register | Temperature targets |
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use wt16_modbus::{Coordinator, HeatPumpConfig, Setpoint};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut coordinator = Coordinator::new(HeatPumpConfig::new("192.168.1.50"))?;
//!
//!     let snapshot = coordinator.refresh().await?;
//!     for (key, value) in snapshot.iter() {
//!         println!("{key}: {value}");
//!     }
//!
//!     coordinator.set_temperature(Setpoint::Room, 21.5).await?;
//!     Ok(())
//! }
//! ```

// ============================================================================
// Protocol layer
// ============================================================================

/// Core error types and result handling
pub mod error;

/// Modbus protocol constants
pub mod constants;

/// Stack-allocated PDU
pub mod pdu;

/// Modbus request and response types
pub mod protocol;

/// Modbus TCP transport
pub mod transport;

/// Modbus client implementations
pub mod client;

// ============================================================================
// Device layer
// ============================================================================

/// Snapshot value types
pub mod value;

/// Word order handling for multi-register values
pub mod bytes;

/// Register payload decoding
pub mod codec;

/// The WT16 register map
pub mod registers;

/// Per-register retry
pub mod retry;

/// Decoded acquisition results
pub mod snapshot;

/// Connection and polling configuration
pub mod config;

/// Thermostat setpoints
pub mod setpoint;

// ============================================================================
// Acquisition
// ============================================================================

/// Poll cycle, failure suppression and write path
pub mod coordinator;

/// One-shot connection check
pub mod probe;

/// Coordinators keyed by entry id
pub mod registry;

/// Periodic polling task
pub mod scheduler;

#[cfg(test)]
mod testing;

// ============================================================================
// Re-exports for convenience
// ============================================================================

// === Core client API ===
pub use client::{GenericModbusClient, ModbusClient, ModbusTcpClient};

// === Error handling ===
pub use error::{ConfigError, ModbusError, ModbusResult, UpdateFailed};

// === Core types ===
pub use bytes::ByteOrder;
pub use protocol::{ModbusFunction, ModbusRequest, ModbusResponse, SlaveId};
pub use value::SnapshotValue;

// === Device ===
pub use codec::{Scale, NO_ACTIVE_FAULT, READ_ERROR};
pub use config::HeatPumpConfig;
pub use registers::{RegisterClass, RegisterSpec, REGISTER_MAP};
pub use retry::{RawPayload, RetryPolicy};
pub use setpoint::{Setpoint, SetpointError};
pub use snapshot::Snapshot;

// === Acquisition ===
pub use coordinator::{Connector, Coordinator, CycleReport, ErrorWindow, TcpConnector, Writer};
pub use probe::{probe, ProbeOutcome};
pub use registry::{CoordinatorRegistry, SharedCoordinator};
pub use scheduler::{spawn_poller, PollState, PollerHandle};

// === Monitoring ===
pub use transport::{ModbusTransport, TcpTransport, TransportStats};

// === PDU (advanced usage) ===
pub use pdu::{ModbusPdu, PduBuilder};

// === Register conversions ===
#[doc(hidden)]
pub use bytes::{regs_to_bytes_4, regs_to_u32, u32_to_regs};

/// Modbus TCP default port
pub const DEFAULT_TCP_PORT: u16 = config::DEFAULT_PORT;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get library information
pub fn info() -> String {
    format!(
        "WT16 Modbus v{} - data acquisition core for the Weider WT16 heat pump",
        VERSION
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_info() {
        assert!(info().contains(VERSION));
        assert_eq!(DEFAULT_TCP_PORT, 502);
    }
}
