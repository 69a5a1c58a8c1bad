//! High-level Modbus client
//!
//! Wraps a [`ModbusTransport`] with typed read/write calls for the four
//! function codes the WT16 controller answers to.
//!
//! # API Naming Convention
//!
//! | Function Code | Primary Name | Semantic Alias |
//! |---------------|--------------|----------------|
//! | 0x02 | `read_02()` | `read_discrete_inputs()` |
//! | 0x03 | `read_03()` | `read_holding_registers()` |
//! | 0x04 | `read_04()` | `read_input_registers()` |
//! | 0x06 | `write_06()` | `write_single_register()` |
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use wt16_modbus::{ModbusClient, ModbusResult, ModbusTcpClient};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> ModbusResult<()> {
//!     let mut client = ModbusTcpClient::connect("192.168.1.50", 502, Duration::from_secs(5)).await?;
//!
//!     // Outside temperature, tenths of a degree
//!     let raw = client.read_04(1, 15, 1).await?;
//!     println!("Raw: {:?}", raw);
//!
//!     client.close().await?;
//!     Ok(())
//! }
//! ```

use std::future::Future;
use std::time::Duration;

use tracing::debug;

use crate::error::{ModbusError, ModbusResult};
use crate::protocol::{ModbusFunction, ModbusRequest, ModbusResponse, SlaveId};
use crate::transport::{ModbusTransport, TcpTransport, TransportStats};

/// Trait defining the interface for Modbus client operations.
///
/// # Implemented By
///
/// - [`ModbusTcpClient`] - Modbus TCP client
/// - [`GenericModbusClient`] - Generic client for custom transports
pub trait ModbusClient: Send + Sync {
    /// Read discrete inputs (function code 0x02).
    ///
    /// # Arguments
    ///
    /// * `slave_id` - The Modbus unit ID
    /// * `address` - Starting input address (0-65535)
    /// * `quantity` - Number of inputs to read (1-2000)
    fn read_02(
        &mut self,
        slave_id: SlaveId,
        address: u16,
        quantity: u16,
    ) -> impl Future<Output = ModbusResult<Vec<bool>>> + Send;

    /// Read holding registers (function code 0x03).
    ///
    /// # Arguments
    ///
    /// * `slave_id` - The Modbus unit ID
    /// * `address` - Starting register address (0-65535)
    /// * `quantity` - Number of registers to read (1-125)
    fn read_03(
        &mut self,
        slave_id: SlaveId,
        address: u16,
        quantity: u16,
    ) -> impl Future<Output = ModbusResult<Vec<u16>>> + Send;

    /// Read input registers (function code 0x04).
    fn read_04(
        &mut self,
        slave_id: SlaveId,
        address: u16,
        quantity: u16,
    ) -> impl Future<Output = ModbusResult<Vec<u16>>> + Send;

    /// Write single register (function code 0x06).
    ///
    /// Succeeds only when the device echoes the address and value back.
    fn write_06(
        &mut self,
        slave_id: SlaveId,
        address: u16,
        value: u16,
    ) -> impl Future<Output = ModbusResult<()>> + Send;

    /// Close the current connection and open a new one.
    fn reconnect(&mut self) -> impl Future<Output = ModbusResult<()>> + Send;

    /// Check if the client is connected.
    fn is_connected(&self) -> bool;

    /// Close the client connection. Safe to call more than once.
    fn close(&mut self) -> impl Future<Output = ModbusResult<()>> + Send;

    /// Get transport statistics.
    fn get_stats(&self) -> TransportStats;

    // ===== Semantic name aliases (for readability) =====

    /// Alias for `read_02` - Read discrete inputs
    #[inline]
    fn read_discrete_inputs(
        &mut self,
        slave_id: SlaveId,
        address: u16,
        quantity: u16,
    ) -> impl Future<Output = ModbusResult<Vec<bool>>> + Send {
        self.read_02(slave_id, address, quantity)
    }

    /// Alias for `read_03` - Read holding registers
    #[inline]
    fn read_holding_registers(
        &mut self,
        slave_id: SlaveId,
        address: u16,
        quantity: u16,
    ) -> impl Future<Output = ModbusResult<Vec<u16>>> + Send {
        self.read_03(slave_id, address, quantity)
    }

    /// Alias for `read_04` - Read input registers
    #[inline]
    fn read_input_registers(
        &mut self,
        slave_id: SlaveId,
        address: u16,
        quantity: u16,
    ) -> impl Future<Output = ModbusResult<Vec<u16>>> + Send {
        self.read_04(slave_id, address, quantity)
    }

    /// Alias for `write_06` - Write single register
    #[inline]
    fn write_single_register(
        &mut self,
        slave_id: SlaveId,
        address: u16,
        value: u16,
    ) -> impl Future<Output = ModbusResult<()>> + Send {
        self.write_06(slave_id, address, value)
    }
}

/// Generic Modbus client that works with any transport
///
/// Builds requests and interprets responses; socket handling stays with the
/// transport.
pub struct GenericModbusClient<T: ModbusTransport> {
    transport: T,
}

impl<T: ModbusTransport> GenericModbusClient<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    /// Get a reference to the underlying transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Get a mutable reference to the underlying transport
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Execute a raw request
    pub async fn execute_request(
        &mut self,
        request: ModbusRequest,
    ) -> ModbusResult<ModbusResponse> {
        debug!(
            "-> slave:{} fc:{:02X} addr:{} qty:{}",
            request.slave_id,
            request.function.to_u8(),
            request.address,
            request.quantity
        );

        let response = self.transport.request(&request).await?;

        debug!(
            "<- slave:{} fc:{:02X} {} bytes",
            response.slave_id,
            response.function.to_u8(),
            response.data().len()
        );

        Ok(response)
    }

    async fn read_bits(
        &mut self,
        slave_id: SlaveId,
        address: u16,
        quantity: u16,
    ) -> ModbusResult<Vec<bool>> {
        let request =
            ModbusRequest::new_read(slave_id, ModbusFunction::ReadDiscreteInputs, address, quantity);
        request.validate()?;

        let response = self.execute_request(request).await?;
        let bits = response.parse_bits()?;
        if bits.len() < quantity as usize {
            return Err(ModbusError::protocol(format!(
                "Expected {} inputs, got {}",
                quantity,
                bits.len()
            )));
        }
        Ok(bits.into_iter().take(quantity as usize).collect())
    }

    async fn read_words(
        &mut self,
        function: ModbusFunction,
        slave_id: SlaveId,
        address: u16,
        quantity: u16,
    ) -> ModbusResult<Vec<u16>> {
        let request = ModbusRequest::new_read(slave_id, function, address, quantity);
        request.validate()?;

        let response = self.execute_request(request).await?;
        let registers = response.parse_registers()?;
        if registers.len() != quantity as usize {
            return Err(ModbusError::protocol(format!(
                "Expected {} registers, got {}",
                quantity,
                registers.len()
            )));
        }
        Ok(registers)
    }
}

impl<T: ModbusTransport + Send + Sync> ModbusClient for GenericModbusClient<T> {
    async fn read_02(
        &mut self,
        slave_id: SlaveId,
        address: u16,
        quantity: u16,
    ) -> ModbusResult<Vec<bool>> {
        self.read_bits(slave_id, address, quantity).await
    }

    async fn read_03(
        &mut self,
        slave_id: SlaveId,
        address: u16,
        quantity: u16,
    ) -> ModbusResult<Vec<u16>> {
        self.read_words(ModbusFunction::ReadHoldingRegisters, slave_id, address, quantity)
            .await
    }

    async fn read_04(
        &mut self,
        slave_id: SlaveId,
        address: u16,
        quantity: u16,
    ) -> ModbusResult<Vec<u16>> {
        self.read_words(ModbusFunction::ReadInputRegisters, slave_id, address, quantity)
            .await
    }

    async fn write_06(&mut self, slave_id: SlaveId, address: u16, value: u16) -> ModbusResult<()> {
        let request = ModbusRequest::new_write_single(slave_id, address, value);
        let response = self.execute_request(request).await?;
        response.verify_write_echo(address, value)
    }

    async fn reconnect(&mut self) -> ModbusResult<()> {
        self.transport.reconnect().await
    }

    fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    async fn close(&mut self) -> ModbusResult<()> {
        self.transport.close().await
    }

    fn get_stats(&self) -> TransportStats {
        self.transport.get_stats()
    }
}

/// Modbus TCP client implementation using the generic client
pub struct ModbusTcpClient {
    inner: GenericModbusClient<TcpTransport>,
}

impl ModbusTcpClient {
    /// Connect to `host:port`; `timeout` bounds the connect and every exchange.
    pub async fn connect(host: &str, port: u16, timeout: Duration) -> ModbusResult<Self> {
        let transport = TcpTransport::connect(host, port, timeout).await?;
        Ok(Self::from_transport(transport))
    }

    /// Create a new TCP client from transport
    pub fn from_transport(transport: TcpTransport) -> Self {
        Self {
            inner: GenericModbusClient::new(transport),
        }
    }

    /// `host:port` of the device
    pub fn peer(&self) -> String {
        self.inner.transport().peer()
    }

    /// Enable or disable packet logging on existing client
    pub fn set_packet_logging(&mut self, enabled: bool) {
        self.inner.transport_mut().set_packet_logging(enabled);
    }
}

impl ModbusClient for ModbusTcpClient {
    async fn read_02(
        &mut self,
        slave_id: SlaveId,
        address: u16,
        quantity: u16,
    ) -> ModbusResult<Vec<bool>> {
        self.inner.read_02(slave_id, address, quantity).await
    }

    async fn read_03(
        &mut self,
        slave_id: SlaveId,
        address: u16,
        quantity: u16,
    ) -> ModbusResult<Vec<u16>> {
        self.inner.read_03(slave_id, address, quantity).await
    }

    async fn read_04(
        &mut self,
        slave_id: SlaveId,
        address: u16,
        quantity: u16,
    ) -> ModbusResult<Vec<u16>> {
        self.inner.read_04(slave_id, address, quantity).await
    }

    async fn write_06(&mut self, slave_id: SlaveId, address: u16, value: u16) -> ModbusResult<()> {
        self.inner.write_06(slave_id, address, value).await
    }

    async fn reconnect(&mut self) -> ModbusResult<()> {
        self.inner.reconnect().await
    }

    fn is_connected(&self) -> bool {
        self.inner.is_connected()
    }

    async fn close(&mut self) -> ModbusResult<()> {
        self.inner.close().await
    }

    fn get_stats(&self) -> TransportStats {
        self.inner.get_stats()
    }
}
