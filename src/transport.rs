//! # Modbus TCP Transport
//!
//! Short-lived TCP sessions to the heat pump controller. A transport owns at
//! most one socket; it is opened with a bounded connect timeout, used for a
//! handful of request/response exchanges and then closed.
//!
//! ## Connection lifecycle
//!
//! - Any I/O failure or timeout drops the socket. The next request fails with
//!   a connection-class error until [`ModbusTransport::reconnect`] is called.
//! - [`ModbusTransport::close`] is idempotent and never fails, so it can be
//!   called from every cleanup path.
//!
//! ## Frame format
//!
//! ```text
//! | Transaction ID (2) | Protocol ID (2) = 0 | Length (2) | Unit ID (1) | PDU |
//! ```

use std::future::Future;
use std::time::Duration;

use bytes::{Buf, BufMut, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, trace};

use crate::constants::{MAX_MBAP_LENGTH, MBAP_HEADER_LEN, MODBUS_PROTOCOL_ID};
use crate::error::{ModbusError, ModbusResult};
use crate::pdu::ModbusPdu;
use crate::protocol::{ModbusRequest, ModbusResponse};

/// Format raw bytes as hex string for packet logging
fn format_hex_packet(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Transport layer abstraction for Modbus communication
///
/// Implemented by [`TcpTransport`] and by in-memory transports in tests.
pub trait ModbusTransport: Send + Sync {
    /// Send a request and wait for the matching response.
    ///
    /// Exception responses are returned as [`ModbusError::Exception`].
    fn request(
        &mut self,
        request: &ModbusRequest,
    ) -> impl Future<Output = ModbusResult<ModbusResponse>> + Send;

    /// Whether a socket is currently held
    fn is_connected(&self) -> bool;

    /// Drop the current socket (if any) and open a fresh one
    fn reconnect(&mut self) -> impl Future<Output = ModbusResult<()>> + Send;

    /// Release the socket. Safe to call repeatedly.
    fn close(&mut self) -> impl Future<Output = ModbusResult<()>> + Send;

    fn get_stats(&self) -> TransportStats;
}

/// Transport layer statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportStats {
    pub requests_sent: u64,
    pub responses_received: u64,
    pub errors: u64,
    pub timeouts: u64,
    pub reconnects: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
}

/// Modbus TCP transport implementation
pub struct TcpTransport {
    stream: Option<TcpStream>,
    host: String,
    port: u16,
    timeout: Duration,
    transaction_id: u16,
    stats: TransportStats,
    /// Enable packet logging for debugging
    packet_logging: bool,
}

impl TcpTransport {
    /// Open a connection to `host:port`, giving up after `timeout`.
    ///
    /// The same timeout bounds every later send/receive on this transport.
    pub async fn connect(host: &str, port: u16, timeout: Duration) -> ModbusResult<Self> {
        if host.is_empty() {
            return Err(ModbusError::configuration("Host must not be empty"));
        }
        let stream = Self::open_stream(host, port, timeout).await?;
        Ok(Self {
            stream: Some(stream),
            host: host.to_string(),
            port,
            timeout,
            transaction_id: 0,
            stats: TransportStats::default(),
            packet_logging: false,
        })
    }

    /// Enable or disable packet logging
    pub fn set_packet_logging(&mut self, enabled: bool) {
        self.packet_logging = enabled;
    }

    /// `host:port` of the remote device
    pub fn peer(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    async fn open_stream(host: &str, port: u16, limit: Duration) -> ModbusResult<TcpStream> {
        debug!("Connecting to {}:{} (timeout {:?})", host, port, limit);
        match timeout(limit, TcpStream::connect((host, port))).await {
            Ok(Ok(stream)) => {
                // Small request/response exchanges; do not wait for Nagle.
                let _ = stream.set_nodelay(true);
                Ok(stream)
            }
            Ok(Err(e)) => Err(ModbusError::Io(e)),
            Err(_) => Err(ModbusError::timeout(
                format!("connect to {}:{}", host, port),
                limit.as_millis() as u64,
            )),
        }
    }

    /// Get next transaction ID
    fn next_transaction_id(&mut self) -> u16 {
        self.transaction_id = self.transaction_id.wrapping_add(1);
        if self.transaction_id == 0 {
            self.transaction_id = 1;
        }
        self.transaction_id
    }

    /// Encode a request into an MBAP frame
    pub fn encode_frame(
        transaction_id: u16,
        request: &ModbusRequest,
    ) -> ModbusResult<BytesMut> {
        let pdu = request.to_pdu()?;
        let mut frame = BytesMut::with_capacity(MBAP_HEADER_LEN + 1 + pdu.len());
        frame.put_u16(transaction_id);
        frame.put_u16(MODBUS_PROTOCOL_ID);
        frame.put_u16((1 + pdu.len()) as u16);
        frame.put_u8(request.slave_id);
        frame.put_slice(pdu.as_slice());
        Ok(frame)
    }

    /// Decode a complete MBAP frame into its transaction id and response
    pub fn decode_frame(frame: &[u8]) -> ModbusResult<(u16, ModbusResponse)> {
        if frame.len() < MBAP_HEADER_LEN + 2 {
            return Err(ModbusError::frame("Frame too short"));
        }

        let mut header = &frame[..MBAP_HEADER_LEN + 1];
        let transaction_id = header.get_u16();
        let protocol_id = header.get_u16();
        let length = header.get_u16() as usize;
        let slave_id = header.get_u8();

        if protocol_id != MODBUS_PROTOCOL_ID {
            return Err(ModbusError::frame(format!(
                "Unexpected protocol id {}",
                protocol_id
            )));
        }
        if length < 2 || length > MAX_MBAP_LENGTH {
            return Err(ModbusError::frame(format!("Invalid MBAP length {}", length)));
        }
        if frame.len() < MBAP_HEADER_LEN + length {
            return Err(ModbusError::frame("Incomplete frame"));
        }

        let pdu = ModbusPdu::from_slice(&frame[MBAP_HEADER_LEN + 1..MBAP_HEADER_LEN + length])?;
        let response = ModbusResponse::from_pdu(slave_id, &pdu)?;
        Ok((transaction_id, response))
    }

    /// Drop the socket after an I/O failure
    fn io_failure(&mut self, error: std::io::Error) -> ModbusError {
        self.stats.errors += 1;
        self.stream = None;
        ModbusError::Io(error)
    }

    /// Drop the socket after a send/receive deadline passed
    fn timed_out(&mut self, operation: &str) -> ModbusError {
        self.stats.errors += 1;
        self.stats.timeouts += 1;
        self.stream = None;
        ModbusError::timeout(operation, self.timeout.as_millis() as u64)
    }

    async fn exchange(&mut self, request: &ModbusRequest) -> ModbusResult<ModbusResponse> {
        let transaction_id = self.next_transaction_id();
        let frame = Self::encode_frame(transaction_id, request)?;
        let limit = self.timeout;

        let Some(stream) = self.stream.as_mut() else {
            return Err(ModbusError::connection(format!(
                "Not connected to {}:{}",
                self.host, self.port
            )));
        };

        if self.packet_logging {
            trace!("[MODBUS-TCP] send slave:{} {}", request.slave_id, format_hex_packet(&frame));
        }

        match timeout(limit, stream.write_all(&frame)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(self.io_failure(e)),
            Err(_) => return Err(self.timed_out("send request")),
        }
        self.stats.requests_sent += 1;
        self.stats.bytes_sent += frame.len() as u64;

        // MBAP header plus unit id
        let mut header = [0u8; MBAP_HEADER_LEN + 1];
        match timeout(limit, stream.read_exact(&mut header)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => return Err(self.io_failure(e)),
            Err(_) => return Err(self.timed_out("read response header")),
        }

        let length = u16::from_be_bytes([header[4], header[5]]) as usize;
        if length < 2 || length > MAX_MBAP_LENGTH {
            self.stats.errors += 1;
            self.stream = None;
            return Err(ModbusError::frame(format!("Invalid MBAP length {}", length)));
        }

        let mut response_buf = vec![0u8; MBAP_HEADER_LEN + length];
        response_buf[..header.len()].copy_from_slice(&header);
        match timeout(limit, stream.read_exact(&mut response_buf[header.len()..])).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => return Err(self.io_failure(e)),
            Err(_) => return Err(self.timed_out("read response data")),
        }

        self.stats.responses_received += 1;
        self.stats.bytes_received += response_buf.len() as u64;

        if self.packet_logging {
            trace!(
                "[MODBUS-TCP] receive slave:{} {}",
                request.slave_id,
                format_hex_packet(&response_buf)
            );
        }

        let (received_id, response) = Self::decode_frame(&response_buf)?;
        if received_id != transaction_id {
            // Stream is out of step with our requests; it cannot be trusted.
            self.stats.errors += 1;
            self.stream = None;
            return Err(ModbusError::frame(format!(
                "Transaction id mismatch: sent {}, received {}",
                transaction_id, received_id
            )));
        }
        if response.function != request.function {
            self.stats.errors += 1;
            return Err(ModbusError::protocol(format!(
                "Function mismatch: expected {:02X}, got {:02X}",
                request.function.to_u8(),
                response.function.to_u8()
            )));
        }
        if let Some(error) = response.get_exception() {
            self.stats.errors += 1;
            return Err(error);
        }

        Ok(response)
    }
}

impl ModbusTransport for TcpTransport {
    async fn request(&mut self, request: &ModbusRequest) -> ModbusResult<ModbusResponse> {
        request.validate()?;
        self.exchange(request).await
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    async fn reconnect(&mut self) -> ModbusResult<()> {
        self.close().await?;
        self.stats.reconnects += 1;
        let stream = Self::open_stream(&self.host, self.port, self.timeout).await?;
        self.stream = Some(stream);
        Ok(())
    }

    async fn close(&mut self) -> ModbusResult<()> {
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.shutdown().await;
        }
        Ok(())
    }

    fn get_stats(&self) -> TransportStats {
        self.stats.clone()
    }
}
