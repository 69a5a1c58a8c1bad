//! Loopback Modbus TCP server standing in for a WT16 controller.

#![allow(dead_code)]

use std::collections::HashMap;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use bytes::{BufMut, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{oneshot, Mutex};
use wt16_modbus::bytes::text_to_regs;
use wt16_modbus::{
    u32_to_regs, ByteOrder, HeatPumpConfig, RegisterClass, RetryPolicy, REGISTER_MAP,
};

/// Register contents of the simulated controller
#[derive(Debug, Clone, Default)]
pub struct MockServerData {
    pub discrete_inputs: HashMap<u16, bool>,
    pub input_registers: HashMap<u16, u16>,
    pub holding_registers: HashMap<u16, u16>,
    /// Answer FC06 with a server device failure
    pub reject_writes: bool,
    pub requests: u32,
}

impl MockServerData {
    /// Every register of the map populated with plausible values
    pub fn wt16() -> Self {
        let mut data = Self::default();
        for spec in REGISTER_MAP {
            match spec.class {
                RegisterClass::Discrete => {
                    data.discrete_inputs.insert(spec.address, spec.address == 679);
                }
                RegisterClass::Input => {
                    data.input_registers.insert(spec.address, 200);
                }
                RegisterClass::Holding => {
                    data.holding_registers.insert(spec.address, 450);
                }
                RegisterClass::Wide => {
                    let [first, second] = u32_to_regs(100_000, ByteOrder::BigEndianSwap);
                    data.input_registers.insert(spec.address, first);
                    data.input_registers.insert(spec.address + 1, second);
                }
                RegisterClass::Text => data.set_text(spec.address, ""),
            }
        }
        data.input_registers.insert(15, (-35i16) as u16);
        data.input_registers.insert(12, 214);
        data
    }

    pub fn set_text(&mut self, address: u16, text: &str) {
        for (offset, reg) in text_to_regs(text, 16).into_iter().enumerate() {
            self.input_registers.insert(address + offset as u16, reg);
        }
    }
}

pub struct MockServer {
    port: u16,
    data: Arc<Mutex<MockServerData>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockServer {
    pub async fn start(data: MockServerData) -> io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let port = listener.local_addr()?.port();
        let data = Arc::new(Mutex::new(data));
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        tokio::spawn(run_server(listener, data.clone(), shutdown_rx));

        Ok(Self {
            port,
            data,
            shutdown_tx: Some(shutdown_tx),
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn data(&self) -> tokio::sync::MutexGuard<'_, MockServerData> {
        self.data.lock().await
    }

    /// Configuration pointing at this server with a short retry pause
    pub fn config(&self) -> HeatPumpConfig {
        HeatPumpConfig::new("127.0.0.1")
            .with_port(self.port)
            .with_retry(RetryPolicy::new(2, Duration::from_millis(1)))
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

/// A port with nothing listening on it
pub fn closed_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

async fn run_server(
    listener: TcpListener,
    data: Arc<Mutex<MockServerData>>,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    loop {
        tokio::select! {
            result = listener.accept() => {
                if let Ok((stream, _)) = result {
                    tokio::spawn(handle_client(stream, data.clone()));
                }
            }
            _ = &mut shutdown_rx => break,
        }
    }
}

async fn handle_client(mut stream: TcpStream, data: Arc<Mutex<MockServerData>>) -> io::Result<()> {
    loop {
        let mut header = [0u8; 7];
        if stream.read_exact(&mut header).await.is_err() {
            return Ok(());
        }
        let length = u16::from_be_bytes([header[4], header[5]]) as usize;
        if length < 2 {
            return Ok(());
        }
        let mut pdu = vec![0u8; length - 1];
        stream.read_exact(&mut pdu).await?;

        let response = process_request(&pdu, &mut *data.lock().await);

        let mut frame = BytesMut::with_capacity(7 + response.len());
        frame.put_slice(&header[..4]);
        frame.put_u16(response.len() as u16 + 1);
        frame.put_u8(header[6]);
        frame.put_slice(&response);
        stream.write_all(&frame).await?;
    }
}

fn exception(function: u8, code: u8) -> Vec<u8> {
    vec![function | 0x80, code]
}

fn process_request(pdu: &[u8], data: &mut MockServerData) -> Vec<u8> {
    data.requests += 1;
    if pdu.len() < 5 {
        return exception(pdu.first().copied().unwrap_or(0), 0x03);
    }
    let function = pdu[0];
    let address = u16::from_be_bytes([pdu[1], pdu[2]]);
    let operand = u16::from_be_bytes([pdu[3], pdu[4]]);

    match function {
        0x02 => {
            let bits: Option<Vec<bool>> = (address..address + operand)
                .map(|a| data.discrete_inputs.get(&a).copied())
                .collect();
            let Some(bits) = bits else {
                return exception(function, 0x02);
            };
            let mut packed = vec![0u8; bits.len().div_ceil(8)];
            for (i, bit) in bits.iter().enumerate() {
                if *bit {
                    packed[i / 8] |= 1 << (i % 8);
                }
            }
            let mut response = vec![function, packed.len() as u8];
            response.extend(packed);
            response
        }
        0x03 | 0x04 => {
            let map = if function == 0x03 {
                &data.holding_registers
            } else {
                &data.input_registers
            };
            let words: Option<Vec<u16>> = (address..address + operand)
                .map(|a| map.get(&a).copied())
                .collect();
            let Some(words) = words else {
                return exception(function, 0x02);
            };
            let mut response = vec![function, (words.len() * 2) as u8];
            for word in words {
                response.extend(word.to_be_bytes());
            }
            response
        }
        0x06 => {
            if data.reject_writes {
                return exception(function, 0x04);
            }
            data.holding_registers.insert(address, operand);
            pdu[..5].to_vec()
        }
        _ => exception(function, 0x01),
    }
}
