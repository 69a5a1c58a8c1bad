//! In-memory WT16 shared by the unit tests

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::bytes::{text_to_regs, u32_to_regs, ByteOrder};
use crate::client::ModbusClient;
use crate::config::HeatPumpConfig;
use crate::coordinator::{Connector, Coordinator};
use crate::error::{ModbusError, ModbusResult};
use crate::protocol::SlaveId;
use crate::registers::{RegisterClass, REGISTER_MAP};
use crate::retry::RetryPolicy;
use crate::transport::TransportStats;

/// Register contents and behaviour of the simulated controller
#[derive(Default)]
pub struct Device {
    pub reachable: bool,
    pub bits: HashMap<u16, bool>,
    pub input: HashMap<u16, u16>,
    pub holding: HashMap<u16, u16>,
    pub reject_writes: bool,
    /// Delay before answering each read
    pub read_delay: Duration,
    pub writes: Vec<(u16, u16)>,
    pub connects: u32,
}

impl Device {
    /// Every register of the map answers
    pub fn fully_populated() -> Self {
        let mut device = Device {
            reachable: true,
            ..Default::default()
        };
        for spec in REGISTER_MAP {
            match spec.class {
                RegisterClass::Discrete => {
                    device.bits.insert(spec.address, spec.address % 2 == 1);
                }
                RegisterClass::Input => {
                    device.input.insert(spec.address, 215);
                }
                RegisterClass::Holding => {
                    device.holding.insert(spec.address, 480);
                }
                RegisterClass::Wide => {
                    let [first, second] = u32_to_regs(65536, ByteOrder::BigEndianSwap);
                    device.input.insert(spec.address, first);
                    device.input.insert(spec.address + 1, second);
                }
                RegisterClass::Text => {
                    for (i, reg) in text_to_regs("", 16).into_iter().enumerate() {
                        device.input.insert(spec.address + i as u16, reg);
                    }
                }
            }
        }
        device.input.insert(15, 0xFF9C);
        device
    }

    fn words(map: &HashMap<u16, u16>, address: u16, quantity: u16) -> ModbusResult<Vec<u16>> {
        (address..address + quantity)
            .map(|a| map.get(&a).copied().ok_or(ModbusError::exception(0x04, 0x02)))
            .collect()
    }
}

pub type SharedDevice = Arc<Mutex<Device>>;

#[derive(Clone)]
pub struct MockConnector(pub SharedDevice);

pub struct MockClient(SharedDevice);

impl MockClient {
    async fn settle(&self) {
        let delay = self.0.lock().unwrap().read_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

impl Connector for MockConnector {
    type Client = MockClient;

    async fn connect(&self, _: &str, _: u16, timeout: Duration) -> ModbusResult<MockClient> {
        let mut device = self.0.lock().unwrap();
        device.connects += 1;
        if !device.reachable {
            return Err(ModbusError::timeout("connect", timeout.as_millis() as u64));
        }
        Ok(MockClient(self.0.clone()))
    }
}

impl ModbusClient for MockClient {
    async fn read_02(&mut self, _: SlaveId, address: u16, _: u16) -> ModbusResult<Vec<bool>> {
        self.settle().await;
        let device = self.0.lock().unwrap();
        device
            .bits
            .get(&address)
            .map(|bit| vec![*bit])
            .ok_or(ModbusError::exception(0x02, 0x02))
    }

    async fn read_03(&mut self, _: SlaveId, address: u16, qty: u16) -> ModbusResult<Vec<u16>> {
        self.settle().await;
        Device::words(&self.0.lock().unwrap().holding, address, qty)
    }

    async fn read_04(&mut self, _: SlaveId, address: u16, qty: u16) -> ModbusResult<Vec<u16>> {
        self.settle().await;
        Device::words(&self.0.lock().unwrap().input, address, qty)
    }

    async fn write_06(&mut self, _: SlaveId, address: u16, value: u16) -> ModbusResult<()> {
        let mut device = self.0.lock().unwrap();
        if device.reject_writes {
            return Err(ModbusError::exception(0x06, 0x03));
        }
        device.writes.push((address, value));
        device.holding.insert(address, value);
        Ok(())
    }

    async fn reconnect(&mut self) -> ModbusResult<()> {
        Ok(())
    }

    fn is_connected(&self) -> bool {
        true
    }

    async fn close(&mut self) -> ModbusResult<()> {
        Ok(())
    }

    fn get_stats(&self) -> TransportStats {
        TransportStats::default()
    }
}

/// Five minute error timeout, no pause between retries
pub fn config() -> HeatPumpConfig {
    HeatPumpConfig::new("wt16.test")
        .with_error_timeout(Duration::from_secs(300))
        .with_retry(RetryPolicy::new(2, Duration::ZERO))
}

pub fn coordinator_with(
    config: HeatPumpConfig,
    device: Device,
) -> (Coordinator<MockConnector>, SharedDevice) {
    let device = Arc::new(Mutex::new(device));
    let coordinator = Coordinator::with_connector(config, MockConnector(device.clone())).unwrap();
    (coordinator, device)
}
