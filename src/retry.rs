//! Per-register retry
//!
//! Every register read gets a fixed budget of attempts. A connection-class
//! failure closes and reopens the session before the next attempt; any other
//! failure simply repeats the read after a short pause.

use std::time::Duration;

use tracing::{debug, warn};

use crate::client::ModbusClient;
use crate::error::{ModbusError, ModbusResult};
use crate::protocol::{ModbusFunction, SlaveId};
use crate::registers::RegisterSpec;

/// Retry budget for a single register read or write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts after the first one
    pub retries: u32,
    /// Pause before each retry
    pub pause: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 2,
            pause: Duration::from_millis(100),
        }
    }
}

impl RetryPolicy {
    pub fn new(retries: u32, pause: Duration) -> Self {
        Self { retries, pause }
    }

    /// Total attempts, first one included
    pub fn attempts(&self) -> u32 {
        self.retries + 1
    }

    /// Get ready for the attempt after `attempt` (0-based) failed with `error`.
    ///
    /// Returns `false` once the budget is spent. Connection-class errors close
    /// and reopen the session; a failed reopen is left for the next attempt
    /// to surface.
    pub async fn prepare_retry<C: ModbusClient>(
        &self,
        client: &mut C,
        attempt: u32,
        error: &ModbusError,
    ) -> bool {
        if attempt >= self.retries {
            return false;
        }

        if error.is_connection_error() {
            let _ = client.close().await;
            tokio::time::sleep(self.pause).await;
            if let Err(e) = client.reconnect().await {
                debug!("Reconnect before attempt {} failed: {}", attempt + 2, e);
            }
        } else {
            tokio::time::sleep(self.pause).await;
        }
        true
    }
}

/// Raw result of one successful read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawPayload {
    Bits(Vec<bool>),
    Words(Vec<u16>),
}

impl RawPayload {
    pub fn len(&self) -> usize {
        match self {
            RawPayload::Bits(bits) => bits.len(),
            RawPayload::Words(words) => words.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

async fn read_once<C: ModbusClient>(
    client: &mut C,
    unit_id: SlaveId,
    spec: &RegisterSpec,
) -> ModbusResult<RawPayload> {
    match spec.function() {
        ModbusFunction::ReadDiscreteInputs => client
            .read_02(unit_id, spec.address, spec.count())
            .await
            .map(RawPayload::Bits),
        ModbusFunction::ReadHoldingRegisters => client
            .read_03(unit_id, spec.address, spec.count())
            .await
            .map(RawPayload::Words),
        ModbusFunction::ReadInputRegisters => client
            .read_04(unit_id, spec.address, spec.count())
            .await
            .map(RawPayload::Words),
        other => Err(ModbusError::invalid_function(other.to_u8())),
    }
}

/// Read one register entry within the retry budget.
///
/// Returns `None` when every attempt failed; the caller skips the key for
/// this cycle.
pub async fn read_with_retry<C: ModbusClient>(
    client: &mut C,
    unit_id: SlaveId,
    spec: &RegisterSpec,
    policy: &RetryPolicy,
) -> Option<RawPayload> {
    let mut attempt = 0;
    loop {
        match read_once(client, unit_id, spec).await {
            Ok(payload) => return Some(payload),
            Err(e) => {
                debug!(
                    "Register {} ({}) read attempt {} failed: {}",
                    spec.address,
                    spec.class.as_str(),
                    attempt + 1,
                    e
                );
                if !policy.prepare_retry(client, attempt, &e).await {
                    warn!(
                        "Failed to read register {} after {} attempts: {}",
                        spec.address,
                        policy.attempts(),
                        e
                    );
                    return None;
                }
                attempt += 1;
            }
        }
    }
}
