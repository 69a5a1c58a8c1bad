//! Modbus PDU data structure
//!
//! Use a fixed-size stack array to avoid heap allocation per request.

use tracing::debug;

use crate::constants::{
    FC_READ_DISCRETE_INPUTS, FC_READ_HOLDING_REGISTERS, FC_READ_INPUT_REGISTERS,
    FC_WRITE_SINGLE_REGISTER, MAX_PDU_SIZE,
};
use crate::error::{ModbusError, ModbusResult};

/// PDU with stack-allocated fixed array
#[derive(Debug, Clone)]
pub struct ModbusPdu {
    /// Fixed-size buffer (stack)
    data: [u8; MAX_PDU_SIZE],
    /// Actual data length
    len: usize,
}

impl ModbusPdu {
    /// Create an empty PDU
    #[inline]
    pub fn new() -> Self {
        Self {
            data: [0; MAX_PDU_SIZE],
            len: 0,
        }
    }

    /// Create a PDU from a byte slice
    pub fn from_slice(data: &[u8]) -> ModbusResult<Self> {
        if data.len() > MAX_PDU_SIZE {
            return Err(ModbusError::Protocol {
                message: format!("PDU too large: {} bytes (max {})", data.len(), MAX_PDU_SIZE),
            });
        }

        let mut pdu = Self::new();
        pdu.data[..data.len()].copy_from_slice(data);
        pdu.len = data.len();

        match pdu.function_code() {
            Some(fc) if pdu.is_exception() => debug!(
                "PDU parsed: FC={:02X} (Exception: {}), exception_code={:02X}",
                fc,
                Self::function_code_description(fc),
                pdu.exception_code().unwrap_or(0)
            ),
            Some(fc) => debug!(
                "PDU parsed: FC={:02X} ({}), data_len={}",
                fc,
                Self::function_code_description(fc),
                pdu.len - 1
            ),
            None => debug!("PDU parsed: empty PDU"),
        }

        Ok(pdu)
    }

    /// Push a single byte
    #[inline]
    pub fn push(&mut self, byte: u8) -> ModbusResult<()> {
        if self.len >= MAX_PDU_SIZE {
            return Err(ModbusError::Protocol {
                message: "PDU buffer full".to_string(),
            });
        }
        self.data[self.len] = byte;
        self.len += 1;
        Ok(())
    }

    /// Push u16 in big-endian
    #[inline]
    pub fn push_u16(&mut self, value: u16) -> ModbusResult<()> {
        for byte in value.to_be_bytes() {
            self.push(byte)?;
        }
        Ok(())
    }

    /// Get immutable data slice
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.len]
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Get function code (first byte)
    #[inline]
    pub fn function_code(&self) -> Option<u8> {
        self.as_slice().first().copied()
    }

    /// Check if exception response
    #[inline]
    pub fn is_exception(&self) -> bool {
        self.function_code()
            .map(|fc| fc & 0x80 != 0)
            .unwrap_or(false)
    }

    /// Get exception code
    #[inline]
    pub fn exception_code(&self) -> Option<u8> {
        if self.is_exception() && self.len > 1 {
            Some(self.data[1])
        } else {
            None
        }
    }

    /// Payload after the function code
    #[inline]
    pub fn body(&self) -> &[u8] {
        self.as_slice().get(1..).unwrap_or(&[])
    }

    /// Get human-readable function code description
    pub fn function_code_description(fc: u8) -> &'static str {
        match fc & 0x7F {
            FC_READ_DISCRETE_INPUTS => "Read Discrete Inputs",
            FC_READ_HOLDING_REGISTERS => "Read Holding Registers",
            FC_READ_INPUT_REGISTERS => "Read Input Registers",
            FC_WRITE_SINGLE_REGISTER => "Write Single Register",
            _ => "Unknown Function",
        }
    }
}

impl Default for ModbusPdu {
    fn default() -> Self {
        Self::new()
    }
}

/// PDU builder - fluent API
pub struct PduBuilder {
    pdu: ModbusPdu,
}

impl Default for PduBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PduBuilder {
    #[inline]
    pub fn new() -> Self {
        Self {
            pdu: ModbusPdu::new(),
        }
    }

    #[inline]
    pub fn function_code(mut self, fc: u8) -> ModbusResult<Self> {
        self.pdu.push(fc)?;
        Ok(self)
    }

    #[inline]
    pub fn address(mut self, addr: u16) -> ModbusResult<Self> {
        self.pdu.push_u16(addr)?;
        Ok(self)
    }

    /// Add a quantity, or the value of a single-register write
    #[inline]
    pub fn word(mut self, value: u16) -> ModbusResult<Self> {
        self.pdu.push_u16(value)?;
        Ok(self)
    }

    #[inline]
    pub fn build(self) -> ModbusPdu {
        if let Some(fc) = self.pdu.function_code() {
            debug!(
                "PDU built: FC={:02X} ({}), total_len={}",
                fc,
                ModbusPdu::function_code_description(fc),
                self.pdu.len()
            );
        }
        self.pdu
    }

    /// Build a read request PDU for FC02-04
    ///
    /// # Arguments
    /// * `fc` - Function code (2, 3, or 4)
    /// * `start_address` - Starting address for the read operation
    /// * `quantity` - Number of inputs (FC02) or registers (FC03/04) to read
    pub fn build_read_request(
        fc: u8,
        start_address: u16,
        quantity: u16,
    ) -> ModbusResult<ModbusPdu> {
        if !matches!(
            fc,
            FC_READ_DISCRETE_INPUTS | FC_READ_HOLDING_REGISTERS | FC_READ_INPUT_REGISTERS
        ) {
            return Err(ModbusError::InvalidFunction { code: fc });
        }
        Ok(PduBuilder::new()
            .function_code(fc)?
            .address(start_address)?
            .word(quantity)?
            .build())
    }

    /// Build a write single register PDU (FC06)
    pub fn build_write_single_register(address: u16, value: u16) -> ModbusResult<ModbusPdu> {
        Ok(PduBuilder::new()
            .function_code(FC_WRITE_SINGLE_REGISTER)?
            .address(address)?
            .word(value)?
            .build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pdu_basic_operations() {
        let mut pdu = ModbusPdu::new();
        assert!(pdu.is_empty());

        pdu.push(0x04).unwrap();
        pdu.push_u16(0xF618).unwrap();
        pdu.push_u16(0x0010).unwrap();

        assert_eq!(pdu.len(), 5);
        assert_eq!(pdu.function_code(), Some(0x04));
        assert!(!pdu.is_exception());
        assert_eq!(pdu.body(), &[0xF6, 0x18, 0x00, 0x10]);
    }

    #[test]
    fn test_exception_response() {
        let pdu = ModbusPdu::from_slice(&[0x84, 0x02]).unwrap();
        assert!(pdu.is_exception());
        assert_eq!(pdu.exception_code(), Some(0x02));
    }

    #[test]
    fn test_oversized_pdu_rejected() {
        let data = vec![0u8; MAX_PDU_SIZE + 1];
        assert!(ModbusPdu::from_slice(&data).is_err());
    }

    #[test]
    fn test_build_read_request() {
        // Error text block: 16 input registers at 63000
        let pdu = PduBuilder::build_read_request(0x04, 63000, 16).unwrap();
        assert_eq!(pdu.as_slice(), &[0x04, 0xF6, 0x18, 0x00, 0x10]);

        let pdu = PduBuilder::build_read_request(0x02, 45, 1).unwrap();
        assert_eq!(pdu.as_slice(), &[0x02, 0x00, 0x2D, 0x00, 0x01]);
    }

    #[test]
    fn test_build_read_request_rejects_write_codes() {
        assert!(matches!(
            PduBuilder::build_read_request(0x06, 0, 1),
            Err(ModbusError::InvalidFunction { code: 0x06 })
        ));
    }

    #[test]
    fn test_build_write_single_register() {
        // Room setpoint 21.5 °C on holding register 723
        let pdu = PduBuilder::build_write_single_register(723, 215).unwrap();
        assert_eq!(pdu.as_slice(), &[0x06, 0x02, 0xD3, 0x00, 0xD7]);
    }
}
