//! Modbus request/response model
//!
//! Every transport call produces an explicit [`ModbusResponse`]; exception
//! responses are turned into [`ModbusError::Exception`] by
//! [`ModbusResponse::get_exception`] rather than inspected by shape.

use crate::constants::{
    EXCEPTION_FLAG, FC_READ_DISCRETE_INPUTS, FC_READ_HOLDING_REGISTERS, FC_READ_INPUT_REGISTERS,
    FC_WRITE_SINGLE_REGISTER, MAX_READ_DISCRETE_INPUTS, MAX_READ_REGISTERS,
};
use crate::error::{ModbusError, ModbusResult};
use crate::pdu::{ModbusPdu, PduBuilder};

/// Modbus unit identifier
pub type SlaveId = u8;

/// Function codes used against the heat pump
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModbusFunction {
    ReadDiscreteInputs,
    ReadHoldingRegisters,
    ReadInputRegisters,
    WriteSingleRegister,
}

impl ModbusFunction {
    pub fn to_u8(self) -> u8 {
        match self {
            Self::ReadDiscreteInputs => FC_READ_DISCRETE_INPUTS,
            Self::ReadHoldingRegisters => FC_READ_HOLDING_REGISTERS,
            Self::ReadInputRegisters => FC_READ_INPUT_REGISTERS,
            Self::WriteSingleRegister => FC_WRITE_SINGLE_REGISTER,
        }
    }

    pub fn from_u8(code: u8) -> ModbusResult<Self> {
        match code {
            FC_READ_DISCRETE_INPUTS => Ok(Self::ReadDiscreteInputs),
            FC_READ_HOLDING_REGISTERS => Ok(Self::ReadHoldingRegisters),
            FC_READ_INPUT_REGISTERS => Ok(Self::ReadInputRegisters),
            FC_WRITE_SINGLE_REGISTER => Ok(Self::WriteSingleRegister),
            other => Err(ModbusError::invalid_function(other)),
        }
    }

    pub fn is_read(self) -> bool {
        !matches!(self, Self::WriteSingleRegister)
    }
}

/// A single request to the device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModbusRequest {
    pub slave_id: SlaveId,
    pub function: ModbusFunction,
    pub address: u16,
    /// Quantity for reads; always 1 for single-register writes
    pub quantity: u16,
    /// Big-endian register value for writes, empty for reads
    pub data: Vec<u8>,
}

impl ModbusRequest {
    pub fn new_read(
        slave_id: SlaveId,
        function: ModbusFunction,
        address: u16,
        quantity: u16,
    ) -> Self {
        Self {
            slave_id,
            function,
            address,
            quantity,
            data: Vec::new(),
        }
    }

    pub fn new_write_single(slave_id: SlaveId, address: u16, value: u16) -> Self {
        Self {
            slave_id,
            function: ModbusFunction::WriteSingleRegister,
            address,
            quantity: 1,
            data: value.to_be_bytes().to_vec(),
        }
    }

    /// Check quantities against protocol limits before anything is sent.
    pub fn validate(&self) -> ModbusResult<()> {
        let max = match self.function {
            ModbusFunction::ReadDiscreteInputs => MAX_READ_DISCRETE_INPUTS,
            ModbusFunction::ReadHoldingRegisters | ModbusFunction::ReadInputRegisters => {
                MAX_READ_REGISTERS
            }
            ModbusFunction::WriteSingleRegister => {
                if self.data.len() != 2 {
                    return Err(ModbusError::invalid_data(format!(
                        "Single register write needs 2 data bytes, got {}",
                        self.data.len()
                    )));
                }
                return Ok(());
            }
        };
        if self.quantity == 0 || self.quantity > max {
            return Err(ModbusError::invalid_data(format!(
                "Invalid quantity {} (1-{})",
                self.quantity, max
            )));
        }
        Ok(())
    }

    /// Encode the request body as a PDU
    pub fn to_pdu(&self) -> ModbusResult<ModbusPdu> {
        match self.function {
            ModbusFunction::WriteSingleRegister => {
                let value = u16::from_be_bytes([self.data[0], self.data[1]]);
                PduBuilder::build_write_single_register(self.address, value)
            }
            read => PduBuilder::build_read_request(read.to_u8(), self.address, self.quantity),
        }
    }

    /// Value carried by a single-register write
    pub fn write_value(&self) -> Option<u16> {
        match (self.function, self.data.as_slice()) {
            (ModbusFunction::WriteSingleRegister, [hi, lo]) => Some(u16::from_be_bytes([*hi, *lo])),
            _ => None,
        }
    }
}

/// A decoded device response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModbusResponse {
    pub slave_id: SlaveId,
    pub function: ModbusFunction,
    data: Vec<u8>,
    exception: Option<u8>,
}

impl ModbusResponse {
    pub fn new_success(slave_id: SlaveId, function: ModbusFunction, data: Vec<u8>) -> Self {
        Self {
            slave_id,
            function,
            data,
            exception: None,
        }
    }

    pub fn new_exception(slave_id: SlaveId, function: ModbusFunction, code: u8) -> Self {
        Self {
            slave_id,
            function,
            data: Vec::new(),
            exception: Some(code),
        }
    }

    /// Build a response from a received PDU
    pub fn from_pdu(slave_id: SlaveId, pdu: &ModbusPdu) -> ModbusResult<Self> {
        let fc = pdu
            .function_code()
            .ok_or_else(|| ModbusError::frame("Empty response PDU"))?;

        if fc & EXCEPTION_FLAG != 0 {
            let code = pdu
                .exception_code()
                .ok_or_else(|| ModbusError::frame("Invalid exception response"))?;
            let function = ModbusFunction::from_u8(fc & !EXCEPTION_FLAG)?;
            return Ok(Self::new_exception(slave_id, function, code));
        }

        let function = ModbusFunction::from_u8(fc)?;
        Ok(Self::new_success(slave_id, function, pdu.body().to_vec()))
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn is_exception(&self) -> bool {
        self.exception.is_some()
    }

    pub fn get_exception(&self) -> Option<ModbusError> {
        self.exception
            .map(|code| ModbusError::exception(self.function.to_u8(), code))
    }

    /// Byte count prefix followed by the payload, validated
    fn counted_payload(&self) -> ModbusResult<&[u8]> {
        let (count, payload) = self
            .data
            .split_first()
            .ok_or_else(|| ModbusError::protocol("Missing byte count"))?;
        let count = usize::from(*count);
        if payload.len() < count {
            return Err(ModbusError::protocol(format!(
                "Byte count {} exceeds payload of {} bytes",
                count,
                payload.len()
            )));
        }
        Ok(&payload[..count])
    }

    /// Unpack FC02 bits, LSB first within each byte
    pub fn parse_bits(&self) -> ModbusResult<Vec<bool>> {
        let payload = self.counted_payload()?;
        Ok(payload
            .iter()
            .flat_map(|byte| (0..8).map(move |bit| byte & (1 << bit) != 0))
            .collect())
    }

    /// Unpack FC03/FC04 big-endian registers
    pub fn parse_registers(&self) -> ModbusResult<Vec<u16>> {
        let payload = self.counted_payload()?;
        if payload.len() % 2 != 0 {
            return Err(ModbusError::protocol(format!(
                "Odd register byte count: {}",
                payload.len()
            )));
        }
        Ok(payload
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect())
    }

    /// Verify that an FC06 response echoes the written address and value
    pub fn verify_write_echo(&self, address: u16, value: u16) -> ModbusResult<()> {
        let expected = [address.to_be_bytes(), value.to_be_bytes()].concat();
        if self.data != expected {
            return Err(ModbusError::protocol(format!(
                "Write echo mismatch: expected {:02X?}, got {:02X?}",
                expected, self.data
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_function_code_roundtrip() {
        for function in [
            ModbusFunction::ReadDiscreteInputs,
            ModbusFunction::ReadHoldingRegisters,
            ModbusFunction::ReadInputRegisters,
            ModbusFunction::WriteSingleRegister,
        ] {
            assert_eq!(ModbusFunction::from_u8(function.to_u8()).unwrap(), function);
        }
        assert!(ModbusFunction::from_u8(0x01).is_err());
    }

    #[test]
    fn test_validate_quantities() {
        let ok = ModbusRequest::new_read(1, ModbusFunction::ReadInputRegisters, 63000, 16);
        assert!(ok.validate().is_ok());

        let zero = ModbusRequest::new_read(1, ModbusFunction::ReadInputRegisters, 12, 0);
        assert!(zero.validate().is_err());

        let too_many = ModbusRequest::new_read(1, ModbusFunction::ReadHoldingRegisters, 0, 126);
        assert!(too_many.validate().is_err());

        let write = ModbusRequest::new_write_single(1, 723, 215);
        assert!(write.validate().is_ok());
        assert_eq!(write.write_value(), Some(215));
    }

    #[test]
    fn test_parse_bits() {
        let response =
            ModbusResponse::new_success(1, ModbusFunction::ReadDiscreteInputs, vec![1, 0b0000_0101]);
        let bits = response.parse_bits().unwrap();
        assert_eq!(bits.len(), 8);
        assert!(bits[0]);
        assert!(!bits[1]);
        assert!(bits[2]);
    }

    #[test]
    fn test_parse_registers() {
        let response = ModbusResponse::new_success(
            1,
            ModbusFunction::ReadInputRegisters,
            vec![4, 0x00, 0xD7, 0xFF, 0x9C],
        );
        assert_eq!(response.parse_registers().unwrap(), vec![215, 0xFF9C]);
    }

    #[test]
    fn test_parse_registers_truncated() {
        let response =
            ModbusResponse::new_success(1, ModbusFunction::ReadInputRegisters, vec![4, 0x00, 0xD7]);
        assert!(matches!(
            response.parse_registers(),
            Err(ModbusError::Protocol { .. })
        ));
    }

    #[test]
    fn test_exception_from_pdu() {
        let pdu = ModbusPdu::from_slice(&[0x84, 0x02]).unwrap();
        let response = ModbusResponse::from_pdu(1, &pdu).unwrap();
        assert!(response.is_exception());
        assert!(matches!(
            response.get_exception(),
            Some(ModbusError::Exception {
                function: 0x04,
                code: 0x02,
                ..
            })
        ));
    }

    #[test]
    fn test_write_echo() {
        let response = ModbusResponse::new_success(
            1,
            ModbusFunction::WriteSingleRegister,
            vec![0x02, 0xD3, 0x00, 0xD7],
        );
        assert!(response.verify_write_echo(723, 215).is_ok());
        assert!(response.verify_write_echo(723, 216).is_err());
    }
}
