//! # Register Decoding
//!
//! Pure conversions from raw register payloads into [`SnapshotValue`]s.
//! No I/O happens here.
//!
//! ## Decoding Rules
//!
//! | Class | Registers | Result |
//! |-------|-----------|--------|
//! | discrete | 1 bit | `Bool` |
//! | input/holding | 1 | `Float` (scaled) or `Integer` (scale 1) |
//! | wide | 2 | `Integer`, words combined per [`ByteOrder`], not scaled |
//! | text | 16 | `Text`, two bytes per register, high byte first |
//!
//! Signed registers use the 16-bit two's-complement reading: raw values
//! above 32767 are shifted down by 65536 before scaling.

use crate::bytes::{regs_to_be_bytes, regs_to_u32, ByteOrder};
use crate::error::{ModbusError, ModbusResult};
use crate::registers::{RegisterClass, RegisterSpec};
use crate::retry::RawPayload;
use crate::value::SnapshotValue;

/// Shown when the fault message block is empty.
pub const NO_ACTIVE_FAULT: &str = "Keine Fehlermeldung";

/// Shown when the fault message block could not be interpreted.
pub const READ_ERROR: &str = "Fehler beim Lesen";

/// Number of registers in the fault message block.
pub const TEXT_REGISTER_COUNT: usize = 16;

/// Fixed-point scale of a register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scale {
    One,
    /// Tenths, e.g. 0.1 °C
    Tenth,
    /// Hundredths, e.g. 0.01 bar
    Hundredth,
}

impl Scale {
    #[inline]
    pub fn divisor(self) -> u16 {
        match self {
            Scale::One => 1,
            Scale::Tenth => 10,
            Scale::Hundredth => 100,
        }
    }

    /// Multiplier as a float (1, 0.1, 0.01)
    #[inline]
    pub fn factor(self) -> f64 {
        1.0 / f64::from(self.divisor())
    }
}

/// Interpret a register as signed 16-bit.
#[inline]
pub fn signed_word(raw: u16) -> i32 {
    if raw > 32767 {
        i32::from(raw) - 65536
    } else {
        i32::from(raw)
    }
}

/// Physical value of a single register.
///
/// Division by the scale's divisor keeps tenths exact where a
/// multiplication by 0.1 would not.
#[inline]
pub fn scaled_value(raw: u16, scale: Scale, signed: bool) -> f64 {
    let value = if signed { signed_word(raw) } else { i32::from(raw) };
    f64::from(value) / f64::from(scale.divisor())
}

/// Decode a single scaled register.
///
/// Unscaled registers come back as `Integer`, everything else as `Float`.
pub fn decode_scaled(raw: u16, scale: Scale, signed: bool) -> SnapshotValue {
    match scale {
        Scale::One if signed => SnapshotValue::Integer(i64::from(signed_word(raw))),
        Scale::One => SnapshotValue::Integer(i64::from(raw)),
        _ => SnapshotValue::Float(scaled_value(raw, scale, signed)),
    }
}

/// Combine two registers into an unsigned 32-bit counter.
pub fn decode_wide(registers: &[u16], order: ByteOrder) -> ModbusResult<u32> {
    match registers {
        [first, second, ..] => Ok(regs_to_u32(&[*first, *second], order)),
        _ => Err(ModbusError::invalid_data(format!(
            "Wide value needs 2 registers, got {}",
            registers.len()
        ))),
    }
}

/// Decode the controller's fault message block.
///
/// Invalid UTF-8 sequences are dropped and trailing NULs trimmed. An empty
/// message yields [`NO_ACTIVE_FAULT`]; a short block yields [`READ_ERROR`].
pub fn decode_text(registers: &[u16]) -> String {
    if registers.len() < TEXT_REGISTER_COUNT {
        return READ_ERROR.to_string();
    }

    let bytes = regs_to_be_bytes(&registers[..TEXT_REGISTER_COUNT]);
    let mut text = String::with_capacity(bytes.len());
    for chunk in bytes.utf8_chunks() {
        text.push_str(chunk.valid());
    }

    let trimmed = text.trim_end_matches('\0');
    if trimmed.is_empty() {
        NO_ACTIVE_FAULT.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Decode a raw payload according to its register definition.
///
/// The text block never fails: malformed payloads degrade to
/// [`READ_ERROR`]. All other classes fail on a payload of the wrong shape.
pub fn decode_entry(
    spec: &RegisterSpec,
    payload: &RawPayload,
    order: ByteOrder,
) -> ModbusResult<SnapshotValue> {
    match (spec.class, payload) {
        (RegisterClass::Discrete, RawPayload::Bits(bits)) => bits
            .first()
            .map(|bit| SnapshotValue::Bool(*bit))
            .ok_or_else(|| ModbusError::invalid_data(format!("No bit for {}", spec.key))),

        (RegisterClass::Input | RegisterClass::Holding, RawPayload::Words(words)) => words
            .first()
            .map(|raw| decode_scaled(*raw, spec.scale, spec.signed))
            .ok_or_else(|| ModbusError::invalid_data(format!("No register for {}", spec.key))),

        (RegisterClass::Wide, RawPayload::Words(words)) => {
            decode_wide(words, order).map(SnapshotValue::from)
        }

        (RegisterClass::Text, RawPayload::Words(words)) => {
            Ok(SnapshotValue::Text(decode_text(words)))
        }
        (RegisterClass::Text, RawPayload::Bits(_)) => {
            Ok(SnapshotValue::Text(READ_ERROR.to_string()))
        }

        (class, _) => Err(ModbusError::invalid_data(format!(
            "Payload shape does not match {:?} register {}",
            class, spec.key
        ))),
    }
}
