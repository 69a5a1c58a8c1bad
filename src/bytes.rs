//! # Word Order Handling
//!
//! The WT16 exposes its run-time counters as 32-bit values spread over two
//! consecutive input registers. Which register carries the high word is a
//! property of the firmware, so the order is configurable.
//!
//! ## Naming Convention
//!
//! Uses ABCD notation where A is the most significant byte and D the least.
//! For the 32-bit value `0x12345678`:
//!
//! - `BigEndian (ABCD)`: registers \[0x1234, 0x5678\]
//! - `BigEndianSwap (CDAB)`: registers \[0x5678, 0x1234\] (WT16 default)
//! - `LittleEndian (DCBA)`: registers \[0x7856, 0x3412\]
//! - `LittleEndianSwap (BADC)`: registers \[0x3412, 0x7856\]

use std::fmt;
use std::str::FromStr;

/// Byte/word order of a two-register value.
///
/// # Example
///
/// ```rust
/// use wt16_modbus::ByteOrder;
///
/// let order: ByteOrder = "CDAB".parse().unwrap();
/// assert_eq!(order, ByteOrder::BigEndianSwap);
/// assert!(order.has_word_swap());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ByteOrder {
    /// ABCD: first register is the high word
    BigEndian,

    /// DCBA: fully reversed
    LittleEndian,

    /// CDAB: first register is the low word, bytes within a word big-endian
    BigEndianSwap,

    /// BADC: high word first, bytes within each word swapped
    LittleEndianSwap,
}

impl ByteOrder {
    /// Parse the common spellings of a byte order.
    ///
    /// - "ABCD", "BE", "BIG_ENDIAN", "HIGH_FIRST" → BigEndian
    /// - "DCBA", "LE", "LITTLE_ENDIAN" → LittleEndian
    /// - "CDAB", "BIG_ENDIAN_SWAP", "LOW_FIRST" → BigEndianSwap
    /// - "BADC", "LITTLE_ENDIAN_SWAP" → LittleEndianSwap
    pub fn from_name(s: &str) -> Option<Self> {
        // Normalize in single pass: uppercase + remove hyphens/underscores
        let normalized: String = s
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .map(|c| c.to_ascii_uppercase())
            .collect();
        match normalized.as_str() {
            "ABCD" | "BE" | "BIGENDIAN" | "HIGHFIRST" => Some(Self::BigEndian),
            "DCBA" | "LE" | "LITTLEENDIAN" => Some(Self::LittleEndian),
            "CDAB" | "BIGENDIANSWAP" | "LOWFIRST" => Some(Self::BigEndianSwap),
            "BADC" | "LITTLEENDIANSWAP" => Some(Self::LittleEndianSwap),
            _ => None,
        }
    }

    /// Get descriptive name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BigEndian => "ABCD (Big-Endian)",
            Self::LittleEndian => "DCBA (Little-Endian)",
            Self::BigEndianSwap => "CDAB (Big-Endian Swap)",
            Self::LittleEndianSwap => "BADC (Little-Endian Swap)",
        }
    }

    /// Check if words are swapped (low word in the first register).
    #[inline]
    pub fn has_word_swap(&self) -> bool {
        matches!(self, Self::BigEndianSwap | Self::LittleEndian)
    }
}

impl fmt::Display for ByteOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ByteOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| format!("unknown byte order '{}'", s))
    }
}

impl Default for ByteOrder {
    /// The WT16 transmits the low word first.
    fn default() -> Self {
        Self::BigEndianSwap
    }
}

// ============================================================================
// Register Conversions
// ============================================================================

/// Convert 2 u16 registers to 4 bytes (most significant first).
///
/// # Example
///
/// ```rust
/// use wt16_modbus::{ByteOrder, regs_to_bytes_4};
///
/// let regs = [0x1234, 0x5678];
/// assert_eq!(regs_to_bytes_4(&regs, ByteOrder::BigEndian), [0x12, 0x34, 0x56, 0x78]);
/// assert_eq!(regs_to_bytes_4(&regs, ByteOrder::BigEndianSwap), [0x56, 0x78, 0x12, 0x34]);
/// ```
#[inline]
pub fn regs_to_bytes_4(regs: &[u16; 2], order: ByteOrder) -> [u8; 4] {
    let [h0, h1] = [regs[0].to_be_bytes(), regs[1].to_be_bytes()];

    match order {
        ByteOrder::BigEndian => [h0[0], h0[1], h1[0], h1[1]],        // ABCD
        ByteOrder::LittleEndian => [h1[1], h1[0], h0[1], h0[0]],     // DCBA
        ByteOrder::BigEndianSwap => [h1[0], h1[1], h0[0], h0[1]],    // CDAB
        ByteOrder::LittleEndianSwap => [h0[1], h0[0], h1[1], h1[0]], // BADC
    }
}

/// Convert 2 u16 registers to u32.
#[inline]
pub fn regs_to_u32(regs: &[u16; 2], order: ByteOrder) -> u32 {
    u32::from_be_bytes(regs_to_bytes_4(regs, order))
}

/// Convert u32 to 2 u16 registers with specified byte order.
#[inline]
pub fn u32_to_regs(value: u32, order: ByteOrder) -> [u16; 2] {
    let b = value.to_be_bytes();
    match order {
        ByteOrder::BigEndian => [
            u16::from_be_bytes([b[0], b[1]]),
            u16::from_be_bytes([b[2], b[3]]),
        ],
        ByteOrder::LittleEndian => [
            u16::from_be_bytes([b[3], b[2]]),
            u16::from_be_bytes([b[1], b[0]]),
        ],
        ByteOrder::BigEndianSwap => [
            u16::from_be_bytes([b[2], b[3]]),
            u16::from_be_bytes([b[0], b[1]]),
        ],
        ByteOrder::LittleEndianSwap => [
            u16::from_be_bytes([b[1], b[0]]),
            u16::from_be_bytes([b[3], b[2]]),
        ],
    }
}

/// Flatten registers into bytes, high byte of each register first.
#[inline]
pub fn regs_to_be_bytes(regs: &[u16]) -> Vec<u8> {
    regs.iter().flat_map(|reg| reg.to_be_bytes()).collect()
}

/// Pack ASCII/UTF-8 text into registers, two bytes per register, NUL padded.
///
/// Inverse of [`regs_to_be_bytes`]; used to stage controller messages in
/// simulated devices. Text that does not fit into `register_count * 2`
/// bytes is cut after the last whole character that does, so the block
/// always holds valid UTF-8.
pub fn text_to_regs(text: &str, register_count: usize) -> Vec<u16> {
    let capacity = register_count * 2;
    let mut end = text.len().min(capacity);
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    let mut bytes = text.as_bytes()[..end].to_vec();
    bytes.resize(capacity, 0);
    bytes
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_name() {
        assert_eq!(ByteOrder::from_name("ABCD"), Some(ByteOrder::BigEndian));
        assert_eq!(ByteOrder::from_name("high-first"), Some(ByteOrder::BigEndian));
        assert_eq!(ByteOrder::from_name("cdab"), Some(ByteOrder::BigEndianSwap));
        assert_eq!(ByteOrder::from_name("LOW_FIRST"), Some(ByteOrder::BigEndianSwap));
        assert_eq!(ByteOrder::from_name("DCBA"), Some(ByteOrder::LittleEndian));
        assert_eq!(
            ByteOrder::from_name("BADC"),
            Some(ByteOrder::LittleEndianSwap)
        );
        assert_eq!(ByteOrder::from_name("invalid"), None);
        assert!("".parse::<ByteOrder>().is_err());
    }

    #[test]
    fn test_default_is_low_word_first() {
        assert_eq!(ByteOrder::default(), ByteOrder::BigEndianSwap);
        assert!(ByteOrder::default().has_word_swap());
    }

    #[test]
    fn test_regs_to_u32() {
        assert_eq!(regs_to_u32(&[0, 1], ByteOrder::BigEndianSwap), 65536);
        assert_eq!(regs_to_u32(&[1, 0], ByteOrder::BigEndian), 65536);
        assert_eq!(regs_to_u32(&[0x1234, 0x5678], ByteOrder::LittleEndian), 0x78563412);
        assert_eq!(
            regs_to_u32(&[0x1234, 0x5678], ByteOrder::LittleEndianSwap),
            0x34127856
        );
    }

    #[test]
    fn test_u32_to_regs_inverts_regs_to_u32() {
        for order in [
            ByteOrder::BigEndian,
            ByteOrder::LittleEndian,
            ByteOrder::BigEndianSwap,
            ByteOrder::LittleEndianSwap,
        ] {
            let regs = u32_to_regs(0x12345678, order);
            assert_eq!(regs_to_u32(&regs, order), 0x12345678, "{:?}", order);
        }
    }

    #[test]
    fn test_text_registers() {
        let regs = text_to_regs("E12", 4);
        assert_eq!(regs, vec![0x4531, 0x3200, 0x0000, 0x0000]);
        assert_eq!(&regs_to_be_bytes(&regs)[..3], b"E12");
    }

    #[test]
    fn test_long_text_is_cut_at_char_boundary() {
        assert_eq!(text_to_regs("abcdef", 2), vec![0x6162, 0x6364]);
        // 'ö' is two bytes and only one would fit after "S"
        assert_eq!(text_to_regs("Störung", 1), vec![0x5300]);
        assert_eq!(text_to_regs("Störung", 2), vec![0x5374, 0xC3B6]);

        let regs = text_to_regs("Hochdruckstörung Verdichter WPü", 16);
        assert_eq!(regs.len(), 16);
        let bytes = regs_to_be_bytes(&regs);
        let text = std::str::from_utf8(&bytes).unwrap().trim_end_matches('\0');
        assert_eq!(text, "Hochdruckstörung Verdichter WP");
    }
}
