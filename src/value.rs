//! # Snapshot Value Types
//!
//! Decoded register values as they appear in a published snapshot.

use std::fmt;

/// A decoded register value.
///
/// # Mapping
///
/// | Variant | Produced by |
/// |---------|-------------|
/// | Bool | discrete inputs |
/// | Float | scaled input/holding registers (0.1, 0.01) |
/// | Integer | unscaled registers and 32-bit run-time counters |
/// | Text | the controller's fault message block |
///
/// # Example
///
/// ```rust
/// use wt16_modbus::SnapshotValue;
///
/// let temp = SnapshotValue::Float(21.5);
/// assert_eq!(temp.as_f64(), Some(21.5));
/// assert_eq!(temp.type_name(), "float");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum SnapshotValue {
    Bool(bool),
    Float(f64),
    Integer(i64),
    Text(String),
}

impl SnapshotValue {
    /// Numeric view of the value; `None` for text.
    #[inline]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SnapshotValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            SnapshotValue::Float(v) => Some(*v),
            SnapshotValue::Integer(v) => Some(*v as f64),
            SnapshotValue::Text(_) => None,
        }
    }

    #[inline]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SnapshotValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            SnapshotValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the type name as a string.
    pub fn type_name(&self) -> &'static str {
        match self {
            SnapshotValue::Bool(_) => "bool",
            SnapshotValue::Float(_) => "float",
            SnapshotValue::Integer(_) => "integer",
            SnapshotValue::Text(_) => "text",
        }
    }
}

impl fmt::Display for SnapshotValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnapshotValue::Bool(v) => write!(f, "{}", if *v { "on" } else { "off" }),
            SnapshotValue::Float(v) => write!(f, "{}", v),
            SnapshotValue::Integer(v) => write!(f, "{}", v),
            SnapshotValue::Text(v) => write!(f, "{}", v),
        }
    }
}

// ============================================================================
// From implementations for convenient construction
// ============================================================================

impl From<bool> for SnapshotValue {
    fn from(v: bool) -> Self {
        SnapshotValue::Bool(v)
    }
}

impl From<f64> for SnapshotValue {
    fn from(v: f64) -> Self {
        SnapshotValue::Float(v)
    }
}

impl From<i64> for SnapshotValue {
    fn from(v: i64) -> Self {
        SnapshotValue::Integer(v)
    }
}

impl From<u32> for SnapshotValue {
    fn from(v: u32) -> Self {
        SnapshotValue::Integer(i64::from(v))
    }
}

impl From<String> for SnapshotValue {
    fn from(v: String) -> Self {
        SnapshotValue::Text(v)
    }
}

impl From<&str> for SnapshotValue {
    fn from(v: &str) -> Self {
        SnapshotValue::Text(v.to_string())
    }
}
