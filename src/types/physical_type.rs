use serde::{Deserialize, Serialize};
use std::fmt;

/// Physical types represent how data is stored internally.
/// These are the low-level representations used for memory layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PhysicalType {
    /// Boolean value
    Bool,
    /// 8-bit signed integer
    Int8,
    /// 16-bit signed integer
    Int16,
    /// 32-bit signed integer
    Int32,
    /// 64-bit signed integer
    Int64,
    /// 128-bit signed integer
    Int128,
    /// 32-bit floating point
    Float,
    /// 64-bit double precision
    Double,
    /// Decimal type with precision and scale
    Decimal { precision: u8, scale: u8 },
    /// Variable length string
    Varchar,
    /// Variable length binary data
    Varbinary,
    /// Date value (days since epoch)
    Date,
    /// Timestamp value (microseconds since epoch)
    Timestamp,
    /// Nested list/array type
    List,
    /// Map type (key-value pairs)
    Map,
    /// Struct type with named fields
    Struct,
    /// Invalid/unknown type
    Invalid,
}

impl PhysicalType {
    /// Get the size of this physical type in bytes (for fixed-size types)
    pub fn get_size(&self) -> Option<usize> {
        match self {
            PhysicalType::Bool => Some(1),
            PhysicalType::Int8 => Some(1),
            PhysicalType::Int16 => Some(2),
            PhysicalType::Int32 => Some(4),
            PhysicalType::Int64 => Some(8),
            PhysicalType::Int128 => Some(16),
            PhysicalType::Float => Some(4),
            PhysicalType::Double => Some(8),
            PhysicalType::Decimal { .. } => Some(16), // DECIMAL stored as i128
            PhysicalType::Date => Some(4),
            PhysicalType::Timestamp => Some(8),
            _ => None, // Variable size types
        }
    }

    /// Check if this type is numeric
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            PhysicalType::Int8
                | PhysicalType::Int16
                | PhysicalType::Int32
                | PhysicalType::Int64
                | PhysicalType::Int128
                | PhysicalType::Float
                | PhysicalType::Double
                | PhysicalType::Decimal { .. }
        )
    }

    /// Check if this type is variable length
    pub fn is_variable_size(&self) -> bool {
        matches!(
            self,
            PhysicalType::Varchar
                | PhysicalType::Varbinary
                | PhysicalType::List
                | PhysicalType::Map
                | PhysicalType::Struct
        )
    }
}

impl fmt::Display for PhysicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhysicalType::Bool => write!(f, "BOOL"),
            PhysicalType::Int8 => write!(f, "INT8"),
            PhysicalType::Int16 => write!(f, "INT16"),
            PhysicalType::Int32 => write!(f, "INT32"),
            PhysicalType::Int64 => write!(f, "INT64"),
            PhysicalType::Int128 => write!(f, "INT128"),
            PhysicalType::Float => write!(f, "FLOAT"),
            PhysicalType::Double => write!(f, "DOUBLE"),
            PhysicalType::Decimal { precision, scale } => {
                write!(f, "DECIMAL({},{})", precision, scale)
            }
            PhysicalType::Varchar => write!(f, "VARCHAR"),
            PhysicalType::Varbinary => write!(f, "VARBINARY"),
            PhysicalType::Date => write!(f, "DATE"),
            PhysicalType::Timestamp => write!(f, "TIMESTAMP"),
            PhysicalType::List => write!(f, "LIST"),
            PhysicalType::Map => write!(f, "MAP"),
            PhysicalType::Struct => write!(f, "STRUCT"),
            PhysicalType::Invalid => write!(f, "INVALID"),
        }
    }
}
