use crate::common::error::{VexelError, VexelResult};
use crate::types::physical_type::PhysicalType;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Logical types represent the SQL-level types that expressions carry.
/// These are mapped to physical types for storage and computation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LogicalType {
    /// Boolean type (TRUE/FALSE)
    Boolean,
    /// 8-bit signed integer
    TinyInt,
    /// 16-bit signed integer
    SmallInt,
    /// 32-bit signed integer
    Integer,
    /// 64-bit signed integer
    BigInt,
    /// 128-bit signed integer
    HugeInt,
    /// 32-bit floating point
    Real,
    /// 64-bit double precision
    Double,
    /// Decimal with precision and scale, stored as a scaled integer
    Decimal { precision: u8, scale: u8 },
    /// Variable length string
    Varchar,
    /// Variable length binary data
    Varbinary,
    /// Date value (days since 1970-01-01)
    Date,
    /// Timestamp value (microseconds since 1970-01-01 00:00:00 UTC)
    Timestamp,
    /// Array type with element type
    Array(Box<LogicalType>),
    /// Map type with key and value types
    Map {
        key_type: Box<LogicalType>,
        value_type: Box<LogicalType>,
    },
    /// Row type with named fields
    Row(Vec<(String, LogicalType)>),
    /// Function type with parameter types and return type
    Function {
        parameters: Vec<LogicalType>,
        returns: Box<LogicalType>,
    },
    /// Unknown type, e.g. an untyped NULL literal
    Unknown,
}

impl LogicalType {
    /// Get the corresponding physical type for this logical type
    pub fn get_physical_type(&self) -> PhysicalType {
        match self {
            LogicalType::Boolean => PhysicalType::Bool,
            LogicalType::TinyInt => PhysicalType::Int8,
            LogicalType::SmallInt => PhysicalType::Int16,
            LogicalType::Integer => PhysicalType::Int32,
            LogicalType::BigInt => PhysicalType::Int64,
            LogicalType::HugeInt => PhysicalType::Int128,
            LogicalType::Real => PhysicalType::Float,
            LogicalType::Double => PhysicalType::Double,
            LogicalType::Decimal { precision, scale } => PhysicalType::Decimal {
                precision: *precision,
                scale: *scale,
            },
            LogicalType::Varchar => PhysicalType::Varchar,
            LogicalType::Varbinary => PhysicalType::Varbinary,
            LogicalType::Date => PhysicalType::Date,
            LogicalType::Timestamp => PhysicalType::Timestamp,
            LogicalType::Array(_) => PhysicalType::List,
            LogicalType::Map { .. } => PhysicalType::Map,
            LogicalType::Row(_) => PhysicalType::Struct,
            LogicalType::Function { .. } => PhysicalType::Invalid,
            LogicalType::Unknown => PhysicalType::Invalid,
        }
    }

    /// Check if this type is numeric
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            LogicalType::TinyInt
                | LogicalType::SmallInt
                | LogicalType::Integer
                | LogicalType::BigInt
                | LogicalType::HugeInt
                | LogicalType::Real
                | LogicalType::Double
                | LogicalType::Decimal { .. }
        )
    }

    /// Check if this type is integral (no fractional part)
    pub fn is_integral(&self) -> bool {
        matches!(
            self,
            LogicalType::TinyInt
                | LogicalType::SmallInt
                | LogicalType::Integer
                | LogicalType::BigInt
                | LogicalType::HugeInt
        )
    }

    /// Check if this type is floating point
    pub fn is_floating_point(&self) -> bool {
        matches!(self, LogicalType::Real | LogicalType::Double)
    }

    /// Check if this type is a string type
    pub fn is_string(&self) -> bool {
        matches!(self, LogicalType::Varchar | LogicalType::Varbinary)
    }

    /// Check if this type is a decimal
    pub fn is_decimal(&self) -> bool {
        matches!(self, LogicalType::Decimal { .. })
    }

    /// Check if this type is temporal (date/time related)
    pub fn is_temporal(&self) -> bool {
        matches!(self, LogicalType::Date | LogicalType::Timestamp)
    }

    /// Check if values of this type occupy a fixed number of bytes
    pub fn is_fixed_width(&self) -> bool {
        self.get_physical_type().get_size().is_some()
    }

    /// Check if this type is a nested type (contains other types)
    pub fn is_nested(&self) -> bool {
        matches!(
            self,
            LogicalType::Array(_) | LogicalType::Map { .. } | LogicalType::Row(_)
        )
    }

    /// Structural type equivalence. Unlike `==`, row field names do not
    /// participate: two rows are equivalent when their field types are
    /// pairwise equivalent.
    pub fn equivalent(&self, other: &LogicalType) -> bool {
        match (self, other) {
            (LogicalType::Array(a), LogicalType::Array(b)) => a.equivalent(b),
            (
                LogicalType::Map {
                    key_type: ka,
                    value_type: va,
                },
                LogicalType::Map {
                    key_type: kb,
                    value_type: vb,
                },
            ) => ka.equivalent(kb) && va.equivalent(vb),
            (LogicalType::Row(a), LogicalType::Row(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .zip(b.iter())
                        .all(|((_, ta), (_, tb))| ta.equivalent(tb))
            }
            (
                LogicalType::Function {
                    parameters: pa,
                    returns: ra,
                },
                LogicalType::Function {
                    parameters: pb,
                    returns: rb,
                },
            ) => {
                pa.len() == pb.len()
                    && pa.iter().zip(pb.iter()).all(|(a, b)| a.equivalent(b))
                    && ra.equivalent(rb)
            }
            (a, b) => a == b,
        }
    }

    /// Validate if a decimal precision and scale are valid
    pub fn validate_decimal(precision: u8, scale: u8) -> VexelResult<()> {
        if precision == 0 || precision > crate::common::constants::MAX_DECIMAL_PRECISION {
            return Err(VexelError::InvalidType(format!(
                "Decimal precision must be between 1 and 38, got {}",
                precision
            )));
        }
        if scale > precision {
            return Err(VexelError::InvalidType(format!(
                "Decimal scale ({}) cannot be greater than precision ({})",
                scale, precision
            )));
        }
        Ok(())
    }

    /// Create a decimal type with validation
    pub fn decimal(precision: u8, scale: u8) -> VexelResult<LogicalType> {
        Self::validate_decimal(precision, scale)?;
        Ok(LogicalType::Decimal { precision, scale })
    }

    /// Precision and scale of a decimal type.
    pub fn decimal_precision_scale(&self) -> VexelResult<(u8, u8)> {
        match self {
            LogicalType::Decimal { precision, scale } => Ok((*precision, *scale)),
            other => Err(VexelError::InvalidType(format!(
                "Expected DECIMAL type, got {}",
                other
            ))),
        }
    }
}

impl fmt::Display for LogicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogicalType::Boolean => write!(f, "BOOLEAN"),
            LogicalType::TinyInt => write!(f, "TINYINT"),
            LogicalType::SmallInt => write!(f, "SMALLINT"),
            LogicalType::Integer => write!(f, "INTEGER"),
            LogicalType::BigInt => write!(f, "BIGINT"),
            LogicalType::HugeInt => write!(f, "HUGEINT"),
            LogicalType::Real => write!(f, "REAL"),
            LogicalType::Double => write!(f, "DOUBLE"),
            LogicalType::Decimal { precision, scale } => {
                write!(f, "DECIMAL({},{})", precision, scale)
            }
            LogicalType::Varchar => write!(f, "VARCHAR"),
            LogicalType::Varbinary => write!(f, "VARBINARY"),
            LogicalType::Date => write!(f, "DATE"),
            LogicalType::Timestamp => write!(f, "TIMESTAMP"),
            LogicalType::Array(element_type) => write!(f, "{}[]", element_type),
            LogicalType::Map {
                key_type,
                value_type,
            } => {
                write!(f, "MAP({}, {})", key_type, value_type)
            }
            LogicalType::Row(fields) => {
                write!(f, "ROW(")?;
                for (i, (name, field_type)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{} {}", name, field_type)?;
                }
                write!(f, ")")
            }
            LogicalType::Function {
                parameters,
                returns,
            } => {
                write!(f, "FUNCTION(")?;
                for (i, parameter) in parameters.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", parameter)?;
                }
                write!(f, ") -> {}", returns)
            }
            LogicalType::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// Type system utilities
pub struct TypeUtils;

impl TypeUtils {
    /// Get the smallest type that can hold both types
    pub fn common_type(type1: &LogicalType, type2: &LogicalType) -> VexelResult<LogicalType> {
        use LogicalType::*;

        if type1 == type2 {
            return Ok(type1.clone());
        }

        match (type1, type2) {
            // Numeric type promotion
            (TinyInt, SmallInt | Integer | BigInt | HugeInt | Real | Double) => Ok(type2.clone()),
            (SmallInt, TinyInt) => Ok(SmallInt),
            (SmallInt, Integer | BigInt | HugeInt | Real | Double) => Ok(type2.clone()),
            (Integer, TinyInt | SmallInt) => Ok(Integer),
            (Integer, BigInt | HugeInt | Real | Double) => Ok(type2.clone()),
            (BigInt, TinyInt | SmallInt | Integer) => Ok(BigInt),
            (BigInt, HugeInt | Real | Double) => Ok(type2.clone()),
            (HugeInt, TinyInt | SmallInt | Integer | BigInt) => Ok(HugeInt),
            (HugeInt, Real | Double) => Ok(type2.clone()),
            (Real, Double) => Ok(Double),
            (Double, Real) => Ok(Double),
            (Real | Double, TinyInt | SmallInt | Integer | BigInt | HugeInt) => Ok(type1.clone()),

            // Date widens to timestamp
            (Date, Timestamp) | (Timestamp, Date) => Ok(Timestamp),

            _ => Err(VexelError::InvalidType(format!(
                "Cannot find common type between {} and {}",
                type1, type2
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logical_type_predicates() {
        let int_type = LogicalType::Integer;
        assert!(int_type.is_numeric());
        assert!(int_type.is_integral());
        assert!(!int_type.is_floating_point());
        assert!(int_type.is_fixed_width());

        let real_type = LogicalType::Real;
        assert!(real_type.is_numeric());
        assert!(!real_type.is_integral());
        assert!(real_type.is_floating_point());

        assert!(LogicalType::Varchar.is_string());
        assert!(!LogicalType::Varchar.is_fixed_width());
        assert!(LogicalType::Decimal {
            precision: 10,
            scale: 2
        }
        .is_fixed_width());
    }

    #[test]
    fn test_decimal_validation() {
        assert!(LogicalType::decimal(10, 2).is_ok());
        assert!(LogicalType::decimal(0, 0).is_err());
        assert!(LogicalType::decimal(39, 10).is_err());
        assert!(LogicalType::decimal(10, 11).is_err());
    }

    #[test]
    fn test_equivalence_ignores_row_field_names() {
        let a = LogicalType::Row(vec![
            ("x".to_string(), LogicalType::Integer),
            ("y".to_string(), LogicalType::Varchar),
        ]);
        let b = LogicalType::Row(vec![
            ("u".to_string(), LogicalType::Integer),
            ("v".to_string(), LogicalType::Varchar),
        ]);
        assert_ne!(a, b);
        assert!(a.equivalent(&b));

        let c = LogicalType::Row(vec![("x".to_string(), LogicalType::Double)]);
        assert!(!a.equivalent(&c));
    }

    #[test]
    fn test_type_promotion() {
        let max_type = TypeUtils::common_type(&LogicalType::TinyInt, &LogicalType::BigInt).unwrap();
        assert_eq!(max_type, LogicalType::BigInt);

        let max_type = TypeUtils::common_type(&LogicalType::BigInt, &LogicalType::Double).unwrap();
        assert_eq!(max_type, LogicalType::Double);

        assert!(TypeUtils::common_type(&LogicalType::Varchar, &LogicalType::Boolean).is_err());
    }

    #[test]
    fn test_function_type_display() {
        let ty = LogicalType::Function {
            parameters: vec![LogicalType::Integer, LogicalType::Integer],
            returns: Box::new(LogicalType::Boolean),
        };
        assert_eq!(ty.to_string(), "FUNCTION(INTEGER, INTEGER) -> BOOLEAN");
    }
}
