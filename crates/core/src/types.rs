//! Data type definitions for Lumen.
//!
//! This module defines the attribute types an entity kind can declare.

/// Supported attribute types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DataType {
    /// Boolean type (true/false)
    Boolean,
    /// 32-bit signed integer
    Int32,
    /// 64-bit signed integer
    Int64,
    /// 64-bit floating point number
    Float64,
    /// UTF-8 string
    String,
    /// Date and time stored as Unix timestamp (milliseconds)
    DateTime,
    /// Binary data
    Bytes,
}

impl DataType {
    /// Returns whether this type is nullable by default.
    pub fn is_nullable_by_default(&self) -> bool {
        matches!(self, DataType::Bytes)
    }

    /// Returns whether this type is numeric.
    pub fn is_numeric(&self) -> bool {
        matches!(self, DataType::Int32 | DataType::Int64 | DataType::Float64)
    }

    /// Returns whether values of `other` can be meaningfully compared with
    /// values of this type. Numeric types compare across widths.
    pub fn is_comparable_with(&self, other: DataType) -> bool {
        *self == other || (self.is_numeric() && other.is_numeric())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_type_equality() {
        assert_eq!(DataType::Int32, DataType::Int32);
        assert_ne!(DataType::Int32, DataType::Int64);
    }

    #[test]
    fn test_nullable_by_default() {
        assert!(!DataType::Boolean.is_nullable_by_default());
        assert!(!DataType::String.is_nullable_by_default());
        assert!(DataType::Bytes.is_nullable_by_default());
    }

    #[test]
    fn test_comparable() {
        assert!(DataType::Int32.is_comparable_with(DataType::Float64));
        assert!(DataType::String.is_comparable_with(DataType::String));
        assert!(!DataType::String.is_comparable_with(DataType::Int64));
        assert!(!DataType::DateTime.is_comparable_with(DataType::Int64));
    }
}
