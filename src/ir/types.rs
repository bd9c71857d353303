//! Scalar and aggregate value types of the host representation.

use std::fmt;

/// Type of a single scalar value or of one element of an aggregate.
///
/// Any width is representable so the host can describe declarations the engine
/// does not model (`i1`, `i128`, `half`, ...). Whether a width is supported by the
/// transformation engine is decided by
/// [`ValueDescriptor::is_supported`](crate::descriptor::ValueDescriptor::is_supported).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    /// Integer of the given bit width. Signedness is a property of the operations,
    /// not of the storage.
    Int(u16),
    /// IEEE-754 floating point of the given bit width.
    Float(u16),
}

impl ScalarType {
    /// 8-bit integer.
    pub const I8: Self = Self::Int(8);
    /// 16-bit integer.
    pub const I16: Self = Self::Int(16);
    /// 32-bit integer.
    pub const I32: Self = Self::Int(32);
    /// 64-bit integer.
    pub const I64: Self = Self::Int(64);
    /// Single precision float.
    pub const F32: Self = Self::Float(32);
    /// Double precision float.
    pub const F64: Self = Self::Float(64);

    /// Returns the bit width of this type.
    #[must_use]
    pub const fn bits(self) -> u32 {
        match self {
            Self::Int(bits) | Self::Float(bits) => bits as u32,
        }
    }

    /// Returns the number of bytes one value of this type occupies in an initializer.
    #[must_use]
    pub const fn byte_size(self) -> usize {
        (self.bits() as usize).div_ceil(8)
    }

    /// Returns `true` for floating point types.
    #[must_use]
    pub const fn is_float(self) -> bool {
        matches!(self, Self::Float(_))
    }

    /// Returns the integer type with the same width, used to reinterpret float bit patterns.
    #[must_use]
    pub const fn as_int(self) -> Self {
        match self {
            Self::Int(bits) | Self::Float(bits) => Self::Int(bits),
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(bits) => write!(f, "i{bits}"),
            Self::Float(32) => f.write_str("float"),
            Self::Float(64) => f.write_str("double"),
            Self::Float(bits) => write!(f, "f{bits}"),
        }
    }
}

/// Type of a declaration: a scalar, a fixed-size array or a SIMD-style vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    /// A single scalar.
    Scalar(ScalarType),
    /// `[count x element]`
    Array(ScalarType, usize),
    /// `<count x element>`
    Vector(ScalarType, usize),
}

impl ValueType {
    /// Returns the element type (the type itself for scalars).
    #[must_use]
    pub const fn element(self) -> ScalarType {
        match self {
            Self::Scalar(ty) | Self::Array(ty, _) | Self::Vector(ty, _) => ty,
        }
    }

    /// Returns the number of elements (1 for scalars).
    #[must_use]
    pub const fn element_count(self) -> usize {
        match self {
            Self::Scalar(_) => 1,
            Self::Array(_, count) | Self::Vector(_, count) => count,
        }
    }

    /// Returns `true` for arrays and vectors.
    #[must_use]
    pub const fn is_aggregate(self) -> bool {
        !matches!(self, Self::Scalar(_))
    }

    /// Returns the size in bytes of a complete initializer of this type.
    #[must_use]
    pub const fn byte_size(self) -> usize {
        self.element().byte_size() * self.element_count()
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(ty) => write!(f, "{ty}"),
            Self::Array(ty, count) => write!(f, "[{count} x {ty}]"),
            Self::Vector(ty, count) => write!(f, "<{count} x {ty}>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sizes() {
        assert_eq!(ScalarType::I8.byte_size(), 1);
        assert_eq!(ScalarType::F64.byte_size(), 8);
        assert_eq!(ScalarType::Int(1).byte_size(), 1);
        assert_eq!(ValueType::Array(ScalarType::I32, 8).byte_size(), 32);
        assert_eq!(ValueType::Vector(ScalarType::F32, 4).byte_size(), 16);
        assert_eq!(ValueType::Scalar(ScalarType::I16).element_count(), 1);
    }

    #[test]
    fn test_display() {
        assert_eq!(ValueType::Array(ScalarType::I32, 8).to_string(), "[8 x i32]");
        assert_eq!(ValueType::Vector(ScalarType::F32, 4).to_string(), "<4 x float>");
        assert_eq!(ValueType::Scalar(ScalarType::F64).to_string(), "double");
    }

    #[test]
    fn test_as_int() {
        assert_eq!(ScalarType::F32.as_int(), ScalarType::I32);
        assert_eq!(ScalarType::I8.as_int(), ScalarType::I8);
        assert!(ScalarType::F64.is_float());
        assert!(!ScalarType::I64.is_float());
    }
}
