//! Typed scalar values and the arithmetic defined over them.
//!
//! A [`Value`] is a raw bit pattern tagged with its [`ScalarType`]. Integers and
//! floats share the same representation, which makes bit casts free and keeps
//! the transforms of the encryption engine independent of the element kind.
//!
//! [`BinaryOp::fold`] is the only implementation of IR arithmetic: the
//! [`Evaluator`](crate::ir::Evaluator) executes binary operations through it and
//! operation promotion folds constant operations through it, so both always agree.

use std::fmt;

use crate::{
    ir::ScalarType,
    utils::{rotate_left, rotate_right, width_mask},
    Error, Result,
};

/// A typed scalar value.
///
/// The stored bits are always masked to the width of the type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Value {
    ty: ScalarType,
    bits: u64,
}

impl Value {
    /// Creates a value from a raw bit pattern, truncating it to the type's width.
    #[must_use]
    pub fn new(ty: ScalarType, bits: u64) -> Self {
        Self {
            ty,
            bits: bits & width_mask(ty.bits()),
        }
    }

    /// Creates an 8-bit integer value.
    #[must_use]
    #[allow(clippy::cast_sign_loss)]
    pub fn i8(value: i8) -> Self {
        Self::new(ScalarType::I8, u64::from(value as u8))
    }

    /// Creates a 16-bit integer value.
    #[must_use]
    #[allow(clippy::cast_sign_loss)]
    pub fn i16(value: i16) -> Self {
        Self::new(ScalarType::I16, u64::from(value as u16))
    }

    /// Creates a 32-bit integer value.
    #[must_use]
    #[allow(clippy::cast_sign_loss)]
    pub fn i32(value: i32) -> Self {
        Self::new(ScalarType::I32, u64::from(value as u32))
    }

    /// Creates a 64-bit integer value.
    #[must_use]
    #[allow(clippy::cast_sign_loss)]
    pub fn i64(value: i64) -> Self {
        Self::new(ScalarType::I64, value as u64)
    }

    /// Creates a single precision float value.
    #[must_use]
    pub fn f32(value: f32) -> Self {
        Self::new(ScalarType::F32, u64::from(value.to_bits()))
    }

    /// Creates a double precision float value.
    #[must_use]
    pub fn f64(value: f64) -> Self {
        Self::new(ScalarType::F64, value.to_bits())
    }

    /// Decodes a value from little-endian bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`] if `bytes` is not exactly the type's byte size, or
    /// the type is wider than 64 bits.
    pub fn from_le_bytes(ty: ScalarType, bytes: &[u8]) -> Result<Self> {
        if ty.bits() > 64 || bytes.len() != ty.byte_size() {
            return Err(malformed_error!(
                "cannot decode {} bytes as {}",
                bytes.len(),
                ty
            ));
        }

        let mut buffer = [0u8; 8];
        buffer[..bytes.len()].copy_from_slice(bytes);
        Ok(Self::new(ty, u64::from_le_bytes(buffer)))
    }

    /// Encodes the value as little-endian bytes of the type's byte size.
    #[must_use]
    pub fn to_le_bytes(self) -> Vec<u8> {
        let size = self.ty.byte_size().min(8);
        self.bits.to_le_bytes()[..size].to_vec()
    }

    /// Returns the type of this value.
    #[must_use]
    pub const fn ty(self) -> ScalarType {
        self.ty
    }

    /// Returns the raw bit pattern.
    #[must_use]
    pub const fn bits(self) -> u64 {
        self.bits
    }

    /// Returns the value reinterpreted as another type of the same width.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Evaluation`] if the widths differ.
    pub fn bitcast(self, to: ScalarType) -> Result<Self> {
        if to.bits() != self.ty.bits() {
            return Err(Error::Evaluation(format!(
                "bitcast from {} to {} changes width",
                self.ty, to
            )));
        }
        Ok(Self::new(to, self.bits))
    }

    /// Returns the integer value truncated or zero-extended to another integer type.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Evaluation`] if either side is a float type.
    pub fn resize(self, to: ScalarType) -> Result<Self> {
        if self.ty.is_float() || to.is_float() {
            return Err(Error::Evaluation(format!(
                "resize from {} to {} requires integer types",
                self.ty, to
            )));
        }
        Ok(Self::new(to, self.bits))
    }

    /// Interprets the bits as an `f32`, if the type is single precision.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn as_f32(self) -> Option<f32> {
        (self.ty == ScalarType::F32).then(|| f32::from_bits(self.bits as u32))
    }

    /// Interprets the bits as an `f64`, if the type is double precision.
    #[must_use]
    pub fn as_f64(self) -> Option<f64> {
        (self.ty == ScalarType::F64).then(|| f64::from_bits(self.bits))
    }

    /// Returns the bits sign-extended from the type's width.
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub fn as_i64(self) -> i64 {
        let bits = self.ty.bits();
        if bits == 0 || bits >= 64 {
            return self.bits as i64;
        }
        let shift = 64 - bits;
        ((self.bits << shift) as i64) >> shift
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(value) = self.as_f32() {
            return write!(f, "{}:{value}", self.ty);
        }
        if let Some(value) = self.as_f64() {
            return write!(f, "{}:{value}", self.ty);
        }
        write!(f, "{}:{:#x}", self.ty, self.bits)
    }
}

/// Binary operations of the IR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    /// Wrapping integer addition.
    Add,
    /// Wrapping integer subtraction.
    Sub,
    /// Wrapping integer multiplication.
    Mul,
    /// Bitwise exclusive or.
    Xor,
    /// Bitwise and.
    And,
    /// Bitwise or.
    Or,
    /// Shift left; the amount is taken modulo the width.
    Shl,
    /// Logical shift right; the amount is taken modulo the width.
    LShr,
    /// Rotate left within the type's width.
    RotL,
    /// Rotate right within the type's width.
    RotR,
    /// Floating point addition.
    FAdd,
    /// Floating point subtraction.
    FSub,
    /// Floating point multiplication.
    FMul,
}

impl BinaryOp {
    /// Returns the mnemonic used when displaying instructions.
    #[must_use]
    pub const fn mnemonic(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Sub => "sub",
            Self::Mul => "mul",
            Self::Xor => "xor",
            Self::And => "and",
            Self::Or => "or",
            Self::Shl => "shl",
            Self::LShr => "lshr",
            Self::RotL => "rotl",
            Self::RotR => "rotr",
            Self::FAdd => "fadd",
            Self::FSub => "fsub",
            Self::FMul => "fmul",
        }
    }

    /// Returns `true` for the floating point operations.
    #[must_use]
    pub const fn is_float(self) -> bool {
        matches!(self, Self::FAdd | Self::FSub | Self::FMul)
    }

    /// Computes `left op right`.
    ///
    /// Both operands must share the same type. Integer operations require integer
    /// operands and floating point operations require float operands.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Evaluation`] on operand type mismatches or unsupported widths.
    #[allow(clippy::cast_possible_truncation)]
    pub fn fold(self, left: Value, right: Value) -> Result<Value> {
        if left.ty != right.ty {
            return Err(Error::Evaluation(format!(
                "{} operands differ in type: {} vs {}",
                self.mnemonic(),
                left.ty,
                right.ty
            )));
        }

        let ty = left.ty;
        if self.is_float() != ty.is_float() {
            return Err(Error::Evaluation(format!(
                "{} is not defined for {}",
                self.mnemonic(),
                ty
            )));
        }

        let bits = ty.bits();
        let (l, r) = (left.bits, right.bits);
        let result = match self {
            Self::Add => l.wrapping_add(r),
            Self::Sub => l.wrapping_sub(r),
            Self::Mul => l.wrapping_mul(r),
            Self::Xor => l ^ r,
            Self::And => l & r,
            Self::Or => l | r,
            Self::Shl => l.wrapping_shl((r % u64::from(bits.max(1))) as u32),
            Self::LShr => l.wrapping_shr((r % u64::from(bits.max(1))) as u32),
            Self::RotL => rotate_left(l, (r % u64::from(bits.max(1))) as u32, bits),
            Self::RotR => rotate_right(l, (r % u64::from(bits.max(1))) as u32, bits),
            Self::FAdd | Self::FSub | Self::FMul => return Self::fold_float(self, left, right),
        };

        Ok(Value::new(ty, result))
    }

    fn fold_float(self, left: Value, right: Value) -> Result<Value> {
        if let (Some(l), Some(r)) = (left.as_f32(), right.as_f32()) {
            let result = match self {
                Self::FAdd => l + r,
                Self::FSub => l - r,
                _ => l * r,
            };
            return Ok(Value::f32(result));
        }

        if let (Some(l), Some(r)) = (left.as_f64(), right.as_f64()) {
            let result = match self {
                Self::FAdd => l + r,
                Self::FSub => l - r,
                _ => l * r,
            };
            return Ok(Value::f64(result));
        }

        Err(Error::Evaluation(format!(
            "{} is not supported for {}",
            self.mnemonic(),
            left.ty
        )))
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}
