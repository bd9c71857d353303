//! Emission of decode sequences into function bodies.
//!
//! The IR operations mirror [`crate::encryption::transform`] exactly. Per-element
//! key material is folded to constants when the element index is known at build
//! time (scalars) and computed from the index otherwise:
//!
//! ```text
//! k_i = (i * KEY_STRIDE) ^ key        (mod 2^bits)
//! s_i = (i * SALT_STRIDE) + salt      (mod 2^bits)
//! ```
//!
//! Both only depend on `i mod 2^bits`, so the index is resized to the element
//! width before use.

use crate::{
    encryption::{DecryptionMode, EncryptedArtifact, IterationKey, KEY_STRIDE, SALT_STRIDE},
    ir::{BinaryOp, Function, FunctionId, Op, ScalarType, Value, VarId},
    utils::width_mask,
};

/// Where the element index of a read comes from.
#[derive(Debug, Clone, Copy)]
pub(crate) enum ElementIndex {
    /// Known at build time.
    Constant(u64),
    /// Held in a variable of the element's integer type.
    Var(VarId),
}

/// Appends instructions to a new instruction list, allocating variables from `function`.
pub(crate) struct DecodeEmitter<'f> {
    function: &'f mut Function,
    ops: Vec<Op>,
}

impl<'f> DecodeEmitter<'f> {
    pub(crate) fn new(function: &'f mut Function, capacity: usize) -> Self {
        Self {
            function,
            ops: Vec::with_capacity(capacity),
        }
    }

    pub(crate) fn finish(self) -> Vec<Op> {
        self.ops
    }

    pub(crate) fn push(&mut self, op: Op) {
        self.ops.push(op);
    }

    fn emit(&mut self, make: impl FnOnce(VarId) -> Op) -> VarId {
        let dest = self.function.fresh_var();
        self.ops.push(make(dest));
        dest
    }

    pub(crate) fn fresh(&mut self) -> VarId {
        self.function.fresh_var()
    }

    fn constant(&mut self, ty: ScalarType, bits: u64) -> VarId {
        self.emit(|dest| Op::Const {
            dest,
            value: Value::new(ty, bits),
        })
    }

    fn binary(&mut self, op: BinaryOp, left: VarId, right: VarId) -> VarId {
        self.emit(|dest| Op::Binary {
            dest,
            op,
            left,
            right,
        })
    }

    pub(crate) fn bitcast(&mut self, src: VarId, to: ScalarType) -> VarId {
        self.emit(|dest| Op::BitCast { dest, src, to })
    }

    pub(crate) fn resize(&mut self, src: VarId, to: ScalarType) -> VarId {
        self.emit(|dest| Op::Resize { dest, src, to })
    }

    pub(crate) fn arg(&mut self, index: usize) -> VarId {
        self.emit(|dest| Op::Arg { dest, index })
    }

    pub(crate) fn call(&mut self, function: FunctionId, args: Vec<VarId>) -> VarId {
        self.emit(|dest| Op::Call {
            dest: Some(dest),
            function,
            args,
        })
    }

    fn element_key(&mut self, key: &IterationKey, index: ElementIndex, ty: ScalarType) -> VarId {
        let bits = ty.bits();
        match index {
            ElementIndex::Constant(i) => self.constant(ty, key.element_key(i, bits)),
            ElementIndex::Var(i) => {
                let stride = self.constant(ty, KEY_STRIDE);
                let spread = self.binary(BinaryOp::Mul, i, stride);
                let base = self.constant(ty, key.key & width_mask(bits));
                self.binary(BinaryOp::Xor, spread, base)
            }
        }
    }

    fn element_salt(&mut self, key: &IterationKey, index: ElementIndex, ty: ScalarType) -> VarId {
        let bits = ty.bits();
        match index {
            ElementIndex::Constant(i) => self.constant(ty, key.element_salt(i, bits)),
            ElementIndex::Var(i) => {
                let stride = self.constant(ty, SALT_STRIDE);
                let spread = self.binary(BinaryOp::Mul, i, stride);
                let base = self.constant(ty, key.salt & width_mask(bits));
                self.binary(BinaryOp::Add, spread, base)
            }
        }
    }

    /// Undoes the Lite layers, last iteration first.
    pub(crate) fn lite(
        &mut self,
        mut x: VarId,
        keys: &[IterationKey],
        index: ElementIndex,
        ty: ScalarType,
    ) -> VarId {
        for key in keys.iter().rev() {
            let k = self.element_key(key, index, ty);
            x = self.binary(BinaryOp::Xor, x, k);
        }
        x
    }

    /// Undoes the Deep layers, last iteration first.
    pub(crate) fn deep(
        &mut self,
        mut x: VarId,
        keys: &[IterationKey],
        index: ElementIndex,
        ty: ScalarType,
    ) -> VarId {
        let bits = ty.bits();
        for key in keys.iter().rev() {
            let inverse = self.constant(ty, key.inverse_multiplier(bits));
            x = self.binary(BinaryOp::Mul, x, inverse);
            let s = self.element_salt(key, index, ty);
            x = self.binary(BinaryOp::Sub, x, s);
            let r = self.constant(ty, u64::from(key.rotation(bits)));
            x = self.binary(BinaryOp::RotR, x, r);
            let k = self.element_key(key, index, ty);
            x = self.binary(BinaryOp::Xor, x, k);
        }
        x
    }
}

/// Name of the shared Deep decode routine of a global.
#[must_use]
pub fn routine_name(global: &str) -> String {
    format!("__obscura_decode.{global}")
}

/// Builds the shared Deep decode routine `(value: iN, index: i64) -> iN`.
pub(crate) fn build_routine(artifact: &EncryptedArtifact) -> Function {
    let ty = artifact.ty.element().as_int();
    let mut routine = Function::new(routine_name(&artifact.name))
        .with_params(vec![ty, ScalarType::I64]);
    routine.generated = true;

    let mut emitter = DecodeEmitter::new(&mut routine, 8 + artifact.deep.len() * 12);
    let value = emitter.arg(0);
    let raw_index = emitter.arg(1);
    let index = emitter.resize(raw_index, ty);
    let decoded = emitter.deep(value, &artifact.deep, ElementIndex::Var(index), ty);
    emitter.push(Op::Return {
        value: Some(decoded),
    });
    let body = emitter.finish();

    routine.set_body(body);
    routine
}

/// Emits the decode sequence for one read of a protected global.
///
/// `raw` holds the ciphertext element just loaded and `index` the element index
/// variable for aggregates. Returns the variable holding the plaintext.
pub(crate) fn expand_read(
    emitter: &mut DecodeEmitter<'_>,
    artifact: &EncryptedArtifact,
    raw: VarId,
    index: Option<VarId>,
    routine: Option<FunctionId>,
) -> VarId {
    let element = artifact.ty.element();
    let ty = element.as_int();

    let mut x = if element.is_float() {
        emitter.bitcast(raw, ty)
    } else {
        raw
    };

    let shared = match artifact.mode {
        DecryptionMode::CallDeep => routine,
        DecryptionMode::InlineLite | DecryptionMode::InlineDeep => None,
    };
    let inline_deep = shared.is_none() && !artifact.deep.is_empty();

    let element_index = match index {
        Some(index) if inline_deep || !artifact.lite.is_empty() => {
            ElementIndex::Var(emitter.resize(index, ty))
        }
        _ => ElementIndex::Constant(0),
    };

    x = emitter.lite(x, &artifact.lite, element_index, ty);

    if inline_deep {
        x = emitter.deep(x, &artifact.deep, element_index, ty);
    } else if let Some(routine) = shared {
        let wide_index = match index {
            Some(index) => emitter.resize(index, ScalarType::I64),
            None => emitter.constant(ScalarType::I64, 0),
        };
        x = emitter.call(routine, vec![x, wide_index]);
    }

    if element.is_float() {
        emitter.bitcast(x, element)
    } else {
        x
    }
}
