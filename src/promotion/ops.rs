//! Folding of constant binary operations into synthetic locals.
//!
//! A binary operation whose operands are both known constants, at least one of
//! them read from a constant local, is evaluated at build time. The result
//! becomes a new constant local named `op<N>` and the operation is replaced by a
//! read of that local, which makes it a promotion candidate like any other
//! constant local (promoted as `<function>.op<N>`).
//!
//! An operation is only folded when the caller admits the resulting local for
//! promotion. A folded literal left in function scope would hold a value derived
//! from the operand constants in plaintext.

use rustc_hash::FxHashMap;

use crate::{
    compiler::{EventKind, EventLog},
    descriptor::{Annotations, ValueDescriptor},
    ir::{Function, FunctionId, LocalId, LocalVar, Module, Op, Value, ValueType, VarId},
};

/// Tags a folded result inherits from the locals it was computed from.
const INHERITED: Annotations = Annotations::NO_ENCRYPT
    .union(Annotations::NO_PROMOTE)
    .union(Annotations::PROMOTE);

#[derive(Debug, Clone, Copy)]
struct Known {
    value: Value,
    /// Derived from at least one constant local.
    from_local: bool,
    annotations: Annotations,
}

/// Folds constant operations in every source function of `module`.
///
/// `admit` sees the descriptor of each would-be synthetic local; operations
/// whose result it rejects are left untouched.
///
/// Returns the number of synthetic locals created.
pub fn promote_operations<F>(module: &mut Module, events: &EventLog, admit: F) -> usize
where
    F: Fn(&ValueDescriptor) -> bool,
{
    let ids: Vec<FunctionId> = module
        .functions()
        .filter(|(_, function)| !function.generated)
        .map(|(id, _)| id)
        .collect();

    let mut folded = 0;
    for id in ids {
        if let Some(function) = module.function_mut(id) {
            folded += fold_function(id, function, events, &admit);
        }
    }
    folded
}

fn constant_local(function: &Function, id: LocalId) -> Option<Known> {
    let local = function.local(id)?;
    let ValueType::Scalar(ty) = local.ty else {
        return None;
    };
    if function.is_local_stored(id) {
        return None;
    }
    let bytes = local.initializer.as_deref()?;
    let value = Value::from_le_bytes(ty, bytes).ok()?;
    Some(Known {
        value,
        from_local: true,
        annotations: Annotations::parse(&local.annotations) & INHERITED,
    })
}

fn fold_function<F>(id: FunctionId, function: &mut Function, events: &EventLog, admit: &F) -> usize
where
    F: Fn(&ValueDescriptor) -> bool,
{
    let constants: FxHashMap<LocalId, Known> = function
        .locals()
        .filter_map(|(id, _)| constant_local(function, id).map(|known| (id, known)))
        .collect();

    let mut known: FxHashMap<VarId, Known> = FxHashMap::default();
    let mut folded = 0;
    let body = std::mem::take(function.body_mut());
    let mut rewritten = Vec::with_capacity(body.len());

    for op in body {
        match op {
            Op::Const { dest, value } => {
                known.insert(
                    dest,
                    Known {
                        value,
                        from_local: false,
                        annotations: Annotations::empty(),
                    },
                );
                rewritten.push(op);
            }
            Op::Copy { dest, src } => {
                if let Some(value) = known.get(&src).copied() {
                    known.insert(dest, value);
                }
                rewritten.push(op);
            }
            Op::LoadLocal { dest, local } => {
                if let Some(value) = constants.get(&local).copied() {
                    known.insert(dest, value);
                }
                rewritten.push(op);
            }
            Op::Binary {
                dest,
                op: binop,
                left,
                right,
            } => {
                let operands = known.get(&left).copied().zip(known.get(&right).copied());
                let result = operands
                    .filter(|(l, r)| l.from_local || r.from_local)
                    .and_then(|(l, r)| {
                        binop
                            .fold(l.value, r.value)
                            .ok()
                            .map(|value| (value, l.annotations | r.annotations))
                    });

                let Some((value, annotations)) = result else {
                    rewritten.push(op);
                    continue;
                };

                let name = format!("op{folded}");
                let mut synthetic = LocalVar::scalar(name.clone(), value);
                synthetic.annotations = annotations.to_strings();
                let admitted = ValueDescriptor::from_local(id, function.next_local_id(), &synthetic)
                    .is_some_and(|descriptor| admit(&descriptor));
                if !admitted {
                    rewritten.push(op);
                    continue;
                }
                let local = function.add_local(synthetic);
                folded += 1;

                known.insert(
                    dest,
                    Known {
                        value,
                        from_local: true,
                        annotations,
                    },
                );
                rewritten.push(Op::LoadLocal { dest, local });

                events
                    .record(EventKind::OperationPromoted)
                    .at(function.name.clone(), name)
                    .message(format!("{} {left}, {right} = {value}", binop.mnemonic()));
            }
            other => rewritten.push(other),
        }
    }

    function.set_body(rewritten);
    folded
}
