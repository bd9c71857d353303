//! Reference interpreter for the host representation.
//!
//! The evaluator executes straight-line function bodies against the initializers
//! of a [`Module`]. It exists to verify that transformations preserve program
//! semantics: a function evaluated before and after the engine ran must return
//! the same value.
//!
//! Global storage is materialized lazily from initializer bytes on first access
//! and shared by all calls made through one evaluator, so stores performed by one
//! call are visible to later calls. Local storage is private to each activation.

use rustc_hash::FxHashMap;

use crate::{
    ir::{FunctionId, GlobalId, LocalId, Module, Op, ValueType, Value, VarId},
    Error, Result,
};

/// Maximum call nesting before evaluation is aborted.
const MAX_CALL_DEPTH: usize = 64;

/// Executes functions of a [`Module`].
pub struct Evaluator<'a> {
    module: &'a Module,
    globals: FxHashMap<GlobalId, Vec<Value>>,
}

impl<'a> Evaluator<'a> {
    /// Creates an evaluator over `module` with pristine global storage.
    #[must_use]
    pub fn new(module: &'a Module) -> Self {
        Self {
            module,
            globals: FxHashMap::default(),
        }
    }

    /// Calls the function named `name` with `args`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Evaluation`] if the function does not exist or evaluation fails.
    pub fn call(&mut self, name: &str, args: &[Value]) -> Result<Option<Value>> {
        let id = self
            .module
            .find_function(name)
            .ok_or_else(|| Error::Evaluation(format!("unknown function `{name}`")))?;
        self.call_id(id, args)
    }

    /// Calls a function by handle.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Evaluation`] on any invalid program state.
    pub fn call_id(&mut self, id: FunctionId, args: &[Value]) -> Result<Option<Value>> {
        self.invoke(id, args, 0)
    }

    /// Returns the current contents of a global, materializing it if needed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Evaluation`] if the global is unknown or has no initializer.
    pub fn global_values(&mut self, id: GlobalId) -> Result<&[Value]> {
        self.materialize(id)?;
        self.globals
            .get(&id)
            .map(Vec::as_slice)
            .ok_or_else(|| Error::Evaluation(format!("global {id} is not materialized")))
    }

    fn materialize(&mut self, id: GlobalId) -> Result<()> {
        if self.globals.contains_key(&id) {
            return Ok(());
        }

        let global = self
            .module
            .global(id)
            .ok_or_else(|| Error::Evaluation(format!("unknown global {id}")))?;
        let Some(bytes) = &global.initializer else {
            return Err(Error::Evaluation(format!(
                "global `{}` has no initializer",
                global.name
            )));
        };

        let values = decode_storage(global.ty, bytes)?;
        self.globals.insert(id, values);
        Ok(())
    }

    fn invoke(&mut self, id: FunctionId, args: &[Value], depth: usize) -> Result<Option<Value>> {
        if depth > MAX_CALL_DEPTH {
            return Err(Error::Evaluation("call depth exceeded".to_string()));
        }

        let module = self.module;
        let function = module
            .function(id)
            .ok_or_else(|| Error::Evaluation(format!("unknown function {id}")))?;

        if args.len() != function.params.len() {
            return Err(Error::Evaluation(format!(
                "`{}` expects {} arguments, got {}",
                function.name,
                function.params.len(),
                args.len()
            )));
        }
        for (index, (arg, param)) in args.iter().zip(&function.params).enumerate() {
            if arg.ty() != *param {
                return Err(Error::Evaluation(format!(
                    "argument {index} of `{}` is {}, expected {}",
                    function.name,
                    arg.ty(),
                    param
                )));
            }
        }

        let mut env: FxHashMap<VarId, Value> = FxHashMap::default();
        let mut locals: FxHashMap<LocalId, Vec<Value>> = FxHashMap::default();
        let read = |env: &FxHashMap<VarId, Value>, var: VarId| -> Result<Value> {
            env.get(&var)
                .copied()
                .ok_or_else(|| Error::Evaluation(format!("read of undefined {var}")))
        };

        for op in function.body() {
            match op {
                Op::Arg { dest, index } => {
                    let value = args.get(*index).copied().ok_or_else(|| {
                        Error::Evaluation(format!("argument {index} out of range"))
                    })?;
                    env.insert(*dest, value);
                }
                Op::Const { dest, value } => {
                    env.insert(*dest, *value);
                }
                Op::Copy { dest, src } => {
                    let value = read(&env, *src)?;
                    env.insert(*dest, value);
                }
                Op::LoadGlobal { dest, global } => {
                    let ty = self.global_type(*global)?;
                    if ty.is_aggregate() {
                        return Err(Error::Evaluation(format!(
                            "scalar load of aggregate global {global}"
                        )));
                    }
                    let value = self.global_values(*global)?.first().copied().ok_or_else(|| {
                        Error::Evaluation(format!("empty global {global}"))
                    })?;
                    env.insert(*dest, value);
                }
                Op::LoadElement {
                    dest,
                    global,
                    index,
                } => {
                    let index = read(&env, *index)?;
                    let values = self.global_values(*global)?;
                    let value = element_at(values, index)?;
                    env.insert(*dest, value);
                }
                Op::StoreGlobal { global, value } => {
                    let value = read(&env, *value)?;
                    self.materialize(*global)?;
                    if let Some(slot) = self.globals.get_mut(global).and_then(|v| v.first_mut()) {
                        *slot = value;
                    }
                }
                Op::LoadLocal { dest, local } => {
                    let values = local_storage(&mut locals, function, *local)?;
                    let value = values
                        .first()
                        .copied()
                        .ok_or_else(|| Error::Evaluation(format!("empty local {local}")))?;
                    env.insert(*dest, value);
                }
                Op::LoadLocalElement { dest, local, index } => {
                    let index = read(&env, *index)?;
                    let values = local_storage(&mut locals, function, *local)?;
                    let value = element_at(values, index)?;
                    env.insert(*dest, value);
                }
                Op::StoreLocal { local, value } => {
                    let value = read(&env, *value)?;
                    let values = local_storage(&mut locals, function, *local)?;
                    if let Some(slot) = values.first_mut() {
                        *slot = value;
                    }
                }
                Op::Binary {
                    dest,
                    op,
                    left,
                    right,
                } => {
                    let value = op.fold(read(&env, *left)?, read(&env, *right)?)?;
                    env.insert(*dest, value);
                }
                Op::BitCast { dest, src, to } => {
                    let value = read(&env, *src)?.bitcast(*to)?;
                    env.insert(*dest, value);
                }
                Op::Resize { dest, src, to } => {
                    let value = read(&env, *src)?.resize(*to)?;
                    env.insert(*dest, value);
                }
                Op::Call {
                    dest,
                    function: callee,
                    args: call_args,
                } => {
                    let values = call_args
                        .iter()
                        .map(|arg| read(&env, *arg))
                        .collect::<Result<Vec<_>>>()?;
                    let result = self.invoke(*callee, &values, depth + 1)?;
                    if let Some(dest) = dest {
                        let value = result.ok_or_else(|| {
                            Error::Evaluation(format!("call to {callee} produced no value"))
                        })?;
                        env.insert(*dest, value);
                    }
                }
                Op::Return { value } => {
                    return value.map(|var| read(&env, var)).transpose();
                }
            }
        }

        Ok(None)
    }

    fn global_type(&self, id: GlobalId) -> Result<ValueType> {
        self.module
            .global(id)
            .map(|global| global.ty)
            .ok_or_else(|| Error::Evaluation(format!("unknown global {id}")))
    }
}

fn decode_storage(ty: ValueType, bytes: &[u8]) -> Result<Vec<Value>> {
    let element = ty.element();
    if bytes.len() != ty.byte_size() {
        return Err(Error::Evaluation(format!(
            "initializer of {} bytes does not fit {}",
            bytes.len(),
            ty
        )));
    }

    bytes
        .chunks(element.byte_size().max(1))
        .map(|chunk| Value::from_le_bytes(element, chunk))
        .collect()
}

fn local_storage<'l>(
    locals: &'l mut FxHashMap<LocalId, Vec<Value>>,
    function: &crate::ir::Function,
    id: LocalId,
) -> Result<&'l mut Vec<Value>> {
    if !locals.contains_key(&id) {
        let local = function.local(id).ok_or_else(|| {
            Error::Evaluation(format!("unknown local {id} in `{}`", function.name))
        })?;
        let values = match &local.initializer {
            Some(bytes) => decode_storage(local.ty, bytes)?,
            None => {
                let zero = Value::new(local.ty.element(), 0);
                vec![zero; local.ty.element_count()]
            }
        };
        locals.insert(id, values);
    }

    locals
        .get_mut(&id)
        .ok_or_else(|| Error::Evaluation(format!("local {id} is not materialized")))
}

fn element_at(values: &[Value], index: Value) -> Result<Value> {
    if index.ty().is_float() {
        return Err(Error::Evaluation(format!(
            "element index must be an integer, got {}",
            index.ty()
        )));
    }

    usize::try_from(index.bits())
        .ok()
        .and_then(|index| values.get(index).copied())
        .ok_or_else(|| {
            Error::Evaluation(format!(
                "element index {} out of bounds for {} elements",
                index.bits(),
                values.len()
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{BinaryOp, Function, GlobalVar, LocalVar, ScalarType};

    #[test]
    fn test_arithmetic_and_globals() -> Result<()> {
        let mut module = Module::new("unit.c");
        let key = module.add_global(GlobalVar::scalar("key", Value::i32(40)));
        let table = module.add_global(GlobalVar::array(
            "table",
            ScalarType::I32,
            &[Value::i32(1), Value::i32(2), Value::i32(3)],
        ));

        let mut function = Function::new("main");
        let a = function.load_global(key);
        let idx = function.constant(Value::i32(2));
        let b = function.load_element(table, idx);
        let sum = function.binary(BinaryOp::Add, a, b);
        function.ret(Some(sum));
        module.add_function(function);

        let result = Evaluator::new(&module).call("main", &[])?;
        assert_eq!(result, Some(Value::i32(43)));
        Ok(())
    }

    #[test]
    fn test_locals_and_stores() -> Result<()> {
        let mut module = Module::new("unit.c");
        let counter = module.add_global(GlobalVar::scalar("counter", Value::i64(0)));

        let mut function = Function::new("bump");
        let step = function.add_local(LocalVar::scalar("step", Value::i64(5)));
        let current = function.load_global(counter);
        let amount = function.load_local(step);
        let next = function.binary(BinaryOp::Add, current, amount);
        function.store_global(counter, next);
        function.ret(Some(next));
        module.add_function(function);

        let mut evaluator = Evaluator::new(&module);
        assert_eq!(evaluator.call("bump", &[])?, Some(Value::i64(5)));
        assert_eq!(evaluator.call("bump", &[])?, Some(Value::i64(10)));
        assert_eq!(evaluator.global_values(counter)?, &[Value::i64(10)]);
        Ok(())
    }

    #[test]
    fn test_calls_with_arguments() -> Result<()> {
        let mut module = Module::new("unit.c");

        let mut double = Function::new("double").with_params(vec![ScalarType::I16]);
        let x = double.arg(0);
        let y = double.binary(BinaryOp::Add, x, x);
        double.ret(Some(y));
        let double = module.add_function(double);

        let mut main = Function::new("main");
        let c = main.constant(Value::i16(21));
        let r = main.call(double, vec![c]);
        main.ret(Some(r));
        module.add_function(main);

        assert_eq!(Evaluator::new(&module).call("main", &[])?, Some(Value::i16(42)));
        Ok(())
    }

    #[test]
    fn test_errors() {
        let mut module = Module::new("unit.c");
        let table = module.add_global(GlobalVar::array(
            "table",
            ScalarType::I8,
            &[Value::i8(1)],
        ));
        let external = module.add_global(GlobalVar::new(
            "external",
            ValueType::Scalar(ScalarType::I32),
            None,
        ));

        let mut oob = Function::new("oob");
        let idx = oob.constant(Value::i8(4));
        let v = oob.load_element(table, idx);
        oob.ret(Some(v));
        module.add_function(oob);

        let mut ext = Function::new("ext");
        let v = ext.load_global(external);
        ext.ret(Some(v));
        module.add_function(ext);

        let mut evaluator = Evaluator::new(&module);
        assert!(matches!(evaluator.call("oob", &[]), Err(Error::Evaluation(_))));
        assert!(matches!(evaluator.call("ext", &[]), Err(Error::Evaluation(_))));
        assert!(matches!(evaluator.call("missing", &[]), Err(Error::Evaluation(_))));
        assert!(matches!(
            evaluator.call("oob", &[Value::i8(0)]),
            Err(Error::Evaluation(_))
        ));
    }
}
