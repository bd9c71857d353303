//! Host representation of a compilation unit.
//!
//! The engine transforms a [`Module`]: one compilation unit consisting of global
//! declarations, functions with their local declarations, and a small typed,
//! straight-line instruction set. A host compiler adapter lowers its own
//! intermediate representation into this form (declaration enumeration, annotation
//! strings, in-source configuration overrides), runs the engine, and lowers the
//! mutated module back.
//!
//! # Architecture
//!
//! ```text
//! Module ("unit.c")
//!  ├─ globals:   [GlobalId] → GlobalVar { name, ty, initializer, linkage, ... }
//!  ├─ functions: [FunctionId] → Function
//!  │               ├─ locals: [LocalId] → LocalVar (tombstoned on removal)
//!  │               └─ body:   Vec<Op>   (straight-line, v0, v1, ... variables)
//!  └─ overrides: in-source defines seen before the policy boundary marker
//! ```
//!
//! Declarations are addressed by index handles ([`GlobalId`], [`LocalId`],
//! [`FunctionId`]) that stay stable for the lifetime of the module: globals and
//! functions are only ever appended, and removed locals leave an empty slot.
//!
//! # Example
//!
//! ```rust
//! use obscura::ir::{Evaluator, Function, GlobalVar, Module, Value};
//!
//! let mut module = Module::new("unit.c");
//! let key = module.add_global(GlobalVar::scalar("secret_key", Value::i32(0x1234)));
//!
//! let mut main = Function::new("main");
//! let v0 = main.load_global(key);
//! main.ret(Some(v0));
//! module.add_function(main);
//!
//! let result = Evaluator::new(&module).call("main", &[])?;
//! assert_eq!(result, Some(Value::i32(0x1234)));
//! # Ok::<(), obscura::Error>(())
//! ```

mod eval;
mod types;
mod value;

use std::fmt;

pub use eval::Evaluator;
pub use types::{ScalarType, ValueType};
pub use value::{BinaryOp, Value};

/// Name of the declaration whose presence switches a unit into explicit configuration mode.
pub const POLICY_MARKER: &str = "__enc_header_marker";

/// Handle of a global declaration within a [`Module`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GlobalId(usize);

impl GlobalId {
    /// Creates a handle from a raw index.
    #[must_use]
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Returns the underlying index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for GlobalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

/// Handle of a function within a [`Module`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FunctionId(usize);

impl FunctionId {
    /// Creates a handle from a raw index.
    #[must_use]
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Returns the underlying index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for FunctionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fn{}", self.0)
    }
}

/// Handle of a local declaration within a [`Function`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocalId(usize);

impl LocalId {
    /// Creates a handle from a raw index.
    #[must_use]
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Returns the underlying index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for LocalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

/// An instruction-level variable, unique within one [`Function`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(u32);

impl VarId {
    /// Creates a variable from a raw index.
    #[must_use]
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// Returns the underlying index.
    #[must_use]
    pub const fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for VarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

impl fmt::Display for VarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Linkage of a global declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Linkage {
    /// Visible only inside the unit, no symbol emitted.
    Private,
    /// Visible only inside the unit (`static`).
    #[default]
    Internal,
    /// Visible to other units.
    External,
}

/// Where a global declaration came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Origin {
    /// Declared in the source.
    #[default]
    Source,
    /// Created by local-to-global promotion.
    Promoted,
}

/// A module-scope declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalVar {
    /// Symbol name.
    pub name: String,
    /// Declared type.
    pub ty: ValueType,
    /// Little-endian, element-packed initializer bytes; `None` for external declarations.
    pub initializer: Option<Vec<u8>>,
    /// Symbol linkage.
    pub linkage: Linkage,
    /// Required alignment in bytes.
    pub alignment: u32,
    /// Explicit output section.
    pub section: Option<String>,
    /// Source-level annotation strings (`no_encrypt`, ...).
    pub annotations: Vec<String>,
    /// Whether the declaration came from the source or from promotion.
    pub origin: Origin,
    /// Name of the local a promoted global replaced.
    pub source_name: Option<String>,
}

impl GlobalVar {
    /// Creates an internal declaration of the given type with the given initializer bytes.
    #[must_use]
    pub fn new(name: impl Into<String>, ty: ValueType, initializer: Option<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            ty,
            initializer,
            linkage: Linkage::Internal,
            alignment: u32::try_from(ty.element().byte_size()).unwrap_or(1),
            section: None,
            annotations: Vec::new(),
            origin: Origin::Source,
            source_name: None,
        }
    }

    /// Creates an internal scalar declaration initialized to `value`.
    #[must_use]
    pub fn scalar(name: impl Into<String>, value: Value) -> Self {
        Self::new(
            name,
            ValueType::Scalar(value.ty()),
            Some(value.to_le_bytes()),
        )
    }

    /// Creates an internal array declaration initialized to `values`.
    ///
    /// All values must share one type; the element type is taken from the first.
    #[must_use]
    pub fn array(name: impl Into<String>, element: ScalarType, values: &[Value]) -> Self {
        Self::new(
            name,
            ValueType::Array(element, values.len()),
            Some(pack_values(values)),
        )
    }

    /// Creates an internal vector declaration initialized to `values`.
    #[must_use]
    pub fn vector(name: impl Into<String>, element: ScalarType, values: &[Value]) -> Self {
        Self::new(
            name,
            ValueType::Vector(element, values.len()),
            Some(pack_values(values)),
        )
    }

    /// Sets the linkage (builder pattern).
    #[must_use]
    pub fn with_linkage(mut self, linkage: Linkage) -> Self {
        self.linkage = linkage;
        self
    }

    /// Sets the output section (builder pattern).
    #[must_use]
    pub fn with_section(mut self, section: impl Into<String>) -> Self {
        self.section = Some(section.into());
        self
    }

    /// Sets the alignment (builder pattern).
    #[must_use]
    pub fn with_alignment(mut self, alignment: u32) -> Self {
        self.alignment = alignment;
        self
    }

    /// Attaches a source annotation (builder pattern).
    #[must_use]
    pub fn with_annotation(mut self, annotation: impl Into<String>) -> Self {
        self.annotations.push(annotation.into());
        self
    }
}

/// A function-scope declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalVar {
    /// Source name.
    pub name: String,
    /// Declared type.
    pub ty: ValueType,
    /// Initial value, if the declaration is initialized.
    pub initializer: Option<Vec<u8>>,
    /// Source-level annotation strings (`l2g`, `no_l2g`, `no_encrypt`).
    pub annotations: Vec<String>,
}

impl LocalVar {
    /// Creates a local declaration.
    #[must_use]
    pub fn new(name: impl Into<String>, ty: ValueType, initializer: Option<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            ty,
            initializer,
            annotations: Vec::new(),
        }
    }

    /// Creates a scalar local initialized to `value`.
    #[must_use]
    pub fn scalar(name: impl Into<String>, value: Value) -> Self {
        Self::new(
            name,
            ValueType::Scalar(value.ty()),
            Some(value.to_le_bytes()),
        )
    }

    /// Creates an array local initialized to `values`.
    #[must_use]
    pub fn array(name: impl Into<String>, element: ScalarType, values: &[Value]) -> Self {
        Self::new(
            name,
            ValueType::Array(element, values.len()),
            Some(pack_values(values)),
        )
    }

    /// Attaches a source annotation (builder pattern).
    #[must_use]
    pub fn with_annotation(mut self, annotation: impl Into<String>) -> Self {
        self.annotations.push(annotation.into());
        self
    }
}

/// Packs values into little-endian, element-packed initializer bytes.
#[must_use]
pub fn pack_values(values: &[Value]) -> Vec<u8> {
    values.iter().flat_map(|value| value.to_le_bytes()).collect()
}

/// An IR instruction.
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    /// `dest = arg index`
    Arg {
        /// Destination variable.
        dest: VarId,
        /// Parameter index.
        index: usize,
    },
    /// `dest = value`
    Const {
        /// Destination variable.
        dest: VarId,
        /// The constant.
        value: Value,
    },
    /// `dest = src`
    Copy {
        /// Destination variable.
        dest: VarId,
        /// Source variable.
        src: VarId,
    },
    /// `dest = load @global` (scalar globals)
    LoadGlobal {
        /// Destination variable.
        dest: VarId,
        /// The global read.
        global: GlobalId,
    },
    /// `dest = load @global[index]` (array and vector globals)
    LoadElement {
        /// Destination variable.
        dest: VarId,
        /// The global read.
        global: GlobalId,
        /// Integer element index.
        index: VarId,
    },
    /// `store value, @global`
    StoreGlobal {
        /// The global written.
        global: GlobalId,
        /// Stored value.
        value: VarId,
    },
    /// `dest = load %local` (scalar locals)
    LoadLocal {
        /// Destination variable.
        dest: VarId,
        /// The local read.
        local: LocalId,
    },
    /// `dest = load %local[index]` (array and vector locals)
    LoadLocalElement {
        /// Destination variable.
        dest: VarId,
        /// The local read.
        local: LocalId,
        /// Integer element index.
        index: VarId,
    },
    /// `store value, %local`
    StoreLocal {
        /// The local written.
        local: LocalId,
        /// Stored value.
        value: VarId,
    },
    /// `dest = op left, right`
    Binary {
        /// Destination variable.
        dest: VarId,
        /// The operation.
        op: BinaryOp,
        /// Left operand.
        left: VarId,
        /// Right operand.
        right: VarId,
    },
    /// `dest = bitcast src to ty` (same width reinterpretation)
    BitCast {
        /// Destination variable.
        dest: VarId,
        /// Source variable.
        src: VarId,
        /// Target type.
        to: ScalarType,
    },
    /// `dest = resize src to ty` (integer truncation or zero extension)
    Resize {
        /// Destination variable.
        dest: VarId,
        /// Source variable.
        src: VarId,
        /// Target type.
        to: ScalarType,
    },
    /// `dest = call function(args...)`
    Call {
        /// Destination variable, if the result is used.
        dest: Option<VarId>,
        /// Callee.
        function: FunctionId,
        /// Arguments.
        args: Vec<VarId>,
    },
    /// `ret value`
    Return {
        /// Returned variable.
        value: Option<VarId>,
    },
}

impl Op {
    /// Returns the variable defined by this instruction, if any.
    #[must_use]
    pub fn dest(&self) -> Option<VarId> {
        match self {
            Self::Arg { dest, .. }
            | Self::Const { dest, .. }
            | Self::Copy { dest, .. }
            | Self::LoadGlobal { dest, .. }
            | Self::LoadElement { dest, .. }
            | Self::LoadLocal { dest, .. }
            | Self::LoadLocalElement { dest, .. }
            | Self::Binary { dest, .. }
            | Self::BitCast { dest, .. }
            | Self::Resize { dest, .. } => Some(*dest),
            Self::Call { dest, .. } => *dest,
            Self::StoreGlobal { .. } | Self::StoreLocal { .. } | Self::Return { .. } => None,
        }
    }

    /// Returns the variables read by this instruction.
    #[must_use]
    pub fn uses(&self) -> Vec<VarId> {
        match self {
            Self::Arg { .. }
            | Self::Const { .. }
            | Self::LoadGlobal { .. }
            | Self::LoadLocal { .. } => vec![],
            Self::Copy { src, .. } | Self::BitCast { src, .. } | Self::Resize { src, .. } => {
                vec![*src]
            }
            Self::LoadElement { index, .. } | Self::LoadLocalElement { index, .. } => {
                vec![*index]
            }
            Self::StoreGlobal { value, .. } | Self::StoreLocal { value, .. } => vec![*value],
            Self::Binary { left, right, .. } => vec![*left, *right],
            Self::Call { args, .. } => args.clone(),
            Self::Return { value } => value.iter().copied().collect(),
        }
    }

    /// Returns the global read by this instruction, if it is a global load.
    #[must_use]
    pub fn global_read(&self) -> Option<GlobalId> {
        match self {
            Self::LoadGlobal { global, .. } | Self::LoadElement { global, .. } => Some(*global),
            _ => None,
        }
    }

    /// Returns the local read by this instruction, if it is a local load.
    #[must_use]
    pub fn local_read(&self) -> Option<LocalId> {
        match self {
            Self::LoadLocal { local, .. } | Self::LoadLocalElement { local, .. } => Some(*local),
            _ => None,
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Arg { dest, index } => write!(f, "{dest} = arg {index}"),
            Self::Const { dest, value } => write!(f, "{dest} = {value}"),
            Self::Copy { dest, src } => write!(f, "{dest} = {src}"),
            Self::LoadGlobal { dest, global } => write!(f, "{dest} = load {global}"),
            Self::LoadElement {
                dest,
                global,
                index,
            } => write!(f, "{dest} = load {global}[{index}]"),
            Self::StoreGlobal { global, value } => write!(f, "store {value}, {global}"),
            Self::LoadLocal { dest, local } => write!(f, "{dest} = load {local}"),
            Self::LoadLocalElement { dest, local, index } => {
                write!(f, "{dest} = load {local}[{index}]")
            }
            Self::StoreLocal { local, value } => write!(f, "store {value}, {local}"),
            Self::Binary {
                dest,
                op,
                left,
                right,
            } => write!(f, "{dest} = {op} {left}, {right}"),
            Self::BitCast { dest, src, to } => write!(f, "{dest} = bitcast {src} to {to}"),
            Self::Resize { dest, src, to } => write!(f, "{dest} = resize {src} to {to}"),
            Self::Call {
                dest,
                function,
                args,
            } => {
                let args = args
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", ");
                match dest {
                    Some(dest) => write!(f, "{dest} = call {function}({args})"),
                    None => write!(f, "call {function}({args})"),
                }
            }
            Self::Return { value: Some(value) } => write!(f, "ret {value}"),
            Self::Return { value: None } => f.write_str("ret"),
        }
    }
}

/// A function: parameters, local declarations and a straight-line body.
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    /// Symbol name.
    pub name: String,
    /// Parameter types, read with [`Op::Arg`].
    pub params: Vec<ScalarType>,
    /// `true` for decode routines created by the engine.
    pub generated: bool,
    locals: Vec<Option<LocalVar>>,
    body: Vec<Op>,
    next_var: u32,
}

impl Function {
    /// Creates an empty function without parameters.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            generated: false,
            locals: Vec::new(),
            body: Vec::new(),
            next_var: 0,
        }
    }

    /// Sets the parameter types (builder pattern).
    #[must_use]
    pub fn with_params(mut self, params: Vec<ScalarType>) -> Self {
        self.params = params;
        self
    }

    /// Returns the handle the next [`Function::add_local`] will assign.
    #[must_use]
    pub fn next_local_id(&self) -> LocalId {
        LocalId(self.locals.len())
    }

    /// Declares a local and returns its handle.
    pub fn add_local(&mut self, local: LocalVar) -> LocalId {
        self.locals.push(Some(local));
        LocalId(self.locals.len() - 1)
    }

    /// Returns a live local declaration.
    #[must_use]
    pub fn local(&self, id: LocalId) -> Option<&LocalVar> {
        self.locals.get(id.0).and_then(Option::as_ref)
    }

    /// Iterates all live local declarations.
    pub fn locals(&self) -> impl Iterator<Item = (LocalId, &LocalVar)> {
        self.locals
            .iter()
            .enumerate()
            .filter_map(|(index, local)| local.as_ref().map(|local| (LocalId(index), local)))
    }

    /// Removes a local declaration, leaving its slot empty.
    pub fn remove_local(&mut self, id: LocalId) -> Option<LocalVar> {
        self.locals.get_mut(id.0).and_then(Option::take)
    }

    /// Returns `true` if any instruction stores to the local.
    #[must_use]
    pub fn is_local_stored(&self, id: LocalId) -> bool {
        self.body
            .iter()
            .any(|op| matches!(op, Op::StoreLocal { local, .. } if *local == id))
    }

    /// Returns the instruction list.
    #[must_use]
    pub fn body(&self) -> &[Op] {
        &self.body
    }

    /// Returns the instruction list for in-place edits.
    pub fn body_mut(&mut self) -> &mut Vec<Op> {
        &mut self.body
    }

    /// Replaces the instruction list.
    pub fn set_body(&mut self, body: Vec<Op>) {
        if let Some(max) = body.iter().filter_map(Op::dest).map(|var| var.0 + 1).max() {
            self.next_var = self.next_var.max(max);
        }
        self.body = body;
    }

    /// Allocates a fresh variable.
    pub fn fresh_var(&mut self) -> VarId {
        let var = VarId(self.next_var);
        self.next_var += 1;
        var
    }

    /// Appends an instruction.
    pub fn push(&mut self, op: Op) {
        if let Some(dest) = op.dest() {
            self.next_var = self.next_var.max(dest.0 + 1);
        }
        self.body.push(op);
    }

    /// Appends `dest = arg index` and returns `dest`.
    pub fn arg(&mut self, index: usize) -> VarId {
        let dest = self.fresh_var();
        self.push(Op::Arg { dest, index });
        dest
    }

    /// Appends `dest = value` and returns `dest`.
    pub fn constant(&mut self, value: Value) -> VarId {
        let dest = self.fresh_var();
        self.push(Op::Const { dest, value });
        dest
    }

    /// Appends `dest = load @global` and returns `dest`.
    pub fn load_global(&mut self, global: GlobalId) -> VarId {
        let dest = self.fresh_var();
        self.push(Op::LoadGlobal { dest, global });
        dest
    }

    /// Appends `dest = load @global[index]` and returns `dest`.
    pub fn load_element(&mut self, global: GlobalId, index: VarId) -> VarId {
        let dest = self.fresh_var();
        self.push(Op::LoadElement {
            dest,
            global,
            index,
        });
        dest
    }

    /// Appends `store value, @global`.
    pub fn store_global(&mut self, global: GlobalId, value: VarId) {
        self.push(Op::StoreGlobal { global, value });
    }

    /// Appends `dest = load %local` and returns `dest`.
    pub fn load_local(&mut self, local: LocalId) -> VarId {
        let dest = self.fresh_var();
        self.push(Op::LoadLocal { dest, local });
        dest
    }

    /// Appends `dest = load %local[index]` and returns `dest`.
    pub fn load_local_element(&mut self, local: LocalId, index: VarId) -> VarId {
        let dest = self.fresh_var();
        self.push(Op::LoadLocalElement { dest, local, index });
        dest
    }

    /// Appends `store value, %local`.
    pub fn store_local(&mut self, local: LocalId, value: VarId) {
        self.push(Op::StoreLocal { local, value });
    }

    /// Appends `dest = op left, right` and returns `dest`.
    pub fn binary(&mut self, op: BinaryOp, left: VarId, right: VarId) -> VarId {
        let dest = self.fresh_var();
        self.push(Op::Binary {
            dest,
            op,
            left,
            right,
        });
        dest
    }

    /// Appends `dest = call function(args)` and returns `dest`.
    pub fn call(&mut self, function: FunctionId, args: Vec<VarId>) -> VarId {
        let dest = self.fresh_var();
        self.push(Op::Call {
            dest: Some(dest),
            function,
            args,
        });
        dest
    }

    /// Appends `ret value`.
    pub fn ret(&mut self, value: Option<VarId>) {
        self.push(Op::Return { value });
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "fn {} {{", self.name)?;
        for (id, local) in self.locals() {
            writeln!(f, "  {id} {}: {}", local.name, local.ty)?;
        }
        for op in &self.body {
            writeln!(f, "  {op}")?;
        }
        f.write_str("}")
    }
}

/// One compilation unit.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Module {
    /// Stable identity of the unit (source path), part of every key derivation.
    pub id: String,
    /// In-source `NAME[=VALUE]` overrides the host found before the policy marker.
    pub overrides: Vec<(String, Option<String>)>,
    globals: Vec<GlobalVar>,
    functions: Vec<Function>,
}

impl Module {
    /// Creates an empty unit.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Records an in-source override (builder pattern).
    #[must_use]
    pub fn with_override(mut self, name: impl Into<String>, value: Option<&str>) -> Self {
        self.overrides
            .push((name.into(), value.map(ToString::to_string)));
        self
    }

    /// Adds the policy boundary marker declaration, switching to explicit mode.
    pub fn add_policy_marker(&mut self) -> GlobalId {
        self.add_global(GlobalVar::scalar(POLICY_MARKER, Value::i32(1)))
    }

    /// Returns `true` if the policy boundary marker is declared.
    #[must_use]
    pub fn has_policy_marker(&self) -> bool {
        self.find_global(POLICY_MARKER).is_some()
    }

    /// Appends a global declaration.
    pub fn add_global(&mut self, global: GlobalVar) -> GlobalId {
        self.globals.push(global);
        GlobalId(self.globals.len() - 1)
    }

    /// Returns a global declaration.
    #[must_use]
    pub fn global(&self, id: GlobalId) -> Option<&GlobalVar> {
        self.globals.get(id.0)
    }

    /// Returns a global declaration for modification.
    pub fn global_mut(&mut self, id: GlobalId) -> Option<&mut GlobalVar> {
        self.globals.get_mut(id.0)
    }

    /// Iterates all global declarations.
    pub fn globals(&self) -> impl Iterator<Item = (GlobalId, &GlobalVar)> {
        self.globals
            .iter()
            .enumerate()
            .map(|(index, global)| (GlobalId(index), global))
    }

    /// Finds a global by name.
    #[must_use]
    pub fn find_global(&self, name: &str) -> Option<GlobalId> {
        self.globals
            .iter()
            .position(|global| global.name == name)
            .map(GlobalId)
    }

    /// Returns `true` if any function stores to the global.
    #[must_use]
    pub fn is_global_stored(&self, id: GlobalId) -> bool {
        self.functions.iter().any(|function| {
            function
                .body
                .iter()
                .any(|op| matches!(op, Op::StoreGlobal { global, .. } if *global == id))
        })
    }

    /// Appends a function.
    pub fn add_function(&mut self, function: Function) -> FunctionId {
        self.functions.push(function);
        FunctionId(self.functions.len() - 1)
    }

    /// Returns a function.
    #[must_use]
    pub fn function(&self, id: FunctionId) -> Option<&Function> {
        self.functions.get(id.0)
    }

    /// Returns a function for modification.
    pub fn function_mut(&mut self, id: FunctionId) -> Option<&mut Function> {
        self.functions.get_mut(id.0)
    }

    /// Iterates all functions.
    pub fn functions(&self) -> impl Iterator<Item = (FunctionId, &Function)> {
        self.functions
            .iter()
            .enumerate()
            .map(|(index, function)| (FunctionId(index), function))
    }

    /// Returns the number of functions.
    #[must_use]
    pub fn function_count(&self) -> usize {
        self.functions.len()
    }

    /// Finds a function by name.
    #[must_use]
    pub fn find_function(&self, name: &str) -> Option<FunctionId> {
        self.functions
            .iter()
            .position(|function| function.name == name)
            .map(FunctionId)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_tombstones() {
        let mut function = Function::new("f");
        let a = function.add_local(LocalVar::scalar("a", Value::i32(1)));
        let b = function.add_local(LocalVar::scalar("b", Value::i32(2)));

        assert!(function.remove_local(a).is_some());
        assert!(function.local(a).is_none());
        assert_eq!(function.local(b).map(|l| l.name.as_str()), Some("b"));
        assert_eq!(function.locals().count(), 1);
        assert!(function.remove_local(a).is_none());
    }

    #[test]
    fn test_fresh_vars_follow_pushed_ops() {
        let mut function = Function::new("f");
        function.push(Op::Const {
            dest: VarId::new(7),
            value: Value::i8(1),
        });
        assert_eq!(function.fresh_var(), VarId::new(8));
    }

    #[test]
    fn test_policy_marker() {
        let mut module = Module::new("unit.c");
        assert!(!module.has_policy_marker());
        module.add_policy_marker();
        assert!(module.has_policy_marker());
    }

    #[test]
    fn test_store_detection() {
        let mut module = Module::new("unit.c");
        let g = module.add_global(GlobalVar::scalar("counter", Value::i32(0)));
        let h = module.add_global(GlobalVar::scalar("limit", Value::i32(10)));

        let mut function = Function::new("tick");
        let one = function.constant(Value::i32(1));
        function.store_global(g, one);
        module.add_function(function);

        assert!(module.is_global_stored(g));
        assert!(!module.is_global_stored(h));
    }

    #[test]
    fn test_display() {
        let mut function = Function::new("f");
        let a = function.constant(Value::i32(2));
        let b = function.constant(Value::i32(3));
        let c = function.binary(BinaryOp::Add, a, b);
        function.ret(Some(c));

        let text = function.to_string();
        assert!(text.contains("v2 = add v0, v1"));
        assert!(text.contains("ret v2"));
    }

    #[test]
    fn test_array_initializer_layout() {
        let global = GlobalVar::array(
            "table",
            ScalarType::I16,
            &[Value::i16(0x0102), Value::i16(0x0304)],
        );
        assert_eq!(global.initializer, Some(vec![0x02, 0x01, 0x04, 0x03]));
        assert_eq!(global.ty, ValueType::Array(ScalarType::I16, 2));
        assert_eq!(global.alignment, 2);
    }
}
