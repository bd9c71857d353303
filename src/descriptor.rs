//! Value descriptors: the engine's view of one candidate declaration.
//!
//! A [`ValueDescriptor`] is pure data extracted from the host representation. It
//! carries everything the filter, promotion and encryption stages need to decide
//! about a declaration (name, scope, type shape, annotations, initializer bytes)
//! plus a [`DeclRef`] pointing back at the declaration it was built from.
//!
//! Descriptors of one unit live in a [`DescriptorTable`], an arena addressed by
//! [`DescriptorId`].

use std::ops::Index;

use bitflags::bitflags;
use strum::{Display, EnumIter};

use crate::ir::{FunctionId, GlobalId, GlobalVar, LocalId, LocalVar, Module, ScalarType, ValueType};

/// Prefixes of declarations that belong to the configuration plumbing.
pub const RESERVED_PREFIXES: [&str; 2] = ["__enc_", "__l2g_"];

/// Whether a declaration lives at module or function scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum Scope {
    /// Module-scope declaration.
    Global,
    /// Function-scope declaration.
    Local,
}

/// Shape and element kind of a declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum TypeCategory {
    /// Scalar integer.
    Integer,
    /// Scalar float.
    Float,
    /// Array of integers.
    IntegerArray,
    /// Array of floats.
    FloatArray,
    /// SIMD-style vector of integers or floats.
    Vector,
}

impl TypeCategory {
    /// Returns `true` for arrays and vectors.
    #[must_use]
    pub const fn is_aggregate(self) -> bool {
        matches!(self, Self::IntegerArray | Self::FloatArray | Self::Vector)
    }
}

/// Kind of the scalar elements of a declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum ElementKind {
    /// Integer elements.
    Integer,
    /// Floating point elements.
    Float,
}

bitflags! {
    /// Source-level annotation tags attached to a declaration.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Annotations: u8 {
        /// Never encrypt (`no_encrypt`).
        const NO_ENCRYPT = 0b001;
        /// Always promote to module scope (`l2g`).
        const PROMOTE = 0b010;
        /// Exclude from automatic promotion (`no_l2g`).
        const NO_PROMOTE = 0b100;
    }
}

impl Annotations {
    /// Parses host annotation strings; unknown strings are ignored.
    #[must_use]
    pub fn parse<S: AsRef<str>>(strings: &[S]) -> Self {
        strings
            .iter()
            .fold(Self::empty(), |acc, tag| match tag.as_ref().trim() {
                "no_encrypt" => acc | Self::NO_ENCRYPT,
                "l2g" => acc | Self::PROMOTE,
                "no_l2g" => acc | Self::NO_PROMOTE,
                _ => acc,
            })
    }

    /// Returns the host annotation strings for these tags.
    #[must_use]
    pub fn to_strings(self) -> Vec<String> {
        let mut strings = Vec::new();
        if self.contains(Self::NO_ENCRYPT) {
            strings.push("no_encrypt".to_string());
        }
        if self.contains(Self::PROMOTE) {
            strings.push("l2g".to_string());
        }
        if self.contains(Self::NO_PROMOTE) {
            strings.push("no_l2g".to_string());
        }
        strings
    }
}

/// Back reference from a descriptor to the declaration it describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeclRef {
    /// A module-scope declaration.
    Global(GlobalId),
    /// A local of a function.
    Local(FunctionId, LocalId),
}

/// One candidate declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueDescriptor {
    /// Identifier.
    pub name: String,
    /// Module or function scope.
    pub scope: Scope,
    /// Shape and element kind.
    pub category: TypeCategory,
    /// Kind of the scalar elements.
    pub element_kind: ElementKind,
    /// Width of one scalar element in bits.
    pub bit_width: u32,
    /// 1 for scalars, N for arrays and vectors.
    pub element_count: usize,
    /// Source annotation tags.
    pub annotations: Annotations,
    /// Little-endian, element-packed initializer bytes.
    pub initial_value: Vec<u8>,
    /// The declaration this descriptor was built from.
    pub decl: DeclRef,
    /// Name of the local a promoted global replaced.
    pub source_name: Option<String>,
}

impl ValueDescriptor {
    /// Builds a descriptor from a type, an initializer and annotation strings.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        decl: DeclRef,
        ty: ValueType,
        initial_value: Vec<u8>,
        annotations: Annotations,
    ) -> Self {
        let element = ty.element();
        let element_kind = if element.is_float() {
            ElementKind::Float
        } else {
            ElementKind::Integer
        };
        let category = match (ty, element_kind) {
            (ValueType::Scalar(_), ElementKind::Integer) => TypeCategory::Integer,
            (ValueType::Scalar(_), ElementKind::Float) => TypeCategory::Float,
            (ValueType::Array(..), ElementKind::Integer) => TypeCategory::IntegerArray,
            (ValueType::Array(..), ElementKind::Float) => TypeCategory::FloatArray,
            (ValueType::Vector(..), _) => TypeCategory::Vector,
        };

        Self {
            name: name.into(),
            scope: match decl {
                DeclRef::Global(_) => Scope::Global,
                DeclRef::Local(..) => Scope::Local,
            },
            category,
            element_kind,
            bit_width: element.bits(),
            element_count: ty.element_count(),
            annotations,
            initial_value,
            decl,
            source_name: None,
        }
    }

    /// Builds a descriptor for a global; `None` without an initializer.
    #[must_use]
    pub fn from_global(id: GlobalId, global: &GlobalVar) -> Option<Self> {
        let bytes = global.initializer.clone()?;
        let mut descriptor = Self::new(
            global.name.clone(),
            DeclRef::Global(id),
            global.ty,
            bytes,
            Annotations::parse(&global.annotations),
        );
        descriptor.source_name.clone_from(&global.source_name);
        Some(descriptor)
    }

    /// Builds a descriptor for a local; `None` without an initializer.
    #[must_use]
    pub fn from_local(function: FunctionId, id: LocalId, local: &LocalVar) -> Option<Self> {
        let bytes = local.initializer.clone()?;
        Some(Self::new(
            local.name.clone(),
            DeclRef::Local(function, id),
            local.ty,
            bytes,
            Annotations::parse(&local.annotations),
        ))
    }

    /// The name seen by name filters.
    ///
    /// A promoted global is matched by the local it replaced, not by its
    /// `<function>.<local>` symbol.
    #[must_use]
    pub fn filter_name(&self) -> &str {
        self.source_name.as_deref().unwrap_or(&self.name)
    }

    /// Returns the scalar element type.
    #[must_use]
    pub fn element_type(&self) -> ScalarType {
        let bits = u16::try_from(self.bit_width).unwrap_or(u16::MAX);
        match self.element_kind {
            ElementKind::Integer => ScalarType::Int(bits),
            ElementKind::Float => ScalarType::Float(bits),
        }
    }

    /// Returns the declared type.
    #[must_use]
    pub fn value_type(&self) -> ValueType {
        let element = self.element_type();
        match self.category {
            TypeCategory::Integer | TypeCategory::Float => ValueType::Scalar(element),
            TypeCategory::IntegerArray | TypeCategory::FloatArray => {
                ValueType::Array(element, self.element_count)
            }
            TypeCategory::Vector => ValueType::Vector(element, self.element_count),
        }
    }

    /// Returns the size of one element in bytes.
    #[must_use]
    pub fn element_size(&self) -> usize {
        (self.bit_width as usize).div_ceil(8)
    }

    /// Returns `true` for arrays and vectors.
    #[must_use]
    pub fn is_aggregate(&self) -> bool {
        self.category.is_aggregate()
    }

    /// Returns `true` if the name is part of the configuration plumbing.
    #[must_use]
    pub fn is_reserved(&self) -> bool {
        RESERVED_PREFIXES
            .iter()
            .any(|prefix| self.name.starts_with(prefix))
    }

    /// Returns `true` if the engine can transform this declaration.
    ///
    /// Integers must be 8, 16, 32 or 64 bits wide, floats 32 or 64 bits, and the
    /// initializer must be exactly `element_count` elements of that width.
    #[must_use]
    pub fn is_supported(&self) -> bool {
        let width_ok = match self.element_kind {
            ElementKind::Integer => matches!(self.bit_width, 8 | 16 | 32 | 64),
            ElementKind::Float => matches!(self.bit_width, 32 | 64),
        };
        width_ok
            && self.element_count > 0
            && self.initial_value.len() == self.element_size() * self.element_count
    }
}

/// Handle of a descriptor within a [`DescriptorTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DescriptorId(usize);

impl DescriptorId {
    /// Returns the underlying index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

/// Arena of the descriptors discovered in one unit.
#[derive(Debug, Clone, Default)]
pub struct DescriptorTable {
    entries: Vec<ValueDescriptor>,
}

impl DescriptorTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Collects the module-scope candidates of a unit.
    ///
    /// A global is a candidate when it has an initializer, internal or private
    /// linkage, and is never stored to.
    #[must_use]
    pub fn globals(module: &Module) -> Self {
        let mut table = Self::new();
        for (id, global) in module.globals() {
            if global.linkage == crate::ir::Linkage::External || module.is_global_stored(id) {
                continue;
            }
            if let Some(descriptor) = ValueDescriptor::from_global(id, global) {
                table.push(descriptor);
            }
        }
        table
    }

    /// Collects the constant locals of every source function of a unit.
    ///
    /// A local is constant when it has an initializer and is never stored to.
    #[must_use]
    pub fn locals(module: &Module) -> Self {
        let mut table = Self::new();
        for (function_id, function) in module.functions() {
            if function.generated {
                continue;
            }
            for (local_id, local) in function.locals() {
                if function.is_local_stored(local_id) {
                    continue;
                }
                if let Some(descriptor) = ValueDescriptor::from_local(function_id, local_id, local)
                {
                    table.push(descriptor);
                }
            }
        }
        table
    }

    /// Adds a descriptor and returns its handle.
    pub fn push(&mut self, descriptor: ValueDescriptor) -> DescriptorId {
        self.entries.push(descriptor);
        DescriptorId(self.entries.len() - 1)
    }

    /// Returns a descriptor.
    #[must_use]
    pub fn get(&self, id: DescriptorId) -> Option<&ValueDescriptor> {
        self.entries.get(id.0)
    }

    /// Iterates all descriptors with their handles.
    pub fn iter(&self) -> impl Iterator<Item = (DescriptorId, &ValueDescriptor)> {
        self.entries
            .iter()
            .enumerate()
            .map(|(index, descriptor)| (DescriptorId(index), descriptor))
    }

    /// Returns the number of descriptors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Index<DescriptorId> for DescriptorTable {
    type Output = ValueDescriptor;

    fn index(&self, id: DescriptorId) -> &Self::Output {
        &self.entries[id.0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Function, Linkage, Value};

    #[test]
    fn test_annotation_parsing() {
        let tags = Annotations::parse(&["l2g", "no_encrypt", "hot", " no_l2g "]);
        assert_eq!(
            tags,
            Annotations::PROMOTE | Annotations::NO_ENCRYPT | Annotations::NO_PROMOTE
        );
        assert_eq!(Annotations::parse::<&str>(&[]), Annotations::empty());
        assert_eq!(
            Annotations::NO_ENCRYPT.to_strings(),
            vec!["no_encrypt".to_string()]
        );
    }

    #[test]
    fn test_categories() {
        let global = GlobalVar::array(
            "lookup_table",
            ScalarType::F32,
            &[Value::f32(1.0), Value::f32(2.0)],
        );
        let descriptor = ValueDescriptor::from_global(GlobalId::new(0), &global).unwrap();
        assert_eq!(descriptor.category, TypeCategory::FloatArray);
        assert_eq!(descriptor.element_kind, ElementKind::Float);
        assert_eq!(descriptor.bit_width, 32);
        assert_eq!(descriptor.element_count, 2);
        assert!(descriptor.is_aggregate());
        assert_eq!(descriptor.scope, Scope::Global);

        let vector = GlobalVar::vector("v", ScalarType::I16, &[Value::i16(1); 4]);
        let descriptor = ValueDescriptor::from_global(GlobalId::new(1), &vector).unwrap();
        assert_eq!(descriptor.category, TypeCategory::Vector);
        assert_eq!(descriptor.element_kind, ElementKind::Integer);
    }

    #[test]
    fn test_supported_widths() {
        let make = |ty: ScalarType| {
            let bytes = vec![0u8; ty.byte_size()];
            ValueDescriptor::new(
                "x",
                DeclRef::Global(GlobalId::new(0)),
                ValueType::Scalar(ty),
                bytes,
                Annotations::empty(),
            )
        };

        for ty in [
            ScalarType::I8,
            ScalarType::I16,
            ScalarType::I32,
            ScalarType::I64,
            ScalarType::F32,
            ScalarType::F64,
        ] {
            assert!(make(ty).is_supported(), "{ty} should be supported");
        }
        for ty in [
            ScalarType::Int(1),
            ScalarType::Int(24),
            ScalarType::Int(128),
            ScalarType::Float(16),
        ] {
            assert!(!make(ty).is_supported(), "{ty} should not be supported");
        }

        let mut truncated = make(ScalarType::I32);
        truncated.initial_value.pop();
        assert!(!truncated.is_supported());
    }

    #[test]
    fn test_reserved_names() {
        let mut module = Module::new("unit.c");
        module.add_policy_marker();
        let table = DescriptorTable::globals(&module);
        assert_eq!(table.len(), 1);
        assert!(table.iter().all(|(_, d)| d.is_reserved()));
    }

    #[test]
    fn test_global_discovery() {
        let mut module = Module::new("unit.c");
        module.add_global(GlobalVar::scalar("secret_key", Value::i32(0x1234)));
        module.add_global(
            GlobalVar::scalar("exported", Value::i32(1)).with_linkage(Linkage::External),
        );
        let counter = module.add_global(GlobalVar::scalar("counter", Value::i32(0)));
        module.add_global(GlobalVar::new(
            "declared",
            ValueType::Scalar(ScalarType::I32),
            None,
        ));

        let mut function = Function::new("tick");
        let v = function.constant(Value::i32(1));
        function.store_global(counter, v);
        module.add_function(function);

        let table = DescriptorTable::globals(&module);
        let names: Vec<_> = table.iter().map(|(_, d)| d.name.as_str()).collect();
        assert_eq!(names, vec!["secret_key"]);
    }

    #[test]
    fn test_local_discovery() {
        let mut module = Module::new("unit.c");
        let mut function = Function::new("main");
        function.add_local(LocalVar::scalar("local_secret", Value::i32(7)).with_annotation("l2g"));
        let mutable = function.add_local(LocalVar::scalar("i", Value::i32(0)));
        function.add_local(LocalVar::new(
            "uninit",
            ValueType::Scalar(ScalarType::I32),
            None,
        ));
        let v = function.constant(Value::i32(1));
        function.store_local(mutable, v);
        let main = module.add_function(function);

        let table = DescriptorTable::locals(&module);
        assert_eq!(table.len(), 1);
        let (id, descriptor) = table.iter().next().unwrap();
        assert_eq!(table[id].name, "local_secret");
        assert_eq!(descriptor.scope, Scope::Local);
        assert!(descriptor.annotations.contains(Annotations::PROMOTE));
        assert!(matches!(descriptor.decl, DeclRef::Local(f, _) if f == main));
    }
}
