//! Ciphertext generation for included declarations.
//!
//! For each included descriptor the engine derives one [`IterationKey`] per
//! iteration of every admissible level (Lite first, then Deep, in canonical
//! order), encodes the initializer element by element, and packages the result
//! as an [`EncryptedArtifact`] for the rewriter.
//!
//! # Example
//!
//! ```rust
//! use obscura::{
//!     compiler::EventLog,
//!     config::{EffectivePolicy, Levels},
//!     descriptor::DescriptorTable,
//!     encryption::{DecryptionMode, EncryptionEngine},
//!     ir::{GlobalVar, Module, Value},
//! };
//!
//! let mut module = Module::new("unit.c");
//! module.add_global(GlobalVar::scalar("secret_key", Value::i32(0x1234)));
//! let table = DescriptorTable::globals(&module);
//! let (_, descriptor) = table.iter().next().unwrap();
//!
//! let policy = EffectivePolicy::implicit();
//! let engine = EncryptionEngine::new(0, "unit.c");
//! let artifact = engine
//!     .encrypt(descriptor, policy.levels, &policy, &EventLog::new())?
//!     .unwrap();
//!
//! assert_eq!(artifact.mode, DecryptionMode::CallDeep);
//! assert_eq!(artifact.cipher_bytes.len(), 4);
//! assert_eq!(artifact.decrypt()?, Value::i32(0x1234).to_le_bytes());
//! # Ok::<(), obscura::Error>(())
//! ```

mod artifact;
mod keys;
pub mod transform;

pub use artifact::{DecryptionMode, EncryptedArtifact};
pub use keys::{IterationKey, KeySchedule, KEY_STRIDE, SALT_STRIDE};

use crate::{
    compiler::{EventKind, EventLog},
    config::{EffectivePolicy, Level, Levels},
    descriptor::{DeclRef, ValueDescriptor},
    Result,
};

/// Produces ciphertext and key material for the declarations of one unit.
#[derive(Debug, Clone)]
pub struct EncryptionEngine<'a> {
    schedule: KeySchedule<'a>,
}

impl<'a> EncryptionEngine<'a> {
    /// Creates an engine keyed by a seed and the unit identity.
    #[must_use]
    pub const fn new(seed: u64, unit_id: &'a str) -> Self {
        Self {
            schedule: KeySchedule::new(seed, unit_id),
        }
    }

    /// Encrypts one included global at the given admissible levels.
    ///
    /// Returns `Ok(None)` when there is nothing to do: no admissible level, or a
    /// type the engine does not model (reported as [`EventKind::UnsupportedType`]
    /// and left as plaintext).
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if the descriptor refers to a local.
    pub fn encrypt(
        &self,
        descriptor: &ValueDescriptor,
        levels: Levels,
        policy: &EffectivePolicy,
        events: &EventLog,
    ) -> Result<Option<EncryptedArtifact>> {
        let DeclRef::Global(global) = descriptor.decl else {
            return Err(malformed_error!(
                "local `{}` reached encryption without promotion",
                descriptor.name
            ));
        };

        if levels.is_empty() {
            return Ok(None);
        }

        if !descriptor.is_supported() {
            events
                .record(EventKind::UnsupportedType)
                .declaration(descriptor.name.clone())
                .message(format!(
                    "{} x{} ({} bytes) left as plaintext",
                    descriptor.element_type(),
                    descriptor.element_count,
                    descriptor.initial_value.len()
                ));
            return Ok(None);
        }

        let derive = |level: Level| {
            if levels.has(level) {
                self.schedule
                    .derive_level(&descriptor.name, level, policy.iterations(level))
            } else {
                Vec::new()
            }
        };
        let lite = derive(Level::Lite);
        let deep = derive(Level::Deep);

        let cipher_bytes = transform::encode_payload(
            descriptor.element_type(),
            &descriptor.initial_value,
            &lite,
            &deep,
        )?;

        let mode = match (deep.is_empty(), policy.deep_inline) {
            (true, _) => DecryptionMode::InlineLite,
            (false, true) => DecryptionMode::InlineDeep,
            (false, false) => DecryptionMode::CallDeep,
        };

        let artifact = EncryptedArtifact {
            global,
            name: descriptor.name.clone(),
            ty: descriptor.value_type(),
            cipher_bytes,
            lite,
            deep,
            mode,
        };

        let kind = if descriptor.is_aggregate() {
            EventKind::ArrayEncrypted
        } else {
            EventKind::ConstantEncrypted
        };
        events
            .record(kind)
            .declaration(descriptor.name.clone())
            .message(artifact.to_string());
        log::debug!("encrypted {artifact}");

        Ok(Some(artifact))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        descriptor::{Annotations, DescriptorTable},
        ir::{FunctionId, GlobalId, GlobalVar, LocalId, Module, ScalarType, Value, ValueType},
    };

    fn global(module: &mut Module, global: GlobalVar) -> ValueDescriptor {
        let id = module.add_global(global);
        let table = DescriptorTable::globals(module);
        let descriptor = table
            .iter()
            .map(|(_, d)| d.clone())
            .find(|d| d.decl == DeclRef::Global(id))
            .unwrap();
        descriptor
    }

    #[test]
    fn test_modes() -> Result<()> {
        let mut module = Module::new("unit.c");
        let descriptor = global(&mut module, GlobalVar::scalar("secret_key", Value::i32(7)));
        let engine = EncryptionEngine::new(1, "unit.c");
        let events = EventLog::new();

        let policy = EffectivePolicy::disabled().with_levels(Levels::LITE);
        let artifact = engine.encrypt(&descriptor, policy.levels, &policy, &events)?.unwrap();
        assert_eq!(artifact.mode, DecryptionMode::InlineLite);
        assert_eq!(artifact.iterations(Level::Deep), 0);

        let policy = EffectivePolicy::implicit().with_deep_inline(true);
        let artifact = engine.encrypt(&descriptor, policy.levels, &policy, &events)?.unwrap();
        assert_eq!(artifact.mode, DecryptionMode::InlineDeep);

        let policy = EffectivePolicy::disabled().with_levels(Levels::DEEP);
        let artifact = engine.encrypt(&descriptor, policy.levels, &policy, &events)?.unwrap();
        assert_eq!(artifact.mode, DecryptionMode::CallDeep);
        assert_eq!(artifact.iterations(Level::Lite), 0);

        assert_eq!(events.count_kind(EventKind::ConstantEncrypted), 3);
        Ok(())
    }

    #[test]
    fn test_iterations_and_round_trip() -> Result<()> {
        let mut module = Module::new("unit.c");
        let values: Vec<Value> = (0..8).map(|i| Value::i32(0x10 * (i + 1))).collect();
        let descriptor = global(
            &mut module,
            GlobalVar::array("lookup_table", ScalarType::I32, &values),
        );
        let engine = EncryptionEngine::new(1, "unit.c");
        let events = EventLog::new();

        for iterations in 1..=15 {
            let policy = EffectivePolicy::implicit()
                .with_iterations(Level::Lite, iterations)
                .with_iterations(Level::Deep, 16 - iterations);
            let artifact = engine.encrypt(&descriptor, policy.levels, &policy, &events)?.unwrap();
            assert_eq!(artifact.iterations(Level::Lite), iterations as usize);
            assert_eq!(artifact.iterations(Level::Deep), (16 - iterations) as usize);
            assert_eq!(artifact.cipher_bytes.len(), descriptor.initial_value.len());
            assert_ne!(artifact.cipher_bytes, descriptor.initial_value);
            assert_eq!(artifact.decrypt()?, descriptor.initial_value);
        }
        assert_eq!(events.count_kind(EventKind::ArrayEncrypted), 15);
        Ok(())
    }

    #[test]
    fn test_reproducible() -> Result<()> {
        let mut module = Module::new("unit.c");
        let descriptor = global(&mut module, GlobalVar::scalar("ratio", Value::f64(1.5)));
        let policy = EffectivePolicy::implicit();
        let events = EventLog::new();

        let first = EncryptionEngine::new(9, "unit.c").encrypt(&descriptor, policy.levels, &policy, &events)?;
        let second = EncryptionEngine::new(9, "unit.c").encrypt(&descriptor, policy.levels, &policy, &events)?;
        let other_unit = EncryptionEngine::new(9, "other.c").encrypt(&descriptor, policy.levels, &policy, &events)?;
        assert_eq!(first, second);
        assert_ne!(
            first.map(|a| a.cipher_bytes),
            other_unit.map(|a| a.cipher_bytes)
        );
        Ok(())
    }

    #[test]
    fn test_unsupported_type_left_plaintext() -> Result<()> {
        let descriptor = ValueDescriptor::new(
            "wide",
            DeclRef::Global(GlobalId::new(0)),
            ValueType::Scalar(ScalarType::Int(128)),
            vec![1; 16],
            Annotations::empty(),
        );
        let policy = EffectivePolicy::implicit();
        let events = EventLog::new();
        let result = EncryptionEngine::new(0, "unit.c").encrypt(&descriptor, policy.levels, &policy, &events)?;
        assert!(result.is_none());
        assert_eq!(events.count_kind(EventKind::UnsupportedType), 1);
        Ok(())
    }

    #[test]
    fn test_empty_levels_and_locals() {
        let policy = EffectivePolicy::implicit();
        let events = EventLog::new();
        let engine = EncryptionEngine::new(0, "unit.c");

        let mut descriptor = ValueDescriptor::new(
            "x",
            DeclRef::Global(GlobalId::new(0)),
            ValueType::Scalar(ScalarType::I8),
            vec![1],
            Annotations::empty(),
        );
        assert!(matches!(
            engine.encrypt(&descriptor, Levels::empty(), &policy, &events),
            Ok(None)
        ));

        descriptor.decl = DeclRef::Local(FunctionId::new(0), LocalId::new(0));
        assert!(engine.encrypt(&descriptor, policy.levels, &policy, &events).is_err());
        assert!(events.is_empty());
    }
}
