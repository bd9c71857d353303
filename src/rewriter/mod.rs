//! Commits encrypted artifacts into a module.
//!
//! For every artifact the [`Rewriter`] replaces the global's initializer with
//! the ciphertext and expands each read of the global into a decode sequence.
//! Lite layers are always decoded inline. Deep layers are decoded inline for
//! [`DecryptionMode::InlineDeep`] and through one generated routine per global
//! for [`DecryptionMode::CallDeep`]. Nothing else about the declaration changes:
//! linkage, alignment, section and annotations stay as they were.
//!
//! Every artifact is validated against the module before the first change is
//! made. A mismatch is a [`crate::Error::HostIntegration`] and leaves the module
//! untouched.
//!
//! # Example
//!
//! ```rust
//! use obscura::{
//!     compiler::EventLog,
//!     config::EffectivePolicy,
//!     descriptor::DescriptorTable,
//!     encryption::EncryptionEngine,
//!     ir::{Evaluator, Function, GlobalVar, Module, Value},
//!     rewriter::Rewriter,
//! };
//!
//! let mut module = Module::new("unit.c");
//! let secret = module.add_global(GlobalVar::scalar("secret", Value::i32(1234)));
//! let mut function = Function::new("get");
//! let value = function.load_global(secret);
//! function.ret(Some(value));
//! module.add_function(function);
//!
//! let events = EventLog::new();
//! let policy = EffectivePolicy::implicit();
//! let table = DescriptorTable::globals(&module);
//! let (_, descriptor) = table.iter().next().unwrap();
//! let artifact = EncryptionEngine::new(0, "unit.c")
//!     .encrypt(descriptor, policy.levels, &policy, &events)?
//!     .unwrap();
//!
//! let report = Rewriter::new(&events).apply(&mut module, &[artifact])?;
//! assert_eq!(report.decoders.len(), 1);
//! assert_ne!(
//!     module.global(secret).unwrap().initializer.as_deref(),
//!     Some(&Value::i32(1234).to_le_bytes()[..])
//! );
//! assert_eq!(Evaluator::new(&module).call("get", &[])?, Some(Value::i32(1234)));
//! # Ok::<(), obscura::Error>(())
//! ```

mod decode;

pub use decode::routine_name;

use rustc_hash::FxHashMap;

use crate::{
    compiler::{EventKind, EventLog},
    encryption::{DecryptionMode, EncryptedArtifact},
    ir::{FunctionId, GlobalId, Module, Op},
    Result,
};

use decode::DecodeEmitter;

/// What a rewrite changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RewriteReport {
    /// Globals whose initializer now holds ciphertext.
    pub encrypted: Vec<GlobalId>,
    /// Generated decode routines.
    pub decoders: Vec<FunctionId>,
    /// Number of reads expanded into decode sequences.
    pub use_sites: usize,
}

/// Applies artifacts to a module.
#[derive(Debug, Clone, Copy)]
pub struct Rewriter<'a> {
    events: &'a EventLog,
}

impl<'a> Rewriter<'a> {
    /// Creates a rewriter reporting into `events`.
    #[must_use]
    pub const fn new(events: &'a EventLog) -> Self {
        Self { events }
    }

    /// Checks that every artifact can be applied to `module`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::HostIntegration`] if a global is missing, has no
    /// initializer, changed type or size, is written to, is protected twice, or
    /// is read as a scalar although it is an aggregate.
    pub fn validate(&self, module: &Module, artifacts: &[EncryptedArtifact]) -> Result<()> {
        let mut seen: FxHashMap<GlobalId, &str> = FxHashMap::default();
        for artifact in artifacts {
            let global = module.global(artifact.global).ok_or_else(|| {
                integration_error!("global `{}` ({}) no longer exists", artifact.name, artifact.global)
            })?;
            if global.name != artifact.name || global.ty != artifact.ty {
                return Err(integration_error!(
                    "global {} is `{}: {}`, artifact expects `{}: {}`",
                    artifact.global,
                    global.name,
                    global.ty,
                    artifact.name,
                    artifact.ty
                ));
            }
            let Some(initializer) = global.initializer.as_ref() else {
                return Err(integration_error!("global `{}` has no initializer", global.name));
            };
            if initializer.len() != artifact.cipher_bytes.len() {
                return Err(integration_error!(
                    "global `{}` holds {} bytes, ciphertext has {}",
                    global.name,
                    initializer.len(),
                    artifact.cipher_bytes.len()
                ));
            }
            if module.is_global_stored(artifact.global) {
                return Err(integration_error!("global `{}` is written at runtime", global.name));
            }
            if seen.insert(artifact.global, &artifact.name).is_some() {
                return Err(integration_error!("global `{}` is protected twice", global.name));
            }
        }

        for (_, function) in module.functions() {
            for op in function.body() {
                if let Op::LoadGlobal { global, .. } = op {
                    if let Some(artifact) = artifacts.iter().find(|a| a.global == *global) {
                        if artifact.ty.is_aggregate() {
                            return Err(integration_error!(
                                "`{}` reads aggregate `{}` without an index",
                                function.name,
                                artifact.name
                            ));
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Validates, then applies every artifact to `module`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::HostIntegration`] if validation fails, in which
    /// case `module` is not modified.
    pub fn apply(&self, module: &mut Module, artifacts: &[EncryptedArtifact]) -> Result<RewriteReport> {
        self.validate(module, artifacts)?;

        let mut report = RewriteReport::default();
        let mut targets: FxHashMap<GlobalId, (&EncryptedArtifact, Option<FunctionId>)> =
            FxHashMap::default();

        for artifact in artifacts {
            if let Some(global) = module.global_mut(artifact.global) {
                global.initializer = Some(artifact.cipher_bytes.clone());
            }
            report.encrypted.push(artifact.global);

            let routine = if artifact.mode == DecryptionMode::CallDeep {
                let routine = decode::build_routine(artifact);
                let name = routine.name.clone();
                let id = module.add_function(routine);
                report.decoders.push(id);
                self.events
                    .record(EventKind::DecoderGenerated)
                    .declaration(artifact.name.clone())
                    .message(format!("{name} ({} deep iterations)", artifact.deep.len()));
                Some(id)
            } else {
                None
            };
            targets.insert(artifact.global, (artifact, routine));
        }

        let functions: Vec<FunctionId> = module
            .functions()
            .filter(|(_, function)| !function.generated)
            .map(|(id, _)| id)
            .collect();

        for id in functions {
            let Some(function) = module.function_mut(id) else {
                continue;
            };
            if !function
                .body()
                .iter()
                .any(|op| op.global_read().is_some_and(|g| targets.contains_key(&g)))
            {
                continue;
            }

            let function_name = function.name.clone();
            let body = std::mem::take(function.body_mut());
            let mut emitter = DecodeEmitter::new(function, body.len() * 4);
            let mut sites = Vec::new();

            for op in body {
                let (dest, global, index) = match op {
                    Op::LoadGlobal { dest, global } => (dest, global, None),
                    Op::LoadElement {
                        dest,
                        global,
                        index,
                    } => (dest, global, Some(index)),
                    other => {
                        emitter.push(other);
                        continue;
                    }
                };
                let Some(&(artifact, routine)) = targets.get(&global) else {
                    emitter.push(op);
                    continue;
                };

                let raw = emitter.fresh();
                emitter.push(match index {
                    Some(index) => Op::LoadElement {
                        dest: raw,
                        global,
                        index,
                    },
                    None => Op::LoadGlobal { dest: raw, global },
                });
                let plain = decode::expand_read(&mut emitter, artifact, raw, index, routine);
                emitter.push(Op::Copy { dest, src: plain });
                sites.push(artifact.name.clone());
            }

            let body = emitter.finish();
            function.set_body(body);

            report.use_sites += sites.len();
            for name in sites {
                self.events
                    .record(EventKind::UseSiteRewritten)
                    .at(function_name.clone(), name);
            }
        }

        log::debug!(
            "{}: rewrote {} reads of {} globals, {} decoders",
            module.id,
            report.use_sites,
            report.encrypted.len(),
            report.decoders.len()
        );
        Ok(report)
    }
}
