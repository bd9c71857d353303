//! The protection engine.
//!
//! [`ObfuscationEngine`] drives compilation units through the whole pipeline:
//!
//! ```text
//! flags + overrides ─► ConfigResolver ─► EffectivePolicy
//!                                            │
//! Module ─► PromotionPass ─► FilterPass ─► EncryptionPass ─► RewritePass ─► Module'
//! ```
//!
//! Each unit is processed on a private working copy that replaces the caller's
//! module only after every pass succeeded. A fatal error therefore leaves the
//! unit exactly as it was and never affects other units; recoverable conditions
//! are recorded in the unit's [`EventLog`].
//!
//! # Example
//!
//! ```rust
//! use obscura::{
//!     ir::{Evaluator, Function, GlobalVar, Module, ScalarType, Value},
//!     EngineConfig, FlagSet, ObfuscationEngine,
//! };
//!
//! let mut module = Module::new("main.c");
//! let values: Vec<Value> = (1..=4).map(Value::i32).collect();
//! let table = module.add_global(GlobalVar::array("table", ScalarType::I32, &values));
//! let mut function = Function::new("lookup").with_params(vec![ScalarType::I32]);
//! let index = function.arg(0);
//! let value = function.load_element(table, index);
//! function.ret(Some(value));
//! module.add_function(function);
//! module.add_policy_marker();
//!
//! let engine = ObfuscationEngine::new(EngineConfig::default().with_seed(0x5EED));
//! let flags = FlagSet::from_defines(["ENC_FULL", "ENC_DEEP_TIMES=3"]);
//! let result = engine.process_unit(&mut module, &flags)?;
//!
//! assert_eq!(result.stats.arrays_encrypted, 1);
//! let mut eval = Evaluator::new(&module);
//! assert_eq!(eval.call("lookup", &[Value::i32(2)])?, Some(Value::i32(3)));
//! # Ok::<(), obscura::Error>(())
//! ```

mod config;
mod result;

pub use config::EngineConfig;
pub use result::TransformResult;

use std::{sync::Arc, time::Instant};

use rayon::prelude::*;

use crate::{
    compiler::{CompilerContext, EventLog, PassScheduler},
    config::{ConfigResolver, EffectivePolicy, FlagSet},
    ir::Module,
    Result,
};

/// Protects the constants of compilation units.
///
/// The engine holds no per-unit state and can be shared between threads.
#[derive(Debug, Clone, Default)]
pub struct ObfuscationEngine {
    config: EngineConfig,
    resolver: ConfigResolver,
}

impl ObfuscationEngine {
    /// Creates an engine with the given configuration.
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        Self {
            resolver: ConfigResolver::new(config.max_iterations_warning),
            config,
        }
    }

    /// Returns the engine configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Resolves the policy a unit would be processed under, without changing it.
    #[must_use]
    pub fn resolve_policy(&self, module: &Module, flags: &FlagSet, events: &EventLog) -> EffectivePolicy {
        self.resolver.resolve(module, flags, events)
    }

    /// Runs the full pipeline over one unit.
    ///
    /// On success `module` holds the transformed unit. On failure it is left
    /// untouched.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::HostIntegration`] if an artifact cannot be
    /// committed, or [`crate::Error::Malformed`] if the unit is inconsistent.
    pub fn process_unit(&self, module: &mut Module, flags: &FlagSet) -> Result<TransformResult> {
        let start = Instant::now();

        let events = EventLog::new();
        let policy = Arc::new(self.resolver.resolve(module, flags, &events));
        log::debug!("{}: {}", module.id, policy);

        let mut ctx = CompilerContext::new(module.id.clone(), self.config.seed, policy)
            .with_parallel(self.config.parallel)
            .with_events(events);

        let mut working = module.clone();
        let changed = match PassScheduler::standard().run(&mut working, &mut ctx) {
            Ok(changed) => changed,
            Err(error) => {
                log::error!("{}: aborted, unit left unchanged: {error}", module.id);
                return Err(error);
            }
        };
        *module = working;

        let result = TransformResult::new(ctx, changed).with_timing(start.elapsed());
        log::info!("{}", result.summary());
        Ok(result)
    }

    /// Runs the pipeline over several independent units.
    ///
    /// Units are processed concurrently when [`EngineConfig::parallel`] is set.
    /// Results are returned in input order; a failing unit does not affect the
    /// others.
    pub fn process_units(&self, modules: &mut [Module], flags: &FlagSet) -> Vec<Result<TransformResult>> {
        if self.config.parallel {
            modules
                .par_iter_mut()
                .map(|module| self.process_unit(module, flags))
                .collect()
        } else {
            modules
                .iter_mut()
                .map(|module| self.process_unit(module, flags))
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        compiler::EventKind,
        config::{Level, Levels, PolicyMode},
        ir::{Evaluator, Function, GlobalVar, LocalVar, Value},
    };

    fn unit(id: &str) -> Module {
        let mut module = Module::new(id);
        let secret = module.add_global(GlobalVar::scalar("secret_key", Value::i32(0x0BAD_F00D)));
        let mut function = Function::new("main");
        let value = function.load_global(secret);
        function.ret(Some(value));
        module.add_function(function);

        let mut function = Function::new("bound");
        let local = function.add_local(LocalVar::scalar("limit", Value::i64(10)));
        let value = function.load_local(local);
        function.ret(Some(value));
        module.add_function(function);
        module
    }

    #[test]
    fn test_implicit_unit() -> Result<()> {
        let mut module = unit("a.c");
        let result = ObfuscationEngine::default().process_unit(&mut module, &FlagSet::new())?;

        assert_eq!(result.policy.mode, PolicyMode::Implicit);
        assert_eq!(result.policy.levels, Levels::LITE | Levels::DEEP);
        assert_eq!(result.encrypted.len(), 1);
        assert!(result.promoted.is_empty());
        assert_eq!(result.decoders.len(), 1);
        assert!(!result.is_unchanged());
        assert_eq!(
            Evaluator::new(&module).call("main", &[])?,
            Some(Value::i32(0x0BAD_F00D))
        );
        Ok(())
    }

    #[test]
    fn test_explicit_unit_with_promotion() -> Result<()> {
        let mut module = unit("a.c");
        module.add_policy_marker();
        let flags = FlagSet::from_defines(["ENC_LITE", "ENC_LITE_TIMES=3", "L2G_ENABLE"]);
        let result = ObfuscationEngine::default().process_unit(&mut module, &flags)?;

        assert_eq!(result.policy.iterations(Level::Lite), 3);
        assert_eq!(result.promoted.len(), 1);
        assert_eq!(result.encrypted.len(), 2);
        assert!(result.decoders.is_empty());
        assert!(module.find_global("bound.limit").is_some());
        assert_eq!(Evaluator::new(&module).call("bound", &[])?, Some(Value::i64(10)));
        assert!(result.events.has(EventKind::PassCompleted));
        Ok(())
    }

    #[test]
    fn test_unmarked_unit_ignores_flags() -> Result<()> {
        let mut module = unit("a.c");
        let flags = FlagSet::from_defines(["L2G_ENABLE"]);
        let result = ObfuscationEngine::default().process_unit(&mut module, &flags)?;
        assert!(result.promoted.is_empty());
        assert!(result.events.has(EventKind::Info));
        Ok(())
    }

    #[test]
    fn test_units_are_independent() {
        let mut modules = vec![unit("a.c"), unit("b.c")];
        let engine = ObfuscationEngine::new(EngineConfig::default().with_parallel(true));
        let results = engine.process_units(&mut modules, &FlagSet::new());
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|result| result.is_ok()));

        let cipher = |m: &Module| {
            m.globals()
                .find(|(_, g)| g.name == "secret_key")
                .and_then(|(_, g)| g.initializer.clone())
        };
        assert_ne!(cipher(&modules[0]), cipher(&modules[1]));
    }
}
