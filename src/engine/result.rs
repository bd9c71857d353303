//! Per-unit results of the protection engine.

use std::{fmt, sync::Arc, time::Duration};

use crate::{
    compiler::{CompilerContext, DerivedStats, EventLog},
    config::EffectivePolicy,
    ir::{FunctionId, GlobalId},
    promotion::RemovedLocal,
};

/// What the engine did to one compilation unit.
///
/// # Usage
///
/// ```rust
/// use obscura::{ir::{GlobalVar, Module, Value}, FlagSet, ObfuscationEngine};
///
/// let mut module = Module::new("unit.c");
/// module.add_global(GlobalVar::scalar("secret", Value::i32(7)));
///
/// let result = ObfuscationEngine::default().process_unit(&mut module, &FlagSet::new())?;
/// assert_eq!(result.encrypted.len(), 1);
/// assert_eq!(result.stats.constants_encrypted, 1);
/// println!("{}", result.summary());
/// # Ok::<(), obscura::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct TransformResult {
    /// Identity of the unit.
    pub unit_id: String,
    /// The policy the unit was processed under.
    pub policy: Arc<EffectivePolicy>,
    /// Globals whose initializer now holds ciphertext.
    pub encrypted: Vec<GlobalId>,
    /// Globals created by promotion.
    pub promoted: Vec<GlobalId>,
    /// Generated decode routines.
    pub decoders: Vec<FunctionId>,
    /// Locals removed by promotion.
    pub removed_locals: Vec<RemovedLocal>,
    /// Everything recorded while processing the unit.
    pub events: EventLog,
    /// Counters derived from [`events`](Self::events).
    pub stats: DerivedStats,
    /// Number of passes that changed the unit.
    pub passes_changed: usize,
    /// Wall time spent on the unit.
    pub elapsed: Duration,
}

impl TransformResult {
    /// Collects the result from a finished pipeline context.
    #[must_use]
    pub fn new(ctx: CompilerContext, passes_changed: usize) -> Self {
        let stats = DerivedStats::from_log(&ctx.events);
        Self {
            unit_id: ctx.unit_id,
            policy: ctx.policy,
            encrypted: ctx.encrypted,
            promoted: ctx.promoted,
            decoders: ctx.decoders,
            removed_locals: ctx.removed_locals,
            events: ctx.events,
            stats,
            passes_changed,
            elapsed: Duration::ZERO,
        }
    }

    /// Records the processing time (builder pattern).
    #[must_use]
    pub fn with_timing(mut self, elapsed: Duration) -> Self {
        self.elapsed = elapsed;
        self
    }

    /// Returns `true` if the unit was left as it was.
    #[must_use]
    pub fn is_unchanged(&self) -> bool {
        self.passes_changed == 0
    }

    /// Generates a one-line human-readable summary.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "{} [{}]: {} ({:.2?})",
            self.unit_id,
            self.policy.mode,
            self.stats.summary(),
            self.elapsed
        )
    }
}

impl fmt::Display for TransformResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.summary())?;
        writeln!(f, "  policy: {}", self.policy)?;
        for event in self.events.diagnostics() {
            writeln!(f, "  {event}")?;
        }
        Ok(())
    }
}
