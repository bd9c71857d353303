//! Per-unit state shared by the passes of one pipeline run.

use std::sync::Arc;

use crate::{
    compiler::EventLog,
    config::{EffectivePolicy, Levels},
    descriptor::ValueDescriptor,
    encryption::EncryptedArtifact,
    ir::{FunctionId, GlobalId},
    promotion::RemovedLocal,
};

/// A global that passed the filter, with the levels it may receive.
#[derive(Debug, Clone, PartialEq)]
pub struct IncludedDeclaration {
    /// The global's descriptor.
    pub descriptor: ValueDescriptor,
    /// Admissible levels.
    pub levels: Levels,
}

/// State threaded through the passes of one compilation unit.
///
/// Every unit gets its own context; nothing in it is shared with other units.
/// Passes read the policy and record what they did here and into [`events`](Self::events).
#[derive(Debug)]
pub struct CompilerContext {
    /// Identity of the unit, part of every key derivation.
    pub unit_id: String,
    /// Build seed mixed into key derivation and promotion draws.
    pub seed: u64,
    /// Resolved policy of the unit.
    pub policy: Arc<EffectivePolicy>,
    /// Whether passes may fan out work over the rayon pool.
    pub parallel: bool,
    /// Diagnostics and transformation records.
    pub events: EventLog,

    /// Globals created by promotion.
    pub promoted: Vec<GlobalId>,
    /// Locals removed by promotion.
    pub removed_locals: Vec<RemovedLocal>,
    /// Globals admitted by the filter.
    pub included: Vec<IncludedDeclaration>,
    /// Ciphertext and keys waiting to be committed.
    pub artifacts: Vec<EncryptedArtifact>,
    /// Globals whose initializer holds ciphertext.
    pub encrypted: Vec<GlobalId>,
    /// Generated decode routines.
    pub decoders: Vec<FunctionId>,
}

impl CompilerContext {
    /// Creates the context of one unit.
    #[must_use]
    pub fn new(unit_id: impl Into<String>, seed: u64, policy: Arc<EffectivePolicy>) -> Self {
        Self {
            unit_id: unit_id.into(),
            seed,
            policy,
            parallel: false,
            events: EventLog::new(),
            promoted: Vec::new(),
            removed_locals: Vec::new(),
            included: Vec::new(),
            artifacts: Vec::new(),
            encrypted: Vec::new(),
            decoders: Vec::new(),
        }
    }

    /// Allows passes to use the rayon pool (builder pattern).
    #[must_use]
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Replaces the event log, keeping events recorded before the pipeline.
    #[must_use]
    pub fn with_events(mut self, events: EventLog) -> Self {
        self.events = events;
        self
    }
}
