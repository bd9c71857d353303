//! # obscura Prelude
//!
//! This module provides a convenient prelude for the most commonly used types and traits
//! from the obscura library. Import this module to get quick access to the engine, the
//! host representation and the policy types.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all obscura operations
pub use crate::Error;

/// The result type used throughout obscura
pub use crate::Result;

// ================================================================================================
// Main Entry Points
// ================================================================================================

/// Engine, engine-wide settings and per-unit outcome
pub use crate::{EngineConfig, ObfuscationEngine, TransformResult};

/// Build flags handed to the engine
pub use crate::FlagSet;

// ================================================================================================
// Host Representation
// ================================================================================================

/// Compilation unit, declarations and instructions
pub use crate::ir::{
    BinaryOp, Function, FunctionId, GlobalId, GlobalVar, Linkage, LocalId, LocalVar, Module, Op,
    Origin, VarId,
};

/// Scalar values and types
pub use crate::ir::{ScalarType, Value, ValueType};

/// Reference evaluator for checking behaviour before and after protection
pub use crate::ir::Evaluator;

// ================================================================================================
// Configuration and Policy
// ================================================================================================

/// Resolved per-unit policy and its parts
pub use crate::config::{
    ConfigResolver, EffectivePolicy, FilterFacets, Level, Levels, PolicyMode, PromotionPolicy,
};

// ================================================================================================
// Declarations and Filtering
// ================================================================================================

/// Declaration descriptors
pub use crate::descriptor::{DescriptorTable, ElementKind, Scope, TypeCategory, ValueDescriptor};

/// Filter decisions
pub use crate::filter::{ExclusionReason, FilterDecision, FilterEngine};

// ================================================================================================
// Pipeline Stages
// ================================================================================================

/// Promotion of constant locals
pub use crate::promotion::{PromotionAnalyzer, PromotionReport};

/// Encryption artifacts and keys
pub use crate::encryption::{DecryptionMode, EncryptedArtifact, EncryptionEngine, KeySchedule};

/// Artifact integration
pub use crate::rewriter::{RewriteReport, Rewriter};

// ================================================================================================
// Pass Infrastructure and Diagnostics
// ================================================================================================

/// Pass trait, scheduler and per-unit context
pub use crate::compiler::{CompilerContext, ModulePass, PassScheduler};

/// Event log and derived statistics
pub use crate::compiler::{DerivedStats, Event, EventKind, EventLog};
