//! Pass infrastructure for the protection pipeline.
//!
//! This module provides the layer between the policy and the host representation:
//!
//! - [`crate::config`] resolves flags into an [`EffectivePolicy`](crate::config::EffectivePolicy)
//! - [`compiler`](self) runs the passes that transform one unit under that policy
//! - [`crate::engine`] drives units through the pipeline and collects results
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                      Protection Pipeline                         │
//! ├──────────────────────────────────────────────────────────────────┤
//! │                                                                  │
//! │  CompilerContext              Per-unit state                     │
//! │    ├─ Policy, seed, unit id   (read by every pass)               │
//! │    ├─ Included declarations   (filter → encryption)              │
//! │    ├─ Artifacts               (encryption → rewrite)             │
//! │    └─ EventLog                                                   │
//! │                                                                  │
//! │  PassScheduler                Ordered, single-shot execution     │
//! │    ├─ PromotionPass           (locals → private globals)         │
//! │    ├─ FilterPass              (whitelist, blacklist, tags)       │
//! │    ├─ EncryptionPass          (Lite/Deep ciphertext)             │
//! │    └─ RewritePass             (initializers, decode sequences)   │
//! │                                                                  │
//! │  ModulePass trait             Interface for all passes           │
//! │    ├─ run()                   Whole-unit transformation          │
//! │    ├─ initialize()            Setup before run                   │
//! │    └─ finalize()              Cleanup after run                  │
//! │                                                                  │
//! │  EventLog                     Change tracking and diagnostics    │
//! │                                                                  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```

mod context;
mod events;
mod pass;
mod passes;
mod scheduler;

pub use context::{CompilerContext, IncludedDeclaration};
pub use events::{DerivedStats, Event, EventBuilder, EventKind, EventLog, EventLogIter};
pub use pass::ModulePass;
pub use passes::{EncryptionPass, FilterPass, PromotionPass, RewritePass};
pub use scheduler::PassScheduler;
