//! Configuration layers and their resolution into an [`EffectivePolicy`].
//!
//! # Architecture
//!
//! ```text
//!  external FlagSet ─┐
//!                    ├─ layered (in-source wins per key) ─ interpret ─ EffectivePolicy
//!  Module::overrides ┘
//! ```
//!
//! Resolution happens once per compilation unit, before any pass runs. The
//! resulting policy is immutable and shared by every stage of the pipeline, so
//! overrides of one unit never leak into another.

pub mod flags;
mod policy;
mod resolver;

pub use flags::FlagSet;
pub use policy::{EffectivePolicy, FilterFacets, Level, Levels, PolicyMode, PromotionPolicy};
pub use resolver::ConfigResolver;
