// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]

//! # obscura
//!
//! [![License](https://img.shields.io/badge/license-Apache--2.0-blue.svg)](https://github.com/BinFlip/obscura/blob/main/LICENSE-APACHE)
//!
//! A compile-time constant protection engine. `obscura` runs inside a compiler
//! pipeline, once per compilation unit, and replaces the plaintext initializers of
//! selected constant declarations with ciphertext. Every read of a protected
//! declaration is rewritten into a decode sequence that reproduces the original
//! value at run time, so program behaviour is unchanged while the constants are no
//! longer visible in the produced object file.
//!
//! ## Features
//!
//! - **Two protection levels** - `Lite` (keyed xor) and `Deep` (xor, rotate, salt and
//!   odd multiply), each repeatable up to 255 times with independent keys
//! - **Deterministic keys** - keys derive from build seed, unit, declaration, level and
//!   iteration; identical inputs produce identical ciphertext
//! - **Declarative configuration** - build defines and in-source overrides resolve into
//!   one immutable policy per unit
//! - **Filtering** - name, bit width and element kind whitelists and blacklists plus
//!   per-declaration annotations
//! - **Local-to-global promotion** - constant locals (and folded operations on them) are
//!   lifted to private globals so they can be protected too
//! - **Transactional rewriting** - a unit is either fully protected or left unchanged
//!
//! ## Quick Start
//!
//! ```rust
//! use obscura::prelude::*;
//!
//! let mut module = Module::new("main.c");
//! let key = module.add_global(GlobalVar::scalar("secret_key", Value::i32(0x1234)));
//! let mut main = Function::new("main");
//! let value = main.load_global(key);
//! main.ret(Some(value));
//! module.add_function(main);
//!
//! let engine = ObfuscationEngine::default();
//! let result = engine.process_unit(&mut module, &FlagSet::new())?;
//!
//! assert_eq!(result.encrypted.len(), 1);
//! assert_eq!(Evaluator::new(&module).call("main", &[])?, Some(Value::i32(0x1234)));
//! # Ok::<(), obscura::Error>(())
//! ```
//!
//! ## Architecture
//!
//! `obscura` is organized into the following modules:
//!
//! - [`ir`] - The host representation of a compilation unit and a reference evaluator
//! - [`descriptor`] - Uniform descriptors for global and local declarations
//! - [`config`] - Build flags, in-source overrides and the resolved [`config::EffectivePolicy`]
//! - [`filter`] - Per-declaration inclusion decisions
//! - [`promotion`] - Local-to-global promotion, deduplication and operation folding
//! - [`encryption`] - Key schedules, element transforms and ciphertext artifacts
//! - [`rewriter`] - Commits ciphertext and expands decode sequences at every read
//! - [`compiler`] - Pass trait, scheduler, per-unit context and event log
//! - [`engine`] - The [`ObfuscationEngine`] that ties everything together
//! - [`Error`] and [`Result`] - Error handling
//!
//! ### Configuration
//!
//! A unit that contains the policy marker declaration ([`ir::POLICY_MARKER`]) is
//! processed in *explicit* mode: build defines and in-source overrides decide what
//! happens. Units without the marker use the implicit default of one `Lite` and one
//! `Deep` iteration for every supported global, without filters or promotion.
//!
//! ```rust
//! use obscura::{
//!     compiler::EventLog,
//!     config::{Level, Levels},
//!     ir::Module,
//!     FlagSet, ObfuscationEngine,
//! };
//!
//! let mut module = Module::new("unit.c").with_override("ENC_LITE_TIMES", Some("4"));
//! module.add_policy_marker();
//!
//! let engine = ObfuscationEngine::default();
//! let flags = FlagSet::from_defines(["ENC_LITE", "ENC_SKIP_FLOATS"]);
//! let policy = engine.resolve_policy(&module, &flags, &EventLog::new());
//!
//! assert_eq!(policy.levels, Levels::LITE);
//! assert_eq!(policy.iterations(Level::Lite), 4);
//! assert!(policy.blacklist.is_active());
//! ```
//!
//! ## Error Handling
//!
//! Only conditions that make a consistent unit impossible are returned as errors;
//! everything else is recorded in the unit's event log:
//!
//! ```rust,no_run
//! use obscura::{ir::Module, Error, FlagSet, ObfuscationEngine};
//!
//! let mut module = Module::new("unit.c");
//! match ObfuscationEngine::default().process_unit(&mut module, &FlagSet::new()) {
//!     Ok(result) => println!("{result}"),
//!     Err(Error::HostIntegration { message, .. }) => println!("unit left unchanged: {}", message),
//!     Err(e) => println!("Other error: {}", e),
//! }
//! ```
//!
//! ## Development and Testing
//!
//! ### Fuzzing
//!
//! ```bash
//! cargo +nightly fuzz run roundtrip --release
//! ```
//!
//! ### Testing
//!
//! ```bash
//! cargo test
//! cargo bench --bench encryption
//! ```
#[macro_use]
pub(crate) mod error;
pub(crate) mod utils;

/// Convenient re-exports of the most commonly used types and traits.
///
/// # Example
///
/// ```rust
/// use obscura::prelude::*;
///
/// let engine = ObfuscationEngine::new(EngineConfig::default().with_seed(7));
/// assert_eq!(engine.config().seed, 7);
/// ```
pub mod prelude;

/// Pass infrastructure: the pass trait, scheduler, per-unit context and event log.
pub mod compiler;

/// Build flags, in-source overrides and policy resolution.
pub mod config;

/// Uniform descriptors for protectable declarations.
pub mod descriptor;

/// Key derivation, element transforms and ciphertext generation.
pub mod encryption;

/// The protection engine and its per-unit results.
pub mod engine;

/// Inclusion decisions for individual declarations.
pub mod filter;

/// The host representation of a compilation unit.
pub mod ir;

/// Promotion of constant locals to private globals.
pub mod promotion;

/// Commits ciphertext and decode sequences to a unit.
pub mod rewriter;

/// `obscura` Result type
///
/// A type alias for `std::result::Result<T, Error>` where the error type is always [`Error`].
/// This is used consistently throughout the crate for all fallible operations.
///
/// # Examples
///
/// ```rust
/// use obscura::{ir::Value, Result};
///
/// fn widen(value: Value) -> Result<Value> {
///     value.resize(obscura::ir::ScalarType::I64)
/// }
///
/// assert_eq!(widen(Value::i8(7))?, Value::i64(7));
/// # Ok::<(), obscura::Error>(())
/// ```
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// `obscura` Error type
///
/// The main error type for all operations in this crate. See [`Error`] for the
/// variants and when each of them is returned.
pub use error::Error;

/// Build flag collection consumed by the configuration resolver.
pub use config::FlagSet;

/// Main entry points for protecting compilation units.
///
/// See [`engine::ObfuscationEngine`] for processing units, [`engine::EngineConfig`]
/// for engine-wide settings and [`engine::TransformResult`] for the outcome.
pub use engine::{EngineConfig, ObfuscationEngine, TransformResult};
