//! Local-to-global promotion (L2G).
//!
//! Constant locals are moved to module scope so they become eligible for
//! encryption. A candidate is promoted when it carries the `l2g` marker, or when
//! automatic promotion admits it:
//!
//! - promotion is enabled and the per-type toggle admits its shape
//! - it does not carry `no_l2g`
//! - aggregates stay within the array size limit (0 is unlimited)
//! - the deterministic probability draw for its [`Fingerprint`] succeeds
//!
//! The marker wins over every exclusion, `no_l2g` included.
//!
//! With deduplication enabled, candidates with equal fingerprints share one
//! promoted global. Each promoted local is removed from its function and every
//! read of it is redirected to the global in place, so the order of reads is
//! unchanged.
//!
//! # Example
//!
//! ```rust
//! use obscura::{
//!     compiler::EventLog,
//!     config::PromotionPolicy,
//!     ir::{Function, LocalVar, Module, Value},
//!     promotion::PromotionAnalyzer,
//! };
//!
//! let mut module = Module::new("unit.c");
//! let mut function = Function::new("main");
//! let local = function.add_local(LocalVar::scalar("limit", Value::i32(100)));
//! let value = function.load_local(local);
//! function.ret(Some(value));
//! module.add_function(function);
//!
//! let policy = PromotionPolicy::enabled();
//! let report = PromotionAnalyzer::new(&policy, 0, "unit.c").run(&mut module, &EventLog::new())?;
//!
//! assert_eq!(report.promoted.len(), 1);
//! assert!(module.find_global("main.limit").is_some());
//! # Ok::<(), obscura::Error>(())
//! ```

mod fingerprint;
mod ops;

pub use fingerprint::Fingerprint;
pub use ops::promote_operations;

use rustc_hash::FxHashMap;

use crate::{
    compiler::{EventKind, EventLog},
    config::PromotionPolicy,
    descriptor::{Annotations, DeclRef, DescriptorTable, ValueDescriptor},
    ir::{FunctionId, GlobalId, GlobalVar, Linkage, LocalId, Module, Op, Origin},
    Result,
};

/// A constant local considered for promotion.
#[derive(Debug, Clone, PartialEq)]
pub struct PromotionCandidate {
    /// The local's descriptor.
    pub descriptor: ValueDescriptor,
    /// Owning function.
    pub function: FunctionId,
    /// The local itself.
    pub local: LocalId,
    /// Dedup identity.
    pub fingerprint: Fingerprint,
}

impl PromotionCandidate {
    /// Returns `true` if the candidate carries the `l2g` marker.
    #[must_use]
    pub fn is_marked(&self) -> bool {
        self.descriptor.annotations.contains(Annotations::PROMOTE)
    }
}

/// A local removed by promotion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovedLocal {
    /// Name of the function that declared it.
    pub function: String,
    /// Name of the local.
    pub name: String,
    /// The global that replaced it.
    pub global: GlobalId,
}

/// Outcome of a promotion run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PromotionReport {
    /// Newly created globals, in creation order.
    pub promoted: Vec<GlobalId>,
    /// Locals that were removed.
    pub removed: Vec<RemovedLocal>,
    /// Synthetic locals created from constant operations.
    pub operations: usize,
    /// Candidates that collapsed into an existing promoted global.
    pub deduplicated: usize,
}

/// Promotes constant locals of one unit to module scope.
#[derive(Debug, Clone, Copy)]
pub struct PromotionAnalyzer<'a> {
    policy: &'a PromotionPolicy,
    seed: u64,
    unit_id: &'a str,
}

impl<'a> PromotionAnalyzer<'a> {
    /// Creates an analyzer for one unit.
    #[must_use]
    pub const fn new(policy: &'a PromotionPolicy, seed: u64, unit_id: &'a str) -> Self {
        Self {
            policy,
            seed,
            unit_id,
        }
    }

    /// Enumerates the constant locals the engine can promote.
    ///
    /// Reserved names are never candidates. A local of an unsupported type is a
    /// candidate only with the `l2g` marker; encryption then reports it and
    /// leaves it as plaintext.
    #[must_use]
    pub fn candidates(&self, module: &Module) -> Vec<PromotionCandidate> {
        DescriptorTable::locals(module)
            .iter()
            .filter_map(|(_, descriptor)| {
                let DeclRef::Local(function, local) = descriptor.decl else {
                    return None;
                };
                if descriptor.is_reserved() {
                    return None;
                }
                if !descriptor.is_supported()
                    && !descriptor.annotations.contains(Annotations::PROMOTE)
                {
                    log::debug!("not promoting `{}`: unsupported", descriptor.name);
                    return None;
                }
                Some(PromotionCandidate {
                    fingerprint: Fingerprint::of(descriptor),
                    descriptor: descriptor.clone(),
                    function,
                    local,
                })
            })
            .collect()
    }

    /// Decides whether a candidate is promoted.
    #[must_use]
    pub fn should_promote(&self, candidate: &PromotionCandidate) -> bool {
        self.admits(&candidate.descriptor, &candidate.fingerprint)
    }

    fn admits(&self, descriptor: &ValueDescriptor, fingerprint: &Fingerprint) -> bool {
        if descriptor.annotations.contains(Annotations::PROMOTE) {
            return true;
        }

        if !self.policy.enabled
            || !descriptor.is_supported()
            || !self.policy.admits_type(descriptor)
            || descriptor.annotations.contains(Annotations::NO_PROMOTE)
        {
            return false;
        }
        if self.policy.max_array_size > 0
            && descriptor.is_aggregate()
            && descriptor.element_count > self.policy.max_array_size
        {
            return false;
        }

        fingerprint.passes(self.policy.probability, self.seed, self.unit_id)
    }

    /// Runs operation folding (if enabled) and promotion over `module`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::HostIntegration`] if a candidate's function or
    /// local disappears while promoting.
    pub fn run(&self, module: &mut Module, events: &EventLog) -> Result<PromotionReport> {
        let mut report = PromotionReport::default();
        if self.policy.ops {
            report.operations = promote_operations(module, events, |descriptor| {
                !descriptor.is_reserved() && self.admits(descriptor, &Fingerprint::of(descriptor))
            });
        }

        let selected: Vec<PromotionCandidate> = self
            .candidates(module)
            .into_iter()
            .filter(|candidate| self.should_promote(candidate))
            .collect();

        let mut shared: FxHashMap<Fingerprint, GlobalId> = FxHashMap::default();
        for candidate in selected {
            let reused = if self.policy.dedup {
                shared.get(&candidate.fingerprint).copied()
            } else {
                None
            };

            let (function_name, local) = {
                let function = module.function(candidate.function).ok_or_else(|| {
                    integration_error!("function {} vanished during promotion", candidate.function)
                })?;
                let local = function.local(candidate.local).cloned().ok_or_else(|| {
                    integration_error!(
                        "local {} of `{}` vanished during promotion",
                        candidate.local,
                        function.name
                    )
                })?;
                (function.name.clone(), local)
            };

            let global = if let Some(global) = reused {
                report.deduplicated += 1;
                let target = module
                    .global(global)
                    .map(|g| g.name.clone())
                    .unwrap_or_default();
                events
                    .record(EventKind::ConstantDeduplicated)
                    .at(function_name.clone(), local.name.clone())
                    .message(format!("shares {target}"));
                global
            } else {
                let name = unique_name(module, &format!("{function_name}.{}", local.name));
                let mut promoted = GlobalVar::new(name.clone(), local.ty, local.initializer.clone())
                    .with_linkage(Linkage::Private);
                promoted.annotations = local.annotations.clone();
                promoted.origin = Origin::Promoted;
                promoted.source_name = Some(local.name.clone());
                let global = module.add_global(promoted);
                report.promoted.push(global);
                if self.policy.dedup {
                    shared.insert(candidate.fingerprint.clone(), global);
                }
                events
                    .record(EventKind::LocalPromoted)
                    .at(function_name.clone(), local.name.clone())
                    .message(if candidate.is_marked() {
                        format!("-> {name} (marker)")
                    } else {
                        format!("-> {name}")
                    });
                global
            };

            redirect_reads(module, candidate.function, candidate.local, global)?;
            report.removed.push(RemovedLocal {
                function: function_name,
                name: local.name,
                global,
            });
        }

        log::debug!(
            "{}: promoted {} locals into {} globals",
            self.unit_id,
            report.removed.len(),
            report.promoted.len()
        );
        Ok(report)
    }
}

/// Rewrites every read of `local` in `function` to read `global`, then removes the local.
fn redirect_reads(
    module: &mut Module,
    function: FunctionId,
    local: LocalId,
    global: GlobalId,
) -> Result<()> {
    let function = module
        .function_mut(function)
        .ok_or_else(|| integration_error!("function {function} vanished during promotion"))?;

    for op in function.body_mut().iter_mut() {
        match *op {
            Op::LoadLocal { dest, local: read } if read == local => {
                *op = Op::LoadGlobal { dest, global };
            }
            Op::LoadLocalElement {
                dest,
                local: read,
                index,
            } if read == local => {
                *op = Op::LoadElement {
                    dest,
                    global,
                    index,
                };
            }
            _ => {}
        }
    }
    function.remove_local(local);
    Ok(())
}

fn unique_name(module: &Module, base: &str) -> String {
    if module.find_global(base).is_none() {
        return base.to_string();
    }
    (1..)
        .map(|n| format!("{base}.{n}"))
        .find(|name| module.find_global(name).is_none())
        .unwrap_or_else(|| base.to_string())
}
