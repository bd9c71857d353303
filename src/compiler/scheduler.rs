//! Pass scheduler for orchestrating pipeline execution.
//!
//! The `PassScheduler` runs module passes once each, in registration order,
//! bracketing every pass with [`EventKind::PassStarted`] and
//! [`EventKind::PassCompleted`] events.

use crate::{
    compiler::{
        pass::ModulePass,
        passes::{EncryptionPass, FilterPass, PromotionPass, RewritePass},
        CompilerContext, EventKind,
    },
    ir::Module,
    Result,
};

/// Orchestrates pass execution over one compilation unit.
///
/// The standard pipeline is:
///
/// 1. **Promotion**: constant locals become private globals
/// 2. **Filter**: globals are matched against the policy
/// 3. **Encryption**: included globals are encrypted
/// 4. **Rewrite**: ciphertext and decode sequences are committed
///
/// A scheduler owns its passes and is used for a single unit at a time. The
/// first failing pass aborts the run.
#[derive(Default)]
pub struct PassScheduler {
    passes: Vec<Box<dyn ModulePass>>,
}

impl PassScheduler {
    /// Creates an empty scheduler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a scheduler with the standard four-pass pipeline.
    #[must_use]
    pub fn standard() -> Self {
        Self::new()
            .with_pass(Box::new(PromotionPass::new()))
            .with_pass(Box::new(FilterPass::new()))
            .with_pass(Box::new(EncryptionPass::new()))
            .with_pass(Box::new(RewritePass::new()))
    }

    /// Appends a pass (builder pattern).
    #[must_use]
    pub fn with_pass(mut self, pass: Box<dyn ModulePass>) -> Self {
        self.passes.push(pass);
        self
    }

    /// Appends a pass.
    pub fn add_pass(&mut self, pass: Box<dyn ModulePass>) {
        self.passes.push(pass);
    }

    /// Returns the number of registered passes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.passes.len()
    }

    /// Returns `true` if no pass is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }

    /// Returns the pass names in execution order.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.passes.iter().map(|pass| pass.name()).collect()
    }

    /// Runs every pass once over `module`.
    ///
    /// # Returns
    ///
    /// The number of passes that reported changes. Events are accumulated in
    /// `ctx.events`.
    ///
    /// # Errors
    ///
    /// Returns the error of the first pass that fails; later passes do not run.
    pub fn run(&mut self, module: &mut Module, ctx: &mut CompilerContext) -> Result<usize> {
        let mut changed = 0;

        for pass in &mut self.passes {
            let name = pass.name();
            if !pass.should_run(ctx) {
                log::debug!("{}: skipping {name}", ctx.unit_id);
                continue;
            }

            ctx.events
                .record(EventKind::PassStarted)
                .pass(name)
                .message(pass.description());

            pass.initialize(ctx)?;
            let result = pass.run(module, ctx);
            if let Err(error) = &result {
                ctx.events
                    .record(EventKind::Error)
                    .pass(name)
                    .message(error.to_string());
            }
            let pass_changed = result?;
            pass.finalize(ctx)?;

            if pass_changed {
                changed += 1;
            }
            ctx.events
                .record(EventKind::PassCompleted)
                .pass(name)
                .message(if pass_changed { "changed" } else { "no changes" });
        }

        Ok(changed)
    }
}
