//! The trait implemented by every pipeline pass.

use crate::{compiler::CompilerContext, ir::Module, Result};

/// A transformation over one compilation unit.
///
/// Passes are stateless between units and must be thread-safe (Send + Sync) so
/// one pipeline can be shared by the workers processing units in parallel.
/// State produced for later passes goes into the [`CompilerContext`].
///
/// # Pipeline Integration
///
/// Passes don't declare their own ordering. The [`PassScheduler`](crate::compiler::PassScheduler)
/// runs them in registration order, which for the default pipeline is:
///
/// 1. **Promotion**: constant locals to module scope
/// 2. **Filter**: select the globals to protect and their levels
/// 3. **Encryption**: derive keys and produce ciphertext
/// 4. **Rewrite**: commit ciphertext and decode sequences
pub trait ModulePass: Send + Sync {
    /// Unique name for logging and debugging.
    fn name(&self) -> &'static str;

    /// Should this pass run for the unit at all?
    ///
    /// Called before [`run`](Self::run). Skipped passes record no events.
    fn should_run(&self, _ctx: &CompilerContext) -> bool {
        true
    }

    /// Runs the pass over the unit.
    ///
    /// Returns `true` if anything changed. Events should be recorded directly to
    /// `ctx.events`.
    ///
    /// # Errors
    ///
    /// Returns an error if the unit cannot be transformed consistently; the
    /// engine then discards the unit's working copy.
    fn run(&self, module: &mut Module, ctx: &mut CompilerContext) -> Result<bool>;

    /// Called once before [`run`](Self::run).
    ///
    /// # Errors
    ///
    /// Returns an error if initialization fails.
    fn initialize(&mut self, _ctx: &CompilerContext) -> Result<()> {
        Ok(())
    }

    /// Called once after [`run`](Self::run) succeeded.
    ///
    /// # Errors
    ///
    /// Returns an error if finalization fails.
    fn finalize(&mut self, _ctx: &CompilerContext) -> Result<()> {
        Ok(())
    }

    /// Get a description of what this pass does.
    fn description(&self) -> &'static str {
        "No description available"
    }
}
