//! Rewrite pass.
//!
//! Commits the artifacts of the encryption pass with the [`Rewriter`]. Any
//! integration failure aborts the unit.

use crate::{
    compiler::{pass::ModulePass, CompilerContext},
    ir::Module,
    rewriter::Rewriter,
    Result,
};

/// Commits ciphertext and decode sequences into the module.
#[derive(Debug, Default)]
pub struct RewritePass;

impl RewritePass {
    /// Creates the pass.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl ModulePass for RewritePass {
    fn name(&self) -> &'static str {
        "rewrite"
    }

    fn should_run(&self, ctx: &CompilerContext) -> bool {
        !ctx.artifacts.is_empty()
    }

    fn run(&self, module: &mut Module, ctx: &mut CompilerContext) -> Result<bool> {
        let report = Rewriter::new(&ctx.events).apply(module, &ctx.artifacts)?;
        let changed = !report.encrypted.is_empty();
        ctx.encrypted = report.encrypted;
        ctx.decoders = report.decoders;
        Ok(changed)
    }

    fn description(&self) -> &'static str {
        "Commits ciphertext and decode sequences"
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        compiler::passes::{EncryptionPass, FilterPass},
        config::EffectivePolicy,
        ir::{Evaluator, Function, GlobalVar, Value},
    };

    #[test]
    fn test_commits_artifacts() -> Result<()> {
        let mut module = Module::new("unit.c");
        let global = module.add_global(GlobalVar::scalar("answer", Value::i64(42)));
        let mut function = Function::new("answer");
        let value = function.load_global(global);
        function.ret(Some(value));
        module.add_function(function);

        let mut ctx = CompilerContext::new("unit.c", 0, Arc::new(EffectivePolicy::implicit()));
        FilterPass::new().run(&mut module, &mut ctx)?;
        EncryptionPass::new().run(&mut module, &mut ctx)?;
        assert!(RewritePass::new().run(&mut module, &mut ctx)?);

        assert_eq!(ctx.encrypted, [global]);
        assert_eq!(ctx.decoders.len(), 1);
        assert_eq!(
            Evaluator::new(&module).call("answer", &[])?,
            Some(Value::i64(42))
        );
        Ok(())
    }
}
