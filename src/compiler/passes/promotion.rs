//! Local-to-global promotion pass.
//!
//! Runs the [`PromotionAnalyzer`] with the unit's promotion policy. Marked
//! locals are promoted even when automatic promotion is off, so the pass always
//! runs.

use std::sync::Arc;

use crate::{
    compiler::{pass::ModulePass, CompilerContext},
    ir::Module,
    promotion::PromotionAnalyzer,
    Result,
};

/// Promotes constant locals to private globals.
#[derive(Debug, Default)]
pub struct PromotionPass;

impl PromotionPass {
    /// Creates the pass.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl ModulePass for PromotionPass {
    fn name(&self) -> &'static str {
        "promotion"
    }

    fn run(&self, module: &mut Module, ctx: &mut CompilerContext) -> Result<bool> {
        let policy = Arc::clone(&ctx.policy);
        let report = PromotionAnalyzer::new(&policy.promotion, ctx.seed, &ctx.unit_id)
            .run(module, &ctx.events)?;

        let changed = report.operations > 0 || !report.removed.is_empty();
        ctx.promoted = report.promoted;
        ctx.removed_locals = report.removed;
        Ok(changed)
    }

    fn description(&self) -> &'static str {
        "Promotes constant locals to module scope"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::{EffectivePolicy, PromotionPolicy},
        ir::{Function, LocalVar, Value},
    };

    #[test]
    fn test_records_promotions_in_context() -> Result<()> {
        let mut module = Module::new("unit.c");
        let mut function = Function::new("main");
        let local = function.add_local(LocalVar::scalar("pin", Value::i16(1234)));
        let value = function.load_local(local);
        function.ret(Some(value));
        module.add_function(function);

        let policy = EffectivePolicy::disabled().with_promotion(PromotionPolicy::enabled());
        let mut ctx = CompilerContext::new("unit.c", 0, Arc::new(policy));
        assert!(PromotionPass::new().run(&mut module, &mut ctx)?);
        assert_eq!(ctx.promoted.len(), 1);
        assert_eq!(ctx.removed_locals[0].name, "pin");
        assert_eq!(ctx.removed_locals[0].function, "main");
        Ok(())
    }
}
