//! Encryption pass.
//!
//! Encrypts every declaration the filter included. Declarations are independent
//! of each other, so with `ctx.parallel` set the work is spread over the rayon
//! pool; artifacts keep the filter's order either way.

use rayon::prelude::*;

use crate::{
    compiler::{pass::ModulePass, CompilerContext},
    encryption::EncryptionEngine,
    ir::Module,
    Result,
};

/// Produces ciphertext for the included declarations.
#[derive(Debug, Default)]
pub struct EncryptionPass;

impl EncryptionPass {
    /// Creates the pass.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl ModulePass for EncryptionPass {
    fn name(&self) -> &'static str {
        "encryption"
    }

    fn should_run(&self, ctx: &CompilerContext) -> bool {
        !ctx.included.is_empty()
    }

    fn run(&self, _module: &mut Module, ctx: &mut CompilerContext) -> Result<bool> {
        let engine = EncryptionEngine::new(ctx.seed, &ctx.unit_id);
        let policy = &ctx.policy;
        let events = &ctx.events;

        let results: Vec<_> = if ctx.parallel {
            ctx.included
                .par_iter()
                .map(|decl| engine.encrypt(&decl.descriptor, decl.levels, policy, events))
                .collect::<Result<_>>()?
        } else {
            ctx.included
                .iter()
                .map(|decl| engine.encrypt(&decl.descriptor, decl.levels, policy, events))
                .collect::<Result<_>>()?
        };

        let artifacts: Vec<_> = results.into_iter().flatten().collect();
        let changed = !artifacts.is_empty();
        ctx.artifacts = artifacts;
        Ok(changed)
    }

    fn description(&self) -> &'static str {
        "Derives keys and encrypts included declarations"
    }
}
