//! Filter pass.
//!
//! Builds descriptors for every eligible global, promoted ones included, and
//! records the [`FilterEngine`] decision for each. Excluded declarations are
//! reported as [`EventKind::DeclarationExcluded`]; reserved configuration
//! plumbing is skipped silently.

use crate::{
    compiler::{pass::ModulePass, CompilerContext, EventKind, IncludedDeclaration},
    descriptor::DescriptorTable,
    filter::{ExclusionReason, FilterDecision, FilterEngine},
    ir::Module,
    Result,
};

/// Selects the globals to protect.
#[derive(Debug, Default)]
pub struct FilterPass;

impl FilterPass {
    /// Creates the pass.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl ModulePass for FilterPass {
    fn name(&self) -> &'static str {
        "filter"
    }

    fn should_run(&self, ctx: &CompilerContext) -> bool {
        !ctx.policy.levels.is_empty()
    }

    fn run(&self, module: &mut Module, ctx: &mut CompilerContext) -> Result<bool> {
        let table = DescriptorTable::globals(module);
        let mut included = Vec::new();

        for (_, descriptor) in table.iter() {
            match FilterEngine::evaluate(descriptor, &ctx.policy) {
                FilterDecision::Excluded(ExclusionReason::Reserved) => {}
                FilterDecision::Excluded(reason) => {
                    ctx.events
                        .record(EventKind::DeclarationExcluded)
                        .declaration(descriptor.name.clone())
                        .message(reason.to_string());
                }
                FilterDecision::Included(levels) if levels.is_empty() => {
                    log::debug!(
                        "{}: `{}` admits no level under this policy",
                        ctx.unit_id,
                        descriptor.name
                    );
                }
                FilterDecision::Included(levels) => included.push(IncludedDeclaration {
                    descriptor: descriptor.clone(),
                    levels,
                }),
            }
        }

        ctx.included = included;
        Ok(false)
    }

    fn description(&self) -> &'static str {
        "Matches globals against the protection policy"
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::{EffectivePolicy, FilterFacets, Levels},
        ir::{GlobalVar, Linkage, ScalarType, Value},
    };

    #[test]
    fn test_selection() -> Result<()> {
        let mut module = Module::new("unit.c");
        module.add_policy_marker();
        module.add_global(GlobalVar::scalar("secret_key", Value::i32(1)));
        module.add_global(GlobalVar::scalar("api_token", Value::i32(2)));
        module.add_global(
            GlobalVar::scalar("secret_pin", Value::i32(3)).with_annotation("no_encrypt"),
        );
        module.add_global(
            GlobalVar::scalar("secret_import", Value::i32(4)).with_linkage(Linkage::External),
        );
        module.add_global(GlobalVar::array(
            "secret_table",
            ScalarType::I8,
            &[Value::i8(1), Value::i8(2)],
        ));

        let policy = EffectivePolicy::implicit()
            .with_whitelist(FilterFacets::default().with_names(["secret"]))
            .with_arrays_lite_only(true);
        let mut ctx = CompilerContext::new("unit.c", 0, Arc::new(policy));
        FilterPass::new().run(&mut module, &mut ctx)?;

        let names: Vec<_> = ctx
            .included
            .iter()
            .map(|d| (d.descriptor.name.as_str(), d.levels))
            .collect();
        assert_eq!(
            names,
            [
                ("secret_key", Levels::LITE | Levels::DEEP),
                ("secret_table", Levels::LITE)
            ]
        );
        assert_eq!(ctx.events.count_kind(EventKind::DeclarationExcluded), 2);
        Ok(())
    }

    #[test]
    fn test_skipped_without_levels() {
        let ctx = CompilerContext::new("unit.c", 0, Arc::new(EffectivePolicy::disabled()));
        assert!(!FilterPass::new().should_run(&ctx));
    }
}
