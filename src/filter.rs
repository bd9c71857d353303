//! Inclusion decisions for candidate declarations.
//!
//! [`FilterEngine::evaluate`] is a pure, total function of a descriptor and a
//! policy. Its checks run in a fixed order:
//!
//! 1. configuration plumbing (`__enc_*`, `__l2g_*`) is never protected
//! 2. every active whitelist facet category must match
//! 3. no active blacklist facet category may match
//! 4. the `no_encrypt` annotation excludes unconditionally
//! 5. arrays and vectors are excluded under `skip_arrays`
//! 6. arrays and vectors are narrowed to `{Lite}` under `arrays_lite_only`

use std::fmt;

use strum::Display;

use crate::{
    config::{EffectivePolicy, FilterFacets, Levels},
    descriptor::{Annotations, ValueDescriptor},
};

/// Why a declaration was not protected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum ExclusionReason {
    /// Configuration plumbing declaration.
    #[strum(to_string = "reserved name")]
    Reserved,
    /// An active whitelist facet did not match.
    #[strum(to_string = "not whitelisted")]
    Whitelist,
    /// An active blacklist facet matched.
    #[strum(to_string = "blacklisted")]
    Blacklist,
    /// Annotated `no_encrypt`.
    #[strum(to_string = "no_encrypt annotation")]
    NoEncrypt,
    /// Aggregate under `skip_arrays`.
    #[strum(to_string = "arrays skipped")]
    SkipArrays,
}

/// The outcome of filtering one declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterDecision {
    /// Protect with the given admissible levels.
    Included(Levels),
    /// Leave as plaintext.
    Excluded(ExclusionReason),
}

impl FilterDecision {
    /// Returns `true` for [`FilterDecision::Included`].
    #[must_use]
    pub const fn is_included(&self) -> bool {
        matches!(self, Self::Included(_))
    }

    /// Returns the admissible levels; empty when excluded.
    #[must_use]
    pub const fn levels(&self) -> Levels {
        match self {
            Self::Included(levels) => *levels,
            Self::Excluded(_) => Levels::empty(),
        }
    }
}

impl fmt::Display for FilterDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Included(levels) => write!(f, "included {levels}"),
            Self::Excluded(reason) => write!(f, "excluded: {reason}"),
        }
    }
}

/// Stateless inclusion filter.
pub struct FilterEngine;

impl FilterEngine {
    /// Decides whether `descriptor` is protected under `policy`, and at which levels.
    #[must_use]
    pub fn evaluate(descriptor: &ValueDescriptor, policy: &EffectivePolicy) -> FilterDecision {
        if descriptor.is_reserved() {
            return FilterDecision::Excluded(ExclusionReason::Reserved);
        }
        if !Self::whitelisted(descriptor, &policy.whitelist) {
            return FilterDecision::Excluded(ExclusionReason::Whitelist);
        }
        if Self::blacklisted(descriptor, &policy.blacklist) {
            return FilterDecision::Excluded(ExclusionReason::Blacklist);
        }
        if descriptor.annotations.contains(Annotations::NO_ENCRYPT) {
            return FilterDecision::Excluded(ExclusionReason::NoEncrypt);
        }

        if descriptor.is_aggregate() {
            if policy.skip_arrays {
                return FilterDecision::Excluded(ExclusionReason::SkipArrays);
            }
            if policy.arrays_lite_only {
                return FilterDecision::Included(policy.levels & Levels::LITE);
            }
        }

        FilterDecision::Included(policy.levels)
    }

    /// Returns `true` if `descriptor` is protected under `policy`.
    #[must_use]
    pub fn included(descriptor: &ValueDescriptor, policy: &EffectivePolicy) -> bool {
        Self::evaluate(descriptor, policy).is_included()
    }

    fn whitelisted(descriptor: &ValueDescriptor, facets: &FilterFacets) -> bool {
        [
            facets.match_name(descriptor),
            facets.match_bits(descriptor),
            facets.match_kind(descriptor),
        ]
        .into_iter()
        .flatten()
        .all(|matched| matched)
    }

    fn blacklisted(descriptor: &ValueDescriptor, facets: &FilterFacets) -> bool {
        [
            facets.match_name(descriptor),
            facets.match_bits(descriptor),
            facets.match_kind(descriptor),
        ]
        .into_iter()
        .flatten()
        .any(|matched| matched)
    }
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;
    use crate::{
        descriptor::{DeclRef, ElementKind, TypeCategory},
        ir::{GlobalId, ScalarType, ValueType},
    };

    fn scalar(name: &str, ty: ScalarType) -> ValueDescriptor {
        ValueDescriptor::new(
            name,
            DeclRef::Global(GlobalId::new(0)),
            ValueType::Scalar(ty),
            vec![0; ty.byte_size()],
            Annotations::empty(),
        )
    }

    fn array(name: &str, ty: ScalarType, count: usize) -> ValueDescriptor {
        let ty = ValueType::Array(ty, count);
        ValueDescriptor::new(
            name,
            DeclRef::Global(GlobalId::new(0)),
            ty,
            vec![0; ty.byte_size()],
            Annotations::empty(),
        )
    }

    fn full() -> EffectivePolicy {
        EffectivePolicy::disabled().with_levels(Levels::LITE | Levels::DEEP)
    }

    #[test]
    fn test_whitelist_name() {
        let policy = full().with_whitelist(FilterFacets::default().with_names(["secret"]));
        assert!(FilterEngine::included(&scalar("secret_key", ScalarType::I32), &policy));
        assert_eq!(
            FilterEngine::evaluate(&scalar("api_token", ScalarType::I32), &policy),
            FilterDecision::Excluded(ExclusionReason::Whitelist)
        );
    }

    #[test]
    fn test_whitelist_facets_combine() {
        let policy = full().with_whitelist(
            FilterFacets::default()
                .with_names(["key", "token"])
                .with_bits([64]),
        );
        assert!(FilterEngine::included(&scalar("api_token", ScalarType::I64), &policy));
        assert!(!FilterEngine::included(&scalar("api_token", ScalarType::I32), &policy));
        assert!(!FilterEngine::included(&scalar("ratio", ScalarType::F64), &policy));
    }

    #[test]
    fn test_blacklist() {
        let policy = full().with_blacklist(
            FilterFacets::default()
                .with_names(["debug"])
                .with_kind(ElementKind::Float),
        );
        assert_eq!(
            FilterEngine::evaluate(&scalar("debug_level", ScalarType::I32), &policy),
            FilterDecision::Excluded(ExclusionReason::Blacklist)
        );
        assert!(!FilterEngine::included(&scalar("magic_ratio", ScalarType::F32), &policy));
        assert!(FilterEngine::included(&scalar("secret_key", ScalarType::I32), &policy));
    }

    #[test]
    fn test_no_encrypt_beats_whitelist() {
        let policy = full().with_whitelist(FilterFacets::default().with_names(["secret"]));
        let mut descriptor = scalar("secret_key", ScalarType::I32);
        descriptor.annotations |= Annotations::NO_ENCRYPT;
        assert_eq!(
            FilterEngine::evaluate(&descriptor, &policy),
            FilterDecision::Excluded(ExclusionReason::NoEncrypt)
        );
    }

    #[test]
    fn test_arrays() {
        let table = array("lookup_table", ScalarType::I32, 8);

        let policy = full().with_skip_arrays(true).with_arrays_lite_only(true);
        assert_eq!(
            FilterEngine::evaluate(&table, &policy),
            FilterDecision::Excluded(ExclusionReason::SkipArrays)
        );

        let policy = full().with_arrays_lite_only(true);
        assert_eq!(
            FilterEngine::evaluate(&table, &policy),
            FilterDecision::Included(Levels::LITE)
        );
        assert_eq!(
            FilterEngine::evaluate(&scalar("secret_key", ScalarType::I32), &policy),
            FilterDecision::Included(Levels::LITE | Levels::DEEP)
        );

        let deep_only = EffectivePolicy::disabled()
            .with_levels(Levels::DEEP)
            .with_arrays_lite_only(true);
        assert_eq!(
            FilterEngine::evaluate(&table, &deep_only).levels(),
            Levels::empty()
        );
    }

    #[test]
    fn test_reserved() {
        let policy = full();
        assert_eq!(
            FilterEngine::evaluate(&scalar("__enc_header_marker", ScalarType::I32), &policy),
            FilterDecision::Excluded(ExclusionReason::Reserved)
        );
        assert!(!FilterEngine::included(&scalar("__l2g_enabled", ScalarType::I32), &policy));
    }

    #[test]
    fn test_total_and_deterministic() {
        let policies = [
            EffectivePolicy::implicit(),
            EffectivePolicy::disabled(),
            full().with_arrays_lite_only(true),
            full().with_whitelist(FilterFacets::default().with_bits([8, 16])),
            full().with_blacklist(FilterFacets::default().with_kind(ElementKind::Integer)),
        ];

        for category in TypeCategory::iter() {
            let descriptor = match category {
                TypeCategory::Integer => scalar("a", ScalarType::I16),
                TypeCategory::Float => scalar("b", ScalarType::F64),
                TypeCategory::IntegerArray => array("c", ScalarType::I8, 3),
                TypeCategory::FloatArray => array("d", ScalarType::F32, 2),
                TypeCategory::Vector => {
                    let ty = ValueType::Vector(ScalarType::I32, 4);
                    ValueDescriptor::new(
                        "e",
                        DeclRef::Global(GlobalId::new(0)),
                        ty,
                        vec![0; ty.byte_size()],
                        Annotations::empty(),
                    )
                }
            };
            assert_eq!(descriptor.category, category);

            for policy in &policies {
                let first = FilterEngine::evaluate(&descriptor, policy);
                let second = FilterEngine::evaluate(&descriptor, policy);
                assert_eq!(first, second);
            }
        }
    }
}
