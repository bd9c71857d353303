//! The resolved, immutable configuration of one compilation unit.

use std::fmt;

use bitflags::bitflags;
use strum::{Display, EnumIter};

use crate::descriptor::{ElementKind, ValueDescriptor};

/// A protection strength.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumIter)]
pub enum Level {
    /// Self-inverse XOR transform, always decoded inline.
    Lite,
    /// Paired encode/decode mixing transform, decoded by a shared routine or inline.
    Deep,
}

impl Level {
    /// Returns the level as a single-member [`Levels`] set.
    #[must_use]
    pub const fn as_set(self) -> Levels {
        match self {
            Self::Lite => Levels::LITE,
            Self::Deep => Levels::DEEP,
        }
    }
}

bitflags! {
    /// A set of protection levels.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Levels: u8 {
        /// The Lite level.
        const LITE = 0b01;
        /// The Deep level.
        const DEEP = 0b10;
    }
}

impl Levels {
    /// Returns `true` if the set contains `level`.
    #[must_use]
    pub const fn has(self, level: Level) -> bool {
        self.contains(level.as_set())
    }
}

impl fmt::Display for Levels {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.has(Level::Lite), self.has(Level::Deep)) {
            (true, true) => f.write_str("{lite, deep}"),
            (true, false) => f.write_str("{lite}"),
            (false, true) => f.write_str("{deep}"),
            (false, false) => f.write_str("{}"),
        }
    }
}

/// Whether the unit declared the policy boundary marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum PolicyMode {
    /// No marker: fixed default policy.
    Implicit,
    /// Marker present: only what is explicitly set.
    Explicit,
}

/// One side of the name/bit-width/element-kind filter.
///
/// A facet category is active when it is non-empty. A descriptor matches a facet
/// category when it matches any of its entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterFacets {
    /// Case-sensitive substring patterns.
    pub names: Vec<String>,
    /// Element bit widths.
    pub bits: Vec<u32>,
    /// Element kinds.
    pub kinds: Vec<ElementKind>,
}

impl FilterFacets {
    /// Returns `true` if any facet category is active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.names.is_empty() || !self.bits.is_empty() || !self.kinds.is_empty()
    }

    /// Returns `true` if the filter name contains one of the patterns; `None` if inactive.
    #[must_use]
    pub fn match_name(&self, descriptor: &ValueDescriptor) -> Option<bool> {
        (!self.names.is_empty()).then(|| {
            self.names
                .iter()
                .any(|pattern| descriptor.filter_name().contains(pattern.as_str()))
        })
    }

    /// Returns `true` if the bit width is listed; `None` if inactive.
    #[must_use]
    pub fn match_bits(&self, descriptor: &ValueDescriptor) -> Option<bool> {
        (!self.bits.is_empty()).then(|| self.bits.contains(&descriptor.bit_width))
    }

    /// Returns `true` if the element kind is listed; `None` if inactive.
    #[must_use]
    pub fn match_kind(&self, descriptor: &ValueDescriptor) -> Option<bool> {
        (!self.kinds.is_empty()).then(|| self.kinds.contains(&descriptor.element_kind))
    }

    /// Adds name patterns (builder pattern).
    #[must_use]
    pub fn with_names<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.names.extend(names.into_iter().map(Into::into));
        self
    }

    /// Adds bit widths (builder pattern).
    #[must_use]
    pub fn with_bits(mut self, bits: impl IntoIterator<Item = u32>) -> Self {
        self.bits.extend(bits);
        self
    }

    /// Adds an element kind (builder pattern).
    #[must_use]
    pub fn with_kind(mut self, kind: ElementKind) -> Self {
        if !self.kinds.contains(&kind) {
            self.kinds.push(kind);
        }
        self
    }
}

/// Local-to-global promotion settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromotionPolicy {
    /// Automatic promotion is enabled.
    pub enabled: bool,
    /// Promote integer scalars.
    pub integers: bool,
    /// Promote float scalars.
    pub floats: bool,
    /// Promote integer arrays and vectors.
    pub int_arrays: bool,
    /// Promote float arrays and vectors.
    pub float_arrays: bool,
    /// Promote constant binary operation results.
    pub ops: bool,
    /// Collapse identical promoted constants.
    pub dedup: bool,
    /// Probability of automatic promotion in percent, 0..=100.
    pub probability: u8,
    /// Maximum element count for automatic array promotion; 0 means unlimited.
    pub max_array_size: usize,
}

impl PromotionPolicy {
    /// Default probability.
    pub const DEFAULT_PROBABILITY: u8 = 100;
    /// Default maximum array size.
    pub const DEFAULT_MAX_ARRAY_SIZE: usize = 1024;

    /// Promotion disabled, defaults otherwise.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            integers: false,
            floats: false,
            int_arrays: false,
            float_arrays: false,
            ops: false,
            dedup: false,
            probability: Self::DEFAULT_PROBABILITY,
            max_array_size: Self::DEFAULT_MAX_ARRAY_SIZE,
        }
    }

    /// Automatic promotion of integer and float scalars, the `L2G_ENABLE` defaults.
    #[must_use]
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            integers: true,
            floats: true,
            ..Self::disabled()
        }
    }

    /// Returns `true` if the per-type toggle admits the descriptor.
    #[must_use]
    pub fn admits_type(&self, descriptor: &ValueDescriptor) -> bool {
        match (descriptor.is_aggregate(), descriptor.element_kind) {
            (false, ElementKind::Integer) => self.integers,
            (false, ElementKind::Float) => self.floats,
            (true, ElementKind::Integer) => self.int_arrays,
            (true, ElementKind::Float) => self.float_arrays,
        }
    }

    /// Enables every type toggle (builder pattern).
    #[must_use]
    pub fn with_all_types(mut self) -> Self {
        self.integers = true;
        self.floats = true;
        self.int_arrays = true;
        self.float_arrays = true;
        self
    }

    /// Sets operation promotion (builder pattern).
    #[must_use]
    pub fn with_ops(mut self, ops: bool) -> Self {
        self.ops = ops;
        self
    }

    /// Sets deduplication (builder pattern).
    #[must_use]
    pub fn with_dedup(mut self, dedup: bool) -> Self {
        self.dedup = dedup;
        self
    }

    /// Sets the probability, clamped to 100 (builder pattern).
    #[must_use]
    pub fn with_probability(mut self, probability: u8) -> Self {
        self.probability = probability.min(100);
        self
    }

    /// Sets the maximum array size (builder pattern).
    #[must_use]
    pub fn with_max_array_size(mut self, max_array_size: usize) -> Self {
        self.max_array_size = max_array_size;
        self
    }
}

impl Default for PromotionPolicy {
    fn default() -> Self {
        Self::disabled()
    }
}

/// Resolved configuration of one compilation unit.
///
/// Built once by [`ConfigResolver`](crate::config::ConfigResolver) and never
/// mutated afterwards.
///
/// # Example
///
/// ```rust
/// use obscura::config::{EffectivePolicy, Level, Levels};
///
/// let policy = EffectivePolicy::implicit();
/// assert_eq!(policy.levels, Levels::LITE | Levels::DEEP);
/// assert_eq!(policy.iterations(Level::Deep), 1);
///
/// let custom = EffectivePolicy::disabled()
///     .with_levels(Levels::LITE)
///     .with_iterations(Level::Lite, 3);
/// assert_eq!(custom.iterations(Level::Lite), 3);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectivePolicy {
    /// How the policy was derived.
    pub mode: PolicyMode,
    /// Enabled levels.
    pub levels: Levels,
    /// Lite iterations, at least 1.
    pub lite_iterations: u32,
    /// Deep iterations, at least 1.
    pub deep_iterations: u32,
    /// Duplicate the Deep decode at every use-site instead of sharing a routine.
    pub deep_inline: bool,
    /// Restrict arrays and vectors to the Lite level.
    pub arrays_lite_only: bool,
    /// Never encrypt arrays and vectors.
    pub skip_arrays: bool,
    /// Facets a declaration must match.
    pub whitelist: FilterFacets,
    /// Facets a declaration must not match.
    pub blacklist: FilterFacets,
    /// Promotion settings.
    pub promotion: PromotionPolicy,
}

impl EffectivePolicy {
    /// The fixed policy of units without the boundary marker.
    #[must_use]
    pub fn implicit() -> Self {
        Self {
            mode: PolicyMode::Implicit,
            levels: Levels::LITE | Levels::DEEP,
            ..Self::disabled()
        }
    }

    /// An explicit policy that enables nothing.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            mode: PolicyMode::Explicit,
            levels: Levels::empty(),
            lite_iterations: 1,
            deep_iterations: 1,
            deep_inline: false,
            arrays_lite_only: false,
            skip_arrays: false,
            whitelist: FilterFacets::default(),
            blacklist: FilterFacets::default(),
            promotion: PromotionPolicy::disabled(),
        }
    }

    /// Returns the iteration count of a level.
    #[must_use]
    pub const fn iterations(&self, level: Level) -> u32 {
        match level {
            Level::Lite => self.lite_iterations,
            Level::Deep => self.deep_iterations,
        }
    }

    /// Sets the enabled levels (builder pattern).
    #[must_use]
    pub fn with_levels(mut self, levels: Levels) -> Self {
        self.levels = levels;
        self
    }

    /// Sets the iteration count of a level, at least 1 (builder pattern).
    #[must_use]
    pub fn with_iterations(mut self, level: Level, iterations: u32) -> Self {
        let iterations = iterations.max(1);
        match level {
            Level::Lite => self.lite_iterations = iterations,
            Level::Deep => self.deep_iterations = iterations,
        }
        self
    }

    /// Sets Deep inlining (builder pattern).
    #[must_use]
    pub fn with_deep_inline(mut self, deep_inline: bool) -> Self {
        self.deep_inline = deep_inline;
        self
    }

    /// Sets Lite-only arrays (builder pattern).
    #[must_use]
    pub fn with_arrays_lite_only(mut self, arrays_lite_only: bool) -> Self {
        self.arrays_lite_only = arrays_lite_only;
        self
    }

    /// Sets array skipping (builder pattern).
    #[must_use]
    pub fn with_skip_arrays(mut self, skip_arrays: bool) -> Self {
        self.skip_arrays = skip_arrays;
        self
    }

    /// Sets the whitelist (builder pattern).
    #[must_use]
    pub fn with_whitelist(mut self, whitelist: FilterFacets) -> Self {
        self.whitelist = whitelist;
        self
    }

    /// Sets the blacklist (builder pattern).
    #[must_use]
    pub fn with_blacklist(mut self, blacklist: FilterFacets) -> Self {
        self.blacklist = blacklist;
        self
    }

    /// Sets the promotion settings (builder pattern).
    #[must_use]
    pub fn with_promotion(mut self, promotion: PromotionPolicy) -> Self {
        self.promotion = promotion;
        self
    }
}

impl Default for EffectivePolicy {
    fn default() -> Self {
        Self::implicit()
    }
}

impl fmt::Display for EffectivePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} levels={} lite={} deep={}",
            self.mode, self.levels, self.lite_iterations, self.deep_iterations
        )?;
        if self.deep_inline {
            f.write_str(" inline")?;
        }
        if self.promotion.enabled {
            write!(f, " l2g(p={})", self.promotion.probability)?;
        }
        Ok(())
    }
}
