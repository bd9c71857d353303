//! Merges the configuration layers of a unit into one [`EffectivePolicy`].
//!
//! Two layers feed the resolver: the externally supplied [`FlagSet`] and the
//! in-source overrides the host found before the policy boundary marker
//! ([`Module::overrides`]). The layers are merged per key first (in-source wins),
//! and only the merged map is interpreted, so derived settings such as
//! `ENC_FULL_TIMES` always see the final level-specific values.
//!
//! Out-of-range values never fail resolution. They are clamped to the nearest
//! valid bound and reported as [`EventKind::ConfigurationClamped`]; unparsable
//! values keep their default and are reported as warnings.

use crate::{
    compiler::{EventKind, EventLog},
    config::{
        flags::*,
        policy::{EffectivePolicy, FilterFacets, Level, Levels, PromotionPolicy},
        FlagSet,
    },
    descriptor::ElementKind,
    ir::Module,
};

/// Builds the effective policy of a compilation unit.
///
/// # Example
///
/// ```rust
/// use obscura::{
///     compiler::EventLog,
///     config::{ConfigResolver, Level, Levels},
///     ir::Module,
///     FlagSet,
/// };
///
/// let mut module = Module::new("unit.c").with_override("ENC_DEEP_TIMES", Some("4"));
/// module.add_policy_marker();
///
/// let flags = FlagSet::from_defines(["ENC_FULL", "ENC_FULL_TIMES=2", "ENC_DEEP_TIMES=9"]);
/// let policy = ConfigResolver::default().resolve(&module, &flags, &EventLog::new());
///
/// assert_eq!(policy.levels, Levels::LITE | Levels::DEEP);
/// assert_eq!(policy.iterations(Level::Lite), 2);
/// assert_eq!(policy.iterations(Level::Deep), 4);
/// ```
#[derive(Debug, Clone)]
pub struct ConfigResolver {
    max_iterations_warning: u32,
}

impl Default for ConfigResolver {
    fn default() -> Self {
        Self::new(15)
    }
}

impl ConfigResolver {
    /// Creates a resolver; iteration counts above `max_iterations_warning` are reported.
    #[must_use]
    pub fn new(max_iterations_warning: u32) -> Self {
        Self {
            max_iterations_warning,
        }
    }

    /// Resolves the policy of `module` under the external `flags`.
    ///
    /// Without the boundary marker the fixed implicit policy is returned and no
    /// flag is consulted.
    pub fn resolve(&self, module: &Module, flags: &FlagSet, events: &EventLog) -> EffectivePolicy {
        if !module.has_policy_marker() {
            let ignored = flags.len() + module.overrides.len();
            if ignored > 0 {
                events.info(format!(
                    "{ignored} flags ignored, `{}` has no policy marker",
                    module.id
                ));
            }
            return EffectivePolicy::implicit();
        }

        let merged = flags.layered(&module.overrides);
        log::debug!("resolving explicit policy for {}: {}", module.id, merged);
        self.interpret(&merged, events)
    }

    /// Interprets an already merged flag map in explicit mode.
    pub fn interpret(&self, flags: &FlagSet, events: &EventLog) -> EffectivePolicy {
        let reader = FlagReader { flags, events };

        for (name, _) in flags.iter() {
            let ours = name.starts_with("ENC_") || name.starts_with("L2G_");
            if ours && !KNOWN_FLAGS.contains(&name) {
                events.warn(format!("unknown flag `{name}` ignored"));
            }
        }

        let full = reader.flag(ENC_FULL);
        let mut levels = Levels::empty();
        if full || reader.flag(ENC_LITE) {
            levels |= Levels::LITE;
        }
        if full || reader.flag(ENC_DEEP) {
            levels |= Levels::DEEP;
        }

        let lite_iterations = self.iterations(&reader, Level::Lite);
        let deep_iterations = self.iterations(&reader, Level::Deep);

        let mut whitelist = FilterFacets::default()
            .with_names(reader.list(ENC_ONLY_NAME))
            .with_bits(reader.bits(ENC_ONLY_BITS));
        if reader.flag(ENC_ONLY_INTEGERS) {
            whitelist = whitelist.with_kind(ElementKind::Integer);
        }
        if reader.flag(ENC_ONLY_FLOATS) {
            whitelist = whitelist.with_kind(ElementKind::Float);
        }

        let mut blacklist = FilterFacets::default()
            .with_names(reader.list(ENC_SKIP_NAME))
            .with_bits(reader.bits(ENC_SKIP_BITS));
        if reader.flag(ENC_SKIP_INTEGERS) {
            blacklist = blacklist.with_kind(ElementKind::Integer);
        }
        if reader.flag(ENC_SKIP_FLOATS) {
            blacklist = blacklist.with_kind(ElementKind::Float);
        }

        EffectivePolicy::disabled()
            .with_levels(levels)
            .with_iterations(Level::Lite, lite_iterations)
            .with_iterations(Level::Deep, deep_iterations)
            .with_deep_inline(reader.flag(ENC_DEEP_INLINE))
            .with_skip_arrays(reader.flag(ENC_SKIP_ARRAYS))
            .with_arrays_lite_only(reader.flag(ENC_ARRAYS_LITE_ONLY))
            .with_whitelist(whitelist)
            .with_blacklist(blacklist)
            .with_promotion(Self::promotion(&reader))
    }

    fn iterations(&self, reader: &FlagReader<'_>, level: Level) -> u32 {
        let specific = match level {
            Level::Lite => ENC_LITE_TIMES,
            Level::Deep => ENC_DEEP_TIMES,
        };
        // An unusable level-specific count falls back to the combined one.
        let parsed = [specific, ENC_FULL_TIMES]
            .into_iter()
            .filter(|&name| reader.flags.contains(name))
            .find_map(|name| reader.number(name).map(|raw| (name, raw)));
        let Some((name, raw)) = parsed else {
            return 1;
        };

        let iterations = if raw < 1 {
            reader
                .events
                .record(EventKind::ConfigurationClamped)
                .message(format!("{name}={raw} clamped to 1 ({level} iterations)"));
            1
        } else {
            u32::try_from(raw).unwrap_or_else(|_| {
                reader
                    .events
                    .record(EventKind::ConfigurationClamped)
                    .message(format!("{name}={raw} clamped to {}", u32::MAX));
                u32::MAX
            })
        };

        if iterations > self.max_iterations_warning {
            reader.events.info(format!(
                "{level} runs {iterations} iterations, more than {} slows every protected read",
                self.max_iterations_warning
            ));
        }
        iterations
    }

    fn promotion(reader: &FlagReader<'_>) -> PromotionPolicy {
        let mut promotion = if reader.flag(L2G_ENABLE) {
            PromotionPolicy::enabled()
        } else {
            PromotionPolicy::disabled()
        };

        if reader.flag(L2G_ALL) {
            promotion = promotion.with_all_types();
        }
        for (name, toggle) in [
            (L2G_INTEGERS, &mut promotion.integers),
            (L2G_FLOATS, &mut promotion.floats),
            (L2G_INT_ARRAYS, &mut promotion.int_arrays),
            (L2G_FLOAT_ARRAYS, &mut promotion.float_arrays),
        ] {
            if reader.flags.contains(name) {
                *toggle = reader.flag(name);
            }
        }

        promotion.ops = reader.flag(L2G_OPS);
        promotion.dedup = reader.flag(L2G_DEDUP);

        if let Some(raw) = reader.number(L2G_PROB) {
            let clamped = raw.clamp(0, 100);
            if clamped != raw {
                reader
                    .events
                    .record(EventKind::ConfigurationClamped)
                    .message(format!("{L2G_PROB}={raw} clamped to {clamped}"));
            }
            promotion.probability = u8::try_from(clamped).unwrap_or(100);
        }

        if let Some(raw) = reader.number(L2G_MAX_ARRAY) {
            if raw < 0 {
                reader
                    .events
                    .record(EventKind::ConfigurationClamped)
                    .message(format!("{L2G_MAX_ARRAY}={raw} clamped to 0 (unlimited)"));
            }
            promotion.max_array_size = usize::try_from(raw.max(0)).unwrap_or(usize::MAX);
        }

        promotion
    }
}

/// Typed access to a merged flag map, reporting malformed values.
struct FlagReader<'a> {
    flags: &'a FlagSet,
    events: &'a EventLog,
}

impl FlagReader<'_> {
    /// Boolean flag: absent is `false`, a bare flag is `true`.
    fn flag(&self, name: &str) -> bool {
        match self.flags.get(name) {
            None => false,
            Some(None) => true,
            Some(Some(value)) => match value.trim().to_ascii_lowercase().as_str() {
                "" | "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                other => {
                    self.events
                        .warn(format!("{name}={other} is not a boolean, treated as set"));
                    true
                }
            },
        }
    }

    /// Numeric flag: `None` if absent or unparsable.
    fn number(&self, name: &str) -> Option<i64> {
        let entry = self.flags.get(name)?;
        let Some(value) = entry else {
            self.events
                .warn(format!("{name} expects a number, default kept"));
            return None;
        };

        let parsed = value.trim().trim_matches('"').parse::<i64>();
        match parsed {
            Ok(number) => Some(number),
            Err(_) => {
                self.events
                    .warn(format!("{name}={value} is not a number, default kept"));
                None
            }
        }
    }

    /// Comma separated list with surrounding quotes stripped.
    fn list(&self, name: &str) -> Vec<String> {
        match self.flags.get(name) {
            None => Vec::new(),
            Some(None) => {
                self.events
                    .warn(format!("{name} expects a comma separated list"));
                Vec::new()
            }
            Some(Some(value)) => value
                .trim()
                .trim_matches('"')
                .split(',')
                .map(|item| item.trim().trim_matches('"').to_string())
                .filter(|item| !item.is_empty())
                .collect(),
        }
    }

    /// Comma separated list of bit widths; malformed entries are dropped.
    fn bits(&self, name: &str) -> Vec<u32> {
        self.list(name)
            .into_iter()
            .filter_map(|item| match item.parse::<u32>() {
                Ok(bits) => Some(bits),
                Err(_) => {
                    self.events
                        .warn(format!("{name}: `{item}` is not a bit width, ignored"));
                    None
                }
            })
            .collect()
    }
}
