//! Flat string-keyed flag map and the catalogue of recognized flags.
//!
//! Flags follow the `-DNAME[=VALUE]` convention of C compilers: a flag is either
//! present without a value, present with a value, or absent. Both configuration
//! layers (externally supplied flags and in-source overrides) use this form.

use std::{collections::BTreeMap, fmt};

/// Enable the Lite level.
pub const ENC_LITE: &str = "ENC_LITE";
/// Enable the Deep level.
pub const ENC_DEEP: &str = "ENC_DEEP";
/// Enable both levels.
pub const ENC_FULL: &str = "ENC_FULL";
/// Lite iteration count.
pub const ENC_LITE_TIMES: &str = "ENC_LITE_TIMES";
/// Deep iteration count.
pub const ENC_DEEP_TIMES: &str = "ENC_DEEP_TIMES";
/// Iteration count seeding both levels.
pub const ENC_FULL_TIMES: &str = "ENC_FULL_TIMES";
/// Inline the Deep decode at every use-site.
pub const ENC_DEEP_INLINE: &str = "ENC_DEEP_INLINE";
/// Blacklist name patterns.
pub const ENC_SKIP_NAME: &str = "ENC_SKIP_NAME";
/// Blacklist bit widths.
pub const ENC_SKIP_BITS: &str = "ENC_SKIP_BITS";
/// Blacklist float elements.
pub const ENC_SKIP_FLOATS: &str = "ENC_SKIP_FLOATS";
/// Blacklist integer elements.
pub const ENC_SKIP_INTEGERS: &str = "ENC_SKIP_INTEGERS";
/// Whitelist name patterns.
pub const ENC_ONLY_NAME: &str = "ENC_ONLY_NAME";
/// Whitelist bit widths.
pub const ENC_ONLY_BITS: &str = "ENC_ONLY_BITS";
/// Whitelist float elements.
pub const ENC_ONLY_FLOATS: &str = "ENC_ONLY_FLOATS";
/// Whitelist integer elements.
pub const ENC_ONLY_INTEGERS: &str = "ENC_ONLY_INTEGERS";
/// Never encrypt arrays and vectors.
pub const ENC_SKIP_ARRAYS: &str = "ENC_SKIP_ARRAYS";
/// Restrict arrays and vectors to the Lite level.
pub const ENC_ARRAYS_LITE_ONLY: &str = "ENC_ARRAYS_LITE_ONLY";
/// Enable automatic local-to-global promotion.
pub const L2G_ENABLE: &str = "L2G_ENABLE";
/// Promote integer scalars.
pub const L2G_INTEGERS: &str = "L2G_INTEGERS";
/// Promote float scalars.
pub const L2G_FLOATS: &str = "L2G_FLOATS";
/// Promote integer arrays and vectors.
pub const L2G_INT_ARRAYS: &str = "L2G_INT_ARRAYS";
/// Promote float arrays and vectors.
pub const L2G_FLOAT_ARRAYS: &str = "L2G_FLOAT_ARRAYS";
/// Promote every type category.
pub const L2G_ALL: &str = "L2G_ALL";
/// Promote constant binary operation results.
pub const L2G_OPS: &str = "L2G_OPS";
/// Deduplicate identical promoted constants.
pub const L2G_DEDUP: &str = "L2G_DEDUP";
/// Promotion probability in percent.
pub const L2G_PROB: &str = "L2G_PROB";
/// Maximum element count for automatic array promotion.
pub const L2G_MAX_ARRAY: &str = "L2G_MAX_ARRAY";

/// Every flag the resolver interprets.
pub const KNOWN_FLAGS: [&str; 27] = [
    ENC_LITE,
    ENC_DEEP,
    ENC_FULL,
    ENC_LITE_TIMES,
    ENC_DEEP_TIMES,
    ENC_FULL_TIMES,
    ENC_DEEP_INLINE,
    ENC_SKIP_NAME,
    ENC_SKIP_BITS,
    ENC_SKIP_FLOATS,
    ENC_SKIP_INTEGERS,
    ENC_ONLY_NAME,
    ENC_ONLY_BITS,
    ENC_ONLY_FLOATS,
    ENC_ONLY_INTEGERS,
    ENC_SKIP_ARRAYS,
    ENC_ARRAYS_LITE_ONLY,
    L2G_ENABLE,
    L2G_INTEGERS,
    L2G_FLOATS,
    L2G_INT_ARRAYS,
    L2G_FLOAT_ARRAYS,
    L2G_ALL,
    L2G_OPS,
    L2G_DEDUP,
    L2G_PROB,
    L2G_MAX_ARRAY,
];

/// A set of `NAME[=VALUE]` flags.
///
/// # Example
///
/// ```rust
/// use obscura::FlagSet;
///
/// let flags = FlagSet::from_defines(["ENC_FULL", "ENC_LITE_TIMES=3", "ENC_ONLY_NAME=\"secret\""]);
/// assert!(flags.contains("ENC_FULL"));
/// assert_eq!(flags.value("ENC_LITE_TIMES"), Some("3"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlagSet {
    flags: BTreeMap<String, Option<String>>,
}

impl FlagSet {
    /// Creates an empty flag set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a flag set from `NAME[=VALUE]` strings; later entries win.
    #[must_use]
    pub fn from_defines<I, S>(defines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut flags = Self::new();
        for define in defines {
            if let Some((name, value)) = Self::parse_define(define.as_ref()) {
                flags.insert(name, value);
            }
        }
        flags
    }

    /// Splits a `NAME[=VALUE]` string, accepting an optional `-D` prefix.
    ///
    /// Returns `None` for an empty name.
    #[must_use]
    pub fn parse_define(define: &str) -> Option<(String, Option<String>)> {
        let define = define.trim();
        let define = define.strip_prefix("-D").unwrap_or(define);
        let (name, value) = match define.split_once('=') {
            Some((name, value)) => (name.trim(), Some(value.trim().to_string())),
            None => (define, None),
        };
        if name.is_empty() {
            return None;
        }
        Some((name.to_string(), value))
    }

    /// Sets a flag without a value (builder pattern).
    #[must_use]
    pub fn with(mut self, name: &str) -> Self {
        self.insert(name.to_string(), None);
        self
    }

    /// Sets a flag to a value (builder pattern).
    #[must_use]
    pub fn with_value(mut self, name: &str, value: impl ToString) -> Self {
        self.insert(name.to_string(), Some(value.to_string()));
        self
    }

    /// Inserts or replaces a flag.
    pub fn insert(&mut self, name: String, value: Option<String>) {
        self.flags.insert(name, value);
    }

    /// Returns `true` if the flag is present, with or without a value.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.flags.contains_key(name)
    }

    /// Returns the flag entry: `None` if absent, `Some(None)` if present without value.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Option<&str>> {
        self.flags.get(name).map(Option::as_deref)
    }

    /// Returns the value of a flag, if present with a value.
    #[must_use]
    pub fn value(&self, name: &str) -> Option<&str> {
        self.get(name).flatten()
    }

    /// Returns a new set where every key of `overrides` masks the same key of `self`.
    ///
    /// Within `overrides`, later entries win over earlier ones.
    #[must_use]
    pub fn layered(&self, overrides: &[(String, Option<String>)]) -> Self {
        let mut merged = self.clone();
        for (name, value) in overrides {
            merged.insert(name.clone(), value.clone());
        }
        merged
    }

    /// Iterates the flags in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.flags
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_deref()))
    }

    /// Returns the number of flags.
    #[must_use]
    pub fn len(&self) -> usize {
        self.flags.len()
    }

    /// Returns `true` if no flag is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }
}

impl fmt::Display for FlagSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (name, value) in self.iter() {
            if !first {
                f.write_str(" ")?;
            }
            first = false;
            match value {
                Some(value) => write!(f, "-D{name}={value}")?,
                None => write!(f, "-D{name}")?,
            }
        }
        Ok(())
    }
}

impl<S: AsRef<str>> FromIterator<S> for FlagSet {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Self::from_defines(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_define() {
        assert_eq!(
            FlagSet::parse_define("ENC_LITE_TIMES=3"),
            Some(("ENC_LITE_TIMES".to_string(), Some("3".to_string())))
        );
        assert_eq!(
            FlagSet::parse_define("-DENC_FULL"),
            Some(("ENC_FULL".to_string(), None))
        );
        assert_eq!(
            FlagSet::parse_define("ENC_ONLY_NAME="),
            Some(("ENC_ONLY_NAME".to_string(), Some(String::new())))
        );
        assert_eq!(FlagSet::parse_define("=3"), None);
        assert_eq!(FlagSet::parse_define("  "), None);
    }

    #[test]
    fn test_get_and_value() {
        let flags = FlagSet::new().with(ENC_FULL).with_value(L2G_PROB, 50);
        assert_eq!(flags.get(ENC_FULL), Some(None));
        assert_eq!(flags.get(L2G_PROB), Some(Some("50")));
        assert_eq!(flags.get(ENC_DEEP), None);
        assert_eq!(flags.value(ENC_FULL), None);
        assert_eq!(flags.value(L2G_PROB), Some("50"));
    }

    #[test]
    fn test_layering_masks_per_key() {
        let external = FlagSet::from_defines(["ENC_LITE", "ENC_LITE_TIMES=4", "L2G_PROB=10"]);
        let overrides = vec![
            (ENC_LITE_TIMES.to_string(), Some("2".to_string())),
            (ENC_DEEP.to_string(), None),
            (ENC_LITE_TIMES.to_string(), Some("3".to_string())),
        ];

        let merged = external.layered(&overrides);
        assert_eq!(merged.value(ENC_LITE_TIMES), Some("3"));
        assert!(merged.contains(ENC_LITE));
        assert!(merged.contains(ENC_DEEP));
        assert_eq!(merged.value(L2G_PROB), Some("10"));
        assert_eq!(external.value(ENC_LITE_TIMES), Some("4"));
    }

    #[test]
    fn test_display() {
        let flags: FlagSet = ["ENC_LITE", "L2G_PROB=5"].into_iter().collect();
        assert_eq!(flags.to_string(), "-DENC_LITE -DL2G_PROB=5");
    }
}
