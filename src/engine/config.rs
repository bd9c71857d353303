//! Configuration for the protection engine.
//!
//! These settings belong to the build, not to a compilation unit: unit-level
//! behaviour comes from the flags resolved per unit.

/// Configuration for the protection engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Process units and declarations on the rayon pool (default: true).
    pub parallel: bool,

    /// Iteration counts above this are reported as informational (default: 15).
    pub max_iterations_warning: u32,

    /// Build seed mixed into every key derivation and promotion draw (default: 0).
    ///
    /// Identical sources, flags and seed always produce identical output.
    pub seed: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            parallel: true,
            max_iterations_warning: 15,
            seed: 0,
        }
    }
}

impl EngineConfig {
    /// Enables or disables parallel processing (builder pattern).
    #[must_use]
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Sets the iteration count above which resolution reports (builder pattern).
    #[must_use]
    pub fn with_max_iterations_warning(mut self, max_iterations_warning: u32) -> Self {
        self.max_iterations_warning = max_iterations_warning;
        self
    }

    /// Sets the build seed (builder pattern).
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert!(config.parallel);
        assert_eq!(config.max_iterations_warning, 15);
        assert_eq!(config.seed, 0);

        let config = config.with_parallel(false).with_seed(7).with_max_iterations_warning(4);
        assert!(!config.parallel);
        assert_eq!(config.seed, 7);
        assert_eq!(config.max_iterations_warning, 4);
    }
}
