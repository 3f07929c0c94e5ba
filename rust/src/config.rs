//! Configuration types for the convolution engine.

use pyo3::prelude::*;

use crate::parallel::DEFAULT_WORKER_CAP;

/// Configuration for strategy selection and engine limits.
#[pyclass]
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Convolution strategy: "direct", "parallel-direct", "transform", or "cross-check"
    #[pyo3(get, set)]
    pub strategy: String,
    /// Upper bound on worker threads (the pool never exceeds available parallelism)
    #[pyo3(get, set)]
    pub worker_cap: usize,
    /// Padding of the frequency-domain grid: "minimal" or "full"
    #[pyo3(get, set)]
    pub padding: String,
    /// Resolution passes allowed on the fixed-point table before giving up on a target
    #[pyo3(get, set)]
    pub max_fixed_point_passes: usize,
    /// Logging verbosity (0 silent, 1 progress, 2 detail, 3 debug)
    #[pyo3(get, set)]
    pub verbosity: u8,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            strategy: "transform".to_string(),
            worker_cap: DEFAULT_WORKER_CAP,
            padding: "minimal".to_string(),
            max_fixed_point_passes: 64,
            verbosity: 0,
        }
    }
}

#[pymethods]
impl EngineConfig {
    #[new]
    #[pyo3(signature = (
        strategy=None,
        worker_cap=None,
        padding=None,
        max_fixed_point_passes=None,
        verbosity=None
    ))]
    fn new(
        strategy: Option<String>,
        worker_cap: Option<usize>,
        padding: Option<String>,
        max_fixed_point_passes: Option<usize>,
        verbosity: Option<u8>,
    ) -> Self {
        let defaults = Self::default();
        Self {
            strategy: strategy.unwrap_or(defaults.strategy),
            worker_cap: worker_cap.unwrap_or(defaults.worker_cap),
            padding: padding.unwrap_or(defaults.padding),
            max_fixed_point_passes: max_fixed_point_passes
                .unwrap_or(defaults.max_fixed_point_passes),
            verbosity: verbosity.unwrap_or(defaults.verbosity),
        }
    }

    fn __repr__(&self) -> String {
        format!(
            "EngineConfig(strategy={:?}, worker_cap={}, padding={:?})",
            self.strategy, self.worker_cap, self.padding
        )
    }
}

impl EngineConfig {
    /// Default configuration with a different strategy.
    pub fn with_strategy(strategy: &str) -> Self {
        Self {
            strategy: strategy.to_string(),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.strategy, "transform");
        assert_eq!(config.worker_cap, 15);
        assert_eq!(config.padding, "minimal");
        assert_eq!(config.verbosity, 0);
    }

    #[test]
    fn test_new_fills_missing_fields() {
        let config = EngineConfig::new(Some("direct".to_string()), Some(2), None, None, Some(1));
        assert_eq!(config.strategy, "direct");
        assert_eq!(config.worker_cap, 2);
        assert_eq!(config.padding, "minimal");
        assert_eq!(config.max_fixed_point_passes, 64);
        assert_eq!(config.verbosity, 1);
    }

    #[test]
    fn test_with_strategy() {
        assert_eq!(EngineConfig::with_strategy("cross-check").strategy, "cross-check");
    }
}
