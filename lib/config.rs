//! Simulation settings loaded from TOML.
//!
//! Every field has a default, so an empty document is a valid configuration:
//! ```toml
//! [integrator]
//! method = "rk45"
//! rtol = 1e-8
//! atol = 1e-10
//!
//! [obe]
//! representation = "re_im"
//! dissipation = true
//!
//! [invariants]
//! tolerance = 1e-6
//! ```

use std::path::Path;
use serde::{ Deserialize, Serialize };
use tracing::debug;
use crate::{
    error::ConfigError,
    obe::{ ObeOptions, Representation },
    ode::Integrator,
};

/// Top-level configuration.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SimConfig {
    #[serde(default)]
    pub integrator: Integrator,

    #[serde(default)]
    pub obe: ObeConfig,

    #[serde(default)]
    pub invariants: InvariantConfig,
}

/// Optical-Bloch settings.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObeConfig {
    #[serde(default)]
    pub representation: Representation,

    #[serde(default = "default_true")]
    pub dissipation: bool,
}

impl Default for ObeConfig {
    fn default() -> Self {
        Self { representation: Representation::default(), dissipation: true }
    }
}

/// Tolerances for the post-evolution invariant checks.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InvariantConfig {
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
}

impl Default for InvariantConfig {
    fn default() -> Self { Self { tolerance: default_tolerance() } }
}

fn default_true() -> bool { true }

fn default_tolerance() -> f64 { 1e-6 }

impl SimConfig {
    /// Parse and validate a configuration from TOML text.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.integrator.check()?;
        let tol = config.invariants.tolerance;
        if !(tol.is_finite() && tol > 0.0) {
            return Err(ConfigError::Tolerance(tol));
        }
        Ok(config)
    }

    /// Read, parse and validate a configuration file.
    pub fn from_file<P>(path: P) -> Result<Self, ConfigError>
    where P: AsRef<Path>
    {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_toml_str(&content)?;
        debug!(path = %path.as_ref().display(), "loaded config");
        Ok(config)
    }

    /// Options for an [`Obe`][crate::obe::Obe] engine.
    pub fn obe_options(&self) -> ObeOptions {
        ObeOptions {
            representation: self.obe.representation,
            dissipation: self.obe.dissipation,
            integrator: self.integrator,
            invariant_tolerance: self.invariants.tolerance,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_gives_defaults() {
        let config = SimConfig::from_toml_str("").unwrap();
        assert_eq!(config, SimConfig::default());
        assert_eq!(config.obe_options(), ObeOptions::default());
    }

    #[test]
    fn full_document() {
        let text = r#"
            [integrator]
            method = "rk45"
            rtol = 1e-8
            atol = 1e-10
            max_steps = 5000

            [obe]
            representation = "re_im"
            dissipation = false

            [invariants]
            tolerance = 1e-4
        "#;
        let config = SimConfig::from_toml_str(text).unwrap();
        assert_eq!(
            config.integrator,
            Integrator::rk45(1e-8, 1e-10).with_max_steps(5000),
        );
        let opts = config.obe_options();
        assert_eq!(opts.representation, Representation::ReIm);
        assert!(!opts.dissipation);
        assert_eq!(opts.invariant_tolerance, 1e-4);
    }

    #[test]
    fn fixed_step_and_errors() {
        let config = SimConfig::from_toml_str(
            "[integrator]\nmethod = \"rk4\"\ndt = 0.01\n").unwrap();
        assert_eq!(config.integrator, Integrator::rk4(0.01));
        assert!(matches!(
            SimConfig::from_toml_str("[integrator]\nmethod = \"rk4\"\ndt = -1.0\n"),
            Err(ConfigError::Integrator(_)),
        ));
        assert!(matches!(
            SimConfig::from_toml_str("[integrator]\nmethod = \"euler\"\n"),
            Err(ConfigError::Parse(_)),
        ));
        for bad in ["-1e-6", "0.0", "nan"] {
            let text = format!("[invariants]\ntolerance = {}\n", bad);
            assert!(matches!(
                SimConfig::from_toml_str(&text),
                Err(ConfigError::Tolerance(_)),
            ));
        }
        assert!(matches!(
            SimConfig::from_file("/nonexistent/multilevel-lcp.toml"),
            Err(ConfigError::Io(_)),
        ));
    }

    #[test]
    fn reads_file() {
        let path = std::env::temp_dir().join("multilevel_lcp_config_test.toml");
        std::fs::write(&path, "[invariants]\ntolerance = 1e-3\n").unwrap();
        let config = SimConfig::from_file(&path).unwrap();
        assert_eq!(config.invariants.tolerance, 1e-3);
        std::fs::remove_file(&path).ok();
    }
}
