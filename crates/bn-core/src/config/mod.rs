//! Inference configuration loading and validation.
//!
//! Resolution order for the config file:
//! 1. `ConfigOptions::config_path` (the `--config` flag)
//! 2. `BNET_CONFIG` environment variable
//! 3. Built-in defaults
//!
//! Command-line overrides (`--seed`, `--iterations`) are applied by the caller
//! after loading.

use std::path::{Path, PathBuf};

use bn_common::{Error, Result};
use serde::{Deserialize, Serialize};

use crate::inference::belief_prop::BeliefPropConfig;
use crate::inference::gibbs::GibbsConfig;
use crate::network::file::digest;

/// Environment variable naming a config file.
pub const CONFIG_ENV: &str = "BNET_CONFIG";

/// `[sampling]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SamplingSection {
    /// Draws per sampling run.
    pub iterations: usize,
    /// Fixed seed; `None` seeds from the operating system.
    pub seed: Option<u64>,
}

impl Default for SamplingSection {
    fn default() -> Self {
        Self {
            iterations: 10_000,
            seed: None,
        }
    }
}

/// `[gibbs]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GibbsSection {
    pub burn_in: usize,
    pub thinning: usize,
}

impl Default for GibbsSection {
    fn default() -> Self {
        let defaults = GibbsConfig::default();
        Self {
            burn_in: defaults.burn_in,
            thinning: defaults.thinning,
        }
    }
}

/// `[belief_propagation]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BeliefPropagationSection {
    pub max_iterations: usize,
    pub convergence_threshold: f64,
    pub strict_topology: bool,
}

impl Default for BeliefPropagationSection {
    fn default() -> Self {
        let defaults = BeliefPropConfig::default();
        Self {
            max_iterations: defaults.max_iterations,
            convergence_threshold: defaults.convergence_threshold,
            strict_topology: defaults.strict_topology,
        }
    }
}

/// Full inference configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InferenceConfig {
    pub sampling: SamplingSection,
    pub gibbs: GibbsSection,
    pub belief_propagation: BeliefPropagationSection,
}

impl InferenceConfig {
    /// Parse a TOML document. Missing sections and keys take defaults.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Semantic checks serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.sampling.iterations == 0 {
            return Err(Error::Config(
                "sampling.iterations must be at least 1".to_string(),
            ));
        }
        if self.gibbs.thinning == 0 {
            return Err(Error::Config("gibbs.thinning must be at least 1".to_string()));
        }
        if self.belief_propagation.max_iterations == 0 {
            return Err(Error::Config(
                "belief_propagation.max_iterations must be at least 1".to_string(),
            ));
        }
        let threshold = self.belief_propagation.convergence_threshold;
        if !(threshold.is_finite() && threshold > 0.0) {
            return Err(Error::Config(format!(
                "belief_propagation.convergence_threshold must be positive, got {threshold}"
            )));
        }
        Ok(())
    }

    pub fn gibbs_config(&self) -> GibbsConfig {
        GibbsConfig {
            burn_in: self.gibbs.burn_in,
            thinning: self.gibbs.thinning,
        }
    }

    pub fn belief_prop_config(&self) -> BeliefPropConfig {
        BeliefPropConfig {
            max_iterations: self.belief_propagation.max_iterations,
            convergence_threshold: self.belief_propagation.convergence_threshold,
            strict_topology: self.belief_propagation.strict_topology,
        }
    }
}

/// Configuration resolution options.
#[derive(Debug, Default, Clone)]
pub struct ConfigOptions {
    /// Explicit config file (highest priority).
    pub config_path: Option<PathBuf>,
}

/// Loaded configuration with provenance.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub config: InferenceConfig,
    /// File the config came from (`None` for defaults).
    pub path: Option<PathBuf>,
    /// SHA-256 of the file content (`None` for defaults).
    pub hash: Option<String>,
}

/// Resolve, parse and validate the inference configuration.
pub fn load_config(options: &ConfigOptions) -> Result<ResolvedConfig> {
    let path = options
        .config_path
        .clone()
        .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from));

    match path {
        Some(path) => {
            let (config, hash) = load_file(&path)?;
            tracing::debug!(path = %path.display(), hash = %hash, "loaded config");
            Ok(ResolvedConfig {
                config,
                path: Some(path),
                hash: Some(hash),
            })
        }
        None => Ok(ResolvedConfig {
            config: InferenceConfig::default(),
            path: None,
            hash: None,
        }),
    }
}

fn load_file(path: &Path) -> Result<(InferenceConfig, String)> {
    let text = std::fs::read_to_string(path)?;
    let config = InferenceConfig::from_toml_str(&text)?;
    config.validate()?;
    Ok((config, digest(&text)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_are_valid() {
        let config = InferenceConfig::default();
        config.validate().unwrap();
        assert_eq!(config.sampling.iterations, 10_000);
        assert_eq!(config.gibbs.thinning, 1);
        assert_eq!(config.belief_propagation.max_iterations, 100);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config = InferenceConfig::from_toml_str(
            r#"
            [sampling]
            seed = 7

            [gibbs]
            burn_in = 500
            "#,
        )
        .unwrap();
        assert_eq!(config.sampling.seed, Some(7));
        assert_eq!(config.sampling.iterations, 10_000);
        assert_eq!(config.gibbs_config().burn_in, 500);
        assert_eq!(config.gibbs_config().thinning, 1);
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = InferenceConfig::from_toml_str("[sampling]\nsamples = 3\n").unwrap_err();
        assert!(matches!(err, Error::Toml(_)));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = InferenceConfig::default();
        config.gibbs.thinning = 0;
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let mut config = InferenceConfig::default();
        config.belief_propagation.convergence_threshold = 0.0;
        assert!(config.validate().is_err());

        let mut config = InferenceConfig::default();
        config.sampling.iterations = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_explicit_path() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[belief_propagation]\nstrict_topology = true").unwrap();
        let resolved = load_config(&ConfigOptions {
            config_path: Some(file.path().to_path_buf()),
        })
        .unwrap();
        assert!(resolved.config.belief_prop_config().strict_topology);
        assert_eq!(resolved.hash.as_ref().map(String::len), Some(64));
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let err = load_config(&ConfigOptions {
            config_path: Some(PathBuf::from("/nonexistent/bnet.toml")),
        })
        .unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
