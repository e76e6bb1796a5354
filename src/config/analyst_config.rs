//! Analyst configuration - thresholds and model parameters as YAML values.
//!
//! Every struct implements `Default` so a missing or partial config file is
//! never fatal; unset sections fall back to the built-in values.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable pointing at an explicit config file.
pub const CONFIG_ENV_VAR: &str = "ADSIGHT_CONFIG";

/// Default config path relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "config/config.yaml";

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration for an analysis run.
///
/// Load with [`AnalystConfig::load`] which searches:
/// 1. `$ADSIGHT_CONFIG` env var
/// 2. `./config/config.yaml`
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalystConfig {
    /// LLM model parameters
    #[serde(default)]
    pub model: ModelConfig,

    /// Performance thresholds driving the data and creative stages
    #[serde(default)]
    pub thresholds: ThresholdConfig,

    /// Agent behavior: retries, reflection, confidence floor
    #[serde(default)]
    pub agents: AgentConfig,

    /// Dataset expectations
    #[serde(default)]
    pub data: DataConfig,

    /// Output file locations
    #[serde(default)]
    pub output: OutputConfig,
}

impl Default for AnalystConfig {
    fn default() -> Self {
        Self {
            model: ModelConfig::default(),
            thresholds: ThresholdConfig::default(),
            agents: AgentConfig::default(),
            data: DataConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

/// LLM model parameters, passed verbatim to the completion API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model name used with the OpenAI-compatible endpoint
    #[serde(default = "defaults::model_name")]
    pub name: String,
    /// Sampling temperature for insight/creative prompts
    #[serde(default = "defaults::temperature")]
    pub temperature: f32,
    /// Completion token cap per call
    #[serde(default = "defaults::max_tokens")]
    pub max_tokens: u32,
    /// Per-call HTTP timeout in seconds
    #[serde(default = "defaults::timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: defaults::model_name(),
            temperature: defaults::temperature(),
            max_tokens: defaults::max_tokens(),
            timeout_secs: defaults::timeout_secs(),
        }
    }
}

/// Performance thresholds for underperformer detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdConfig {
    /// CTR below this marks a campaign for creative refresh
    #[serde(default = "defaults::low_ctr")]
    pub low_ctr: f64,
    /// ROAS below this marks a campaign as underperforming
    #[serde(default = "defaults::low_roas")]
    pub low_roas: f64,
    /// Minimum spend for a campaign to be judged at all
    #[serde(default = "defaults::min_spend")]
    pub min_spend: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            low_ctr: defaults::low_ctr(),
            low_roas: defaults::low_roas(),
            min_spend: defaults::min_spend(),
        }
    }
}

/// Agent retry and reflection behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Overall confidence below this triggers the reflection pass
    #[serde(default = "defaults::min_confidence")]
    pub min_confidence: f64,
    /// Bounded retry count for LLM transport / parse failures
    #[serde(default = "defaults::max_retries")]
    pub max_retries: u32,
    /// Whether the single reflection retry is allowed at all
    #[serde(default = "defaults::reflection_enabled")]
    pub reflection_enabled: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            min_confidence: defaults::min_confidence(),
            max_retries: defaults::max_retries(),
            reflection_enabled: defaults::reflection_enabled(),
        }
    }
}

/// Dataset column expectations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Columns expected in the CSV. Missing non-critical columns only warn;
    /// the loader hard-fails on the critical subset (spend, revenue, roas, ctr).
    #[serde(default = "defaults::required_columns")]
    pub required_columns: Vec<String>,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            required_columns: defaults::required_columns(),
        }
    }
}

/// Output file locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "defaults::reports_dir")]
    pub reports_dir: PathBuf,
    #[serde(default = "defaults::logs_dir")]
    pub logs_dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            reports_dir: defaults::reports_dir(),
            logs_dir: defaults::logs_dir(),
        }
    }
}

/// Built-in default values, one function per field so serde defaults and
/// `Default` impls cannot drift apart.
mod defaults {
    use std::path::PathBuf;

    pub fn model_name() -> String {
        "gpt-4o-mini".to_string()
    }
    pub fn temperature() -> f32 {
        0.7
    }
    pub fn max_tokens() -> u32 {
        2000
    }
    pub fn timeout_secs() -> u64 {
        60
    }
    pub fn low_ctr() -> f64 {
        0.015
    }
    pub fn low_roas() -> f64 {
        3.0
    }
    pub fn min_spend() -> f64 {
        100.0
    }
    pub fn min_confidence() -> f64 {
        0.6
    }
    pub fn max_retries() -> u32 {
        2
    }
    pub fn reflection_enabled() -> bool {
        true
    }
    pub fn required_columns() -> Vec<String> {
        [
            "date",
            "campaign_name",
            "adset_name",
            "creative_type",
            "creative_message",
            "audience_type",
            "platform",
            "spend",
            "impressions",
            "clicks",
            "purchases",
            "revenue",
            "ctr",
            "roas",
        ]
        .iter()
        .map(|s| (*s).to_string())
        .collect()
    }
    pub fn reports_dir() -> PathBuf {
        PathBuf::from("reports")
    }
    pub fn logs_dir() -> PathBuf {
        PathBuf::from("logs")
    }
}

// ============================================================================
// Loading & validation
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {0}: {1}")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("failed to parse config file {0}: {1}")]
    Parse(PathBuf, #[source] serde_yaml::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

impl AnalystConfig {
    /// Load configuration using the standard search order:
    /// 1. `$ADSIGHT_CONFIG` environment variable
    /// 2. `./config/config.yaml` in the current working directory
    /// 3. Built-in defaults
    pub fn load() -> Self {
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), "Loaded config from ADSIGHT_CONFIG");
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from ADSIGHT_CONFIG, falling back");
                    }
                }
            } else {
                warn!(path = %path, "ADSIGHT_CONFIG points to non-existent file, falling back");
            }
        }

        let local = PathBuf::from(DEFAULT_CONFIG_PATH);
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!(path = %local.display(), "Loaded config from working directory");
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./config/config.yaml, using defaults");
                }
            }
        }

        info!("No config file found - using built-in defaults");
        Self::default()
    }

    /// Load from a specific YAML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        let config: Self = serde_yaml::from_str(&contents)
            .map_err(|e| ConfigError::Parse(path.to_path_buf(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that would make a run meaningless.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.agents.min_confidence) {
            return Err(ConfigError::Invalid(format!(
                "agents.min_confidence must be in [0,1], got {}",
                self.agents.min_confidence
            )));
        }
        if self.model.max_tokens == 0 {
            return Err(ConfigError::Invalid(
                "model.max_tokens must be greater than 0".to_string(),
            ));
        }
        if !(0.0..=2.0).contains(&self.model.temperature) {
            return Err(ConfigError::Invalid(format!(
                "model.temperature must be in [0,2], got {}",
                self.model.temperature
            )));
        }
        if self.model.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "model.timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.thresholds.low_ctr < 0.0 || self.thresholds.low_ctr > 1.0 {
            return Err(ConfigError::Invalid(format!(
                "thresholds.low_ctr must be in [0,1], got {}",
                self.thresholds.low_ctr
            )));
        }
        if self.thresholds.low_roas < 0.0 {
            return Err(ConfigError::Invalid(
                "thresholds.low_roas must be non-negative".to_string(),
            ));
        }
        if self.thresholds.min_spend < 0.0 {
            return Err(ConfigError::Invalid(
                "thresholds.min_spend must be non-negative".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AnalystConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.thresholds.low_ctr, 0.015);
        assert_eq!(config.agents.max_retries, 2);
        assert!(config.agents.reflection_enabled);
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let yaml = r"
model:
  name: llama-3.3-70b-versatile
thresholds:
  low_ctr: 0.02
";
        let config: AnalystConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.model.name, "llama-3.3-70b-versatile");
        assert_eq!(config.model.max_tokens, 2000);
        assert_eq!(config.thresholds.low_ctr, 0.02);
        assert_eq!(config.thresholds.low_roas, 3.0);
    }

    #[test]
    fn test_out_of_range_confidence_rejected() {
        let mut config = AnalystConfig::default();
        config.agents.min_confidence = 1.5;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_zero_max_tokens_rejected() {
        let mut config = AnalystConfig::default();
        config.model.max_tokens = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_negative_threshold_rejected() {
        let mut config = AnalystConfig::default();
        config.thresholds.min_spend = -5.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(
            &path,
            "agents:\n  min_confidence: 0.7\n  reflection_enabled: false\n",
        )
        .unwrap();

        let config = AnalystConfig::load_from_file(&path).unwrap();
        assert_eq!(config.agents.min_confidence, 0.7);
        assert!(!config.agents.reflection_enabled);
    }
}
