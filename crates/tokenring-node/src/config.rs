//! Node configuration.
//!
//! Ring membership and role come from the command line; everything tunable
//! (timeouts, pacing, metrics, render output) lives in an optional TOML file
//! whose fields all have defaults. Command-line flags override the file.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How a node reacts to a payload it could not decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum CorruptTokenPolicy {
    /// Handle it like a missed token: non-observers regenerate.
    #[default]
    Regenerate,
    /// Drop it and keep waiting.
    Await,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub corrupt_token_policy: CorruptTokenPolicy,
    pub timing: TimingConfig,
    pub render: RenderConfig,
    pub metrics: Vec<MetricSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// How long AWAIT blocks before declaring the token missing.
    pub receive_timeout_ms: u64,
    /// Connect + write budget for a single forwarding attempt.
    pub hop_timeout_ms: u64,
    /// Delay between augmenting a received token and forwarding it.
    pub round_pause_ms: u64,
    /// Delay after regenerating a token.
    pub retry_pause_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            receive_timeout_ms: 30_000,
            hop_timeout_ms: 10_000,
            round_pause_ms: 3_000,
            retry_pause_ms: 2_000,
        }
    }
}

impl TimingConfig {
    pub fn receive_timeout(&self) -> Duration {
        Duration::from_millis(self.receive_timeout_ms)
    }

    pub fn hop_timeout(&self) -> Duration {
        Duration::from_millis(self.hop_timeout_ms)
    }

    pub fn round_pause(&self) -> Duration {
        Duration::from_millis(self.round_pause_ms)
    }

    pub fn retry_pause(&self) -> Duration {
        Duration::from_millis(self.retry_pause_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub output_dir: PathBuf,
    pub file_prefix: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            file_prefix: "token-plot".to_string(),
        }
    }
}

/// A named metric plus the metadata needed to simulate and display it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSpec {
    pub name: String,
    pub title: String,
    #[serde(default)]
    pub unit: Option<String>,
    pub min: f64,
    pub max: f64,
    /// Probability that a simulated reading comes back empty.
    #[serde(default = "default_dropout")]
    pub dropout: f64,
}

fn default_dropout() -> f64 {
    0.05
}

impl MetricSpec {
    pub fn new(name: &str, title: &str, unit: Option<&str>, min: f64, max: f64) -> Self {
        Self {
            name: name.to_string(),
            title: title.to_string(),
            unit: unit.map(str::to_string),
            min,
            max,
            dropout: default_dropout(),
        }
    }
}

/// The four field sensors every node carries unless configured otherwise.
pub fn default_metrics() -> Vec<MetricSpec> {
    vec![
        MetricSpec::new("temperature", "Temperature Sensor", Some("°C"), -10.0, 40.0),
        MetricSpec::new("humidity", "Humidity Sensor", Some("%"), 0.0, 100.0),
        MetricSpec::new("soil_moisture", "Soil Moisture Sensor", None, 0.0, 100.0),
        MetricSpec::new("wind_speed", "Wind Sensor", Some("m/s"), 0.0, 25.0),
    ]
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl NodeConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let cfg: NodeConfig = toml::from_str(content)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = &self.timing;
        if t.receive_timeout_ms == 0 || t.hop_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "receive and hop timeouts must be non-zero".into(),
            ));
        }

        if self.metrics.is_empty() {
            return Err(ConfigError::Invalid("at least one metric is required".into()));
        }

        let mut seen = HashSet::new();
        for m in &self.metrics {
            if !seen.insert(m.name.as_str()) {
                return Err(ConfigError::Invalid(format!("duplicate metric '{}'", m.name)));
            }
            if !m.min.is_finite() || !m.max.is_finite() || !(m.max - m.min).is_finite() {
                return Err(ConfigError::Invalid(format!(
                    "metric '{}' range [{}, {}] must be finite",
                    m.name, m.min, m.max
                )));
            }
            if m.min > m.max {
                return Err(ConfigError::Invalid(format!(
                    "metric '{}' has min {} above max {}",
                    m.name, m.min, m.max
                )));
            }
            if !(0.0..=1.0).contains(&m.dropout) {
                return Err(ConfigError::Invalid(format!(
                    "metric '{}' dropout {} outside [0, 1]",
                    m.name, m.dropout
                )));
            }
        }
        Ok(())
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            corrupt_token_policy: CorruptTokenPolicy::default(),
            timing: TimingConfig::default(),
            render: RenderConfig::default(),
            metrics: default_metrics(),
        }
    }
}
