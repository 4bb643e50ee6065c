//! Observer output: one snapshot per completed round.
//!
//! For every configured metric the snapshot lists each ring contribution
//! (`Node1..NodeN`, in token order) and the mean of the values present.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tokenring_protocol::Token;

use crate::config::{MetricSpec, RenderConfig};

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Encode error: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Turns a completed token into an artifact keyed by round number.
pub trait Renderer: Send + Sync {
    fn render(&self, round: u64, token: &Token) -> Result<PathBuf, RenderError>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundSnapshot {
    pub round: u64,
    pub rendered_at: DateTime<Utc>,
    pub labels: Vec<String>,
    pub panels: Vec<MetricPanel>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricPanel {
    pub metric: String,
    pub title: String,
    pub unit: Option<String>,
    /// One value per token entry, `None` where that node had no reading.
    pub values: Vec<Option<f64>>,
    /// Mean over the present values; `None` when no node reported.
    pub average: Option<f64>,
}

pub fn summarize(round: u64, token: &Token, metrics: &[MetricSpec]) -> RoundSnapshot {
    let labels = (1..=token.len()).map(|i| format!("Node{i}")).collect();

    let panels = metrics
        .iter()
        .map(|spec| {
            let values: Vec<Option<f64>> =
                token.entries().iter().map(|m| m.get(&spec.name)).collect();
            let present: Vec<f64> = values.iter().flatten().copied().collect();
            let average = if present.is_empty() {
                None
            } else {
                Some(present.iter().sum::<f64>() / present.len() as f64)
            };
            MetricPanel {
                metric: spec.name.clone(),
                title: spec.title.clone(),
                unit: spec.unit.clone(),
                values,
                average,
            }
        })
        .collect();

    RoundSnapshot {
        round,
        rendered_at: Utc::now(),
        labels,
        panels,
    }
}

/// Writes `<output_dir>/<file_prefix>-<round>.json`.
pub struct SnapshotRenderer {
    config: RenderConfig,
    metrics: Vec<MetricSpec>,
}

impl SnapshotRenderer {
    pub fn new(config: RenderConfig, metrics: Vec<MetricSpec>) -> Self {
        Self { config, metrics }
    }

    pub fn path_for(&self, round: u64) -> PathBuf {
        self.config
            .output_dir
            .join(format!("{}-{round}.json", self.config.file_prefix))
    }
}

impl Renderer for SnapshotRenderer {
    fn render(&self, round: u64, token: &Token) -> Result<PathBuf, RenderError> {
        let snapshot = summarize(round, token, &self.metrics);
        std::fs::create_dir_all(&self.config.output_dir)?;
        let path = self.path_for(round);
        std::fs::write(&path, serde_json::to_vec_pretty(&snapshot)?)?;
        Ok(path)
    }
}
