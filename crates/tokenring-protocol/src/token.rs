//! Measurements and the circulating token.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One node's reading for a round: metric name to value, `None` when the
/// sensor had nothing to report.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Measurement(BTreeMap<String, Option<f64>>);

impl Measurement {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, metric: impl Into<String>, value: Option<f64>) -> Self {
        self.0.insert(metric.into(), value);
        self
    }

    pub fn insert(&mut self, metric: impl Into<String>, value: Option<f64>) {
        self.0.insert(metric.into(), value);
    }

    /// Value of `metric`, `None` when absent or reported as unavailable.
    pub fn get(&self, metric: &str) -> Option<f64> {
        self.0.get(metric).copied().flatten()
    }

    pub fn metrics(&self) -> impl Iterator<Item = (&str, Option<f64>)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, Option<f64>)> for Measurement {
    fn from_iter<I: IntoIterator<Item = (String, Option<f64>)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// The circulating token: one measurement per node visited in the current
/// circulation, in ring traversal order. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Token {
    entries: Vec<Measurement>,
}

impl Token {
    /// A fresh single-entry token, as built at bootstrap or regeneration.
    pub fn seed(first: Measurement) -> Self {
        Self {
            entries: vec![first],
        }
    }

    pub(crate) fn from_entries(entries: Vec<Measurement>) -> Self {
        Self { entries }
    }

    pub fn append(&mut self, entry: Measurement) {
        self.entries.push(entry);
    }

    /// Append, then evict the oldest entries until at most `limit` remain.
    /// Returns how many entries were evicted.
    pub fn append_within(&mut self, entry: Measurement, limit: usize) -> usize {
        self.entries.push(entry);
        let excess = self.entries.len().saturating_sub(limit.max(1));
        self.entries.drain(..excess);
        excess
    }

    pub fn entries(&self) -> &[Measurement] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
