//! Local measurement sources.

use rand::Rng;

use tokenring_protocol::Measurement;

use crate::config::MetricSpec;

/// Produces this node's reading for a round. Called once per augment,
/// bootstrap or regeneration; must return promptly.
pub trait MeasurementSource: Send + Sync {
    fn measure(&self) -> Measurement;
}

/// Random readings within each metric's configured range, with occasional
/// dropouts standing in for a sensor that did not answer.
pub struct SimulatedSensors {
    metrics: Vec<MetricSpec>,
}

impl SimulatedSensors {
    pub fn new(metrics: Vec<MetricSpec>) -> Self {
        Self { metrics }
    }
}

impl MeasurementSource for SimulatedSensors {
    fn measure(&self) -> Measurement {
        let mut rng = rand::thread_rng();
        self.metrics
            .iter()
            .map(|spec| {
                let value = if rng.gen_bool(spec.dropout) {
                    None
                } else {
                    let raw = rng.gen_range(spec.min..=spec.max);
                    Some(((raw * 100.0).round() / 100.0).clamp(spec.min, spec.max))
                };
                (spec.name.clone(), value)
            })
            .collect()
    }
}

/// Always reports the same reading.
#[derive(Debug, Clone)]
pub struct FixedSource(Measurement);

impl FixedSource {
    pub fn new(reading: Measurement) -> Self {
        Self(reading)
    }
}

impl MeasurementSource for FixedSource {
    fn measure(&self) -> Measurement {
        self.0.clone()
    }
}
