//! Token ring node.
//!
//! Wires the protocol and network crates into a running ring member:
//! configuration, the local measurement source, the observer's renderer,
//! token regeneration and the round state machine that sequences them.

pub mod config;
pub mod context;
pub mod driver;
pub mod recovery;
pub mod render;
pub mod sensor;

pub use config::{CorruptTokenPolicy, MetricSpec, NodeConfig};
pub use context::RunContext;
pub use driver::{DriverSettings, RingStats, RoundDriver, RoundState};
pub use recovery::RecoveryController;
pub use render::{Renderer, SnapshotRenderer};
pub use sensor::{FixedSource, MeasurementSource, SimulatedSensors};
