pub mod config;
pub mod engine;
pub mod schedule;
pub mod thermostat;
pub mod topics;
pub mod types;
pub mod uv;

pub use config::{ConfigError, ControlConfig, HabitatConfig, HardwareConfig, NetworkConfig, UvConfig};
pub use engine::{CycleEngine, FaultSummary, RelayCommand, RelayId, RelayState};
pub use schedule::{LightSchedule, TimeOfDay, Transition};
pub use thermostat::{HeatState, Thermostat};
pub use topics::*;
pub use types::{ControlDecision, SensorSample, TelemetryRecord};
pub use uv::{EnclosureGeometry, UvBand, UvClass};
