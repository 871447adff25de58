use serde::Serialize;

/// Commanded heat relay state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HeatState {
    Off,
    On,
}

impl HeatState {
    pub fn is_on(self) -> bool {
        matches!(self, Self::On)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Off => "OFF",
            Self::On => "ON",
        }
    }
}

/// Hysteresis heat controller.
///
/// The dead-band `[setpoint - tolerance, setpoint + tolerance]` holds the
/// current state, so the relay toggles at most once per boundary crossing.
/// Starts `Off` and runs for the process lifetime.
#[derive(Debug, Clone)]
pub struct Thermostat {
    state: HeatState,
}

impl Thermostat {
    pub fn new() -> Self {
        Self {
            state: HeatState::Off,
        }
    }

    pub fn state(&self) -> HeatState {
        self.state
    }

    /// Evaluate one cycle. A failed temperature sample holds the last
    /// commanded state; escalation is the fault counters' job.
    pub fn step(&mut self, temperature: Option<f32>, setpoint: f32, tolerance: f32) -> HeatState {
        let Some(temp) = temperature else {
            return self.state;
        };
        self.state = match self.state {
            HeatState::Off if temp < setpoint - tolerance => HeatState::On,
            HeatState::On if temp > setpoint + tolerance => HeatState::Off,
            state => state,
        };
        self.state
    }

    /// Drop to `Off` without evaluating. Used by the fail-safe path so a
    /// later recovery re-enters heating from a known state.
    pub fn force_off(&mut self) {
        self.state = HeatState::Off;
    }
}

impl Default for Thermostat {
    fn default() -> Self {
        Self::new()
    }
}
