use chrono::NaiveTime;
use serde::Serialize;

use crate::{
    config::HabitatConfig,
    thermostat::Thermostat,
    types::{ControlDecision, SensorSample},
    uv,
};

/// Identity of a controlled relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RelayId {
    Light,
    Heat,
}

impl RelayId {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Heat => "heat",
        }
    }
}

/// A hardware write the orchestrator wants performed this cycle. Emitted
/// only when the commanded value differs from the previous cycle, keeping
/// relay writes idempotent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayCommand {
    pub relay: RelayId,
    pub on: bool,
}

/// Shadow of the commanded relay states. Re-initialised to all-off at
/// startup; mutated only by the engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayState {
    pub light_on: bool,
    pub heat_on: bool,
}

#[derive(Debug, Clone, Copy, Default)]
struct FaultCounters {
    temperature: u32,
    humidity: u32,
    uva: u32,
    uvb: u32,
    uvc: u32,
}

impl FaultCounters {
    fn record(&mut self, sample: &SensorSample, track_uvc: bool) {
        fn bump(counter: &mut u32, ok: bool) {
            *counter = if ok { 0 } else { counter.saturating_add(1) };
        }
        bump(&mut self.temperature, sample.temperature_c.is_some());
        bump(&mut self.humidity, sample.humidity_pct.is_some());
        bump(&mut self.uva, sample.uva_raw.is_some());
        bump(&mut self.uvb, sample.uvb_raw.is_some());
        // An unconfigured UVC channel is advisory and must not trip the
        // fail-safe on rigs without a UVC-capable sensor.
        if track_uvc {
            bump(&mut self.uvc, sample.uvc_raw.is_some());
        } else {
            self.uvc = 0;
        }
    }

    fn worst_streak(&self) -> u32 {
        self.temperature
            .max(self.humidity)
            .max(self.uva)
            .max(self.uvb)
            .max(self.uvc)
    }
}

/// Per-field consecutive failure streaks, surfaced for health reporting.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FaultSummary {
    pub temperature: u32,
    pub humidity: u32,
    pub uva: u32,
    pub uvb: u32,
    pub uvc: u32,
    pub degraded: bool,
}

/// The control cycle orchestrator.
///
/// Owns every piece of state that survives across cycles: the relay shadow
/// state, the per-field fault counters, and the thermostat's hysteresis
/// position. One instance per process; the control loop is its single
/// writer. Passing the state through explicitly keeps cycles fully
/// deterministic under test, with no ambient clock or hardware.
#[derive(Debug, Default)]
pub struct CycleEngine {
    thermostat: Thermostat,
    relays: RelayState,
    faults: FaultCounters,
    degraded: bool,
    last_decision: Option<ControlDecision>,
}

impl CycleEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run one control cycle.
    ///
    /// Always produces a decision, even when every sensor field failed.
    /// Once any field's failure streak reaches the configured ceiling the
    /// cycle is degraded: heat is forced off (never on, under uncertainty)
    /// while the light keeps following the schedule, which needs no sensor.
    pub fn run_cycle(
        &mut self,
        now: NaiveTime,
        sample: &SensorSample,
        config: &HabitatConfig,
    ) -> (ControlDecision, Vec<RelayCommand>) {
        let daytime = config.lights.is_daytime(now);
        let setpoint = config.setpoint_c(daytime);

        self.faults.record(sample, config.uv.uvc_band.is_some());
        self.degraded = self.faults.worst_streak() >= config.control.fault_ceiling;

        let heat_on = if self.degraded {
            self.thermostat.force_off();
            false
        } else {
            self.thermostat
                .step(sample.temperature_c, setpoint, config.temp_tolerance_c)
                .is_on()
        };

        let factor = config.uv.geometry.correction_factor();
        let uva = uv::correct_reading(sample.uva_raw, factor);
        let uvb = uv::correct_reading(sample.uvb_raw, factor);
        let uvc = uv::correct_reading(sample.uvc_raw, factor);

        let decision = ControlDecision {
            light_on: daytime,
            heat_on,
            daytime,
            setpoint_c: setpoint,
            uva,
            uvb,
            uvc,
            uva_class: config.uv.uva_band.classify(uva),
            uvb_class: config.uv.uvb_band.classify(uvb),
            uvc_class: config.uv.uvc_band.map(|band| band.classify(uvc)),
            degraded: self.degraded,
        };

        let commands = self.relay_commands(RelayState {
            light_on: decision.light_on,
            heat_on: decision.heat_on,
        });
        self.last_decision = Some(decision);
        (decision, commands)
    }

    /// Commands that drive every relay to the safe state for shutdown.
    pub fn shutdown_commands(&mut self) -> Vec<RelayCommand> {
        self.thermostat.force_off();
        self.relay_commands(RelayState::default())
    }

    pub fn relay_state(&self) -> RelayState {
        self.relays
    }

    pub fn last_decision(&self) -> Option<ControlDecision> {
        self.last_decision
    }

    pub fn fault_summary(&self) -> FaultSummary {
        FaultSummary {
            temperature: self.faults.temperature,
            humidity: self.faults.humidity,
            uva: self.faults.uva,
            uvb: self.faults.uvb,
            uvc: self.faults.uvc,
            degraded: self.degraded,
        }
    }

    fn relay_commands(&mut self, desired: RelayState) -> Vec<RelayCommand> {
        let mut commands = Vec::new();
        if desired.light_on != self.relays.light_on {
            commands.push(RelayCommand {
                relay: RelayId::Light,
                on: desired.light_on,
            });
        }
        if desired.heat_on != self.relays.heat_on {
            commands.push(RelayCommand {
                relay: RelayId::Heat,
                on: desired.heat_on,
            });
        }
        self.relays = desired;
        commands
    }
}
