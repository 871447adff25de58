use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    schedule::LightSchedule,
    uv::{EnclosureGeometry, UvBand},
};

/// Configuration invariant violations. Fatal at load time; a reload request
/// carrying one of these is rejected atomically and the running config is
/// kept.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("night setpoint {night}°C must be below day setpoint {day}°C")]
    SetpointOrder { night: f32, day: f32 },
    #[error("temperature tolerance must be positive, got {0}")]
    NonPositiveTolerance(f32),
    #[error("{channel} threshold low {low} exceeds high {high}")]
    BandInverted {
        channel: &'static str,
        low: f32,
        high: f32,
    },
    #[error("{field} must be non-negative, got {value}")]
    NegativeGeometry { field: &'static str, value: f32 },
    #[error("sensor angle must be within [0, 360), got {0}")]
    AngleOutOfRange(f32),
    #[error("enclosure geometry yields a degenerate UV correction factor")]
    DegenerateGeometry,
    #[error("cycle period must be at least one second")]
    ZeroCyclePeriod,
    #[error("fault ceiling must be at least one cycle")]
    ZeroFaultCeiling,
}

/// Relay pin and sensor bus identities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HardwareConfig {
    pub light_relay_pin: u8,
    pub heat_relay_pin: u8,
    pub climate_sensor_addr: u8,
    pub uv_sensor_addr: u8,
}

impl Default for HardwareConfig {
    fn default() -> Self {
        Self {
            light_relay_pin: 4,
            heat_relay_pin: 17,
            climate_sensor_addr: 0x44,
            uv_sensor_addr: 0x74,
        }
    }
}

/// UV exposure bands and the enclosure geometry used to correct raw
/// readings. The UVC band is optional; an unconfigured UVC channel is
/// monitored but not classified.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UvConfig {
    pub uva_band: UvBand,
    pub uvb_band: UvBand,
    pub uvc_band: Option<UvBand>,
    pub geometry: EnclosureGeometry,
}

impl Default for UvConfig {
    fn default() -> Self {
        Self {
            uva_band: UvBand {
                low: 50.0,
                high: 300.0,
            },
            uvb_band: UvBand {
                low: 20.0,
                high: 100.0,
            },
            uvc_band: None,
            geometry: EnclosureGeometry {
                sensor_height_m: 0.2,
                lamp_dist_from_back_m: 0.3,
                enclosure_height_m: 0.6,
                sensor_angle_deg: 45.0,
            },
        }
    }
}

/// Control loop timing and fault containment knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    pub cycle_period_s: u64,
    pub sensor_timeout_ms: u64,
    pub sensor_retries: u32,
    pub retry_backoff_ms: u64,
    /// Consecutive failed reads of any field before the fail-safe engages.
    pub fault_ceiling: u32,
    pub readings_log_interval_s: u64,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            cycle_period_s: 5,
            sensor_timeout_ms: 5_000,
            sensor_retries: 3,
            retry_backoff_ms: 500,
            fault_ceiling: 3,
            readings_log_interval_s: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub mqtt_host: String,
    pub mqtt_port: u16,
    pub mqtt_user: String,
    pub mqtt_pass: String,
    pub http_port: u16,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            mqtt_host: "127.0.0.1".to_string(),
            mqtt_port: 1883,
            mqtt_user: String::new(),
            mqtt_pass: String::new(),
            http_port: 8080,
        }
    }
}

/// The full habitat configuration. Immutable within a control cycle;
/// reloads are validated first and swapped in only at a cycle boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HabitatConfig {
    pub day_temp_c: f32,
    pub night_temp_c: f32,
    pub temp_tolerance_c: f32,
    pub lights: LightSchedule,
    pub uv: UvConfig,
    pub hardware: HardwareConfig,
    pub control: ControlConfig,
    pub network: NetworkConfig,
}

impl Default for HabitatConfig {
    fn default() -> Self {
        Self {
            day_temp_c: 30.0,
            night_temp_c: 15.0,
            temp_tolerance_c: 0.5,
            lights: LightSchedule {
                on: "06:00".parse().expect("valid default"),
                off: "18:00".parse().expect("valid default"),
            },
            uv: UvConfig::default(),
            hardware: HardwareConfig::default(),
            control: ControlConfig::default(),
            network: NetworkConfig::default(),
        }
    }
}

impl HabitatConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.night_temp_c >= self.day_temp_c {
            return Err(ConfigError::SetpointOrder {
                night: self.night_temp_c,
                day: self.day_temp_c,
            });
        }
        if !(self.temp_tolerance_c > 0.0) {
            return Err(ConfigError::NonPositiveTolerance(self.temp_tolerance_c));
        }

        let bands = [
            ("UVA", Some(self.uv.uva_band)),
            ("UVB", Some(self.uv.uvb_band)),
            ("UVC", self.uv.uvc_band),
        ];
        for (channel, band) in bands {
            if let Some(band) = band {
                if band.low > band.high {
                    return Err(ConfigError::BandInverted {
                        channel,
                        low: band.low,
                        high: band.high,
                    });
                }
            }
        }

        let geometry = self.uv.geometry;
        let fields = [
            ("sensor_height_m", geometry.sensor_height_m),
            ("lamp_dist_from_back_m", geometry.lamp_dist_from_back_m),
            ("enclosure_height_m", geometry.enclosure_height_m),
        ];
        for (field, value) in fields {
            if !(value >= 0.0) {
                return Err(ConfigError::NegativeGeometry { field, value });
            }
        }
        if !(0.0..360.0).contains(&geometry.sensor_angle_deg) {
            return Err(ConfigError::AngleOutOfRange(geometry.sensor_angle_deg));
        }
        let factor = geometry.correction_factor();
        if !factor.is_finite() || factor <= 0.0 {
            return Err(ConfigError::DegenerateGeometry);
        }

        if self.control.cycle_period_s == 0 {
            return Err(ConfigError::ZeroCyclePeriod);
        }
        if self.control.fault_ceiling == 0 {
            return Err(ConfigError::ZeroFaultCeiling);
        }

        Ok(())
    }

    /// Active setpoint for the given schedule phase.
    pub fn setpoint_c(&self, daytime: bool) -> f32 {
        if daytime {
            self.day_temp_c
        } else {
            self.night_temp_c
        }
    }
}
