use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::uv::UvClass;

/// One cycle's sensor capture. `None` marks a field whose read failed after
/// retries; the engine never sees a raw sensor error. UV channels hold raw
/// irradiance at the sensor, before geometric correction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorSample {
    pub timestamp: DateTime<Utc>,
    pub temperature_c: Option<f32>,
    pub humidity_pct: Option<f32>,
    pub uva_raw: Option<f32>,
    pub uvb_raw: Option<f32>,
    pub uvc_raw: Option<f32>,
}

impl SensorSample {
    /// A sample with every field marked failed.
    pub fn failed(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            temperature_c: None,
            humidity_pct: None,
            uva_raw: None,
            uvb_raw: None,
            uvc_raw: None,
        }
    }
}

/// The engine's output for one control cycle. UV values are corrected to
/// the basking surface; `uvc_class` is `None` when no UVC band is
/// configured.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlDecision {
    pub light_on: bool,
    pub heat_on: bool,
    pub daytime: bool,
    pub setpoint_c: f32,
    pub uva: Option<f32>,
    pub uvb: Option<f32>,
    pub uvc: Option<f32>,
    pub uva_class: UvClass,
    pub uvb_class: UvClass,
    pub uvc_class: Option<UvClass>,
    pub degraded: bool,
}

/// Timestamped record handed to the external sinks (readings log, MQTT,
/// dashboard API, display). Sinks copy what they need; the engine retains
/// nothing.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryRecord {
    pub timestamp: DateTime<Utc>,
    pub temperature: Option<f32>,
    pub humidity: Option<f32>,
    pub uva: Option<f32>,
    pub uvb: Option<f32>,
    pub uvc: Option<f32>,
    pub uva_band: UvClass,
    pub uvb_band: UvClass,
    pub uvc_band: Option<UvClass>,
    pub light_on: bool,
    pub heat_on: bool,
    pub setpoint: f32,
    pub degraded: bool,
}

impl TelemetryRecord {
    pub fn from_cycle(sample: &SensorSample, decision: &ControlDecision) -> Self {
        Self {
            timestamp: sample.timestamp,
            temperature: sample.temperature_c,
            humidity: sample.humidity_pct,
            uva: decision.uva,
            uvb: decision.uvb,
            uvc: decision.uvc,
            uva_band: decision.uva_class,
            uvb_band: decision.uvb_class,
            uvc_band: decision.uvc_class,
            light_on: decision.light_on,
            heat_on: decision.heat_on,
            setpoint: decision.setpoint_c,
            degraded: decision.degraded,
        }
    }

    /// CSV line for the readings log. Failed fields log as -1 so the column
    /// layout stays stable.
    pub fn csv_line(&self) -> String {
        fn one_dp(value: Option<f32>) -> String {
            value.map_or_else(|| "-1".to_string(), |v| format!("{v:.1}"))
        }
        fn four_dp(value: Option<f32>) -> String {
            value.map_or_else(|| "-1".to_string(), |v| format!("{v:.4}"))
        }

        format!(
            "{},{},{},{},{},{},{},{}",
            self.timestamp.to_rfc3339(),
            one_dp(self.temperature),
            one_dp(self.humidity),
            four_dp(self.uva),
            four_dp(self.uvb),
            four_dp(self.uvc),
            self.light_on as u8,
            self.heat_on as u8,
        )
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn sample() -> SensorSample {
        SensorSample {
            timestamp: DateTime::parse_from_rfc3339("2026-01-05T08:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
            temperature_c: Some(28.05),
            humidity_pct: Some(61.2),
            uva_raw: Some(90.0),
            uvb_raw: None,
            uvc_raw: None,
        }
    }

    fn decision() -> ControlDecision {
        ControlDecision {
            light_on: true,
            heat_on: true,
            daytime: true,
            setpoint_c: 30.0,
            uva: Some(180.1234),
            uvb: None,
            uvc: None,
            uva_class: UvClass::Ok,
            uvb_class: UvClass::Unknown,
            uvc_class: None,
            degraded: false,
        }
    }

    #[test]
    fn csv_line_keeps_column_layout_under_failures() {
        let record = TelemetryRecord::from_cycle(&sample(), &decision());
        assert_eq!(
            record.csv_line(),
            "2026-01-05T08:00:00+00:00,28.1,61.2,180.1234,-1,-1,1,1"
        );
    }

    #[test]
    fn telemetry_serializes_with_camel_case_bands() {
        let record = TelemetryRecord::from_cycle(&sample(), &decision());
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["uvaBand"], "ok");
        assert_eq!(json["uvbBand"], "unknown");
        assert!(json["uvcBand"].is_null());
        assert_eq!(json["lightOn"], true);
        assert_eq!(json["degraded"], false);
    }
}
