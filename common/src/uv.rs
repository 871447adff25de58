use serde::{Deserialize, Serialize};

/// Reference basking height in metres the inverse-square correction
/// normalises to.
const BASKING_REFERENCE_M: f32 = 0.3;

/// Corrected readings above this (μW/cm²) are treated as sensor faults.
const MAX_CORRECTED_UV: f32 = 100_000.0;

/// Acceptable irradiance window for one UV channel, in μW/cm² at the
/// basking surface.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UvBand {
    pub low: f32,
    pub high: f32,
}

impl UvBand {
    /// Band edges are inclusive: exactly `low` or `high` is `Ok`.
    pub fn classify(&self, value: Option<f32>) -> UvClass {
        match value {
            None => UvClass::Unknown,
            Some(v) if v < self.low => UvClass::Below,
            Some(v) if v > self.high => UvClass::Above,
            Some(_) => UvClass::Ok,
        }
    }
}

/// Classified exposure level for one UV channel. `Unknown` marks a failed
/// reading and is never collapsed into `Ok`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UvClass {
    Below,
    Ok,
    Above,
    Unknown,
}

impl UvClass {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Below => "below",
            Self::Ok => "ok",
            Self::Above => "above",
            Self::Unknown => "unknown",
        }
    }
}

/// Mounting geometry relating the sensor's position to the basking point.
/// Distances in metres, angle in degrees from the sensor's mounting plane.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnclosureGeometry {
    pub sensor_height_m: f32,
    pub lamp_dist_from_back_m: f32,
    pub enclosure_height_m: f32,
    pub sensor_angle_deg: f32,
}

impl EnclosureGeometry {
    /// Scale factor mapping a reading at the sensor's mount point to the
    /// estimated irradiance at the basking surface.
    ///
    /// Decomposes the sensor-to-lamp offset into horizontal and vertical
    /// components, applies inverse-square attenuation against the reference
    /// basking height, and a Lambertian cosine correction for the sensor's
    /// mounting angle. The cosine is clamped to `[0, 1]` so angles past 90°
    /// cannot flip the sign.
    pub fn correction_factor(&self) -> f32 {
        let horizontal = self.lamp_dist_from_back_m;
        let vertical = self.enclosure_height_m - self.sensor_height_m;
        let direct_distance = horizontal.hypot(vertical);

        let lamp_angle = vertical.atan2(horizontal).to_degrees();
        let effective_angle = (lamp_angle - self.sensor_angle_deg).abs();
        let cosine_factor = effective_angle.to_radians().cos().clamp(0.0, 1.0);

        let distance_factor = (BASKING_REFERENCE_M / direct_distance).powi(2);

        1.0 / (cosine_factor * distance_factor)
    }
}

/// Apply the geometric correction to a raw channel reading, rounded to
/// three decimals. Corrected values beyond the plausibility ceiling are
/// dropped rather than reported, same as a failed read.
pub fn correct_reading(raw: Option<f32>, factor: f32) -> Option<f32> {
    let corrected = (raw? * factor * 1000.0).round() / 1000.0;
    (corrected.is_finite() && corrected <= MAX_CORRECTED_UV).then_some(corrected)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    const BAND: UvBand = UvBand {
        low: 50.0,
        high: 100.0,
    };

    #[test]
    fn classification_boundaries_are_inclusive_into_ok() {
        assert_eq!(BAND.classify(Some(49.9)), UvClass::Below);
        assert_eq!(BAND.classify(Some(50.0)), UvClass::Ok);
        assert_eq!(BAND.classify(Some(100.0)), UvClass::Ok);
        assert_eq!(BAND.classify(Some(100.1)), UvClass::Above);
    }

    #[test]
    fn failed_reading_classifies_as_unknown() {
        assert_eq!(BAND.classify(None), UvClass::Unknown);
    }

    #[test]
    fn aligned_sensor_at_reference_distance_needs_no_correction() {
        let geometry = EnclosureGeometry {
            sensor_height_m: 0.6,
            lamp_dist_from_back_m: 0.3,
            enclosure_height_m: 0.6,
            sensor_angle_deg: 0.0,
        };
        assert!((geometry.correction_factor() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn doubled_distance_quadruples_the_reading() {
        let geometry = EnclosureGeometry {
            sensor_height_m: 0.6,
            lamp_dist_from_back_m: 0.6,
            enclosure_height_m: 0.6,
            sensor_angle_deg: 0.0,
        };
        assert!((geometry.correction_factor() - 4.0).abs() < 1e-4);
    }

    #[test]
    fn angled_sensor_scales_by_inverse_cosine() {
        // 60° off the lamp axis at the reference distance: cos 60° = 0.5.
        let geometry = EnclosureGeometry {
            sensor_height_m: 0.6,
            lamp_dist_from_back_m: 0.3,
            enclosure_height_m: 0.6,
            sensor_angle_deg: 60.0,
        };
        assert!((geometry.correction_factor() - 2.0).abs() < 1e-4);
    }

    #[test]
    fn corrected_reading_rounds_and_caps() {
        assert_eq!(correct_reading(Some(10.0), 2.0), Some(20.0));
        assert_eq!(correct_reading(Some(1.23456), 1.0), Some(1.235));
        assert_eq!(correct_reading(None, 2.0), None);
        // Beyond the ceiling counts as a fault, not a huge number.
        assert_eq!(correct_reading(Some(200_000.0), 1.0), None);
    }
}
