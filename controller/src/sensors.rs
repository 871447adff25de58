use std::{future::Future, time::Duration};

use chrono::Utc;
use thiserror::Error;
use tokio::time::{sleep, timeout};
use tracing::warn;

use vivarium_common::{ControlConfig, SensorSample};

/// Raw UV irradiance triple straight off the bus, before geometric
/// correction. UVC is optional; not every sensor exposes it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UvReading {
    pub uva: f32,
    pub uvb: f32,
    pub uvc: Option<f32>,
}

#[derive(Debug, Error)]
pub enum SensorError {
    #[error("sensor read timed out")]
    Timeout,
    #[error("sensor i/o error: {0}")]
    Io(String),
    #[error("sensor fault: {0}")]
    Fault(String),
}

/// The physical bus seam. The engine never touches this directly; the
/// `SensorReader` wrapper turns its failures into per-field markers.
pub trait SensorBus {
    fn read_climate(&mut self) -> impl Future<Output = Result<(f32, f32), SensorError>> + Send;
    fn read_uv(&mut self) -> impl Future<Output = Result<UvReading, SensorError>> + Send;
}

/// Boundary wrapper over the physical sensors.
///
/// Retries transient failures with a short backoff, bounds every field read
/// with a timeout, and folds all outcomes into the sample's per-field
/// markers. A sensor fault of any kind can never escape into the control
/// cycle; a timed-out field is marked failed outright rather than retried
/// past the cycle's deadline.
pub struct SensorReader<B> {
    bus: B,
}

impl<B: SensorBus> SensorReader<B> {
    pub fn new(bus: B) -> Self {
        Self { bus }
    }

    pub async fn read_all(&mut self, control: &ControlConfig) -> SensorSample {
        let climate = self.read_climate(control).await;
        let uv = self.read_uv(control).await;

        let (temperature_c, humidity_pct) = match climate {
            Some((temp, humidity)) => (Some(temp), Some(humidity)),
            None => (None, None),
        };
        let (uva_raw, uvb_raw, uvc_raw) = match uv {
            Some(reading) => (Some(reading.uva), Some(reading.uvb), reading.uvc),
            None => (None, None, None),
        };

        SensorSample {
            timestamp: Utc::now(),
            temperature_c,
            humidity_pct,
            uva_raw,
            uvb_raw,
            uvc_raw,
        }
    }

    async fn read_climate(&mut self, control: &ControlConfig) -> Option<(f32, f32)> {
        let attempts = control.sensor_retries.max(1);
        for attempt in 1..=attempts {
            match timeout(
                Duration::from_millis(control.sensor_timeout_ms),
                self.bus.read_climate(),
            )
            .await
            {
                Ok(Ok((temp, humidity))) => {
                    if climate_plausible(temp, humidity) {
                        return Some((temp, humidity));
                    }
                    warn!(temp, humidity, attempt, "climate reading out of range");
                }
                Ok(Err(SensorError::Timeout)) | Err(_) => {
                    warn!(attempt, "climate read timed out, marking field failed");
                    return None;
                }
                Ok(Err(err)) => warn!(attempt, "climate read failed: {err}"),
            }
            if attempt < attempts {
                sleep(Duration::from_millis(control.retry_backoff_ms)).await;
            }
        }
        None
    }

    async fn read_uv(&mut self, control: &ControlConfig) -> Option<UvReading> {
        let attempts = control.sensor_retries.max(1);
        for attempt in 1..=attempts {
            match timeout(
                Duration::from_millis(control.sensor_timeout_ms),
                self.bus.read_uv(),
            )
            .await
            {
                Ok(Ok(reading)) => {
                    if uv_plausible(&reading) {
                        return Some(reading);
                    }
                    warn!(attempt, ?reading, "uv reading out of range");
                }
                Ok(Err(SensorError::Timeout)) | Err(_) => {
                    warn!(attempt, "uv read timed out, marking field failed");
                    return None;
                }
                Ok(Err(err)) => warn!(attempt, "uv read failed: {err}"),
            }
            if attempt < attempts {
                sleep(Duration::from_millis(control.retry_backoff_ms)).await;
            }
        }
        None
    }
}

fn climate_plausible(temp: f32, humidity: f32) -> bool {
    (-40.0..=125.0).contains(&temp) && (0.0..=100.0).contains(&humidity)
}

fn uv_plausible(reading: &UvReading) -> bool {
    let in_range = |v: f32| (0.0..=1_000_000.0).contains(&v);
    in_range(reading.uva) && in_range(reading.uvb) && reading.uvc.map_or(true, in_range)
}

/// Stand-in bus for running the controller without hardware.
///
/// Hardware integration point: replace with SHT31 + AS7331 I2C drivers on
/// the target, keeping this implementation for bench runs.
pub struct SimulatedBus {
    tick: u64,
}

impl SimulatedBus {
    pub fn new() -> Self {
        Self { tick: 0 }
    }
}

impl SensorBus for SimulatedBus {
    async fn read_climate(&mut self) -> Result<(f32, f32), SensorError> {
        self.tick = self.tick.wrapping_add(1);
        let temperature = 26.0 + (self.tick % 8) as f32 * 0.3;
        let humidity = 55.0 + (self.tick % 6) as f32 * 0.5;
        Ok((temperature, humidity))
    }

    async fn read_uv(&mut self) -> Result<UvReading, SensorError> {
        Ok(UvReading {
            uva: 180.0 + (self.tick % 5) as f32 * 4.0,
            uvb: 55.0 + (self.tick % 3) as f32 * 1.5,
            uvc: Some(0.4),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use super::*;

    enum Step<T> {
        Yield(Result<T, SensorError>),
        Hang,
    }

    struct ScriptedBus {
        climate: VecDeque<Step<(f32, f32)>>,
        uv: VecDeque<Step<UvReading>>,
        climate_calls: u32,
        uv_calls: u32,
    }

    impl ScriptedBus {
        fn new(
            climate: impl IntoIterator<Item = Step<(f32, f32)>>,
            uv: impl IntoIterator<Item = Step<UvReading>>,
        ) -> Self {
            Self {
                climate: climate.into_iter().collect(),
                uv: uv.into_iter().collect(),
                climate_calls: 0,
                uv_calls: 0,
            }
        }
    }

    const GOOD_UV: UvReading = UvReading {
        uva: 150.0,
        uvb: 40.0,
        uvc: Some(0.2),
    };

    impl SensorBus for ScriptedBus {
        async fn read_climate(&mut self) -> Result<(f32, f32), SensorError> {
            self.climate_calls += 1;
            match self.climate.pop_front() {
                Some(Step::Yield(result)) => result,
                Some(Step::Hang) => std::future::pending().await,
                None => Ok((25.0, 50.0)),
            }
        }

        async fn read_uv(&mut self) -> Result<UvReading, SensorError> {
            self.uv_calls += 1;
            match self.uv.pop_front() {
                Some(Step::Yield(result)) => result,
                Some(Step::Hang) => std::future::pending().await,
                None => Ok(GOOD_UV),
            }
        }
    }

    fn control() -> ControlConfig {
        ControlConfig::default()
    }

    #[tokio::test(start_paused = true)]
    async fn transient_io_error_is_retried() {
        let bus = ScriptedBus::new(
            [
                Step::Yield(Err(SensorError::Io("bus collision".into()))),
                Step::Yield(Ok((24.5, 58.0))),
            ],
            [Step::Yield(Ok(GOOD_UV))],
        );
        let mut reader = SensorReader::new(bus);

        let sample = reader.read_all(&control()).await;

        assert_eq!(sample.temperature_c, Some(24.5));
        assert_eq!(sample.humidity_pct, Some(58.0));
        assert_eq!(sample.uva_raw, Some(150.0));
        assert_eq!(reader.bus.climate_calls, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_marks_field_failed_without_further_retries() {
        let bus = ScriptedBus::new([Step::Hang], [Step::Yield(Ok(GOOD_UV))]);
        let mut reader = SensorReader::new(bus);

        let sample = reader.read_all(&control()).await;

        assert_eq!(sample.temperature_c, None);
        assert_eq!(sample.humidity_pct, None);
        assert_eq!(reader.bus.climate_calls, 1, "no retry after a timeout");
        // The other field is unaffected by the climate failure.
        assert_eq!(sample.uvb_raw, Some(40.0));
    }

    #[tokio::test(start_paused = true)]
    async fn bus_reported_timeout_behaves_like_wrapper_timeout() {
        let bus = ScriptedBus::new(
            [Step::Yield(Err(SensorError::Timeout))],
            [Step::Yield(Ok(GOOD_UV))],
        );
        let mut reader = SensorReader::new(bus);

        let sample = reader.read_all(&control()).await;

        assert_eq!(sample.temperature_c, None);
        assert_eq!(reader.bus.climate_calls, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn implausible_values_exhaust_retries_and_fail() {
        let out_of_range = Step::Yield(Ok((140.0, 50.0)));
        let bus = ScriptedBus::new(
            [
                out_of_range,
                Step::Yield(Ok((141.0, 50.0))),
                Step::Yield(Ok((142.0, 50.0))),
            ],
            [Step::Yield(Ok(GOOD_UV))],
        );
        let mut reader = SensorReader::new(bus);

        let sample = reader.read_all(&control()).await;

        assert_eq!(sample.temperature_c, None);
        assert_eq!(reader.bus.climate_calls, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn unexpected_fault_kind_is_absorbed_not_propagated() {
        let bus = ScriptedBus::new(
            [Step::Yield(Ok((25.0, 50.0)))],
            [
                Step::Yield(Err(SensorError::Fault("register map corrupt".into()))),
                Step::Yield(Err(SensorError::Fault("register map corrupt".into()))),
                Step::Yield(Err(SensorError::Fault("register map corrupt".into()))),
            ],
        );
        let mut reader = SensorReader::new(bus);

        let sample = reader.read_all(&control()).await;

        assert_eq!(sample.temperature_c, Some(25.0));
        assert_eq!(sample.uva_raw, None);
        assert_eq!(sample.uvb_raw, None);
        assert_eq!(sample.uvc_raw, None);
        assert_eq!(reader.bus.uv_calls, 3);
    }
}
