use tracing::{info, warn};

use vivarium_common::{HardwareConfig, RelayCommand, RelayId};

/// The relay capability the control loop writes through. Single writer:
/// only the control loop holds a driver.
pub trait RelayDriver {
    fn set_relay(&mut self, relay: RelayId, on: bool) -> anyhow::Result<()>;
}

/// Host driver that records writes to the log in place of GPIO.
///
/// Hardware integration point: swap for a gpiochip-backed driver on the
/// target; pin assignments come from `HardwareConfig`.
pub struct LoggingRelays {
    light_pin: u8,
    heat_pin: u8,
}

impl LoggingRelays {
    pub fn new(hardware: &HardwareConfig) -> Self {
        Self {
            light_pin: hardware.light_relay_pin,
            heat_pin: hardware.heat_relay_pin,
        }
    }
}

impl RelayDriver for LoggingRelays {
    fn set_relay(&mut self, relay: RelayId, on: bool) -> anyhow::Result<()> {
        let pin = match relay {
            RelayId::Light => self.light_pin,
            RelayId::Heat => self.heat_pin,
        };
        info!(relay = relay.as_str(), pin, on, "relay write");
        Ok(())
    }
}

/// Apply one cycle's relay commands. A failed hardware write is reported
/// and dropped; it never aborts the cycle.
pub fn apply_commands(driver: &mut impl RelayDriver, commands: &[RelayCommand]) {
    for command in commands {
        if let Err(err) = driver.set_relay(command.relay, command.on) {
            warn!(
                relay = command.relay.as_str(),
                on = command.on,
                "relay write failed: {err:#}"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingRelays {
        writes: Vec<(RelayId, bool)>,
        fail: bool,
    }

    impl RelayDriver for RecordingRelays {
        fn set_relay(&mut self, relay: RelayId, on: bool) -> anyhow::Result<()> {
            if self.fail {
                anyhow::bail!("gpio unavailable");
            }
            self.writes.push((relay, on));
            Ok(())
        }
    }

    #[test]
    fn applies_each_command_once() {
        let mut driver = RecordingRelays::default();
        apply_commands(
            &mut driver,
            &[
                RelayCommand {
                    relay: RelayId::Light,
                    on: true,
                },
                RelayCommand {
                    relay: RelayId::Heat,
                    on: false,
                },
            ],
        );
        assert_eq!(
            driver.writes,
            vec![(RelayId::Light, true), (RelayId::Heat, false)]
        );
    }

    #[test]
    fn write_failure_does_not_panic_or_stop() {
        let mut driver = RecordingRelays {
            fail: true,
            ..Default::default()
        };
        apply_commands(
            &mut driver,
            &[RelayCommand {
                relay: RelayId::Heat,
                on: true,
            }],
        );
        assert!(driver.writes.is_empty());
    }
}
