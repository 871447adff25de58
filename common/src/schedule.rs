use std::{fmt, str::FromStr};

use chrono::{NaiveTime, Timelike};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

/// Wall-clock hour and minute, date-independent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TimeOfDay {
    hour: u8,
    minute: u8,
}

impl TimeOfDay {
    pub fn new(hour: u8, minute: u8) -> Option<Self> {
        (hour < 24 && minute < 60).then_some(Self { hour, minute })
    }

    pub fn hour(self) -> u8 {
        self.hour
    }

    pub fn minute(self) -> u8 {
        self.minute
    }

    /// Minutes since midnight.
    pub fn minutes(self) -> u16 {
        self.hour as u16 * 60 + self.minute as u16
    }

    pub fn from_naive(time: NaiveTime) -> Self {
        Self {
            hour: time.hour() as u8,
            minute: time.minute() as u8,
        }
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("invalid time of day {0:?}, expected HH:MM")]
pub struct ParseTimeError(String);

impl FromStr for TimeOfDay {
    type Err = ParseTimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseTimeError(s.to_string());
        match s.split_once(':') {
            Some((hours, minutes)) => {
                let hour = hours.parse().map_err(|_| err())?;
                let minute = minutes.parse().map_err(|_| err())?;
                Self::new(hour, minute).ok_or_else(err)
            }
            // Hour-only values accepted for backward compatibility with
            // older config files.
            None => {
                let hour = s.parse().map_err(|_| err())?;
                Self::new(hour, 0).ok_or_else(err)
            }
        }
    }
}

impl Serialize for TimeOfDay {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for TimeOfDay {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

/// The daily light schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LightSchedule {
    pub on: TimeOfDay,
    pub off: TimeOfDay,
}

impl LightSchedule {
    /// True when the lights should be on at `now`.
    ///
    /// With `on < off` the daytime interval is `[on, off)`. A schedule that
    /// crosses midnight (`on > off`) covers `[on, 24:00) ∪ [00:00, off)`.
    /// Equal on and off times mean the lights are always on.
    pub fn is_daytime(&self, now: NaiveTime) -> bool {
        self.is_daytime_at(TimeOfDay::from_naive(now).minutes())
    }

    fn is_daytime_at(&self, now: u16) -> bool {
        let on = self.on.minutes();
        let off = self.off.minutes();
        if on == off {
            true
        } else if on < off {
            on <= now && now < off
        } else {
            now >= on || now < off
        }
    }

    /// The next light transition after `now`, for status reporting.
    pub fn next_transition(&self, now: NaiveTime) -> Transition {
        const DAY_MINUTES: u16 = 24 * 60;
        let now = TimeOfDay::from_naive(now).minutes();
        let (to_on, at) = if self.is_daytime_at(now) {
            (false, self.off)
        } else {
            (true, self.on)
        };
        let target = at.minutes();
        let minutes_until = if target > now {
            target - now
        } else {
            target + DAY_MINUTES - now
        };
        Transition {
            to_on,
            at,
            minutes_until,
        }
    }
}

/// A pending light on/off edge and how far away it is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Transition {
    /// True when the pending edge switches the lights on.
    pub to_on: bool,
    pub at: TimeOfDay,
    pub minutes_until: u16,
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn tod(s: &str) -> TimeOfDay {
        s.parse().unwrap()
    }

    fn at(hour: u32, minute: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(hour, minute, 0).unwrap()
    }

    #[test]
    fn parses_hour_minute_and_hour_only() {
        assert_eq!(tod("07:30"), TimeOfDay::new(7, 30).unwrap());
        assert_eq!(tod("6"), TimeOfDay::new(6, 0).unwrap());
        assert_eq!(tod("00:00"), TimeOfDay::new(0, 0).unwrap());
        assert!("24:00".parse::<TimeOfDay>().is_err());
        assert!("12:60".parse::<TimeOfDay>().is_err());
        assert!("noon".parse::<TimeOfDay>().is_err());
    }

    #[test]
    fn serializes_as_hh_mm_string() {
        let schedule = LightSchedule {
            on: tod("06:00"),
            off: tod("18:00"),
        };
        let json = serde_json::to_string(&schedule).unwrap();
        assert_eq!(json, r#"{"on":"06:00","off":"18:00"}"#);
        let back: LightSchedule = serde_json::from_str(&json).unwrap();
        assert_eq!(back, schedule);
    }

    #[test]
    fn daytime_interval_is_closed_open() {
        let schedule = LightSchedule {
            on: tod("07:30"),
            off: tod("19:30"),
        };
        assert!(!schedule.is_daytime(at(7, 29)));
        assert!(schedule.is_daytime(at(7, 30)));
        assert!(schedule.is_daytime(at(12, 0)));
        assert!(schedule.is_daytime(at(19, 29)));
        assert!(!schedule.is_daytime(at(19, 30)));
        assert!(!schedule.is_daytime(at(23, 0)));
    }

    #[test]
    fn schedule_crossing_midnight_wraps() {
        let schedule = LightSchedule {
            on: tod("22:00"),
            off: tod("06:00"),
        };
        assert!(schedule.is_daytime(at(22, 0)));
        assert!(schedule.is_daytime(at(23, 59)));
        assert!(schedule.is_daytime(at(0, 0)));
        assert!(schedule.is_daytime(at(5, 59)));
        assert!(!schedule.is_daytime(at(6, 0)));
        assert!(!schedule.is_daytime(at(12, 0)));
        assert!(!schedule.is_daytime(at(21, 59)));
    }

    #[test]
    fn equal_on_off_means_always_daytime() {
        let schedule = LightSchedule {
            on: tod("08:00"),
            off: tod("08:00"),
        };
        assert!(schedule.is_daytime(at(8, 0)));
        assert!(schedule.is_daytime(at(0, 0)));
        assert!(schedule.is_daytime(at(23, 59)));
    }

    #[test]
    fn next_transition_reports_pending_edge() {
        let schedule = LightSchedule {
            on: tod("06:00"),
            off: tod("18:00"),
        };

        let during_day = schedule.next_transition(at(15, 0));
        assert_eq!(during_day.to_on, false);
        assert_eq!(during_day.at, tod("18:00"));
        assert_eq!(during_day.minutes_until, 180);

        let during_night = schedule.next_transition(at(23, 0));
        assert_eq!(during_night.to_on, true);
        assert_eq!(during_night.at, tod("06:00"));
        assert_eq!(during_night.minutes_until, 7 * 60);
    }
}
