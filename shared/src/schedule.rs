//! Alarm schedule arithmetic
//!
//! Wake times sit on a fixed grid: every `interval_hours` hours counted from
//! midnight, at `anchor_minute` past the hour. Computing the next slot from
//! the grid rather than from "now + interval" keeps the cadence stable no
//! matter how long a boot took.

use chrono::{Days, NaiveDateTime, Timelike};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("Invalid alarm interval: {0} hours (must be 1..=24)")]
    InvalidInterval(u32),

    #[error("Invalid anchor minute: {0} (must be 0..=59)")]
    InvalidAnchorMinute(u32),

    #[error("Next alarm after {0} is outside the calendar range")]
    OutOfRange(NaiveDateTime),
}

/// A committed wake-up time and the policy that produced it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlarmSchedule {
    pub next_fire_time: NaiveDateTime,
    pub interval_hours: u32,
    pub anchor_minute: u32,
}

impl AlarmSchedule {
    /// Compute the schedule for a clock reading
    pub fn compute(
        current: NaiveDateTime,
        interval_hours: u32,
        anchor_minute: u32,
    ) -> Result<Self, ScheduleError> {
        Ok(Self {
            next_fire_time: next_fire_time(current, interval_hours, anchor_minute)?,
            interval_hours,
            anchor_minute,
        })
    }
}

/// Next grid slot strictly after `current`
///
/// The hour is `(hour / interval) * interval + interval`; when that reaches
/// 24 or more it wraps onto the following day.
pub fn next_fire_time(
    current: NaiveDateTime,
    interval_hours: u32,
    anchor_minute: u32,
) -> Result<NaiveDateTime, ScheduleError> {
    if interval_hours == 0 || interval_hours > 24 {
        return Err(ScheduleError::InvalidInterval(interval_hours));
    }
    if anchor_minute > 59 {
        return Err(ScheduleError::InvalidAnchorMinute(anchor_minute));
    }

    let slot = (current.hour() / interval_hours) * interval_hours + interval_hours;
    let day_offset = u64::from(slot / 24);
    let hour = slot % 24;

    current
        .date()
        .checked_add_days(Days::new(day_offset))
        .and_then(|date| date.and_hms_opt(hour, anchor_minute, 0))
        .ok_or(ScheduleError::OutOfRange(current))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(hour: u32, minute: u32, second: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 15)
            .unwrap()
            .and_hms_opt(hour, minute, second)
            .unwrap()
    }

    #[test]
    fn test_next_slot_same_day() {
        let next = next_fire_time(at(10, 17, 42), 2, 5).unwrap();
        assert_eq!(next, at(12, 5, 0));
    }

    #[test]
    fn test_wraps_to_next_day() {
        let next = next_fire_time(at(23, 30, 0), 6, 0).unwrap();
        assert_eq!(next.date(), NaiveDate::from_ymd_opt(2024, 6, 16).unwrap());
        assert_eq!(next.hour(), 0);

        let daily = next_fire_time(at(7, 0, 0), 24, 15).unwrap();
        assert_eq!(daily.date(), NaiveDate::from_ymd_opt(2024, 6, 16).unwrap());
        assert_eq!((daily.hour(), daily.minute()), (0, 15));
    }

    #[test]
    fn test_future_and_on_grid_for_every_hour() {
        for interval in [1, 2, 3, 4, 6, 8, 12] {
            for hour in 0..24 {
                for (minute, second) in [(0, 0), (0, 1), (29, 59), (59, 59)] {
                    let now = at(hour, minute, second);
                    let next = next_fire_time(now, interval, 0).unwrap();

                    assert!(next > now, "{} not after {}", next, now);
                    assert_eq!(next.hour() % interval, 0, "{} off the {}h grid", next, interval);
                    assert_eq!(next.minute(), 0);
                    assert_eq!(next.second(), 0);
                    assert!(next - now <= chrono::Duration::hours(i64::from(interval)));
                }
            }
        }
    }

    #[test]
    fn test_rearm_within_interval_is_stable() {
        let first = next_fire_time(at(14, 2, 0), 4, 10).unwrap();
        let again = next_fire_time(at(15, 59, 59), 4, 10).unwrap();
        assert_eq!(first, again);
        assert_eq!(first, at(16, 10, 0));
    }

    #[test]
    fn test_waking_on_the_alarm_schedules_the_next_slot() {
        let next = next_fire_time(at(12, 0, 0), 2, 0).unwrap();
        assert_eq!(next, at(14, 0, 0));
    }

    #[test]
    fn test_invalid_policy() {
        assert_eq!(
            next_fire_time(at(1, 0, 0), 0, 0),
            Err(ScheduleError::InvalidInterval(0))
        );
        assert_eq!(
            next_fire_time(at(1, 0, 0), 25, 0),
            Err(ScheduleError::InvalidInterval(25))
        );
        assert_eq!(
            next_fire_time(at(1, 0, 0), 1, 60),
            Err(ScheduleError::InvalidAnchorMinute(60))
        );
    }
}
