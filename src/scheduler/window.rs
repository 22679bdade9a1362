use std::time::Duration;

use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Timelike, Utc};
use serde_json::Value;

use crate::config::ConfigProvider;

/// Ticks are aligned to wall-clock multiples of this interval.
pub const TICK_INTERVAL: Duration = Duration::from_secs(5 * 60);

pub const MORNING_HOURS_KEY: &str = "schedule_morning_hours";
pub const EVENING_HOURS_KEY: &str = "schedule_evening_hours";

/// Source of local wall-clock time.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;

    /// The instant of [`Clock::now`] in UTC. A local time skipped by a DST
    /// change is read as UTC.
    fn now_utc(&self) -> DateTime<Utc> {
        let local = self.now();
        Local
            .from_local_datetime(&local)
            .earliest()
            .map_or_else(|| local.and_utc(), |t| t.with_timezone(&Utc))
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Inclusive hour range in which windowed tasks may run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleWindow {
    pub after: u32,
    pub until: u32,
}

impl Default for ScheduleWindow {
    fn default() -> Self {
        Self { after: 0, until: 23 }
    }
}

impl ScheduleWindow {
    /// Read the window from configuration. Missing or non-numeric bounds fall
    /// back to the unrestricted defaults.
    pub fn from_config(config: &dyn ConfigProvider) -> Self {
        let hour = |key: &str| {
            config
                .get(key)
                .as_ref()
                .and_then(Value::as_u64)
                .and_then(|h| u32::try_from(h).ok())
        };
        let default = Self::default();
        Self {
            after: hour(MORNING_HOURS_KEY).unwrap_or(default.after),
            until: hour(EVENING_HOURS_KEY).unwrap_or(default.until),
        }
    }

    pub fn contains(&self, hour: u32) -> bool {
        hour >= self.after && hour <= self.until
    }
}

/// Time left until the next [`TICK_INTERVAL`] boundary after `now`.
/// Exactly on a boundary, that is a full interval.
pub fn next_tick_delay(now: NaiveDateTime) -> Duration {
    let slot_secs = TICK_INTERVAL.as_secs();
    let into_slot = u64::from(now.minute()) * 60 % slot_secs + u64::from(now.second());
    // nanosecond() exceeds 1e9 during a leap second
    let nanos = now.nanosecond().min(999_999_999);
    let elapsed = Duration::from_secs(into_slot) + Duration::from_nanos(u64::from(nanos));
    TICK_INTERVAL.saturating_sub(elapsed)
}

/// Short human description of a delay, for logs.
pub fn humanize(delay: Duration) -> String {
    let secs = delay.as_secs();
    match secs {
        0..=44 => "a few seconds".to_string(),
        45..=89 => "a minute".to_string(),
        _ => format!("{} minutes", (secs + 30) / 60),
    }
}
