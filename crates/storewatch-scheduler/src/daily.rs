//! Fixed local time-of-day, recurring daily, in an IANA timezone.

use chrono::{DateTime, Days, LocalResult, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use storewatch_core::config::ScheduleConfig;
use storewatch_core::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailySchedule {
    time: NaiveTime,
    tz: Tz,
}

impl DailySchedule {
    pub fn new(time: NaiveTime, tz: Tz) -> Self {
        Self { time, tz }
    }

    pub fn from_config(config: &ScheduleConfig) -> Result<Self> {
        Ok(Self::new(config.time_of_day()?, config.tz()?))
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    /// First occurrence strictly after `now`: today if the time has not
    /// passed yet, otherwise tomorrow.
    pub fn next_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let mut day = now.with_timezone(&self.tz).date_naive();
        loop {
            let candidate = self.occurrence_on(day);
            if candidate > now {
                return candidate;
            }
            day = day + Days::new(1);
        }
    }

    /// Wall-clock wait from `now` until the next occurrence.
    pub fn until_next(&self, now: DateTime<Utc>) -> std::time::Duration {
        (self.next_after(now) - now).to_std().unwrap_or_default()
    }

    /// The instant the configured time falls on for a local date. Ambiguous
    /// times (clocks going back) take the earlier instant; times skipped by
    /// a forward jump run at the first valid minute after the gap.
    fn occurrence_on(&self, day: NaiveDate) -> DateTime<Utc> {
        let mut local = day.and_time(self.time);
        loop {
            match self.tz.from_local_datetime(&local) {
                LocalResult::Single(t) => return t.with_timezone(&Utc),
                LocalResult::Ambiguous(earliest, _) => return earliest.with_timezone(&Utc),
                LocalResult::None => local += chrono::Duration::minutes(1),
            }
        }
    }

    pub fn describe(&self) -> String {
        format!("every day at {} ({})", self.time.format("%H:%M"), self.tz)
    }
}
