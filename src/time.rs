//! Calendar-day boundaries
//!
//! "Today" is the user's local day. Every helper has a variant taking an
//! explicit timezone so tests can pin it.

use chrono::{DateTime, Days, Local, NaiveDate, NaiveTime, TimeZone, Utc};

fn midnight_in<Tz: TimeZone>(date: NaiveDate, tz: &Tz) -> Option<DateTime<Utc>> {
    tz.from_local_datetime(&date.and_time(NaiveTime::MIN))
        .earliest()
        .map(|d| d.with_timezone(&Utc))
}

/// Start of the local day `offset_days` after the day containing `now`
pub fn day_start_in<Tz: TimeZone>(now: DateTime<Utc>, tz: &Tz, offset_days: u64) -> DateTime<Utc> {
    let today = now.with_timezone(tz).date_naive();
    today
        .checked_add_days(Days::new(offset_days))
        .and_then(|date| midnight_in(date, tz))
        .unwrap_or(now)
}

pub fn start_of_day_in<Tz: TimeZone>(now: DateTime<Utc>, tz: &Tz) -> DateTime<Utc> {
    day_start_in(now, tz, 0)
}

/// Start of today in the local timezone
pub fn start_of_day(now: DateTime<Utc>) -> DateTime<Utc> {
    start_of_day_in(now, &Local)
}

/// Start of tomorrow in the local timezone
pub fn start_of_tomorrow(now: DateTime<Utc>) -> DateTime<Utc> {
    day_start_in(now, &Local, 1)
}

/// Today's window plus the week after it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayWindow {
    pub now: DateTime<Utc>,
    pub today_start: DateTime<Utc>,
    pub tomorrow_start: DateTime<Utc>,
    /// End of the seven days following today
    pub week_end: DateTime<Utc>,
}

impl DayWindow {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self::in_tz(now, &Local)
    }

    pub fn in_tz<Tz: TimeZone>(now: DateTime<Utc>, tz: &Tz) -> Self {
        Self {
            now,
            today_start: day_start_in(now, tz, 0),
            tomorrow_start: day_start_in(now, tz, 1),
            week_end: day_start_in(now, tz, 8),
        }
    }

    pub fn is_overdue(&self, due: DateTime<Utc>) -> bool {
        due < self.today_start
    }

    pub fn is_today(&self, due: DateTime<Utc>) -> bool {
        due >= self.today_start && due < self.tomorrow_start
    }

    pub fn is_future(&self, due: DateTime<Utc>) -> bool {
        due >= self.tomorrow_start
    }
}
