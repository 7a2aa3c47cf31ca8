use chrono::{DateTime, Days, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

/// Half-open `[start, end)` interval covering one calendar day in `zone`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Tz>,
    pub end: DateTime<Tz>,
}

impl TimeWindow {
    /// Window for `today + offset`, anchored at local midnight in `zone`.
    ///
    /// Offsets beyond the representable date range saturate at its boundary.
    pub fn resolve(offset: i64, today: NaiveDate, zone: Tz) -> Self {
        let day = shift_days(today, offset);
        let next_day = day.succ_opt().unwrap_or(NaiveDate::MAX);
        Self {
            start: local_midnight(zone, day),
            end: local_midnight(zone, next_day),
        }
    }

    pub fn for_offset(offset: i64, now: DateTime<Utc>, zone: Tz) -> Self {
        let today = now.with_timezone(&zone).date_naive();
        Self::resolve(offset, today, zone)
    }

    pub fn day(&self) -> NaiveDate {
        self.start.date_naive()
    }

    pub fn start_utc(&self) -> DateTime<Utc> {
        self.start.with_timezone(&Utc)
    }

    pub fn end_utc(&self) -> DateTime<Utc> {
        self.end.with_timezone(&Utc)
    }
}

fn shift_days(date: NaiveDate, offset: i64) -> NaiveDate {
    // The last representable date has no following day to end the window on.
    let last_start = NaiveDate::MAX.pred_opt().unwrap_or(NaiveDate::MAX);
    let magnitude = Days::new(offset.unsigned_abs());
    let shifted = if offset >= 0 {
        date.checked_add_days(magnitude)
    } else {
        date.checked_sub_days(magnitude)
    };
    match shifted {
        Some(day) => day.min(last_start),
        None if offset >= 0 => last_start,
        None => NaiveDate::MIN,
    }
}

fn local_midnight(zone: Tz, date: NaiveDate) -> DateTime<Tz> {
    let midnight = date.and_time(NaiveTime::MIN);
    if let Some(value) = zone.from_local_datetime(&midnight).earliest() {
        return value;
    }
    // Midnight falls inside a DST gap; use the first local minute that exists.
    (1..=24 * 60)
        .find_map(|minutes| {
            zone.from_local_datetime(&(midnight + Duration::minutes(minutes)))
                .earliest()
        })
        .unwrap_or_else(|| zone.from_utc_datetime(&midnight))
}
