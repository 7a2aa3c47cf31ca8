use chrono::{DateTime, Days, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One side of an event's span as the calendar service reports it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventTime {
    Date {
        date: NaiveDate,
        time_zone: Option<String>,
    },
    DateTime {
        at: DateTime<FixedOffset>,
        time_zone: Option<String>,
    },
}

impl EventTime {
    /// Date-only value without a zone.
    pub fn on(date: NaiveDate) -> Self {
        Self::Date {
            date,
            time_zone: None,
        }
    }

    pub fn is_date_only(&self) -> bool {
        matches!(self, Self::Date { .. })
    }

    /// Calendar date as written on the wire, i.e. in the offset the service used.
    pub fn date(&self) -> NaiveDate {
        match self {
            Self::Date { date, .. } => *date,
            Self::DateTime { at, .. } => at.date_naive(),
        }
    }

    pub fn time_zone(&self) -> Option<&str> {
        match self {
            Self::Date { time_zone, .. } | Self::DateTime { time_zone, .. } => time_zone.as_deref(),
        }
    }

    fn collapsed_to(&self, date: NaiveDate) -> Self {
        Self::Date {
            date,
            time_zone: self.time_zone().map(ToOwned::to_owned),
        }
    }
}

/// Status marker carried in the event color.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Tag {
    Done,
    Other(String),
    #[default]
    Absent,
}

impl Tag {
    pub fn from_color_id(color_id: Option<&str>, done_color_id: &str) -> Self {
        match color_id.map(str::trim).filter(|value| !value.is_empty()) {
            None => Self::Absent,
            Some(value) if value == done_color_id => Self::Done,
            Some(value) => Self::Other(value.to_string()),
        }
    }

    pub fn color_id<'a>(&'a self, done_color_id: &'a str) -> Option<&'a str> {
        match self {
            Self::Done => Some(done_color_id),
            Self::Other(value) => Some(value.as_str()),
            Self::Absent => None,
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub id: String,
    pub summary: Option<String>,
    pub start: EventTime,
    pub end: EventTime,
    pub tag: Tag,
    /// Wire fields the todo model does not interpret; written back untouched.
    pub extra: Map<String, Value>,
}

impl Entry {
    /// New whole-day entry on `day`. The end date is exclusive.
    pub fn all_day(id: impl Into<String>, name: impl Into<String>, day: NaiveDate) -> Self {
        let next_day = day.checked_add_days(Days::new(1)).unwrap_or(day);
        Self {
            id: id.into(),
            summary: Some(name.into()),
            start: EventTime::on(day),
            end: EventTime::on(next_day),
            tag: Tag::Absent,
            extra: Map::new(),
        }
    }

    pub fn name(&self) -> &str {
        self.summary.as_deref().unwrap_or("")
    }

    pub fn is_all_day(&self) -> bool {
        self.start.is_date_only() && self.end.is_date_only()
    }

    /// Collapses timed start/end into their dates, keeping any zone name.
    /// Entries that are already all-day come back unchanged.
    ///
    /// The end date is exclusive, so a span that ends on its start date is
    /// stretched to cover that whole day.
    pub fn into_all_day(mut self) -> Self {
        let start = self.start.date();
        let end = self.end.date();
        let end = if end > start {
            end
        } else {
            start.checked_add_days(Days::new(1)).unwrap_or(start)
        };
        self.start = self.start.collapsed_to(start);
        self.end = self.end.collapsed_to(end);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OAuthToken {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub token_type: String,
    pub scope: Option<String>,
}

impl OAuthToken {
    pub fn is_valid_at(&self, now: DateTime<Utc>, leeway_seconds: i64) -> bool {
        self.expires_at > now + chrono::Duration::seconds(leeway_seconds)
            && !self.access_token.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(value: &str) -> NaiveDate {
        NaiveDate::parse_from_str(value, "%Y-%m-%d").expect("valid date")
    }

    fn timed(value: &str) -> EventTime {
        EventTime::DateTime {
            at: DateTime::parse_from_rfc3339(value).expect("valid datetime"),
            time_zone: Some("America/New_York".to_string()),
        }
    }

    fn zoned_date(value: &str) -> EventTime {
        EventTime::Date {
            date: date(value),
            time_zone: Some("America/New_York".to_string()),
        }
    }

    #[test]
    fn tag_from_color_id_distinguishes_done_other_and_absent() {
        assert_eq!(Tag::from_color_id(Some("8"), "8"), Tag::Done);
        assert_eq!(Tag::from_color_id(Some("3"), "8"), Tag::Other("3".to_string()));
        assert_eq!(Tag::from_color_id(None, "8"), Tag::Absent);
        assert_eq!(Tag::from_color_id(Some("  "), "8"), Tag::Absent);
    }

    #[test]
    fn tag_color_id_uses_configured_sentinel() {
        assert_eq!(Tag::Done.color_id("11"), Some("11"));
        assert_eq!(Tag::Other("4".to_string()).color_id("11"), Some("4"));
        assert_eq!(Tag::Absent.color_id("11"), None);
    }

    #[test]
    fn all_day_entry_ends_on_the_following_date() {
        let entry = Entry::all_day("evt-1", "Laundry", date("2026-02-28"));
        assert!(entry.is_all_day());
        assert_eq!(entry.start, EventTime::on(date("2026-02-28")));
        assert_eq!(entry.end, EventTime::on(date("2026-03-01")));
        assert_eq!(entry.tag, Tag::Absent);
    }

    #[test]
    fn into_all_day_keeps_the_written_local_date() {
        let entry = Entry {
            id: "evt-2".to_string(),
            summary: Some("Late call".to_string()),
            start: timed("2026-02-16T23:30:00-05:00"),
            end: timed("2026-02-17T00:30:00-05:00"),
            tag: Tag::Absent,
            extra: Map::new(),
        };

        let collapsed = entry.into_all_day();
        assert_eq!(collapsed.start, zoned_date("2026-02-16"));
        assert_eq!(collapsed.end, zoned_date("2026-02-17"));
    }

    #[test]
    fn into_all_day_covers_same_day_span() {
        let entry = Entry {
            id: "evt-5".to_string(),
            summary: Some("Standup".to_string()),
            start: timed("2026-02-16T09:00:00-05:00"),
            end: timed("2026-02-16T09:15:00-05:00"),
            tag: Tag::Absent,
            extra: Map::new(),
        };

        let collapsed = entry.into_all_day();
        assert_eq!(collapsed.start, zoned_date("2026-02-16"));
        assert_eq!(collapsed.end, zoned_date("2026-02-17"));
        assert!(collapsed.is_all_day());
    }

    #[test]
    fn into_all_day_is_idempotent() {
        let entry = Entry::all_day("evt-3", "Gym", date("2026-02-16"));
        assert_eq!(entry.clone().into_all_day(), entry);
    }

    #[test]
    fn missing_summary_reads_as_empty_name() {
        let mut entry = Entry::all_day("evt-4", "x", date("2026-02-16"));
        entry.summary = None;
        assert_eq!(entry.name(), "");
    }
}
