use crate::domain::models::{Entry, EventTime, Tag};
use crate::infrastructure::error::InfraError;
use chrono::{DateTime, NaiveDate};
use serde_json::{Map, Value};

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq, Default)]
pub struct CalendarEventTime {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(rename = "dateTime", skip_serializing_if = "Option::is_none")]
    pub date_time: Option<String>,
    #[serde(rename = "timeZone", skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq, Default)]
pub struct GoogleCalendarEvent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<CalendarEventTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<CalendarEventTime>,
    #[serde(rename = "colorId", skip_serializing_if = "Option::is_none")]
    pub color_id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Maps a wire event to an [`Entry`].
///
/// Events without an id or without both ends of their span are not todo
/// candidates and map to `Ok(None)`.
pub fn decode_entry(
    event: &GoogleCalendarEvent,
    done_color_id: &str,
) -> Result<Option<Entry>, InfraError> {
    let Some(id) = event
        .id
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
    else {
        return Ok(None);
    };
    let (Some(start), Some(end)) = (event.start.as_ref(), event.end.as_ref()) else {
        return Ok(None);
    };

    Ok(Some(Entry {
        id: id.to_string(),
        summary: event.summary.clone(),
        start: decode_time(start, "start")?,
        end: decode_time(end, "end")?,
        tag: Tag::from_color_id(event.color_id.as_deref(), done_color_id),
        extra: event.extra.clone(),
    }))
}

pub fn encode_entry(entry: &Entry, done_color_id: &str) -> GoogleCalendarEvent {
    GoogleCalendarEvent {
        id: Some(entry.id.trim())
            .filter(|value| !value.is_empty())
            .map(ToOwned::to_owned),
        summary: entry.summary.clone(),
        start: Some(encode_time(&entry.start)),
        end: Some(encode_time(&entry.end)),
        color_id: entry.tag.color_id(done_color_id).map(ToOwned::to_owned),
        extra: entry.extra.clone(),
    }
}

fn decode_time(value: &CalendarEventTime, field_name: &str) -> Result<EventTime, InfraError> {
    if let Some(raw) = value.date_time.as_deref() {
        let at = DateTime::parse_from_rfc3339(raw).map_err(|error| {
            InfraError::Remote(format!(
                "invalid calendar event {field_name}.dateTime '{raw}': {error}"
            ))
        })?;
        return Ok(EventTime::DateTime {
            at,
            time_zone: value.time_zone.clone(),
        });
    }

    let raw = value.date.as_deref().ok_or_else(|| {
        InfraError::Remote(format!(
            "calendar event {field_name} has neither date nor dateTime"
        ))
    })?;
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT)
        .map(|date| EventTime::Date {
            date,
            time_zone: value.time_zone.clone(),
        })
        .map_err(|error| {
            InfraError::Remote(format!(
                "invalid calendar event {field_name}.date '{raw}': {error}"
            ))
        })
}

fn encode_time(value: &EventTime) -> CalendarEventTime {
    match value {
        EventTime::Date { date, time_zone } => CalendarEventTime {
            date: Some(date.format(DATE_FORMAT).to_string()),
            date_time: None,
            time_zone: time_zone.clone(),
        },
        EventTime::DateTime { at, time_zone } => CalendarEventTime {
            date: None,
            date_time: Some(at.to_rfc3339()),
            time_zone: time_zone.clone(),
        },
    }
}
