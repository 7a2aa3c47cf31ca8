use crate::domain::models::{Entry, EventTime};
use crate::domain::window::TimeWindow;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::event_mapper::{decode_entry, encode_entry, GoogleCalendarEvent};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use log::{debug, warn};
use reqwest::{Client, RequestBuilder};
use std::sync::Mutex;
use url::Url;

const CALENDAR_API_BASE: &str = "https://www.googleapis.com/calendar/v3";
pub const DEFAULT_PAGE_SIZE: u32 = 50;

/// Supplies a bearer token that is valid at the time of the call.
#[async_trait]
pub trait AccessTokenProvider: Send + Sync {
    async fn access_token(&self) -> Result<String, InfraError>;
}

/// Events of a single calendar, seen through the todo model.
#[async_trait]
pub trait CalendarGateway: Send + Sync {
    /// Single (expanded) entries overlapping `window`, ordered by start time.
    async fn list(&self, window: &TimeWindow) -> Result<Vec<Entry>, InfraError>;

    /// Creates a whole-day entry on `day` and returns it as stored.
    async fn insert(&self, name: &str, day: NaiveDate) -> Result<Entry, InfraError>;

    /// Replaces the stored record with `entry`.
    async fn update(&self, entry: &Entry) -> Result<(), InfraError>;

    async fn delete(&self, entry: &Entry) -> Result<(), InfraError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewaySettings {
    pub calendar_id: String,
    pub done_color_id: String,
    pub page_size: u32,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            calendar_id: "primary".to_string(),
            done_color_id: "8".to_string(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

pub struct GoogleCalendarGateway<P>
where
    P: AccessTokenProvider,
{
    client: Client,
    token_provider: P,
    settings: GatewaySettings,
    api_base: String,
}

impl<P> GoogleCalendarGateway<P>
where
    P: AccessTokenProvider,
{
    pub fn new(token_provider: P, settings: GatewaySettings) -> Self {
        Self {
            client: Client::new(),
            token_provider,
            settings,
            api_base: CALENDAR_API_BASE.to_string(),
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    fn endpoint(&self, event_id: Option<&str>) -> Result<Url, InfraError> {
        if self.settings.calendar_id.trim().is_empty() {
            return Err(InfraError::InvalidConfig("calendar id must not be empty".to_string()));
        }
        let mut url = Url::parse(&self.api_base)
            .map_err(|error| InfraError::Remote(format!("invalid calendar api base url: {error}")))?;
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                InfraError::Remote("calendar api base URL cannot be a base".to_string())
            })?;
            segments
                .pop_if_empty()
                .push("calendars")
                .push(&self.settings.calendar_id)
                .push("events");
            if let Some(event_id) = event_id {
                segments.push(event_id);
            }
        }
        Ok(url)
    }

    fn entry_endpoint(&self, entry: &Entry) -> Result<Url, InfraError> {
        let event_id = entry.id.trim();
        if event_id.is_empty() {
            return Err(InfraError::Remote("event id must not be empty".to_string()));
        }
        self.endpoint(Some(event_id))
    }

    /// Sends an authorized request and returns the response body of a 2xx reply.
    async fn execute(&self, request: RequestBuilder, action: &str) -> Result<String, InfraError> {
        let access_token = self.token_provider.access_token().await?;
        let response = request
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|error| InfraError::Remote(format!("network error while {action}: {error}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| InfraError::Remote(format!("failed reading response while {action}: {error}")))?;

        if !status.is_success() {
            return Err(if body.trim().is_empty() {
                InfraError::Remote(format!("{action} failed: http {}", status.as_u16()))
            } else {
                InfraError::Remote(format!("{action} failed: http {}; body={body}", status.as_u16()))
            });
        }
        Ok(body)
    }
}

#[derive(Debug, serde::Deserialize)]
struct EventsPageResponse {
    items: Option<Vec<GoogleCalendarEvent>>,
}

#[async_trait]
impl<P> CalendarGateway for GoogleCalendarGateway<P>
where
    P: AccessTokenProvider,
{
    async fn list(&self, window: &TimeWindow) -> Result<Vec<Entry>, InfraError> {
        let request = self.client.get(self.endpoint(None)?).query(&[
            ("timeMin", window.start.to_rfc3339()),
            ("timeMax", window.end.to_rfc3339()),
            ("maxResults", self.settings.page_size.to_string()),
            ("singleEvents", "true".to_string()),
            ("orderBy", "startTime".to_string()),
        ]);
        let body = self.execute(request, "listing events").await?;

        let parsed: EventsPageResponse = serde_json::from_str(&body).map_err(|error| {
            InfraError::Remote(format!("invalid events list payload: {error}; body={body}"))
        })?;

        let mut entries = Vec::new();
        for event in parsed.items.unwrap_or_default() {
            match decode_entry(&event, &self.settings.done_color_id) {
                Ok(Some(entry)) => entries.push(entry),
                Ok(None) => debug!("event=list_skip reason=no_span id={:?}", event.id),
                Err(error) => warn!("event=list_skip reason=undecodable id={:?} error={error}", event.id),
            }
        }
        Ok(entries)
    }

    async fn insert(&self, name: &str, day: NaiveDate) -> Result<Entry, InfraError> {
        let body = encode_entry(&Entry::all_day("", name, day), &self.settings.done_color_id);
        let request = self.client.post(self.endpoint(None)?).json(&body);
        let response = self.execute(request, "creating event").await?;

        let created: GoogleCalendarEvent = serde_json::from_str(&response).map_err(|error| {
            InfraError::Remote(format!("invalid event create payload: {error}; body={response}"))
        })?;
        decode_entry(&created, &self.settings.done_color_id)?
            .ok_or_else(|| InfraError::Remote("event create response did not include id".to_string()))
    }

    async fn update(&self, entry: &Entry) -> Result<(), InfraError> {
        let body = encode_entry(entry, &self.settings.done_color_id);
        let request = self.client.put(self.entry_endpoint(entry)?).json(&body);
        self.execute(request, "updating event").await?;
        Ok(())
    }

    async fn delete(&self, entry: &Entry) -> Result<(), InfraError> {
        let request = self.client.delete(self.entry_endpoint(entry)?);
        self.execute(request, "deleting event").await?;
        Ok(())
    }
}

/// Gateway over an in-process event list; stands in for the service in tests.
#[derive(Debug, Default)]
pub struct InMemoryCalendarGateway {
    state: Mutex<InMemoryState>,
}

#[derive(Debug, Default)]
struct InMemoryState {
    entries: Vec<Entry>,
    next_id: u64,
    updates: usize,
    deletes: usize,
}

impl InMemoryCalendarGateway {
    pub fn with_entries(entries: Vec<Entry>) -> Self {
        Self {
            state: Mutex::new(InMemoryState {
                entries,
                ..InMemoryState::default()
            }),
        }
    }

    pub fn entries(&self) -> Result<Vec<Entry>, InfraError> {
        Ok(self.lock()?.entries.clone())
    }

    pub fn get(&self, event_id: &str) -> Result<Option<Entry>, InfraError> {
        Ok(self
            .lock()?
            .entries
            .iter()
            .find(|entry| entry.id == event_id)
            .cloned())
    }

    pub fn update_count(&self) -> Result<usize, InfraError> {
        Ok(self.lock()?.updates)
    }

    pub fn delete_count(&self) -> Result<usize, InfraError> {
        Ok(self.lock()?.deletes)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, InMemoryState>, InfraError> {
        self.state
            .lock()
            .map_err(|error| InfraError::Remote(format!("in-memory calendar lock poisoned: {error}")))
    }

    fn instant(value: &EventTime, window: &TimeWindow) -> DateTime<Utc> {
        match value {
            EventTime::Date { date, .. } => TimeWindow::resolve(0, *date, window.start.timezone()).start_utc(),
            EventTime::DateTime { at, .. } => at.with_timezone(&Utc),
        }
    }
}

#[async_trait]
impl CalendarGateway for InMemoryCalendarGateway {
    async fn list(&self, window: &TimeWindow) -> Result<Vec<Entry>, InfraError> {
        let state = self.lock()?;
        let mut overlapping = state
            .entries
            .iter()
            .filter(|entry| {
                Self::instant(&entry.start, window) < window.end_utc()
                    && Self::instant(&entry.end, window) > window.start_utc()
            })
            .cloned()
            .collect::<Vec<_>>();
        overlapping.sort_by_key(|entry| Self::instant(&entry.start, window));
        overlapping.truncate(DEFAULT_PAGE_SIZE as usize);
        Ok(overlapping)
    }

    async fn insert(&self, name: &str, day: NaiveDate) -> Result<Entry, InfraError> {
        let mut state = self.lock()?;
        state.next_id += 1;
        let entry = Entry::all_day(format!("mem-{}", state.next_id), name, day);
        state.entries.push(entry.clone());
        Ok(entry)
    }

    async fn update(&self, entry: &Entry) -> Result<(), InfraError> {
        let mut state = self.lock()?;
        let slot = state
            .entries
            .iter_mut()
            .find(|stored| stored.id == entry.id)
            .ok_or_else(|| InfraError::Remote(format!("updating event failed: http 404; id={}", entry.id)))?;
        *slot = entry.clone();
        state.updates += 1;
        Ok(())
    }

    async fn delete(&self, entry: &Entry) -> Result<(), InfraError> {
        let mut state = self.lock()?;
        let before = state.entries.len();
        state.entries.retain(|stored| stored.id != entry.id);
        if state.entries.len() == before {
            return Err(InfraError::Remote(format!("deleting event failed: http 404; id={}", entry.id)));
        }
        state.deletes += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::Tag;
    use chrono_tz::America::New_York;
    use mockito::{Matcher, Server};

    struct FixedToken(&'static str);

    #[async_trait]
    impl AccessTokenProvider for FixedToken {
        async fn access_token(&self) -> Result<String, InfraError> {
            Ok(self.0.to_string())
        }
    }

    fn window() -> TimeWindow {
        let day = NaiveDate::parse_from_str("2026-02-16", "%Y-%m-%d").expect("valid date");
        TimeWindow::resolve(0, day, New_York)
    }

    fn gateway(server: &Server) -> GoogleCalendarGateway<FixedToken> {
        GoogleCalendarGateway::new(FixedToken("access-token"), GatewaySettings::default())
            .with_api_base(server.url())
    }

    #[tokio::test]
    async fn list_queries_one_day_page_and_decodes_entries() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/calendars/primary/events")
            .match_header("authorization", "Bearer access-token")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("timeMin".into(), "2026-02-16T00:00:00-05:00".into()),
                Matcher::UrlEncoded("timeMax".into(), "2026-02-17T00:00:00-05:00".into()),
                Matcher::UrlEncoded("maxResults".into(), "50".into()),
                Matcher::UrlEncoded("singleEvents".into(), "true".into()),
                Matcher::UrlEncoded("orderBy".into(), "startTime".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                serde_json::json!({
                    "items": [
                        {
                            "id": "evt-1",
                            "summary": "Gym",
                            "start": { "date": "2026-02-16" },
                            "end": { "date": "2026-02-17" },
                            "colorId": "8"
                        },
                        { "id": "evt-2", "status": "cancelled" },
                        {
                            "id": "evt-3",
                            "summary": "Broken",
                            "start": { "date": "not-a-date" },
                            "end": { "date": "2026-02-17" }
                        }
                    ]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let entries = gateway(&server).list(&window()).await.expect("list entries");

        mock.assert_async().await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, "evt-1");
        assert_eq!(entries[0].tag, Tag::Done);
    }

    #[tokio::test]
    async fn empty_list_response_yields_no_entries() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/calendars/primary/events")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        let entries = gateway(&server).list(&window()).await.expect("list entries");
        assert!(entries.is_empty());
    }

    #[tokio::test]
    async fn update_puts_full_record_with_color() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("PUT", "/calendars/primary/events/evt-1")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "id": "evt-1",
                "summary": "Buy milk",
                "colorId": "8",
                "start": { "date": "2026-02-16" },
                "end": { "date": "2026-02-17" }
            })))
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        let day = window().day();
        let mut entry = Entry::all_day("evt-1", "Buy milk", day);
        entry.tag = Tag::Done;
        gateway(&server).update(&entry).await.expect("update entry");

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn insert_posts_all_day_body_and_returns_created_entry() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/calendars/primary/events")
            .match_body(Matcher::Json(serde_json::json!({
                "summary": "Laundry",
                "start": { "date": "2026-02-16" },
                "end": { "date": "2026-02-17" }
            })))
            .with_status(200)
            .with_body(
                serde_json::json!({
                    "id": "created-1",
                    "summary": "Laundry",
                    "start": { "date": "2026-02-16" },
                    "end": { "date": "2026-02-17" }
                })
                .to_string(),
            )
            .create_async()
            .await;

        let created = gateway(&server)
            .insert("Laundry", window().day())
            .await
            .expect("insert entry");

        mock.assert_async().await;
        assert_eq!(created.id, "created-1");
        assert!(created.is_all_day());
    }

    #[tokio::test]
    async fn failed_delete_is_a_remote_error() {
        let mut server = Server::new_async().await;
        server
            .mock("DELETE", "/calendars/primary/events/evt-9")
            .with_status(410)
            .with_body("gone")
            .create_async()
            .await;

        let entry = Entry::all_day("evt-9", "Old", window().day());
        let result = gateway(&server).delete(&entry).await;

        match result {
            Err(InfraError::Remote(message)) => assert!(message.contains("410")),
            other => panic!("expected remote error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn in_memory_list_only_returns_entries_overlapping_the_day() {
        let today = window().day();
        let yesterday = today.pred_opt().expect("previous day");
        let gateway = InMemoryCalendarGateway::with_entries(vec![
            Entry::all_day("a", "Today", today),
            Entry::all_day("b", "Yesterday", yesterday),
        ]);

        let listed = gateway.list(&window()).await.expect("list");
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, "a");
    }
}
