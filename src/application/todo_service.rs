use crate::domain::models::{Entry, Tag};
use crate::domain::todo::{classify, first_match, TodoState};
use crate::domain::window::TimeWindow;
use crate::infrastructure::calendar_gateway::CalendarGateway;
use crate::infrastructure::error::InfraError;
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use log::info;
use std::fmt;
use std::sync::Arc;

/// Blocking yes/no question asked before a destructive change.
pub trait Prompter {
    /// Returns true only for an explicit affirmative answer.
    fn confirm(&mut self, prompt: &str) -> Result<bool, InfraError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Marked(String),
    Reopened(String),
    Removed(String),
    Kept(String),
    Created { name: String, day: NaiveDate },
    Normalized(String),
    NoMatch,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Marked(name) => write!(f, "done: {name}"),
            Self::Reopened(name) => write!(f, "reopened: {name}"),
            Self::Removed(name) => write!(f, "removed: {name}"),
            Self::Kept(name) => write!(f, "kept: {name}"),
            Self::Created { name, day } => write!(f, "added: {name} ({day})"),
            Self::Normalized(name) => write!(f, "all-day: {name}"),
            Self::NoMatch => write!(f, "no matching event"),
        }
    }
}

type NowProvider = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Todo operations for the day `offset` days away from today. Every call
/// fetches a fresh snapshot; nothing is cached between calls.
pub struct TodoService<G>
where
    G: CalendarGateway,
{
    gateway: G,
    zone: Tz,
    now_provider: NowProvider,
}

impl<G> TodoService<G>
where
    G: CalendarGateway,
{
    pub fn new(gateway: G, zone: Tz) -> Self {
        Self {
            gateway,
            zone,
            now_provider: Arc::new(Utc::now),
        }
    }

    pub fn with_now_provider(mut self, now_provider: NowProvider) -> Self {
        self.now_provider = now_provider;
        self
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn window(&self, offset: i64) -> TimeWindow {
        TimeWindow::for_offset(offset, (self.now_provider)(), self.zone)
    }

    pub async fn snapshot(&self, offset: i64) -> Result<TodoState, InfraError> {
        let window = self.window(offset);
        let entries = self.gateway.list(&window).await?;
        let state = classify(entries);
        info!(
            "event=list status=ok day={} done={} pending={}",
            window.day(),
            state.done.len(),
            state.pending.len()
        );
        Ok(state)
    }

    pub async fn mark(&self, offset: i64, needle: &str) -> Result<Outcome, InfraError> {
        let state = self.snapshot(offset).await?;
        let Some(entry) = state.find_pending(needle) else {
            return Ok(Outcome::NoMatch);
        };
        let mut entry = entry.clone();
        entry.tag = Tag::Done;
        self.gateway.update(&entry).await?;
        info!("event=mark status=ok id={}", entry.id);
        Ok(Outcome::Marked(entry.name().to_string()))
    }

    pub async fn unmark(&self, offset: i64, needle: &str) -> Result<Outcome, InfraError> {
        let state = self.snapshot(offset).await?;
        let Some(entry) = state.find_done(needle) else {
            return Ok(Outcome::NoMatch);
        };
        let mut entry = entry.clone();
        entry.tag = Tag::Absent;
        self.gateway.update(&entry).await?;
        info!("event=unmark status=ok id={}", entry.id);
        Ok(Outcome::Reopened(entry.name().to_string()))
    }

    pub async fn remove<P>(&self, offset: i64, needle: &str, prompter: &mut P) -> Result<Outcome, InfraError>
    where
        P: Prompter + ?Sized,
    {
        let state = self.snapshot(offset).await?;
        let Some(entry) = state.find_any(needle) else {
            return Ok(Outcome::NoMatch);
        };
        let name = entry.name().to_string();
        if !prompter.confirm(&format!("Delete {name}? (y/any) "))? {
            info!("event=remove status=declined id={}", entry.id);
            return Ok(Outcome::Kept(name));
        }
        self.gateway.delete(entry).await?;
        info!("event=remove status=ok id={}", entry.id);
        Ok(Outcome::Removed(name))
    }

    pub async fn make(&self, offset: i64, name: &str) -> Result<Outcome, InfraError> {
        let day = self.window(offset).day();
        let entry = self.gateway.insert(name, day).await?;
        info!("event=make status=ok id={} day={day}", entry.id);
        Ok(Outcome::Created {
            name: entry.name().to_string(),
            day,
        })
    }

    /// Turns the first timed entry of the day whose name matches into a
    /// whole-day entry so it shows up in the todo lists.
    pub async fn normalize_all_day(&self, offset: i64, needle: &str) -> Result<Outcome, InfraError> {
        let window = self.window(offset);
        let timed = self
            .gateway
            .list(&window)
            .await?
            .into_iter()
            .filter(|entry| !entry.is_all_day())
            .collect::<Vec<Entry>>();
        let Some(entry) = first_match(&timed, needle) else {
            return Ok(Outcome::NoMatch);
        };
        let entry = entry.clone().into_all_day();
        self.gateway.update(&entry).await?;
        info!("event=to_all_day status=ok id={}", entry.id);
        Ok(Outcome::Normalized(entry.name().to_string()))
    }
}
