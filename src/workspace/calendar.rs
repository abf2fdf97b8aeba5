//! Calendar API operations.

use serde::Deserialize;
use serde_json::json;

use crate::config::endpoints::CALENDAR_BASE_URL;
use crate::error::Result;
use crate::workspace::client::WorkspaceClient;

/// A calendar visible to the identity
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEntry {
    pub id: String,

    #[serde(default)]
    pub summary: Option<String>,

    #[serde(default)]
    pub primary: bool,
}

#[derive(Debug, Deserialize)]
struct CalendarList {
    #[serde(default)]
    items: Vec<CalendarEntry>,
}

/// A calendar event
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: String,

    #[serde(default)]
    pub summary: Option<String>,

    #[serde(default)]
    pub start: Option<EventTime>,

    #[serde(default)]
    pub end: Option<EventTime>,

    #[serde(default)]
    pub html_link: Option<String>,
}

/// Either a timed or an all-day event boundary
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventTime {
    #[serde(default)]
    pub date_time: Option<String>,

    #[serde(default)]
    pub date: Option<String>,
}

impl EventTime {
    pub fn display(&self) -> &str {
        self.date_time
            .as_deref()
            .or(self.date.as_deref())
            .unwrap_or("unknown")
    }
}

#[derive(Debug, Deserialize)]
struct EventList {
    #[serde(default)]
    items: Vec<Event>,
}

/// Parameters for creating an event
#[derive(Debug, Clone)]
pub struct CreateEventParams {
    pub summary: String,
    pub description: Option<String>,
    /// RFC 3339 timestamp, or `YYYY-MM-DD` for an all-day event
    pub start: String,
    pub end: String,
    pub attendees: Vec<String>,
}

impl WorkspaceClient {
    /// List calendars the identity can see.
    pub async fn list_calendars(&self, identity: &str) -> Result<Vec<CalendarEntry>> {
        let url = format!("{}/users/me/calendarList", CALENDAR_BASE_URL);
        let list: CalendarList = self.get_json(identity, &url).await?;
        Ok(list.items)
    }

    /// List upcoming events on a calendar, expanded and ordered by start.
    pub async fn get_calendar_events(
        &self,
        identity: &str,
        calendar_id: &str,
        time_min: Option<&str>,
        time_max: Option<&str>,
        max_results: u32,
    ) -> Result<Vec<Event>> {
        let mut url = format!(
            "{}/calendars/{}/events?singleEvents=true&orderBy=startTime&maxResults={}",
            CALENDAR_BASE_URL,
            urlencoding::encode(calendar_id),
            max_results
        );
        if let Some(time_min) = time_min {
            url.push_str("&timeMin=");
            url.push_str(&urlencoding::encode(time_min));
        }
        if let Some(time_max) = time_max {
            url.push_str("&timeMax=");
            url.push_str(&urlencoding::encode(time_max));
        }
        let list: EventList = self.get_json(identity, &url).await?;
        Ok(list.items)
    }

    /// Create an event.
    pub async fn create_calendar_event(
        &self,
        identity: &str,
        calendar_id: &str,
        params: CreateEventParams,
    ) -> Result<Event> {
        let mut body = json!({
            "summary": params.summary,
            "start": event_time(&params.start),
            "end": event_time(&params.end),
        });
        if let Some(description) = &params.description {
            body["description"] = json!(description);
        }
        if !params.attendees.is_empty() {
            body["attendees"] = json!(params
                .attendees
                .iter()
                .map(|email| json!({ "email": email }))
                .collect::<Vec<_>>());
        }

        let url = format!(
            "{}/calendars/{}/events",
            CALENDAR_BASE_URL,
            urlencoding::encode(calendar_id)
        );
        self.post_json(identity, &url, &body).await
    }

    /// Delete an event.
    pub async fn delete_calendar_event(
        &self,
        identity: &str,
        calendar_id: &str,
        event_id: &str,
    ) -> Result<()> {
        let url = format!(
            "{}/calendars/{}/events/{}",
            CALENDAR_BASE_URL,
            urlencoding::encode(calendar_id),
            event_id
        );
        self.delete(identity, &url).await
    }
}

/// A timestamp with a `T` is a timed boundary; a bare date is all-day.
fn event_time(value: &str) -> serde_json::Value {
    if value.contains('T') {
        json!({ "dateTime": value })
    } else {
        json!({ "date": value })
    }
}
