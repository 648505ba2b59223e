//! Google Calendar v3 REST client.
//!
//! [`CalendarGateway`] holds no session of its own. The integrating code
//! copies the current token in with
//! [`set_access_token`](CalendarGateway::set_access_token); every call reads
//! that token before anything is sent and fails without network activity if
//! none is set.

use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use calbridge_core::TimeWindow;
use chrono::{DateTime, Local, SecondsFormat, TimeZone, Utc};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ProviderError, ProviderResult};
use crate::raw_event::{CalendarRef, EventPatch, RemoteEvent};

/// Base URL for Google Calendar API v3.
pub const CALENDAR_API_BASE: &str = "https://www.googleapis.com/calendar/v3";

/// Page size requested from the events endpoint.
pub const MAX_RESULTS: u32 = 50;

/// Google Calendar API client.
#[derive(Debug)]
pub struct CalendarGateway {
    http_client: reqwest::Client,
    base_url: String,
    access_token: RwLock<Option<String>>,
}

impl CalendarGateway {
    /// Creates a gateway with the given request timeout and no token.
    pub fn new(timeout: Duration) -> ProviderResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                ProviderError::configuration(format!("failed to create HTTP client: {}", e))
                    .with_source(e)
            })?;

        Ok(Self {
            http_client,
            base_url: CALENDAR_API_BASE.to_string(),
            access_token: RwLock::new(None),
        })
    }

    /// Points the gateway at a different API root.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Sets the token used for subsequent calls.
    pub fn set_access_token(&self, token: impl Into<String>) {
        *self
            .access_token
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(token.into());
    }

    /// True if a token is set.
    pub fn has_access_token(&self) -> bool {
        self.access_token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Lists the calendars on the user's calendar list.
    pub async fn list_calendars(&self) -> ProviderResult<Vec<CalendarRef>> {
        let request = self.request(Method::GET, "/users/me/calendarList")?;
        let list: CalendarListResponse = decode(self.send(request).await?).await?;
        debug!("fetched {} calendars", list.items.len());
        Ok(list.items)
    }

    /// Lists events, expanded and ordered by start time.
    ///
    /// `time_min` and `time_max` bound the query when given.
    pub async fn list_events(
        &self,
        calendar_id: &str,
        time_min: Option<DateTime<Utc>>,
        time_max: Option<DateTime<Utc>>,
    ) -> ProviderResult<Vec<RemoteEvent>> {
        let mut query = vec![
            ("singleEvents", "true".to_string()),
            ("orderBy", "startTime".to_string()),
            ("maxResults", MAX_RESULTS.to_string()),
        ];
        if let Some(min) = time_min {
            query.push(("timeMin", min.to_rfc3339_opts(SecondsFormat::Secs, true)));
        }
        if let Some(max) = time_max {
            query.push(("timeMax", max.to_rfc3339_opts(SecondsFormat::Secs, true)));
        }

        let request = self
            .request(Method::GET, &events_path(calendar_id))?
            .query(&query);
        let list: EventListResponse = decode(self.send(request).await?).await?;

        debug!(
            "fetched {} events from calendar {}",
            list.items.len(),
            calendar_id
        );
        Ok(list.items)
    }

    /// Lists events in `window`.
    pub async fn list_events_in(
        &self,
        calendar_id: &str,
        window: &TimeWindow,
    ) -> ProviderResult<Vec<RemoteEvent>> {
        self.list_events(calendar_id, Some(window.start), Some(window.end))
            .await
    }

    /// Lists today's events in the local timezone.
    pub async fn list_today_events(&self, calendar_id: &str) -> ProviderResult<Vec<RemoteEvent>> {
        self.list_today_events_at(calendar_id, &Local::now()).await
    }

    /// Lists events on the calendar day containing `now`, in `now`'s timezone.
    pub async fn list_today_events_at<Tz: TimeZone>(
        &self,
        calendar_id: &str,
        now: &DateTime<Tz>,
    ) -> ProviderResult<Vec<RemoteEvent>> {
        let window = TimeWindow::local_day(now);
        self.list_events_in(calendar_id, &window).await
    }

    /// Lists this month's events in the local timezone.
    pub async fn list_this_month_events(
        &self,
        calendar_id: &str,
    ) -> ProviderResult<Vec<RemoteEvent>> {
        self.list_this_month_events_at(calendar_id, &Local::now())
            .await
    }

    /// Lists events in the calendar month containing `now`, in `now`'s
    /// timezone.
    pub async fn list_this_month_events_at<Tz: TimeZone>(
        &self,
        calendar_id: &str,
        now: &DateTime<Tz>,
    ) -> ProviderResult<Vec<RemoteEvent>> {
        let window = TimeWindow::local_month(now);
        self.list_events_in(calendar_id, &window).await
    }

    /// Creates an event and returns it as stored.
    pub async fn create_event<T: Serialize + ?Sized>(
        &self,
        calendar_id: &str,
        event: &T,
    ) -> ProviderResult<RemoteEvent> {
        let request = self
            .request(Method::POST, &events_path(calendar_id))?
            .json(event);
        let created: RemoteEvent = decode(self.send(request).await?).await?;
        debug!("created event {} in calendar {}", created.id, calendar_id);
        Ok(created)
    }

    /// Replaces an event and returns it as stored.
    pub async fn update_event<T: Serialize + ?Sized>(
        &self,
        calendar_id: &str,
        event_id: &str,
        event: &T,
    ) -> ProviderResult<RemoteEvent> {
        let request = self
            .request(Method::PUT, &event_path(calendar_id, event_id))?
            .json(event);
        let updated: RemoteEvent = decode(self.send(request).await?).await?;
        debug!("updated event {} in calendar {}", event_id, calendar_id);
        Ok(updated)
    }

    /// Fetches one event.
    pub async fn get_event(&self, calendar_id: &str, event_id: &str) -> ProviderResult<RemoteEvent> {
        let request = self.request(Method::GET, &event_path(calendar_id, event_id))?;
        decode(self.send(request).await?).await
    }

    /// Reads an event, applies `patch` and writes the whole event back.
    ///
    /// Fields the patch leaves alone keep their stored values.
    pub async fn edit_event(
        &self,
        calendar_id: &str,
        event_id: &str,
        patch: EventPatch,
    ) -> ProviderResult<RemoteEvent> {
        let mut event = self.get_event(calendar_id, event_id).await?;
        patch.apply(&mut event)?;
        self.update_event(calendar_id, event_id, &event).await
    }

    /// Deletes an event.
    ///
    /// Deleting an event that does not exist is a remote error (404).
    pub async fn delete_event(&self, calendar_id: &str, event_id: &str) -> ProviderResult<bool> {
        let request = self.request(Method::DELETE, &event_path(calendar_id, event_id))?;
        self.send(request).await?;
        debug!("deleted event {} from calendar {}", event_id, calendar_id);
        Ok(true)
    }

    /// Builds an authorized request, or fails if no token is set.
    fn request(&self, method: Method, path: &str) -> ProviderResult<RequestBuilder> {
        let token = self
            .access_token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(|| {
                ProviderError::authentication("no access token set")
                    .with_provider("google")
            })?;

        Ok(self
            .http_client
            .request(method, format!("{}{}", self.base_url, path))
            .bearer_auth(token)
            .header(CONTENT_TYPE, "application/json"))
    }

    /// Sends a request and turns transport failures and non-2xx statuses
    /// into errors.
    async fn send(&self, request: RequestBuilder) -> ProviderResult<Response> {
        let response = request.send().await.map_err(|e| {
            let message = if e.is_timeout() {
                "request timeout".to_string()
            } else if e.is_connect() {
                format!("connection failed: {}", e)
            } else {
                format!("request failed: {}", e)
            };
            ProviderError::network(message)
                .with_provider("google")
                .with_source(e)
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiErrorResponse>(&body)
            .ok()
            .and_then(|e| e.error.message)
            .unwrap_or_else(|| format!("API error ({}): {}", status, body));
        Err(ProviderError::remote(status.as_u16(), message).with_provider("google"))
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> ProviderResult<T> {
    let body = response.text().await.map_err(|e| {
        ProviderError::network(format!("failed to read response: {}", e)).with_source(e)
    })?;
    serde_json::from_str(&body).map_err(|e| {
        ProviderError::invalid_response(format!("failed to parse response: {}", e))
            .with_provider("google")
            .with_source(e)
    })
}

fn events_path(calendar_id: &str) -> String {
    format!("/calendars/{}/events", urlencoding::encode(calendar_id))
}

fn event_path(calendar_id: &str, event_id: &str) -> String {
    format!(
        "/calendars/{}/events/{}",
        urlencoding::encode(calendar_id),
        urlencoding::encode(event_id)
    )
}

/// Response from the calendarList.list endpoint.
#[derive(Debug, Deserialize)]
struct CalendarListResponse {
    #[serde(default)]
    items: Vec<CalendarRef>,
}

/// Response from the events.list endpoint.
#[derive(Debug, Deserialize)]
struct EventListResponse {
    #[serde(default)]
    items: Vec<RemoteEvent>,
}

/// Error body returned by Google APIs.
#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderErrorCode;
    use crate::raw_event::{EventDateTime, EventDraft, EventPatch};
    use chrono::FixedOffset;
    use wiremock::matchers::{body_json, header, method, path, query_param, query_param_is_missing};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn gateway(server: &MockServer) -> CalendarGateway {
        let gateway = CalendarGateway::new(Duration::from_secs(5))
            .unwrap()
            .with_base_url(server.uri());
        gateway.set_access_token("ya29.token");
        gateway
    }

    fn event_json(id: &str) -> serde_json::Value {
        serde_json::json!({
            "id": id,
            "summary": "Planning",
            "start": {"dateTime": "2024-05-01T09:00:00Z"},
            "end": {"dateTime": "2024-05-01T10:00:00Z"},
            "colorId": "11"
        })
    }

    #[tokio::test]
    async fn calls_without_token_fail_without_network() {
        let server = MockServer::start().await;
        Mock::given(wiremock::matchers::any())
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let gateway = CalendarGateway::new(Duration::from_secs(5))
            .unwrap()
            .with_base_url(server.uri());
        assert!(!gateway.has_access_token());

        let draft = serde_json::json!({});
        let errors = [
            gateway.list_calendars().await.unwrap_err(),
            gateway.list_events("primary", None, None).await.unwrap_err(),
            gateway.create_event("primary", &draft).await.unwrap_err(),
            gateway.update_event("primary", "e1", &draft).await.unwrap_err(),
            gateway.delete_event("primary", "e1").await.unwrap_err(),
            gateway.get_event("primary", "e1").await.unwrap_err(),
        ];
        for err in errors {
            assert_eq!(err.code(), ProviderErrorCode::AuthenticationFailed);
        }
    }

    #[tokio::test]
    async fn list_calendars_sends_bearer_and_content_type() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/me/calendarList"))
            .and(header("authorization", "Bearer ya29.token"))
            .and(header("content-type", "application/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "items": [
                    {"id": "primary@example.com", "summary": "Ada", "primary": true, "accessRole": "owner"},
                    {"id": "holidays", "summary": "Holidays", "accessRole": "reader"}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let calendars = gateway(&server).await.list_calendars().await.unwrap();
        assert_eq!(calendars.len(), 2);
        assert!(calendars[0].primary);
        assert!(calendars[0].is_writable());
        assert!(!calendars[1].is_writable());
    }

    #[tokio::test]
    async fn missing_items_is_empty_list() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/me/calendarList"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "kind": "calendar#calendarList"
            })))
            .mount(&server)
            .await;

        let calendars = gateway(&server).await.list_calendars().await.unwrap();
        assert!(calendars.is_empty());
    }

    #[tokio::test]
    async fn list_events_sends_fixed_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/calendars/primary/events"))
            .and(query_param("singleEvents", "true"))
            .and(query_param("orderBy", "startTime"))
            .and(query_param("maxResults", "50"))
            .and(query_param_is_missing("timeMin"))
            .and(query_param_is_missing("timeMax"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "items": [event_json("e1"), event_json("e2")]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let events = gateway(&server)
            .await
            .list_events("primary", None, None)
            .await
            .unwrap();
        let ids: Vec<_> = events.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, ["e1", "e2"]);
    }

    #[tokio::test]
    async fn today_window_is_local_day_in_utc() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/calendars/primary/events"))
            .and(query_param("timeMin", "2024-04-30T22:00:00Z"))
            .and(query_param("timeMax", "2024-05-01T21:59:59Z"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"items": []})))
            .expect(1)
            .mount(&server)
            .await;

        let now = FixedOffset::east_opt(2 * 3600)
            .unwrap()
            .with_ymd_and_hms(2024, 5, 1, 15, 0, 0)
            .unwrap();
        let events = gateway(&server)
            .await
            .list_today_events_at("primary", &now)
            .await
            .unwrap();
        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn month_window_spans_whole_month() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/calendars/primary/events"))
            .and(query_param("timeMin", "2024-02-01T00:00:00Z"))
            .and(query_param("timeMax", "2024-02-29T23:59:59Z"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"items": []})))
            .expect(1)
            .mount(&server)
            .await;

        let now = Utc.with_ymd_and_hms(2024, 2, 14, 8, 30, 0).unwrap();
        gateway(&server)
            .await
            .list_this_month_events_at("primary", &now)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn calendar_and_event_ids_are_percent_encoded() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/calendars/team%40group.calendar.google.com/events/abc%2Fdef"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let deleted = gateway(&server)
            .await
            .delete_event("team@group.calendar.google.com", "abc/def")
            .await
            .unwrap();
        assert!(deleted);
    }

    #[tokio::test]
    async fn create_event_posts_draft() {
        let server = MockServer::start().await;
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        let draft = EventDraft::new(EventDateTime::instant(start), EventDateTime::instant(end))
            .with_summary("Planning")
            .with_color_id("11");

        Mock::given(method("POST"))
            .and(path("/calendars/primary/events"))
            .and(body_json(serde_json::json!({
                "summary": "Planning",
                "start": {"dateTime": "2024-05-01T09:00:00Z"},
                "end": {"dateTime": "2024-05-01T10:00:00Z"},
                "colorId": "11"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(event_json("new1")))
            .expect(1)
            .mount(&server)
            .await;

        let created = gateway(&server)
            .await
            .create_event("primary", &draft)
            .await
            .unwrap();
        assert_eq!(created.id, "new1");
        assert_eq!(created.color_id.as_deref(), Some("11"));
    }

    #[tokio::test]
    async fn update_event_puts_to_event_path() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/calendars/primary/events/e1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(event_json("e1")))
            .expect(1)
            .mount(&server)
            .await;

        let updated = gateway(&server)
            .await
            .update_event("primary", "e1", &serde_json::json!({"summary": "Planning"}))
            .await
            .unwrap();
        assert_eq!(updated.summary.as_deref(), Some("Planning"));
    }

    #[tokio::test]
    async fn create_rejected_keeps_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/calendars/primary/events"))
            .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({
                "error": {"code": 403, "message": "Insufficient Permission"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let err = gateway(&server)
            .await
            .create_event("primary", &serde_json::json!({"summary": "Planning"}))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::RemoteError);
        assert_eq!(err.status(), Some(403));
        assert_eq!(err.message(), "Insufficient Permission");
    }

    #[tokio::test]
    async fn update_rejected_keeps_status() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/calendars/primary/events/e1"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad body"))
            .expect(1)
            .mount(&server)
            .await;

        let err = gateway(&server)
            .await
            .update_event("primary", "e1", &serde_json::json!({}))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::RemoteError);
        assert_eq!(err.status(), Some(400));
        assert!(err.message().contains("bad body"));
    }

    #[tokio::test]
    async fn get_event_reads_event_path() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/calendars/primary/events/e1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(event_json("e1")))
            .expect(1)
            .mount(&server)
            .await;

        let event = gateway(&server).await.get_event("primary", "e1").await.unwrap();
        assert_eq!(event.id, "e1");
        assert_eq!(event.summary.as_deref(), Some("Planning"));
    }

    #[tokio::test]
    async fn edit_event_sends_back_untouched_fields() {
        let server = MockServer::start().await;
        let stored = serde_json::json!({
            "id": "e1",
            "etag": "\"3181161784712000\"",
            "summary": "Planning",
            "description": "Agenda in the doc",
            "location": "Room 2",
            "colorId": "5",
            "start": {"dateTime": "2024-05-01T09:00:00Z"},
            "end": {"dateTime": "2024-05-01T10:00:00Z"},
            "attendees": [{"email": "bob@example.com"}],
            "reminders": {"useDefault": false, "overrides": [{"method": "popup", "minutes": 5}]},
            "recurrence": ["RRULE:FREQ=WEEKLY"]
        });
        let mut expected = stored.clone();
        expected["summary"] = serde_json::json!("Planning (moved)");

        Mock::given(method("GET"))
            .and(path("/calendars/primary/events/e1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(stored))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/calendars/primary/events/e1"))
            .and(body_json(expected.clone()))
            .respond_with(ResponseTemplate::new(200).set_body_json(expected))
            .expect(1)
            .mount(&server)
            .await;

        let patch = EventPatch {
            summary: Some("Planning (moved)".to_string()),
            ..EventPatch::default()
        };
        let updated = gateway(&server)
            .await
            .edit_event("primary", "e1", patch)
            .await
            .unwrap();
        assert_eq!(updated.summary.as_deref(), Some("Planning (moved)"));
        assert_eq!(updated.location.as_deref(), Some("Room 2"));
        assert!(updated.extra.contains_key("attendees"));
    }

    #[tokio::test]
    async fn invalid_edit_is_not_sent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/calendars/primary/events/e1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(event_json("e1")))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let late = Utc.with_ymd_and_hms(2024, 5, 1, 11, 0, 0).unwrap();
        let patch = EventPatch {
            start: Some(EventDateTime::instant(late)),
            ..EventPatch::default()
        };
        let err = gateway(&server)
            .await
            .edit_event("primary", "e1", patch)
            .await
            .unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::InvalidRequest);
    }

    #[tokio::test]
    async fn delete_missing_event_is_remote_error() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/calendars/primary/events/gone"))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
                "error": {"code": 404, "message": "Not Found"}
            })))
            .mount(&server)
            .await;

        let err = gateway(&server)
            .await
            .delete_event("primary", "gone")
            .await
            .unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::RemoteError);
        assert_eq!(err.status(), Some(404));
        assert_eq!(err.message(), "Not Found");
    }

    #[tokio::test]
    async fn unauthorized_keeps_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401).set_body_string("expired"))
            .mount(&server)
            .await;

        let err = gateway(&server).await.list_calendars().await.unwrap_err();
        assert!(err.is_unauthorized());
        assert!(err.message().contains("expired"));
        assert_eq!(err.provider(), Some("google"));
    }

    #[tokio::test]
    async fn undecodable_body_is_invalid_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let err = gateway(&server)
            .await
            .list_events("primary", None, None)
            .await
            .unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::InvalidResponse);
    }

    #[tokio::test]
    async fn unreachable_server_is_network_error() {
        let gateway = CalendarGateway::new(Duration::from_secs(5))
            .unwrap()
            .with_base_url("http://127.0.0.1:1");
        gateway.set_access_token("ya29.token");

        let err = gateway.list_calendars().await.unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::NetworkError);
        assert!(std::error::Error::source(&err).is_some());
    }
}
