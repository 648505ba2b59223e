//! Remote calendar records as the Calendar v3 API sends and accepts them.
//!
//! [`RemoteEvent`] keeps the wire field names and leaves start/end as
//! strings; [`normalize_event`](crate::normalize_event) turns it into a
//! [`DisplayEvent`](calbridge_core::DisplayEvent). [`EventDraft`] is the
//! request body for create and update.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ProviderError, ProviderResult};

/// Start or end of an event.
///
/// Timed events carry `dateTime`; all-day events carry only `date`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDateTime {
    /// Bare `YYYY-MM-DD` date for all-day events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    /// RFC3339 instant for timed events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_time: Option<String>,
    /// IANA timezone the event was created in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
}

impl EventDateTime {
    /// A timed start or end.
    pub fn instant(dt: DateTime<Utc>) -> Self {
        Self {
            date_time: Some(dt.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)),
            ..Self::default()
        }
    }

    /// An all-day start or end.
    pub fn all_day(date: NaiveDate) -> Self {
        Self {
            date: Some(date.format("%Y-%m-%d").to_string()),
            ..Self::default()
        }
    }

    /// Returns true when this time has a time-of-day component.
    pub fn has_time(&self) -> bool {
        self.date_time.is_some()
    }

    /// The value as received: the instant if present, otherwise the date.
    pub fn value(&self) -> Option<&str> {
        self.date_time.as_deref().or(self.date.as_deref())
    }
}

/// An event as returned by the events endpoints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteEvent {
    /// Event identifier.
    #[serde(default)]
    pub id: String,
    /// Title; may be missing for events the user cannot see in full.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Start of the event.
    #[serde(default)]
    pub start: EventDateTime,
    /// End of the event.
    #[serde(default)]
    pub end: EventDateTime,
    /// Link to the event in the Google Calendar web UI.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html_link: Option<String>,
    /// Description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Location text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Event color key, `"1"` through `"11"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color_id: Option<String>,
    /// Fields not modelled here, kept so a read-modify-write round trip
    /// does not drop them.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A calendar from the calendar list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarRef {
    /// The calendar ID.
    pub id: String,
    /// The calendar name.
    #[serde(default)]
    pub summary: String,
    /// The calendar description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Whether this is the user's primary calendar.
    #[serde(default)]
    pub primary: bool,
    /// The calendar timezone.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
    /// Background color.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
    /// Foreground color.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreground_color: Option<String>,
    /// `owner`, `writer`, `reader` or `freeBusyReader`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_role: Option<String>,
}

impl CalendarRef {
    /// Whether the signed-in user may create or change events here.
    pub fn is_writable(&self) -> bool {
        matches!(self.access_role.as_deref(), Some("owner") | Some("writer"))
    }
}

/// Request body for creating or replacing an event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDraft {
    /// Title.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Location text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Start of the event.
    pub start: EventDateTime,
    /// End of the event.
    pub end: EventDateTime,
    /// Color key, `"1"` through `"11"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color_id: Option<String>,
}

impl EventDraft {
    /// Creates a draft spanning `start` to `end`.
    pub fn new(start: EventDateTime, end: EventDateTime) -> Self {
        Self {
            start,
            end,
            ..Self::default()
        }
    }

    /// Sets the title.
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    /// Sets the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the location.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Sets the color key.
    pub fn with_color_id(mut self, color_id: impl Into<String>) -> Self {
        self.color_id = Some(color_id.into());
        self
    }

    /// Checks the draft before it is sent.
    ///
    /// Start and end must both be all-day or both be timed, and the end may
    /// not precede the start.
    pub fn validate(&self) -> ProviderResult<()> {
        validate_span(&self.start, &self.end)
    }
}

/// Changes to an existing event; `None` keeps the current value.
///
/// Applied to an event fetched with
/// [`get_event`](crate::google::CalendarGateway::get_event), so fields the
/// patch does not touch, including those in [`RemoteEvent::extra`], are sent
/// back unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventPatch {
    /// New title.
    pub summary: Option<String>,
    /// New description.
    pub description: Option<String>,
    /// New location.
    pub location: Option<String>,
    /// New start.
    pub start: Option<EventDateTime>,
    /// New end.
    pub end: Option<EventDateTime>,
    /// New color key.
    pub color_id: Option<String>,
}

impl EventPatch {
    /// True if the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Overlays the patch onto `event` and checks the resulting times.
    ///
    /// `event` is left untouched when the result would be invalid.
    pub fn apply(self, event: &mut RemoteEvent) -> ProviderResult<()> {
        let start = self.start.unwrap_or_else(|| event.start.clone());
        let end = self.end.unwrap_or_else(|| event.end.clone());
        validate_span(&start, &end)?;

        event.start = start;
        event.end = end;
        if let Some(summary) = self.summary {
            event.summary = Some(summary);
        }
        if let Some(description) = self.description {
            event.description = Some(description);
        }
        if let Some(location) = self.location {
            event.location = Some(location);
        }
        if let Some(color_id) = self.color_id {
            event.color_id = Some(color_id);
        }
        Ok(())
    }
}

fn validate_span(start: &EventDateTime, end: &EventDateTime) -> ProviderResult<()> {
    let (Some(start_value), Some(end_value)) = (start.value(), end.value()) else {
        return Err(ProviderError::invalid_request(
            "event start and end are required",
        ));
    };

    if start.has_time() != end.has_time() {
        return Err(ProviderError::invalid_request(
            "event start and end must both be all-day or both be timed",
        ));
    }

    let parse = |value: &str| {
        calbridge_core::EventTime::parse(value).ok_or_else(|| {
            ProviderError::invalid_request(format!("unparseable event time: {}", value))
        })
    };
    if parse(end_value)? < parse(start_value)? {
        return Err(ProviderError::invalid_request(
            "event end precedes its start",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parse_timed_event() {
        let json = r#"{
            "id": "event1",
            "summary": "Test Meeting",
            "start": {"dateTime": "2024-03-15T10:00:00Z", "timeZone": "Europe/Paris"},
            "end": {"dateTime": "2024-03-15T11:00:00Z"},
            "htmlLink": "https://www.google.com/calendar/event?eid=abc",
            "colorId": "5",
            "status": "confirmed"
        }"#;

        let event: RemoteEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.summary.as_deref(), Some("Test Meeting"));
        assert!(event.start.has_time());
        assert_eq!(event.start.time_zone.as_deref(), Some("Europe/Paris"));
        assert_eq!(event.color_id.as_deref(), Some("5"));
        assert_eq!(event.extra.get("status"), Some(&Value::from("confirmed")));
    }

    #[test]
    fn parse_all_day_event() {
        let json = r#"{
            "id": "event1",
            "start": {"date": "2024-03-15"},
            "end": {"date": "2024-03-16"}
        }"#;

        let event: RemoteEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.start.value(), Some("2024-03-15"));
        assert!(!event.start.has_time());
        assert!(event.summary.is_none());
    }

    #[test]
    fn unknown_fields_survive_round_trip() {
        let json = r#"{
            "id": "event1",
            "start": {"date": "2024-03-15"},
            "end": {"date": "2024-03-16"},
            "reminders": {"useDefault": true}
        }"#;

        let event: RemoteEvent = serde_json::from_str(json).unwrap();
        let back = serde_json::to_value(&event).unwrap();
        assert_eq!(back["reminders"]["useDefault"], Value::Bool(true));
    }

    #[test]
    fn parse_calendar_list_entry() {
        let json = r##"{
            "id": "work@example.com",
            "summary": "Work Calendar",
            "accessRole": "reader",
            "backgroundColor": "#9fe1e7"
        }"##;

        let cal: CalendarRef = serde_json::from_str(json).unwrap();
        assert!(!cal.primary);
        assert!(!cal.is_writable());
        assert_eq!(cal.background_color.as_deref(), Some("#9fe1e7"));
    }

    #[test]
    fn draft_serializes_wire_names() {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        let draft = EventDraft::new(EventDateTime::instant(start), EventDateTime::instant(end))
            .with_summary("Review")
            .with_color_id("11");

        let value = serde_json::to_value(&draft).unwrap();
        assert_eq!(value["summary"], "Review");
        assert_eq!(value["colorId"], "11");
        assert_eq!(value["start"]["dateTime"], "2024-05-01T09:00:00Z");
        assert!(value.get("description").is_none());
        assert!(value["start"].get("date").is_none());
    }

    #[test]
    fn draft_validation() {
        let day = |d| EventDateTime::all_day(NaiveDate::from_ymd_opt(2024, 5, d).unwrap());
        let at = |h| EventDateTime::instant(Utc.with_ymd_and_hms(2024, 5, 1, h, 0, 0).unwrap());

        assert!(EventDraft::new(day(1), day(2)).validate().is_ok());
        assert!(EventDraft::new(at(9), at(10)).validate().is_ok());

        let err = EventDraft::new(day(2), day(1)).validate().unwrap_err();
        assert_eq!(err.code(), crate::ProviderErrorCode::InvalidRequest);

        let err = EventDraft::new(day(1), at(10)).validate().unwrap_err();
        assert!(err.message().contains("both"));

        let err = EventDraft::new(EventDateTime::default(), at(10))
            .validate()
            .unwrap_err();
        assert!(err.message().contains("required"));
    }

    fn stored_event() -> RemoteEvent {
        serde_json::from_value(serde_json::json!({
            "id": "evt1",
            "summary": "Planning",
            "description": "Agenda in the doc",
            "location": "Room 2",
            "colorId": "5",
            "start": {"dateTime": "2024-05-01T09:00:00Z", "timeZone": "Europe/Paris"},
            "end": {"dateTime": "2024-05-01T10:00:00Z", "timeZone": "Europe/Paris"},
            "attendees": [{"email": "bob@example.com"}],
            "recurrence": ["RRULE:FREQ=WEEKLY"]
        }))
        .unwrap()
    }

    #[test]
    fn patch_keeps_untouched_fields() {
        let mut event = stored_event();
        let patch = EventPatch {
            summary: Some("Planning (moved)".to_string()),
            ..EventPatch::default()
        };
        patch.apply(&mut event).unwrap();

        assert_eq!(event.summary.as_deref(), Some("Planning (moved)"));
        assert_eq!(event.description.as_deref(), Some("Agenda in the doc"));
        assert_eq!(event.location.as_deref(), Some("Room 2"));
        assert_eq!(event.color_id.as_deref(), Some("5"));
        assert_eq!(event.start.time_zone.as_deref(), Some("Europe/Paris"));
        assert!(event.extra.contains_key("attendees"));
        assert!(event.extra.contains_key("recurrence"));
    }

    #[test]
    fn patch_moves_times() {
        let mut event = stored_event();
        let at = |h| EventDateTime::instant(Utc.with_ymd_and_hms(2024, 5, 1, h, 0, 0).unwrap());
        EventPatch {
            start: Some(at(14)),
            end: Some(at(15)),
            ..EventPatch::default()
        }
        .apply(&mut event)
        .unwrap();

        assert_eq!(event.start.date_time.as_deref(), Some("2024-05-01T14:00:00Z"));
        assert_eq!(event.end.date_time.as_deref(), Some("2024-05-01T15:00:00Z"));
    }

    #[test]
    fn invalid_patch_leaves_event_alone() {
        let mut event = stored_event();
        let before = event.clone();
        let at = |h| EventDateTime::instant(Utc.with_ymd_and_hms(2024, 5, 1, h, 0, 0).unwrap());

        let err = EventPatch {
            summary: Some("Too late".to_string()),
            start: Some(at(11)),
            ..EventPatch::default()
        }
        .apply(&mut event)
        .unwrap_err();
        assert!(err.message().contains("precedes"));
        assert_eq!(event, before);

        let day = EventDateTime::all_day(NaiveDate::from_ymd_opt(2024, 5, 1).unwrap());
        let err = EventPatch {
            start: Some(day),
            ..EventPatch::default()
        }
        .apply(&mut event)
        .unwrap_err();
        assert!(err.message().contains("both"));
    }

    #[test]
    fn empty_patch() {
        assert!(EventPatch::default().is_empty());
        let patch = EventPatch {
            location: Some("Room 3".to_string()),
            ..EventPatch::default()
        };
        assert!(!patch.is_empty());
    }
}
