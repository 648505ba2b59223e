//! Display-ready event type.
//!
//! [`DisplayEvent`] is the one shape handed to calendar views, whatever the
//! remote record looked like. It serializes with the camelCase field names
//! calendar widgets expect (`allDay`, ...).

use serde::{Deserialize, Serialize};

use crate::time::EventTime;

/// A normalized calendar event ready for rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayEvent {
    /// Remote event identifier.
    pub id: String,
    /// Title; never empty.
    pub title: String,
    /// Start as received: an RFC3339 instant or a bare `YYYY-MM-DD` date.
    pub start: Option<String>,
    /// End as received, same forms as `start`.
    pub end: Option<String>,
    /// Link to the event in the provider's web UI.
    pub url: Option<String>,
    /// Free-form description.
    pub description: Option<String>,
    /// Location text.
    pub location: Option<String>,
    /// Resolved `#rrggbb` color.
    pub color: String,
    /// True when the start has no time-of-day component.
    pub all_day: bool,
}

impl DisplayEvent {
    /// Parses the start into an [`EventTime`], if it is well formed.
    pub fn start_time(&self) -> Option<EventTime> {
        self.start.as_deref().and_then(EventTime::parse)
    }

    /// Parses the end into an [`EventTime`], if it is well formed.
    pub fn end_time(&self) -> Option<EventTime> {
        self.end.as_deref().and_then(EventTime::parse)
    }
}
