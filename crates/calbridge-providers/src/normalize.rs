//! RemoteEvent to DisplayEvent conversion.
//!
//! Normalization is pure and total: every [`RemoteEvent`] maps to exactly
//! one [`DisplayEvent`], and the same input always yields the same output.

use calbridge_core::DisplayEvent;

use crate::raw_event::RemoteEvent;

/// Title used when the remote event has none.
pub const UNTITLED: &str = "(No title)";

/// Color used for events without a recognised color key.
pub const DEFAULT_EVENT_COLOR: &str = "#3788d8";

/// Google Calendar's event palette, keyed by `colorId`.
const EVENT_PALETTE: [(&str, &str); 11] = [
    ("1", "#a4bdfc"),
    ("2", "#7ae7bf"),
    ("3", "#dbadff"),
    ("4", "#ff887c"),
    ("5", "#fbd75b"),
    ("6", "#ffb878"),
    ("7", "#46d6db"),
    ("8", "#e1e1e1"),
    ("9", "#5484ed"),
    ("10", "#51b749"),
    ("11", "#dc2127"),
];

/// Resolves a remote color key to a hex color.
pub fn event_color(color_id: Option<&str>) -> &'static str {
    color_id
        .and_then(|id| {
            EVENT_PALETTE
                .iter()
                .find(|(key, _)| *key == id)
                .map(|(_, hex)| *hex)
        })
        .unwrap_or(DEFAULT_EVENT_COLOR)
}

/// Converts a [`RemoteEvent`] to a [`DisplayEvent`].
pub fn normalize_event(raw: &RemoteEvent) -> DisplayEvent {
    let title = match raw.summary.as_deref() {
        Some(summary) if !summary.is_empty() => summary.to_string(),
        _ => UNTITLED.to_string(),
    };

    DisplayEvent {
        id: raw.id.clone(),
        title,
        start: raw.start.value().map(String::from),
        end: raw.end.value().map(String::from),
        url: raw.html_link.clone(),
        description: raw.description.clone(),
        location: raw.location.clone(),
        color: event_color(raw.color_id.as_deref()).to_string(),
        all_day: !raw.start.has_time(),
    }
}

/// Normalizes a batch of events, preserving order.
pub fn normalize_events(raw_events: &[RemoteEvent]) -> Vec<DisplayEvent> {
    raw_events.iter().map(normalize_event).collect()
}
