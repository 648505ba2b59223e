//! Event listing and mutation.

use std::fmt::Display;

use calbridge_core::{DisplayEvent, EventTime, TimeWindow};
use calbridge_providers::{
    EventDateTime, EventDraft, EventPatch, normalize_event, normalize_events,
};
use chrono::{DateTime, Local, TimeZone, Utc};

use super::Context;
use crate::cli::{EventChanges, EventFields, EventsArgs};
use crate::error::{ClientError, ClientResult};

/// Lists events as a table or as JSON.
///
/// Without a window flag, lists upcoming events from now.
pub async fn list(ctx: &Context, args: EventsArgs) -> ClientResult<()> {
    let gateway = ctx.gateway()?;
    let calendar_id = ctx.calendar_id(args.calendar);

    let raw_events = if args.today {
        gateway.list_today_events(&calendar_id).await?
    } else if args.month {
        gateway.list_this_month_events(&calendar_id).await?
    } else {
        match query_range(args.from.as_deref(), args.to.as_deref(), Utc::now())? {
            QueryRange::Window(window) => gateway.list_events_in(&calendar_id, &window).await?,
            QueryRange::Open { from, to } => gateway.list_events(&calendar_id, from, to).await?,
        }
    };

    let events = normalize_events(&raw_events);
    if args.json {
        print_json(&events)?;
    } else if events.is_empty() {
        println!("No events.");
    } else {
        for event in &events {
            println!("{}", format_event_line(event, &Local));
        }
    }
    Ok(())
}

/// Creates an event.
pub async fn create(ctx: &Context, fields: EventFields) -> ClientResult<()> {
    let gateway = ctx.gateway()?;
    let calendar_id = ctx.calendar_id(fields.calendar.clone());
    let json = fields.json;
    let draft = build_draft(fields)?;

    let created = normalize_event(&gateway.create_event(&calendar_id, &draft).await?);
    report(&created, "Created", json)
}

/// Changes the given fields of an event and keeps everything else.
pub async fn update(ctx: &Context, id: String, changes: EventChanges) -> ClientResult<()> {
    let gateway = ctx.gateway()?;
    let calendar_id = ctx.calendar_id(changes.calendar.clone());
    let json = changes.json;
    let patch = build_patch(changes)?;

    let updated = normalize_event(&gateway.edit_event(&calendar_id, &id, patch).await?);
    report(&updated, "Updated", json)
}

/// Deletes an event.
pub async fn delete(ctx: &Context, id: String, calendar: Option<String>) -> ClientResult<()> {
    let gateway = ctx.gateway()?;
    let calendar_id = ctx.calendar_id(calendar);
    gateway.delete_event(&calendar_id, &id).await?;
    println!("Deleted {}.", id);
    Ok(())
}

fn report(event: &DisplayEvent, verb: &str, json: bool) -> ClientResult<()> {
    if json {
        print_json(event)
    } else {
        println!("{} {}", verb, format_event_line(event, &Local));
        Ok(())
    }
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> ClientResult<()> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| ClientError::InvalidInput(format!("failed to serialize output: {}", e)))?;
    println!("{}", json);
    Ok(())
}

/// Parses a `--from`/`--to` bound. A bare date means its UTC midnight.
pub fn parse_bound(value: &str) -> ClientResult<DateTime<Utc>> {
    EventTime::parse(value)
        .map(|t| t.to_utc_datetime())
        .ok_or_else(|| {
            ClientError::InvalidInput(format!(
                "'{}' is neither an RFC3339 time nor a YYYY-MM-DD date",
                value
            ))
        })
}

/// What `events` asks the API for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryRange {
    /// Both bounds given.
    Window(TimeWindow),
    /// At most one bound given.
    Open {
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    },
}

/// Resolves `--from`/`--to`. Without either, lists from `now` onwards.
pub fn query_range(
    from: Option<&str>,
    to: Option<&str>,
    now: DateTime<Utc>,
) -> ClientResult<QueryRange> {
    let from = from.map(parse_bound).transpose()?;
    let to = to.map(parse_bound).transpose()?;
    match (from, to) {
        (Some(start), Some(end)) => TimeWindow::between(start, end)
            .map(QueryRange::Window)
            .ok_or_else(|| ClientError::InvalidInput("--to precedes --from".to_string())),
        (None, None) => Ok(QueryRange::Open {
            from: Some(now),
            to: None,
        }),
        (from, to) => Ok(QueryRange::Open { from, to }),
    }
}

/// Parses `--start`/`--end`. Bare dates, or any value with `--all-day`,
/// become all-day times.
pub fn parse_event_time(value: &str, all_day: bool) -> ClientResult<EventDateTime> {
    match EventTime::parse(value) {
        Some(EventTime::AllDay(date)) => Ok(EventDateTime::all_day(date)),
        Some(EventTime::DateTime(dt)) if all_day => Ok(EventDateTime::all_day(dt.date_naive())),
        Some(EventTime::DateTime(dt)) => Ok(EventDateTime::instant(dt)),
        None => Err(ClientError::InvalidInput(format!(
            "'{}' is neither an RFC3339 time nor a YYYY-MM-DD date",
            value
        ))),
    }
}

/// Builds and validates the request body from command-line fields.
pub fn build_draft(fields: EventFields) -> ClientResult<EventDraft> {
    let start = parse_event_time(&fields.start, fields.all_day)?;
    let end = parse_event_time(&fields.end, fields.all_day)?;

    let mut draft = EventDraft::new(start, end);
    if let Some(title) = fields.title {
        draft = draft.with_summary(title);
    }
    if let Some(description) = fields.description {
        draft = draft.with_description(description);
    }
    if let Some(location) = fields.location {
        draft = draft.with_location(location);
    }
    if let Some(color) = fields.color {
        draft = draft.with_color_id(color);
    }

    draft.validate()?;
    Ok(draft)
}

/// Builds the changes for `event update`.
pub fn build_patch(changes: EventChanges) -> ClientResult<EventPatch> {
    if changes.all_day && changes.start.is_none() && changes.end.is_none() {
        return Err(ClientError::InvalidInput(
            "--all-day needs --start or --end".to_string(),
        ));
    }

    let patch = EventPatch {
        summary: changes.title,
        description: changes.description,
        location: changes.location,
        start: changes
            .start
            .as_deref()
            .map(|v| parse_event_time(v, changes.all_day))
            .transpose()?,
        end: changes
            .end
            .as_deref()
            .map(|v| parse_event_time(v, changes.all_day))
            .transpose()?,
        color_id: changes.color,
    };
    if patch.is_empty() {
        return Err(ClientError::InvalidInput(
            "nothing to change; give at least one field".to_string(),
        ));
    }
    Ok(patch)
}

/// One table row: start, end, title and id. Timed events are shown in `tz`.
pub fn format_event_line<Tz>(event: &DisplayEvent, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let when = match (event.start_time(), event.end_time()) {
        (Some(EventTime::AllDay(start)), _) => format!("{} all-day", start.format("%Y-%m-%d")),
        (Some(EventTime::DateTime(start)), end) => {
            let end = match end {
                Some(EventTime::DateTime(end)) => end.with_timezone(tz).format("%H:%M").to_string(),
                _ => "--:--".to_string(),
            };
            format!("{}-{}", start.with_timezone(tz).format("%Y-%m-%d %H:%M"), end)
        }
        (None, _) => "(no start)".to_string(),
    };
    let when = format!("{:<22}", when);
    format!("{}  {}  [{}]", when, event.title, event.id)
}
