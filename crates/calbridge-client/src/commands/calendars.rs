//! Calendar listing.

use calbridge_providers::CalendarRef;

use super::Context;
use crate::error::ClientResult;

/// Lists the user's calendars, one per line.
pub async fn list(ctx: &Context) -> ClientResult<()> {
    let calendars = ctx.gateway()?.list_calendars().await?;
    if calendars.is_empty() {
        println!("No calendars.");
        return Ok(());
    }
    for calendar in &calendars {
        println!("{}", format_calendar_line(calendar));
    }
    Ok(())
}

/// `* id  summary  (role)`, with `*` marking the primary calendar.
pub fn format_calendar_line(calendar: &CalendarRef) -> String {
    let marker = if calendar.primary { '*' } else { ' ' };
    let role = calendar.access_role.as_deref().unwrap_or("unknown");
    format!("{} {}  {}  ({})", marker, calendar.id, calendar.summary, role)
}
