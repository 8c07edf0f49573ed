//! Event lookups and formatting
//!
//! Turns raw provider data into the short markdown summaries the model quotes
//! back to users.

use std::sync::{Arc, OnceLock};

use chrono::{DateTime, Utc};
use regex::Regex;
use tracing::warn;

use crate::core::Result;
use crate::tools::events::client::{Event, EventsProvider};

/// Maximum number of events shown in a listing
const LIST_LIMIT: usize = 10;

/// Minimum similarity for a fuzzy name match
const MATCH_CUTOFF: f32 = 0.5;

/// High-level event queries used by the event tools
pub struct EventsService {
    provider: Arc<dyn EventsProvider>,
}

impl EventsService {
    pub fn new(provider: Arc<dyn EventsProvider>) -> Self {
        Self { provider }
    }

    /// Bulleted list of event names
    pub async fn list_events(&self) -> Result<String> {
        let events = self.provider.list_events().await?;
        Ok(format_listing("**Your Humanitix Events:**", &events, "No events found."))
    }

    /// Find the event whose name best matches `query`
    pub async fn find_event_by_name(&self, query: &str) -> Result<Option<Event>> {
        let events = self.provider.list_events().await?;
        Ok(best_match(query, &events).cloned())
    }

    /// Details for the best-matching event
    pub async fn event_details(&self, query: &str) -> Result<String> {
        match self.find_event_by_name(query).await? {
            Some(event) => Ok(format_event_details(&event)),
            None => Ok(format!("No event found matching '{}'.", query)),
        }
    }

    /// Capacity and remaining tickets for the best-matching event
    pub async fn ticket_status(&self, query: &str) -> Result<String> {
        let Some(event) = self.find_event_by_name(query).await? else {
            return Ok(format!("No event found matching '{}'.", query));
        };

        let sold = match self.provider.order_count(&event.id).await {
            Ok(count) => count,
            Err(e) => {
                warn!(event = %event.id, error = %e, "attendee count unavailable");
                None
            }
        };

        Ok(format_ticket_status(&event, sold))
    }

    /// Events whose name or description mention `query`
    pub async fn search_events(&self, query: &str) -> Result<String> {
        let needle = query.trim().to_lowercase();
        let matches: Vec<Event> = self
            .provider
            .list_events()
            .await?
            .into_iter()
            .filter(|e| {
                e.name.to_lowercase().contains(&needle)
                    || e
                        .description
                        .as_deref()
                        .is_some_and(|d| strip_html(d).to_lowercase().contains(&needle))
            })
            .collect();

        Ok(format_listing(
            &format!("**Events matching '{}':**", query),
            &matches,
            &format!("No events found matching '{}'.", query),
        ))
    }

    /// Events starting at or after `now`, soonest first
    pub async fn upcoming_events(&self, now: DateTime<Utc>) -> Result<String> {
        let mut upcoming: Vec<(DateTime<Utc>, Event)> = self
            .provider
            .list_events()
            .await?
            .into_iter()
            .filter_map(|e| {
                let start = parse_date(e.start_date.as_deref()?)?;
                (start >= now).then_some((start, e))
            })
            .collect();
        upcoming.sort_by_key(|(start, _)| *start);

        if upcoming.is_empty() {
            return Ok("No upcoming events found.".to_string());
        }

        let mut msg = String::from("**Upcoming Events:**\n");
        for (start, event) in upcoming.iter().take(LIST_LIMIT) {
            msg.push_str(&format!("- {} ({})\n", event.name, format_date(start)));
        }
        if upcoming.len() > LIST_LIMIT {
            msg.push_str(&format!("...and {} more.", upcoming.len() - LIST_LIMIT));
        }
        Ok(msg)
    }
}

fn format_listing(header: &str, events: &[Event], empty: &str) -> String {
    if events.is_empty() {
        return empty.to_string();
    }

    let mut msg = format!("{}\n", header);
    for event in events.iter().take(LIST_LIMIT) {
        msg.push_str(&format!("- {}\n", display_name(event)));
    }
    if events.len() > LIST_LIMIT {
        msg.push_str(&format!("...and {} more.", events.len() - LIST_LIMIT));
    }
    msg
}

fn display_name(event: &Event) -> &str {
    if event.name.is_empty() {
        "Unnamed Event"
    } else {
        &event.name
    }
}

/// Case-insensitive fuzzy match on event names
pub fn best_match<'a>(query: &str, events: &'a [Event]) -> Option<&'a Event> {
    let lowered: Vec<String> = events.iter().map(|e| e.name.to_lowercase()).collect();
    let candidates: Vec<&str> = lowered.iter().map(String::as_str).collect();

    let query = query.trim().to_lowercase();
    let best = similar::get_close_matches(query.as_str(), &candidates, 1, MATCH_CUTOFF)
        .into_iter()
        .next()?;

    candidates
        .iter()
        .position(|c| *c == best)
        .map(|idx| &events[idx])
}

/// Remove HTML tags from provider-supplied descriptions
pub fn strip_html(text: &str) -> String {
    static TAGS: OnceLock<Regex> = OnceLock::new();
    let tags = TAGS.get_or_init(|| Regex::new(r"<[^>]+>").expect("static regex is valid"));
    tags.replace_all(text, "").into_owned()
}

fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn format_date(dt: &DateTime<Utc>) -> String {
    dt.format("%A, %d %B %Y, %I:%M %p").to_string()
}

/// Formatted date, or the raw provider string when it does not parse
fn display_date(raw: Option<&str>) -> String {
    match raw {
        Some(raw) => parse_date(raw).map_or_else(|| raw.to_string(), |dt| format_date(&dt)),
        None => "?".to_string(),
    }
}

pub fn format_event_details(event: &Event) -> String {
    let venue = event
        .event_location
        .as_ref()
        .and_then(|l| l.venue_name.as_deref())
        .unwrap_or("?");
    let description = event
        .description
        .as_deref()
        .map(strip_html)
        .unwrap_or_else(|| "No description provided.".to_string());

    let mut msg = format!("**{}** (ID: `{}`)\n", display_name(event), event.id);
    msg.push_str(&format!("**Venue:** {}\n", venue));
    msg.push_str(&format!("**Start:** {}\n", display_date(event.start_date.as_deref())));
    msg.push_str(&format!("**End:** {}\n", display_date(event.end_date.as_deref())));
    msg.push_str(&format!("**Description:**\n{}\n", description.trim()));
    if let Some(ref url) = event.url {
        msg.push_str(&format!("[Event Link]({})", url));
    }
    msg
}

/// Ticket summary; `sold` is the live order count when the provider has one
pub fn format_ticket_status(event: &Event, sold: Option<usize>) -> String {
    let mut msg = format!("**{}**\n", display_name(event));

    match sold {
        Some(sold) => {
            let sold = i64::try_from(sold).unwrap_or(i64::MAX);
            let remaining = event
                .total_capacity
                .map_or(0, |capacity| capacity.saturating_sub(sold).max(0));
            let capacity = event
                .total_capacity
                .map_or_else(|| "unknown".to_string(), |c| c.to_string());

            msg.push_str(&format!("Total capacity: {}\n", capacity));
            msg.push_str(&format!("Attendees: {}\n", sold));
            msg.push_str(&format!("Tickets remaining: {}", remaining));
        }
        None => {
            let remaining: i64 = event
                .ticket_types
                .iter()
                .filter(|t| !t.disabled && !t.deleted)
                .map(|t| t.quantity)
                .sum();

            if let Some(capacity) = event.total_capacity {
                msg.push_str(&format!("Total capacity: {}\n", capacity));
            }
            msg.push_str(&format!("Tickets remaining: {}\n", remaining));
            msg.push_str("*(Real-time attendee data unavailable)*");
        }
    }

    msg
}
