//! The deterministic command grammar that runs before LLM routing: calendar,
//! task-list, and reminder intents get an instant, mechanical answer instead
//! of round-tripping to a companion.

use super::calendar_tasks::{CalendarEvent, CalendarTasks};
use crate::config::Reminder;
use chrono::{DateTime, Datelike, Duration as ChronoDuration, NaiveTime, Timelike, Utc, Weekday};
use std::sync::LazyLock;

/// Outcome of a recognized command.
pub enum Interpreted {
    /// A formatted reply the response composer should deliver as-is.
    Reply(String),
    /// A reminder was scheduled: the caller must persist it and register a
    /// matching one-shot job with the scheduler, then deliver `reply`.
    Reminder { reminder: Reminder, reply: String },
}

/// Replace curly quotes and ellipsis with their plain-ASCII equivalents.
pub fn normalize_smart_quotes(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '\u{2018}' | '\u{2019}' => '\'',
            '\u{201C}' | '\u{201D}' => '"',
            _ => c,
        })
        .collect::<String>()
        .replace('\u{2026}', "...")
}

fn resolve_list_alias(name: &str) -> String {
    match name.trim().to_lowercase().as_str() {
        "grocery" | "groceries" | "shopping" | "shopping list" => "groceries".to_string(),
        other => other.to_string(),
    }
}

fn word_to_number(word: &str) -> Option<u32> {
    let w = word.trim().to_lowercase();
    let table: &[(&str, u32)] = &[
        ("a", 1), ("an", 1), ("one", 1), ("two", 2), ("three", 3), ("four", 4),
        ("five", 5), ("six", 6), ("seven", 7), ("eight", 8), ("nine", 9), ("ten", 10),
        ("eleven", 11), ("twelve", 12), ("thirteen", 13), ("fourteen", 14), ("fifteen", 15),
        ("sixteen", 16), ("seventeen", 17), ("eighteen", 18), ("nineteen", 19), ("twenty", 20),
        ("thirty", 30), ("forty", 40), ("fifty", 50), ("sixty", 60), ("couple", 2), ("few", 3),
    ];
    if let Ok(n) = w.parse::<u32>() {
        return Some(n);
    }
    table.iter().find(|(k, _)| *k == w).map(|(_, v)| *v)
}

fn format_events(events: &[CalendarEvent]) -> String {
    if events.is_empty() {
        return "No events found.".to_string();
    }
    events
        .iter()
        .map(|e| format!("- {} ({})", e.summary, e.start.format("%a %b %-d, %-I:%M %p")))
        .collect::<Vec<_>>()
        .join("\n")
}

fn dedupe_events(mut events: Vec<CalendarEvent>) -> Vec<CalendarEvent> {
    let mut seen = std::collections::HashSet::new();
    events.retain(|e| seen.insert(e.id.clone()));
    events
}

fn start_of_day(dt: DateTime<Utc>) -> DateTime<Utc> {
    dt.with_time(NaiveTime::MIN).single().unwrap_or(dt)
}

fn weekday_from_name(name: &str) -> Option<Weekday> {
    match name.to_lowercase().as_str() {
        "sunday" => Some(Weekday::Sun),
        "monday" => Some(Weekday::Mon),
        "tuesday" => Some(Weekday::Tue),
        "wednesday" => Some(Weekday::Wed),
        "thursday" => Some(Weekday::Thu),
        "friday" => Some(Weekday::Fri),
        "saturday" => Some(Weekday::Sat),
        _ => None,
    }
}

static RELATIVE_REMINDER: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(
        r"(?i)^remind me in (?P<num>[a-z0-9]+) (?P<unit>minutes?|mins?|hours?|hrs?) to (?P<task>.+)$",
    )
    .unwrap()
});
static RELATIVE_REMINDER_REVERSED: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(
        r"(?i)^remind me to (?P<task>.+) in (?P<num>[a-z0-9]+) (?P<unit>minutes?|mins?|hours?|hrs?)$",
    )
    .unwrap()
});
static ABSOLUTE_REMINDER: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(
        r"(?i)^remind me at (?P<hour>\d{1,2})(:(?P<minute>\d{2}))?\s*(?P<ampm>am|pm)? to (?P<task>.+)$",
    )
    .unwrap()
});
static SHOW_LIST: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"(?i)^(show|what'?s on) (my |the )?(?P<list>[\w ]+?) list\??$").unwrap());
static ADD_TO_LIST: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"(?i)^(add|put) (?P<item>.+?) (to|on) (my |the )?(?P<list>[\w ]+?)( list)?$").unwrap()
});
static REMEMBER_TO_BUY: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"(?i)^remember to buy (?P<item>.+)$").unwrap());
static REMOVE_FROM_LIST: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"(?i)^remove (?P<item>.+?) from (my |the )?(?P<list>[\w ]+?)( list)?$").unwrap()
});

fn relative_duration(num: &str, unit: &str) -> Option<ChronoDuration> {
    let n = word_to_number(num)?;
    let unit = unit.to_lowercase();
    if unit.starts_with("hour") || unit.starts_with("hr") {
        Some(ChronoDuration::hours(i64::from(n)))
    } else {
        Some(ChronoDuration::minutes(i64::from(n)))
    }
}

fn make_reminder(task: &str, remind_at: DateTime<Utc>, now: DateTime<Utc>) -> Interpreted {
    let reminder = Reminder {
        id: uuid::Uuid::new_v4().to_string(),
        text: task.trim().to_string(),
        remind_at: remind_at.to_rfc3339(),
        created_at: now.to_rfc3339(),
    };
    let reply = format!(
        "Got it — I'll remind you to {} at {}.",
        reminder.text,
        remind_at.format("%-I:%M %p")
    );
    Interpreted::Reminder { reminder, reply }
}

/// Attempt to match `text` against the command grammar. `calendar` backs
/// every list/calendar lookup; `now` is the wall-clock instant used to
/// compute reminder and calendar windows.
pub async fn interpret(
    text: &str,
    calendar: &dyn CalendarTasks,
    now: DateTime<Utc>,
) -> Option<Interpreted> {
    let text = normalize_smart_quotes(text);
    let trimmed = text.trim();
    let lower = trimmed.to_lowercase();

    // Relative reminders.
    if let Some(caps) = RELATIVE_REMINDER.captures(trimmed) {
        if let Some(dur) = relative_duration(&caps["num"], &caps["unit"]) {
            return Some(make_reminder(&caps["task"], now + dur, now));
        }
    }
    if let Some(caps) = RELATIVE_REMINDER_REVERSED.captures(trimmed) {
        if let Some(dur) = relative_duration(&caps["num"], &caps["unit"]) {
            return Some(make_reminder(&caps["task"], now + dur, now));
        }
    }

    // Absolute reminders.
    if let Some(caps) = ABSOLUTE_REMINDER.captures(trimmed) {
        let mut hour: u32 = caps["hour"].parse().ok()?;
        let minute: u32 = caps
            .name("minute")
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(0);
        if let Some(ampm) = caps.name("ampm") {
            let is_pm = ampm.as_str().eq_ignore_ascii_case("pm");
            if is_pm && hour != 12 {
                hour += 12;
            } else if !is_pm && hour == 12 {
                hour = 0;
            }
        }
        let today = now
            .with_hour(hour)
            .and_then(|d| d.with_minute(minute))
            .and_then(|d| d.with_second(0))
            .and_then(|d| d.with_nanosecond(0))?;
        let target = if today <= now { today + ChronoDuration::days(1) } else { today };
        return Some(make_reminder(&caps["task"], target, now));
    }

    // List operations.
    if lower == "list task-lists" || lower == "list my lists" || lower == "show my lists" {
        let lists = calendar.list_task_lists().await;
        let body = if lists.is_empty() {
            "You don't have any lists yet.".to_string()
        } else {
            lists.iter().map(|l| format!("- {l}")).collect::<Vec<_>>().join("\n")
        };
        return Some(Interpreted::Reply(body));
    }
    if let Some(caps) = SHOW_LIST.captures(trimmed) {
        let list = resolve_list_alias(&caps["list"]);
        return Some(Interpreted::Reply(match calendar.list_items(&list).await {
            Some(items) if items.is_empty() => format!("Your {list} list is empty."),
            Some(items) => items.iter().map(|i| format!("- {i}")).collect::<Vec<_>>().join("\n"),
            None => format!("I don't have a {list} list yet."),
        }));
    }
    if let Some(caps) = REMEMBER_TO_BUY.captures(trimmed) {
        let item = caps["item"].trim().to_string();
        calendar.add_item("groceries", &item).await;
        return Some(Interpreted::Reply(format!("Added {item} to your groceries list.")));
    }
    if let Some(caps) = ADD_TO_LIST.captures(trimmed) {
        let item = caps["item"].trim().to_string();
        let list = resolve_list_alias(&caps["list"]);
        calendar.add_item(&list, &item).await;
        return Some(Interpreted::Reply(format!("Added {item} to your {list} list.")));
    }
    if let Some(caps) = REMOVE_FROM_LIST.captures(trimmed) {
        let item = caps["item"].trim().to_string();
        let list = resolve_list_alias(&caps["list"]);
        let removed = calendar.remove_item(&list, &item).await;
        return Some(Interpreted::Reply(if removed {
            format!("Removed {item} from your {list} list.")
        } else {
            format!("I couldn't find {item} on your {list} list.")
        }));
    }

    // Calendar windows. Weather keywords suppress the ambiguous "tomorrow"/
    // "this weekend" calendar interpretations.
    let mentions_weather = lower.contains("weather") || lower.contains("forecast");
    if lower.contains("calendar") || lower.contains("meeting") || lower.contains("event") || lower.contains("birthday") {
        if lower.contains("birthday") || lower.contains("bday") {
            let events = calendar.events_between(now, now + ChronoDuration::days(365)).await;
            let matches: Vec<CalendarEvent> = events
                .into_iter()
                .filter(|e| {
                    let s = e.summary.to_lowercase();
                    s.contains("birthday") || s.contains("bday")
                })
                .collect();
            return Some(Interpreted::Reply(format_events(&dedupe_events(matches))));
        }
        if !mentions_weather && lower.contains("today") {
            let day_start = start_of_day(now);
            let events = calendar.events_between(day_start, day_start + ChronoDuration::days(1)).await;
            return Some(Interpreted::Reply(format_events(&events)));
        }
        if !mentions_weather && lower.contains("tomorrow") {
            let day_start = start_of_day(now) + ChronoDuration::days(1);
            let events = calendar.events_between(day_start, day_start + ChronoDuration::days(1)).await;
            return Some(Interpreted::Reply(format_events(&events)));
        }
        if !mentions_weather && lower.contains("weekend") {
            let mut day = start_of_day(now);
            while day.weekday() != Weekday::Sat {
                day += ChronoDuration::days(1);
            }
            let events = calendar.events_between(day, day + ChronoDuration::days(2)).await;
            return Some(Interpreted::Reply(format_events(&events)));
        }
        for (name, weekday) in [
            ("sunday", Weekday::Sun), ("monday", Weekday::Mon), ("tuesday", Weekday::Tue),
            ("wednesday", Weekday::Wed), ("thursday", Weekday::Thu), ("friday", Weekday::Fri),
            ("saturday", Weekday::Sat),
        ] {
            if lower.contains(name) {
                let _ = weekday_from_name(name);
                let mut day = start_of_day(now);
                while day.weekday() != weekday {
                    day += ChronoDuration::days(1);
                }
                let events = calendar.events_between(day, day + ChronoDuration::days(1)).await;
                return Some(Interpreted::Reply(format_events(&events)));
            }
        }
        if lower.contains("this week") {
            let events = calendar.events_between(now, now + ChronoDuration::days(7)).await;
            return Some(Interpreted::Reply(format_events(&events)));
        }
        if lower.contains("upcoming") || lower.contains("next few days") {
            let events = calendar.events_between(now, now + ChronoDuration::days(3)).await;
            return Some(Interpreted::Reply(format_events(&events)));
        }
        if lower.contains("meeting") || lower.contains("any meetings") || lower.contains("next meeting") {
            let events = calendar.events_between(now, now + ChronoDuration::days(60)).await;
            return Some(Interpreted::Reply(format_events(&events)));
        }

        // Keyword search: strip filler words, require substring match first,
        // then all residual >=4-char tokens matching a title word by prefix-of-four.
        let fillers = ["please", "can", "you", "tell", "me", "about", "the", "my", "a", "is", "there"];
        let tokens: Vec<&str> = lower
            .split_whitespace()
            .filter(|t| !fillers.contains(t) && !t.contains("calendar"))
            .collect();
        let candidate = tokens.join(" ");
        if !candidate.is_empty() {
            let events = calendar.search_events(&candidate).await;
            if !events.is_empty() {
                return Some(Interpreted::Reply(format_events(&dedupe_events(events))));
            }
            let long_tokens: Vec<&str> = tokens.iter().copied().filter(|t| t.len() >= 4).collect();
            if !long_tokens.is_empty() {
                let all_events = calendar.events_between(now, now + ChronoDuration::days(365)).await;
                let matches: Vec<CalendarEvent> = all_events
                    .into_iter()
                    .filter(|e| {
                        let summary = e.summary.to_lowercase();
                        long_tokens.iter().all(|tok| {
                            let prefix = &tok[..tok.len().min(4)];
                            summary.split_whitespace().any(|w| w.starts_with(prefix))
                        })
                    })
                    .collect();
                return Some(Interpreted::Reply(format_events(&dedupe_events(matches))));
            }
        }
    }

    None
}

/// Secondary inline pass run for every message even when it is routed to the
/// LLM: detect conversational list-mutation phrasing and apply it as a side
/// effect, without short-circuiting the LLM turn.
pub async fn apply_inline_list_mutation(text: &str, calendar: &dyn CalendarTasks) {
    let text = normalize_smart_quotes(text);
    let trimmed = text.trim();
    if let Some(caps) = REMEMBER_TO_BUY.captures(trimmed) {
        calendar.add_item("groceries", caps["item"].trim()).await;
        return;
    }
    if let Some(caps) = ADD_TO_LIST.captures(trimmed) {
        let list = resolve_list_alias(&caps["list"]);
        calendar.add_item(&list, caps["item"].trim()).await;
    }
}

#[cfg(test)]
mod tests;
