use super::jobs::{build_automation_prompt, classify_result, cooldown_active, evaluate_condition};
use crate::commands::{CalendarEvent, CalendarTasks, InMemoryCalendarTasks};
use crate::companion::CompanionClient;
use crate::config::{
    Automation, AutomationSchedule, AutomationStep, CompareOp, Condition, Config, WeatherField,
};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
}

fn test_companion(base_url: String) -> CompanionClient {
    CompanionClient::new(base_url, String::new(), Duration::from_secs(60))
}

#[tokio::test]
async fn no_condition_is_always_met() {
    let companion = test_companion("http://localhost".to_string());
    let calendar = InMemoryCalendarTasks::new();
    let config = Config::default();
    let met =
        evaluate_condition(&Condition::NoCondition, &companion, &calendar, &config, utc(2026, 1, 1, 0, 0)).await;
    assert!(met);
}

#[tokio::test]
async fn time_range_matches_same_day_window() {
    let companion = test_companion("http://localhost".to_string());
    let calendar = InMemoryCalendarTasks::new();
    let config = Config::default();
    let condition = Condition::TimeRange { after: "09:00".to_string(), before: "17:00".to_string() };

    assert!(evaluate_condition(&condition, &companion, &calendar, &config, utc(2026, 1, 1, 12, 0)).await);
    assert!(!evaluate_condition(&condition, &companion, &calendar, &config, utc(2026, 1, 1, 20, 0)).await);
}

#[tokio::test]
async fn time_range_wraps_overnight() {
    let companion = test_companion("http://localhost".to_string());
    let calendar = InMemoryCalendarTasks::new();
    let config = Config::default();
    let condition = Condition::TimeRange { after: "22:00".to_string(), before: "06:00".to_string() };

    assert!(evaluate_condition(&condition, &companion, &calendar, &config, utc(2026, 1, 1, 23, 30)).await);
    assert!(evaluate_condition(&condition, &companion, &calendar, &config, utc(2026, 1, 1, 3, 0)).await);
    assert!(!evaluate_condition(&condition, &companion, &calendar, &config, utc(2026, 1, 1, 12, 0)).await);
}

#[tokio::test]
async fn day_of_week_uses_sunday_zero_convention() {
    let companion = test_companion("http://localhost".to_string());
    let calendar = InMemoryCalendarTasks::new();
    let config = Config::default();
    // 2026-01-04 is a Sunday.
    let condition = Condition::DayOfWeek { days: vec![0] };
    assert!(evaluate_condition(&condition, &companion, &calendar, &config, utc(2026, 1, 4, 9, 0)).await);
    // 2026-01-05 is a Monday, not in the set.
    assert!(!evaluate_condition(&condition, &companion, &calendar, &config, utc(2026, 1, 5, 9, 0)).await);
}

#[tokio::test]
async fn weather_condition_compares_numeric_field() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/weather"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "weather": {"temperature": 38.0, "description": "cold", "windSpeed": 5.0, "humidity": 60.0}
        })))
        .mount(&server)
        .await;

    let companion = test_companion(server.uri());
    let calendar = InMemoryCalendarTasks::new();
    let config = Config::default();
    let condition =
        Condition::Weather { field: WeatherField::Temperature, op: CompareOp::Lt, value: 40.0 };

    assert!(evaluate_condition(&condition, &companion, &calendar, &config, Utc::now()).await);

    let not_met =
        Condition::Weather { field: WeatherField::Temperature, op: CompareOp::Gt, value: 40.0 };
    assert!(!evaluate_condition(&not_met, &companion, &calendar, &config, Utc::now()).await);
}

struct FixedCalendar(Vec<CalendarEvent>);

#[async_trait]
impl CalendarTasks for FixedCalendar {
    async fn list_task_lists(&self) -> Vec<String> {
        Vec::new()
    }
    async fn list_items(&self, _list: &str) -> Option<Vec<String>> {
        None
    }
    async fn add_item(&self, _list: &str, _item: &str) {}
    async fn remove_item(&self, _list: &str, _item: &str) -> bool {
        false
    }
    async fn events_between(&self, _start: DateTime<Utc>, _end: DateTime<Utc>) -> Vec<CalendarEvent> {
        self.0.clone()
    }
    async fn search_events(&self, _keyword: &str) -> Vec<CalendarEvent> {
        self.0.clone()
    }
}

#[tokio::test]
async fn calendar_condition_matches_keyword_and_has_events() {
    let companion = test_companion("http://localhost".to_string());
    let config = Config::default();
    let calendar = FixedCalendar(vec![CalendarEvent {
        id: "e1".to_string(),
        summary: "Dentist appointment".to_string(),
        start: utc(2026, 1, 1, 9, 0),
    }]);

    let keyword_match = Condition::Calendar { has_events: None, keyword: Some("dentist".to_string()) };
    assert!(evaluate_condition(&keyword_match, &companion, &calendar, &config, utc(2026, 1, 1, 0, 0)).await);

    let keyword_miss = Condition::Calendar { has_events: None, keyword: Some("haircut".to_string()) };
    assert!(!evaluate_condition(&keyword_miss, &companion, &calendar, &config, utc(2026, 1, 1, 0, 0)).await);

    let has_events = Condition::Calendar { has_events: Some(true), keyword: None };
    assert!(evaluate_condition(&has_events, &companion, &calendar, &config, utc(2026, 1, 1, 0, 0)).await);

    let empty_calendar = InMemoryCalendarTasks::new();
    let expects_empty = Condition::Calendar { has_events: Some(false), keyword: None };
    assert!(evaluate_condition(&expects_empty, &companion, &empty_calendar, &config, utc(2026, 1, 1, 0, 0)).await);
}

#[test]
fn classify_result_flags_failure_phrases_as_partial() {
    assert_eq!(classify_result("The tool call failed unexpectedly."), crate::config::LastResult::Partial);
    assert_eq!(classify_result("Done, everything ran smoothly."), crate::config::LastResult::Success);
    assert_eq!(classify_result(""), crate::config::LastResult::Failed);
}

#[test]
fn automation_prompt_enumerates_steps_with_arguments() {
    let automation = Automation {
        id: "a1".to_string(),
        name: "Lights out".to_string(),
        choom_name: "Genesis".to_string(),
        steps: vec![AutomationStep {
            tool_name: "set_light".to_string(),
            arguments: {
                let mut m = serde_json::Map::new();
                m.insert("entity".to_string(), serde_json::json!("living_room"));
                m.insert("state".to_string(), serde_json::json!("off"));
                m
            },
        }],
        schedule: AutomationSchedule::Cron("0 22 * * *".to_string()),
        enabled: true,
        respect_quiet: true,
        notify_on_complete: false,
        conditions: Vec::new(),
        condition_logic: crate::config::ConditionLogic::All,
        cooldown: None,
        last_condition_met: None,
        last_run: None,
        last_result: None,
    };
    let prompt = build_automation_prompt(&automation);
    assert!(prompt.contains("Run the automation \"Lights out\"."));
    assert!(prompt.contains("Step 1: Use the `set_light` tool with"));
    assert!(prompt.contains("entity=living_room"));
    assert!(prompt.contains("state=off"));
}

#[test]
fn cooldown_suppresses_refire_until_window_elapses() {
    let fired_at = utc(2026, 1, 1, 7, 0);
    assert!(cooldown_active(Some(fired_at.timestamp()), 60, utc(2026, 1, 1, 7, 30)));
    assert!(!cooldown_active(Some(fired_at.timestamp()), 60, utc(2026, 1, 1, 8, 5)));
    assert!(!cooldown_active(None, 60, utc(2026, 1, 1, 7, 30)));
}
