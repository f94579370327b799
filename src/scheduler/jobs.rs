//! Job dispatch: built-in task handlers, custom-heartbeat and automation
//! execution, and the condition evaluator consulted before an automation
//! fires. Kept separate from the registry/reconciliation logic in the
//! parent module so each side can be read on its own.

use super::{JobKind, Scheduler};
use crate::commands::CalendarEvent;
use crate::companion::GeneratedImage;
use crate::config::{
    Automation, CompareOp, Condition, ConditionLogic, CustomHeartbeat, LastResult, Reminder,
    WeatherField,
};
use chrono::{DateTime, Datelike, Duration as ChronoDuration, NaiveTime, Timelike, Utc};
use serde_json::Value;
use tracing::{info, warn};

/// Substrings in a model's reply that mark it as having echoed the morning
/// briefing's own instructions rather than producing owner-facing content.
const ECHO_MARKERS: &[&str] = &["use only the data below", "do not echo"];

/// Phrases in an automation's reply that downgrade its result from
/// `success` to `partial` rather than a hard failure.
const FAILURE_WORDS: &[&str] = &["failed", "error", "could not", "unable to"];

const AURORA_IMAGE_URLS: [&str; 2] = [
    "https://services.swpc.noaa.gov/images/aurora-forecast-northern-hemisphere.jpg",
    "https://services.swpc.noaa.gov/images/aurora-forecast-southern-hemisphere.jpg",
];

fn parse_hhmm(s: &str) -> Option<u32> {
    let (h, m) = s.split_once(':')?;
    Some(h.trim().parse::<u32>().ok()? * 60 + m.trim().parse::<u32>().ok()?)
}

fn start_of_day(dt: DateTime<Utc>) -> DateTime<Utc> {
    dt.with_time(NaiveTime::MIN).single().unwrap_or(dt)
}

impl Scheduler {
    /// Runs a job to completion, logging (never propagating) its failure.
    /// `manual_override` comes from the trigger-drain path: quiet-period and
    /// cooldown/condition suppression are bypassed for manually fired jobs.
    pub(super) async fn dispatch(&self, id: &str, kind: &JobKind, manual_override: bool) {
        let result = match kind {
            JobKind::BuiltIn(task_id) => self.dispatch_builtin(task_id, manual_override).await,
            JobKind::CustomHeartbeat(hb) => self.run_custom_heartbeat(hb, manual_override).await,
            JobKind::Automation(automation) => self.run_automation(automation, manual_override).await,
            JobKind::Reminder(reminder) => self.run_reminder(reminder).await,
        };
        if let Err(e) = result {
            warn!(job = %id, error = %e, "scheduled job failed");
        }
    }

    async fn dispatch_builtin(&self, task_id: &str, manual_override: bool) -> anyhow::Result<()> {
        match task_id {
            crate::config::TASK_MORNING_BRIEFING => self.run_morning_briefing().await,
            crate::config::TASK_WEATHER_CHECK => self.run_weather_check().await,
            crate::config::TASK_AURORA_FORECAST => self.run_aurora_forecast().await,
            crate::config::TASK_HEALTH_CHECK => self.run_health_check(manual_override).await,
            crate::config::TASK_DATABASE_BACKUP => self.run_database_backup().await,
            crate::config::TASK_NOTIFICATION_DRAIN => self.run_notification_drain().await,
            crate::config::TASK_REMINDER_POLL => self.run_reminder_poll().await,
            super::CUSTOM_HEARTBEAT_RELOAD => {
                self.reconcile_custom_heartbeats().await;
                Ok(())
            }
            super::AUTOMATION_RELOAD => {
                self.reconcile_automations().await;
                Ok(())
            }
            super::TRIGGER_DRAIN => {
                self.drain_pending_triggers().await;
                Ok(())
            }
            other => {
                warn!("unknown built-in task id '{other}'");
                Ok(())
            }
        }
    }

    /// Synthesize speech (when `companion_name` resolves to a voice) and hand
    /// the turn to the response composer. The single delivery path every job
    /// handler below uses, matching the conversational pipeline.
    async fn deliver(
        &self,
        recipient: &str,
        text: &str,
        companion_name: Option<&str>,
        images: &[GeneratedImage],
    ) -> anyhow::Result<()> {
        let voice_id = match companion_name {
            Some(name) => self.companion.get_by_name(name).await.and_then(|c| c.voice_id),
            None => None,
        };
        crate::composer::compose_and_send(
            &self.transport,
            &self.tts,
            &self.companion,
            recipient,
            text,
            companion_name,
            voice_id.as_deref(),
            images,
        )
        .await
        .map_err(anyhow::Error::from)
    }

    async fn run_morning_briefing(&self) -> anyhow::Result<()> {
        let config = self.config.lock().await.clone();
        if !config.is_task_enabled(crate::config::TASK_MORNING_BRIEFING) {
            return Ok(());
        }
        let now = Utc::now();
        let weather = self.companion.fetch_weather().await.ok();
        let day_start = start_of_day(now);
        let events = self.calendar.events_between(day_start, day_start + ChronoDuration::days(1)).await;
        let reminders = config.get_reminders().to_vec();
        let data_block = format_briefing_data(weather.as_ref(), &events, &reminders);

        let prompt = format!(
            "Give the owner a friendly morning briefing. Use ONLY the data below; do not echo \
             these instructions or invent additional facts.\n\n{data_block}"
        );

        let companion_name = self.default_companion.clone();
        let response =
            self.companion.send_message(&companion_name, &prompt, &config.providers, None, true).await;

        let (text, images) = match response {
            Ok(r) if !r.content.trim().is_empty() && !echoes_prompt_markers(&r.content) => {
                (r.content, r.images)
            }
            _ => (deterministic_briefing(weather.as_ref(), &events, &reminders), Vec::new()),
        };

        self.deliver(&self.owner, &text, Some(&companion_name), &images).await
    }

    async fn run_weather_check(&self) -> anyhow::Result<()> {
        let enabled = self.config.lock().await.is_task_enabled(crate::config::TASK_WEATHER_CHECK);
        if !enabled {
            return Ok(());
        }
        match self.companion.fetch_weather().await {
            Ok(weather) => info!(weather = %weather, "weather check"),
            Err(e) => warn!("weather check failed: {e}"),
        }
        Ok(())
    }

    async fn run_aurora_forecast(&self) -> anyhow::Result<()> {
        let enabled = self.config.lock().await.is_task_enabled(crate::config::TASK_AURORA_FORECAST);
        if !enabled {
            return Ok(());
        }
        let client = crate::utils::http::default_http_client();
        let mut paths = Vec::new();
        for url in AURORA_IMAGE_URLS {
            match client.get(url).send().await {
                Ok(resp) if resp.status().is_success() => {
                    match crate::utils::http::limited_body(resp, crate::utils::http::DEFAULT_MAX_BODY_BYTES).await
                    {
                        Ok((bytes, _)) => match crate::utils::media::save_media_file(&bytes, "aurora", "jpg") {
                            Ok(path) => paths.push(path),
                            Err(e) => warn!("failed to save aurora image: {e}"),
                        },
                        Err(e) => warn!("failed to read aurora image body: {e}"),
                    }
                }
                Ok(resp) => warn!("aurora image fetch returned {}", resp.status()),
                Err(e) => warn!("aurora image fetch failed: {e}"),
            }
        }
        if paths.is_empty() {
            return Ok(());
        }

        let narration = "Here's tonight's aurora forecast.";
        let audio_path = match self.tts.synthesize(narration, None).await {
            Ok(bytes) => crate::utils::media::save_media_file(&bytes, "aurora_narration", "mp3").ok(),
            Err(e) => {
                warn!("aurora narration synthesis failed: {e}");
                None
            }
        };
        let mut attachments = audio_path.clone().into_iter().collect::<Vec<_>>();
        attachments.extend(paths.iter().cloned());

        let result = self
            .transport
            .send_message(&self.owner, narration, &attachments)
            .await
            .map(|_| ())
            .map_err(anyhow::Error::from);

        for path in audio_path.iter().chain(paths.iter()) {
            let _ = tokio::fs::remove_file(path).await;
        }
        result
    }

    async fn run_health_check(&self, manual_override: bool) -> anyhow::Result<()> {
        let config = self.config.lock().await.clone();
        if !config.is_task_enabled(crate::config::TASK_HEALTH_CHECK) {
            return Ok(());
        }
        let endpoints = serde_json::json!({ "signal": self.transport.is_connected() });
        let health = match self.companion.fetch_health(&endpoints).await {
            Ok(h) => h,
            Err(e) => {
                warn!("health check request failed: {e}");
                return Ok(());
            }
        };
        let Some(services) = health.get("services").and_then(Value::as_object) else { return Ok(()) };
        let issues: Vec<(String, String)> = services
            .iter()
            .filter_map(|(name, v)| {
                let status = v.get("status").and_then(Value::as_str).unwrap_or("unknown");
                (status != "connected").then(|| (name.clone(), status.to_string()))
            })
            .collect();
        if issues.is_empty() {
            return Ok(());
        }
        if !manual_override && config.is_quiet_period() {
            info!("health check found service issues but quiet period suppresses delivery");
            return Ok(());
        }
        let body = issues.iter().map(|(name, status)| format!("- {name}: {status}")).collect::<Vec<_>>().join("\n");
        let text = format!("System Alert: Service issues detected\n\n{body}");
        self.deliver(&self.owner, &text, None, &[]).await
    }

    async fn run_database_backup(&self) -> anyhow::Result<()> {
        let config = self.config.lock().await.clone();
        if !config.is_task_enabled(crate::config::TASK_DATABASE_BACKUP) || !config.backup.enabled {
            return Ok(());
        }
        if config.backup.dest_dir.is_empty() || config.backup.db_paths.is_empty() {
            warn!("database backup enabled but dest_dir/db_paths not configured");
            return Ok(());
        }
        let dest = std::path::Path::new(&config.backup.dest_dir);
        if let Err(e) = tokio::fs::create_dir_all(dest).await {
            warn!("failed to create backup destination {}: {e}", dest.display());
            return Ok(());
        }
        for db_path in &config.backup.db_paths {
            let src = std::path::Path::new(db_path);
            let (Some(stem), Some(ext)) =
                (src.file_stem().and_then(|s| s.to_str()), src.extension().and_then(|s| s.to_str()))
            else {
                warn!("skipping backup source with no stem/extension: {}", src.display());
                continue;
            };
            let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
            let dest_path = dest.join(format!("{stem}_{timestamp}.{ext}"));
            if let Err(e) = tokio::fs::copy(src, &dest_path).await {
                warn!("failed to back up {}: {e}", src.display());
                continue;
            }
            if let Err(e) = prune_old_backups(dest, stem, config.backup.keep_count).await {
                warn!("failed to prune old backups for prefix '{stem}': {e}");
            }
        }
        Ok(())
    }

    async fn run_notification_drain(&self) -> anyhow::Result<()> {
        let enabled = self.config.lock().await.is_task_enabled(crate::config::TASK_NOTIFICATION_DRAIN);
        if !enabled {
            return Ok(());
        }
        let notifications = self.companion.fetch_notifications().await?;
        if notifications.is_empty() {
            return Ok(());
        }
        let mut delivered_ids = Vec::new();
        for notif in &notifications {
            let Some(id) = notif.get("id").and_then(Value::as_str) else { continue };
            let message = notif.get("message").and_then(Value::as_str).unwrap_or_default();
            if message.is_empty() {
                delivered_ids.push(id.to_string());
                continue;
            }
            let companion_name = match notif.get("choomId").and_then(Value::as_str) {
                Some(choom_id) => self.companion.get_by_id(choom_id).await.map(|c| c.name),
                None => None,
            };
            match self.deliver(&self.owner, message, companion_name.as_deref(), &[]).await {
                Ok(()) => delivered_ids.push(id.to_string()),
                Err(e) => warn!("failed to deliver notification {id}: {e}"),
            }
        }
        if !delivered_ids.is_empty() {
            self.companion.delete_notifications(&delivered_ids).await?;
        }
        Ok(())
    }

    /// Defensive sweep over persisted reminders for any that are past due.
    /// Under normal operation [`Scheduler::reconcile_reminders`] already
    /// registers a one-shot job per reminder that fires this same path; this
    /// job exists so a reminder is never stuck if its one-shot entry is ever
    /// lost (e.g. the in-memory job map was rebuilt without a reconcile pass).
    async fn run_reminder_poll(&self) -> anyhow::Result<()> {
        let reminders = self.config.lock().await.get_reminders().to_vec();
        let now = Utc::now();
        for reminder in reminders {
            if reminder.remind_at.parse::<DateTime<Utc>>().is_ok_and(|at| at <= now) {
                self.run_reminder(&reminder).await?;
            }
        }
        Ok(())
    }

    async fn run_reminder(&self, reminder: &Reminder) -> anyhow::Result<()> {
        let text = format!("Reminder: {}", reminder.text);
        self.deliver(&self.owner, &text, None, &[]).await?;
        {
            let mut config = self.config.lock().await;
            config.remove_reminder(&reminder.id);
        }
        self.save_config().await;
        self.jobs.lock().await.remove(&format!("reminder_{}", reminder.id));
        Ok(())
    }

    async fn run_custom_heartbeat(&self, hb: &CustomHeartbeat, manual_override: bool) -> anyhow::Result<()> {
        let config = self.config.lock().await.clone();
        if !manual_override && hb.respect_quiet && config.is_quiet_period() {
            info!(heartbeat = %hb.id, "quiet period, skipping custom heartbeat");
            return Ok(());
        }
        if self.companion.is_user_active_default(&hb.choom_name).await {
            info!(heartbeat = %hb.id, companion = %hb.choom_name, "owner is active, deferring heartbeat");
            return Ok(());
        }
        let response =
            self.companion.send_message(&hb.choom_name, &hb.prompt, &config.providers, None, false).await?;
        self.deliver(&self.owner, &response.content, Some(&hb.choom_name), &response.images).await
    }

    async fn run_automation(&self, automation: &Automation, manual_override: bool) -> anyhow::Result<()> {
        let config = self.config.lock().await.clone();
        if !manual_override && automation.respect_quiet && config.is_quiet_period() {
            info!(automation = %automation.id, "quiet period, skipping automation");
            return Ok(());
        }
        if self.companion.is_user_active_default(&automation.choom_name).await {
            info!(automation = %automation.id, "owner is active, deferring automation");
            return Ok(());
        }

        let now = Utc::now();
        let met = evaluate_conditions(
            &automation.conditions,
            automation.condition_logic,
            self.companion.as_ref(),
            self.calendar.as_ref(),
            &config,
            now,
        )
        .await;

        if !met {
            return Ok(());
        }
        if let Some(cooldown) = &automation.cooldown
            && cooldown_active(automation.last_condition_met, cooldown.minutes, now)
        {
            info!(automation = %automation.id, "condition met but still within cooldown");
            return Ok(());
        }

        let prompt = build_automation_prompt(automation);
        let result = self.companion.send_message(&automation.choom_name, &prompt, &config.providers, None, true).await;
        let last_result = match &result {
            Ok(response) => {
                if automation.notify_on_complete {
                    let _ = self
                        .deliver(&self.owner, &response.content, Some(&automation.choom_name), &response.images)
                        .await;
                }
                classify_result(&response.content)
            }
            Err(e) => {
                warn!(automation = %automation.id, error = %e, "automation turn failed");
                LastResult::Failed
            }
        };

        {
            let mut config = self.config.lock().await;
            if let Some(stored) = config.automations.iter_mut().find(|a| a.id == automation.id) {
                stored.last_run = Some(now.timestamp());
                if met {
                    stored.last_condition_met = Some(now.timestamp());
                }
                stored.last_result = Some(last_result);
            }
        }
        self.save_config().await;
        Ok(())
    }
}

async fn prune_old_backups(dest: &std::path::Path, prefix: &str, keep: usize) -> anyhow::Result<()> {
    let mut entries = tokio::fs::read_dir(dest).await?;
    let mut matches = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with(&format!("{prefix}_")) {
            let modified = entry.metadata().await?.modified()?;
            matches.push((modified, entry.path()));
        }
    }
    matches.sort_by(|a, b| b.0.cmp(&a.0));
    for (_, path) in matches.into_iter().skip(keep) {
        let _ = tokio::fs::remove_file(&path).await;
    }
    Ok(())
}

pub(super) fn echoes_prompt_markers(text: &str) -> bool {
    let lower = text.to_lowercase();
    ECHO_MARKERS.iter().any(|marker| lower.contains(marker))
}

pub(super) fn format_briefing_data(
    weather: Option<&Value>,
    events: &[CalendarEvent],
    reminders: &[Reminder],
) -> String {
    let mut lines = Vec::new();
    if let Some(w) = weather.and_then(|v| v.get("weather")) {
        lines.push(format!(
            "Weather: {}, {}°, feels like {}°, wind {} mph, humidity {}%",
            w.get("description").and_then(Value::as_str).unwrap_or("unknown"),
            w.get("temperature").and_then(Value::as_f64).unwrap_or(0.0),
            w.get("feelsLike").and_then(Value::as_f64).unwrap_or(0.0),
            w.get("windSpeed").and_then(Value::as_f64).unwrap_or(0.0),
            w.get("humidity").and_then(Value::as_f64).unwrap_or(0.0),
        ));
    }
    if events.is_empty() {
        lines.push("Calendar: no events today.".to_string());
    } else {
        lines.push("Calendar:".to_string());
        for e in events {
            lines.push(format!("- {} ({})", e.summary, e.start.format("%-I:%M %p")));
        }
    }
    if reminders.is_empty() {
        lines.push("Reminders: none pending.".to_string());
    } else {
        lines.push("Reminders:".to_string());
        for r in reminders {
            lines.push(format!("- {}", r.text));
        }
    }
    lines.join("\n")
}

fn deterministic_briefing(weather: Option<&Value>, events: &[CalendarEvent], reminders: &[Reminder]) -> String {
    format!("Good morning! Here's your briefing:\n\n{}", format_briefing_data(weather, events, reminders))
}

/// `last_condition_met` is a Unix timestamp; returns `true` when `now` is
/// still within `cooldown_minutes` of it (cooldown suppresses re-firing).
pub(super) fn cooldown_active(last_condition_met: Option<i64>, cooldown_minutes: u64, now: DateTime<Utc>) -> bool {
    let Some(last) = last_condition_met else { return false };
    let last_dt = DateTime::<Utc>::from_timestamp(last, 0).unwrap_or(now);
    (now - last_dt).num_minutes() < cooldown_minutes as i64
}

pub(super) fn classify_result(content: &str) -> LastResult {
    if content.trim().is_empty() {
        return LastResult::Failed;
    }
    let lower = content.to_lowercase();
    if FAILURE_WORDS.iter().any(|word| lower.contains(word)) {
        LastResult::Partial
    } else {
        LastResult::Success
    }
}

pub(super) fn build_automation_prompt(automation: &Automation) -> String {
    let mut lines = vec![format!("Run the automation \"{}\".", automation.name)];
    for (idx, step) in automation.steps.iter().enumerate() {
        let args = step
            .arguments
            .iter()
            .map(|(k, v)| format!("{k}={}", v.as_str().map_or_else(|| v.to_string(), str::to_string)))
            .collect::<Vec<_>>()
            .join(", ");
        if args.is_empty() {
            lines.push(format!("Step {}: Use the `{}` tool.", idx + 1, step.tool_name));
        } else {
            lines.push(format!("Step {}: Use the `{}` tool with {args}.", idx + 1, step.tool_name));
        }
    }
    lines.join("\n")
}

/// Evaluates a single condition against live collaborators. Network-backed
/// variants (`weather`, `calendar`, `home_assistant`) fail closed: any
/// fetch error is treated as "condition not met" rather than surfaced,
/// since a flaky upstream should suppress an automation, not crash it.
pub async fn evaluate_condition(
    condition: &Condition,
    companion: &crate::companion::CompanionClient,
    calendar: &dyn crate::commands::CalendarTasks,
    config: &crate::config::Config,
    now: DateTime<Utc>,
) -> bool {
    match condition {
        Condition::NoCondition => true,
        Condition::Weather { field, op, value } => {
            let Ok(weather) = companion.fetch_weather().await else { return false };
            let Some(w) = weather.get("weather") else { return false };
            let key = match field {
                WeatherField::Temperature => "temperature",
                WeatherField::WindSpeed => "windSpeed",
                WeatherField::Humidity => "humidity",
            };
            let Some(actual) = w.get(key).and_then(Value::as_f64) else { return false };
            op.apply(actual, *value)
        }
        Condition::TimeRange { after, before } => {
            let (Some(after_min), Some(before_min)) = (parse_hhmm(after), parse_hhmm(before)) else {
                return false;
            };
            let minute = now.hour() * 60 + now.minute();
            if after_min <= before_min {
                minute >= after_min && minute < before_min
            } else {
                minute >= after_min || minute < before_min
            }
        }
        Condition::DayOfWeek { days } => {
            let sunday_zero = now.weekday().num_days_from_sunday() as u8;
            days.contains(&sunday_zero)
        }
        Condition::Calendar { has_events, keyword } => {
            let day_start = start_of_day(now);
            let events = calendar.events_between(day_start, day_start + ChronoDuration::days(1)).await;
            let keyword_ok = match keyword {
                Some(kw) => events.iter().any(|e| e.summary.to_lowercase().contains(&kw.to_lowercase())),
                None => true,
            };
            let has_events_ok = has_events.is_none_or(|expected| !events.is_empty() == expected);
            keyword_ok && has_events_ok
        }
        Condition::HomeAssistant { entity_id, op, ha_value } => {
            evaluate_home_assistant(entity_id, *op, ha_value, config).await
        }
    }
}

async fn evaluate_home_assistant(entity_id: &str, op: CompareOp, ha_value: &Value, config: &crate::config::Config) -> bool {
    let ha = &config.providers.home_assistant;
    if !ha.enabled || ha.base_url.is_empty() {
        return false;
    }
    let client = crate::utils::http::default_http_client();
    let Ok(resp) = client
        .get(format!("{}/api/states/{entity_id}", ha.base_url))
        .bearer_auth(&ha.bearer_token)
        .send()
        .await
    else {
        return false;
    };
    let Ok(body) = resp.json::<Value>().await else { return false };
    let Some(state) = body.get("state") else { return false };
    let state_str = state.as_str().unwrap_or_default();
    if state_str == "unavailable" || state_str == "unknown" {
        return false;
    }

    let actual_numeric = state.as_f64().or_else(|| state_str.parse::<f64>().ok());
    let expected_numeric = ha_value.as_f64().or_else(|| ha_value.as_str().and_then(|s| s.parse::<f64>().ok()));
    if let (Some(actual), Some(expected)) = (actual_numeric, expected_numeric) {
        return op.apply(actual, expected);
    }

    let expected_str = ha_value.as_str().unwrap_or_default();
    match op {
        CompareOp::Eq => state_str == expected_str,
        CompareOp::Ne => state_str != expected_str,
        _ => false,
    }
}

pub(super) async fn evaluate_conditions(
    conditions: &[Condition],
    logic: ConditionLogic,
    companion: &crate::companion::CompanionClient,
    calendar: &dyn crate::commands::CalendarTasks,
    config: &crate::config::Config,
    now: DateTime<Utc>,
) -> bool {
    if conditions.is_empty() {
        return true;
    }
    match logic {
        ConditionLogic::All => {
            for condition in conditions {
                if !evaluate_condition(condition, companion, calendar, config, now).await {
                    return false;
                }
            }
            true
        }
        ConditionLogic::Any => {
            for condition in conditions {
                if evaluate_condition(condition, companion, calendar, config, now).await {
                    return true;
                }
            }
            false
        }
    }
}
