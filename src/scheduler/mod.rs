//! Job registry driving reminders, heartbeats, automations, and the bridge's
//! other background maintenance work. Mirrors a conventional cron-service
//! design: a poll loop with a dynamically sized sleep, one entry per job
//! keyed by id, reconciled against the configuration document on every tick
//! rather than only at startup.

mod jobs;

pub use jobs::evaluate_condition;

use crate::commands::CalendarTasks;
use crate::companion::CompanionClient;
use crate::config::{Automation, Config, CustomHeartbeat, Reminder, TaskConfig};
use crate::transport::RpcTransport;
use crate::utils::task_tracker::TaskTracker;
use crate::voice::TtsClient;
use anyhow::Result;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use cron::Schedule;
use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{info, warn};

const POLL_WHEN_EMPTY_SECS: u64 = 30;
const MIN_SLEEP_MS: i64 = 1000;
const MAX_SLEEP_MS: u64 = 30_000;
const STAGGER_SECS_PER_JOB: i64 = 30;

pub const CUSTOM_HEARTBEAT_RELOAD: &str = "custom_heartbeat_reload";
pub const AUTOMATION_RELOAD: &str = "automation_reload";
pub const TRIGGER_DRAIN: &str = "trigger_drain";

/// Normalize a cron expression to 6 fields (prepend a `0` seconds field for a
/// bare 5-field expression), then validate it parses.
pub fn validate_cron_expr(expr: &str) -> Result<String> {
    let normalized =
        if expr.split_whitespace().count() == 5 { format!("0 {expr}") } else { expr.to_string() };
    normalized
        .parse::<Schedule>()
        .map_err(|e| anyhow::anyhow!("invalid cron expression '{expr}': {e}"))?;
    Ok(normalized)
}

pub fn detect_system_timezone() -> String {
    iana_time_zone::get_timezone().unwrap_or_else(|_| "UTC".to_string())
}

fn time_to_cron_expr(hhmm: &str) -> Option<String> {
    let (h, m) = hhmm.trim().split_once(':')?;
    Some(format!("{} {} * * *", m.parse::<u32>().ok()?, h.parse::<u32>().ok()?))
}

#[derive(Clone)]
enum Trigger {
    Cron { expr: String, tz: String },
    Interval(Duration),
    OneShot(DateTime<Utc>),
}

#[derive(Clone)]
enum JobKind {
    /// A fixed-cadence maintenance task or built-in check, keyed by its task id.
    BuiltIn(String),
    CustomHeartbeat(CustomHeartbeat),
    Automation(Automation),
    Reminder(Reminder),
}

#[derive(Clone)]
struct JobEntry {
    trigger: Trigger,
    next_run: Option<DateTime<Utc>>,
    kind: JobKind,
}

fn compute_next_run(trigger: &Trigger, now: DateTime<Utc>, tz_fallback: &str) -> Option<DateTime<Utc>> {
    match trigger {
        Trigger::OneShot(at) => {
            if *at > now {
                Some(*at)
            } else {
                None
            }
        }
        Trigger::Interval(d) => Some(now + chrono::Duration::from_std(*d).ok()?),
        Trigger::Cron { expr, tz } => {
            let normalized = validate_cron_expr(expr).ok()?;
            let schedule = Schedule::from_str(&normalized).ok()?;
            let tz_str = if tz.is_empty() { tz_fallback } else { tz };
            let zone: Tz = tz_str.parse().unwrap_or(chrono_tz::UTC);
            let now_tz = now.with_timezone(&zone);
            schedule.after(&now_tz).next().map(|dt| dt.with_timezone(&Utc))
        }
    }
}

/// Shared context every job dispatch needs, grouped so `Scheduler` itself
/// doesn't have to be threaded field-by-field through every job function.
pub struct Scheduler {
    config: Arc<Mutex<Config>>,
    config_path: PathBuf,
    transport: RpcTransport,
    companion: Arc<CompanionClient>,
    tts: Arc<TtsClient>,
    calendar: Arc<dyn CalendarTasks>,
    owner: String,
    default_companion: String,
    timezone: String,
    jobs: Mutex<HashMap<String, JobEntry>>,
    running: Arc<AtomicBool>,
    task_tracker: Arc<TaskTracker>,
}

impl Scheduler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: Arc<Mutex<Config>>,
        config_path: PathBuf,
        transport: RpcTransport,
        companion: Arc<CompanionClient>,
        tts: Arc<TtsClient>,
        calendar: Arc<dyn CalendarTasks>,
        owner: String,
        default_companion: String,
        timezone: Option<String>,
    ) -> Self {
        Self {
            config,
            config_path,
            transport,
            companion,
            tts,
            calendar,
            owner,
            default_companion,
            timezone: timezone.unwrap_or_else(detect_system_timezone),
            jobs: Mutex::new(HashMap::new()),
            running: Arc::new(AtomicBool::new(false)),
            task_tracker: Arc::new(TaskTracker::new()),
        }
    }

    async fn save_config(&self) {
        let snapshot = self.config.lock().await.clone();
        if let Err(e) = crate::config::save_config(&snapshot, Some(&self.config_path)) {
            warn!("failed to persist configuration: {e}");
        }
    }

    /// Registers the always-on maintenance jobs plus every enabled built-in
    /// task from the configuration document. Called once at startup; the
    /// user-authored registries (heartbeats/automations/reminders) are
    /// populated by the first reconciliation tick instead.
    pub async fn register_builtins(&self) {
        let mut jobs = self.jobs.lock().await;
        jobs.insert(
            CUSTOM_HEARTBEAT_RELOAD.to_string(),
            JobEntry { trigger: Trigger::Interval(Duration::from_secs(60)), next_run: None, kind: JobKind::BuiltIn(CUSTOM_HEARTBEAT_RELOAD.to_string()) },
        );
        jobs.insert(
            AUTOMATION_RELOAD.to_string(),
            JobEntry { trigger: Trigger::Interval(Duration::from_secs(60)), next_run: None, kind: JobKind::BuiltIn(AUTOMATION_RELOAD.to_string()) },
        );
        jobs.insert(
            TRIGGER_DRAIN.to_string(),
            JobEntry { trigger: Trigger::Interval(Duration::from_secs(10)), next_run: None, kind: JobKind::BuiltIn(TRIGGER_DRAIN.to_string()) },
        );
        jobs.insert(
            crate::config::TASK_REMINDER_POLL.to_string(),
            JobEntry { trigger: Trigger::Interval(Duration::from_secs(60)), next_run: None, kind: JobKind::BuiltIn(crate::config::TASK_REMINDER_POLL.to_string()) },
        );
        jobs.insert(
            crate::config::TASK_NOTIFICATION_DRAIN.to_string(),
            JobEntry { trigger: Trigger::Interval(Duration::from_secs(15)), next_run: None, kind: JobKind::BuiltIn(crate::config::TASK_NOTIFICATION_DRAIN.to_string()) },
        );
        drop(jobs);

        let config = self.config.lock().await.clone();
        self.register_time_based_task(&config, crate::config::TASK_MORNING_BRIEFING).await;
        self.register_time_based_task(&config, crate::config::TASK_WEATHER_CHECK).await;
        self.register_time_based_task(&config, crate::config::TASK_AURORA_FORECAST).await;
        self.register_time_based_task(&config, crate::config::TASK_DATABASE_BACKUP).await;
        self.register_interval_task(&config, crate::config::TASK_HEALTH_CHECK).await;
    }

    async fn register_time_based_task(&self, config: &Config, id: &str) {
        if !config.is_task_enabled(id) {
            return;
        }
        let Some(task) = config.tasks.get(id) else { return };
        let Some(times) = &task.time else { return };
        let mut jobs = self.jobs.lock().await;
        for (idx, time) in times.split(',').enumerate() {
            let Some(expr) = time_to_cron_expr(time) else { continue };
            let job_id = format!("{id}#{idx}");
            jobs.insert(
                job_id,
                JobEntry {
                    trigger: Trigger::Cron { expr, tz: self.timezone.clone() },
                    next_run: None,
                    kind: JobKind::BuiltIn(id.to_string()),
                },
            );
        }
    }

    async fn register_interval_task(&self, config: &Config, id: &str) {
        if !config.is_task_enabled(id) {
            return;
        }
        let Some(TaskConfig { interval_minutes: Some(minutes), .. }) = config.tasks.get(id) else { return };
        self.jobs.lock().await.insert(
            id.to_string(),
            JobEntry {
                trigger: Trigger::Interval(Duration::from_secs(minutes * 60)),
                next_run: None,
                kind: JobKind::BuiltIn(id.to_string()),
            },
        );
    }

    /// Adds/updates/removes registered interval jobs to match the
    /// configuration store's custom heartbeats, staggering new job start
    /// times by [`STAGGER_SECS_PER_JOB`] so many identical periods don't all
    /// fire in the same tick.
    async fn reconcile_custom_heartbeats(&self) {
        let heartbeats = self.config.lock().await.get_custom_heartbeats().to_vec();
        let mut jobs = self.jobs.lock().await;
        let prefix = "custom_hb_";

        let live_ids: std::collections::HashSet<String> =
            heartbeats.iter().map(|h| format!("{prefix}{}", h.id)).collect();
        jobs.retain(|id, _| !id.starts_with(prefix) || live_ids.contains(id));

        let now = Utc::now();
        for (idx, hb) in heartbeats.iter().enumerate() {
            let job_id = format!("{prefix}{}", hb.id);
            let interval = Duration::from_secs(hb.interval_minutes * 60);
            let needs_reschedule = match jobs.get(&job_id) {
                None => true,
                Some(entry) => !matches!(&entry.trigger, Trigger::Interval(d) if *d == interval),
            };
            if !hb.enabled {
                jobs.remove(&job_id);
                continue;
            }
            if needs_reschedule {
                let stagger = chrono::Duration::seconds(idx as i64 * STAGGER_SECS_PER_JOB);
                jobs.insert(
                    job_id,
                    JobEntry {
                        trigger: Trigger::Interval(interval),
                        next_run: Some(now + stagger),
                        kind: JobKind::CustomHeartbeat(hb.clone()),
                    },
                );
            } else if let Some(entry) = jobs.get_mut(&job_id) {
                entry.kind = JobKind::CustomHeartbeat(hb.clone());
            }
        }
    }

    async fn reconcile_automations(&self) {
        let automations = self.config.lock().await.automations.clone();
        let mut jobs = self.jobs.lock().await;
        let prefix = "auto_";

        let live_ids: std::collections::HashSet<String> =
            automations.iter().map(|a| format!("{prefix}{}", a.id)).collect();
        jobs.retain(|id, _| !id.starts_with(prefix) || live_ids.contains(id));

        for automation in &automations {
            let job_id = format!("{prefix}{}", automation.id);
            if !automation.enabled {
                jobs.remove(&job_id);
                continue;
            }
            let trigger = match &automation.schedule {
                crate::config::AutomationSchedule::Cron(expr) => {
                    Trigger::Cron { expr: expr.clone(), tz: self.timezone.clone() }
                }
                crate::config::AutomationSchedule::Interval { interval_minutes } => {
                    Trigger::Interval(Duration::from_secs((*interval_minutes).max(1) * 60))
                }
            };
            jobs.entry(job_id)
                .and_modify(|entry| entry.kind = JobKind::Automation(automation.clone()))
                .or_insert(JobEntry { trigger, next_run: None, kind: JobKind::Automation(automation.clone()) });
        }
    }

    async fn reconcile_reminders(&self) {
        let reminders = self.config.lock().await.get_reminders().to_vec();
        let mut jobs = self.jobs.lock().await;
        for reminder in reminders {
            let job_id = format!("reminder_{}", reminder.id);
            if jobs.contains_key(&job_id) {
                continue;
            }
            let Ok(remind_at) = reminder.remind_at.parse::<DateTime<Utc>>() else {
                warn!("reminder {} has an unparsable timestamp, dropping", reminder.id);
                continue;
            };
            jobs.insert(
                job_id,
                JobEntry { trigger: Trigger::OneShot(remind_at), next_run: Some(remind_at), kind: JobKind::Reminder(reminder) },
            );
        }
    }

    async fn drain_pending_triggers(&self) {
        let pending = {
            let mut config = self.config.lock().await;
            std::mem::take(&mut config.pending_triggers)
        };
        if pending.is_empty() {
            return;
        }
        self.save_config().await;
        for trigger in pending {
            let kind = {
                let jobs = self.jobs.lock().await;
                jobs.get(&trigger.task_id).map(|e| e.kind.clone())
            };
            if let Some(kind) = kind {
                self.dispatch(&trigger.task_id, &kind, true).await;
            } else {
                warn!("manual trigger '{}' references unknown task '{}'", trigger.id, trigger.task_id);
            }
        }
    }

    /// Runs the poll loop until [`Self::stop`] is called. Intended to be
    /// spawned once by the orchestrator at startup.
    pub async fn run(self: Arc<Self>) {
        self.running.store(true, Ordering::SeqCst);
        self.register_builtins().await;
        self.reconcile_custom_heartbeats().await;
        self.reconcile_automations().await;
        self.reconcile_reminders().await;

        let mut first_tick = true;
        while self.running.load(Ordering::SeqCst) {
            let now = Utc::now();
            let mut next_wake: Option<DateTime<Utc>> = None;

            let due: Vec<(String, JobKind)> = {
                let mut jobs = self.jobs.lock().await;
                let mut due = Vec::new();
                for (id, entry) in jobs.iter_mut() {
                    let job_next = entry.next_run.or_else(|| compute_next_run(&entry.trigger, now, &self.timezone));
                    let Some(job_next) = job_next else { continue };
                    if job_next <= now {
                        // Suppress the thundering-herd of periodic jobs whose
                        // next_run hasn't been computed yet on the very first
                        // tick. A one-shot reminder that's already past due
                        // (restored from a restart) must still fire though.
                        if first_tick && !matches!(entry.kind, JobKind::Reminder(_)) {
                            entry.next_run = compute_next_run(&entry.trigger, now, &self.timezone);
                        } else {
                            due.push((id.clone(), entry.kind.clone()));
                            entry.next_run = compute_next_run(&entry.trigger, now, &self.timezone);
                        }
                    } else {
                        entry.next_run = Some(job_next);
                        next_wake = Some(next_wake.map_or(job_next, |w: DateTime<Utc>| w.min(job_next)));
                    }
                }
                due
            };
            first_tick = false;

            for (id, kind) in due {
                if matches!(kind, JobKind::Reminder(_)) {
                    self.jobs.lock().await.remove(&id);
                }
                self.dispatch(&id, &kind, false).await;
            }

            self.drain_pending_triggers().await;
            self.reconcile_custom_heartbeats().await;
            self.reconcile_automations().await;
            self.reconcile_reminders().await;

            let delay_ms = match next_wake {
                Some(wake) => (wake - Utc::now()).num_milliseconds().max(MIN_SLEEP_MS) as u64,
                None => POLL_WHEN_EMPTY_SECS * 1000,
            };
            tokio::time::sleep(Duration::from_millis(delay_ms.min(MAX_SLEEP_MS))).await;
        }
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub async fn shutdown(&self) {
        self.stop();
        self.task_tracker.cancel_all().await;
    }
}

#[cfg(test)]
mod tests;
