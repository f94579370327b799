pub mod credentials;
pub mod loader;
pub mod schema;

pub use loader::{get_config_path, load_config, save_config};
pub use schema::{
    Automation, AutomationSchedule, AutomationStep, BackupConfig, CompanionServiceConfig,
    CompareOp, Condition, ConditionLogic, Config, CooldownConfig, CustomHeartbeat,
    HeartbeatConfig, HomeAssistantConfig, ImageGenProviderConfig, LastResult, PendingTrigger,
    ProviderSettings, Reminder, SearchProviderConfig, SignalConfig, SttConfig, TaskConfig,
    TtsConfig, VisionProviderConfig, WeatherField, WeatherProviderConfig, TASK_AURORA_FORECAST,
    TASK_DATABASE_BACKUP, TASK_HEALTH_CHECK, TASK_MORNING_BRIEFING, TASK_NOTIFICATION_DRAIN,
    TASK_REMINDER_POLL, TASK_WEATHER_CHECK,
};

/// Convenience accessors layered over the raw document. These are the only
/// sanctioned way other modules touch configuration state day-to-day; direct
/// field access is reserved for the loader, the CLI, and tests.
impl Config {
    pub fn is_task_enabled(&self, id: &str) -> bool {
        self.tasks.get(id).is_some_and(|t| t.enabled)
    }

    /// `minute_of_day` is 0..1440. Overnight ranges (`start > end`) wrap
    /// across midnight and are evaluated as a disjunction.
    pub fn is_quiet_period_at(&self, minute_of_day: u32) -> bool {
        let Some(start) = parse_hhmm(&self.heartbeat.quiet_start) else { return false };
        let Some(end) = parse_hhmm(&self.heartbeat.quiet_end) else { return false };
        if start <= end {
            minute_of_day >= start && minute_of_day < end
        } else {
            minute_of_day >= start || minute_of_day < end
        }
    }

    pub fn is_quiet_period(&self) -> bool {
        let now = chrono::Local::now();
        self.is_quiet_period_at(now.hour() * 60 + now.minute())
    }

    pub fn get_reminders(&self) -> &[Reminder] {
        &self.reminders
    }

    pub fn add_reminder(&mut self, reminder: Reminder) {
        self.reminders.push(reminder);
    }

    /// Returns `true` if a reminder with the given id was present and removed.
    pub fn remove_reminder(&mut self, id: &str) -> bool {
        let before = self.reminders.len();
        self.reminders.retain(|r| r.id != id);
        self.reminders.len() != before
    }

    pub fn get_custom_heartbeats(&self) -> &[CustomHeartbeat] {
        &self.heartbeat.custom_tasks
    }

    pub fn save_custom_heartbeats(&mut self, heartbeats: Vec<CustomHeartbeat>) {
        self.heartbeat.custom_tasks = heartbeats;
    }
}

fn parse_hhmm(s: &str) -> Option<u32> {
    let (h, m) = s.split_once(':')?;
    let h: u32 = h.parse().ok()?;
    let m: u32 = m.parse().ok()?;
    Some(h * 60 + m)
}

use chrono::Timelike;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiet_period_overnight_wraps_midnight() {
        let mut config = Config::default();
        config.heartbeat.quiet_start = "21:00".to_string();
        config.heartbeat.quiet_end = "07:00".to_string();
        assert!(config.is_quiet_period_at(22 * 60));
        assert!(config.is_quiet_period_at(3 * 60));
        assert!(!config.is_quiet_period_at(12 * 60));
    }

    #[test]
    fn quiet_period_same_day_range() {
        let mut config = Config::default();
        config.heartbeat.quiet_start = "13:00".to_string();
        config.heartbeat.quiet_end = "14:00".to_string();
        assert!(config.is_quiet_period_at(13 * 60 + 30));
        assert!(!config.is_quiet_period_at(15 * 60));
    }

    #[test]
    fn task_enabled_reflects_document() {
        let config = Config::default();
        assert!(config.is_task_enabled(TASK_MORNING_BRIEFING));
        assert!(!config.is_task_enabled(TASK_WEATHER_CHECK));
        assert!(!config.is_task_enabled("unknown"));
    }

    #[test]
    fn reminder_add_and_remove_round_trips() {
        let mut config = Config::default();
        config.add_reminder(Reminder {
            id: "r1".to_string(),
            text: "call mom".to_string(),
            remind_at: "2026-01-01T00:00:00Z".to_string(),
            created_at: "2025-12-31T00:00:00Z".to_string(),
        });
        assert_eq!(config.get_reminders().len(), 1);
        assert!(config.remove_reminder("r1"));
        assert!(config.get_reminders().is_empty());
        assert!(!config.remove_reminder("r1"));
    }
}
