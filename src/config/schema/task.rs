use serde::{Deserialize, Serialize};

/// A built-in scheduled task's configuration slice (`tasks.<id>` in the
/// document). `time` holds one or more `HH:MM` cron-style fire times
/// (comma-separated for tasks that fire more than once a day, e.g. weather
/// checks); `interval_minutes` is used instead for fixed-interval tasks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default, rename = "intervalMinutes")]
    pub interval_minutes: Option<u64>,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self { enabled: false, time: None, interval_minutes: None }
    }
}

fn default_quiet_start() -> String {
    "21:00".to_string()
}

fn default_quiet_end() -> String {
    "07:00".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatConfig {
    #[serde(default = "default_quiet_start", rename = "quietStart")]
    pub quiet_start: String,
    #[serde(default = "default_quiet_end", rename = "quietEnd")]
    pub quiet_end: String,
    #[serde(default, rename = "customTasks")]
    pub custom_tasks: Vec<CustomHeartbeat>,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            quiet_start: default_quiet_start(),
            quiet_end: default_quiet_end(),
            custom_tasks: Vec::new(),
        }
    }
}

fn default_min_interval() -> u64 {
    5
}

fn default_true() -> bool {
    true
}

/// A user-authored autonomous heartbeat: a fixed prompt sent to a named
/// companion on a period, hot-reloaded from the configuration document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomHeartbeat {
    pub id: String,
    #[serde(rename = "choomName")]
    pub choom_name: String,
    #[serde(rename = "intervalMinutes", default = "default_min_interval")]
    pub interval_minutes: u64,
    pub prompt: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_true", rename = "respectQuiet")]
    pub respect_quiet: bool,
}
