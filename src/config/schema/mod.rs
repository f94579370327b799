use serde::{Deserialize, Serialize};
use std::collections::HashMap;

mod automation;
mod providers;
mod reminder;
mod task;

pub use automation::{
    Automation, AutomationSchedule, AutomationStep, CompareOp, Condition, ConditionLogic,
    CooldownConfig, LastResult, WeatherField,
};
pub use providers::{
    HomeAssistantConfig, ImageGenProviderConfig, ProviderSettings, SearchProviderConfig,
    VisionProviderConfig, WeatherProviderConfig,
};
pub use reminder::Reminder;
pub use task::{CustomHeartbeat, HeartbeatConfig, TaskConfig};

/// Generates a `Debug` impl that redacts secret fields.
///
/// Field specifiers:
/// - `field_name`            — printed normally via `&self.field_name`
/// - `redact(field_name)`    — `String` field: shows `[empty]` or `[REDACTED]`
/// - `redact_option(field_name)` — `Option<String>` field: shows `None` or `Some("[REDACTED]")`
macro_rules! redact_debug {
    (@field $builder:ident, $self:ident, redact($field:ident)) => {
        $builder.field(
            stringify!($field),
            &if $self.$field.is_empty() { "[empty]" } else { "[REDACTED]" },
        );
    };
    (@field $builder:ident, $self:ident, redact_option($field:ident)) => {
        $builder.field(stringify!($field), &$self.$field.as_ref().map(|_| "[REDACTED]"));
    };
    (@field $builder:ident, $self:ident, $field:ident) => {
        $builder.field(stringify!($field), &$self.$field);
    };
    (@fields $builder:ident, $self:ident,) => {};
    (@fields $builder:ident, $self:ident, redact($field:ident), $($rest:tt)*) => {
        redact_debug!(@field $builder, $self, redact($field));
        redact_debug!(@fields $builder, $self, $($rest)*);
    };
    (@fields $builder:ident, $self:ident, redact_option($field:ident), $($rest:tt)*) => {
        redact_debug!(@field $builder, $self, redact_option($field));
        redact_debug!(@fields $builder, $self, $($rest)*);
    };
    (@fields $builder:ident, $self:ident, $field:ident, $($rest:tt)*) => {
        redact_debug!(@field $builder, $self, $field);
        redact_debug!(@fields $builder, $self, $($rest)*);
    };
    ($struct_name:ident, $($fields:tt)*) => {
        impl std::fmt::Debug for $struct_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                let mut builder = f.debug_struct(stringify!($struct_name));
                redact_debug!(@fields builder, self, $($fields)*);
                builder.finish()
            }
        }
    };
}
pub(crate) use redact_debug;

fn default_poll_interval() -> u64 {
    2
}

fn default_directory_ttl_secs() -> u64 {
    60
}

fn default_reconnect_delay_ms() -> u64 {
    1500
}

fn default_connect_timeout_secs() -> u64 {
    30
}

#[derive(Clone, Serialize, Deserialize)]
pub struct SignalConfig {
    #[serde(default, rename = "socketPath")]
    pub socket_path: String,
    #[serde(default, rename = "attachmentsDir")]
    pub attachments_dir: String,
    #[serde(default = "default_connect_timeout_secs", rename = "connectTimeoutSecs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_reconnect_delay_ms", rename = "reconnectDelayMs")]
    pub reconnect_delay_ms: u64,
    #[serde(default = "default_poll_interval", rename = "pollIntervalSecs")]
    pub poll_interval_secs: u64,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            socket_path: String::new(),
            attachments_dir: String::new(),
            connect_timeout_secs: default_connect_timeout_secs(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            poll_interval_secs: default_poll_interval(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct CompanionServiceConfig {
    #[serde(default = "default_companion_base_url", rename = "baseUrl")]
    pub base_url: String,
    #[serde(default, rename = "apiKey")]
    pub api_key: String,
    #[serde(default = "default_directory_ttl_secs", rename = "directoryTtlSecs")]
    pub directory_ttl_secs: u64,
    #[serde(default = "default_chat_title_prefix", rename = "chatTitlePrefix")]
    pub chat_title_prefix: String,
}

fn default_companion_base_url() -> String {
    "http://127.0.0.1:4000".to_string()
}

fn default_chat_title_prefix() -> String {
    "Signal Conversation".to_string()
}

impl Default for CompanionServiceConfig {
    fn default() -> Self {
        Self {
            base_url: default_companion_base_url(),
            api_key: String::new(),
            directory_ttl_secs: default_directory_ttl_secs(),
            chat_title_prefix: default_chat_title_prefix(),
        }
    }
}

redact_debug!(CompanionServiceConfig, base_url, redact(api_key), directory_ttl_secs, chat_title_prefix,);

#[derive(Clone, Serialize, Deserialize)]
pub struct TtsConfig {
    #[serde(default = "default_tts_base_url", rename = "baseUrl")]
    pub base_url: String,
    #[serde(default, rename = "apiKey")]
    pub api_key: String,
    #[serde(default = "default_voice", rename = "defaultVoice")]
    pub default_voice: String,
}

fn default_tts_base_url() -> String {
    "http://127.0.0.1:8880/v1".to_string()
}

fn default_voice() -> String {
    "alloy".to_string()
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            base_url: default_tts_base_url(),
            api_key: String::new(),
            default_voice: default_voice(),
        }
    }
}

redact_debug!(TtsConfig, base_url, redact(api_key), default_voice,);

#[derive(Clone, Serialize, Deserialize)]
pub struct SttConfig {
    #[serde(default = "default_stt_base_url", rename = "baseUrl")]
    pub base_url: String,
    #[serde(default, rename = "apiKey")]
    pub api_key: String,
    #[serde(default = "default_stt_model")]
    pub model: String,
}

fn default_stt_base_url() -> String {
    "http://127.0.0.1:8880/v1".to_string()
}

fn default_stt_model() -> String {
    "whisper-1".to_string()
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            base_url: default_stt_base_url(),
            api_key: String::new(),
            model: default_stt_model(),
        }
    }
}

redact_debug!(SttConfig, base_url, redact(api_key), model,);

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BackupConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, rename = "destDir")]
    pub dest_dir: String,
    #[serde(default, rename = "dbPaths")]
    pub db_paths: Vec<String>,
    #[serde(default = "default_keep_count", rename = "keepCount")]
    pub keep_count: usize,
}

fn default_keep_count() -> usize {
    5
}

/// Root configuration document. Every reachable field carries `#[serde(default)]`
/// (directly or via a `Default` impl on its type) so that deserializing a partial
/// or older document over this schema always yields a fully-typed value — the
/// deep-merge-with-defaults behaviour lives in the derive, not in loader logic.
#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default, rename = "owner")]
    pub owner: String,
    #[serde(default, rename = "defaultCompanion")]
    pub default_companion: String,
    #[serde(default)]
    pub signal: SignalConfig,
    #[serde(default, rename = "companionService")]
    pub companion_service: CompanionServiceConfig,
    #[serde(default)]
    pub tts: TtsConfig,
    #[serde(default)]
    pub stt: SttConfig,
    #[serde(default)]
    pub tasks: HashMap<String, TaskConfig>,
    #[serde(default)]
    pub heartbeat: HeartbeatConfig,
    #[serde(default)]
    pub automations: Vec<Automation>,
    #[serde(default)]
    pub reminders: Vec<Reminder>,
    #[serde(default, rename = "pendingTriggers")]
    pub pending_triggers: Vec<PendingTrigger>,
    #[serde(default)]
    pub providers: ProviderSettings,
    #[serde(default)]
    pub backup: BackupConfig,
    /// Companion-name variant table: misheard/mis-spelled form -> canonical name.
    #[serde(default = "default_variants")]
    pub variants: HashMap<String, String>,
    #[serde(default = "default_filler_words", rename = "fillerWords")]
    pub filler_words: Vec<String>,
}

redact_debug!(
    Config,
    owner,
    default_companion,
    signal,
    companion_service,
    tts,
    stt,
    tasks,
    heartbeat,
    automations,
    reminders,
    pending_triggers,
    providers,
    backup,
    variants,
    filler_words,
);

fn default_variants() -> HashMap<String, String> {
    let mut m = HashMap::new();
    m.insert("lisa".to_string(), "Lissa".to_string());
    m.insert("alloy".to_string(), "Aloy".to_string());
    m
}

fn default_filler_words() -> Vec<String> {
    ["hey", "hi", "hello", "please", "ok", "okay", "so", "um"]
        .into_iter()
        .map(String::from)
        .collect()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            owner: String::new(),
            default_companion: String::new(),
            signal: SignalConfig::default(),
            companion_service: CompanionServiceConfig::default(),
            tts: TtsConfig::default(),
            stt: SttConfig::default(),
            tasks: default_tasks(),
            heartbeat: HeartbeatConfig::default(),
            automations: Vec::new(),
            reminders: Vec::new(),
            pending_triggers: Vec::new(),
            providers: ProviderSettings::default(),
            backup: BackupConfig::default(),
            variants: default_variants(),
            filler_words: default_filler_words(),
        }
    }
}

/// Built-in scheduled task ids and their defaults.
pub const TASK_MORNING_BRIEFING: &str = "morning_briefing";
pub const TASK_WEATHER_CHECK: &str = "weather_check";
pub const TASK_AURORA_FORECAST: &str = "aurora_forecast";
pub const TASK_HEALTH_CHECK: &str = "health_check";
pub const TASK_DATABASE_BACKUP: &str = "database_backup";
pub const TASK_NOTIFICATION_DRAIN: &str = "notification_drain";
pub const TASK_REMINDER_POLL: &str = "reminder_poll";

fn default_tasks() -> HashMap<String, TaskConfig> {
    let mut tasks = HashMap::new();
    tasks.insert(
        TASK_MORNING_BRIEFING.to_string(),
        TaskConfig { enabled: true, time: Some("07:00".to_string()), interval_minutes: None },
    );
    tasks.insert(
        TASK_WEATHER_CHECK.to_string(),
        TaskConfig { enabled: false, time: Some("08:00,12:00,18:00".to_string()), interval_minutes: None },
    );
    tasks.insert(
        TASK_AURORA_FORECAST.to_string(),
        TaskConfig { enabled: false, time: Some("22:00,02:00".to_string()), interval_minutes: None },
    );
    tasks.insert(
        TASK_HEALTH_CHECK.to_string(),
        TaskConfig { enabled: true, time: None, interval_minutes: Some(15) },
    );
    tasks.insert(
        TASK_DATABASE_BACKUP.to_string(),
        TaskConfig { enabled: false, time: Some("03:30".to_string()), interval_minutes: None },
    );
    tasks.insert(
        TASK_NOTIFICATION_DRAIN.to_string(),
        TaskConfig { enabled: true, time: None, interval_minutes: None },
    );
    tasks.insert(
        TASK_REMINDER_POLL.to_string(),
        TaskConfig { enabled: true, time: None, interval_minutes: None },
    );
    tasks
}

/// An item written by an external UI (e.g. a web dashboard) and drained by the
/// scheduler's trigger-drain job. `kind` selects which registry the `task_id`
/// is looked up in: a built-in task id, a `custom_hb_<id>` heartbeat, or an
/// `auto_<id>` automation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingTrigger {
    pub id: String,
    #[serde(rename = "taskId")]
    pub task_id: String,
}

impl Config {
    /// Basic structural validation. Unlike the agent-framework this bridge is
    /// built within, most fields are free-form strings with no cross-field
    /// invariants, so validation only guards against configurations that would
    /// make the scheduler or transport malfunction at startup.
    pub fn validate(&self) -> anyhow::Result<()> {
        for custom in &self.heartbeat.custom_tasks {
            if custom.interval_minutes < 5 {
                anyhow::bail!(
                    "heartbeat.custom_tasks ('{}'): interval_minutes must be >= 5",
                    custom.id
                );
            }
        }
        for automation in &self.automations {
            if let AutomationSchedule::Interval { interval_minutes } = &automation.schedule
                && *interval_minutes == 0
            {
                anyhow::bail!("automation '{}': interval schedule must be > 0 minutes", automation.id);
            }
        }
        Ok(())
    }
}
