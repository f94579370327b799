use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

/// A single step of an automation: "use the `tool_name` tool with these
/// arguments". The scheduler never calls the tool directly — it renders a
/// deterministic prompt enumerating the steps and hands it to the companion,
/// which is the one actually holding tool-calling capability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomationStep {
    #[serde(rename = "toolName")]
    pub tool_name: String,
    #[serde(default)]
    pub arguments: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AutomationSchedule {
    Cron(String),
    Interval {
        #[serde(rename = "intervalMinutes")]
        interval_minutes: u64,
    },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConditionLogic {
    All,
    Any,
}

impl Default for ConditionLogic {
    fn default() -> Self {
        Self::All
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum CompareOp {
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
}

impl CompareOp {
    pub fn apply(self, lhs: f64, rhs: f64) -> bool {
        match self {
            Self::Lt => lhs < rhs,
            Self::Gt => lhs > rhs,
            Self::Le => lhs <= rhs,
            Self::Ge => lhs >= rhs,
            Self::Eq => (lhs - rhs).abs() < f64::EPSILON,
            Self::Ne => (lhs - rhs).abs() >= f64::EPSILON,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum WeatherField {
    Temperature,
    WindSpeed,
    Humidity,
}

/// Tagged-variant condition evaluated by the scheduler before an automation
/// runs. Encoded as a `kind` discriminator plus per-variant payload, matching
/// the shape of other tagged records in this document (`CronSchedule`-style)
/// rather than an interface-by-string lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Condition {
    NoCondition,
    Weather {
        field: WeatherField,
        op: CompareOp,
        value: f64,
    },
    TimeRange {
        after: String,
        before: String,
    },
    DayOfWeek {
        /// Sunday = 0, per the spec's convention (distinct from chrono's Monday = 0).
        days: Vec<u8>,
    },
    Calendar {
        #[serde(rename = "hasEvents", default)]
        has_events: Option<bool>,
        #[serde(default)]
        keyword: Option<String>,
    },
    HomeAssistant {
        #[serde(rename = "entityId")]
        entity_id: String,
        op: CompareOp,
        #[serde(rename = "haValue")]
        ha_value: serde_json::Value,
    },
}

impl Default for Condition {
    fn default() -> Self {
        Self::NoCondition
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LastResult {
    Success,
    Partial,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CooldownConfig {
    pub minutes: u64,
}

/// A scheduled, conditional sequence of tool-call steps executed by a
/// companion on the owner's behalf. Reconciled against the configuration
/// document every hot-reload tick using `id` as the stable key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Automation {
    pub id: String,
    pub name: String,
    #[serde(rename = "choomName")]
    pub choom_name: String,
    pub steps: Vec<AutomationStep>,
    pub schedule: AutomationSchedule,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_true", rename = "respectQuiet")]
    pub respect_quiet: bool,
    #[serde(default, rename = "notifyOnComplete")]
    pub notify_on_complete: bool,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default, rename = "conditionLogic")]
    pub condition_logic: ConditionLogic,
    #[serde(default)]
    pub cooldown: Option<CooldownConfig>,
    #[serde(default, rename = "lastConditionMet")]
    pub last_condition_met: Option<i64>,
    #[serde(default, rename = "lastRun")]
    pub last_run: Option<i64>,
    #[serde(default, rename = "lastResult")]
    pub last_result: Option<LastResult>,
}
