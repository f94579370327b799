use serde::{Deserialize, Serialize};

use super::redact_debug;

#[derive(Clone, Serialize, Deserialize)]
pub struct WeatherProviderConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, rename = "apiKey")]
    pub api_key: String,
    #[serde(default, rename = "defaultLocation")]
    pub default_location: String,
}

impl Default for WeatherProviderConfig {
    fn default() -> Self {
        Self { enabled: true, api_key: String::new(), default_location: String::new() }
    }
}

redact_debug!(WeatherProviderConfig, enabled, redact(api_key), default_location,);

#[derive(Clone, Serialize, Deserialize, Default)]
pub struct SearchProviderConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, rename = "apiKey")]
    pub api_key: String,
}

redact_debug!(SearchProviderConfig, enabled, redact(api_key),);

#[derive(Clone, Serialize, Deserialize, Default)]
pub struct ImageGenProviderConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, rename = "apiKey")]
    pub api_key: String,
    #[serde(default)]
    pub model: String,
}

redact_debug!(ImageGenProviderConfig, enabled, redact(api_key), model,);

#[derive(Clone, Serialize, Deserialize, Default)]
pub struct VisionProviderConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, rename = "apiKey")]
    pub api_key: String,
}

redact_debug!(VisionProviderConfig, enabled, redact(api_key),);

#[derive(Clone, Serialize, Deserialize, Default)]
pub struct HomeAssistantConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, rename = "baseUrl")]
    pub base_url: String,
    #[serde(default, rename = "bearerToken")]
    pub bearer_token: String,
}

redact_debug!(HomeAssistantConfig, enabled, base_url, redact(bearer_token),);

/// Provider-settings sub-objects merged into the per-turn LLM `settings` block
/// that the companion client sends alongside a user message, and consulted
/// directly by the scheduler's condition evaluator (weather, calendar,
/// home-automation entity state).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProviderSettings {
    #[serde(default)]
    pub weather: WeatherProviderConfig,
    #[serde(default)]
    pub search: SearchProviderConfig,
    #[serde(default, rename = "imageGen")]
    pub image_gen: ImageGenProviderConfig,
    #[serde(default)]
    pub vision: VisionProviderConfig,
    #[serde(default, rename = "homeAssistant")]
    pub home_assistant: HomeAssistantConfig,
}
