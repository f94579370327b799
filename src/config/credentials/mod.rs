use super::Config;

/// Declares the small set of secrets this bridge accepts from the environment,
/// so deployments can inject them without touching the config file (containers,
/// systemd `EnvironmentFile=`, CI).
macro_rules! define_credentials {
    ($( $name:literal, $env:literal => $($path:ident).+ );* $(;)?) => {
        pub const CREDENTIAL_ENV_VARS: &[(&str, &str)] = &[$(($name, $env)),*];

        /// Apply any set, non-empty `BRIDGE_*` environment variable over the
        /// corresponding config field.
        pub fn apply_env_overrides(config: &mut Config) {
            $(
                if let Ok(val) = std::env::var($env)
                    && !val.is_empty()
                {
                    config.$($path).+ = val;
                }
            )*
        }
    };
}

define_credentials! {
    "companion-api-key",       "BRIDGE_COMPANION_API_KEY"      => companion_service.api_key;
    "tts-api-key",             "BRIDGE_TTS_API_KEY"             => tts.api_key;
    "stt-api-key",             "BRIDGE_STT_API_KEY"             => stt.api_key;
    "weather-api-key",         "BRIDGE_WEATHER_API_KEY"         => providers.weather.api_key;
    "search-api-key",          "BRIDGE_SEARCH_API_KEY"          => providers.search.api_key;
    "image-gen-api-key",       "BRIDGE_IMAGE_GEN_API_KEY"       => providers.image_gen.api_key;
    "vision-api-key",          "BRIDGE_VISION_API_KEY"          => providers.vision.api_key;
    "home-assistant-token",    "BRIDGE_HOME_ASSISTANT_TOKEN"    => providers.home_assistant.bearer_token;
}

/// The owner identifier and default companion are read directly from the
/// environment at startup (see [`crate::cli`]) rather than folded into
/// `apply_env_overrides`, since they gate message delivery and should never
/// be silently picked up from a stale config file.
pub fn owner_from_env() -> Option<String> {
    std::env::var("BRIDGE_OWNER").ok().filter(|s| !s.is_empty())
}

pub fn default_companion_from_env() -> Option<String> {
    std::env::var("BRIDGE_DEFAULT_COMPANION").ok().filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_override_applies_and_ignores_empty() {
        let mut config = Config::default();
        unsafe { std::env::set_var("BRIDGE_WEATHER_API_KEY", "wk-1") };
        apply_env_overrides(&mut config);
        assert_eq!(config.providers.weather.api_key, "wk-1");
        unsafe { std::env::remove_var("BRIDGE_WEATHER_API_KEY") };

        let mut config2 = Config::default();
        config2.providers.search.api_key = "keep-me".to_string();
        unsafe { std::env::set_var("BRIDGE_SEARCH_API_KEY", "") };
        apply_env_overrides(&mut config2);
        assert_eq!(config2.providers.search.api_key, "keep-me");
        unsafe { std::env::remove_var("BRIDGE_SEARCH_API_KEY") };
    }
}
