//! Thin OpenAI-compatible clients for speech synthesis and transcription.

use anyhow::{Context, Result, bail};
use reqwest::Client;
use serde_json::json;

pub struct TtsClient {
    base_url: String,
    api_key: String,
    default_voice: String,
    client: Client,
}

impl TtsClient {
    pub fn new(base_url: String, api_key: String, default_voice: String) -> Self {
        Self { base_url, api_key, default_voice, client: crate::utils::http::default_http_client() }
    }

    fn auth(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if self.api_key.is_empty() { builder } else { builder.bearer_auth(&self.api_key) }
    }

    /// Synthesize `text` with `voice` (falls back to the configured default
    /// voice when absent). Returns raw audio bytes (MP3).
    pub async fn synthesize(&self, text: &str, voice: Option<&str>) -> Result<Vec<u8>> {
        let voice = voice.unwrap_or(&self.default_voice);
        let resp = self
            .auth(self.client.post(format!("{}/audio/speech", self.base_url)))
            .json(&json!({ "model": "tts-1", "input": text, "voice": voice, "response_format": "mp3" }))
            .send()
            .await
            .context("failed to reach TTS service")?;
        if !resp.status().is_success() {
            bail!("TTS service returned {}", resp.status());
        }
        let (bytes, _truncated) =
            crate::utils::http::limited_body(resp, crate::utils::http::DEFAULT_MAX_BODY_BYTES).await?;
        Ok(bytes)
    }
}

pub struct SttClient {
    base_url: String,
    api_key: String,
    model: String,
    client: Client,
}

impl SttClient {
    pub fn new(base_url: String, api_key: String, model: String) -> Self {
        Self { base_url, api_key, model, client: crate::utils::http::default_http_client() }
    }

    fn auth(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if self.api_key.is_empty() { builder } else { builder.bearer_auth(&self.api_key) }
    }

    /// Transcribe a voice-note's raw audio bytes to text.
    pub async fn transcribe(&self, audio: Vec<u8>, filename: &str) -> Result<String> {
        let part = reqwest::multipart::Part::bytes(audio).file_name(filename.to_string());
        let form = reqwest::multipart::Form::new().part("file", part).text("model", self.model.clone());
        let resp = self
            .auth(self.client.post(format!("{}/audio/transcriptions", self.base_url)))
            .multipart(form)
            .send()
            .await
            .context("failed to reach STT service")?;
        if !resp.status().is_success() {
            bail!("STT service returned {}", resp.status());
        }
        let body: serde_json::Value = resp.json().await.context("failed to parse STT response")?;
        body["text"]
            .as_str()
            .map(str::to_string)
            .context("STT response missing text field")
    }
}

#[cfg(test)]
mod tests;
