//! HTTP/SSE client for the companion service: directory cache, chat-handle
//! cache, streaming chat turns, and the user-activity map the scheduler
//! consults before sending an autonomous message.

use crate::config::ProviderSettings;
use crate::errors::BridgeError;
use anyhow::{Context, Result};
use futures_util::StreamExt;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, warn};

mod sse;
pub use sse::{ChatEvent, parse_sse_chunk};

const STREAM_CHUNK_TIMEOUT_SECS: u64 = 120;
const USER_ACTIVE_WINDOW_SECS: i64 = 120;

#[derive(Debug, Clone, Deserialize)]
pub struct Companion {
    pub id: String,
    pub name: String,
    #[serde(rename = "voiceId", default)]
    pub voice_id: Option<String>,
    #[serde(default)]
    pub settings: Value,
}

#[derive(Debug, Clone, Default)]
pub struct ChatResponse {
    pub content: String,
    pub images: Vec<GeneratedImage>,
}

#[derive(Debug, Clone)]
pub struct GeneratedImage {
    pub url: Option<String>,
    pub id: Option<String>,
    pub prompt: Option<String>,
}

struct Directory {
    companions: Vec<Companion>,
    fetched_at: Instant,
}

/// Talks to the companion HTTP backend. One instance is shared process-wide.
pub struct CompanionClient {
    base_url: String,
    api_key: String,
    ttl: Duration,
    client: Client,
    directory: Mutex<Option<Directory>>,
    chat_handles: Mutex<HashMap<String, String>>,
    last_activity: Mutex<HashMap<String, chrono::DateTime<chrono::Utc>>>,
}

impl CompanionClient {
    pub fn new(base_url: String, api_key: String, ttl: Duration) -> Self {
        Self {
            base_url,
            api_key,
            ttl,
            client: crate::utils::http::default_http_client(),
            directory: Mutex::new(None),
            chat_handles: Mutex::new(HashMap::new()),
            last_activity: Mutex::new(HashMap::new()),
        }
    }

    fn auth(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if self.api_key.is_empty() {
            builder
        } else {
            builder.bearer_auth(&self.api_key)
        }
    }

    pub async fn fetch_companions(&self) -> Result<(), BridgeError> {
        let resp = self
            .auth(self.client.get(format!("{}/api/chooms", self.base_url)))
            .send()
            .await
            .map_err(|e| BridgeError::UpstreamUnavailable { message: e.to_string(), retryable: true })?;
        if !resp.status().is_success() {
            return Err(BridgeError::UpstreamUnavailable {
                message: format!("GET /api/chooms returned {}", resp.status()),
                retryable: resp.status().is_server_error(),
            });
        }
        let companions: Vec<Companion> = resp
            .json()
            .await
            .map_err(|e| BridgeError::Internal(anyhow::anyhow!(e)))?;
        *self.directory.lock().await = Some(Directory { companions, fetched_at: Instant::now() });
        Ok(())
    }

    /// Re-fetches the directory if the cached copy is older than the
    /// configured TTL. On fetch failure, retains the stale view.
    async fn ensure_fresh(&self) {
        let stale = {
            let dir = self.directory.lock().await;
            match dir.as_ref() {
                Some(d) => d.fetched_at.elapsed() > self.ttl,
                None => true,
            }
        };
        if stale && let Err(e) = self.fetch_companions().await {
            warn!("companion directory refresh failed, using stale view: {e}");
        }
    }

    pub async fn get_by_name(&self, name: &str) -> Option<Companion> {
        self.ensure_fresh().await;
        let dir = self.directory.lock().await;
        dir.as_ref()?.companions.iter().find(|c| c.name.eq_ignore_ascii_case(name)).cloned()
    }

    pub async fn get_by_id(&self, id: &str) -> Option<Companion> {
        self.ensure_fresh().await;
        let dir = self.directory.lock().await;
        dir.as_ref()?.companions.iter().find(|c| c.id == id).cloned()
    }

    pub async fn list_names(&self) -> Vec<String> {
        self.ensure_fresh().await;
        let dir = self.directory.lock().await;
        dir.as_ref().map(|d| d.companions.iter().map(|c| c.name.clone()).collect()).unwrap_or_default()
    }

    async fn create_chat(&self, companion_id: &str, title: &str) -> Result<String, BridgeError> {
        let resp = self
            .auth(self.client.post(format!("{}/api/chats", self.base_url)))
            .json(&json!({ "choomId": companion_id, "title": title }))
            .send()
            .await
            .map_err(|e| BridgeError::UpstreamUnavailable { message: e.to_string(), retryable: true })?;
        if !resp.status().is_success() {
            return Err(BridgeError::UpstreamUnavailable {
                message: format!("POST /api/chats returned {}", resp.status()),
                retryable: resp.status().is_server_error(),
            });
        }
        let body: Value = resp.json().await.map_err(|e| BridgeError::Internal(anyhow::anyhow!(e)))?;
        body["id"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| BridgeError::Internal(anyhow::anyhow!("chat creation response missing id")))
    }

    pub async fn get_or_create_chat(&self, companion_id: &str) -> Result<String, BridgeError> {
        if let Some(id) = self.chat_handles.lock().await.get(companion_id) {
            return Ok(id.clone());
        }
        let chat_id = self.create_chat(companion_id, "Signal Conversation").await?;
        self.chat_handles.lock().await.insert(companion_id.to_string(), chat_id.clone());
        Ok(chat_id)
    }

    pub async fn record_user_activity(&self, companion_name: &str) {
        self.last_activity.lock().await.insert(companion_name.to_string(), chrono::Utc::now());
    }

    pub async fn is_user_active(&self, companion_name: &str, window_secs: i64) -> bool {
        let Some(last) = self.last_activity.lock().await.get(companion_name).copied() else {
            return false;
        };
        (chrono::Utc::now() - last).num_seconds() < window_secs
    }

    pub async fn is_user_active_default(&self, companion_name: &str) -> bool {
        self.is_user_active(companion_name, USER_ACTIVE_WINDOW_SECS).await
    }

    /// Deep-merges settings: client defaults < store settings < per-call
    /// override < per-companion directory override (highest).
    fn build_settings(
        &self,
        store_settings: &ProviderSettings,
        call_override: Option<&Value>,
        companion_settings: &Value,
    ) -> Value {
        let mut merged = json!({});
        deep_merge(&mut merged, &json!({ "weather": store_settings.weather, "search": store_settings.search, "imageGen": store_settings.image_gen, "vision": store_settings.vision }));
        if let Some(over) = call_override {
            deep_merge(&mut merged, over);
        }
        if companion_settings.is_object() {
            deep_merge(&mut merged, companion_settings);
        }
        merged
    }

    /// Sends a user turn and streams the response. `fresh_chat` opens a
    /// one-off chat titled `Briefing <date>` instead of reusing the cache.
    pub async fn send_message(
        &self,
        companion_name: &str,
        text: &str,
        store_settings: &ProviderSettings,
        call_settings: Option<&Value>,
        fresh_chat: bool,
    ) -> Result<ChatResponse, BridgeError> {
        let companion = self
            .get_by_name(companion_name)
            .await
            .ok_or_else(|| BridgeError::CompanionNotFound(companion_name.to_string()))?;

        let chat_id = if fresh_chat {
            let title = format!("Briefing {}", chrono::Utc::now().format("%Y-%m-%d"));
            self.create_chat(&companion.id, &title).await?
        } else {
            self.get_or_create_chat(&companion.id).await?
        };

        let settings = self.build_settings(store_settings, call_settings, &companion.settings);
        let payload = json!({ "chatId": chat_id, "message": text, "settings": settings });

        let resp = self
            .auth(self.client.post(format!("{}/api/chat", self.base_url)))
            .json(&payload)
            .send()
            .await
            .map_err(|e| BridgeError::UpstreamUnavailable { message: e.to_string(), retryable: true })?;
        if !resp.status().is_success() {
            return Err(BridgeError::UpstreamUnavailable {
                message: format!("POST /api/chat returned {}", resp.status()),
                retryable: resp.status().is_server_error(),
            });
        }

        let mut content = String::new();
        let mut images = Vec::new();
        let mut buf = String::new();
        let mut stream = resp.bytes_stream();
        loop {
            let chunk = tokio::time::timeout(Duration::from_secs(STREAM_CHUNK_TIMEOUT_SECS), stream.next())
                .await
                .map_err(|_| BridgeError::RpcTimeout(Duration::from_secs(STREAM_CHUNK_TIMEOUT_SECS)))?;
            let Some(chunk) = chunk else { break };
            let chunk = chunk.map_err(|e| BridgeError::Internal(anyhow::anyhow!(e)))?;
            buf.push_str(&String::from_utf8_lossy(&chunk));

            let events = parse_sse_chunk(&buf);
            if let Some(last_double_newline) = buf.rfind("\n\n") {
                buf = buf[last_double_newline + 2..].to_string();
            }

            for event in events {
                match event {
                    ChatEvent::Content(text) => content.push_str(&text),
                    ChatEvent::ToolCall(v) | ChatEvent::ToolResult(v) => {
                        debug!("companion tool activity: {v}");
                    }
                    ChatEvent::ImageGenerated { url, id, prompt } => {
                        images.push(GeneratedImage { url, id, prompt });
                    }
                    ChatEvent::Done => return Ok(ChatResponse { content, images }),
                    ChatEvent::Error(message) => {
                        return Err(BridgeError::UpstreamUnavailable { message, retryable: false });
                    }
                }
            }
        }
        Ok(ChatResponse { content, images })
    }

    /// Posts the set of downstream endpoints the owner cares about and
    /// returns the per-service status the companion backend observed.
    /// Keyed by service name, e.g. `{"signal": {"status": "connected"}}`.
    pub async fn fetch_health(&self, endpoints: &Value) -> Result<Value> {
        let resp = self
            .auth(self.client.post(format!("{}/api/health", self.base_url)))
            .json(&json!({ "endpoints": endpoints }))
            .send()
            .await
            .context("failed to reach companion health endpoint")?;
        resp.json::<Value>().await.context("failed to parse health response")
    }

    pub async fn fetch_weather(&self) -> Result<Value> {
        let resp = self
            .auth(self.client.get(format!("{}/api/weather", self.base_url)))
            .send()
            .await
            .context("failed to reach companion weather endpoint")?;
        resp.json::<Value>().await.context("failed to parse weather response")
    }

    pub async fn fetch_notifications(&self) -> Result<Vec<Value>> {
        let resp = self
            .auth(self.client.get(format!("{}/api/notifications", self.base_url)))
            .send()
            .await
            .context("failed to reach companion notifications endpoint")?;
        let body: Value = resp.json().await.context("failed to parse notifications response")?;
        Ok(body.as_array().cloned().unwrap_or_default())
    }

    pub async fn delete_notifications(&self, ids: &[String]) -> Result<()> {
        self.auth(self.client.delete(format!("{}/api/notifications", self.base_url)))
            .json(&json!({ "ids": ids }))
            .send()
            .await
            .context("failed to delete delivered notifications")?;
        Ok(())
    }

    pub async fn fetch_image(&self, id: &str) -> Result<Vec<u8>> {
        let resp = self
            .auth(self.client.get(format!("{}/api/images/{id}", self.base_url)))
            .send()
            .await
            .context("failed to fetch companion image")?;
        let (bytes, _truncated) = crate::utils::http::limited_body(resp, crate::utils::http::DEFAULT_MAX_BODY_BYTES).await?;
        Ok(bytes)
    }
}

fn deep_merge(base: &mut Value, overlay: &Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                deep_merge(base_map.entry(key.clone()).or_insert(Value::Null), value);
            }
        }
        (base_slot, overlay_value) => {
            *base_slot = overlay_value.clone();
        }
    }
}

#[cfg(test)]
mod tests;
