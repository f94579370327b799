//! Process lifecycle and the intake loop: the single-instance advisory lock,
//! the Signal->companion message pipeline (typing indicator, STT, image
//! materialization, intent resolution, command-interpreter short circuit,
//! companion turn, reply composition), and graceful shutdown.

use crate::commands::{CalendarTasks, Interpreted};
use crate::companion::CompanionClient;
use crate::config::Config;
use crate::envelope::{self, Attachment};
use crate::intent::IntentResolver;
use crate::transport::RpcTransport;
use crate::utils::media::{extension_from_content_type, save_media_file};
use crate::voice::{SttClient, TtsClient};
use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Acquires an exclusive, non-blocking advisory lock on a well-known file
/// under the bridge home directory, so two bridge processes never race on
/// the same Signal socket and reminder store. The returned handle must be
/// kept alive for the process lifetime; dropping it releases the lock.
pub fn acquire_process_lock(bridge_home: &Path) -> Result<File> {
    crate::utils::ensure_dir(bridge_home)?;
    let lock_path = bridge_home.join("bridge.lock");
    let file = File::create(&lock_path)
        .with_context(|| format!("failed to open {}", lock_path.display()))?;
    file.try_lock_exclusive().with_context(|| {
        format!(
            "another bridge instance is already running (lock held on {})",
            lock_path.display()
        )
    })?;
    Ok(file)
}

/// Everything the intake loop needs to turn one Signal notification into a
/// companion reply. Constructed once at startup and run as a background task
/// alongside the scheduler.
pub struct Orchestrator {
    transport: RpcTransport,
    companion: Arc<CompanionClient>,
    tts: Arc<TtsClient>,
    stt: Arc<SttClient>,
    calendar: Arc<dyn CalendarTasks>,
    intent: Arc<IntentResolver>,
    config: Arc<Mutex<Config>>,
    config_path: PathBuf,
    owner: String,
    attachments_dir: PathBuf,
    connect_timeout: Duration,
    poll_interval: Duration,
    running: Arc<AtomicBool>,
}

impl Orchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        transport: RpcTransport,
        companion: Arc<CompanionClient>,
        tts: Arc<TtsClient>,
        stt: Arc<SttClient>,
        calendar: Arc<dyn CalendarTasks>,
        intent: Arc<IntentResolver>,
        config: Arc<Mutex<Config>>,
        config_path: PathBuf,
        owner: String,
        attachments_dir: PathBuf,
        connect_timeout: Duration,
        poll_interval: Duration,
    ) -> Self {
        Self {
            transport,
            companion,
            tts,
            stt,
            calendar,
            intent,
            config,
            config_path,
            owner,
            attachments_dir,
            connect_timeout,
            poll_interval,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Runs the intake loop until [`Self::stop`] is called. Intended to be
    /// spawned once by the CLI entry point.
    pub async fn run(self: Arc<Self>) {
        self.running.store(true, Ordering::SeqCst);

        if let Err(e) = self.transport.connect(self.connect_timeout).await {
            error!("initial transport connect failed: {e}");
        }

        while self.running.load(Ordering::SeqCst) {
            if !self.transport.is_connected()
                && let Err(e) = self.transport.reconnect(self.connect_timeout).await
            {
                warn!("transport reconnect failed: {e}");
                tokio::time::sleep(self.poll_interval).await;
                continue;
            }

            for raw in self.transport.drain_notifications().await {
                let Some(record) = envelope::parse_envelope(&raw) else { continue };
                if record.sender != self.owner {
                    debug!(sender = %record.sender, "dropping message from non-owner sender");
                    continue;
                }
                if let Err(e) = self.transport.send_typing_indicator(&record.sender).await {
                    debug!("failed to send typing indicator: {e}");
                }
                if let Err(e) = self.handle_message(&record.sender, record.timestamp, &record.attachments, &record.text).await {
                    warn!(sender = %record.sender, "failed to process inbound message: {e}");
                }
            }

            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn handle_message(
        &self,
        sender: &str,
        _timestamp: i64,
        attachments: &[Attachment],
        raw_text: &str,
    ) -> Result<()> {
        let voice_note = attachments.iter().find(|a| a.is_voice_note);
        let mut text = if let Some(attachment) = voice_note {
            self.transcribe_voice_note(attachment).await?
        } else {
            raw_text.to_string()
        };

        let image_paths = self.materialize_image_attachments(attachments).await;
        if !image_paths.is_empty() {
            let mut lines = vec![text];
            for path in &image_paths {
                lines.push(format!("[Image attached at {path}. Please analyze this image.]"));
            }
            text = lines.join("\n");
        }

        let (active, cleaned) = self.intent.resolve(&text).await;

        let now = chrono::Utc::now();
        if let Some(interpreted) = crate::commands::interpret(&cleaned, self.calendar.as_ref(), now).await {
            self.deliver_interpreted(sender, interpreted).await?;
            return Ok(());
        }
        if let Some(interpreted) = crate::commands::interpret(&text, self.calendar.as_ref(), now).await {
            self.deliver_interpreted(sender, interpreted).await?;
            return Ok(());
        }

        crate::commands::apply_inline_list_mutation(&cleaned, self.calendar.as_ref()).await;

        self.companion.record_user_activity(&active).await;
        let store_settings = self.config.lock().await.providers.clone();
        let response = self.companion.send_message(&active, &cleaned, &store_settings, None, false).await?;
        self.deliver(sender, &response.content, Some(&active), &response.images).await
    }

    async fn deliver_interpreted(&self, sender: &str, interpreted: Interpreted) -> Result<()> {
        match interpreted {
            Interpreted::Reply(reply) => {
                self.deliver(sender, &reply, None, &[]).await?;
            }
            Interpreted::Reminder { reminder, reply } => {
                {
                    let mut config = self.config.lock().await;
                    config.add_reminder(reminder);
                    let snapshot = config.clone();
                    drop(config);
                    if let Err(e) = crate::config::save_config(&snapshot, Some(&self.config_path)) {
                        warn!("failed to persist new reminder: {e}");
                    }
                }
                self.deliver(sender, &reply, None, &[]).await?;
            }
        }
        Ok(())
    }

    async fn deliver(
        &self,
        recipient: &str,
        text: &str,
        companion_name: Option<&str>,
        images: &[crate::companion::GeneratedImage],
    ) -> Result<()> {
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

    async fn transcribe_voice_note(&self, attachment: &Attachment) -> Result<String> {
        let bytes = self.transport.download_attachment(&self.attachments_dir, &attachment.id).await?;
        let filename = attachment.filename.clone().unwrap_or_else(|| format!("{}.ogg", attachment.id));
        self.stt.transcribe(bytes, &filename).await
    }

    async fn materialize_image_attachments(&self, attachments: &[Attachment]) -> Vec<String> {
        let mut paths = Vec::new();
        for attachment in attachments {
            if attachment.is_voice_note || !attachment.content_type.starts_with("image/") {
                continue;
            }
            let bytes = match self.transport.download_attachment(&self.attachments_dir, &attachment.id).await {
                Ok(b) => b,
                Err(e) => {
                    warn!("failed to read inbound image attachment {}: {e}", attachment.id);
                    continue;
                }
            };
            let ext = extension_from_content_type(&attachment.content_type).unwrap_or("bin");
            match save_media_file(&bytes, "inbound", ext) {
                Ok(path) => paths.push(path),
                Err(e) => warn!("failed to save inbound image attachment {}: {e}", attachment.id),
            }
        }
        paths
    }
}

#[cfg(test)]
mod tests;
