//! Turns `(text, companion, images)` into one or more outbound Signal sends.
//! The single code path used for conversational replies and every
//! scheduler-initiated delivery (heartbeats, automations, alerts).

use crate::companion::{CompanionClient, GeneratedImage};
use crate::errors::BridgeError;
use crate::transport::RpcTransport;
use crate::utils::media::save_media_file;
use crate::utils::regex::RegexPatterns;
use crate::voice::TtsClient;
use std::time::Duration;
use tracing::warn;

const IMAGE_SEND_DELAY_MS: u64 = 1000;

/// Paragraph-opening phrases that mark working narration rather than
/// owner-facing content; dropped from the speech-only variant.
const NARRATION_PREFIXES: &[&str] = &[
    "now let me", "i'll", "i will", "i'm going to", "let me check", "i've created", "i've updated",
    "i've made", "i've added",
];

fn strip_think_blocks(text: &str) -> String {
    RegexPatterns::think_block().replace_all(text, "").to_string()
}

fn is_narration_paragraph(paragraph: &str) -> bool {
    let lower = paragraph.trim().to_lowercase();
    NARRATION_PREFIXES.iter().any(|p| lower.starts_with(p))
}

/// Drop narration paragraphs, strip markdown/links/urls/emoji, collapse
/// whitespace. If every paragraph is dropped, the last one is retained so
/// speech is never entirely empty when the model actually said something.
fn speech_only_variant(text: &str) -> String {
    let paragraphs: Vec<&str> = text.split("\n\n").filter(|p| !p.trim().is_empty()).collect();
    let mut kept: Vec<&str> = paragraphs.iter().copied().filter(|p| !is_narration_paragraph(p)).collect();
    if kept.is_empty() && !paragraphs.is_empty() {
        kept = vec![paragraphs[paragraphs.len() - 1]];
    }
    let mut joined = kept.join("\n\n");

    joined = RegexPatterns::markdown_link().replace_all(&joined, "$1").to_string();
    joined = RegexPatterns::bare_url().replace_all(&joined, "").to_string();
    joined = RegexPatterns::markdown_bold().replace_all(&joined, "$1").to_string();
    joined = RegexPatterns::markdown_strike().replace_all(&joined, "$1").to_string();
    joined = RegexPatterns::markdown_italic().replace_all(&joined, "$1").to_string();
    joined = RegexPatterns::markdown_code().replace_all(&joined, "$1").to_string();
    joined = RegexPatterns::emoji().replace_all(&joined, "").to_string();
    joined = RegexPatterns::newlines().replace_all(&joined, "\n\n").to_string();
    joined = RegexPatterns::whitespace().replace_all(&joined, " ").to_string();
    joined.trim().to_string()
}

fn decode_data_uri_image(url: &str) -> Option<(String, Vec<u8>)> {
    if !url.starts_with("data:image/") {
        return None;
    }
    let caps = RegexPatterns::data_uri().captures(url)?;
    let mime = caps.get(1)?.as_str();
    let payload = caps.get(2)?.as_str();
    let ext = mime.rsplit('/').next().unwrap_or("png");
    let bytes = base64::Engine::decode(&base64::engine::general_purpose::STANDARD, payload).ok()?;
    Some((ext.to_string(), bytes))
}

/// Resolve a generated image to a local file path, downloading from the
/// companion service by id when no inline data URI was provided.
async fn materialize_image(
    companion: &CompanionClient,
    image: &GeneratedImage,
) -> anyhow::Result<Option<String>> {
    if let Some(url) = &image.url
        && let Some((ext, bytes)) = decode_data_uri_image(url)
    {
        return Ok(Some(save_media_file(&bytes, "generated", &ext)?));
    }
    if let Some(id) = &image.id {
        let bytes = companion.fetch_image(id).await?;
        return Ok(Some(save_media_file(&bytes, "generated", "png")?));
    }
    Ok(None)
}

/// Compose and deliver a reply. `companion_name` is used both to pick a
/// voice and to format the `[<name>]` attribution prefix; `None` sends the
/// text unattributed. Temp files are always cleaned up, even on error.
pub async fn compose_and_send(
    transport: &RpcTransport,
    tts: &TtsClient,
    companion_client: &CompanionClient,
    recipient: &str,
    text: &str,
    companion_name: Option<&str>,
    voice_id: Option<&str>,
    images: &[GeneratedImage],
) -> Result<(), BridgeError> {
    let cleaned = strip_think_blocks(text);
    let speech_text = speech_only_variant(&cleaned);

    let mut temp_files = Vec::new();

    let audio_path = if !speech_text.is_empty() {
        match tts.synthesize(&speech_text, voice_id).await {
            Ok(bytes) => match save_media_file(&bytes, "reply", "mp3") {
                Ok(path) => {
                    temp_files.push(path.clone());
                    Some(path)
                }
                Err(e) => {
                    warn!("failed to save synthesized audio: {e}");
                    None
                }
            },
            Err(e) => {
                warn!("TTS synthesis failed, sending text only: {e}");
                None
            }
        }
    } else {
        None
    };

    let mut image_paths = Vec::new();
    for image in images {
        match materialize_image(companion_client, image).await {
            Ok(Some(path)) => {
                temp_files.push(path.clone());
                image_paths.push(path);
            }
            Ok(None) => warn!("generated image had neither a data URI nor an id; skipping"),
            Err(e) => warn!("failed to materialize generated image: {e}"),
        }
    }

    let formatted = match companion_name {
        Some(name) => format!("[{name}]\n\n{cleaned}"),
        None => cleaned,
    };

    let result = send_all(transport, recipient, &formatted, audio_path.as_deref(), &image_paths).await;

    for path in &temp_files {
        if let Err(e) = tokio::fs::remove_file(path).await {
            warn!("failed to clean up temp file {path}: {e}");
        }
    }

    result
}

async fn send_all(
    transport: &RpcTransport,
    recipient: &str,
    text: &str,
    audio_path: Option<&str>,
    image_paths: &[String],
) -> Result<(), BridgeError> {
    let first_attachments: Vec<String> = audio_path.map(|p| vec![p.to_string()]).unwrap_or_default();
    transport.send_message(recipient, text, &first_attachments).await?;

    for image_path in image_paths {
        tokio::time::sleep(Duration::from_millis(IMAGE_SEND_DELAY_MS)).await;
        transport.send_message(recipient, "", std::slice::from_ref(image_path)).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests;
