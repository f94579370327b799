//! Normalizes a raw Signal JSON-RPC `receive` notification into an intake
//! record the rest of the bridge can reason about.

use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub id: String,
    pub content_type: String,
    pub filename: Option<String>,
    pub size: Option<u64>,
    pub is_voice_note: bool,
}

#[derive(Debug, Clone)]
pub struct Envelope {
    pub sender: String,
    pub timestamp: i64,
    pub text: String,
    pub quoted_text: Option<String>,
    pub attachments: Vec<Attachment>,
    /// True when this was the owner's own message relayed back as a sync message
    /// (sent from another linked device), rather than a message from a peer.
    pub is_sync: bool,
}

impl Envelope {
    pub fn has_intake(&self) -> bool {
        !self.text.trim().is_empty() || !self.attachments.is_empty()
    }
}

fn parse_attachment(raw: &Value) -> Option<Attachment> {
    let id = raw.get("id")?.as_str()?.to_string();
    let content_type = raw
        .get("contentType")
        .and_then(Value::as_str)
        .unwrap_or("application/octet-stream")
        .to_string();
    let voice_note_flag = raw
        .get("voiceNote")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let is_voice_note = voice_note_flag || content_type.starts_with("audio/");
    Some(Attachment {
        id,
        filename: raw
            .get("filename")
            .and_then(Value::as_str)
            .map(str::to_string),
        size: raw.get("size").and_then(Value::as_u64),
        content_type,
        is_voice_note,
    })
}

fn parse_attachments(raw: &Value) -> Vec<Attachment> {
    raw.get("attachments")
        .and_then(Value::as_array)
        .map(|arr| arr.iter().filter_map(parse_attachment).collect())
        .unwrap_or_default()
}

/// Parse the `params` of a `receive` notification into an intake record.
///
/// Returns `None` ("no intake") when the envelope carries neither a
/// `dataMessage` nor a `syncMessage.sentMessage`, or when the resulting
/// record has no text and no attachments.
pub fn parse_envelope(params: &Value) -> Option<Envelope> {
    let envelope = params.get("envelope")?;
    let timestamp = envelope.get("timestamp").and_then(Value::as_i64).unwrap_or(0);

    if let Some(data_message) = envelope.get("dataMessage") {
        let sender = envelope
            .get("source")
            .or_else(|| envelope.get("sourceNumber"))
            .and_then(Value::as_str)?
            .to_string();
        let text = data_message
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();
        let quoted_text = data_message
            .get("quote")
            .and_then(|q| q.get("text"))
            .and_then(Value::as_str)
            .map(str::to_string);
        let attachments = parse_attachments(data_message);

        let record = Envelope {
            sender,
            timestamp,
            text,
            quoted_text,
            attachments,
            is_sync: false,
        };
        return record.has_intake().then_some(record);
    }

    if let Some(sent_message) = envelope.get("syncMessage").and_then(|s| s.get("sentMessage")) {
        let sender = envelope
            .get("source")
            .or_else(|| envelope.get("sourceNumber"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let text = sent_message
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();
        let quoted_text = sent_message
            .get("quote")
            .and_then(|q| q.get("text"))
            .and_then(Value::as_str)
            .map(str::to_string);
        let attachments = parse_attachments(sent_message);

        let record = Envelope {
            sender,
            timestamp,
            text,
            quoted_text,
            attachments,
            is_sync: true,
        };
        return record.has_intake().then_some(record);
    }

    None
}

#[cfg(test)]
mod tests;
