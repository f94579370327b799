//! Server-Sent-Events parsing for the companion chat stream. Events are
//! separated by a blank line; each carries a `data:` line (and occasionally
//! an `event:` line we don't currently need to distinguish on, since the
//! companion service tags its event kind inside the JSON payload itself).

use serde_json::Value;

#[derive(Debug, Clone)]
pub enum ChatEvent {
    Content(String),
    ToolCall(Value),
    ToolResult(Value),
    ImageGenerated { url: Option<String>, id: Option<String>, prompt: Option<String> },
    Done,
    Error(String),
}

fn parse_payload(data: &Value) -> Option<ChatEvent> {
    match data["type"].as_str()? {
        "content" => Some(ChatEvent::Content(data["text"].as_str().unwrap_or_default().to_string())),
        "tool_call" => Some(ChatEvent::ToolCall(data.clone())),
        "tool_result" => Some(ChatEvent::ToolResult(data.clone())),
        "image_generated" => Some(ChatEvent::ImageGenerated {
            url: data["url"].as_str().map(str::to_string),
            id: data["id"].as_str().map(str::to_string),
            prompt: data["prompt"].as_str().map(str::to_string),
        }),
        "done" => Some(ChatEvent::Done),
        "error" => Some(ChatEvent::Error(data["message"].as_str().unwrap_or("unknown error").to_string())),
        _ => None,
    }
}

/// Parse as many complete (blank-line-terminated) SSE events as `chunk`
/// contains. Incomplete trailing data is left for the caller to re-feed on
/// the next read; `[DONE]` sentinel data yields no event at all.
pub fn parse_sse_chunk(chunk: &str) -> Vec<ChatEvent> {
    let mut events = Vec::new();
    let mut current_data = String::new();

    let flush = |current_data: &mut String, events: &mut Vec<ChatEvent>| {
        if current_data.is_empty() {
            return;
        }
        let data = current_data.trim();
        if data != "[DONE]"
            && let Ok(value) = serde_json::from_str::<Value>(data)
            && let Some(event) = parse_payload(&value)
        {
            events.push(event);
        }
        current_data.clear();
    };

    for line in chunk.lines() {
        if line.is_empty() {
            flush(&mut current_data, &mut events);
        } else if let Some(data) = line.strip_prefix("data: ") {
            if !current_data.is_empty() {
                current_data.push('\n');
            }
            current_data.push_str(data);
        }
    }
    flush(&mut current_data, &mut events);
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn content_event_parses() {
        let chunk = format!("data: {}\n\n", json!({"type": "content", "text": "hi"}));
        let events = parse_sse_chunk(&chunk);
        assert!(matches!(&events[0], ChatEvent::Content(t) if t == "hi"));
    }

    #[test]
    fn done_sentinel_yields_no_event() {
        let events = parse_sse_chunk("data: [DONE]\n\n");
        assert!(events.is_empty());
    }

    #[test]
    fn image_generated_event_parses() {
        let chunk = format!(
            "data: {}\n\n",
            json!({"type": "image_generated", "url": "data:image/png;base64,Zm9v", "id": "img-1", "prompt": "a cat"})
        );
        let events = parse_sse_chunk(&chunk);
        match &events[0] {
            ChatEvent::ImageGenerated { url, id, prompt } => {
                assert_eq!(url.as_deref(), Some("data:image/png;base64,Zm9v"));
                assert_eq!(id.as_deref(), Some("img-1"));
                assert_eq!(prompt.as_deref(), Some("a cat"));
            }
            _ => panic!("expected image_generated"),
        }
    }

    #[test]
    fn error_event_carries_message() {
        let chunk = format!("data: {}\n\n", json!({"type": "error", "message": "boom"}));
        let events = parse_sse_chunk(&chunk);
        assert!(matches!(&events[0], ChatEvent::Error(m) if m == "boom"));
    }

    #[test]
    fn incomplete_trailing_event_is_not_emitted() {
        let events = parse_sse_chunk("data: {\"type\": \"content\"");
        assert!(events.is_empty());
    }

    #[test]
    fn multiple_events_in_one_chunk() {
        let chunk = format!(
            "data: {}\n\ndata: {}\n\n",
            json!({"type": "content", "text": "a"}),
            json!({"type": "content", "text": "b"})
        );
        let events = parse_sse_chunk(&chunk);
        assert_eq!(events.len(), 2);
    }
}
