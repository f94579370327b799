use super::*;
use serde_json::json;

#[test]
fn data_message_with_text_parses() {
    let params = json!({
        "envelope": {
            "source": "+15551234567",
            "timestamp": 1_700_000_000_000i64,
            "dataMessage": { "message": "hello there" }
        }
    });
    let env = parse_envelope(&params).unwrap();
    assert_eq!(env.sender, "+15551234567");
    assert_eq!(env.text, "hello there");
    assert!(env.attachments.is_empty());
    assert!(!env.is_sync);
}

#[test]
fn empty_envelope_has_no_intake() {
    let params = json!({
        "envelope": {
            "source": "+15551234567",
            "timestamp": 1,
            "dataMessage": { "message": "" }
        }
    });
    assert!(parse_envelope(&params).is_none());
}

#[test]
fn attachment_only_is_intake() {
    let params = json!({
        "envelope": {
            "source": "+15551234567",
            "timestamp": 1,
            "dataMessage": {
                "message": "",
                "attachments": [
                    {"id": "att-1", "contentType": "image/jpeg", "filename": "photo.jpg", "size": 2048}
                ]
            }
        }
    });
    let env = parse_envelope(&params).unwrap();
    assert_eq!(env.attachments.len(), 1);
    assert!(!env.attachments[0].is_voice_note);
}

#[test]
fn audio_mime_classifies_as_voice_note() {
    let params = json!({
        "envelope": {
            "source": "+15551234567",
            "timestamp": 1,
            "dataMessage": {
                "message": "",
                "attachments": [
                    {"id": "att-2", "contentType": "audio/aac"}
                ]
            }
        }
    });
    let env = parse_envelope(&params).unwrap();
    assert!(env.attachments[0].is_voice_note);
}

#[test]
fn explicit_voice_note_flag_is_honored_regardless_of_mime() {
    let params = json!({
        "envelope": {
            "source": "+15551234567",
            "timestamp": 1,
            "dataMessage": {
                "message": "",
                "attachments": [
                    {"id": "att-3", "contentType": "application/octet-stream", "voiceNote": true}
                ]
            }
        }
    });
    let env = parse_envelope(&params).unwrap();
    assert!(env.attachments[0].is_voice_note);
}

#[test]
fn sync_sent_message_parses_as_self_sent() {
    let params = json!({
        "envelope": {
            "source": "+15559999999",
            "timestamp": 1,
            "syncMessage": {
                "sentMessage": { "message": "note to self" }
            }
        }
    });
    let env = parse_envelope(&params).unwrap();
    assert!(env.is_sync);
    assert_eq!(env.text, "note to self");
}

#[test]
fn neither_data_nor_sync_message_is_no_intake() {
    let params = json!({
        "envelope": { "source": "+15551234567", "timestamp": 1 }
    });
    assert!(parse_envelope(&params).is_none());
}

#[test]
fn quoted_text_is_preserved() {
    let params = json!({
        "envelope": {
            "source": "+15551234567",
            "timestamp": 1,
            "dataMessage": {
                "message": "yes",
                "quote": { "text": "do you want pizza?" }
            }
        }
    });
    let env = parse_envelope(&params).unwrap();
    assert_eq!(env.quoted_text.as_deref(), Some("do you want pizza?"));
}
