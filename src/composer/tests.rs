use super::*;

#[test]
fn think_blocks_are_stripped() {
    let text = "before <think>internal reasoning</think> after";
    assert_eq!(strip_think_blocks(text), "before  after");
}

#[test]
fn narration_paragraphs_are_dropped() {
    let text = "Now let me check the weather.\n\nIt's sunny today.";
    let speech = speech_only_variant(text);
    assert_eq!(speech, "It's sunny today.");
}

#[test]
fn all_paragraphs_dropped_retains_last() {
    let text = "I'll look that up.\n\nI've created the file.";
    let speech = speech_only_variant(text);
    assert_eq!(speech, "I've created the file.");
}

#[test]
fn markdown_and_urls_and_emoji_are_stripped() {
    let text = "Check [this](https://example.com) out — **great** stuff \u{1F600} see https://x.co";
    let speech = speech_only_variant(text);
    assert!(!speech.contains("http"));
    assert!(!speech.contains('['));
    assert!(!speech.contains("**"));
    assert!(!speech.contains('\u{1F600}'));
}

#[test]
fn data_uri_image_decodes_to_bytes() {
    let payload = base64::Engine::encode(&base64::engine::general_purpose::STANDARD, b"fakepngdata");
    let url = format!("data:image/png;base64,{payload}");
    let (ext, bytes) = decode_data_uri_image(&url).unwrap();
    assert_eq!(ext, "png");
    assert_eq!(bytes, b"fakepngdata");
}

#[test]
fn non_data_uri_returns_none() {
    assert!(decode_data_uri_image("https://example.com/image.png").is_none());
}
