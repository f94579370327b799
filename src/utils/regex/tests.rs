use super::*;

#[test]
fn markdown_bold_matches() {
    assert!(RegexPatterns::markdown_bold().is_match("**bold**"));
    assert!(!RegexPatterns::markdown_bold().is_match("*italic*"));
}

#[test]
fn markdown_link_captures() {
    let caps = RegexPatterns::markdown_link()
        .captures("[text](http://example.com)")
        .unwrap();
    assert_eq!(&caps[1], "text");
    assert_eq!(&caps[2], "http://example.com");
}

#[test]
fn markdown_code_matches() {
    assert!(RegexPatterns::markdown_code().is_match("`inline`"));
}

#[test]
fn bare_url_matches() {
    assert!(RegexPatterns::bare_url().is_match("see https://example.com/x for details"));
    assert!(!RegexPatterns::bare_url().is_match("no links here"));
}

#[test]
fn emoji_matches() {
    assert!(RegexPatterns::emoji().is_match("nice \u{1F600} day"));
    assert!(!RegexPatterns::emoji().is_match("plain text"));
}

#[test]
fn think_block_strips_multiline() {
    let re = RegexPatterns::think_block();
    let out = re.replace_all("before <think>reasoning\nmore</think> after", "");
    assert_eq!(out, "before  after");
}

#[test]
fn data_uri_captures_mime_and_payload() {
    let caps = RegexPatterns::data_uri()
        .captures("data:image/png;base64,aGVsbG8=")
        .unwrap();
    assert_eq!(&caps[1], "image/png");
    assert_eq!(&caps[2], "aGVsbG8=");
}

#[test]
fn words_matches_tokens() {
    let found: Vec<&str> = RegexPatterns::words()
        .find_iter("check the oven at 5pm")
        .map(|m| m.as_str())
        .collect();
    assert_eq!(found, vec!["check", "the", "oven", "at", "5pm"]);
}

#[test]
fn compile_regex_valid() {
    assert!(compile_regex(r"\d+").is_ok());
}

#[test]
fn compile_regex_invalid() {
    assert!(compile_regex(r"[invalid").is_err());
}
