use super::*;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn synthesize_returns_audio_bytes() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/audio/speech"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1, 2, 3, 4]))
        .mount(&server)
        .await;

    let client = TtsClient::new(server.uri(), String::new(), "alloy".to_string());
    let bytes = client.synthesize("hello", None).await.unwrap();
    assert_eq!(bytes, vec![1, 2, 3, 4]);
}

#[tokio::test]
async fn synthesize_propagates_server_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/audio/speech"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = TtsClient::new(server.uri(), String::new(), "alloy".to_string());
    assert!(client.synthesize("hello", None).await.is_err());
}

#[tokio::test]
async fn transcribe_extracts_text_field() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/audio/transcriptions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"text": "hello world"})))
        .mount(&server)
        .await;

    let client = SttClient::new(server.uri(), String::new(), "whisper-1".to_string());
    let text = client.transcribe(vec![0, 1, 2], "voice.ogg").await.unwrap();
    assert_eq!(text, "hello world");
}
