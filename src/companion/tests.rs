use super::*;
use crate::config::ProviderSettings;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn sse_body(events: &[&str]) -> String {
    events.iter().map(|e| format!("data: {e}\n\n")).collect::<Vec<_>>().join("")
}

#[tokio::test]
async fn fetch_companions_populates_directory() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/chooms"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {"id": "c1", "name": "Genesis"}
        ])))
        .mount(&server)
        .await;

    let client = CompanionClient::new(server.uri(), String::new(), Duration::from_secs(60));
    client.fetch_companions().await.unwrap();
    let found = client.get_by_name("genesis").await;
    assert_eq!(found.unwrap().id, "c1");
}

#[tokio::test]
async fn get_or_create_chat_caches_handle() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/chooms"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {"id": "c1", "name": "Genesis"}
        ])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/chats"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "chat-1"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = CompanionClient::new(server.uri(), String::new(), Duration::from_secs(60));
    let first = client.get_or_create_chat("c1").await.unwrap();
    let second = client.get_or_create_chat("c1").await.unwrap();
    assert_eq!(first, "chat-1");
    assert_eq!(second, "chat-1");
}

#[tokio::test]
async fn send_message_streams_content_and_images() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/chooms"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {"id": "c1", "name": "Genesis"}
        ])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/chats"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "chat-1"})))
        .mount(&server)
        .await;

    let body = sse_body(&[
        r#"{"type": "content", "text": "Hello "}"#,
        r#"{"type": "content", "text": "there"}"#,
        r#"{"type": "image_generated", "url": "https://img/1.png", "id": "i1", "prompt": "p"}"#,
        r#"{"type": "done"}"#,
    ]);
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let client = CompanionClient::new(server.uri(), String::new(), Duration::from_secs(60));
    let settings = ProviderSettings::default();
    let response = client.send_message("Genesis", "hi", &settings, None, false).await.unwrap();
    assert_eq!(response.content, "Hello there");
    assert_eq!(response.images.len(), 1);
    assert_eq!(response.images[0].id.as_deref(), Some("i1"));
}

#[tokio::test]
async fn send_message_to_unknown_companion_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/chooms"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .mount(&server)
        .await;

    let client = CompanionClient::new(server.uri(), String::new(), Duration::from_secs(60));
    let settings = ProviderSettings::default();
    let err = client.send_message("Nobody", "hi", &settings, None, false).await.unwrap_err();
    assert!(matches!(err, BridgeError::CompanionNotFound(_)));
}

#[tokio::test]
async fn user_activity_window_expires() {
    let client = CompanionClient::new("http://localhost".to_string(), String::new(), Duration::from_secs(60));
    client.record_user_activity("Genesis").await;
    assert!(client.is_user_active("Genesis", 120).await);
    assert!(!client.is_user_active("Genesis", -1).await);
}

#[tokio::test]
async fn fetch_health_returns_service_statuses() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "services": {"signal": {"status": "connected"}, "tts": {"status": "unreachable"}}
        })))
        .mount(&server)
        .await;

    let client = CompanionClient::new(server.uri(), String::new(), Duration::from_secs(60));
    let body = client.fetch_health(&serde_json::json!({"signal": "unix", "tts": "http"})).await.unwrap();
    assert_eq!(body["services"]["signal"]["status"], "connected");
    assert_eq!(body["services"]["tts"]["status"], "unreachable");
}

#[test]
fn deep_merge_overlay_wins_on_conflicting_scalars() {
    let mut base = serde_json::json!({"model": "a", "nested": {"x": 1}});
    let overlay = serde_json::json!({"model": "b", "nested": {"y": 2}});
    deep_merge(&mut base, &overlay);
    assert_eq!(base["model"], "b");
    assert_eq!(base["nested"]["x"], 1);
    assert_eq!(base["nested"]["y"], 2);
}
