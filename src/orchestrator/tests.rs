use super::*;
use crate::commands::InMemoryCalendarTasks;
use crate::config::Reminder;
use std::collections::HashMap;

fn test_orchestrator(tmp: &std::path::Path) -> Orchestrator {
    let transport = RpcTransport::new(tmp.join("signal.sock"), "+15555550100".to_string());
    let companion = Arc::new(CompanionClient::new("http://localhost".to_string(), String::new(), Duration::from_secs(60)));
    let tts = Arc::new(TtsClient::new("http://localhost".to_string(), String::new(), "alloy".to_string()));
    let stt = Arc::new(SttClient::new("http://localhost".to_string(), String::new(), "whisper-1".to_string()));
    let calendar: Arc<dyn CalendarTasks> = Arc::new(InMemoryCalendarTasks::new());
    let intent = Arc::new(IntentResolver::new(HashMap::new(), Vec::new(), "Genesis".to_string()));
    let config = Arc::new(Mutex::new(Config::default()));

    Orchestrator::new(
        transport,
        companion,
        tts,
        stt,
        calendar,
        intent,
        config,
        tmp.join("config.json"),
        "+15555550100".to_string(),
        tmp.join("attachments"),
        Duration::from_secs(5),
        Duration::from_millis(10),
    )
}

#[tokio::test]
async fn materialize_image_attachments_saves_only_image_content_types() {
    let tmp = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(tmp.path().join("attachments")).unwrap();
    let image_bytes = [0x89u8, 0x50, 0x4E, 0x47, 0, 0, 0, 0];
    std::fs::write(tmp.path().join("attachments").join("att-1"), image_bytes).unwrap();
    std::fs::write(tmp.path().join("attachments").join("att-2"), b"not an image, just audio bytes").unwrap();

    let orchestrator = test_orchestrator(tmp.path());
    let attachments = vec![
        Attachment {
            id: "att-1".to_string(),
            content_type: "image/png".to_string(),
            filename: Some("photo.png".to_string()),
            size: Some(8),
            is_voice_note: false,
        },
        Attachment {
            id: "att-2".to_string(),
            content_type: "audio/ogg".to_string(),
            filename: Some("note.ogg".to_string()),
            size: Some(30),
            is_voice_note: true,
        },
    ];

    let paths = orchestrator.materialize_image_attachments(&attachments).await;
    assert_eq!(paths.len(), 1);
    assert!(paths[0].ends_with(".png"));
}

#[tokio::test]
async fn deliver_interpreted_reminder_persists_before_delivery_attempt() {
    let tmp = tempfile::tempdir().unwrap();
    let orchestrator = test_orchestrator(tmp.path());

    let reminder = Reminder {
        id: "r1".to_string(),
        text: "call the vet".to_string(),
        remind_at: "2026-01-01T00:00:00Z".to_string(),
        created_at: "2025-12-31T00:00:00Z".to_string(),
    };
    let interpreted = Interpreted::Reminder { reminder, reply: "Okay, I'll remind you.".to_string() };

    // Transport isn't connected in this test, so the delivery leg fails, but
    // the reminder must already be persisted by the time that happens.
    let _ = orchestrator.deliver_interpreted("+15555550100", interpreted).await;

    assert_eq!(orchestrator.config.lock().await.get_reminders().len(), 1);
}
