//! Integration tests for the message wire shape.

use nano_chat::{Content, Media, Message};
use serde_json::json;

#[test]
fn test_text_round_trip() {
    let message = Message::text("user", "Hello world!");
    let json = serde_json::to_string(&message).unwrap();
    let back: Message = serde_json::from_str(&json).unwrap();
    assert_eq!(back.role, message.role);
    assert_eq!(back.content, message.content);
}

#[test]
fn test_wire_shape_of_text_part() {
    let value = serde_json::to_value(Message::text("user", "Hello")).unwrap();
    assert_eq!(
        value,
        json!({"role": "user", "content": [{"type": "text", "text": "Hello"}]})
    );
}

#[test]
fn test_string_content_parses_as_one_text_part() {
    let message: Message =
        serde_json::from_value(json!({"role": "user", "content": "Hi there"})).unwrap();
    assert_eq!(message.content, vec![Content::Text("Hi there".to_string())]);
}

#[test]
fn test_image_blob_wire_shape() {
    let message = Message::new(
        "user",
        vec![Content::Image(Media::Blob(vec![0x01, 0x02, 0x03]))],
    );
    let value = serde_json::to_value(&message).unwrap();
    assert_eq!(
        value,
        json!({"role": "user", "content": [{"type": "image", "blob": "AQID"}]})
    );
    let back: Message = serde_json::from_value(value).unwrap();
    assert_eq!(back, message);
}

#[test]
fn test_audio_path_wire_shape() {
    let message: Message = serde_json::from_value(json!({
        "role": "user",
        "content": [
            {"type": "text", "text": "transcribe: "},
            {"type": "audio", "path": "/tmp/clip.wav"}
        ]
    }))
    .unwrap();
    assert_eq!(message.content.len(), 2);
    assert_eq!(
        message.content[1],
        Content::Audio(Media::Path("/tmp/clip.wav".into()))
    );
}

#[test]
fn test_empty_content_rejected() {
    let result: Result<Message, _> =
        serde_json::from_value(json!({"role": "user", "content": []}));
    assert!(result.is_err());
}

#[test]
fn test_invalid_base64_rejected() {
    let result: Result<Message, _> = serde_json::from_value(json!({
        "role": "user",
        "content": [{"type": "image", "blob": "not base64!!"}]
    }));
    assert!(result.is_err());
}
