use super::{DEFAULT_KIND, DEFAULT_NAME, Envelope, HI, Payload};
use serde_json::json;

#[test]
fn test_envelope_new_defaults() {
    let envelope = Envelope::new("ping");
    assert_eq!(envelope.name, DEFAULT_NAME);
    assert_eq!(envelope.kind, "ping");
    assert!(envelope.timestamp > 0);
    assert!(envelope.correlation_id.is_none());
    assert!(envelope.fields.is_empty());
}

#[test]
fn test_envelope_wire_shape_nests_fields() {
    let envelope = Envelope::new("order")
        .with_name("svc-a")
        .with_field("count", 3);
    let value: serde_json::Value = serde_json::from_str(&envelope.encode().unwrap()).unwrap();

    assert_eq!(value["name"], "svc-a");
    assert_eq!(value["type"], "order");
    assert_eq!(value["fields"]["count"], 3);
    assert!(value.get("count").is_none());
    // absent correlation ids are not serialized
    assert!(value.get("correlation_id").is_none());
}

#[test]
fn test_fields_named_like_metadata_survive_encoding() {
    let envelope = Envelope::new("create")
        .with_name("svc")
        .with_field("name", "widget")
        .with_field("type", "gadget")
        .with_field("correlation_id", "not-mine");

    let decoded = Envelope::decode(&envelope.encode().unwrap()).unwrap();
    assert_eq!(decoded, envelope);
    assert_eq!(decoded.name, "svc");
    assert_eq!(decoded.kind, "create");
    assert!(decoded.correlation_id.is_none());
    assert_eq!(decoded.field("name"), Some(&json!("widget")));
}

#[test]
fn test_decode_fills_missing_metadata() {
    let envelope = Envelope::decode(r#"{"fields":{"status":"ok"}}"#).unwrap();
    assert_eq!(envelope.name, DEFAULT_NAME);
    assert_eq!(envelope.kind, DEFAULT_KIND);
    assert!(envelope.timestamp > 0);
    assert_eq!(envelope.field("status"), Some(&json!("ok")));
}

#[test]
fn test_decode_keeps_correlation_id_out_of_fields() {
    let envelope =
        Envelope::decode(r#"{"type":"do","correlation_id":"abc","timestamp":5,"fields":{"x":1}}"#)
            .unwrap();
    assert_eq!(envelope.correlation_id.as_deref(), Some("abc"));
    assert_eq!(envelope.timestamp, 5);
    assert!(envelope.field("correlation_id").is_none());
    assert_eq!(envelope.fields.len(), 1);
}

#[test]
fn test_decode_rejects_garbage() {
    assert!(Envelope::decode("not json").is_err());
}

#[test]
fn test_payload_fields_take_sender_name() {
    let envelope = Payload::from(json!({"type": "ping"}))
        .into_envelope("client-b")
        .unwrap();
    assert_eq!(envelope.name, "client-b");
    assert_eq!(envelope.kind, "ping");
}

#[test]
fn test_payload_fields_split_metadata_from_content() {
    let envelope = Payload::from(json!({"type": "ping", "count": 3, "correlation_id": "c-1"}))
        .into_envelope("client-b")
        .unwrap();
    assert_eq!(envelope.kind, "ping");
    assert_eq!(envelope.correlation_id.as_deref(), Some("c-1"));
    assert_eq!(envelope.field("count"), Some(&json!(3)));
    assert_eq!(envelope.fields.len(), 1);
}

#[test]
fn test_payload_fields_keep_explicit_name() {
    let envelope = Payload::from(json!({"type": "ping", "name": "explicit"}))
        .into_envelope("client-b")
        .unwrap();
    assert_eq!(envelope.name, "explicit");
}

#[test]
fn test_payload_envelope_passes_through() {
    let original = Envelope::new("ping").with_field("k", "v");
    let envelope = Payload::from(original.clone())
        .into_envelope("ignored")
        .unwrap();
    assert_eq!(envelope, original);
}

#[test]
fn test_payload_rejects_non_object() {
    assert!(Payload::from(json!([1, 2, 3])).into_envelope("x").is_err());
}

#[test]
fn test_probe_ownership() {
    let probe = Envelope::probe("a", "cmd-1");
    assert_eq!(probe.kind, HI);
    assert!(probe.is_probe_from("cmd-1"));
    assert!(!probe.is_probe_from("cmd-2"));
    assert!(!Envelope::new(HI).is_probe_from("cmd-1"));
}
