use domain::{Quality, TagValue};
use gw_template::{
    TagSnapshot, TemplateContext, TemplateError, looks_like_json, resolve, resolve_payload,
    resolve_topic,
};
use std::collections::BTreeMap;

fn context(value: TagValue) -> TemplateContext {
    let mut tags = BTreeMap::new();
    tags.insert(
        "A".to_string(),
        TagSnapshot {
            value: TagValue::Number(7.0),
            quality: Quality::Good,
        },
    );
    tags.insert(
        "Pump.Speed".to_string(),
        TagSnapshot {
            value: TagValue::Number(1450.5),
            quality: Quality::Uncertain,
        },
    );
    TemplateContext {
        value,
        timestamp: 1_700_000_000_000,
        quality: Quality::Good,
        tag_id: "tag-1".to_string(),
        tag_name: "Temp1".to_string(),
        connection_id: "plc-1".to_string(),
        unit: Some("°C".to_string()),
        tags,
    }
}

#[test]
fn resolves_value_and_tag_name() {
    let ctx = context(TagValue::Number(42.0));
    assert_eq!(resolve("${value}-${tagName}", &ctx), "42-Temp1");
}

#[test]
fn resolves_cross_tag_references() {
    let ctx = context(TagValue::Number(42.0));
    assert_eq!(resolve("${tags.A.value}", &ctx), "7");
    assert_eq!(resolve("${tags.A.quality}", &ctx), "good");
    assert_eq!(resolve("${tags.Pump.Speed.value}", &ctx), "1450.5");
    assert_eq!(resolve("${tags.Missing.value}", &ctx), "${tags.Missing.value}");
}

#[test]
fn unknown_placeholder_left_verbatim() {
    let ctx = context(TagValue::Number(1.0));
    assert_eq!(resolve("x/${unknown}/y", &ctx), "x/${unknown}/y");
    assert_eq!(resolve("no placeholders", &ctx), "no placeholders");
}

#[test]
fn resolves_metadata_fields() {
    let ctx = context(TagValue::Bool(true));
    assert_eq!(
        resolve("${connectionId}/${tagId}/${timestamp}/${quality}/${unit}", &ctx),
        "plc-1/tag-1/1700000000000/good/°C"
    );
    assert_eq!(resolve("${value}", &ctx), "true");
}

#[test]
fn json_payload_must_stay_valid() {
    let ok = resolve_payload(r#"{"v": ${value}}"#, &context(TagValue::Number(3.5)))
        .expect("valid json");
    assert_eq!(ok, r#"{"v": 3.5}"#);

    let err = resolve_payload(
        r#"{"v": ${value}}"#,
        &context(TagValue::Text("running".to_string())),
    )
    .unwrap_err();
    assert!(matches!(err, TemplateError::InvalidJson(_)));
    assert_eq!(err.kind().code(), "TEMPLATE.RESOLUTION");
}

#[test]
fn quoted_text_and_plain_payloads() {
    let ctx = context(TagValue::Text("running".to_string()));
    assert_eq!(
        resolve_payload(r#"{"state": "${value}"}"#, &ctx).expect("quoted"),
        r#"{"state": "running"}"#
    );
    // 非 JSON 形态的载荷不做校验
    assert_eq!(
        resolve_payload("state=${value} ${unknown}", &ctx).expect("plain"),
        "state=running ${unknown}"
    );
    assert!(looks_like_json("  [1, 2]"));
    assert!(!looks_like_json("value=1"));
}

#[test]
fn topic_validation() {
    let ctx = context(TagValue::Number(1.0));
    assert_eq!(
        resolve_topic("plant/${connectionId}/${tagName}", &ctx).expect("topic"),
        "plant/plc-1/Temp1"
    );
    assert_eq!(resolve_topic("  ", &ctx), Err(TemplateError::EmptyTopic));
    assert!(matches!(
        resolve_topic("plant/+/x", &ctx),
        Err(TemplateError::WildcardTopic(_))
    ));
}
