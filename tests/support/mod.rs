//! Snapshot builders shared by the integration tests

#![allow(dead_code)]

use scrgen::model::source::SourceSnapshot;
use serde_json::{json, Map, Value};

/// Interfaces every test snapshot can refer to
pub fn library() -> Value {
    json!([
        { "name": "com.acme.Greeter", "kind": "interface", "modifiers": ["public"] },
        { "name": "com.acme.Log", "kind": "interface", "modifiers": ["public"] }
    ])
}

fn merge(mut base: Value, extra: Value) -> Value {
    if let (Some(target), Value::Object(extra)) = (base.as_object_mut(), extra) {
        target.extend(extra);
    }
    base
}

/// Public class carrying a component marker with the given members
pub fn component(class: &str, marker: Value) -> Value {
    json!({
        "name": class,
        "modifiers": ["public"],
        "annotations": [merge(json!({ "kind": "component" }), marker)]
    })
}

/// Sets `key` (e.g. `methods`, `fields`, `interfaces`) on a type declaration
pub fn with(decl: Value, key: &str, value: Value) -> Value {
    let mut extra = Map::new();
    extra.insert(key.to_string(), value);
    merge(decl, Value::Object(extra))
}

pub fn setter(name: &str, ty: &str, reference: Option<Value>) -> Value {
    let annotations = match reference {
        Some(marker) => vec![merge(json!({ "kind": "reference" }), marker)],
        None => Vec::new(),
    };
    json!({
        "name": name,
        "modifiers": ["public"],
        "params": [{ "name": "value", "type": ty }],
        "annotations": annotations
    })
}

pub fn reference_field(name: &str, ty: &str, marker: Value) -> Value {
    json!({
        "name": name,
        "type": ty,
        "annotations": [merge(json!({ "kind": "reference" }), marker)]
    })
}

pub fn unit(key: &str, types: Vec<Value>) -> Value {
    json!({ "key": key, "types": types })
}

pub fn snapshot(units: Vec<Value>) -> SourceSnapshot {
    let text = json!({ "units": units, "library": library() }).to_string();
    SourceSnapshot::from_json(&text).expect("valid snapshot")
}

/// Greeter implementation with a static `Log` reference and a dynamic
/// `Greeter` reference with bind and unbind methods
pub fn greeter_component(class: &str, name: Option<&str>) -> Value {
    let marker = match name {
        Some(name) => json!({ "name": name }),
        None => json!({}),
    };
    let decl = with(component(class, marker), "interfaces", json!(["com.acme.Greeter"]));
    with(
        decl,
        "methods",
        json!([
            setter("setLog", "com.acme.Log", Some(json!({}))),
            setter("bindGreeter", "com.acme.Greeter", Some(json!({ "policy": "dynamic" }))),
            setter("unbindGreeter", "com.acme.Greeter", None)
        ]),
    )
}
