//! Schema-aware repair of raw dashboard trees.
//!
//! Where the recovery pipeline fixes JSON syntax, this pass fixes dashboard
//! shape: missing required fields, colliding panel ids, and envelope
//! structures that arrive as the wrong type. It operates on the raw tree so
//! the fixes are visible to any consumer, not just the typed decoder.

use serde_json::{json, Value};
use std::collections::HashSet;
use tracing::debug;

/// Fill in required fields and repair structural slips in place. Trees that
/// are not JSON objects are left untouched.
pub fn normalize_dashboard_tree(tree: &mut Value) {
    let root = match tree.as_object_mut() {
        Some(map) => map,
        None => return,
    };

    let required: [(&str, Value); 16] = [
        ("title", json!("Untitled Dashboard")),
        ("panels", json!([])),
        ("time", json!({"from": "now-1h", "to": "now"})),
        ("refresh", json!("5s")),
        ("tags", json!([])),
        ("templating", json!({"list": []})),
        ("annotations", json!({"list": []})),
        ("schemaVersion", json!(1)),
        ("version", json!(1)),
        ("timezone", json!("browser")),
        ("editable", json!(true)),
        ("gnetId", Value::Null),
        ("graphTooltip", json!(0)),
        ("id", Value::Null),
        ("links", json!([])),
        ("liveNow", json!(false)),
    ];
    for (key, default) in required {
        if !root.contains_key(key) {
            debug!("Filling missing dashboard field '{}'", key);
            root.insert(key.to_string(), default);
        }
    }

    if let Some(panels) = root.get_mut("panels").and_then(Value::as_array_mut) {
        let mut used_ids: HashSet<i64> = HashSet::new();
        for (i, entry) in panels.iter_mut().enumerate() {
            // Non-object entries stay in the list untouched
            let panel = match entry.as_object_mut() {
                Some(map) => map,
                None => continue,
            };
            let position = i as i64 + 1;

            let defaults: [(&str, Value); 7] = [
                ("id", json!(position)),
                ("title", json!(format!("Panel {}", position))),
                ("type", json!("graph")),
                ("gridPos", json!({"h": 8, "w": 12, "x": 0, "y": 0})),
                ("targets", json!([])),
                ("fieldConfig", json!({"defaults": {}, "overrides": []})),
                ("options", json!({})),
            ];
            for (key, default) in defaults {
                if !panel.contains_key(key) {
                    panel.insert(key.to_string(), default);
                }
            }

            // Colliding or non-integer ids are re-assigned, bumping up
            // from the panel's position until a free id is found
            let current = panel.get("id").and_then(Value::as_i64);
            let id = match current {
                Some(id) if !used_ids.contains(&id) => id,
                _ => {
                    let mut candidate = position;
                    while used_ids.contains(&candidate) {
                        candidate += 1;
                    }
                    debug!("Re-assigning panel id at position {} to {}", i, candidate);
                    panel.insert("id".to_string(), json!(candidate));
                    candidate
                }
            };
            used_ids.insert(id);
        }
    }

    if let Some(time) = root.get_mut("time").and_then(Value::as_object_mut) {
        if !time.contains_key("from") {
            time.insert("from".to_string(), json!("now-1h"));
        }
        if !time.contains_key("to") {
            time.insert("to".to_string(), json!("now"));
        }
    }

    for key in ["templating", "annotations"] {
        let is_object = matches!(root.get(key), Some(Value::Object(_)));
        if !is_object {
            root.insert(key.to_string(), json!({"list": []}));
        } else if let Some(envelope) = root.get_mut(key).and_then(Value::as_object_mut) {
            if !envelope.contains_key("list") {
                envelope.insert("list".to_string(), json!([]));
            }
        }
    }
}
