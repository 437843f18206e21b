//! Apply add/remove/modify panel operations to a dashboard.
//!
//! Operations arrive as generic JSON records, typically produced by a model
//! suggesting edits. Each operation is applied independently and yields one
//! outcome message; after the batch, the dashboard is validated and re-laid
//! out automatically if the operations introduced layout problems.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{error, info};

use crate::dashboard::{Dashboard, DataSourceRef, GridPos, Panel, PanelKind, QueryTarget};

/// Outcome of applying a batch of operations
#[derive(Debug, Serialize, Deserialize)]
pub struct OperationReport {
    pub success: bool,
    pub messages: Vec<String>,
}

fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
    }
}

fn apply_add(dashboard: &mut Dashboard, operation: &Map<String, Value>, reason: &str) -> String {
    let panel_data = operation.get("panel").cloned().unwrap_or(Value::Object(Map::new()));
    if !panel_data.is_object() {
        error!("Failed to add panel: panel data is not an object");
        return "ERROR: Failed to add panel: panel data is not an object".to_string();
    }
    let new_panel = Panel::from_value(&panel_data);
    let title = new_panel.title.clone();
    dashboard.add_panel(new_panel);
    // add_panel may have assigned a fresh id
    let id = dashboard.panels.last().map(|p| p.id).unwrap_or(0);
    info!("Added panel: {} (ID: {})", title, id);
    format!("OK: Added panel '{}' (ID: {}) - {}", title, id, reason)
}

fn apply_remove(dashboard: &mut Dashboard, operation: &Map<String, Value>, reason: &str) -> String {
    let panel_id = operation.get("panel_id").and_then(Value::as_i64).unwrap_or(0);
    if panel_id == 0 {
        return "ERROR: Remove operation missing panel_id".to_string();
    }
    match dashboard.get_panel_by_id(panel_id).map(|p| p.title.clone()) {
        Some(title) => {
            if dashboard.remove_panel(panel_id) {
                info!("Removed panel: {} (ID: {})", title, panel_id);
                format!("OK: Removed panel '{}' (ID: {}) - {}", title, panel_id, reason)
            } else {
                format!("ERROR: Failed to remove panel ID {}", panel_id)
            }
        }
        None => format!("ERROR: Panel ID {} not found", panel_id),
    }
}

fn apply_modify(dashboard: &mut Dashboard, operation: &Map<String, Value>, reason: &str) -> String {
    let panel_id = operation.get("panel_id").and_then(Value::as_i64).unwrap_or(0);
    let panel_data = operation.get("panel").cloned().unwrap_or(Value::Object(Map::new()));

    if panel_id == 0 || is_falsy(&panel_data) {
        return "ERROR: Modify operation missing panel_id or panel data".to_string();
    }
    let fields = match panel_data.as_object() {
        Some(fields) => fields,
        None => {
            error!("Failed to modify panel {}: panel data is not an object", panel_id);
            return format!(
                "ERROR: Failed to modify panel ID {}: panel data is not an object",
                panel_id
            );
        }
    };

    let panel = match dashboard.get_panel_by_id_mut(panel_id) {
        Some(panel) => panel,
        None => return format!("ERROR: Panel ID {} not found for modification", panel_id),
    };

    for (key, value) in fields {
        match key.as_str() {
            "gridPos" => {
                if value.is_object() {
                    panel.grid_pos = GridPos::from_value(value);
                }
            }
            "targets" => {
                if let Some(items) = value.as_array() {
                    panel.targets = items.iter().map(QueryTarget::from_value).collect();
                }
            }
            "datasource" => {
                if value.is_object() {
                    panel.datasource = DataSourceRef::from_value(value);
                }
            }
            "panels" => {
                if let Some(items) = value.as_array() {
                    panel.panels = Some(items.iter().map(Panel::from_value).collect());
                }
            }
            "id" => {
                if let Some(id) = value.as_i64() {
                    panel.id = id;
                }
            }
            "title" => {
                if let Some(title) = value.as_str() {
                    panel.title = title.to_string();
                }
            }
            "type" => {
                if let Some(kind) = value.as_str() {
                    panel.kind = PanelKind::parse(kind);
                }
            }
            "description" => {
                if let Some(description) = value.as_str() {
                    panel.description = Some(description.to_string());
                }
            }
            "transparent" => {
                if let Some(flag) = value.as_bool() {
                    panel.transparent = flag;
                }
            }
            "collapsed" => {
                if let Some(flag) = value.as_bool() {
                    panel.collapsed = flag;
                }
            }
            "options" => {
                if let Some(map) = value.as_object() {
                    panel.options = map.clone();
                }
            }
            _ => {}
        }
    }

    let title = panel.title.clone();
    info!("Modified panel: {} (ID: {})", title, panel_id);
    format!("OK: Modified panel '{}' (ID: {}) - {}", title, panel_id, reason)
}

/// Apply a batch of panel operations in order.
///
/// Each operation record carries an `action` ("add", "remove" or "modify"),
/// an optional `reason`, and action-specific fields (`panel` sub-tree,
/// `panel_id`). Failures are recorded per operation and do not abort the
/// rest of the batch.
pub fn apply_operations(dashboard: &mut Dashboard, operations: &[Value]) -> OperationReport {
    let mut messages = Vec::new();

    for operation in operations {
        let record = match operation.as_object() {
            Some(record) => record,
            None => {
                let msg = "Error applying panel operations: operation is not an object";
                error!("{}", msg);
                return OperationReport {
                    success: false,
                    messages: vec![msg.to_string()],
                };
            }
        };

        let action = record
            .get("action")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_lowercase();
        let reason = record
            .get("reason")
            .and_then(Value::as_str)
            .unwrap_or("No reason provided");

        let message = match action.as_str() {
            "add" => apply_add(dashboard, record, reason),
            "remove" => apply_remove(dashboard, record, reason),
            "modify" => apply_modify(dashboard, record, reason),
            other => format!("ERROR: Unknown operation action: {}", other),
        };
        messages.push(message);
    }

    let report = dashboard.validation_report();
    if !report.is_valid() {
        messages.push(format!(
            "WARNING: Dashboard validation issues: {}",
            report.errors.join("; ")
        ));
        dashboard.auto_layout(2);
        messages.push("NOTE: Applied auto-layout to fix positioning issues".to_string());
    }
    if !report.warnings.is_empty() {
        messages.push(format!("WARNING: Warnings: {}", report.warnings.join("; ")));
    }

    OperationReport {
        success: true,
        messages,
    }
}
