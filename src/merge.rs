//! Combine two dashboards under a selectable strategy.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::dashboard::{Dashboard, Panel, TemplateVariable};

/// Strategy for combining a secondary dashboard into a primary one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MergeStrategy {
    /// Append all secondary panels with fresh ids, add missing variables
    Append,
    /// Replace the primary's panels and variables entirely
    Replace,
    /// Update colliding panels and variables in place, add the rest
    Merge,
}

impl MergeStrategy {
    pub fn from_name(name: &str) -> Option<MergeStrategy> {
        match name.to_lowercase().as_str() {
            "append" => Some(MergeStrategy::Append),
            "replace" => Some(MergeStrategy::Replace),
            "merge" => Some(MergeStrategy::Merge),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MergeStrategy::Append => "append",
            MergeStrategy::Replace => "replace",
            MergeStrategy::Merge => "merge",
        }
    }
}

/// Result of a merge, always carrying a usable dashboard
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub dashboard: Dashboard,
    pub warnings: Vec<String>,
}

fn copy_panel(panel: &Panel) -> Panel {
    Panel::from_value(&panel.to_value())
}

fn copy_variable(variable: &TemplateVariable) -> TemplateVariable {
    TemplateVariable::from_value(&variable.to_value())
}

/// Merge `secondary` into a copy of `primary`.
///
/// The primary's metadata (title, tags, time range) always wins; only panels
/// and template variables are combined. The result is re-laid-out afterward
/// so the merge never introduces overlaps.
pub fn merge_dashboards(
    primary: &Dashboard,
    secondary: &Dashboard,
    strategy: MergeStrategy,
) -> MergeOutcome {
    info!(
        "Merging '{}' into '{}' with strategy {}",
        secondary.title,
        primary.title,
        strategy.as_str()
    );

    let mut result = primary.duplicate();
    let mut warnings = Vec::new();

    match strategy {
        MergeStrategy::Append => {
            let mut max_id = result.panels.iter().map(|p| p.id).max().unwrap_or(0);
            for panel in &secondary.panels {
                let mut new_panel = copy_panel(panel);
                new_panel.id = max_id + 1;
                max_id += 1;
                result.add_panel(new_panel);
            }

            let existing_vars: HashSet<String> =
                result.templating.iter().map(|v| v.name.clone()).collect();
            for variable in &secondary.templating {
                if existing_vars.contains(&variable.name) {
                    warnings.push(format!(
                        "Variable '{}' already exists, skipping",
                        variable.name
                    ));
                } else {
                    result.add_variable(variable.clone());
                }
            }
        }
        MergeStrategy::Replace => {
            result.panels = secondary.panels.iter().map(copy_panel).collect();
            result.templating = secondary.templating.iter().map(copy_variable).collect();
        }
        MergeStrategy::Merge => {
            let existing_panel_ids: HashSet<i64> =
                result.panels.iter().map(|p| p.id).collect();
            for panel in &secondary.panels {
                if existing_panel_ids.contains(&panel.id) {
                    if let Some(slot) = result.panels.iter_mut().find(|p| p.id == panel.id) {
                        *slot = copy_panel(panel);
                    }
                    warnings.push(format!("Updated existing panel {}", panel.id));
                } else {
                    result.add_panel(copy_panel(panel));
                }
            }

            let existing_var_names: HashSet<String> =
                result.templating.iter().map(|v| v.name.clone()).collect();
            for variable in &secondary.templating {
                if existing_var_names.contains(&variable.name) {
                    if let Some(slot) = result
                        .templating
                        .iter_mut()
                        .find(|v| v.name == variable.name)
                    {
                        *slot = copy_variable(variable);
                    }
                    warnings.push(format!(
                        "Updated existing variable '{}'",
                        variable.name
                    ));
                } else {
                    result.add_variable(copy_variable(variable));
                }
            }
        }
    }

    result.auto_layout(2);

    MergeOutcome {
        dashboard: result,
        warnings,
    }
}
