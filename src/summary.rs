//! Text renderings of a dashboard for display and for model prompts.

use serde_json::{json, Value};

use crate::dashboard::{Dashboard, Panel};

/// Rendering styles for the template variable listing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariablesFormat {
    List,
    Summary,
    Detailed,
}

impl VariablesFormat {
    /// Unrecognized names fall back to the detailed rendering.
    pub fn from_name(name: &str) -> VariablesFormat {
        match name.to_lowercase().as_str() {
            "list" => VariablesFormat::List,
            "summary" => VariablesFormat::Summary,
            _ => VariablesFormat::Detailed,
        }
    }
}

/// Render the dashboard's template variables as text.
pub fn render_variables(dashboard: &Dashboard, format: VariablesFormat) -> String {
    if dashboard.templating.is_empty() {
        return "No template variables defined".to_string();
    }

    match format {
        VariablesFormat::List => {
            let names: Vec<String> = dashboard
                .templating
                .iter()
                .map(|v| format!("${{{}}}", v.name))
                .collect();
            format!("Template Variables ({}): {}", names.len(), names.join(", "))
        }
        VariablesFormat::Summary => {
            let mut lines = vec![format!("Template Variables ({}):", dashboard.templating.len())];
            for variable in &dashboard.templating {
                let mut flags = Vec::new();
                if variable.multi {
                    flags.push("multi");
                }
                if variable.include_all {
                    flags.push("all");
                }
                if variable.hide != 0 {
                    flags.push("hidden");
                }
                let flag_str = if flags.is_empty() {
                    String::new()
                } else {
                    format!(" [{}]", flags.join(", "))
                };
                lines.push(format!("  {} ({}): {}", variable.name, variable.kind, flag_str));
            }
            lines.join("\n")
        }
        VariablesFormat::Detailed => {
            let mut lines = vec![format!("Template Variables ({}):", dashboard.templating.len())];
            lines.push("=".repeat(60));
            for (i, variable) in dashboard.templating.iter().enumerate() {
                lines.push(format!("\n{}. {}", i + 1, variable));
            }
            lines.join("\n")
        }
    }
}

fn excerpt(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}

/// Render a plain-text overview of the dashboard, suitable for a model
/// prompt. Query and field config bodies are excerpted, not reproduced in
/// full.
pub fn render_overview(dashboard: &Dashboard) -> String {
    let mut out = String::new();

    out.push_str(&format!("Dashboard Title: {}\n", dashboard.title));
    if !dashboard.description.is_empty() {
        out.push_str(&format!("Description: {}\n", dashboard.description));
    }
    if !dashboard.tags.is_empty() {
        out.push_str(&format!("Tags: {}\n", dashboard.tags.join(", ")));
    }
    out.push_str(&format!(
        "Time Range: {} to {}\n",
        dashboard.time.from, dashboard.time.to
    ));
    out.push_str(&format!("Refresh: {}\n", dashboard.refresh));

    out.push_str("\nPanels:\n");
    for (i, panel) in dashboard.panels.iter().enumerate() {
        out.push_str(&format!("\nPanel {}:\n", i + 1));
        out.push_str(&format!("  - Title: {}\n", panel.title));
        out.push_str(&format!("  - Type: {}\n", panel.kind));
        out.push_str(&format!("  - ID: {}\n", panel.id));
        out.push_str(&format!(
            "  - Position: x={}, y={}, w={}, h={}\n",
            panel.grid_pos.x, panel.grid_pos.y, panel.grid_pos.w, panel.grid_pos.h
        ));
        out.push_str(&format!("  - Queries: {} query(ies)\n", panel.targets.len()));
        for (j, target) in panel.targets.iter().enumerate() {
            if let Some(expr) = &target.expr {
                if !expr.is_empty() {
                    out.push_str(&format!(
                        "    Query {}: {}...\n",
                        j + 1,
                        excerpt(expr, 100)
                    ));
                }
            }
        }
        let field_config = serde_json::to_string_pretty(&panel.field_config.to_value()).unwrap();
        out.push_str(&format!(
            "  - Field Config: {}...\n",
            excerpt(&field_config, 200)
        ));
    }

    out.push_str(&format!(
        "\nVariables: {} variable(s)\n",
        dashboard.templating.len()
    ));
    for variable in &dashboard.templating {
        let query = if variable.query.is_empty() {
            "no query"
        } else {
            variable.query.as_str()
        };
        out.push_str(&format!(
            "  - {}: {} ({})\n",
            variable.name, variable.kind, query
        ));
    }

    out
}

/// Compact per-panel record handed to an external proposer.
pub fn panel_digest(panel: &Panel) -> Value {
    json!({
        "id": panel.id,
        "title": panel.title,
        "type": panel.kind.as_str(),
        "position": {
            "x": panel.grid_pos.x,
            "y": panel.grid_pos.y,
            "w": panel.grid_pos.w,
            "h": panel.grid_pos.h,
        },
        "targets_count": panel.targets.len(),
        "datasource": panel
            .datasource
            .as_ref()
            .map(|d| d.kind.as_str())
            .unwrap_or("none"),
    })
}

pub fn panel_digests(dashboard: &Dashboard) -> Value {
    Value::Array(dashboard.panels.iter().map(panel_digest).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dashboard::{
        DataSourceRef, GridPos, PanelKind, QueryTarget, TemplateVariable, TimeRange, VariableKind,
    };

    fn dashboard_with_variables() -> Dashboard {
        let mut dashboard = Dashboard::new("Vars");
        dashboard.add_variable(TemplateVariable {
            query: "label_values(up, env)".to_string(),
            multi: true,
            include_all: true,
            ..TemplateVariable::new("env", VariableKind::Query)
        });
        dashboard.add_variable(TemplateVariable::new("region", VariableKind::Custom));
        dashboard
    }

    #[test]
    fn no_variables_message() {
        let dashboard = Dashboard::new("Empty");
        assert_eq!(
            render_variables(&dashboard, VariablesFormat::List),
            "No template variables defined"
        );
    }

    #[test]
    fn list_format_names_only() {
        let dashboard = dashboard_with_variables();
        assert_eq!(
            render_variables(&dashboard, VariablesFormat::List),
            "Template Variables (2): ${env}, ${region}"
        );
    }

    #[test]
    fn summary_format_shows_flags() {
        let dashboard = dashboard_with_variables();
        let rendered = render_variables(&dashboard, VariablesFormat::Summary);
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[0], "Template Variables (2):");
        assert_eq!(lines[1], "  env (query):  [multi, all]");
        assert_eq!(lines[2], "  region (custom): ");
    }

    #[test]
    fn detailed_format_numbers_entries() {
        let dashboard = dashboard_with_variables();
        let rendered = render_variables(&dashboard, VariablesFormat::Detailed);
        assert!(rendered.starts_with("Template Variables (2):\n"));
        assert!(rendered.contains(&"=".repeat(60)));
        assert!(rendered.contains("\n1. Variable: ${env}"));
        assert!(rendered.contains("\n2. Variable: ${region}"));
        assert!(rendered.contains("  Flags: multi-select, include-all"));
    }

    #[test]
    fn format_names() {
        assert_eq!(VariablesFormat::from_name("list"), VariablesFormat::List);
        assert_eq!(VariablesFormat::from_name("SUMMARY"), VariablesFormat::Summary);
        assert_eq!(VariablesFormat::from_name("anything"), VariablesFormat::Detailed);
    }

    #[test]
    fn overview_lists_panels_and_queries() {
        let mut dashboard = Dashboard::new("Overview");
        dashboard.description = "Host metrics".to_string();
        dashboard.tags = vec!["infra".to_string(), "hosts".to_string()];
        dashboard.time = TimeRange::new("now-6h", "now");
        let mut panel = Panel::new(1, "CPU", PanelKind::Timeseries);
        panel.grid_pos = GridPos::new(8, 12, 0, 0);
        panel.targets.push(QueryTarget::with_expr("rate(node_cpu_seconds_total[5m])"));
        dashboard.add_panel(panel);

        let text = render_overview(&dashboard);
        assert!(text.contains("Dashboard Title: Overview\n"));
        assert!(text.contains("Description: Host metrics\n"));
        assert!(text.contains("Tags: infra, hosts\n"));
        assert!(text.contains("Time Range: now-6h to now\n"));
        assert!(text.contains("\nPanel 1:\n"));
        assert!(text.contains("  - Position: x=0, y=0, w=12, h=8\n"));
        assert!(text.contains("  - Queries: 1 query(ies)\n"));
        assert!(text.contains("    Query 1: rate(node_cpu_seconds_total[5m])...\n"));
        assert!(text.contains("\nVariables: 0 variable(s)\n"));
    }

    #[test]
    fn overview_truncates_long_queries() {
        let mut dashboard = Dashboard::new("Long");
        let mut panel = Panel::new(1, "Big", PanelKind::Table);
        panel
            .targets
            .push(QueryTarget::with_expr("x".repeat(150)));
        dashboard.add_panel(panel);

        let text = render_overview(&dashboard);
        let query_line = text
            .lines()
            .find(|l| l.trim_start().starts_with("Query 1:"))
            .unwrap();
        assert!(query_line.ends_with("..."));
        assert!(query_line.contains(&"x".repeat(100)));
        assert!(!query_line.contains(&"x".repeat(101)));
    }

    #[test]
    fn overview_skips_empty_description() {
        let dashboard = Dashboard::new("Bare");
        let text = render_overview(&dashboard);
        assert!(!text.contains("Description:"));
        assert!(!text.contains("Tags:"));
    }

    #[test]
    fn digest_shape() {
        let mut panel = Panel::new(3, "Latency", PanelKind::Heatmap);
        panel.grid_pos = GridPos::new(9, 12, 12, 0);
        panel.datasource = Some(DataSourceRef::new("prometheus", "prom-main"));
        panel.targets.push(QueryTarget::with_expr("histogram_quantile(0.99, latency)"));

        assert_eq!(
            panel_digest(&panel),
            json!({
                "id": 3,
                "title": "Latency",
                "type": "heatmap",
                "position": {"x": 12, "y": 0, "w": 12, "h": 9},
                "targets_count": 1,
                "datasource": "prometheus",
            })
        );
    }

    #[test]
    fn digest_without_datasource() {
        let panel = Panel::new(1, "Plain", PanelKind::Stat);
        let digest = panel_digest(&panel);
        assert_eq!(digest["datasource"], json!("none"));
    }

    #[test]
    fn digests_cover_all_panels() {
        let mut dashboard = Dashboard::new("All");
        dashboard.add_panel(Panel::new(1, "A", PanelKind::Timeseries));
        dashboard.add_panel(Panel::new(2, "B", PanelKind::Table));

        let digests = panel_digests(&dashboard);
        let items = digests.as_array().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1]["title"], json!("B"));
    }
}
