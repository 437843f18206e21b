use serde_json::{json, Map, Value};

use crate::dashboard::{
    Dashboard, DataSourceRef, GridPos, Panel, PanelKind, QueryTarget, TemplateVariable, TimeRange,
    VariableKind,
};

/// Fluent construction of dashboards.
///
/// Panels added through the builder get sequential ids and flow through
/// [`Dashboard::add_panel`], so they stack below existing content unless an
/// explicit position is given.
pub struct DashboardBuilder {
    dashboard: Dashboard,
}

impl DashboardBuilder {
    pub fn new(title: impl Into<String>) -> DashboardBuilder {
        DashboardBuilder {
            dashboard: Dashboard::new(title),
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.dashboard.description = description.into();
        self
    }

    pub fn tags(mut self, tags: Vec<String>) -> Self {
        self.dashboard.tags = tags;
        self
    }

    pub fn time_range(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.dashboard.time = TimeRange::new(from, to);
        self
    }

    pub fn refresh(mut self, interval: impl Into<String>) -> Self {
        self.dashboard.refresh = interval.into();
        self
    }

    pub fn uid(mut self, uid: impl Into<String>) -> Self {
        self.dashboard.uid = Some(uid.into());
        self
    }

    fn push_panel(
        &mut self,
        title: impl Into<String>,
        kind: PanelKind,
        targets: Vec<QueryTarget>,
        grid_pos: Option<GridPos>,
    ) {
        let panel_id = self.dashboard.panels.len() as i64 + 1;
        let panel = Panel {
            targets,
            grid_pos: grid_pos.unwrap_or_default(),
            ..Panel::new(panel_id, title, kind)
        };
        self.dashboard.add_panel(panel);
    }

    pub fn add_timeseries_panel(
        mut self,
        title: impl Into<String>,
        targets: Vec<QueryTarget>,
        grid_pos: Option<GridPos>,
    ) -> Self {
        self.push_panel(title, PanelKind::Timeseries, targets, grid_pos);
        self
    }

    pub fn add_table_panel(
        mut self,
        title: impl Into<String>,
        targets: Vec<QueryTarget>,
        grid_pos: Option<GridPos>,
    ) -> Self {
        self.push_panel(title, PanelKind::Table, targets, grid_pos);
        self
    }

    pub fn add_stat_panel(
        mut self,
        title: impl Into<String>,
        targets: Vec<QueryTarget>,
        grid_pos: Option<GridPos>,
    ) -> Self {
        self.push_panel(title, PanelKind::Stat, targets, grid_pos);
        self
    }

    pub fn add_query_variable(
        mut self,
        name: impl Into<String>,
        query: impl Into<String>,
        datasource: DataSourceRef,
        multi: bool,
        include_all: bool,
    ) -> Self {
        let variable = TemplateVariable {
            query: query.into(),
            datasource: Some(datasource),
            multi,
            include_all,
            ..TemplateVariable::new(name, VariableKind::Query)
        };
        self.dashboard.add_variable(variable);
        self
    }

    pub fn add_custom_variable(
        mut self,
        name: impl Into<String>,
        options: &[&str],
        multi: bool,
        include_all: bool,
    ) -> Self {
        let formatted: Vec<Value> = options
            .iter()
            .map(|o| json!({"text": o, "value": o}))
            .collect();
        let first = options.first().copied().unwrap_or("");
        let mut current = Map::new();
        current.insert("text".to_string(), json!(first));
        current.insert("value".to_string(), json!(first));

        let variable = TemplateVariable {
            options: formatted,
            current,
            multi,
            include_all,
            ..TemplateVariable::new(name, VariableKind::Custom)
        };
        self.dashboard.add_variable(variable);
        self
    }

    pub fn build(self) -> Dashboard {
        self.dashboard
    }
}
