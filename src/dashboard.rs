use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::HashSet;
use std::fmt;
use tracing::{debug, warn};

// Lenient accessors over raw JSON maps. Decoding never fails; every field
// falls back to its default when missing or carrying the wrong type.

fn str_or(map: &Map<String, Value>, key: &str, default: &str) -> String {
    match map.get(key) {
        Some(Value::String(s)) => s.clone(),
        _ => default.to_string(),
    }
}

fn opt_str(map: &Map<String, Value>, key: &str) -> Option<String> {
    match map.get(key) {
        Some(Value::String(s)) => Some(s.clone()),
        _ => None,
    }
}

fn num_i64(value: &Value) -> Option<i64> {
    if let Some(i) = value.as_i64() {
        Some(i)
    } else {
        value.as_f64().map(|f| f as i64)
    }
}

fn int_or(map: &Map<String, Value>, key: &str, default: i64) -> i64 {
    map.get(key).and_then(num_i64).unwrap_or(default)
}

fn opt_int(map: &Map<String, Value>, key: &str) -> Option<i64> {
    map.get(key).and_then(num_i64)
}

fn bool_or(map: &Map<String, Value>, key: &str, default: bool) -> bool {
    match map.get(key) {
        Some(Value::Bool(b)) => *b,
        _ => default,
    }
}

fn insert_nonempty(map: &mut Map<String, Value>, key: &str, value: &Option<String>) {
    if let Some(s) = value {
        if !s.is_empty() {
            map.insert(key.to_string(), Value::String(s.clone()));
        }
    }
}

/// Panel position and size on the 24-column dashboard grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridPos {
    pub h: i64,
    pub w: i64,
    pub x: i64,
    pub y: i64,
}

impl Default for GridPos {
    fn default() -> Self {
        GridPos { h: 8, w: 12, x: 0, y: 0 }
    }
}

impl GridPos {
    pub fn new(h: i64, w: i64, x: i64, y: i64) -> Self {
        GridPos { h, w, x, y }
    }

    pub fn from_value(value: &Value) -> GridPos {
        let empty = Map::new();
        let map = value.as_object().unwrap_or(&empty);
        GridPos {
            h: int_or(map, "h", 8),
            w: int_or(map, "w", 12),
            x: int_or(map, "x", 0),
            y: int_or(map, "y", 0),
        }
    }

    pub fn to_value(&self) -> Value {
        json!({"h": self.h, "w": self.w, "x": self.x, "y": self.y})
    }

    /// Rectangle intersection test. Panels that merely touch along an edge
    /// do not overlap.
    pub fn overlaps(&self, other: &GridPos) -> bool {
        !(self.x + self.w <= other.x
            || other.x + other.w <= self.x
            || self.y + self.h <= other.y
            || other.y + other.h <= self.y)
    }
}

/// Reference to a datasource, either the standard `{type, uid}` object or
/// the legacy bare-string form which carries only a uid.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DataSourceRef {
    pub kind: String,
    pub uid: String,
}

impl DataSourceRef {
    pub fn new(kind: impl Into<String>, uid: impl Into<String>) -> Self {
        DataSourceRef {
            kind: kind.into(),
            uid: uid.into(),
        }
    }

    /// Decode from any of the wire shapes. Shapes that are neither a string
    /// nor an object decode as absent.
    pub fn from_value(value: &Value) -> Option<DataSourceRef> {
        match value {
            Value::String(uid) => Some(DataSourceRef {
                kind: String::new(),
                uid: uid.clone(),
            }),
            Value::Object(map) => Some(DataSourceRef {
                kind: str_or(map, "type", ""),
                uid: str_or(map, "uid", ""),
            }),
            _ => None,
        }
    }

    pub fn to_value(&self) -> Value {
        json!({"type": self.kind, "uid": self.uid})
    }
}

/// A single query attached to a panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryTarget {
    pub datasource: Option<DataSourceRef>,
    pub ref_id: String,
    pub expr: Option<String>,
    pub raw_sql: Option<String>,
    pub format: String,
    pub editor_mode: String,
    pub raw_query: bool,
    pub hide: bool,
    pub interval: Option<String>,
    pub legend_format: Option<String>,
    pub step: Option<i64>,
    pub instant: bool,
}

impl Default for QueryTarget {
    fn default() -> Self {
        QueryTarget {
            datasource: None,
            ref_id: "A".to_string(),
            expr: None,
            raw_sql: None,
            format: "time_series".to_string(),
            editor_mode: "code".to_string(),
            raw_query: true,
            hide: false,
            interval: None,
            legend_format: None,
            step: None,
            instant: false,
        }
    }
}

impl QueryTarget {
    pub fn with_expr(expr: impl Into<String>) -> Self {
        QueryTarget {
            expr: Some(expr.into()),
            ..Default::default()
        }
    }

    pub fn with_raw_sql(raw_sql: impl Into<String>) -> Self {
        QueryTarget {
            raw_sql: Some(raw_sql.into()),
            format: "table".to_string(),
            ..Default::default()
        }
    }

    pub fn from_value(value: &Value) -> QueryTarget {
        let empty = Map::new();
        let map = value.as_object().unwrap_or(&empty);
        QueryTarget {
            datasource: map.get("datasource").and_then(DataSourceRef::from_value),
            ref_id: str_or(map, "refId", "A"),
            expr: opt_str(map, "expr"),
            raw_sql: opt_str(map, "rawSql"),
            format: str_or(map, "format", "time_series"),
            editor_mode: str_or(map, "editorMode", "code"),
            raw_query: bool_or(map, "rawQuery", true),
            hide: bool_or(map, "hide", false),
            interval: opt_str(map, "interval"),
            legend_format: opt_str(map, "legendFormat"),
            step: opt_int(map, "step"),
            instant: bool_or(map, "instant", false),
        }
    }

    /// Canonical encoding. Query text and cosmetic fields are emitted only
    /// when they carry a meaningful value; `editorMode` and `rawQuery`
    /// travel together with `rawSql`.
    pub fn to_value(&self) -> Value {
        let mut result = Map::new();
        result.insert("refId".to_string(), json!(self.ref_id));
        result.insert("format".to_string(), json!(self.format));
        result.insert("hide".to_string(), json!(self.hide));

        if let Some(ds) = &self.datasource {
            result.insert("datasource".to_string(), ds.to_value());
        }
        insert_nonempty(&mut result, "expr", &self.expr);
        if let Some(sql) = &self.raw_sql {
            if !sql.is_empty() {
                result.insert("rawSql".to_string(), json!(sql));
                result.insert("editorMode".to_string(), json!(self.editor_mode));
                result.insert("rawQuery".to_string(), json!(self.raw_query));
            }
        }
        insert_nonempty(&mut result, "interval", &self.interval);
        insert_nonempty(&mut result, "legendFormat", &self.legend_format);
        if let Some(step) = self.step {
            if step != 0 {
                result.insert("step".to_string(), json!(step));
            }
        }
        if self.instant {
            result.insert("instant".to_string(), json!(true));
        }

        Value::Object(result)
    }
}

/// Display defaults and per-field overrides, kept as an opaque bag. The
/// contents are vendor-defined and uninterpreted here.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FieldConfig {
    pub defaults: Map<String, Value>,
    pub overrides: Vec<Value>,
}

impl FieldConfig {
    pub fn from_value(value: &Value) -> FieldConfig {
        let empty = Map::new();
        let map = value.as_object().unwrap_or(&empty);
        FieldConfig {
            defaults: map
                .get("defaults")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default(),
            overrides: map
                .get("overrides")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default(),
        }
    }

    pub fn to_value(&self) -> Value {
        json!({"defaults": self.defaults, "overrides": self.overrides})
    }
}

/// Panel visualization type. Unrecognized tags are retained verbatim so
/// they survive a round trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelKind {
    Graph,
    Timeseries,
    Table,
    Stat,
    Gauge,
    BarGauge,
    Heatmap,
    PieChart,
    Text,
    Logs,
    AlertList,
    DashList,
    News,
    PluginList,
    Row,
    Other(String),
}

impl PanelKind {
    pub fn parse(tag: &str) -> PanelKind {
        match tag {
            "graph" => PanelKind::Graph,
            "timeseries" => PanelKind::Timeseries,
            "table" => PanelKind::Table,
            "stat" => PanelKind::Stat,
            "gauge" => PanelKind::Gauge,
            "bargauge" => PanelKind::BarGauge,
            "heatmap" => PanelKind::Heatmap,
            "piechart" => PanelKind::PieChart,
            "text" => PanelKind::Text,
            "logs" => PanelKind::Logs,
            "alertlist" => PanelKind::AlertList,
            "dashlist" => PanelKind::DashList,
            "news" => PanelKind::News,
            "pluginlist" => PanelKind::PluginList,
            "row" => PanelKind::Row,
            other => PanelKind::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            PanelKind::Graph => "graph",
            PanelKind::Timeseries => "timeseries",
            PanelKind::Table => "table",
            PanelKind::Stat => "stat",
            PanelKind::Gauge => "gauge",
            PanelKind::BarGauge => "bargauge",
            PanelKind::Heatmap => "heatmap",
            PanelKind::PieChart => "piechart",
            PanelKind::Text => "text",
            PanelKind::Logs => "logs",
            PanelKind::AlertList => "alertlist",
            PanelKind::DashList => "dashlist",
            PanelKind::News => "news",
            PanelKind::PluginList => "pluginlist",
            PanelKind::Row => "row",
            PanelKind::Other(tag) => tag,
        }
    }

    pub fn is_row(&self) -> bool {
        matches!(self, PanelKind::Row)
    }
}

impl fmt::Display for PanelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A dashboard panel. Row panels may carry nested child panels.
#[derive(Debug, Clone, PartialEq)]
pub struct Panel {
    pub id: i64,
    pub title: String,
    pub kind: PanelKind,
    pub grid_pos: GridPos,
    pub targets: Vec<QueryTarget>,
    pub field_config: FieldConfig,
    pub options: Map<String, Value>,
    pub datasource: Option<DataSourceRef>,
    pub description: Option<String>,
    pub transparent: bool,
    pub collapsed: bool,
    pub panels: Option<Vec<Panel>>,
}

impl Default for Panel {
    fn default() -> Self {
        Panel {
            id: 0,
            title: "Panel".to_string(),
            kind: PanelKind::Timeseries,
            grid_pos: GridPos::default(),
            targets: Vec::new(),
            field_config: FieldConfig::default(),
            options: Map::new(),
            datasource: None,
            description: None,
            transparent: false,
            collapsed: false,
            panels: None,
        }
    }
}

impl Panel {
    pub fn new(id: i64, title: impl Into<String>, kind: PanelKind) -> Panel {
        Panel {
            id,
            title: title.into(),
            kind,
            ..Default::default()
        }
    }

    pub fn from_value(value: &Value) -> Panel {
        let empty = Map::new();
        let map = value.as_object().unwrap_or(&empty);

        let targets = map
            .get("targets")
            .and_then(Value::as_array)
            .map(|a| a.iter().map(QueryTarget::from_value).collect())
            .unwrap_or_default();

        // Child panels decode for any type but only non-empty lists survive
        let panels = map
            .get("panels")
            .and_then(Value::as_array)
            .filter(|a| !a.is_empty())
            .map(|a| a.iter().map(Panel::from_value).collect());

        Panel {
            id: int_or(map, "id", 1),
            title: str_or(map, "title", "Panel"),
            kind: PanelKind::parse(&str_or(map, "type", "timeseries")),
            grid_pos: GridPos::from_value(map.get("gridPos").unwrap_or(&Value::Null)),
            targets,
            field_config: FieldConfig::from_value(map.get("fieldConfig").unwrap_or(&Value::Null)),
            options: map
                .get("options")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default(),
            datasource: map.get("datasource").and_then(DataSourceRef::from_value),
            description: opt_str(map, "description"),
            transparent: bool_or(map, "transparent", false),
            collapsed: bool_or(map, "collapsed", false),
            panels,
        }
    }

    pub fn to_value(&self) -> Value {
        let mut result = Map::new();
        result.insert("id".to_string(), json!(self.id));
        result.insert("title".to_string(), json!(self.title));
        result.insert("type".to_string(), json!(self.kind.as_str()));
        result.insert("gridPos".to_string(), self.grid_pos.to_value());
        result.insert(
            "targets".to_string(),
            Value::Array(self.targets.iter().map(QueryTarget::to_value).collect()),
        );
        result.insert("fieldConfig".to_string(), self.field_config.to_value());
        result.insert("options".to_string(), Value::Object(self.options.clone()));
        result.insert("transparent".to_string(), json!(self.transparent));

        if let Some(ds) = &self.datasource {
            result.insert("datasource".to_string(), ds.to_value());
        }
        insert_nonempty(&mut result, "description", &self.description);

        // Collapse state and children are meaningful on rows only
        if self.kind.is_row() {
            result.insert("collapsed".to_string(), json!(self.collapsed));
            if let Some(children) = &self.panels {
                if !children.is_empty() {
                    result.insert(
                        "panels".to_string(),
                        Value::Array(children.iter().map(Panel::to_value).collect()),
                    );
                }
            }
        }

        Value::Object(result)
    }
}

/// Template variable type tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VariableKind {
    Query,
    Custom,
    Constant,
    Datasource,
    Interval,
    Textbox,
    Adhoc,
    Other(String),
}

impl VariableKind {
    pub fn parse(tag: &str) -> VariableKind {
        match tag {
            "query" => VariableKind::Query,
            "custom" => VariableKind::Custom,
            "constant" => VariableKind::Constant,
            "datasource" => VariableKind::Datasource,
            "interval" => VariableKind::Interval,
            "textbox" => VariableKind::Textbox,
            "adhoc" => VariableKind::Adhoc,
            other => VariableKind::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            VariableKind::Query => "query",
            VariableKind::Custom => "custom",
            VariableKind::Constant => "constant",
            VariableKind::Datasource => "datasource",
            VariableKind::Interval => "interval",
            VariableKind::Textbox => "textbox",
            VariableKind::Adhoc => "adhoc",
            VariableKind::Other(tag) => tag,
        }
    }
}

impl fmt::Display for VariableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A dashboard template variable.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateVariable {
    pub name: String,
    pub kind: VariableKind,
    pub query: String,
    pub current: Map<String, Value>,
    pub options: Vec<Value>,
    pub datasource: Option<DataSourceRef>,
    pub definition: String,
    pub hide: i64,
    pub include_all: bool,
    pub multi: bool,
    pub refresh: i64,
    pub regex: String,
    pub skip_url_sync: bool,
    pub sort: i64,
}

impl Default for TemplateVariable {
    fn default() -> Self {
        TemplateVariable {
            name: String::new(),
            kind: VariableKind::Query,
            query: String::new(),
            current: Map::new(),
            options: Vec::new(),
            datasource: None,
            definition: String::new(),
            hide: 0,
            include_all: false,
            multi: false,
            refresh: 1,
            regex: String::new(),
            skip_url_sync: false,
            sort: 0,
        }
    }
}

impl TemplateVariable {
    pub fn new(name: impl Into<String>, kind: VariableKind) -> TemplateVariable {
        TemplateVariable {
            name: name.into(),
            kind,
            ..Default::default()
        }
    }

    pub fn from_value(value: &Value) -> TemplateVariable {
        let empty = Map::new();
        let map = value.as_object().unwrap_or(&empty);
        TemplateVariable {
            name: str_or(map, "name", ""),
            kind: VariableKind::parse(&str_or(map, "type", "query")),
            query: str_or(map, "query", ""),
            current: map
                .get("current")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default(),
            options: map
                .get("options")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default(),
            datasource: map.get("datasource").and_then(DataSourceRef::from_value),
            definition: str_or(map, "definition", ""),
            hide: int_or(map, "hide", 0),
            include_all: bool_or(map, "includeAll", false),
            multi: bool_or(map, "multi", false),
            refresh: int_or(map, "refresh", 1),
            regex: str_or(map, "regex", ""),
            skip_url_sync: bool_or(map, "skipUrlSync", false),
            sort: int_or(map, "sort", 0),
        }
    }

    pub fn to_value(&self) -> Value {
        let mut result = Map::new();
        result.insert("name".to_string(), json!(self.name));
        result.insert("type".to_string(), json!(self.kind.as_str()));
        result.insert("query".to_string(), json!(self.query));
        result.insert("current".to_string(), Value::Object(self.current.clone()));
        result.insert("options".to_string(), Value::Array(self.options.clone()));
        result.insert("definition".to_string(), json!(self.definition));
        result.insert("hide".to_string(), json!(self.hide));
        result.insert("includeAll".to_string(), json!(self.include_all));
        result.insert("multi".to_string(), json!(self.multi));
        result.insert("refresh".to_string(), json!(self.refresh));
        result.insert("regex".to_string(), json!(self.regex));
        result.insert("skipUrlSync".to_string(), json!(self.skip_url_sync));
        result.insert("sort".to_string(), json!(self.sort));
        if let Some(ds) = &self.datasource {
            result.insert("datasource".to_string(), ds.to_value());
        }
        Value::Object(result)
    }
}

impl fmt::Display for TemplateVariable {
    /// Multi-line detail block used by the variable renderings.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Variable: ${{{}}}", self.name)?;
        write!(f, "  Type: {}", self.kind)?;

        if !self.query.is_empty() {
            write!(f, "\n  Query: {}", self.query)?;
        }
        if let Some(ds) = &self.datasource {
            write!(f, "\n  Datasource: {} ({})", ds.kind, ds.uid)?;
        }
        if !self.current.is_empty() {
            let current_value = match self.current.get("value") {
                Some(Value::String(s)) => s.clone(),
                Some(v) => v.to_string(),
                None => "N/A".to_string(),
            };
            write!(f, "\n  Current Value: {}", current_value)?;
        }

        let mut flags = Vec::new();
        if self.multi {
            flags.push("multi-select");
        }
        if self.include_all {
            flags.push("include-all");
        }
        if self.hide != 0 {
            flags.push("hidden");
        }
        if !flags.is_empty() {
            write!(f, "\n  Flags: {}", flags.join(", "))?;
        }
        Ok(())
    }
}

/// A dashboard annotation layer. The datasource descriptor stays an opaque
/// tree; the built-in layer references a pseudo-datasource.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    pub name: String,
    pub datasource: Value,
    pub enable: bool,
    pub hide: bool,
    pub icon_color: String,
    pub kind: String,
    pub built_in: i64,
}

fn builtin_annotation_datasource() -> Value {
    json!({"type": "grafana", "uid": "-- Grafana --"})
}

impl Default for Annotation {
    fn default() -> Self {
        Annotation {
            name: "Annotations & Alerts".to_string(),
            datasource: builtin_annotation_datasource(),
            enable: true,
            hide: true,
            icon_color: "rgba(0, 211, 255, 1)".to_string(),
            kind: "dashboard".to_string(),
            built_in: 1,
        }
    }
}

impl Annotation {
    pub fn from_value(value: &Value) -> Annotation {
        let empty = Map::new();
        let map = value.as_object().unwrap_or(&empty);
        Annotation {
            name: str_or(map, "name", "Annotations & Alerts"),
            datasource: map
                .get("datasource")
                .cloned()
                .unwrap_or_else(builtin_annotation_datasource),
            enable: bool_or(map, "enable", true),
            hide: bool_or(map, "hide", true),
            icon_color: str_or(map, "iconColor", "rgba(0, 211, 255, 1)"),
            kind: str_or(map, "type", "dashboard"),
            built_in: int_or(map, "builtIn", 1),
        }
    }

    pub fn to_value(&self) -> Value {
        let mut result = Map::new();
        result.insert("name".to_string(), json!(self.name));
        result.insert("datasource".to_string(), self.datasource.clone());
        result.insert("enable".to_string(), json!(self.enable));
        result.insert("hide".to_string(), json!(self.hide));
        result.insert("iconColor".to_string(), json!(self.icon_color));
        result.insert("type".to_string(), json!(self.kind));
        result.insert("builtIn".to_string(), json!(self.built_in));
        Value::Object(result)
    }
}

/// Dashboard time window, kept as raw expression strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeRange {
    pub from: String,
    pub to: String,
}

impl Default for TimeRange {
    fn default() -> Self {
        TimeRange {
            from: "now-1h".to_string(),
            to: "now".to_string(),
        }
    }
}

impl TimeRange {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> TimeRange {
        TimeRange {
            from: from.into(),
            to: to.into(),
        }
    }

    pub fn from_value(value: &Value) -> TimeRange {
        let empty = Map::new();
        let map = value.as_object().unwrap_or(&empty);
        TimeRange {
            from: str_or(map, "from", "now-1h"),
            to: str_or(map, "to", "now"),
        }
    }

    pub fn to_value(&self) -> Value {
        json!({"from": self.from, "to": self.to})
    }
}

/// Outcome of the extended validation pass: hard structural findings plus
/// advisory warnings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// The dashboard document aggregate.
#[derive(Debug, Clone, PartialEq)]
pub struct Dashboard {
    pub title: String,
    pub uid: Option<String>,
    pub id: Option<i64>,
    pub description: String,
    pub tags: Vec<String>,
    pub panels: Vec<Panel>,
    pub time: TimeRange,
    pub templating: Vec<TemplateVariable>,
    pub annotations: Vec<Annotation>,
    pub refresh: String,
    pub schema_version: i64,
    pub version: i64,
    pub editable: bool,
    pub graph_tooltip: i64,
    pub timezone: String,
    pub fiscal_year_start_month: i64,
    pub links: Vec<Value>,
    pub live_now: bool,
    pub week_start: String,
}

impl Default for Dashboard {
    fn default() -> Self {
        Dashboard {
            title: "Untitled Dashboard".to_string(),
            uid: None,
            id: None,
            description: String::new(),
            tags: Vec::new(),
            panels: Vec::new(),
            time: TimeRange::default(),
            templating: Vec::new(),
            annotations: Vec::new(),
            refresh: "5s".to_string(),
            schema_version: 39,
            version: 1,
            editable: true,
            graph_tooltip: 0,
            timezone: "browser".to_string(),
            fiscal_year_start_month: 0,
            links: Vec::new(),
            live_now: false,
            week_start: String::new(),
        }
    }
}

impl Dashboard {
    pub fn new(title: impl Into<String>) -> Dashboard {
        Dashboard {
            title: title.into(),
            ..Default::default()
        }
    }

    /// Decode a raw JSON tree. Never fails; missing and malformed fields
    /// fall back to their defaults. A dashboard without annotations gets
    /// the built-in annotation layer.
    pub fn from_value(value: &Value) -> Dashboard {
        let empty = Map::new();
        let map = value.as_object().unwrap_or(&empty);

        let panels: Vec<Panel> = map
            .get("panels")
            .and_then(Value::as_array)
            .map(|a| a.iter().map(Panel::from_value).collect())
            .unwrap_or_default();

        let templating: Vec<TemplateVariable> = map
            .get("templating")
            .and_then(Value::as_object)
            .and_then(|t| t.get("list"))
            .and_then(Value::as_array)
            .map(|a| a.iter().map(TemplateVariable::from_value).collect())
            .unwrap_or_default();

        let mut annotations: Vec<Annotation> = map
            .get("annotations")
            .and_then(Value::as_object)
            .and_then(|a| a.get("list"))
            .and_then(Value::as_array)
            .map(|a| a.iter().map(Annotation::from_value).collect())
            .unwrap_or_default();
        if annotations.is_empty() {
            annotations.push(Annotation::default());
        }

        let tags = map
            .get("tags")
            .and_then(Value::as_array)
            .map(|a| {
                a.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        debug!(
            "Decoded dashboard tree: {} panels, {} variables",
            panels.len(),
            templating.len()
        );

        Dashboard {
            title: str_or(map, "title", "Untitled Dashboard"),
            uid: opt_str(map, "uid"),
            id: opt_int(map, "id"),
            description: str_or(map, "description", ""),
            tags,
            panels,
            time: map
                .get("time")
                .map(TimeRange::from_value)
                .unwrap_or_default(),
            templating,
            annotations,
            refresh: str_or(map, "refresh", "5s"),
            schema_version: int_or(map, "schemaVersion", 39),
            version: int_or(map, "version", 1),
            editable: bool_or(map, "editable", true),
            graph_tooltip: int_or(map, "graphTooltip", 0),
            timezone: str_or(map, "timezone", "browser"),
            fiscal_year_start_month: int_or(map, "fiscalYearStartMonth", 0),
            links: map
                .get("links")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default(),
            live_now: bool_or(map, "liveNow", false),
            week_start: str_or(map, "weekStart", ""),
        }
    }

    /// Canonical encoding. Variables and annotations travel inside `list`
    /// envelopes; `uid`, `id` and `weekStart` are omitted when unset.
    pub fn to_value(&self) -> Value {
        let mut result = Map::new();
        result.insert("title".to_string(), json!(self.title));
        result.insert("description".to_string(), json!(self.description));
        result.insert("tags".to_string(), json!(self.tags));
        result.insert(
            "panels".to_string(),
            Value::Array(self.panels.iter().map(Panel::to_value).collect()),
        );
        result.insert("time".to_string(), self.time.to_value());
        result.insert(
            "templating".to_string(),
            json!({"list": self.templating.iter().map(TemplateVariable::to_value).collect::<Vec<_>>()}),
        );
        result.insert(
            "annotations".to_string(),
            json!({"list": self.annotations.iter().map(Annotation::to_value).collect::<Vec<_>>()}),
        );
        result.insert("refresh".to_string(), json!(self.refresh));
        result.insert("schemaVersion".to_string(), json!(self.schema_version));
        result.insert("version".to_string(), json!(self.version));
        result.insert("editable".to_string(), json!(self.editable));
        result.insert("graphTooltip".to_string(), json!(self.graph_tooltip));
        result.insert("timezone".to_string(), json!(self.timezone));
        result.insert(
            "fiscalYearStartMonth".to_string(),
            json!(self.fiscal_year_start_month),
        );
        result.insert("links".to_string(), Value::Array(self.links.clone()));
        result.insert("liveNow".to_string(), json!(self.live_now));

        insert_nonempty(&mut result, "uid", &self.uid);
        if let Some(id) = self.id {
            if id != 0 {
                result.insert("id".to_string(), json!(id));
            }
        }
        if !self.week_start.is_empty() {
            result.insert("weekStart".to_string(), json!(self.week_start));
        }

        Value::Object(result)
    }

    pub fn to_json_string(&self, pretty: bool) -> String {
        let value = self.to_value();
        if pretty {
            serde_json::to_string_pretty(&value).unwrap()
        } else {
            serde_json::to_string(&value).unwrap()
        }
    }

    /// Strict string parse followed by the lenient tree decode. For text
    /// that may need repair, use the recovery pipeline instead.
    pub fn from_json_str(text: &str) -> serde_json::Result<Dashboard> {
        let value: Value = serde_json::from_str(text)?;
        Ok(Dashboard::from_value(&value))
    }

    /// Append a panel. An unset id (zero) gets the next free id; a panel
    /// sitting at the origin is moved below the lowest existing panel.
    pub fn add_panel(&mut self, mut panel: Panel) {
        if panel.id == 0 {
            let max_id = self
                .panels
                .iter()
                .map(|p| p.id)
                .filter(|id| *id != 0)
                .max()
                .unwrap_or(0);
            panel.id = max_id + 1;
        }
        if panel.grid_pos.x == 0 && panel.grid_pos.y == 0 {
            let max_y = self
                .panels
                .iter()
                .map(|p| p.grid_pos.y + p.grid_pos.h)
                .max()
                .unwrap_or(0);
            panel.grid_pos.y = max_y;
        }
        self.panels.push(panel);
    }

    pub fn remove_panel(&mut self, panel_id: i64) -> bool {
        match self.panels.iter().position(|p| p.id == panel_id) {
            Some(idx) => {
                self.panels.remove(idx);
                true
            }
            None => false,
        }
    }

    pub fn get_panel_by_id(&self, panel_id: i64) -> Option<&Panel> {
        self.panels.iter().find(|p| p.id == panel_id)
    }

    pub fn get_panel_by_id_mut(&mut self, panel_id: i64) -> Option<&mut Panel> {
        self.panels.iter_mut().find(|p| p.id == panel_id)
    }

    pub fn get_panels_by_kind(&self, kind: &PanelKind) -> Vec<&Panel> {
        self.panels.iter().filter(|p| &p.kind == kind).collect()
    }

    pub fn add_variable(&mut self, variable: TemplateVariable) {
        self.templating.push(variable);
    }

    pub fn remove_variable(&mut self, name: &str) -> bool {
        match self.templating.iter().position(|v| v.name == name) {
            Some(idx) => {
                self.templating.remove(idx);
                true
            }
            None => false,
        }
    }

    pub fn get_variable_by_name(&self, name: &str) -> Option<&TemplateVariable> {
        self.templating.iter().find(|v| v.name == name)
    }

    /// Check structural invariants. Each finding is reported independently;
    /// every overlapping pair of top-level panels is listed once.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        let panel_ids: HashSet<i64> = self.panels.iter().map(|p| p.id).collect();
        if panel_ids.len() != self.panels.len() {
            errors.push("Duplicate panel IDs found".to_string());
        }

        for (i, first) in self.panels.iter().enumerate() {
            for second in &self.panels[i + 1..] {
                if first.grid_pos.overlaps(&second.grid_pos) {
                    errors.push(format!("Panels {} and {} overlap", first.id, second.id));
                }
            }
        }

        let var_names: HashSet<&str> = self.templating.iter().map(|v| v.name.as_str()).collect();
        if var_names.len() != self.templating.len() {
            errors.push("Duplicate variable names found".to_string());
        }

        if self.title.trim().is_empty() {
            errors.push("Dashboard title cannot be empty".to_string());
        }

        if errors.is_empty() {
            debug!("Dashboard '{}' passed validation", self.title);
            Ok(())
        } else {
            warn!(
                "Dashboard '{}' failed validation with {} finding(s)",
                self.title,
                errors.len()
            );
            Err(errors)
        }
    }

    /// Extended validation: the structural findings from [`validate`]
    /// plus advisory warnings about empty or unbound content and an
    /// unusual time range.
    ///
    /// [`validate`]: Dashboard::validate
    pub fn validation_report(&self) -> ValidationReport {
        let errors = self.validate().err().unwrap_or_default();
        let mut warnings = Vec::new();

        if self.panels.is_empty() {
            warnings.push("Dashboard has no panels".to_string());
        }
        if self.templating.is_empty() {
            warnings.push("Dashboard has no template variables".to_string());
        }

        let unbound = self
            .panels
            .iter()
            .filter(|p| p.datasource.is_none() && p.targets.is_empty())
            .count();
        if unbound > 0 {
            warnings.push(format!("{} panels have no datasource or targets", unbound));
        }

        let time_shape =
            regex::Regex::new(r"^(now-\d+[smhdwMy]|now|\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2})")
                .unwrap();
        if !time_shape.is_match(&self.time.from) {
            warnings.push(format!(
                "Unusual time range 'from' value: {}",
                self.time.from
            ));
        }

        ValidationReport { errors, warnings }
    }

    /// Re-place all top-level panels row-major on the 24-unit grid. When a
    /// row fills up, y advances by the height of the panel that closed it,
    /// so a short panel after a tall one can leave slack under the row.
    pub fn auto_layout(&mut self, columns: i64) {
        let columns = columns.max(1);
        let panel_width = 24 / columns;
        let mut current_x = 0;
        let mut current_y = 0;

        for panel in &mut self.panels {
            panel.grid_pos.x = current_x;
            panel.grid_pos.y = current_y;
            panel.grid_pos.w = panel_width;

            current_x += panel_width;
            if current_x >= 24 {
                current_x = 0;
                current_y += panel.grid_pos.h;
            }
        }
        debug!(
            "Arranged {} panels into {} columns",
            self.panels.len(),
            columns
        );
    }

    /// Deep copy through the canonical encoding, so the copy observes the
    /// same normalization a freshly decoded tree would.
    pub fn duplicate(&self) -> Dashboard {
        Dashboard::from_value(&self.to_value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn panel_at(id: i64, x: i64, y: i64, w: i64, h: i64) -> Panel {
        Panel {
            grid_pos: GridPos::new(h, w, x, y),
            ..Panel::new(id, format!("Panel {}", id), PanelKind::Timeseries)
        }
    }

    fn sample_dashboard() -> Dashboard {
        let mut dashboard = Dashboard::new("Service Health");
        dashboard.panels.push(panel_at(1, 0, 0, 12, 8));
        dashboard.panels.push(panel_at(3, 12, 0, 12, 8));
        dashboard
    }

    #[test]
    fn empty_tree_decodes_with_defaults() {
        let dashboard = Dashboard::from_value(&json!({}));
        assert_eq!(dashboard.title, "Untitled Dashboard");
        assert_eq!(dashboard.refresh, "5s");
        assert_eq!(dashboard.schema_version, 39);
        assert_eq!(dashboard.timezone, "browser");
        assert!(dashboard.editable);
        assert!(dashboard.panels.is_empty());
        // the built-in annotation layer is synthesized on decode
        assert_eq!(dashboard.annotations.len(), 1);
        assert_eq!(dashboard.annotations[0].name, "Annotations & Alerts");
        assert!(dashboard.validate().is_ok());
    }

    #[test]
    fn adjacent_panels_do_not_overlap() {
        let left = GridPos::new(8, 12, 0, 0);
        let right = GridPos::new(8, 12, 12, 0);
        assert!(!left.overlaps(&right));
        assert!(!right.overlaps(&left));
    }

    #[test]
    fn intersecting_panels_overlap() {
        let left = GridPos::new(8, 12, 0, 0);
        let shifted = GridPos::new(8, 12, 6, 0);
        assert!(left.overlaps(&shifted));
        assert!(shifted.overlaps(&left));
    }

    #[test]
    fn add_panel_assigns_next_free_id() {
        let mut dashboard = sample_dashboard();
        let mut panel = Panel::default();
        panel.grid_pos = GridPos::new(8, 12, 0, 8);
        dashboard.add_panel(panel);
        assert_eq!(dashboard.panels.last().unwrap().id, 4);
    }

    #[test]
    fn add_panel_moves_origin_panel_below_existing() {
        let mut dashboard = sample_dashboard();
        dashboard.add_panel(panel_at(10, 0, 0, 12, 8));
        let added = dashboard.get_panel_by_id(10).unwrap();
        assert_eq!(added.grid_pos.y, 8);
        assert_eq!(added.grid_pos.x, 0);
    }

    #[test]
    fn add_panel_keeps_explicit_position() {
        let mut dashboard = sample_dashboard();
        dashboard.add_panel(panel_at(10, 6, 2, 12, 8));
        let added = dashboard.get_panel_by_id(10).unwrap();
        assert_eq!((added.grid_pos.x, added.grid_pos.y), (6, 2));
    }

    #[test]
    fn remove_panel_by_id() {
        let mut dashboard = sample_dashboard();
        assert!(dashboard.remove_panel(1));
        assert!(dashboard.get_panel_by_id(1).is_none());
        assert!(!dashboard.remove_panel(99));
        assert_eq!(dashboard.panels.len(), 1);
    }

    #[test]
    fn auto_layout_two_columns() {
        let mut dashboard = Dashboard::new("Layout");
        dashboard.panels.push(panel_at(1, 5, 5, 10, 8));
        dashboard.panels.push(panel_at(2, 7, 9, 10, 8));
        dashboard.panels.push(panel_at(3, 2, 2, 10, 8));
        dashboard.auto_layout(2);

        let positions: Vec<(i64, i64, i64)> = dashboard
            .panels
            .iter()
            .map(|p| (p.grid_pos.x, p.grid_pos.y, p.grid_pos.w))
            .collect();
        assert_eq!(positions, vec![(0, 0, 12), (12, 0, 12), (0, 8, 12)]);
    }

    #[test]
    fn auto_layout_clamps_zero_columns() {
        let mut dashboard = sample_dashboard();
        dashboard.auto_layout(0);
        assert!(dashboard.panels.iter().all(|p| p.grid_pos.w == 24));
    }

    // The wrap advances y by the height of the panel that closed the row,
    // not the row's tallest panel. A short closer after a tall panel puts
    // the next row inside the tall panel's rectangle.
    #[test]
    fn auto_layout_wrap_uses_closing_panel_height() {
        let mut dashboard = Dashboard::new("Mixed heights");
        dashboard.panels.push(panel_at(1, 0, 0, 12, 12));
        dashboard.panels.push(panel_at(2, 12, 0, 12, 4));
        dashboard.panels.push(panel_at(3, 0, 20, 12, 8));
        dashboard.auto_layout(2);

        let positions: Vec<(i64, i64)> = dashboard
            .panels
            .iter()
            .map(|p| (p.grid_pos.x, p.grid_pos.y))
            .collect();
        assert_eq!(positions, vec![(0, 0), (12, 0), (0, 4)]);
        let errors = dashboard.validate().unwrap_err();
        assert!(errors.contains(&"Panels 1 and 3 overlap".to_string()));
    }

    #[test]
    fn validate_reports_duplicates_and_overlaps() {
        let mut dashboard = Dashboard::new("  ");
        dashboard.panels.push(panel_at(1, 0, 0, 12, 8));
        dashboard.panels.push(panel_at(1, 6, 0, 12, 8));
        dashboard
            .templating
            .push(TemplateVariable::new("env", VariableKind::Query));
        dashboard
            .templating
            .push(TemplateVariable::new("env", VariableKind::Custom));

        let errors = dashboard.validate().unwrap_err();
        assert_eq!(
            errors,
            vec![
                "Duplicate panel IDs found".to_string(),
                "Panels 1 and 1 overlap".to_string(),
                "Duplicate variable names found".to_string(),
                "Dashboard title cannot be empty".to_string(),
            ]
        );
    }

    #[test]
    fn validation_report_collects_warnings() {
        let mut dashboard = Dashboard::new("Sparse");
        dashboard.panels.push(panel_at(1, 0, 0, 12, 8));
        dashboard.time.from = "yesterday".to_string();

        let report = dashboard.validation_report();
        assert!(report.is_valid());
        assert!(report
            .warnings
            .contains(&"Dashboard has no template variables".to_string()));
        assert!(report
            .warnings
            .contains(&"1 panels have no datasource or targets".to_string()));
        assert!(report
            .warnings
            .contains(&"Unusual time range 'from' value: yesterday".to_string()));
    }

    #[test]
    fn validation_report_accepts_relative_and_absolute_time() {
        let mut dashboard = sample_dashboard();
        for from in ["now-6h", "now", "2024-03-01T00:00:00"] {
            dashboard.time.from = from.to_string();
            let report = dashboard.validation_report();
            assert!(
                !report.warnings.iter().any(|w| w.contains("time range")),
                "unexpected time warning for {}",
                from
            );
        }
    }

    #[test]
    fn legacy_string_datasource_decodes_as_uid() {
        let target = QueryTarget::from_value(&json!({"datasource": "prometheus-main"}));
        let ds = target.datasource.unwrap();
        assert_eq!(ds.uid, "prometheus-main");
        assert_eq!(ds.kind, "");
    }

    #[test]
    fn query_target_emission_rules() {
        let mut target = QueryTarget::with_expr("rate(http_requests_total[5m])");
        target.step = Some(0);
        let value = target.to_value();
        let map = value.as_object().unwrap();
        assert_eq!(map["expr"], json!("rate(http_requests_total[5m])"));
        assert!(!map.contains_key("step"));
        assert!(!map.contains_key("rawSql"));
        assert!(!map.contains_key("instant"));

        let sql = QueryTarget::with_raw_sql("SELECT 1").to_value();
        let map = sql.as_object().unwrap();
        assert_eq!(map["rawSql"], json!("SELECT 1"));
        assert_eq!(map["editorMode"], json!("code"));
        assert_eq!(map["rawQuery"], json!(true));
    }

    #[test]
    fn row_panels_keep_children_in_encoding() {
        let tree = json!({
            "id": 100, "title": "Databases", "type": "row", "collapsed": true,
            "panels": [{"id": 101, "title": "QPS", "type": "timeseries"}]
        });
        let row = Panel::from_value(&tree);
        assert!(row.kind.is_row());
        let children = row.panels.as_ref().unwrap();
        assert_eq!(children.len(), 1);

        let encoded = row.to_value();
        let map = encoded.as_object().unwrap();
        assert_eq!(map["collapsed"], json!(true));
        assert_eq!(map["panels"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn non_row_panel_drops_children_on_encoding() {
        let tree = json!({
            "id": 1, "title": "Leak", "type": "timeseries",
            "panels": [{"id": 2, "title": "Hidden"}]
        });
        let panel = Panel::from_value(&tree);
        assert!(panel.panels.is_some());
        let encoded = panel.to_value();
        assert!(!encoded.as_object().unwrap().contains_key("panels"));
        assert!(!encoded.as_object().unwrap().contains_key("collapsed"));
    }

    #[test]
    fn unknown_panel_kind_round_trips_verbatim() {
        let kind = PanelKind::parse("vendor-flamegraph");
        assert_eq!(kind, PanelKind::Other("vendor-flamegraph".to_string()));
        assert_eq!(kind.as_str(), "vendor-flamegraph");
    }

    #[test]
    fn encoding_wraps_lists_and_omits_unset_identity() {
        let dashboard = sample_dashboard();
        let value = dashboard.to_value();
        let map = value.as_object().unwrap();
        assert!(map["templating"].as_object().unwrap().contains_key("list"));
        assert!(map["annotations"].as_object().unwrap().contains_key("list"));
        assert!(!map.contains_key("uid"));
        assert!(!map.contains_key("id"));
        assert!(!map.contains_key("weekStart"));
    }

    #[test]
    fn modeled_fields_survive_round_trip() {
        let tree = json!({
            "title": "API",
            "uid": "api-01",
            "tags": ["prod", "api"],
            "panels": [
                {"id": 2, "title": "Latency", "type": "stat",
                 "gridPos": {"h": 4, "w": 6, "x": 0, "y": 0},
                 "targets": [{"refId": "A", "expr": "up", "legendFormat": "{{job}}"}],
                 "datasource": {"type": "prometheus", "uid": "prom"}}
            ],
            "time": {"from": "now-12h", "to": "now"},
            "refresh": "30s",
            "weekStart": "monday"
        });
        let dashboard = Dashboard::from_value(&tree);
        let out = dashboard.to_value();
        let map = out.as_object().unwrap();

        assert_eq!(map["title"], json!("API"));
        assert_eq!(map["uid"], json!("api-01"));
        assert_eq!(map["tags"], json!(["prod", "api"]));
        assert_eq!(map["refresh"], json!("30s"));
        assert_eq!(map["weekStart"], json!("monday"));
        assert_eq!(map["time"], json!({"from": "now-12h", "to": "now"}));

        let panel = &map["panels"].as_array().unwrap()[0];
        assert_eq!(panel["id"], json!(2));
        assert_eq!(panel["type"], json!("stat"));
        assert_eq!(panel["gridPos"], json!({"h": 4, "w": 6, "x": 0, "y": 0}));
        let target = &panel["targets"].as_array().unwrap()[0];
        assert_eq!(target["expr"], json!("up"));
        assert_eq!(target["legendFormat"], json!("{{job}}"));
    }

    #[test]
    fn duplicate_observes_decode_normalization() {
        let dashboard = Dashboard::new("Copy me");
        assert!(dashboard.annotations.is_empty());
        let copy = dashboard.duplicate();
        assert_eq!(copy.title, "Copy me");
        assert_eq!(copy.annotations.len(), 1);
    }

    #[test]
    fn variable_display_lists_flags() {
        let mut variable = TemplateVariable::new("instance", VariableKind::Query);
        variable.query = "label_values(instance)".to_string();
        variable.multi = true;
        variable.hide = 2;
        let rendered = variable.to_string();
        assert!(rendered.starts_with("Variable: ${instance}"));
        assert!(rendered.contains("  Query: label_values(instance)"));
        assert!(rendered.contains("  Flags: multi-select, hidden"));
    }

    #[test]
    fn numeric_fields_accept_floats() {
        let pos = GridPos::from_value(&json!({"h": 8.0, "w": 12.7, "x": 0, "y": 3.2}));
        assert_eq!(pos.h, 8);
        assert_eq!(pos.w, 12);
        assert_eq!(pos.y, 3);
    }
}
