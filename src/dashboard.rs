//! CloudWatch dashboard model
//!
//! A dashboard is an ordered list of widgets laid out on CloudWatch's
//! 24-column grid. Widgets added together form a row; rows stack vertically
//! in the order they were added, so the body reflects call order exactly.

use crate::cfn::{CfnString, Token, TokenMap};
use crate::metrics::Metric;
use log::debug;
use serde_json::{json, Map, Value};

/// Width of the CloudWatch dashboard grid
pub const GRID_WIDTH: u32 = 24;

/// Default widget height for graphs
pub const DEFAULT_GRAPH_HEIGHT: u32 = 6;

/// Default widget height for text blocks
pub const DEFAULT_TEXT_HEIGHT: u32 = 2;

/// Horizontal line drawn across a graph
#[derive(Debug, Clone, PartialEq)]
pub struct HorizontalAnnotation {
    pub value: f64,
    pub label: Option<String>,
    pub color: Option<String>,
}

impl HorizontalAnnotation {
    pub fn new(value: f64, label: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            value,
            label: Some(label.into()),
            color: Some(color.into()),
        }
    }

    fn render(&self) -> Value {
        let mut out = Map::new();
        out.insert("value".to_string(), json!(self.value));
        if let Some(label) = &self.label {
            out.insert("label".to_string(), json!(label));
        }
        if let Some(color) = &self.color {
            out.insert("color".to_string(), json!(color));
        }
        Value::Object(out)
    }
}

/// Markdown block, used for section headers
#[derive(Debug, Clone, PartialEq)]
pub struct TextWidget {
    pub markdown: CfnString,
    pub width: u32,
    pub height: u32,
}

impl TextWidget {
    pub fn new(markdown: impl Into<CfnString>) -> Self {
        Self {
            markdown: markdown.into(),
            width: GRID_WIDTH,
            height: DEFAULT_TEXT_HEIGHT,
        }
    }
}

/// Time series graph of one or more metrics
#[derive(Debug, Clone, PartialEq)]
pub struct GraphWidget {
    pub title: String,
    pub left: Vec<Metric>,
    pub left_annotations: Vec<HorizontalAnnotation>,
    pub left_y_axis_min: Option<f64>,
    pub stacked: bool,
    pub width: u32,
    pub height: u32,
}

impl GraphWidget {
    pub fn new(title: impl Into<String>, width: u32) -> Self {
        Self {
            title: title.into(),
            left: Vec::new(),
            left_annotations: Vec::new(),
            left_y_axis_min: None,
            stacked: false,
            width,
            height: DEFAULT_GRAPH_HEIGHT,
        }
    }

    pub fn metric(mut self, metric: Metric) -> Self {
        self.left.push(metric);
        self
    }

    pub fn annotation(mut self, annotation: HorizontalAnnotation) -> Self {
        self.left_annotations.push(annotation);
        self
    }

    pub fn stacked(mut self, stacked: bool) -> Self {
        self.stacked = stacked;
        self
    }

    pub fn y_axis_min(mut self, min: f64) -> Self {
        self.left_y_axis_min = Some(min);
        self
    }
}

/// Latest value of one or more metrics, displayed as numbers
#[derive(Debug, Clone, PartialEq)]
pub struct SingleValueWidget {
    pub title: String,
    pub metrics: Vec<Metric>,
    pub width: u32,
    pub height: u32,
}

impl SingleValueWidget {
    pub fn new(title: impl Into<String>, metrics: Vec<Metric>, width: u32) -> Self {
        Self {
            title: title.into(),
            metrics,
            width,
            height: DEFAULT_TEXT_HEIGHT + 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Widget {
    Text(TextWidget),
    Graph(GraphWidget),
    SingleValue(SingleValueWidget),
}

impl Widget {
    pub fn width(&self) -> u32 {
        match self {
            Widget::Text(w) => w.width,
            Widget::Graph(w) => w.width,
            Widget::SingleValue(w) => w.width,
        }
    }

    pub fn height(&self) -> u32 {
        match self {
            Widget::Text(w) => w.height,
            Widget::Graph(w) => w.height,
            Widget::SingleValue(w) => w.height,
        }
    }

    /// Title of a metric widget; text widgets have none
    pub fn title(&self) -> Option<&str> {
        match self {
            Widget::Text(_) => None,
            Widget::Graph(w) => Some(&w.title),
            Widget::SingleValue(w) => Some(&w.title),
        }
    }

    /// Metrics charted by this widget
    pub fn metrics(&self) -> &[Metric] {
        match self {
            Widget::Text(_) => &[],
            Widget::Graph(w) => &w.left,
            Widget::SingleValue(w) => &w.metrics,
        }
    }

    fn render(&self, x: u32, y: u32, tokens: &mut TokenMap) -> Value {
        let (kind, properties) = match self {
            Widget::Text(w) => ("text", json!({ "markdown": tokens.encode(&w.markdown) })),
            Widget::Graph(w) => {
                let mut props = Map::new();
                props.insert("view".to_string(), json!("timeSeries"));
                props.insert("title".to_string(), json!(w.title));
                props.insert("region".to_string(), region(tokens));
                props.insert("metrics".to_string(), render_metrics(&w.left, tokens));
                if !w.left_annotations.is_empty() {
                    let horizontal: Vec<Value> =
                        w.left_annotations.iter().map(|a| a.render()).collect();
                    props.insert("annotations".to_string(), json!({ "horizontal": horizontal }));
                }
                if let Some(min) = w.left_y_axis_min {
                    props.insert("yAxis".to_string(), json!({ "left": { "min": min } }));
                }
                props.insert("stacked".to_string(), json!(w.stacked));
                ("metric", Value::Object(props))
            }
            Widget::SingleValue(w) => (
                "metric",
                json!({
                    "view": "singleValue",
                    "title": w.title,
                    "region": region(tokens),
                    "metrics": render_metrics(&w.metrics, tokens),
                }),
            ),
        };

        json!({
            "type": kind,
            "width": self.width().min(GRID_WIDTH),
            "height": self.height(),
            "x": x,
            "y": y,
            "properties": properties,
        })
    }
}

fn region(tokens: &mut TokenMap) -> Value {
    Value::String(tokens.encode(&CfnString::token(Token::Region)))
}

fn render_metrics(metrics: &[Metric], tokens: &mut TokenMap) -> Value {
    let rows: Vec<Value> = metrics
        .iter()
        .map(|metric| {
            let mut row = vec![json!(metric.namespace), json!(metric.metric_name)];
            for dimension in &metric.dimensions {
                row.push(json!(dimension.name));
                row.push(Value::String(tokens.encode(&dimension.value)));
            }
            row.push(json!({
                "label": metric.display_label(),
                "period": metric.period.num_seconds(),
                "stat": metric.statistic.to_string(),
            }));
            Value::Array(row)
        })
        .collect();
    Value::Array(rows)
}

#[derive(Debug, Clone, PartialEq)]
struct PlacedWidget {
    x: u32,
    y: u32,
    widget: Widget,
}

/// An `AWS::CloudWatch::Dashboard` under construction
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Dashboard {
    name: Option<String>,
    widgets: Vec<PlacedWidget>,
    height: u32,
}

impl Dashboard {
    /// Create an empty dashboard; without a name CloudFormation generates one
    pub fn new(name: Option<String>) -> Self {
        Self {
            name,
            widgets: Vec::new(),
            height: 0,
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Add a row of widgets below everything added so far
    ///
    /// Widgets are placed left to right and wrap onto a new line when the
    /// grid width would be exceeded.
    pub fn add_widgets(&mut self, widgets: Vec<Widget>) {
        let mut x = 0;
        let mut y = self.height;
        let mut line_height = 0;

        for widget in widgets {
            let width = widget.width().min(GRID_WIDTH);
            if x + width > GRID_WIDTH {
                y += line_height;
                x = 0;
                line_height = 0;
            }
            debug!(
                "Placing {} widget at ({}, {})",
                widget.title().unwrap_or("text"),
                x,
                y
            );
            line_height = line_height.max(widget.height());
            self.widgets.push(PlacedWidget { x, y, widget });
            x += width;
        }

        self.height = y + line_height;
    }

    /// Widgets in the order they were added
    pub fn widgets(&self) -> impl Iterator<Item = &Widget> {
        self.widgets.iter().map(|placed| &placed.widget)
    }

    /// Grid position of each widget, in insertion order
    pub fn positions(&self) -> Vec<(u32, u32)> {
        self.widgets.iter().map(|p| (p.x, p.y)).collect()
    }

    pub fn widget_count(&self) -> usize {
        self.widgets.len()
    }

    /// Render the dashboard body, a JSON document that may embed tokens
    pub fn render_body(&self) -> Result<CfnString, serde_json::Error> {
        let mut tokens = TokenMap::new();
        let widgets: Vec<Value> = self
            .widgets
            .iter()
            .map(|placed| placed.widget.render(placed.x, placed.y, &mut tokens))
            .collect();
        let text = serde_json::to_string(&json!({ "widgets": widgets }))?;
        Ok(tokens.resolve(&text))
    }

    /// Properties of the `AWS::CloudWatch::Dashboard` resource
    pub fn properties(&self) -> Result<Value, serde_json::Error> {
        let mut props = Map::new();
        props.insert("DashboardBody".to_string(), self.render_body()?.to_cfn());
        if let Some(name) = &self.name {
            props.insert("DashboardName".to_string(), json!(name));
        }
        Ok(Value::Object(props))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::Statistic;

    fn graph(title: &str, width: u32) -> Widget {
        Widget::Graph(GraphWidget::new(title, width))
    }

    #[test]
    fn test_empty_dashboard_body() {
        let dashboard = Dashboard::new(None);
        let body = dashboard.render_body().unwrap();
        assert_eq!(body.as_literal(), Some("{\"widgets\":[]}"));

        let props = dashboard.properties().unwrap();
        assert!(props.get("DashboardName").is_none());
    }

    #[test]
    fn test_dashboard_name_property() {
        let dashboard = Dashboard::new(Some("Ops".to_string()));
        let props = dashboard.properties().unwrap();
        assert_eq!(props["DashboardName"], "Ops");
    }

    #[test]
    fn test_row_layout() {
        let mut dashboard = Dashboard::new(None);
        dashboard.add_widgets(vec![Widget::Text(TextWidget::new("# Title"))]);
        dashboard.add_widgets(vec![graph("a", 12), graph("b", 12)]);
        dashboard.add_widgets(vec![graph("c", 6)]);

        assert_eq!(dashboard.positions(), vec![(0, 0), (0, 2), (12, 2), (0, 8)]);
    }

    #[test]
    fn test_row_wraps_when_too_wide() {
        let mut dashboard = Dashboard::new(None);
        dashboard.add_widgets(vec![graph("a", 12), graph("b", 12), graph("c", 12)]);

        assert_eq!(dashboard.positions(), vec![(0, 0), (12, 0), (0, 6)]);
    }

    #[test]
    fn test_oversized_widget_is_clamped_to_grid() {
        let mut dashboard = Dashboard::new(None);
        dashboard.add_widgets(vec![graph("wide", 40), graph("next", 6)]);

        assert_eq!(dashboard.positions(), vec![(0, 0), (0, 6)]);
    }

    #[test]
    fn test_widget_order_is_insertion_order() {
        let mut dashboard = Dashboard::new(None);
        dashboard.add_widgets(vec![graph("first", 6)]);
        dashboard.add_widgets(vec![graph("second", 6)]);

        let titles: Vec<_> = dashboard.widgets().filter_map(|w| w.title()).collect();
        assert_eq!(titles, vec!["first", "second"]);
    }

    #[test]
    fn test_body_embeds_tokens_with_join() {
        let metric = Metric::new("AWS/DynamoDB", "ConsumedReadCapacityUnits")
            .with_dimension("TableName", Token::reference("Table"))
            .with_statistic(Statistic::Sum)
            .with_label("Consumed");

        let mut dashboard = Dashboard::new(None);
        dashboard.add_widgets(vec![Widget::Graph(
            GraphWidget::new("Read", 12).metric(metric).y_axis_min(0.0),
        )]);

        let body = dashboard.render_body().unwrap().to_cfn();
        let parts = body["Fn::Join"][1].as_array().unwrap();
        assert!(parts.contains(&json!({ "Ref": "Table" })));
        assert!(parts.contains(&json!({ "Ref": "AWS::Region" })));

        let text: String = parts.iter().filter_map(|p| p.as_str()).collect();
        assert!(text.contains("\"ConsumedReadCapacityUnits\""));
        assert!(text.contains("\"stat\":\"Sum\""));
        assert!(text.contains("\"view\":\"timeSeries\""));
    }

    #[test]
    fn test_graph_rendering_details() {
        let metric = Metric::new("AWS/Lambda", "Errors")
            .with_dimension("FunctionName", "my-fn")
            .with_statistic(Statistic::Sum);

        let mut tokens = TokenMap::new();
        let widget = Widget::Graph(
            GraphWidget::new("Errors/5min", 6)
                .metric(metric)
                .annotation(HorizontalAnnotation::new(1.0, "alarm", "#ff0000"))
                .stacked(true),
        );
        let rendered = widget.render(6, 2, &mut tokens);

        assert_eq!(rendered["type"], "metric");
        assert_eq!(rendered["x"], 6);
        assert_eq!(rendered["y"], 2);
        assert_eq!(rendered["width"], 6);
        assert_eq!(rendered["properties"]["stacked"], true);
        assert_eq!(
            rendered["properties"]["metrics"],
            json!([[
                "AWS/Lambda",
                "Errors",
                "FunctionName",
                "my-fn",
                { "label": "Errors", "period": 300, "stat": "Sum" }
            ]])
        );
        assert_eq!(
            rendered["properties"]["annotations"]["horizontal"][0]["label"],
            "alarm"
        );
    }

    #[test]
    fn test_single_value_rendering() {
        let mut tokens = TokenMap::new();
        let widget = Widget::SingleValue(SingleValueWidget::new(
            "Invocations",
            vec![Metric::new("AWS/Lambda", "Invocations")],
            6,
        ));
        let rendered = widget.render(0, 0, &mut tokens);
        assert_eq!(rendered["properties"]["view"], "singleValue");
        assert_eq!(widget.metrics().len(), 1);
    }
}
