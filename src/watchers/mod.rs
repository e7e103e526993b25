//! Per-resource-type monitoring plans
//!
//! Each supported resource type owns a static table of the metrics worth
//! charting and alarming on. Turning "watch this resource" into alarms and
//! widgets is a lookup in that table, parameterised by the caller's options;
//! there is no metric discovery. Plans are pure values so they can be tested
//! without a stack, and are applied to the stack by [`crate::watchful::Watchful`].

/// DynamoDB table plan
pub mod dynamodb;

/// Lambda function plan
pub mod lambda;

/// API Gateway REST API plan
pub mod apigateway;

pub use apigateway::{WatchApiGatewayOptions, WatchedOperation};
pub use dynamodb::WatchDynamoTableOptions;
pub use lambda::WatchLambdaFunctionOptions;

use crate::cfn::CfnString;
use crate::dashboard::Widget;
use crate::error::ConfigError;
use crate::metrics::{Alarm, Metric, Statistic};
use crate::sources::{metric_for, MetricSource};
use chrono::Duration;

/// One row of a resource type's metric table
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricSpec {
    pub metric_name: &'static str,
    pub label: &'static str,
    pub statistic: Statistic,
    pub period_minutes: i64,
}

impl MetricSpec {
    pub fn period(&self) -> Duration {
        Duration::minutes(self.period_minutes)
    }

    /// The metric this row describes, for a concrete resource
    pub fn metric(&self, source: &dyn MetricSource) -> Metric {
        metric_for(source, self.metric_name, self.statistic, self.period()).with_label(self.label)
    }
}

/// Button rendered in a section header
#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    pub title: String,
    pub url: CfnString,
}

impl Link {
    pub fn new(title: impl Into<String>, url: CfnString) -> Self {
        Self {
            title: title.into(),
            url,
        }
    }
}

/// An alarm to create, keyed by its construct id relative to the watched resource
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedAlarm {
    pub id: String,
    pub alarm: Alarm,
}

/// Everything watching one resource contributes
#[derive(Debug, Clone, PartialEq)]
pub struct WatchPlan {
    pub title: String,
    pub links: Vec<Link>,
    pub alarms: Vec<PlannedAlarm>,
    /// Dashboard rows, added below the section header in order
    pub rows: Vec<Vec<Widget>>,
}

impl WatchPlan {
    pub fn widgets(&self) -> impl Iterator<Item = &Widget> {
        self.rows.iter().flatten()
    }

    pub fn alarm(&self, id: &str) -> Option<&Alarm> {
        self.alarms.iter().find(|a| a.id == id).map(|a| &a.alarm)
    }
}

/// Markdown for a section header: the title plus a line of link buttons
pub fn section_markdown(title: &str, links: &[Link]) -> CfnString {
    let mut markdown = CfnString::literal(format!("# {}", title));
    for (i, link) in links.iter().enumerate() {
        markdown.push_str(if i == 0 { "\n" } else { " | " });
        markdown.push_str(&format!("[button:{}](", link.title));
        markdown.append(&link.url);
        markdown.push_str(")");
    }
    markdown
}

fn positive(option: &str, value: f64) -> Result<f64, ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(ConfigError::ValidationError(format!(
            "{} must be a positive number, got {}",
            option, value
        )))
    }
}
