use crate::dashboard::{GraphWidget, Widget, GRID_WIDTH};
use crate::error::ConfigError;
use crate::metrics::{AlarmProps, ComparisonOperator, Metric, Statistic};
use crate::sources::{metric_for, RestApi};
use crate::watchers::{Link, MetricSpec, PlannedAlarm, WatchPlan};
use chrono::Duration;
use log::debug;
use serde::Deserialize;

/// Server errors per alarm period that raise the 5XX alarm; 0 disables it
pub const DEFAULT_SERVER_ERROR_THRESHOLD: u32 = 1;

const ALARM_PERIOD_MINUTES: i64 = 5;

const HTTP_METHODS: [&str; 8] = [
    "ANY", "DELETE", "GET", "HEAD", "OPTIONS", "PATCH", "POST", "PUT",
];

pub const CALLS: MetricSpec = MetricSpec {
    metric_name: "Count",
    label: "Calls",
    statistic: Statistic::Sum,
    period_minutes: 1,
};

pub const CLIENT_ERRORS: MetricSpec = MetricSpec {
    metric_name: "4XXError",
    label: "HTTP 4XX",
    statistic: Statistic::Sum,
    period_minutes: 1,
};

pub const SERVER_ERRORS: MetricSpec = MetricSpec {
    metric_name: "5XXError",
    label: "HTTP 5XX",
    statistic: Statistic::Sum,
    period_minutes: 1,
};

pub const CACHE_HITS: MetricSpec = MetricSpec {
    metric_name: "CacheHitCount",
    label: "Cache hits",
    statistic: Statistic::Sum,
    period_minutes: 1,
};

pub const CACHE_MISSES: MetricSpec = MetricSpec {
    metric_name: "CacheMissCount",
    label: "Cache misses",
    statistic: Statistic::Sum,
    period_minutes: 1,
};

pub const LATENCY_METRICS: [&str; 2] = ["Latency", "IntegrationLatency"];

pub const LATENCY_STATISTICS: [Statistic; 5] = [
    Statistic::Minimum,
    Statistic::Average,
    Statistic::Percentile(90.0),
    Statistic::Percentile(99.0),
    Statistic::Maximum,
];

/// A single method of a resource, monitored on its own row
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WatchedOperation {
    pub http_method: String,
    pub resource_path: String,
}

impl WatchedOperation {
    pub fn new(http_method: impl Into<String>, resource_path: impl Into<String>) -> Self {
        Self {
            http_method: http_method.into(),
            resource_path: resource_path.into(),
        }
    }

    /// Method in the upper case CloudWatch reports it with
    pub fn method(&self) -> String {
        self.http_method.to_ascii_uppercase()
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let method = self.method();
        if !HTTP_METHODS.contains(&method.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "unsupported HTTP method '{}'",
                self.http_method
            )));
        }
        if !self.resource_path.starts_with('/') {
            return Err(ConfigError::ValidationError(format!(
                "resource path '{}' must start with '/'",
                self.resource_path
            )));
        }
        Ok(())
    }

    fn restrict(&self, metric: Metric) -> Metric {
        metric
            .with_dimension("Method", self.method())
            .with_dimension("Resource", self.resource_path.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct WatchApiGatewayOptions {
    /// 5XX errors per five minutes that raise an alarm (default 1, 0 disables)
    pub server_error_threshold: Option<u32>,
    /// Operations that get their own alarm and dashboard row
    pub watched_operations: Vec<WatchedOperation>,
    /// Add a graph of cache hits and misses to each row
    pub cache_graph: bool,
    /// Replaces the context's alarm actions for this API
    pub alarm_action_arns: Option<Vec<String>>,
}

/// Plan the alarms and widgets for a REST API
///
/// The API as a whole gets one row; each watched operation gets another,
/// with the operation's `Method` and `Resource` dimensions on every metric.
pub fn plan(
    title: &str,
    api: &RestApi,
    options: &WatchApiGatewayOptions,
) -> Result<WatchPlan, ConfigError> {
    for operation in &options.watched_operations {
        operation.validate()?;
    }
    let threshold = options
        .server_error_threshold
        .unwrap_or(DEFAULT_SERVER_ERROR_THRESHOLD);

    let mut alarms = Vec::new();
    let mut rows = Vec::new();

    let scopes = std::iter::once(None).chain(options.watched_operations.iter().map(Some));
    for operation in scopes {
        let restrict = |metric: Metric| match operation {
            Some(operation) => operation.restrict(metric),
            None => metric,
        };
        let (prefix, alarm_id) = match operation {
            Some(operation) => {
                let method = operation.method();
                (
                    format!("{} {}", method, operation.resource_path),
                    format!("{}{}5XXErrorAlarm", method, operation.resource_path),
                )
            }
            None => ("Overall".to_string(), "5XXErrorAlarm".to_string()),
        };

        let mut calls = GraphWidget::new(format!("{} Calls/min", prefix), 0)
            .metric(restrict(CALLS.metric(api)))
            .metric(restrict(CLIENT_ERRORS.metric(api)))
            .metric(restrict(SERVER_ERRORS.metric(api)));

        if threshold > 0 {
            let alarm = restrict(SERVER_ERRORS.metric(api))
                .with_period(Duration::minutes(ALARM_PERIOD_MINUTES))
                .create_alarm(
                    AlarmProps::new(
                        f64::from(threshold),
                        ComparisonOperator::GreaterThanOrEqualToThreshold,
                    )
                    .description(format!(
                        "at least {} 5XX errors in {} minutes",
                        threshold, ALARM_PERIOD_MINUTES
                    )),
                )?;
            let mut annotation = alarm.to_annotation();
            annotation.label = Some("5XX Errors Alarm".to_string());
            calls = calls.annotation(annotation);
            alarms.push(PlannedAlarm { id: alarm_id, alarm });
        } else {
            debug!("5XX alarm disabled for {} ({})", title, prefix);
        }

        let mut row = vec![calls];
        if options.cache_graph {
            row.push(
                GraphWidget::new(format!("{} Cache/min", prefix), 0)
                    .metric(restrict(CALLS.metric(api)))
                    .metric(restrict(CACHE_HITS.metric(api)))
                    .metric(restrict(CACHE_MISSES.metric(api))),
            );
        }
        for metric_name in LATENCY_METRICS {
            let mut graph =
                GraphWidget::new(format!("{} {} (1-minute periods)", prefix, metric_name), 0);
            for statistic in LATENCY_STATISTICS {
                let metric = metric_for(api, metric_name, statistic, Duration::minutes(1))
                    .with_label(statistic.to_string());
                graph = graph.metric(restrict(metric));
            }
            row.push(graph);
        }

        let width = GRID_WIDTH / row.len() as u32;
        rows.push(
            row.into_iter()
                .map(|mut graph| {
                    graph.width = width;
                    Widget::Graph(graph)
                })
                .collect(),
        );
    }

    Ok(WatchPlan {
        title: title.to_string(),
        links: vec![Link::new("Amazon API Gateway Console", api.console_url())],
        alarms,
        rows,
    })
}
