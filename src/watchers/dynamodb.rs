use crate::dashboard::{GraphWidget, HorizontalAnnotation, Widget};
use crate::error::ConfigError;
use crate::metrics::{AlarmProps, ComparisonOperator, Statistic};
use crate::sources::Table;
use crate::watchers::{positive, Link, MetricSpec, PlannedAlarm, WatchPlan};
use chrono::Duration;
use log::warn;
use serde::Deserialize;

/// Share of provisioned capacity that raises a capacity alarm
pub const DEFAULT_CAPACITY_THRESHOLD_PERCENT: f64 = 80.0;

/// Throttled requests per alarm period that raise the throttling alarm
pub const DEFAULT_THROTTLED_REQUESTS_THRESHOLD: f64 = 1.0;

const ALARM_PERIOD_MINUTES: i64 = 5;
const PROVISIONED_COLOR: &str = "#58D68D";
const ALARM_ON_COLOR: &str = "#FF3333";

pub const READ_CAPACITY: MetricSpec = MetricSpec {
    metric_name: "ConsumedReadCapacityUnits",
    label: "Consumed",
    statistic: Statistic::Sum,
    period_minutes: 1,
};

pub const WRITE_CAPACITY: MetricSpec = MetricSpec {
    metric_name: "ConsumedWriteCapacityUnits",
    label: "Consumed",
    statistic: Statistic::Sum,
    period_minutes: 1,
};

pub const THROTTLED_REQUESTS: MetricSpec = MetricSpec {
    metric_name: "ThrottledRequests",
    label: "Throttled requests",
    statistic: Statistic::Sum,
    period_minutes: ALARM_PERIOD_MINUTES,
};

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct WatchDynamoTableOptions {
    /// Percent of provisioned read capacity that raises an alarm (default 80)
    pub read_capacity_threshold_percent: Option<f64>,
    /// Percent of provisioned write capacity that raises an alarm (default 80)
    pub write_capacity_threshold_percent: Option<f64>,
    /// Throttled requests per five minutes that raise an alarm (default 1)
    pub throttled_requests_threshold: Option<f64>,
    /// Replaces the context's alarm actions for this table
    pub alarm_action_arns: Option<Vec<String>>,
}

/// Capacity units consumed over `period` at `percent` of `provisioned` units per second
pub fn capacity_units(provisioned: u32, percent: f64, period: Duration) -> f64 {
    f64::from(provisioned) * (percent / 100.0) * period.num_seconds() as f64
}

/// Plan the alarms and widgets for a table
///
/// Capacity alarms need provisioned throughput to compute a threshold, so
/// on-demand tables only get the throttling alarm.
pub fn plan(
    title: &str,
    table: &Table,
    options: &WatchDynamoTableOptions,
) -> Result<WatchPlan, ConfigError> {
    let read_percent = positive(
        "read_capacity_threshold_percent",
        options
            .read_capacity_threshold_percent
            .unwrap_or(DEFAULT_CAPACITY_THRESHOLD_PERCENT),
    )?;
    let write_percent = positive(
        "write_capacity_threshold_percent",
        options
            .write_capacity_threshold_percent
            .unwrap_or(DEFAULT_CAPACITY_THRESHOLD_PERCENT),
    )?;
    let throttle_threshold = positive(
        "throttled_requests_threshold",
        options
            .throttled_requests_threshold
            .unwrap_or(DEFAULT_THROTTLED_REQUESTS_THRESHOLD),
    )?;

    let provisioned = table.provisioned_capacity();
    if provisioned.is_none() {
        warn!(
            "Table '{}' uses on-demand capacity, skipping capacity alarms",
            table.node_id()
        );
    }

    let capacities = [
        ("read", "Read", READ_CAPACITY, read_percent, provisioned.map(|(r, _)| r)),
        ("write", "Write", WRITE_CAPACITY, write_percent, provisioned.map(|(_, w)| w)),
    ];

    let mut alarms = Vec::new();
    let mut capacity_row = Vec::new();

    for (access, heading, spec, percent, units) in capacities {
        let metric = spec.metric(table);
        let mut graph = GraphWidget::new(
            format!("{} Capacity Units/{}min", heading, spec.period_minutes),
            12,
        )
        .metric(metric.clone())
        .stacked(true)
        .y_axis_min(0.0);

        if let Some(units) = units {
            let alarm_metric = metric
                .clone()
                .with_period(Duration::minutes(ALARM_PERIOD_MINUTES));
            let threshold = capacity_units(units, percent, alarm_metric.period);
            let alarm = alarm_metric.create_alarm(
                AlarmProps::new(threshold, ComparisonOperator::GreaterThanOrEqualToThreshold)
                    .description(format!("at {}% of {} capacity", percent, access)),
            )?;
            alarms.push(PlannedAlarm {
                id: format!("CapacityAlarm:{}", access),
                alarm,
            });

            graph = graph
                .annotation(HorizontalAnnotation::new(
                    capacity_units(units, 100.0, metric.period),
                    "Provisioned",
                    PROVISIONED_COLOR,
                ))
                .annotation(HorizontalAnnotation::new(
                    capacity_units(units, percent, metric.period),
                    "Alarm on",
                    ALARM_ON_COLOR,
                ));
        }

        capacity_row.push(Widget::Graph(graph));
    }

    let throttle_metric = THROTTLED_REQUESTS.metric(table);
    let throttle_alarm = throttle_metric.create_alarm(
        AlarmProps::new(
            throttle_threshold,
            ComparisonOperator::GreaterThanOrEqualToThreshold,
        )
        .description(format!(
            "at least {} throttled requests in {} minutes",
            throttle_threshold, ALARM_PERIOD_MINUTES
        )),
    )?;
    let throttle_graph = GraphWidget::new(
        format!("Throttled Requests/{}min", THROTTLED_REQUESTS.period_minutes),
        24,
    )
    .metric(throttle_metric)
    .annotation(throttle_alarm.to_annotation())
    .y_axis_min(0.0);
    alarms.push(PlannedAlarm {
        id: "ThrottledRequestsAlarm".to_string(),
        alarm: throttle_alarm,
    });

    let links = vec![Link::new("Amazon DynamoDB Console", table.console_url())];
    Ok(WatchPlan {
        title: title.to_string(),
        links,
        alarms,
        rows: vec![capacity_row, vec![Widget::Graph(throttle_graph)]],
    })
}
