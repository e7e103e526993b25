use crate::dashboard::{GraphWidget, Widget};
use crate::error::ConfigError;
use crate::metrics::{AlarmProps, ComparisonOperator, Statistic};
use crate::sources::Function;
use crate::watchers::{positive, Link, MetricSpec, PlannedAlarm, WatchPlan};
use serde::Deserialize;

/// Share of the function timeout the p99 duration may reach before alarming
pub const DEFAULT_DURATION_THRESHOLD_PERCENT: f64 = 80.0;

const EVALUATION_PERIODS: u32 = 3;
const GRAPH_WIDTH: u32 = 6;

pub const INVOCATIONS: MetricSpec = MetricSpec {
    metric_name: "Invocations",
    label: "Invocations",
    statistic: Statistic::Sum,
    period_minutes: 5,
};

pub const ERRORS: MetricSpec = MetricSpec {
    metric_name: "Errors",
    label: "Errors",
    statistic: Statistic::Sum,
    period_minutes: 5,
};

pub const THROTTLES: MetricSpec = MetricSpec {
    metric_name: "Throttles",
    label: "Throttles",
    statistic: Statistic::Sum,
    period_minutes: 5,
};

pub const DURATION: MetricSpec = MetricSpec {
    metric_name: "Duration",
    label: "p99 Duration",
    statistic: Statistic::Percentile(99.0),
    period_minutes: 5,
};

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct WatchLambdaFunctionOptions {
    /// Alarm when errors per minute exceed this count (default 0)
    pub errors_per_minute_threshold: Option<u32>,
    /// Alarm when throttles per minute exceed this count (default 0)
    pub throttles_per_minute_threshold: Option<u32>,
    /// Percent of the timeout the p99 duration may reach (default 80)
    pub duration_threshold_percent: Option<f64>,
    /// Replaces the context's alarm actions for this function
    pub alarm_action_arns: Option<Vec<String>>,
}

/// Plan the alarms and widgets for a function
///
/// Count alarms fire when a minute sees more than the configured number of
/// events; since counts are whole numbers this is expressed as
/// "at least threshold + 1".
pub fn plan(
    title: &str,
    function: &Function,
    options: &WatchLambdaFunctionOptions,
) -> Result<WatchPlan, ConfigError> {
    let errors_over = options.errors_per_minute_threshold.unwrap_or(0);
    let throttles_over = options.throttles_per_minute_threshold.unwrap_or(0);
    let duration_percent = positive(
        "duration_threshold_percent",
        options
            .duration_threshold_percent
            .unwrap_or(DEFAULT_DURATION_THRESHOLD_PERCENT),
    )?;
    if duration_percent > 100.0 {
        return Err(ConfigError::ValidationError(format!(
            "duration_threshold_percent must not exceed 100, got {}",
            duration_percent
        )));
    }

    let errors_metric = ERRORS.metric(function);
    let errors_alarm = errors_metric.create_alarm(
        AlarmProps::new(
            f64::from(errors_over) + 1.0,
            ComparisonOperator::GreaterThanOrEqualToThreshold,
        )
        .evaluation_periods(EVALUATION_PERIODS)
        .description(format!("Over {} errors per minute", errors_over)),
    )?;

    let throttles_metric = THROTTLES.metric(function);
    let throttles_alarm = throttles_metric.create_alarm(
        AlarmProps::new(
            f64::from(throttles_over) + 1.0,
            ComparisonOperator::GreaterThanOrEqualToThreshold,
        )
        .evaluation_periods(EVALUATION_PERIODS)
        .description(format!("Over {} throttles per minute", throttles_over)),
    )?;

    let timeout_ms = function.timeout().num_milliseconds() as f64;
    let duration_threshold_ms = timeout_ms * duration_percent / 100.0;
    let duration_metric = DURATION.metric(function);
    let duration_alarm = duration_metric.create_alarm(
        AlarmProps::new(
            duration_threshold_ms,
            ComparisonOperator::GreaterThanOrEqualToThreshold,
        )
        .evaluation_periods(EVALUATION_PERIODS)
        .description(format!(
            "p99 latency >= {}s ({}%)",
            duration_threshold_ms / 1000.0,
            duration_percent
        )),
    )?;

    let graph = |spec: &MetricSpec| {
        GraphWidget::new(
            format!("{}/{}min", spec.metric_name, spec.period_minutes),
            GRAPH_WIDTH,
        )
    };
    let row = vec![
        Widget::Graph(graph(&INVOCATIONS).metric(INVOCATIONS.metric(function))),
        Widget::Graph(
            graph(&ERRORS)
                .metric(errors_metric)
                .annotation(errors_alarm.to_annotation()),
        ),
        Widget::Graph(
            graph(&THROTTLES)
                .metric(throttles_metric)
                .annotation(throttles_alarm.to_annotation()),
        ),
        Widget::Graph(
            graph(&DURATION)
                .metric(duration_metric)
                .annotation(duration_alarm.to_annotation()),
        ),
    ];

    Ok(WatchPlan {
        title: title.to_string(),
        links: vec![
            Link::new("AWS Lambda Console", function.console_url()),
            Link::new("CloudWatch Logs", function.logs_url()),
        ],
        alarms: vec![
            PlannedAlarm {
                id: "ErrorsAlarm".to_string(),
                alarm: errors_alarm,
            },
            PlannedAlarm {
                id: "ThrottlesAlarm".to_string(),
                alarm: throttles_alarm,
            },
            PlannedAlarm {
                id: "DurationAlarm".to_string(),
                alarm: duration_alarm,
            },
        ],
        rows: vec![row],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::FunctionProps;
    use crate::stack::Stack;
    use chrono::Duration;

    fn function(stack: &mut Stack, timeout: Option<Duration>) -> Function {
        let mut props = FunctionProps::new("python3.12", "app.handler", "def handler(e, c): pass");
        props.timeout = timeout;
        Function::new(stack, "Handler", props).unwrap()
    }

    #[test]
    fn test_default_plan() {
        let mut stack = Stack::default();
        let function = function(&mut stack, None);

        let plan = plan("Handler", &function, &WatchLambdaFunctionOptions::default()).unwrap();

        let errors = plan.alarm("ErrorsAlarm").unwrap();
        assert_eq!(errors.threshold(), 1.0);
        assert_eq!(
            errors.comparison_operator(),
            ComparisonOperator::GreaterThanOrEqualToThreshold
        );
        assert_eq!(errors.evaluation_periods(), 3);
        assert_eq!(errors.description(), Some("Over 0 errors per minute"));

        let throttles = plan.alarm("ThrottlesAlarm").unwrap();
        assert_eq!(throttles.metric().metric_name, "Throttles");
        assert_eq!(throttles.threshold(), 1.0);

        // 80% of the default 3 second timeout
        let duration = plan.alarm("DurationAlarm").unwrap();
        assert_eq!(duration.threshold(), 2400.0);
        assert_eq!(duration.metric().statistic, Statistic::Percentile(99.0));
        assert_eq!(duration.description(), Some("p99 latency >= 2.4s (80%)"));

        let titles: Vec<_> = plan.widgets().filter_map(|w| w.title()).collect();
        assert_eq!(
            titles,
            vec!["Invocations/5min", "Errors/5min", "Throttles/5min", "Duration/5min"]
        );
        assert!(plan.widgets().all(|w| w.width() == 6));
        assert_eq!(plan.links.len(), 2);
    }

    #[test]
    fn test_threshold_overrides() {
        let mut stack = Stack::default();
        let function = function(&mut stack, Some(Duration::seconds(10)));
        let options = WatchLambdaFunctionOptions {
            errors_per_minute_threshold: Some(5),
            throttles_per_minute_threshold: Some(2),
            duration_threshold_percent: Some(50.0),
            alarm_action_arns: None,
        };

        let plan = plan("Handler", &function, &options).unwrap();
        assert_eq!(plan.alarm("ErrorsAlarm").unwrap().threshold(), 6.0);
        assert_eq!(plan.alarm("ThrottlesAlarm").unwrap().threshold(), 3.0);
        assert_eq!(plan.alarm("DurationAlarm").unwrap().threshold(), 5000.0);
    }

    #[test]
    fn test_duration_percent_bounds() {
        let mut stack = Stack::default();
        let function = function(&mut stack, None);

        for percent in [0.0, -5.0, 150.0] {
            let options = WatchLambdaFunctionOptions {
                duration_threshold_percent: Some(percent),
                ..WatchLambdaFunctionOptions::default()
            };
            assert!(plan("Handler", &function, &options).is_err());
        }
    }

    #[test]
    fn test_alarmed_graphs_carry_annotations() {
        let mut stack = Stack::default();
        let function = function(&mut stack, None);
        let plan = plan("Handler", &function, &WatchLambdaFunctionOptions::default()).unwrap();

        let annotated: Vec<usize> = plan
            .widgets()
            .map(|w| match w {
                Widget::Graph(g) => g.left_annotations.len(),
                _ => 0,
            })
            .collect();
        assert_eq!(annotated, vec![0, 1, 1, 1]);
    }
}
