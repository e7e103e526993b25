//! Metric and alarm definitions
//!
//! A [`Metric`] identifies a CloudWatch time series (namespace, name,
//! dimensions) together with how it is aggregated (statistic and period).
//! An [`Alarm`] compares such a metric against a threshold and carries the
//! action destinations invoked when it fires.

use crate::cfn::CfnString;
use crate::dashboard::HorizontalAnnotation;
use crate::error::ConfigError;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;

/// Colour used for alarm threshold annotations on graphs
pub const ALARM_ANNOTATION_COLOR: &str = "#ff0000";

/// How datapoints within a period are aggregated
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Statistic {
    SampleCount,
    Average,
    Sum,
    Minimum,
    Maximum,
    /// Extended statistic, e.g. `p99`
    Percentile(f64),
}

impl Statistic {
    pub fn is_percentile(&self) -> bool {
        matches!(self, Statistic::Percentile(_))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if let Statistic::Percentile(p) = self {
            if !(p.is_finite() && *p > 0.0 && *p < 100.0) {
                return Err(ConfigError::ValidationError(format!(
                    "percentile statistic must be between 0 and 100, got {}",
                    p
                )));
            }
        }
        Ok(())
    }
}

impl fmt::Display for Statistic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statistic::SampleCount => f.write_str("SampleCount"),
            Statistic::Average => f.write_str("Average"),
            Statistic::Sum => f.write_str("Sum"),
            Statistic::Minimum => f.write_str("Minimum"),
            Statistic::Maximum => f.write_str("Maximum"),
            Statistic::Percentile(p) => write!(f, "p{}", p),
        }
    }
}

/// Alarm comparison, rendered with the CloudFormation spelling
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ComparisonOperator {
    GreaterThanOrEqualToThreshold,
    GreaterThanThreshold,
    LessThanThreshold,
    LessThanOrEqualToThreshold,
}

impl ComparisonOperator {
    pub fn symbol(&self) -> &'static str {
        match self {
            ComparisonOperator::GreaterThanOrEqualToThreshold => ">=",
            ComparisonOperator::GreaterThanThreshold => ">",
            ComparisonOperator::LessThanThreshold => "<",
            ComparisonOperator::LessThanOrEqualToThreshold => "<=",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ComparisonOperator::GreaterThanOrEqualToThreshold => "GreaterThanOrEqualToThreshold",
            ComparisonOperator::GreaterThanThreshold => "GreaterThanThreshold",
            ComparisonOperator::LessThanThreshold => "LessThanThreshold",
            ComparisonOperator::LessThanOrEqualToThreshold => "LessThanOrEqualToThreshold",
        }
    }
}

/// A metric dimension; the value may be a deploy-time token
#[derive(Debug, Clone, PartialEq)]
pub struct Dimension {
    pub name: String,
    pub value: CfnString,
}

impl Dimension {
    pub fn new(name: impl Into<String>, value: impl Into<CfnString>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Check that a period is one CloudWatch accepts: 10 s, 30 s or a whole number of minutes
pub fn validate_period(period: Duration) -> Result<(), ConfigError> {
    let seconds = period.num_seconds();
    let valid = seconds > 0 && (seconds == 10 || seconds == 30 || seconds % 60 == 0);
    if !valid {
        return Err(ConfigError::ValidationError(format!(
            "metric period must be 10s, 30s or a multiple of 60s, got {}s",
            seconds
        )));
    }
    Ok(())
}

/// A CloudWatch time series plus its aggregation
#[derive(Debug, Clone, PartialEq)]
pub struct Metric {
    pub namespace: String,
    pub metric_name: String,
    pub dimensions: Vec<Dimension>,
    pub statistic: Statistic,
    pub period: Duration,
    pub label: Option<String>,
}

impl Metric {
    /// Create a metric with CloudWatch defaults (Average over 5 minutes)
    pub fn new(namespace: impl Into<String>, metric_name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            metric_name: metric_name.into(),
            dimensions: Vec::new(),
            statistic: Statistic::Average,
            period: Duration::minutes(5),
            label: None,
        }
    }

    pub fn with_dimension(mut self, name: impl Into<String>, value: impl Into<CfnString>) -> Self {
        self.dimensions.push(Dimension::new(name, value));
        self
    }

    pub fn with_dimensions(mut self, dimensions: Vec<Dimension>) -> Self {
        self.dimensions.extend(dimensions);
        self
    }

    pub fn with_statistic(mut self, statistic: Statistic) -> Self {
        self.statistic = statistic;
        self
    }

    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Label shown on graphs, falling back to the metric name
    pub fn display_label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.metric_name)
    }

    pub fn period_minutes(&self) -> i64 {
        self.period.num_minutes()
    }

    /// Create an alarm on this metric
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` when the threshold is not a
    /// positive finite number, when no evaluation periods are requested, or
    /// when the metric's period or statistic is not valid for CloudWatch.
    pub fn create_alarm(&self, props: AlarmProps) -> Result<Alarm, ConfigError> {
        Alarm::new(self.clone(), props)
    }
}

/// Settings used when creating an [`Alarm`] from a [`Metric`]
#[derive(Debug, Clone, PartialEq)]
pub struct AlarmProps {
    pub threshold: f64,
    pub comparison_operator: ComparisonOperator,
    pub evaluation_periods: u32,
    pub description: Option<String>,
}

impl AlarmProps {
    pub fn new(threshold: f64, comparison_operator: ComparisonOperator) -> Self {
        Self {
            threshold,
            comparison_operator,
            evaluation_periods: 1,
            description: None,
        }
    }

    pub fn evaluation_periods(mut self, evaluation_periods: u32) -> Self {
        self.evaluation_periods = evaluation_periods;
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A standing rule comparing a metric statistic to a threshold
#[derive(Debug, Clone, PartialEq)]
pub struct Alarm {
    metric: Metric,
    threshold: f64,
    comparison_operator: ComparisonOperator,
    evaluation_periods: u32,
    description: Option<String>,
    actions: Vec<CfnString>,
}

impl Alarm {
    /// Create an alarm without any actions
    ///
    /// # Errors
    ///
    /// See [`Metric::create_alarm`].
    pub fn new(metric: Metric, props: AlarmProps) -> Result<Self, ConfigError> {
        if !(props.threshold.is_finite() && props.threshold > 0.0) {
            return Err(ConfigError::ValidationError(format!(
                "alarm threshold on {} must be positive, got {}",
                metric.metric_name, props.threshold
            )));
        }
        if props.evaluation_periods == 0 {
            return Err(ConfigError::ValidationError(format!(
                "alarm on {} needs at least one evaluation period",
                metric.metric_name
            )));
        }
        validate_period(metric.period)?;
        metric.statistic.validate()?;

        Ok(Self {
            metric,
            threshold: props.threshold,
            comparison_operator: props.comparison_operator,
            evaluation_periods: props.evaluation_periods,
            description: props.description,
            actions: Vec::new(),
        })
    }

    /// Append action destinations, keeping their order
    pub fn add_actions(&mut self, actions: &[CfnString]) {
        self.actions.extend(actions.iter().cloned());
    }

    pub fn actions(&self) -> &[CfnString] {
        &self.actions
    }

    pub fn metric(&self) -> &Metric {
        &self.metric
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn comparison_operator(&self) -> ComparisonOperator {
        self.comparison_operator
    }

    pub fn evaluation_periods(&self) -> u32 {
        self.evaluation_periods
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Horizontal line marking this alarm's threshold on a graph
    pub fn to_annotation(&self) -> HorizontalAnnotation {
        let minutes = self.metric.period_minutes() * i64::from(self.evaluation_periods);
        HorizontalAnnotation {
            value: self.threshold,
            label: Some(format!(
                "{} {} {} for {} datapoints within {} minutes",
                self.metric.display_label(),
                self.comparison_operator.symbol(),
                self.threshold,
                self.evaluation_periods,
                minutes
            )),
            color: Some(ALARM_ANNOTATION_COLOR.to_string()),
        }
    }

    /// Properties of the `AWS::CloudWatch::Alarm` resource
    pub fn properties(&self) -> Value {
        let mut props = Map::new();
        props.insert(
            "ComparisonOperator".to_string(),
            json!(self.comparison_operator.as_str()),
        );
        props.insert(
            "EvaluationPeriods".to_string(),
            json!(self.evaluation_periods),
        );
        props.insert("Threshold".to_string(), json!(self.threshold));
        props.insert("MetricName".to_string(), json!(self.metric.metric_name));
        props.insert("Namespace".to_string(), json!(self.metric.namespace));
        props.insert(
            "Period".to_string(),
            json!(self.metric.period.num_seconds()),
        );

        if !self.metric.dimensions.is_empty() {
            let dimensions: Vec<Value> = self
                .metric
                .dimensions
                .iter()
                .map(|d| json!({ "Name": d.name, "Value": d.value.to_cfn() }))
                .collect();
            props.insert("Dimensions".to_string(), Value::Array(dimensions));
        }

        if self.metric.statistic.is_percentile() {
            props.insert(
                "ExtendedStatistic".to_string(),
                json!(self.metric.statistic.to_string()),
            );
        } else {
            props.insert(
                "Statistic".to_string(),
                json!(self.metric.statistic.to_string()),
            );
        }

        if let Some(description) = &self.description {
            props.insert("AlarmDescription".to_string(), json!(description));
        }

        if !self.actions.is_empty() {
            let actions: Vec<Value> = self.actions.iter().map(|a| a.to_cfn()).collect();
            props.insert("AlarmActions".to_string(), Value::Array(actions));
        }

        Value::Object(props)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfn::Token;

    fn errors_metric() -> Metric {
        Metric::new("AWS/Lambda", "Errors")
            .with_dimension("FunctionName", Token::reference("Handler"))
            .with_statistic(Statistic::Sum)
            .with_label("Errors")
    }

    #[test]
    fn test_alarm_rejects_out_of_range_percentile() {
        for p in [0.0, 100.0, f64::NAN] {
            let metric = errors_metric().with_statistic(Statistic::Percentile(p));
            let result = Alarm::new(
                metric,
                AlarmProps::new(1.0, ComparisonOperator::GreaterThanOrEqualToThreshold),
            );
            assert!(matches!(result, Err(ConfigError::ValidationError(_))));
        }
        let metric = errors_metric().with_statistic(Statistic::Percentile(99.9));
        assert!(Alarm::new(
            metric,
            AlarmProps::new(1.0, ComparisonOperator::GreaterThanOrEqualToThreshold)
        )
        .is_ok());
    }

    #[test]
    fn test_statistic_display() {
        assert_eq!(Statistic::Sum.to_string(), "Sum");
        assert_eq!(Statistic::Percentile(99.0).to_string(), "p99");
        assert_eq!(Statistic::Percentile(99.9).to_string(), "p99.9");
    }

    #[test]
    fn test_validate_period() {
        assert!(validate_period(Duration::seconds(10)).is_ok());
        assert!(validate_period(Duration::seconds(30)).is_ok());
        assert!(validate_period(Duration::minutes(5)).is_ok());
        assert!(validate_period(Duration::seconds(0)).is_err());
        assert!(validate_period(Duration::seconds(45)).is_err());
        assert!(validate_period(Duration::seconds(-60)).is_err());
    }

    #[test]
    fn test_alarm_rejects_non_positive_threshold() {
        let metric = errors_metric();
        let zero = metric.create_alarm(AlarmProps::new(
            0.0,
            ComparisonOperator::GreaterThanThreshold,
        ));
        assert!(matches!(zero, Err(ConfigError::ValidationError(_))));

        let nan = metric.create_alarm(AlarmProps::new(
            f64::NAN,
            ComparisonOperator::GreaterThanThreshold,
        ));
        assert!(nan.is_err());
    }

    #[test]
    fn test_alarm_rejects_zero_evaluation_periods() {
        let result = errors_metric().create_alarm(
            AlarmProps::new(1.0, ComparisonOperator::GreaterThanOrEqualToThreshold)
                .evaluation_periods(0),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_alarm_rejects_invalid_period() {
        let result = errors_metric()
            .with_period(Duration::seconds(45))
            .create_alarm(AlarmProps::new(
                1.0,
                ComparisonOperator::GreaterThanOrEqualToThreshold,
            ));
        assert!(result.is_err());
    }

    #[test]
    fn test_alarm_properties() {
        let mut alarm = errors_metric()
            .create_alarm(
                AlarmProps::new(1.0, ComparisonOperator::GreaterThanOrEqualToThreshold)
                    .evaluation_periods(3)
                    .description("Over 0 errors per minute"),
            )
            .unwrap();
        alarm.add_actions(&[CfnString::literal("arn:1"), CfnString::literal("arn:2")]);

        let props = alarm.properties();
        assert_eq!(props["ComparisonOperator"], "GreaterThanOrEqualToThreshold");
        assert_eq!(props["EvaluationPeriods"], 3);
        assert_eq!(props["Threshold"].as_f64(), Some(1.0));
        assert_eq!(props["MetricName"], "Errors");
        assert_eq!(props["Namespace"], "AWS/Lambda");
        assert_eq!(props["Period"], 300);
        assert_eq!(props["Statistic"], "Sum");
        assert_eq!(props["AlarmDescription"], "Over 0 errors per minute");
        assert_eq!(
            props["Dimensions"],
            json!([{ "Name": "FunctionName", "Value": { "Ref": "Handler" } }])
        );
        assert_eq!(props["AlarmActions"], json!(["arn:1", "arn:2"]));
        assert!(props.get("ExtendedStatistic").is_none());
    }

    #[test]
    fn test_percentile_alarm_uses_extended_statistic() {
        let alarm = Metric::new("AWS/Lambda", "Duration")
            .with_statistic(Statistic::Percentile(99.0))
            .create_alarm(AlarmProps::new(
                2400.0,
                ComparisonOperator::GreaterThanOrEqualToThreshold,
            ))
            .unwrap();

        let props = alarm.properties();
        assert_eq!(props["ExtendedStatistic"], "p99");
        assert!(props.get("Statistic").is_none());
    }

    #[test]
    fn test_alarm_without_actions_omits_property() {
        let alarm = errors_metric()
            .create_alarm(AlarmProps::new(
                1.0,
                ComparisonOperator::GreaterThanOrEqualToThreshold,
            ))
            .unwrap();
        assert!(alarm.actions().is_empty());
        assert!(alarm.properties().get("AlarmActions").is_none());
    }

    #[test]
    fn test_alarm_annotation() {
        let alarm = errors_metric()
            .create_alarm(
                AlarmProps::new(1.0, ComparisonOperator::GreaterThanOrEqualToThreshold)
                    .evaluation_periods(3),
            )
            .unwrap();

        let annotation = alarm.to_annotation();
        assert_eq!(annotation.value, 1.0);
        assert_eq!(
            annotation.label.as_deref(),
            Some("Errors >= 1 for 3 datapoints within 15 minutes")
        );
        assert_eq!(annotation.color.as_deref(), Some(ALARM_ANNOTATION_COLOR));
    }

    #[test]
    fn test_comparison_operator_serialization() {
        assert_eq!(
            serde_json::to_string(&ComparisonOperator::GreaterThanThreshold).unwrap(),
            "\"GreaterThanThreshold\""
        );
        assert_eq!(
            ComparisonOperator::LessThanOrEqualToThreshold.symbol(),
            "<="
        );
    }
}
