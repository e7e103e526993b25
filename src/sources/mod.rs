/// DynamoDB tables
pub mod dynamodb;

/// Lambda functions
pub mod lambda;

/// API Gateway REST APIs
pub mod apigateway;

pub use apigateway::{RestApi, RestApiProps};
pub use dynamodb::{Attribute, AttributeType, BillingMode, Table, TableProps};
pub use lambda::{Function, FunctionProps};

use crate::metrics::{Dimension, Metric, Statistic};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Capability shared by everything that publishes CloudWatch metrics
#[cfg_attr(test, mockall::automock)]
pub trait MetricSource {
    /// CloudWatch namespace the resource publishes under
    fn namespace(&self) -> &'static str;

    /// Dimensions identifying this resource within the namespace
    fn dimensions(&self) -> Vec<Dimension>;
}

/// Build a metric of `source`
pub fn metric_for(
    source: &dyn MetricSource,
    metric_name: &str,
    statistic: Statistic,
    period: Duration,
) -> Metric {
    Metric::new(source.namespace(), metric_name)
        .with_dimensions(source.dimensions())
        .with_statistic(statistic)
        .with_period(period)
}

/// Kind of a watchable resource
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    DynamoTable,
    LambdaFunction,
    ApiGateway,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::DynamoTable => f.write_str("DynamoDB table"),
            SourceKind::LambdaFunction => f.write_str("Lambda function"),
            SourceKind::ApiGateway => f.write_str("API Gateway REST API"),
        }
    }
}

/// A resource declared in a stack that Watchful knows how to monitor
#[derive(Debug, Clone, PartialEq)]
pub enum WatchableResource {
    DynamoTable(Table),
    LambdaFunction(Function),
    ApiGateway(RestApi),
}

impl WatchableResource {
    pub fn kind(&self) -> SourceKind {
        match self {
            WatchableResource::DynamoTable(_) => SourceKind::DynamoTable,
            WatchableResource::LambdaFunction(_) => SourceKind::LambdaFunction,
            WatchableResource::ApiGateway(_) => SourceKind::ApiGateway,
        }
    }

    /// Construct id the resource was declared with
    pub fn node_id(&self) -> &str {
        match self {
            WatchableResource::DynamoTable(t) => t.node_id(),
            WatchableResource::LambdaFunction(f) => f.node_id(),
            WatchableResource::ApiGateway(a) => a.node_id(),
        }
    }

    pub fn logical_id(&self) -> &str {
        match self {
            WatchableResource::DynamoTable(t) => t.logical_id(),
            WatchableResource::LambdaFunction(f) => f.logical_id(),
            WatchableResource::ApiGateway(a) => a.logical_id(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfn::{CfnString, Token};

    #[test]
    fn test_metric_for_uses_source_identity() {
        let mut source = MockMetricSource::new();
        source.expect_namespace().return_const("AWS/Test");
        source
            .expect_dimensions()
            .times(1)
            .returning(|| vec![Dimension::new("Name", Token::reference("Thing"))]);

        let metric = metric_for(&source, "Requests", Statistic::Sum, Duration::minutes(1));

        assert_eq!(metric.namespace, "AWS/Test");
        assert_eq!(metric.metric_name, "Requests");
        assert_eq!(metric.statistic, Statistic::Sum);
        assert_eq!(metric.period, Duration::minutes(1));
        assert_eq!(metric.dimensions.len(), 1);
        assert_eq!(metric.dimensions[0].name, "Name");
        assert_eq!(
            metric.dimensions[0].value,
            CfnString::token(Token::reference("Thing"))
        );
    }

    #[test]
    fn test_metric_for_without_dimensions() {
        let mut source = MockMetricSource::new();
        source.expect_namespace().return_const("AWS/Global");
        source.expect_dimensions().returning(Vec::new);

        let metric = metric_for(&source, "Count", Statistic::Average, Duration::minutes(5));
        assert!(metric.dimensions.is_empty());
        assert_eq!(metric.display_label(), "Count");
    }

    #[test]
    fn test_source_kind_serialization() {
        assert_eq!(
            serde_json::to_string(&SourceKind::DynamoTable).unwrap(),
            "\"dynamo_table\""
        );
        assert_eq!(
            serde_json::to_string(&SourceKind::ApiGateway).unwrap(),
            "\"api_gateway\""
        );
        assert_eq!(SourceKind::LambdaFunction.to_string(), "Lambda function");
    }
}
