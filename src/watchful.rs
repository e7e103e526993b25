//! The monitoring context
//!
//! A [`Watchful`] owns at most one dashboard and a default list of alarm
//! actions. Each `watch_*` call turns a resource reference into that
//! resource type's alarms and dashboard rows, appended in call order.

use crate::cfn::{CfnString, Token};
use crate::dashboard::{Dashboard, TextWidget, Widget};
use crate::error::ConfigError;
use crate::metrics::Alarm;
use crate::sources::{Function, RestApi, SourceKind, Table, WatchableResource};
use crate::stack::{ResourceBody, Stack};
use crate::watchers::{
    self, section_markdown, Link, WatchApiGatewayOptions, WatchDynamoTableOptions,
    WatchLambdaFunctionOptions, WatchPlan,
};
use log::{debug, info};
use serde::Deserialize;
use serde_json::json;

pub const TOPIC_TYPE: &str = "AWS::SNS::Topic";
pub const SUBSCRIPTION_TYPE: &str = "AWS::SNS::Subscription";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct WatchfulProps {
    /// Create a dashboard (default true)
    pub dashboard: bool,
    /// Explicit dashboard name; CloudFormation generates one when absent
    pub dashboard_name: Option<String>,
    /// Default action destinations for every alarm
    pub alarm_action_arns: Vec<String>,
    /// Email address subscribed to the alarm topic
    pub alarm_email: Option<String>,
    /// SQS queue ARN subscribed to the alarm topic
    pub alarm_sqs: Option<String>,
    /// Existing SNS topic ARN notified by every alarm
    pub alarm_sns: Option<String>,
}

impl Default for WatchfulProps {
    fn default() -> Self {
        Self {
            dashboard: true,
            dashboard_name: None,
            alarm_action_arns: Vec::new(),
            alarm_email: None,
            alarm_sqs: None,
            alarm_sns: None,
        }
    }
}

impl WatchfulProps {
    fn validate(&self) -> Result<(), ConfigError> {
        let named = matches!(&self.dashboard_name, Some(name) if !name.is_empty());
        if !self.dashboard && named {
            return Err(ConfigError::DashboardNameWithoutDashboard);
        }
        if self.alarm_action_arns.iter().any(|arn| arn.is_empty()) {
            return Err(ConfigError::ValidationError(
                "alarm action ARNs must not be empty".to_string(),
            ));
        }
        for (option, value) in [
            ("alarm_email", &self.alarm_email),
            ("alarm_sqs", &self.alarm_sqs),
            ("alarm_sns", &self.alarm_sns),
        ] {
            if matches!(value, Some(v) if v.is_empty()) {
                return Err(ConfigError::ValidationError(format!(
                    "{} must not be empty",
                    option
                )));
            }
        }
        Ok(())
    }
}

/// Which kinds of source [`Watchful::watch_scope`] picks up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct WatchScopeOptions {
    pub dynamodb: bool,
    pub lambda: bool,
    pub api_gateway: bool,
}

impl Default for WatchScopeOptions {
    fn default() -> Self {
        Self {
            dynamodb: true,
            lambda: true,
            api_gateway: true,
        }
    }
}

impl WatchScopeOptions {
    pub fn includes(&self, kind: SourceKind) -> bool {
        match kind {
            SourceKind::DynamoTable => self.dynamodb,
            SourceKind::LambdaFunction => self.lambda,
            SourceKind::ApiGateway => self.api_gateway,
        }
    }
}

/// Dashboard and alarms for a set of watched resources
#[derive(Debug, Clone)]
pub struct Watchful {
    id: String,
    stack_id: u64,
    dashboard: Option<String>,
    alarm_actions: Vec<CfnString>,
    watched: Vec<String>,
}

impl Watchful {
    /// Create a monitoring context under `id`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::DashboardNameWithoutDashboard` when a dashboard
    /// name is given with the dashboard disabled, and other `ConfigError`s for
    /// empty action destinations or a taken id.
    pub fn new(stack: &mut Stack, id: &str, props: WatchfulProps) -> Result<Self, ConfigError> {
        props.validate()?;

        let topic_path = format!("{}/AlarmTopic", id);
        let subscriptions: Vec<(String, &str, &String)> = [
            ("Email", "email", &props.alarm_email),
            ("Sqs", "sqs", &props.alarm_sqs),
        ]
        .into_iter()
        .filter_map(|(name, protocol, endpoint)| {
            let path = format!("{}/{}Subscription", topic_path, name);
            endpoint.as_ref().map(|endpoint| (path, protocol, endpoint))
        })
        .collect();
        let dashboard_path = format!("{}/Dashboard", id);
        let output_path = format!("{}/WatchfulDashboard", id);

        let mut paths = Vec::new();
        if !subscriptions.is_empty() {
            paths.push(topic_path.clone());
            paths.extend(subscriptions.iter().map(|(path, _, _)| path.clone()));
        }
        if props.dashboard {
            paths.push(dashboard_path.clone());
        }
        stack.check_paths_free(&paths)?;
        if props.dashboard && !stack.is_output_free(&output_path) {
            return Err(ConfigError::DuplicateConstructId(output_path));
        }
        stack.register_construct(id)?;

        let mut alarm_actions = Vec::new();

        if !subscriptions.is_empty() {
            let topic = stack.add_resource(&topic_path, ResourceBody::raw(TOPIC_TYPE, json!({})))?;
            for (path, protocol, endpoint) in &subscriptions {
                stack.add_resource(
                    path,
                    ResourceBody::raw(
                        SUBSCRIPTION_TYPE,
                        json!({
                            "Protocol": protocol,
                            "TopicArn": { "Ref": topic },
                            "Endpoint": endpoint,
                        }),
                    ),
                )?;
            }
            alarm_actions.push(CfnString::token(Token::reference(&topic)));
        }
        if let Some(arn) = &props.alarm_sns {
            alarm_actions.push(CfnString::literal(arn.as_str()));
        }
        alarm_actions.extend(
            props
                .alarm_action_arns
                .iter()
                .map(|arn| CfnString::literal(arn.as_str())),
        );

        let dashboard = if props.dashboard {
            let name = props.dashboard_name.filter(|name| !name.is_empty());
            let logical_id =
                stack.add_resource(&dashboard_path, ResourceBody::Dashboard(Dashboard::new(name)))?;
            let url = CfnString::literal("https://console.aws.amazon.com/cloudwatch/home?region=")
                .with_token(Token::Region)
                .with_str("#dashboards:name=")
                .with_token(Token::reference(&logical_id));
            stack.add_output(
                &output_path,
                Some("URL of the CloudWatch dashboard".to_string()),
                url,
            )?;
            Some(logical_id)
        } else {
            None
        };

        info!(
            "Created Watchful '{}' (dashboard: {}, {} default alarm actions)",
            id,
            dashboard.is_some(),
            alarm_actions.len()
        );

        Ok(Self {
            id: id.to_string(),
            stack_id: stack.id(),
            dashboard,
            alarm_actions,
            watched: Vec::new(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Logical id of the dashboard, if one was created
    pub fn dashboard(&self) -> Option<&str> {
        self.dashboard.as_deref()
    }

    /// Actions attached to alarms that carry no per-call override
    pub fn alarm_actions(&self) -> &[CfnString] {
        &self.alarm_actions
    }

    /// Logical ids of the resources watched so far, in call order
    pub fn watched(&self) -> &[String] {
        &self.watched
    }

    pub fn is_watching(&self, logical_id: &str) -> bool {
        self.watched.iter().any(|w| w == logical_id)
    }

    /// Add an alarm under this context with the default actions
    pub fn add_alarm(
        &self,
        stack: &mut Stack,
        id: &str,
        alarm: Alarm,
    ) -> Result<String, ConfigError> {
        self.ensure_stack(stack)?;
        self.put_alarm(stack, &format!("{}/{}", self.id, id), alarm, &self.alarm_actions)
    }

    /// Append a row of widgets to the dashboard; a no-op without one
    pub fn add_widgets(&self, stack: &mut Stack, widgets: Vec<Widget>) -> Result<(), ConfigError> {
        self.ensure_stack(stack)?;
        let Some(logical_id) = &self.dashboard else {
            debug!("Watchful '{}' has no dashboard, dropping {} widgets", self.id, widgets.len());
            return Ok(());
        };
        stack
            .dashboard_mut(logical_id)
            .ok_or_else(|| ConfigError::UnknownResource(logical_id.clone()))?
            .add_widgets(widgets);
        Ok(())
    }

    /// Append a markdown header with link buttons
    pub fn add_section(
        &self,
        stack: &mut Stack,
        title: &str,
        links: &[Link],
    ) -> Result<(), ConfigError> {
        let header = TextWidget::new(section_markdown(title, links));
        self.add_widgets(stack, vec![Widget::Text(header)])
    }

    pub fn watch_dynamo_table(
        &mut self,
        stack: &mut Stack,
        title: &str,
        table: &Table,
        options: &WatchDynamoTableOptions,
    ) -> Result<(), ConfigError> {
        self.ensure_source(stack, table.stack_id(), table.node_id())?;
        let actions = self.resolve_actions(options.alarm_action_arns.as_deref())?;
        let plan = watchers::dynamodb::plan(title, table, options)?;
        self.apply(stack, table.node_id(), table.logical_id(), plan, &actions)
    }

    pub fn watch_lambda_function(
        &mut self,
        stack: &mut Stack,
        title: &str,
        function: &Function,
        options: &WatchLambdaFunctionOptions,
    ) -> Result<(), ConfigError> {
        self.ensure_source(stack, function.stack_id(), function.node_id())?;
        let actions = self.resolve_actions(options.alarm_action_arns.as_deref())?;
        let plan = watchers::lambda::plan(title, function, options)?;
        self.apply(stack, function.node_id(), function.logical_id(), plan, &actions)
    }

    pub fn watch_api_gateway(
        &mut self,
        stack: &mut Stack,
        title: &str,
        api: &RestApi,
        options: &WatchApiGatewayOptions,
    ) -> Result<(), ConfigError> {
        self.ensure_source(stack, api.stack_id(), api.node_id())?;
        let actions = self.resolve_actions(options.alarm_action_arns.as_deref())?;
        let plan = watchers::apigateway::plan(title, api, options)?;
        self.apply(stack, api.node_id(), api.logical_id(), plan, &actions)
    }

    /// Watch every enabled source declared in `stack` with default options
    ///
    /// Sources this context already watches are skipped. Returns the number
    /// of newly watched sources.
    pub fn watch_scope(
        &mut self,
        stack: &mut Stack,
        options: &WatchScopeOptions,
    ) -> Result<usize, ConfigError> {
        self.ensure_stack(stack)?;
        let sources: Vec<WatchableResource> = stack.sources().to_vec();
        let mut count = 0;

        for source in &sources {
            if !options.includes(source.kind()) {
                debug!("Skipping {} '{}': kind disabled", source.kind(), source.node_id());
                continue;
            }
            if self.is_watching(source.logical_id()) {
                debug!("Skipping {} '{}': already watched", source.kind(), source.node_id());
                continue;
            }
            let title = source.node_id();
            match source {
                WatchableResource::DynamoTable(table) => {
                    self.watch_dynamo_table(stack, title, table, &Default::default())?
                }
                WatchableResource::LambdaFunction(function) => {
                    self.watch_lambda_function(stack, title, function, &Default::default())?
                }
                WatchableResource::ApiGateway(api) => {
                    self.watch_api_gateway(stack, title, api, &Default::default())?
                }
            }
            count += 1;
        }

        info!("Watchful '{}' picked up {} sources from scope", self.id, count);
        Ok(count)
    }

    fn ensure_stack(&self, stack: &Stack) -> Result<(), ConfigError> {
        if stack.id() != self.stack_id {
            return Err(ConfigError::UnknownResource(format!(
                "Watchful '{}' belongs to another stack than '{}'",
                self.id,
                stack.name()
            )));
        }
        Ok(())
    }

    fn ensure_source(
        &self,
        stack: &Stack,
        source_stack_id: u64,
        node_id: &str,
    ) -> Result<(), ConfigError> {
        self.ensure_stack(stack)?;
        if source_stack_id != stack.id() {
            return Err(ConfigError::UnknownResource(format!(
                "'{}' is not declared in stack '{}'",
                node_id,
                stack.name()
            )));
        }
        Ok(())
    }

    fn resolve_actions(&self, arns: Option<&[String]>) -> Result<Vec<CfnString>, ConfigError> {
        match arns {
            None => Ok(self.alarm_actions.clone()),
            Some([]) => Err(ConfigError::ValidationError(
                "alarm_action_arns override must not be empty".to_string(),
            )),
            Some(arns) if arns.iter().any(|arn| arn.is_empty()) => Err(
                ConfigError::ValidationError("alarm action ARNs must not be empty".to_string()),
            ),
            Some(arns) => Ok(arns
                .iter()
                .map(|arn| CfnString::literal(arn.as_str()))
                .collect()),
        }
    }

    fn put_alarm(
        &self,
        stack: &mut Stack,
        path: &str,
        mut alarm: Alarm,
        actions: &[CfnString],
    ) -> Result<String, ConfigError> {
        alarm.add_actions(actions);
        debug!(
            "Alarm {} on {}/{} ({} actions)",
            path,
            alarm.metric().namespace,
            alarm.metric().metric_name,
            actions.len()
        );
        stack.add_resource(path, ResourceBody::Alarm(alarm))
    }

    /// Add a plan's alarms and widgets; nothing is added if any alarm id is taken
    fn apply(
        &mut self,
        stack: &mut Stack,
        node_id: &str,
        logical_id: &str,
        plan: WatchPlan,
        actions: &[CfnString],
    ) -> Result<(), ConfigError> {
        let scope = format!("{}/{}", self.id, node_id);
        if self.is_watching(logical_id) {
            return Err(ConfigError::DuplicateConstructId(scope));
        }
        let paths: Vec<String> = plan
            .alarms
            .iter()
            .map(|planned| format!("{}/{}", scope, planned.id))
            .collect();
        stack.check_paths_free(&paths)?;

        info!(
            "Watching '{}' as '{}': {} alarms, {} widgets",
            node_id,
            plan.title,
            plan.alarms.len(),
            plan.widgets().count()
        );

        for (planned, path) in plan.alarms.into_iter().zip(&paths) {
            self.put_alarm(stack, path, planned.alarm, actions)?;
        }
        if self.dashboard.is_some() {
            self.add_section(stack, &plan.title, &plan.links)?;
            for row in plan.rows {
                self.add_widgets(stack, row)?;
            }
        }
        self.watched.push(logical_id.to_string());
        Ok(())
    }
}


// Property-based tests
#[cfg(test)]
mod property_tests {
    use super::*;
    use crate::sources::{Attribute, AttributeType, TableProps};
    use quickcheck::{Arbitrary, Gen};
    use quickcheck_macros::quickcheck;

    /// A short list of non-empty ARNs
    #[derive(Debug, Clone)]
    struct Arns(Vec<String>);

    impl Arbitrary for Arns {
        fn arbitrary(g: &mut Gen) -> Self {
            let count = 1 + (u8::arbitrary(g) % 4) as usize;
            Arns(
                (0..count)
                    .map(|i| format!("arn:aws:sns:us-east-1:{}:topic-{}", u32::arbitrary(g), i))
                    .collect(),
            )
        }
    }

    fn table_stack(ids: &[&str]) -> (Stack, Vec<Table>) {
        let mut stack = Stack::default();
        let tables = ids
            .iter()
            .map(|id| {
                Table::new(
                    &mut stack,
                    id,
                    TableProps::new(Attribute::new("ID", AttributeType::String)),
                )
                .unwrap()
            })
            .collect();
        (stack, tables)
    }

    fn actions_of(stack: &Stack) -> Vec<Vec<String>> {
        stack
            .alarms()
            .map(|a| a.actions().iter().map(|c| c.to_string()).collect())
            .collect()
    }

    fn section_titles(stack: &Stack, dashboard: &str) -> Vec<String> {
        stack
            .dashboard(dashboard)
            .map(|d| {
                d.widgets()
                    .filter_map(|w| match w {
                        Widget::Text(text) => Some(text.markdown.to_string()),
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    #[quickcheck]
    fn prop_default_actions_on_every_alarm(defaults: Arns) -> bool {
        let (mut stack, tables) = table_stack(&["Table"]);
        let props = WatchfulProps {
            alarm_action_arns: defaults.0.clone(),
            ..WatchfulProps::default()
        };
        let mut watchful = Watchful::new(&mut stack, "w", props).unwrap();
        watchful
            .watch_dynamo_table(&mut stack, "T", &tables[0], &Default::default())
            .unwrap();

        let actions = actions_of(&stack);
        !actions.is_empty() && actions.iter().all(|a| *a == defaults.0)
    }

    #[quickcheck]
    fn prop_override_wins_over_defaults(defaults: Arns, overrides: Arns) -> bool {
        let (mut stack, tables) = table_stack(&["Table"]);
        let props = WatchfulProps {
            alarm_action_arns: defaults.0,
            ..WatchfulProps::default()
        };
        let mut watchful = Watchful::new(&mut stack, "w", props).unwrap();
        let options = WatchDynamoTableOptions {
            alarm_action_arns: Some(overrides.0.clone()),
            ..WatchDynamoTableOptions::default()
        };
        watchful
            .watch_dynamo_table(&mut stack, "T", &tables[0], &options)
            .unwrap();

        actions_of(&stack).iter().all(|a| *a == overrides.0)
    }

    #[quickcheck]
    fn prop_widget_order_follows_call_order(reverse: bool) -> bool {
        let (mut stack, tables) = table_stack(&["A", "B"]);
        let mut watchful = Watchful::new(&mut stack, "w", WatchfulProps::default()).unwrap();

        let mut order: Vec<&Table> = tables.iter().collect();
        if reverse {
            order.reverse();
        }
        for table in &order {
            watchful
                .watch_dynamo_table(&mut stack, table.node_id(), table, &Default::default())
                .unwrap();
        }

        let expected: Vec<&str> = order.iter().map(|t| t.node_id()).collect();
        let titles = section_titles(&stack, "wDashboard");
        titles.len() == expected.len()
            && titles
                .iter()
                .zip(&expected)
                .all(|(markdown, id)| markdown.starts_with(&format!("# {}\n", id)))
    }

    #[quickcheck]
    fn prop_dashboard_count_matches_flag(dashboard: bool) -> bool {
        let mut stack = Stack::default();
        let props = WatchfulProps {
            dashboard,
            ..WatchfulProps::default()
        };
        Watchful::new(&mut stack, "w", props).unwrap();
        stack.count_resources_of_type(crate::stack::DASHBOARD_TYPE) == usize::from(dashboard)
    }
}
