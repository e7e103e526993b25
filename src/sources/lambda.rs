use crate::cfn::{CfnString, Token};
use crate::error::ConfigError;
use crate::metrics::Dimension;
use crate::sources::{MetricSource, WatchableResource};
use crate::stack::{ResourceBody, Stack};
use chrono::Duration;
use log::info;
use serde_json::{json, Map, Value};

pub const FUNCTION_TYPE: &str = "AWS::Lambda::Function";
pub const ROLE_TYPE: &str = "AWS::IAM::Role";

/// Timeout Lambda applies when a function does not set one
pub const DEFAULT_TIMEOUT_SECONDS: i64 = 3;

/// Longest timeout Lambda accepts
pub const MAX_TIMEOUT_SECONDS: i64 = 900;

const BASIC_EXECUTION_POLICY: &str =
    "arn:aws:iam::aws:policy/service-role/AWSLambdaBasicExecutionRole";

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionProps {
    /// Physical name; CloudFormation generates one when absent
    pub function_name: Option<String>,
    pub runtime: String,
    pub handler: String,
    /// Inline source code
    pub code: String,
    pub timeout: Option<Duration>,
    pub memory_size: Option<u32>,
}

impl FunctionProps {
    pub fn new(
        runtime: impl Into<String>,
        handler: impl Into<String>,
        code: impl Into<String>,
    ) -> Self {
        Self {
            function_name: None,
            runtime: runtime.into(),
            handler: handler.into(),
            code: code.into(),
            timeout: None,
            memory_size: None,
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.runtime.is_empty() || self.handler.is_empty() {
            return Err(ConfigError::ValidationError(
                "function runtime and handler must not be empty".to_string(),
            ));
        }
        if let Some(timeout) = self.timeout {
            let seconds = timeout.num_seconds();
            if !(1..=MAX_TIMEOUT_SECONDS).contains(&seconds) {
                return Err(ConfigError::ValidationError(format!(
                    "function timeout must be between 1 and {} seconds, got {}",
                    MAX_TIMEOUT_SECONDS, seconds
                )));
            }
        }
        if let Some(memory) = self.memory_size {
            if !(128..=10240).contains(&memory) {
                return Err(ConfigError::ValidationError(format!(
                    "function memory size must be between 128 and 10240 MB, got {}",
                    memory
                )));
            }
        }
        Ok(())
    }
}

/// Reference to a Lambda function declared in a stack
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    stack_id: u64,
    node_id: String,
    logical_id: String,
    function_name: CfnString,
    timeout: Duration,
}

impl Function {
    /// Declare a function and its execution role in `stack`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the id is taken or the runtime settings are invalid.
    pub fn new(stack: &mut Stack, id: &str, props: FunctionProps) -> Result<Self, ConfigError> {
        props.validate()?;
        stack.register_construct(id)?;

        let role = stack.add_resource(
            &format!("{}/ServiceRole", id),
            ResourceBody::raw(
                ROLE_TYPE,
                json!({
                    "AssumeRolePolicyDocument": {
                        "Statement": [{
                            "Action": "sts:AssumeRole",
                            "Effect": "Allow",
                            "Principal": { "Service": "lambda.amazonaws.com" }
                        }],
                        "Version": "2012-10-17"
                    },
                    "ManagedPolicyArns": [BASIC_EXECUTION_POLICY]
                }),
            ),
        )?;

        let timeout = props
            .timeout
            .unwrap_or_else(|| Duration::seconds(DEFAULT_TIMEOUT_SECONDS));

        let mut properties = Map::new();
        properties.insert("Code".to_string(), json!({ "ZipFile": props.code }));
        properties.insert("Handler".to_string(), json!(props.handler));
        properties.insert("Runtime".to_string(), json!(props.runtime));
        properties.insert(
            "Role".to_string(),
            Token::attribute(&role, "Arn").to_cfn(),
        );
        if props.timeout.is_some() {
            properties.insert("Timeout".to_string(), json!(timeout.num_seconds()));
        }
        if let Some(memory) = props.memory_size {
            properties.insert("MemorySize".to_string(), json!(memory));
        }
        if let Some(name) = &props.function_name {
            properties.insert("FunctionName".to_string(), json!(name));
        }

        let logical_id =
            stack.add_resource(id, ResourceBody::raw(FUNCTION_TYPE, Value::Object(properties)))?;
        stack.add_dependency(&logical_id, &role)?;

        let function_name = match &props.function_name {
            Some(name) => CfnString::literal(name.as_str()),
            None => CfnString::token(Token::reference(&logical_id)),
        };

        let function = Self {
            stack_id: stack.id(),
            node_id: id.to_string(),
            logical_id,
            function_name,
            timeout,
        };
        info!("Declared Lambda function '{}'", id);
        stack.register_source(WatchableResource::LambdaFunction(function.clone()));
        Ok(function)
    }

    pub fn stack_id(&self) -> u64 {
        self.stack_id
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn logical_id(&self) -> &str {
        &self.logical_id
    }

    pub fn function_name(&self) -> &CfnString {
        &self.function_name
    }

    /// Effective timeout, Lambda's default when none was configured
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn console_url(&self) -> CfnString {
        CfnString::literal("https://console.aws.amazon.com/lambda/home?region=")
            .with_token(Token::Region)
            .with_str("#/functions/")
            .with(&self.function_name)
            .with_str("?tab=graph")
    }

    pub fn logs_url(&self) -> CfnString {
        CfnString::literal("https://console.aws.amazon.com/cloudwatch/home?region=")
            .with_token(Token::Region)
            .with_str("#logStream:group=/aws/lambda/")
            .with(&self.function_name)
    }
}

impl MetricSource for Function {
    fn namespace(&self) -> &'static str {
        "AWS/Lambda"
    }

    fn dimensions(&self) -> Vec<Dimension> {
        vec![Dimension::new("FunctionName", self.function_name.clone())]
    }
}
