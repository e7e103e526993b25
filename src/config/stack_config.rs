use crate::error::ConfigError;
use crate::sources::apigateway::DEFAULT_STAGE_NAME;
use crate::sources::dynamodb::DEFAULT_CAPACITY_UNITS;
use crate::sources::lambda::MAX_TIMEOUT_SECONDS;
use crate::sources::{
    Attribute, AttributeType, BillingMode, Function, FunctionProps, RestApi, RestApiProps, Table,
    TableProps,
};
use crate::stack::Stack;
use crate::watchers::{WatchApiGatewayOptions, WatchDynamoTableOptions, WatchLambdaFunctionOptions};
use crate::watchful::{WatchScopeOptions, Watchful, WatchfulProps};
use chrono::Duration;
use log::{debug, info};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

pub const DEFAULT_STACK_NAME: &str = "WatchfulStack";
pub const DEFAULT_WATCHFUL_ID: &str = "watchful";

const NODE_HANDLER: &str = "exports.handler = async () => {};";
const PYTHON_HANDLER: &str = "def handler(event, context):\n    return None\n";

/// A stack, its watchable resources and the monitoring applied to them
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct StackConfig {
    pub stack_name: String,
    /// Construct id of the monitoring context
    pub watchful_id: String,
    pub watchful: WatchfulProps,
    /// Kinds of resource picked up automatically
    pub scope: WatchScopeOptions,
    pub tables: Vec<TableConfig>,
    pub functions: Vec<FunctionConfig>,
    pub apis: Vec<ApiConfig>,
}

impl Default for StackConfig {
    fn default() -> Self {
        Self {
            stack_name: DEFAULT_STACK_NAME.to_string(),
            watchful_id: DEFAULT_WATCHFUL_ID.to_string(),
            watchful: WatchfulProps::default(),
            scope: WatchScopeOptions::default(),
            tables: Vec::new(),
            functions: Vec::new(),
            apis: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingModeConfig {
    #[default]
    Provisioned,
    PayPerRequest,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TableConfig {
    pub id: String,
    pub table_name: Option<String>,
    pub partition_key: String,
    #[serde(default)]
    pub partition_key_type: AttributeType,
    pub sort_key: Option<String>,
    #[serde(default)]
    pub sort_key_type: AttributeType,
    #[serde(default)]
    pub billing_mode: BillingModeConfig,
    pub read_capacity: Option<u32>,
    pub write_capacity: Option<u32>,
    /// Dashboard section title, defaults to the id
    pub title: Option<String>,
    /// Watch explicitly with these options instead of through the scope
    pub watch: Option<WatchDynamoTableOptions>,
}

impl TableConfig {
    fn props(&self) -> Result<TableProps, ConfigError> {
        let billing_mode = match self.billing_mode {
            BillingModeConfig::Provisioned => BillingMode::Provisioned {
                read_capacity: self.read_capacity.unwrap_or(DEFAULT_CAPACITY_UNITS),
                write_capacity: self.write_capacity.unwrap_or(DEFAULT_CAPACITY_UNITS),
            },
            BillingModeConfig::PayPerRequest => {
                if self.read_capacity.is_some() || self.write_capacity.is_some() {
                    return Err(ConfigError::ValidationError(format!(
                        "table '{}' is pay_per_request and cannot set read/write capacity",
                        self.id
                    )));
                }
                BillingMode::PayPerRequest
            }
        };

        let mut props = TableProps::new(Attribute::new(
            self.partition_key.as_str(),
            self.partition_key_type,
        ));
        props.table_name = self.table_name.clone();
        props.sort_key = self
            .sort_key
            .as_ref()
            .map(|name| Attribute::new(name.as_str(), self.sort_key_type));
        props.billing_mode = billing_mode;
        Ok(props)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FunctionConfig {
    pub id: String,
    pub function_name: Option<String>,
    pub runtime: String,
    pub handler: String,
    /// Inline source; a no-op handler is generated for Node.js and Python runtimes
    pub code: Option<String>,
    pub timeout_seconds: Option<i64>,
    pub memory_size: Option<u32>,
    pub title: Option<String>,
    pub watch: Option<WatchLambdaFunctionOptions>,
}

impl FunctionConfig {
    fn props(&self) -> Result<FunctionProps, ConfigError> {
        let code = match &self.code {
            Some(code) => code.clone(),
            None if self.runtime.starts_with("nodejs") => NODE_HANDLER.to_string(),
            None if self.runtime.starts_with("python") => PYTHON_HANDLER.to_string(),
            None => {
                return Err(ConfigError::ValidationError(format!(
                    "function '{}' needs inline code for runtime '{}'",
                    self.id, self.runtime
                )))
            }
        };

        let mut props = FunctionProps::new(self.runtime.as_str(), self.handler.as_str(), code);
        props.function_name = self.function_name.clone();
        props.timeout = match self.timeout_seconds {
            Some(seconds) if (1..=MAX_TIMEOUT_SECONDS).contains(&seconds) => {
                Some(Duration::seconds(seconds))
            }
            Some(seconds) => {
                return Err(ConfigError::ValidationError(format!(
                    "function '{}' timeout_seconds must be between 1 and {}, got {}",
                    self.id, MAX_TIMEOUT_SECONDS, seconds
                )))
            }
            None => None,
        };
        props.memory_size = self.memory_size;
        Ok(props)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ApiConfig {
    pub id: String,
    pub rest_api_name: Option<String>,
    pub stage_name: Option<String>,
    pub description: Option<String>,
    pub title: Option<String>,
    pub watch: Option<WatchApiGatewayOptions>,
}

impl ApiConfig {
    fn props(&self) -> RestApiProps {
        RestApiProps {
            rest_api_name: self.rest_api_name.clone(),
            stage_name: self
                .stage_name
                .clone()
                .unwrap_or_else(|| DEFAULT_STAGE_NAME.to_string()),
            description: self.description.clone(),
        }
    }
}

impl StackConfig {
    /// Load a stack description from a TOML file
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ReadError` if the file cannot be read,
    /// `ConfigError::ParseError` if it is not valid TOML for a stack
    /// description, and the error from [`StackConfig::validate`] otherwise.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(format!("{}: {}", path.display(), e)))?;
        let config = Self::from_toml_str(&text).map_err(|e| match e {
            ConfigError::TomlError(e) => {
                ConfigError::ParseError(format!("{}: {}", path.display(), e))
            }
            other => other,
        })?;
        debug!(
            "Loaded {} tables, {} functions and {} APIs from {}",
            config.tables.len(),
            config.functions.len(),
            config.apis.len(),
            path.display()
        );
        Ok(config)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: StackConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check settings that can be judged without building the stack
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.stack_name.is_empty() {
            return Err(ConfigError::ValidationError(
                "stack_name must not be empty".to_string(),
            ));
        }

        let ids = std::iter::once(self.watchful_id.as_str())
            .chain(self.tables.iter().map(|t| t.id.as_str()))
            .chain(self.functions.iter().map(|f| f.id.as_str()))
            .chain(self.apis.iter().map(|a| a.id.as_str()));
        let mut seen = HashSet::new();
        for id in ids {
            if !seen.insert(id) {
                return Err(ConfigError::DuplicateConstructId(id.to_string()));
            }
        }
        Ok(())
    }

    /// Declare every resource, watch them and return the finished stack
    ///
    /// Resources with a `watch` table are watched first with those options,
    /// in file order; `watch_scope` then picks up the rest.
    pub fn build(&self) -> Result<Stack, ConfigError> {
        self.validate()?;
        let mut stack = Stack::new(self.stack_name.as_str());

        let mut tables = Vec::new();
        for config in &self.tables {
            let table = Table::new(&mut stack, &config.id, config.props()?)?;
            tables.push((config, table));
        }
        let mut functions = Vec::new();
        for config in &self.functions {
            let function = Function::new(&mut stack, &config.id, config.props()?)?;
            functions.push((config, function));
        }
        let mut apis = Vec::new();
        for config in &self.apis {
            let api = RestApi::new(&mut stack, &config.id, config.props())?;
            apis.push((config, api));
        }

        let mut watchful = Watchful::new(&mut stack, &self.watchful_id, self.watchful.clone())?;

        for (config, table) in &tables {
            if let Some(options) = &config.watch {
                let title = config.title.as_deref().unwrap_or(&config.id);
                watchful.watch_dynamo_table(&mut stack, title, table, options)?;
            }
        }
        for (config, function) in &functions {
            if let Some(options) = &config.watch {
                let title = config.title.as_deref().unwrap_or(&config.id);
                watchful.watch_lambda_function(&mut stack, title, function, options)?;
            }
        }
        for (config, api) in &apis {
            if let Some(options) = &config.watch {
                let title = config.title.as_deref().unwrap_or(&config.id);
                watchful.watch_api_gateway(&mut stack, title, api, options)?;
            }
        }
        watchful.watch_scope(&mut stack, &self.scope)?;

        info!(
            "Built stack '{}' with {} resources",
            stack.name(),
            stack.resources().len()
        );
        Ok(stack)
    }
}
