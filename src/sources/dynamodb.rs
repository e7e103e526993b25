use crate::cfn::{CfnString, Token};
use crate::error::ConfigError;
use crate::metrics::Dimension;
use crate::sources::{MetricSource, WatchableResource};
use crate::stack::{ResourceBody, Stack};
use log::info;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

pub const TABLE_TYPE: &str = "AWS::DynamoDB::Table";

/// Capacity units used when a provisioned table does not specify any
pub const DEFAULT_CAPACITY_UNITS: u32 = 5;

/// Scalar type of a key attribute
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum AttributeType {
    #[default]
    String,
    Number,
    Binary,
}

impl AttributeType {
    fn as_cfn(&self) -> &'static str {
        match self {
            AttributeType::String => "S",
            AttributeType::Number => "N",
            AttributeType::Binary => "B",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub attribute_type: AttributeType,
}

impl Attribute {
    pub fn new(name: impl Into<String>, attribute_type: AttributeType) -> Self {
        Self {
            name: name.into(),
            attribute_type,
        }
    }
}

/// How a table pays for throughput
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BillingMode {
    Provisioned { read_capacity: u32, write_capacity: u32 },
    PayPerRequest,
}

impl Default for BillingMode {
    fn default() -> Self {
        BillingMode::Provisioned {
            read_capacity: DEFAULT_CAPACITY_UNITS,
            write_capacity: DEFAULT_CAPACITY_UNITS,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableProps {
    /// Physical name; CloudFormation generates one when absent
    pub table_name: Option<String>,
    pub partition_key: Attribute,
    pub sort_key: Option<Attribute>,
    pub billing_mode: BillingMode,
}

impl TableProps {
    pub fn new(partition_key: Attribute) -> Self {
        Self {
            table_name: None,
            partition_key,
            sort_key: None,
            billing_mode: BillingMode::default(),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.partition_key.name.is_empty() {
            return Err(ConfigError::ValidationError(
                "table partition key name must not be empty".to_string(),
            ));
        }
        if let Some(sort_key) = &self.sort_key {
            if sort_key.name.is_empty() || sort_key.name == self.partition_key.name {
                return Err(ConfigError::ValidationError(format!(
                    "table sort key '{}' must be non-empty and differ from the partition key",
                    sort_key.name
                )));
            }
        }
        if let BillingMode::Provisioned {
            read_capacity,
            write_capacity,
        } = self.billing_mode
        {
            if read_capacity == 0 || write_capacity == 0 {
                return Err(ConfigError::ValidationError(
                    "provisioned table capacity must be at least 1 unit".to_string(),
                ));
            }
        }
        if matches!(&self.table_name, Some(name) if name.is_empty()) {
            return Err(ConfigError::ValidationError(
                "table name must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    fn properties(&self) -> Value {
        let mut keys = vec![&self.partition_key];
        keys.extend(self.sort_key.as_ref());

        let key_schema: Vec<Value> = keys
            .iter()
            .enumerate()
            .map(|(i, key)| {
                let key_type = if i == 0 { "HASH" } else { "RANGE" };
                json!({ "AttributeName": key.name, "KeyType": key_type })
            })
            .collect();
        let attributes: Vec<Value> = keys
            .iter()
            .map(|key| {
                json!({
                    "AttributeName": key.name,
                    "AttributeType": key.attribute_type.as_cfn(),
                })
            })
            .collect();

        let mut props = Map::new();
        props.insert("KeySchema".to_string(), Value::Array(key_schema));
        props.insert("AttributeDefinitions".to_string(), Value::Array(attributes));
        match self.billing_mode {
            BillingMode::Provisioned {
                read_capacity,
                write_capacity,
            } => {
                props.insert(
                    "ProvisionedThroughput".to_string(),
                    json!({
                        "ReadCapacityUnits": read_capacity,
                        "WriteCapacityUnits": write_capacity,
                    }),
                );
            }
            BillingMode::PayPerRequest => {
                props.insert("BillingMode".to_string(), json!("PAY_PER_REQUEST"));
            }
        }
        if let Some(name) = &self.table_name {
            props.insert("TableName".to_string(), json!(name));
        }
        Value::Object(props)
    }
}

/// Reference to a DynamoDB table declared in a stack
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    stack_id: u64,
    node_id: String,
    logical_id: String,
    table_name: CfnString,
    billing_mode: BillingMode,
}

impl Table {
    /// Declare a table in `stack`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the id is taken or the key/capacity settings
    /// are invalid.
    pub fn new(stack: &mut Stack, id: &str, props: TableProps) -> Result<Self, ConfigError> {
        props.validate()?;
        stack.register_construct(id)?;
        let logical_id = stack.add_resource(id, ResourceBody::raw(TABLE_TYPE, props.properties()))?;

        let table_name = match &props.table_name {
            Some(name) => CfnString::literal(name.as_str()),
            None => CfnString::token(Token::reference(&logical_id)),
        };

        let table = Self {
            stack_id: stack.id(),
            node_id: id.to_string(),
            logical_id,
            table_name,
            billing_mode: props.billing_mode,
        };
        info!("Declared DynamoDB table '{}'", id);
        stack.register_source(WatchableResource::DynamoTable(table.clone()));
        Ok(table)
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

    pub fn table_name(&self) -> &CfnString {
        &self.table_name
    }

    pub fn billing_mode(&self) -> BillingMode {
        self.billing_mode
    }

    /// Provisioned (read, write) capacity units, `None` for on-demand tables
    pub fn provisioned_capacity(&self) -> Option<(u32, u32)> {
        match self.billing_mode {
            BillingMode::Provisioned {
                read_capacity,
                write_capacity,
            } => Some((read_capacity, write_capacity)),
            BillingMode::PayPerRequest => None,
        }
    }

    /// Link to the table in the DynamoDB console
    pub fn console_url(&self) -> CfnString {
        CfnString::literal("https://console.aws.amazon.com/dynamodb/home?region=")
            .with_token(Token::Region)
            .with_str("#tables:selected=")
            .with(&self.table_name)
            .with_str(";tab=overview")
    }
}

impl MetricSource for Table {
    fn namespace(&self) -> &'static str {
        "AWS/DynamoDB"
    }

    fn dimensions(&self) -> Vec<Dimension> {
        vec![Dimension::new("TableName", self.table_name.clone())]
    }
}
