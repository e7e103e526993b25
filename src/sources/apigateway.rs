use crate::cfn::{CfnString, Token};
use crate::error::ConfigError;
use crate::metrics::Dimension;
use crate::sources::{MetricSource, WatchableResource};
use crate::stack::{ResourceBody, Stack};
use log::info;
use serde_json::{json, Map, Value};

pub const REST_API_TYPE: &str = "AWS::ApiGateway::RestApi";
pub const DEPLOYMENT_TYPE: &str = "AWS::ApiGateway::Deployment";

pub const DEFAULT_STAGE_NAME: &str = "prod";

#[derive(Debug, Clone, PartialEq)]
pub struct RestApiProps {
    /// Name reported in the `ApiName` metric dimension; defaults to the construct id
    pub rest_api_name: Option<String>,
    pub stage_name: String,
    pub description: Option<String>,
}

impl Default for RestApiProps {
    fn default() -> Self {
        Self {
            rest_api_name: None,
            stage_name: DEFAULT_STAGE_NAME.to_string(),
            description: None,
        }
    }
}

impl RestApiProps {
    fn validate(&self) -> Result<(), ConfigError> {
        let valid_stage = !self.stage_name.is_empty()
            && self
                .stage_name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid_stage {
            return Err(ConfigError::ValidationError(format!(
                "stage name '{}' may only contain letters, digits, '-' and '_'",
                self.stage_name
            )));
        }
        if matches!(&self.rest_api_name, Some(name) if name.is_empty()) {
            return Err(ConfigError::ValidationError(
                "REST API name must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Reference to an API Gateway REST API and its deployment stage
#[derive(Debug, Clone, PartialEq)]
pub struct RestApi {
    stack_id: u64,
    node_id: String,
    logical_id: String,
    rest_api_name: String,
    stage_name: String,
}

impl RestApi {
    /// Declare a REST API with a deployment to `props.stage_name`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the id is taken or the stage name is invalid.
    pub fn new(stack: &mut Stack, id: &str, props: RestApiProps) -> Result<Self, ConfigError> {
        props.validate()?;
        stack.register_construct(id)?;

        let rest_api_name = props.rest_api_name.clone().unwrap_or_else(|| id.to_string());

        let mut properties = Map::new();
        properties.insert("Name".to_string(), json!(rest_api_name));
        if let Some(description) = &props.description {
            properties.insert("Description".to_string(), json!(description));
        }
        let logical_id =
            stack.add_resource(id, ResourceBody::raw(REST_API_TYPE, Value::Object(properties)))?;

        stack.add_resource(
            &format!("{}/Deployment", id),
            ResourceBody::raw(
                DEPLOYMENT_TYPE,
                json!({
                    "RestApiId": { "Ref": logical_id },
                    "StageName": props.stage_name,
                }),
            ),
        )?;

        let api = Self {
            stack_id: stack.id(),
            node_id: id.to_string(),
            logical_id,
            rest_api_name,
            stage_name: props.stage_name,
        };
        info!("Declared REST API '{}' (stage {})", id, api.stage_name);
        stack.register_source(WatchableResource::ApiGateway(api.clone()));
        Ok(api)
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

    pub fn rest_api_name(&self) -> &str {
        &self.rest_api_name
    }

    pub fn stage_name(&self) -> &str {
        &self.stage_name
    }

    pub fn console_url(&self) -> CfnString {
        CfnString::literal("https://console.aws.amazon.com/apigateway/home?region=")
            .with_token(Token::Region)
            .with_str("#/apis/")
            .with_token(Token::reference(&self.logical_id))
            .with_str(&format!("/stages/{}", self.stage_name))
    }
}

impl MetricSource for RestApi {
    fn namespace(&self) -> &'static str {
        "AWS/ApiGateway"
    }

    fn dimensions(&self) -> Vec<Dimension> {
        vec![
            Dimension::new("ApiName", self.rest_api_name.as_str()),
            Dimension::new("Stage", self.stage_name.as_str()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rest_api_defaults() {
        let mut stack = Stack::default();
        let api = RestApi::new(&mut stack, "Api", RestApiProps::default()).unwrap();

        assert_eq!(api.rest_api_name(), "Api");
        assert_eq!(api.stage_name(), "prod");

        let template = stack.synth().unwrap();
        assert_eq!(template["Resources"]["Api"]["Properties"]["Name"], "Api");
        assert_eq!(
            template["Resources"]["ApiDeployment"]["Properties"],
            json!({ "RestApiId": { "Ref": "Api" }, "StageName": "prod" })
        );
    }

    #[test]
    fn test_dimensions_are_literal() {
        let mut stack = Stack::default();
        let props = RestApiProps {
            rest_api_name: Some("orders-api".to_string()),
            stage_name: "v1".to_string(),
            description: Some("Orders".to_string()),
        };
        let api = RestApi::new(&mut stack, "Api", props).unwrap();

        let dimensions = api.dimensions();
        assert_eq!(dimensions[0].name, "ApiName");
        assert_eq!(dimensions[0].value.as_literal(), Some("orders-api"));
        assert_eq!(dimensions[1].name, "Stage");
        assert_eq!(dimensions[1].value.as_literal(), Some("v1"));
        assert_eq!(
            api.console_url().to_string(),
            "https://console.aws.amazon.com/apigateway/home?region=${AWS::Region}#/apis/${Ref:Api}/stages/v1"
        );
    }

    #[test]
    fn test_invalid_stage_name() {
        let mut stack = Stack::default();
        let props = RestApiProps {
            stage_name: "prod stage".to_string(),
            ..RestApiProps::default()
        };
        assert!(RestApi::new(&mut stack, "Api", props).is_err());
        assert!(stack.resources().is_empty());
    }
}
