//! In-memory resource graph
//!
//! A [`Stack`] is the ordered set of CloudFormation resources declared while a
//! program runs. Constructs add resources under slash-separated paths; each
//! path maps to a logical id in the synthesized template. Nothing is ever
//! removed: the graph only grows until it is rendered with [`Stack::synth`].

use crate::cfn::CfnString;
use crate::dashboard::Dashboard;
use crate::error::{ConfigError, SynthError};
use crate::metrics::Alarm;
use crate::sources::WatchableResource;
use log::debug;
use serde_json::{json, Map, Value};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};

pub const DASHBOARD_TYPE: &str = "AWS::CloudWatch::Dashboard";
pub const ALARM_TYPE: &str = "AWS::CloudWatch::Alarm";

static NEXT_STACK_ID: AtomicU64 = AtomicU64::new(1);

/// Turn a construct path into a template logical id
///
/// Path separators and any non-alphanumeric characters are dropped, so
/// `watchful/Orders/CapacityAlarm:read` becomes `watchfulOrdersCapacityAlarmread`.
pub fn logical_id_for(path: &str) -> Result<String, ConfigError> {
    let id: String = path.chars().filter(|c| c.is_ascii_alphanumeric()).collect();
    if id.is_empty() {
        return Err(ConfigError::ValidationError(format!(
            "construct path '{}' does not contain any alphanumeric characters",
            path
        )));
    }
    Ok(id)
}

/// Typed body of a resource in the graph
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceBody {
    /// A resource whose properties are fixed when it is declared
    Raw {
        resource_type: String,
        properties: Value,
    },
    /// A dashboard that keeps accepting widgets until synthesis
    Dashboard(Dashboard),
    Alarm(Alarm),
}

impl ResourceBody {
    pub fn raw(resource_type: impl Into<String>, properties: Value) -> Self {
        ResourceBody::Raw {
            resource_type: resource_type.into(),
            properties,
        }
    }
}

/// One node of the resource graph
#[derive(Debug, Clone, PartialEq)]
pub struct CfnResource {
    logical_id: String,
    path: String,
    body: ResourceBody,
    depends_on: Vec<String>,
}

impl CfnResource {
    pub fn logical_id(&self) -> &str {
        &self.logical_id
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn body(&self) -> &ResourceBody {
        &self.body
    }

    pub fn resource_type(&self) -> &str {
        match &self.body {
            ResourceBody::Raw { resource_type, .. } => resource_type.as_str(),
            ResourceBody::Dashboard(_) => DASHBOARD_TYPE,
            ResourceBody::Alarm(_) => ALARM_TYPE,
        }
    }

    pub fn properties(&self) -> Result<Value, SynthError> {
        match &self.body {
            ResourceBody::Raw { properties, .. } => Ok(properties.clone()),
            ResourceBody::Dashboard(dashboard) => Ok(dashboard.properties()?),
            ResourceBody::Alarm(alarm) => Ok(alarm.properties()),
        }
    }

    fn render(&self) -> Result<Value, SynthError> {
        let mut out = Map::new();
        out.insert("Type".to_string(), json!(self.resource_type()));
        out.insert("Properties".to_string(), self.properties()?);
        if !self.depends_on.is_empty() {
            out.insert("DependsOn".to_string(), json!(self.depends_on));
        }
        Ok(Value::Object(out))
    }
}

/// A template output
#[derive(Debug, Clone, PartialEq)]
pub struct CfnOutput {
    pub logical_id: String,
    pub path: String,
    pub description: Option<String>,
    pub value: CfnString,
}

/// The resource graph of one stack
#[derive(Debug)]
pub struct Stack {
    id: u64,
    name: String,
    constructs: Vec<String>,
    resources: Vec<CfnResource>,
    outputs: Vec<CfnOutput>,
    sources: Vec<WatchableResource>,
}

impl Default for Stack {
    fn default() -> Self {
        Self::new("Stack")
    }
}

impl Stack {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: NEXT_STACK_ID.fetch_add(1, Ordering::Relaxed),
            name: name.into(),
            constructs: Vec::new(),
            resources: Vec::new(),
            outputs: Vec::new(),
            sources: Vec::new(),
        }
    }

    /// Process-unique identity of this stack, used to reject foreign references
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Claim a top-level construct id
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::DuplicateConstructId` if the id is taken and
    /// `ConfigError::ValidationError` if it is empty or contains `/`.
    pub fn register_construct(&mut self, id: &str) -> Result<(), ConfigError> {
        if id.is_empty() || id.contains('/') {
            return Err(ConfigError::ValidationError(format!(
                "construct id '{}' must be non-empty and must not contain '/'",
                id
            )));
        }
        if self.constructs.iter().any(|c| c == id) {
            return Err(ConfigError::DuplicateConstructId(id.to_string()));
        }
        self.constructs.push(id.to_string());
        Ok(())
    }

    /// Whether a resource or output could be added at `path`
    pub fn is_path_free(&self, path: &str) -> bool {
        let Ok(logical_id) = logical_id_for(path) else {
            return false;
        };
        !self
            .resources
            .iter()
            .any(|r| r.path == path || r.logical_id == logical_id)
            && !self.outputs.iter().any(|o| o.path == path)
    }

    /// Check that every path could be added as a resource, together
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::DuplicateConstructId` for the first path that is
    /// taken in the stack or whose logical id repeats an earlier path's.
    pub fn check_paths_free<S: AsRef<str>>(&self, paths: &[S]) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for path in paths {
            let path = path.as_ref();
            let logical_id = logical_id_for(path)?;
            if !seen.insert(logical_id) || !self.is_path_free(path) {
                return Err(ConfigError::DuplicateConstructId(path.to_string()));
            }
        }
        Ok(())
    }

    /// Whether a template output could be added at `path`
    pub fn is_output_free(&self, path: &str) -> bool {
        let Ok(logical_id) = logical_id_for(path) else {
            return false;
        };
        !self
            .outputs
            .iter()
            .any(|o| o.path == path || o.logical_id == logical_id)
            && !self.resources.iter().any(|r| r.path == path)
    }

    /// Add a resource at `path` and return its logical id
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::DuplicateConstructId` when the path or the
    /// logical id derived from it is already used.
    pub fn add_resource(&mut self, path: &str, body: ResourceBody) -> Result<String, ConfigError> {
        let logical_id = logical_id_for(path)?;
        if !self.is_path_free(path) {
            return Err(ConfigError::DuplicateConstructId(path.to_string()));
        }

        let resource = CfnResource {
            logical_id: logical_id.clone(),
            path: path.to_string(),
            body,
            depends_on: Vec::new(),
        };
        debug!(
            "Adding {} '{}' at {}",
            resource.resource_type(),
            logical_id,
            path
        );
        self.resources.push(resource);
        Ok(logical_id)
    }

    /// Record that `logical_id` must be created after `depends_on`
    pub fn add_dependency(&mut self, logical_id: &str, depends_on: &str) -> Result<(), ConfigError> {
        if self.resource(depends_on).is_none() {
            return Err(ConfigError::UnknownResource(depends_on.to_string()));
        }
        let resource = self
            .resources
            .iter_mut()
            .find(|r| r.logical_id == logical_id)
            .ok_or_else(|| ConfigError::UnknownResource(logical_id.to_string()))?;
        if !resource.depends_on.iter().any(|d| d == depends_on) {
            resource.depends_on.push(depends_on.to_string());
        }
        Ok(())
    }

    /// Add a template output at `path` and return its logical id
    pub fn add_output(
        &mut self,
        path: &str,
        description: Option<String>,
        value: CfnString,
    ) -> Result<String, ConfigError> {
        let logical_id = logical_id_for(path)?;
        if !self.is_output_free(path) {
            return Err(ConfigError::DuplicateConstructId(path.to_string()));
        }
        self.outputs.push(CfnOutput {
            logical_id: logical_id.clone(),
            path: path.to_string(),
            description,
            value,
        });
        Ok(logical_id)
    }

    /// Make a resource visible to scope-wide watching
    pub fn register_source(&mut self, source: WatchableResource) {
        self.sources.push(source);
    }

    /// Watchable resources in declaration order
    pub fn sources(&self) -> &[WatchableResource] {
        &self.sources
    }

    pub fn resources(&self) -> &[CfnResource] {
        &self.resources
    }

    pub fn outputs(&self) -> &[CfnOutput] {
        &self.outputs
    }

    pub fn resource(&self, logical_id: &str) -> Option<&CfnResource> {
        self.resources.iter().find(|r| r.logical_id == logical_id)
    }

    pub fn resources_of_type<'a>(
        &'a self,
        resource_type: &'a str,
    ) -> impl Iterator<Item = &'a CfnResource> + 'a {
        self.resources
            .iter()
            .filter(move |r| r.resource_type() == resource_type)
    }

    pub fn count_resources_of_type(&self, resource_type: &str) -> usize {
        self.resources_of_type(resource_type).count()
    }

    pub fn dashboard(&self, logical_id: &str) -> Option<&Dashboard> {
        match self.resource(logical_id).map(|r| &r.body) {
            Some(ResourceBody::Dashboard(dashboard)) => Some(dashboard),
            _ => None,
        }
    }

    pub fn dashboard_mut(&mut self, logical_id: &str) -> Option<&mut Dashboard> {
        self.resources
            .iter_mut()
            .find(|r| r.logical_id == logical_id)
            .and_then(|r| match &mut r.body {
                ResourceBody::Dashboard(dashboard) => Some(dashboard),
                _ => None,
            })
    }

    /// Every alarm in the stack, in declaration order
    pub fn alarms(&self) -> impl Iterator<Item = &Alarm> {
        self.resources.iter().filter_map(|r| match &r.body {
            ResourceBody::Alarm(alarm) => Some(alarm),
            _ => None,
        })
    }

    /// Render the graph as a CloudFormation template
    pub fn synth(&self) -> Result<Value, SynthError> {
        let mut resources = Map::new();
        for resource in &self.resources {
            resources.insert(resource.logical_id.clone(), resource.render()?);
        }

        let mut template = Map::new();
        template.insert("Resources".to_string(), Value::Object(resources));

        if !self.outputs.is_empty() {
            let mut outputs = Map::new();
            for output in &self.outputs {
                let mut rendered = Map::new();
                if let Some(description) = &output.description {
                    rendered.insert("Description".to_string(), json!(description));
                }
                rendered.insert("Value".to_string(), output.value.to_cfn());
                outputs.insert(output.logical_id.clone(), Value::Object(rendered));
            }
            template.insert("Outputs".to_string(), Value::Object(outputs));
        }

        Ok(Value::Object(template))
    }

    /// Render the template as indented JSON text
    pub fn synth_pretty(&self) -> Result<String, SynthError> {
        Ok(serde_json::to_string_pretty(&self.synth()?)?)
    }
}
