use thiserror::Error;

/// Errors raised while declaring monitored resources
///
/// Every failure in this crate is a build-time configuration problem: the
/// options handed to a construct contradict each other or reference something
/// that is not part of the stack being built.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Dashboard name is provided but dashboard creation is disabled")]
    DashboardNameWithoutDashboard,

    #[error("Invalid configuration value: {0}")]
    ValidationError(String),

    #[error("There is already a construct with id '{0}' in this stack")]
    DuplicateConstructId(String),

    #[error("Resource '{0}' is not part of this stack")]
    UnknownResource(String),

    #[error("Failed to read config file: {0}")]
    ReadError(String),

    #[error("Failed to parse config: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),
}

/// Errors that can occur while rendering a stack into a template
#[derive(Error, Debug)]
pub enum SynthError {
    #[error("Failed to serialize template: {0}")]
    Serialization(#[from] serde_json::Error),
}
