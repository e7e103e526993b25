/// Error types for stack construction and synthesis
pub mod error;

/// CloudFormation tokens and token-bearing strings
pub mod cfn;

/// Resource graph and template synthesis
pub mod stack;

/// CloudWatch metrics and alarms
pub mod metrics;

/// Dashboard widgets and grid layout
pub mod dashboard;

/// Resources that can be watched
pub mod sources;

/// Per-resource-type monitoring plans
pub mod watchers;

/// The monitoring context
pub mod watchful;

/// Configuration management
pub mod config;

// Re-export commonly used types
pub use error::{ConfigError, SynthError};
pub use stack::Stack;
pub use watchful::{WatchScopeOptions, Watchful, WatchfulProps};
