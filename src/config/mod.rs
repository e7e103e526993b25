/// TOML description of a stack and how to watch it
pub mod stack_config;

pub use stack_config::{ApiConfig, BillingModeConfig, FunctionConfig, StackConfig, TableConfig};
