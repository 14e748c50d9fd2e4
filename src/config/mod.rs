//! Configuration module for strata.
//!
//! Handles the workflow file, destination databases and environment
//! variable expansion.

mod connection;
mod settings;

pub use connection::{DatabaseSettings, Driver};
pub use settings::{
    expand_env_vars, GeneratedTypes, Settings, SettingsError, SettingsResult, TaskSettings,
    WorkflowSettings, DEFAULT_BATCH_SIZE, DEFAULT_CALC_FIELD_IGNORE_PATTERN,
};
