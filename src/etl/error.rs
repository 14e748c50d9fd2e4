use std::path::PathBuf;

use crate::config::SettingsError;
use crate::model::MergeError;
use crate::source::SourceError;
use crate::storage::StorageError;
use crate::transform::TransformError;

/// Errors that stop a task or workflow.
#[derive(Debug, thiserror::Error)]
pub enum EtlError {
    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Transform(#[from] TransformError),

    #[error("Schema merge failed: {0}")]
    Merge(#[from] MergeError),

    #[error("Failed to read rules file {path}: {source}")]
    RulesFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid calc field ignore pattern: {0}")]
    CalcPattern(#[from] regex::Error),

    #[error("Schema generation failed for task '{task}':\n{message}")]
    Generation { task: String, message: String },

    #[error(
        "Task '{task}': {actual} record(s) extracted for a batch of {expected} record id(s)"
    )]
    RecordCount {
        task: String,
        expected: usize,
        actual: usize,
    },
}

pub type EtlResult<T> = Result<T, EtlError>;
