//! Source project abstraction.
//!
//! The transformation core never talks to the data-capture server itself.
//! It consumes a [`DataSource`], which hands out project metadata and
//! batches of records. Transport, authentication and retries belong to the
//! implementation.
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                 DataSource                   │
//! │  export_metadata()      record_id_batches()  │
//! │  export_instruments()   record_batch()       │
//! │  field_names()          is_longitudinal()    │
//! │  lookup_choices()       project_info()       │
//! │  survey_forms()                              │
//! └──────────────────────────────────────────────┘
//!          │                         │
//!          ▼                         ▼
//!   SourceCatalog              RecordBatch
//!   (schema generation)        (transformation)
//! ```

mod catalog;
mod json;
mod metadata;

pub use catalog::{SourceCatalog, SourceField};
pub use json::{JsonSource, ProjectExport};
pub use metadata::{
    checkbox_field_name, export_field_names, parse_choices, ChoiceMap, Choices, Instrument,
    MetadataField, ProjectInfo, SourceFieldType, CHECKBOX_SEPARATOR, FORM_COMPLETE_SUFFIX,
    SURVEY_TIMESTAMP_SUFFIX,
};

use std::collections::HashMap;
use std::path::PathBuf;

use indexmap::IndexMap;

/// One exported record row: field name → value. A record with events or
/// repeating instruments spans several rows.
pub type Record = HashMap<String, String>;

/// Record id → the rows of that record (its record group), in export order.
pub type RecordBatch = IndexMap<String, Vec<Record>>;

/// Errors that can occur while reading from a source.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("Source file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read source: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse source export: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Source project has no metadata")]
    NoMetadata,

    #[error("Invalid batch size: {0}")]
    InvalidBatchSize(usize),
}

pub type SourceResult<T> = Result<T, SourceError>;

/// A source of project metadata and records.
pub trait DataSource {
    /// Field definitions, in form order. The first field is the record id.
    fn export_metadata(&self) -> SourceResult<Vec<MetadataField>>;

    /// The project's instruments (forms).
    fn export_instruments(&self) -> SourceResult<Vec<Instrument>>;

    /// Project level information.
    fn project_info(&self) -> SourceResult<ProjectInfo>;

    /// Whether the project has events.
    fn is_longitudinal(&self) -> SourceResult<bool> {
        Ok(self.project_info()?.is_longitudinal)
    }

    /// Forms with a survey completion timestamp. Empty unless the project
    /// has surveys enabled.
    fn survey_forms(&self) -> SourceResult<Vec<String>> {
        if !self.project_info()?.surveys_enabled {
            return Ok(Vec::new());
        }
        Ok(self
            .export_instruments()?
            .into_iter()
            .filter(|instrument| instrument.survey_enabled)
            .map(|instrument| instrument.instrument_name)
            .collect())
    }

    /// Export field names, with checkbox options, form status fields and
    /// survey timestamps expanded.
    fn field_names(&self) -> SourceResult<Vec<String>> {
        Ok(export_field_names(
            &self.export_metadata()?,
            &self.survey_forms()?,
        ))
    }

    /// Choices of every multiple-choice field.
    fn lookup_choices(&self) -> SourceResult<ChoiceMap> {
        Ok(self
            .export_metadata()?
            .iter()
            .filter_map(|field| field.choices().map(|c| (field.field_name.clone(), c)))
            .collect())
    }

    /// All record ids, split into batches of at most `batch_size`.
    fn record_id_batches(&self, batch_size: usize) -> SourceResult<Vec<Vec<String>>>;

    /// The record groups for the given record ids.
    fn record_batch(&self, ids: &[String]) -> SourceResult<RecordBatch>;
}
