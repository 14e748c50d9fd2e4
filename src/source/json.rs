//! A data source backed by a JSON project export.
//!
//! The export document bundles everything the API would return:
//!
//! ```json
//! {
//!   "project": { "project_id": 12, "project_title": "Study", "is_longitudinal": false },
//!   "metadata": [ { "field_name": "record_id", "form_name": "enrollment", "field_type": "text" } ],
//!   "instruments": [ { "instrument_name": "enrollment", "instrument_label": "Enrollment" } ],
//!   "records": [ { "record_id": "1", "age": "34" } ]
//! }
//! ```

use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::{
    DataSource, Instrument, MetadataField, ProjectInfo, Record, RecordBatch, SourceError,
    SourceResult,
};

/// The on-disk export document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectExport {
    pub project: ProjectInfo,
    pub metadata: Vec<MetadataField>,
    pub instruments: Vec<Instrument>,
    pub records: Vec<Record>,
}

/// A [`DataSource`] over an in-memory [`ProjectExport`].
#[derive(Debug, Clone)]
pub struct JsonSource {
    export: ProjectExport,
}

impl JsonSource {
    pub fn new(export: ProjectExport) -> SourceResult<Self> {
        if export.metadata.is_empty() {
            return Err(SourceError::NoMetadata);
        }
        Ok(Self { export })
    }

    /// Load an export document from a file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> SourceResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SourceError::FileNotFound(path.to_path_buf()));
        }
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(json: &str) -> SourceResult<Self> {
        Self::new(serde_json::from_str(json)?)
    }

    fn record_id_field(&self) -> &str {
        self.export
            .metadata
            .first()
            .map(|f| f.field_name.as_str())
            .unwrap_or_default()
    }

    fn record_id_of<'a>(&self, record: &'a Record) -> Option<&'a str> {
        record.get(self.record_id_field()).map(String::as_str)
    }
}

impl DataSource for JsonSource {
    fn export_metadata(&self) -> SourceResult<Vec<MetadataField>> {
        Ok(self.export.metadata.clone())
    }

    fn export_instruments(&self) -> SourceResult<Vec<Instrument>> {
        Ok(self.export.instruments.clone())
    }

    fn project_info(&self) -> SourceResult<ProjectInfo> {
        Ok(self.export.project.clone())
    }

    fn record_id_batches(&self, batch_size: usize) -> SourceResult<Vec<Vec<String>>> {
        if batch_size == 0 {
            return Err(SourceError::InvalidBatchSize(batch_size));
        }

        let mut ids: Vec<String> = Vec::new();
        for record in &self.export.records {
            if let Some(id) = self.record_id_of(record) {
                if !ids.iter().any(|existing| existing == id) {
                    ids.push(id.to_string());
                }
            }
        }

        Ok(ids.chunks(batch_size).map(<[String]>::to_vec).collect())
    }

    fn record_batch(&self, ids: &[String]) -> SourceResult<RecordBatch> {
        let mut batch: RecordBatch = IndexMap::new();
        for id in ids {
            let group: Vec<Record> = self
                .export
                .records
                .iter()
                .filter(|record| self.record_id_of(record) == Some(id.as_str()))
                .cloned()
                .collect();
            if !group.is_empty() {
                batch.insert(id.clone(), group);
            }
        }
        Ok(batch)
    }
}
