//! A single extract-transform-load task.

use std::fs;

use log::{debug, info, warn};

use super::load::{self, CreateOptions};
use super::run_log::RunLog;
use super::{EtlError, EtlResult};
use crate::config::{Settings, TaskSettings};
use crate::generator::{generate_from_source, GenerationStatus};
use crate::model::{RowPolicy, Schema};
use crate::source::{DataSource, JsonSource, SourceCatalog};
use crate::storage::Storage;
use crate::transform::Transformer;

/// Counts from one task run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskReport {
    pub task: String,
    pub batches: usize,
    pub record_groups: usize,
    pub rows: usize,
}

/// A rules document applied to one data source.
pub struct Task {
    name: String,
    settings: TaskSettings,
    source: Box<dyn DataSource>,
    rules: String,
}

impl Task {
    pub fn new(
        name: impl Into<String>,
        settings: TaskSettings,
        source: Box<dyn DataSource>,
        rules: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            settings,
            source,
            rules: rules.into(),
        }
    }

    /// Load the rules file and source export named by a configured task.
    pub fn from_settings(name: &str, settings: &Settings) -> EtlResult<Self> {
        let task = settings.get_task(name)?;

        let rules_path = settings.resolve_path(&task.rules_file)?;
        let rules = fs::read_to_string(&rules_path).map_err(|source| EtlError::RulesFile {
            path: rules_path.clone(),
            source,
        })?;
        let source = JsonSource::from_file(settings.resolve_path(&task.source)?)?;

        Ok(Self::new(name, task.clone(), Box::new(source), rules))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn settings(&self) -> &TaskSettings {
        &self.settings
    }

    pub fn create_options(&self) -> CreateOptions {
        CreateOptions {
            drop_tables: self.settings.drop_tables,
            label_views: self.settings.label_views,
        }
    }

    /// Generate the task's schema. Rule errors are fatal; unmapped fields
    /// are logged as warnings.
    pub fn generate_schema(&self) -> EtlResult<Schema> {
        let options = self.settings.generator_options(&self.name);
        let result = generate_from_source(self.source.as_ref(), &self.rules, &options)?;

        match (result.status, result.schema) {
            (GenerationStatus::Error, _) | (_, None) => Err(EtlError::Generation {
                task: self.name.clone(),
                message: result.message,
            }),
            (status, Some(schema)) => {
                if status == GenerationStatus::Warning {
                    for line in result.message.lines() {
                        warn!("Task '{}': {}", self.name, line);
                    }
                }
                Ok(schema)
            }
        }
    }

    /// Record id field, task identifier and calc field pattern for rows.
    pub fn row_policy(&self) -> EtlResult<RowPolicy> {
        let catalog = SourceCatalog::fetch(self.source.as_ref())?;
        let policy = RowPolicy::new(catalog.record_id(), &self.name)
            .with_calc_ignore(&self.settings.calc_field_ignore_pattern)?;
        Ok(policy)
    }

    /// Generate, create tables and run into a storage of its own.
    pub fn execute(&self, storage: &mut dyn Storage) -> EtlResult<TaskReport> {
        let mut schema = self.generate_schema()?;
        load::create_tables(&schema, storage, self.create_options())?;
        load::store_system_rows(&mut schema, storage)?;
        self.run(&mut schema, storage)
    }

    /// Extract every batch, transform it into `schema` and store the rows.
    ///
    /// Tables must already exist. The lookup, project info and metadata
    /// rows of `schema` are not stored here.
    pub fn run(&self, schema: &mut Schema, storage: &mut dyn Storage) -> EtlResult<TaskReport> {
        let policy = self.row_policy()?;
        load::seed_keys(schema, storage)?;

        let project = self.source.project_info()?;
        let log = RunLog::start(schema, storage, &self.name, project.project_id)?;
        log.event(schema, storage, &format!("Starting task '{}'", self.name))?;

        match self.run_batches(schema, storage, policy) {
            Ok(report) => {
                let message = format!(
                    "Task '{}' processed {} record(s) into {} row(s)",
                    self.name, report.record_groups, report.rows
                );
                log.event(schema, storage, &message)?;
                Ok(report)
            }
            Err(err) => {
                schema.clear_rows();
                let message = format!("Task '{}' failed: {}", self.name, err);
                if let Err(log_err) = log.event(schema, storage, &message) {
                    warn!("Could not write to the run log: {}", log_err);
                }
                Err(err)
            }
        }
    }

    fn run_batches(
        &self,
        schema: &mut Schema,
        storage: &mut dyn Storage,
        policy: RowPolicy,
    ) -> EtlResult<TaskReport> {
        let mut transformer = Transformer::new(policy);
        let mut report = TaskReport {
            task: self.name.clone(),
            ..TaskReport::default()
        };

        let batches = self.source.record_id_batches(self.settings.batch_size)?;
        info!(
            "Task '{}': {} batch(es) of up to {} record(s)",
            self.name,
            batches.len(),
            self.settings.batch_size
        );

        for ids in &batches {
            let batch = self.source.record_batch(ids)?;
            if self.settings.extracted_record_count_check && batch.len() != ids.len() {
                return Err(EtlError::RecordCount {
                    task: self.name.clone(),
                    expected: ids.len(),
                    actual: batch.len(),
                });
            }

            report.record_groups += transformer.process_batch(schema, &batch)?;
            let rows = load::store_data_rows(schema, storage)?;
            report.rows += rows;
            report.batches += 1;
            debug!(
                "Task '{}': batch {} stored {} row(s)",
                self.name, report.batches, rows
            );
        }

        Ok(report)
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.name)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}
