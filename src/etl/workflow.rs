//! Workflows: several tasks run in order.
//!
//! Tasks that write into the same database are run as a group. Their
//! schemas are merged so each shared table is created once with the union
//! of the fields, and each task continues key assignment after the rows
//! stored by the tasks before it.

use indexmap::IndexMap;
use log::info;

use super::load;
use super::task::{Task, TaskReport};
use super::EtlResult;
use crate::config::{DatabaseSettings, Driver, Settings};
use crate::model::{merge, Schema};
use crate::storage::{self, Storage};

/// Where a task's rows go: driver and resolved connection string.
pub type Destination = (Driver, String);

/// An ordered list of tasks.
#[derive(Debug, Default)]
pub struct Workflow {
    name: String,
    tasks: Vec<(Task, Destination)>,
}

impl Workflow {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tasks: Vec::new(),
        }
    }

    /// Build every configured task.
    pub fn from_settings(settings: &Settings) -> EtlResult<Self> {
        let mut workflow = Self::new(&settings.workflow.name);
        for name in settings.tasks.keys() {
            let task = Task::from_settings(name, settings)?;
            let destination = resolve_destination(settings, &task.settings().database)?;
            workflow.add_task(task, destination);
        }
        Ok(workflow)
    }

    pub fn add_task(&mut self, task: Task, destination: Destination) {
        self.tasks.push((task, destination));
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter().map(|(task, _)| task)
    }

    /// Run every task, opening one storage per destination.
    pub fn run(&self) -> EtlResult<Vec<TaskReport>> {
        let mut groups: IndexMap<&Destination, Vec<&Task>> = IndexMap::new();
        for (task, destination) in &self.tasks {
            groups.entry(destination).or_default().push(task);
        }

        let mut reports = Vec::new();
        for ((driver, connection), tasks) in groups {
            info!(
                "Workflow '{}': {} task(s) into {} '{}'",
                self.name,
                tasks.len(),
                driver,
                connection
            );
            let mut storage = storage::connect(*driver, connection)?;
            reports.extend(run_group(&tasks, storage.as_mut())?);
        }
        Ok(reports)
    }

    /// Run every task as one group into the given storage, whatever their
    /// configured destinations.
    pub fn run_with_storage(&self, storage: &mut dyn Storage) -> EtlResult<Vec<TaskReport>> {
        let tasks: Vec<&Task> = self.tasks().collect();
        run_group(&tasks, storage)
    }
}

/// Expand the connection string and resolve file destinations against the
/// config file's directory.
fn resolve_destination(
    settings: &Settings,
    database: &DatabaseSettings,
) -> EtlResult<Destination> {
    let (driver, connection) = database.identity()?;
    let connection = match driver {
        Driver::Memory => connection,
        Driver::Sqlite if connection.is_empty() || connection == ":memory:" => connection,
        Driver::Sqlite | Driver::Csv => settings
            .resolve_path(&connection)?
            .to_string_lossy()
            .into_owned(),
    };
    Ok((driver, connection))
}

/// Generate and merge the schemas of tasks sharing a storage, create the
/// merged tables, then run each task in order.
fn run_group(tasks: &[&Task], storage: &mut dyn Storage) -> EtlResult<Vec<TaskReport>> {
    let Some(first) = tasks.first() else {
        return Ok(Vec::new());
    };

    let mut schemas = tasks
        .iter()
        .map(|task| task.generate_schema())
        .collect::<EtlResult<Vec<Schema>>>()?;

    let mut merged = schemas[0].clone();
    for schema in &schemas[1..] {
        merged = merge(&merged, schema)?;
    }

    let mut options = first.create_options();
    options.label_views = tasks.iter().any(|t| t.settings().label_views);
    load::create_tables(&merged, storage, options)?;
    load::store_system_rows(&mut merged, storage)?;

    let mut reports = Vec::with_capacity(tasks.len());
    for (task, schema) in tasks.iter().zip(schemas.iter_mut()) {
        reports.push(task.run(schema, storage)?);
    }
    Ok(reports)
}
