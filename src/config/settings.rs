//! TOML-based workflow configuration for strata.
//!
//! Supports a config file (strata.toml) with environment variable expansion.
//!
//! Example configuration:
//! ```toml
//! [workflow]
//! name = "study"
//!
//! [tasks.visits]
//! rules_file = "rules.txt"
//! source = "${EXPORT_DIR}/export.json"
//! batch_size = 100
//! label_views = true
//!
//! [tasks.visits.database]
//! driver = "sqlite"
//! connection_string = "out.db"
//!
//! [tasks.visits.generated_types]
//! key = "int"
//! record_id = "varchar(64)"
//! ```

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use super::connection::DatabaseSettings;
use crate::generator::GeneratorOptions;
use crate::model::ColumnType;

pub const DEFAULT_BATCH_SIZE: usize = 100;
pub const DEFAULT_CALC_FIELD_IGNORE_PATTERN: &str = "^0$";

/// Error type for settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Unsupported driver: {0}")]
    UnsupportedDriver(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type SettingsResult<T> = Result<T, SettingsError>;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    pub workflow: WorkflowSettings,

    /// Tasks in run order.
    pub tasks: IndexMap<String, TaskSettings>,

    /// Directory relative paths are resolved against. Set by
    /// [`Settings::from_file`] to the config file's directory.
    #[serde(skip)]
    pub base_dir: PathBuf,
}

/// Workflow-wide settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WorkflowSettings {
    pub name: String,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            name: "workflow".to_string(),
        }
    }
}

/// One extract-transform-load task.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TaskSettings {
    /// Transformation rules file.
    pub rules_file: String,

    /// Project export (JSON) to read records from.
    pub source: String,

    /// Number of record ids extracted per batch.
    pub batch_size: usize,

    pub table_prefix: String,

    /// Add a `<field>_label` column next to each choice field.
    pub label_fields: bool,

    /// Create a label view per table with choice fields.
    pub label_views: bool,

    /// Fail the task when the rows extracted for a batch do not cover every
    /// requested record id.
    pub extracted_record_count_check: bool,

    /// Calc field values matching this pattern do not count as data. Empty
    /// disables the check.
    pub calc_field_ignore_pattern: String,

    pub include_survey_fields: bool,
    pub include_dag_fields: bool,

    /// Drop existing tables before creating them.
    pub drop_tables: bool,

    pub database: DatabaseSettings,
    pub generated_types: GeneratedTypes,
}

impl Default for TaskSettings {
    fn default() -> Self {
        Self {
            rules_file: String::new(),
            source: String::new(),
            batch_size: DEFAULT_BATCH_SIZE,
            table_prefix: String::new(),
            label_fields: false,
            label_views: false,
            extracted_record_count_check: true,
            calc_field_ignore_pattern: DEFAULT_CALC_FIELD_IGNORE_PATTERN.to_string(),
            include_survey_fields: false,
            include_dag_fields: false,
            drop_tables: true,
            database: DatabaseSettings::default(),
            generated_types: GeneratedTypes::default(),
        }
    }
}

impl TaskSettings {
    /// Generator options for this task. `data_source` is written to the
    /// data source column of every row.
    pub fn generator_options(&self, data_source: &str) -> GeneratorOptions {
        let mut options = GeneratorOptions {
            table_prefix: self.table_prefix.clone(),
            label_fields: self.label_fields,
            data_source: data_source.to_string(),
            include_survey_fields: self.include_survey_fields,
            include_dag_fields: self.include_dag_fields,
            ..GeneratorOptions::default()
        };
        self.generated_types.apply(&mut options);
        options
    }
}

/// Overrides for the types of generated columns.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct GeneratedTypes {
    pub key: Option<ColumnType>,
    pub name: Option<ColumnType>,
    pub instance: Option<ColumnType>,
    pub suffix: Option<ColumnType>,
    pub record_id: Option<ColumnType>,
    pub label: Option<ColumnType>,
}

impl GeneratedTypes {
    fn apply(&self, options: &mut GeneratorOptions) {
        let overrides = [
            (self.key, &mut options.key_type),
            (self.name, &mut options.name_type),
            (self.instance, &mut options.instance_type),
            (self.suffix, &mut options.suffix_type),
            (self.record_id, &mut options.record_id_type),
            (self.label, &mut options.label_type),
        ];
        for (value, target) in overrides {
            if let Some(value) = value {
                *target = value;
            }
        }
    }
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> SettingsResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let mut settings = Self::from_toml(&content)?;
        settings.base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Ok(settings)
    }

    /// Parse and validate settings from TOML text.
    pub fn from_toml(content: &str) -> SettingsResult<Self> {
        let settings: Settings = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from the default config file locations.
    ///
    /// Searches in order:
    /// 1. Environment variable `STRATA_CONFIG`
    /// 2. `./strata.toml`
    /// 3. `~/.config/strata/config.toml`
    pub fn load() -> SettingsResult<Self> {
        if let Ok(path) = env::var("STRATA_CONFIG") {
            return Self::from_file(&path);
        }

        let local_config = PathBuf::from("strata.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("strata").join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        Err(SettingsError::FileNotFound(local_config))
    }

    fn validate(&self) -> SettingsResult<()> {
        if self.tasks.is_empty() {
            return Err(SettingsError::InvalidConfig(
                "no tasks are defined".to_string(),
            ));
        }
        for (name, task) in &self.tasks {
            if task.batch_size == 0 {
                return Err(SettingsError::InvalidConfig(format!(
                    "task '{}': batch_size must be greater than zero",
                    name
                )));
            }
            if task.rules_file.is_empty() || task.source.is_empty() {
                return Err(SettingsError::InvalidConfig(format!(
                    "task '{}': rules_file and source are required",
                    name
                )));
            }
        }
        Ok(())
    }

    /// Get a task by name.
    pub fn get_task(&self, name: &str) -> SettingsResult<&TaskSettings> {
        self.tasks
            .get(name)
            .ok_or_else(|| SettingsError::TaskNotFound(name.to_string()))
    }

    /// Expand environment variables in a configured path and resolve it
    /// against the config file's directory.
    pub fn resolve_path(&self, path: &str) -> SettingsResult<PathBuf> {
        let expanded = PathBuf::from(expand_env_vars(path)?);
        if expanded.is_absolute() {
            Ok(expanded)
        } else {
            Ok(self.base_dir.join(expanded))
        }
    }
}

/// Expand environment variables in a string.
///
/// Supports `${VAR}` and `$VAR` syntax.
pub fn expand_env_vars(s: &str) -> SettingsResult<String> {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            result.push(c);
            continue;
        }

        let var_name: String = if chars.next_if_eq(&'{').is_some() {
            chars.by_ref().take_while(|&ch| ch != '}').collect()
        } else {
            let mut name = String::new();
            while let Some(ch) = chars.next_if(|ch| ch.is_alphanumeric() || *ch == '_') {
                name.push(ch);
            }
            if name.is_empty() {
                // Just a lone $, keep it
                result.push('$');
                continue;
            }
            name
        };

        let value =
            env::var(&var_name).map_err(|_| SettingsError::MissingEnvVar(var_name.clone()))?;
        result.push_str(&value);
    }

    Ok(result)
}
