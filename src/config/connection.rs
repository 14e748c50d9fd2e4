//! Destination database configuration.
//!
//! A task names its destination with a driver and a connection string:
//!
//! ```toml
//! [tasks.visits.database]
//! driver = "sqlite"
//! connection_string = "${STUDY_DB}"
//! ```
//!
//! For `sqlite` the connection string is a database path (`:memory:` for an
//! in-memory database), for `csv` it is an output directory, and `memory`
//! ignores it.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::settings::{expand_env_vars, SettingsError};
use crate::sql::Dialect;

/// Supported storage drivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Driver {
    #[default]
    Sqlite,
    Csv,
    Memory,
}

impl Driver {
    pub fn as_str(&self) -> &'static str {
        match self {
            Driver::Sqlite => "sqlite",
            Driver::Csv => "csv",
            Driver::Memory => "memory",
        }
    }

    /// SQL dialect used for generated DDL.
    pub fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }
}

impl FromStr for Driver {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sqlite" | "sqlite3" => Ok(Driver::Sqlite),
            "csv" => Ok(Driver::Csv),
            "memory" | "mem" => Ok(Driver::Memory),
            other => Err(SettingsError::UnsupportedDriver(other.to_string())),
        }
    }
}

impl fmt::Display for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Destination of a task.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct DatabaseSettings {
    #[serde(default)]
    pub driver: Driver,

    /// Connection string (supports ${ENV_VAR} expansion).
    #[serde(default)]
    pub connection_string: String,
}

impl DatabaseSettings {
    pub fn new(driver: Driver, connection_string: impl Into<String>) -> Self {
        Self {
            driver,
            connection_string: connection_string.into(),
        }
    }

    /// Get the connection string with environment variables expanded.
    pub fn resolved_connection_string(&self) -> Result<String, SettingsError> {
        expand_env_vars(&self.connection_string)
    }

    /// Identity of the destination. Tasks with equal identities write into
    /// the same database.
    pub fn identity(&self) -> Result<(Driver, String), SettingsError> {
        let connection = match self.driver {
            Driver::Memory => String::new(),
            _ => self.resolved_connection_string()?,
        };
        Ok((self.driver, connection))
    }
}
