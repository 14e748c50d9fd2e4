//! Destination storage.
//!
//! A [`Storage`] receives table definitions and the rows buffered in a
//! [`Table`] after each batch. Three connectors are provided:
//!
//! - [`SqliteStorage`] - a SQLite database file (or in-memory database)
//! - [`CsvStorage`] - one CSV file per table in a directory
//! - [`MemoryStorage`] - tables held in memory, for tests and dry runs

mod csv;
mod memory;
mod sqlite;

pub use self::csv::CsvStorage;
pub use memory::{MemoryStorage, StoredTable};
pub use sqlite::SqliteStorage;

use std::path::PathBuf;

use crate::config::Driver;
use crate::model::{LookupTable, Row, Table};

/// Errors that can occur while storing tables.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] ::csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Table '{0}' has not been created")]
    UnknownTable(String),

    #[error("Table '{table}' has no column '{column}'")]
    UnknownColumn { table: String, column: String },
}

pub type StorageResult<T> = Result<T, StorageError>;

/// A destination for generated tables and their rows.
pub trait Storage {
    /// Create a table, dropping an existing one first when asked.
    fn create_table(&mut self, table: &Table, drop_if_exists: bool) -> StorageResult<()>;

    fn store_row(&mut self, row: &Row) -> StorageResult<()>;

    /// Store every row buffered in a table. Returns the number of rows
    /// stored. The buffer itself is left for the caller to clear.
    fn store_rows(&mut self, table: &Table) -> StorageResult<usize> {
        for row in table.rows() {
            self.store_row(row)?;
        }
        Ok(table.row_count())
    }

    fn add_primary_key_constraint(&mut self, table: &Table) -> StorageResult<()>;

    fn add_foreign_key_constraint(&mut self, table: &Table, parent: &Table) -> StorageResult<()>;

    /// Create `<table><suffix>`, showing choice labels in place of codes.
    fn create_label_view(
        &mut self,
        table: &Table,
        lookup: &LookupTable,
        suffix: &str,
    ) -> StorageResult<()>;

    /// Largest primary key stored for a table, if it has any rows.
    fn max_primary_key(&mut self, table: &Table) -> StorageResult<Option<u64>>;
}

/// Open the storage for a driver. `connection` is the resolved
/// connection string.
pub fn connect(driver: Driver, connection: &str) -> StorageResult<Box<dyn Storage>> {
    Ok(match driver {
        Driver::Sqlite if connection.is_empty() || connection == ":memory:" => {
            Box::new(SqliteStorage::open_in_memory()?)
        }
        Driver::Sqlite => Box::new(SqliteStorage::open(connection)?),
        Driver::Csv => Box::new(CsvStorage::new(PathBuf::from(connection))?),
        Driver::Memory => Box::new(MemoryStorage::new()),
    })
}

/// Parse a stored primary key value.
fn parse_key(value: &str) -> Option<u64> {
    value.trim().parse().ok()
}
