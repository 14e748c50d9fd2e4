//! SQLite destination.
//!
//! Primary keys are declared inline when a table is created since SQLite
//! cannot add constraints to an existing table; the constraint calls are
//! no-ops. Empty values are stored as NULL.

use std::path::Path;

use log::debug;
use rusqlite::{params_from_iter, Connection, OptionalExtension};

use super::{Storage, StorageResult};
use crate::model::{LookupTable, Row, Table};
use crate::sql::{CreateTable, Dialect, DropTable, DropView, Insert, LabelView, SqlDialect};

const DIALECT: Dialect = Dialect::Sqlite;

/// Storage backed by a SQLite database.
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Open or create a database file.
    pub fn open<P: AsRef<Path>>(path: P) -> StorageResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        Ok(Self {
            conn: Connection::open(path)?,
        })
    }

    pub fn open_in_memory() -> StorageResult<Self> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
        })
    }

    /// The underlying connection, for queries against stored tables.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    fn execute(&self, sql: &str) -> StorageResult<()> {
        debug!("{}", sql);
        self.conn.execute_batch(sql)?;
        Ok(())
    }
}

fn row_params(row: &Row) -> impl Iterator<Item = Option<&str>> {
    row.values().map(|v| (!v.is_empty()).then_some(v))
}

impl Storage for SqliteStorage {
    fn create_table(&mut self, table: &Table, drop_if_exists: bool) -> StorageResult<()> {
        let mut create = CreateTable::from_table(table, true);
        if drop_if_exists {
            self.execute(&DropTable::new(&table.name).to_sql(DIALECT))?;
        } else {
            create = create.if_not_exists();
        }
        self.execute(&create.to_sql(DIALECT))
    }

    fn store_row(&mut self, row: &Row) -> StorageResult<()> {
        let sql = Insert::for_row(row).to_sql(DIALECT);
        self.conn.execute(&sql, params_from_iter(row_params(row)))?;
        Ok(())
    }

    fn store_rows(&mut self, table: &Table) -> StorageResult<usize> {
        let tx = self.conn.transaction()?;
        for row in table.rows() {
            let sql = Insert::for_row(row).to_sql(DIALECT);
            let mut stmt = tx.prepare_cached(&sql)?;
            stmt.execute(params_from_iter(row_params(row)))?;
        }
        tx.commit()?;
        Ok(table.row_count())
    }

    fn add_primary_key_constraint(&mut self, table: &Table) -> StorageResult<()> {
        debug!("Primary key of '{}' is declared inline", table.name);
        Ok(())
    }

    fn add_foreign_key_constraint(&mut self, table: &Table, parent: &Table) -> StorageResult<()> {
        debug!(
            "Skipping foreign key from '{}' to '{}': not supported by SQLite",
            table.name, parent.name
        );
        Ok(())
    }

    fn create_label_view(
        &mut self,
        table: &Table,
        lookup: &LookupTable,
        suffix: &str,
    ) -> StorageResult<()> {
        let view = LabelView::new(table, lookup.name(), suffix);
        self.execute(&DropView::new(view.name()).to_sql(DIALECT))?;
        self.execute(&view.to_sql(DIALECT, lookup))
    }

    fn max_primary_key(&mut self, table: &Table) -> StorageResult<Option<u64>> {
        let sql = format!(
            "SELECT MAX({}) FROM {}",
            DIALECT.quote_identifier(&table.primary.db_name),
            DIALECT.quote_identifier(&table.name)
        );
        let max: Option<i64> = self
            .conn
            .query_row(&sql, [], |row| row.get(0))
            .optional()?
            .flatten();
        Ok(max.and_then(|k| u64::try_from(k).ok()))
    }
}
