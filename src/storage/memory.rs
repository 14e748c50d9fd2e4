use indexmap::{IndexMap, IndexSet};

use super::{parse_key, Storage, StorageError, StorageResult};
use crate::model::{LookupTable, Row, Table};

/// A table held by [`MemoryStorage`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoredTable {
    pub columns: Vec<String>,
    pub primary_key: String,
    pub rows: Vec<Row>,
    pub has_primary_key_constraint: bool,
    /// Parent tables referenced by foreign key constraints.
    pub references: Vec<String>,
}

/// Storage that keeps tables in memory.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    tables: IndexMap<String, StoredTable>,
    views: IndexSet<String>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table(&self, name: &str) -> Option<&StoredTable> {
        self.tables.get(name)
    }

    /// Stored rows of a table; empty for unknown tables.
    pub fn rows(&self, name: &str) -> &[Row] {
        self.tables
            .get(name)
            .map(|t| t.rows.as_slice())
            .unwrap_or_default()
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    pub fn has_view(&self, name: &str) -> bool {
        self.views.contains(name)
    }

    fn stored_mut(&mut self, name: &str) -> StorageResult<&mut StoredTable> {
        self.tables
            .get_mut(name)
            .ok_or_else(|| StorageError::UnknownTable(name.to_string()))
    }
}

impl Storage for MemoryStorage {
    fn create_table(&mut self, table: &Table, drop_if_exists: bool) -> StorageResult<()> {
        if !drop_if_exists && self.tables.contains_key(&table.name) {
            return Ok(());
        }
        let stored = StoredTable {
            columns: table.column_names().into_iter().map(String::from).collect(),
            primary_key: table.primary.db_name.clone(),
            ..StoredTable::default()
        };
        self.tables.insert(table.name.clone(), stored);
        Ok(())
    }

    fn store_row(&mut self, row: &Row) -> StorageResult<()> {
        let stored = self.stored_mut(&row.table)?;
        if let Some(column) = row.values.keys().find(|c| !stored.columns.contains(c)) {
            return Err(StorageError::UnknownColumn {
                table: row.table.clone(),
                column: column.clone(),
            });
        }
        stored.rows.push(row.clone());
        Ok(())
    }

    fn add_primary_key_constraint(&mut self, table: &Table) -> StorageResult<()> {
        self.stored_mut(&table.name)?.has_primary_key_constraint = true;
        Ok(())
    }

    fn add_foreign_key_constraint(&mut self, table: &Table, parent: &Table) -> StorageResult<()> {
        self.stored_mut(&table.name)?
            .references
            .push(parent.name.clone());
        Ok(())
    }

    fn create_label_view(
        &mut self,
        table: &Table,
        _lookup: &LookupTable,
        suffix: &str,
    ) -> StorageResult<()> {
        self.stored_mut(&table.name)?;
        self.views.insert(format!("{}{}", table.name, suffix));
        Ok(())
    }

    fn max_primary_key(&mut self, table: &Table) -> StorageResult<Option<u64>> {
        let stored = self.stored_mut(&table.name)?;
        Ok(stored
            .rows
            .iter()
            .filter_map(|row| row.get(&stored.primary_key).and_then(parse_key))
            .max())
    }
}
