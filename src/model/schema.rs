//! The destination schema: an arena of tables plus the system tables.

use super::field::{ColumnType, Field};
use super::lookup::LookupTable;
use super::table::{Parent, RowPolicy, Table, TableId};
use super::RowsType;
use crate::source::Record;

pub const PROJECT_INFO_TABLE: &str = "redcap_project_info";
pub const METADATA_TABLE: &str = "redcap_metadata";
pub const ETL_LOG_TABLE: &str = "etl_log";
pub const ETL_EVENT_LOG_TABLE: &str = "etl_event_log";

/// Column types used for the system tables.
#[derive(Debug, Clone, Copy)]
pub struct SystemTypes {
    pub key: ColumnType,
    pub name: ColumnType,
    pub label: ColumnType,
}

/// A complete destination schema.
///
/// Data tables live in an arena addressed by [`TableId`]; parent/child
/// links are ids into the same arena. The lookup and system tables are
/// held separately since the transform never walks them.
#[derive(Debug, Clone)]
pub struct Schema {
    tables: Vec<Table>,
    roots: Vec<TableId>,
    pub lookup: LookupTable,
    pub project_info: Table,
    pub metadata: Table,
    pub etl_log: Table,
    pub etl_event_log: Table,
    pub label_view_suffix: String,
}

impl Schema {
    pub fn new(lookup_name: &str, label_view_suffix: &str, types: SystemTypes) -> Self {
        Self {
            tables: Vec::new(),
            roots: Vec::new(),
            lookup: LookupTable::new(lookup_name, types.key, types.name, types.label),
            project_info: project_info_table(types),
            metadata: metadata_table(types),
            etl_log: etl_log_table(types),
            etl_event_log: etl_event_log_table(types),
            label_view_suffix: label_view_suffix.to_string(),
        }
    }

    /// A schema with no data tables, and empty system tables of the same
    /// shape.
    pub fn empty_like(&self) -> Self {
        let empty = |table: &Table| {
            let mut table = table.clone();
            table.clear_rows();
            table.reset_keys();
            table
        };
        Self {
            tables: Vec::new(),
            roots: Vec::new(),
            lookup: self.lookup.empty_like(),
            project_info: empty(&self.project_info),
            metadata: empty(&self.metadata),
            etl_log: empty(&self.etl_log),
            etl_event_log: empty(&self.etl_event_log),
            label_view_suffix: self.label_view_suffix.clone(),
        }
    }

    /// Add a table. Child tables are linked to their parent.
    pub fn add_table(&mut self, table: Table) -> TableId {
        let id = TableId(self.tables.len());
        match table.parent {
            Parent::Root { .. } => self.roots.push(id),
            Parent::Table(parent) => self.tables[parent.0].children.push(id),
        }
        self.tables.push(table);
        id
    }

    pub fn table(&self, id: TableId) -> &Table {
        &self.tables[id.0]
    }

    pub fn table_mut(&mut self, id: TableId) -> &mut Table {
        &mut self.tables[id.0]
    }

    pub fn table_id(&self, name: &str) -> Option<TableId> {
        self.tables.iter().position(|t| t.name == name).map(TableId)
    }

    pub fn table_by_name(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.name == name)
    }

    /// Data tables in creation order (parents before children).
    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.tables.iter()
    }

    pub fn table_ids(&self) -> impl Iterator<Item = TableId> {
        (0..self.tables.len()).map(TableId)
    }

    pub fn roots(&self) -> &[TableId] {
        &self.roots
    }

    pub fn parent_of(&self, id: TableId) -> Option<&Table> {
        match self.table(id).parent {
            Parent::Root { .. } => None,
            Parent::Table(parent) => Some(self.table(parent)),
        }
    }

    /// The lookup table followed by project info, metadata and log tables.
    pub fn system_tables(&self) -> [&Table; 5] {
        [
            self.lookup.table(),
            &self.project_info,
            &self.metadata,
            &self.etl_log,
            &self.etl_event_log,
        ]
    }

    pub fn system_tables_mut(&mut self) -> [&mut Table; 5] {
        [
            self.lookup.table_mut(),
            &mut self.project_info,
            &mut self.metadata,
            &mut self.etl_log,
            &mut self.etl_event_log,
        ]
    }

    /// Create a row in a data table; see [`Table::create_row`].
    pub fn create_row(
        &mut self,
        id: TableId,
        record: &Record,
        foreign_key: Option<u64>,
        suffix: &str,
        rows_type: RowsType,
        policy: &RowPolicy,
    ) -> Option<u64> {
        let Schema { tables, lookup, .. } = self;
        tables[id.0].create_row(record, foreign_key, suffix, rows_type, policy, lookup)
    }

    /// Rows buffered across all data tables.
    pub fn buffered_rows(&self) -> usize {
        self.tables.iter().map(Table::row_count).sum()
    }

    /// Drop every buffered data row.
    pub fn clear_rows(&mut self) {
        for table in &mut self.tables {
            table.clear_rows();
        }
    }
}

fn project_info_table(types: SystemTypes) -> Table {
    let mut table = Table::system(PROJECT_INFO_TABLE, "project_info_id", types.key);
    table.add_field(Field::value("redcap_data_source", types.name));
    table.add_field(Field::value("project_id", types.key));
    table.add_field(Field::value("project_title", types.label));
    table.add_field(Field::value("longitudinal", types.key));
    table
}

fn metadata_table(types: SystemTypes) -> Table {
    let mut table = Table::system(METADATA_TABLE, "redcap_metadata_id", types.key);
    for column in [
        "table_name",
        "table_field_name",
        "redcap_field_name",
        "form_name",
        "field_type",
    ] {
        table.add_field(Field::value(column, types.name));
    }
    table.add_field(Field::value("field_label", types.label));
    table.add_field(Field::value("identifier", types.key));
    table
}

fn etl_log_table(types: SystemTypes) -> Table {
    let mut table = Table::system(ETL_LOG_TABLE, "etl_log_id", types.key);
    table.add_field(Field::value("log_time", types.name));
    table.add_field(Field::value("task", types.name));
    table.add_field(Field::value("project_id", types.key));
    table.add_field(Field::value("package_version", types.name));
    table
}

fn etl_event_log_table(types: SystemTypes) -> Table {
    let mut table = Table::system(ETL_EVENT_LOG_TABLE, "etl_event_log_id", types.key);
    table.add_field(Field::value("etl_log_id", types.key));
    table.add_field(Field::value("log_time", types.name));
    table.add_field(Field::value("message", types.label));
    table
}
