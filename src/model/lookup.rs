//! The choice label lookup table.

use indexmap::IndexMap;

use crate::source::Choices;

use super::field::{ColumnType, Field};
use super::table::Table;

pub const LOOKUP_PRIMARY_KEY: &str = "lookup_id";
pub const LOOKUP_TABLE_COLUMN: &str = "table_name";
pub const LOOKUP_FIELD_COLUMN: &str = "field_name";
pub const LOOKUP_VALUE_COLUMN: &str = "value";
pub const LOOKUP_LABEL_COLUMN: &str = "label";

/// Maps (destination table, source field, coded value) to a label.
///
/// Rows go to the wrapped [`Table`] so they can be stored like any other
/// table; the nested map answers label queries during the transform.
#[derive(Debug, Clone)]
pub struct LookupTable {
    table: Table,
    labels: IndexMap<String, IndexMap<String, Choices>>,
}

impl LookupTable {
    pub fn new(
        name: &str,
        key_type: ColumnType,
        name_type: ColumnType,
        label_type: ColumnType,
    ) -> Self {
        let mut table = Table::system(name, LOOKUP_PRIMARY_KEY, key_type);
        table.add_field(Field::value(LOOKUP_TABLE_COLUMN, name_type));
        table.add_field(Field::value(LOOKUP_FIELD_COLUMN, name_type));
        table.add_field(Field::value(LOOKUP_VALUE_COLUMN, label_type));
        table.add_field(Field::value(LOOKUP_LABEL_COLUMN, label_type));
        Self {
            table,
            labels: IndexMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.table.name
    }

    /// Register the choices of a field. The first registration wins;
    /// returns `false` when the field was already present.
    pub fn add_field(&mut self, table: &str, field: &str, choices: &Choices) -> bool {
        if self.contains(table, field) {
            return false;
        }

        for (value, label) in choices {
            self.table.append([
                (LOOKUP_TABLE_COLUMN, table),
                (LOOKUP_FIELD_COLUMN, field),
                (LOOKUP_VALUE_COLUMN, value.as_str()),
                (LOOKUP_LABEL_COLUMN, label.as_str()),
            ]);
        }
        self.labels
            .entry(table.to_string())
            .or_default()
            .insert(field.to_string(), choices.clone());
        true
    }

    pub fn contains(&self, table: &str, field: &str) -> bool {
        self.choices(table, field).is_some()
    }

    pub fn choices(&self, table: &str, field: &str) -> Option<&Choices> {
        self.labels.get(table)?.get(field)
    }

    pub fn label(&self, table: &str, field: &str, value: &str) -> Option<&str> {
        self.choices(table, field)?
            .get(value)
            .map(String::as_str)
    }

    /// All registered fields as (table, field, choices), in registration
    /// order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str, &Choices)> {
        self.labels.iter().flat_map(|(table, fields)| {
            fields
                .iter()
                .map(move |(field, choices)| (table.as_str(), field.as_str(), choices))
        })
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn table_mut(&mut self) -> &mut Table {
        &mut self.table
    }

    /// An empty lookup table with the same name and column types.
    pub fn empty_like(&self) -> Self {
        let mut table = self.table.clone();
        table.clear_rows();
        table.reset_keys();
        Self {
            table,
            labels: IndexMap::new(),
        }
    }
}
