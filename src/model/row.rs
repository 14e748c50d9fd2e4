//! Destination rows buffered by a table until they are stored.

use indexmap::IndexMap;

/// One destination row: destination field name → value, in column order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    /// Name of the owning table.
    pub table: String,
    pub values: IndexMap<String, String>,
}

impl Row {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            values: IndexMap::new(),
        }
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.values.get(field).map(String::as_str)
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<String>) {
        self.values.insert(field.into(), value.into());
    }

    /// Values in column order.
    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.values.values().map(String::as_str)
    }
}
