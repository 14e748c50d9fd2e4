//! Destination tables and row materialization.
//!
//! [`Table::create_row`] decides, for one source record, whether a row is
//! created at all. The checks run in this order:
//!
//! 1. Rows type pre-filter (repeating/event structure of the record)
//! 2. Field assembly, tracking whether any field carried data
//! 3. Disposition: no data → `None`; otherwise the next key is issued and
//!    the row is buffered

use std::collections::HashMap;

use regex::Regex;

use crate::source::{checkbox_field_name, Record, SourceFieldType, SURVEY_TIMESTAMP_SUFFIX};

use super::field::{
    ColumnType, Field, FieldKind, SystemColumn, EVENT_NAME_COLUMN, NOT_COMPLETED_TIMESTAMP,
    REPEAT_INSTANCE_COLUMN, REPEAT_INSTRUMENT_COLUMN,
};
use super::lookup::LookupTable;
use super::row::Row;
use super::{FieldType, RowsType};

/// Index of a table in its schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableId(pub usize);

/// Where a table hangs in the schema tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Parent {
    /// A root table; `key` names its synthetic primary key.
    Root { key: String },
    Table(TableId),
}

/// Per-table primary key sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyCounter {
    last: u64,
}

impl KeyCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue the next key. The first key is 1.
    pub fn next_key(&mut self) -> u64 {
        self.last += 1;
        self.last
    }

    /// The last key issued, 0 when none.
    pub fn last(&self) -> u64 {
        self.last
    }

    /// Continue after `last`, never moving backwards.
    pub fn seed(&mut self, last: u64) {
        self.last = self.last.max(last);
    }
}

/// Run-level settings that `create_row` needs beyond the table itself.
#[derive(Debug, Clone)]
pub struct RowPolicy {
    /// Source name of the record id field.
    pub record_id: String,
    /// Value written to the data source column.
    pub data_source: String,
    /// Calc field values matching this pattern do not count as data.
    pub calc_ignore: Option<Regex>,
}

impl RowPolicy {
    pub fn new(record_id: impl Into<String>, data_source: impl Into<String>) -> Self {
        Self {
            record_id: record_id.into(),
            data_source: data_source.into(),
            calc_ignore: None,
        }
    }

    /// Set the calc field ignore pattern. An empty pattern disables it.
    pub fn with_calc_ignore(mut self, pattern: &str) -> Result<Self, regex::Error> {
        self.calc_ignore = if pattern.is_empty() {
            None
        } else {
            Some(Regex::new(pattern)?)
        };
        Ok(self)
    }

    fn ignores_calc(&self, value: &str) -> bool {
        self.calc_ignore
            .as_ref()
            .is_some_and(|pattern| pattern.is_match(value))
    }
}

/// A destination table.
#[derive(Debug, Clone)]
pub struct Table {
    /// Destination name, prefix included.
    pub name: String,
    pub prefix: String,
    pub parent: Parent,
    pub primary: Field,
    pub foreign: Option<Field>,
    pub children: Vec<TableId>,
    pub rows_types: Vec<RowsType>,
    pub suffixes: Vec<String>,
    pub fields: Vec<Field>,
    rows: Vec<Row>,
    keys: KeyCounter,
}

impl Table {
    pub fn new(
        name: &str,
        prefix: &str,
        parent: Parent,
        primary_key: &str,
        key_type: ColumnType,
        rows_types: Vec<RowsType>,
        suffixes: Vec<String>,
    ) -> Self {
        Self {
            name: format!("{}{}", prefix, name),
            prefix: prefix.to_string(),
            parent,
            primary: Field::new(primary_key, key_type, FieldKind::PrimaryKey),
            foreign: None,
            children: Vec::new(),
            rows_types,
            suffixes,
            fields: Vec::new(),
            rows: Vec::new(),
            keys: KeyCounter::new(),
        }
    }

    /// A root table with a single rows type, used for the system tables.
    pub fn system(name: &str, primary_key: &str, key_type: ColumnType) -> Self {
        Self::new(
            name,
            "",
            Parent::Root {
                key: primary_key.to_string(),
            },
            primary_key,
            key_type,
            vec![RowsType::Root],
            Vec::new(),
        )
    }

    /// Name without the table prefix.
    pub fn base_name(&self) -> &str {
        self.name.strip_prefix(&self.prefix).unwrap_or(&self.name)
    }

    pub fn is_root(&self) -> bool {
        matches!(self.parent, Parent::Root { .. })
    }

    pub fn set_foreign_key(&mut self, name: &str, key_type: ColumnType) {
        self.foreign = Some(Field::new(name, key_type, FieldKind::ForeignKey));
    }

    pub fn add_field(&mut self, field: Field) {
        self.fields.push(field);
    }

    /// Look up a non-key field by destination name.
    pub fn field(&self, db_name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.db_name == db_name)
    }

    /// Whether any column (keys included) has this destination name.
    pub fn has_column(&self, db_name: &str) -> bool {
        self.columns().any(|f| f.db_name == db_name)
    }

    pub fn has_system_column(&self, column: SystemColumn) -> bool {
        self.fields
            .iter()
            .any(|f| f.kind == FieldKind::System(column))
    }

    /// All columns in order: primary key, foreign key, then fields.
    pub fn columns(&self) -> impl Iterator<Item = &Field> {
        std::iter::once(&self.primary)
            .chain(self.foreign.iter())
            .chain(self.fields.iter())
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns().map(|f| f.db_name.as_str()).collect()
    }

    /// A table whose only content is the record id, so the record id alone
    /// keeps a row.
    pub fn is_record_id_table(&self) -> bool {
        self.fields.iter().any(|f| f.kind == FieldKind::RecordId)
            && !self
                .fields
                .iter()
                .any(|f| f.kind.is_data() || matches!(f.kind, FieldKind::Label { .. }))
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Remove and return the buffered rows.
    pub fn take_rows(&mut self) -> Vec<Row> {
        std::mem::take(&mut self.rows)
    }

    pub fn clear_rows(&mut self) {
        self.rows.clear();
    }

    pub fn keys(&self) -> &KeyCounter {
        &self.keys
    }

    /// Continue key assignment after `last`.
    pub fn seed_keys(&mut self, last: u64) {
        self.keys.seed(last);
    }

    pub fn reset_keys(&mut self) {
        self.keys = KeyCounter::new();
    }

    /// Append a row built from explicit values; missing columns are blank.
    ///
    /// Used for system tables, where no data-found rule applies.
    pub fn append<I, K, V>(&mut self, values: I) -> u64
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut given: HashMap<String, String> = values
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();

        let key = self.keys.next_key();
        let mut row = Row::new(&self.name);
        row.set(&self.primary.db_name, key.to_string());
        for field in self.foreign.iter().chain(self.fields.iter()) {
            let value = given.remove(&field.db_name).unwrap_or_default();
            row.set(&field.db_name, value);
        }
        self.rows.push(row);
        key
    }

    // ========================================================================
    // Row materialization
    // ========================================================================

    /// Whether a record may feed a row of the given rows type at all.
    pub fn accepts(&self, record: &Record, rows_type: RowsType) -> bool {
        let instrument = record_value(record, REPEAT_INSTRUMENT_COLUMN).trim();
        let instance = record_value(record, REPEAT_INSTANCE_COLUMN).trim();
        let event = record_value(record, EVENT_NAME_COLUMN).trim();

        if rows_type.is_repeating_instruments() {
            if instrument.is_empty() {
                return false;
            }
            if self.has_system_column(SystemColumn::EventName) {
                return !event.is_empty() && !instance.is_empty();
            }
            true
        } else if rows_type.is_repeating_events() {
            !instance.is_empty() && !event.is_empty() && instrument.is_empty()
        } else if rows_type.has_events() {
            instrument.is_empty() && instance.is_empty()
        } else {
            true
        }
    }

    /// Build a row for `record` under `suffix`.
    ///
    /// Returns the new primary key, or `None` when the record was filtered
    /// out or no field carried data.
    pub fn create_row(
        &mut self,
        record: &Record,
        foreign_key: Option<u64>,
        suffix: &str,
        rows_type: RowsType,
        policy: &RowPolicy,
        lookup: &LookupTable,
    ) -> Option<u64> {
        if !self.accepts(record, rows_type) {
            return None;
        }

        let record_id_only = self.is_record_id_table();
        let mut data_found = false;

        let mut row = Row::new(&self.name);
        row.set(&self.primary.db_name, "");
        if let Some(foreign) = &self.foreign {
            let value = foreign_key.map(|k| k.to_string()).unwrap_or_default();
            row.set(&foreign.db_name, value);
        }

        for field in &self.fields {
            let value = match &field.kind {
                FieldKind::PrimaryKey | FieldKind::ForeignKey => continue,
                FieldKind::RecordId => {
                    let value = record_value(record, &policy.record_id);
                    if record_id_only && !value.trim().is_empty() {
                        data_found = true;
                    }
                    value.to_string()
                }
                FieldKind::System(SystemColumn::DataSource) => policy.data_source.clone(),
                FieldKind::System(SystemColumn::Suffix) => suffix.to_string(),
                FieldKind::System(column) => record_value(record, column.column_name()).to_string(),
                FieldKind::Value => {
                    let source_name = format!("{}{}", field.name, suffix);
                    let (value, found) = value_with_data(field, record_value(record, &source_name), policy);
                    data_found |= found;
                    value
                }
                FieldKind::CheckboxOption { code } => {
                    let source_name = checkbox_field_name(&format!("{}{}", field.name, suffix), code);
                    let value = record_value(record, &source_name);
                    data_found |= !is_zero_or_blank(value);
                    value.to_string()
                }
                FieldKind::CheckboxList { codes } => {
                    let base = format!("{}{}", field.name, suffix);
                    let checked: Vec<&str> = codes
                        .iter()
                        .filter(|code| {
                            record_value(record, &checkbox_field_name(&base, code)).trim() == "1"
                        })
                        .map(String::as_str)
                        .collect();
                    data_found |= !checked.is_empty();
                    checked.join(",")
                }
                FieldKind::Label { target } => self.label_value(target, &row, lookup),
            };
            row.set(&field.db_name, value);
        }

        if !data_found {
            return None;
        }

        let key = self.keys.next_key();
        row.set(&self.primary.db_name, key.to_string());
        self.rows.push(row);
        Some(key)
    }

    /// Label for the already assembled value of choice field `target`.
    fn label_value(&self, target: &str, row: &Row, lookup: &LookupTable) -> String {
        let Some(field) = self.field(target) else {
            return String::new();
        };
        let Some(lookup_name) = field.uses_lookup.as_deref() else {
            return String::new();
        };
        let value = row.get(target).unwrap_or_default().trim();

        match &field.kind {
            FieldKind::CheckboxOption { code } if value == "1" => lookup
                .label(&self.name, lookup_name, code)
                .unwrap_or_default()
                .to_string(),
            FieldKind::CheckboxOption { .. } => String::new(),
            FieldKind::CheckboxList { .. } => value
                .split(',')
                .filter(|code| !code.is_empty())
                .filter_map(|code| lookup.label(&self.name, lookup_name, code))
                .collect::<Vec<_>>()
                .join(", "),
            _ => lookup
                .label(&self.name, lookup_name, value)
                .unwrap_or_default()
                .to_string(),
        }
    }
}

fn record_value<'a>(record: &'a Record, name: &str) -> &'a str {
    record.get(name).map(String::as_str).unwrap_or_default()
}

fn is_zero_or_blank(value: &str) -> bool {
    let value = value.trim();
    value.is_empty() || value == "0"
}

fn is_survey_timestamp(field: &Field) -> bool {
    field.source_type == Some(SourceFieldType::SurveyTimestamp)
        || (field.field_type == FieldType::Datetime && field.name.ends_with(SURVEY_TIMESTAMP_SUFFIX))
}

/// The stored value of a plain field and whether it counts as data.
fn value_with_data(field: &Field, value: &str, policy: &RowPolicy) -> (String, bool) {
    if is_survey_timestamp(field) {
        if value.trim() == NOT_COMPLETED_TIMESTAMP {
            return (String::new(), false);
        }
        return (value.to_string(), !value.trim().is_empty());
    }

    let found = match field.source_type {
        Some(SourceFieldType::FormComplete) => !is_zero_or_blank(value),
        Some(SourceFieldType::Calc) => !value.trim().is_empty() && !policy.ignores_calc(value.trim()),
        _ => !value.trim().is_empty(),
    };
    (value.to_string(), found)
}
