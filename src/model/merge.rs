//! Schema merge for tasks that share a destination database.
//!
//! [`merge`] builds a new schema and leaves both inputs untouched:
//!
//! - Tables are unioned by name; a shared table must agree on rows types,
//!   prefix and parent
//! - Fields of a shared table are unioned by destination name
//! - Lookup, project info and metadata rows are unioned and stably sorted
//!   by key

use std::collections::HashMap;

use super::schema::Schema;
use super::table::{Parent, Table, TableId};
use super::RowsType;

/// Errors that abort a merge.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MergeError {
    #[error("Label view suffixes differ: '{left}' and '{right}'")]
    LabelViewSuffix { left: String, right: String },

    #[error("Table '{table}' has different rows types: {left} and {right}")]
    RowsTypes {
        table: String,
        left: String,
        right: String,
    },

    #[error("Table '{table}' has different prefixes: '{left}' and '{right}'")]
    Prefix {
        table: String,
        left: String,
        right: String,
    },

    #[error("Table '{table}' has different parents: {left} and {right}")]
    Parent {
        table: String,
        left: String,
        right: String,
    },

    #[error("Parent '{parent}' of table '{table}' is not defined before it")]
    MissingParent { table: String, parent: String },
}

pub type MergeResult<T> = Result<T, MergeError>;

/// Merge two schemas into a new one.
pub fn merge(a: &Schema, b: &Schema) -> MergeResult<Schema> {
    if a.label_view_suffix != b.label_view_suffix {
        return Err(MergeError::LabelViewSuffix {
            left: a.label_view_suffix.clone(),
            right: b.label_view_suffix.clone(),
        });
    }

    let mut merged = a.empty_like();
    let mut ids: HashMap<String, TableId> = HashMap::new();

    let only_b = b.tables().filter(|t| a.table_by_name(&t.name).is_none());
    for table in a.tables().chain(only_b) {
        let left = a.table_by_name(&table.name).map(|t| (a, t));
        let right = b.table_by_name(&table.name).map(|t| (b, t));

        let mut result = match (left, right) {
            (Some((sa, ta)), Some((sb, tb))) => merge_tables(sa, ta, sb, tb)?,
            (Some((_, t)), None) | (None, Some((_, t))) => t.clone(),
            (None, None) => continue,
        };

        let (source, _) = left.or(right).unwrap_or((a, table));
        result.parent = match &table.parent {
            Parent::Root { key } => Parent::Root { key: key.clone() },
            Parent::Table(parent) => {
                let parent_name = &source.table(*parent).name;
                match ids.get(parent_name) {
                    Some(id) => Parent::Table(*id),
                    None => {
                        return Err(MergeError::MissingParent {
                            table: table.name.clone(),
                            parent: parent_name.clone(),
                        })
                    }
                }
            }
        };
        result.children.clear();
        result.clear_rows();

        let id = merged.add_table(result);
        ids.insert(table.name.clone(), id);
    }

    let mut entries: Vec<_> = a.lookup.entries().chain(b.lookup.entries()).collect();
    entries.sort_by(|x, y| (x.0, x.1).cmp(&(y.0, y.1)));
    for (table, field, choices) in entries {
        merged.lookup.add_field(table, field, choices);
    }

    merged.project_info = merge_rows(&a.project_info, &b.project_info, &["redcap_data_source"]);
    merged.metadata = merge_rows(
        &a.metadata,
        &b.metadata,
        &["table_name", "table_field_name"],
    );

    Ok(merged)
}

fn merge_tables(sa: &Schema, a: &Table, sb: &Schema, b: &Table) -> MergeResult<Table> {
    let rows_types = |t: &Table| {
        let mut types: Vec<RowsType> = t.rows_types.clone();
        types.sort();
        types.dedup();
        types
    };
    if rows_types(a) != rows_types(b) {
        let show = |types: Vec<RowsType>| {
            types
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("&")
        };
        return Err(MergeError::RowsTypes {
            table: a.name.clone(),
            left: show(rows_types(a)),
            right: show(rows_types(b)),
        });
    }

    if a.prefix != b.prefix {
        return Err(MergeError::Prefix {
            table: a.name.clone(),
            left: a.prefix.clone(),
            right: b.prefix.clone(),
        });
    }

    let (left, right) = (describe_parent(sa, a), describe_parent(sb, b));
    if left != right {
        return Err(MergeError::Parent {
            table: a.name.clone(),
            left,
            right,
        });
    }

    let mut table = a.clone();
    for field in &b.fields {
        if !table.has_column(&field.db_name) {
            table.add_field(field.clone());
        }
    }
    for suffix in &b.suffixes {
        if !table.suffixes.contains(suffix) {
            table.suffixes.push(suffix.clone());
        }
    }
    Ok(table)
}

fn describe_parent(schema: &Schema, table: &Table) -> String {
    match &table.parent {
        Parent::Root { key } => format!("root key '{}'", key),
        Parent::Table(id) => format!("table '{}'", schema.table(*id).name),
    }
}

/// Union the rows of two system tables, dropping duplicates, sorted by
/// the `sort_by` columns. Keys are reissued from 1.
fn merge_rows(a: &Table, b: &Table, sort_by: &[&str]) -> Table {
    let primary = a.primary.db_name.as_str();
    let mut rows: Vec<Vec<(String, String)>> = Vec::new();
    for row in a.rows().iter().chain(b.rows()) {
        let values: Vec<(String, String)> = row
            .values
            .iter()
            .filter(|(name, _)| name.as_str() != primary)
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        if !rows.contains(&values) {
            rows.push(values);
        }
    }

    let sort_key = |values: &[(String, String)]| -> Vec<String> {
        sort_by
            .iter()
            .map(|column| {
                values
                    .iter()
                    .find(|(name, _)| name.as_str() == *column)
                    .map(|(_, value)| value.clone())
                    .unwrap_or_default()
            })
            .collect()
    };
    rows.sort_by_key(|values| sort_key(values.as_slice()));

    let mut table = a.clone();
    table.clear_rows();
    table.reset_keys();
    for values in rows {
        table.append(values);
    }
    table
}
