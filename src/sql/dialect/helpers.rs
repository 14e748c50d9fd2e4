//! Shared helper functions for SQL dialect implementations.

use crate::model::{ColumnType, FieldType};

// =============================================================================
// Identifier Quoting
// =============================================================================

/// Quote identifier with double quotes (ANSI style).
/// Used by: SQLite, Postgres
pub fn quote_double(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Quote identifier with backticks.
/// Used by: MySQL
pub fn quote_backtick(ident: &str) -> String {
    format!("`{}`", ident.replace('`', "``"))
}

// =============================================================================
// String Quoting
// =============================================================================

/// Quote string with single quotes (standard SQL).
pub fn quote_string_single(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

// =============================================================================
// Column Types
// =============================================================================

/// Names a dialect uses for the types that differ between servers.
pub struct TypeNames {
    pub int: &'static str,
    pub serial: &'static str,
    pub float: &'static str,
    pub datetime: &'static str,
}

pub const DEFAULT_VARCHAR_SIZE: u32 = 255;

/// Column type for servers with sized character types.
pub fn emit_column_type_sized(ty: ColumnType, names: &TypeNames) -> String {
    let varchar = |size: Option<u32>| format!("VARCHAR({})", size.unwrap_or(DEFAULT_VARCHAR_SIZE));
    match ty.field_type {
        FieldType::Int | FieldType::Checkbox => names.int.to_string(),
        FieldType::AutoIncrement => names.serial.to_string(),
        FieldType::Float => names.float.to_string(),
        FieldType::String | FieldType::CheckboxList => "TEXT".to_string(),
        FieldType::Char => format!("CHAR({})", ty.size.unwrap_or(1)),
        FieldType::Varchar | FieldType::Dropdown | FieldType::Radio => varchar(ty.size),
        FieldType::Date => "DATE".to_string(),
        FieldType::Datetime => names.datetime.to_string(),
    }
}

/// Column type by SQLite storage class.
pub fn emit_column_type_sqlite(ty: ColumnType) -> String {
    match ty.field_type {
        FieldType::Int | FieldType::Checkbox | FieldType::AutoIncrement => "INTEGER",
        FieldType::Float => "REAL",
        _ => "TEXT",
    }
    .to_string()
}
