//! SQLite SQL dialect.
//!
//! SQLite differences:
//! - ANSI identifier quoting (`"`)
//! - Storage classes instead of sized types (INTEGER, REAL, TEXT)
//! - Constraints cannot be added to an existing table, so keys are
//!   declared in CREATE TABLE

use super::helpers;
use super::SqlDialect;
use crate::model::ColumnType;

/// SQLite SQL dialect.
#[derive(Debug, Clone, Copy)]
pub struct Sqlite;

impl SqlDialect for Sqlite {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_double(ident)
    }

    fn emit_column_type(&self, ty: ColumnType) -> String {
        helpers::emit_column_type_sqlite(ty)
    }

    fn supports_alter_constraints(&self) -> bool {
        false
    }
}
