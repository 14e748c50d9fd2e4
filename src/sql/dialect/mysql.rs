//! MySQL SQL dialect.
//!
//! MySQL differences from ANSI:
//! - Backtick identifier quoting (`` `name` ``)
//! - `AUTO_INCREMENT` column attribute instead of serial types
//! - DATETIME rather than TIMESTAMP for date-times

use super::helpers::{self, TypeNames};
use super::SqlDialect;
use crate::model::ColumnType;

const TYPES: TypeNames = TypeNames {
    int: "INT",
    serial: "INT AUTO_INCREMENT",
    float: "DOUBLE",
    datetime: "DATETIME",
};

/// MySQL SQL dialect.
#[derive(Debug, Clone, Copy)]
pub struct MySql;

impl SqlDialect for MySql {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_backtick(ident)
    }

    fn emit_column_type(&self, ty: ColumnType) -> String {
        helpers::emit_column_type_sized(ty, &TYPES)
    }
}
