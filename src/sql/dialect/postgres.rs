//! PostgreSQL SQL dialect.

use super::helpers::{self, TypeNames};
use super::SqlDialect;
use crate::model::ColumnType;

const TYPES: TypeNames = TypeNames {
    int: "INTEGER",
    serial: "SERIAL",
    float: "DOUBLE PRECISION",
    datetime: "TIMESTAMP",
};

/// PostgreSQL SQL dialect.
#[derive(Debug, Clone, Copy)]
pub struct Postgres;

impl SqlDialect for Postgres {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_double(ident)
    }

    fn emit_column_type(&self, ty: ColumnType) -> String {
        helpers::emit_column_type_sized(ty, &TYPES)
    }

    fn placeholder(&self, index: usize) -> String {
        format!("${}", index)
    }
}
