//! SQL generation module.
//!
//! Statement builders for the destination database, rendered per dialect:
//!
//! - [`ddl`] - CREATE/DROP TABLE, key constraints, INSERT and label views
//! - [`dialect`] - SQL dialect implementations

pub mod ddl;
pub mod dialect;

pub use ddl::{
    schema_ddl, AlterAction, AlterTable, ColumnDef, CreateTable, DropTable, DropView, Insert,
    LabelView,
};
pub use dialect::{Dialect, SqlDialect};
