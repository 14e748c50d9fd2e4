//! The destination schema model.
//!
//! A [`Schema`] is built once per task by the generator and filled batch by
//! batch by the transform:
//!
//! ```text
//! Schema
//! ├── tables (arena, TableId)      demographics ── visits ── labs
//! ├── roots                        [demographics]
//! ├── lookup                       (table, field, value) → label
//! └── system tables                project info, metadata, run logs
//! ```

pub mod field;
pub mod lookup;
pub mod merge;
pub mod row;
pub mod schema;
pub mod table;

pub use crate::rules::ast::{FieldType, RowsType};
pub use field::{ColumnType, Field, FieldKind, SystemColumn};
pub use lookup::LookupTable;
pub use merge::{merge, MergeError, MergeResult};
pub use row::Row;
pub use schema::{Schema, SystemTypes};
pub use table::{KeyCounter, Parent, RowPolicy, Table, TableId};
