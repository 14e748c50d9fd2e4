//! # strata
//!
//! Rules-driven extraction of data-capture project records into relational
//! tables.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │            Transformation rules (TABLE / FIELD)          │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [rules: parse + validate]
//! ┌─────────────────────────────────────────────────────────┐
//! │                  RuleSet (rule AST)                      │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [generator + source metadata]
//! ┌─────────────────────────────────────────────────────────┐
//! │     Schema (tables, keys, lookup, system tables)         │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [transform, batch by batch]
//! ┌─────────────────────────────────────────────────────────┐
//! │                 Rows ─► Storage                          │
//! │           (SQLite, CSV files, in memory)                 │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! The [`etl`] module drives the whole pipeline from a TOML config file.

pub mod config;
pub mod etl;
pub mod generator;
pub mod model;
pub mod rules;
pub mod source;
pub mod sql;
pub mod storage;
pub mod transform;

/// Re-exports for convenient usage.
pub mod prelude {
    pub use crate::config::{Settings, TaskSettings};
    pub use crate::etl::{EtlError, Task, TaskReport, Workflow};
    pub use crate::generator::{
        GenerationResult, GenerationStatus, GeneratorOptions, SchemaGenerator,
    };
    pub use crate::model::{merge, FieldType, Row, RowPolicy, RowsType, Schema, Table};
    pub use crate::rules::{parse_and_validate, parse_rules, RuleSet};
    pub use crate::source::{DataSource, JsonSource, Record, RecordBatch, SourceCatalog};
    pub use crate::sql::{Dialect, SqlDialect};
    pub use crate::storage::{CsvStorage, MemoryStorage, SqliteStorage, Storage};
    pub use crate::transform::Transformer;
}
