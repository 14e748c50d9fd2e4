//! DDL (Data Definition Language) support.
//!
//! Builders for the statements a destination database needs: CREATE/DROP
//! TABLE, ALTER TABLE key constraints, parameterized INSERT, and the label
//! views that show choice labels in place of coded values.
//!
//! # Examples
//!
//! ```ignore
//! use strata::sql::{CreateTable, Dialect};
//!
//! let sql = CreateTable::from_table(&table, false).to_sql(Dialect::Postgres);
//! ```

use super::dialect::{Dialect, SqlDialect};
use crate::model::lookup::{
    LOOKUP_FIELD_COLUMN, LOOKUP_LABEL_COLUMN, LOOKUP_TABLE_COLUMN, LOOKUP_VALUE_COLUMN,
};
use crate::model::{ColumnType, FieldKind, Row, Schema, Table};

// ============================================================================
// CREATE TABLE
// ============================================================================

/// CREATE TABLE statement.
#[derive(Debug, Clone)]
#[must_use = "DDL statements have no effect until converted to SQL with to_sql()"]
pub struct CreateTable {
    pub name: String,
    pub columns: Vec<ColumnDef>,
    pub if_not_exists: bool,
}

impl CreateTable {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            if_not_exists: false,
        }
    }

    pub fn if_not_exists(mut self) -> Self {
        self.if_not_exists = true;
        self
    }

    /// Add a column definition.
    pub fn column(mut self, col: ColumnDef) -> Self {
        self.columns.push(col);
        self
    }

    /// Column definitions for every column of a table. With
    /// `inline_primary_key` the primary key is declared on its column.
    pub fn from_table(table: &Table, inline_primary_key: bool) -> Self {
        table.columns().fold(Self::new(&table.name), |create, field| {
            let mut col = ColumnDef::new(&field.db_name, field.column_type());
            if inline_primary_key && field.is_primary_key() {
                col = col.primary_key();
            }
            create.column(col)
        })
    }

    /// Convert to SQL for the given dialect.
    pub fn to_sql(&self, dialect: Dialect) -> String {
        let columns: Vec<String> = self.columns.iter().map(|c| c.to_sql(dialect)).collect();
        format!(
            "CREATE TABLE {}{} ({})",
            if self.if_not_exists { "IF NOT EXISTS " } else { "" },
            dialect.quote_identifier(&self.name),
            columns.join(", ")
        )
    }
}

/// Column definition for CREATE TABLE.
#[derive(Debug, Clone)]
pub struct ColumnDef {
    pub name: String,
    pub data_type: ColumnType,
    pub primary_key: bool,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, data_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            data_type,
            primary_key: false,
        }
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn to_sql(&self, dialect: Dialect) -> String {
        let mut sql = format!(
            "{} {}",
            dialect.quote_identifier(&self.name),
            dialect.emit_column_type(self.data_type)
        );
        if self.primary_key {
            sql.push_str(" PRIMARY KEY");
        }
        sql
    }
}

// ============================================================================
// DROP TABLE / DROP VIEW
// ============================================================================

/// DROP TABLE IF EXISTS statement.
#[derive(Debug, Clone)]
#[must_use = "DDL statements have no effect until converted to SQL with to_sql()"]
pub struct DropTable {
    pub name: String,
}

impl DropTable {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn to_sql(&self, dialect: Dialect) -> String {
        format!("DROP TABLE IF EXISTS {}", dialect.quote_identifier(&self.name))
    }
}

/// DROP VIEW IF EXISTS statement.
#[derive(Debug, Clone)]
#[must_use = "DDL statements have no effect until converted to SQL with to_sql()"]
pub struct DropView {
    pub name: String,
}

impl DropView {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn to_sql(&self, dialect: Dialect) -> String {
        format!("DROP VIEW IF EXISTS {}", dialect.quote_identifier(&self.name))
    }
}

// ============================================================================
// ALTER TABLE
// ============================================================================

/// Constraint added by ALTER TABLE.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlterAction {
    AddPrimaryKey {
        column: String,
    },
    AddForeignKey {
        column: String,
        references_table: String,
        references_column: String,
    },
}

/// ALTER TABLE statement.
#[derive(Debug, Clone)]
#[must_use = "DDL statements have no effect until converted to SQL with to_sql()"]
pub struct AlterTable {
    pub name: String,
    pub action: AlterAction,
}

impl AlterTable {
    /// Primary key constraint of a table.
    pub fn primary_key(table: &Table) -> Self {
        Self {
            name: table.name.clone(),
            action: AlterAction::AddPrimaryKey {
                column: table.primary.db_name.clone(),
            },
        }
    }

    /// Foreign key from a child table to its parent's primary key. `None`
    /// for tables without a foreign key.
    pub fn foreign_key(table: &Table, parent: &Table) -> Option<Self> {
        let foreign = table.foreign.as_ref()?;
        Some(Self {
            name: table.name.clone(),
            action: AlterAction::AddForeignKey {
                column: foreign.db_name.clone(),
                references_table: parent.name.clone(),
                references_column: parent.primary.db_name.clone(),
            },
        })
    }

    pub fn to_sql(&self, dialect: Dialect) -> String {
        let action = match &self.action {
            AlterAction::AddPrimaryKey { column } => {
                format!("ADD PRIMARY KEY ({})", dialect.quote_identifier(column))
            }
            AlterAction::AddForeignKey {
                column,
                references_table,
                references_column,
            } => format!(
                "ADD FOREIGN KEY ({}) REFERENCES {} ({})",
                dialect.quote_identifier(column),
                dialect.quote_identifier(references_table),
                dialect.quote_identifier(references_column)
            ),
        };
        format!("ALTER TABLE {} {}", dialect.quote_identifier(&self.name), action)
    }
}

// ============================================================================
// INSERT
// ============================================================================

/// Parameterized single-row INSERT statement.
#[derive(Debug, Clone)]
#[must_use = "DML statements have no effect until converted to SQL with to_sql()"]
pub struct Insert {
    pub table: String,
    pub columns: Vec<String>,
}

impl Insert {
    pub fn new(table: impl Into<String>, columns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            table: table.into(),
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }

    /// INSERT for the columns of a row, in row order.
    pub fn for_row(row: &Row) -> Self {
        Self::new(&row.table, row.values.keys())
    }

    pub fn to_sql(&self, dialect: Dialect) -> String {
        let columns: Vec<String> = self
            .columns
            .iter()
            .map(|c| dialect.quote_identifier(c))
            .collect();
        let placeholders: Vec<String> = (1..=self.columns.len())
            .map(|i| dialect.placeholder(i))
            .collect();
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            dialect.quote_identifier(&self.table),
            columns.join(", "),
            placeholders.join(", ")
        )
    }
}

// ============================================================================
// Label views
// ============================================================================

/// A view over a data table with choice labels in place of coded values.
///
/// Radio and dropdown columns become a subquery on the lookup table,
/// checkbox option columns become the option label when checked. Label
/// columns are left out since the view already carries the labels.
#[derive(Debug, Clone)]
#[must_use = "DDL statements have no effect until converted to SQL with to_sql()"]
pub struct LabelView<'a> {
    pub table: &'a Table,
    pub lookup_table: &'a str,
    pub suffix: &'a str,
}

impl<'a> LabelView<'a> {
    pub fn new(table: &'a Table, lookup_table: &'a str, suffix: &'a str) -> Self {
        Self {
            table,
            lookup_table,
            suffix,
        }
    }

    pub fn name(&self) -> String {
        format!("{}{}", self.table.name, self.suffix)
    }

    /// Whether the table has any choice column to label.
    pub fn is_needed(&self) -> bool {
        self.table.fields.iter().any(|f| f.uses_lookup.is_some())
    }

    pub fn to_sql(&self, dialect: Dialect, lookup: &crate::model::LookupTable) -> String {
        let q = |ident: &str| dialect.quote_identifier(ident);
        let table = &self.table.name;

        let mut columns = Vec::new();
        for field in self.table.columns() {
            let column = format!("t.{}", q(&field.db_name));
            let expr = match (&field.kind, field.uses_lookup.as_deref()) {
                (FieldKind::Label { .. }, _) => continue,
                (FieldKind::CheckboxOption { code }, Some(lookup_field)) => {
                    let label = lookup.label(table, lookup_field, code).unwrap_or(code.as_str());
                    format!(
                        "CASE WHEN {} = 1 THEN {} ELSE NULL END AS {}",
                        column,
                        dialect.quote_string(label),
                        q(&field.db_name)
                    )
                }
                (FieldKind::Value, Some(lookup_field)) => format!(
                    "(SELECT l.{} FROM {} l WHERE l.{} = {} AND l.{} = {} AND l.{} = {}) AS {}",
                    q(LOOKUP_LABEL_COLUMN),
                    q(self.lookup_table),
                    q(LOOKUP_TABLE_COLUMN),
                    dialect.quote_string(table),
                    q(LOOKUP_FIELD_COLUMN),
                    dialect.quote_string(lookup_field),
                    q(LOOKUP_VALUE_COLUMN),
                    column,
                    q(&field.db_name)
                ),
                _ => column,
            };
            columns.push(expr);
        }

        format!(
            "CREATE VIEW {} AS SELECT {} FROM {} t",
            q(&self.name()),
            columns.join(", "),
            q(table)
        )
    }
}

// ============================================================================
// Whole schema
// ============================================================================

/// Every statement needed to create a schema's tables, in execution
/// order: tables (system tables first), key constraints where the dialect
/// can add them, then label views.
pub fn schema_ddl(schema: &Schema, dialect: Dialect, label_views: bool) -> Vec<String> {
    let inline_keys = !dialect.supports_alter_constraints();
    let tables: Vec<&Table> = schema
        .system_tables()
        .into_iter()
        .chain(schema.tables())
        .collect();

    let mut statements: Vec<String> = tables
        .iter()
        .map(|t| CreateTable::from_table(t, inline_keys).to_sql(dialect))
        .collect();

    if !inline_keys {
        statements.extend(tables.iter().map(|t| AlterTable::primary_key(t).to_sql(dialect)));
        for id in schema.table_ids() {
            if let Some(parent) = schema.parent_of(id) {
                if let Some(alter) = AlterTable::foreign_key(schema.table(id), parent) {
                    statements.push(alter.to_sql(dialect));
                }
            }
        }
    }

    if label_views {
        for table in schema.tables() {
            let view = LabelView::new(table, schema.lookup.name(), &schema.label_view_suffix);
            if view.is_needed() {
                statements.push(view.to_sql(dialect, &schema.lookup));
            }
        }
    }

    statements
}
