//! Record group transformation.
//!
//! For each record group the [`Transformer`] walks every root table and
//! recurses into children, dispatching on each table's rows types:
//!
//! | Rows type                  | Rows created                                   |
//! |----------------------------|------------------------------------------------|
//! | `ROOT`                     | one per group (first record with data)         |
//! | `EVENTS`, `REPEATING_*`    | one per record; children see only that record  |
//! | `SUFFIXES`                 | one per suffix, from the first record          |
//! | `EVENTS:SUFFIXES` (etc.)   | one per (record, suffix) pair                  |

use std::collections::HashSet;

use log::{debug, warn};

use crate::model::{RowPolicy, RowsType, Schema, TableId};
use crate::source::{Record, RecordBatch};

/// Recursion ceiling for the table tree.
pub const MAX_DEPTH: usize = 64;

/// Errors that can occur during transformation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransformError {
    #[error("Table nesting under '{table}' exceeds the maximum depth of {max}")]
    DepthExceeded { table: String, max: usize },
}

pub type TransformResult<T> = Result<T, TransformError>;

/// Inputs of one table visit.
#[derive(Debug, Clone, Copy)]
pub struct TransformContext<'r> {
    /// Records of the group visible at this level.
    pub records: &'r [Record],
    /// Primary key of the parent row.
    pub foreign_key: Option<u64>,
    /// Suffix accumulated from suffixed ancestors.
    pub suffix: &'r str,
    pub depth: usize,
}

impl<'r> TransformContext<'r> {
    /// Context for the root tables of a record group.
    pub fn root(records: &'r [Record]) -> Self {
        Self {
            records,
            foreign_key: None,
            suffix: "",
            depth: 0,
        }
    }
}

/// Fills a schema's tables from record groups.
#[derive(Debug)]
pub struct Transformer {
    policy: RowPolicy,
    /// Root tables already warned about holding more than one row.
    warned_roots: HashSet<String>,
}

impl Transformer {
    pub fn new(policy: RowPolicy) -> Self {
        Self {
            policy,
            warned_roots: HashSet::new(),
        }
    }

    pub fn policy(&self) -> &RowPolicy {
        &self.policy
    }

    /// Transform every record group of a batch. Returns the number of
    /// groups processed.
    pub fn process_batch(
        &mut self,
        schema: &mut Schema,
        batch: &RecordBatch,
    ) -> TransformResult<usize> {
        for (record_id, records) in batch {
            debug!("Transforming record '{}' ({} rows)", record_id, records.len());
            self.process_group(schema, records)?;
        }
        Ok(batch.len())
    }

    /// Transform one record group into rows of every root table and their
    /// descendants.
    pub fn process_group(&mut self, schema: &mut Schema, records: &[Record]) -> TransformResult<()> {
        let roots = schema.roots().to_vec();
        for root in roots {
            self.process_table(schema, root, TransformContext::root(records))?;
        }
        Ok(())
    }

    fn process_table(
        &mut self,
        schema: &mut Schema,
        id: TableId,
        ctx: TransformContext<'_>,
    ) -> TransformResult<()> {
        if ctx.depth >= MAX_DEPTH {
            return Err(TransformError::DepthExceeded {
                table: schema.table(id).name.clone(),
                max: MAX_DEPTH,
            });
        }

        let rows_types = schema.table(id).rows_types.clone();
        for rows_type in rows_types {
            match rows_type {
                RowsType::Root => self.process_root(schema, id, ctx)?,
                RowsType::ByEvents
                | RowsType::ByRepeatingInstruments
                | RowsType::ByRepeatingEvents => {
                    self.process_records(schema, id, rows_type, ctx)?
                }
                RowsType::BySuffixes => self.process_suffixes(schema, id, ctx)?,
                RowsType::ByEventsSuffixes
                | RowsType::ByRepeatingInstrumentsSuffixes
                | RowsType::ByRepeatingEventsSuffixes => {
                    self.process_record_suffixes(schema, id, rows_type, ctx)?
                }
            }
        }
        Ok(())
    }

    /// At most one logical row per group: only the first row created
    /// feeds the children.
    fn process_root(
        &mut self,
        schema: &mut Schema,
        id: TableId,
        ctx: TransformContext<'_>,
    ) -> TransformResult<()> {
        let record_id_only = schema.table(id).is_record_id_table();
        let mut first_key = None;

        for record in ctx.records {
            let Some(key) =
                schema.create_row(id, record, ctx.foreign_key, ctx.suffix, RowsType::Root, &self.policy)
            else {
                continue;
            };

            if first_key.is_none() {
                first_key = Some(key);
                if record_id_only {
                    break;
                }
            } else {
                let name = &schema.table(id).name;
                if self.warned_roots.insert(name.clone()) {
                    warn!(
                        "Root table '{}' received more than one row for a record; \
                         only the first is linked to child tables",
                        name
                    );
                }
            }
        }

        if let Some(key) = first_key {
            self.process_children(schema, id, ctx.records, key, ctx.suffix, ctx.depth)?;
        }
        Ok(())
    }

    /// One row per accepted record; children see only that record.
    fn process_records(
        &mut self,
        schema: &mut Schema,
        id: TableId,
        rows_type: RowsType,
        ctx: TransformContext<'_>,
    ) -> TransformResult<()> {
        for record in ctx.records {
            let created =
                schema.create_row(id, record, ctx.foreign_key, ctx.suffix, rows_type, &self.policy);
            if let Some(key) = created {
                let single = std::slice::from_ref(record);
                self.process_children(schema, id, single, key, ctx.suffix, ctx.depth)?;
            }
        }
        Ok(())
    }

    /// One row per suffix, built from the first record; children see the
    /// whole group under the extended suffix.
    fn process_suffixes(
        &mut self,
        schema: &mut Schema,
        id: TableId,
        ctx: TransformContext<'_>,
    ) -> TransformResult<()> {
        let Some(first) = ctx.records.first() else {
            return Ok(());
        };

        let suffixes = schema.table(id).suffixes.clone();
        for suffix in suffixes {
            let suffix = format!("{}{}", ctx.suffix, suffix);
            let created = schema.create_row(
                id,
                first,
                ctx.foreign_key,
                &suffix,
                RowsType::BySuffixes,
                &self.policy,
            );
            if let Some(key) = created {
                self.process_children(schema, id, ctx.records, key, &suffix, ctx.depth)?;
            }
        }
        Ok(())
    }

    /// One row per (record, suffix) pair.
    fn process_record_suffixes(
        &mut self,
        schema: &mut Schema,
        id: TableId,
        rows_type: RowsType,
        ctx: TransformContext<'_>,
    ) -> TransformResult<()> {
        let suffixes = schema.table(id).suffixes.clone();
        for record in ctx.records {
            for suffix in &suffixes {
                let suffix = format!("{}{}", ctx.suffix, suffix);
                let created = schema.create_row(
                    id,
                    record,
                    ctx.foreign_key,
                    &suffix,
                    rows_type,
                    &self.policy,
                );
                if let Some(key) = created {
                    let single = std::slice::from_ref(record);
                    self.process_children(schema, id, single, key, &suffix, ctx.depth)?;
                }
            }
        }
        Ok(())
    }

    fn process_children(
        &mut self,
        schema: &mut Schema,
        id: TableId,
        records: &[Record],
        key: u64,
        suffix: &str,
        depth: usize,
    ) -> TransformResult<()> {
        let children = schema.table(id).children.clone();
        for child in children {
            let ctx = TransformContext {
                records,
                foreign_key: Some(key),
                suffix,
                depth: depth + 1,
            };
            self.process_table(schema, child, ctx)?;
        }
        Ok(())
    }
}
