//! Moving a schema into storage.

use log::debug;

use super::EtlResult;
use crate::model::Schema;
use crate::sql::LabelView;
use crate::storage::Storage;

/// How tables are created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreateOptions {
    pub drop_tables: bool,
    pub label_views: bool,
}

/// Create every table of a schema, then key constraints and label views.
///
/// The run log tables are never dropped so they accumulate across runs.
pub fn create_tables(
    schema: &Schema,
    storage: &mut dyn Storage,
    options: CreateOptions,
) -> EtlResult<()> {
    let [lookup, project_info, metadata, etl_log, etl_event_log] = schema.system_tables();
    for table in [lookup, project_info, metadata].into_iter().chain(schema.tables()) {
        debug!("Creating table '{}'", table.name);
        storage.create_table(table, options.drop_tables)?;
    }
    storage.create_table(etl_log, false)?;
    storage.create_table(etl_event_log, false)?;

    for table in schema.system_tables().into_iter().chain(schema.tables()) {
        storage.add_primary_key_constraint(table)?;
    }
    for id in schema.table_ids() {
        if let Some(parent) = schema.parent_of(id) {
            storage.add_foreign_key_constraint(schema.table(id), parent)?;
        }
    }

    if options.label_views {
        for table in schema.tables() {
            let view = LabelView::new(table, schema.lookup.name(), &schema.label_view_suffix);
            if view.is_needed() {
                storage.create_label_view(table, &schema.lookup, &schema.label_view_suffix)?;
            }
        }
    }
    Ok(())
}

/// Store and clear the lookup, project info and metadata rows.
pub fn store_system_rows(schema: &mut Schema, storage: &mut dyn Storage) -> EtlResult<usize> {
    let mut stored = 0;
    let [lookup, project_info, metadata, _, _] = schema.system_tables_mut();
    for table in [lookup, project_info, metadata] {
        stored += storage.store_rows(table)?;
        table.clear_rows();
    }
    Ok(stored)
}

/// Store and clear the rows buffered in the data tables.
pub fn store_data_rows(schema: &mut Schema, storage: &mut dyn Storage) -> EtlResult<usize> {
    let mut stored = 0;
    let ids: Vec<_> = schema.table_ids().collect();
    for id in ids {
        let table = schema.table_mut(id);
        if table.row_count() > 0 {
            stored += storage.store_rows(table)?;
            table.clear_rows();
        }
    }
    Ok(stored)
}

/// Continue key assignment after the keys already stored, so rows from
/// earlier runs or tasks keep their keys.
pub fn seed_keys(schema: &mut Schema, storage: &mut dyn Storage) -> EtlResult<()> {
    let ids: Vec<_> = schema.table_ids().collect();
    for id in ids {
        let table = schema.table_mut(id);
        if let Some(max) = storage.max_primary_key(table)? {
            table.seed_keys(max);
        }
    }
    for table in [&mut schema.etl_log, &mut schema.etl_event_log] {
        if let Some(max) = storage.max_primary_key(table)? {
            table.seed_keys(max);
        }
    }
    Ok(())
}
