//! Run log written into the destination.
//!
//! Every task run adds one `etl_log` row and one `etl_event_log` row per
//! event. Both tables accumulate across runs; they are never dropped.

use chrono::Local;
use log::info;

use super::EtlResult;
use crate::model::Schema;
use crate::storage::Storage;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

fn now() -> String {
    Local::now().format(TIME_FORMAT).to_string()
}

/// Handle to the `etl_log` row of a running task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunLog {
    log_id: u64,
}

impl RunLog {
    /// Write the `etl_log` row for a task run.
    pub fn start(
        schema: &mut Schema,
        storage: &mut dyn Storage,
        task: &str,
        project_id: u64,
    ) -> EtlResult<Self> {
        let log_id = schema.etl_log.append([
            ("log_time", now()),
            ("task", task.to_string()),
            ("project_id", project_id.to_string()),
            ("package_version", env!("CARGO_PKG_VERSION").to_string()),
        ]);
        storage.store_rows(&schema.etl_log)?;
        schema.etl_log.clear_rows();
        Ok(Self { log_id })
    }

    pub fn log_id(&self) -> u64 {
        self.log_id
    }

    /// Record an event, also reported through the logger.
    pub fn event(
        &self,
        schema: &mut Schema,
        storage: &mut dyn Storage,
        message: &str,
    ) -> EtlResult<()> {
        info!("{}", message);
        schema.etl_event_log.append([
            ("etl_log_id", self.log_id.to_string()),
            ("log_time", now()),
            ("message", message.to_string()),
        ]);
        storage.store_rows(&schema.etl_event_log)?;
        schema.etl_event_log.clear_rows();
        Ok(())
    }
}
