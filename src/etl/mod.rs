//! Task and workflow drivers.
//!
//! A [`Task`] ties a rules document to a data source:
//!
//! ```text
//! generate schema ─► create tables ─► for each batch of record ids:
//!                                       extract ─► transform ─► store
//! ```
//!
//! A [`Workflow`] runs the tasks of a config file, merging the schemas of
//! tasks that share a database.

mod error;
pub mod load;
mod run_log;
mod task;
mod workflow;

pub use error::{EtlError, EtlResult};
pub use load::CreateOptions;
pub use run_log::RunLog;
pub use task::{Task, TaskReport};
pub use workflow::{Destination, Workflow};
