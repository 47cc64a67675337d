//! Payload mapping, batch submission and the per-batch result log.

pub mod batch;
pub mod log;
pub mod payload;

pub use batch::{BatchRunner, BatchSummary};
pub use log::{LogEntry, MigrationLog};
pub use payload::PayloadKind;
