//! Structured JSON logging to stdout or to AWS CloudWatch Logs.
//!
//! Both backends implement [`Logger`]. The CloudWatch backend queues records
//! in size-bounded batches and ships one batch per flush interval from a
//! dedicated background thread, so logging calls never wait on the network.

mod batch;
mod client;
mod cloudwatch;
mod engine;
mod error;
mod global;
mod logger;
mod queue;
mod standard;
mod worker;
mod writer;

/// Max number of records in one `PutLogEvents` call.
pub const MAX_BATCH_COUNT: usize = 10_000;
/// Max size of one `PutLogEvents` call, framing overhead included.
pub const MAX_BATCH_BYTES: usize = 1_048_576;
/// Max size of a single record's message.
pub const MAX_RECORD_BYTES: usize = 256_000;
/// Bytes CloudWatch counts against the batch size for every record on top of its message.
pub const RECORD_OVERHEAD: usize = 28;

pub use batch::{LogEventBatch, LogRecord};
pub use client::LogsApi;
pub use cloudwatch::{CloudWatchLogger, CloudWatchLoggerBuilder};
pub use engine::{DeliveryEngine, FlushOutcome, Producer};
pub use error::{Error, FlushError};
pub use global::{clear_logger, debug, error, info, set_logger};
pub use logger::{FieldValue, Fields, Level, Logger, LEVEL_KEY};
pub use queue::BatchQueue;
pub use standard::StandardLogger;
pub use writer::LogWriter;

/// Starts configuring a logger that ships records to the given CloudWatch log group.
pub fn cloudwatch(log_group: &str) -> CloudWatchLoggerBuilder {
    CloudWatchLoggerBuilder::new(log_group)
}
