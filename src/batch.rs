use std::time::SystemTime;

use rusoto_logs::InputLogEvent;

use crate::error::Error;
use crate::{MAX_BATCH_BYTES, MAX_BATCH_COUNT, MAX_RECORD_BYTES, RECORD_OVERHEAD};

/// One timestamped message destined for CloudWatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    timestamp: i64,
    message: String,
}

impl LogRecord {
    /// Milliseconds since the unix epoch.
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<LogRecord> for InputLogEvent {
    fn from(record: LogRecord) -> Self {
        InputLogEvent {
            message: record.message,
            timestamp: record.timestamp,
        }
    }
}

/// Records that fit into a single `PutLogEvents` call.
///
/// `size` tracks the payload CloudWatch will count for the batch: every
/// message plus [`RECORD_OVERHEAD`] bytes per record.
#[derive(Debug, Default)]
pub struct LogEventBatch {
    records: Vec<LogRecord>,
    size: usize,
}

impl LogEventBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn records(&self) -> &[LogRecord] {
        &self.records
    }

    pub fn is_full(&self) -> bool {
        self.records.len() >= MAX_BATCH_COUNT || self.size >= MAX_BATCH_BYTES
    }

    pub fn can_add(&self, message: &str) -> bool {
        !self.is_full() && self.size + message.len() + RECORD_OVERHEAD <= MAX_BATCH_BYTES
    }

    /// Appends `message` stamped with the current time.
    ///
    /// Nothing is modified when the record is rejected.
    pub fn add(&mut self, message: impl Into<String>) -> Result<(), Error> {
        let message = message.into();
        if !self.can_add(&message) {
            return Err(Error::BatchFull { size: self.size });
        }
        if message.len() > MAX_RECORD_BYTES {
            return Err(Error::RecordTooLarge {
                size: message.len(),
            });
        }

        self.size += message.len() + RECORD_OVERHEAD;
        self.records.push(LogRecord {
            timestamp: timestamp(),
            message,
        });
        Ok(())
    }

    pub fn into_input_log_events(self) -> Vec<InputLogEvent> {
        self.records.into_iter().map(InputLogEvent::from).collect()
    }
}

/// Returns current unix timestamp in milliseconds
fn timestamp() -> i64 {
    match SystemTime::now().duration_since(SystemTime::UNIX_EPOCH) {
        Ok(duration) => i64::try_from(duration.as_millis()).unwrap_or(i64::MAX),
        Err(err) => -i64::try_from(err.duration().as_millis()).unwrap_or(i64::MAX),
    }
}
