use std::collections::VecDeque;

use crate::batch::LogEventBatch;

/// FIFO of batches waiting to be flushed.
///
/// Producers fill the tail, the flusher pops the head. Only the tail is ever
/// appended to. The queue has no length limit; callers share it behind a
/// single mutex.
#[derive(Debug, Default)]
pub struct BatchQueue {
    batches: VecDeque<LogEventBatch>,
    closed: bool,
}

impl BatchQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    /// Number of queued batches.
    pub fn len(&self) -> usize {
        self.batches.len()
    }

    pub fn append(&mut self, batch: LogEventBatch) {
        self.batches.push_back(batch);
    }

    pub fn peek_tail(&self) -> Option<&LogEventBatch> {
        self.batches.back()
    }

    pub fn tail_mut(&mut self) -> Option<&mut LogEventBatch> {
        self.batches.back_mut()
    }

    pub fn pop_head(&mut self) -> Option<LogEventBatch> {
        self.batches.pop_front()
    }

    /// Total records across every queued batch.
    pub fn record_count(&self) -> usize {
        self.batches.iter().map(LogEventBatch::len).sum()
    }

    pub fn close(&mut self) {
        self.closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}
