use std::cell::Cell;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error};

use crate::client::LogsApi;
use crate::engine::DeliveryEngine;
use crate::error::FlushError;

pub(crate) type ReportFlushError = Arc<dyn Fn(&FlushError) + Send + Sync>;

thread_local! {
    static FLUSHER_THREAD: Cell<bool> = Cell::new(false);
}

/// Marks the current thread as the one running [`flush_loop`].
///
/// [`LogWriter`](crate::LogWriter) drops lines written from a marked thread,
/// so the flusher's own `tracing` events never feed the queue it drains.
pub(crate) fn mark_flusher_thread() {
    FLUSHER_THREAD.with(|flag| flag.set(true));
}

pub(crate) fn on_flusher_thread() -> bool {
    FLUSHER_THREAD.with(Cell::get)
}

/// Default sink for background flush failures.
pub(crate) fn report_with_tracing(err: &FlushError) {
    error!(
        log_group = %err.log_group,
        log_stream = %err.log_stream,
        dropped_records = err.dropped_records,
        error = %err.error,
        "failed to send logs to CloudWatch"
    );
}

/// Flushes one batch per `period` until `stop` fires or its sender is dropped,
/// then closes the queue and drains what is left at the same pace.
pub(crate) async fn flush_loop<C>(
    mut engine: DeliveryEngine<C>,
    period: Duration,
    mut stop: oneshot::Receiver<()>,
    report: ReportFlushError,
) where
    C: LogsApi + ?Sized + 'static,
{
    let mut ticker = time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(err) = engine.flush().await {
                    report(&err);
                }
            }
            _ = &mut stop => break,
        }
    }

    engine.close();
    let mut remaining = engine.queue_depth();
    debug!(batches = remaining, "draining log queue");
    while remaining > 0 {
        ticker.tick().await;
        if let Err(err) = engine.flush().await {
            report(&err);
        }
        let depth = engine.queue_depth();
        if depth >= remaining {
            // The stream could not be verified; nothing more will get through.
            break;
        }
        remaining = depth;
    }
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;
    use rusoto_core::RusotoError;
    use rusoto_logs::PutLogEventsError;
    use tracing_test::traced_test;

    use super::*;
    use crate::client::mock::MockLogs;
    use crate::error::Error;

    const GROUP: &str = "worker-logs";

    fn collecting_reporter() -> (ReportFlushError, Arc<Mutex<Vec<String>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let report: ReportFlushError = Arc::new(move |err: &FlushError| {
            sink.lock().push(err.to_string());
        });
        (report, seen)
    }

    #[tokio::test]
    async fn stop_drains_every_queued_batch() {
        let mock = Arc::new(MockLogs::with_group(GROUP));
        let engine = DeliveryEngine::new(mock.clone(), GROUP);
        let producer = engine.producer();
        for i in 0..3 {
            producer.enqueue(&format!("record {}", i)).unwrap();
        }
        let (report, seen) = collecting_reporter();
        let (stop_tx, stop_rx) = oneshot::channel();
        stop_tx.send(()).unwrap();

        flush_loop(engine, Duration::from_millis(1), stop_rx, report).await;

        assert_eq!(mock.put_messages(), ["record 0", "record 1", "record 2"]);
        assert!(seen.lock().is_empty());
        assert!(matches!(producer.enqueue("late"), Err(Error::Closed)));
    }

    #[tokio::test]
    async fn dropped_stop_sender_also_drains() {
        let mock = Arc::new(MockLogs::with_group(GROUP));
        let engine = DeliveryEngine::new(mock.clone(), GROUP);
        let producer = engine.producer();
        for _ in 0..3 {
            producer.start_new_batch();
            producer.enqueue("x").unwrap();
        }
        assert_eq!(producer.queue_depth(), 3);
        let (report, _) = collecting_reporter();
        let (stop_tx, stop_rx) = oneshot::channel();
        drop(stop_tx);

        flush_loop(engine, Duration::from_millis(1), stop_rx, report).await;

        assert_eq!(mock.state.lock().puts.len(), 3);
        assert_eq!(producer.queue_depth(), 0);
    }

    #[tokio::test]
    async fn failures_are_reported_and_the_loop_keeps_going() {
        let mock = Arc::new(MockLogs::with_group(GROUP));
        mock.script_put(Err(RusotoError::Service(
            PutLogEventsError::ServiceUnavailable("unavailable".to_string()),
        )));
        let engine = DeliveryEngine::new(mock.clone(), GROUP);
        let producer = engine.producer();
        let (report, seen) = collecting_reporter();
        let (stop_tx, stop_rx) = oneshot::channel();

        let handle = tokio::spawn(flush_loop(engine, Duration::from_millis(1), stop_rx, report));
        producer.enqueue("dropped").unwrap();
        while mock.state.lock().puts.is_empty() {
            time::sleep(Duration::from_millis(1)).await;
        }
        producer.enqueue("delivered").unwrap();
        stop_tx.send(()).unwrap();
        handle.await.unwrap();

        assert_eq!(mock.put_messages(), ["dropped", "delivered"]);
        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].contains("1 records dropped"));
    }

    #[tokio::test]
    async fn drain_gives_up_when_the_stream_cannot_be_verified() {
        let mock = Arc::new(MockLogs::with_group(GROUP));
        mock.state.lock().fail_describe_streams = true;
        let engine = DeliveryEngine::new(mock.clone(), GROUP);
        let producer = engine.producer();
        producer.enqueue("stuck").unwrap();
        let (report, seen) = collecting_reporter();
        let (stop_tx, stop_rx) = oneshot::channel();
        stop_tx.send(()).unwrap();

        flush_loop(engine, Duration::from_millis(1), stop_rx, report).await;

        assert_eq!(producer.queue_depth(), 1);
        assert!(!seen.lock().is_empty());
    }

    #[test]
    #[traced_test]
    fn default_reporter_emits_an_error_event() {
        report_with_tracing(&FlushError {
            log_group: GROUP.to_string(),
            log_stream: "2024-03-01".to_string(),
            dropped_records: 4,
            error: Error::Closed,
        });

        assert!(logs_contain("failed to send logs to CloudWatch"));
        assert!(logs_contain("dropped_records=4"));
    }
}
