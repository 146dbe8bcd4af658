use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;
use rusoto_core::Region;
use rusoto_logs::CloudWatchLogsClient;
use tokio::runtime::Builder;
use tokio::sync::oneshot;
use tracing::{debug, error};
use tracing_subscriber::fmt::MakeWriter;

use crate::client::LogsApi;
use crate::engine::{daily_log_stream, DeliveryEngine, MakeLogStream, Producer};
use crate::error::{Error, FlushError};
use crate::logger::{Fields, Level, Logger};
use crate::worker::{flush_loop, mark_flusher_thread, report_with_tracing, ReportFlushError};
use crate::writer::LogWriter;

/// Five `PutLogEvents` calls per second, the per-stream CloudWatch quota.
const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_millis(200);

pub struct CloudWatchLoggerBuilder {
    client: Option<Arc<dyn LogsApi>>,
    region: Region,
    log_group: String,
    global_fields: Fields,
    make_log_stream: MakeLogStream,
    flush_interval: Duration,
    report: ReportFlushError,
}

impl CloudWatchLoggerBuilder {
    pub fn new(log_group: &str) -> Self {
        Self {
            client: None,
            region: Region::default(),
            log_group: log_group.to_string(),
            global_fields: Fields::new(),
            make_log_stream: Arc::new(daily_log_stream),
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            report: Arc::new(report_with_tracing),
        }
    }

    /// Sends through `client` instead of a `CloudWatchLogsClient` for the configured region.
    pub fn with_client<C>(mut self, client: C) -> Self
    where
        C: LogsApi + 'static,
    {
        self.client = Some(Arc::new(client));
        self
    }

    pub fn region(mut self, region: Region) -> Self {
        self.region = region;
        self
    }

    /// Fields written into every record unless the call sets the same key.
    pub fn global_fields(mut self, global_fields: Fields) -> Self {
        self.global_fields = global_fields;
        self
    }

    /// Picks the stream name for each flush. Defaults to the current UTC date.
    pub fn make_log_stream<F>(mut self, make_log_stream: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        self.make_log_stream = Arc::new(make_log_stream);
        self
    }

    /// Time between two flushes. Each flush sends at most one batch.
    pub fn flush_interval(mut self, flush_interval: Duration) -> Self {
        self.flush_interval = flush_interval.max(Duration::from_millis(1));
        self
    }

    /// Receives every failed flush. Defaults to a `tracing` error event.
    pub fn on_flush_error<F>(mut self, report: F) -> Self
    where
        F: Fn(&FlushError) + Send + Sync + 'static,
    {
        self.report = Arc::new(report);
        self
    }

    /// Makes sure the log group exists and starts the background flusher.
    ///
    /// Blocks until the log group check has finished. Panics when called from
    /// inside an async runtime.
    pub fn build(self) -> Result<CloudWatchLogger, Error> {
        let client: Arc<dyn LogsApi> = match self.client {
            Some(client) => client,
            None => Arc::new(CloudWatchLogsClient::new(self.region)),
        };
        let engine = DeliveryEngine::new(client, &self.log_group)
            .with_make_log_stream(self.make_log_stream);
        let producer = engine.producer();

        let runtime = Builder::new_current_thread().enable_all().build()?;
        let (ready_tx, ready_rx) = oneshot::channel();
        let (stop_tx, stop_rx) = oneshot::channel();
        let flush_interval = self.flush_interval;
        let report = self.report;

        let thread = thread::Builder::new()
            .name("cloudwatch-logs".to_string())
            .spawn(move || {
                mark_flusher_thread();
                runtime.block_on(async move {
                    let checked = engine.check_log_group().await;
                    let ok = checked.is_ok();
                    if ready_tx.send(checked).is_err() || !ok {
                        return;
                    }
                    flush_loop(engine, flush_interval, stop_rx, report).await;
                })
            })?;

        match ready_rx.blocking_recv() {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                let _ = thread.join();
                return Err(err);
            }
            Err(_) => {
                let _ = thread.join();
                return Err(Error::FlusherStopped);
            }
        }
        debug!(log_group = %self.log_group, "cloudwatch logger started");

        Ok(CloudWatchLogger {
            producer,
            global_fields: self.global_fields,
            flusher: Mutex::new(Some(Flusher { stop: stop_tx, thread })),
        })
    }
}

struct Flusher {
    stop: oneshot::Sender<()>,
    thread: JoinHandle<()>,
}

/// Logger that ships JSON records to CloudWatch Logs.
///
/// Logging calls only queue the record. A background thread sends one batch
/// per flush interval; call [`shutdown`] to send what is still queued before
/// the process exits.
///
/// [`shutdown`]: CloudWatchLogger::shutdown
pub struct CloudWatchLogger {
    producer: Producer,
    global_fields: Fields,
    flusher: Mutex<Option<Flusher>>,
}

impl CloudWatchLogger {
    /// Number of batches waiting to be sent.
    pub fn queue_depth(&self) -> usize {
        self.producer.queue_depth()
    }

    /// Raw handle onto the queue, for records that are already encoded.
    pub fn producer(&self) -> Producer {
        self.producer.clone()
    }

    /// Stops accepting records, sends everything still queued and stops the
    /// background thread. Calling it again does nothing.
    pub fn shutdown(&self) {
        let flusher = match self.flusher.lock().take() {
            Some(flusher) => flusher,
            None => return,
        };
        // A finished flusher has dropped the receiver already.
        let _ = flusher.stop.send(());
        if flusher.thread.join().is_err() {
            error!("cloudwatch flusher thread panicked");
        }
    }
}

impl Logger for CloudWatchLogger {
    fn log(&self, level: Level, fields: Fields) -> Result<(), Error> {
        let fields = fields.merge(&self.global_fields, level);
        let message = serde_json::to_string(&fields)?;
        self.producer.enqueue(&message)
    }
}

impl MakeWriter for CloudWatchLogger {
    type Writer = LogWriter;

    fn make_writer(&self) -> Self::Writer {
        LogWriter::new(self.producer.clone())
    }
}
