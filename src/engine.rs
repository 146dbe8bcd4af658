use std::fmt;
use std::sync::Arc;

use async_recursion::async_recursion;
use chrono::Utc;
use parking_lot::Mutex;
use rusoto_core::RusotoError;
use rusoto_logs::{
    CreateLogGroupError, CreateLogGroupRequest, CreateLogStreamError, CreateLogStreamRequest,
    DescribeLogGroupsRequest, DescribeLogStreamsRequest, PutLogEventsError, PutLogEventsRequest,
};
use tracing::debug;

use crate::batch::LogEventBatch;
use crate::client::LogsApi;
use crate::error::{Error, FlushError};
use crate::queue::BatchQueue;
use crate::MAX_RECORD_BYTES;

pub(crate) type MakeLogStream = Arc<dyn Fn() -> String + Send + Sync>;

/// Names the stream after the current UTC day, e.g. `2024-03-01`.
pub(crate) fn daily_log_stream() -> String {
    Utc::now().format("%Y-%m-%d").to_string()
}

/// What a single flush cycle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Nothing was queued.
    Idle,
    /// One batch was accepted by CloudWatch.
    Sent { records: usize },
}

/// Cloneable handle that queues records for a [`DeliveryEngine`].
#[derive(Clone)]
pub struct Producer {
    queue: Arc<Mutex<BatchQueue>>,
}

impl Producer {
    /// Queues `message`, splitting it when it is larger than a single record allows.
    ///
    /// Never touches the network.
    pub fn enqueue(&self, message: &str) -> Result<(), Error> {
        enqueue(&self.queue, message)
    }

    /// Number of batches waiting to be flushed.
    pub fn queue_depth(&self) -> usize {
        self.queue.lock().len()
    }

    #[cfg(test)]
    pub(crate) fn start_new_batch(&self) {
        self.queue.lock().append(LogEventBatch::new());
    }
}

impl fmt::Debug for Producer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Producer")
            .field("queue_depth", &self.queue_depth())
            .finish()
    }
}

fn enqueue(queue: &Mutex<BatchQueue>, message: &str) -> Result<(), Error> {
    let mut queue = queue.lock();
    if queue.is_closed() {
        return Err(Error::Closed);
    }

    for chunk in split_message(message) {
        let needs_batch = queue.peek_tail().map_or(true, |tail| !tail.can_add(chunk));
        if needs_batch {
            queue.append(LogEventBatch::new());
        }
        if let Some(tail) = queue.tail_mut() {
            tail.add(chunk)?;
        }
    }
    Ok(())
}

/// Cuts `message` into pieces of at most [`MAX_RECORD_BYTES`] bytes.
///
/// Cuts land on char boundaries. A JSON document split this way is no longer
/// valid JSON on the CloudWatch side; the pieces concatenate back to the input.
fn split_message(message: &str) -> impl Iterator<Item = &str> {
    let mut rest = message;
    std::iter::from_fn(move || {
        if rest.is_empty() {
            return None;
        }
        let mut end = rest.len().min(MAX_RECORD_BYTES);
        while !rest.is_char_boundary(end) {
            end -= 1;
        }
        let (chunk, tail) = rest.split_at(end);
        rest = tail;
        Some(chunk)
    })
}

/// Pulls the expected token out of an `InvalidSequenceToken` or
/// `DataAlreadyAccepted` message, e.g.
/// `The next expected sequenceToken is: 4961...`.
fn expected_sequence_token(message: &str) -> Option<String> {
    let (_, token) = message.rsplit_once(':')?;
    match token.trim() {
        "" | "null" => None,
        token => Some(token.to_string()),
    }
}

/// Ships queued batches to one CloudWatch log group.
///
/// The engine is owned by a single flusher; producers reach the queue through
/// [`Producer`] handles. The sequence token is only touched by [`flush`],
/// which keeps submissions strictly sequential.
///
/// [`flush`]: DeliveryEngine::flush
pub struct DeliveryEngine<C: ?Sized> {
    client: Arc<C>,
    log_group: String,
    make_log_stream: MakeLogStream,
    queue: Arc<Mutex<BatchQueue>>,
    sequence_token: Option<String>,
    verified_stream: Option<String>,
}

impl<C> DeliveryEngine<C>
where
    C: LogsApi + ?Sized + 'static,
{
    /// Creates an engine writing to one stream per UTC day.
    pub fn new(client: Arc<C>, log_group: &str) -> Self {
        Self {
            client,
            log_group: log_group.to_string(),
            make_log_stream: Arc::new(daily_log_stream),
            queue: Arc::new(Mutex::new(BatchQueue::new())),
            sequence_token: None,
            verified_stream: None,
        }
    }

    pub fn with_log_stream<F>(self, make_log_stream: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        self.with_make_log_stream(Arc::new(make_log_stream))
    }

    pub(crate) fn with_make_log_stream(mut self, make_log_stream: MakeLogStream) -> Self {
        self.make_log_stream = make_log_stream;
        self
    }

    pub fn log_group(&self) -> &str {
        &self.log_group
    }

    pub fn sequence_token(&self) -> Option<&str> {
        self.sequence_token.as_deref()
    }

    pub fn producer(&self) -> Producer {
        Producer {
            queue: self.queue.clone(),
        }
    }

    pub fn enqueue(&self, message: &str) -> Result<(), Error> {
        enqueue(&self.queue, message)
    }

    pub fn queue_depth(&self) -> usize {
        self.queue.lock().len()
    }

    /// Stops accepting new records. Already queued batches can still be flushed.
    pub(crate) fn close(&self) {
        self.queue.lock().close();
    }

    /// Creates the log group unless it already exists.
    pub async fn check_log_group(&self) -> Result<(), Error> {
        if self.log_group_exists(None).await? {
            return Ok(());
        }

        debug!(log_group = %self.log_group, "creating log group");
        let input = CreateLogGroupRequest {
            log_group_name: self.log_group.clone(),
            ..Default::default()
        };
        match self.client.create_log_group(input).await {
            Ok(()) => Ok(()),
            Err(RusotoError::Service(CreateLogGroupError::ResourceAlreadyExists(_))) => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    /// Makes sure the stream for the current period exists and returns its name.
    pub async fn check_log_stream(&mut self) -> Result<String, Error> {
        let log_stream = (self.make_log_stream)();
        self.ensure_log_stream(&log_stream).await?;
        Ok(log_stream)
    }

    async fn ensure_log_stream(&mut self, log_stream: &str) -> Result<(), Error> {
        if self.verified_stream.as_deref() == Some(log_stream) {
            return Ok(());
        }

        if !self.log_stream_exists(log_stream, None).await? {
            debug!(log_group = %self.log_group, log_stream, "creating log stream");
            let input = CreateLogStreamRequest {
                log_group_name: self.log_group.clone(),
                log_stream_name: log_stream.to_string(),
            };
            match self.client.create_log_stream(input).await {
                Ok(()) => {}
                Err(RusotoError::Service(CreateLogStreamError::ResourceAlreadyExists(_))) => {}
                Err(err) => return Err(err.into()),
            }
        }

        // Tokens are per stream.
        self.sequence_token = None;
        self.verified_stream = Some(log_stream.to_string());
        Ok(())
    }

    #[async_recursion]
    async fn log_group_exists(&self, next_token: Option<String>) -> Result<bool, Error> {
        let input = DescribeLogGroupsRequest {
            log_group_name_prefix: Some(self.log_group.clone()),
            next_token,
            ..Default::default()
        };
        let output = self.client.describe_log_groups(input).await?;

        let found = output
            .log_groups
            .unwrap_or_default()
            .iter()
            .any(|group| group.log_group_name.as_deref() == Some(self.log_group.as_str()));
        match output.next_token {
            Some(token) if !found => self.log_group_exists(Some(token)).await,
            _ => Ok(found),
        }
    }

    #[async_recursion]
    async fn log_stream_exists(
        &self,
        log_stream: &str,
        next_token: Option<String>,
    ) -> Result<bool, Error> {
        let input = DescribeLogStreamsRequest {
            log_group_name: self.log_group.clone(),
            log_stream_name_prefix: Some(log_stream.to_string()),
            next_token,
            ..Default::default()
        };
        let output = self.client.describe_log_streams(input).await?;

        let found = output
            .log_streams
            .unwrap_or_default()
            .iter()
            .any(|stream| stream.log_stream_name.as_deref() == Some(log_stream));
        match output.next_token {
            Some(token) if !found => self.log_stream_exists(log_stream, Some(token)).await,
            _ => Ok(found),
        }
    }

    /// Sends the oldest queued batch.
    ///
    /// A batch popped from the queue is not put back when sending fails.
    pub async fn flush(&mut self) -> Result<FlushOutcome, FlushError> {
        if self.queue.lock().is_empty() {
            return Ok(FlushOutcome::Idle);
        }

        let log_stream = (self.make_log_stream)();
        if let Err(error) = self.ensure_log_stream(&log_stream).await {
            return Err(self.flush_error(log_stream, 0, error));
        }

        let batch = self.queue.lock().pop_head();
        let batch = match batch {
            Some(batch) => batch,
            None => return Ok(FlushOutcome::Idle),
        };

        let records = batch.len();
        let input = PutLogEventsRequest {
            log_events: batch.into_input_log_events(),
            log_group_name: self.log_group.clone(),
            log_stream_name: log_stream.clone(),
            sequence_token: self.sequence_token.clone(),
        };
        match self.put_log_events(input).await {
            Ok(()) => {
                debug!(log_group = %self.log_group, %log_stream, records, "sent log batch");
                Ok(FlushOutcome::Sent { records })
            }
            Err(error) => Err(self.flush_error(log_stream, records, error)),
        }
    }

    async fn put_log_events(&mut self, input: PutLogEventsRequest) -> Result<(), Error> {
        let output = match self.client.put_log_events(input.clone()).await {
            Ok(output) => output,
            Err(RusotoError::Service(
                PutLogEventsError::InvalidSequenceToken(message)
                | PutLogEventsError::DataAlreadyAccepted(message),
            )) => {
                let sequence_token = expected_sequence_token(&message);
                debug!(?sequence_token, "retrying with the expected sequence token");
                let retry = PutLogEventsRequest {
                    sequence_token,
                    ..input
                };
                self.client
                    .put_log_events(retry)
                    .await
                    .map_err(|err| self.put_failed(err))?
            }
            Err(err) => return Err(self.put_failed(err)),
        };

        self.sequence_token = output.next_sequence_token;
        Ok(())
    }

    fn put_failed(&mut self, err: RusotoError<PutLogEventsError>) -> Error {
        if let RusotoError::Service(PutLogEventsError::ResourceNotFound(_)) = err {
            // Deleted behind our back; verify it again next cycle.
            self.verified_stream = None;
        }
        err.into()
    }

    fn flush_error(&self, log_stream: String, dropped_records: usize, error: Error) -> FlushError {
        FlushError {
            log_group: self.log_group.clone(),
            log_stream,
            dropped_records,
            error,
        }
    }
}
