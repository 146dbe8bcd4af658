use std::error::Error as StdError;
use std::fmt;
use std::io;

use rusoto_core::RusotoError;
use rusoto_logs::{
    CreateLogGroupError, CreateLogStreamError, DescribeLogGroupsError, DescribeLogStreamsError,
    PutLogEventsError,
};

use crate::{MAX_BATCH_BYTES, MAX_RECORD_BYTES};

#[derive(Debug)]
pub enum Error {
    /// The batch cannot take the record without exceeding its ceilings.
    BatchFull { size: usize },
    /// A single message is larger than CloudWatch accepts.
    RecordTooLarge { size: usize },
    Serialize(serde_json::Error),
    Io(io::Error),
    /// No default logger has been installed.
    NotInitialized,
    /// The logger has been shut down and no longer accepts records.
    Closed,
    /// The background flusher exited before it finished starting up.
    FlusherStopped,
    RusotoError(RusotoError<std::convert::Infallible>),
    DescribeLogGroupsError(DescribeLogGroupsError),
    CreateLogGroupError(CreateLogGroupError),
    DescribeLogStreamsError(DescribeLogStreamsError),
    CreateLogStreamError(CreateLogStreamError),
    PutLogEventsError(PutLogEventsError),
}

macro_rules! impl_from_rusoto_error {
    ($($service:ident => $variant:ident),* $(,)?) => {
        $(
            impl From<RusotoError<$service>> for Error {
                fn from(error: RusotoError<$service>) -> Self {
                    match error {
                        RusotoError::Service(error) => Self::$variant(error),
                        RusotoError::HttpDispatch(err) => Self::RusotoError(RusotoError::HttpDispatch(err)),
                        RusotoError::Credentials(err) => Self::RusotoError(RusotoError::Credentials(err)),
                        RusotoError::Validation(msg) => Self::RusotoError(RusotoError::Validation(msg)),
                        RusotoError::ParseError(msg) => Self::RusotoError(RusotoError::ParseError(msg)),
                        RusotoError::Unknown(resp) => Self::RusotoError(RusotoError::Unknown(resp)),
                        RusotoError::Blocking => Self::RusotoError(RusotoError::Blocking),
                    }
                }
            }
        )*
    };
}

impl_from_rusoto_error! {
    DescribeLogGroupsError => DescribeLogGroupsError,
    CreateLogGroupError => CreateLogGroupError,
    DescribeLogStreamsError => DescribeLogStreamsError,
    CreateLogStreamError => CreateLogStreamError,
    PutLogEventsError => PutLogEventsError,
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialize(error)
    }
}

impl From<io::Error> for Error {
    fn from(error: io::Error) -> Self {
        Self::Io(error)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::BatchFull { size } => write!(
                f,
                "max put size of {} exceeded (batch holds {} bytes)",
                MAX_BATCH_BYTES, size
            ),
            Error::RecordTooLarge { size } => write!(
                f,
                "event size: {} is larger than the max event size: {}",
                size, MAX_RECORD_BYTES
            ),
            Error::Serialize(err) => write!(f, "failed to encode log fields: {}", err),
            Error::Io(err) => write!(f, "failed to write log line: {}", err),
            Error::NotInitialized => {
                write!(f, "logger is not initialized, install one with set_logger")
            }
            Error::Closed => write!(f, "logger has been shut down"),
            Error::FlusherStopped => {
                write!(f, "cloudwatch flusher thread stopped before the log group was checked")
            }
            Error::RusotoError(err) => write!(f, "{}", err),
            Error::DescribeLogGroupsError(err) => write!(f, "{}", err),
            Error::CreateLogGroupError(err) => write!(f, "{}", err),
            Error::DescribeLogStreamsError(err) => write!(f, "{}", err),
            Error::CreateLogStreamError(err) => write!(f, "{}", err),
            Error::PutLogEventsError(err) => write!(f, "{}", err),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Error::Serialize(ref err) => Some(err),
            Error::Io(ref err) => Some(err),
            Error::RusotoError(ref err) => StdError::source(err),
            Error::DescribeLogGroupsError(ref err) => StdError::source(err),
            Error::CreateLogGroupError(ref err) => StdError::source(err),
            Error::DescribeLogStreamsError(ref err) => StdError::source(err),
            Error::CreateLogStreamError(ref err) => StdError::source(err),
            Error::PutLogEventsError(ref err) => StdError::source(err),
            Error::BatchFull { .. } | Error::RecordTooLarge { .. } => None,
            Error::NotInitialized | Error::Closed | Error::FlusherStopped => None,
        }
    }
}

/// A failed flush cycle, reported from the background worker.
#[derive(Debug)]
pub struct FlushError {
    pub log_group: String,
    pub log_stream: String,
    /// Records lost with the popped batch. Zero when the cycle failed before popping.
    pub dropped_records: usize,
    pub error: Error,
}

impl fmt::Display for FlushError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "failed to send logs to CloudWatch ({}/{}, {} records dropped): {}",
            self.log_group, self.log_stream, self.dropped_records, self.error
        )
    }
}

impl StdError for FlushError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(&self.error)
    }
}
