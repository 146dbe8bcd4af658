use async_trait::async_trait;
use rusoto_core::RusotoError;
use rusoto_logs::{
    CloudWatchLogs, CloudWatchLogsClient, CreateLogGroupError, CreateLogGroupRequest,
    CreateLogStreamError, CreateLogStreamRequest, DescribeLogGroupsError,
    DescribeLogGroupsRequest, DescribeLogGroupsResponse, DescribeLogStreamsError,
    DescribeLogStreamsRequest, DescribeLogStreamsResponse, PutLogEventsError,
    PutLogEventsRequest, PutLogEventsResponse,
};

/// The CloudWatch Logs operations the delivery engine needs.
///
/// Implemented for [`CloudWatchLogsClient`]; tests and alternative transports
/// can implement it directly.
#[async_trait]
pub trait LogsApi: Send + Sync {
    async fn describe_log_groups(
        &self,
        input: DescribeLogGroupsRequest,
    ) -> Result<DescribeLogGroupsResponse, RusotoError<DescribeLogGroupsError>>;

    async fn create_log_group(
        &self,
        input: CreateLogGroupRequest,
    ) -> Result<(), RusotoError<CreateLogGroupError>>;

    async fn describe_log_streams(
        &self,
        input: DescribeLogStreamsRequest,
    ) -> Result<DescribeLogStreamsResponse, RusotoError<DescribeLogStreamsError>>;

    async fn create_log_stream(
        &self,
        input: CreateLogStreamRequest,
    ) -> Result<(), RusotoError<CreateLogStreamError>>;

    async fn put_log_events(
        &self,
        input: PutLogEventsRequest,
    ) -> Result<PutLogEventsResponse, RusotoError<PutLogEventsError>>;
}

#[async_trait]
impl LogsApi for CloudWatchLogsClient {
    async fn describe_log_groups(
        &self,
        input: DescribeLogGroupsRequest,
    ) -> Result<DescribeLogGroupsResponse, RusotoError<DescribeLogGroupsError>> {
        CloudWatchLogs::describe_log_groups(self, input).await
    }

    async fn create_log_group(
        &self,
        input: CreateLogGroupRequest,
    ) -> Result<(), RusotoError<CreateLogGroupError>> {
        CloudWatchLogs::create_log_group(self, input).await
    }

    async fn describe_log_streams(
        &self,
        input: DescribeLogStreamsRequest,
    ) -> Result<DescribeLogStreamsResponse, RusotoError<DescribeLogStreamsError>> {
        CloudWatchLogs::describe_log_streams(self, input).await
    }

    async fn create_log_stream(
        &self,
        input: CreateLogStreamRequest,
    ) -> Result<(), RusotoError<CreateLogStreamError>> {
        CloudWatchLogs::create_log_stream(self, input).await
    }

    async fn put_log_events(
        &self,
        input: PutLogEventsRequest,
    ) -> Result<PutLogEventsResponse, RusotoError<PutLogEventsError>> {
        CloudWatchLogs::put_log_events(self, input).await
    }
}
