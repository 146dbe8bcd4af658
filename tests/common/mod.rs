//! In-memory CloudWatch Logs shared by the integration tests.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use rusoto_core::RusotoError;
use rusoto_logs::{
    CreateLogGroupError, CreateLogGroupRequest, CreateLogStreamError, CreateLogStreamRequest,
    DescribeLogGroupsError, DescribeLogGroupsRequest, DescribeLogGroupsResponse,
    DescribeLogStreamsError, DescribeLogStreamsRequest, DescribeLogStreamsResponse, LogGroup,
    LogStream, PutLogEventsError, PutLogEventsRequest, PutLogEventsResponse,
};
use rusoto_structured_logs::LogsApi;

#[derive(Default)]
pub struct Recorded {
    pub groups: Vec<String>,
    pub streams: Vec<String>,
    pub puts: Vec<PutLogEventsRequest>,
    pub reject_first_put: bool,
}

#[derive(Clone, Default)]
pub struct FakeCloudWatch {
    pub recorded: Arc<Mutex<Recorded>>,
}

impl FakeCloudWatch {
    pub fn messages(&self) -> Vec<String> {
        let recorded = self.recorded.lock();
        recorded
            .puts
            .iter()
            .flat_map(|put| put.log_events.iter().map(|event| event.message.clone()))
            .collect()
    }
}

#[async_trait]
impl LogsApi for FakeCloudWatch {
    async fn describe_log_groups(
        &self,
        _input: DescribeLogGroupsRequest,
    ) -> Result<DescribeLogGroupsResponse, RusotoError<DescribeLogGroupsError>> {
        let recorded = self.recorded.lock();
        Ok(DescribeLogGroupsResponse {
            log_groups: Some(
                recorded
                    .groups
                    .iter()
                    .map(|name| LogGroup {
                        log_group_name: Some(name.clone()),
                        ..Default::default()
                    })
                    .collect(),
            ),
            next_token: None,
        })
    }

    async fn create_log_group(
        &self,
        input: CreateLogGroupRequest,
    ) -> Result<(), RusotoError<CreateLogGroupError>> {
        self.recorded.lock().groups.push(input.log_group_name);
        Ok(())
    }

    async fn describe_log_streams(
        &self,
        _input: DescribeLogStreamsRequest,
    ) -> Result<DescribeLogStreamsResponse, RusotoError<DescribeLogStreamsError>> {
        let recorded = self.recorded.lock();
        Ok(DescribeLogStreamsResponse {
            log_streams: Some(
                recorded
                    .streams
                    .iter()
                    .map(|name| LogStream {
                        log_stream_name: Some(name.clone()),
                        ..Default::default()
                    })
                    .collect(),
            ),
            next_token: None,
        })
    }

    async fn create_log_stream(
        &self,
        input: CreateLogStreamRequest,
    ) -> Result<(), RusotoError<CreateLogStreamError>> {
        self.recorded.lock().streams.push(input.log_stream_name);
        Ok(())
    }

    async fn put_log_events(
        &self,
        input: PutLogEventsRequest,
    ) -> Result<PutLogEventsResponse, RusotoError<PutLogEventsError>> {
        let mut recorded = self.recorded.lock();
        if recorded.reject_first_put {
            recorded.reject_first_put = false;
            return Err(RusotoError::Service(PutLogEventsError::InvalidSequenceToken(
                "The given sequenceToken is invalid. The next expected sequenceToken is: 42"
                    .to_string(),
            )));
        }
        recorded.puts.push(input);
        Ok(PutLogEventsResponse {
            next_sequence_token: Some(format!("seq-{}", recorded.puts.len())),
            ..Default::default()
        })
    }
}
