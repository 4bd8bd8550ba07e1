//! Scripted transport for testing

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;

use super::{Connection, StreamRequest, Transport, TransportError};

/// One step of a scripted response body
#[derive(Debug, Clone)]
pub enum MockStep {
    /// Deliver a chunk
    Data(Bytes),
    /// Fail the read
    Fail(TransportError),
    /// Never produce anything (for timeout and cancellation tests)
    Stall,
}

impl MockStep {
    /// Chunk from a string
    pub fn data(chunk: impl Into<String>) -> Self {
        Self::Data(Bytes::from(chunk.into()))
    }
}

/// Transport that replays a fixed script
///
/// `open` fails with the configured error or succeeds with a connection that
/// yields the steps in order and then ends the body. Every request passed to
/// `open` is recorded.
#[derive(Debug, Clone)]
pub struct MockTransport {
    open_error: Option<TransportError>,
    steps: Vec<MockStep>,
    requests: Arc<Mutex<Vec<StreamRequest>>>,
}

impl MockTransport {
    /// Successful response whose body is `steps`
    pub fn new(steps: Vec<MockStep>) -> Self {
        Self {
            open_error: None,
            steps,
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Body split into chunks of at most `size` bytes
    pub fn chunked(body: &[u8], size: usize) -> Self {
        let steps = body
            .chunks(size.max(1))
            .map(|chunk| MockStep::Data(Bytes::copy_from_slice(chunk)))
            .collect();
        Self::new(steps)
    }

    /// Transport whose `open` always fails
    pub fn failing(error: TransportError) -> Self {
        Self {
            open_error: Some(error),
            steps: Vec::new(),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Requests seen so far
    pub fn requests(&self) -> Vec<StreamRequest> {
        self.requests.lock().clone()
    }

    /// Number of times `open` was called
    pub fn open_count(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn open(&self, request: &StreamRequest) -> Result<Box<dyn Connection>, TransportError> {
        self.requests.lock().push(request.clone());

        if let Some(error) = &self.open_error {
            return Err(error.clone());
        }

        Ok(Box::new(MockConnection {
            steps: self.steps.iter().cloned().collect(),
        }))
    }
}

struct MockConnection {
    steps: VecDeque<MockStep>,
}

#[async_trait]
impl Connection for MockConnection {
    async fn chunk(&mut self) -> Result<Option<Bytes>, TransportError> {
        match self.steps.pop_front() {
            Some(MockStep::Data(bytes)) => Ok(Some(bytes)),
            Some(MockStep::Fail(error)) => Err(error),
            Some(MockStep::Stall) => std::future::pending().await,
            None => Ok(None),
        }
    }
}
