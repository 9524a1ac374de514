use crate::{HttpTransport, StreamRequest, TransportError, TransportResponse};
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use futures::stream;
use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex, PoisonError};

/// One scripted piece of a mock response body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MockChunk {
    Data(Bytes),
    ReadError(String),
}

#[derive(Clone, Debug)]
enum MockResponse {
    Failure(TransportError),
    Body {
        status: u16,
        chunks: Vec<MockChunk>,
        hold_open: bool,
    },
}

#[derive(Debug, Default)]
struct MockTransportState {
    responses: VecDeque<MockResponse>,
    requests: Vec<StreamRequest>,
}

/// In-memory [`HttpTransport`] that replays scripted responses in order.
#[derive(Clone, Debug, Default)]
pub struct MockTransport {
    inner: Arc<Mutex<MockTransportState>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response whose body yields `chunks` and then ends.
    pub fn push_chunks<I, C>(&self, status: u16, chunks: I)
    where
        I: IntoIterator<Item = C>,
        C: Into<Bytes>,
    {
        self.push_script(status, data_chunks(chunks), false);
    }

    /// Queue a response whose body yields `chunks` and then never ends.
    pub fn push_pending<I, C>(&self, status: u16, chunks: I)
    where
        I: IntoIterator<Item = C>,
        C: Into<Bytes>,
    {
        self.push_script(status, data_chunks(chunks), true);
    }

    pub fn push_script(&self, status: u16, chunks: Vec<MockChunk>, hold_open: bool) {
        self.state().responses.push_back(MockResponse::Body {
            status,
            chunks,
            hold_open,
        });
    }

    /// Queue a request that fails before any response arrives.
    pub fn push_failure(&self, error: TransportError) {
        self.state().responses.push_back(MockResponse::Failure(error));
    }

    /// Requests executed so far, oldest first.
    pub fn requests(&self) -> Vec<StreamRequest> {
        self.state().requests.clone()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, MockTransportState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn data_chunks<I, C>(chunks: I) -> Vec<MockChunk>
where
    I: IntoIterator<Item = C>,
    C: Into<Bytes>,
{
    chunks
        .into_iter()
        .map(|chunk| MockChunk::Data(chunk.into()))
        .collect()
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn execute(&self, request: StreamRequest) -> Result<TransportResponse, TransportError> {
        let scripted = {
            let mut state = self.state();
            state.requests.push(request);
            state.responses.pop_front()
        };

        match scripted {
            None => Err(TransportError::Request(
                "mock transport has no scripted response".to_string(),
            )),
            Some(MockResponse::Failure(error)) => Err(error),
            Some(MockResponse::Body {
                status,
                chunks,
                hold_open,
            }) => {
                let body = stream::iter(chunks.into_iter().map(|chunk| match chunk {
                    MockChunk::Data(bytes) => Ok(bytes),
                    MockChunk::ReadError(message) => Err(io::Error::other(message)),
                }));
                let body = if hold_open {
                    body.chain(stream::pending()).boxed()
                } else {
                    body.boxed()
                };
                Ok(TransportResponse { status, body })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(flavor = "current_thread")]
    async fn mock_replays_responses_in_order_and_records_requests() {
        let transport = MockTransport::new();
        transport.push_chunks(200, ["data: a\n\n"]);
        transport.push_failure(TransportError::Request("refused".to_string()));

        let mut first = transport
            .execute(StreamRequest::get("http://mock/one"))
            .await
            .expect("first scripted response");
        assert_eq!(first.status, 200);
        let chunk = first.body.next().await.expect("one chunk").expect("data chunk");
        assert_eq!(chunk, Bytes::from("data: a\n\n"));
        assert!(first.body.next().await.is_none());

        let second = transport.execute(StreamRequest::get("http://mock/two")).await;
        assert_eq!(
            second.unwrap_err(),
            TransportError::Request("refused".to_string())
        );
        assert!(transport.execute(StreamRequest::get("http://mock/three")).await.is_err());

        let urls: Vec<String> = transport
            .requests()
            .into_iter()
            .map(|request| request.url)
            .collect();
        assert_eq!(urls, ["http://mock/one", "http://mock/two", "http://mock/three"]);
    }
}
