//! In-memory transport for driving exchanges without a server.

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::{self, StreamExt};
use reqwest::StatusCode;
use std::collections::VecDeque;
use std::sync::Mutex;

use crate::client::{ChunkStream, ClientError, PromptRequest, PromptTransport};

/// What the fake server does for one request.
pub enum Script {
    Status(u16),
    Stream(Vec<Result<Vec<u8>, String>>),
}

impl Script {
    pub fn chunks(chunks: &[&[u8]]) -> Self {
        Script::Stream(chunks.iter().map(|c| Ok(c.to_vec())).collect())
    }

    pub fn failing_after(chunks: &[&[u8]], reason: &str) -> Self {
        let mut items: Vec<Result<Vec<u8>, String>> =
            chunks.iter().map(|c| Ok(c.to_vec())).collect();
        items.push(Err(reason.to_string()));
        Script::Stream(items)
    }
}

/// Plays back one script per request, in order, and records every request.
pub struct FakeTransport {
    scripts: Mutex<VecDeque<Script>>,
    requests: Mutex<Vec<PromptRequest>>,
}

impl FakeTransport {
    pub fn new(scripts: Vec<Script>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<PromptRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl PromptTransport for FakeTransport {
    async fn open(&self, request: &PromptRequest) -> Result<ChunkStream, ClientError> {
        self.requests.lock().unwrap().push(request.clone());
        let script = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .expect("no script left for request");

        match script {
            Script::Status(code) => Err(ClientError::Status {
                status: StatusCode::from_u16(code).unwrap(),
                body: "Internal server error".to_string(),
            }),
            Script::Stream(items) => {
                let items = items.into_iter().map(|item| {
                    item.map(Bytes::from)
                        .map_err(|reason| ClientError::Stream(reason.into()))
                });
                Ok(stream::iter(items).boxed())
            }
        }
    }
}
