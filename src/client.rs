use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::{BoxStream, StreamExt};
use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fixed path of the prompt endpoint, resolved against the server URL.
pub const PROMPT_PATH: &str = "/customer/prompt";

/// Body of `POST /customer/prompt`. Field order is part of the wire format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptRequest {
    pub prompt: String,
    pub use_rag: bool,
}

/// Raw response body chunks, in arrival order.
pub type ChunkStream = BoxStream<'static, Result<Bytes, ClientError>>;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid server url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("server responded with status {status}")]
    Status { status: StatusCode, body: String },

    #[error("failed to read response stream: {0}")]
    Stream(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Opens a streamed response for one prompt.
#[async_trait]
pub trait PromptTransport: Send + Sync {
    /// Send the request. Resolves once the response head has arrived with a
    /// success status; the body is then read through the returned stream.
    async fn open(&self, request: &PromptRequest) -> Result<ChunkStream, ClientError>;
}

/// Resolve the prompt endpoint against a server base URL.
pub fn endpoint_url(server_url: &str) -> Result<Url, ClientError> {
    let invalid = |reason: String| ClientError::InvalidUrl {
        url: server_url.to_string(),
        reason,
    };

    let base = Url::parse(server_url.trim()).map_err(|e| invalid(e.to_string()))?;
    match base.scheme() {
        "http" | "https" => {}
        other => return Err(invalid(format!("unsupported scheme '{}'", other))),
    }
    if base.cannot_be_a_base() || base.host_str().is_none() {
        return Err(invalid("missing host".to_string()));
    }
    base.join(PROMPT_PATH).map_err(|e| invalid(e.to_string()))
}

#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    endpoint: Url,
}

impl HttpTransport {
    pub fn new(server_url: &str) -> Result<Self, ClientError> {
        Ok(Self {
            client: Client::new(),
            endpoint: endpoint_url(server_url)?,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl PromptTransport for HttpTransport {
    async fn open(&self, request: &PromptRequest) -> Result<ChunkStream, ClientError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(request)
            .send()
            .await
            .map_err(|source| ClientError::Transport {
                url: self.endpoint.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Status { status, body });
        }

        let chunks = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| ClientError::Stream(Box::new(e))));
        Ok(chunks.boxed())
    }
}
