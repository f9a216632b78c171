//! Drives one prompt submission from request to end of stream.
//!
//! The driver runs on its own task and never touches the conversation. It
//! reports progress as [`ExchangeEvent`]s and the owner of the conversation
//! applies them in arrival order.

use futures_util::StreamExt;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, info};

use crate::client::{ClientError, PromptRequest, PromptTransport};
use crate::decoder::StreamDecoder;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExchangeId(pub(crate) u64);

impl fmt::Display for ExchangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "x{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExchangeEvent {
    /// Success status received; the body stream is about to be read.
    Opened { exchange: ExchangeId },
    /// Decoded text, never empty.
    Chunk { exchange: ExchangeId, text: String },
    Finished { exchange: ExchangeId },
    /// Any failure. Detail goes to the log, not the event.
    Failed { exchange: ExchangeId },
}

impl ExchangeEvent {
    pub fn exchange(&self) -> ExchangeId {
        match self {
            ExchangeEvent::Opened { exchange }
            | ExchangeEvent::Chunk { exchange, .. }
            | ExchangeEvent::Finished { exchange }
            | ExchangeEvent::Failed { exchange } => *exchange,
        }
    }
}

/// Run one exchange to completion, reporting through `tx`.
///
/// Returns early without error if the receiving side has gone away.
pub async fn run_exchange<T>(
    transport: Arc<dyn PromptTransport>,
    exchange: ExchangeId,
    request: PromptRequest,
    tx: UnboundedSender<T>,
) where
    T: From<ExchangeEvent> + Send,
{
    info!(
        exchange = %exchange,
        prompt_chars = request.prompt.chars().count(),
        use_rag = request.use_rag,
        "Sending prompt"
    );

    match stream_response(transport.as_ref(), exchange, &request, &tx).await {
        Ok(()) => {
            info!(exchange = %exchange, "Response stream complete");
            emit(&tx, ExchangeEvent::Finished { exchange });
        }
        Err(err) => {
            match &err {
                ClientError::Status { status, body } => {
                    error!(exchange = %exchange, status = %status, body = %body, "Error while streaming response");
                }
                other => {
                    error!(exchange = %exchange, error = %other, detail = ?other, "Error while streaming response");
                }
            }
            emit(&tx, ExchangeEvent::Failed { exchange });
        }
    }
}

/// False once the receiver is gone.
fn emit<T: From<ExchangeEvent>>(tx: &UnboundedSender<T>, event: ExchangeEvent) -> bool {
    tx.send(T::from(event)).is_ok()
}

async fn stream_response<T>(
    transport: &dyn PromptTransport,
    exchange: ExchangeId,
    request: &PromptRequest,
    tx: &UnboundedSender<T>,
) -> Result<(), ClientError>
where
    T: From<ExchangeEvent> + Send,
{
    let mut chunks = transport.open(request).await?;
    if !emit(tx, ExchangeEvent::Opened { exchange }) {
        return Ok(());
    }

    let mut decoder = StreamDecoder::new();
    while let Some(chunk) = chunks.next().await {
        let bytes = chunk?;
        let text = decoder.decode(&bytes);
        debug!(
            exchange = %exchange,
            bytes = bytes.len(),
            chars = text.chars().count(),
            "Received chunk from server"
        );
        if !text.is_empty() && !emit(tx, ExchangeEvent::Chunk { exchange, text }) {
            debug!(exchange = %exchange, "Receiver closed, abandoning stream");
            return Ok(());
        }
    }

    let tail = decoder.finish();
    if !tail.is_empty() {
        emit(
            tx,
            ExchangeEvent::Chunk {
                exchange,
                text: tail,
            },
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeTransport, Script};
    use tokio::sync::mpsc;

    async fn collect(script: Script) -> (Vec<ExchangeEvent>, Vec<PromptRequest>) {
        let transport = Arc::new(FakeTransport::new(vec![script]));
        let (tx, mut rx) = mpsc::unbounded_channel::<ExchangeEvent>();
        let request = PromptRequest {
            prompt: "Hello".to_string(),
            use_rag: false,
        };
        run_exchange(transport.clone(), ExchangeId(7), request, tx).await;

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        (events, transport.requests())
    }

    #[tokio::test]
    async fn test_successful_stream_events() {
        let (events, requests) =
            collect(Script::chunks(&[b"Hel", b"lo ", b"there"])).await;
        let id = ExchangeId(7);

        assert_eq!(requests.len(), 1);
        assert_eq!(
            events,
            vec![
                ExchangeEvent::Opened { exchange: id },
                ExchangeEvent::Chunk { exchange: id, text: "Hel".into() },
                ExchangeEvent::Chunk { exchange: id, text: "lo ".into() },
                ExchangeEvent::Chunk { exchange: id, text: "there".into() },
                ExchangeEvent::Finished { exchange: id },
            ]
        );
    }

    #[tokio::test]
    async fn test_split_character_is_not_emitted_early() {
        let crab = "🦀".as_bytes();
        let (events, _) = collect(Script::chunks(&[&crab[..1], &crab[1..]])).await;
        let texts: Vec<&str> = events
            .iter()
            .filter_map(|e| match e {
                ExchangeEvent::Chunk { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(texts, vec!["🦀"]);
    }

    #[tokio::test]
    async fn test_status_failure() {
        let (events, _) = collect(Script::Status(500)).await;
        assert_eq!(events, vec![ExchangeEvent::Failed { exchange: ExchangeId(7) }]);
    }

    #[tokio::test]
    async fn test_mid_stream_failure() {
        let (events, _) = collect(Script::failing_after(&[b"partial"], "connection reset")).await;
        let id = ExchangeId(7);
        assert_eq!(
            events,
            vec![
                ExchangeEvent::Opened { exchange: id },
                ExchangeEvent::Chunk { exchange: id, text: "partial".into() },
                ExchangeEvent::Failed { exchange: id },
            ]
        );
    }

    #[tokio::test]
    async fn test_truncated_tail_flushed_as_replacement() {
        let crab = "🦀".as_bytes();
        let (events, _) = collect(Script::chunks(&[b"ok", &crab[..2]])).await;
        assert!(events.contains(&ExchangeEvent::Chunk {
            exchange: ExchangeId(7),
            text: "\u{FFFD}".into(),
        }));
        assert_eq!(events.last(), Some(&ExchangeEvent::Finished { exchange: ExchangeId(7) }));
    }

    #[tokio::test]
    async fn test_closed_receiver_stops_quietly() {
        let transport = Arc::new(FakeTransport::new(vec![Script::chunks(&[b"a", b"b"])]));
        let (tx, rx) = mpsc::unbounded_channel::<ExchangeEvent>();
        drop(rx);
        run_exchange(
            transport,
            ExchangeId(1),
            PromptRequest { prompt: "x".into(), use_rag: true },
            tx,
        )
        .await;
    }
}
