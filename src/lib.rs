pub mod app;
pub mod client;
pub mod config;
pub mod controller;
pub mod decoder;
pub mod exchange;
pub mod handler;
pub mod logging;
pub mod state;
pub mod tui;
pub mod ui;

#[cfg(test)]
pub(crate) mod testing;

// Re-export main types for convenience
pub use client::{ClientError, HttpTransport, PromptRequest, PromptTransport, PROMPT_PATH};
pub use config::{Config, ConfigError};
pub use controller::{ChatController, Exchange};
pub use decoder::StreamDecoder;
pub use exchange::{run_exchange, ExchangeEvent, ExchangeId};
pub use state::{ChatMessage, ChatRole, Conversation, MessageId, ERROR_TEXT, TYPING_INDICATOR};
