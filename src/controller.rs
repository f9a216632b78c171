//! Chat terminal controller
//!
//! Owns the conversation, the text input and the RAG toggle. Submitting turns
//! the input into an [`Exchange`]; the caller runs it (see
//! [`crate::exchange::run_exchange`]) and feeds the resulting events back
//! through [`ChatController::apply`].

use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::client::PromptRequest;
use crate::exchange::{ExchangeEvent, ExchangeId};
use crate::state::{ChatRole, Conversation, MessageId, ERROR_TEXT, TYPING_INDICATOR};

/// A submission that still has to be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    pub id: ExchangeId,
    pub request: PromptRequest,
}

#[derive(Debug, Default)]
struct ExchangeState {
    placeholder: Option<MessageId>,
    reply: Option<MessageId>,
}

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

#[derive(Debug)]
pub struct ChatController {
    conversation: Conversation,
    input: String,
    /// Cursor position in characters, not bytes
    cursor: usize,
    use_rag: bool,
    next_exchange: u64,
    in_flight: BTreeMap<ExchangeId, ExchangeState>,
}

impl ChatController {
    pub fn new(use_rag: bool) -> Self {
        Self {
            conversation: Conversation::new(),
            input: String::new(),
            cursor: 0,
            use_rag,
            next_exchange: 0,
            in_flight: BTreeMap::new(),
        }
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn conversation_mut(&mut self) -> &mut Conversation {
        &mut self.conversation
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn use_rag(&self) -> bool {
        self.use_rag
    }

    pub fn toggle_rag(&mut self) {
        self.use_rag = !self.use_rag;
        debug!(use_rag = self.use_rag, "RAG toggled");
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// True if `id` is a typing placeholder that has not been replaced yet.
    pub fn is_placeholder(&self, id: MessageId) -> bool {
        self.in_flight
            .values()
            .any(|state| state.placeholder == Some(id))
    }

    /// Handle Enter on the input.
    ///
    /// Empty or whitespace-only input is ignored and left untouched.
    /// Otherwise the trimmed prompt is shown, the input cleared and a typing
    /// placeholder added; the returned exchange still has to be sent.
    pub fn submit(&mut self) -> Option<Exchange> {
        let prompt = self.input.trim();
        if prompt.is_empty() {
            return None;
        }
        let prompt = prompt.to_string();

        self.conversation.push(ChatRole::User, prompt.clone());
        self.input.clear();
        self.cursor = 0;

        let placeholder = self.conversation.push(ChatRole::Assistant, TYPING_INDICATOR);

        let id = ExchangeId(self.next_exchange);
        self.next_exchange += 1;
        self.in_flight.insert(
            id,
            ExchangeState {
                placeholder: Some(placeholder),
                reply: None,
            },
        );

        Some(Exchange {
            id,
            request: PromptRequest {
                prompt,
                use_rag: self.use_rag,
            },
        })
    }

    /// Apply progress reported by an exchange driver.
    pub fn apply(&mut self, event: ExchangeEvent) {
        let exchange = event.exchange();
        let Some(state) = self.in_flight.get_mut(&exchange) else {
            warn!(exchange = %exchange, event = ?event, "Event for unknown exchange");
            return;
        };

        match event {
            ExchangeEvent::Opened { .. } => {
                Self::open_reply(&mut self.conversation, state);
            }
            ExchangeEvent::Chunk { text, .. } => {
                let reply = Self::open_reply(&mut self.conversation, state);
                self.conversation.append_content(reply, &text);
            }
            ExchangeEvent::Finished { .. } => {
                if let Some(mut state) = self.in_flight.remove(&exchange) {
                    // A body-less success still replaces the placeholder.
                    Self::open_reply(&mut self.conversation, &mut state);
                }
            }
            ExchangeEvent::Failed { .. } => {
                if let Some(state) = self.in_flight.remove(&exchange) {
                    if let Some(placeholder) = state.placeholder {
                        self.conversation.remove(placeholder);
                    }
                }
                self.conversation.push(ChatRole::Error, ERROR_TEXT);
            }
        }
    }

    /// Insert the empty reply and drop the placeholder, once per exchange.
    fn open_reply(conversation: &mut Conversation, state: &mut ExchangeState) -> MessageId {
        if let Some(reply) = state.reply {
            return reply;
        }
        let reply = conversation.push(ChatRole::Assistant, "");
        if let Some(placeholder) = state.placeholder.take() {
            conversation.remove(placeholder);
        }
        state.reply = Some(reply);
        reply
    }

    // Input editing

    pub fn insert_char(&mut self, c: char) {
        let byte_pos = char_to_byte_index(&self.input, self.cursor);
        self.input.insert(byte_pos, c);
        self.cursor += 1;
    }

    pub fn backspace(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            let byte_pos = char_to_byte_index(&self.input, self.cursor);
            self.input.remove(byte_pos);
        }
    }

    pub fn delete(&mut self) {
        if self.cursor < self.input.chars().count() {
            let byte_pos = char_to_byte_index(&self.input, self.cursor);
            self.input.remove(byte_pos);
        }
    }

    pub fn cursor_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn cursor_right(&mut self) {
        self.cursor = (self.cursor + 1).min(self.input.chars().count());
    }

    pub fn cursor_home(&mut self) {
        self.cursor = 0;
    }

    pub fn cursor_end(&mut self) {
        self.cursor = self.input.chars().count();
    }

    /// Replace the whole input and move the cursor to its end.
    pub fn set_input(&mut self, text: &str) {
        self.input = text.to_string();
        self.cursor = self.input.chars().count();
    }
}
