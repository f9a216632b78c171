//! UI-agnostic conversation state
//!
//! The conversation is an explicit ordered list of messages, independent of
//! the terminal that renders it. Renderers learn about mutations by draining
//! the change feed instead of inspecting the list after every event.

use std::fmt;

/// Content of the placeholder shown until the response stream opens.
pub const TYPING_INDICATOR: &str = "Assistant is typing...";

/// The only failure text ever shown to the user.
pub const ERROR_TEXT: &str = "Error connecting to the server. Please try again.";

/// The role of a chat message, which also selects how it is styled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    User,
    Assistant,
    Error,
}

/// Handle to a message; stays valid after other messages are removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(u64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "m{}", self.0)
    }
}

/// A chat message in the conversation
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub id: MessageId,
    pub role: ChatRole,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationChange {
    Appended(MessageId),
    Updated(MessageId),
    Removed(MessageId),
}

impl ConversationChange {
    /// Appends and content updates pin the view to the newest output.
    pub fn wants_scroll_to_bottom(&self) -> bool {
        matches!(
            self,
            ConversationChange::Appended(_) | ConversationChange::Updated(_)
        )
    }
}

/// Ordered message list; insertion order is chronological order.
#[derive(Debug, Default)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
    next_id: u64,
    changes: Vec<ConversationChange>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message as the last entry and return its handle.
    pub fn push(&mut self, role: ChatRole, content: impl Into<String>) -> MessageId {
        let id = MessageId(self.next_id);
        self.next_id += 1;
        self.messages.push(ChatMessage {
            id,
            role,
            content: content.into(),
        });
        self.changes.push(ConversationChange::Appended(id));
        id
    }

    /// Append text to an existing message. Returns false if the message is gone.
    pub fn append_content(&mut self, id: MessageId, text: &str) -> bool {
        match self.messages.iter_mut().find(|m| m.id == id) {
            Some(message) => {
                if !text.is_empty() {
                    message.content.push_str(text);
                    self.changes.push(ConversationChange::Updated(id));
                }
                true
            }
            None => false,
        }
    }

    /// Remove a message. Removing an unknown or already removed id is a no-op.
    pub fn remove(&mut self, id: MessageId) -> Option<ChatMessage> {
        let idx = self.messages.iter().position(|m| m.id == id)?;
        let removed = self.messages.remove(idx);
        self.changes.push(ConversationChange::Removed(id));
        Some(removed)
    }

    pub fn get(&self, id: MessageId) -> Option<&ChatMessage> {
        self.messages.iter().find(|m| m.id == id)
    }

    pub fn contains(&self, id: MessageId) -> bool {
        self.get(id).is_some()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    #[cfg(test)]
    pub fn count_role(&self, role: ChatRole) -> usize {
        self.messages.iter().filter(|m| m.role == role).count()
    }

    /// Take every change recorded since the last drain, oldest first.
    pub fn drain_changes(&mut self) -> Vec<ConversationChange> {
        std::mem::take(&mut self.changes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_preserves_insertion_order() {
        let mut convo = Conversation::new();
        let a = convo.push(ChatRole::User, "first");
        let b = convo.push(ChatRole::Assistant, "second");

        let ids: Vec<MessageId> = convo.messages().iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![a, b]);
        assert!(a < b);
    }

    #[test]
    fn test_ids_not_reused_after_remove() {
        let mut convo = Conversation::new();
        let a = convo.push(ChatRole::Assistant, TYPING_INDICATOR);
        convo.remove(a);
        let b = convo.push(ChatRole::Assistant, "");
        assert_ne!(a, b);
        assert!(!convo.contains(a));
    }

    #[test]
    fn test_append_content_to_removed_message() {
        let mut convo = Conversation::new();
        let id = convo.push(ChatRole::Assistant, "");
        convo.remove(id);
        assert!(!convo.append_content(id, "late"));
        assert!(convo.is_empty());
    }

    #[test]
    fn test_remove_twice_is_noop() {
        let mut convo = Conversation::new();
        let id = convo.push(ChatRole::Assistant, TYPING_INDICATOR);
        assert!(convo.remove(id).is_some());
        assert!(convo.remove(id).is_none());
    }

    #[test]
    fn test_change_feed() {
        let mut convo = Conversation::new();
        let id = convo.push(ChatRole::Assistant, "");
        convo.append_content(id, "hi");
        convo.append_content(id, "");
        convo.remove(id);

        assert_eq!(
            convo.drain_changes(),
            vec![
                ConversationChange::Appended(id),
                ConversationChange::Updated(id),
                ConversationChange::Removed(id),
            ]
        );
        assert!(convo.drain_changes().is_empty());
    }
}
