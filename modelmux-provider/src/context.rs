use crate::error::Error;
use crate::message::{Message, MessageContent, Role};
use serde::{Deserialize, Serialize};

/// An ordered conversation: the canonical input to every adapter.
///
/// Contexts are built by appending; existing messages are never mutated.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Context {
    messages: Vec<Message>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn with_system(mut self, content: impl Into<MessageContent>) -> Self {
        self.messages.push(Message::system(content));
        self
    }

    pub fn with_user(mut self, content: impl Into<MessageContent>) -> Self {
        self.messages.push(Message::user(content));
        self
    }

    pub fn with_assistant(mut self, content: impl Into<MessageContent>) -> Self {
        self.messages.push(Message::assistant(content));
        self
    }

    pub fn with_message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Message> {
        self.messages.iter()
    }

    /// The single system message, if present.
    pub fn system_message(&self) -> Option<&Message> {
        self.messages.iter().find(|m| m.role == Role::System)
    }

    /// Messages other than the system message, in order.
    pub fn non_system_messages(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter().filter(|m| m.role != Role::System)
    }

    /// Validate every member message and the at-most-one-system-message
    /// rule providers enforce.
    pub fn validate(&self) -> Result<(), Error> {
        let system_count = self
            .messages
            .iter()
            .filter(|m| m.role == Role::System)
            .count();
        if system_count > 1 {
            return Err(Error::invalid_message(
                "context may contain at most one system message",
            ));
        }

        for message in &self.messages {
            message.validate()?;
        }

        Ok(())
    }
}

impl From<Vec<Message>> for Context {
    fn from(messages: Vec<Message>) -> Self {
        Self { messages }
    }
}

impl IntoIterator for Context {
    type Item = Message;
    type IntoIter = std::vec::IntoIter<Message>;

    fn into_iter(self) -> Self::IntoIter {
        self.messages.into_iter()
    }
}
