use serde::{Deserialize, Serialize};
use std::fmt;

use crate::api::ChatMessage;

pub const DEFAULT_CHAT_TITLE: &str = "New chat";

/// Role attached to every message in a [`Chat`].
///
/// The set is closed: completion services only understand these three
/// wire names, and anything else is rejected instead of being coerced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

/// A wire role name outside of `system`/`user`/`assistant`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownRoleError {
    pub role: String,
}

impl fmt::Display for UnknownRoleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid message role: {}", self.role)
    }
}

impl std::error::Error for UnknownRoleError {}

impl MessageRole {
    pub const ALL: [MessageRole; 3] = [
        MessageRole::System,
        MessageRole::User,
        MessageRole::Assistant,
    ];

    pub fn as_wire(self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }

    pub fn from_wire(role: &str) -> Result<Self, UnknownRoleError> {
        Self::try_from(role)
    }

    /// Marker shown next to messages in the terminal surfaces.
    pub fn avatar(self) -> &'static str {
        match self {
            MessageRole::System => "📢",
            MessageRole::User => "👤",
            MessageRole::Assistant => "🤖",
        }
    }

    pub fn is_assistant(self) -> bool {
        self == MessageRole::Assistant
    }
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

impl TryFrom<&str> for MessageRole {
    type Error = UnknownRoleError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "system" => Ok(MessageRole::System),
            "user" => Ok(MessageRole::User),
            "assistant" => Ok(MessageRole::Assistant),
            _ => Err(UnknownRoleError {
                role: value.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for MessageRole {
    type Error = UnknownRoleError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::try_from(value.as_str())
    }
}

impl From<MessageRole> for String {
    fn from(value: MessageRole) -> Self {
        value.as_wire().to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }

    pub fn to_wire(&self) -> ChatMessage {
        ChatMessage {
            role: self.role.as_wire().to_string(),
            content: self.content.clone(),
        }
    }
}

/// Append-only conversation log shared by the template runner, the chat
/// UI and the shell assistant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chat {
    pub title: String,
    messages: Vec<Message>,
}

impl Default for Chat {
    fn default() -> Self {
        Self::new()
    }
}

impl Chat {
    pub fn new() -> Self {
        Self {
            title: DEFAULT_CHAT_TITLE.to_string(),
            messages: Vec::new(),
        }
    }

    pub fn add_message(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    /// Grows the title while a generated summary streams in.
    pub fn append_title(&mut self, fragment: &str) {
        self.title.push_str(fragment);
    }

    /// Ordered role/content pairs in the shape completion services expect.
    pub fn to_wire(&self) -> Vec<ChatMessage> {
        self.messages.iter().map(Message::to_wire).collect()
    }

    pub fn from_wire(messages: &[ChatMessage]) -> Result<Self, UnknownRoleError> {
        let mut chat = Chat::new();
        for message in messages {
            let role = MessageRole::from_wire(&message.role)?;
            chat.add_message(Message::new(role, message.content.clone()));
        }
        Ok(chat)
    }
}
