use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier correlating every turn of one conversation with its checkpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ThreadId(pub String);

impl ThreadId {
    /// Creates a new random thread identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Returns the raw thread identifier string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ThreadId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ThreadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ThreadId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ThreadId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Per-run session configuration passed to every runtime call.
///
/// Created once at startup and never mutated; the thread id is the only
/// key into the runtime's checkpoint store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Conversation thread this run reads and writes.
    pub thread_id: ThreadId,
}

impl SessionConfig {
    /// Creates a session bound to a fresh thread.
    pub fn new() -> Self {
        Self {
            thread_id: ThreadId::new(),
        }
    }

    /// Creates a session bound to an existing thread.
    pub fn with_thread(thread_id: impl Into<ThreadId>) -> Self {
        Self {
            thread_id: thread_id.into(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Message role in a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Message authored by an end user.
    User,
    /// Message authored by the assistant/agent.
    Assistant,
    /// System-level instruction message.
    System,
    /// Tool execution result message.
    Tool,
}

/// A fresh message submitted as the input of a turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputMessage {
    /// Author role, normally [`Role::User`].
    pub role: Role,
    /// Message text.
    pub content: String,
}

impl InputMessage {
    /// Creates a user-role input message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thread_id_new_creates_unique_values() {
        let a = ThreadId::new();
        let b = ThreadId::new();
        assert!(!a.as_str().is_empty());
        assert_ne!(a, b);
    }

    #[test]
    fn session_config_with_thread_keeps_id() {
        let session = SessionConfig::with_thread("thread-7");
        assert_eq!(session.thread_id.as_str(), "thread-7");
        assert_eq!(session.thread_id.to_string(), "thread-7");
    }

    #[test]
    fn input_message_serializes_lowercase_role() {
        let json = serde_json::to_value(InputMessage::user("hi")).expect("serialize");
        assert_eq!(json, serde_json::json!({"role": "user", "content": "hi"}));
    }
}
