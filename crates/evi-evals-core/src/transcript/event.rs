//! Conversation events as delivered by the event feed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::emotion::EmotionScores;

/// Discriminant of a feed event. Only user and agent messages are dialogue.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventKind {
    UserMessage,
    AgentMessage,
    /// Any other event type (system prompts, tool calls, interruptions ...),
    /// kept verbatim.
    Other(String),
}

impl From<String> for EventKind {
    fn from(s: String) -> Self {
        match s.as_str() {
            "USER_MESSAGE" => EventKind::UserMessage,
            "AGENT_MESSAGE" => EventKind::AgentMessage,
            _ => EventKind::Other(s),
        }
    }
}

impl From<EventKind> for String {
    fn from(kind: EventKind) -> Self {
        kind.to_string()
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventKind::UserMessage => f.write_str("USER_MESSAGE"),
            EventKind::AgentMessage => f.write_str("AGENT_MESSAGE"),
            EventKind::Other(s) => f.write_str(s),
        }
    }
}

/// Who spoke a dialogue turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Speaker {
    User,
    Agent,
}

impl Speaker {
    /// Role label used in transcript lines.
    pub fn role(self) -> &'static str {
        match self {
            Speaker::User => "user",
            Speaker::Agent => "assistant",
        }
    }
}

/// One record from the event feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(rename = "type")]
    pub kind: EventKind,

    #[serde(default, rename = "message_text", alias = "messageText")]
    pub text: Option<String>,

    /// JSON-encoded emotion name → intensity mapping. May be absent or malformed.
    #[serde(default, rename = "emotion_features", alias = "emotionFeatures")]
    pub emotion_features: Option<String>,

    #[serde(
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub timestamp: Option<DateTime<Utc>>,
}

impl ConversationEvent {
    pub fn new(kind: EventKind, text: impl Into<String>) -> Self {
        Self {
            id: None,
            kind,
            text: Some(text.into()),
            emotion_features: None,
            timestamp: None,
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(EventKind::UserMessage, text)
    }

    pub fn agent(text: impl Into<String>) -> Self {
        Self::new(EventKind::AgentMessage, text)
    }

    /// A non-dialogue event such as `SYSTEM_PROMPT` or `TOOL_CALL`.
    pub fn other(kind: impl Into<String>) -> Self {
        Self {
            id: None,
            kind: EventKind::Other(kind.into()),
            text: None,
            emotion_features: None,
            timestamp: None,
        }
    }

    /// Attach an emotion vector, encoded the way the feed carries it.
    pub fn with_emotions(mut self, scores: &EmotionScores) -> Self {
        self.emotion_features = serde_json::to_string(scores).ok();
        self
    }

    /// Attach a raw emotion payload verbatim (possibly malformed).
    pub fn with_emotion_payload(mut self, payload: impl Into<String>) -> Self {
        self.emotion_features = Some(payload.into());
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn speaker(&self) -> Option<Speaker> {
        match self.kind {
            EventKind::UserMessage => Some(Speaker::User),
            EventKind::AgentMessage => Some(Speaker::Agent),
            EventKind::Other(_) => None,
        }
    }

    pub fn text(&self) -> &str {
        self.text.as_deref().unwrap_or_default()
    }
}
