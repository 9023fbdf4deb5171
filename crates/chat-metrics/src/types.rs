use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Free-form diagnostic fields attached to messages and errors.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MessageEvent {
    /// Receipt time, assigned by the aggregator's clock.
    pub timestamp: DateTime<Utc>,
    pub text: String,
    pub is_user: bool,
    #[serde(default)]
    pub metadata: Metadata,
}

impl MessageEvent {
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(|value| value.as_str())
    }
}

/// Message history of one sender/session.
///
/// `user_message_count + bot_message_count == messages.len()` holds after
/// every [`ConversationLog::push`].
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConversationLog {
    pub id: String,
    pub start_time: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub messages: Vec<MessageEvent>,
    pub user_message_count: u64,
    pub bot_message_count: u64,
    #[serde(skip)]
    pub(crate) sequence: u64,
}

impl ConversationLog {
    pub(crate) fn new(id: impl Into<String>, sequence: u64, started_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            start_time: started_at,
            last_activity: started_at,
            messages: Vec::new(),
            user_message_count: 0,
            bot_message_count: 0,
            sequence,
        }
    }

    pub(crate) fn push(&mut self, event: MessageEvent) {
        if event.is_user {
            self.user_message_count += 1;
        } else {
            self.bot_message_count += 1;
        }
        self.last_activity = event.timestamp;
        self.messages.push(event);
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEvent {
    pub timestamp: DateTime<Utc>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    #[serde(default)]
    pub context: Metadata,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GlobalStats {
    pub total_messages: u64,
    pub total_users: u64,
    /// Running mean in seconds, see [`crate::latency::fold_weighted_mean`].
    pub avg_response_time: f64,
    /// Percentage of recorded errors relative to recorded messages.
    pub error_rate: f64,
}

impl GlobalStats {
    pub(crate) fn refresh_error_rate(&mut self, error_count: usize) {
        self.error_rate = if self.total_messages == 0 {
            0.0
        } else {
            error_count as f64 / self.total_messages as f64 * 100.0
        };
    }
}
