//! Read-only views over the aggregator, rebuilt on every call.
//!
//! Views copy what they need out of the shared state before sorting or
//! formatting, so recording can continue while a snapshot is being built.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::aggregator::MetricsAggregator;
use crate::system::{cpu_usage, memory_usage, CpuUsage, MemoryUsage};
use crate::types::{ConversationLog, Metadata, MessageEvent};

/// Number of errors exposed by [`MetricsAggregator::error_metrics`].
pub const RECENT_ERROR_WINDOW: usize = 10;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    pub total_messages: u64,
    pub total_users: u64,
    pub avg_response_time: f64,
    pub error_rate: f64,
    pub active_conversations: usize,
    pub avg_messages_per_user: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SystemSnapshot {
    pub start_time: DateTime<Utc>,
    pub hostname: String,
    pub platform: String,
    pub arch: String,
    pub version: String,
    pub uptime: f64,
    pub memory: MemoryUsage,
    pub cpu: CpuUsage,
    pub stats: StatsSnapshot,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConversationView {
    pub id: String,
    pub start_time: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    /// Seconds since the conversation started.
    pub duration: f64,
    pub user_message_count: u64,
    pub bot_message_count: u64,
    pub messages: Vec<MessageEvent>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ErrorSummary {
    pub timestamp: DateTime<Utc>,
    pub message: String,
    pub context: Metadata,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ErrorMetrics {
    pub total_errors: usize,
    pub error_rate: f64,
    pub recent_errors: Vec<ErrorSummary>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MessageBreakdown {
    pub user_messages: u64,
    pub bot_messages: u64,
    /// Message count per `intent` metadata value.
    pub intent_distribution: BTreeMap<String, u64>,
}

impl ConversationView {
    fn from_log(log: &ConversationLog, now: DateTime<Utc>) -> Self {
        Self {
            id: log.id.clone(),
            start_time: log.start_time,
            last_activity: log.last_activity,
            duration: (now - log.start_time).num_milliseconds().max(0) as f64 / 1000.0,
            user_message_count: log.user_message_count,
            bot_message_count: log.bot_message_count,
            messages: log.messages.clone(),
        }
    }
}

impl MetricsAggregator {
    pub fn stats_snapshot(&self) -> StatsSnapshot {
        let active_conversations = self.conversation_count();
        let stats = self.stats();
        StatsSnapshot {
            total_messages: stats.total_messages,
            total_users: stats.total_users,
            avg_response_time: stats.avg_response_time,
            error_rate: stats.error_rate,
            active_conversations,
            avg_messages_per_user: stats.total_messages as f64 / stats.total_users.max(1) as f64,
        }
    }

    pub fn system_snapshot(&self) -> SystemSnapshot {
        let host = self.host();
        SystemSnapshot {
            start_time: self.started_at(),
            hostname: host.hostname.clone(),
            platform: host.platform.clone(),
            arch: host.arch.clone(),
            version: host.version.clone(),
            uptime: self.uptime_secs(),
            memory: memory_usage(),
            cpu: cpu_usage(),
            stats: self.stats_snapshot(),
            timestamp: self.now(),
        }
    }

    /// Every conversation, most recently active first. Conversations with the
    /// same `last_activity` keep their creation order.
    pub fn active_conversations(&self) -> Vec<ConversationView> {
        let now = self.now();
        let mut views: Vec<(u64, ConversationView)> = self
            .conversations
            .iter()
            .map(|entry| {
                let log = entry.value();
                (log.sequence, ConversationView::from_log(log, now))
            })
            .collect();

        views.sort_by(|(seq_a, a), (seq_b, b)| {
            b.last_activity
                .cmp(&a.last_activity)
                .then_with(|| seq_a.cmp(seq_b))
        });
        views.into_iter().map(|(_, view)| view).collect()
    }

    pub fn conversation(&self, id: &str) -> Option<ConversationView> {
        let now = self.now();
        self.conversations
            .get(id)
            .map(|entry| ConversationView::from_log(entry.value(), now))
    }

    pub fn error_metrics(&self) -> ErrorMetrics {
        let total_errors = self.error_count();
        let error_rate = self.stats().error_rate;
        let recent_errors = self
            .recent_errors(RECENT_ERROR_WINDOW)
            .into_iter()
            .map(|error| ErrorSummary {
                timestamp: error.timestamp,
                message: error.message,
                context: error.context,
            })
            .collect();

        ErrorMetrics {
            total_errors,
            error_rate,
            recent_errors,
        }
    }

    pub fn breakdown(&self) -> MessageBreakdown {
        let mut breakdown = MessageBreakdown::default();
        for entry in self.conversations.iter() {
            let log = entry.value();
            breakdown.user_messages += log.user_message_count;
            breakdown.bot_messages += log.bot_message_count;
            for intent in log.messages.iter().filter_map(|m| m.metadata_str("intent")) {
                *breakdown
                    .intent_distribution
                    .entry(intent.to_string())
                    .or_insert(0) += 1;
            }
        }
        breakdown
    }
}
