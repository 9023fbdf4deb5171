use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;

use crate::clock::{Clock, SystemClock};
use crate::latency::{fold_weighted_mean, response_latency};
use crate::system::HostIdentity;
use crate::types::{ConversationLog, ErrorEvent, GlobalStats, Metadata, MessageEvent};

/// Text stored when a payload cannot be turned into JSON.
pub const UNSERIALIZABLE_PAYLOAD: &str = "[unserializable payload]";

struct StatsState {
    stats: GlobalStats,
    errors: Vec<ErrorEvent>,
}

/// In-memory conversation metrics for the lifetime of the process.
///
/// Each conversation is locked through its map entry; global counters and
/// the error list share one mutex. Lock order is always conversation entry
/// first, then stats.
pub struct MetricsAggregator {
    clock: Arc<dyn Clock>,
    started_at: DateTime<Utc>,
    host: HostIdentity,
    pub(crate) conversations: DashMap<String, ConversationLog>,
    next_sequence: AtomicU64,
    state: Mutex<StatsState>,
}

impl MetricsAggregator {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        let started_at = clock.now();
        Self {
            clock,
            started_at,
            host: HostIdentity::detect(),
            conversations: DashMap::new(),
            next_sequence: AtomicU64::new(0),
            state: Mutex::new(StatsState {
                stats: GlobalStats::default(),
                errors: Vec::new(),
            }),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn host(&self) -> &HostIdentity {
        &self.host
    }

    /// Seconds since the aggregator was created.
    pub fn uptime_secs(&self) -> f64 {
        (self.clock.now() - self.started_at).num_milliseconds().max(0) as f64 / 1000.0
    }

    /// Appends one message to `conversation_id`'s log and updates the global
    /// counters. Bot messages also fold their response latency into
    /// `avg_response_time`.
    ///
    /// Never fails: payloads that cannot be serialised are stored as
    /// [`UNSERIALIZABLE_PAYLOAD`].
    pub fn record<P>(
        &self,
        conversation_id: &str,
        payload: &P,
        is_user: bool,
        metadata: Metadata,
    ) -> MessageEvent
    where
        P: Serialize + ?Sized,
    {
        let text = payload_text(payload);

        // The receipt instant is taken under the entry lock so a log never
        // holds messages out of timestamp order.
        let entry = self.conversations.entry(conversation_id.to_string());
        let event = MessageEvent {
            timestamp: self.clock.now(),
            text,
            is_user,
            metadata,
        };

        let mut created = false;
        let mut conversation = entry.or_insert_with(|| {
            created = true;
            ConversationLog::new(
                conversation_id,
                self.next_sequence.fetch_add(1, Ordering::Relaxed),
                event.timestamp,
            )
        });

        let latency = if is_user {
            None
        } else {
            response_latency(&conversation.messages, &event)
        };
        conversation.push(event.clone());

        {
            let mut state = self.state.lock();
            let error_count = state.errors.len();
            let stats = &mut state.stats;
            if created {
                stats.total_users += 1;
            }
            stats.total_messages += 1;
            if let Some(latency) = latency {
                stats.avg_response_time =
                    fold_weighted_mean(stats.avg_response_time, latency, stats.total_messages);
            }
            stats.refresh_error_rate(error_count);
        }
        drop(conversation);

        if created {
            log::debug!("new conversation {}", conversation_id);
        }
        if let Some(latency) = latency {
            log::debug!(
                "conversation {} replied in {:.3}s",
                conversation_id,
                latency
            );
        }

        event
    }

    /// Records a failure with its `source()` chain as the diagnostic trace.
    pub fn record_error<E>(&self, error: &E, context: Metadata) -> ErrorEvent
    where
        E: std::error::Error + ?Sized,
    {
        self.record_failure(error.to_string(), error_chain(error), context)
    }

    /// Records a failure that only exists as text, such as one reported by a
    /// browser client.
    pub fn record_failure(
        &self,
        message: impl Into<String>,
        stack: Option<String>,
        context: Metadata,
    ) -> ErrorEvent {
        let event = ErrorEvent {
            timestamp: self.clock.now(),
            message: message.into(),
            stack,
            context,
        };

        let mut state = self.state.lock();
        state.errors.push(event.clone());
        let error_count = state.errors.len();
        state.stats.refresh_error_rate(error_count);
        drop(state);

        log::debug!("recorded error: {}", event.message);
        event
    }

    pub fn stats(&self) -> GlobalStats {
        self.state.lock().stats
    }

    pub fn error_count(&self) -> usize {
        self.state.lock().errors.len()
    }

    pub fn conversation_count(&self) -> usize {
        self.conversations.len()
    }

    /// The last `limit` errors, oldest first.
    pub fn recent_errors(&self, limit: usize) -> Vec<ErrorEvent> {
        let state = self.state.lock();
        let skip = state.errors.len().saturating_sub(limit);
        state.errors[skip..].to_vec()
    }
}

impl Default for MetricsAggregator {
    fn default() -> Self {
        Self::new()
    }
}

fn payload_text<P>(payload: &P) -> String
where
    P: Serialize + ?Sized,
{
    match serde_json::to_value(payload) {
        Ok(Value::String(text)) => text,
        Ok(value) => value.to_string(),
        Err(error) => {
            log::warn!("failed to serialize message payload: {}", error);
            UNSERIALIZABLE_PAYLOAD.to_string()
        }
    }
}

fn error_chain<E>(error: &E) -> Option<String>
where
    E: std::error::Error + ?Sized,
{
    let mut causes = Vec::new();
    let mut source = error.source();
    while let Some(cause) = source {
        causes.push(format!("caused by: {}", cause));
        source = cause.source();
    }
    (!causes.is_empty()).then(|| causes.join("\n"))
}
