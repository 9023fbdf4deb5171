//! In-memory conversation metrics for the support chat service.
//!
//! [`MetricsAggregator`] records message and error events from many
//! concurrent conversations and serves point-in-time snapshots of them.
//! Nothing is persisted; state lives as long as the aggregator does.

pub mod aggregator;
pub mod clock;
pub mod latency;
pub mod snapshot;
pub mod system;
pub mod types;

pub use aggregator::{MetricsAggregator, UNSERIALIZABLE_PAYLOAD};
pub use clock::{Clock, ManualClock, SystemClock};
pub use snapshot::{
    ConversationView, ErrorMetrics, ErrorSummary, MessageBreakdown, StatsSnapshot,
    SystemSnapshot, RECENT_ERROR_WINDOW,
};
pub use system::{CpuUsage, HostIdentity, MemoryUsage};
pub use types::{ConversationLog, ErrorEvent, GlobalStats, Metadata, MessageEvent};
