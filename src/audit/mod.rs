// Audit/log sink: every entry goes to the live feed, then to the persisted log.
// The two writes are independent; a failed persist is logged and never touches the feed.

mod feed;

pub use feed::{FeedPoll, LiveFeed};

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::models::{AuditRecord, HealthEvent, LogEntry};
use crate::sinks::SinkError;

/// Persisted, queryable log keyed by timestamp.
#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn append_action(&self, record: &AuditRecord) -> Result<(), SinkError>;
    async fn append_health(&self, event: &HealthEvent) -> Result<(), SinkError>;
    /// Newest first, optionally filtered by actor.
    async fn recent_actions(
        &self,
        limit: u32,
        actor: Option<&str>,
    ) -> Result<Vec<AuditRecord>, SinkError>;
}

pub struct AuditSink {
    feed: LiveFeed,
    store: Arc<dyn AuditStore>,
}

impl AuditSink {
    pub fn new(buffer_capacity: usize, store: Arc<dyn AuditStore>) -> Self {
        Self {
            feed: LiveFeed::new(buffer_capacity),
            store,
        }
    }

    pub fn feed(&self) -> &LiveFeed {
        &self.feed
    }

    pub fn store(&self) -> &dyn AuditStore {
        self.store.as_ref()
    }

    pub async fn record_action(&self, record: AuditRecord) {
        self.feed.push(LogEntry::Action(record.clone()));
        if let Err(e) = self.store.append_action(&record).await {
            warn!(
                error = %e,
                operation = "append_action",
                endpoint = %record.endpoint,
                "audit record not persisted"
            );
        }
    }

    pub async fn record_health(&self, event: HealthEvent) {
        self.feed.push(LogEntry::Health(event.clone()));
        if let Err(e) = self.store.append_health(&event).await {
            warn!(error = %e, operation = "append_health", "health event not persisted");
        }
    }
}
