// Bounded ring buffer behind the live log feed. Each subscriber keeps its own cursor
// (a sequence number) and pulls only what was appended since.

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::models::LogEntry;

struct FeedInner {
    entries: VecDeque<LogEntry>,
    /// Sequence number the next pushed entry will get.
    next_seq: u64,
}

pub struct LiveFeed {
    inner: Mutex<FeedInner>,
    capacity: usize,
}

/// Result of one poll.
#[derive(Debug, Clone)]
pub struct FeedPoll {
    pub entries: Vec<LogEntry>,
    /// Cursor to pass to the next poll.
    pub next_cursor: u64,
    /// Entries evicted before this subscriber read them.
    pub missed: u64,
}

impl LiveFeed {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(FeedInner {
                entries: VecDeque::with_capacity(capacity.max(1)),
                next_seq: 0,
            }),
            capacity: capacity.max(1),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FeedInner> {
        // A panic mid-push cannot leave the deque half-updated, so a poisoned lock is still usable.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Appends atomically; evicts the oldest entry once over capacity.
    pub fn push(&self, entry: LogEntry) {
        let mut inner = self.lock();
        inner.entries.push_back(entry);
        inner.next_seq += 1;
        while inner.entries.len() > self.capacity {
            inner.entries.pop_front();
        }
    }

    /// Everything appended at or after `cursor`. A cursor older than the oldest retained entry
    /// resumes from the oldest retained entry.
    pub fn poll(&self, cursor: u64) -> FeedPoll {
        let inner = self.lock();
        let first_seq = inner.next_seq - inner.entries.len() as u64;
        let start = cursor.clamp(first_seq, inner.next_seq);
        let skip = (start - first_seq) as usize;
        FeedPoll {
            entries: inner.entries.iter().skip(skip).cloned().collect(),
            next_cursor: inner.next_seq,
            missed: first_seq.saturating_sub(cursor),
        }
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
