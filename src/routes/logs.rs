// GET /logs: Server-Sent Events over the audit live feed. Each subscriber holds its own cursor.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures_util::{Stream, stream};
use tracing::debug;

use super::AppState;
use crate::audit::AuditSink;

struct Subscriber {
    audit: Arc<AuditSink>,
    cursor: u64,
    poll_interval: Duration,
    first: bool,
}

pub(super) async fn logs_handler(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    debug!("Client connected to log feed");
    let subscriber = Subscriber {
        audit: state.audit.clone(),
        cursor: 0,
        poll_interval: state.feed_poll_interval,
        first: true,
    };
    Sse::new(stream::unfold(subscriber, next_event)).keep_alive(KeepAlive::default())
}

/// Sleeps one poll interval (except on the first call), then emits whatever is new as one JSON
/// array, or an empty comment when idle.
async fn next_event(mut sub: Subscriber) -> Option<(Result<Event, Infallible>, Subscriber)> {
    if sub.first {
        sub.first = false;
    } else {
        tokio::time::sleep(sub.poll_interval).await;
    }
    let poll = sub.audit.feed().poll(sub.cursor);
    if poll.missed > 0 {
        debug!(missed = poll.missed, "log feed subscriber fell behind");
    }
    sub.cursor = poll.next_cursor;
    let event = if poll.entries.is_empty() {
        Event::default().comment("")
    } else {
        Event::default()
            .json_data(&poll.entries)
            .unwrap_or_else(|e| Event::default().comment(format!("encode error: {e}")))
    };
    Some((Ok(event), sub))
}
