// Operator HTTP surface: login, actions, audit log, live log feed (SSE), summaries, metrics

mod http;
mod logs;

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};

use crate::aggregator::Aggregator;
use crate::audit::AuditSink;
use crate::auth::CredentialStore;
use crate::dispatcher::Dispatcher;
use crate::metrics::MetricsRegistry;
use crate::sinks::{ArchiveSink, SummarySink};

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub audit: Arc<AuditSink>,
    pub summaries: Arc<dyn SummarySink>,
    pub archive: Arc<dyn ArchiveSink>,
    pub credentials: Arc<dyn CredentialStore>,
    pub aggregator: Arc<Aggregator>,
    pub metrics: Arc<MetricsRegistry>,
    /// How often each /logs subscriber polls the live feed.
    pub feed_poll_interval: Duration,
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { "chassiswatch is running" })) // GET /
        .route("/version", get(http::version_handler)) // GET /version
        .route("/api/login", post(http::login_handler)) // POST /api/login
        .route("/api/actions", post(http::actions_handler)) // POST /api/actions
        .route("/api/action_logs", get(http::action_logs_handler)) // GET /api/action_logs
        .route("/api/summaries", get(http::summaries_handler)) // GET /api/summaries
        .route("/api/telemetry/query", post(http::telemetry_query_handler)) // POST /api/telemetry/query
        .route("/metrics", get(http::metrics_handler)) // GET /metrics
        .route("/logs", get(logs::logs_handler)) // SSE /logs
        .layer(CorsLayer::new().allow_origin(Any))
        .with_state(state)
}
