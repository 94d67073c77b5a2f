// Time-window queries from the natural-language layer: summaries in range, optionally with raw archives.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::models::BatchSummary;
use crate::sinks::{ArchiveSink, SinkError, SummarySink};

#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryQuery {
    /// Unix seconds, inclusive.
    pub start_time: i64,
    /// Unix seconds, inclusive.
    pub end_time: i64,
    #[serde(default)]
    pub needs_archive: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SummaryWithArchive {
    #[serde(flatten)]
    pub summary: BatchSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archive: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archive_error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    pub summaries: Vec<SummaryWithArchive>,
    /// One line per summary, for feeding back to the language layer.
    pub context: String,
}

pub const NO_DATA_CONTEXT: &str = "No telemetry data found in that time range.";

pub fn render_context(summaries: &[BatchSummary]) -> String {
    if summaries.is_empty() {
        return NO_DATA_CONTEXT.to_string();
    }
    summaries
        .iter()
        .map(|s| {
            let reasons: Vec<&str> = s.reasons.iter().map(|r| r.reason.as_str()).collect();
            format!(
                "[{} - {}] Threats: {}, Unhealthy: {}, Reasons: {}",
                s.start_time,
                s.end_time,
                s.threat_count,
                s.unhealthy_count,
                serde_json::to_string(&reasons).unwrap_or_default()
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// A failing archive read is reported on its entry; only a failing summary query fails the call.
pub async fn run_query(
    summaries: &dyn SummarySink,
    archive: &dyn ArchiveSink,
    query: &TelemetryQuery,
) -> Result<QueryResult, SinkError> {
    let found = summaries
        .summaries_between(query.start_time, query.end_time)
        .await?;
    let context = render_context(&found);

    let mut out = Vec::with_capacity(found.len());
    for summary in found {
        let (archive_payload, archive_error) = match (&summary.archive_path, query.needs_archive) {
            (Some(path), true) => match load_archive(archive, path).await {
                Ok(v) => (Some(v), None),
                Err(e) => {
                    warn!(error = %e, archive_key = %path, "archive read failed");
                    (None, Some(e))
                }
            },
            (None, true) => (None, Some("batch was not archived".to_string())),
            (_, false) => (None, None),
        };
        out.push(SummaryWithArchive {
            summary,
            archive: archive_payload,
            archive_error,
        });
    }
    Ok(QueryResult {
        summaries: out,
        context,
    })
}

async fn load_archive(archive: &dyn ArchiveSink, key: &str) -> Result<serde_json::Value, String> {
    let bytes = archive.get(key).await.map_err(|e| e.to_string())?;
    serde_json::from_slice(&bytes).map_err(|e| e.to_string())
}
