// caseforge-api/src/routes/feed.rs
// ============================================================================
// Module: Change Feed Route
// Description: Handler for GET /cases/{id}/feed.
// Purpose: Stream a case's commit-insert and job-update channels as
//          server-sent events.
// Dependencies: axum, caseforge-core, tokio-stream
// ============================================================================

//! ## Overview
//! The concrete transport for the change feed: two named SSE event
//! types, `commit` and `job`, multiplexed over one connection per case.
//! Best-effort, as the feed itself is — a lagging subscriber silently
//! misses events and must reconcile via the timeline endpoint.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::Path;
use axum::extract::State;
use axum::response::Sse;
use axum::response::sse::Event;
use axum::response::sse::KeepAlive;
use futures::stream::StreamExt;
use caseforge_core::CaseId;
use tokio_stream::wrappers::BroadcastStream;

use crate::changefeed::CommitEvent;
use crate::changefeed::JobEvent;
use crate::error::ApiError;
use crate::state::SharedState;

pub async fn stream_feed(
    State(state): State<SharedState>,
    Path(case_id): Path<String>,
) -> Result<Sse<impl futures::Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let case_id = CaseId::new(case_id);
    state.store.get_case(&case_id).await?.ok_or(ApiError::NotFound)?;

    let commits = BroadcastStream::new(state.changefeed.subscribe_commits(&case_id)).filter_map(|result| async {
        let CommitEvent(commit) = result.ok()?;
        let data = serde_json::to_string(&commit).ok()?;
        Some(Ok(Event::default().event("commit").data(data)))
    });
    let jobs = BroadcastStream::new(state.changefeed.subscribe_jobs(&case_id)).filter_map(|result| async {
        let JobEvent(job) = result.ok()?;
        let data = serde_json::to_string(&job).ok()?;
        Some(Ok(Event::default().event("job").data(data)))
    });

    let stream = futures::stream::select(commits, jobs);
    Ok(Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15))))
}
