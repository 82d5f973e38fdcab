use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use pharmadir_sync::RunReport;
use serde::Deserialize;
use tracing::{info, warn};

use crate::envelope::{Envelope, ok};
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ScrapeRequest {
    pub force: bool,
}

/// `POST /api/scrape` runs one collection and returns its report.
///
/// Rejected with 409 while another run is in flight, or when the store
/// already has rows and `force` is not set.
pub async fn trigger(
    State(state): State<AppState>,
    body: Option<Json<ScrapeRequest>>,
) -> Result<Json<Envelope<RunReport>>, ApiError> {
    let force = body.is_some_and(|Json(req)| req.force);

    let Some(ticket) = state.run_guard.try_acquire() else {
        warn!("collection trigger rejected: run in progress");
        return Err(ApiError::RunInProgress);
    };

    let existing = state.store()?.count()?;
    if existing > 0 && !force {
        return Err(ApiError::DataExists(existing));
    }

    info!(force, existing, "collection triggered");
    let collector = Arc::clone(&state.collector);
    let sink = Arc::clone(&state.sink);
    // Detached from the request: a client that disconnects does not stop the
    // run, and the ticket is held until the run itself finishes.
    let run = tokio::spawn(async move {
        let _ticket = ticket;
        collector.run(sink).await
    });
    let report = run
        .await
        .map_err(|e| ApiError::Internal(format!("collection task failed: {e}")))?;

    if !report.success {
        return Err(ApiError::RunFailed {
            error: report.error.unwrap_or(report.message),
            found: report.pharmacies_found,
            duration_seconds: report.duration_seconds,
        });
    }
    let message = report.message.clone();
    Ok(ok(report, message))
}
