use axum::Json;
use axum::extract::State;
use pharmadir_store::Stats;

use crate::envelope::{Envelope, ok};
use crate::error::ApiError;
use crate::state::AppState;

/// `GET /api/stats`
pub async fn summary(State(state): State<AppState>) -> Result<Json<Envelope<Stats>>, ApiError> {
    let stats = state.store()?.stats()?;
    Ok(ok(stats, "Statistics retrieved"))
}
