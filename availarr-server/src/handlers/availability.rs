use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use availarr_model::{AvailabilityView, CanonicalId, MediaKind};
use tracing::info;

use crate::app_state::AppState;
use crate::errors::{AppError, AppResult};

fn parse_key(kind: &str, id: &str) -> AppResult<(MediaKind, CanonicalId)> {
    Ok((kind.parse::<MediaKind>()?, id.parse::<CanonicalId>()?))
}

/// Current movie or series record with its seasons.
pub async fn get_availability_handler(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, String)>,
) -> AppResult<Json<AvailabilityView>> {
    let (kind, id) = parse_key(&kind, &id)?;
    state
        .service
        .status(kind, id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found(format!("no availability record for {kind} {id}")))
}

/// Administrative deletion; the engine leaves deleted records alone.
pub async fn delete_availability_handler(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, String)>,
) -> AppResult<StatusCode> {
    let (kind, id) = parse_key(&kind, &id)?;
    if state.service.mark_deleted(kind, id).await? {
        info!(kind = %kind, id = %id, "availability record deleted via API");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::not_found(format!(
            "no availability record for {kind} {id}"
        )))
    }
}
