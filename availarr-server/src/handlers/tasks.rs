use axum::{Json, extract::State};
use availarr_core::scheduler::TaskOutcome;
use availarr_model::{SafetyNetSummary, ScanResult, SourceId};
use serde::Deserialize;
use tracing::info;

use crate::app_state::AppState;
use crate::errors::{AppError, AppResult};

#[derive(Debug, Default, Deserialize)]
pub struct ScanTrigger {
    #[serde(default)]
    pub incremental: bool,
    /// Restricts the pass to these source ids; empty scans every enabled
    /// source.
    #[serde(default)]
    pub sources: Vec<String>,
}

/// Runs a scan now and returns its summary. `409` when the same kind of
/// scan is already running.
pub async fn trigger_scan_handler(
    State(state): State<AppState>,
    Json(trigger): Json<ScanTrigger>,
) -> AppResult<Json<ScanResult>> {
    if !trigger.sources.is_empty() {
        return targeted_scan(&state, trigger).await.map(Json);
    }

    let runner = if trigger.incremental {
        &state.runners.incremental_scan
    } else {
        &state.runners.full_scan
    };
    info!(task = runner.name(), "manual scan requested");
    match runner.trigger(&state.shutdown).await? {
        TaskOutcome::Scan(result) => Ok(Json(result)),
        TaskOutcome::SafetyNet(_) => Err(AppError::internal("scan task returned a safety-net outcome")),
    }
}

async fn targeted_scan(state: &AppState, trigger: ScanTrigger) -> AppResult<ScanResult> {
    let Some(_guard) = state.targeted_scan.try_start() else {
        return Err(AppError::conflict("a targeted scan is already running"));
    };
    let ids: Vec<SourceId> = trigger.sources.into_iter().map(SourceId::new).collect();
    info!(sources = ?ids, incremental = trigger.incremental, "manual targeted scan requested");
    Ok(state
        .service
        .scan(&ids, trigger.incremental, &state.shutdown)
        .await?)
}

pub async fn trigger_safety_net_handler(
    State(state): State<AppState>,
) -> AppResult<Json<SafetyNetSummary>> {
    info!("manual safety-net pass requested");
    match state.runners.safety_net.trigger(&state.shutdown).await? {
        TaskOutcome::SafetyNet(summary) => Ok(Json(summary)),
        TaskOutcome::Scan(_) => Err(AppError::internal("safety-net task returned a scan outcome")),
    }
}
