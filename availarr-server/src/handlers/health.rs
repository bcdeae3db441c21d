use axum::{Json, extract::State};
use chrono::Utc;
use serde_json::{Value, json};

use crate::app_state::AppState;

pub async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    let runners = &state.runners;
    let tasks: Vec<Value> = [&runners.incremental_scan, &runners.full_scan, &runners.safety_net]
        .into_iter()
        .map(|runner| json!({ "name": runner.name(), "running": runner.is_running() }))
        .collect();

    Json(json!({
        "status": "ok",
        "started_at": state.started_at,
        "uptime_secs": (Utc::now() - state.started_at).num_seconds(),
        "tasks": tasks,
    }))
}
