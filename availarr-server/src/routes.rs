use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::app_state::AppState;
use crate::handlers::{availability, health, tasks};

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route(
            "/availability/{kind}/{id}",
            get(availability::get_availability_handler)
                .delete(availability::delete_availability_handler),
        )
        .route("/scan", post(tasks::trigger_scan_handler))
        .route("/safety-net", post(tasks::trigger_safety_net_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
