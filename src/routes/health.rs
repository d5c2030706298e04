use axum::{extract::State, http::StatusCode, routing::get, Router};

use crate::state::SharedState;

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/health/live", get(health_live))
        .route("/health/ready", get(health_ready))
}

async fn health_live() -> StatusCode {
    StatusCode::OK
}

async fn health_ready(State(state): State<SharedState>) -> StatusCode {
    match sqlx::query("SELECT 1").execute(&state.db).await {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            tracing::error!(error = %e, "readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
