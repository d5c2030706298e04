use axum::{routing::post, Router};

use crate::auth::handlers;
use crate::state::SharedState;

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/api/auth/register", post(handlers::register))
        .route("/api/auth/login", post(handlers::login))
        .route("/api/auth/refresh", post(handlers::refresh))
        .route("/api/auth/logout", post(handlers::logout))
        .route("/api/auth/password-recovery", post(handlers::password_recovery))
        .route("/api/auth/password-reset/confirm", post(handlers::password_reset_confirm))
        .route("/api/auth/google", post(handlers::google_login))
}
