pub mod auth;
pub mod directory;
pub mod events;
pub mod health;
pub mod profile;
pub mod surveys;
pub mod tracking;

use axum::Router;

use crate::error::ApiError;
use crate::repos::user_repo::User;
use crate::state::SharedState;

pub fn api_router() -> Router<SharedState> {
    Router::new()
        .merge(health::router())
        .merge(auth::router())
        .merge(events::router())
        .merge(surveys::router())
        .merge(directory::router())
        .merge(profile::router())
        .merge(tracking::router())
}

/// Administrative writes are limited to staff accounts.
pub(crate) fn require_staff(user: &User) -> Result<(), ApiError> {
    if user.is_staff {
        Ok(())
    } else {
        Err(ApiError::Forbidden("staff access required".to_string()))
    }
}
