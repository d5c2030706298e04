use axum::{extract::State, routing::get, Json, Router};
use serde::Deserialize;

use crate::auth::extract::AuthUser;
use crate::error::ApiError;
use crate::repos::user_repo::{self, User};
use crate::state::SharedState;

pub fn router() -> Router<SharedState> {
    Router::new().route("/api/user", get(get_profile).patch(update_profile))
}

async fn get_profile(AuthUser(user): AuthUser) -> Json<User> {
    Json(user)
}

#[derive(Debug, Deserialize)]
struct ProfileUpdate {
    first_name: Option<String>,
    last_name: Option<String>,
}

async fn update_profile(
    State(state): State<SharedState>,
    AuthUser(user): AuthUser,
    Json(req): Json<ProfileUpdate>,
) -> Result<Json<User>, ApiError> {
    let updated = user_repo::update_names(
        &state.db,
        user.id,
        req.first_name.as_deref().map(str::trim),
        req.last_name.as_deref().map(str::trim),
    )
    .await?
    .ok_or_else(|| ApiError::NotFound("user not found".to_string()))?;
    Ok(Json(updated))
}
