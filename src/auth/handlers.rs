//! Account lifecycle: registration, login, token refresh, logout,
//! password recovery and third-party sign-in.
//!
//! Access tokens are short-lived JWTs; refresh tokens are opaque values
//! stored hashed with `revoked_at` acting as the denylist. Exchanging a
//! refresh token does not rotate it, so a client can hold one refresh
//! token for its whole lifetime.

use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::{
    error::{is_unique_violation, ApiError},
    mailer::EmailFlow,
    repos::user_repo::{self, User},
    state::SharedState,
};

use super::{captcha, extract::AuthUser, password, tokens};

const INVALID_CREDENTIALS: &str = "invalid email or password";
const INVALID_REFRESH: &str = "invalid or expired refresh token";
const RECOVERY_MESSAGE: &str = "If an account exists, a password reset email was sent";

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub captcha_token: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
pub struct RecoveryRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetConfirmRequest {
    pub token: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct GoogleLoginRequest {
    pub access_token: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token_type: &'static str,
    pub access_token: String,
    pub expires_in_seconds: i64,
    pub refresh_token: String,
    pub user: User,
}

#[derive(Debug, FromRow)]
struct RefreshRow {
    user_id: Uuid,
    expires_at: DateTime<Utc>,
    revoked_at: Option<DateTime<Utc>>,
}

#[derive(Debug, FromRow)]
struct ResetRow {
    id: Uuid,
    user_id: Uuid,
    expires_at: DateTime<Utc>,
    used_at: Option<DateTime<Utc>>,
}

pub async fn register(
    State(state): State<SharedState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    let email = req.email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(ApiError::BadRequest("a valid email address is required".to_string()));
    }
    password::validate_password(&req.password)
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let hash = password::hash_password(&state.pwd, &req.password)
        .map_err(|e| ApiError::Internal(anyhow::anyhow!(e)))?;

    let user = user_repo::create(
        &state.db,
        &email,
        &hash,
        req.first_name.trim(),
        req.last_name.trim(),
    )
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            ApiError::BadRequest("user with this email already exists".to_string())
        } else {
            ApiError::from(e)
        }
    })?;

    // Welcome mail is best-effort; account creation already succeeded.
    let flow = EmailFlow::welcome(&user, &state.cfg.site_url);
    if let Err(e) = state
        .mailer
        .send(&flow, &[user.email.clone()], None, true)
        .await
    {
        tracing::warn!(error = %e, user_id = %user.id, "welcome email not sent");
    }

    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn login(
    State(state): State<SharedState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let human = captcha::verify_challenge(
        &state.http,
        &state.cfg.captcha_verify_url,
        &state.cfg.captcha_secret,
        &req.captcha_token,
    )
    .await
    .map_err(|e| ApiError::Internal(anyhow::anyhow!(e)))?;
    if !human {
        return Err(ApiError::BadRequest("captcha verification failed".to_string()));
    }

    let email = req.email.trim().to_lowercase();
    let user = user_repo::find_by_email(&state.db, &email)
        .await?
        .ok_or_else(|| ApiError::Unauthorized(INVALID_CREDENTIALS.to_string()))?;

    if !user.is_active {
        return Err(ApiError::Forbidden("account is inactive".to_string()));
    }

    let ok = password::verify_password(&state.pwd, &req.password, &user.password_hash)
        .map_err(|e| ApiError::Internal(anyhow::anyhow!(e)))?;
    if !ok {
        return Err(ApiError::Unauthorized(INVALID_CREDENTIALS.to_string()));
    }

    let response = issue_token_pair(&state, user).await?;
    Ok(Json(response))
}

pub async fn refresh(
    State(state): State<SharedState>,
    Json(req): Json<RefreshRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let hash = tokens::hash_token(&req.refresh_token);

    let row = sqlx::query_as::<_, RefreshRow>(
        "SELECT user_id, expires_at, revoked_at FROM refresh_tokens WHERE token_hash = $1",
    )
    .bind(&hash)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| ApiError::Unauthorized(INVALID_REFRESH.to_string()))?;

    if row.revoked_at.is_some() || row.expires_at <= Utc::now() {
        return Err(ApiError::Unauthorized(INVALID_REFRESH.to_string()));
    }

    let user = user_repo::find_by_id(&state.db, row.user_id)
        .await?
        .ok_or_else(|| ApiError::Unauthorized(INVALID_REFRESH.to_string()))?;
    if !user.is_active {
        return Err(ApiError::Forbidden("account is inactive".to_string()));
    }

    sqlx::query("UPDATE refresh_tokens SET last_used_at = NOW() WHERE token_hash = $1")
        .bind(&hash)
        .execute(&state.db)
        .await?;

    let access_token = state
        .jwt
        .sign_access_token(user.id, &user.email, state.cfg.access_token_ttl_minutes)
        .map_err(|e| ApiError::Internal(anyhow::anyhow!(e)))?;

    Ok(Json(TokenResponse {
        token_type: "Bearer",
        access_token,
        expires_in_seconds: state.cfg.access_token_ttl_minutes * 60,
        refresh_token: req.refresh_token,
        user,
    }))
}

pub async fn logout(
    State(state): State<SharedState>,
    AuthUser(user): AuthUser,
    Json(req): Json<RefreshRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let hash = tokens::hash_token(&req.refresh_token);

    let res = sqlx::query(
        r#"
        UPDATE refresh_tokens
        SET revoked_at = NOW()
        WHERE token_hash = $1 AND user_id = $2 AND revoked_at IS NULL
        "#,
    )
    .bind(&hash)
    .bind(user.id)
    .execute(&state.db)
    .await?;

    if res.rows_affected() == 0 {
        return Err(ApiError::Unauthorized(INVALID_REFRESH.to_string()));
    }

    Ok(Json(json!({ "message": "logged out" })))
}

/// The response never reveals whether an account exists, and the handler
/// performs the token work on both paths so timing stays comparable.
pub async fn password_recovery(
    State(state): State<SharedState>,
    Json(req): Json<RecoveryRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let email = req.email.trim().to_lowercase();
    let raw_token = tokens::generate_token();
    let hash = tokens::hash_token(&raw_token);

    if let Some(user) = user_repo::find_by_email(&state.db, &email).await? {
        let expires_at = Utc::now() + Duration::hours(state.cfg.reset_token_ttl_hours);
        sqlx::query(
            "INSERT INTO password_resets (user_id, token_hash, expires_at) VALUES ($1, $2, $3)",
        )
        .bind(user.id)
        .bind(&hash)
        .bind(expires_at)
        .execute(&state.db)
        .await?;

        let flow = EmailFlow::password_reset(
            &user,
            &state.cfg.site_url,
            &raw_token,
            state.cfg.reset_token_ttl_hours,
        );
        if let Err(e) = state
            .mailer
            .send(&flow, &[user.email.clone()], None, true)
            .await
        {
            tracing::warn!(error = %e, user_id = %user.id, "password reset email not sent");
        }
    }

    Ok(Json(json!({ "message": RECOVERY_MESSAGE })))
}

pub async fn password_reset_confirm(
    State(state): State<SharedState>,
    Json(req): Json<ResetConfirmRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    password::validate_password(&req.password)
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let hash = tokens::hash_token(&req.token);
    let row = sqlx::query_as::<_, ResetRow>(
        "SELECT id, user_id, expires_at, used_at FROM password_resets WHERE token_hash = $1",
    )
    .bind(&hash)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| ApiError::BadRequest("invalid or expired reset token".to_string()))?;

    if row.used_at.is_some() || row.expires_at <= Utc::now() {
        return Err(ApiError::BadRequest("invalid or expired reset token".to_string()));
    }

    let new_hash = password::hash_password(&state.pwd, &req.password)
        .map_err(|e| ApiError::Internal(anyhow::anyhow!(e)))?;

    // New password, consumed token and revoked sessions land together.
    let mut tx = state.db.begin().await.map_err(ApiError::from)?;
    sqlx::query("UPDATE users SET password_hash = $2 WHERE id = $1")
        .bind(row.user_id)
        .bind(&new_hash)
        .execute(&mut *tx)
        .await?;
    sqlx::query("UPDATE password_resets SET used_at = NOW() WHERE id = $1")
        .bind(row.id)
        .execute(&mut *tx)
        .await?;
    sqlx::query(
        "UPDATE refresh_tokens SET revoked_at = NOW() WHERE user_id = $1 AND revoked_at IS NULL",
    )
    .bind(row.user_id)
    .execute(&mut *tx)
    .await?;
    tx.commit().await.map_err(ApiError::from)?;

    Ok(Json(json!({ "message": "password has been reset" })))
}

#[derive(Debug, Deserialize)]
struct GoogleUserInfo {
    email: String,
    #[serde(default)]
    given_name: String,
    #[serde(default)]
    family_name: String,
}

pub async fn google_login(
    State(state): State<SharedState>,
    Json(req): Json<GoogleLoginRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let resp = state
        .http
        .get(&state.cfg.google_userinfo_url)
        .bearer_auth(&req.access_token)
        .send()
        .await
        .map_err(|e| ApiError::Internal(anyhow::anyhow!(e)))?;

    if !resp.status().is_success() {
        return Err(ApiError::Unauthorized("could not verify Google token".to_string()));
    }

    let info: GoogleUserInfo = resp
        .json()
        .await
        .map_err(|_| ApiError::Unauthorized("could not verify Google token".to_string()))?;

    let email = info.email.trim().to_lowercase();
    if email.is_empty() {
        return Err(ApiError::Unauthorized("could not verify Google token".to_string()));
    }

    // A fresh provider-created account gets an unguessable placeholder
    // password; it can only log in via the provider until a reset.
    let placeholder = password::hash_password(&state.pwd, &tokens::generate_token())
        .map_err(|e| ApiError::Internal(anyhow::anyhow!(e)))?;

    let user = user_repo::upsert_external(
        &state.db,
        &email,
        info.given_name.trim(),
        info.family_name.trim(),
        &placeholder,
    )
    .await?;

    if !user.is_active {
        return Err(ApiError::Forbidden("account is inactive".to_string()));
    }

    let response = issue_token_pair(&state, user).await?;
    Ok(Json(response))
}

async fn issue_token_pair(state: &SharedState, user: User) -> Result<TokenResponse, ApiError> {
    let access_token = state
        .jwt
        .sign_access_token(user.id, &user.email, state.cfg.access_token_ttl_minutes)
        .map_err(|e| ApiError::Internal(anyhow::anyhow!(e)))?;

    let refresh_token = tokens::generate_token();
    store_refresh_token(
        &state.db,
        user.id,
        &tokens::hash_token(&refresh_token),
        state.cfg.refresh_token_ttl_days,
    )
    .await?;

    Ok(TokenResponse {
        token_type: "Bearer",
        access_token,
        expires_in_seconds: state.cfg.access_token_ttl_minutes * 60,
        refresh_token,
        user,
    })
}

async fn store_refresh_token(
    pool: &PgPool,
    user_id: Uuid,
    token_hash: &str,
    ttl_days: i64,
) -> Result<(), sqlx::Error> {
    let expires_at = Utc::now() + Duration::days(ttl_days);
    sqlx::query(
        "INSERT INTO refresh_tokens (user_id, token_hash, expires_at) VALUES ($1, $2, $3)",
    )
    .bind(user_id)
    .bind(token_hash)
    .bind(expires_at)
    .execute(pool)
    .await?;
    Ok(())
}
