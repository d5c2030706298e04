use sqlx::PgPool;
use std::sync::Arc;

use crate::auth::{jwt::JwtKeys, password::PasswordPolicy};
use crate::config::Config;
use crate::mailer::EmailDispatcher;

pub struct AppState {
    pub db: PgPool,
    pub cfg: Config,
    pub jwt: JwtKeys,
    pub pwd: PasswordPolicy,
    pub mailer: EmailDispatcher,
    pub http: reqwest::Client,
}

pub type SharedState = Arc<AppState>;
