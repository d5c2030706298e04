//! Delivery log for outgoing email. One row per recipient per tracked
//! send attempt; rows from one send share a tracking token (`email_id`).

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize)]
#[sqlx(type_name = "email_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum EmailStatus {
    Sent,
    Failed,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct EmailLog {
    pub id: Uuid,
    pub email_id: Uuid,
    pub recipient: String,
    pub subject: String,
    pub template_name: String,
    pub sent_at: DateTime<Utc>,
    pub status: EmailStatus,
    pub opened_at: Option<DateTime<Utc>>,
    pub clicked_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

pub async fn insert(
    pool: &PgPool,
    email_id: Uuid,
    recipient: &str,
    subject: &str,
    template_name: &str,
    status: EmailStatus,
    error_message: Option<&str>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO email_log (email_id, recipient, subject, template_name, status, error_message)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(email_id)
    .bind(recipient)
    .bind(subject)
    .bind(template_name)
    .bind(status)
    .bind(error_message)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn find_by_token(pool: &PgPool, email_id: Uuid) -> Result<Vec<EmailLog>, sqlx::Error> {
    sqlx::query_as::<_, EmailLog>(
        "SELECT * FROM email_log WHERE email_id = $1 ORDER BY sent_at",
    )
    .bind(email_id)
    .fetch_all(pool)
    .await
}

/// Record the first open for a tracking token. The conditional UPDATE is
/// the guard: a second open (or a concurrent one) matches zero rows and
/// leaves `opened_at` untouched. Returns whether anything was recorded.
pub async fn mark_opened(pool: &PgPool, email_id: Uuid) -> Result<bool, sqlx::Error> {
    let res = sqlx::query(
        r#"
        UPDATE email_log
        SET opened_at = NOW()
        WHERE email_id = $1 AND opened_at IS NULL
        "#,
    )
    .bind(email_id)
    .execute(pool)
    .await?;
    Ok(res.rows_affected() > 0)
}
