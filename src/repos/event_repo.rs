use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use thiserror::Error;
use uuid::Uuid;

use crate::error::is_unique_violation;
use crate::repos::user_repo::User;

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "event_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Meeting,
    Workshop,
    Deadline,
    Conference,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Event {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub event_type: EventType,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub location: String,
    pub virtual_link: String,
    pub is_public: bool,
    pub organizer_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Registration {
    pub id: Uuid,
    pub event_id: Uuid,
    pub user_id: Uuid,
    pub registration_date: DateTime<Utc>,
    pub attended: bool,
}

#[derive(Debug)]
pub struct NewEvent {
    pub title: String,
    pub description: String,
    pub event_type: EventType,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub location: String,
    pub virtual_link: String,
    pub is_public: bool,
    pub organizer_id: Option<Uuid>,
}

#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("already registered for this event")]
    AlreadyRegistered,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub async fn list(pool: &PgPool) -> Result<Vec<Event>, sqlx::Error> {
    sqlx::query_as::<_, Event>("SELECT * FROM events ORDER BY start_date DESC")
        .fetch_all(pool)
        .await
}

pub async fn list_public(pool: &PgPool) -> Result<Vec<Event>, sqlx::Error> {
    sqlx::query_as::<_, Event>(
        "SELECT * FROM events WHERE is_public ORDER BY start_date DESC",
    )
    .fetch_all(pool)
    .await
}

pub async fn find(pool: &PgPool, id: Uuid) -> Result<Option<Event>, sqlx::Error> {
    sqlx::query_as::<_, Event>("SELECT * FROM events WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn create(pool: &PgPool, event: &NewEvent) -> Result<Event, sqlx::Error> {
    sqlx::query_as::<_, Event>(
        r#"
        INSERT INTO events
            (title, description, event_type, start_date, end_date, location, virtual_link, is_public, organizer_id)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING *
        "#,
    )
    .bind(&event.title)
    .bind(&event.description)
    .bind(event.event_type)
    .bind(event.start_date)
    .bind(event.end_date)
    .bind(&event.location)
    .bind(&event.virtual_link)
    .bind(event.is_public)
    .bind(event.organizer_id)
    .fetch_one(pool)
    .await
}

pub async fn update(pool: &PgPool, id: Uuid, event: &NewEvent) -> Result<Option<Event>, sqlx::Error> {
    sqlx::query_as::<_, Event>(
        r#"
        UPDATE events
        SET title = $2, description = $3, event_type = $4, start_date = $5,
            end_date = $6, location = $7, virtual_link = $8, is_public = $9,
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(&event.title)
    .bind(&event.description)
    .bind(event.event_type)
    .bind(event.start_date)
    .bind(event.end_date)
    .bind(&event.location)
    .bind(&event.virtual_link)
    .bind(event.is_public)
    .fetch_optional(pool)
    .await
}

pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let res = sqlx::query("DELETE FROM events WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(res.rows_affected() > 0)
}

/// Insert a registration. The (event_id, user_id) unique constraint is the
/// source of truth for duplicates; a violation maps to
/// [`RegistrationError::AlreadyRegistered`].
pub async fn register(
    pool: &PgPool,
    event_id: Uuid,
    user_id: Uuid,
) -> Result<Registration, RegistrationError> {
    sqlx::query_as::<_, Registration>(
        r#"
        INSERT INTO event_registrations (event_id, user_id)
        VALUES ($1, $2)
        RETURNING *
        "#,
    )
    .bind(event_id)
    .bind(user_id)
    .fetch_one(pool)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            RegistrationError::AlreadyRegistered
        } else {
            RegistrationError::Database(e)
        }
    })
}

pub async fn list_registrations(
    pool: &PgPool,
    event_id: Uuid,
) -> Result<Vec<Registration>, sqlx::Error> {
    sqlx::query_as::<_, Registration>(
        "SELECT * FROM event_registrations WHERE event_id = $1 ORDER BY registration_date DESC",
    )
    .bind(event_id)
    .fetch_all(pool)
    .await
}

/// Accounts registered for an event, for invite-style mailouts.
pub async fn registered_users(pool: &PgPool, event_id: Uuid) -> Result<Vec<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(
        r#"
        SELECT u.*
        FROM users u
        JOIN event_registrations r ON r.user_id = u.id
        WHERE r.event_id = $1
        ORDER BY r.registration_date
        "#,
    )
    .bind(event_id)
    .fetch_all(pool)
    .await
}

pub async fn set_attended(
    pool: &PgPool,
    registration_id: Uuid,
    attended: bool,
) -> Result<Option<Registration>, sqlx::Error> {
    sqlx::query_as::<_, Registration>(
        r#"
        UPDATE event_registrations
        SET attended = $2
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(registration_id)
    .bind(attended)
    .fetch_optional(pool)
    .await
}
