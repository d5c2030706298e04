//! Event CRUD and registrations.
//!
//! Reads are public (anonymous callers only see public events); writes
//! need a signed-in account. Registering for an event sends a confirmation
//! email as a best-effort side effect.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::extract::{AuthUser, MaybeAuthUser};
use crate::error::ApiError;
use crate::mailer::EmailFlow;
use crate::repos::event_repo::{self, Event, EventType, NewEvent, Registration, RegistrationError};
use crate::state::SharedState;

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/api/events", get(list_events).post(create_event))
        .route(
            "/api/events/{id}",
            get(get_event).put(update_event).delete(delete_event),
        )
        .route(
            "/api/events/{id}/registrations",
            get(list_registrations).post(register),
        )
        .route("/api/registrations/{id}", patch(set_attended))
}

#[derive(Debug, Deserialize)]
struct EventRequest {
    title: String,
    #[serde(default)]
    description: String,
    event_type: EventType,
    start_date: DateTime<Utc>,
    end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    location: String,
    #[serde(default)]
    virtual_link: String,
    #[serde(default = "default_public")]
    is_public: bool,
}

fn default_public() -> bool {
    true
}

impl EventRequest {
    fn into_new_event(self, organizer_id: Option<Uuid>) -> NewEvent {
        NewEvent {
            title: self.title,
            description: self.description,
            event_type: self.event_type,
            start_date: self.start_date,
            end_date: self.end_date,
            location: self.location,
            virtual_link: self.virtual_link,
            is_public: self.is_public,
            organizer_id,
        }
    }
}

async fn list_events(
    State(state): State<SharedState>,
    MaybeAuthUser(user): MaybeAuthUser,
) -> Result<Json<Vec<Event>>, ApiError> {
    let events = if user.is_some() {
        event_repo::list(&state.db).await?
    } else {
        event_repo::list_public(&state.db).await?
    };
    Ok(Json(events))
}

async fn get_event(
    State(state): State<SharedState>,
    MaybeAuthUser(user): MaybeAuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Event>, ApiError> {
    let event = event_repo::find(&state.db, id)
        .await?
        .filter(|e| e.is_public || user.is_some())
        .ok_or_else(|| ApiError::NotFound("event not found".to_string()))?;
    Ok(Json(event))
}

async fn create_event(
    State(state): State<SharedState>,
    AuthUser(user): AuthUser,
    Json(req): Json<EventRequest>,
) -> Result<(StatusCode, Json<Event>), ApiError> {
    if req.title.trim().is_empty() {
        return Err(ApiError::BadRequest("title is required".to_string()));
    }
    let event = event_repo::create(&state.db, &req.into_new_event(Some(user.id))).await?;
    Ok((StatusCode::CREATED, Json(event)))
}

async fn update_event(
    State(state): State<SharedState>,
    AuthUser(_user): AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<EventRequest>,
) -> Result<Json<Event>, ApiError> {
    if req.title.trim().is_empty() {
        return Err(ApiError::BadRequest("title is required".to_string()));
    }
    let event = event_repo::update(&state.db, id, &req.into_new_event(None))
        .await?
        .ok_or_else(|| ApiError::NotFound("event not found".to_string()))?;
    Ok(Json(event))
}

async fn delete_event(
    State(state): State<SharedState>,
    AuthUser(_user): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if !event_repo::delete(&state.db, id).await? {
        return Err(ApiError::NotFound("event not found".to_string()));
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn register(
    State(state): State<SharedState>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<Registration>), ApiError> {
    let event = event_repo::find(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("event not found".to_string()))?;

    let registration = event_repo::register(&state.db, event.id, user.id)
        .await
        .map_err(|e| match e {
            RegistrationError::AlreadyRegistered => ApiError::Conflict(e.to_string()),
            RegistrationError::Database(db) => ApiError::from(db),
        })?;

    let flow = EmailFlow::event_registration(&user, &event, &state.cfg.site_url);
    if let Err(e) = state
        .mailer
        .send(&flow, &[user.email.clone()], None, true)
        .await
    {
        tracing::warn!(error = %e, event_id = %event.id, "confirmation email not sent");
    }

    Ok((StatusCode::CREATED, Json(registration)))
}

async fn list_registrations(
    State(state): State<SharedState>,
    AuthUser(_user): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Registration>>, ApiError> {
    let registrations = event_repo::list_registrations(&state.db, id).await?;
    Ok(Json(registrations))
}

#[derive(Debug, Deserialize)]
struct AttendanceRequest {
    attended: bool,
}

async fn set_attended(
    State(state): State<SharedState>,
    AuthUser(_user): AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<AttendanceRequest>,
) -> Result<Json<Registration>, ApiError> {
    let registration = event_repo::set_attended(&state.db, id, req.attended)
        .await?
        .ok_or_else(|| ApiError::NotFound("registration not found".to_string()))?;
    Ok(Json(registration))
}
