use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::extract::AuthUser;
use crate::error::ApiError;
use crate::mailer::EmailFlow;
use crate::repos::event_repo;
use crate::repos::survey_repo::{
    self, NewAnswer, NewSurvey, Survey, SurveyDetail, SurveyError, SurveyResponse,
};
use crate::state::SharedState;

use super::require_staff;

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/api/surveys", get(list_surveys).post(create_survey))
        .route("/api/surveys/{id}", get(get_survey).delete(delete_survey))
        .route("/api/surveys/{id}/responses", post(submit_response))
        .route("/api/surveys/{id}/responses/me", get(my_response))
        .route("/api/surveys/{id}/invite", post(invite_registrants))
}

async fn list_surveys(
    State(state): State<SharedState>,
    AuthUser(_user): AuthUser,
) -> Result<Json<Vec<Survey>>, ApiError> {
    let surveys = survey_repo::list(&state.db).await?;
    Ok(Json(surveys))
}

async fn create_survey(
    State(state): State<SharedState>,
    AuthUser(_user): AuthUser,
    Json(req): Json<NewSurvey>,
) -> Result<(StatusCode, Json<SurveyDetail>), ApiError> {
    if req.title.trim().is_empty() {
        return Err(ApiError::BadRequest("title is required".to_string()));
    }
    let detail = survey_repo::create(&state.db, &req).await?;
    Ok((StatusCode::CREATED, Json(detail)))
}

async fn get_survey(
    State(state): State<SharedState>,
    AuthUser(_user): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<SurveyDetail>, ApiError> {
    let detail = survey_repo::find_detail(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("survey not found".to_string()))?;
    Ok(Json(detail))
}

async fn delete_survey(
    State(state): State<SharedState>,
    AuthUser(_user): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if !survey_repo::delete(&state.db, id).await? {
        return Err(ApiError::NotFound("survey not found".to_string()));
    }
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
struct ResponseRequest {
    answers: Vec<NewAnswer>,
}

async fn submit_response(
    State(state): State<SharedState>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<ResponseRequest>,
) -> Result<(StatusCode, Json<SurveyResponse>), ApiError> {
    let response = survey_repo::submit_response(&state.db, id, user.id, &req.answers)
        .await
        .map_err(|e| match e {
            SurveyError::NotFound => ApiError::NotFound(e.to_string()),
            SurveyError::AlreadySubmitted => ApiError::Conflict(e.to_string()),
            SurveyError::Closed
            | SurveyError::ForeignQuestion
            | SurveyError::ForeignChoice
            | SurveyError::WrongShape
            | SurveyError::MissingRequired => ApiError::BadRequest(e.to_string()),
            SurveyError::Database(db) => ApiError::from(db),
        })?;
    Ok((StatusCode::CREATED, Json(response)))
}

async fn my_response(
    State(state): State<SharedState>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<SurveyResponse>, ApiError> {
    let response = survey_repo::response_for_user(&state.db, id, user.id)
        .await?
        .ok_or_else(|| ApiError::NotFound("no response submitted".to_string()))?;
    Ok(Json(response))
}

/// Mail a feedback invitation to everyone registered for the survey's
/// linked event. One message per registrant so each open stays
/// attributable to its recipient.
async fn invite_registrants(
    State(state): State<SharedState>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    require_staff(&user)?;

    let detail = survey_repo::find_detail(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("survey not found".to_string()))?;
    let event_id = detail
        .survey
        .event_id
        .ok_or_else(|| ApiError::BadRequest("survey is not linked to an event".to_string()))?;

    let registrants = event_repo::registered_users(&state.db, event_id).await?;
    let mut invited = 0usize;
    for registrant in &registrants {
        let flow = EmailFlow::survey_invite(
            registrant,
            &state.cfg.site_url,
            detail.survey.id,
            &detail.survey.title,
        );
        match state
            .mailer
            .send(&flow, &[registrant.email.clone()], None, true)
            .await
        {
            Ok(_) => invited += 1,
            Err(e) => {
                tracing::warn!(error = %e, recipient = %registrant.email, "survey invite not sent");
            }
        }
    }

    Ok(Json(serde_json::json!({ "invited": invited })))
}
