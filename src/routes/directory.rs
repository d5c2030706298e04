//! Member-country directory, projects, document library and the
//! dashboard aggregates.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use uuid::Uuid;

use crate::auth::extract::AuthUser;
use crate::error::ApiError;
use crate::repos::directory_repo::{
    self, DashboardMetrics, Document, Member, NewDocument, NewMember, NewProject, Project,
};
use crate::state::SharedState;

use super::require_staff;

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/api/members", get(list_members).post(create_member))
        .route("/api/members/{id}", get(get_member))
        .route("/api/projects", get(list_projects).post(create_project))
        .route("/api/projects/{id}", get(get_project))
        .route("/api/documents", get(list_documents).post(create_document))
        .route("/api/documents/{id}", get(get_document))
        .route("/api/documents/{id}/download", post(download_document))
        .route("/api/dashboard", get(dashboard))
}

async fn list_members(
    State(state): State<SharedState>,
    AuthUser(_user): AuthUser,
) -> Result<Json<Vec<Member>>, ApiError> {
    let members = directory_repo::list_members(&state.db).await?;
    Ok(Json(members))
}

async fn get_member(
    State(state): State<SharedState>,
    AuthUser(_user): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Member>, ApiError> {
    let member = directory_repo::find_member(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("member not found".to_string()))?;
    Ok(Json(member))
}

async fn create_member(
    State(state): State<SharedState>,
    AuthUser(user): AuthUser,
    Json(req): Json<NewMember>,
) -> Result<(StatusCode, Json<Member>), ApiError> {
    require_staff(&user)?;
    let member = directory_repo::create_member(&state.db, &req).await?;
    Ok((StatusCode::CREATED, Json(member)))
}

async fn list_projects(
    State(state): State<SharedState>,
    AuthUser(_user): AuthUser,
) -> Result<Json<Vec<Project>>, ApiError> {
    let projects = directory_repo::list_projects(&state.db).await?;
    Ok(Json(projects))
}

async fn get_project(
    State(state): State<SharedState>,
    AuthUser(_user): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Project>, ApiError> {
    let project = directory_repo::find_project(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("project not found".to_string()))?;
    Ok(Json(project))
}

async fn create_project(
    State(state): State<SharedState>,
    AuthUser(user): AuthUser,
    Json(req): Json<NewProject>,
) -> Result<(StatusCode, Json<Project>), ApiError> {
    require_staff(&user)?;
    let project = directory_repo::create_project(&state.db, &req).await?;
    Ok((StatusCode::CREATED, Json(project)))
}

async fn list_documents(
    State(state): State<SharedState>,
    AuthUser(_user): AuthUser,
) -> Result<Json<Vec<Document>>, ApiError> {
    let documents = directory_repo::list_documents(&state.db).await?;
    Ok(Json(documents))
}

async fn get_document(
    State(state): State<SharedState>,
    AuthUser(_user): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Document>, ApiError> {
    let document = directory_repo::find_document(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("document not found".to_string()))?;
    Ok(Json(document))
}

async fn create_document(
    State(state): State<SharedState>,
    AuthUser(user): AuthUser,
    Json(req): Json<NewDocument>,
) -> Result<(StatusCode, Json<Document>), ApiError> {
    require_staff(&user)?;
    let document = directory_repo::create_document(&state.db, &req).await?;
    Ok((StatusCode::CREATED, Json(document)))
}

async fn download_document(
    State(state): State<SharedState>,
    AuthUser(_user): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let file_url = directory_repo::record_download(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("document not found".to_string()))?;
    Ok(Json(json!({ "file_url": file_url })))
}

async fn dashboard(
    State(state): State<SharedState>,
    AuthUser(_user): AuthUser,
) -> Result<Json<DashboardMetrics>, ApiError> {
    let metrics = directory_repo::dashboard_metrics(&state.db).await?;
    Ok(Json(metrics))
}
