mod common;

use axum::http::StatusCode;
use serde_json::json;
use serial_test::serial;
use uuid::Uuid;

use common::{authed_user, body_json, make_staff, request_json, test_app};

async fn create_survey(app: &common::TestApp, access: &str) -> serde_json::Value {
    let router = app.router();
    let res = request_json(
        &router,
        "POST",
        "/api/surveys",
        Some(access),
        Some(json!({
            "title": "Workshop feedback",
            "description": "Tell us how it went",
            "questions": [
                { "text": "What did you think?", "question_type": "text" },
                {
                    "text": "Would you attend again?",
                    "question_type": "radio",
                    "choices": [ { "text": "Yes" }, { "text": "No" } ],
                },
            ],
        })),
    )
    .await;
    assert_eq!(res.status(), StatusCode::CREATED);
    body_json(res).await
}

#[tokio::test]
#[serial]
async fn survey_is_created_with_nested_questions_and_choices() {
    let app = test_app().await;
    let router = app.router();

    let (creator_access, _, _) = authed_user(&router, "Adequate1pass").await;

    let survey = create_survey(&app, &creator_access).await;
    let questions = survey["questions"].as_array().unwrap();
    assert_eq!(questions.len(), 2);
    assert_eq!(questions[0]["question_type"].as_str(), Some("text"));
    assert_eq!(questions[1]["choices"].as_array().unwrap().len(), 2);
    assert_eq!(questions[0]["position"].as_i64(), Some(0));
    assert_eq!(questions[1]["position"].as_i64(), Some(1));
}

#[tokio::test]
#[serial]
async fn duplicate_response_is_a_conflict() {
    let app = test_app().await;
    let router = app.router();

    let (creator_access, _, _) = authed_user(&router, "Adequate1pass").await;
    let survey = create_survey(&app, &creator_access).await;
    let survey_id = survey["id"].as_str().unwrap();
    let questions = survey["questions"].as_array().unwrap();
    let q_text = questions[0]["id"].as_str().unwrap();
    let q_radio = questions[1]["id"].as_str().unwrap();
    let choice = questions[1]["choices"][0]["id"].as_str().unwrap();

    let (access, _, _) = authed_user(&router, "Adequate1pass").await;
    let payload = json!({
        "answers": [
            { "question_id": q_text, "text_answer": "Great session" },
            { "question_id": q_radio, "choice_id": choice },
        ],
    });
    let path = format!("/api/surveys/{survey_id}/responses");

    let res = request_json(&router, "POST", &path, Some(&access), Some(payload.clone())).await;
    assert_eq!(res.status(), StatusCode::CREATED);

    let res = request_json(&router, "POST", &path, Some(&access), Some(payload)).await;
    assert_eq!(res.status(), StatusCode::CONFLICT);
}

#[tokio::test]
#[serial]
async fn missing_required_answer_is_rejected() {
    let app = test_app().await;
    let router = app.router();

    let (creator_access, _, _) = authed_user(&router, "Adequate1pass").await;
    let survey = create_survey(&app, &creator_access).await;
    let survey_id = survey["id"].as_str().unwrap();
    let q_text = survey["questions"][0]["id"].as_str().unwrap();

    let (access, _, _) = authed_user(&router, "Adequate1pass").await;
    let res = request_json(
        &router,
        "POST",
        &format!("/api/surveys/{survey_id}/responses"),
        Some(&access),
        Some(json!({
            "answers": [ { "question_id": q_text, "text_answer": "only one" } ],
        })),
    )
    .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[serial]
async fn answers_must_reference_the_surveys_own_questions() {
    let app = test_app().await;
    let router = app.router();

    let (creator_access, _, _) = authed_user(&router, "Adequate1pass").await;
    let survey = create_survey(&app, &creator_access).await;
    let survey_id = survey["id"].as_str().unwrap();

    let (access, _, _) = authed_user(&router, "Adequate1pass").await;
    let res = request_json(
        &router,
        "POST",
        &format!("/api/surveys/{survey_id}/responses"),
        Some(&access),
        Some(json!({
            "answers": [ { "question_id": Uuid::new_v4(), "text_answer": "stray" } ],
        })),
    )
    .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[serial]
async fn own_response_is_retrievable() {
    let app = test_app().await;
    let router = app.router();

    let (creator_access, _, _) = authed_user(&router, "Adequate1pass").await;
    let survey = create_survey(&app, &creator_access).await;
    let survey_id = survey["id"].as_str().unwrap();
    let q_text = survey["questions"][0]["id"].as_str().unwrap();
    let q_radio = survey["questions"][1]["id"].as_str().unwrap();
    let choice = survey["questions"][1]["choices"][0]["id"].as_str().unwrap();

    let (access, _, user_id) = authed_user(&router, "Adequate1pass").await;
    let me_path = format!("/api/surveys/{survey_id}/responses/me");

    let res = request_json(&router, "GET", &me_path, Some(&access), None).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = request_json(
        &router,
        "POST",
        &format!("/api/surveys/{survey_id}/responses"),
        Some(&access),
        Some(json!({
            "answers": [
                { "question_id": q_text, "text_answer": "Fine" },
                { "question_id": q_radio, "choice_id": choice },
            ],
        })),
    )
    .await;
    assert_eq!(res.status(), StatusCode::CREATED);

    let res = request_json(&router, "GET", &me_path, Some(&access), None).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body = body_json(res).await;
    assert_eq!(body["user_id"].as_str(), Some(user_id.to_string().as_str()));
}

#[tokio::test]
#[serial]
async fn invite_mails_every_registrant_of_the_linked_event() {
    let app = test_app().await;
    let router = app.router();

    let (staff_access, _, staff_id) = authed_user(&router, "Adequate1pass").await;
    make_staff(&app.state.db, staff_id).await;

    let res = request_json(
        &router,
        "POST",
        "/api/events",
        Some(&staff_access),
        Some(json!({
            "title": "Feedback Workshop",
            "event_type": "workshop",
            "start_date": "2026-11-01T09:00:00Z",
        })),
    )
    .await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let event = body_json(res).await;
    let event_id = event["id"].as_str().unwrap();

    let (access, _, user_id) = authed_user(&router, "Adequate1pass").await;
    let res = request_json(
        &router,
        "POST",
        &format!("/api/events/{event_id}/registrations"),
        Some(&access),
        None,
    )
    .await;
    assert_eq!(res.status(), StatusCode::CREATED);

    let res = request_json(
        &router,
        "POST",
        "/api/surveys",
        Some(&staff_access),
        Some(json!({
            "title": "Workshop feedback",
            "event_id": event_id,
            "questions": [ { "text": "Thoughts?", "question_type": "text" } ],
        })),
    )
    .await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let survey = body_json(res).await;
    let survey_id = survey["id"].as_str().unwrap();

    let res = request_json(
        &router,
        "POST",
        &format!("/api/surveys/{survey_id}/invite"),
        Some(&staff_access),
        None,
    )
    .await;
    assert_eq!(res.status(), StatusCode::OK);
    let body = body_json(res).await;
    assert_eq!(body["invited"].as_i64(), Some(1));

    let email: (String,) = sqlx::query_as("SELECT email FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_one(&app.state.db)
        .await
        .unwrap();
    let (count,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM email_log WHERE recipient = $1 AND template_name = 'survey_invite'",
    )
    .bind(&email.0)
    .fetch_one(&app.state.db)
    .await
    .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
#[serial]
async fn deleting_a_survey_removes_it() {
    let app = test_app().await;
    let router = app.router();

    let (creator_access, _, _) = authed_user(&router, "Adequate1pass").await;
    let survey = create_survey(&app, &creator_access).await;
    let survey_id = survey["id"].as_str().unwrap();

    let res = request_json(
        &router,
        "DELETE",
        &format!("/api/surveys/{survey_id}"),
        Some(&creator_access),
        None,
    )
    .await;
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let res = request_json(
        &router,
        "GET",
        &format!("/api/surveys/{survey_id}"),
        Some(&creator_access),
        None,
    )
    .await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}
