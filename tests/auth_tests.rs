mod common;

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use serde_json::json;
use serial_test::serial;

use events_hub_rs::auth::tokens;

use common::{authed_user, body_json, post_json, register_user, request_json, test_app, unique_email};

#[tokio::test]
#[serial]
async fn register_login_refresh_logout_flow() {
    let app = test_app().await;
    let router = app.router();

    let (access, refresh, _user_id) = authed_user(&router, "Adequate1pass").await;

    // Exchanging the refresh token yields a new access token but the same
    // refresh token.
    let res = post_json(&router, "/api/auth/refresh", json!({ "refresh_token": refresh })).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body = body_json(res).await;
    assert_eq!(body["refresh_token"].as_str(), Some(refresh.as_str()));
    assert_eq!(body["token_type"].as_str(), Some("Bearer"));
    assert!(body["access_token"].as_str().is_some());

    let res = request_json(
        &router,
        "POST",
        "/api/auth/logout",
        Some(&access),
        Some(json!({ "refresh_token": refresh })),
    )
    .await;
    assert_eq!(res.status(), StatusCode::OK);

    // A revoked refresh token can never be exchanged again.
    let res = post_json(&router, "/api/auth/refresh", json!({ "refresh_token": refresh })).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[serial]
async fn duplicate_registration_is_rejected() {
    let app = test_app().await;
    let router = app.router();

    let email = unique_email("dupe");
    let payload = json!({ "email": email, "password": "Adequate1pass" });

    let res = post_json(&router, "/api/auth/register", payload.clone()).await;
    assert_eq!(res.status(), StatusCode::CREATED);

    let res = post_json(&router, "/api/auth/register", payload).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body = body_json(res).await;
    assert_eq!(
        body["error"].as_str(),
        Some("user with this email already exists")
    );
}

#[tokio::test]
#[serial]
async fn weak_passwords_are_rejected_at_registration() {
    let app = test_app().await;
    let router = app.router();

    let res = post_json(
        &router,
        "/api/auth/register",
        json!({ "email": unique_email("weak"), "password": "short" }),
    )
    .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[serial]
async fn login_with_wrong_password_is_unauthorized() {
    let app = test_app().await;
    let router = app.router();

    let (_, email) = register_user(&router, "Adequate1pass").await;

    let res = post_json(
        &router,
        "/api/auth/login",
        json!({ "email": email, "password": "Wrong1password" }),
    )
    .await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(res).await;
    assert_eq!(body["error"].as_str(), Some("invalid email or password"));
}

#[tokio::test]
#[serial]
async fn recovery_response_does_not_reveal_account_existence() {
    let app = test_app().await;
    let router = app.router();

    let (_, known) = register_user(&router, "Adequate1pass").await;

    let res_known = post_json(&router, "/api/auth/password-recovery", json!({ "email": known })).await;
    let res_unknown = post_json(
        &router,
        "/api/auth/password-recovery",
        json!({ "email": unique_email("ghost") }),
    )
    .await;

    assert_eq!(res_known.status(), StatusCode::OK);
    assert_eq!(res_unknown.status(), StatusCode::OK);
    assert_eq!(body_json(res_known).await, body_json(res_unknown).await);
}

#[tokio::test]
#[serial]
async fn password_reset_replaces_credentials_and_revokes_sessions() {
    let app = test_app().await;
    let router = app.router();

    let (_access, refresh, user_id) = authed_user(&router, "Adequate1pass").await;
    let email = {
        let row: (String,) = sqlx::query_as("SELECT email FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_one(&app.state.db)
            .await
            .unwrap();
        row.0
    };

    // Seed a reset token the way the recovery handler does.
    let raw_token = tokens::generate_token();
    sqlx::query(
        "INSERT INTO password_resets (user_id, token_hash, expires_at) VALUES ($1, $2, $3)",
    )
    .bind(user_id)
    .bind(tokens::hash_token(&raw_token))
    .bind(Utc::now() + Duration::hours(1))
    .execute(&app.state.db)
    .await
    .unwrap();

    let res = post_json(
        &router,
        "/api/auth/password-reset/confirm",
        json!({ "token": raw_token, "password": "Brand2newpass" }),
    )
    .await;
    assert_eq!(res.status(), StatusCode::OK);

    // Old password is gone, new one works.
    let res = post_json(
        &router,
        "/api/auth/login",
        json!({ "email": email, "password": "Adequate1pass" }),
    )
    .await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = post_json(
        &router,
        "/api/auth/login",
        json!({ "email": email, "password": "Brand2newpass" }),
    )
    .await;
    assert_eq!(res.status(), StatusCode::OK);

    // Sessions issued before the reset are revoked.
    let res = post_json(&router, "/api/auth/refresh", json!({ "refresh_token": refresh })).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    // The token is single-use.
    let res = post_json(
        &router,
        "/api/auth/password-reset/confirm",
        json!({ "token": raw_token, "password": "Third3password" }),
    )
    .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[serial]
async fn tampered_reset_token_leaves_credentials_alone() {
    let app = test_app().await;
    let router = app.router();

    let (_, email) = register_user(&router, "Adequate1pass").await;

    let res = post_json(
        &router,
        "/api/auth/password-reset/confirm",
        json!({ "token": tokens::generate_token(), "password": "Brand2newpass" }),
    )
    .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body = body_json(res).await;
    assert_eq!(body["error"].as_str(), Some("invalid or expired reset token"));

    let res = post_json(
        &router,
        "/api/auth/login",
        json!({ "email": email, "password": "Adequate1pass" }),
    )
    .await;
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
#[serial]
async fn expired_reset_token_leaves_credentials_alone() {
    let app = test_app().await;
    let router = app.router();

    let (user_id, email) = register_user(&router, "Adequate1pass").await;

    let raw_token = tokens::generate_token();
    sqlx::query(
        "INSERT INTO password_resets (user_id, token_hash, expires_at) VALUES ($1, $2, $3)",
    )
    .bind(user_id)
    .bind(tokens::hash_token(&raw_token))
    .bind(Utc::now() - Duration::hours(1))
    .execute(&app.state.db)
    .await
    .unwrap();

    let res = post_json(
        &router,
        "/api/auth/password-reset/confirm",
        json!({ "token": raw_token, "password": "Brand2newpass" }),
    )
    .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body = body_json(res).await;
    assert_eq!(body["error"].as_str(), Some("invalid or expired reset token"));

    let res = post_json(
        &router,
        "/api/auth/login",
        json!({ "email": email, "password": "Adequate1pass" }),
    )
    .await;
    assert_eq!(res.status(), StatusCode::OK);

    let res = post_json(
        &router,
        "/api/auth/login",
        json!({ "email": email, "password": "Brand2newpass" }),
    )
    .await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[serial]
async fn profile_requires_a_valid_token() {
    let app = test_app().await;
    let router = app.router();

    let res = request_json(&router, "GET", "/api/user", None, None).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = request_json(&router, "GET", "/api/user", Some("not-a-jwt"), None).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let (access, _, user_id) = authed_user(&router, "Adequate1pass").await;
    let res = request_json(&router, "GET", "/api/user", Some(&access), None).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body = body_json(res).await;
    assert_eq!(body["id"].as_str(), Some(user_id.to_string().as_str()));
    assert!(body.get("password_hash").is_none());
}
