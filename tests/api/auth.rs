use crate::helpers::{new_client, spawn_app, unique_email, PASSWORD};
use chrono::{Duration, Utc};
use diesel::prelude::*;
use serde_json::{json, Value};
use std::sync::atomic::Ordering;

#[tokio::test]
async fn register_returns_a_201_and_opens_a_session() {
    // arrange
    let app = spawn_app().await;
    let client = new_client();

    // act
    let response = app.register(&client, "Marie@Example.com", PASSWORD).await;

    // assert
    assert_eq!(response.status().as_u16(), 201);
    let created: Value = response.json().await.unwrap();
    assert_eq!(created["email"], "marie@example.com");
    assert_eq!(created["is_admin"], false);
    assert!(created.get("password_hash").is_none());

    let me: Value = client
        .get(app.url("/api/auth/me"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(me["id"], created["id"]);
}

#[tokio::test]
async fn register_returns_a_409_for_an_email_already_in_use() {
    // arrange
    let app = spawn_app().await;
    let email = unique_email();
    app.register(&new_client(), &email, PASSWORD).await;

    // act
    let response = app.register(&new_client(), &email.to_uppercase(), PASSWORD).await;

    // assert
    assert_eq!(response.status().as_u16(), 409);
}

#[tokio::test]
async fn register_returns_a_400_for_invalid_payloads() {
    // arrange
    let app = spawn_app().await;
    let test_cases = vec![
        (json!({ "email": "not-an-email", "password": PASSWORD }), "invalid email"),
        (json!({ "email": unique_email(), "password": "short" }), "short password"),
        (json!({ "email": unique_email() }), "missing password"),
        (
            json!({ "email": unique_email(), "password": PASSWORD, "phone": "call me" }),
            "invalid phone",
        ),
    ];

    for (body, description) in test_cases {
        // act
        let response = app
            .api_client
            .post(app.url("/api/auth/register"))
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request.");

        // assert
        assert_eq!(
            400,
            response.status().as_u16(),
            "The API did not fail with 400 Bad Request when the payload had an {}.",
            description
        );
        let error: Value = response.json().await.unwrap();
        assert!(error["error"].is_string());
    }
}

#[tokio::test]
async fn login_rejects_wrong_credentials_with_a_401() {
    // arrange
    let app = spawn_app().await;
    let email = unique_email();
    app.register(&new_client(), &email, PASSWORD).await;

    // act
    let wrong_password = app.login(&new_client(), &email, "not the password").await;
    let unknown_email = app.login(&new_client(), &unique_email(), PASSWORD).await;

    // assert
    assert_eq!(wrong_password.status().as_u16(), 401);
    assert_eq!(unknown_email.status().as_u16(), 401);
    let wrong_password: Value = wrong_password.json().await.unwrap();
    let unknown_email: Value = unknown_email.json().await.unwrap();
    assert_eq!(wrong_password, unknown_email);
}

#[tokio::test]
async fn login_then_logout_ends_the_session() {
    // arrange
    let app = spawn_app().await;
    let email = unique_email();
    app.register(&new_client(), &email, PASSWORD).await;
    let client = new_client();

    // act
    let login = app.login(&client, &email, PASSWORD).await;
    let me_before = client.get(app.url("/api/auth/me")).send().await.unwrap();
    let logout = client.post(app.url("/api/auth/logout")).send().await.unwrap();
    let me_after = client.get(app.url("/api/auth/me")).send().await.unwrap();

    // assert
    assert_eq!(login.status().as_u16(), 200);
    assert_eq!(me_before.status().as_u16(), 200);
    assert_eq!(logout.status().as_u16(), 204);
    assert_eq!(me_after.status().as_u16(), 401);
}

#[tokio::test]
async fn me_requires_a_session() {
    // arrange
    let app = spawn_app().await;

    // act
    let response = app.api_client.get(app.url("/api/auth/me")).send().await.unwrap();

    // assert
    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn forgot_password_answers_202_without_revealing_unknown_accounts() {
    // arrange
    let app = spawn_app().await;

    // act
    let response = app
        .api_client
        .post(app.url("/api/auth/forgot-password"))
        .json(&json!({ "email": unique_email() }))
        .send()
        .await
        .unwrap();

    // assert
    assert_eq!(response.status().as_u16(), 202);
    assert!(app.email_client.sent_emails.lock().unwrap().is_empty());
}

#[tokio::test]
async fn a_reset_link_sets_a_new_password_once() {
    // arrange
    let app = spawn_app().await;
    let email = unique_email();
    app.register(&new_client(), &email, PASSWORD).await;
    let token = app.request_reset_token(&email).await;
    assert_eq!(app.email_client.sent_emails.lock().unwrap().len(), 1);

    // act
    let reset = app
        .api_client
        .post(app.url("/api/auth/reset-password"))
        .json(&json!({ "token": token, "password": "a brand new password" }))
        .send()
        .await
        .unwrap();
    let reused = app
        .api_client
        .post(app.url("/api/auth/reset-password"))
        .json(&json!({ "token": token, "password": "yet another password" }))
        .send()
        .await
        .unwrap();

    // assert
    assert_eq!(reset.status().as_u16(), 200);
    assert_eq!(reused.status().as_u16(), 400);
    let old = app.login(&new_client(), &email, PASSWORD).await;
    let new = app.login(&new_client(), &email, "a brand new password").await;
    assert_eq!(old.status().as_u16(), 401);
    assert_eq!(new.status().as_u16(), 200);
}

#[tokio::test]
async fn an_unknown_reset_token_is_rejected() {
    // arrange
    let app = spawn_app().await;

    // act
    let response = app
        .api_client
        .post(app.url("/api/auth/reset-password"))
        .json(&json!({ "token": "nope", "password": "a brand new password" }))
        .send()
        .await
        .unwrap();

    // assert
    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn an_expired_reset_token_is_rejected() {
    // arrange
    let app = spawn_app().await;
    let email = unique_email();
    app.register(&new_client(), &email, PASSWORD).await;
    let token = app.request_reset_token(&email).await;
    {
        use terroir::schema::reset_tokens;
        let mut conn = app.db_connection();
        diesel::update(reset_tokens::table.find(&token))
            .set(reset_tokens::expires_at.eq(Utc::now().naive_utc() - Duration::minutes(1)))
            .execute(&mut conn)
            .unwrap();
    }

    // act
    let response = app
        .api_client
        .post(app.url("/api/auth/reset-password"))
        .json(&json!({ "token": token, "password": "a brand new password" }))
        .send()
        .await
        .unwrap();

    // assert
    assert_eq!(response.status().as_u16(), 400);
    let login = app.login(&new_client(), &email, PASSWORD).await;
    assert_eq!(login.status().as_u16(), 200);
}

#[tokio::test]
async fn forgot_password_answers_202_when_the_email_cannot_be_sent() {
    // arrange
    let app = spawn_app().await;
    let email = unique_email();
    app.register(&new_client(), &email, PASSWORD).await;
    app.email_client.unavailable.store(true, Ordering::SeqCst);

    // act
    let known = app
        .api_client
        .post(app.url("/api/auth/forgot-password"))
        .json(&json!({ "email": email }))
        .send()
        .await
        .unwrap();
    let unknown = app
        .api_client
        .post(app.url("/api/auth/forgot-password"))
        .json(&json!({ "email": unique_email() }))
        .send()
        .await
        .unwrap();

    // assert
    assert_eq!(known.status().as_u16(), 202);
    assert_eq!(unknown.status().as_u16(), 202);
}
