// tests/api_tests.rs

mod common;

use common::{PASSWORD, spawn_app};
use uuid::Uuid;

#[tokio::test]
async fn health_check_404() {
    let app = spawn_app().await;

    let response = app
        .client
        .get(app.url("/random_path_that_does_not_exist"))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn login_returns_token_and_session() {
    let app = spawn_app().await;
    let user = app.add_user(false);

    let response = app
        .client
        .post(app.url("/api/auth/login"))
        .json(&serde_json::json!({ "username": user.username, "password": PASSWORD }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], 200);
    assert_eq!(body["data"]["type"], "Bearer");
    assert!(body["data"]["session_id"].as_str().is_some());
    assert_eq!(body["data"]["user"]["username"], user.username.as_str());
    assert!(body["data"]["user"].get("password").is_none());
}

#[tokio::test]
async fn login_rejects_bad_credentials() {
    let app = spawn_app().await;
    let user = app.add_user(false);

    for (username, password) in [
        (user.username.as_str(), "wrong-password"),
        ("nobody_here", PASSWORD),
    ] {
        let response = app
            .client
            .post(app.url("/api/auth/login"))
            .json(&serde_json::json!({ "username": username, "password": password }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 401);
        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["status"], 401);
    }

    let response = app
        .client
        .post(app.url("/api/auth/login"))
        .json(&serde_json::json!({ "username": "", "password": PASSWORD }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn second_login_invalidates_first_token() {
    let app = spawn_app().await;
    let user = app.add_user(false);
    let quiz = Uuid::new_v4();

    let first = app.login(&user.username).await;
    let second = app.login(&user.username).await;

    let response = app
        .client
        .get(app.url(&format!("/api/quizzes/{quiz}/leaderboard")))
        .bearer_auth(&first)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 401);
    let body: serde_json::Value = response.json().await.unwrap();
    assert!(body["message"].as_str().unwrap().contains("session"));

    let response = app
        .client
        .get(app.url(&format!("/api/quizzes/{quiz}/leaderboard")))
        .bearer_auth(&second)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
}

#[tokio::test]
async fn logout_revokes_token() {
    let app = spawn_app().await;
    let user = app.add_user(false);
    let token = app.login(&user.username).await;

    let response = app
        .client
        .post(app.url("/api/auth/logout"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    let response = app
        .client
        .post(app.url("/api/auth/logout"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn protected_routes_require_token() {
    let app = spawn_app().await;
    let quiz = Uuid::new_v4();

    let response = app
        .client
        .get(app.url(&format!("/api/quizzes/{quiz}/status")))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 401);

    let response = app
        .client
        .get(app.url(&format!("/api/quizzes/{quiz}/status")))
        .bearer_auth("not.a.jwt")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn export_requires_admin() {
    let app = spawn_app().await;
    let user = app.add_user(false);
    let token = app.login(&user.username).await;

    let response = app
        .client
        .post(app.url(&format!("/api/quizzes/{}/export?socket_id=s1", Uuid::new_v4())))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 403);
}

#[tokio::test]
async fn export_validates_input() {
    let app = spawn_app().await;
    let admin = app.add_user(true);
    let token = app.login(&admin.username).await;

    let response = app
        .client
        .post(app.url(&format!("/api/quizzes/{}/export", Uuid::new_v4())))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);

    let response = app
        .client
        .post(app.url("/api/quizzes/not-a-uuid/revoke?socket_id=s1"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);

    let response = app
        .client
        .get(app.url("/api/quizzes/not-a-uuid/leaderboard"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn register_then_login() {
    let app = spawn_app().await;
    let username = format!("new_{}", &Uuid::new_v4().to_string()[..8]);

    let response = app
        .client
        .post(app.url("/api/auth/register"))
        .json(&serde_json::json!({
            "username": username,
            "password": PASSWORD,
            "fullname": "New Player"
        }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 201);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["data"]["username"], username.as_str());
    assert_eq!(body["data"]["full_name"], "New Player");
    assert_eq!(body["data"]["is_admin"], false);
    assert!(body["data"].get("password").is_none());

    let token = app.login(&username).await;
    assert!(!token.is_empty());
}

#[tokio::test]
async fn register_rejects_taken_username_and_bad_input() {
    let app = spawn_app().await;
    let existing = app.add_user(false);

    let response = app
        .client
        .post(app.url("/api/auth/register"))
        .json(&serde_json::json!({
            "username": existing.username,
            "password": PASSWORD,
            "full_name": "Someone Else"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 409);

    let response = app
        .client
        .post(app.url("/api/auth/register"))
        .json(&serde_json::json!({
            "username": "ab",
            "password": PASSWORD,
            "full_name": "Too Short"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn change_password_requires_a_session() {
    let app = spawn_app().await;

    let response = app
        .client
        .post(app.url("/api/auth/change-password"))
        .json(&serde_json::json!({ "old_password": PASSWORD, "new_password": "fresh-pass" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn change_password_checks_old_password() {
    let app = spawn_app().await;
    let user = app.add_user(false);
    let token = app.login(&user.username).await;

    let response = app
        .client
        .post(app.url("/api/auth/change-password"))
        .bearer_auth(&token)
        .json(&serde_json::json!({ "old_password": "not-it", "new_password": "fresh-pass" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 401);

    // Still logged in with the original password.
    let response = app
        .client
        .get(app.url(&format!("/api/quizzes/{}/leaderboard", Uuid::new_v4())))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
}

#[tokio::test]
async fn change_password_revokes_existing_tokens() {
    let app = spawn_app().await;
    let user = app.add_user(false);
    let token = app.login(&user.username).await;

    let response = app
        .client
        .post(app.url("/api/auth/change-password"))
        .bearer_auth(&token)
        .json(&serde_json::json!({ "old_password": PASSWORD, "new_password": "fresh-pass" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    let response = app
        .client
        .get(app.url(&format!("/api/quizzes/{}/leaderboard", Uuid::new_v4())))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 401);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["message"], "auth error: session not found or superseded");

    let login = |password: &'static str| {
        app.client
            .post(app.url("/api/auth/login"))
            .json(&serde_json::json!({ "username": user.username, "password": password }))
            .send()
    };
    assert_eq!(login(PASSWORD).await.unwrap().status().as_u16(), 401);
    assert_eq!(login("fresh-pass").await.unwrap().status().as_u16(), 200);
}
