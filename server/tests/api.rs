use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use dbd_wiki_api::routes::routes;
use dbd_wiki_api::state::{AppState, AuthConfig};
use dbd_wiki_api::store::MemoryStore;

fn test_app() -> Router {
    let auth = AuthConfig {
        key: "integration-test-signing-key-32b!!".to_string(),
        issuer: "dbd-wiki-api".to_string(),
        audience: "dbd-wiki-frontend".to_string(),
        lifetime: chrono::Duration::hours(8),
    };
    let state = AppState::new(Arc::new(MemoryStore::new()), auth, "http://localhost:5173");
    routes(state)
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(value) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(value.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

fn register_body(username: &str, display_name: &str, email: &str) -> Value {
    json!({
        "username": username,
        "displayName": display_name,
        "email": email,
        "password": "Sup3r!pass",
    })
}

async fn register(app: &Router, username: &str, display_name: &str, email: &str) {
    let (status, _) = send(
        app,
        "POST",
        "/register",
        None,
        Some(register_body(username, display_name, email)),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
}

async fn login(app: &Router, username: &str, password: &str) -> String {
    let (status, body) = send(
        app,
        "POST",
        "/login",
        None,
        Some(json!({"username": username, "password": password})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body["token"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn register_login_and_edit_round_trip() {
    let app = test_app();
    register(&app, "alice", "Alice A", "a@x.com").await;

    // Same active username is a conflict.
    let (status, body) = send(
        &app,
        "POST",
        "/register",
        None,
        Some(register_body("alice", "Imposter", "other@x.com")),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("username"));

    let token = login(&app, "alice", "Sup3r!pass").await;

    let (status, me) = send(&app, "GET", "/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["username"], "alice");
    assert_eq!(me["displayName"], "Alice A");
    assert_eq!(me["role"], "user");
    // The hash never leaves the server.
    assert!(me.get("passwordHash").is_none());

    let (status, _) = send(
        &app,
        "PUT",
        "/me/bio",
        Some(&token),
        Some(json!({"bio": "P100 Meg main"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &app,
        "PUT",
        "/me/displayname",
        Some(&token),
        Some(json!({"displayName": "Alice B"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, profile) = send(&app, "GET", "/profiles/alice", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["bio"], "P100 Meg main");
    assert_eq!(profile["displayName"], "Alice B");
}

#[tokio::test]
async fn login_failures_are_indistinguishable() {
    let app = test_app();
    register(&app, "alice", "Alice A", "a@x.com").await;

    let (status, wrong_pass) = send(
        &app,
        "POST",
        "/login",
        None,
        Some(json!({"username": "alice", "password": "wrong"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(wrong_pass.get("token").is_none());

    let (status, unknown_user) = send(
        &app,
        "POST",
        "/login",
        None,
        Some(json!({"username": "nobody", "password": "wrong"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    assert_eq!(wrong_pass["message"], unknown_user["message"]);
}

#[tokio::test]
async fn protected_routes_reject_missing_or_bad_tokens() {
    let app = test_app();

    let (status, _) = send(&app, "GET", "/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, "GET", "/me", Some("not-a-jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &app,
        "PUT",
        "/me/bio",
        None,
        Some(json!({"bio": "anonymous"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn registration_input_is_validated() {
    let app = test_app();

    // Uppercase username.
    let (status, _) = send(
        &app,
        "POST",
        "/register",
        None,
        Some(register_body("Alice", "Alice A", "a@x.com")),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Password policy.
    let (status, _) = send(
        &app,
        "POST",
        "/register",
        None,
        Some(json!({
            "username": "alice",
            "displayName": "Alice A",
            "email": "a@x.com",
            "password": "weakpass",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Email shape.
    let (status, _) = send(
        &app,
        "POST",
        "/register",
        None,
        Some(register_body("alice", "Alice A", "not-an-email")),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn password_change_requires_current_password() {
    let app = test_app();
    register(&app, "alice", "Alice A", "a@x.com").await;
    let token = login(&app, "alice", "Sup3r!pass").await;

    let (status, _) = send(
        &app,
        "PUT",
        "/me/password",
        Some(&token),
        Some(json!({"currentPassword": "wrong", "newPassword": "N3w!pass"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        "PUT",
        "/me/password",
        Some(&token),
        Some(json!({"currentPassword": "Sup3r!pass", "newPassword": "N3w!pass"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // Old password is dead, new one works.
    let (status, _) = send(
        &app,
        "POST",
        "/login",
        None,
        Some(json!({"username": "alice", "password": "Sup3r!pass"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    login(&app, "alice", "N3w!pass").await;
}

#[tokio::test]
async fn deactivated_profile_is_publicly_gone() {
    let app = test_app();
    register(&app, "alice", "Alice A", "a@x.com").await;
    let token = login(&app, "alice", "Sup3r!pass").await;

    let (status, _) = send(&app, "GET", "/profiles/alice", None, None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, first) = send(&app, "DELETE", "/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, second) = send(&app, "DELETE", "/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_ne!(first["message"], second["message"]);

    // Gone from public lookup regardless of who is asking.
    let (status, _) = send(&app, "GET", "/profiles/alice", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, "GET", "/profiles/alice", Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // A deactivated account can no longer log in.
    let (status, _) = send(
        &app,
        "POST",
        "/login",
        None,
        Some(json!({"username": "alice", "password": "Sup3r!pass"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn rating_rules_at_the_boundary() {
    let app = test_app();
    register(&app, "alice", "Alice A", "a@x.com").await;
    register(&app, "bobcat", "Bob C", "b@x.com").await;
    let alice = login(&app, "alice", "Sup3r!pass").await;
    let bob = login(&app, "bobcat", "Sup3r!pass").await;

    // Bob rates Alice, then revises the score.
    let (status, _) = send(
        &app,
        "POST",
        "/profiles/alice/rate",
        Some(&bob),
        Some(json!({"score": 5})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(
        &app,
        "POST",
        "/profiles/alice/rate",
        Some(&bob),
        Some(json!({"score": 2})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // Self-rating is rejected.
    let (status, body) = send(
        &app,
        "POST",
        "/profiles/alice/rate",
        Some(&alice),
        Some(json!({"score": 5})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("own profile"));

    // Score range is enforced before the manager is invoked.
    for score in [0, 6] {
        let (status, _) = send(
            &app,
            "POST",
            "/profiles/alice/rate",
            Some(&bob),
            Some(json!({"score": score})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    // Unknown target.
    let (status, _) = send(
        &app,
        "POST",
        "/profiles/nobody/rate",
        Some(&bob),
        Some(json!({"score": 3})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn comments_carry_the_commenters_display_name() {
    let app = test_app();
    register(&app, "alice", "Alice A", "a@x.com").await;
    register(&app, "bobcat", "Bob C", "b@x.com").await;
    let bob = login(&app, "bobcat", "Sup3r!pass").await;

    let (status, _) = send(
        &app,
        "POST",
        "/profiles/alice/comment",
        Some(&bob),
        Some(json!({"text": "gg wp"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, profile) = send(&app, "GET", "/profiles/alice", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let comments = profile["comments"].as_array().unwrap();
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0]["text"], "gg wp");
    assert_eq!(comments[0]["commenterDisplayName"], "Bob C");

    // Empty comment and unknown target are rejected.
    let (status, _) = send(
        &app,
        "POST",
        "/profiles/alice/comment",
        Some(&bob),
        Some(json!({"text": "   "})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = send(
        &app,
        "POST",
        "/profiles/nobody/comment",
        Some(&bob),
        Some(json!({"text": "hello?"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn avatar_and_favorites_updates() {
    let app = test_app();
    register(&app, "alice", "Alice A", "a@x.com").await;
    let token = login(&app, "alice", "Sup3r!pass").await;

    let (status, _) = send(
        &app,
        "PUT",
        "/me/avatar",
        Some(&token),
        Some(json!({"kind": "url", "url": "https://cdn.example.com/alice.png"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // A multi-megabyte inline avatar is fine as long as it decodes under
    // the 9 MiB cap: the avatar route's body limit must admit the base64
    // inflation instead of 413-ing first.
    let three_mib = base64::Engine::encode(
        &base64::engine::general_purpose::STANDARD,
        vec![0u8; 3 * 1024 * 1024],
    );
    let (status, _) = send(
        &app,
        "PUT",
        "/me/avatar",
        Some(&token),
        Some(json!({"kind": "inline", "contentType": "image/png", "data": three_mib})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // Over the decoded cap: rejected by the handler with the uniform body,
    // not by the transport.
    let ten_mib = base64::Engine::encode(
        &base64::engine::general_purpose::STANDARD,
        vec![0u8; 10 * 1024 * 1024],
    );
    let (status, body) = send(
        &app,
        "PUT",
        "/me/avatar",
        Some(&token),
        Some(json!({"kind": "inline", "contentType": "image/png", "data": ten_mib})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("9MB"));

    // Undecodable inline data is rejected at the boundary.
    let (status, _) = send(
        &app,
        "PUT",
        "/me/avatar",
        Some(&token),
        Some(json!({"kind": "inline", "contentType": "image/png", "data": "*** nope ***"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        "PUT",
        "/me/favorites",
        Some(&token),
        Some(json!({
            "killerBuilds": [
                {"characterName": "The Trapper", "perks": ["Agitation", "Brutal Strength"]}
            ],
            "survivorBuilds": [
                {"characterName": "Meg Thomas", "perks": ["Sprint Burst"]}
            ],
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, me) = send(&app, "GET", "/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["avatar"]["kind"], "url");
    assert_eq!(me["favoriteKillers"][0]["characterName"], "The Trapper");
    assert_eq!(me["favoriteSurvivors"][0]["perks"][0], "Sprint Burst");
}
