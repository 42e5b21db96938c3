mod common;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
};
use common::test_state;
use forum_core::create_app;
use serde_json::{Value, json};
use tower::ServiceExt;

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };

    (status, json)
}

async fn register(app: &Router, username: &str) -> (String, String) {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/auth/register",
        None,
        Some(json!({ "username": username, "passphrase": "correct horse battery" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);

    (
        body["token"].as_str().unwrap().to_string(),
        body["user"]["id"].as_str().unwrap().to_string(),
    )
}

async fn create_post(app: &Router, token: &str, title: &str) -> String {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/posts",
        Some(token),
        Some(json!({ "title": title, "content": "Plenty of words in this body." })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    body["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn health_check() {
    let app = create_app(test_state());
    let (status, body) = send(&app, Method::GET, "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn registration_login_and_refresh() {
    let app = create_app(test_state());

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/auth/register",
        None,
        Some(json!({ "username": "alice", "passphrase": "correct horse battery" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["user"]["username"], "alice");
    assert_eq!(body["recoveryKey"].as_str().unwrap().len(), 64);
    assert!(body["user"].get("passphraseHash").is_none());
    let refresh_token = body["refreshToken"].as_str().unwrap().to_string();
    let access_token = body["token"].as_str().unwrap().to_string();

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/auth/register",
        None,
        Some(json!({ "username": "alice", "passphrase": "another passphrase" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/auth/register",
        None,
        Some(json!({ "username": "bad name!", "passphrase": "correct horse battery" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "username": "alice", "passphrase": "wrong passphrase" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid username or passphrase");

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "username": "alice", "passphrase": "correct horse battery" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.get("recoveryKey").is_none());

    let (status, body) = send(&app, Method::GET, "/api/auth/me", Some(&access_token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], "alice");

    let (status, _) = send(&app, Method::GET, "/api/auth/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/auth/logout",
        Some(&access_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "success": true }));

    let (status, _) = send(&app, Method::POST, "/api/auth/logout", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/auth/refresh",
        None,
        Some(json!({ "refreshToken": refresh_token })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["token"].is_string());

    // Access tokens are signed with a different secret.
    let (status, _) = send(
        &app,
        Method::POST,
        "/api/auth/refresh",
        None,
        Some(json!({ "refreshToken": access_token })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn voting_over_http() {
    let app = create_app(test_state());
    let (alice, _) = register(&app, "alice").await;
    let (bob, _) = register(&app, "bob").await;
    let post_id = create_post(&app, &alice, "Votes travel over the wire").await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/votes",
        Some(&alice),
        Some(json!({ "targetId": post_id, "targetType": "post", "voteType": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "voteScore": 1, "userVote": 1 }));

    let (_, body) = send(
        &app,
        Method::POST,
        "/api/votes",
        Some(&bob),
        Some(json!({ "targetId": post_id, "targetType": "post", "voteType": -1 })),
    )
    .await;
    assert_eq!(body["voteScore"], 0);

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/votes",
        Some(&bob),
        Some(json!({ "targetId": post_id, "targetType": "post", "voteType": 5 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    for bad in [json!(1.5), json!("up"), json!(70000), Value::Null] {
        let (status, body) = send(
            &app,
            Method::POST,
            "/api/votes",
            Some(&bob),
            Some(json!({ "targetId": post_id, "targetType": "post", "voteType": bad })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", bad);
        assert_eq!(body["status"], 400);
        assert!(body["error"].is_string());
    }

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/votes",
        Some(&bob),
        Some(json!({
            "targetId": "00000000-0000-0000-0000-000000000000",
            "targetType": "comment",
            "voteType": 1
        })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/votes",
        None,
        Some(json!({ "targetId": post_id, "targetType": "post", "voteType": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(
        &app,
        Method::GET,
        &format!("/api/votes/post/{}/user", post_id),
        Some(&bob),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "userVote": -1 }));

    let (status, body) = send(
        &app,
        Method::GET,
        &format!("/api/votes/post/{}/counts", post_id),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "upvotes": 1, "downvotes": 1, "score": 0 }));

    let (status, body) = send(
        &app,
        Method::GET,
        &format!("/api/posts/{}", post_id),
        Some(&alice),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["voteScore"], 0);
    assert_eq!(body["userVote"], 1);
}

#[tokio::test]
async fn comment_threads_over_http() {
    let app = create_app(test_state());
    let (alice, _) = register(&app, "alice").await;
    let (bob, _) = register(&app, "bob").await;
    let post_id = create_post(&app, &alice, "Threads over the wire").await;

    let mut parent: Option<String> = None;
    let mut first = String::new();
    for _ in 0..6 {
        let (status, body) = send(
            &app,
            Method::POST,
            "/api/comments",
            Some(&alice),
            Some(json!({ "postId": post_id, "content": "Going deeper", "parentId": parent })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        let id = body["id"].as_str().unwrap().to_string();
        if first.is_empty() {
            first = id.clone();
        }
        parent = Some(id);
    }

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/comments",
        Some(&alice),
        Some(json!({ "postId": post_id, "content": "Too deep", "parentId": parent })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Maximum nesting depth of 5 exceeded");

    let (status, body) = send(
        &app,
        Method::GET,
        &format!("/api/posts/{}/comments?sort=controversial", post_id),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let roots = body["comments"].as_array().unwrap();
    assert_eq!(roots.len(), 1);
    assert_eq!(roots[0]["replies"][0]["depth"], 1);

    let (status, _) = send(
        &app,
        Method::GET,
        &format!("/api/posts/{}/comments?sort=sideways", post_id),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        Method::DELETE,
        &format!("/api/comments/{}", first),
        Some(&bob),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        &app,
        Method::DELETE,
        &format!("/api/comments/{}", first),
        Some(&alice),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["removed"], 6);

    let (_, body) = send(
        &app,
        Method::GET,
        &format!("/api/posts/{}", post_id),
        None,
        None,
    )
    .await;
    assert_eq!(body["commentCount"], 0);
}

#[tokio::test]
async fn feed_over_http() {
    let app = create_app(test_state());
    let (alice, _) = register(&app, "alice").await;
    for i in 0..3 {
        create_post(&app, &alice, &format!("Feed entry number {}", i)).await;
    }

    let (status, body) = send(
        &app,
        Method::GET,
        "/api/posts?page=1&limit=2&sort=trending",
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["posts"].as_array().unwrap().len(), 2);
    assert_eq!(body["total"], 3);
    assert_eq!(body["hasMore"], true);

    let (status, body) = send(&app, Method::GET, "/api/posts?page=0", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], 400);

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/posts",
        Some(&alice),
        Some(json!({ "title": "short", "content": "Plenty of words in this body." })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
