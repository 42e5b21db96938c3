#![allow(dead_code)]

use std::sync::Arc;

use forum_core::{
    AppState,
    config::Config,
    models::{
        AuthResponse, CommentResponse, CreateCommentRequest, CreatePostRequest, PostResponse,
        RegisterRequest,
    },
    services::{auth_service, comment_service, post_service},
    store::{MemoryStore, Store},
};
use uuid::Uuid;

pub fn test_config() -> Config {
    Config {
        database_url: None,
        database_max_connections: 1,
        jwt_secret: "test-secret".to_string(),
        jwt_refresh_secret: "test-refresh-secret".to_string(),
        access_token_ttl_minutes: 15,
        refresh_token_ttl_days: 7,
        bcrypt_cost: 4,
        host: "127.0.0.1".to_string(),
        port: 0,
        allowed_origins: vec!["http://localhost:5173".to_string()],
    }
}

pub fn test_state() -> AppState {
    AppState {
        store: Arc::new(MemoryStore::new()),
        config: Arc::new(test_config()),
    }
}

pub async fn register(state: &AppState, username: &str) -> AuthResponse {
    auth_service::register(
        state.store.as_ref(),
        &state.config,
        &RegisterRequest {
            username: username.to_string(),
            passphrase: "correct horse battery".to_string(),
            device_fingerprint: None,
        },
    )
    .await
    .unwrap()
}

pub async fn create_post(store: &dyn Store, author_id: Uuid, title: &str) -> PostResponse {
    post_service::create_post(
        store,
        author_id,
        &CreatePostRequest {
            title: title.to_string(),
            content: "Body of the post, long enough to pass.".to_string(),
            community_id: None,
            tags: Vec::new(),
            is_encrypted: false,
        },
    )
    .await
    .unwrap()
}

pub async fn reply(
    store: &dyn Store,
    author_id: Uuid,
    post_id: Uuid,
    parent_id: Option<Uuid>,
) -> CommentResponse {
    comment_service::create_comment(
        store,
        author_id,
        &CreateCommentRequest {
            post_id,
            content: "A reply".to_string(),
            parent_id,
        },
    )
    .await
    .unwrap()
}

pub async fn comment_count(store: &dyn Store, post_id: Uuid) -> i32 {
    store
        .get_post_raw(post_id)
        .await
        .unwrap()
        .unwrap()
        .comment_count
}
