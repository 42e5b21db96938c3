use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde_json::{Value, json};
use uuid::Uuid;
use validator::Validate;

use crate::{
    AppState,
    auth::{AuthUser, OptionalAuthUser},
    error::Result,
    models::{
        AttachFileRequest, CreatePostRequest, FeedQuery, FeedResponse, PostFile, PostResponse,
        UpdatePostRequest,
    },
    services::post_service,
};

pub async fn get_posts(
    State(state): State<AppState>,
    Query(params): Query<FeedQuery>,
    auth_user: OptionalAuthUser,
) -> Result<Json<FeedResponse>> {
    let feed = post_service::get_feed(state.store.as_ref(), &params, auth_user.user_id()).await?;

    Ok(Json(feed))
}

pub async fn create_post(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(payload): Json<CreatePostRequest>,
) -> Result<(StatusCode, Json<PostResponse>)> {
    payload.validate()?;

    let post = post_service::create_post(state.store.as_ref(), auth_user.user_id, &payload).await?;

    Ok((StatusCode::CREATED, Json(post)))
}

pub async fn get_post(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    auth_user: OptionalAuthUser,
) -> Result<Json<PostResponse>> {
    let post = post_service::get_post(state.store.as_ref(), post_id, auth_user.user_id()).await?;

    Ok(Json(post))
}

pub async fn update_post(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    auth_user: AuthUser,
    Json(payload): Json<UpdatePostRequest>,
) -> Result<Json<PostResponse>> {
    payload.validate()?;

    let post =
        post_service::update_post(state.store.as_ref(), post_id, auth_user.user_id, &payload)
            .await?;

    Ok(Json(post))
}

pub async fn delete_post(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    auth_user: AuthUser,
) -> Result<Json<Value>> {
    post_service::delete_post(
        state.store.as_ref(),
        post_id,
        auth_user.user_id,
        auth_user.is_admin(),
    )
    .await?;

    Ok(Json(json!({
        "message": "Post deleted successfully"
    })))
}

pub async fn attach_file(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    auth_user: AuthUser,
    Json(payload): Json<AttachFileRequest>,
) -> Result<(StatusCode, Json<PostFile>)> {
    payload.validate()?;

    let file =
        post_service::attach_file(state.store.as_ref(), post_id, auth_user.user_id, &payload)
            .await?;

    Ok((StatusCode::CREATED, Json(file)))
}
