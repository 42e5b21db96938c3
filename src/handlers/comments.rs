use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;
use serde_json::{Value, json};
use uuid::Uuid;
use validator::Validate;

use crate::{
    AppState,
    auth::{AuthUser, OptionalAuthUser},
    error::{AppError, Result},
    models::{CommentResponse, CommentSort, CreateCommentRequest},
    services::comment_service,
};

#[derive(Debug, Deserialize)]
pub struct GetCommentsQuery {
    pub sort: Option<CommentSort>,
}

pub async fn create_comment(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(payload): Json<CreateCommentRequest>,
) -> Result<(StatusCode, Json<CommentResponse>)> {
    payload.validate()?;

    let comment =
        comment_service::create_comment(state.store.as_ref(), auth_user.user_id, &payload).await?;

    Ok((StatusCode::CREATED, Json(comment)))
}

pub async fn get_post_comments(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    Query(params): Query<GetCommentsQuery>,
    auth_user: OptionalAuthUser,
) -> Result<Json<Value>> {
    let sort = params.sort.unwrap_or_default();

    let comments =
        comment_service::get_post_comments(state.store.as_ref(), post_id, auth_user.user_id(), sort)
            .await?;

    Ok(Json(json!({
        "comments": comments,
        "postId": post_id
    })))
}

pub async fn get_comment(
    State(state): State<AppState>,
    Path(comment_id): Path<Uuid>,
    auth_user: OptionalAuthUser,
) -> Result<Json<CommentResponse>> {
    let comment = comment_service::get_comment(state.store.as_ref(), comment_id, auth_user.user_id())
        .await?
        .ok_or_else(|| AppError::NotFound("Comment not found".to_string()))?;

    Ok(Json(comment))
}

pub async fn delete_comment(
    State(state): State<AppState>,
    Path(comment_id): Path<Uuid>,
    auth_user: AuthUser,
) -> Result<Json<Value>> {
    let removed = comment_service::delete_comment(
        state.store.as_ref(),
        comment_id,
        auth_user.user_id,
        auth_user.is_admin(),
    )
    .await?;

    Ok(Json(json!({
        "message": "Comment deleted successfully",
        "removed": removed
    })))
}
