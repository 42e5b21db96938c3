use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, Result};
use crate::models::VoteValue;

/// Deepest level a reply may sit at; top-level comments are depth 0.
pub const MAX_COMMENT_DEPTH: i32 = 5;

/// Depth of a new reply under a parent at `parent_depth`.
pub fn reply_depth(parent_depth: i32) -> Result<i32> {
    let depth = parent_depth + 1;
    if depth > MAX_COMMENT_DEPTH {
        return Err(AppError::DepthExceeded(MAX_COMMENT_DEPTH));
    }
    Ok(depth)
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: Uuid,
    pub post_id: Uuid,
    pub user_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub content: String,
    pub depth: i32,
    pub vote_score: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert payload handed to the store once the request has been validated.
#[derive(Debug, Clone)]
pub struct NewComment {
    pub id: Uuid,
    pub post_id: Uuid,
    pub user_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

// Create comment request
#[derive(Debug, Validate, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCommentRequest {
    pub post_id: Uuid,
    #[validate(length(
        min = 1,
        max = 10000,
        message = "Content must be between 1 and 10,000 characters"
    ))]
    pub content: String,
    pub parent_id: Option<Uuid>,
}

// Comment response with nested structure
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentResponse {
    pub id: Uuid,
    pub post_id: Uuid,
    pub user_id: Uuid,
    pub username: String,
    pub parent_id: Option<Uuid>,
    pub content: String,
    pub depth: i32,
    pub vote_score: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub user_vote: Option<VoteValue>,
    pub replies: Vec<CommentResponse>,
}

impl CommentResponse {
    pub fn from_comment(comment: Comment, username: String) -> Self {
        Self {
            id: comment.id,
            post_id: comment.post_id,
            user_id: comment.user_id,
            username,
            parent_id: comment.parent_id,
            content: comment.content,
            depth: comment.depth,
            vote_score: comment.vote_score,
            created_at: comment.created_at,
            updated_at: comment.updated_at,
            user_vote: None,
            replies: Vec::new(),
        }
    }
}

// Comment sorting options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommentSort {
    #[default]
    Top,
    New,
    Controversial,
}
