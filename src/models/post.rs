use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, Result};
use crate::models::VoteValue;

pub const MAX_TAG_LENGTH: usize = 50;
pub const MIN_TITLE_LENGTH: usize = 10;
pub const MAX_TITLE_LENGTH: usize = 200;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: Uuid,
    pub user_id: Uuid,
    pub community_id: Option<Uuid>,
    pub title: String,
    pub content: String,
    pub is_encrypted: bool,
    pub vote_score: i32,
    pub comment_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PostFile {
    pub id: Uuid,
    pub post_id: Uuid,
    pub file_url: String,
    pub file_name: String,
    pub file_type: String,
    pub file_size: i64,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for a post and its (already normalized) tags.
#[derive(Debug, Clone)]
pub struct NewPost {
    pub id: Uuid,
    pub user_id: Uuid,
    pub community_id: Option<Uuid>,
    pub title: String,
    pub content: String,
    pub is_encrypted: bool,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct PostChanges {
    pub title: Option<String>,
    pub content: Option<String>,
}

// Create post request
#[derive(Debug, Validate, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePostRequest {
    #[validate(length(
        min = 10,
        max = 200,
        message = "Title must be between 10 and 200 characters"
    ))]
    pub title: String,
    #[validate(length(
        min = 10,
        max = 10000,
        message = "Content must be between 10 and 10,000 characters"
    ))]
    pub content: String,
    pub community_id: Option<Uuid>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub is_encrypted: bool,
}

// Update post request
#[derive(Debug, Validate, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePostRequest {
    #[validate(length(
        min = 10,
        max = 200,
        message = "Title must be between 10 and 200 characters"
    ))]
    pub title: Option<String>,
    #[validate(length(
        min = 10,
        max = 10000,
        message = "Content must be between 10 and 10,000 characters"
    ))]
    pub content: Option<String>,
}

#[derive(Debug, Validate, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachFileRequest {
    #[validate(length(min = 1, max = 2048))]
    pub file_url: String,
    #[validate(length(min = 1, max = 255))]
    pub file_name: String,
    #[validate(length(min = 1, max = 100))]
    pub file_type: String,
    #[validate(range(min = 0))]
    pub file_size: i64,
}

// Post response with additional info
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub username: String,
    pub community_id: Option<Uuid>,
    pub community_name: Option<String>,
    pub title: String,
    pub content: String,
    pub is_encrypted: bool,
    pub vote_score: i32,
    pub comment_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub tags: Vec<String>,
    pub files: Vec<PostFile>,
    pub user_vote: Option<VoteValue>,
}

// Sorting options for the feed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostSort {
    #[default]
    Recent,
    Trending,
    Top,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub sort: Option<PostSort>,
    pub community_id: Option<Uuid>,
}

/// Which posts to rank, how, and which 1-indexed page of them to return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedWindow {
    pub community_id: Option<Uuid>,
    pub sort: PostSort,
    pub page: usize,
    pub page_size: usize,
}

impl FeedWindow {
    pub fn offset(&self) -> usize {
        self.page.saturating_sub(1).saturating_mul(self.page_size)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedResponse {
    pub posts: Vec<PostResponse>,
    pub total: usize,
    pub has_more: bool,
}

/// Trims the title and checks the trimmed length, so padding cannot carry a
/// short title past the request validator.
pub fn normalize_title(raw: &str) -> Result<String> {
    let title = raw.trim();
    let length = title.chars().count();
    if !(MIN_TITLE_LENGTH..=MAX_TITLE_LENGTH).contains(&length) {
        return Err(AppError::Validation(format!(
            "title: Title must be between {} and {} characters",
            MIN_TITLE_LENGTH, MAX_TITLE_LENGTH
        )));
    }
    Ok(title.to_string())
}

/// Trims, case-folds and deduplicates tag names, keeping first-seen order.
pub fn normalize_tags(raw: &[String]) -> Result<Vec<String>> {
    let mut tags: Vec<String> = Vec::with_capacity(raw.len());
    for tag in raw {
        let tag = tag.trim().to_lowercase();
        if tag.is_empty() {
            continue;
        }
        if tag.chars().count() > MAX_TAG_LENGTH {
            return Err(AppError::Validation(format!(
                "Tags must be at most {} characters",
                MAX_TAG_LENGTH
            )));
        }
        if !tags.contains(&tag) {
            tags.push(tag);
        }
    }
    Ok(tags)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_are_trimmed_folded_and_deduplicated() {
        let raw = vec![
            " Rust ".to_string(),
            "rust".to_string(),
            "".to_string(),
            "WebDev".to_string(),
            "   ".to_string(),
        ];
        assert_eq!(normalize_tags(&raw).unwrap(), vec!["rust", "webdev"]);
    }

    #[test]
    fn titles_are_measured_after_trimming() {
        assert_eq!(
            normalize_title("  Ten chars!  ").unwrap(),
            "Ten chars!"
        );
        assert!(matches!(
            normalize_title("a         "),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            normalize_title(&format!(" {} ", "x".repeat(MAX_TITLE_LENGTH + 1))),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn overlong_tags_are_rejected() {
        let raw = vec!["x".repeat(MAX_TAG_LENGTH + 1)];
        assert!(matches!(normalize_tags(&raw), Err(AppError::Validation(_))));
    }
}
