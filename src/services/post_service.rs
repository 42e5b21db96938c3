use chrono::Utc;
use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    models::{
        AttachFileRequest, CreatePostRequest, FeedQuery, FeedResponse, FeedWindow, NewPost,
        Post, PostChanges, PostFile, PostResponse, TargetKind, UpdatePostRequest, VoteTarget,
        normalize_tags, normalize_title,
    },
    store::Store,
};

pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 100;

async fn require_post(store: &dyn Store, post_id: Uuid) -> Result<Post> {
    store
        .get_post_raw(post_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Post not found".to_string()))
}

pub async fn create_post(
    store: &dyn Store,
    author_id: Uuid,
    request: &CreatePostRequest,
) -> Result<PostResponse> {
    let title = normalize_title(&request.title)?;
    let tags = normalize_tags(&request.tags)?;

    if let Some(community_id) = request.community_id {
        if !store.community_exists(community_id).await? {
            return Err(AppError::NotFound("Community not found".to_string()));
        }
    }

    let post = store
        .create_post(NewPost {
            id: Uuid::new_v4(),
            user_id: author_id,
            community_id: request.community_id,
            title,
            content: request.content.clone(),
            is_encrypted: request.is_encrypted,
            tags,
            created_at: Utc::now(),
        })
        .await?;

    tracing::info!("Post {} created by {}", post.id, author_id);

    get_post(store, post.id, Some(author_id)).await
}

pub async fn get_post(
    store: &dyn Store,
    post_id: Uuid,
    viewer_id: Option<Uuid>,
) -> Result<PostResponse> {
    let mut post = store
        .get_post(post_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Post not found".to_string()))?;

    if let Some(viewer_id) = viewer_id {
        post.user_vote = Some(
            store
                .get_user_vote(viewer_id, VoteTarget::post(post_id))
                .await?,
        );
    }

    Ok(post)
}

pub async fn update_post(
    store: &dyn Store,
    post_id: Uuid,
    editor_id: Uuid,
    request: &UpdatePostRequest,
) -> Result<PostResponse> {
    let title = request.title.as_deref().map(normalize_title).transpose()?;

    let post = require_post(store, post_id).await?;
    if post.user_id != editor_id {
        return Err(AppError::Authorization(
            "You can only edit your own posts".to_string(),
        ));
    }

    store
        .update_post(
            post_id,
            PostChanges {
                title,
                content: request.content.clone(),
            },
        )
        .await?;

    get_post(store, post_id, Some(editor_id)).await
}

pub async fn delete_post(
    store: &dyn Store,
    post_id: Uuid,
    requester_id: Uuid,
    requester_is_admin: bool,
) -> Result<()> {
    let post = require_post(store, post_id).await?;
    if post.user_id != requester_id && !requester_is_admin {
        return Err(AppError::Authorization(
            "You can only delete your own posts".to_string(),
        ));
    }

    store.delete_post(post_id).await?;
    tracing::info!("Post {} deleted by {}", post_id, requester_id);

    Ok(())
}

pub async fn attach_file(
    store: &dyn Store,
    post_id: Uuid,
    uploader_id: Uuid,
    request: &AttachFileRequest,
) -> Result<PostFile> {
    let post = require_post(store, post_id).await?;
    if post.user_id != uploader_id {
        return Err(AppError::Authorization(
            "You can only attach files to your own posts".to_string(),
        ));
    }

    store
        .attach_file(PostFile {
            id: Uuid::new_v4(),
            post_id,
            file_url: request.file_url.clone(),
            file_name: request.file_name.clone(),
            file_type: request.file_type.clone(),
            file_size: request.file_size,
            created_at: Utc::now(),
        })
        .await
}

/// One page of the feed. Ordering and slicing happen in the store; the
/// viewer's votes are filled in with a single batch lookup.
pub async fn get_feed(
    store: &dyn Store,
    query: &FeedQuery,
    viewer_id: Option<Uuid>,
) -> Result<FeedResponse> {
    let page = query.page.unwrap_or(1);
    if page < 1 {
        return Err(AppError::Validation("Page must be at least 1".to_string()));
    }
    let limit = query
        .limit
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);

    let window = FeedWindow {
        community_id: query.community_id,
        sort: query.sort.unwrap_or_default(),
        page: page as usize,
        page_size: limit as usize,
    };
    let feed = store.list_feed(window, Utc::now()).await?;
    let mut posts = feed.items;

    if let Some(viewer_id) = viewer_id {
        let ids: Vec<Uuid> = posts.iter().map(|p| p.id).collect();
        let votes = store.get_user_votes(viewer_id, TargetKind::Post, &ids).await?;
        for post in &mut posts {
            post.user_vote = Some(votes.get(&post.id).copied().unwrap_or_default());
        }
    }

    Ok(FeedResponse {
        posts,
        total: feed.total,
        has_more: feed.has_more,
    })
}
