use chrono::Utc;
use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    models::{
        CommentResponse, CommentSort, CreateCommentRequest, NewComment, TargetKind, VoteTarget,
    },
    services::comment_tree,
    store::Store,
};

pub async fn create_comment(
    store: &dyn Store,
    author_id: Uuid,
    request: &CreateCommentRequest,
) -> Result<CommentResponse> {
    let content = request.content.trim();
    if content.is_empty() {
        return Err(AppError::Validation(
            "Comment content cannot be empty".to_string(),
        ));
    }

    let comment = store
        .create_comment(NewComment {
            id: Uuid::new_v4(),
            post_id: request.post_id,
            user_id: author_id,
            parent_id: request.parent_id,
            content: content.to_string(),
            created_at: Utc::now(),
        })
        .await?;

    tracing::info!(
        "Comment {} created on post {} at depth {}",
        comment.id,
        comment.post_id,
        comment.depth
    );

    get_comment(store, comment.id, Some(author_id))
        .await?
        .ok_or_else(|| AppError::Internal("Failed to retrieve created comment".to_string()))
}

pub async fn get_comment(
    store: &dyn Store,
    comment_id: Uuid,
    viewer_id: Option<Uuid>,
) -> Result<Option<CommentResponse>> {
    let Some(mut comment) = store.get_comment(comment_id).await? else {
        return Ok(None);
    };

    if let Some(viewer_id) = viewer_id {
        let vote = store
            .get_user_vote(viewer_id, VoteTarget::comment(comment_id))
            .await?;
        comment.user_vote = Some(vote);
    }

    Ok(Some(comment))
}

/// Every comment on the post, nested into reply threads and ordered by `sort`.
pub async fn get_post_comments(
    store: &dyn Store,
    post_id: Uuid,
    viewer_id: Option<Uuid>,
    sort: CommentSort,
) -> Result<Vec<CommentResponse>> {
    store
        .get_post_raw(post_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Post not found".to_string()))?;

    let mut comments = store.list_post_comments(post_id).await?;

    if let Some(viewer_id) = viewer_id {
        let ids: Vec<Uuid> = comments.iter().map(|c| c.id).collect();
        let votes = store
            .get_user_votes(viewer_id, TargetKind::Comment, &ids)
            .await?;
        for comment in &mut comments {
            comment.user_vote = Some(votes.get(&comment.id).copied().unwrap_or_default());
        }
    }

    let flat_count = comments.len();
    let tree = comment_tree::build_tree(comments, sort);
    let placed = comment_tree::count_nodes(&tree);
    if placed != flat_count {
        tracing::warn!(
            "Dropped {} orphaned comments while building thread for post {}",
            flat_count - placed,
            post_id
        );
    }

    Ok(tree)
}

/// Deletes the comment and all replies beneath it. Only the author or an
/// admin may do so.
pub async fn delete_comment(
    store: &dyn Store,
    comment_id: Uuid,
    requester_id: Uuid,
    requester_is_admin: bool,
) -> Result<u64> {
    let comment = store
        .get_comment_raw(comment_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Comment not found".to_string()))?;

    if comment.user_id != requester_id && !requester_is_admin {
        return Err(AppError::Authorization(
            "You can only delete your own comments".to_string(),
        ));
    }

    let removed = store.delete_comment(comment_id).await?;
    tracing::info!(
        "Comment {} deleted by {} ({} comments removed)",
        comment_id,
        requester_id,
        removed
    );

    Ok(removed)
}
