//! Turns the flat comment listing of a post into nested reply threads.
//!
//! Nodes live in an arena indexed by comment id; each node's children are
//! collected by index and only materialized into owned `replies` vectors once
//! the whole forest is known. A comment whose parent is not part of the
//! listing is dropped together with everything beneath it.

use std::cmp::Ordering;
use std::collections::HashMap;

use uuid::Uuid;

use crate::models::{CommentResponse, CommentSort};

pub fn build_tree(comments: Vec<CommentResponse>, sort: CommentSort) -> Vec<CommentResponse> {
    let index: HashMap<Uuid, usize> = comments
        .iter()
        .enumerate()
        .map(|(slot, comment)| (comment.id, slot))
        .collect();

    let mut children: Vec<Vec<usize>> = vec![Vec::new(); comments.len()];
    let mut roots = Vec::new();
    for (slot, comment) in comments.iter().enumerate() {
        match comment.parent_id {
            None => roots.push(slot),
            Some(parent_id) => {
                if let Some(&parent_slot) = index.get(&parent_id) {
                    children[parent_slot].push(slot);
                }
            }
        }
    }

    let mut arena: Vec<Option<CommentResponse>> = comments.into_iter().map(Some).collect();
    let mut forest: Vec<CommentResponse> = roots
        .into_iter()
        .filter_map(|slot| assemble(slot, &mut arena, &children, sort))
        .collect();
    forest.sort_by(|a, b| compare(a, b, sort));
    forest
}

fn assemble(
    slot: usize,
    arena: &mut [Option<CommentResponse>],
    children: &[Vec<usize>],
    sort: CommentSort,
) -> Option<CommentResponse> {
    // Taking the node out of its slot means every comment is placed at most once.
    let mut node = arena[slot].take()?;

    let mut replies: Vec<CommentResponse> = children[slot]
        .iter()
        .filter_map(|&child| assemble(child, arena, children, sort))
        .collect();
    replies.sort_by(|a, b| compare(a, b, sort));
    node.replies = replies;

    Some(node)
}

fn compare(a: &CommentResponse, b: &CommentResponse, sort: CommentSort) -> Ordering {
    let newest_first = b.created_at.cmp(&a.created_at);
    match sort {
        CommentSort::Top => b.vote_score.cmp(&a.vote_score).then(newest_first),
        CommentSort::New => newest_first,
        CommentSort::Controversial => a
            .vote_score
            .unsigned_abs()
            .cmp(&b.vote_score.unsigned_abs())
            .then(newest_first),
    }
}

/// Total number of comments in a forest, replies included.
pub fn count_nodes(forest: &[CommentResponse]) -> usize {
    forest
        .iter()
        .map(|comment| 1 + count_nodes(&comment.replies))
        .sum()
}
