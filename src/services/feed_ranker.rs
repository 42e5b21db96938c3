//! Feed ordering and pagination.

use chrono::{DateTime, Utc};

use crate::models::{Post, PostSort};

/// Hours added to a post's age before applying gravity, so brand new posts
/// do not divide by zero.
pub const TRENDING_HOUR_OFFSET: f64 = 2.0;
/// Exponent controlling how quickly trending scores decay with age.
pub const TRENDING_GRAVITY: f64 = 1.5;

/// `vote_score / (age_hours + 2)^1.5`, with age measured at `now`.
pub fn trending_score(vote_score: i32, created_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    // Clock skew can put created_at slightly in the future.
    let age_hours = ((now - created_at).num_milliseconds() as f64 / 3_600_000.0).max(0.0);
    f64::from(vote_score) / (age_hours + TRENDING_HOUR_OFFSET).powf(TRENDING_GRAVITY)
}

#[derive(Debug, Clone)]
pub struct FeedPage<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub has_more: bool,
}

/// Orders the candidate posts and cuts out one page. `page` is 1-indexed.
pub fn rank_posts(
    posts: Vec<Post>,
    sort: PostSort,
    page: usize,
    page_size: usize,
    now: DateTime<Utc>,
) -> FeedPage<Post> {
    let total = posts.len();

    let ranked: Vec<Post> = match sort {
        PostSort::Recent => {
            let mut posts = posts;
            posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            posts
        }
        PostSort::Top => {
            let mut posts = posts;
            posts.sort_by(|a, b| {
                b.vote_score
                    .cmp(&a.vote_score)
                    .then(b.created_at.cmp(&a.created_at))
            });
            posts
        }
        PostSort::Trending => {
            let mut scored: Vec<(f64, Post)> = posts
                .into_iter()
                .map(|post| (trending_score(post.vote_score, post.created_at, now), post))
                .collect();
            scored.sort_by(|(score_a, a), (score_b, b)| {
                score_b
                    .total_cmp(score_a)
                    .then(b.created_at.cmp(&a.created_at))
            });
            scored.into_iter().map(|(_, post)| post).collect()
        }
    };

    let offset = page.saturating_sub(1).saturating_mul(page_size);
    let items: Vec<Post> = ranked.into_iter().skip(offset).take(page_size).collect();
    let has_more = offset + items.len() < total;

    FeedPage {
        items,
        total,
        has_more,
    }
}
