//! Persistence port.
//!
//! Every mutation of a cached aggregate (`vote_score`, `comment_count`) goes
//! through one of the methods below and is applied in the same atomic unit
//! as the ledger or comment change it reflects. Callers never write those
//! columns themselves.

pub mod memory;
pub mod postgres;

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{
    Comment, CommentResponse, Community, FeedWindow, NewComment, NewPost, NewUser, Post,
    PostChanges, PostFile, PostResponse, TargetKind, User, VoteCounts, VoteOutcome, VoteTarget,
    VoteValue,
};
use crate::services::feed_ranker::FeedPage;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait Store: Send + Sync {
    // Users
    async fn create_user(&self, user: NewUser) -> Result<User>;
    async fn get_user(&self, user_id: Uuid) -> Result<Option<User>>;
    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>>;
    async fn record_login(&self, user_id: Uuid) -> Result<()>;
    async fn lift_ban(&self, user_id: Uuid) -> Result<()>;

    // Communities
    async fn create_community(&self, community: Community) -> Result<Community>;
    async fn list_communities(&self) -> Result<Vec<Community>>;
    async fn community_exists(&self, community_id: Uuid) -> Result<bool>;

    // Posts
    /// Inserts the post and links its tags in one transaction.
    async fn create_post(&self, post: NewPost) -> Result<Post>;
    async fn get_post_raw(&self, post_id: Uuid) -> Result<Option<Post>>;
    /// Post with author, community, tags and files; `user_vote` is left unset.
    async fn get_post(&self, post_id: Uuid) -> Result<Option<PostResponse>>;
    async fn update_post(&self, post_id: Uuid, changes: PostChanges) -> Result<()>;
    /// Removes the post together with its comments, tags, files and every
    /// ledger row that points at any of them.
    async fn delete_post(&self, post_id: Uuid) -> Result<()>;
    /// One sorted page of the feed with tags and files loaded, plus the total
    /// number of posts matching the community filter. Trending age is
    /// measured at `now`; `user_vote` is left unset.
    async fn list_feed(
        &self,
        window: FeedWindow,
        now: DateTime<Utc>,
    ) -> Result<FeedPage<PostResponse>>;
    async fn attach_file(&self, file: PostFile) -> Result<PostFile>;

    // Comments
    /// Resolves the parent, fixes the depth and increments the post's
    /// `comment_count` atomically. Fails with `NotFound` for a missing post
    /// or parent and `DepthExceeded` past the nesting limit.
    async fn create_comment(&self, comment: NewComment) -> Result<Comment>;
    async fn get_comment_raw(&self, comment_id: Uuid) -> Result<Option<Comment>>;
    async fn get_comment(&self, comment_id: Uuid) -> Result<Option<CommentResponse>>;
    /// Flat, unordered list of every comment on the post.
    async fn list_post_comments(&self, post_id: Uuid) -> Result<Vec<CommentResponse>>;
    /// Deletes the comment and its whole subtree, decrementing the post's
    /// `comment_count` by the number of rows removed. Returns that number.
    async fn delete_comment(&self, comment_id: Uuid) -> Result<u64>;

    // Vote ledger
    /// Read current vote, write the ledger and adjust the target's score as a
    /// single serialized unit per target.
    async fn apply_vote(
        &self,
        voter_id: Uuid,
        target: VoteTarget,
        requested: VoteValue,
    ) -> Result<VoteOutcome>;
    async fn get_user_vote(&self, voter_id: Uuid, target: VoteTarget) -> Result<VoteValue>;
    /// Batch lookup of one voter's votes; targets without a vote are absent.
    async fn get_user_votes(
        &self,
        voter_id: Uuid,
        kind: TargetKind,
        target_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, VoteValue>>;
    async fn get_vote_counts(&self, target: VoteTarget) -> Result<VoteCounts>;
}
