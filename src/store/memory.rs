use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    models::{
        Comment, CommentResponse, Community, FeedWindow, NewComment, NewPost, NewUser, Post,
        PostChanges, PostFile, PostResponse, TargetKind, User, UserRole, Vote, VoteCounts,
        VoteOutcome, VoteTarget, VoteTransition, VoteValue, reply_depth,
    },
    services::feed_ranker::{self, FeedPage},
    store::Store,
};

#[derive(Default)]
struct MemoryState {
    users: HashMap<Uuid, User>,
    communities: HashMap<Uuid, Community>,
    posts: HashMap<Uuid, Post>,
    post_tags: HashMap<Uuid, Vec<String>>,
    post_files: HashMap<Uuid, Vec<PostFile>>,
    comments: HashMap<Uuid, Comment>,
    votes: HashMap<(Uuid, VoteTarget), Vote>,
}

impl MemoryState {
    fn score_mut(&mut self, target: VoteTarget) -> Option<&mut i32> {
        match target.kind {
            TargetKind::Post => self.posts.get_mut(&target.id).map(|p| &mut p.vote_score),
            TargetKind::Comment => self.comments.get_mut(&target.id).map(|c| &mut c.vote_score),
        }
    }

    fn current_vote(&self, voter_id: Uuid, target: VoteTarget) -> Result<VoteValue> {
        match self.votes.get(&(voter_id, target)) {
            Some(vote) => VoteValue::try_from(vote.vote_type).map_err(|_| {
                AppError::Internal(format!("Corrupt vote value in ledger: {}", vote.vote_type))
            }),
            None => Ok(VoteValue::Neutral),
        }
    }

    /// Ids of `root` and every comment beneath it.
    fn subtree(&self, root: Uuid) -> Vec<Uuid> {
        let mut doomed = vec![root];
        let mut cursor = 0;
        while cursor < doomed.len() {
            let parent = doomed[cursor];
            doomed.extend(
                self.comments
                    .values()
                    .filter(|c| c.parent_id == Some(parent))
                    .map(|c| c.id),
            );
            cursor += 1;
        }
        doomed
    }

    fn post_response(&self, post: &Post) -> Option<PostResponse> {
        let author = self.users.get(&post.user_id)?;
        let community_name = post
            .community_id
            .and_then(|id| self.communities.get(&id))
            .map(|c| c.name.clone());
        let mut tags = self.post_tags.get(&post.id).cloned().unwrap_or_default();
        tags.sort();

        Some(PostResponse {
            id: post.id,
            user_id: post.user_id,
            username: author.username.clone(),
            community_id: post.community_id,
            community_name,
            title: post.title.clone(),
            content: post.content.clone(),
            is_encrypted: post.is_encrypted,
            vote_score: post.vote_score,
            comment_count: post.comment_count,
            created_at: post.created_at,
            updated_at: post.updated_at,
            tags,
            files: self.post_files.get(&post.id).cloned().unwrap_or_default(),
            user_vote: None,
        })
    }

    fn comment_response(&self, comment: &Comment) -> Option<CommentResponse> {
        let author = self.users.get(&comment.user_id)?;
        Some(CommentResponse::from_comment(
            comment.clone(),
            author.username.clone(),
        ))
    }
}

/// Process-local store. A single write lock makes every mutation, including
/// the read-ledger/write-ledger/adjust-score sequence, one isolated unit.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_user(&self, user: NewUser) -> Result<User> {
        let mut state = self.state.write().await;

        if state.users.values().any(|u| u.username == user.username) {
            return Err(AppError::Conflict("Username already taken".to_string()));
        }

        let created = User {
            id: user.id,
            username: user.username,
            passphrase_hash: user.passphrase_hash,
            recovery_key_hash: user.recovery_key_hash,
            device_fingerprint: user.device_fingerprint,
            role: UserRole::User,
            karma: 0,
            is_banned: false,
            ban_reason: None,
            ban_expires_at: None,
            created_at: user.created_at,
            last_login_at: None,
        };
        state.users.insert(created.id, created.clone());

        Ok(created)
    }

    async fn get_user(&self, user_id: Uuid) -> Result<Option<User>> {
        Ok(self.state.read().await.users.get(&user_id).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let state = self.state.read().await;
        Ok(state
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn record_login(&self, user_id: Uuid) -> Result<()> {
        if let Some(user) = self.state.write().await.users.get_mut(&user_id) {
            user.last_login_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn lift_ban(&self, user_id: Uuid) -> Result<()> {
        if let Some(user) = self.state.write().await.users.get_mut(&user_id) {
            user.is_banned = false;
            user.ban_reason = None;
            user.ban_expires_at = None;
        }
        Ok(())
    }

    async fn create_community(&self, community: Community) -> Result<Community> {
        let mut state = self.state.write().await;

        if state.communities.values().any(|c| c.name == community.name) {
            return Err(AppError::Conflict(
                "Community name already taken".to_string(),
            ));
        }
        state.communities.insert(community.id, community.clone());

        Ok(community)
    }

    async fn list_communities(&self) -> Result<Vec<Community>> {
        let state = self.state.read().await;
        let mut communities: Vec<Community> = state.communities.values().cloned().collect();
        communities.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(communities)
    }

    async fn community_exists(&self, community_id: Uuid) -> Result<bool> {
        Ok(self
            .state
            .read()
            .await
            .communities
            .contains_key(&community_id))
    }

    async fn create_post(&self, post: NewPost) -> Result<Post> {
        let mut state = self.state.write().await;

        let created = Post {
            id: post.id,
            user_id: post.user_id,
            community_id: post.community_id,
            title: post.title,
            content: post.content,
            is_encrypted: post.is_encrypted,
            vote_score: 0,
            comment_count: 0,
            created_at: post.created_at,
            updated_at: post.created_at,
        };
        state.posts.insert(created.id, created.clone());
        if !post.tags.is_empty() {
            state.post_tags.insert(created.id, post.tags);
        }

        Ok(created)
    }

    async fn get_post_raw(&self, post_id: Uuid) -> Result<Option<Post>> {
        Ok(self.state.read().await.posts.get(&post_id).cloned())
    }

    async fn get_post(&self, post_id: Uuid) -> Result<Option<PostResponse>> {
        let state = self.state.read().await;
        Ok(state
            .posts
            .get(&post_id)
            .and_then(|post| state.post_response(post)))
    }

    async fn update_post(&self, post_id: Uuid, changes: PostChanges) -> Result<()> {
        let mut state = self.state.write().await;
        let post = state
            .posts
            .get_mut(&post_id)
            .ok_or_else(|| AppError::NotFound("Post not found".to_string()))?;

        if let Some(title) = changes.title {
            post.title = title;
        }
        if let Some(content) = changes.content {
            post.content = content;
        }
        post.updated_at = Utc::now();

        Ok(())
    }

    async fn delete_post(&self, post_id: Uuid) -> Result<()> {
        let mut state = self.state.write().await;

        if state.posts.remove(&post_id).is_none() {
            return Err(AppError::NotFound("Post not found".to_string()));
        }

        let comment_ids: HashSet<Uuid> = state
            .comments
            .values()
            .filter(|c| c.post_id == post_id)
            .map(|c| c.id)
            .collect();
        state.comments.retain(|id, _| !comment_ids.contains(id));
        state.votes.retain(|(_, target), _| match target.kind {
            TargetKind::Post => target.id != post_id,
            TargetKind::Comment => !comment_ids.contains(&target.id),
        });
        state.post_tags.remove(&post_id);
        state.post_files.remove(&post_id);

        Ok(())
    }

    async fn list_feed(
        &self,
        window: FeedWindow,
        now: DateTime<Utc>,
    ) -> Result<FeedPage<PostResponse>> {
        let state = self.state.read().await;
        let candidates: Vec<Post> = state
            .posts
            .values()
            .filter(|p| window.community_id.is_none() || p.community_id == window.community_id)
            .cloned()
            .collect();

        let ranked = feed_ranker::rank_posts(
            candidates,
            window.sort,
            window.page,
            window.page_size,
            now,
        );

        Ok(FeedPage {
            items: ranked
                .items
                .iter()
                .filter_map(|post| state.post_response(post))
                .collect(),
            total: ranked.total,
            has_more: ranked.has_more,
        })
    }

    async fn attach_file(&self, file: PostFile) -> Result<PostFile> {
        let mut state = self.state.write().await;

        if !state.posts.contains_key(&file.post_id) {
            return Err(AppError::NotFound("Post not found".to_string()));
        }
        state
            .post_files
            .entry(file.post_id)
            .or_default()
            .push(file.clone());

        Ok(file)
    }

    async fn create_comment(&self, comment: NewComment) -> Result<Comment> {
        let mut state = self.state.write().await;

        if !state.posts.contains_key(&comment.post_id) {
            return Err(AppError::NotFound("Post not found".to_string()));
        }

        let depth = match comment.parent_id {
            Some(parent_id) => {
                let parent = state
                    .comments
                    .get(&parent_id)
                    .filter(|parent| parent.post_id == comment.post_id)
                    .ok_or_else(|| AppError::NotFound("Parent comment not found".to_string()))?;
                reply_depth(parent.depth)?
            }
            None => 0,
        };

        let created = Comment {
            id: comment.id,
            post_id: comment.post_id,
            user_id: comment.user_id,
            parent_id: comment.parent_id,
            content: comment.content,
            depth,
            vote_score: 0,
            created_at: comment.created_at,
            updated_at: comment.created_at,
        };
        state.comments.insert(created.id, created.clone());
        if let Some(post) = state.posts.get_mut(&created.post_id) {
            post.comment_count += 1;
        }

        Ok(created)
    }

    async fn get_comment_raw(&self, comment_id: Uuid) -> Result<Option<Comment>> {
        Ok(self.state.read().await.comments.get(&comment_id).cloned())
    }

    async fn get_comment(&self, comment_id: Uuid) -> Result<Option<CommentResponse>> {
        let state = self.state.read().await;
        Ok(state
            .comments
            .get(&comment_id)
            .and_then(|c| state.comment_response(c)))
    }

    async fn list_post_comments(&self, post_id: Uuid) -> Result<Vec<CommentResponse>> {
        let state = self.state.read().await;
        Ok(state
            .comments
            .values()
            .filter(|c| c.post_id == post_id)
            .filter_map(|c| state.comment_response(c))
            .collect())
    }

    async fn delete_comment(&self, comment_id: Uuid) -> Result<u64> {
        let mut state = self.state.write().await;

        let post_id = state
            .comments
            .get(&comment_id)
            .map(|c| c.post_id)
            .ok_or_else(|| AppError::NotFound("Comment not found".to_string()))?;

        let doomed: HashSet<Uuid> = state.subtree(comment_id).into_iter().collect();
        state.comments.retain(|id, _| !doomed.contains(id));
        state.votes.retain(|(_, target), _| {
            !(target.kind == TargetKind::Comment && doomed.contains(&target.id))
        });

        let removed = doomed.len() as u64;
        if let Some(post) = state.posts.get_mut(&post_id) {
            post.comment_count -= removed as i32;
        }

        Ok(removed)
    }

    async fn apply_vote(
        &self,
        voter_id: Uuid,
        target: VoteTarget,
        requested: VoteValue,
    ) -> Result<VoteOutcome> {
        let mut state = self.state.write().await;

        let current_score = state
            .score_mut(target)
            .map(|score| *score)
            .ok_or_else(|| AppError::NotFound(format!("{} not found", target.kind)))?;
        let current = state.current_vote(voter_id, target)?;

        let transition = VoteTransition::plan(current, requested);
        let key = (voter_id, target);
        let now = Utc::now();
        match transition {
            VoteTransition::Unchanged => {}
            VoteTransition::Cast(value) => {
                let vote = Vote {
                    id: Uuid::new_v4(),
                    user_id: voter_id,
                    post_id: (target.kind == TargetKind::Post).then_some(target.id),
                    comment_id: (target.kind == TargetKind::Comment).then_some(target.id),
                    vote_type: value.as_i16(),
                    created_at: now,
                    updated_at: now,
                };
                state.votes.insert(key, vote);
            }
            VoteTransition::Change { to, .. } => {
                if let Some(vote) = state.votes.get_mut(&key) {
                    vote.vote_type = to.as_i16();
                    vote.updated_at = now;
                }
            }
            VoteTransition::Retract(_) => {
                state.votes.remove(&key);
            }
        }

        let vote_score = current_score + transition.score_change();
        if let Some(score) = state.score_mut(target) {
            *score = vote_score;
        }

        Ok(VoteOutcome {
            vote_score,
            user_vote: requested,
        })
    }

    async fn get_user_vote(&self, voter_id: Uuid, target: VoteTarget) -> Result<VoteValue> {
        self.state.read().await.current_vote(voter_id, target)
    }

    async fn get_user_votes(
        &self,
        voter_id: Uuid,
        kind: TargetKind,
        target_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, VoteValue>> {
        let state = self.state.read().await;
        let mut votes = HashMap::new();
        for &id in target_ids {
            let value = state.current_vote(voter_id, VoteTarget { kind, id })?;
            if value != VoteValue::Neutral {
                votes.insert(id, value);
            }
        }
        Ok(votes)
    }

    async fn get_vote_counts(&self, target: VoteTarget) -> Result<VoteCounts> {
        let state = self.state.read().await;
        let mut counts = VoteCounts::default();
        for ((_, voted_target), vote) in state.votes.iter() {
            if *voted_target != target {
                continue;
            }
            match vote.vote_type {
                1 => counts.upvotes += 1,
                -1 => counts.downvotes += 1,
                _ => {}
            }
            counts.score += i64::from(vote.vote_type);
        }
        Ok(counts)
    }
}
