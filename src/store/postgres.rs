use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    error::{AppError, Result, conflict_on_unique},
    models::{
        Comment, CommentResponse, Community, FeedWindow, NewComment, NewPost, NewUser, Post,
        PostChanges, PostFile, PostResponse, PostSort, TargetKind, User, VoteCounts,
        VoteOutcome, VoteTarget, VoteTransition, VoteValue, reply_depth,
    },
    services::feed_ranker::{self, FeedPage},
    store::Store,
};

/// PostgreSQL adapter. Aggregate updates rely on `SELECT ... FOR UPDATE` on
/// the target row, so concurrent writers against the same post or comment
/// queue up behind each other while unrelated targets proceed in parallel.
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Tags and files for a batch of posts, two queries regardless of size.
    async fn load_extras(&self, post_ids: &[Uuid]) -> Result<HashMap<Uuid, PostExtras>> {
        let mut extras: HashMap<Uuid, PostExtras> = HashMap::new();
        if post_ids.is_empty() {
            return Ok(extras);
        }

        let tags = sqlx::query_as::<_, (Uuid, String)>(
            r#"
            SELECT pt.post_id, t.name
            FROM post_tags pt
            JOIN tags t ON pt.tag_id = t.id
            WHERE pt.post_id = ANY($1)
            ORDER BY t.name ASC
            "#,
        )
        .bind(post_ids)
        .fetch_all(&self.db)
        .await?;
        for (post_id, tag) in tags {
            extras.entry(post_id).or_default().0.push(tag);
        }

        let files = sqlx::query_as::<_, PostFile>(
            "SELECT * FROM post_files WHERE post_id = ANY($1) ORDER BY created_at ASC",
        )
        .bind(post_ids)
        .fetch_all(&self.db)
        .await?;
        for file in files {
            extras.entry(file.post_id).or_default().1.push(file);
        }

        Ok(extras)
    }
}

type PostExtras = (Vec<String>, Vec<PostFile>);

const POST_SELECT: &str = r#"
    SELECT
        p.id, p.user_id, p.community_id, p.title, p.content, p.is_encrypted,
        p.vote_score, p.comment_count, p.created_at, p.updated_at,
        u.username,
        c.name AS community_name
    FROM posts p
    JOIN users u ON p.user_id = u.id
    LEFT JOIN communities c ON p.community_id = c.id
"#;

fn post_response(row: &PgRow, tags: Vec<String>, files: Vec<PostFile>) -> PostResponse {
    PostResponse {
        id: row.get("id"),
        user_id: row.get("user_id"),
        username: row.get("username"),
        community_id: row.get("community_id"),
        community_name: row.get("community_name"),
        title: row.get("title"),
        content: row.get("content"),
        is_encrypted: row.get("is_encrypted"),
        vote_score: row.get("vote_score"),
        comment_count: row.get("comment_count"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        tags,
        files,
        user_vote: None,
    }
}

#[derive(FromRow)]
struct CommentWithAuthor {
    #[sqlx(flatten)]
    comment: Comment,
    username: String,
}

impl From<CommentWithAuthor> for CommentResponse {
    fn from(row: CommentWithAuthor) -> Self {
        CommentResponse::from_comment(row.comment, row.username)
    }
}

fn stored_vote(raw: i16) -> Result<VoteValue> {
    VoteValue::try_from(raw)
        .map_err(|_| AppError::Internal(format!("Corrupt vote value in ledger: {}", raw)))
}

#[async_trait]
impl Store for PgStore {
    async fn create_user(&self, user: NewUser) -> Result<User> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (
                id, username, passphrase_hash, recovery_key_hash, device_fingerprint,
                role, karma, is_banned, created_at
            )
            VALUES ($1, $2, $3, $4, $5, 'user', 0, false, $6)
            RETURNING *
            "#,
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.passphrase_hash)
        .bind(&user.recovery_key_hash)
        .bind(&user.device_fingerprint)
        .bind(user.created_at)
        .fetch_one(&self.db)
        .await
        .map_err(|e| conflict_on_unique(e, "Username already taken"))
    }

    async fn get_user(&self, user_id: Uuid) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.db)
            .await?;

        Ok(user)
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(&self.db)
            .await?;

        Ok(user)
    }

    async fn record_login(&self, user_id: Uuid) -> Result<()> {
        sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = $1")
            .bind(user_id)
            .execute(&self.db)
            .await?;

        Ok(())
    }

    async fn lift_ban(&self, user_id: Uuid) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE users
            SET is_banned = false, ban_reason = NULL, ban_expires_at = NULL
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .execute(&self.db)
        .await?;

        Ok(())
    }

    async fn create_community(&self, community: Community) -> Result<Community> {
        sqlx::query_as::<_, Community>(
            r#"
            INSERT INTO communities (id, name, description, created_by, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(community.id)
        .bind(&community.name)
        .bind(&community.description)
        .bind(community.created_by)
        .bind(community.created_at)
        .fetch_one(&self.db)
        .await
        .map_err(|e| conflict_on_unique(e, "Community name already taken"))
    }

    async fn list_communities(&self) -> Result<Vec<Community>> {
        let communities =
            sqlx::query_as::<_, Community>("SELECT * FROM communities ORDER BY name ASC")
                .fetch_all(&self.db)
                .await?;

        Ok(communities)
    }

    async fn community_exists(&self, community_id: Uuid) -> Result<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM communities WHERE id = $1)",
        )
        .bind(community_id)
        .fetch_one(&self.db)
        .await?;

        Ok(exists)
    }

    async fn create_post(&self, post: NewPost) -> Result<Post> {
        let mut tx = self.db.begin().await?;

        let created = sqlx::query_as::<_, Post>(
            r#"
            INSERT INTO posts (
                id, user_id, community_id, title, content, is_encrypted,
                vote_score, comment_count, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, 0, 0, $7, $7)
            RETURNING *
            "#,
        )
        .bind(post.id)
        .bind(post.user_id)
        .bind(post.community_id)
        .bind(&post.title)
        .bind(&post.content)
        .bind(post.is_encrypted)
        .bind(post.created_at)
        .fetch_one(&mut *tx)
        .await?;

        for tag in &post.tags {
            let tag_id = sqlx::query_scalar::<_, Uuid>(
                r#"
                INSERT INTO tags (id, name)
                VALUES ($1, $2)
                ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
                RETURNING id
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(tag)
            .fetch_one(&mut *tx)
            .await?;

            sqlx::query(
                "INSERT INTO post_tags (post_id, tag_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            )
            .bind(created.id)
            .bind(tag_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(created)
    }

    async fn get_post_raw(&self, post_id: Uuid) -> Result<Option<Post>> {
        let post = sqlx::query_as::<_, Post>("SELECT * FROM posts WHERE id = $1")
            .bind(post_id)
            .fetch_optional(&self.db)
            .await?;

        Ok(post)
    }

    async fn get_post(&self, post_id: Uuid) -> Result<Option<PostResponse>> {
        let sql = format!("{} WHERE p.id = $1", POST_SELECT);
        let row = sqlx::query(&sql)
            .bind(post_id)
            .fetch_optional(&self.db)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let mut extras = self.load_extras(&[post_id]).await?;
        let (tags, files) = extras.remove(&post_id).unwrap_or_default();

        Ok(Some(post_response(&row, tags, files)))
    }

    async fn update_post(&self, post_id: Uuid, changes: PostChanges) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE posts
            SET title = COALESCE($1, title),
                content = COALESCE($2, content),
                updated_at = NOW()
            WHERE id = $3
            "#,
        )
        .bind(changes.title)
        .bind(changes.content)
        .bind(post_id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Post not found".to_string()));
        }

        Ok(())
    }

    async fn delete_post(&self, post_id: Uuid) -> Result<()> {
        // Comments, votes, tag links and files go with it via ON DELETE CASCADE.
        let result = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(post_id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Post not found".to_string()));
        }

        Ok(())
    }

    async fn list_feed(
        &self,
        window: FeedWindow,
        now: DateTime<Utc>,
    ) -> Result<FeedPage<PostResponse>> {
        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM posts WHERE ($1::uuid IS NULL OR community_id = $1)",
        )
        .bind(window.community_id)
        .fetch_one(&self.db)
        .await? as usize;

        let order_by = match window.sort {
            PostSort::Recent => "p.created_at DESC",
            PostSort::Top => "p.vote_score DESC, p.created_at DESC",
            // vote_score / (age_hours + offset)^gravity, age clamped at zero
            PostSort::Trending => {
                "p.vote_score / POWER(GREATEST(EXTRACT(EPOCH FROM ($4 - p.created_at))::float8 / 3600.0, 0) + $5, $6) DESC, p.created_at DESC"
            }
        };
        let sql = format!(
            "{} WHERE ($1::uuid IS NULL OR p.community_id = $1) ORDER BY {} LIMIT $2 OFFSET $3",
            POST_SELECT, order_by
        );

        let mut query = sqlx::query(&sql)
            .bind(window.community_id)
            .bind(window.page_size as i64)
            .bind(window.offset() as i64);
        if window.sort == PostSort::Trending {
            query = query
                .bind(now)
                .bind(feed_ranker::TRENDING_HOUR_OFFSET)
                .bind(feed_ranker::TRENDING_GRAVITY);
        }
        let rows = query.fetch_all(&self.db).await?;

        let ids: Vec<Uuid> = rows.iter().map(|row| row.get("id")).collect();
        let mut extras = self.load_extras(&ids).await?;
        let items: Vec<PostResponse> = rows
            .iter()
            .map(|row| {
                let id: Uuid = row.get("id");
                let (tags, files) = extras.remove(&id).unwrap_or_default();
                post_response(row, tags, files)
            })
            .collect();

        let has_more = window.offset() + items.len() < total;

        Ok(FeedPage {
            items,
            total,
            has_more,
        })
    }

    async fn attach_file(&self, file: PostFile) -> Result<PostFile> {
        let file = sqlx::query_as::<_, PostFile>(
            r#"
            INSERT INTO post_files (id, post_id, file_url, file_name, file_type, file_size, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(file.id)
        .bind(file.post_id)
        .bind(&file.file_url)
        .bind(&file.file_name)
        .bind(&file.file_type)
        .bind(file.file_size)
        .bind(file.created_at)
        .fetch_one(&self.db)
        .await?;

        Ok(file)
    }

    async fn create_comment(&self, comment: NewComment) -> Result<Comment> {
        let mut tx = self.db.begin().await?;

        // Post row lock serializes comment_count increments.
        let post = sqlx::query_scalar::<_, Uuid>("SELECT id FROM posts WHERE id = $1 FOR UPDATE")
            .bind(comment.post_id)
            .fetch_optional(&mut *tx)
            .await?;

        if post.is_none() {
            return Err(AppError::NotFound("Post not found".to_string()));
        }

        let depth = match comment.parent_id {
            Some(parent_id) => {
                let parent_depth = sqlx::query_scalar::<_, i32>(
                    "SELECT depth FROM comments WHERE id = $1 AND post_id = $2 FOR SHARE",
                )
                .bind(parent_id)
                .bind(comment.post_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| AppError::NotFound("Parent comment not found".to_string()))?;

                reply_depth(parent_depth)?
            }
            None => 0,
        };

        let created = sqlx::query_as::<_, Comment>(
            r#"
            INSERT INTO comments (
                id, post_id, user_id, parent_id, content, depth,
                vote_score, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, 0, $7, $7)
            RETURNING *
            "#,
        )
        .bind(comment.id)
        .bind(comment.post_id)
        .bind(comment.user_id)
        .bind(comment.parent_id)
        .bind(&comment.content)
        .bind(depth)
        .bind(comment.created_at)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("UPDATE posts SET comment_count = comment_count + 1 WHERE id = $1")
            .bind(comment.post_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(created)
    }

    async fn get_comment_raw(&self, comment_id: Uuid) -> Result<Option<Comment>> {
        let comment = sqlx::query_as::<_, Comment>("SELECT * FROM comments WHERE id = $1")
            .bind(comment_id)
            .fetch_optional(&self.db)
            .await?;

        Ok(comment)
    }

    async fn get_comment(&self, comment_id: Uuid) -> Result<Option<CommentResponse>> {
        let row = sqlx::query_as::<_, CommentWithAuthor>(
            r#"
            SELECT c.*, u.username
            FROM comments c
            JOIN users u ON c.user_id = u.id
            WHERE c.id = $1
            "#,
        )
        .bind(comment_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(row.map(CommentResponse::from))
    }

    async fn list_post_comments(&self, post_id: Uuid) -> Result<Vec<CommentResponse>> {
        let rows = sqlx::query_as::<_, CommentWithAuthor>(
            r#"
            SELECT c.*, u.username
            FROM comments c
            JOIN users u ON c.user_id = u.id
            WHERE c.post_id = $1
            "#,
        )
        .bind(post_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(CommentResponse::from).collect())
    }

    async fn delete_comment(&self, comment_id: Uuid) -> Result<u64> {
        let mut tx = self.db.begin().await?;

        let post_id = sqlx::query_scalar::<_, Uuid>("SELECT post_id FROM comments WHERE id = $1")
            .bind(comment_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound("Comment not found".to_string()))?;

        // Same lock order as create_comment: post row first.
        sqlx::query("SELECT id FROM posts WHERE id = $1 FOR UPDATE")
            .bind(post_id)
            .execute(&mut *tx)
            .await?;

        let removed = sqlx::query(
            r#"
            WITH RECURSIVE subtree AS (
                SELECT id FROM comments WHERE id = $1
                UNION ALL
                SELECT c.id FROM comments c JOIN subtree s ON c.parent_id = s.id
            )
            DELETE FROM comments WHERE id IN (SELECT id FROM subtree)
            "#,
        )
        .bind(comment_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if removed == 0 {
            return Err(AppError::NotFound("Comment not found".to_string()));
        }

        sqlx::query("UPDATE posts SET comment_count = comment_count - $1 WHERE id = $2")
            .bind(removed as i32)
            .bind(post_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::debug!(%comment_id, %post_id, removed, "comment subtree deleted");

        Ok(removed)
    }

    async fn apply_vote(
        &self,
        voter_id: Uuid,
        target: VoteTarget,
        requested: VoteValue,
    ) -> Result<VoteOutcome> {
        let table = target.kind.table();
        let column = target.kind.ledger_column();

        let mut tx = self.db.begin().await?;

        let lock_sql = format!("SELECT vote_score FROM {} WHERE id = $1 FOR UPDATE", table);
        let current_score = sqlx::query_scalar::<_, i32>(&lock_sql)
            .bind(target.id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("{} not found", target.kind)))?;

        let existing_sql = format!(
            "SELECT vote_type FROM votes WHERE user_id = $1 AND {} = $2",
            column
        );
        let current = match sqlx::query_scalar::<_, i16>(&existing_sql)
            .bind(voter_id)
            .bind(target.id)
            .fetch_optional(&mut *tx)
            .await?
        {
            Some(raw) => stored_vote(raw)?,
            None => VoteValue::Neutral,
        };

        let transition = VoteTransition::plan(current, requested);
        match transition {
            VoteTransition::Unchanged => {}
            VoteTransition::Cast(value) => {
                let sql = format!(
                    r#"
                    INSERT INTO votes (id, user_id, {}, vote_type, created_at, updated_at)
                    VALUES ($1, $2, $3, $4, NOW(), NOW())
                    "#,
                    column
                );
                sqlx::query(&sql)
                    .bind(Uuid::new_v4())
                    .bind(voter_id)
                    .bind(target.id)
                    .bind(value.as_i16())
                    .execute(&mut *tx)
                    .await?;
            }
            VoteTransition::Change { to, .. } => {
                let sql = format!(
                    "UPDATE votes SET vote_type = $1, updated_at = NOW() WHERE user_id = $2 AND {} = $3",
                    column
                );
                sqlx::query(&sql)
                    .bind(to.as_i16())
                    .bind(voter_id)
                    .bind(target.id)
                    .execute(&mut *tx)
                    .await?;
            }
            VoteTransition::Retract(_) => {
                let sql = format!("DELETE FROM votes WHERE user_id = $1 AND {} = $2", column);
                sqlx::query(&sql)
                    .bind(voter_id)
                    .bind(target.id)
                    .execute(&mut *tx)
                    .await?;
            }
        }

        let score_change = transition.score_change();
        let vote_score = if score_change != 0 {
            let sql = format!(
                "UPDATE {} SET vote_score = vote_score + $1 WHERE id = $2 RETURNING vote_score",
                table
            );
            sqlx::query_scalar::<_, i32>(&sql)
                .bind(score_change)
                .bind(target.id)
                .fetch_one(&mut *tx)
                .await?
        } else {
            current_score
        };

        tx.commit().await?;

        Ok(VoteOutcome {
            vote_score,
            user_vote: requested,
        })
    }

    async fn get_user_vote(&self, voter_id: Uuid, target: VoteTarget) -> Result<VoteValue> {
        let sql = format!(
            "SELECT vote_type FROM votes WHERE user_id = $1 AND {} = $2",
            target.kind.ledger_column()
        );
        let raw = sqlx::query_scalar::<_, i16>(&sql)
            .bind(voter_id)
            .bind(target.id)
            .fetch_optional(&self.db)
            .await?;

        match raw {
            Some(raw) => stored_vote(raw),
            None => Ok(VoteValue::Neutral),
        }
    }

    async fn get_user_votes(
        &self,
        voter_id: Uuid,
        kind: TargetKind,
        target_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, VoteValue>> {
        if target_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let column = kind.ledger_column();
        let sql = format!(
            "SELECT {}, vote_type FROM votes WHERE user_id = $1 AND {} = ANY($2)",
            column, column
        );
        let rows = sqlx::query_as::<_, (Uuid, i16)>(&sql)
            .bind(voter_id)
            .bind(target_ids)
            .fetch_all(&self.db)
            .await?;

        rows.into_iter()
            .map(|(target_id, raw)| Ok((target_id, stored_vote(raw)?)))
            .collect()
    }

    async fn get_vote_counts(&self, target: VoteTarget) -> Result<VoteCounts> {
        let sql = format!(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE vote_type = 1) AS upvotes,
                COUNT(*) FILTER (WHERE vote_type = -1) AS downvotes,
                COALESCE(SUM(vote_type), 0)::BIGINT AS score
            FROM votes
            WHERE {} = $1
            "#,
            target.kind.ledger_column()
        );
        let counts = sqlx::query_as::<_, VoteCounts>(&sql)
            .bind(target.id)
            .fetch_one(&self.db)
            .await?;

        Ok(counts)
    }
}
