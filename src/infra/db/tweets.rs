use async_trait::async_trait;
use sqlx::QueryBuilder;
use time::OffsetDateTime;

use crate::application::pagination::{CursorQuery, FeedPage};
use crate::application::repos::{RepoError, TweetsRepo};
use crate::domain::entities::TweetRecord;
use crate::domain::types::{TweetId, UserId};

use super::{map_sqlx_error, page_size, PostgresRepositories};

const TWEET_COLUMNS: &str = "id, user_id, content, created_at";

#[async_trait]
impl TweetsRepo for PostgresRepositories {
    async fn insert(
        &self,
        user_id: UserId,
        content: &str,
        created_at: OffsetDateTime,
    ) -> Result<TweetRecord, RepoError> {
        sqlx::query_as::<_, TweetRecord>(
            "INSERT INTO tweets (user_id, content, created_at) \
             VALUES ($1, $2, $3) \
             RETURNING id, user_id, content, created_at",
        )
        .bind(user_id)
        .bind(content)
        .bind(created_at)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)
    }

    async fn find(&self, tweet_id: TweetId) -> Result<Option<TweetRecord>, RepoError> {
        sqlx::query_as::<_, TweetRecord>(&format!(
            "SELECT {TWEET_COLUMNS} FROM tweets WHERE id = $1"
        ))
        .bind(tweet_id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)
    }

    async fn list_for_user(
        &self,
        user_id: UserId,
        limit: usize,
    ) -> Result<Vec<TweetRecord>, RepoError> {
        sqlx::query_as::<_, TweetRecord>(&format!(
            "SELECT {TWEET_COLUMNS} FROM tweets \
             WHERE user_id = $1 \
             ORDER BY created_at DESC, id DESC \
             LIMIT $2"
        ))
        .bind(user_id)
        .bind(limit as i64)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)
    }

    async fn page_for_user(
        &self,
        user_id: UserId,
        query: &CursorQuery,
    ) -> Result<FeedPage<TweetRecord>, RepoError> {
        let size = page_size(query);

        if let Some(cursor) = query.created_at_gt {
            // Refresh: everything newer, unbounded by page size.
            let items = sqlx::query_as::<_, TweetRecord>(&format!(
                "SELECT {TWEET_COLUMNS} FROM tweets \
                 WHERE user_id = $1 AND created_at > $2 \
                 ORDER BY created_at DESC, id DESC"
            ))
            .bind(user_id)
            .bind(cursor)
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;
            return Ok(FeedPage {
                items,
                has_next_page: false,
            });
        }

        let mut qb = QueryBuilder::new(format!(
            "SELECT {TWEET_COLUMNS} FROM tweets WHERE user_id = "
        ));
        qb.push_bind(user_id);
        if let Some(cursor) = query.created_at_lt {
            qb.push(" AND created_at < ");
            qb.push_bind(cursor);
        }
        qb.push(" ORDER BY created_at DESC, id DESC LIMIT ");
        qb.push_bind((size + 1) as i64);

        let mut items: Vec<TweetRecord> = qb
            .build_query_as()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        let has_next_page = items.len() > size;
        items.truncate(size);
        Ok(FeedPage {
            items,
            has_next_page,
        })
    }

    async fn comments_count(&self, tweet_id: TweetId) -> Result<i64, RepoError> {
        sqlx::query_scalar::<_, i64>("SELECT comments_count FROM tweets WHERE id = $1")
            .bind(tweet_id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?
            .ok_or(RepoError::NotFound)
    }

    async fn likes_count(&self, tweet_id: TweetId) -> Result<i64, RepoError> {
        sqlx::query_scalar::<_, i64>("SELECT likes_count FROM tweets WHERE id = $1")
            .bind(tweet_id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?
            .ok_or(RepoError::NotFound)
    }

    async fn adjust_comments_count(
        &self,
        tweet_id: TweetId,
        delta: i64,
    ) -> Result<i64, RepoError> {
        sqlx::query_scalar::<_, i64>(
            "UPDATE tweets \
             SET comments_count = GREATEST(comments_count + $2, 0) \
             WHERE id = $1 \
             RETURNING comments_count",
        )
        .bind(tweet_id)
        .bind(delta)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?
        .ok_or(RepoError::NotFound)
    }

    async fn adjust_likes_count(&self, tweet_id: TweetId, delta: i64) -> Result<i64, RepoError> {
        sqlx::query_scalar::<_, i64>(
            "UPDATE tweets \
             SET likes_count = GREATEST(likes_count + $2, 0) \
             WHERE id = $1 \
             RETURNING likes_count",
        )
        .bind(tweet_id)
        .bind(delta)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?
        .ok_or(RepoError::NotFound)
    }
}
