use async_trait::async_trait;
use sqlx::QueryBuilder;
use time::OffsetDateTime;

use crate::application::pagination::{CursorQuery, FeedPage};
use crate::application::repos::{FriendshipsRepo, RepoError};
use crate::domain::entities::FriendshipRecord;
use crate::domain::types::UserId;

use super::{map_sqlx_error, page_size, PostgresRepositories};

const FRIENDSHIP_COLUMNS: &str = "from_user_id, to_user_id, created_at";

impl PostgresRepositories {
    /// Shared cursor paging for both directions of the friendship table.
    async fn page_friendships(
        &self,
        direction_column: &str,
        user_id: UserId,
        query: &CursorQuery,
    ) -> Result<FeedPage<FriendshipRecord>, RepoError> {
        let size = page_size(query);

        if let Some(cursor) = query.created_at_gt {
            let items = sqlx::query_as::<_, FriendshipRecord>(&format!(
                "SELECT {FRIENDSHIP_COLUMNS} FROM friendships \
                 WHERE {direction_column} = $1 AND created_at > $2 \
                 ORDER BY created_at DESC"
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
            "SELECT {FRIENDSHIP_COLUMNS} FROM friendships WHERE {direction_column} = "
        ));
        qb.push_bind(user_id);
        if let Some(cursor) = query.created_at_lt {
            qb.push(" AND created_at < ");
            qb.push_bind(cursor);
        }
        qb.push(" ORDER BY created_at DESC LIMIT ");
        qb.push_bind((size + 1) as i64);

        let mut items: Vec<FriendshipRecord> = qb
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
}

#[async_trait]
impl FriendshipsRepo for PostgresRepositories {
    async fn follow(
        &self,
        from: UserId,
        to: UserId,
        created_at: OffsetDateTime,
    ) -> Result<FriendshipRecord, RepoError> {
        let inserted = sqlx::query_as::<_, FriendshipRecord>(
            "INSERT INTO friendships (from_user_id, to_user_id, created_at) \
             VALUES ($1, $2, $3) \
             ON CONFLICT (from_user_id, to_user_id) DO NOTHING \
             RETURNING from_user_id, to_user_id, created_at",
        )
        .bind(from)
        .bind(to)
        .bind(created_at)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        if let Some(record) = inserted {
            return Ok(record);
        }

        // Already following; hand back the existing record.
        sqlx::query_as::<_, FriendshipRecord>(&format!(
            "SELECT {FRIENDSHIP_COLUMNS} FROM friendships \
             WHERE from_user_id = $1 AND to_user_id = $2"
        ))
        .bind(from)
        .bind(to)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)
    }

    async fn unfollow(&self, from: UserId, to: UserId) -> Result<bool, RepoError> {
        let result = sqlx::query(
            "DELETE FROM friendships WHERE from_user_id = $1 AND to_user_id = $2",
        )
        .bind(from)
        .bind(to)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn has_followed(&self, from: UserId, to: UserId) -> Result<bool, RepoError> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS( \
                 SELECT 1 FROM friendships \
                 WHERE from_user_id = $1 AND to_user_id = $2 \
             )",
        )
        .bind(from)
        .bind(to)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)
    }

    async fn follower_ids(&self, user_id: UserId) -> Result<Vec<UserId>, RepoError> {
        sqlx::query_scalar::<_, UserId>(
            "SELECT from_user_id FROM friendships WHERE to_user_id = $1",
        )
        .bind(user_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)
    }

    async fn followings(
        &self,
        user_id: UserId,
        limit: usize,
    ) -> Result<Vec<FriendshipRecord>, RepoError> {
        sqlx::query_as::<_, FriendshipRecord>(&format!(
            "SELECT {FRIENDSHIP_COLUMNS} FROM friendships \
             WHERE from_user_id = $1 \
             ORDER BY created_at DESC \
             LIMIT $2"
        ))
        .bind(user_id)
        .bind(limit as i64)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)
    }

    async fn page_followers(
        &self,
        user_id: UserId,
        query: &CursorQuery,
    ) -> Result<FeedPage<FriendshipRecord>, RepoError> {
        self.page_friendships("to_user_id", user_id, query).await
    }

    async fn page_followings(
        &self,
        user_id: UserId,
        query: &CursorQuery,
    ) -> Result<FeedPage<FriendshipRecord>, RepoError> {
        self.page_friendships("from_user_id", user_id, query).await
    }
}
