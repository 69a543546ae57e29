use async_trait::async_trait;
use sqlx::QueryBuilder;

use crate::application::pagination::{CursorQuery, FeedPage};
use crate::application::repos::{NewsFeedsRepo, RepoError};
use crate::domain::entities::NewsFeedEntry;
use crate::domain::types::UserId;

use super::{map_sqlx_error, page_size, PostgresRepositories};

const FEED_COLUMNS: &str = "user_id, tweet_id, created_at";

#[async_trait]
impl NewsFeedsRepo for PostgresRepositories {
    async fn insert_batch(&self, entries: &[NewsFeedEntry]) -> Result<(), RepoError> {
        if entries.is_empty() {
            return Ok(());
        }

        // Retried fanout batches replay the same (user, tweet) pairs; the
        // conflict clause makes the replay a no-op.
        let mut qb =
            QueryBuilder::new("INSERT INTO newsfeeds (user_id, tweet_id, created_at) ");
        qb.push_values(entries, |mut row, entry| {
            row.push_bind(entry.user_id)
                .push_bind(entry.tweet_id)
                .push_bind(entry.created_at);
        });
        qb.push(" ON CONFLICT (user_id, tweet_id) DO NOTHING");

        qb.build()
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn list_for_user(
        &self,
        user_id: UserId,
        limit: usize,
    ) -> Result<Vec<NewsFeedEntry>, RepoError> {
        sqlx::query_as::<_, NewsFeedEntry>(&format!(
            "SELECT {FEED_COLUMNS} FROM newsfeeds \
             WHERE user_id = $1 \
             ORDER BY created_at DESC, tweet_id DESC \
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
    ) -> Result<FeedPage<NewsFeedEntry>, RepoError> {
        let size = page_size(query);

        if let Some(cursor) = query.created_at_gt {
            let items = sqlx::query_as::<_, NewsFeedEntry>(&format!(
                "SELECT {FEED_COLUMNS} FROM newsfeeds \
                 WHERE user_id = $1 AND created_at > $2 \
                 ORDER BY created_at DESC, tweet_id DESC"
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
            "SELECT {FEED_COLUMNS} FROM newsfeeds WHERE user_id = "
        ));
        qb.push_bind(user_id);
        if let Some(cursor) = query.created_at_lt {
            qb.push(" AND created_at < ");
            qb.push_bind(cursor);
        }
        qb.push(" ORDER BY created_at DESC, tweet_id DESC LIMIT ");
        qb.push_bind((size + 1) as i64);

        let mut items: Vec<NewsFeedEntry> = qb
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
