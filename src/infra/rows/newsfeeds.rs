use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::application::pagination::{CursorQuery, FeedPage};
use crate::application::repos::{NewsFeedsRepo, RepoError};
use crate::domain::entities::NewsFeedEntry;
use crate::domain::types::{from_micros, to_micros, UserId};
use crate::rowstore::{FieldValue, Record, ScanQuery};

use super::RowRepositories;

fn record_to_entry(record: &Record) -> Result<NewsFeedEntry, RepoError> {
    let read = |field: &str| {
        record
            .int(field)
            .ok_or_else(|| RepoError::from_persistence(format!("row missing `{field}`")))
    };
    let created_at = from_micros(read("created_at")?)
        .ok_or_else(|| RepoError::from_persistence("row timestamp out of range"))?;
    Ok(NewsFeedEntry {
        user_id: read("user_id")?,
        tweet_id: read("tweet_id")?,
        created_at,
    })
}

fn entry_values(entry: &NewsFeedEntry) -> BTreeMap<String, FieldValue> {
    let mut values = BTreeMap::new();
    values.insert("user_id".to_string(), FieldValue::Int(entry.user_id));
    values.insert(
        "created_at".to_string(),
        FieldValue::Int(to_micros(entry.created_at)),
    );
    values.insert("tweet_id".to_string(), FieldValue::Int(entry.tweet_id));
    values
}

#[async_trait]
impl NewsFeedsRepo for RowRepositories {
    async fn insert_batch(&self, entries: &[NewsFeedEntry]) -> Result<(), RepoError> {
        // created_at travels in the fanout payload, so a retried batch
        // rewrites the same keys with the same columns.
        for entry in entries {
            self.newsfeeds_model().create(entry_values(entry))?;
        }
        Ok(())
    }

    async fn list_for_user(
        &self,
        user_id: UserId,
        limit: usize,
    ) -> Result<Vec<NewsFeedEntry>, RepoError> {
        let scan = ScanQuery {
            prefix: Some(vec![Some(FieldValue::Int(user_id)), None]),
            limit: Some(limit),
            reverse: true,
            ..Default::default()
        };
        self.newsfeeds_model()
            .filter(&scan)?
            .iter()
            .map(record_to_entry)
            .collect()
    }

    async fn page_for_user(
        &self,
        user_id: UserId,
        query: &CursorQuery,
    ) -> Result<FeedPage<NewsFeedEntry>, RepoError> {
        let page =
            self.pager()
                .paginate_rows(self.newsfeeds_model(), &[FieldValue::Int(user_id)], query)?;
        Ok(FeedPage {
            items: page
                .items
                .iter()
                .map(record_to_entry)
                .collect::<Result<_, _>>()?,
            has_next_page: page.has_next_page,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use time::{Duration, OffsetDateTime};

    use super::*;
    use crate::rowstore::MemoryStore;

    fn ts(seconds: i64) -> OffsetDateTime {
        OffsetDateTime::UNIX_EPOCH + Duration::seconds(seconds)
    }

    fn entry(user_id: UserId, tweet_id: i64, seconds: i64) -> NewsFeedEntry {
        NewsFeedEntry {
            user_id,
            tweet_id,
            created_at: ts(seconds),
        }
    }

    #[tokio::test]
    async fn batches_are_idempotent_under_replay() {
        let repos = RowRepositories::new(Arc::new(MemoryStore::new()));
        let batch = vec![entry(1, 7, 10), entry(2, 7, 10)];

        repos.insert_batch(&batch).await.expect("first write");
        repos.insert_batch(&batch).await.expect("replay");

        let feed = repos.list_for_user(1, 10).await.expect("list");
        assert_eq!(feed.len(), 1);
        assert_eq!(feed[0].tweet_id, 7);
    }

    #[tokio::test]
    async fn feeds_are_isolated_per_user_and_newest_first() {
        let repos = RowRepositories::new(Arc::new(MemoryStore::new()));
        repos
            .insert_batch(&[
                entry(1, 100, 10),
                entry(1, 101, 20),
                entry(2, 100, 10),
            ])
            .await
            .expect("write");

        let feed = repos.list_for_user(1, 10).await.expect("list");
        let ids: Vec<i64> = feed.iter().map(|e| e.tweet_id).collect();
        assert_eq!(ids, vec![101, 100]);

        let page = repos
            .page_for_user(2, &CursorQuery::latest())
            .await
            .expect("page");
        assert_eq!(page.items.len(), 1);
        assert!(!page.has_next_page);
    }
}
