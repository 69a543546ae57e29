//! Per-user newsfeed reads.

use std::sync::Arc;

use crate::application::error::AppError;
use crate::application::jobs::enqueue_fanout_job;
use crate::application::pagination::{CursorQuery, FeedPage, FeedPager};
use crate::application::repos::{JobsRepo, NewsFeedsRepo};
use crate::cache::{keys, BoundedListCache};
use crate::domain::entities::{NewsFeedEntry, TweetRecord};
use crate::domain::types::UserId;

pub struct NewsFeedService {
    newsfeeds: Arc<dyn NewsFeedsRepo>,
    jobs: Arc<dyn JobsRepo>,
    feed_cache: BoundedListCache,
    pager: FeedPager,
}

impl NewsFeedService {
    pub fn new(
        newsfeeds: Arc<dyn NewsFeedsRepo>,
        jobs: Arc<dyn JobsRepo>,
        feed_cache: BoundedListCache,
        pager: FeedPager,
    ) -> Self {
        Self {
            newsfeeds,
            jobs,
            feed_cache,
            pager,
        }
    }

    /// Kick off fanout for a published tweet.
    pub async fn fanout_to_followers(&self, tweet: &TweetRecord) -> Result<String, AppError> {
        Ok(enqueue_fanout_job(self.jobs.as_ref(), tweet).await?)
    }

    /// A page of the user's feed. The bounded cache answers when it can
    /// prove the page complete; otherwise the authoritative source does.
    pub async fn list_for_user(
        &self,
        user_id: UserId,
        query: &CursorQuery,
    ) -> Result<FeedPage<NewsFeedEntry>, AppError> {
        let key = keys::user_newsfeeds(user_id);
        let newsfeeds = Arc::clone(&self.newsfeeds);
        let cached: Vec<NewsFeedEntry> = self
            .feed_cache
            .load(&key, |limit| async move {
                newsfeeds.list_for_user(user_id, limit).await
            })
            .await?;

        match self
            .pager
            .paginate_cached(&cached, query, self.feed_cache.limit())
        {
            Some(page) => Ok(page),
            None => Ok(self
                .newsfeeds
                .page_for_user(user_id, &self.pager.normalize(query))
                .await?),
        }
    }

    /// Push one freshly fanned-out entry into the subscriber's cached feed.
    pub async fn push_entry(&self, entry: &NewsFeedEntry) -> Result<(), AppError> {
        let key = keys::user_newsfeeds(entry.user_id);
        let user_id = entry.user_id;
        let newsfeeds = Arc::clone(&self.newsfeeds);
        self.feed_cache
            .push(&key, entry, |limit| async move {
                newsfeeds.list_for_user(user_id, limit).await
            })
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use time::{Duration, OffsetDateTime};

    use super::*;
    use crate::application::jobs::{FanoutBatchJobPayload, FanoutJobPayload};
    use crate::application::repos::RepoError;
    use crate::cache::{CacheConfig, MemoryCacheClient};

    struct FakeNewsFeedsRepo {
        entries: Mutex<Vec<NewsFeedEntry>>,
        page_calls: AtomicUsize,
    }

    impl FakeNewsFeedsRepo {
        fn with_entries(entries: Vec<NewsFeedEntry>) -> Self {
            Self {
                entries: Mutex::new(entries),
                page_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl NewsFeedsRepo for FakeNewsFeedsRepo {
        async fn insert_batch(&self, entries: &[NewsFeedEntry]) -> Result<(), RepoError> {
            let mut stored = self.entries.lock().unwrap();
            for entry in entries {
                if !stored.iter().any(|e| {
                    e.user_id == entry.user_id && e.tweet_id == entry.tweet_id
                }) {
                    stored.push(entry.clone());
                }
            }
            stored.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(())
        }

        async fn list_for_user(
            &self,
            user_id: UserId,
            limit: usize,
        ) -> Result<Vec<NewsFeedEntry>, RepoError> {
            let stored = self.entries.lock().unwrap();
            Ok(stored
                .iter()
                .filter(|e| e.user_id == user_id)
                .take(limit)
                .cloned()
                .collect())
        }

        async fn page_for_user(
            &self,
            user_id: UserId,
            query: &CursorQuery,
        ) -> Result<FeedPage<NewsFeedEntry>, RepoError> {
            self.page_calls.fetch_add(1, Ordering::SeqCst);
            let stored = self.entries.lock().unwrap();
            let all: Vec<NewsFeedEntry> = stored
                .iter()
                .filter(|e| e.user_id == user_id)
                .cloned()
                .collect();
            Ok(FeedPager::new(20).paginate_ordered(&all, query))
        }
    }

    struct NoopJobsRepo;

    #[async_trait]
    impl JobsRepo for NoopJobsRepo {
        async fn enqueue_fanout(&self, _: FanoutJobPayload) -> Result<String, RepoError> {
            Ok("noop".to_string())
        }

        async fn enqueue_fanout_batch(
            &self,
            _: FanoutBatchJobPayload,
        ) -> Result<String, RepoError> {
            Ok("noop".to_string())
        }
    }

    fn ts(seconds: i64) -> OffsetDateTime {
        OffsetDateTime::UNIX_EPOCH + Duration::seconds(seconds)
    }

    fn entries(newest: i64, count: i64) -> Vec<NewsFeedEntry> {
        (0..count)
            .map(|i| NewsFeedEntry {
                user_id: 1,
                tweet_id: newest - i,
                created_at: ts(newest - i),
            })
            .collect()
    }

    fn service(repo: Arc<FakeNewsFeedsRepo>, list_limit: usize) -> NewsFeedService {
        let config = CacheConfig {
            list_limit,
            ttl_seconds: 600,
        };
        let cache = BoundedListCache::new(Arc::new(MemoryCacheClient::new()), &config);
        NewsFeedService::new(repo, Arc::new(NoopJobsRepo), cache, FeedPager::new(20))
    }

    #[tokio::test]
    async fn pages_beyond_the_cache_window_come_from_the_source() {
        // 45 feed rows, a 40-entry cache window, 20-item pages: the last
        // five rows are reachable only through the authoritative source.
        let repo = Arc::new(FakeNewsFeedsRepo::with_entries(entries(45, 45)));
        let service = service(Arc::clone(&repo), 40);

        let first = service
            .list_for_user(1, &CursorQuery::latest())
            .await
            .expect("page");
        assert_eq!(first.items.len(), 20);
        assert_eq!(first.items[0].tweet_id, 45);
        assert!(first.has_next_page);
        assert_eq!(repo.page_calls.load(Ordering::SeqCst), 0);

        let second = service
            .list_for_user(1, &CursorQuery::older_than(ts(26)))
            .await
            .expect("page");
        assert_eq!(second.items.len(), 20);
        assert_eq!(second.items[0].tweet_id, 25);
        assert!(second.has_next_page);
        assert_eq!(repo.page_calls.load(Ordering::SeqCst), 1);

        let third = service
            .list_for_user(1, &CursorQuery::older_than(ts(6)))
            .await
            .expect("page");
        let ids: Vec<i64> = third.items.iter().map(|e| e.tweet_id).collect();
        assert_eq!(ids, vec![5, 4, 3, 2, 1]);
        assert!(!third.has_next_page);
        assert_eq!(repo.page_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn short_histories_never_touch_the_source_pager() {
        let repo = Arc::new(FakeNewsFeedsRepo::with_entries(entries(10, 10)));
        let service = service(Arc::clone(&repo), 40);

        let page = service
            .list_for_user(1, &CursorQuery::latest())
            .await
            .expect("page");
        assert_eq!(page.items.len(), 10);
        assert!(!page.has_next_page);

        let older = service
            .list_for_user(1, &CursorQuery::older_than(ts(1)))
            .await
            .expect("page");
        assert!(older.items.is_empty());
        assert_eq!(repo.page_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn pushed_entries_appear_on_the_next_read() {
        let repo = Arc::new(FakeNewsFeedsRepo::with_entries(entries(5, 5)));
        let service = service(Arc::clone(&repo), 40);

        // Warm the cache, then fan a new entry in.
        service
            .list_for_user(1, &CursorQuery::latest())
            .await
            .expect("warm");
        let entry = NewsFeedEntry {
            user_id: 1,
            tweet_id: 6,
            created_at: ts(6),
        };
        repo.insert_batch(std::slice::from_ref(&entry))
            .await
            .expect("insert");
        service.push_entry(&entry).await.expect("push");

        let page = service
            .list_for_user(1, &CursorQuery::latest())
            .await
            .expect("page");
        assert_eq!(page.items[0].tweet_id, 6);
    }
}
