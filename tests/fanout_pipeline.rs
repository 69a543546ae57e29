//! End-to-end fanout over the in-memory sorted-row backend: publish a
//! tweet, run the main job and its batch jobs by hand, then read the
//! resulting feeds back through the service layer.

use std::sync::{Arc, Mutex};

use apalis::prelude::Data;
use async_trait::async_trait;
use plover::application::feeds::NewsFeedService;
use plover::application::jobs::{
    process_fanout_batch_job, process_fanout_job, FanoutBatchJobPayload, FanoutJobPayload,
    JobWorkerContext,
};
use plover::application::pagination::{CursorQuery, FeedPage, FeedPager};
use plover::application::repos::{
    FriendshipsRepo, JobsRepo, NewsFeedsRepo, RepoError, TweetsRepo,
};
use plover::cache::{BoundedListCache, CacheConfig, ListCacheClient, MemoryCacheClient};
use plover::domain::entities::{NewsFeedEntry, TweetRecord};
use plover::domain::types::{TweetId, UserId};
use plover::infra::rows::RowRepositories;
use plover::rowstore::MemoryStore;
use time::{Duration, OffsetDateTime};

/// Records every batch payload instead of pushing it to a queue, so the
/// test can replay them through the batch handler itself.
#[derive(Default)]
struct CapturingJobsRepo {
    batches: Mutex<Vec<FanoutBatchJobPayload>>,
}

impl CapturingJobsRepo {
    fn take_batches(&self) -> Vec<FanoutBatchJobPayload> {
        std::mem::take(&mut *self.batches.lock().unwrap())
    }
}

#[async_trait]
impl JobsRepo for CapturingJobsRepo {
    async fn enqueue_fanout(&self, _: FanoutJobPayload) -> Result<String, RepoError> {
        Ok("captured".to_string())
    }

    async fn enqueue_fanout_batch(
        &self,
        payload: FanoutBatchJobPayload,
    ) -> Result<String, RepoError> {
        let mut batches = self.batches.lock().unwrap();
        batches.push(payload);
        Ok(format!("captured-{}", batches.len()))
    }
}

/// The fanout path never touches tweets; the context just needs a value.
struct UnusedTweetsRepo;

#[async_trait]
impl TweetsRepo for UnusedTweetsRepo {
    async fn insert(
        &self,
        _: UserId,
        _: &str,
        _: OffsetDateTime,
    ) -> Result<TweetRecord, RepoError> {
        Err(RepoError::invalid_input("tweets repo unused in this test"))
    }

    async fn find(&self, _: TweetId) -> Result<Option<TweetRecord>, RepoError> {
        Ok(None)
    }

    async fn list_for_user(&self, _: UserId, _: usize) -> Result<Vec<TweetRecord>, RepoError> {
        Ok(Vec::new())
    }

    async fn page_for_user(
        &self,
        _: UserId,
        _: &CursorQuery,
    ) -> Result<FeedPage<TweetRecord>, RepoError> {
        Ok(FeedPage {
            items: Vec::new(),
            has_next_page: false,
        })
    }

    async fn comments_count(&self, _: TweetId) -> Result<i64, RepoError> {
        Err(RepoError::NotFound)
    }

    async fn likes_count(&self, _: TweetId) -> Result<i64, RepoError> {
        Err(RepoError::NotFound)
    }

    async fn adjust_comments_count(&self, _: TweetId, _: i64) -> Result<i64, RepoError> {
        Err(RepoError::NotFound)
    }

    async fn adjust_likes_count(&self, _: TweetId, _: i64) -> Result<i64, RepoError> {
        Err(RepoError::NotFound)
    }
}

fn ts(seconds: i64) -> OffsetDateTime {
    OffsetDateTime::UNIX_EPOCH + Duration::seconds(seconds)
}

struct Pipeline {
    rows: Arc<RowRepositories>,
    jobs: Arc<CapturingJobsRepo>,
    cache_client: Arc<dyn ListCacheClient>,
    cache_config: CacheConfig,
    context: JobWorkerContext,
}

fn pipeline(list_limit: usize, fanout_batch_size: usize) -> Pipeline {
    let rows = Arc::new(RowRepositories::with_pager(
        Arc::new(MemoryStore::new()),
        FeedPager::new(20),
    ));
    let jobs = Arc::new(CapturingJobsRepo::default());
    let cache_client: Arc<dyn ListCacheClient> = Arc::new(MemoryCacheClient::new());
    let cache_config = CacheConfig {
        list_limit,
        ttl_seconds: 600,
    };
    let feed_cache = BoundedListCache::new(Arc::clone(&cache_client), &cache_config);

    let context = JobWorkerContext {
        tweets: Arc::new(UnusedTweetsRepo),
        friendships: rows.clone(),
        newsfeeds: rows.clone(),
        jobs: jobs.clone(),
        feed_cache,
        fanout_batch_size,
    };

    Pipeline {
        rows,
        jobs,
        cache_client,
        cache_config,
        context,
    }
}

async fn fan_out(pipeline: &Pipeline, tweet_id: TweetId, author_id: UserId, created_at: OffsetDateTime) {
    let payload = FanoutJobPayload {
        tweet_id,
        author_id,
        created_at,
    };
    process_fanout_job(payload, Data::new(pipeline.context.clone()))
        .await
        .expect("main fanout job");
    for batch in pipeline.jobs.take_batches() {
        process_fanout_batch_job(batch, Data::new(pipeline.context.clone()))
            .await
            .expect("batch fanout job");
    }
}

#[tokio::test]
async fn fanout_reaches_every_follower_in_batches() {
    let pipeline = pipeline(40, 3);

    // Users 2..=8 follow user 1: seven followers, batch size 3.
    for follower in 2..=8 {
        pipeline
            .rows
            .follow(follower, 1, ts(follower))
            .await
            .expect("follow");
    }

    let payload = FanoutJobPayload {
        tweet_id: 100,
        author_id: 1,
        created_at: ts(100),
    };
    process_fanout_job(payload, Data::new(pipeline.context.clone()))
        .await
        .expect("main fanout job");

    let batches = pipeline.jobs.take_batches();
    let sizes: Vec<usize> = batches.iter().map(|b| b.follower_ids.len()).collect();
    assert_eq!(sizes.iter().sum::<usize>(), 7);
    assert!(sizes.iter().all(|&len| len <= 3));

    let mut reached: Vec<UserId> = batches
        .iter()
        .flat_map(|b| b.follower_ids.iter().copied())
        .collect();
    reached.sort_unstable();
    assert_eq!(reached, (2..=8).collect::<Vec<UserId>>());

    // The author's own entry lands before any batch runs.
    let author_feed = pipeline.rows.list_for_user(1, 10).await.expect("author feed");
    assert_eq!(author_feed.len(), 1);
    assert_eq!(author_feed[0].tweet_id, 100);

    for batch in &batches {
        process_fanout_batch_job(batch.clone(), Data::new(pipeline.context.clone()))
            .await
            .expect("batch fanout job");
    }

    for follower in 2..=8 {
        let feed = pipeline
            .rows
            .list_for_user(follower, 10)
            .await
            .expect("follower feed");
        assert_eq!(feed.len(), 1, "follower {follower}");
        assert_eq!(feed[0].tweet_id, 100);
        assert_eq!(feed[0].created_at, ts(100));
    }
}

#[tokio::test]
async fn replayed_batches_do_not_duplicate_feed_entries() {
    let pipeline = pipeline(40, 10);

    pipeline.rows.follow(2, 1, ts(1)).await.expect("follow");
    let payload = FanoutJobPayload {
        tweet_id: 100,
        author_id: 1,
        created_at: ts(100),
    };
    process_fanout_job(payload, Data::new(pipeline.context.clone()))
        .await
        .expect("main fanout job");

    let batches = pipeline.jobs.take_batches();
    assert_eq!(batches.len(), 1);

    // Deliver the same batch twice, as an at-least-once queue may.
    for _ in 0..2 {
        process_fanout_batch_job(batches[0].clone(), Data::new(pipeline.context.clone()))
            .await
            .expect("batch fanout job");
    }

    let feed = pipeline.rows.list_for_user(2, 10).await.expect("feed");
    assert_eq!(feed.len(), 1);
    assert_eq!(feed[0].tweet_id, 100);

    // The replay must not double up the cached copy either.
    let service = NewsFeedService::new(
        pipeline.rows.clone(),
        pipeline.jobs.clone(),
        BoundedListCache::new(Arc::clone(&pipeline.cache_client), &pipeline.cache_config),
        FeedPager::new(20),
    );
    let page = service
        .list_for_user(2, &CursorQuery::latest())
        .await
        .expect("page");
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].tweet_id, 100);
}

#[tokio::test]
async fn feed_pages_walk_past_the_cache_window() {
    // A five-entry cache window over an eight-tweet history, read in
    // three-item pages: the first page is provable from cache, the rest
    // fall through to the sorted rows.
    let pipeline = pipeline(5, 10);
    pipeline.rows.follow(2, 1, ts(1)).await.expect("follow");

    for tweet_id in 1..=8 {
        fan_out(&pipeline, tweet_id, 1, ts(100 + tweet_id)).await;
    }

    let service = NewsFeedService::new(
        pipeline.rows.clone(),
        pipeline.jobs.clone(),
        BoundedListCache::new(Arc::clone(&pipeline.cache_client), &pipeline.cache_config),
        FeedPager::new(3),
    );

    let first = service
        .list_for_user(2, &CursorQuery::latest())
        .await
        .expect("first page");
    let ids: Vec<i64> = first.items.iter().map(|e| e.tweet_id).collect();
    assert_eq!(ids, vec![8, 7, 6]);
    assert!(first.has_next_page);

    let second = service
        .list_for_user(2, &CursorQuery::older_than(first.items[2].created_at))
        .await
        .expect("second page");
    let ids: Vec<i64> = second.items.iter().map(|e| e.tweet_id).collect();
    assert_eq!(ids, vec![5, 4, 3]);
    assert!(second.has_next_page);

    let third = service
        .list_for_user(2, &CursorQuery::older_than(second.items[2].created_at))
        .await
        .expect("third page");
    let ids: Vec<i64> = third.items.iter().map(|e| e.tweet_id).collect();
    assert_eq!(ids, vec![2, 1]);
    assert!(!third.has_next_page);

    // Entries newer than a cursor come back in full, newest first.
    let newer = service
        .list_for_user(2, &CursorQuery::newer_than(ts(103)))
        .await
        .expect("newer page");
    let ids: Vec<i64> = newer.items.iter().map(|e| e.tweet_id).collect();
    assert_eq!(ids, vec![8, 7, 6, 5, 4]);
    assert!(!newer.has_next_page);
}
