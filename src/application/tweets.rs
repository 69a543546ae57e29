//! Tweet publishing and per-author timelines.

use std::sync::Arc;

use time::OffsetDateTime;
use tracing::info;

use crate::application::error::AppError;
use crate::application::jobs::enqueue_fanout_job;
use crate::application::pagination::{CursorQuery, FeedPage, FeedPager};
use crate::application::repos::{JobsRepo, TweetsRepo};
use crate::cache::{keys, BoundedListCache, CounterCache};
use crate::domain::entities::{TweetRecord, MAX_TWEET_CONTENT_LEN};
use crate::domain::error::DomainError;
use crate::domain::types::{TweetId, UserId};

pub struct TweetService {
    tweets: Arc<dyn TweetsRepo>,
    jobs: Arc<dyn JobsRepo>,
    tweet_cache: BoundedListCache,
    counters: CounterCache,
    pager: FeedPager,
}

impl TweetService {
    pub fn new(
        tweets: Arc<dyn TweetsRepo>,
        jobs: Arc<dyn JobsRepo>,
        tweet_cache: BoundedListCache,
        counters: CounterCache,
        pager: FeedPager,
    ) -> Self {
        Self {
            tweets,
            jobs,
            tweet_cache,
            counters,
            pager,
        }
    }

    /// Publish a tweet. Returns once the authoritative write has landed;
    /// fanout runs in the background and is invisible to the publisher.
    pub async fn publish(
        &self,
        user_id: UserId,
        content: &str,
    ) -> Result<TweetRecord, AppError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(DomainError::validation("tweet content is empty").into());
        }
        if content.chars().count() > MAX_TWEET_CONTENT_LEN {
            return Err(DomainError::validation(format!(
                "tweet content exceeds {MAX_TWEET_CONTENT_LEN} characters"
            ))
            .into());
        }

        let tweet = self
            .tweets
            .insert(user_id, content, OffsetDateTime::now_utc())
            .await?;

        let key = keys::user_tweets(user_id);
        let tweets = Arc::clone(&self.tweets);
        self.tweet_cache
            .push(&key, &tweet, |limit| async move {
                tweets.list_for_user(user_id, limit).await
            })
            .await?;

        let task_id = enqueue_fanout_job(self.jobs.as_ref(), &tweet).await?;
        info!(
            target = "application::tweets",
            tweet_id = tweet.id,
            user_id,
            task_id,
            "tweet published, fanout enqueued"
        );
        Ok(tweet)
    }

    pub async fn find(&self, tweet_id: TweetId) -> Result<Option<TweetRecord>, AppError> {
        Ok(self.tweets.find(tweet_id).await?)
    }

    /// A page of one author's tweets, served from the bounded cache when it
    /// can prove the page complete.
    pub async fn list_for_user(
        &self,
        user_id: UserId,
        query: &CursorQuery,
    ) -> Result<FeedPage<TweetRecord>, AppError> {
        let key = keys::user_tweets(user_id);
        let tweets = Arc::clone(&self.tweets);
        let cached: Vec<TweetRecord> = self
            .tweet_cache
            .load(&key, |limit| async move {
                tweets.list_for_user(user_id, limit).await
            })
            .await?;

        match self
            .pager
            .paginate_cached(&cached, query, self.tweet_cache.limit())
        {
            Some(page) => Ok(page),
            None => Ok(self
                .tweets
                .page_for_user(user_id, &self.pager.normalize(query))
                .await?),
        }
    }

    pub async fn comments_count(&self, tweet_id: TweetId) -> Result<i64, AppError> {
        let tweets = Arc::clone(&self.tweets);
        let count = self
            .counters
            .get(&keys::tweet_comments_count(tweet_id), || async move {
                tweets.comments_count(tweet_id).await
            })
            .await?;
        Ok(count)
    }

    pub async fn likes_count(&self, tweet_id: TweetId) -> Result<i64, AppError> {
        let tweets = Arc::clone(&self.tweets);
        let count = self
            .counters
            .get(&keys::tweet_likes_count(tweet_id), || async move {
                tweets.likes_count(tweet_id).await
            })
            .await?;
        Ok(count)
    }

    /// Record a new or deleted comment: the denormalized count is adjusted
    /// first, then the cached counter mirrors it.
    pub async fn adjust_comments_count(
        &self,
        tweet_id: TweetId,
        delta: i64,
    ) -> Result<i64, AppError> {
        self.tweets.adjust_comments_count(tweet_id, delta).await?;
        let tweets = Arc::clone(&self.tweets);
        let count = self
            .counters
            .incr(&keys::tweet_comments_count(tweet_id), delta, || async move {
                tweets.comments_count(tweet_id).await
            })
            .await?;
        Ok(count)
    }

    pub async fn adjust_likes_count(
        &self,
        tweet_id: TweetId,
        delta: i64,
    ) -> Result<i64, AppError> {
        self.tweets.adjust_likes_count(tweet_id, delta).await?;
        let tweets = Arc::clone(&self.tweets);
        let count = self
            .counters
            .incr(&keys::tweet_likes_count(tweet_id), delta, || async move {
                tweets.likes_count(tweet_id).await
            })
            .await?;
        Ok(count)
    }
}
