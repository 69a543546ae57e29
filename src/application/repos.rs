//! Repository traits describing persistence adapters.
//!
//! Services depend on these traits only; `infra/db` implements them over
//! Postgres and `infra/rows` over the sorted-row store. Which family backs
//! friendships and newsfeeds is a deployment choice, not a code path.

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;

use crate::application::jobs::{FanoutBatchJobPayload, FanoutJobPayload};
use crate::application::pagination::{CursorQuery, FeedPage, PaginationError};
use crate::domain::entities::{FriendshipRecord, NewsFeedEntry, TweetRecord};
use crate::domain::types::{TweetId, UserId};
use crate::rowstore::RowStoreError;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
    #[error(transparent)]
    Pagination(#[from] PaginationError),
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }
}

impl From<RowStoreError> for RepoError {
    fn from(err: RowStoreError) -> Self {
        match err {
            RowStoreError::Store(message) => Self::Persistence(message),
            caller_error => Self::InvalidInput {
                message: caller_error.to_string(),
            },
        }
    }
}

#[async_trait]
pub trait TweetsRepo: Send + Sync {
    async fn insert(
        &self,
        user_id: UserId,
        content: &str,
        created_at: OffsetDateTime,
    ) -> Result<TweetRecord, RepoError>;

    async fn find(&self, tweet_id: TweetId) -> Result<Option<TweetRecord>, RepoError>;

    /// Newest-first window of a user's tweets, for cache reloads.
    async fn list_for_user(
        &self,
        user_id: UserId,
        limit: usize,
    ) -> Result<Vec<TweetRecord>, RepoError>;

    async fn page_for_user(
        &self,
        user_id: UserId,
        query: &CursorQuery,
    ) -> Result<FeedPage<TweetRecord>, RepoError>;

    async fn comments_count(&self, tweet_id: TweetId) -> Result<i64, RepoError>;

    async fn likes_count(&self, tweet_id: TweetId) -> Result<i64, RepoError>;

    /// Adjust a denormalized count, returning the stored value after the
    /// adjustment.
    async fn adjust_comments_count(
        &self,
        tweet_id: TweetId,
        delta: i64,
    ) -> Result<i64, RepoError>;

    async fn adjust_likes_count(&self, tweet_id: TweetId, delta: i64) -> Result<i64, RepoError>;
}

#[async_trait]
pub trait FriendshipsRepo: Send + Sync {
    /// Record that `from` follows `to`. Following twice is a no-op that
    /// returns the existing record.
    async fn follow(
        &self,
        from: UserId,
        to: UserId,
        created_at: OffsetDateTime,
    ) -> Result<FriendshipRecord, RepoError>;

    /// Returns whether a friendship was actually removed.
    async fn unfollow(&self, from: UserId, to: UserId) -> Result<bool, RepoError>;

    async fn has_followed(&self, from: UserId, to: UserId) -> Result<bool, RepoError>;

    /// Everyone following `user_id`, for fanout.
    async fn follower_ids(&self, user_id: UserId) -> Result<Vec<UserId>, RepoError>;

    /// Newest-first window of who `user_id` follows, for cache reloads.
    async fn followings(
        &self,
        user_id: UserId,
        limit: usize,
    ) -> Result<Vec<FriendshipRecord>, RepoError>;

    async fn page_followers(
        &self,
        user_id: UserId,
        query: &CursorQuery,
    ) -> Result<FeedPage<FriendshipRecord>, RepoError>;

    async fn page_followings(
        &self,
        user_id: UserId,
        query: &CursorQuery,
    ) -> Result<FeedPage<FriendshipRecord>, RepoError>;
}

#[async_trait]
pub trait NewsFeedsRepo: Send + Sync {
    /// Idempotent bulk write: one entry per subscriber, retried batches
    /// must not duplicate.
    async fn insert_batch(&self, entries: &[NewsFeedEntry]) -> Result<(), RepoError>;

    /// Newest-first window of a user's feed, for cache reloads.
    async fn list_for_user(
        &self,
        user_id: UserId,
        limit: usize,
    ) -> Result<Vec<NewsFeedEntry>, RepoError>;

    async fn page_for_user(
        &self,
        user_id: UserId,
        query: &CursorQuery,
    ) -> Result<FeedPage<NewsFeedEntry>, RepoError>;
}

#[async_trait]
pub trait JobsRepo: Send + Sync {
    /// Enqueue the main fanout job, returning the assigned task id.
    async fn enqueue_fanout(&self, payload: FanoutJobPayload) -> Result<String, RepoError>;

    /// Enqueue one batch of the fanout, returning the assigned task id.
    async fn enqueue_fanout_batch(
        &self,
        payload: FanoutBatchJobPayload,
    ) -> Result<String, RepoError>;
}
