//! Domain entities mirrored from persistent storage.
//!
//! All three records serialize with RFC 3339 timestamps; the same shape is
//! what the bounded list cache stores, so cached and fresh reads are
//! indistinguishable to callers.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::domain::types::{TweetId, UserId};

/// Maximum tweet content length, enforced at publish time.
pub const MAX_TWEET_CONTENT_LEN: usize = 255;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct TweetRecord {
    pub id: TweetId,
    pub user_id: UserId,
    pub content: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// One materialized feed item: `user_id` is the subscriber the entry was
/// fanned out to, not the tweet's author.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct NewsFeedEntry {
    pub user_id: UserId,
    pub tweet_id: TweetId,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct FriendshipRecord {
    pub from_user_id: UserId,
    pub to_user_id: UserId,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}
