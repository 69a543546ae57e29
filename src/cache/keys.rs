//! Cache key builders.
//!
//! One function per key family so the format lives in exactly one place.

use crate::domain::types::{TweetId, UserId};

/// Newsfeed entries materialized for one user, newest first.
pub fn user_newsfeeds(user_id: UserId) -> String {
    format!("user_newsfeeds:{user_id}")
}

/// Tweets authored by one user, newest first.
pub fn user_tweets(user_id: UserId) -> String {
    format!("user_tweets:{user_id}")
}

/// Users the given user follows.
pub fn followings(user_id: UserId) -> String {
    format!("followings:{user_id}")
}

/// Comment count for one tweet.
pub fn tweet_comments_count(tweet_id: TweetId) -> String {
    format!("tweet.comments_count:{tweet_id}")
}

/// Like count for one tweet.
pub fn tweet_likes_count(tweet_id: TweetId) -> String {
    format!("tweet.likes_count:{tweet_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_formats() {
        assert_eq!(user_newsfeeds(42), "user_newsfeeds:42");
        assert_eq!(user_tweets(7), "user_tweets:7");
        assert_eq!(followings(7), "followings:7");
        assert_eq!(tweet_comments_count(9), "tweet.comments_count:9");
        assert_eq!(tweet_likes_count(9), "tweet.likes_count:9");
    }
}
