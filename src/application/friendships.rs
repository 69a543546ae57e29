//! Follow relationships.

use std::sync::Arc;

use time::OffsetDateTime;
use tracing::info;

use crate::application::error::AppError;
use crate::application::pagination::{CursorQuery, FeedPage, FeedPager};
use crate::application::repos::FriendshipsRepo;
use crate::cache::{keys, BoundedListCache};
use crate::domain::entities::FriendshipRecord;
use crate::domain::error::DomainError;
use crate::domain::types::UserId;

pub struct FriendshipService {
    friendships: Arc<dyn FriendshipsRepo>,
    followings_cache: BoundedListCache,
    pager: FeedPager,
}

impl FriendshipService {
    pub fn new(
        friendships: Arc<dyn FriendshipsRepo>,
        followings_cache: BoundedListCache,
        pager: FeedPager,
    ) -> Self {
        Self {
            friendships,
            followings_cache,
            pager,
        }
    }

    pub async fn follow(
        &self,
        from: UserId,
        to: UserId,
    ) -> Result<FriendshipRecord, AppError> {
        if from == to {
            return Err(DomainError::validation("a user cannot follow themselves").into());
        }
        let record = self
            .friendships
            .follow(from, to, OffsetDateTime::now_utc())
            .await?;
        self.followings_cache.invalidate(&keys::followings(from));
        info!(target = "application::friendships", from, to, "followed");
        Ok(record)
    }

    pub async fn unfollow(&self, from: UserId, to: UserId) -> Result<bool, AppError> {
        if from == to {
            return Err(DomainError::validation("a user cannot unfollow themselves").into());
        }
        let removed = self.friendships.unfollow(from, to).await?;
        if removed {
            self.followings_cache.invalidate(&keys::followings(from));
            info!(target = "application::friendships", from, to, "unfollowed");
        }
        Ok(removed)
    }

    pub async fn has_followed(&self, from: UserId, to: UserId) -> Result<bool, AppError> {
        Ok(self.friendships.has_followed(from, to).await?)
    }

    /// Follower ids for fanout; always read from the authoritative source.
    pub async fn follower_ids(&self, user_id: UserId) -> Result<Vec<UserId>, AppError> {
        Ok(self.friendships.follower_ids(user_id).await?)
    }

    pub async fn page_followers(
        &self,
        user_id: UserId,
        query: &CursorQuery,
    ) -> Result<FeedPage<FriendshipRecord>, AppError> {
        Ok(self.friendships.page_followers(user_id, query).await?)
    }

    /// Who `user_id` follows, cache-aside over `followings:{user_id}`.
    pub async fn page_followings(
        &self,
        user_id: UserId,
        query: &CursorQuery,
    ) -> Result<FeedPage<FriendshipRecord>, AppError> {
        let key = keys::followings(user_id);
        let friendships = Arc::clone(&self.friendships);
        let cached: Vec<FriendshipRecord> = self
            .followings_cache
            .load(&key, |limit| async move {
                friendships.followings(user_id, limit).await
            })
            .await?;

        match self
            .pager
            .paginate_cached(&cached, query, self.followings_cache.limit())
        {
            Some(page) => Ok(page),
            None => Ok(self
                .friendships
                .page_followings(user_id, &self.pager.normalize(query))
                .await?),
        }
    }
}
