use std::collections::BTreeMap;

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::application::pagination::{CursorQuery, FeedPage};
use crate::application::repos::{FriendshipsRepo, RepoError};
use crate::domain::entities::FriendshipRecord;
use crate::domain::types::{from_micros, to_micros, UserId};
use crate::rowstore::{FieldValue, Record, ScanQuery};

use super::RowRepositories;

/// Rebuild a friendship from one row of either direction table.
fn record_to_friendship(record: &Record) -> Result<FriendshipRecord, RepoError> {
    let read = |field: &str| {
        record
            .int(field)
            .ok_or_else(|| RepoError::from_persistence(format!("row missing `{field}`")))
    };
    let created_at = from_micros(read("created_at")?)
        .ok_or_else(|| RepoError::from_persistence("row timestamp out of range"))?;
    Ok(FriendshipRecord {
        from_user_id: read("from_user_id")?,
        to_user_id: read("to_user_id")?,
        created_at,
    })
}

fn user_prefix(user_id: UserId) -> Vec<Option<FieldValue>> {
    vec![Some(FieldValue::Int(user_id)), None]
}

impl RowRepositories {
    /// The following edge from `from` to `to`, if present.
    fn find_following(
        &self,
        from: UserId,
        to: UserId,
    ) -> Result<Option<FriendshipRecord>, RepoError> {
        let scan = ScanQuery {
            prefix: Some(user_prefix(from)),
            ..Default::default()
        };
        for record in self.followings_model().filter(&scan)? {
            let friendship = record_to_friendship(&record)?;
            if friendship.to_user_id == to {
                return Ok(Some(friendship));
            }
        }
        Ok(None)
    }

    fn following_values(friendship: &FriendshipRecord) -> BTreeMap<String, FieldValue> {
        let mut values = BTreeMap::new();
        values.insert(
            "from_user_id".to_string(),
            FieldValue::Int(friendship.from_user_id),
        );
        values.insert(
            "created_at".to_string(),
            FieldValue::Int(to_micros(friendship.created_at)),
        );
        values.insert(
            "to_user_id".to_string(),
            FieldValue::Int(friendship.to_user_id),
        );
        values
    }

    fn follower_values(friendship: &FriendshipRecord) -> BTreeMap<String, FieldValue> {
        let mut values = BTreeMap::new();
        values.insert(
            "to_user_id".to_string(),
            FieldValue::Int(friendship.to_user_id),
        );
        values.insert(
            "created_at".to_string(),
            FieldValue::Int(to_micros(friendship.created_at)),
        );
        values.insert(
            "from_user_id".to_string(),
            FieldValue::Int(friendship.from_user_id),
        );
        values
    }
}

#[async_trait]
impl FriendshipsRepo for RowRepositories {
    async fn follow(
        &self,
        from: UserId,
        to: UserId,
        created_at: OffsetDateTime,
    ) -> Result<FriendshipRecord, RepoError> {
        if let Some(existing) = self.find_following(from, to)? {
            return Ok(existing);
        }

        let friendship = FriendshipRecord {
            from_user_id: from,
            to_user_id: to,
            created_at,
        };
        // Both direction tables get a row; the follower side is what fanout
        // scans.
        self.followings_model()
            .create(Self::following_values(&friendship))?;
        self.followers_model().create(Self::follower_values(&friendship))?;
        Ok(friendship)
    }

    async fn unfollow(&self, from: UserId, to: UserId) -> Result<bool, RepoError> {
        let Some(friendship) = self.find_following(from, to)? else {
            return Ok(false);
        };
        self.followings_model()
            .delete(&Self::following_values(&friendship))?;
        self.followers_model()
            .delete(&Self::follower_values(&friendship))?;
        Ok(true)
    }

    async fn has_followed(&self, from: UserId, to: UserId) -> Result<bool, RepoError> {
        Ok(self.find_following(from, to)?.is_some())
    }

    async fn follower_ids(&self, user_id: UserId) -> Result<Vec<UserId>, RepoError> {
        let scan = ScanQuery {
            prefix: Some(user_prefix(user_id)),
            ..Default::default()
        };
        self.followers_model()
            .filter(&scan)?
            .iter()
            .map(|record| record_to_friendship(record).map(|f| f.from_user_id))
            .collect()
    }

    async fn followings(
        &self,
        user_id: UserId,
        limit: usize,
    ) -> Result<Vec<FriendshipRecord>, RepoError> {
        let scan = ScanQuery {
            prefix: Some(user_prefix(user_id)),
            limit: Some(limit),
            reverse: true,
            ..Default::default()
        };
        self.followings_model()
            .filter(&scan)?
            .iter()
            .map(record_to_friendship)
            .collect()
    }

    async fn page_followers(
        &self,
        user_id: UserId,
        query: &CursorQuery,
    ) -> Result<FeedPage<FriendshipRecord>, RepoError> {
        let page =
            self.pager()
                .paginate_rows(self.followers_model(), &[FieldValue::Int(user_id)], query)?;
        Ok(FeedPage {
            items: page
                .items
                .iter()
                .map(record_to_friendship)
                .collect::<Result<_, _>>()?,
            has_next_page: page.has_next_page,
        })
    }

    async fn page_followings(
        &self,
        user_id: UserId,
        query: &CursorQuery,
    ) -> Result<FeedPage<FriendshipRecord>, RepoError> {
        let page = self.pager().paginate_rows(
            self.followings_model(),
            &[FieldValue::Int(user_id)],
            query,
        )?;
        Ok(FeedPage {
            items: page
                .items
                .iter()
                .map(record_to_friendship)
                .collect::<Result<_, _>>()?,
            has_next_page: page.has_next_page,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use time::Duration;

    use super::*;
    use crate::rowstore::MemoryStore;

    fn ts(seconds: i64) -> OffsetDateTime {
        OffsetDateTime::UNIX_EPOCH + Duration::seconds(seconds)
    }

    fn repos() -> RowRepositories {
        RowRepositories::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn follow_then_unfollow_round_trips() {
        let repos = repos();

        repos.follow(1, 2, ts(10)).await.expect("follow");
        assert!(repos.has_followed(1, 2).await.expect("check"));
        assert!(!repos.has_followed(2, 1).await.expect("check"));
        assert_eq!(repos.follower_ids(2).await.expect("followers"), vec![1]);

        assert!(repos.unfollow(1, 2).await.expect("unfollow"));
        assert!(!repos.has_followed(1, 2).await.expect("check"));
        assert!(repos.follower_ids(2).await.expect("followers").is_empty());
        assert!(!repos.unfollow(1, 2).await.expect("second unfollow"));
    }

    #[tokio::test]
    async fn follow_is_idempotent() {
        let repos = repos();

        let first = repos.follow(1, 2, ts(10)).await.expect("follow");
        let second = repos.follow(1, 2, ts(99)).await.expect("follow again");
        assert_eq!(first, second);
        assert_eq!(repos.follower_ids(2).await.expect("followers").len(), 1);
    }

    #[tokio::test]
    async fn followings_window_is_newest_first() {
        let repos = repos();
        for (to, seconds) in [(2, 10), (3, 20), (4, 30)] {
            repos.follow(1, to, ts(seconds)).await.expect("follow");
        }

        let recent = FriendshipsRepo::followings(&repos, 1, 2)
            .await
            .expect("list");
        let ids: Vec<UserId> = recent.iter().map(|f| f.to_user_id).collect();
        assert_eq!(ids, vec![4, 3]);
    }

    #[tokio::test]
    async fn follower_pages_walk_backward() {
        let repos = repos();
        for (from, seconds) in [(2, 10), (3, 20), (4, 30)] {
            repos.follow(from, 1, ts(seconds)).await.expect("follow");
        }

        let query = CursorQuery::latest().with_size(2);
        let page = repos.page_followers(1, &query).await.expect("page");
        let ids: Vec<UserId> = page.items.iter().map(|f| f.from_user_id).collect();
        assert_eq!(ids, vec![4, 3]);
        assert!(page.has_next_page);

        let older = CursorQuery::older_than(ts(20)).with_size(2);
        let page = repos.page_followers(1, &older).await.expect("page");
        let ids: Vec<UserId> = page.items.iter().map(|f| f.from_user_id).collect();
        assert_eq!(ids, vec![2]);
        assert!(!page.has_next_page);
    }
}
