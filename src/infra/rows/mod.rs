//! Sorted-row repository implementations.
//!
//! The same repo traits `infra/db` implements over Postgres, here over the
//! ordered key space. Feed tables key on `(user_id reversed, created_at)`:
//! reversing the user id spreads adjacent users across the key space, and
//! the timestamp makes "newest N for user X" a bounded reverse prefix scan.

mod friendships;
mod newsfeeds;

use std::sync::Arc;

use crate::application::pagination::FeedPager;
use crate::rowstore::{FieldDescriptor, RowModel, SortedStore, TableSchema};

pub fn followings_schema() -> TableSchema {
    TableSchema::new(
        "followings",
        &[
            FieldDescriptor::int("from_user_id").reversed(),
            FieldDescriptor::timestamp("created_at"),
            FieldDescriptor::int("to_user_id").column_family("cf"),
        ],
    )
    .expect("valid followings schema")
}

pub fn followers_schema() -> TableSchema {
    TableSchema::new(
        "followers",
        &[
            FieldDescriptor::int("to_user_id").reversed(),
            FieldDescriptor::timestamp("created_at"),
            FieldDescriptor::int("from_user_id").column_family("cf"),
        ],
    )
    .expect("valid followers schema")
}

pub fn newsfeeds_schema() -> TableSchema {
    TableSchema::new(
        "newsfeeds",
        &[
            FieldDescriptor::int("user_id").reversed(),
            FieldDescriptor::timestamp("created_at"),
            FieldDescriptor::int("tweet_id").column_family("cf"),
        ],
    )
    .expect("valid newsfeeds schema")
}

/// Repositories over one shared sorted store.
#[derive(Clone)]
pub struct RowRepositories {
    followings: RowModel,
    followers: RowModel,
    newsfeeds: RowModel,
    pager: FeedPager,
}

impl RowRepositories {
    pub fn new(store: Arc<dyn SortedStore>) -> Self {
        Self::with_pager(store, FeedPager::default())
    }

    pub fn with_pager(store: Arc<dyn SortedStore>, pager: FeedPager) -> Self {
        Self {
            followings: RowModel::new(followings_schema(), Arc::clone(&store)),
            followers: RowModel::new(followers_schema(), Arc::clone(&store)),
            newsfeeds: RowModel::new(newsfeeds_schema(), store),
            pager,
        }
    }

    pub(crate) fn followings_model(&self) -> &RowModel {
        &self.followings
    }

    pub(crate) fn followers_model(&self) -> &RowModel {
        &self.followers
    }

    pub(crate) fn newsfeeds_model(&self) -> &RowModel {
        &self.newsfeeds
    }

    pub(crate) fn pager(&self) -> &FeedPager {
        &self.pager
    }
}
