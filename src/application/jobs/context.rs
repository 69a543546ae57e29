use std::sync::Arc;

use apalis::prelude::Error as ApalisError;

use crate::application::repos::{FriendshipsRepo, JobsRepo, NewsFeedsRepo, TweetsRepo};
use crate::cache::BoundedListCache;

/// Shared context passed to job workers so they can reach persistence and
/// the feed cache.
#[derive(Clone)]
pub struct JobWorkerContext {
    pub tweets: Arc<dyn TweetsRepo>,
    pub friendships: Arc<dyn FriendshipsRepo>,
    pub newsfeeds: Arc<dyn NewsFeedsRepo>,
    pub jobs: Arc<dyn JobsRepo>,
    pub feed_cache: BoundedListCache,
    pub fanout_batch_size: usize,
}

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Convert any error into an [`ApalisError::Failed`].
pub fn job_failed<E>(err: E) -> ApalisError
where
    E: std::error::Error + Send + Sync + 'static,
{
    let boxed: BoxError = Box::new(err);
    ApalisError::Failed(Arc::new(boxed))
}
