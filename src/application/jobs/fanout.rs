//! Write fanout: materialize a published tweet into every follower's feed.
//!
//! The main job writes the author's own entry, then splits the follower set
//! into fixed-size batches and enqueues one independent batch job per
//! chunk. Batch jobs are at-least-once: the feed write is an idempotent
//! upsert keyed on (subscriber, tweet), and `created_at` travels in the
//! payload so a retried batch produces byte-identical rows.

use apalis::prelude::{Data, Error as ApalisError};
use metrics::counter;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::{info, warn};

use crate::application::repos::{JobsRepo, RepoError};
use crate::cache::keys;
use crate::domain::entities::{NewsFeedEntry, TweetRecord};
use crate::domain::types::{TweetId, UserId};

use super::context::{job_failed, JobWorkerContext};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FanoutJobPayload {
    pub tweet_id: TweetId,
    pub author_id: UserId,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FanoutBatchJobPayload {
    pub tweet_id: TweetId,
    pub author_id: UserId,
    pub follower_ids: Vec<UserId>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Enqueue the main fanout job for a freshly published tweet.
pub async fn enqueue_fanout_job<J: JobsRepo + ?Sized>(
    repo: &J,
    tweet: &TweetRecord,
) -> Result<String, RepoError> {
    let payload = FanoutJobPayload {
        tweet_id: tweet.id,
        author_id: tweet.user_id,
        created_at: tweet.created_at,
    };
    repo.enqueue_fanout(payload).await
}

/// Main fanout job: author's own entry, then one batch job per follower
/// chunk.
pub async fn process_fanout_job(
    payload: FanoutJobPayload,
    context: Data<JobWorkerContext>,
) -> Result<(), ApalisError> {
    let ctx = &*context;

    let author_entry = NewsFeedEntry {
        user_id: payload.author_id,
        tweet_id: payload.tweet_id,
        created_at: payload.created_at,
    };
    write_entries(ctx, &[author_entry]).await?;

    let follower_ids = ctx
        .friendships
        .follower_ids(payload.author_id)
        .await
        .map_err(job_failed)?;

    let mut batches = 0usize;
    for chunk in follower_ids.chunks(ctx.fanout_batch_size.max(1)) {
        let batch = FanoutBatchJobPayload {
            tweet_id: payload.tweet_id,
            author_id: payload.author_id,
            follower_ids: chunk.to_vec(),
            created_at: payload.created_at,
        };
        ctx.jobs
            .enqueue_fanout_batch(batch)
            .await
            .map_err(job_failed)?;
        batches += 1;
    }

    counter!("plover_fanout_jobs_total", "kind" => "main").increment(1);
    info!(
        target = "application::jobs::process_fanout_job",
        tweet_id = payload.tweet_id,
        author_id = payload.author_id,
        followers = follower_ids.len(),
        batches,
        "fanout dispatched"
    );
    Ok(())
}

/// One batch of the fanout: bulk-write entries, then push each into its
/// subscriber's cached feed.
pub async fn process_fanout_batch_job(
    payload: FanoutBatchJobPayload,
    context: Data<JobWorkerContext>,
) -> Result<(), ApalisError> {
    let ctx = &*context;

    let entries: Vec<NewsFeedEntry> = payload
        .follower_ids
        .iter()
        .map(|&user_id| NewsFeedEntry {
            user_id,
            tweet_id: payload.tweet_id,
            created_at: payload.created_at,
        })
        .collect();
    write_entries(ctx, &entries).await?;

    counter!("plover_fanout_jobs_total", "kind" => "batch").increment(1);
    counter!("plover_fanout_entries_total").increment(entries.len() as u64);
    info!(
        target = "application::jobs::process_fanout_batch_job",
        tweet_id = payload.tweet_id,
        author_id = payload.author_id,
        entries = entries.len(),
        "fanout batch written"
    );
    Ok(())
}

/// Persist entries, then push each into its subscriber's bounded cached
/// list. The persistent write must land before any cache push; a cache
/// failure is logged inside the cache layer and never fails the batch.
async fn write_entries(
    ctx: &JobWorkerContext,
    entries: &[NewsFeedEntry],
) -> Result<(), ApalisError> {
    ctx.newsfeeds.insert_batch(entries).await.map_err(job_failed)?;

    for entry in entries {
        let key = keys::user_newsfeeds(entry.user_id);
        let user_id = entry.user_id;
        let result = ctx
            .feed_cache
            .push(&key, entry, |limit| async move {
                ctx.newsfeeds.list_for_user(user_id, limit).await
            })
            .await;
        if let Err(error) = result {
            // Feed row is durable; the cache will self-heal on next read.
            warn!(
                target = "application::jobs::write_entries",
                user_id,
                %error,
                "feed cache push skipped"
            );
        }
    }
    Ok(())
}
