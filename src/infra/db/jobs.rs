//! Job enqueueing through the apalis Postgres backend.
//!
//! Workers consume through `PostgresStorage`; the enqueue side goes through
//! the `apalis.push_job` SQL function so a publish and its fanout job can
//! share one pool.

use async_trait::async_trait;
use serde::Serialize;
use time::OffsetDateTime;

use crate::application::jobs::{FanoutBatchJobPayload, FanoutJobPayload};
use crate::application::repos::{JobsRepo, RepoError};
use crate::domain::types::JobType;

use super::{map_sqlx_error, PostgresRepositories};

const DEFAULT_MAX_ATTEMPTS: i32 = 5;
const DEFAULT_PRIORITY: i32 = 0;

impl PostgresRepositories {
    async fn push_job<P: Serialize>(
        &self,
        job_type: JobType,
        payload: &P,
    ) -> Result<String, RepoError> {
        let payload = serde_json::to_value(payload)
            .map_err(|err| RepoError::from_persistence(err.to_string()))?;

        sqlx::query_scalar::<_, String>(
            "SELECT (apalis.push_job($1, $2::json, $3, $4, $5, $6)).id",
        )
        .bind(job_type.as_str())
        .bind(payload)
        .bind("Pending")
        .bind(OffsetDateTime::now_utc())
        .bind(DEFAULT_MAX_ATTEMPTS)
        .bind(DEFAULT_PRIORITY)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)
    }
}

#[async_trait]
impl JobsRepo for PostgresRepositories {
    async fn enqueue_fanout(&self, payload: FanoutJobPayload) -> Result<String, RepoError> {
        self.push_job(JobType::FanoutNewsfeeds, &payload).await
    }

    async fn enqueue_fanout_batch(
        &self,
        payload: FanoutBatchJobPayload,
    ) -> Result<String, RepoError> {
        self.push_job(JobType::FanoutBatch, &payload).await
    }
}
