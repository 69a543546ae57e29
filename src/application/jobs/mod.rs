//! Background jobs: fanout and cache maintenance.

mod context;
mod fanout;
mod purge_cache;

pub use context::{job_failed, JobWorkerContext};
pub use fanout::{
    enqueue_fanout_job, process_fanout_batch_job, process_fanout_job, FanoutBatchJobPayload,
    FanoutJobPayload,
};
pub use purge_cache::{
    process_purge_cache_job, purge_cache_schedule, PurgeCacheContext, PurgeCacheJob,
};
