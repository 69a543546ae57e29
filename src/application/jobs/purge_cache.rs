//! Cron job that sweeps expired cache entries.

use std::str::FromStr;
use std::sync::Arc;

use apalis::prelude::*;
use apalis_cron::Schedule;

use crate::cache::ListCacheClient;

/// Marker struct for the cron-triggered sweep.
/// Must implement `From<chrono::DateTime<chrono::Utc>>` for apalis-cron compatibility.
#[derive(Default, Debug, Clone)]
pub struct PurgeCacheJob;

impl From<chrono::DateTime<chrono::Utc>> for PurgeCacheJob {
    fn from(_: chrono::DateTime<chrono::Utc>) -> Self {
        Self
    }
}

#[derive(Clone)]
pub struct PurgeCacheContext {
    pub client: Arc<dyn ListCacheClient>,
}

pub async fn process_purge_cache_job(
    _job: PurgeCacheJob,
    ctx: Data<PurgeCacheContext>,
) -> Result<(), apalis::prelude::Error> {
    match ctx.client.purge_expired() {
        Ok(count) if count > 0 => {
            tracing::info!(purged_count = count, "Purged expired cache entries");
        }
        Err(err) => {
            tracing::warn!(error = %err, "Failed to purge expired cache entries");
        }
        _ => {}
    }
    Ok(())
}

/// Runs every hour at minute 0.
pub fn purge_cache_schedule() -> Schedule {
    Schedule::from_str("0 0 * * * *").expect("Invalid cron expression for purge_cache")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schedule_parses_correctly() {
        let schedule = purge_cache_schedule();
        let upcoming: Vec<_> = schedule.upcoming(chrono::Utc).take(3).collect();
        assert_eq!(upcoming.len(), 3);
    }
}
