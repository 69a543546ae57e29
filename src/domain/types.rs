//! Shared domain identifiers and timestamp conversions.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

pub type UserId = i64;
pub type TweetId = i64;

/// Epoch microseconds for a timestamp. Sorted-row keys and job payloads use
/// this resolution; it round-trips through the 16-digit zero-padded key
/// encoding for any realistic date.
pub fn to_micros(ts: OffsetDateTime) -> i64 {
    (ts.unix_timestamp_nanos() / 1_000) as i64
}

/// Inverse of [`to_micros`]. `None` for values outside the representable
/// date range.
pub fn from_micros(micros: i64) -> Option<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(micros) * 1_000).ok()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    FanoutNewsfeeds,
    FanoutBatch,
}

impl JobType {
    pub fn as_str(self) -> &'static str {
        match self {
            JobType::FanoutNewsfeeds => "fanout_newsfeeds",
            JobType::FanoutBatch => "fanout_batch",
        }
    }
}
