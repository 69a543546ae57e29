//! Plover: a write-fanout newsfeed backend.
//!
//! The interesting machinery lives in three places:
//!
//! - [`rowstore`]: maps application records onto lexicographically ordered
//!   composite row keys so that prefix and range scans come out in feed order.
//! - [`cache`]: a cache-aside, bounded list cache holding the most recent N
//!   items of a per-user feed, plus an eventually-consistent counter cache.
//! - [`application::jobs`]: the fanout writer, which materializes one feed
//!   entry per follower in bounded batches on the job queue.
//!
//! Everything else (repositories, pagination, configuration, telemetry) is
//! the plumbing those three need to run as a service.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
pub mod rowstore;
