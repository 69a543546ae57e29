//! Application layer: services, repositories, pagination, background jobs.

pub mod error;
pub mod feeds;
pub mod friendships;
pub mod jobs;
pub mod pagination;
pub mod repos;
pub mod tweets;
