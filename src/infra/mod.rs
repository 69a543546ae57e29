//! Infrastructure adapters: telemetry, Postgres, sorted-row repositories.

pub mod db;
pub mod error;
pub mod rows;
pub mod telemetry;
