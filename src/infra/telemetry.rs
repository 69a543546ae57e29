use std::sync::Once;

use metrics::{describe_counter, Unit};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "plover_cache_requests_total",
            Unit::Count,
            "Cache lookups by kind (list, counter) and result (hit, miss, degraded)."
        );
        describe_counter!(
            "plover_cache_pushes_total",
            Unit::Count,
            "Incremental cache pushes by result (warm, cold_reload, degraded)."
        );
        describe_counter!(
            "plover_fanout_jobs_total",
            Unit::Count,
            "Fanout jobs processed, by kind (main, batch)."
        );
        describe_counter!(
            "plover_fanout_entries_total",
            Unit::Count,
            "Feed entries materialized by fanout batches."
        );
    });
}
