use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

const LOG_ENV_VAR: &str = "TUTOR_RENDER_LOG";

/// Install the global tracing subscriber and describe the render metrics.
///
/// Events go to stderr; stdout is reserved for the binary's JSON output.
/// `TUTOR_RENDER_LOG` takes `EnvFilter` directives on top of the configured level.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .with_env_var(LOG_ENV_VAR)
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_current_span(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .with_target(false)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| InfraError::telemetry(format!("subscriber already installed: {err}")))
}

/// Register metric descriptions with the installed recorder. Runs once.
pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "tutor_render_success_total",
            Unit::Count,
            "Total number of elements rendered without falling back."
        );
        describe_counter!(
            "tutor_render_failure_total",
            Unit::Count,
            "Total number of elements that fell back to plain text."
        );
        describe_counter!(
            "tutor_render_svg_error_total",
            Unit::Count,
            "Total number of typeset SVGs rejected for an invalid view box."
        );
        describe_counter!(
            "tutor_render_metadata_hit_total",
            Unit::Count,
            "Total number of classifications answered by render metadata."
        );
        describe_counter!(
            "tutor_render_metadata_miss_total",
            Unit::Count,
            "Total number of classifications that ran the content heuristic."
        );
        describe_counter!(
            "tutor_render_content_cache_evict_total",
            Unit::Count,
            "Total number of content-analysis cache evictions due to capacity."
        );
        describe_histogram!(
            "tutor_render_duration_ms",
            Unit::Milliseconds,
            "Per-element render latency in milliseconds."
        );
    });
}
