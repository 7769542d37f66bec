use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};

/// Command-line arguments for the `tutor-render` binary.
#[derive(Debug, Parser)]
#[command(
    name = "tutor-render",
    version,
    about = "Classify and render math-tutoring solution content"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "TUTOR_RENDER_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(flatten)]
    pub logging: LoggingOverrides,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Render a headless document fixture and print the result as JSON.
    Render(RenderArgs),
    /// Print the heuristic decision and mixed-content spans for a string.
    Classify(ClassifyArgs),
}

#[derive(Debug, Args, Clone)]
pub struct RenderArgs {
    /// Fixture describing the container tree and optional solution payload.
    #[arg(value_name = "FIXTURE", value_hint = ValueHint::FilePath)]
    pub fixture: PathBuf,

    /// Pretty-print the JSON output.
    #[arg(long)]
    pub pretty: bool,

    #[command(flatten)]
    pub overrides: RenderOverrides,
}

#[derive(Debug, Args, Clone)]
pub struct ClassifyArgs {
    /// Content to classify.
    #[arg(value_name = "TEXT")]
    pub text: String,
}

#[derive(Debug, Args, Default, Clone)]
pub struct LoggingOverrides {
    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub log_json: Option<bool>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct RenderOverrides {
    /// Override the batch size used when no render metadata is present.
    #[arg(long = "render-batch-size", value_name = "COUNT")]
    pub batch_size: Option<u64>,

    /// Override how long to wait for the typesetting engine.
    #[arg(long = "render-ready-timeout-ms", value_name = "MILLIS")]
    pub ready_timeout_ms: Option<u64>,

    /// Override the typesetting scale factor.
    #[arg(long = "engine-scale", value_name = "FACTOR")]
    pub engine_scale: Option<f64>,

    /// Override the content-analysis cache capacity.
    #[arg(long = "cache-content-limit", value_name = "COUNT")]
    pub content_cache_limit: Option<u64>,
}
