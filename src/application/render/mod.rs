//! Solution content rendering.
//!
//! Content is normalized, classified into one of four strategies and rendered
//! through the typesetting engine. Every failure degrades to plain text on the
//! element itself; nothing here returns an error to the caller.

pub mod classify;
mod engine;
pub mod normalize;
mod runtime;
mod service;
pub mod split;
mod stats;
mod types;

pub use classify::{ContentClassifier, analyze_content, apply_defensive_override, infer_field_name};
pub use engine::{
    EngineConfig, ReadyHook, TypesettingAdapter, TypesettingEngine, TypesettingStatus,
};
pub use normalize::normalize_content;
pub use runtime::CancelToken;
pub use service::{RenderManager, RenderManagerConfig};
pub use split::{ContentSpan, SpanKind, split_mixed_content};
pub use stats::{RenderStats, StatsSnapshot};
pub use types::{
    ContainerOptions, ContainerReport, RenderError, RenderOptions, RenderTarget, TypesetError,
};
