mod latex;
mod mixed;
mod scheduler;

use std::{
    sync::{Arc, RwLock},
    time::{Duration, Instant},
};

use tracing::{debug, error, info, warn};

use crate::cache::{
    CacheConfig, ClassificationStore,
    lock::{rw_read, rw_write},
};
use crate::config::{RenderSettings, Settings};
use crate::domain::{
    dom::{ElementMarkers, RenderDocument, RenderElement, markers},
    metadata::{RenderMetadata, RenderTuning},
    types::Strategy,
};

use super::classify::{ContentClassifier, apply_defensive_override, infer_field_name, preview};
use super::engine::{EngineConfig, TypesettingAdapter, TypesettingEngine, TypesettingStatus};
use super::normalize::normalize_content;
use super::runtime::CancelToken;
use super::stats::{RenderStats, StatsSnapshot};
use super::types::{RenderError, RenderOptions};

const TARGET: &str = "application::render::service";

/// Pacing and threshold knobs for [`RenderManager`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderManagerConfig {
    /// Batch size used while no render metadata is loaded.
    pub default_batch_size: usize,
    pub priority_pause: Duration,
    pub batch_pause: Duration,
    pub slow_render: Duration,
    pub slow_analysis: Duration,
}

impl Default for RenderManagerConfig {
    fn default() -> Self {
        Self::from(&RenderSettings::default())
    }
}

impl From<&RenderSettings> for RenderManagerConfig {
    fn from(settings: &RenderSettings) -> Self {
        Self {
            default_batch_size: settings.default_batch_size.get(),
            priority_pause: settings.priority_pause,
            batch_pause: settings.batch_pause,
            slow_render: settings.slow_render,
            slow_analysis: settings.slow_analysis,
        }
    }
}

#[derive(Default)]
struct Session {
    metadata: Option<RenderMetadata>,
    tuning: Option<RenderTuning>,
    cancel: CancelToken,
}

/// Renders solution content into document elements.
///
/// One instance per document. Classification caches, statistics and the
/// engine adapter are owned by the manager; the document and engine are
/// injected.
pub struct RenderManager {
    config: RenderManagerConfig,
    adapter: Arc<TypesettingAdapter>,
    document: Arc<dyn RenderDocument>,
    store: Arc<ClassificationStore>,
    classifier: ContentClassifier,
    stats: Arc<RenderStats>,
    session: RwLock<Session>,
}

impl RenderManager {
    pub fn new(
        adapter: Arc<TypesettingAdapter>,
        document: Arc<dyn RenderDocument>,
        config: RenderManagerConfig,
        cache: &CacheConfig,
    ) -> Self {
        let store = Arc::new(ClassificationStore::new(cache));
        let stats = Arc::new(RenderStats::default());
        let classifier =
            ContentClassifier::new(Arc::clone(&store), Arc::clone(&stats), config.slow_analysis);

        Self {
            config,
            adapter,
            document,
            store,
            classifier,
            stats,
            session: RwLock::new(Session::default()),
        }
    }

    /// Wire a manager and its engine adapter from loaded settings.
    pub fn from_settings(
        engine: Arc<dyn TypesettingEngine>,
        document: Arc<dyn RenderDocument>,
        settings: &Settings,
    ) -> Self {
        let adapter = TypesettingAdapter::new(
            engine,
            EngineConfig::from(&settings.engine),
            settings.render.ready_timeout,
            settings.render.poll_interval,
        );
        Self::new(
            Arc::new(adapter),
            document,
            RenderManagerConfig::from(&settings.render),
            &CacheConfig::from(&settings.cache),
        )
    }

    /// Load the render metadata carried by an upstream solution payload.
    ///
    /// The field-type table is replaced wholesale; a payload without metadata
    /// clears it and restores heuristic-only classification.
    pub fn set_solution_metadata(&self, payload: &serde_json::Value) {
        self.set_render_metadata(RenderMetadata::from_payload(payload));
    }

    pub fn set_render_metadata(&self, metadata: Option<RenderMetadata>) {
        let mut session = rw_write(&self.session, TARGET, "set_render_metadata");

        match metadata {
            Some(metadata) => {
                let entries = metadata.field_entries();
                let tuning = metadata.tuning();
                info!(
                    target = TARGET,
                    fields = entries.len(),
                    priority_fields = metadata.priority_elements.len(),
                    batch_size = tuning.batch_size,
                    advanced_math = tuning.advanced_math,
                    "Render metadata loaded"
                );
                self.store.replace_field_types(entries);
                session.tuning = Some(tuning);
                session.metadata = Some(metadata);
            }
            None => {
                debug!(
                    target = TARGET,
                    "No render metadata, using heuristic classification"
                );
                self.store.clear_field_types();
                session.tuning = None;
                session.metadata = None;
            }
        }
    }

    /// Render `content` into `element`. Returns `false` when the element fell
    /// back to plain text.
    pub async fn render_element(
        &self,
        element: &dyn RenderElement,
        content: Option<&str>,
        options: RenderOptions,
    ) -> bool {
        let Some(raw) = content else {
            element.clear();
            return true;
        };

        let normalized = normalize_content(raw);
        if normalized.is_empty() {
            element.clear();
            return true;
        }

        if !self.adapter.is_ready() {
            // Rendering proceeds either way; paths that need the engine fall back.
            self.adapter.initialize().await;
        }

        let started = Instant::now();
        let decision = self.classifier.classify(element, &normalized);
        let decision = apply_defensive_override(decision, &normalized);
        let display_mode = decision.display_mode || options.display_mode;
        let decision = decision.with_display_mode(display_mode);

        debug!(
            target = TARGET,
            strategy = %decision.strategy,
            source = ?decision.source,
            confidence = decision.confidence,
            display_mode = decision.display_mode,
            "Render decision"
        );

        let outcome = match decision.strategy {
            Strategy::Text => Ok(self.render_text(element, &normalized)),
            Strategy::PureLatex => self
                .render_pure_latex(element, &normalized, decision.display_mode)
                .await
                .map(|()| Strategy::PureLatex),
            Strategy::InlineMath => self.render_inline_math(element, &normalized).await,
            Strategy::MixedContent => self.render_mixed_content(element, &normalized).await,
        };

        let elapsed = started.elapsed();
        match outcome {
            Ok(rendered_as) => {
                self.stats.record_success(elapsed);
                element.add_marker(&rendered_as.rendered_marker());
                if decision.priority {
                    element.add_marker(markers::PRIORITY_RENDERED);
                }
                if elapsed > self.config.slow_render {
                    warn!(
                        target = TARGET,
                        strategy = %rendered_as,
                        elapsed_ms = elapsed.as_secs_f64() * 1000.0,
                        "Slow render"
                    );
                }
                true
            }
            Err(err) => {
                self.stats.record_failure(elapsed);
                self.render_fallback(element, raw.trim(), &err);
                false
            }
        }
    }

    fn render_text(&self, element: &dyn RenderElement, content: &str) -> Strategy {
        element.set_text(content);
        element.add_marker(markers::TEXT_RENDERED);
        Strategy::Text
    }

    fn render_fallback(&self, element: &dyn RenderElement, content: &str, err: &RenderError) {
        error!(
            target = TARGET,
            error = %err,
            preview = %preview(content),
            "Render failed, showing plain text"
        );
        element.set_text(content);
        element.add_marker(markers::RENDER_ERROR);
        element.set_title(&format!("Render error: {err}"));
    }

    pub(crate) fn is_priority<E>(&self, element: &E) -> bool
    where
        E: ElementMarkers + ?Sized,
    {
        let session = rw_read(&self.session, TARGET, "is_priority");
        let Some(metadata) = session.metadata.as_ref() else {
            return false;
        };
        infer_field_name(element).is_some_and(|field| metadata.is_priority(&field))
    }

    pub(crate) fn batch_size(&self) -> usize {
        rw_read(&self.session, TARGET, "batch_size")
            .tuning
            .map(|tuning| tuning.batch_size)
            .unwrap_or(self.config.default_batch_size)
            .max(1)
    }

    /// Token cancelled by the next [`RenderManager::reset`].
    pub fn cancel_token(&self) -> CancelToken {
        rw_read(&self.session, TARGET, "cancel_token").cancel.clone()
    }

    pub fn engine_status(&self) -> TypesettingStatus {
        self.adapter.status()
    }

    pub fn stats(&self) -> StatsSnapshot {
        let session = rw_read(&self.session, TARGET, "stats");
        StatsSnapshot {
            engine_ready: self.adapter.is_ready(),
            has_metadata: session.metadata.is_some(),
            content_cache_size: self.store.content_len(),
            batch_size: session
                .tuning
                .map(|tuning| tuning.batch_size)
                .unwrap_or(self.config.default_batch_size),
            advanced_math: session
                .tuning
                .is_some_and(|tuning| tuning.advanced_math),
            ..self.stats.snapshot()
        }
    }

    /// Drop caches, metadata and counters, and cancel work scheduled under the
    /// previous session.
    pub fn reset(&self) {
        let mut session = rw_write(&self.session, TARGET, "reset");
        session.cancel.cancel();
        *session = Session::default();
        self.store.clear_field_types();
        self.store.clear_content();
        self.stats.reset();
        info!(target = TARGET, "Render manager reset");
    }

    pub fn log_performance_report(&self) {
        let snapshot = self.stats();
        info!(
            target = TARGET,
            successful = snapshot.successful,
            failed = snapshot.failed,
            retried = snapshot.retried,
            svg_errors = snapshot.svg_errors,
            avg_render_time_ms = snapshot.avg_render_time_ms,
            metadata_efficiency = snapshot.metadata_efficiency,
            svg_error_rate = snapshot.svg_error_rate,
            content_cache_size = snapshot.content_cache_size,
            engine_ready = snapshot.engine_ready,
            "Render performance report"
        );
    }
}
