//! Typesetting engine adapter.
//!
//! The engine is loaded and configured once per adapter. Concurrent
//! `initialize` calls share one attempt: the first caller configures the
//! engine and injects its loader, later callers wait for that attempt and
//! observe its outcome.

use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use serde::Serialize;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::cache::lock::mutex_lock;
use crate::config::{EngineSettings, FontCache};
use crate::domain::dom::RenderElement;

use super::types::TypesetError;

const TARGET: &str = "application::render::engine";

/// External math typesetter driven by [`TypesettingAdapter`].
#[async_trait]
pub trait TypesettingEngine: Send + Sync {
    /// Whether the engine's loader is already present in the host document.
    fn loader_present(&self) -> bool;

    /// Apply the configuration and register the hook the engine calls once it
    /// has started up.
    fn configure(&self, config: &EngineConfig, ready: ReadyHook) -> Result<(), TypesetError>;

    /// Start loading the engine. Called at most once per adapter.
    fn inject_loader(&self) -> Result<(), TypesetError>;

    /// Typeset every delimited expression inside `element` in place.
    async fn typeset(&self, element: &dyn RenderElement) -> Result<(), TypesetError>;
}

/// Startup hook handed to the engine; flips the adapter's ready flag.
#[derive(Debug, Clone)]
pub struct ReadyHook {
    ready: Arc<AtomicBool>,
}

impl ReadyHook {
    pub fn signal_ready(&self) {
        self.ready.store(true, Ordering::SeqCst);
    }
}

/// Engine configuration applied on first initialization.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub inline_delimiters: Vec<(String, String)>,
    pub display_delimiters: Vec<(String, String)>,
    pub process_escapes: bool,
    pub font_cache: FontCache,
    pub scale: f64,
    pub min_scale: f64,
    pub automatic_linebreaks: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::from(&EngineSettings::default())
    }
}

impl From<&EngineSettings> for EngineConfig {
    fn from(settings: &EngineSettings) -> Self {
        let pair = |open: &str, close: &str| (open.to_string(), close.to_string());
        Self {
            inline_delimiters: vec![pair("$", "$"), pair(r"\(", r"\)")],
            display_delimiters: vec![pair("$$", "$$"), pair(r"\[", r"\]")],
            process_escapes: settings.process_escapes,
            font_cache: settings.font_cache,
            scale: settings.scale,
            min_scale: settings.min_scale,
            automatic_linebreaks: settings.automatic_linebreaks,
        }
    }
}

/// Observable adapter state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TypesettingStatus {
    pub ready: bool,
    pub initializing: bool,
    pub error: Option<String>,
}

pub struct TypesettingAdapter {
    engine: Arc<dyn TypesettingEngine>,
    config: EngineConfig,
    ready: Arc<AtomicBool>,
    status: Mutex<TypesettingStatus>,
    init_lock: tokio::sync::Mutex<()>,
    attempts: AtomicU64,
    configured: AtomicBool,
    loader_injected: AtomicBool,
    ready_timeout: Duration,
    poll_interval: Duration,
}

impl TypesettingAdapter {
    pub fn new(
        engine: Arc<dyn TypesettingEngine>,
        config: EngineConfig,
        ready_timeout: Duration,
        poll_interval: Duration,
    ) -> Self {
        Self {
            engine,
            config,
            ready: Arc::new(AtomicBool::new(false)),
            status: Mutex::new(TypesettingStatus::default()),
            init_lock: tokio::sync::Mutex::new(()),
            attempts: AtomicU64::new(0),
            configured: AtomicBool::new(false),
            loader_injected: AtomicBool::new(false),
            ready_timeout,
            poll_interval: poll_interval.max(Duration::from_millis(1)),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    pub fn status(&self) -> TypesettingStatus {
        let mut status = mutex_lock(&self.status, TARGET, "status").clone();
        status.ready = self.is_ready();
        if status.ready {
            status.initializing = false;
        }
        status
    }

    /// Bring the engine up. Returns whether it is ready; `false` means callers
    /// should continue with degraded rendering.
    pub async fn initialize(&self) -> bool {
        if self.is_ready() {
            return true;
        }

        let observed = self.attempts.load(Ordering::SeqCst);
        let _guard = self.init_lock.lock().await;

        if self.is_ready() {
            return true;
        }
        if self.attempts.load(Ordering::SeqCst) != observed {
            // Another caller finished an attempt while this one waited.
            return self.is_ready();
        }

        let ready = self.run_attempt().await;
        self.attempts.fetch_add(1, Ordering::SeqCst);
        ready
    }

    async fn run_attempt(&self) -> bool {
        self.update_status(true, None);

        // Retries re-wait on the hook registered by the first successful configure.
        if !self.configured.load(Ordering::SeqCst) {
            let hook = ReadyHook {
                ready: Arc::clone(&self.ready),
            };
            if let Err(err) = self.engine.configure(&self.config, hook) {
                return self.fail(err.to_string());
            }
            self.configured.store(true, Ordering::SeqCst);
        }

        if !self.engine.loader_present() && !self.loader_injected.swap(true, Ordering::SeqCst) {
            debug!(target = TARGET, "Injecting typesetting engine loader");
            if let Err(err) = self.engine.inject_loader() {
                return self.fail(err.to_string());
            }
        }

        if self.wait_for_ready(self.ready_timeout).await {
            info!(target = TARGET, "Typesetting engine ready");
            self.update_status(false, None);
            true
        } else {
            self.fail(format!(
                "engine not ready after {} ms",
                self.ready_timeout.as_millis()
            ))
        }
    }

    /// Poll the ready flag until it is set or `timeout` elapses. Never errors.
    pub async fn wait_for_ready(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if self.is_ready() {
                return true;
            }
            if Instant::now() >= deadline {
                error!(
                    target = TARGET,
                    timeout_ms = timeout.as_millis() as u64,
                    "Typesetting engine did not become ready"
                );
                return false;
            }
        }
    }

    pub async fn typeset(&self, element: &dyn RenderElement) -> Result<(), TypesetError> {
        if !self.is_ready() {
            return Err(TypesetError::NotReady);
        }
        self.engine.typeset(element).await
    }

    fn fail(&self, message: String) -> bool {
        error!(target = TARGET, error = %message, "Typesetting engine initialization failed");
        self.update_status(false, Some(message));
        false
    }

    fn update_status(&self, initializing: bool, error: Option<String>) {
        let mut status = mutex_lock(&self.status, TARGET, "update_status");
        status.initializing = initializing;
        status.error = error;
    }
}
