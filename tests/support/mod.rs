#![allow(dead_code)]

use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::Value;
use tutor_render::{
    application::render::{
        EngineConfig, ReadyHook, RenderManager, RenderManagerConfig, TypesetError,
        TypesettingAdapter, TypesettingEngine,
    },
    cache::CacheConfig,
    domain::dom::RenderElement,
    infra::headless::{FixtureNode, HeadlessDocument, HeadlessElement},
};

pub const READY_TIMEOUT: Duration = Duration::from_millis(200);
pub const POLL_INTERVAL: Duration = Duration::from_millis(10);

static DELIMITED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\\\[(.*?)\\\]|\\\((.*?)\\\)").unwrap());

/// When the engine calls its ready hook after being configured.
#[derive(Debug, Clone, Copy)]
pub enum Readiness {
    Immediate,
    After(Duration),
    Never,
}

/// Engine double that emits one `<svg>` per delimited expression.
///
/// `\broken` produces a `NaN` view box and `\fail` makes typesetting error out.
pub struct ScriptedEngine {
    readiness: Readiness,
    configures: AtomicUsize,
    loads: AtomicUsize,
    typesets: AtomicUsize,
}

impl ScriptedEngine {
    pub fn new(readiness: Readiness) -> Arc<Self> {
        Arc::new(Self {
            readiness,
            configures: AtomicUsize::new(0),
            loads: AtomicUsize::new(0),
            typesets: AtomicUsize::new(0),
        })
    }

    pub fn configures(&self) -> usize {
        self.configures.load(Ordering::SeqCst)
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn typesets(&self) -> usize {
        self.typesets.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TypesettingEngine for ScriptedEngine {
    fn loader_present(&self) -> bool {
        false
    }

    fn configure(&self, _config: &EngineConfig, ready: ReadyHook) -> Result<(), TypesetError> {
        self.configures.fetch_add(1, Ordering::SeqCst);
        match self.readiness {
            Readiness::Immediate => ready.signal_ready(),
            Readiness::After(delay) => {
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    ready.signal_ready();
                });
            }
            Readiness::Never => {}
        }
        Ok(())
    }

    fn inject_loader(&self) -> Result<(), TypesetError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn typeset(&self, element: &dyn RenderElement) -> Result<(), TypesetError> {
        self.typesets.fetch_add(1, Ordering::SeqCst);
        let markup = element.markup();
        if markup.contains(r"\fail") {
            return Err(TypesetError::Engine {
                message: "undefined control sequence".to_string(),
            });
        }

        let rendered = DELIMITED.replace_all(&markup, |caps: &Captures<'_>| {
            let (expression, display) = match (caps.get(1), caps.get(2)) {
                (Some(display), _) => (display.as_str(), true),
                (None, Some(inline)) => (inline.as_str(), false),
                (None, None) => ("", false),
            };
            let view_box = if expression.contains(r"\broken") {
                "0 -750 NaN 1000"
            } else {
                "0 -750 2400 1000"
            };
            format!(
                r#"<mjx-container display="{display}"><svg viewBox="{view_box}"><title>{expression}</title></svg></mjx-container>"#
            )
        });
        element.set_markup(&rendered);
        Ok(())
    }
}

pub fn adapter(engine: Arc<ScriptedEngine>) -> TypesettingAdapter {
    TypesettingAdapter::new(engine, EngineConfig::default(), READY_TIMEOUT, POLL_INTERVAL)
}

pub fn manager(engine: Arc<ScriptedEngine>) -> (RenderManager, Arc<HeadlessDocument>) {
    let document = Arc::new(HeadlessDocument::new());
    let manager = RenderManager::new(
        Arc::new(adapter(engine)),
        Arc::clone(&document) as _,
        RenderManagerConfig::default(),
        &CacheConfig::default(),
    );
    (manager, document)
}

pub fn tree(fixture: Value) -> Arc<HeadlessElement> {
    let node: FixtureNode = serde_json::from_value(fixture).expect("valid fixture");
    HeadlessElement::from_fixture(&node)
}

pub fn has_marker(element: &HeadlessElement, marker: &str) -> bool {
    element.snapshot().markers.iter().any(|found| found == marker)
}
