use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::domain::{dom::RenderElement, types::Strategy};

use super::runtime::CancelToken;

/// Element scheduled for rendering by a container scan.
#[derive(Clone)]
pub struct RenderTarget {
    pub element: Arc<dyn RenderElement>,
    /// Raw content: the data attribute when present, otherwise the element text.
    pub content: Option<String>,
    pub display_mode: bool,
}

/// Per-call options for [`super::RenderManager::render_element`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderOptions {
    /// Request display layout when the content takes the pure-LaTeX path.
    pub display_mode: bool,
}

impl RenderOptions {
    pub fn display() -> Self {
        Self { display_mode: true }
    }
}

type ProgressFn = Box<dyn FnMut(usize, usize) + Send>;

/// Options for [`super::RenderManager::render_container`].
#[derive(Default)]
pub struct ContainerOptions {
    pub(crate) on_progress: Option<ProgressFn>,
    pub(crate) cancel: Option<CancelToken>,
}

impl ContainerOptions {
    /// Invoke `callback(completed, total)` after every normal batch.
    pub fn with_progress(mut self, callback: impl FnMut(usize, usize) + Send + 'static) -> Self {
        self.on_progress = Some(Box::new(callback));
        self
    }

    /// Stop scheduling further elements once `token` is cancelled. Without a
    /// token the manager's session token is used.
    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

/// Summary of one container pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ContainerReport {
    pub total: usize,
    pub priority: usize,
    pub normal: usize,
    pub batches: usize,
    pub rendered: usize,
    pub failed: usize,
    pub cancelled: bool,
}

/// Failures raised by a typesetting engine.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TypesetError {
    #[error("typesetting engine is not ready")]
    NotReady,
    #[error("typesetting engine failed: {message}")]
    Engine { message: String },
    #[error("invalid SVG generated: viewBox `{view_box}`")]
    InvalidSvg { view_box: String },
    #[error("typesetting produced empty output")]
    EmptyOutput,
    #[error("engine configuration rejected: {message}")]
    Configuration { message: String },
}

impl TypesetError {
    pub fn engine(message: impl Into<String>) -> Self {
        Self::Engine {
            message: message.into(),
        }
    }
}

/// Failure of a single render path. Absorbed by the renderer, which falls back
/// to plain text; it never escapes the public API.
#[derive(Debug, Clone, Error)]
pub enum RenderError {
    #[error("{strategy} render failed: {source}")]
    Typeset {
        strategy: Strategy,
        #[source]
        source: TypesetError,
    },
    #[error("output inspection failed: {message}")]
    Inspection { message: String },
}

impl RenderError {
    pub fn typeset(strategy: Strategy, source: TypesetError) -> Self {
        Self::Typeset { strategy, source }
    }
}
