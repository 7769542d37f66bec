//! Capability interfaces the render core needs from a document.
//!
//! The core never touches a concrete DOM. A browser binding, a server-side
//! tree or the in-memory [`crate::infra::headless`] document implement these
//! traits. Handles use interior mutability, mirroring DOM node semantics, so
//! several in-flight renders can hold the same element.

use std::{collections::BTreeSet, sync::Arc};

use serde::{Deserialize, Serialize};

/// Set of marker classes carried by an element.
pub type MarkerSet = BTreeSet<String>;

/// Marker classes read and written by the render core.
pub mod markers {
    pub const SMART_CONTENT: &str = "smart-content";
    pub const LATEX_CONTENT: &str = "latex-content";

    pub const SOLUTION_STEP: &str = "solution-step";
    pub const INTERACTIVE_WORKSPACE: &str = "interactive-workspace";
    pub const OPTION_LABEL: &str = "option-label";
    pub const STEP_DESCRIPTION: &str = "step-description";

    pub const TEXT_RENDERED: &str = "text-rendered";
    pub const MATH_RENDERED: &str = "math-rendered";
    pub const TYPESET_RENDERED: &str = "typeset-rendered";
    pub const DISPLAY_MATH: &str = "display-math";
    pub const INLINE_MATH_RENDERED: &str = "inline-math-rendered";
    pub const RENDER_ERROR: &str = "render-error";
    pub const PRIORITY_RENDERED: &str = "priority-rendered";
    pub const MIXED_CONTENT_RENDERED: &str = "mixed-content-rendered";
    pub const MIXED_CONTENT_CONTAINER: &str = "mixed-content-container";
    pub const LATEX_PART: &str = "latex-part";
    pub const TEXT_PART: &str = "text-part";
}

/// Data attributes consulted by the render core.
pub mod attributes {
    pub const FIELD: &str = "data-field";
    pub const CONTENT: &str = "data-content";
    pub const LATEX: &str = "data-latex";
}

/// Read-only view used for classification and field-name inference.
pub trait ElementMarkers {
    fn attribute(&self, name: &str) -> Option<String>;

    fn id(&self) -> Option<String>;

    /// Marker classes on the element itself.
    fn own_markers(&self) -> MarkerSet;

    /// Marker classes of each ancestor, nearest first.
    fn ancestor_markers(&self) -> Vec<MarkerSet>;

    fn text_content(&self) -> String;

    fn has_marker(&self, marker: &str) -> bool {
        self.own_markers().contains(marker)
    }
}

/// Mutable element handle targeted by the renderer.
pub trait RenderElement: ElementMarkers + Send + Sync {
    /// Remove all content and children.
    fn clear(&self);

    /// Replace the content with literal text.
    fn set_text(&self, text: &str);

    /// Replace the content with markup.
    fn set_markup(&self, markup: &str);

    /// Serialized inner markup.
    fn markup(&self) -> String;

    fn add_marker(&self, marker: &str);

    fn set_title(&self, title: &str);

    /// Append an empty `<span>` child carrying `marker` and return it.
    fn append_span(&self, marker: &str) -> Arc<dyn RenderElement>;
}

/// Inline positioning/visibility properties the scheduler may override.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutState {
    pub position: Option<String>,
    pub top: Option<String>,
    pub left: Option<String>,
    pub visibility: Option<String>,
    pub display: Option<String>,
}

impl LayoutState {
    /// Off-screen but measurable: the engine needs real layout to size glyphs.
    pub fn offscreen() -> Self {
        Self {
            position: Some("absolute".to_string()),
            top: Some("-9999px".to_string()),
            left: Some("0px".to_string()),
            visibility: Some("visible".to_string()),
            display: Some("block".to_string()),
        }
    }
}

/// A subtree scanned by the batch scheduler.
pub trait RenderContainer: Send + Sync {
    /// Whether the container currently participates in layout (has an offset parent).
    fn is_laid_out(&self) -> bool;

    fn layout_state(&self) -> LayoutState;

    fn apply_layout(&self, state: &LayoutState);

    /// Descendants carrying `marker`, in document order.
    fn collect(&self, marker: &str) -> Vec<Arc<dyn RenderElement>>;
}

/// Document-level services used by the pure-LaTeX path.
pub trait RenderDocument: Send + Sync {
    /// Create an element attached to the document but positioned off-screen.
    fn attach_measurement_surface(&self) -> Arc<dyn RenderElement>;

    /// Remove a surface previously returned by
    /// [`RenderDocument::attach_measurement_surface`].
    fn detach_measurement_surface(&self, surface: &Arc<dyn RenderElement>);
}
