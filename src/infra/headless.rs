//! In-memory document implementing the render capability traits.
//!
//! Used by the diagnostics binary and the integration tests. Nodes are shared
//! handles with interior mutability, so a renderer can hold an element while
//! the scheduler holds its container.

use std::{
    cell::RefCell,
    collections::BTreeMap,
    rc::Rc,
    sync::{
        Arc, Mutex, Weak,
        atomic::{AtomicUsize, Ordering},
    },
};

use lol_html::{RewriteStrSettings, doc_text, rewrite_str};
use serde::{Deserialize, Serialize};

use crate::cache::lock::mutex_lock;
use crate::domain::dom::{
    ElementMarkers, LayoutState, MarkerSet, RenderContainer, RenderDocument, RenderElement,
    markers,
};

const TARGET: &str = "infra::headless";
const MEASUREMENT_MARKER: &str = "typeset-measure";

/// Serialized element tree, as read from a fixture file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FixtureNode {
    pub tag: Option<String>,
    pub id: Option<String>,
    pub classes: Vec<String>,
    pub attributes: BTreeMap<String, String>,
    pub text: Option<String>,
    /// Start out of layout (`display: none`).
    pub hidden: bool,
    pub children: Vec<FixtureNode>,
}

/// A document fixture: the container tree plus an optional solution payload.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DocumentFixture {
    pub solution: Option<serde_json::Value>,
    pub container: FixtureNode,
}

#[derive(Debug, Clone, Default)]
enum Content {
    #[default]
    Empty,
    Text(String),
    Markup(String),
    Children(Vec<Arc<HeadlessElement>>),
}

#[derive(Debug, Default)]
struct NodeState {
    markers: MarkerSet,
    title: Option<String>,
    content: Content,
    layout: LayoutState,
}

#[derive(Debug)]
pub struct HeadlessElement {
    tag: String,
    id: Option<String>,
    attributes: BTreeMap<String, String>,
    parent: Weak<HeadlessElement>,
    this: Weak<HeadlessElement>,
    state: Mutex<NodeState>,
}

/// Rendered state of one element, as printed by the diagnostics binary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ElementSnapshot {
    pub id: Option<String>,
    pub markers: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub text: String,
    pub markup: String,
}

impl HeadlessElement {
    /// Build a detached tree from a fixture.
    pub fn from_fixture(fixture: &FixtureNode) -> Arc<Self> {
        Self::build(fixture, Weak::new())
    }

    fn build(fixture: &FixtureNode, parent: Weak<Self>) -> Arc<Self> {
        Arc::new_cyclic(|this| {
            let content = if fixture.children.is_empty() {
                fixture
                    .text
                    .as_ref()
                    .map(|text| Content::Text(text.clone()))
                    .unwrap_or_default()
            } else {
                Content::Children(
                    fixture
                        .children
                        .iter()
                        .map(|child| Self::build(child, this.clone()))
                        .collect(),
                )
            };

            let layout = if fixture.hidden {
                LayoutState {
                    display: Some("none".to_string()),
                    ..LayoutState::default()
                }
            } else {
                LayoutState::default()
            };

            Self {
                tag: fixture.tag.clone().unwrap_or_else(|| "div".to_string()),
                id: fixture.id.clone(),
                attributes: fixture.attributes.clone(),
                parent,
                this: this.clone(),
                state: Mutex::new(NodeState {
                    markers: fixture.classes.iter().cloned().collect(),
                    title: None,
                    content,
                    layout,
                }),
            }
        })
    }

    fn new_child(&self, tag: &str, marker: &str) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            tag: tag.to_string(),
            id: None,
            attributes: BTreeMap::new(),
            parent: self.this.clone(),
            this: this.clone(),
            state: Mutex::new(NodeState {
                markers: MarkerSet::from([marker.to_string()]),
                ..NodeState::default()
            }),
        })
    }

    pub fn title(&self) -> Option<String> {
        mutex_lock(&self.state, TARGET, "title").title.clone()
    }

    pub fn children(&self) -> Vec<Arc<HeadlessElement>> {
        match &mutex_lock(&self.state, TARGET, "children").content {
            Content::Children(children) => children.clone(),
            _ => Vec::new(),
        }
    }

    /// Descendants in document order, excluding `self`.
    fn descendants(&self) -> Vec<Arc<HeadlessElement>> {
        let mut found = Vec::new();
        for child in self.children() {
            found.push(Arc::clone(&child));
            found.extend(child.descendants());
        }
        found
    }

    /// Element carrying `id`, searching `self` and its descendants.
    pub fn find_by_id(self: &Arc<Self>, id: &str) -> Option<Arc<HeadlessElement>> {
        if self.id.as_deref() == Some(id) {
            return Some(Arc::clone(self));
        }
        self.descendants()
            .into_iter()
            .find(|node| node.id.as_deref() == Some(id))
    }

    pub fn snapshot(&self) -> ElementSnapshot {
        let (markers, title) = {
            let state = mutex_lock(&self.state, TARGET, "snapshot");
            (state.markers.iter().cloned().collect(), state.title.clone())
        };
        ElementSnapshot {
            id: self.id.clone(),
            markers,
            title,
            text: self.text_content(),
            markup: self.markup(),
        }
    }

    /// Snapshots of every smart-content and latex-content descendant.
    pub fn snapshot_renderables(&self) -> Vec<ElementSnapshot> {
        self.descendants()
            .into_iter()
            .filter(|node| {
                node.has_marker(markers::SMART_CONTENT) || node.has_marker(markers::LATEX_CONTENT)
            })
            .map(|node| node.snapshot())
            .collect()
    }

    fn outer_markup(&self) -> String {
        let class = {
            let state = mutex_lock(&self.state, TARGET, "outer_markup");
            state.markers.iter().cloned().collect::<Vec<_>>().join(" ")
        };
        let inner = self.markup();
        if class.is_empty() {
            format!("<{tag}>{inner}</{tag}>", tag = self.tag)
        } else {
            format!(
                "<{tag} class=\"{class}\">{inner}</{tag}>",
                tag = self.tag,
                class = class.replace('"', "&quot;")
            )
        }
    }
}

impl ElementMarkers for HeadlessElement {
    fn attribute(&self, name: &str) -> Option<String> {
        self.attributes.get(name).cloned()
    }

    fn id(&self) -> Option<String> {
        self.id.clone()
    }

    fn own_markers(&self) -> MarkerSet {
        mutex_lock(&self.state, TARGET, "own_markers").markers.clone()
    }

    fn ancestor_markers(&self) -> Vec<MarkerSet> {
        let mut sets = Vec::new();
        let mut current = self.parent.upgrade();
        while let Some(node) = current {
            sets.push(node.own_markers());
            current = node.parent.upgrade();
        }
        sets
    }

    fn text_content(&self) -> String {
        let content = mutex_lock(&self.state, TARGET, "text_content").content.clone();
        match content {
            Content::Empty => String::new(),
            Content::Text(text) => text,
            Content::Markup(markup) => markup_text(&markup),
            Content::Children(children) => {
                children.iter().map(|child| child.text_content()).collect()
            }
        }
    }
}

impl RenderElement for HeadlessElement {
    fn clear(&self) {
        mutex_lock(&self.state, TARGET, "clear").content = Content::Empty;
    }

    fn set_text(&self, text: &str) {
        mutex_lock(&self.state, TARGET, "set_text").content = Content::Text(text.to_string());
    }

    fn set_markup(&self, markup: &str) {
        mutex_lock(&self.state, TARGET, "set_markup").content =
            Content::Markup(markup.to_string());
    }

    fn markup(&self) -> String {
        let content = mutex_lock(&self.state, TARGET, "markup").content.clone();
        match content {
            Content::Empty => String::new(),
            Content::Text(text) => ammonia::clean_text(&text),
            Content::Markup(markup) => markup,
            Content::Children(children) => {
                children.iter().map(|child| child.outer_markup()).collect()
            }
        }
    }

    fn add_marker(&self, marker: &str) {
        mutex_lock(&self.state, TARGET, "add_marker")
            .markers
            .insert(marker.to_string());
    }

    fn set_title(&self, title: &str) {
        mutex_lock(&self.state, TARGET, "set_title").title = Some(title.to_string());
    }

    fn append_span(&self, marker: &str) -> Arc<dyn RenderElement> {
        let child = self.new_child("span", marker);
        let mut state = mutex_lock(&self.state, TARGET, "append_span");
        match &mut state.content {
            Content::Children(children) => children.push(Arc::clone(&child)),
            other => *other = Content::Children(vec![Arc::clone(&child)]),
        }
        child
    }
}

impl RenderContainer for HeadlessElement {
    fn is_laid_out(&self) -> bool {
        let state = mutex_lock(&self.state, TARGET, "is_laid_out");
        state.layout.display.as_deref() != Some("none")
    }

    fn layout_state(&self) -> LayoutState {
        mutex_lock(&self.state, TARGET, "layout_state").layout.clone()
    }

    fn apply_layout(&self, layout: &LayoutState) {
        mutex_lock(&self.state, TARGET, "apply_layout").layout = layout.clone();
    }

    fn collect(&self, marker: &str) -> Vec<Arc<dyn RenderElement>> {
        self.descendants()
            .into_iter()
            .filter(|node| node.has_marker(marker))
            .map(|node| node as Arc<dyn RenderElement>)
            .collect()
    }
}

/// Document owning the off-screen measurement surfaces.
#[derive(Debug, Default)]
pub struct HeadlessDocument {
    attached: Mutex<Vec<Arc<HeadlessElement>>>,
    created: AtomicUsize,
}

impl HeadlessDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Surfaces currently attached.
    pub fn attached_surfaces(&self) -> usize {
        mutex_lock(&self.attached, TARGET, "attached_surfaces").len()
    }

    /// Surfaces attached over the document's lifetime.
    pub fn surfaces_created(&self) -> usize {
        self.created.load(Ordering::Relaxed)
    }
}

impl RenderDocument for HeadlessDocument {
    fn attach_measurement_surface(&self) -> Arc<dyn RenderElement> {
        let surface = HeadlessElement::from_fixture(&FixtureNode {
            classes: vec![MEASUREMENT_MARKER.to_string()],
            ..FixtureNode::default()
        });
        surface.apply_layout(&LayoutState::offscreen());

        mutex_lock(&self.attached, TARGET, "attach")
            .push(Arc::clone(&surface));
        self.created.fetch_add(1, Ordering::Relaxed);
        surface
    }

    fn detach_measurement_surface(&self, surface: &Arc<dyn RenderElement>) {
        let target = Arc::as_ptr(surface) as *const ();
        mutex_lock(&self.attached, TARGET, "detach")
            .retain(|candidate| Arc::as_ptr(candidate) as *const () != target);
    }
}

/// Text nodes of an HTML fragment, concatenated.
fn markup_text(markup: &str) -> String {
    let collected = Rc::new(RefCell::new(String::new()));

    let result = rewrite_str(
        markup,
        RewriteStrSettings {
            document_content_handlers: vec![doc_text!({
                let collected = Rc::clone(&collected);
                move |chunk| {
                    collected.borrow_mut().push_str(chunk.as_str());
                    Ok(())
                }
            })],
            ..RewriteStrSettings::default()
        },
    );

    match result {
        Ok(_) => collected.borrow().clone(),
        Err(_) => markup.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn tree() -> Arc<HeadlessElement> {
        let fixture: FixtureNode = serde_json::from_value(json!({
            "classes": ["interactive-workspace"],
            "children": [
                { "id": "desc", "classes": ["smart-content"], "text": "Adım $x=1$" },
                {
                    "classes": ["option-label"],
                    "children": [
                        { "id": "opt", "classes": ["smart-content"], "attributes": { "data-content": "$2^3$" } }
                    ]
                }
            ]
        }))
        .unwrap();
        HeadlessElement::from_fixture(&fixture)
    }

    #[test]
    fn collects_by_marker_in_document_order() {
        let root = tree();
        let found: Vec<Option<String>> = root
            .collect(markers::SMART_CONTENT)
            .iter()
            .map(|node| node.id())
            .collect();
        assert_eq!(found, vec![Some("desc".into()), Some("opt".into())]);
    }

    #[test]
    fn ancestors_are_nearest_first() {
        let root = tree();
        let opt = root.find_by_id("opt").unwrap();
        let ancestors = opt.ancestor_markers();
        assert!(ancestors[0].contains(markers::OPTION_LABEL));
        assert!(ancestors[1].contains(markers::INTERACTIVE_WORKSPACE));
    }

    #[test]
    fn text_markup_and_children() {
        let root = tree();
        let desc = root.find_by_id("desc").unwrap();
        assert_eq!(desc.text_content(), "Adım $x=1$");

        desc.set_markup("<b>Adım</b> bir");
        assert_eq!(desc.text_content(), "Adım bir");

        desc.clear();
        let part = desc.append_span(markers::TEXT_PART);
        part.set_text("a < b");
        assert_eq!(desc.text_content(), "a < b");
        assert!(desc.markup().starts_with("<span class=\"text-part\">"));
        assert!(!desc.markup().contains("a < b"));
    }

    #[test]
    fn measurement_surfaces_are_tracked() {
        let document = HeadlessDocument::new();
        let surface = document.attach_measurement_surface();
        assert_eq!(document.attached_surfaces(), 1);

        document.detach_measurement_surface(&surface);
        assert_eq!(document.attached_surfaces(), 0);
        assert_eq!(document.surfaces_created(), 1);
    }

    #[test]
    fn hidden_container_reports_no_layout() {
        let root = HeadlessElement::from_fixture(&FixtureNode {
            hidden: true,
            ..FixtureNode::default()
        });
        assert!(!root.is_laid_out());
        root.apply_layout(&LayoutState::offscreen());
        assert!(root.is_laid_out());
    }
}
