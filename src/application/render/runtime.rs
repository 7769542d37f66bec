use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use tracing::warn;

use crate::domain::dom::{LayoutState, RenderContainer, RenderDocument, RenderElement};

/// Cooperative cancellation flag shared between a caller and the scheduler.
///
/// Checked between scheduling steps; an element already being rendered runs
/// to completion.
#[derive(Debug, Default, Clone)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Off-screen surface the engine typesets into. Detached from the document on
/// drop, whatever happened in between.
pub(crate) struct MeasurementGuard<'a> {
    document: &'a dyn RenderDocument,
    surface: Arc<dyn RenderElement>,
}

impl<'a> MeasurementGuard<'a> {
    pub(crate) fn attach(document: &'a dyn RenderDocument) -> Self {
        let surface = document.attach_measurement_surface();
        Self { document, surface }
    }

    pub(crate) fn surface(&self) -> &dyn RenderElement {
        self.surface.as_ref()
    }
}

impl Drop for MeasurementGuard<'_> {
    fn drop(&mut self) {
        self.document.detach_measurement_surface(&self.surface);
    }
}

/// Forces a hidden container into a measurable off-screen state and restores
/// its original layout on drop.
pub(crate) struct LayoutGuard<'a> {
    container: &'a dyn RenderContainer,
    saved: Option<LayoutState>,
}

impl<'a> LayoutGuard<'a> {
    pub(crate) fn ensure_measurable(container: &'a dyn RenderContainer) -> Self {
        if container.is_laid_out() {
            return Self {
                container,
                saved: None,
            };
        }

        warn!(
            target = "application::render::scheduler",
            "Container is hidden, rendering it off-screen temporarily"
        );
        let saved = container.layout_state();
        container.apply_layout(&LayoutState::offscreen());
        Self {
            container,
            saved: Some(saved),
        }
    }
}

impl Drop for LayoutGuard<'_> {
    fn drop(&mut self) {
        if let Some(saved) = self.saved.take() {
            self.container.apply_layout(&saved);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_is_visible_through_clones() {
        let token = CancelToken::new();
        let observer = token.clone();
        assert!(!observer.is_cancelled());
        token.cancel();
        assert!(observer.is_cancelled());
    }
}
