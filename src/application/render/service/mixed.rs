use tracing::warn;

use crate::application::render::classify::{LATEX_COMMAND, preview};
use crate::application::render::split::{SpanKind, split_mixed_content};
use crate::application::render::types::RenderError;
use crate::domain::{
    dom::{RenderElement, markers},
    types::Strategy,
};

use super::RenderManager;

impl RenderManager {
    /// Render interleaved prose and math as one child span per piece.
    ///
    /// A lone text span that still looks like LaTeX is retried on the
    /// pure-LaTeX path instead.
    pub(super) async fn render_mixed_content(
        &self,
        element: &dyn RenderElement,
        content: &str,
    ) -> Result<Strategy, RenderError> {
        let spans = split_mixed_content(content);

        if let [only] = spans.as_slice()
            && only.kind == SpanKind::Text
            && LATEX_COMMAND.is_match(&only.text)
        {
            warn!(
                target = "application::render::service",
                preview = %preview(content),
                "Mixed content without delimiters looks like LaTeX, rendering as pure_latex"
            );
            self.stats.record_retry();
            self.render_pure_latex(element, content, false).await?;
            return Ok(Strategy::PureLatex);
        }

        element.clear();
        element.add_marker(markers::MIXED_CONTENT_CONTAINER);

        for span in &spans {
            match span.kind {
                SpanKind::Text => {
                    let child = element.append_span(markers::TEXT_PART);
                    child.set_text(&span.text);
                }
                SpanKind::Latex => {
                    let child = element.append_span(markers::LATEX_PART);
                    if let Err(err) = self
                        .render_pure_latex(child.as_ref(), &span.text, false)
                        .await
                    {
                        warn!(
                            target = "application::render::service",
                            error = %err,
                            latex = %span.text,
                            "LaTeX span failed, keeping its source text"
                        );
                        child.set_text(&span.text);
                        child.add_marker(markers::RENDER_ERROR);
                    }
                }
            }
        }

        element.add_marker(markers::MIXED_CONTENT_RENDERED);
        Ok(Strategy::MixedContent)
    }
}
