use std::{cell::RefCell, rc::Rc};

use lol_html::{RewriteStrSettings, element, rewrite_str};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

use crate::application::render::runtime::MeasurementGuard;
use crate::application::render::types::{RenderError, TypesetError};
use crate::domain::{
    dom::{RenderElement, markers},
    types::Strategy,
};

use super::RenderManager;

static DISPLAY_DOLLARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$\$([^$]+)\$\$").unwrap());
static INLINE_DOLLARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$([^$]+)\$").unwrap());

const OUTER_DELIMITERS: [(&str, &str); 4] =
    [("$$", "$$"), ("$", "$"), (r"\[", r"\]"), (r"\(", r"\)")];

impl RenderManager {
    /// Typeset `content` as one expression off-screen and copy the result into
    /// `target` once the output has been validated.
    pub(super) async fn render_pure_latex(
        &self,
        target: &dyn RenderElement,
        content: &str,
        display_mode: bool,
    ) -> Result<(), RenderError> {
        let expression = strip_outer_delimiters(content);
        let wrapped = if display_mode {
            format!(r"\[{expression}\]")
        } else {
            format!(r"\({expression}\)")
        };

        let markup = {
            let guard = MeasurementGuard::attach(self.document.as_ref());
            let surface = guard.surface();
            surface.set_markup(&wrapped);
            self.adapter
                .typeset(surface)
                .await
                .map_err(|err| RenderError::typeset(Strategy::PureLatex, err))?;
            surface.markup()
        };

        let invalid = invalid_view_boxes(&markup)?;
        if let Some(first) = invalid.first() {
            for view_box in &invalid {
                warn!(
                    target = "application::render::service",
                    view_box = %view_box,
                    "Typesetting produced an invalid SVG view box"
                );
                self.stats.record_svg_error();
            }
            return Err(RenderError::typeset(
                Strategy::PureLatex,
                TypesetError::InvalidSvg {
                    view_box: first.clone(),
                },
            ));
        }

        if markup.trim().is_empty() {
            return Err(RenderError::typeset(
                Strategy::PureLatex,
                TypesetError::EmptyOutput,
            ));
        }

        target.set_markup(&markup);
        target.add_marker(markers::MATH_RENDERED);
        target.add_marker(markers::TYPESET_RENDERED);
        if display_mode {
            target.add_marker(markers::DISPLAY_MATH);
        }
        Ok(())
    }

    /// Rewrite `$…$` spans to engine delimiters and typeset the element in place.
    pub(super) async fn render_inline_math(
        &self,
        element: &dyn RenderElement,
        content: &str,
    ) -> Result<Strategy, RenderError> {
        let rewritten = DISPLAY_DOLLARS.replace_all(content, r"\[${1}\]");
        let rewritten = INLINE_DOLLARS.replace_all(&rewritten, r"\(${1}\)");

        element.set_markup(&rewritten);
        self.adapter
            .typeset(element)
            .await
            .map_err(|err| RenderError::typeset(Strategy::InlineMath, err))?;

        element.add_marker(markers::INLINE_MATH_RENDERED);
        Ok(Strategy::InlineMath)
    }
}

/// Remove one enclosing delimiter pair when it wraps the whole content.
fn strip_outer_delimiters(content: &str) -> &str {
    let trimmed = content.trim();
    OUTER_DELIMITERS
        .iter()
        .find_map(|(open, close)| {
            trimmed
                .strip_prefix(open)
                .and_then(|rest| rest.strip_suffix(close))
        })
        .map(str::trim)
        .unwrap_or(trimmed)
}

/// View boxes of every `<svg>` in `markup` that contain `NaN` or `undefined`.
fn invalid_view_boxes(markup: &str) -> Result<Vec<String>, RenderError> {
    let found = Rc::new(RefCell::new(Vec::new()));

    rewrite_str(
        markup,
        RewriteStrSettings {
            element_content_handlers: vec![element!("svg", {
                let found = Rc::clone(&found);
                move |el| {
                    if let Some(view_box) = el.get_attribute("viewBox")
                        && (view_box.contains("NaN") || view_box.contains("undefined"))
                    {
                        found.borrow_mut().push(view_box);
                    }
                    Ok(())
                }
            })],
            ..RewriteStrSettings::default()
        },
    )
    .map_err(|err| RenderError::Inspection {
        message: err.to_string(),
    })?;

    let view_boxes = found.borrow().clone();
    Ok(view_boxes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_one_enclosing_pair() {
        assert_eq!(strip_outer_delimiters("$x^2$"), "x^2");
        assert_eq!(strip_outer_delimiters("$$ x^2 $$"), "x^2");
        assert_eq!(strip_outer_delimiters(r"\[\frac{1}{2}\]"), r"\frac{1}{2}");
        assert_eq!(strip_outer_delimiters("2x + 5 = 15"), "2x + 5 = 15");
    }

    #[test]
    fn finds_nan_and_undefined_view_boxes() {
        let markup = concat!(
            r#"<span><svg viewBox="0 0 10 10"></svg></span>"#,
            r#"<svg viewBox="0 0 NaN 10"></svg>"#,
            r#"<svg viewBox="undefined 0 4 4"></svg>"#,
        );
        assert_eq!(
            invalid_view_boxes(markup).unwrap(),
            vec!["0 0 NaN 10".to_string(), "undefined 0 4 4".to_string()]
        );
    }

    #[test]
    fn markup_without_svg_is_valid() {
        assert!(invalid_view_boxes("<span>x</span>").unwrap().is_empty());
    }

    #[test]
    fn dollar_spans_become_engine_delimiters() {
        let rewritten = DISPLAY_DOLLARS.replace_all("$$a$$ ve $b$", r"\[${1}\]");
        let rewritten = INLINE_DOLLARS.replace_all(&rewritten, r"\(${1}\)");
        assert_eq!(rewritten, r"\[a\] ve \(b\)");
    }
}
