//! KaTeX-backed typesetting engine.
//!
//! KaTeX is compiled into the binary, so there is no loader to inject and the
//! engine reports ready as soon as it is configured. Typesetting replaces each
//! delimited expression in the element's markup with KaTeX HTML.

use std::sync::Mutex;

use async_trait::async_trait;
use katex::{OptsBuilder, OutputType};
use tracing::debug;

use crate::application::render::{EngineConfig, ReadyHook, TypesetError, TypesettingEngine};
use crate::cache::lock::mutex_lock;
use crate::config::FontCache;
use crate::domain::dom::RenderElement;

const TARGET: &str = "infra::katex";

#[derive(Default)]
pub struct KatexEngine {
    config: Mutex<Option<EngineConfig>>,
}

impl KatexEngine {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TypesettingEngine for KatexEngine {
    fn loader_present(&self) -> bool {
        true
    }

    fn configure(&self, config: &EngineConfig, ready: ReadyHook) -> Result<(), TypesetError> {
        if !(config.min_scale > 0.0 && config.min_scale <= config.scale) {
            return Err(TypesetError::Configuration {
                message: format!(
                    "scale {} outside the supported range (minimum {})",
                    config.scale, config.min_scale
                ),
            });
        }
        if config.font_cache != FontCache::Global || config.automatic_linebreaks {
            debug!(
                target = TARGET,
                font_cache = ?config.font_cache,
                automatic_linebreaks = config.automatic_linebreaks,
                "KaTeX ignores font cache and linebreak settings"
            );
        }

        *mutex_lock(&self.config, TARGET, "configure") = Some(config.clone());
        ready.signal_ready();
        Ok(())
    }

    fn inject_loader(&self) -> Result<(), TypesetError> {
        Ok(())
    }

    async fn typeset(&self, element: &dyn RenderElement) -> Result<(), TypesetError> {
        let config = mutex_lock(&self.config, TARGET, "typeset")
            .clone()
            .ok_or(TypesetError::NotReady)?;

        let rendered = typeset_markup(&element.markup(), &config)?;
        element.set_markup(&rendered);
        Ok(())
    }
}

/// Replace every delimited expression in `markup` with KaTeX output.
///
/// Display delimiters are tried before inline ones so `$$` is never read as
/// two empty `$` pairs. With escape processing on, `\$` yields a literal `$`.
pub(crate) fn typeset_markup(markup: &str, config: &EngineConfig) -> Result<String, TypesetError> {
    let delimiters: Vec<(&str, &str, bool)> = config
        .display_delimiters
        .iter()
        .map(|(open, close)| (open.as_str(), close.as_str(), true))
        .chain(
            config
                .inline_delimiters
                .iter()
                .map(|(open, close)| (open.as_str(), close.as_str(), false)),
        )
        .collect();

    let mut output = String::with_capacity(markup.len());
    let mut rest = markup;

    'scan: while let Some(ch) = rest.chars().next() {
        if config.process_escapes && rest.starts_with(r"\$") {
            output.push('$');
            rest = &rest[2..];
            continue;
        }

        for (open, close, display_mode) in &delimiters {
            let Some(after_open) = rest.strip_prefix(open) else {
                continue;
            };
            let Some(end) = after_open.find(close) else {
                continue;
            };

            let expression = after_open[..end].trim();
            if !expression.is_empty() {
                output.push_str(&render_expression(expression, *display_mode, config.scale)?);
            }
            rest = &after_open[end + close.len()..];
            continue 'scan;
        }

        output.push(ch);
        rest = &rest[ch.len_utf8()..];
    }

    Ok(output)
}

fn render_expression(
    expression: &str,
    display_mode: bool,
    scale: f64,
) -> Result<String, TypesetError> {
    let mut builder = OptsBuilder::default();
    builder.display_mode(display_mode);
    builder.output_type(OutputType::Html);
    builder.throw_on_error(true);

    let opts = builder
        .build()
        .map_err(|err| TypesetError::engine(format!("failed to build KaTeX options: {err}")))?;

    let html = katex::render_with_opts(expression, opts)
        .map_err(|err| TypesetError::engine(format!("KaTeX rendering failed: {err}")))?;

    if (scale - 1.0).abs() < f64::EPSILON {
        Ok(html)
    } else {
        Ok(format!(r#"<span style="font-size: {scale}em">{html}</span>"#))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_inline_and_display_regions() {
        let config = EngineConfig::default();
        let html = typeset_markup(r"Sonuç \(x^2\) ve \[\frac{1}{2}\]", &config).unwrap();

        assert!(html.starts_with("Sonuç "));
        assert!(html.contains("katex"));
        assert!(html.contains("katex-display"));
        assert!(!html.contains(r"\frac"));
    }

    #[test]
    fn escaped_dollar_stays_literal() {
        let config = EngineConfig::default();
        assert_eq!(
            typeset_markup(r"fiyat \$5", &config).unwrap(),
            "fiyat $5"
        );
    }

    #[test]
    fn unbalanced_delimiter_is_copied_verbatim() {
        let config = EngineConfig::default();
        assert_eq!(typeset_markup("5 $ kalem", &config).unwrap(), "5 $ kalem");
    }

    #[test]
    fn parse_errors_are_engine_errors() {
        let config = EngineConfig::default();
        let err = typeset_markup(r"\(\frac{1}{\)", &config).unwrap_err();
        assert!(matches!(err, TypesetError::Engine { .. }));
    }
}
