use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

/// Any delimited math region: `$$…$$`, `$…$`, `\[…\]` or `\(…\)`, matched lazily.
pub(crate) static DELIMITED_MATH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)\$\$.*?\$\$|\$.*?\$|\\\[.*?\\\]|\\\(.*?\\\)").unwrap()
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SpanKind {
    Text,
    Latex,
}

/// One piece of mixed content. Latex spans carry the expression without its
/// delimiters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContentSpan {
    pub kind: SpanKind,
    pub text: String,
}

impl ContentSpan {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: SpanKind::Text,
            text: text.into(),
        }
    }

    pub fn latex(text: impl Into<String>) -> Self {
        Self {
            kind: SpanKind::Latex,
            text: text.into(),
        }
    }
}

/// Split content into alternating text and LaTeX spans in document order.
///
/// Whitespace-only text between matches is dropped, as are delimiter pairs
/// with nothing inside.
pub fn split_mixed_content(content: &str) -> Vec<ContentSpan> {
    let mut spans = Vec::new();
    let mut last_index = 0;

    for found in DELIMITED_MATH.find_iter(content) {
        push_text(&mut spans, &content[last_index..found.start()]);

        let latex = strip_delimiters(found.as_str()).trim();
        if !latex.is_empty() {
            spans.push(ContentSpan::latex(latex));
        }

        last_index = found.end();
    }

    push_text(&mut spans, &content[last_index..]);
    spans
}

fn push_text(spans: &mut Vec<ContentSpan>, text: &str) {
    if !text.trim().is_empty() {
        spans.push(ContentSpan::text(text));
    }
}

fn strip_delimiters(region: &str) -> &str {
    let inner = ["$$", "$", r"\[", r"\("]
        .iter()
        .find_map(|open| region.strip_prefix(open))
        .unwrap_or(region);

    ["$$", "$", r"\]", r"\)"]
        .iter()
        .find_map(|close| inner.strip_suffix(close))
        .unwrap_or(inner)
}
