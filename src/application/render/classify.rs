//! Content classification: decides which render path a string takes.
//!
//! Decision order, first match wins:
//! 1. element carries the `latex-content` marker;
//! 2. the inferred field name has a declared type in the render metadata;
//! 3. a cached decision exists for the content hash;
//! 4. the text/LaTeX heuristic, whose result is cached.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

use crate::cache::{ClassificationStore, ContentKey};
use crate::domain::{
    dom::{ElementMarkers, attributes, markers},
    types::{DecisionSource, RenderDecision, Strategy},
};

use super::normalize::normalize_content;
use super::split::DELIMITED_MATH;
use super::stats::RenderStats;

/// Upstream payload field names.
pub mod fields {
    pub const STEP_DESCRIPTION: &str = "adimAciklamasi";
    pub const SOLUTION_LATEX: &str = "cozum_lateks";
    pub const HINT: &str = "ipucu";
    pub const ERROR_EXPLANATION: &str = "hataAciklamasi";
    pub const RESULT_CHECK: &str = "sonucKontrolu";
    pub const OPTION_TEXT: &str = "metin_lateks";
}

/// Identifier/class fragments mapped to the field they display. Checked in order.
const FIELD_PATTERNS: [(&str, &str); 8] = [
    ("interactive-step-desc", fields::STEP_DESCRIPTION),
    ("step-description", fields::STEP_DESCRIPTION),
    ("solution-latex", fields::SOLUTION_LATEX),
    ("latex-content", fields::SOLUTION_LATEX),
    ("hint-content", fields::HINT),
    ("error-explanation", fields::ERROR_EXPLANATION),
    ("result-check", fields::RESULT_CHECK),
    ("option-text", fields::OPTION_TEXT),
];

const FIELD_CONTAINERS: [&str; 3] = [
    markers::SOLUTION_STEP,
    markers::INTERACTIVE_WORKSPACE,
    markers::OPTION_LABEL,
];

static NUMBERS_ONLY: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9\s+\-=()]+$").unwrap());
pub(crate) static LATEX_COMMAND: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\[a-zA-Z]+|\^|_|\{|\}").unwrap());
static LETTER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\p{L}").unwrap());
static SIGNIFICANT_TEXT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s\p{L}{3,}").unwrap());

pub struct ContentClassifier {
    store: Arc<ClassificationStore>,
    stats: Arc<RenderStats>,
    slow_analysis: Duration,
}

impl ContentClassifier {
    pub fn new(
        store: Arc<ClassificationStore>,
        stats: Arc<RenderStats>,
        slow_analysis: Duration,
    ) -> Self {
        Self {
            store,
            stats,
            slow_analysis,
        }
    }

    pub fn classify<E>(&self, element: &E, content: &str) -> RenderDecision
    where
        E: ElementMarkers + ?Sized,
    {
        let started = Instant::now();

        if element.has_marker(markers::LATEX_CONTENT) {
            return RenderDecision::new(Strategy::PureLatex, 1.0, DecisionSource::CssClass)
                .with_display_mode(true);
        }

        if let Some(field_name) = infer_field_name(element)
            && let Some(entry) = self.store.field_type(&field_name)
        {
            self.stats.record_metadata_hit();
            let strategy = entry.primary();
            let mut decision = RenderDecision::new(strategy, 1.0, DecisionSource::ApiMetadata)
                .with_display_mode(strategy == Strategy::PureLatex);
            decision.complexity = entry.complexity;
            decision.priority = entry.priority;
            decision.hints = entry.hints;
            return decision;
        }

        let normalized = normalize_content(content);
        let key = ContentKey::of(&normalized);
        if let Some(cached) = self.store.cached_decision(key) {
            return cached;
        }

        self.stats.record_metadata_miss();
        let decision = analyze_content(&normalized);
        self.store.cache_decision(key, decision.clone());

        let elapsed = started.elapsed();
        if elapsed > self.slow_analysis {
            warn!(
                target = "application::render::classify",
                elapsed_ms = elapsed.as_secs_f64() * 1000.0,
                "Slow content analysis"
            );
        }

        decision
    }
}

/// Heuristic classification of normalized content.
pub fn analyze_content(content: &str) -> RenderDecision {
    if content.chars().count() < 2 {
        return RenderDecision::new(Strategy::Text, 1.0, DecisionSource::EmptyContent);
    }

    if NUMBERS_ONLY.is_match(content) {
        return RenderDecision::new(Strategy::PureLatex, 0.9, DecisionSource::NumbersOnly);
    }

    let has_delimiters = DELIMITED_MATH.is_match(content);
    let has_latex_commands = LATEX_COMMAND.is_match(content);
    let has_text = LETTER.is_match(content);

    match (has_delimiters, has_latex_commands, has_text) {
        (false, false, true) => RenderDecision::new(Strategy::Text, 0.95, DecisionSource::TextOnly),
        (_, true, false) => {
            RenderDecision::new(Strategy::PureLatex, 0.9, DecisionSource::LatexOnly)
        }
        (true, _, true) => {
            RenderDecision::new(Strategy::InlineMath, 0.85, DecisionSource::DelimitedMixed)
        }
        (false, true, true) => {
            RenderDecision::new(Strategy::MixedContent, 0.7, DecisionSource::ComplexMixed)
        }
        _ => RenderDecision::new(Strategy::Text, 0.5, DecisionSource::FallbackDefault),
    }
}

/// Prose disguised as LaTeX: a whitespace followed by a run of three letters.
pub fn has_significant_text(content: &str) -> bool {
    SIGNIFICANT_TEXT.is_match(content)
}

/// Re-route `pure_latex` decisions whose content reads as prose to the
/// mixed-content path.
pub fn apply_defensive_override(decision: RenderDecision, content: &str) -> RenderDecision {
    if decision.strategy == Strategy::PureLatex && has_significant_text(content) {
        warn!(
            target = "application::render::classify",
            preview = %preview(content),
            "pure_latex decision overridden to mixed_content: content contains prose"
        );
        return decision.into_defensive_override();
    }
    decision
}

/// Map an element to the upstream field it displays, if any.
pub fn infer_field_name<E>(element: &E) -> Option<String>
where
    E: ElementMarkers + ?Sized,
{
    if let Some(field) = element.attribute(attributes::FIELD)
        && !field.is_empty()
    {
        return Some(field);
    }

    let id = element.id().unwrap_or_default();
    let own = element.own_markers();
    let matches_pattern =
        |pattern: &str| id.contains(pattern) || own.iter().any(|marker| marker.contains(pattern));
    if let Some((_, field)) = FIELD_PATTERNS
        .iter()
        .find(|(pattern, _)| matches_pattern(pattern))
    {
        return Some((*field).to_string());
    }

    let is_container = |set: &crate::domain::dom::MarkerSet| {
        FIELD_CONTAINERS
            .iter()
            .any(|container| set.contains(*container))
    };
    let nearest = if is_container(&own) {
        Some(own.clone())
    } else {
        element.ancestor_markers().into_iter().find(is_container)
    };
    let container = nearest?;

    if own.contains(markers::STEP_DESCRIPTION) {
        return Some(fields::STEP_DESCRIPTION.to_string());
    }
    if own.contains(markers::LATEX_CONTENT) {
        return Some(fields::SOLUTION_LATEX.to_string());
    }
    if own.contains(markers::SMART_CONTENT) {
        if container.contains(markers::INTERACTIVE_WORKSPACE) {
            return Some(fields::STEP_DESCRIPTION.to_string());
        }
        if container.contains(markers::OPTION_LABEL) {
            return Some(fields::OPTION_TEXT.to_string());
        }
    }

    None
}

pub(crate) fn preview(content: &str) -> String {
    content.chars().take(50).collect()
}
