//! Upstream render metadata attached to a solution payload.
//!
//! The LLM-backed solver may attach a `renderMetadata` object describing which
//! fields carry math, how complex the math is and which fields should render
//! first. Everything in it is optional; a payload without it is valid and the
//! renderer falls back to content heuristics.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::types::Strategy;

pub(crate) const HIGH_COMPLEXITY_BATCH_SIZE: usize = 2;
pub(crate) const MEDIUM_COMPLEXITY_BATCH_SIZE: usize = 4;
pub(crate) const LOW_COMPLEXITY_BATCH_SIZE: usize = 8;

/// Payload key holding the render metadata object.
pub const RENDER_METADATA_KEY: &str = "renderMetadata";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MathComplexity {
    Low,
    Medium,
    High,
    #[serde(rename = "none")]
    NoMath,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderTimeEstimate {
    Instant,
    Fast,
    Medium,
    Slow,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RenderHints {
    pub has_fractions: bool,
    pub has_exponents: bool,
    pub has_roots: bool,
    pub has_matrices: bool,
    pub has_equations: bool,
    pub estimated_render_time: Option<RenderTimeEstimate>,
}

/// Declared content type(s) of a field: either one strategy name or an ordered list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContentTypes {
    One(String),
    Many(Vec<String>),
}

impl ContentTypes {
    /// Resolve the declared names into strategies. Names outside the closed set
    /// resolve to [`Strategy::MixedContent`], the path that copes with anything.
    pub fn strategies(&self) -> Vec<Strategy> {
        let names: Vec<&str> = match self {
            ContentTypes::One(name) => vec![name.as_str()],
            ContentTypes::Many(names) => names.iter().map(String::as_str).collect(),
        };

        names
            .into_iter()
            .map(|name| {
                name.parse().unwrap_or_else(|err| {
                    warn!(
                        target = "domain::metadata",
                        error = %err,
                        "Unknown content type in render metadata, using mixed content"
                    );
                    Strategy::MixedContent
                })
            })
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RenderMetadata {
    pub math_complexity: Option<MathComplexity>,
    pub priority_elements: Vec<String>,
    pub content_types: BTreeMap<String, ContentTypes>,
    pub render_hints: Option<RenderHints>,
}

/// Per-field classification derived from [`RenderMetadata`].
#[derive(Debug, Clone, PartialEq)]
pub struct FieldTypeEntry {
    pub types: Vec<Strategy>,
    pub complexity: Option<MathComplexity>,
    pub hints: Option<RenderHints>,
    pub priority: bool,
}

impl FieldTypeEntry {
    /// First declared strategy; an empty declaration takes the mixed-content path.
    pub fn primary(&self) -> Strategy {
        self.types
            .first()
            .copied()
            .unwrap_or(Strategy::MixedContent)
    }
}

/// Scheduler knobs derived from the metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RenderTuning {
    pub batch_size: usize,
    pub advanced_math: bool,
}

impl RenderMetadata {
    /// Extract the metadata object from an upstream solution payload.
    ///
    /// Returns `None` when the key is absent, null, or does not deserialize.
    pub fn from_payload(payload: &serde_json::Value) -> Option<Self> {
        let raw = payload.get(RENDER_METADATA_KEY)?;
        if raw.is_null() {
            return None;
        }

        match serde_json::from_value(raw.clone()) {
            Ok(metadata) => Some(metadata),
            Err(err) => {
                warn!(
                    target = "domain::metadata",
                    error = %err,
                    "Malformed render metadata ignored"
                );
                None
            }
        }
    }

    pub fn is_priority(&self, field_name: &str) -> bool {
        self.priority_elements
            .iter()
            .any(|candidate| candidate == field_name)
    }

    /// Build one [`FieldTypeEntry`] per declared field.
    pub fn field_entries(&self) -> HashMap<String, FieldTypeEntry> {
        self.content_types
            .iter()
            .map(|(field, types)| {
                let entry = FieldTypeEntry {
                    types: types.strategies(),
                    complexity: self.math_complexity,
                    hints: self.render_hints.clone(),
                    priority: self.is_priority(field),
                };
                (field.clone(), entry)
            })
            .collect()
    }

    pub fn tuning(&self) -> RenderTuning {
        let estimate = self
            .render_hints
            .as_ref()
            .and_then(|hints| hints.estimated_render_time);

        let batch_size = match (self.math_complexity, estimate) {
            (Some(MathComplexity::High), _) | (_, Some(RenderTimeEstimate::Slow)) => {
                HIGH_COMPLEXITY_BATCH_SIZE
            }
            (Some(MathComplexity::Medium), _) | (_, Some(RenderTimeEstimate::Medium)) => {
                MEDIUM_COMPLEXITY_BATCH_SIZE
            }
            _ => LOW_COMPLEXITY_BATCH_SIZE,
        };

        let advanced_math = self
            .render_hints
            .as_ref()
            .is_some_and(|hints| hints.has_fractions || hints.has_matrices);

        RenderTuning {
            batch_size,
            advanced_math,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn sample_payload() -> serde_json::Value {
        json!({
            "problemOzeti": { "istenen": "x" },
            "renderMetadata": {
                "mathComplexity": "medium",
                "priorityElements": ["adimAciklamasi"],
                "contentTypes": {
                    "adimAciklamasi": ["inline_math", "text"],
                    "cozum_lateks": "pure_latex",
                    "ipucu": "sparkles"
                },
                "renderHints": {
                    "hasFractions": true,
                    "estimatedRenderTime": "fast"
                }
            }
        })
    }

    #[test]
    fn extracts_metadata_from_payload() {
        let metadata = RenderMetadata::from_payload(&sample_payload()).expect("metadata");
        assert_eq!(metadata.math_complexity, Some(MathComplexity::Medium));
        assert!(metadata.is_priority("adimAciklamasi"));
        assert!(!metadata.is_priority("ipucu"));
    }

    #[test]
    fn missing_or_malformed_metadata_is_none() {
        assert!(RenderMetadata::from_payload(&json!({ "adimlar": [] })).is_none());
        assert!(RenderMetadata::from_payload(&json!({ "renderMetadata": null })).is_none());
        assert!(
            RenderMetadata::from_payload(&json!({ "renderMetadata": { "mathComplexity": 3 } }))
                .is_none()
        );
    }

    #[test]
    fn field_entries_resolve_types_and_priority() {
        let metadata = RenderMetadata::from_payload(&sample_payload()).expect("metadata");
        let entries = metadata.field_entries();

        let step = &entries["adimAciklamasi"];
        assert_eq!(step.types, vec![Strategy::InlineMath, Strategy::Text]);
        assert_eq!(step.primary(), Strategy::InlineMath);
        assert!(step.priority);
        assert_eq!(step.complexity, Some(MathComplexity::Medium));

        assert_eq!(entries["cozum_lateks"].primary(), Strategy::PureLatex);
        assert_eq!(entries["ipucu"].primary(), Strategy::MixedContent);
    }

    #[test]
    fn empty_type_list_falls_back_to_mixed_content() {
        let entry = FieldTypeEntry {
            types: Vec::new(),
            complexity: None,
            hints: None,
            priority: false,
        };
        assert_eq!(entry.primary(), Strategy::MixedContent);
    }

    #[test]
    fn tuning_follows_complexity_and_estimate() {
        let mut metadata = RenderMetadata {
            math_complexity: Some(MathComplexity::High),
            ..Default::default()
        };
        assert_eq!(metadata.tuning().batch_size, HIGH_COMPLEXITY_BATCH_SIZE);

        metadata.math_complexity = Some(MathComplexity::Low);
        metadata.render_hints = Some(RenderHints {
            estimated_render_time: Some(RenderTimeEstimate::Slow),
            ..Default::default()
        });
        assert_eq!(metadata.tuning().batch_size, HIGH_COMPLEXITY_BATCH_SIZE);

        metadata.render_hints = None;
        metadata.math_complexity = Some(MathComplexity::Medium);
        assert_eq!(metadata.tuning().batch_size, MEDIUM_COMPLEXITY_BATCH_SIZE);

        metadata.math_complexity = Some(MathComplexity::NoMath);
        let tuning = metadata.tuning();
        assert_eq!(tuning.batch_size, LOW_COMPLEXITY_BATCH_SIZE);
        assert!(!tuning.advanced_math);
    }

    #[test]
    fn fractions_or_matrices_enable_advanced_math() {
        let metadata = RenderMetadata {
            render_hints: Some(RenderHints {
                has_matrices: true,
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(metadata.tuning().advanced_math);
    }
}
