//! Shared render enumerations and the classifier's decision record.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::metadata::{MathComplexity, RenderHints};

/// Render path chosen for a piece of content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Text,
    PureLatex,
    InlineMath,
    MixedContent,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Text => "text",
            Strategy::PureLatex => "pure_latex",
            Strategy::InlineMath => "inline_math",
            Strategy::MixedContent => "mixed_content",
        }
    }

    /// Marker attached to an element after a successful render through this path.
    pub fn rendered_marker(&self) -> String {
        format!("rendered-{}", self.as_str())
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown render strategy `{0}`")]
pub struct UnknownStrategy(pub String);

impl FromStr for Strategy {
    type Err = UnknownStrategy;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "text" => Ok(Strategy::Text),
            "pure_latex" => Ok(Strategy::PureLatex),
            "inline_math" => Ok(Strategy::InlineMath),
            "mixed_content" => Ok(Strategy::MixedContent),
            other => Err(UnknownStrategy(other.to_string())),
        }
    }
}

/// Provenance of a [`RenderDecision`], kept for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionSource {
    CssClass,
    ApiMetadata,
    EmptyContent,
    NumbersOnly,
    TextOnly,
    LatexOnly,
    DelimitedMixed,
    ComplexMixed,
    FallbackDefault,
    DefensiveOverride,
}

/// Output of the content classifier. Display mode is only ever set for
/// [`Strategy::PureLatex`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderDecision {
    pub strategy: Strategy,
    pub confidence: f32,
    pub source: DecisionSource,
    pub display_mode: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub complexity: Option<MathComplexity>,
    pub priority: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hints: Option<RenderHints>,
}

impl RenderDecision {
    pub fn new(strategy: Strategy, confidence: f32, source: DecisionSource) -> Self {
        Self {
            strategy,
            confidence: confidence.clamp(0.0, 1.0),
            source,
            display_mode: false,
            complexity: None,
            priority: false,
            hints: None,
        }
    }

    pub fn with_display_mode(mut self, display_mode: bool) -> Self {
        self.display_mode = display_mode && self.strategy == Strategy::PureLatex;
        self
    }

    /// Re-route a decision to the mixed-content path, dropping display mode.
    pub fn into_defensive_override(mut self) -> Self {
        self.strategy = Strategy::MixedContent;
        self.source = DecisionSource::DefensiveOverride;
        self.display_mode = false;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy_round_trips_through_str() {
        for strategy in [
            Strategy::Text,
            Strategy::PureLatex,
            Strategy::InlineMath,
            Strategy::MixedContent,
        ] {
            assert_eq!(strategy.as_str().parse::<Strategy>(), Ok(strategy));
        }
        assert!("svg".parse::<Strategy>().is_err());
    }

    #[test]
    fn display_mode_is_dropped_for_non_latex_strategies() {
        let decision = RenderDecision::new(Strategy::Text, 1.0, DecisionSource::CssClass)
            .with_display_mode(true);
        assert!(!decision.display_mode);

        let decision = RenderDecision::new(Strategy::PureLatex, 1.0, DecisionSource::CssClass)
            .with_display_mode(true);
        assert!(decision.display_mode);
        assert!(!decision.into_defensive_override().display_mode);
    }

    #[test]
    fn rendered_marker_uses_snake_case_name() {
        assert_eq!(Strategy::InlineMath.rendered_marker(), "rendered-inline_math");
    }
}
