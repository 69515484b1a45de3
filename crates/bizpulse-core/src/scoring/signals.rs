//! Implementation-complexity signals
//!
//! The default detector matches keywords in an insight's recommendation and
//! description. A structured detector can replace it through
//! [`ComplexitySignals`] without touching the scorer.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::models::Insight;

/// Something that makes an action easier or harder to carry out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplexitySignal {
    Integration,
    NewTooling,
    Training,
    Budget,
    LongTerm,
    Immediate,
}

impl ComplexitySignal {
    pub const ALL: [ComplexitySignal; 6] = [
        ComplexitySignal::Integration,
        ComplexitySignal::NewTooling,
        ComplexitySignal::Training,
        ComplexitySignal::Budget,
        ComplexitySignal::LongTerm,
        ComplexitySignal::Immediate,
    ];

    /// Adjustment to the implementation score
    pub fn delta(&self) -> f64 {
        match self {
            Self::Integration => -2.0,
            Self::NewTooling => -1.5,
            Self::Training => -1.0,
            Self::Budget => -1.5,
            Self::LongTerm => -1.0,
            Self::Immediate => 2.0,
        }
    }
}

/// Detects complexity signals for an insight
pub trait ComplexitySignals: Send + Sync {
    /// Each signal is reported at most once
    fn detect(&self, insight: &Insight) -> Vec<ComplexitySignal>;
}

static INTEGRATION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(integrat\w*|connect\w*|api|sync\w*)\b").expect("valid regex")
});
static TOOLING_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(new tool\w*|software|platform|install\w*|set up|setup)\b")
        .expect("valid regex")
});
static TRAINING_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(train\w*|hire|hiring|onboard\w*|staff)\b").expect("valid regex")
});
static BUDGET_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(budget\w*|invest\w*|ad spend|advertis\w*|paid)\b").expect("valid regex")
});
static LONG_TERM_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(long[- ]term|strateg\w*|over the next|quarters?)\b").expect("valid regex")
});
static IMMEDIATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(immediate\w*|today|right away|quick\w*|urgent\w*)\b").expect("valid regex")
});

/// Keyword matching over recommendation and description text
#[derive(Debug, Clone, Copy, Default)]
pub struct TextPatternSignals;

impl TextPatternSignals {
    fn pattern(signal: ComplexitySignal) -> &'static Regex {
        match signal {
            ComplexitySignal::Integration => &INTEGRATION_RE,
            ComplexitySignal::NewTooling => &TOOLING_RE,
            ComplexitySignal::Training => &TRAINING_RE,
            ComplexitySignal::Budget => &BUDGET_RE,
            ComplexitySignal::LongTerm => &LONG_TERM_RE,
            ComplexitySignal::Immediate => &IMMEDIATE_RE,
        }
    }

    pub fn detect_text(&self, text: &str) -> Vec<ComplexitySignal> {
        ComplexitySignal::ALL
            .into_iter()
            .filter(|signal| Self::pattern(*signal).is_match(text))
            .collect()
    }
}

impl ComplexitySignals for TextPatternSignals {
    fn detect(&self, insight: &Insight) -> Vec<ComplexitySignal> {
        let text = format!("{} {}", insight.recommendation, insight.description);
        self.detect_text(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detects_each_signal_once() {
        let signals = TextPatternSignals.detect_text(
            "Integrate the API and sync inventory; integration needs a new platform",
        );
        assert_eq!(
            signals,
            vec![ComplexitySignal::Integration, ComplexitySignal::NewTooling]
        );
    }

    #[test]
    fn test_case_insensitive() {
        let signals = TextPatternSignals.detect_text("Act IMMEDIATELY and review the Budget");
        assert!(signals.contains(&ComplexitySignal::Immediate));
        assert!(signals.contains(&ComplexitySignal::Budget));
    }

    #[test]
    fn test_plain_text_has_no_signals() {
        assert!(TextPatternSignals
            .detect_text("Review the product page copy")
            .is_empty());
    }

    #[test]
    fn test_long_term_variants() {
        for text in ["a long-term plan", "a long term plan", "the strategy", "next quarter"] {
            assert_eq!(
                TextPatternSignals.detect_text(text),
                vec![ComplexitySignal::LongTerm],
                "{}",
                text
            );
        }
    }
}
