use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::{FormulaConfig, DEFAULT_PROBABILITY_PATTERN, DEFAULT_SYMBOL_PATTERN};
use crate::core::error::{FormulaError, Result};

static DEFAULT_DETECTOR: Lazy<EquationDetector> = Lazy::new(|| EquationDetector {
    symbols: Regex::new(DEFAULT_SYMBOL_PATTERN).expect("static regex"),
    probability: Regex::new(DEFAULT_PROBABILITY_PATTERN).expect("static regex"),
});

/// Text fallback for the "contains an equation" test, used when no layout
/// formula box overlaps a block.
#[derive(Debug, Clone)]
pub struct EquationDetector {
    symbols: Regex,
    probability: Regex,
}

impl EquationDetector {
    pub fn new(symbol_pattern: &str, probability_pattern: &str) -> Result<Self> {
        let compile = |pattern: &str| {
            Regex::new(pattern)
                .map_err(|e| FormulaError::Config(format!("invalid pattern {pattern:?}: {e}")))
        };
        Ok(Self {
            symbols: compile(symbol_pattern)?,
            probability: compile(probability_pattern)?,
        })
    }

    pub fn from_config(config: &FormulaConfig) -> Result<Self> {
        Self::new(&config.symbol_pattern, &config.probability_pattern)
    }

    pub fn matches(&self, text: &str) -> bool {
        self.symbols.is_match(text) || self.probability.is_match(text)
    }
}

impl Default for EquationDetector {
    fn default() -> Self {
        DEFAULT_DETECTOR.clone()
    }
}
