use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::error::{FormulaError, Result};
use crate::core::geometry::MergePolicy;

pub const DEFAULT_SYMBOL_PATTERN: &str = r"[=\^√∑∏∫∂∆π≈≠≤≥∞∩∪∈∉∀∃∅∇λμσαβγδεζηθφχψω]";

/// A lone capital P followed by a space, newline, parenthesis or `$`
/// (probability notation such as `P(A)`).
pub const DEFAULT_PROBABILITY_PATTERN: &str = r" P[ \n()$]";

pub fn default_hallucination_markers() -> Vec<String> {
    [
        "[MISSING_PAGE_POST]",
        "## References\n",
        "**Figure Captions**\n",
        "Footnote",
        r"\par\par\par",
        "## Chapter",
        "Fig.",
    ]
    .iter()
    .map(|marker| marker.to_string())
    .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FormulaConfig {
    /// Rasterization resolution for formula crops.
    pub dpi: u32,
    /// Groups whose source text is this long or longer are never recognized.
    pub max_source_chars: usize,
    /// Added to the source length to form the model's output budget.
    pub token_margin: usize,
    /// Added to `max_length_factor * source` to form the exclusive length cap.
    pub char_margin: usize,
    pub max_length_factor: f64,
    pub min_length_ratio: f64,
    pub hallucination_markers: Vec<String>,
    pub symbol_pattern: String,
    pub probability_pattern: String,
    pub merge: MergePolicy,
}

impl Default for FormulaConfig {
    fn default() -> Self {
        Self {
            dpi: 96,
            max_source_chars: 2000,
            token_margin: 50,
            char_margin: 100,
            max_length_factor: 2.0,
            min_length_ratio: 0.8,
            hallucination_markers: default_hallucination_markers(),
            symbol_pattern: DEFAULT_SYMBOL_PATTERN.to_string(),
            probability_pattern: DEFAULT_PROBABILITY_PATTERN.to_string(),
            merge: MergePolicy::default(),
        }
    }
}

impl FormulaConfig {
    pub fn from_path(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&data)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_dpi(mut self, dpi: u32) -> Self {
        self.dpi = dpi;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.dpi == 0 {
            return Err(FormulaError::Config("dpi must be positive".into()));
        }
        if !(0.0..=1.0).contains(&self.min_length_ratio) {
            return Err(FormulaError::Config(format!(
                "min_length_ratio must be within [0, 1], got {}",
                self.min_length_ratio
            )));
        }
        if self.max_length_factor <= 0.0 {
            return Err(FormulaError::Config(format!(
                "max_length_factor must be positive, got {}",
                self.max_length_factor
            )));
        }
        if self.hallucination_markers.iter().any(|m| m.is_empty()) {
            return Err(FormulaError::Config(
                "hallucination markers must not be empty strings".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RecognizerConfig {
    pub script_path: PathBuf,
    pub python: String,
    pub timeout_secs: u64,
    /// Hard upper bound on the model's output length.
    pub model_max_length: usize,
}

/// The `recognizer` section of a settings file; every other key belongs to
/// [`FormulaConfig`].
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RecognizerSection {
    recognizer: RecognizerConfig,
}

impl RecognizerConfig {
    /// Reads the `recognizer` section of the settings file at `path`,
    /// defaulting anything it leaves out.
    pub fn from_path(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)?;
        let section: RecognizerSection = serde_json::from_str(&data)?;
        section.recognizer.validate()?;
        Ok(section.recognizer)
    }

    pub fn validate(&self) -> Result<()> {
        if self.timeout_secs == 0 {
            return Err(FormulaError::Config("recognizer timeout_secs must be positive".into()));
        }
        if self.model_max_length == 0 {
            return Err(FormulaError::Config(
                "recognizer model_max_length must be positive".into(),
            ));
        }
        Ok(())
    }
}

impl Default for RecognizerConfig {
    fn default() -> Self {
        Self {
            script_path: PathBuf::from("recognizer/formula_bridge.py"),
            python: "python3".to_string(),
            timeout_secs: 120,
            model_max_length: 4096,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn partial_config_fills_defaults() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("formula.json");
        fs::write(&path, r#"{"dpi": 150, "merge": {"vertical_tolerance": 3.0}}"#)?;

        let config = FormulaConfig::from_path(&path)?;
        assert_eq!(config.dpi, 150);
        assert_eq!(config.max_source_chars, 2000);
        assert_eq!(config.merge.vertical_tolerance, 3.0);
        assert_eq!(config.merge.inline_tolerance, 5.0);
        assert_eq!(config.hallucination_markers, default_hallucination_markers());
        Ok(())
    }

    #[test]
    fn recognizer_section_shares_the_settings_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("settings.json");
        fs::write(
            &path,
            r#"{"dpi": 120, "recognizer": {"python": "/opt/venv/bin/python", "timeout_secs": 30}}"#,
        )?;

        assert_eq!(FormulaConfig::from_path(&path)?.dpi, 120);
        let recognizer = RecognizerConfig::from_path(&path)?;
        assert_eq!(recognizer.python, "/opt/venv/bin/python");
        assert_eq!(recognizer.timeout_secs, 30);
        assert_eq!(recognizer.model_max_length, 4096);
        assert_eq!(recognizer.script_path, RecognizerConfig::default().script_path);
        Ok(())
    }

    #[test]
    fn missing_recognizer_section_uses_defaults() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"dpi": 150}"#)?;
        assert_eq!(RecognizerConfig::from_path(&path)?, RecognizerConfig::default());
        Ok(())
    }

    #[test]
    fn rejects_zero_recognizer_timeout() {
        let config = RecognizerConfig {
            timeout_secs: 0,
            ..RecognizerConfig::default()
        };
        assert!(matches!(config.validate(), Err(FormulaError::Config(_))));
    }

    #[test]
    fn rejects_out_of_range_ratio() {
        let config = FormulaConfig {
            min_length_ratio: 1.5,
            ..FormulaConfig::default()
        };
        assert!(matches!(config.validate(), Err(FormulaError::Config(_))));
    }
}
