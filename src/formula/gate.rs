use crate::config::FormulaConfig;

/// Outcome of validating a recognition candidate against its source text.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Accepted,
    Empty,
    Hallucinated(String),
    TooLong { len: usize, limit: usize },
    TooShort { len: usize, minimum: usize },
}

impl Verdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Accepted)
    }
}

/// Rejects empty, runaway, truncated or marker-bearing model output.
#[derive(Debug, Clone)]
pub struct AcceptanceGate {
    markers: Vec<String>,
    max_length_factor: f64,
    char_margin: usize,
    min_length_ratio: f64,
    max_source_chars: usize,
}

impl AcceptanceGate {
    pub fn from_config(config: &FormulaConfig) -> Self {
        Self {
            markers: config.hallucination_markers.clone(),
            max_length_factor: config.max_length_factor,
            char_margin: config.char_margin,
            min_length_ratio: config.min_length_ratio,
            max_source_chars: config.max_source_chars,
        }
    }

    /// Whether a group with `source_len` characters is worth a model call.
    pub fn is_eligible(&self, source_len: usize) -> bool {
        source_len < self.max_source_chars
    }

    pub fn verdict(&self, source: &str, candidate: &str) -> Verdict {
        if candidate.is_empty() {
            return Verdict::Empty;
        }
        if let Some(marker) = self.markers.iter().find(|m| candidate.contains(m.as_str())) {
            return Verdict::Hallucinated(marker.clone());
        }

        let source_len = source.chars().count();
        let len = candidate.chars().count();

        let limit = (self.max_length_factor * source_len as f64) as usize + self.char_margin;
        if len >= limit {
            return Verdict::TooLong { len, limit };
        }
        if (len as f64) < self.min_length_ratio * source_len as f64 {
            let minimum = (self.min_length_ratio * source_len as f64).ceil() as usize;
            return Verdict::TooShort { len, minimum };
        }
        Verdict::Accepted
    }
}

impl Default for AcceptanceGate {
    fn default() -> Self {
        Self::from_config(&FormulaConfig::default())
    }
}
