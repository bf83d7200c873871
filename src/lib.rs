pub mod config;
pub mod core;
pub mod formula;
pub mod pipeline;
pub mod recognition;

pub use crate::config::{FormulaConfig, RecognizerConfig};
pub use crate::core::model::{Block, Document, Line, Page, PageLayout, Span};
pub use crate::formula::{FormulaReplacer, ReplaceStats};
