use serde::{Deserialize, Serialize};

use crate::core::geometry::BBox;
use crate::formula::heuristics::EquationDetector;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum BlockType {
    Text,
    Title,
    Formula,
    Table,
    Figure,
    Caption,
    Footnote,
    ListItem,
    PageHeader,
    PageFooter,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Document {
    pub pages: Vec<Page>,
    #[serde(default)]
    pub layouts: Vec<PageLayout>,
}

impl Document {
    /// Layout for `pnum`, if upstream classification produced one.
    pub fn layout_for(&self, pnum: usize) -> Option<&PageLayout> {
        self.layouts.iter().find(|layout| layout.pnum == pnum)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Page {
    pub pnum: usize,
    #[serde(default)]
    pub width: f32,
    #[serde(default)]
    pub height: f32,
    pub blocks: Vec<Block>,
}

impl Page {
    /// A page with the same identity and dimensions holding `blocks`.
    pub fn with_blocks(&self, blocks: Vec<Block>) -> Self {
        Self {
            pnum: self.pnum,
            width: self.width,
            height: self.height,
            blocks,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Block {
    pub bbox: BBox,
    pub lines: Vec<Line>,
    pub pnum: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_type: Option<BlockType>,
}

impl Block {
    pub fn prelim_text(&self) -> String {
        self.lines
            .iter()
            .map(Line::text)
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn contains_equation(&self, formula_boxes: &[BBox], detector: &EquationDetector) -> bool {
        formula_boxes.iter().any(|bbox| bbox.intersects(&self.bbox))
            || detector.matches(&self.prelim_text())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Line {
    pub spans: Vec<Span>,
    pub bbox: BBox,
}

impl Line {
    pub fn text(&self) -> String {
        self.spans.iter().map(|span| span.text.as_str()).collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Span {
    pub text: String,
    pub bbox: BBox,
    pub span_id: String,
    #[serde(default)]
    pub font: String,
    #[serde(default)]
    pub color: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_type: Option<BlockType>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LayoutRegion {
    pub bbox: BBox,
    pub label: BlockType,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct PageLayout {
    pub pnum: usize,
    pub regions: Vec<LayoutRegion>,
}

impl PageLayout {
    pub fn formula_boxes(&self) -> Vec<BBox> {
        self.regions
            .iter()
            .filter(|region| region.label == BlockType::Formula)
            .map(|region| region.bbox)
            .collect()
    }
}
