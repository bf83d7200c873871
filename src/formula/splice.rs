use crate::core::geometry::BBox;
use crate::core::model::{Block, BlockType, Line, Span};
use crate::formula::collect::FormulaGroup;

pub const RECOGNIZED_FONT: &str = "Latex";
const SPAN_ID_SUFFIX: &str = "fixeq";

/// Hands out `{pnum}_{counter}_fixeq` identifiers for one page.
#[derive(Debug)]
pub struct SpanIdAllocator {
    pnum: usize,
    next: usize,
}

impl SpanIdAllocator {
    pub fn new(pnum: usize) -> Self {
        Self { pnum, next: 0 }
    }

    pub fn next_id(&mut self) -> String {
        let id = format!("{}_{}_{}", self.pnum, self.next, SPAN_ID_SUFFIX);
        self.next += 1;
        id
    }
}

/// One block, one line, one span holding the recognized markup.
pub fn recognized_block(pnum: usize, bbox: BBox, text: String, span_id: String) -> Block {
    let span = Span {
        text,
        bbox,
        span_id,
        font: RECOGNIZED_FONT.to_string(),
        color: 0,
        block_type: Some(BlockType::Formula),
    };
    Block {
        bbox,
        lines: vec![Line {
            spans: vec![span],
            bbox,
        }],
        pnum,
        block_type: Some(BlockType::Formula),
    }
}

/// Appends either the replacement block or the group's original blocks.
pub fn splice_group(
    out: &mut Vec<Block>,
    originals: &[Block],
    group: &FormulaGroup,
    replacement: Option<Block>,
) {
    match replacement {
        Some(block) => out.push(block),
        None => out.extend(originals[group.range.clone()].iter().cloned()),
    }
}
