use std::ops::Range;

use crate::core::geometry::{BBox, MergePolicy};
use crate::core::model::Block;
use crate::formula::heuristics::EquationDetector;

/// A contiguous run of blocks submitted to recognition as one region.
#[derive(Debug, Clone, PartialEq)]
pub struct FormulaGroup {
    pub range: Range<usize>,
    pub bbox: BBox,
    pub text: String,
    /// Boxes of the constituent blocks, in page order; only these stay
    /// visible when the region is masked.
    pub boxes: Vec<BBox>,
}

impl FormulaGroup {
    fn seed(index: usize, block: &Block) -> Self {
        Self {
            range: index..index + 1,
            bbox: block.bbox,
            text: block.prelim_text(),
            boxes: vec![block.bbox],
        }
    }

    fn absorb_before(&mut self, block: &Block) {
        self.range.start -= 1;
        self.bbox = block.bbox.union(&self.bbox);
        self.text = format!("{} {}", block.prelim_text(), self.text);
        self.boxes.insert(0, block.bbox);
    }

    fn absorb_after(&mut self, block: &Block) {
        self.range.end += 1;
        self.bbox = self.bbox.union(&block.bbox);
        self.text.push(' ');
        self.text.push_str(&block.prelim_text());
        self.boxes.push(block.bbox);
    }

    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Run {
    Pass(usize),
    Group(FormulaGroup),
}

/// Partitions `blocks` into pass-through blocks and maximal formula groups,
/// preserving page order.
pub fn collect_runs(
    blocks: &[Block],
    formula_boxes: &[BBox],
    detector: &EquationDetector,
    policy: &MergePolicy,
) -> Vec<Run> {
    let is_equation = |block: &Block| block.contains_equation(formula_boxes, detector);
    let mut runs: Vec<Run> = Vec::with_capacity(blocks.len());
    let mut i = 0;

    while i < blocks.len() {
        if !is_equation(&blocks[i]) {
            runs.push(Run::Pass(i));
            i += 1;
            continue;
        }

        let mut group = FormulaGroup::seed(i, &blocks[i]);

        // Only the pass-through tail directly before the seed can be pulled
        // back in; blocks inside an earlier group stay where they are.
        while let Some(Run::Pass(prev)) = runs.last() {
            let prev = *prev;
            if prev + 1 != group.range.start {
                break;
            }
            let block = &blocks[prev];
            if !(is_equation(block) || policy.should_merge(&block.bbox, &group.bbox)) {
                break;
            }
            runs.pop();
            group.absorb_before(block);
        }

        while let Some(block) = blocks.get(group.range.end) {
            if !(is_equation(block) || policy.should_merge(&group.bbox, &block.bbox)) {
                break;
            }
            group.absorb_after(block);
        }

        i = group.range.end;
        runs.push(Run::Group(group));
    }

    runs
}
