//! Formula region replacement.
//!
//! Each page runs through three stages: [`collect`] partitions the blocks into
//! pass-through blocks and formula groups, [`invoke`] renders, masks and
//! recognizes each eligible group, and [`gate`] plus [`splice`] decide whether
//! the recognized markup or the original blocks end up in the new page.

pub mod collect;
pub mod gate;
pub mod heuristics;
pub mod invoke;
pub mod mask;
pub mod splice;

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::config::FormulaConfig;
use crate::core::error::Result;
use crate::core::geometry::{BBox, MergePolicy};
use crate::core::model::{Document, Page};
use collect::{collect_runs, FormulaGroup, Run};
use gate::{AcceptanceGate, Verdict};
use heuristics::EquationDetector;
use invoke::{FormulaRecognizer, Rasterizer, RecognitionInvoker};
use splice::{recognized_block, splice_group, SpanIdAllocator};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaceStats {
    pub groups: usize,
    pub accepted: usize,
    pub rejected: usize,
    /// Groups too long to be worth a model call.
    pub skipped: usize,
    /// Groups whose rendering or recognition failed recoverably.
    pub failed: usize,
}

impl ReplaceStats {
    pub fn merge(&mut self, other: &ReplaceStats) {
        self.groups += other.groups;
        self.accepted += other.accepted;
        self.rejected += other.rejected;
        self.skipped += other.skipped;
        self.failed += other.failed;
    }
}

pub struct FormulaReplacer<R, M> {
    rasterizer: R,
    recognizer: M,
    detector: EquationDetector,
    gate: AcceptanceGate,
    merge: MergePolicy,
    dpi: u32,
    token_margin: usize,
}

impl<R: Rasterizer, M: FormulaRecognizer> FormulaReplacer<R, M> {
    pub fn new(rasterizer: R, recognizer: M, config: &FormulaConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            rasterizer,
            recognizer,
            detector: EquationDetector::from_config(config)?,
            gate: AcceptanceGate::from_config(config),
            merge: config.merge,
            dpi: config.dpi,
            token_margin: config.token_margin,
        })
    }

    /// Builds the replacement page for `page`. Recoverable failures restore the
    /// original blocks of the affected group; fatal ones abort the page.
    pub fn replace_page(&self, page: &Page, formula_boxes: &[BBox]) -> Result<(Page, ReplaceStats)> {
        let runs = collect_runs(&page.blocks, formula_boxes, &self.detector, &self.merge);
        let invoker =
            RecognitionInvoker::new(&self.rasterizer, &self.recognizer, self.dpi, self.token_margin);
        let mut span_ids = SpanIdAllocator::new(page.pnum);
        let mut stats = ReplaceStats::default();
        let mut blocks = Vec::with_capacity(page.blocks.len());

        for run in runs {
            let group = match run {
                Run::Pass(idx) => {
                    blocks.push(page.blocks[idx].clone());
                    continue;
                }
                Run::Group(group) => group,
            };
            stats.groups += 1;

            let replacement = self.resolve_group(&invoker, page.pnum, &group, &mut stats)?;
            let replacement =
                replacement.map(|text| recognized_block(page.pnum, group.bbox, text, span_ids.next_id()));
            splice_group(&mut blocks, &page.blocks, &group, replacement);
        }

        info!(
            pnum = page.pnum,
            groups = stats.groups,
            accepted = stats.accepted,
            blocks_in = page.blocks.len(),
            blocks_out = blocks.len(),
            "page formulas replaced"
        );
        Ok((page.with_blocks(blocks), stats))
    }

    /// Recognized text to splice in, or `None` to keep the originals.
    fn resolve_group(
        &self,
        invoker: &RecognitionInvoker<'_, R, M>,
        pnum: usize,
        group: &FormulaGroup,
        stats: &mut ReplaceStats,
    ) -> Result<Option<String>> {
        let source_len = group.char_len();
        if !self.gate.is_eligible(source_len) {
            debug!(pnum, source_len, "formula group too long, keeping originals");
            stats.skipped += 1;
            return Ok(None);
        }

        let candidate = match invoker.recognize_group(pnum, group) {
            Ok(text) => text,
            Err(err) if err.is_fatal() => return Err(err),
            Err(err) => {
                warn!(pnum, range = ?group.range, error = %err, "formula recognition failed");
                stats.failed += 1;
                return Ok(None);
            }
        };

        match self.gate.verdict(&group.text, &candidate) {
            Verdict::Accepted => {
                stats.accepted += 1;
                Ok(Some(candidate))
            }
            verdict => {
                debug!(pnum, range = ?group.range, ?verdict, "recognized formula rejected");
                stats.rejected += 1;
                Ok(None)
            }
        }
    }

    pub fn replace_document(&self, document: &Document) -> Result<(Document, ReplaceStats)> {
        let mut totals = ReplaceStats::default();
        let mut pages = Vec::with_capacity(document.pages.len());
        for page in &document.pages {
            let (new_page, stats) = self.replace_page(page, &formula_boxes_for(document, page))?;
            totals.merge(&stats);
            pages.push(new_page);
        }
        Ok((with_pages(document, pages), totals))
    }
}

impl<R, M> FormulaReplacer<R, M>
where
    R: Rasterizer + Sync,
    M: FormulaRecognizer + Sync,
{
    /// Same result as [`FormulaReplacer::replace_document`], with pages
    /// processed on the rayon pool.
    pub fn replace_document_parallel(&self, document: &Document) -> Result<(Document, ReplaceStats)> {
        let results = document
            .pages
            .par_iter()
            .map(|page| self.replace_page(page, &formula_boxes_for(document, page)))
            .collect::<Result<Vec<_>>>()?;

        let mut totals = ReplaceStats::default();
        let mut pages = Vec::with_capacity(results.len());
        for (page, stats) in results {
            totals.merge(&stats);
            pages.push(page);
        }
        Ok((with_pages(document, pages), totals))
    }
}

fn formula_boxes_for(document: &Document, page: &Page) -> Vec<BBox> {
    document
        .layout_for(page.pnum)
        .map(|layout| layout.formula_boxes())
        .unwrap_or_default()
}

fn with_pages(document: &Document, pages: Vec<Page>) -> Document {
    Document {
        pages,
        layouts: document.layouts.clone(),
    }
}
