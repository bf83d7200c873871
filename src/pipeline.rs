use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::config::{FormulaConfig, RecognizerConfig};
use crate::core::model::Document;
use crate::formula::collect::{collect_runs, FormulaGroup, Run};
use crate::formula::heuristics::EquationDetector;
use crate::formula::{FormulaReplacer, ReplaceStats};
use crate::recognition::{PdftoppmRasterizer, ScriptRecognizer};

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub layout: PathBuf,
    pub pdf: PathBuf,
    pub output: PathBuf,
    pub formula: FormulaConfig,
    pub recognizer: RecognizerConfig,
    pub parallel: bool,
}

impl PipelineConfig {
    pub fn new(layout: PathBuf, pdf: PathBuf, output: PathBuf) -> Self {
        Self {
            layout,
            pdf,
            output,
            formula: FormulaConfig::default(),
            recognizer: RecognizerConfig::default(),
            parallel: false,
        }
    }
}

pub fn load_document(path: &Path) -> Result<Document> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("failed to read layout file {}", path.display()))?;
    serde_json::from_str(&data)
        .with_context(|| format!("failed to parse layout JSON {}", path.display()))
}

pub fn build_document(config: &PipelineConfig) -> Result<(Document, ReplaceStats)> {
    let document = load_document(&config.layout)?;
    let replacer = FormulaReplacer::new(
        PdftoppmRasterizer::new(config.pdf.clone()),
        ScriptRecognizer::new(config.recognizer.clone()),
        &config.formula,
    )?;

    let result = if config.parallel {
        replacer.replace_document_parallel(&document)
    } else {
        replacer.replace_document(&document)
    };
    result.with_context(|| format!("formula replacement failed for {}", config.pdf.display()))
}

pub fn export_document(document: &Document, output: &Path) -> Result<()> {
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let data = serde_json::to_string_pretty(document)?;
    fs::write(output, data)?;
    Ok(())
}

/// Formula groups per page, without rendering or recognition.
pub fn scan_document(document: &Document, config: &FormulaConfig) -> Result<Vec<(usize, Vec<FormulaGroup>)>> {
    let detector = EquationDetector::from_config(config)?;
    let pages = document
        .pages
        .iter()
        .map(|page| {
            let formula_boxes = document
                .layout_for(page.pnum)
                .map(|layout| layout.formula_boxes())
                .unwrap_or_default();
            let groups = collect_runs(&page.blocks, &formula_boxes, &detector, &config.merge)
                .into_iter()
                .filter_map(|run| match run {
                    Run::Group(group) => Some(group),
                    Run::Pass(_) => None,
                })
                .collect();
            (page.pnum, groups)
        })
        .collect();
    Ok(pages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    use crate::core::geometry::BBox;
    use crate::core::model::{Block, BlockType, LayoutRegion, Line, Page, PageLayout, Span};

    fn text_block(text: &str, bbox: BBox) -> Block {
        Block {
            bbox,
            lines: vec![Line {
                spans: vec![Span {
                    text: text.to_string(),
                    bbox,
                    span_id: "0_0".to_string(),
                    font: "Times".to_string(),
                    color: 0,
                    block_type: None,
                }],
                bbox,
            }],
            pnum: 0,
            block_type: Some(BlockType::Text),
        }
    }

    fn sample_document() -> Document {
        Document {
            pages: vec![Page {
                pnum: 0,
                width: 612.0,
                height: 792.0,
                blocks: vec![
                    text_block("Intro", BBox::new(50.0, 50.0, 300.0, 70.0)),
                    text_block("integral", BBox::new(50.0, 200.0, 300.0, 220.0)),
                ],
            }],
            layouts: vec![PageLayout {
                pnum: 0,
                regions: vec![LayoutRegion {
                    bbox: BBox::new(60.0, 205.0, 200.0, 215.0),
                    label: BlockType::Formula,
                }],
            }],
        }
    }

    #[test]
    fn scan_reports_groups_per_page() -> Result<()> {
        let scanned = scan_document(&sample_document(), &FormulaConfig::default())?;
        assert_eq!(scanned.len(), 1);
        let (pnum, groups) = &scanned[0];
        assert_eq!(*pnum, 0);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].range, 1..2);
        Ok(())
    }

    #[test]
    fn export_then_load_keeps_document() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("nested").join("document.json");
        let document = sample_document();

        export_document(&document, &path)?;
        let loaded = load_document(&path)?;
        assert_eq!(loaded.pages, document.pages);
        assert_eq!(loaded.layouts, document.layouts);
        Ok(())
    }
}
