use std::path::PathBuf;
use std::process::Command;

use image::RgbaImage;
use tracing::debug;

use crate::core::error::{FormulaError, Result};
use crate::core::geometry::BBox;
use crate::formula::invoke::Rasterizer;

/// PDF user space units per inch.
const POINTS_PER_INCH: f32 = 72.0;

/// Pixel crop `(x, y, width, height)` of `clip` rendered at `dpi`.
///
/// Both edges snap outward to whole pixels, so the crop spans exactly the
/// pixel columns and rows `clip` touches.
pub fn pixel_crop(clip: &BBox, dpi: u32) -> (u32, u32, u32, u32) {
    let scale = dpi as f32 / POINTS_PER_INCH;
    let span = |near: f32, far: f32| {
        let start = (near * scale).floor().max(0.0);
        let end = (far * scale).ceil().max(start);
        (start as u32, ((end - start) as u32).max(1))
    };
    let (x, w) = span(clip.x0, clip.x1);
    let (y, h) = span(clip.y0, clip.y1);
    (x, y, w, h)
}

/// Renders clipped page regions with poppler's `pdftoppm`.
#[derive(Debug, Clone)]
pub struct PdftoppmRasterizer {
    pdf_path: PathBuf,
}

impl PdftoppmRasterizer {
    pub fn new(pdf_path: PathBuf) -> Self {
        Self { pdf_path }
    }
}

impl Rasterizer for PdftoppmRasterizer {
    fn render(&self, pnum: usize, clip: &BBox, dpi: u32) -> Result<RgbaImage> {
        let render_err = |message: String| FormulaError::Render { pnum, message };
        let work_dir = tempfile::tempdir()?;

        // pdftoppm uses 1-based page indices
        let page_number = pnum + 1;
        let (x, y, w, h) = pixel_crop(clip, dpi);
        let prefix = work_dir.path().join("region");
        let prefix_str = prefix
            .to_str()
            .ok_or_else(|| render_err("non-UTF8 temp path not supported".into()))?;

        debug!(pnum, x, y, w, h, dpi, "rendering formula region");
        let status = Command::new("pdftoppm")
            .arg("-png")
            .arg("-singlefile")
            .arg("-r")
            .arg(dpi.to_string())
            .arg("-f")
            .arg(page_number.to_string())
            .arg("-l")
            .arg(page_number.to_string())
            .arg("-x")
            .arg(x.to_string())
            .arg("-y")
            .arg(y.to_string())
            .arg("-W")
            .arg(w.to_string())
            .arg("-H")
            .arg(h.to_string())
            .arg(&self.pdf_path)
            .arg(prefix_str)
            .status()
            .map_err(|e| render_err(format!("failed to invoke pdftoppm ({e}); is poppler-utils installed?")))?;

        if !status.success() {
            return Err(render_err(format!("pdftoppm failed with status: {status}")));
        }

        // -singlefile writes `<prefix>.png` without a page suffix
        let image_path = prefix.with_extension("png");
        if !image_path.exists() {
            return Err(render_err(format!(
                "expected rendered image not found: {}",
                image_path.display()
            )));
        }

        Ok(image::open(&image_path)?.to_rgba8())
    }
}
