use image::RgbaImage;
use tracing::debug;

use crate::core::error::{FormulaError, RecognitionError, Result};
use crate::core::geometry::BBox;
use crate::formula::collect::FormulaGroup;
use crate::formula::mask::mask_region;

/// Renders a clipped region of a page to a bitmap.
pub trait Rasterizer {
    fn render(&self, pnum: usize, clip: &BBox, dpi: u32) -> Result<RgbaImage>;
}

/// Image-to-markup recognition model.
///
/// The output budget is passed per call; implementations must not keep it as
/// shared mutable state.
pub trait FormulaRecognizer {
    /// Ranked candidates, best first.
    fn recognize(
        &self,
        image: &RgbaImage,
        max_output_len: usize,
    ) -> std::result::Result<Vec<String>, RecognitionError>;

    /// Absolute maximum output length the model supports.
    fn max_output_len(&self) -> usize;
}

impl<T: FormulaRecognizer + ?Sized> FormulaRecognizer for &T {
    fn recognize(
        &self,
        image: &RgbaImage,
        max_output_len: usize,
    ) -> std::result::Result<Vec<String>, RecognitionError> {
        (**self).recognize(image, max_output_len)
    }

    fn max_output_len(&self) -> usize {
        (**self).max_output_len()
    }
}

pub fn token_budget(source_len: usize, margin: usize, model_max: usize) -> usize {
    (source_len + margin).min(model_max)
}

pub struct RecognitionInvoker<'a, R, M> {
    rasterizer: &'a R,
    recognizer: &'a M,
    dpi: u32,
    token_margin: usize,
}

impl<'a, R: Rasterizer, M: FormulaRecognizer> RecognitionInvoker<'a, R, M> {
    pub fn new(rasterizer: &'a R, recognizer: &'a M, dpi: u32, token_margin: usize) -> Self {
        Self {
            rasterizer,
            recognizer,
            dpi,
            token_margin,
        }
    }

    /// First candidate for `group`, or the empty string when the model
    /// returned none.
    pub fn recognize_group(&self, pnum: usize, group: &FormulaGroup) -> Result<String> {
        if group.bbox.is_degenerate() {
            return Err(FormulaError::InvalidGeometry {
                pnum,
                bbox: group.bbox,
            });
        }

        let rendered = self.rasterizer.render(pnum, &group.bbox, self.dpi)?;
        let masked = mask_region(&rendered, &group.bbox, &group.boxes)?;
        let budget = token_budget(
            group.char_len(),
            self.token_margin,
            self.recognizer.max_output_len(),
        );
        debug!(
            pnum,
            blocks = group.boxes.len(),
            width = masked.width(),
            height = masked.height(),
            budget,
            "recognizing formula region"
        );

        let candidates = self.recognizer.recognize(&masked, budget)?;
        Ok(candidates.into_iter().next().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    struct BlankRasterizer;

    impl Rasterizer for BlankRasterizer {
        fn render(&self, _pnum: usize, clip: &BBox, _dpi: u32) -> Result<RgbaImage> {
            Ok(RgbaImage::from_pixel(
                clip.width() as u32,
                clip.height() as u32,
                Rgba([0, 0, 0, 255]),
            ))
        }
    }

    struct RecordingRecognizer {
        budgets: Mutex<Vec<usize>>,
        candidates: Vec<String>,
    }

    impl FormulaRecognizer for RecordingRecognizer {
        fn recognize(
            &self,
            _image: &RgbaImage,
            max_output_len: usize,
        ) -> std::result::Result<Vec<String>, RecognitionError> {
            self.budgets.lock().unwrap().push(max_output_len);
            Ok(self.candidates.clone())
        }

        fn max_output_len(&self) -> usize {
            120
        }
    }

    fn group(text: &str, bbox: BBox) -> FormulaGroup {
        FormulaGroup {
            range: 0..1,
            bbox,
            text: text.to_string(),
            boxes: vec![bbox],
        }
    }

    #[test]
    fn budget_is_clamped_to_model_max() {
        assert_eq!(token_budget(10, 50, 4096), 60);
        assert_eq!(token_budget(4090, 50, 4096), 4096);
    }

    #[test]
    fn passes_budget_and_returns_first_candidate() -> Result<()> {
        let recognizer = RecordingRecognizer {
            budgets: Mutex::new(Vec::new()),
            candidates: vec!["x^2".to_string(), "x2".to_string()],
        };
        let invoker = RecognitionInvoker::new(&BlankRasterizer, &recognizer, 96, 50);

        let text = invoker.recognize_group(0, &group("x 2", BBox::new(0.0, 0.0, 20.0, 10.0)))?;
        assert_eq!(text, "x^2");

        let long = "a".repeat(100);
        invoker.recognize_group(0, &group(&long, BBox::new(0.0, 0.0, 20.0, 10.0)))?;
        assert_eq!(*recognizer.budgets.lock().unwrap(), vec![53, 120]);
        Ok(())
    }

    #[test]
    fn borrowed_recognizer_is_shared_between_invokers() -> Result<()> {
        let recognizer = RecordingRecognizer {
            budgets: Mutex::new(Vec::new()),
            candidates: vec!["q".to_string()],
        };
        let shared = &recognizer;
        let first = RecognitionInvoker::new(&BlankRasterizer, &shared, 96, 50);
        let second = RecognitionInvoker::new(&BlankRasterizer, &shared, 96, 10);

        first.recognize_group(0, &group("q", BBox::new(0.0, 0.0, 8.0, 8.0)))?;
        second.recognize_group(1, &group("q", BBox::new(0.0, 0.0, 8.0, 8.0)))?;
        assert_eq!(*recognizer.budgets.lock().unwrap(), vec![51, 11]);
        Ok(())
    }

    #[test]
    fn no_candidates_yield_empty_text() -> Result<()> {
        let recognizer = RecordingRecognizer {
            budgets: Mutex::new(Vec::new()),
            candidates: Vec::new(),
        };
        let invoker = RecognitionInvoker::new(&BlankRasterizer, &recognizer, 96, 50);
        let text = invoker.recognize_group(0, &group("y", BBox::new(0.0, 0.0, 8.0, 8.0)))?;
        assert_eq!(text, "");
        Ok(())
    }

    #[test]
    fn degenerate_region_never_reaches_the_model() {
        let recognizer = RecordingRecognizer {
            budgets: Mutex::new(Vec::new()),
            candidates: vec!["z".to_string()],
        };
        let invoker = RecognitionInvoker::new(&BlankRasterizer, &recognizer, 96, 50);
        let result = invoker.recognize_group(3, &group("z", BBox::new(4.0, 4.0, 4.0, 9.0)));
        assert!(matches!(
            result,
            Err(FormulaError::InvalidGeometry { pnum: 3, .. })
        ));
        assert!(recognizer.budgets.lock().unwrap().is_empty());
    }
}
