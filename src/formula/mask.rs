use image::{GrayImage, Luma, Rgba, RgbaImage};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;

use crate::core::error::{FormulaError, Result};
use crate::core::geometry::BBox;

const VISIBLE: Luma<u8> = Luma([255]);
const BLANK: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Whitens everything in `image` (a rendering of `outer`) that is not covered
/// by one of `inner`, so neighbouring content inside the clip cannot leak into
/// recognition.
pub fn mask_region(image: &RgbaImage, outer: &BBox, inner: &[BBox]) -> Result<RgbaImage> {
    if outer.is_degenerate() {
        return Err(FormulaError::Mask(format!("degenerate outer box {outer:?}")));
    }
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(FormulaError::Mask("empty image".into()));
    }

    let scale_x = width as f32 / outer.width();
    let scale_y = height as f32 / outer.height();

    let mut mask = GrayImage::new(width, height);
    for bbox in inner {
        if let Some(rect) = pixel_rect(bbox, outer, scale_x, scale_y, width, height) {
            draw_filled_rect_mut(&mut mask, rect, VISIBLE);
        }
    }

    let mut masked = image.clone();
    for (x, y, pixel) in masked.enumerate_pixels_mut() {
        if mask.get_pixel(x, y)[0] == 0 {
            *pixel = BLANK;
        }
    }
    Ok(masked)
}

fn pixel_rect(
    bbox: &BBox,
    outer: &BBox,
    scale_x: f32,
    scale_y: f32,
    width: u32,
    height: u32,
) -> Option<Rect> {
    let to_px = |value: f32, origin: f32, scale: f32, limit: u32| {
        (((value - origin) * scale).round()).clamp(0.0, limit as f32) as i32
    };
    let left = to_px(bbox.x0, outer.x0, scale_x, width);
    let right = to_px(bbox.x1, outer.x0, scale_x, width);
    let top = to_px(bbox.y0, outer.y0, scale_y, height);
    let bottom = to_px(bbox.y1, outer.y0, scale_y, height);

    let (w, h) = (right - left, bottom - top);
    (w > 0 && h > 0).then(|| Rect::at(left, top).of_size(w as u32, h as u32))
}
