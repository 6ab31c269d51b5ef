// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Bitmap pixel space to PDF point space.
//
// Every word box goes through `to_page_space`, whichever recognition pass
// produced it.

use scanlayer_core::types::{PixelBox, PointBox};

/// Map `bbox` from recognized-bitmap pixels to page points.
///
/// * `bitmap` is the size of the *original* page bitmap in pixels.
/// * `page` is the page size in points.
/// * `upscale` is how much larger the recognized bitmap was than the
///   original (1.0 for the first pass).
///
/// The y axis is flipped (pixels grow downward, points upward) and the
/// result is clipped to the page.
pub fn to_page_space(bbox: &PixelBox, bitmap: (u32, u32), page: (f64, f64), upscale: f64) -> PointBox {
    let (bw, bh) = (bitmap.0.max(1) as f64, bitmap.1.max(1) as f64);
    let (pw, ph) = page;
    let inv = if upscale > 0.0 && upscale.is_finite() { 1.0 / upscale } else { 1.0 };
    let sx = pw / bw;
    let sy = ph / bh;

    let left = bbox.left * inv * sx;
    let right = bbox.right() * inv * sx;
    let top = ph - bbox.top * inv * sy;
    let bottom = ph - bbox.bottom() * inv * sy;

    let x0 = left.min(right).clamp(0.0, pw);
    let x1 = left.max(right).clamp(0.0, pw);
    let y0 = bottom.min(top).clamp(0.0, ph);
    let y1 = bottom.max(top).clamp(0.0, ph);

    PointBox {
        x: x0,
        y: y0,
        width: x1 - x0,
        height: y1 - y0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LETTER: (f64, f64) = (612.0, 792.0);
    const BITMAP_300: (u32, u32) = (2550, 3300);

    fn close(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() <= tol
    }

    #[test]
    fn unscaled_box_maps_with_flip() {
        let b = to_page_space(&PixelBox::new(300.0, 300.0, 600.0, 100.0), BITMAP_300, LETTER, 1.0);
        let k = 72.0 / 300.0;
        assert!(close(b.x, 300.0 * k, 1e-9));
        assert!(close(b.width, 600.0 * k, 1e-9));
        assert!(close(b.y, 792.0 - 400.0 * k, 1e-9));
        assert!(close(b.height, 100.0 * k, 1e-9));
    }

    #[test]
    fn enhanced_box_lands_where_original_does() {
        let original = PixelBox::new(123.0, 456.0, 78.0, 40.0);
        let enhanced = PixelBox::new(123.0 * 1.5, 456.0 * 1.5, 78.0 * 1.5, 40.0 * 1.5);
        let a = to_page_space(&original, BITMAP_300, LETTER, 1.0);
        let b = to_page_space(&enhanced, BITMAP_300, LETTER, 1.5);
        // One pixel at 300 DPI is 0.24 pt.
        let px = 72.0 / 300.0;
        assert!(close(a.x, b.x, px));
        assert!(close(a.y, b.y, px));
        assert!(close(a.width, b.width, px));
        assert!(close(a.height, b.height, px));
    }

    #[test]
    fn rounding_in_enhanced_pass_stays_within_a_pixel() {
        // Enhanced boxes come back in whole pixels of the upscaled bitmap.
        let original = PixelBox::new(101.0, 37.0, 55.0, 21.0);
        let enhanced = PixelBox::new(
            (101.0f64 * 1.5).round(),
            (37.0f64 * 1.5).round(),
            (55.0f64 * 1.5).round(),
            (21.0f64 * 1.5).round(),
        );
        let a = to_page_space(&original, BITMAP_300, LETTER, 1.0);
        let b = to_page_space(&enhanced, BITMAP_300, LETTER, 1.5);
        let px = 72.0 / 300.0;
        assert!(close(a.x, b.x, px) && close(a.top(), b.top(), px));
        assert!(close(a.right(), b.right(), px) && close(a.y, b.y, px));
    }

    #[test]
    fn boxes_are_clipped_to_page() {
        let wild = PixelBox::new(-50.0, 3200.0, 3000.0, 400.0);
        let b = to_page_space(&wild, BITMAP_300, LETTER, 1.0);
        assert!(b.x >= 0.0 && b.right() <= LETTER.0);
        assert!(b.y >= 0.0 && b.top() <= LETTER.1);
    }

    #[test]
    fn non_uniform_scale_uses_each_axis() {
        // 100x50 pt page rendered to a 200x200 bitmap.
        let b = to_page_space(&PixelBox::new(100.0, 100.0, 50.0, 50.0), (200, 200), (100.0, 50.0), 1.0);
        assert!(close(b.x, 50.0, 1e-9));
        assert!(close(b.width, 25.0, 1e-9));
        assert!(close(b.height, 12.5, 1e-9));
        assert!(close(b.y, 12.5, 1e-9));
    }
}
