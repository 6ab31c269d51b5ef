// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image processor: greyscale, scaling, contrast stretch, PNG output. Operates
// on in-memory page bitmaps using the `image` crate.

use std::path::Path;

use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, ImageFormat, Luma};
use scanlayer_core::error::{Result, ScanlayerError};
use tracing::{debug, instrument};

/// Image processing steps on a single in-memory bitmap.
///
/// Each method consumes `self` and returns a new `ImageProcessor` wrapping
/// the transformed image, so steps chain:
///
/// ```ignore
/// ImageProcessor::from_dynamic(page)
///     .grayscale()
///     .scale(1.5)
///     .autocontrast()
///     .save_png(&scratch)?;
/// ```
pub struct ImageProcessor {
    image: DynamicImage,
}

impl ImageProcessor {
    pub fn from_dynamic(image: DynamicImage) -> Self {
        Self { image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn into_dynamic(self) -> DynamicImage {
        self.image
    }

    /// Convert to 8-bit luma.
    pub fn grayscale(self) -> Self {
        Self {
            image: DynamicImage::ImageLuma8(self.image.to_luma8()),
        }
    }

    /// Resize to exactly `width` x `height` with Lanczos3 filtering.
    pub fn resize_exact(self, width: u32, height: u32) -> Self {
        let resized = self
            .image
            .resize_exact(width.max(1), height.max(1), FilterType::Lanczos3);
        Self { image: resized }
    }

    /// Scale both dimensions by `factor` (rounded to whole pixels).
    #[instrument(skip(self), fields(factor))]
    pub fn scale(self, factor: f64) -> Self {
        let (w, h) = scaled_dimensions(self.width(), self.height(), factor);
        if (w, h) == (self.width(), self.height()) {
            return self;
        }
        debug!(from_w = self.width(), from_h = self.height(), to_w = w, to_h = h, "Scaling image");
        self.resize_exact(w, h)
    }

    /// Stretch the luma range so the darkest pixel becomes 0 and the
    /// brightest 255. A flat image is returned unchanged (as luma).
    pub fn autocontrast(self) -> Self {
        let gray = self.image.to_luma8();
        let (lo, hi) = luma_range(&gray);
        if hi <= lo {
            return Self {
                image: DynamicImage::ImageLuma8(gray),
            };
        }

        let span = (hi - lo) as f32;
        let stretched = GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
            let v = gray.get_pixel(x, y).0[0];
            let out = ((v - lo) as f32 * 255.0 / span).round();
            Luma([out.clamp(0.0, 255.0) as u8])
        });
        Self {
            image: DynamicImage::ImageLuma8(stretched),
        }
    }

    /// Write the image as PNG to `path`.
    pub fn save_png(&self, path: &Path) -> Result<()> {
        self.image
            .save_with_format(path, ImageFormat::Png)
            .map_err(|err| {
                ScanlayerError::Image(format!("failed to save image to {}: {err}", path.display()))
            })
    }
}

/// Target size after scaling by `factor`, never below 1x1.
pub fn scaled_dimensions(width: u32, height: u32, factor: f64) -> (u32, u32) {
    let w = (width as f64 * factor).round().max(1.0) as u32;
    let h = (height as f64 * factor).round().max(1.0) as u32;
    (w, h)
}

fn luma_range(gray: &GrayImage) -> (u8, u8) {
    gray.pixels()
        .fold((u8::MAX, u8::MIN), |(lo, hi), p| (lo.min(p.0[0]), hi.max(p.0[0])))
}
