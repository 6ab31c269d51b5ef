// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Adaptive preprocessing: binarization plus fixed-ratio upscaling for pages
// whose first recognition pass came back with low confidence.

use image::{DynamicImage, GrayImage, Luma};
use scanlayer_core::config::{BinarizationMode, ScanlayerConfig};
use tracing::{debug, info, instrument};

use crate::image::processor::ImageProcessor;

/// Produces the enhanced bitmap for the second recognition pass.
///
/// Greyscale, Lanczos upscale by `upscale_factor`, then a two-level
/// reduction chosen by `mode`. Deterministic and free of side effects.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Preprocessor {
    mode: BinarizationMode,
    upscale_factor: f64,
}

impl Preprocessor {
    pub fn new(mode: BinarizationMode, upscale_factor: f64) -> Self {
        Self {
            mode,
            upscale_factor,
        }
    }

    pub fn from_config(config: &ScanlayerConfig) -> Self {
        Self::new(config.binarization, config.upscale_factor)
    }

    /// Factor by which `enhance` enlarges the bitmap.
    pub fn upscale_factor(&self) -> f64 {
        self.upscale_factor
    }

    /// Binarize and upscale `image`. The input is left untouched.
    #[instrument(skip(self, image), fields(width = image.width(), height = image.height()))]
    pub fn enhance(&self, image: &DynamicImage) -> DynamicImage {
        let processor = ImageProcessor::from_dynamic(image.clone())
            .grayscale()
            .scale(self.upscale_factor);

        let binary = match self.mode {
            BinarizationMode::Fixed { level } => {
                let stretched = processor.autocontrast().into_dynamic().to_luma8();
                threshold_fixed(&stretched, level)
            }
            BinarizationMode::Otsu => {
                let gray = processor.into_dynamic().to_luma8();
                let level = otsu_threshold(&gray);
                debug!(level, "Otsu threshold computed");
                threshold_below(&gray, level)
            }
            BinarizationMode::Adaptive { window, bias } => {
                binarize_adaptive(&processor.into_dynamic().to_luma8(), window / 2, bias as i32)
            }
        };

        info!(
            mode = ?self.mode,
            out_w = binary.width(),
            out_h = binary.height(),
            "Enhanced bitmap ready"
        );
        DynamicImage::ImageLuma8(binary)
    }
}

/// Pixels brighter than `level` become white; everything else black.
fn threshold_fixed(gray: &GrayImage, level: u8) -> GrayImage {
    GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        let v = gray.get_pixel(x, y).0[0];
        Luma([if v > level { 255 } else { 0 }])
    })
}

/// Pixels below `level` become black; everything else white.
fn threshold_below(gray: &GrayImage, level: u8) -> GrayImage {
    GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        let v = gray.get_pixel(x, y).0[0];
        Luma([if v < level { 0 } else { 255 }])
    })
}

/// Local-mean thresholding: each pixel is compared with the mean of the
/// `(2r+1)²` window around it, minus `bias`.
fn binarize_adaptive(gray: &GrayImage, radius: u32, bias: i32) -> GrayImage {
    let sums = SummedArea::new(gray);
    GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        let level = (sums.window_mean(x, y, radius) as i32 - bias).clamp(0, 255);
        let v = gray.get_pixel(x, y).0[0] as i32;
        Luma([if v < level { 0 } else { 255 }])
    })
}

/// Summed-area table with a zero first row and column, so any window sum is
/// four lookups.
struct SummedArea {
    width: u32,
    height: u32,
    cells: Vec<u64>,
}

impl SummedArea {
    fn new(gray: &GrayImage) -> Self {
        let (width, height) = gray.dimensions();
        let stride = width as usize + 1;
        let mut cells = vec![0u64; stride * (height as usize + 1)];
        for (y, row) in gray.rows().enumerate() {
            let mut running = 0u64;
            for (x, pixel) in row.enumerate() {
                running += u64::from(pixel.0[0]);
                cells[(y + 1) * stride + x + 1] = cells[y * stride + x + 1] + running;
            }
        }
        Self { width, height, cells }
    }

    /// Sum over columns `[x0, x1)` and rows `[y0, y1)`.
    fn sum(&self, x0: usize, y0: usize, x1: usize, y1: usize) -> u64 {
        let stride = self.width as usize + 1;
        let at = |x: usize, y: usize| self.cells[y * stride + x];
        at(x1, y1) + at(x0, y0) - at(x0, y1) - at(x1, y0)
    }

    /// Mean over the window of `radius` around `(cx, cy)`, clipped to the image.
    fn window_mean(&self, cx: u32, cy: u32, radius: u32) -> f64 {
        let x0 = cx.saturating_sub(radius) as usize;
        let y0 = cy.saturating_sub(radius) as usize;
        let x1 = (cx.saturating_add(radius) as usize + 1).min(self.width as usize);
        let y1 = (cy.saturating_add(radius) as usize + 1).min(self.height as usize);
        let area = (x1.saturating_sub(x0) * y1.saturating_sub(y0)) as f64;
        if area == 0.0 {
            return 128.0;
        }
        self.sum(x0, y0, x1, y1) as f64 / area
    }
}

/// Threshold maximising the between-class variance of the luma histogram.
/// Pixels strictly below the returned value form the dark class.
fn otsu_threshold(gray: &GrayImage) -> u8 {
    let mut histogram = [0u64; 256];
    gray.pixels().for_each(|p| histogram[p.0[0] as usize] += 1);

    let total: u64 = histogram.iter().sum();
    if total == 0 {
        return 128;
    }
    let weighted_total: f64 = histogram.iter().enumerate().map(|(v, &n)| v as f64 * n as f64).sum();

    let (mut dark_count, mut dark_sum) = (0u64, 0.0f64);
    let (mut best, mut best_variance) = (128u8, 0.0f64);
    for (level, &count) in histogram.iter().enumerate() {
        dark_count += count;
        dark_sum += level as f64 * count as f64;
        let light_count = total - dark_count;
        if dark_count == 0 {
            continue;
        }
        if light_count == 0 {
            break;
        }
        let dark_mean = dark_sum / dark_count as f64;
        let light_mean = (weighted_total - dark_sum) / light_count as f64;
        let variance = dark_count as f64 * light_count as f64 * (dark_mean - light_mean).powi(2);
        if variance > best_variance {
            best_variance = variance;
            // `level` itself is still dark.
            best = (level + 1).min(255) as u8;
        }
    }
    best
}
