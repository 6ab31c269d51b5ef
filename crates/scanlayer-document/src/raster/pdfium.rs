// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Full-fidelity rasterizer backed by the pdfium native library. Built with
// the default `pdfium` feature; the library itself is bound at runtime.

use std::path::{Path, PathBuf};

use image::DynamicImage;
use pdfium_render::prelude::{PdfRenderConfig, Pdfium};
use scanlayer_core::error::{Result, ScanlayerError};
use scanlayer_core::types::PageGeometry;
use tracing::{debug, info, instrument};

use super::PageRasterizer;
use crate::pdf::source::SourceDocument;

/// Path to the pdfium shared library, or a directory containing it.
pub const ENV_PDFIUM_LIB: &str = "SCANLAYER_PDFIUM_LIB";

pub struct PdfiumRasterizer {
    pdfium: Pdfium,
}

impl PdfiumRasterizer {
    /// Bind pdfium from `SCANLAYER_PDFIUM_LIB`, next to the executable, the
    /// working directory, or the system library path, in that order.
    pub fn new() -> Result<Self> {
        let mut candidates: Vec<PathBuf> = Vec::new();
        if let Some(configured) = std::env::var_os(ENV_PDFIUM_LIB).map(PathBuf::from) {
            if configured.is_dir() {
                candidates.push(Pdfium::pdfium_platform_library_name_at_path(&configured));
            } else {
                candidates.push(configured);
            }
        }
        if let Some(dir) = std::env::current_exe().ok().and_then(|exe| exe.parent().map(Path::to_path_buf)) {
            candidates.push(Pdfium::pdfium_platform_library_name_at_path(&dir));
        }
        candidates.push(Pdfium::pdfium_platform_library_name_at_path(Path::new(".")));

        for path in &candidates {
            if let Ok(bindings) = Pdfium::bind_to_library(path) {
                info!(library = %path.display(), "pdfium bound");
                return Ok(Self {
                    pdfium: Pdfium::new(bindings),
                });
            }
        }
        let bindings = Pdfium::bind_to_system_library().map_err(|err| {
            ScanlayerError::Config(format!(
                "pdfium library not found ({err}); set {ENV_PDFIUM_LIB} or place {} next to the executable",
                Pdfium::pdfium_platform_library_name().to_string_lossy()
            ))
        })?;
        info!("pdfium bound from system library path");
        Ok(Self {
            pdfium: Pdfium::new(bindings),
        })
    }
}

impl PageRasterizer for PdfiumRasterizer {
    #[instrument(skip(self, source), fields(backend = "pdfium"))]
    fn render(&self, source: &SourceDocument, index: usize, dpi: u32) -> Result<(DynamicImage, PageGeometry)> {
        let render_error = |message: String| ScanlayerError::PageRender { page: index, message };

        let (width_pt, height_pt) = source.page_size(index)?;
        let geometry = PageGeometry::at_dpi(index, width_pt, height_pt, dpi);
        let page_index = u16::try_from(index).map_err(|_| render_error("page index exceeds pdfium limits".into()))?;

        let document = self
            .pdfium
            .load_pdf_from_byte_slice(source.raw_bytes(), source.password())
            .map_err(|err| render_error(format!("pdfium could not open the document: {err}")))?;
        let page = document
            .pages()
            .get(page_index)
            .map_err(|err| render_error(format!("pdfium could not load the page: {err}")))?;

        let config = PdfRenderConfig::new()
            .set_target_width(geometry.width_px as i32)
            .set_target_height(geometry.height_px as i32)
            .render_form_data(true)
            .render_annotations(true);
        let bitmap = page
            .render_with_config(&config)
            .map_err(|err| render_error(format!("pdfium render failed: {err}")))?;

        let image = DynamicImage::ImageRgb8(bitmap.as_image().to_rgb8());
        debug!(width = image.width(), height = image.height(), "Page rendered by pdfium");
        Ok((image, geometry))
    }

    fn name(&self) -> &'static str {
        "pdfium"
    }
}
