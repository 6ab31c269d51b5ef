// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page rasterizer: one PDF page to one bitmap at a requested resolution.

use image::DynamicImage;
use scanlayer_core::error::Result;
use scanlayer_core::types::PageGeometry;
use tracing::warn;

use crate::pdf::source::SourceDocument;

#[cfg(feature = "pdfium")]
pub mod pdfium;
pub mod xobject;

#[cfg(feature = "pdfium")]
pub use pdfium::PdfiumRasterizer;
pub use xobject::XObjectRasterizer;

/// Renders pages of a loaded document.
///
/// The returned bitmap is `geometry.width_px` x `geometry.height_px` pixels,
/// already turned upright according to the page's `/Rotate`. Errors are
/// `PageRender` for the page in question.
pub trait PageRasterizer: Send + Sync {
    fn render(&self, source: &SourceDocument, index: usize, dpi: u32) -> Result<(DynamicImage, PageGeometry)>;

    /// Backend name for logs and reports.
    fn name(&self) -> &'static str;
}

/// The rasterizer used when none is configured explicitly: pdfium when the
/// library binds, the embedded-image rasterizer otherwise.
pub fn default_rasterizer() -> Box<dyn PageRasterizer> {
    #[cfg(feature = "pdfium")]
    let preferred = PdfiumRasterizer::new().map(|r| Box::new(r) as Box<dyn PageRasterizer>);
    #[cfg(not(feature = "pdfium"))]
    let preferred = Err(scanlayer_core::error::ScanlayerError::Config("built without the pdfium feature".into()));
    or_embedded_images(preferred)
}

fn or_embedded_images(preferred: Result<Box<dyn PageRasterizer>>) -> Box<dyn PageRasterizer> {
    match preferred {
        Ok(rasterizer) => rasterizer,
        Err(err) => {
            warn!(error = %err, "pdfium unavailable; using embedded-image rasterizer");
            Box::new(XObjectRasterizer::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use scanlayer_core::error::ScanlayerError;

    use super::*;

    struct Fixed;

    impl PageRasterizer for Fixed {
        fn render(&self, _: &SourceDocument, index: usize, _: u32) -> Result<(DynamicImage, PageGeometry)> {
            Err(ScanlayerError::PageRender { page: index, message: "unused".into() })
        }

        fn name(&self) -> &'static str {
            "fixed"
        }
    }

    #[test]
    fn bound_backend_is_kept() {
        assert_eq!(or_embedded_images(Ok(Box::new(Fixed))).name(), "fixed");
    }

    #[test]
    fn unbound_backend_falls_back_to_embedded_images() {
        let err = ScanlayerError::Config("library missing".into());
        assert_eq!(or_embedded_images(Err(err)).name(), "xobject");
    }

    #[test]
    fn default_rasterizer_always_has_a_backend() {
        let name = default_rasterizer().name();
        assert!(name == "pdfium" || name == "xobject", "{name}");
    }
}
