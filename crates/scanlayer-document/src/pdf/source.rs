// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Source PDF handle: load (optionally decrypting), page lookup, page size
// and rotation with inheritance through the page tree.

use std::sync::Arc;

use lopdf::{Dictionary, Document, Object, ObjectId};
use scanlayer_core::error::{Result, ScanlayerError};
use tracing::{debug, info, instrument};

use super::crypt;

/// Fallback page size (US Letter) when a page carries no usable MediaBox.
pub const DEFAULT_PAGE_SIZE: (f64, f64) = (612.0, 792.0);

/// Inheritance through `/Parent` stops after this many hops.
const MAX_TREE_DEPTH: usize = 64;

/// Read-only view of the input PDF.
pub struct SourceDocument {
    document: Document,
    page_ids: Vec<ObjectId>,
    raw: Arc<[u8]>,
    password: Option<String>,
}

impl SourceDocument {
    /// Load a PDF already in memory. An encrypted document is opened with
    /// `password`, or with the empty user password when none is given.
    /// `password` is ignored for a document that is not encrypted.
    #[instrument(skip_all, fields(bytes_len = data.len()))]
    pub fn from_bytes(data: &[u8], password: Option<&str>) -> Result<Self> {
        let mut document = crypt::parse(data)?;
        if document.is_encrypted() {
            document = crypt::decrypt(document, data, password.unwrap_or_default())?;
            info!("Encrypted input opened");
        }

        let page_ids: Vec<ObjectId> = document.get_pages().values().copied().collect();
        debug!(pages = page_ids.len(), "PDF loaded");
        Ok(Self {
            document,
            page_ids,
            raw: Arc::from(data),
            password: password.map(str::to_owned),
        })
    }

    /// The file as it was loaded, still encrypted if it was.
    pub fn raw_bytes(&self) -> &[u8] {
        &self.raw
    }

    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    pub fn page_count(&self) -> usize {
        self.page_ids.len()
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Object id of the page at 0-based `index`.
    pub fn page_id(&self, index: usize) -> Result<ObjectId> {
        self.page_ids
            .get(index)
            .copied()
            .ok_or_else(|| ScanlayerError::PageRender {
                page: index,
                message: format!(
                    "page index out of range (document has {} pages)",
                    self.page_ids.len()
                ),
            })
    }

    pub fn page_dictionary(&self, index: usize) -> Result<&Dictionary> {
        let id = self.page_id(index)?;
        self.document
            .get_dictionary(id)
            .map_err(|err| ScanlayerError::PageRender {
                page: index,
                message: format!("page object unreadable: {err}"),
            })
    }

    /// Page size in points as displayed, i.e. width and height swapped for
    /// pages rotated by 90 or 270 degrees.
    pub fn page_size(&self, index: usize) -> Result<(f64, f64)> {
        let (w, h) = self.media_size(index)?;
        Ok(match self.rotation(index)? {
            90 | 270 => (h, w),
            _ => (w, h),
        })
    }

    /// Unrotated MediaBox size in points.
    pub fn media_size(&self, index: usize) -> Result<(f64, f64)> {
        let page = self.page_dictionary(index)?;
        let size = self
            .inherited(page, b"MediaBox")
            .and_then(|obj| rect(&self.document, obj))
            .map(|[x0, y0, x1, y1]| ((x1 - x0).abs(), (y1 - y0).abs()))
            .filter(|(w, h)| *w > 0.0 && *h > 0.0)
            .unwrap_or(DEFAULT_PAGE_SIZE);
        Ok(size)
    }

    /// Lower-left corner of the MediaBox; content coordinates are relative to it.
    pub fn media_origin(&self, index: usize) -> Result<(f64, f64)> {
        let page = self.page_dictionary(index)?;
        Ok(self
            .inherited(page, b"MediaBox")
            .and_then(|obj| rect(&self.document, obj))
            .map(|[x0, y0, x1, y1]| (x0.min(x1), y0.min(y1)))
            .unwrap_or((0.0, 0.0)))
    }

    /// `/Rotate` normalised to 0, 90, 180 or 270.
    pub fn rotation(&self, index: usize) -> Result<u32> {
        let page = self.page_dictionary(index)?;
        let raw = self
            .inherited(page, b"Rotate")
            .and_then(|obj| number(&self.document, obj))
            .unwrap_or(0.0) as i64;
        Ok((((raw / 90) * 90).rem_euclid(360)) as u32)
    }

    /// Page `/Resources`, following `/Parent` when not set on the page.
    pub fn resources(&self, index: usize) -> Result<Option<&Dictionary>> {
        let page = self.page_dictionary(index)?;
        Ok(self
            .inherited(page, b"Resources")
            .and_then(|obj| resolve(&self.document, obj).as_dict().ok()))
    }

    /// Decoded content stream bytes of the page.
    pub fn content(&self, index: usize) -> Result<Vec<u8>> {
        let id = self.page_id(index)?;
        self.document
            .get_page_content(id)
            .map_err(|err| ScanlayerError::PageRender {
                page: index,
                message: format!("content stream unreadable: {err}"),
            })
    }

    fn inherited<'a>(&'a self, page: &'a Dictionary, key: &[u8]) -> Option<&'a Object> {
        let mut current = page;
        for _ in 0..MAX_TREE_DEPTH {
            if let Ok(value) = current.get(key) {
                return Some(value);
            }
            let parent = current.get(b"Parent").ok()?;
            current = resolve(&self.document, parent).as_dict().ok()?;
        }
        None
    }
}

/// Follow a reference (one level deep is all PDF allows in practice).
pub(crate) fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        other => other,
    }
}

/// Integer or real number value.
pub(crate) fn number(doc: &Document, obj: &Object) -> Option<f64> {
    match resolve(doc, obj) {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(*r as f64),
        _ => None,
    }
}

fn rect(doc: &Document, obj: &Object) -> Option<[f64; 4]> {
    let array = resolve(doc, obj).as_array().ok()?;
    if array.len() != 4 {
        return None;
    }
    let mut out = [0.0; 4];
    for (slot, value) in out.iter_mut().zip(array) {
        *slot = number(doc, value)?;
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use lopdf::dictionary;

    use super::super::unlock::fixtures::{CONTENT, encrypted_pdf_bytes};
    use super::*;

    fn two_page_pdf() -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let content_id = doc.add_object(lopdf::Stream::new(dictionary! {}, b"q Q".to_vec()));
        let first = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        let second = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 300.into(), Object::Real(200.5)],
            "Rotate" => 90_i64,
            "Contents" => content_id,
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![Object::Reference(first), Object::Reference(second)],
                "Count" => 2_i64,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
                "Resources" => dictionary! {},
            }),
        );
        let catalog = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
        doc.trailer.set("Root", catalog);
        let mut buf = Vec::new();
        doc.save_to(&mut buf).unwrap();
        buf
    }

    #[test]
    fn page_size_is_inherited_from_tree() {
        let src = SourceDocument::from_bytes(&two_page_pdf(), None).unwrap();
        assert_eq!(src.page_count(), 2);
        assert_eq!(src.page_size(0).unwrap(), (595.0, 842.0));
        assert!(src.resources(0).unwrap().is_some());
    }

    #[test]
    fn rotation_swaps_displayed_size() {
        let src = SourceDocument::from_bytes(&two_page_pdf(), None).unwrap();
        assert_eq!(src.rotation(1).unwrap(), 90);
        assert_eq!(src.page_size(1).unwrap(), (200.5, 300.0));
        assert_eq!(src.media_size(1).unwrap(), (300.0, 200.5));
    }

    #[test]
    fn out_of_range_page_is_render_error() {
        let src = SourceDocument::from_bytes(&two_page_pdf(), None).unwrap();
        let err = src.page_size(7).unwrap_err();
        assert!(matches!(err, ScanlayerError::PageRender { page: 7, .. }));
    }

    #[test]
    fn garbage_is_pdf_error() {
        let err = SourceDocument::from_bytes(b"not a pdf", None).err().unwrap();
        assert!(matches!(err, ScanlayerError::Pdf(_)));
    }

    #[test]
    fn encrypted_input_keeps_its_pages() {
        let data = encrypted_pdf_bytes(b"secret");
        let src = SourceDocument::from_bytes(&data, Some("secret")).unwrap();
        assert_eq!(src.page_count(), 1);
        assert_eq!(src.page_size(0).unwrap(), (612.0, 792.0));
        assert_eq!(src.content(0).unwrap(), CONTENT);
        // The rasterizer still sees the file as supplied.
        assert_eq!(src.raw_bytes(), data.as_slice());
        assert_eq!(src.password(), Some("secret"));
    }

    #[test]
    fn encrypted_input_without_password_is_rejected() {
        let data = encrypted_pdf_bytes(b"secret");
        let err = SourceDocument::from_bytes(&data, None).err().unwrap();
        assert!(matches!(err, ScanlayerError::InvalidPassword), "{err:?}");
    }

    #[test]
    fn empty_user_password_opens_without_one() {
        let src = SourceDocument::from_bytes(&encrypted_pdf_bytes(b""), None).unwrap();
        assert_eq!(src.content(0).unwrap(), CONTENT);
    }

    #[test]
    fn password_on_plain_input_is_ignored() {
        let src = SourceDocument::from_bytes(&two_page_pdf(), Some("unused")).unwrap();
        assert_eq!(src.page_count(), 2);
    }
}
