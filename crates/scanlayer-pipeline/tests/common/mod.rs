// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Shared fixtures: image-only PDFs built with lopdf, an RC4 (revision 2)
// encryptor, and a recognizer whose confidence follows bitmap contrast.

#![allow(dead_code)]

use std::sync::Mutex;

use image::{DynamicImage, GenericImageView};
use lopdf::{Document, Object, Stream, StringFormat, dictionary};

use scanlayer_core::error::{Result, ScanlayerError};
use scanlayer_core::types::{LineKey, OcrWord, PixelBox};
use scanlayer_document::ocr::Recognizer;

pub const PAGE_W: u32 = 200;
pub const PAGE_H: u32 = 100;

/// What one fixture page shows.
#[derive(Debug, Clone, Copy)]
pub enum Fill {
    /// Left half black, right half white.
    Crisp,
    /// Left half luma 120, right half 140.
    Faint,
    /// No content at all.
    Blank,
}

fn gray_image(left: u8, right: u8) -> Vec<u8> {
    let mut data = Vec::with_capacity((PAGE_W * PAGE_H) as usize);
    for _ in 0..PAGE_H {
        for x in 0..PAGE_W {
            data.push(if x < PAGE_W / 2 { left } else { right });
        }
    }
    data
}

/// An image-only PDF with one `PAGE_W`x`PAGE_H` pt page per entry.
pub fn image_pdf(pages: &[Fill]) -> Document {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let mut kids = Vec::new();

    for fill in pages {
        let (content, resources) = match fill {
            Fill::Blank => (Vec::new(), dictionary! {}),
            Fill::Crisp | Fill::Faint => {
                let pixels = match fill {
                    Fill::Crisp => gray_image(0, 255),
                    _ => gray_image(120, 140),
                };
                let image_id = doc.add_object(Stream::new(
                    dictionary! {
                        "Type" => "XObject",
                        "Subtype" => "Image",
                        "Width" => PAGE_W as i64,
                        "Height" => PAGE_H as i64,
                        "ColorSpace" => "DeviceGray",
                        "BitsPerComponent" => 8_i64,
                    },
                    pixels,
                ));
                let content = format!("q {PAGE_W} 0 0 {PAGE_H} 0 0 cm /Im0 Do Q").into_bytes();
                (content, dictionary! { "XObject" => dictionary! { "Im0" => image_id } })
            }
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), (PAGE_W as i64).into(), (PAGE_H as i64).into()],
            "Contents" => content_id,
            "Resources" => resources,
        });
        kids.push(Object::Reference(page_id));
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! { "Type" => "Pages", "Kids" => kids, "Count" => count }),
    );
    let catalog_id = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
    doc.trailer.set("Root", catalog_id);
    doc
}

pub fn image_pdf_bytes(pages: &[Fill]) -> Vec<u8> {
    let mut buf = Vec::new();
    image_pdf(pages).save_to(&mut buf).unwrap();
    buf
}

const PAD_BYTES: [u8; 32] = [
    0x28, 0xBF, 0x4E, 0x5E, 0x4E, 0x75, 0x8A, 0x41, 0x64, 0x00, 0x4E, 0x56, 0xFF, 0xFA, 0x01, 0x08,
    0x2E, 0x2E, 0x00, 0xB6, 0xD0, 0x68, 0x3E, 0x80, 0x2F, 0x0C, 0xA9, 0xFE, 0x64, 0x53, 0x69, 0x7A,
];

fn rc4(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut s: Vec<u8> = (0..=255).collect();
    let mut j = 0usize;
    for i in 0..256 {
        j = (j + s[i] as usize + key[i % key.len()] as usize) & 0xFF;
        s.swap(i, j);
    }
    let (mut i, mut j) = (0usize, 0usize);
    data.iter()
        .map(|&byte| {
            i = (i + 1) & 0xFF;
            j = (j + s[i] as usize) & 0xFF;
            s.swap(i, j);
            byte ^ s[(s[i] as usize + s[j] as usize) & 0xFF]
        })
        .collect()
}

/// `doc` protected with `user_password` (40-bit RC4, revision 2).
pub fn encrypt(mut doc: Document, user_password: &[u8]) -> Vec<u8> {
    let file_id = b"scanlayerpipetst";
    let permissions: i32 = -4;

    let n = user_password.len().min(32);
    let mut padded = user_password[..n].to_vec();
    padded.extend_from_slice(&PAD_BYTES[..32 - n]);

    let o_value = rc4(&md5::compute(&padded)[..5], &padded);

    let mut key_input = padded.clone();
    key_input.extend_from_slice(&o_value);
    key_input.extend_from_slice(&(permissions as u32).to_le_bytes());
    key_input.extend_from_slice(file_id);
    let key = md5::compute(&key_input)[..5].to_vec();
    let u_value = rc4(&key, &PAD_BYTES);

    for (&(num, generation), obj) in doc.objects.iter_mut() {
        let mut obj_key_input = key.clone();
        obj_key_input.extend_from_slice(&num.to_le_bytes()[..3]);
        obj_key_input.extend_from_slice(&generation.to_le_bytes()[..2]);
        let digest = md5::compute(&obj_key_input);
        let obj_key = &digest[..(key.len() + 5).min(16)];
        if let Object::Stream(stream) = obj {
            let encrypted = rc4(obj_key, &stream.content);
            stream.set_content(encrypted);
        }
    }

    let encrypt_id = doc.add_object(dictionary! {
        "Filter" => "Standard",
        "V" => 1_i64,
        "R" => 2_i64,
        "O" => Object::String(o_value, StringFormat::Literal),
        "U" => Object::String(u_value, StringFormat::Literal),
        "P" => permissions as i64,
    });
    doc.trailer.set("Encrypt", Object::Reference(encrypt_id));
    doc.trailer.set(
        "ID",
        Object::Array(vec![
            Object::String(file_id.to_vec(), StringFormat::Literal),
            Object::String(file_id.to_vec(), StringFormat::Literal),
        ]),
    );

    let mut buf = Vec::new();
    doc.save_to(&mut buf).unwrap();
    buf
}

/// DPI the fixtures are rendered at; the enhanced pass runs at 1.5x.
pub const TEST_DPI: u32 = 72;

/// Recognizer keyed on bitmap contrast:
/// strong contrast reads as "crisp" (92) on the first pass or "restored"
/// (92) on the enhanced pass, weak contrast reads as "faint" (40), and a
/// flat bitmap has no words.
#[derive(Default)]
pub struct ContrastRecognizer {
    /// Page index that fails recognition, if any.
    pub fail_page: Option<usize>,
    pub calls: Mutex<Vec<(usize, u32)>>,
}

impl ContrastRecognizer {
    pub fn failing_on(page: usize) -> Self {
        Self { fail_page: Some(page), ..Self::default() }
    }

    pub fn calls(&self) -> Vec<(usize, u32)> {
        self.calls.lock().unwrap().clone()
    }
}

impl Recognizer for ContrastRecognizer {
    fn recognize(&self, image: &DynamicImage, page: usize, dpi: u32) -> Result<Vec<OcrWord>> {
        self.calls.lock().unwrap().push((page, dpi));
        if self.fail_page == Some(page) {
            return Err(ScanlayerError::Recognition { page, message: "engine exited with status 1".into() });
        }

        let luma = image.to_luma8();
        let (min, max) = luma.pixels().fold((u8::MAX, u8::MIN), |(lo, hi), p| (lo.min(p.0[0]), hi.max(p.0[0])));
        let contrast = max.saturating_sub(min);
        let enhanced = dpi > TEST_DPI;
        let (text, confidence) = match contrast {
            0 => return Ok(Vec::new()),
            c if c >= 200 && enhanced => ("restored", 92.0),
            c if c >= 200 => ("crisp", 92.0),
            _ => ("faint", 40.0),
        };

        let (w, h) = image.dimensions();
        Ok(vec![OcrWord::new(
            text,
            PixelBox::new(w as f64 * 0.1, h as f64 * 0.3, w as f64 * 0.5, h as f64 * 0.4),
            confidence,
            LineKey::default(),
        )])
    }

    fn language(&self) -> &str {
        "eng"
    }
}
