// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Embedded-image rasterizer.
//
// Scanned PDFs are a stack of image XObjects placed by the content stream.
// This renderer walks the content stream with `lopdf`, tracks the current
// transformation matrix through `q`/`Q`/`cm`, descends into form XObjects,
// and composites every image it meets onto a white canvas. Vector graphics
// and text are not drawn.

use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use imageproc::geometric_transformations::Projection;
use lopdf::content::Content;
use lopdf::{Dictionary, Document, Object, Stream};
use scanlayer_core::error::{Result, ScanlayerError};
use scanlayer_core::types::PageGeometry;
use tracing::{debug, instrument, trace, warn};

use super::PageRasterizer;
use crate::pdf::source::{SourceDocument, number, resolve};

/// Nesting limit for form XObjects.
const MAX_FORM_DEPTH: usize = 8;

/// Images larger than this many pixels are refused.
const MAX_IMAGE_PIXELS: u64 = 400_000_000;

/// Affine matrix `[a b c d e f]` as written in PDF content streams.
type Matrix = [f64; 6];

const IDENTITY: Matrix = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

/// `m` applied first, then `n`.
fn concat(m: &Matrix, n: &Matrix) -> Matrix {
    [
        m[0] * n[0] + m[1] * n[2],
        m[0] * n[1] + m[1] * n[3],
        m[2] * n[0] + m[3] * n[2],
        m[2] * n[1] + m[3] * n[3],
        m[4] * n[0] + m[5] * n[2] + n[4],
        m[4] * n[1] + m[5] * n[3] + n[5],
    ]
}

fn apply(m: &Matrix, x: f64, y: f64) -> (f64, f64) {
    (m[0] * x + m[2] * y + m[4], m[1] * x + m[3] * y + m[5])
}

/// Rasterizer built on the content stream and image XObjects of each page.
#[derive(Debug, Default, Clone, Copy)]
pub struct XObjectRasterizer;

impl XObjectRasterizer {
    pub fn new() -> Self {
        Self
    }
}

impl PageRasterizer for XObjectRasterizer {
    #[instrument(skip(self, source), fields(backend = "xobject"))]
    fn render(&self, source: &SourceDocument, index: usize, dpi: u32) -> Result<(DynamicImage, PageGeometry)> {
        let (media_w, media_h) = source.media_size(index)?;
        let (origin_x, origin_y) = source.media_origin(index)?;
        let rotation = source.rotation(index)?;
        let unrotated = PageGeometry::at_dpi(index, media_w, media_h, dpi);

        // User space to canvas pixels, y pointing down.
        let sx = 1.0 / unrotated.x_scale();
        let sy = 1.0 / unrotated.y_scale();
        let base: Matrix = [
            sx,
            0.0,
            0.0,
            -sy,
            -origin_x * sx,
            unrotated.height_px as f64 + origin_y * sy,
        ];

        let mut painter = Painter {
            doc: source.document(),
            page: index,
            canvas: RgbaImage::from_pixel(unrotated.width_px, unrotated.height_px, Rgba([255, 255, 255, 255])),
            images_drawn: 0,
        };
        let content = source.content(index)?;
        painter.run(&content, source.resources(index)?, base, 0)?;
        debug!(page = index, images = painter.images_drawn, "Page composited");

        let rgb = DynamicImage::ImageRgba8(painter.canvas).to_rgb8();
        let upright = match rotation {
            90 => imageops::rotate90(&rgb),
            180 => imageops::rotate180(&rgb),
            270 => imageops::rotate270(&rgb),
            _ => rgb,
        };
        let (width_pt, height_pt) = source.page_size(index)?;
        let geometry = PageGeometry::at_dpi(index, width_pt, height_pt, dpi);
        Ok((DynamicImage::ImageRgb8(upright), geometry))
    }

    fn name(&self) -> &'static str {
        "xobject"
    }
}

struct Painter<'a> {
    doc: &'a Document,
    page: usize,
    canvas: RgbaImage,
    images_drawn: usize,
}

impl Painter<'_> {
    fn render_error(&self, message: impl Into<String>) -> ScanlayerError {
        ScanlayerError::PageRender {
            page: self.page,
            message: message.into(),
        }
    }

    fn run(&mut self, content: &[u8], resources: Option<&Dictionary>, ctm: Matrix, depth: usize) -> Result<()> {
        let content = Content::decode(content)
            .map_err(|err| self.render_error(format!("content stream is malformed: {err}")))?;

        let mut stack: Vec<Matrix> = Vec::new();
        let mut ctm = ctm;

        for op in &content.operations {
            match op.operator.as_str() {
                "q" => stack.push(ctm),
                "Q" => {
                    if let Some(saved) = stack.pop() {
                        ctm = saved;
                    }
                }
                "cm" => {
                    let values: Vec<f64> = op
                        .operands
                        .iter()
                        .filter_map(|o| number(self.doc, o))
                        .collect();
                    if let [a, b, c, d, e, f] = values[..] {
                        ctm = concat(&[a, b, c, d, e, f], &ctm);
                    } else {
                        warn!(page = self.page, "cm with bad operands ignored");
                    }
                }
                "Do" => {
                    let Some(name) = op.operands.first().and_then(|o| o.as_name().ok()) else {
                        continue;
                    };
                    self.draw_xobject(name, resources, &ctm, depth)?;
                }
                other => trace!(operator = other, "Operator not rendered"),
            }
        }
        Ok(())
    }

    fn draw_xobject(&mut self, name: &[u8], resources: Option<&Dictionary>, ctm: &Matrix, depth: usize) -> Result<()> {
        let doc = self.doc;
        let stream = resources
            .and_then(|r| r.get(b"XObject").ok())
            .and_then(|x| resolve(doc, x).as_dict().ok())
            .and_then(|x| x.get(name).ok())
            .and_then(|o| resolve(doc, o).as_stream().ok());
        let Some(stream) = stream else {
            warn!(page = self.page, name = %String::from_utf8_lossy(name), "XObject not found in resources");
            return Ok(());
        };

        match stream.dict.get(b"Subtype").and_then(|s| s.as_name()) {
            Ok(b"Image") => {
                let image = decode_image(doc, stream, resources).map_err(|msg| self.render_error(msg))?;
                self.composite(&image, ctm);
                self.images_drawn += 1;
            }
            Ok(b"Form") => {
                if depth >= MAX_FORM_DEPTH {
                    warn!(page = self.page, "Form XObjects nested too deeply; skipped");
                    return Ok(());
                }
                let matrix = stream
                    .dict
                    .get(b"Matrix")
                    .ok()
                    .and_then(|m| resolve(doc, m).as_array().ok())
                    .and_then(|a| {
                        let v: Vec<f64> = a.iter().filter_map(|o| number(doc, o)).collect();
                        <[f64; 6]>::try_from(v).ok()
                    })
                    .unwrap_or(IDENTITY);
                let form_resources = stream
                    .dict
                    .get(b"Resources")
                    .ok()
                    .and_then(|r| resolve(doc, r).as_dict().ok())
                    .or(resources);
                let body = stream_bytes(stream).map_err(|msg| self.render_error(msg))?;
                self.run(&body, form_resources, concat(&matrix, ctm), depth + 1)?;
            }
            _ => trace!("Non-image XObject skipped"),
        }
        Ok(())
    }

    /// Paint `image` into the unit square mapped by `ctm`.
    fn composite(&mut self, image: &RgbaImage, ctm: &Matrix) {
        let (w, h) = (image.width() as f64, image.height() as f64);
        // Image pixel (u, v) to canvas pixel; row 0 is the top of the unit square.
        let m = concat(&[1.0 / w, 0.0, 0.0, -1.0 / h, 0.0, 1.0], ctm);

        let axis_aligned = m[1].abs() < 1e-9 && m[2].abs() < 1e-9 && m[0] > 0.0 && m[3] > 0.0;
        if axis_aligned {
            let dest_w = (m[0] * w).round().max(1.0) as u32;
            let dest_h = (m[3] * h).round().max(1.0) as u32;
            let scaled = if (dest_w, dest_h) == image.dimensions() {
                image.clone()
            } else {
                imageops::resize(image, dest_w, dest_h, FilterType::Triangle)
            };
            imageops::overlay(&mut self.canvas, &scaled, m[4].round() as i64, m[5].round() as i64);
            return;
        }

        let forward = Projection::from_matrix([
            m[0] as f32, m[2] as f32, m[4] as f32,
            m[1] as f32, m[3] as f32, m[5] as f32,
            0.0, 0.0, 1.0,
        ]);
        let Some(forward) = forward else {
            warn!(page = self.page, "Degenerate image placement skipped");
            return;
        };
        let inverse = forward.invert();

        let corners = [(0.0, 0.0), (w, 0.0), (0.0, h), (w, h)].map(|(u, v)| apply(&m, u, v));
        let (cw, ch) = (self.canvas.width() as f64, self.canvas.height() as f64);
        let x0 = corners.iter().map(|c| c.0).fold(f64::INFINITY, f64::min).floor().clamp(0.0, cw) as u32;
        let x1 = corners.iter().map(|c| c.0).fold(f64::NEG_INFINITY, f64::max).ceil().clamp(0.0, cw) as u32;
        let y0 = corners.iter().map(|c| c.1).fold(f64::INFINITY, f64::min).floor().clamp(0.0, ch) as u32;
        let y1 = corners.iter().map(|c| c.1).fold(f64::NEG_INFINITY, f64::max).ceil().clamp(0.0, ch) as u32;

        for y in y0..y1 {
            for x in x0..x1 {
                let (u, v) = inverse * (x as f32 + 0.5, y as f32 + 0.5);
                if u < 0.0 || v < 0.0 || u >= w as f32 || v >= h as f32 {
                    continue;
                }
                let src = *image.get_pixel(u as u32, v as u32);
                if src[3] == 0 {
                    continue;
                }
                let dst = self.canvas.get_pixel_mut(x, y);
                *dst = blend(*dst, src);
            }
        }
    }
}

fn blend(dst: Rgba<u8>, src: Rgba<u8>) -> Rgba<u8> {
    let a = src[3] as u32;
    let mix = |s: u8, d: u8| ((s as u32 * a + d as u32 * (255 - a)) / 255) as u8;
    Rgba([mix(src[0], dst[0]), mix(src[1], dst[1]), mix(src[2], dst[2]), 255])
}

/// Stream body with all non-image filters removed.
fn stream_bytes(stream: &Stream) -> std::result::Result<Vec<u8>, String> {
    if stream.dict.get(b"Filter").is_err() {
        return Ok(stream.content.clone());
    }
    stream
        .decompressed_content()
        .map_err(|err| format!("stream could not be decompressed: {err}"))
}

fn filter_names(doc: &Document, dict: &Dictionary) -> Vec<Vec<u8>> {
    match dict.get(b"Filter").map(|f| resolve(doc, f)) {
        Ok(Object::Name(name)) => vec![name.clone()],
        Ok(Object::Array(items)) => items
            .iter()
            .filter_map(|i| resolve(doc, i).as_name().ok().map(<[u8]>::to_vec))
            .collect(),
        _ => Vec::new(),
    }
}

fn int_entry(doc: &Document, dict: &Dictionary, key: &[u8]) -> Option<u32> {
    dict.get(key)
        .ok()
        .and_then(|o| number(doc, o))
        .filter(|v| *v >= 0.0)
        .map(|v| v as u32)
}

/// Whether the `/Decode` array starts with `[1 0]`, i.e. inverts the first component.
fn decode_inverted(doc: &Document, dict: &Dictionary) -> bool {
    dict.get(b"Decode")
        .ok()
        .and_then(|d| resolve(doc, d).as_array().ok())
        .and_then(|a| Some((number(doc, a.first()?)?, number(doc, a.get(1)?)?)))
        .is_some_and(|(lo, hi)| lo > hi)
}

#[derive(Debug, Clone, PartialEq)]
enum ColorSpace {
    Gray,
    Rgb,
    Cmyk,
    Indexed { base: Box<ColorSpace>, hival: u32, lookup: Vec<u8> },
}

impl ColorSpace {
    fn components(&self) -> usize {
        match self {
            ColorSpace::Gray | ColorSpace::Indexed { .. } => 1,
            ColorSpace::Rgb => 3,
            ColorSpace::Cmyk => 4,
        }
    }

    fn parse(doc: &Document, obj: &Object, resources: Option<&Dictionary>, depth: usize) -> std::result::Result<Self, String> {
        if depth > 4 {
            return Err("colour space nested too deeply".into());
        }
        match resolve(doc, obj) {
            Object::Name(name) => match name.as_slice() {
                b"DeviceGray" | b"CalGray" | b"G" => Ok(ColorSpace::Gray),
                b"DeviceRGB" | b"CalRGB" | b"RGB" => Ok(ColorSpace::Rgb),
                b"DeviceCMYK" | b"CMYK" => Ok(ColorSpace::Cmyk),
                other => {
                    let named = resources
                        .and_then(|r| r.get(b"ColorSpace").ok())
                        .and_then(|c| resolve(doc, c).as_dict().ok())
                        .and_then(|c| c.get(other).ok())
                        .ok_or_else(|| format!("unknown colour space /{}", String::from_utf8_lossy(other)))?;
                    Self::parse(doc, named, resources, depth + 1)
                }
            },
            Object::Array(items) => {
                let family = items
                    .first()
                    .and_then(|f| resolve(doc, f).as_name().ok())
                    .ok_or("colour space array without a family name")?;
                match family {
                    b"CalGray" => Ok(ColorSpace::Gray),
                    b"CalRGB" | b"Lab" => Ok(ColorSpace::Rgb),
                    b"ICCBased" => {
                        let n = items
                            .get(1)
                            .and_then(|s| resolve(doc, s).as_stream().ok())
                            .and_then(|s| int_entry(doc, &s.dict, b"N"))
                            .unwrap_or(3);
                        match n {
                            1 => Ok(ColorSpace::Gray),
                            4 => Ok(ColorSpace::Cmyk),
                            _ => Ok(ColorSpace::Rgb),
                        }
                    }
                    b"Indexed" | b"I" => {
                        let base = items.get(1).ok_or("indexed colour space without base")?;
                        let base = Self::parse(doc, base, resources, depth + 1)?;
                        let hival = items.get(2).and_then(|h| number(doc, h)).unwrap_or(255.0) as u32;
                        let lookup = match items.get(3).map(|l| resolve(doc, l)) {
                            Some(Object::String(bytes, _)) => bytes.clone(),
                            Some(Object::Stream(s)) => stream_bytes(s)?,
                            _ => return Err("indexed colour space without lookup table".into()),
                        };
                        Ok(ColorSpace::Indexed {
                            base: Box::new(base),
                            hival,
                            lookup,
                        })
                    }
                    other => Err(format!(
                        "colour space /{} is not supported",
                        String::from_utf8_lossy(other)
                    )),
                }
            }
            _ => Err("colour space entry is not a name or array".into()),
        }
    }

    /// Convert one pixel's components (already scaled to 0..=255, or the raw
    /// index for `Indexed`) to RGB.
    fn to_rgb(&self, c: &[u8]) -> [u8; 3] {
        match self {
            ColorSpace::Gray => [c[0], c[0], c[0]],
            ColorSpace::Rgb => [c[0], c[1], c[2]],
            ColorSpace::Cmyk => {
                let k = 255 - c[3] as u32;
                let ch = |v: u8| ((255 - v as u32) * k / 255) as u8;
                [ch(c[0]), ch(c[1]), ch(c[2])]
            }
            ColorSpace::Indexed { base, hival, lookup } => {
                let n = base.components();
                let idx = (c[0] as u32).min(*hival) as usize * n;
                match lookup.get(idx..idx + n) {
                    Some(entry) => base.to_rgb(entry),
                    None => [0, 0, 0],
                }
            }
        }
    }
}

/// Read `count` samples of `bits` width from a packed row.
fn unpack_row(row: &[u8], bits: u32, count: usize, out: &mut Vec<u16>) {
    out.clear();
    match bits {
        8 => out.extend(row.iter().take(count).map(|&b| b as u16)),
        16 => out.extend(row.chunks_exact(2).take(count).map(|p| u16::from_be_bytes([p[0], p[1]]))),
        1 | 2 | 4 => {
            let per_byte = 8 / bits as usize;
            let mask = (1u16 << bits) - 1;
            for i in 0..count {
                let byte = row[i / per_byte] as u16;
                let shift = 8 - bits as usize * (i % per_byte + 1);
                out.push((byte >> shift) & mask);
            }
        }
        _ => {}
    }
}

/// Decode an image XObject into RGBA. Transparent pixels come only from
/// stencil masks.
fn decode_image(doc: &Document, stream: &Stream, resources: Option<&Dictionary>) -> std::result::Result<RgbaImage, String> {
    let dict = &stream.dict;
    let width = int_entry(doc, dict, b"Width").filter(|w| *w > 0).ok_or("image has no width")?;
    let height = int_entry(doc, dict, b"Height").filter(|h| *h > 0).ok_or("image has no height")?;
    if width as u64 * height as u64 > MAX_IMAGE_PIXELS {
        return Err(format!("image of {width}x{height} pixels is too large"));
    }

    let filters = filter_names(doc, dict);
    if let Some(last) = filters.last() {
        match last.as_slice() {
            b"DCTDecode" | b"DCT" => {
                if filters.len() > 1 {
                    return Err("DCTDecode chained after other filters is not supported".into());
                }
                let decoded = image::load_from_memory_with_format(&stream.content, ImageFormat::Jpeg)
                    .map_err(|err| format!("JPEG image could not be decoded: {err}"))?;
                return Ok(decoded.to_rgba8());
            }
            b"JPXDecode" | b"JBIG2Decode" | b"CCITTFaxDecode" | b"CCF" => {
                return Err(format!(
                    "image filter /{} is not supported by this renderer",
                    String::from_utf8_lossy(last)
                ));
            }
            _ => {}
        }
    }
    let data = stream_bytes(stream)?;

    let is_mask = dict
        .get(b"ImageMask")
        .ok()
        .and_then(|m| resolve(doc, m).as_bool().ok())
        .unwrap_or(false);
    let (space, bits) = if is_mask {
        (ColorSpace::Gray, 1)
    } else {
        let space = match dict.get(b"ColorSpace") {
            Ok(cs) => ColorSpace::parse(doc, cs, resources, 0)?,
            Err(_) => ColorSpace::Gray,
        };
        (space, int_entry(doc, dict, b"BitsPerComponent").unwrap_or(8))
    };
    if !matches!(bits, 1 | 2 | 4 | 8 | 16) {
        return Err(format!("{bits} bits per component is not supported"));
    }

    let components = space.components();
    let samples_per_row = width as usize * components;
    let row_bytes = (samples_per_row * bits as usize).div_ceil(8);
    if data.len() < row_bytes * height as usize {
        return Err(format!(
            "image data truncated: {} bytes for {width}x{height}",
            data.len()
        ));
    }

    let inverted = decode_inverted(doc, dict);
    let max = ((1u32 << bits) - 1) as u16;
    let indexed = matches!(space, ColorSpace::Indexed { .. });

    let mut out = RgbaImage::new(width, height);
    let mut samples = Vec::with_capacity(samples_per_row);
    let mut pixel = [0u8; 4];
    for (y, row) in data.chunks(row_bytes).take(height as usize).enumerate() {
        unpack_row(row, bits, samples_per_row, &mut samples);
        for x in 0..width as usize {
            let raw = &samples[x * components..(x + 1) * components];
            if is_mask {
                // Sample 0 paints unless /Decode is [1 0].
                let paints = (raw[0] == 0) != inverted;
                let value = if paints { Rgba([0, 0, 0, 255]) } else { Rgba([0, 0, 0, 0]) };
                out.put_pixel(x as u32, y as u32, value);
                continue;
            }
            for (slot, &s) in pixel.iter_mut().zip(raw) {
                *slot = if indexed {
                    s.min(255) as u8
                } else {
                    ((s as u32 * 255) / max as u32) as u8
                };
            }
            if inverted && !indexed {
                pixel[0] = 255 - pixel[0];
            }
            let [r, g, b] = space.to_rgb(&pixel[..components]);
            out.put_pixel(x as u32, y as u32, Rgba([r, g, b, 255]));
        }
    }
    Ok(out)
}
