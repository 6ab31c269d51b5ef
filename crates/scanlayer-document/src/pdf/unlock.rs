// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Password removal: decrypt a protected PDF and write it back out without
// any encryption dictionary.

use std::path::Path;

use scanlayer_core::error::{Result, ScanlayerError};
use scanlayer_core::paths;
use tracing::{debug, info, instrument};

use super::crypt;

/// Decrypt `input` with `password` and write the plain copy to `output`.
///
/// `input` and `output` must differ; this is checked before either file is
/// touched.
#[instrument(skip(password), fields(input = %input.display(), output = %output.display()))]
pub fn unlock_file(input: &Path, output: &Path, password: &str) -> Result<()> {
    paths::ensure_distinct(input, output)?;
    paths::require_input(input)?;

    let data = std::fs::read(input)?;
    let unlocked = unlock_bytes(&data, password)?;

    paths::prepare_output(output)?;
    std::fs::write(output, &unlocked)?;
    info!(bytes = unlocked.len(), "Unlocked PDF written");
    Ok(())
}

/// Decrypt an in-memory PDF and re-serialize it without encryption.
pub fn unlock_bytes(data: &[u8], password: &str) -> Result<Vec<u8>> {
    let shell = crypt::parse(data)?;
    if !shell.is_encrypted() {
        return Err(ScanlayerError::AlreadyUnlockedOrUnsupported(
            "the document is not encrypted".into(),
        ));
    }

    let mut plain = crypt::decrypt(shell, data, password)?;
    debug!(pages = plain.get_pages().len(), "Document decrypted");

    let mut buffer = Vec::new();
    plain
        .save_to(&mut buffer)
        .map_err(|err| ScanlayerError::Pdf(format!("failed to serialise unlocked PDF: {err}")))?;
    Ok(buffer)
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Standard security handler (RC4, 40-bit, revision 2) fixtures.

    use lopdf::{Object, Stream, StringFormat, dictionary};

    const PAD_BYTES: [u8; 32] = [
        0x28, 0xBF, 0x4E, 0x5E, 0x4E, 0x75, 0x8A, 0x41, 0x64, 0x00, 0x4E, 0x56, 0xFF, 0xFA, 0x01,
        0x08, 0x2E, 0x2E, 0x00, 0xB6, 0xD0, 0x68, 0x3E, 0x80, 0x2F, 0x0C, 0xA9, 0xFE, 0x64, 0x53,
        0x69, 0x7A,
    ];

    pub const CONTENT: &[u8] = b"BT /F1 12 Tf 72 720 Td (Scanned) Tj ET";

    fn rc4(key: &[u8], data: &[u8]) -> Vec<u8> {
        let mut s: Vec<u8> = (0..=255).collect();
        let mut j: usize = 0;
        for i in 0..256 {
            j = (j + s[i] as usize + key[i % key.len()] as usize) & 0xFF;
            s.swap(i, j);
        }
        let mut out = Vec::with_capacity(data.len());
        let (mut i, mut j) = (0usize, 0usize);
        for &byte in data {
            i = (i + 1) & 0xFF;
            j = (j + s[i] as usize) & 0xFF;
            s.swap(i, j);
            out.push(byte ^ s[(s[i] as usize + s[j] as usize) & 0xFF]);
        }
        out
    }

    pub fn plain_pdf() -> lopdf::Document {
        let mut doc = lopdf::Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let content_id = doc.add_object(Stream::new(dictionary! {}, CONTENT.to_vec()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Contents" => Object::Reference(content_id),
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![Object::Reference(page_id)],
                "Count" => 1_i64,
            }),
        );
        let catalog_id = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
        doc.trailer.set("Root", catalog_id);
        doc
    }

    pub fn plain_pdf_bytes() -> Vec<u8> {
        let mut buf = Vec::new();
        plain_pdf().save_to(&mut buf).unwrap();
        buf
    }

    /// One-page PDF protected with `user_password`.
    pub fn encrypted_pdf_bytes(user_password: &[u8]) -> Vec<u8> {
        encrypted_pdf_bytes_with(user_password, None)
    }

    /// As [`encrypted_pdf_bytes`], optionally writing a `/Length` entry the
    /// way some producers do for V1 handlers.
    pub fn encrypted_pdf_bytes_with(user_password: &[u8], key_length: Option<i64>) -> Vec<u8> {
        let file_id = b"scanlayerfixture";
        let permissions: i32 = -4;

        let mut padded = Vec::with_capacity(32);
        let n = user_password.len().min(32);
        padded.extend_from_slice(&user_password[..n]);
        padded.extend_from_slice(&PAD_BYTES[..32 - n]);

        let o_digest = md5::compute(&padded);
        let o_value = rc4(&o_digest[..5], &padded);

        let mut key_input = Vec::with_capacity(128);
        key_input.extend_from_slice(&padded);
        key_input.extend_from_slice(&o_value);
        key_input.extend_from_slice(&(permissions as u32).to_le_bytes());
        key_input.extend_from_slice(file_id);
        let key = md5::compute(&key_input)[..5].to_vec();
        let u_value = rc4(&key, &PAD_BYTES);

        let mut doc = plain_pdf();
        for (&(num, generation), obj) in doc.objects.iter_mut() {
            let mut obj_key_input = key.clone();
            obj_key_input.extend_from_slice(&num.to_le_bytes()[..3]);
            obj_key_input.extend_from_slice(&generation.to_le_bytes()[..2]);
            let digest = md5::compute(&obj_key_input);
            let obj_key = &digest[..(key.len() + 5).min(16)];
            match obj {
                Object::Stream(stream) => {
                    let encrypted = rc4(obj_key, &stream.content);
                    stream.set_content(encrypted);
                }
                Object::String(content, _) => *content = rc4(obj_key, content),
                _ => {}
            }
        }

        let mut handler = dictionary! {
            "Filter" => "Standard",
            "V" => 1_i64,
            "R" => 2_i64,
            "O" => Object::String(o_value, StringFormat::Literal),
            "U" => Object::String(u_value, StringFormat::Literal),
            "P" => permissions as i64,
        };
        if let Some(length) = key_length {
            handler.set("Length", length);
        }
        let encrypt_id = doc.add_object(handler);
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
}
