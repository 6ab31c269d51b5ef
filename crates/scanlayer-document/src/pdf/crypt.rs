// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Standard security handler: authenticate a password and decrypt every
// object of an encrypted PDF.
//
// lopdf only parses the objects of an encrypted file while loading when the
// user password is empty. Everything else goes through a second parse of
// the raw bytes with the trailer's `/Encrypt` entry hidden, after which each
// object is decrypted with the key lopdf derived from the password.

use std::collections::BTreeMap;

use lopdf::encryption::{DecryptionError, decrypt_object};
use lopdf::{Document, Object, ObjectId, ObjectStream, Reader};
use scanlayer_core::error::{Result, ScanlayerError};
use tracing::{debug, instrument, warn};

const ENCRYPT_KEY: &[u8] = b"/Encrypt";
/// Same length as `/Encrypt`, so every xref offset stays valid.
const HIDDEN_KEY: &[u8] = b"/NoCrypt";
/// Object streams are parked under this type until their container is decrypted.
const HELD_OBJECT_STREAM: &[u8] = b"HeldObjStm";

/// Parse `data` as a PDF. An encrypted file comes back with only its
/// encryption dictionary loaded; pass it to [`decrypt`].
pub(crate) fn parse(data: &[u8]) -> Result<Document> {
    Document::load_mem(data).map_err(|err| ScanlayerError::Pdf(format!("failed to load PDF: {err}")))
}

/// Decrypt the encrypted document `shell`, parsed from `data`, with
/// `password`. The result holds every object in plain form and has no
/// `/Encrypt` entry.
#[instrument(skip_all, fields(bytes_len = data.len()))]
pub(crate) fn decrypt(mut shell: Document, data: &[u8], password: &str) -> Result<Document> {
    let encrypt_id = shell
        .trailer
        .get(b"Encrypt")
        .and_then(Object::as_reference)
        .map_err(|err| ScanlayerError::AlreadyUnlockedOrUnsupported(format!("unusable /Encrypt entry: {err}")))?;

    // Objects lopdf already decrypted with the empty password must not be
    // decrypted a second time.
    shell.objects.retain(|id, _| *id == encrypt_id);
    relax_key_length(&mut shell, encrypt_id);
    shell.decrypt(password).map_err(password_error)?;
    let state = shell.encryption_state.take().ok_or_else(|| {
        ScanlayerError::AlreadyUnlockedOrUnsupported("no file key could be derived".into())
    })?;
    debug!("Password accepted");

    let masked = hide_encrypt_entry(data);
    let held: fn(ObjectId, &mut Object) -> Option<(ObjectId, Object)> = hold_object_stream;
    let mut document = Reader {
        buffer: &masked,
        document: Document::new(),
        encryption_state: None,
        raw_objects: BTreeMap::new(),
    }
    .read(Some(held))
    .map_err(|err| ScanlayerError::Pdf(format!("failed to re-read encrypted PDF: {err}")))?;

    document.trailer.remove(&HIDDEN_KEY[1..]);
    document.objects.remove(&encrypt_id);
    for (&id, object) in document.objects.iter_mut() {
        decrypt_object(&state, id, object).map_err(|err| {
            ScanlayerError::Pdf(format!("object {} {} could not be decrypted: {err}", id.0, id.1))
        })?;
    }
    expand_object_streams(&mut document);

    debug!(objects = document.objects.len(), "Encrypted PDF decrypted");
    Ok(document)
}

fn password_error(err: lopdf::Error) -> ScanlayerError {
    match err {
        lopdf::Error::Decryption(DecryptionError::IncorrectPassword) => ScanlayerError::InvalidPassword,
        lopdf::Error::NotEncrypted => {
            ScanlayerError::AlreadyUnlockedOrUnsupported("the document is not encrypted".into())
        }
        other => ScanlayerError::AlreadyUnlockedOrUnsupported(format!("encryption scheme not supported: {other}")),
    }
}

/// A V1 handler always uses a 40-bit key, yet some writers still add
/// `/Length`, which lopdf refuses for V1.
fn relax_key_length(shell: &mut Document, encrypt_id: ObjectId) {
    let Ok(dict) = shell.get_dictionary_mut(encrypt_id) else {
        return;
    };
    let v1 = dict.get(b"V").and_then(Object::as_i64).is_ok_and(|v| v == 1);
    if v1 && dict.remove(b"Length").is_some() {
        debug!("Ignoring /Length on a V1 security handler");
    }
}

/// Rename every `/Encrypt` key so lopdf parses the file as unencrypted.
/// Longer names such as `/EncryptMetadata` are left alone.
fn hide_encrypt_entry(data: &[u8]) -> Vec<u8> {
    let mut masked = data.to_vec();
    let mut at = 0;
    while let Some(pos) = masked[at..].windows(ENCRYPT_KEY.len()).position(|w| w == ENCRYPT_KEY) {
        let start = at + pos;
        let end = start + ENCRYPT_KEY.len();
        if masked.get(end).is_none_or(|&b| ends_name(b)) {
            masked[start..end].copy_from_slice(HIDDEN_KEY);
        }
        at = end;
    }
    masked
}

fn ends_name(byte: u8) -> bool {
    byte.is_ascii_whitespace() || b"()<>[]{}/%".contains(&byte)
}

/// Load filter. lopdf applies it to each top-level object in place and
/// keeps only the `None` verdict, so the returned object is a placeholder.
fn hold_object_stream(id: ObjectId, object: &mut Object) -> Option<(ObjectId, Object)> {
    if let Object::Stream(stream) = object {
        if stream.dict.has_type(b"ObjStm") {
            stream.dict.set("Type", Object::Name(HELD_OBJECT_STREAM.to_vec()));
        }
    }
    Some((id, Object::Null))
}

fn expand_object_streams(document: &mut Document) {
    let mut expanded = BTreeMap::new();
    for (id, object) in document.objects.iter_mut() {
        let Ok(stream) = object.as_stream_mut() else {
            continue;
        };
        if !stream.dict.has_type(HELD_OBJECT_STREAM) {
            continue;
        }
        stream.dict.set("Type", Object::Name(b"ObjStm".to_vec()));
        match ObjectStream::new(stream) {
            Ok(objects) => expanded.extend(objects.objects),
            Err(err) => warn!(stream = ?id, error = %err, "Object stream unreadable after decryption"),
        }
    }
    for (id, object) in expanded {
        document.objects.entry(id).or_insert(object);
    }
}

#[cfg(test)]
mod tests {
    use super::super::unlock::fixtures::{CONTENT, encrypted_pdf_bytes, encrypted_pdf_bytes_with};
    use super::*;

    fn open(data: &[u8], password: &str) -> Result<Document> {
        decrypt(parse(data)?, data, password)
    }

    fn first_page_content(doc: &Document) -> Vec<u8> {
        let page_id = *doc.get_pages().values().next().unwrap();
        doc.get_page_content(page_id).unwrap()
    }

    #[test]
    fn non_empty_user_password_yields_every_object() {
        let data = encrypted_pdf_bytes(b"secret");
        // lopdf alone leaves the page tree unparsed for this file.
        assert!(parse(&data).unwrap().get_pages().is_empty());

        let doc = open(&data, "secret").unwrap();
        assert!(!doc.is_encrypted());
        assert_eq!(doc.get_pages().len(), 1);
        assert_eq!(first_page_content(&doc), CONTENT);
    }

    #[test]
    fn empty_user_password_is_not_decrypted_twice() {
        let data = encrypted_pdf_bytes(b"");
        let doc = open(&data, "").unwrap();
        assert_eq!(first_page_content(&doc), CONTENT);
    }

    #[test]
    fn wrong_password_maps_to_invalid_password() {
        let err = open(&encrypted_pdf_bytes(b"secret"), "guess").unwrap_err();
        assert!(matches!(err, ScanlayerError::InvalidPassword), "{err:?}");
    }

    #[test]
    fn v1_handler_with_length_entry_is_accepted() {
        let data = encrypted_pdf_bytes_with(b"secret", Some(40));
        let doc = open(&data, "secret").unwrap();
        assert_eq!(first_page_content(&doc), CONTENT);
    }

    #[test]
    fn hiding_keeps_offsets_and_longer_names() {
        let data = b"<< /Encrypt 5 0 R /EncryptMetadata false >>\ntrailer << /Encrypt/x >>";
        let masked = hide_encrypt_entry(data);
        assert_eq!(masked.len(), data.len());
        assert_eq!(
            masked.as_slice(),
            &b"<< /NoCrypt 5 0 R /EncryptMetadata false >>\ntrailer << /NoCrypt/x >>"[..]
        );
    }
}
