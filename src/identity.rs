use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use md5::{Digest, Md5};
use uuid::Builder;

use crate::domain::ExternalId;

// Not part of the standard base64 alphabet.
pub const TME_IDENTIFIER_SEPARATOR: char = '-';

pub fn tme_identifier(raw_id: &str, taxonomy_name: &str) -> String {
    let id = STANDARD.encode(raw_id.as_bytes());
    let taxonomy = STANDARD.encode(taxonomy_name.as_bytes());
    format!("{id}{TME_IDENTIFIER_SEPARATOR}{taxonomy}")
}

/// Derives the public identifier of a term.
///
/// The identifier is an MD5 name-based UUID (version 3) of the TME identifier,
/// hashed without a namespace prefix. Every identifier already published by the
/// service depends on this exact scheme, so it must never change.
pub fn derive_external_id(raw_id: &str, taxonomy_name: &str) -> ExternalId {
    external_id_for_tme_identifier(&tme_identifier(raw_id, taxonomy_name))
}

pub fn external_id_for_tme_identifier(tme_identifier: &str) -> ExternalId {
    let digest = Md5::digest(tme_identifier.as_bytes());
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest);
    let uuid = Builder::from_md5_bytes(bytes).into_uuid();
    ExternalId::from_hyphenated(uuid.hyphenated().to_string())
}
