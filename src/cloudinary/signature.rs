//! Cloudinary API request signing.

use std::collections::BTreeMap;

use sha1::{Digest, Sha1};

/// Parameters that are sent but never signed.
const UNSIGNED_PARAMS: &[&str] = &["file", "api_key", "resource_type", "cloud_name"];

/// Build the string-to-sign: signed params sorted by key, `k=v` joined with `&`.
///
/// Empty values are left out, matching the server's canonicalization.
#[must_use]
pub fn string_to_sign(params: &BTreeMap<&str, String>) -> String {
    params
        .iter()
        .filter(|(key, value)| !value.is_empty() && !UNSIGNED_PARAMS.contains(*key))
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("&")
}

/// SHA-1 hex digest of the string-to-sign with the API secret appended.
#[must_use]
pub fn sign_params(params: &BTreeMap<&str, String>, api_secret: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(string_to_sign(params).as_bytes());
    hasher.update(api_secret.as_bytes());
    hex::encode(hasher.finalize())
}
