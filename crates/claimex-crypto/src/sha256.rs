//! # SHA-256 Digests
//!
//! Digests of structured data are computed from `CanonicalBytes` only.
//! [`sha256_raw`] exists for fixed-width derivations from unstructured
//! input such as seed phrases.

use claimex_core::CanonicalBytes;
use sha2::{Digest, Sha256};

/// SHA-256 of canonical bytes.
pub fn sha256_digest(data: &CanonicalBytes) -> [u8; 32] {
    sha256_raw(data.as_bytes())
}

/// Lowercase hex SHA-256 of canonical bytes.
pub fn sha256_hex(data: &CanonicalBytes) -> String {
    crate::ed25519::to_hex(&sha256_digest(data))
}

/// SHA-256 of arbitrary bytes.
pub fn sha256_raw(bytes: &[u8]) -> [u8; 32] {
    let hash = Sha256::digest(bytes);
    let mut out = [0u8; 32];
    out.copy_from_slice(&hash);
    out
}
