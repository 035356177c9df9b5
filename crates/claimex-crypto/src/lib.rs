//! # claimex-crypto — Cryptographic Primitives
//!
//! - **Ed25519** signing and verification of agent messages and issued
//!   claim payloads.
//! - **SHA-256** digests from `CanonicalBytes`.
//! - **Identifier derivation** from a verification key.
//!
//! ## Crate Policy
//!
//! - Depends only on `claimex-core` internally.
//! - Tests use real Ed25519 and real SHA-256, never stand-ins.

pub mod ed25519;
pub mod sha256;

pub use ed25519::{verify, Ed25519KeyPair, Ed25519PublicKey, Ed25519Signature};
pub use sha256::{sha256_digest, sha256_hex, sha256_raw};
