//! # Error Hierarchy
//!
//! Structured error types shared across the workspace, built with `thiserror`.
//!
//! Each variant carries the offending input so that a failed handshake can
//! be diagnosed from the log line alone.

use thiserror::Error;

/// Top-level error type for the core primitives.
#[derive(Error, Debug)]
pub enum ClaimexError {
    /// Canonicalization failure while producing signing input.
    #[error("canonicalization error: {0}")]
    Canonicalization(#[from] CanonicalizationError),

    /// Protocol primitive validation failure.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Cryptographic operation failure.
    #[error("cryptographic error: {0}")]
    Crypto(#[from] CryptoError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors during canonical serialization.
#[derive(Error, Debug)]
pub enum CanonicalizationError {
    /// Float values are not permitted in canonical representations.
    /// Encoded attribute values and sequence numbers are strings or integers.
    #[error("float values are not permitted in canonical representations: {0}")]
    FloatRejected(f64),

    /// JSON serialization failed during canonicalization.
    #[error("serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),
}

/// Errors from signing, verification and key handling.
#[derive(Error, Debug)]
pub enum CryptoError {
    /// Signature verification failed.
    #[error("signature verification failed: {0}")]
    VerificationFailed(String),

    /// Key generation or parsing failed.
    #[error("key error: {0}")]
    KeyError(String),
}

/// Validation errors for protocol primitives.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Identifier is empty or contains characters outside `[A-Za-z0-9]`.
    #[error("invalid identifier: \"{0}\" (expected non-empty alphanumeric)")]
    InvalidIdentifier(String),

    /// Nonce is empty or contains characters outside `[A-Za-z0-9]`.
    #[error("invalid nonce: \"{0}\" (expected non-empty alphanumeric)")]
    InvalidNonce(String),

    /// Schema key has an empty name or version.
    #[error("invalid schema key: {0}")]
    InvalidSchemaKey(String),

    /// Encoded attribute value does not match its raw value.
    #[error("attribute \"{name}\" encoding mismatch: raw \"{raw}\" does not encode to \"{encoded}\"")]
    AttributeEncodingMismatch {
        /// Attribute name.
        name: String,
        /// Raw value as sent.
        raw: String,
        /// Encoded value as sent.
        encoded: String,
    },

    /// Proof request is structurally invalid.
    #[error("invalid proof request: {0}")]
    InvalidProofRequest(String),
}
