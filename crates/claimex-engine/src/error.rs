//! Errors raised by the credential engine and the public ledger.
//!
//! These are not absorbed by the agent's role handlers: a failed lookup or
//! a bad claim signature fails the current operation and reaches its caller.

use claimex_core::{CanonicalizationError, CryptoError, SchemaId, ValidationError};
use thiserror::Error;

/// Credential engine failure.
#[derive(Error, Debug)]
pub enum EngineError {
    /// No schema for the given id on the ledger.
    #[error("schema not found: {0}")]
    SchemaNotFound(SchemaId),

    /// No claim definition (public key) for the given schema.
    #[error("public key not found for {0}")]
    PublicKeyNotFound(SchemaId),

    /// The prover holds no claim for the given schema.
    #[error("claim not found for {0}")]
    ClaimNotFound(SchemaId),

    /// The issuer has no attribute record for this prover and schema.
    #[error("no attributes on file for user \"{user_id}\" under {schema}")]
    AttributesNotFound {
        /// Schema the claim was requested for.
        schema: SchemaId,
        /// Prover id from the claim request.
        user_id: String,
    },

    /// A claim request or claim response does not match the prover's
    /// outstanding request.
    #[error("invalid claim request: {0}")]
    InvalidClaimRequest(String),

    /// An issued claim's signature does not verify.
    #[error("claim signature invalid: {0}")]
    SignatureInvalid(String),

    /// The holder's claims cannot satisfy the proof input.
    #[error("proof generation failed: {0}")]
    ProofGeneration(String),

    /// A proof is structurally unusable.
    #[error("malformed proof: {0}")]
    MalformedProof(String),

    /// Attribute value validation failed.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Key handling failed.
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// Could not produce signing input.
    #[error("canonicalization error: {0}")]
    Canonicalization(#[from] CanonicalizationError),

    /// JSON (de)serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
