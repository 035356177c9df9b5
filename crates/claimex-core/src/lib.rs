#![deny(missing_docs)]

//! # claimex-core — Foundational Types for the Claim Exchange Agent
//!
//! This crate defines the types every other crate in the workspace shares.
//! It has no internal crate dependencies.
//!
//! ## Design Principles
//!
//! 1. **Newtype wrappers for protocol identifiers.** An [`Identifier`] (a
//!    signing identity), a [`Nonce`] (an invitation correlation value) and a
//!    [`RequestId`] (a message correlation id) are distinct types.
//!
//! 2. **[`SchemaKey`] is the correlation key** between an issuer's schema
//!    definition and a prover's claim request. [`SchemaId`] addresses a
//!    schema either by key or by ledger sequence number.
//!
//! 3. **[`CanonicalBytes`] is the sole path to signing input.** Every signed
//!    message and every issued claim payload is canonicalized through
//!    `CanonicalBytes::new()` (sorted keys, compact separators, no floats).
//!
//! 4. **[`ClaimexError`] hierarchy.** Structured errors with `thiserror`,
//!    no `Box<dyn Error>`, no `.unwrap()` outside tests.

pub mod attribute;
pub mod canonical;
pub mod error;
pub mod identity;
pub mod proof_request;
pub mod schema;

// Re-export primary types at crate root for ergonomic imports.
pub use attribute::{
    encode_attribute, encode_attributes, AttributeValues, Attributes, ClaimAttributes,
};
pub use canonical::CanonicalBytes;
pub use error::{CanonicalizationError, ClaimexError, CryptoError, ValidationError};
pub use identity::{Identifier, Nonce, RequestId, RequestIdGenerator};
pub use proof_request::{AttributeInfo, Predicate, PredicateType, ProofRequest};
pub use schema::{AvailableClaim, SchemaId, SchemaKey, SeqNo};
