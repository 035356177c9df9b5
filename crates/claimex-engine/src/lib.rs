#![deny(missing_docs)]

//! # claimex-engine — Credential Engine Seam
//!
//! Everything the agent's role handlers delegate: claim issuance, claim
//! storage, proof construction and proof verification, plus the public
//! ledger the roles read schemas and claim definitions from.
//!
//! ## Architecture
//!
//! - [`traits`] defines the async interfaces ([`WalletLookup`],
//!   [`IssuerEngine`], [`ProverEngine`], [`VerifierEngine`]).
//! - [`types`] holds the wire objects the engine produces and consumes.
//! - [`ledger`] is an in-memory public ledger shared by all agents.
//! - [`attr_repo`] is the issuer's idempotent attribute repository.
//! - [`mock`] implements all three roles transparently (feature `mock`,
//!   on by default). It gives no privacy and is meant for tests and demos.

pub mod attr_repo;
pub mod error;
pub mod ledger;
#[cfg(feature = "mock")]
pub mod mock;
pub mod traits;
pub mod types;

pub use attr_repo::AttributeRepo;
pub use error::EngineError;
pub use ledger::{AttribRecord, Ledger, LedgerWrite, NymRecord, NymRole};
#[cfg(feature = "mock")]
pub use mock::{MockIssuer, MockProver, MockVerifier};
pub use traits::{IssuerEngine, ProverEngine, VerifierEngine, WalletLookup};
pub use types::{
    AggregatedProof, ClaimRequest, ClaimSignature, FullProof, PrimaryClaim, ProofInput, PublicKey,
    RequestedProof, RevealedAttr, Schema, SubProof,
};
