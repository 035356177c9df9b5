//! # Credential Engine Traits
//!
//! The interface the agent's role handlers need from a credential engine.
//! Issuance, proof construction and verification all happen behind these
//! traits; the handlers only orchestrate messages around them.
//!
//! All methods are async: a real engine reaches wallet storage and the
//! ledger, which may suspend. Implementations must be `Send + Sync` so an
//! agent can hold them as `Arc<dyn ...>` across tasks.

use async_trait::async_trait;
use claimex_core::{Attributes, ClaimAttributes, ProofRequest, SchemaId, SchemaKey};

use crate::error::EngineError;
use crate::types::{ClaimRequest, ClaimSignature, FullProof, ProofInput, PublicKey, Schema};

/// Wallet lookups shared by every role.
#[async_trait]
pub trait WalletLookup: Send + Sync {
    /// Fetch a schema by key or sequence number.
    async fn get_schema(&self, id: &SchemaId) -> Result<Schema, EngineError>;

    /// Fetch the claim definition of a schema.
    async fn get_public_key(&self, id: &SchemaId) -> Result<PublicKey, EngineError>;
}

/// Issuer side of the engine.
#[async_trait]
pub trait IssuerEngine: WalletLookup {
    /// File attributes for a prover under a schema. Idempotent upsert.
    async fn add_attributes(
        &self,
        schema_key: &SchemaKey,
        user_id: &str,
        attributes: Attributes,
    ) -> Result<(), EngineError>;

    /// Issue a claim bound to a blinded request, returning the signature and
    /// the attested attribute values.
    async fn issue_claim(
        &self,
        id: &SchemaId,
        request: &ClaimRequest,
    ) -> Result<(ClaimSignature, ClaimAttributes), EngineError>;
}

/// Holder side of the engine.
#[async_trait]
pub trait ProverEngine: WalletLookup {
    /// Build a blinded claim request for a schema.
    async fn create_claim_request(
        &self,
        id: &SchemaId,
        prover_id: &str,
        req_non_revoc: bool,
    ) -> Result<ClaimRequest, EngineError>;

    /// Verify an issued claim against the outstanding request and store it.
    async fn process_claim(
        &self,
        id: &SchemaId,
        attributes: ClaimAttributes,
        signature: ClaimSignature,
    ) -> Result<(), EngineError>;

    /// Build a proof from stored claims.
    async fn present_proof(&self, input: &ProofInput) -> Result<FullProof, EngineError>;

    /// Attribute values of the stored claim for a schema.
    async fn get_claim(&self, id: &SchemaId) -> Result<ClaimAttributes, EngineError>;

    /// Signature of the stored claim for a schema.
    async fn get_claim_signature(&self, id: &SchemaId) -> Result<ClaimSignature, EngineError>;
}

/// Verifier side of the engine.
#[async_trait]
pub trait VerifierEngine: WalletLookup {
    /// Check a proof against the request it answers.
    ///
    /// `Ok(false)` means the proof was checked and rejected; `Err` means it
    /// could not be checked at all.
    async fn verify(&self, request: &ProofRequest, proof: &FullProof) -> Result<bool, EngineError>;
}
