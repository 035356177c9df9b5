//! # Engine Wire Types
//!
//! Public ledger records and the objects exchanged inside agent messages:
//! blinded claim requests, claim signatures, proof input and full proofs.
//! Field names match the message bodies the agents exchange.

use std::collections::BTreeMap;

use claimex_core::{
    AttributeInfo, ClaimAttributes, Identifier, Predicate, ProofRequest, SchemaKey, SeqNo,
};
use claimex_crypto::Ed25519PublicKey;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Ledger records
// ---------------------------------------------------------------------------

/// A schema as written to the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    /// Schema name.
    pub name: String,
    /// Schema version.
    pub version: String,
    /// Identifier of the defining issuer.
    pub issuer_id: Identifier,
    /// Attribute names a claim of this schema carries.
    pub attr_names: Vec<String>,
    /// Ledger sequence number.
    pub seq_no: SeqNo,
}

impl Schema {
    /// The schema's stable key.
    pub fn key(&self) -> SchemaKey {
        SchemaKey {
            name: self.name.clone(),
            version: self.version.clone(),
            issuer_id: self.issuer_id.clone(),
        }
    }
}

/// A claim definition: the issuer key claims of one schema are signed with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKey {
    /// Ledger sequence number of the claim definition.
    pub seq_no: SeqNo,
    /// Schema this key signs claims for.
    pub schema_seq_no: SeqNo,
    /// Issuer that published the definition.
    pub issuer_id: Identifier,
    /// Verification key.
    pub verkey: Ed25519PublicKey,
}

// ---------------------------------------------------------------------------
// Issuance
// ---------------------------------------------------------------------------

/// Blinded claim request (`blinded_ms` on the wire).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimRequest {
    /// Prover-chosen correlation id the issuer files attributes under.
    pub prover_did: String,
    /// Blinded master secret commitment, decimal.
    pub u: String,
    /// Revocation commitment; `None` when non-revocation was not requested.
    #[serde(default)]
    pub ur: Option<String>,
}

/// Primary (non-revocation-free) part of a claim signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrimaryClaim {
    /// Encoded prover context.
    pub m2: String,
    /// Signature value.
    pub a: String,
    /// Digest of the signed payload.
    pub e: String,
    /// Blinding echo.
    pub v: String,
}

/// Signature over an issued claim (`claims_signature` on the wire).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimSignature {
    /// Primary claim signature.
    pub primary_claim: PrimaryClaim,
    /// Non-revocation part; always serialized, `null` when absent.
    #[serde(default)]
    pub non_revoc_claim: Option<serde_json::Value>,
}

// ---------------------------------------------------------------------------
// Presentation
// ---------------------------------------------------------------------------

/// What a prover is asked to prove.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofInput {
    /// Verifier nonce, decimal.
    pub nonce: String,
    /// Revealed attributes by referent.
    pub revealed_attrs: BTreeMap<String, AttributeInfo>,
    /// Predicates by referent.
    pub predicates: BTreeMap<String, Predicate>,
}

impl From<&ProofRequest> for ProofInput {
    fn from(req: &ProofRequest) -> Self {
        Self {
            nonce: req.nonce.clone(),
            revealed_attrs: req.verifiable_attributes.clone(),
            predicates: req.predicates.clone(),
        }
    }
}

/// Proof contributed by one claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubProof {
    /// Schema of the claim.
    pub schema_seq_no: SeqNo,
    /// Issuer of the claim.
    pub issuer_did: Identifier,
    /// Prover id the claim was issued to.
    pub prover_did: String,
    /// Blinded commitment the claim was issued against.
    pub u: String,
    /// Claim attributes.
    pub attrs: ClaimAttributes,
    /// Issuer signature over the claim.
    pub claim_signature: ClaimSignature,
}

/// Binds all sub-proofs to the verifier nonce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatedProof {
    /// Hex digest over the nonce and the sub-proofs.
    pub c_hash: String,
}

/// A revealed attribute in the requested proof: `[claim referent, raw, encoded]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(String, String, String)", into = "(String, String, String)")]
pub struct RevealedAttr {
    /// Key of the sub-proof that reveals it.
    pub claim_referent: String,
    /// Raw value.
    pub raw: String,
    /// Encoded value.
    pub encoded: String,
}

impl From<(String, String, String)> for RevealedAttr {
    fn from((claim_referent, raw, encoded): (String, String, String)) -> Self {
        Self {
            claim_referent,
            raw,
            encoded,
        }
    }
}

impl From<RevealedAttr> for (String, String, String) {
    fn from(r: RevealedAttr) -> Self {
        (r.claim_referent, r.raw, r.encoded)
    }
}

/// Maps each requested referent to the sub-proof answering it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestedProof {
    /// Revealed attributes by referent.
    #[serde(default)]
    pub revealed_attrs: BTreeMap<String, RevealedAttr>,
    /// Predicate referent → sub-proof key.
    #[serde(default)]
    pub predicates: BTreeMap<String, String>,
    /// Holder-attested values.
    #[serde(default)]
    pub self_attested_attrs: BTreeMap<String, String>,
}

/// A complete proof as carried in a `PROOF` message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FullProof {
    /// Sub-proofs keyed by claim referent.
    pub proofs: BTreeMap<String, SubProof>,
    /// Aggregate over all sub-proofs.
    pub aggregated_proof: AggregatedProof,
    /// Referent mapping.
    pub requested_proof: RequestedProof,
}
