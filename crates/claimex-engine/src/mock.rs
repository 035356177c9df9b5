//! # Mock Credential Engine
//!
//! A deterministic, transparent engine for all three roles. Claims are
//! Ed25519 signatures over the canonical claim payload; proofs carry the
//! signed claims themselves, bound to the verifier nonce by a SHA-256
//! aggregate.
//!
//! ## Security Notice
//!
//! This engine provides NO privacy. A proof discloses every attribute of
//! every claim it uses, and the blinded master secret is a plain digest.
//! It exists so the protocol layer can be exercised end to end; a real
//! anonymous-credential engine plugs in behind the same traits.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use claimex_core::{
    encode_attribute, encode_attributes, Attributes, CanonicalBytes, CanonicalizationError,
    ClaimAttributes, Identifier, ProofRequest, SchemaId, SchemaKey, SeqNo,
};
use claimex_crypto::{sha256_hex, verify, Ed25519KeyPair, Ed25519Signature};
use parking_lot::RwLock;

use crate::attr_repo::AttributeRepo;
use crate::error::EngineError;
use crate::ledger::Ledger;
use crate::traits::{IssuerEngine, ProverEngine, VerifierEngine, WalletLookup};
use crate::types::{
    AggregatedProof, ClaimRequest, ClaimSignature, FullProof, PrimaryClaim, ProofInput, PublicKey,
    RequestedProof, RevealedAttr, Schema, SubProof,
};

// ---------------------------------------------------------------------------
// Shared payload construction
// ---------------------------------------------------------------------------

/// The bytes an issuer signs for one claim.
fn claim_payload(
    schema_seq_no: SeqNo,
    prover_did: &str,
    u: &str,
    attrs: &ClaimAttributes,
) -> Result<CanonicalBytes, CanonicalizationError> {
    CanonicalBytes::new(&serde_json::json!({
        "schema_seq_no": schema_seq_no,
        "prover_did": prover_did,
        "u": u,
        "attrs": attrs,
    }))
}

/// Aggregate digest binding sub-proofs to a nonce.
fn aggregate_hash(
    nonce: &str,
    proofs: &BTreeMap<String, SubProof>,
) -> Result<String, CanonicalizationError> {
    let bytes = CanonicalBytes::new(&serde_json::json!({"nonce": nonce, "proofs": proofs}))?;
    Ok(sha256_hex(&bytes))
}

fn check_sub_proof(sub: &SubProof, pk: &PublicKey) -> Result<(), String> {
    if pk.issuer_id != sub.issuer_did {
        return Err(format!(
            "claim definition for schema {} belongs to {}, proof names {}",
            sub.schema_seq_no, pk.issuer_id, sub.issuer_did
        ));
    }
    for (name, values) in &sub.attrs {
        values.check(name).map_err(|e| e.to_string())?;
    }
    let payload = claim_payload(sub.schema_seq_no, &sub.prover_did, &sub.u, &sub.attrs)
        .map_err(|e| e.to_string())?;
    let sig = Ed25519Signature::from_hex(&sub.claim_signature.primary_claim.a)
        .map_err(|e| e.to_string())?;
    verify(&payload, &sig, &pk.verkey).map_err(|e| e.to_string())
}

// ---------------------------------------------------------------------------
// Issuer
// ---------------------------------------------------------------------------

/// Mock issuer: defines schemas, publishes claim definitions, signs claims.
#[derive(Debug)]
pub struct MockIssuer {
    identifier: Identifier,
    keys: Ed25519KeyPair,
    ledger: Arc<Ledger>,
    attr_repo: AttributeRepo,
}

impl MockIssuer {
    /// An issuer signing as `identifier` with claim-definition key `keys`.
    pub fn new(identifier: Identifier, keys: Ed25519KeyPair, ledger: Arc<Ledger>) -> Self {
        Self {
            identifier,
            keys,
            ledger,
            attr_repo: AttributeRepo::new(),
        }
    }

    /// The issuer's identifier.
    pub fn identifier(&self) -> &Identifier {
        &self.identifier
    }

    /// The attribute repository claims are issued from.
    pub fn attr_repo(&self) -> &AttributeRepo {
        &self.attr_repo
    }

    /// Write a schema owned by this issuer.
    pub fn define_schema(
        &self,
        name: &str,
        version: &str,
        attr_names: &[&str],
    ) -> Result<Schema, EngineError> {
        let key = SchemaKey::new(name, version, self.identifier.clone())?;
        let names = attr_names.iter().map(|n| n.to_string()).collect();
        Ok(self.ledger.add_schema(key, names))
    }

    /// Publish this issuer's key as the claim definition of a schema.
    pub fn generate_claim_def(&self, schema_seq_no: SeqNo) -> Result<PublicKey, EngineError> {
        self.ledger
            .add_claim_def(schema_seq_no, self.identifier.clone(), self.keys.public_key())
    }
}

#[async_trait]
impl WalletLookup for MockIssuer {
    async fn get_schema(&self, id: &SchemaId) -> Result<Schema, EngineError> {
        self.ledger.get_schema(id)
    }

    async fn get_public_key(&self, id: &SchemaId) -> Result<PublicKey, EngineError> {
        self.ledger.get_public_key(id)
    }
}

#[async_trait]
impl IssuerEngine for MockIssuer {
    async fn add_attributes(
        &self,
        schema_key: &SchemaKey,
        user_id: &str,
        attributes: Attributes,
    ) -> Result<(), EngineError> {
        self.attr_repo.add_attributes(schema_key, user_id, attributes);
        Ok(())
    }

    async fn issue_claim(
        &self,
        id: &SchemaId,
        request: &ClaimRequest,
    ) -> Result<(ClaimSignature, ClaimAttributes), EngineError> {
        let schema = self.ledger.get_schema(id)?;
        let pk = self.ledger.get_public_key(id)?;
        if pk.verkey != self.keys.public_key() {
            return Err(EngineError::InvalidClaimRequest(format!(
                "claim definition for {id} is not held by {}",
                self.identifier
            )));
        }

        let not_found = || EngineError::AttributesNotFound {
            schema: id.clone(),
            user_id: request.prover_did.clone(),
        };
        let filed = self
            .attr_repo
            .get_attributes(&schema.key(), &request.prover_did)
            .ok_or_else(not_found)?;
        let mut raw = Attributes::new();
        for name in &schema.attr_names {
            let value = filed.get(name).ok_or_else(not_found)?;
            raw.insert(name.clone(), value.clone());
        }
        let attrs = encode_attributes(&raw);

        let payload = claim_payload(schema.seq_no, &request.prover_did, &request.u, &attrs)?;
        let signature = ClaimSignature {
            primary_claim: PrimaryClaim {
                m2: encode_attribute(&request.prover_did),
                a: self.keys.sign(&payload).to_hex(),
                e: sha256_hex(&payload),
                v: request.u.clone(),
            },
            non_revoc_claim: None,
        };
        tracing::info!(
            schema_seq_no = schema.seq_no,
            prover = %request.prover_did,
            "claim issued"
        );
        Ok((signature, attrs))
    }
}

// ---------------------------------------------------------------------------
// Prover
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct StoredClaim {
    schema: Schema,
    request: ClaimRequest,
    attrs: ClaimAttributes,
    signature: ClaimSignature,
}

#[derive(Debug, Default)]
struct ProverWallet {
    /// Outstanding claim requests by schema sequence number.
    pending: BTreeMap<SeqNo, ClaimRequest>,
    claims: BTreeMap<SeqNo, StoredClaim>,
}

/// Mock prover: holds a master secret, requests and stores claims, builds
/// proofs.
#[derive(Debug)]
pub struct MockProver {
    ledger: Arc<Ledger>,
    master_secret: String,
    wallet: RwLock<ProverWallet>,
}

impl MockProver {
    /// A prover with a fresh random master secret.
    pub fn new(ledger: Arc<Ledger>) -> Self {
        let secret: [u8; 32] = rand::random();
        Self::with_master_secret(ledger, &secret)
    }

    /// A prover with a fixed master secret.
    pub fn with_master_secret(ledger: Arc<Ledger>, secret: &[u8; 32]) -> Self {
        Self {
            ledger,
            master_secret: secret.iter().map(|b| format!("{b:02x}")).collect(),
            wallet: RwLock::new(ProverWallet::default()),
        }
    }

    fn blind(&self, schema_seq_no: SeqNo, prover_id: &str) -> Result<String, EngineError> {
        let bytes = CanonicalBytes::new(&serde_json::json!({
            "ms": self.master_secret,
            "prover_id": prover_id,
            "schema_seq_no": schema_seq_no,
        }))?;
        Ok(encode_attribute(&sha256_hex(&bytes)))
    }

    fn stored_claim(&self, id: &SchemaId) -> Result<StoredClaim, EngineError> {
        let schema = self.ledger.get_schema(id)?;
        self.wallet
            .read()
            .claims
            .get(&schema.seq_no)
            .cloned()
            .ok_or_else(|| EngineError::ClaimNotFound(id.clone()))
    }
}

/// Add the sub-proof for `claim` if absent, returning its key.
fn add_sub_proof(claim: &StoredClaim, proofs: &mut BTreeMap<String, SubProof>) -> String {
    let key = claim.schema.seq_no.to_string();
    proofs.entry(key.clone()).or_insert_with(|| SubProof {
        schema_seq_no: claim.schema.seq_no,
        issuer_did: claim.schema.issuer_id.clone(),
        prover_did: claim.request.prover_did.clone(),
        u: claim.request.u.clone(),
        attrs: claim.attrs.clone(),
        claim_signature: claim.signature.clone(),
    });
    key
}

#[async_trait]
impl WalletLookup for MockProver {
    async fn get_schema(&self, id: &SchemaId) -> Result<Schema, EngineError> {
        self.ledger.get_schema(id)
    }

    async fn get_public_key(&self, id: &SchemaId) -> Result<PublicKey, EngineError> {
        self.ledger.get_public_key(id)
    }
}

#[async_trait]
impl ProverEngine for MockProver {
    async fn create_claim_request(
        &self,
        id: &SchemaId,
        prover_id: &str,
        req_non_revoc: bool,
    ) -> Result<ClaimRequest, EngineError> {
        if req_non_revoc {
            return Err(EngineError::InvalidClaimRequest(
                "non-revocation is not supported by the mock engine".to_string(),
            ));
        }
        if prover_id.is_empty() {
            return Err(EngineError::InvalidClaimRequest("empty prover id".to_string()));
        }
        let schema = self.ledger.get_schema(id)?;
        self.ledger.get_public_key(id)?;
        let request = ClaimRequest {
            prover_did: prover_id.to_string(),
            u: self.blind(schema.seq_no, prover_id)?,
            ur: None,
        };
        self.wallet
            .write()
            .pending
            .insert(schema.seq_no, request.clone());
        Ok(request)
    }

    async fn process_claim(
        &self,
        id: &SchemaId,
        attributes: ClaimAttributes,
        signature: ClaimSignature,
    ) -> Result<(), EngineError> {
        let schema = self.ledger.get_schema(id)?;
        let pk = self.ledger.get_public_key(id)?;
        let request = {
            let wallet = self.wallet.read();
            match wallet.pending.get(&schema.seq_no) {
                Some(request) => request.clone(),
                // Re-delivery of the claim already stored.
                None if wallet
                    .claims
                    .get(&schema.seq_no)
                    .is_some_and(|c| c.signature == signature && c.attrs == attributes) =>
                {
                    tracing::debug!(schema_seq_no = schema.seq_no, "claim already stored");
                    return Ok(());
                }
                None => {
                    return Err(EngineError::InvalidClaimRequest(format!(
                        "no outstanding claim request for {id}"
                    )))
                }
            }
        };

        let primary = &signature.primary_claim;
        if primary.v != request.u || primary.m2 != encode_attribute(&request.prover_did) {
            return Err(EngineError::InvalidClaimRequest(
                "claim was not issued against the outstanding request".to_string(),
            ));
        }
        for (name, values) in &attributes {
            if !schema.attr_names.contains(name) {
                return Err(EngineError::InvalidClaimRequest(format!(
                    "attribute \"{name}\" is not part of schema {}",
                    schema.name
                )));
            }
            values.check(name)?;
        }

        let payload = claim_payload(schema.seq_no, &request.prover_did, &request.u, &attributes)?;
        let sig = Ed25519Signature::from_hex(&primary.a)
            .map_err(|e| EngineError::SignatureInvalid(e.to_string()))?;
        verify(&payload, &sig, &pk.verkey)
            .map_err(|e| EngineError::SignatureInvalid(e.to_string()))?;

        let mut wallet = self.wallet.write();
        wallet.pending.remove(&schema.seq_no);
        wallet.claims.insert(
            schema.seq_no,
            StoredClaim {
                schema: schema.clone(),
                request,
                attrs: attributes,
                signature,
            },
        );
        tracing::info!(schema_seq_no = schema.seq_no, schema = %schema.name, "claim stored");
        Ok(())
    }

    async fn present_proof(&self, input: &ProofInput) -> Result<FullProof, EngineError> {
        if input.nonce.is_empty() || !input.nonce.chars().all(|c| c.is_ascii_digit()) {
            return Err(EngineError::ProofGeneration(format!(
                "nonce \"{}\" is not a decimal integer",
                input.nonce
            )));
        }
        let claims: Vec<StoredClaim> = self.wallet.read().claims.values().cloned().collect();

        let mut proofs = BTreeMap::new();
        let mut requested = RequestedProof::default();

        for (referent, info) in &input.revealed_attrs {
            let found = claims.iter().find_map(|c| {
                let values = c.attrs.get(&info.name)?;
                let seq_ok = info.schema_seq_no.map_or(true, |n| n == c.schema.seq_no);
                let issuer_ok = info.issuer_did.as_ref().map_or(true, |d| d == &c.schema.issuer_id);
                (seq_ok && issuer_ok).then_some((c, values))
            });
            let (claim, values) = found.ok_or_else(|| {
                EngineError::ProofGeneration(format!("no claim supplies attribute \"{}\"", info.name))
            })?;
            let key = add_sub_proof(claim, &mut proofs);
            requested.revealed_attrs.insert(
                referent.clone(),
                RevealedAttr {
                    claim_referent: key,
                    raw: values.raw.clone(),
                    encoded: values.encoded.clone(),
                },
            );
        }

        for (referent, predicate) in &input.predicates {
            let claim = claims
                .iter()
                .find(|c| {
                    c.attrs
                        .get(&predicate.attr_name)
                        .is_some_and(|v| predicate.is_satisfied_by(&v.raw))
                })
                .ok_or_else(|| {
                    EngineError::ProofGeneration(format!(
                        "no claim satisfies {} >= {}",
                        predicate.attr_name, predicate.value
                    ))
                })?;
            let key = add_sub_proof(claim, &mut proofs);
            requested.predicates.insert(referent.clone(), key);
        }

        let c_hash = aggregate_hash(&input.nonce, &proofs)?;
        Ok(FullProof {
            proofs,
            aggregated_proof: AggregatedProof { c_hash },
            requested_proof: requested,
        })
    }

    async fn get_claim(&self, id: &SchemaId) -> Result<ClaimAttributes, EngineError> {
        Ok(self.stored_claim(id)?.attrs)
    }

    async fn get_claim_signature(&self, id: &SchemaId) -> Result<ClaimSignature, EngineError> {
        Ok(self.stored_claim(id)?.signature)
    }
}

// ---------------------------------------------------------------------------
// Verifier
// ---------------------------------------------------------------------------

/// Mock verifier: checks claim signatures, the nonce binding and that each
/// requested referent is answered.
#[derive(Debug)]
pub struct MockVerifier {
    ledger: Arc<Ledger>,
}

impl MockVerifier {
    /// A verifier reading claim definitions from `ledger`.
    pub fn new(ledger: Arc<Ledger>) -> Self {
        Self { ledger }
    }
}

#[async_trait]
impl WalletLookup for MockVerifier {
    async fn get_schema(&self, id: &SchemaId) -> Result<Schema, EngineError> {
        self.ledger.get_schema(id)
    }

    async fn get_public_key(&self, id: &SchemaId) -> Result<PublicKey, EngineError> {
        self.ledger.get_public_key(id)
    }
}

#[async_trait]
impl VerifierEngine for MockVerifier {
    async fn verify(&self, request: &ProofRequest, proof: &FullProof) -> Result<bool, EngineError> {
        if aggregate_hash(&request.nonce, &proof.proofs)? != proof.aggregated_proof.c_hash {
            tracing::debug!(proof_request = %request.name, "aggregate does not match nonce");
            return Ok(false);
        }

        for (key, sub) in &proof.proofs {
            let pk = self
                .ledger
                .get_public_key(&SchemaId::SeqNo(sub.schema_seq_no))?;
            if let Err(reason) = check_sub_proof(sub, &pk) {
                tracing::debug!(proof_request = %request.name, claim = %key, %reason, "sub-proof rejected");
                return Ok(false);
            }
        }

        for (referent, info) in &request.verifiable_attributes {
            let answered = proof
                .requested_proof
                .revealed_attrs
                .get(referent)
                .and_then(|r| Some((r, proof.proofs.get(&r.claim_referent)?)))
                .filter(|(r, sub)| {
                    sub.attrs
                        .get(&info.name)
                        .is_some_and(|v| v.raw == r.raw && v.encoded == r.encoded)
                        && info.schema_seq_no.map_or(true, |n| n == sub.schema_seq_no)
                        && info.issuer_did.as_ref().map_or(true, |d| d == &sub.issuer_did)
                });
            if answered.is_none() {
                tracing::debug!(proof_request = %request.name, %referent, "revealed attribute not proven");
                return Ok(false);
            }
        }

        for (referent, predicate) in &request.predicates {
            let satisfied = proof
                .requested_proof
                .predicates
                .get(referent)
                .and_then(|key| proof.proofs.get(key))
                .and_then(|sub| sub.attrs.get(&predicate.attr_name))
                .is_some_and(|v| predicate.is_satisfied_by(&v.raw));
            if !satisfied {
                tracing::debug!(proof_request = %request.name, %referent, "predicate not proven");
                return Ok(false);
            }
        }

        Ok(true)
    }
}
