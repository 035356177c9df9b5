//! # Links and the Link Store
//!
//! A [`Link`] is the relationship record between this agent and one
//! counterparty: who signs on each side, where the counterparty listens,
//! which claims are offered and received, which proof requests are
//! outstanding and which proofs were verified.
//!
//! The [`LinkStore`] owns link records. Handlers take a copy, do their work,
//! and write back through [`LinkStore::update`], which applies one closure
//! under one write lock. Handlers re-read the link after any suspension
//! point instead of writing back a stale copy.

use std::collections::BTreeMap;

use claimex_core::{
    Attributes, AvailableClaim, Identifier, Nonce, ProofRequest, RequestId, SchemaKey,
};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Invitation state of a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkState {
    /// Invitation issued or received, not yet accepted.
    Pending,
    /// Invitation accepted; both sides know each other's identifier.
    Accepted,
}

/// Verdict recorded for a proof this agent verified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofResult {
    /// Whether the proof verified.
    pub verified: bool,
    /// Revealed attribute values by referent.
    pub revealed: BTreeMap<String, String>,
}

/// One relationship with a counterparty.
#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    /// Local name of the link, usually the counterparty's name.
    pub name: String,
    /// Identifier this agent signs with on this link.
    pub local_identifier: Identifier,
    /// Identifier the counterparty signs with, once known.
    pub remote_identifier: Option<Identifier>,
    /// Transport address of the counterparty, once known.
    pub remote_endpoint: Option<String>,
    /// Nonce from the invitation; identifies the link in early messages.
    pub invitation_nonce: Nonce,
    /// Issuer-side id of the counterparty's backend record.
    pub internal_id: Option<String>,
    /// Invitation state.
    pub state: LinkState,
    /// Claims the counterparty offers on this link.
    pub available_claims: Vec<AvailableClaim>,
    /// Raw attribute values of claims received on this link.
    pub received_claims: BTreeMap<SchemaKey, Attributes>,
    /// Proof requests received on (prover) or sent over (verifier) this link.
    pub proof_requests: Vec<ProofRequest>,
    /// `reqId` of the latest `PROOF_REQUEST` message carrying each request,
    /// by proof-request name.
    pub proof_request_ids: BTreeMap<String, RequestId>,
    /// Verdicts on proofs received over this link, by proof-request name.
    pub verified_claim_proofs: BTreeMap<String, ProofResult>,
}

impl Link {
    /// A pending link with nothing exchanged yet.
    pub fn new(name: impl Into<String>, local_identifier: Identifier, invitation_nonce: Nonce) -> Self {
        Self {
            name: name.into(),
            local_identifier,
            remote_identifier: None,
            remote_endpoint: None,
            invitation_nonce,
            internal_id: None,
            state: LinkState::Pending,
            available_claims: Vec::new(),
            received_claims: BTreeMap::new(),
            proof_requests: Vec::new(),
            proof_request_ids: BTreeMap::new(),
            verified_claim_proofs: BTreeMap::new(),
        }
    }

    /// Mark the invitation accepted and record the counterparty.
    pub fn accept(mut self, remote_identifier: Identifier, remote_endpoint: impl Into<String>) -> Self {
        self.remote_identifier = Some(remote_identifier);
        self.remote_endpoint = Some(remote_endpoint.into());
        self.state = LinkState::Accepted;
        self
    }

    /// Set the issuer-side backend record id.
    pub fn with_internal_id(mut self, internal_id: impl Into<String>) -> Self {
        self.internal_id = Some(internal_id.into());
        self
    }

    /// Whether messages can be signed and sent on this link.
    pub fn is_ready(&self) -> bool {
        self.state == LinkState::Accepted && self.remote_endpoint.is_some()
    }

    /// Whether a claim of schema `key` is offered.
    pub fn offers(&self, key: &SchemaKey) -> bool {
        self.available_claims.iter().any(|c| &c.schema_key() == key)
    }

    /// Merge offered claims, skipping ones already listed.
    pub fn merge_available_claims(&mut self, claims: impl IntoIterator<Item = AvailableClaim>) {
        for claim in claims {
            if !self.available_claims.contains(&claim) {
                self.available_claims.push(claim);
            }
        }
    }

    /// The outstanding proof request with this name.
    pub fn find_proof_request(&self, name: &str) -> Option<&ProofRequest> {
        self.proof_requests.iter().find(|r| r.name == name)
    }

    /// Append a proof request unless one with the same name exists.
    /// Returns `false` for a duplicate.
    pub fn add_proof_request(&mut self, request: ProofRequest) -> bool {
        if self.find_proof_request(&request.name).is_some() {
            return false;
        }
        self.proof_requests.push(request);
        true
    }

    /// Store `request`, replacing any request with the same name. Returns
    /// the replaced request.
    pub fn replace_proof_request(&mut self, request: ProofRequest) -> Option<ProofRequest> {
        match self.proof_requests.iter_mut().find(|r| r.name == request.name) {
            Some(existing) => Some(std::mem::replace(existing, request)),
            None => {
                self.proof_requests.push(request);
                None
            }
        }
    }
}

/// Owner of link records.
///
/// Enumeration order ([`LinkStore::list`]) is insertion order and must be
/// stable: the claim selector breaks ties by it.
pub trait LinkStore: Send + Sync {
    /// Insert a link, replacing (in place) any link with the same name.
    /// Returns the replaced link.
    fn insert(&self, link: Link) -> Option<Link>;

    /// The link named `name`.
    fn get(&self, name: &str) -> Option<Link>;

    /// The link created from invitation `nonce`.
    fn find_by_nonce(&self, nonce: &Nonce) -> Option<Link>;

    /// The link whose counterparty signs as `identifier`.
    fn find_by_remote_identifier(&self, identifier: &Identifier) -> Option<Link>;

    /// All links in insertion order.
    fn list(&self) -> Vec<Link>;

    /// Update a link in place. Returns the updated link, or `None` if not found.
    fn update(&self, name: &str, f: &mut dyn FnMut(&mut Link)) -> Option<Link>;
}

/// Thread-safe in-memory link store.
///
/// Synchronous: the lock is `parking_lot` and is never held across `.await`.
#[derive(Debug, Default)]
pub struct InMemoryLinkStore {
    links: RwLock<Vec<Link>>,
}

impl InMemoryLinkStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of links.
    pub fn len(&self) -> usize {
        self.links.read().len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn find(&self, pred: impl Fn(&Link) -> bool) -> Option<Link> {
        self.links.read().iter().find(|l| pred(l)).cloned()
    }
}

impl LinkStore for InMemoryLinkStore {
    fn insert(&self, link: Link) -> Option<Link> {
        let mut links = self.links.write();
        match links.iter_mut().find(|l| l.name == link.name) {
            Some(existing) => Some(std::mem::replace(existing, link)),
            None => {
                links.push(link);
                None
            }
        }
    }

    fn get(&self, name: &str) -> Option<Link> {
        self.find(|l| l.name == name)
    }

    fn find_by_nonce(&self, nonce: &Nonce) -> Option<Link> {
        self.find(|l| &l.invitation_nonce == nonce)
    }

    fn find_by_remote_identifier(&self, identifier: &Identifier) -> Option<Link> {
        self.find(|l| l.remote_identifier.as_ref() == Some(identifier))
    }

    fn list(&self) -> Vec<Link> {
        self.links.read().clone()
    }

    fn update(&self, name: &str, f: &mut dyn FnMut(&mut Link)) -> Option<Link> {
        let mut links = self.links.write();
        let link = links.iter_mut().find(|l| l.name == name)?;
        f(link);
        Some(link.clone())
    }
}
