//! # In-Memory Public Ledger
//!
//! The public record every agent reads: schemas, claim definitions,
//! identity (NYM) records and attributes (ATTRIB). Every write gets the next
//! sequence number from one shared counter, so a schema and its claim
//! definition never share a number.
//!
//! Shared between agents as `Arc<Ledger>`. Locks are `parking_lot` and are
//! never held across `.await`.

use std::collections::BTreeMap;

use claimex_core::{Identifier, SchemaId, SchemaKey, SeqNo};
use claimex_crypto::Ed25519PublicKey;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::types::{PublicKey, Schema};

/// Role granted to an identity on the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NymRole {
    /// May onboard other identities.
    TrustAnchor,
    /// Ordinary identity.
    User,
}

/// An identity record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NymRecord {
    /// The identity.
    pub identifier: Identifier,
    /// Its verification key, if published.
    pub verkey: Option<Ed25519PublicKey>,
    /// Granted role.
    pub role: NymRole,
    /// Identity that sponsored the write.
    pub sponsor: Identifier,
}

/// An attribute attached to an identity (e.g. its endpoint).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttribRecord {
    /// Identity the attribute describes.
    pub dest: Identifier,
    /// Attribute name, e.g. `endpoint`.
    pub name: String,
    /// Attribute value.
    pub value: String,
    /// Identity that authored the write.
    pub origin: Identifier,
}

/// A queued ledger write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerWrite {
    /// Create or replace an identity record.
    Nym(NymRecord),
    /// Add an attribute to an identity.
    Attrib(AttribRecord),
}

#[derive(Debug, Default)]
struct LedgerState {
    last_seq_no: SeqNo,
    schemas: BTreeMap<SeqNo, Schema>,
    schema_by_key: BTreeMap<SchemaKey, SeqNo>,
    /// Claim definitions keyed by schema sequence number.
    claim_defs: BTreeMap<SeqNo, PublicKey>,
    nyms: BTreeMap<Identifier, NymRecord>,
    attribs: Vec<(SeqNo, AttribRecord)>,
}

impl LedgerState {
    fn next_seq_no(&mut self) -> SeqNo {
        self.last_seq_no += 1;
        self.last_seq_no
    }

    fn resolve_schema(&self, id: &SchemaId) -> Option<&Schema> {
        let seq_no = match id {
            SchemaId::SeqNo(n) => *n,
            SchemaId::Key(key) => *self.schema_by_key.get(key)?,
        };
        self.schemas.get(&seq_no)
    }
}

/// The shared public ledger.
#[derive(Debug, Default)]
pub struct Ledger {
    state: RwLock<LedgerState>,
}

impl Ledger {
    /// An empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Write a schema, returning it with its sequence number. Writing the
    /// same key again returns the existing schema unchanged.
    pub fn add_schema(&self, key: SchemaKey, attr_names: Vec<String>) -> Schema {
        let mut state = self.state.write();
        if let Some(existing) = state
            .schema_by_key
            .get(&key)
            .and_then(|n| state.schemas.get(n))
        {
            return existing.clone();
        }
        let seq_no = state.next_seq_no();
        let schema = Schema {
            name: key.name.clone(),
            version: key.version.clone(),
            issuer_id: key.issuer_id.clone(),
            attr_names,
            seq_no,
        };
        state.schemas.insert(seq_no, schema.clone());
        state.schema_by_key.insert(key, seq_no);
        tracing::debug!(seq_no, schema = %schema.name, "schema written");
        schema
    }

    /// Write the claim definition for a schema.
    ///
    /// # Errors
    ///
    /// [`EngineError::SchemaNotFound`] if the schema is not on the ledger.
    pub fn add_claim_def(
        &self,
        schema_seq_no: SeqNo,
        issuer_id: Identifier,
        verkey: Ed25519PublicKey,
    ) -> Result<PublicKey, EngineError> {
        let mut state = self.state.write();
        if !state.schemas.contains_key(&schema_seq_no) {
            return Err(EngineError::SchemaNotFound(SchemaId::SeqNo(schema_seq_no)));
        }
        if let Some(existing) = state.claim_defs.get(&schema_seq_no) {
            return Ok(existing.clone());
        }
        let seq_no = state.next_seq_no();
        let pk = PublicKey {
            seq_no,
            schema_seq_no,
            issuer_id,
            verkey,
        };
        state.claim_defs.insert(schema_seq_no, pk.clone());
        tracing::debug!(seq_no, schema_seq_no, "claim definition written");
        Ok(pk)
    }

    /// Look up a schema by key or sequence number.
    pub fn get_schema(&self, id: &SchemaId) -> Result<Schema, EngineError> {
        self.state
            .read()
            .resolve_schema(id)
            .cloned()
            .ok_or_else(|| EngineError::SchemaNotFound(id.clone()))
    }

    /// Look up the claim definition of a schema.
    pub fn get_public_key(&self, id: &SchemaId) -> Result<PublicKey, EngineError> {
        let state = self.state.read();
        let schema = state
            .resolve_schema(id)
            .ok_or_else(|| EngineError::SchemaNotFound(id.clone()))?;
        state
            .claim_defs
            .get(&schema.seq_no)
            .cloned()
            .ok_or_else(|| EngineError::PublicKeyNotFound(id.clone()))
    }

    /// Apply a batch of writes in order, returning their sequence numbers.
    pub fn submit(&self, writes: Vec<LedgerWrite>) -> Vec<SeqNo> {
        let mut state = self.state.write();
        writes
            .into_iter()
            .map(|write| {
                let seq_no = state.next_seq_no();
                match write {
                    LedgerWrite::Nym(nym) => {
                        tracing::debug!(seq_no, identifier = %nym.identifier, "nym written");
                        state.nyms.insert(nym.identifier.clone(), nym);
                    }
                    LedgerWrite::Attrib(attrib) => {
                        tracing::debug!(seq_no, dest = %attrib.dest, name = %attrib.name, "attrib written");
                        state.attribs.push((seq_no, attrib));
                    }
                }
                seq_no
            })
            .collect()
    }

    /// The identity record for `identifier`.
    pub fn get_nym(&self, identifier: &Identifier) -> Option<NymRecord> {
        self.state.read().nyms.get(identifier).cloned()
    }

    /// The latest value of attribute `name` on `dest`.
    pub fn get_attrib(&self, dest: &Identifier, name: &str) -> Option<String> {
        self.state
            .read()
            .attribs
            .iter()
            .rev()
            .find(|(_, a)| &a.dest == dest && a.name == name)
            .map(|(_, a)| a.value.clone())
    }
}
