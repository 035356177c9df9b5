//! # Schema References
//!
//! A [`SchemaKey`] (name, version, issuer) is the stable correlation key
//! between an issuer's schema definition and a prover's claim request. The
//! ledger additionally assigns each schema a sequence number; [`SchemaId`]
//! addresses a schema by either.
//!
//! [`AvailableClaim`] is the `{name, version, origin}` triple an issuer
//! advertises in `AVAIL_CLAIM_LIST` and a link records as offered.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::identity::Identifier;

/// A ledger sequence number (schemas, claim definitions).
pub type SeqNo = u64;

/// Identifies a credential schema: name, version and issuing identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SchemaKey {
    /// Schema name, e.g. `Transcript`.
    pub name: String,
    /// Schema version, e.g. `1.2`.
    pub version: String,
    /// Identifier of the issuer that defined the schema.
    #[serde(rename = "issuerId")]
    pub issuer_id: Identifier,
}

impl SchemaKey {
    /// Build a schema key, rejecting an empty name or version.
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        issuer_id: Identifier,
    ) -> Result<Self, ValidationError> {
        let name = name.into();
        let version = version.into();
        if name.trim().is_empty() {
            return Err(ValidationError::InvalidSchemaKey("empty name".to_string()));
        }
        if version.trim().is_empty() {
            return Err(ValidationError::InvalidSchemaKey(format!(
                "empty version for schema {name}"
            )));
        }
        Ok(Self {
            name,
            version,
            issuer_id,
        })
    }
}

impl std::fmt::Display for SchemaKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} v{} ({})", self.name, self.version, self.issuer_id)
    }
}

/// Addresses a schema either by its key or by ledger sequence number.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SchemaId {
    /// Look up by (name, version, issuer).
    Key(SchemaKey),
    /// Look up by ledger sequence number.
    SeqNo(SeqNo),
}

impl From<SchemaKey> for SchemaId {
    fn from(key: SchemaKey) -> Self {
        Self::Key(key)
    }
}

impl From<SeqNo> for SchemaId {
    fn from(seq_no: SeqNo) -> Self {
        Self::SeqNo(seq_no)
    }
}

impl std::fmt::Display for SchemaId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Key(key) => write!(f, "{key}"),
            Self::SeqNo(n) => write!(f, "seq_no {n}"),
        }
    }
}

/// A claim an issuer offers on a link: `{name, version, origin}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AvailableClaim {
    /// Schema name.
    pub name: String,
    /// Schema version.
    pub version: String,
    /// Issuer identifier.
    pub origin: Identifier,
}

impl AvailableClaim {
    /// The schema key this offer refers to.
    pub fn schema_key(&self) -> SchemaKey {
        SchemaKey {
            name: self.name.clone(),
            version: self.version.clone(),
            issuer_id: self.origin.clone(),
        }
    }
}

impl From<&SchemaKey> for AvailableClaim {
    fn from(key: &SchemaKey) -> Self {
        Self {
            name: key.name.clone(),
            version: key.version.clone(),
            origin: key.issuer_id.clone(),
        }
    }
}
