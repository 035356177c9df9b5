//! # Proof Requests
//!
//! A verifier names what it wants proven: attributes to reveal from issued
//! claims, predicates over numeric attributes, and attributes the holder may
//! self-attest. A link keeps at most one pending request per name.
//!
//! Wire form:
//!
//! ```json
//! {
//!   "name": "Job-Application",
//!   "version": "0.2",
//!   "nonce": "1871218719015472932666560146158750511756",
//!   "attributes": {"first_name": "string", "ssn": "string"},
//!   "verifiableAttributes": {"attr_uuid": {"name": "ssn", "schema_seq_no": 13, "issuer_did": "FuN9..."}},
//!   "predicates": {"pred_uuid": {"attr_name": "year", "p_type": ">=", "value": 2010}},
//!   "selfAttestedAttrs": {"first_name": "Alice"}
//! }
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::identity::Identifier;
use crate::schema::SeqNo;

/// A revealed attribute a verifier asks for, optionally pinned to a schema
/// and issuer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeInfo {
    /// Attribute name.
    pub name: String,
    /// Restrict to claims of this schema.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_seq_no: Option<SeqNo>,
    /// Restrict to claims from this issuer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer_did: Option<Identifier>,
}

impl AttributeInfo {
    /// An unrestricted revealed attribute.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schema_seq_no: None,
            issuer_did: None,
        }
    }
}

/// Comparison a predicate applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PredicateType {
    /// Attribute value is greater than or equal to the bound.
    #[serde(rename = ">=")]
    GE,
}

/// A predicate over a numeric attribute, proven without revealing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Predicate {
    /// Attribute the predicate constrains.
    pub attr_name: String,
    /// Comparison applied.
    pub p_type: PredicateType,
    /// Bound the attribute is compared against.
    pub value: i64,
}

impl Predicate {
    /// `attr_name >= value`.
    pub fn ge(attr_name: impl Into<String>, value: i64) -> Self {
        Self {
            attr_name: attr_name.into(),
            p_type: PredicateType::GE,
            value,
        }
    }

    /// Whether `raw` satisfies this predicate. Non-integer values never do.
    pub fn is_satisfied_by(&self, raw: &str) -> bool {
        match (self.p_type, raw.trim().parse::<i64>()) {
            (PredicateType::GE, Ok(v)) => v >= self.value,
            (_, Err(_)) => false,
        }
    }
}

/// A named request for a proof.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofRequest {
    /// Request name; unique among a link's pending requests.
    pub name: String,
    /// Request version.
    pub version: String,
    /// Verifier nonce as a decimal integer string.
    pub nonce: String,
    /// Attributes the verifier asks about, name → type hint or value.
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    /// Revealed attributes to be backed by claims, keyed by referent.
    #[serde(rename = "verifiableAttributes", default)]
    pub verifiable_attributes: BTreeMap<String, AttributeInfo>,
    /// Predicates to be proven, keyed by referent.
    #[serde(default)]
    pub predicates: BTreeMap<String, Predicate>,
    /// Values the holder attests directly, without claim backing.
    #[serde(rename = "selfAttestedAttrs", default)]
    pub self_attested_attrs: BTreeMap<String, String>,
}

impl ProofRequest {
    /// Create an empty request.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidProofRequest`] if the name is empty
    /// or the nonce is not a decimal integer.
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        nonce: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let req = Self {
            name: name.into(),
            version: version.into(),
            nonce: nonce.into(),
            attributes: BTreeMap::new(),
            verifiable_attributes: BTreeMap::new(),
            predicates: BTreeMap::new(),
            self_attested_attrs: BTreeMap::new(),
        };
        req.validate()?;
        Ok(req)
    }

    /// Add a revealed attribute under `referent`.
    pub fn with_verifiable_attribute(mut self, referent: impl Into<String>, info: AttributeInfo) -> Self {
        self.attributes
            .entry(info.name.clone())
            .or_insert_with(|| "string".to_string());
        self.verifiable_attributes.insert(referent.into(), info);
        self
    }

    /// Add a predicate under `referent`.
    pub fn with_predicate(mut self, referent: impl Into<String>, predicate: Predicate) -> Self {
        self.predicates.insert(referent.into(), predicate);
        self
    }

    /// Add a self-attested attribute.
    pub fn with_self_attested(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        self.attributes
            .entry(name.clone())
            .or_insert_with(|| "string".to_string());
        self.self_attested_attrs.insert(name, value.into());
        self
    }

    /// Check structural validity of a request received off the wire.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::InvalidProofRequest("empty name".to_string()));
        }
        if self.nonce.is_empty() || !self.nonce.chars().all(|c| c.is_ascii_digit()) {
            return Err(ValidationError::InvalidProofRequest(format!(
                "nonce \"{}\" is not a decimal integer",
                self.nonce
            )));
        }
        Ok(())
    }

    /// Names of the attributes that must be backed by claims, in referent
    /// order, deduplicated. Predicate attributes follow revealed ones.
    pub fn claim_backed_attr_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        let revealed = self.verifiable_attributes.values().map(|a| &a.name);
        let predicated = self.predicates.values().map(|p| &p.attr_name);
        for name in revealed.chain(predicated) {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
        names
    }
}
