//! # Claim Attributes
//!
//! An issued claim maps each attribute name to a pair of values: the raw
//! string the issuer attested and its encoded numeric form, which is what
//! the credential engine actually signs. On the wire the pair travels as a
//! two-element array: `"ssn": ["123-45-6789", "7443...1152"]`.
//!
//! Encoding is the big-endian SHA-256 digest of the raw UTF-8 value,
//! rendered as a decimal integer.

use std::collections::BTreeMap;

use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::ValidationError;

/// Raw attribute values an issuer holds for one prover: name → raw value.
pub type Attributes = BTreeMap<String, String>;

/// Attribute values of an issued claim: name → (raw, encoded).
pub type ClaimAttributes = BTreeMap<String, AttributeValues>;

/// The raw and encoded form of one claim attribute.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "(String, String)", into = "(String, String)")]
pub struct AttributeValues {
    /// The value as attested, e.g. `Alice Garcia`.
    pub raw: String,
    /// Decimal encoding of the raw value.
    pub encoded: String,
}

impl AttributeValues {
    /// Build an attribute pair by encoding `raw`.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let encoded = encode_attribute(&raw);
        Self { raw, encoded }
    }

    /// Check that `encoded` is the encoding of `raw`.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::AttributeEncodingMismatch`] naming `name`
    /// if the two values disagree.
    pub fn check(&self, name: &str) -> Result<(), ValidationError> {
        if encode_attribute(&self.raw) != self.encoded {
            return Err(ValidationError::AttributeEncodingMismatch {
                name: name.to_string(),
                raw: self.raw.clone(),
                encoded: self.encoded.clone(),
            });
        }
        Ok(())
    }
}

impl From<(String, String)> for AttributeValues {
    fn from((raw, encoded): (String, String)) -> Self {
        Self { raw, encoded }
    }
}

impl From<AttributeValues> for (String, String) {
    fn from(v: AttributeValues) -> Self {
        (v.raw, v.encoded)
    }
}

/// Encode a raw attribute value as a decimal integer string.
pub fn encode_attribute(raw: &str) -> String {
    let digest = Sha256::digest(raw.as_bytes());
    BigUint::from_bytes_be(&digest).to_str_radix(10)
}

/// Encode every value of a raw attribute map.
pub fn encode_attributes(attrs: &Attributes) -> ClaimAttributes {
    attrs
        .iter()
        .map(|(name, raw)| (name.clone(), AttributeValues::from_raw(raw.clone())))
        .collect()
}
