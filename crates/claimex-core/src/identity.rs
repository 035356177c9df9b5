//! # Identity Newtypes
//!
//! Protocol identifiers exchanged between agents. Each is a distinct type:
//! you cannot pass a [`Nonce`] where an [`Identifier`] is expected.
//!
//! ## Validation
//!
//! [`Identifier`] and [`Nonce`] are validated at construction (non-empty,
//! ASCII alphanumeric). [`RequestId`] is an integer and always valid.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

// ---------------------------------------------------------------------------
// String-based identifiers (validated at construction)
// ---------------------------------------------------------------------------

/// A signing identity: the local identifier an agent uses for one link, the
/// remote party's identifier, or an issuer's identifier on the ledger.
///
/// Derived identifiers are the lowercase hex encoding of the first 16 bytes
/// of an Ed25519 verification key, e.g. `b1134a647eb818069c089e7694f63e6d`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identifier(String);

impl Identifier {
    /// Create an identifier, validating format.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidIdentifier`] if the value is empty
    /// or contains non-alphanumeric characters.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let s = value.into();
        if !is_alphanumeric_token(&s) {
            return Err(ValidationError::InvalidIdentifier(s));
        }
        Ok(Self(s))
    }

    /// Derive the identifier for an Ed25519 verification key: lowercase hex
    /// of its first 16 bytes.
    pub fn from_verkey(verkey: &[u8; 32]) -> Self {
        Self(
            verkey[..VERKEY_PREFIX_BYTES]
                .iter()
                .map(|b| format!("{b:02x}"))
                .collect(),
        )
    }

    /// Access the identifier string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Verification-key bytes rendered into a derived identifier.
const VERKEY_PREFIX_BYTES: usize = 16;

impl TryFrom<String> for Identifier {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Identifier> for String {
    fn from(id: Identifier) -> Self {
        id.0
    }
}

impl std::fmt::Display for Identifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// An invitation nonce: the one-time value that correlates handshake
/// messages to a link before a stable session identity exists.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Nonce(String);

impl Nonce {
    /// Create a nonce, validating format.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidNonce`] if the value is empty or
    /// contains non-alphanumeric characters.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let s = value.into();
        if !is_alphanumeric_token(&s) {
            return Err(ValidationError::InvalidNonce(s));
        }
        Ok(Self(s))
    }

    /// Access the nonce string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Nonce {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Nonce> for String {
    fn from(n: Nonce) -> Self {
        n.0
    }
}

impl std::fmt::Display for Nonce {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

fn is_alphanumeric_token(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric())
}

// ---------------------------------------------------------------------------
// Request correlation ids
// ---------------------------------------------------------------------------

/// The `reqId` stamped on every outbound message, echoed by the
/// counterparty as `refRequestId` on the reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(u64);

impl RequestId {
    /// Wrap a raw request id.
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// The raw integer value.
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Produces strictly increasing request ids seeded from the wall clock in
/// microseconds, so ids stay unique across agent restarts.
#[derive(Debug)]
pub struct RequestIdGenerator {
    last: AtomicU64,
}

impl RequestIdGenerator {
    /// Create a generator seeded from the current time.
    pub fn new() -> Self {
        let now = chrono::Utc::now().timestamp_micros().max(0) as u64;
        Self::starting_at(now)
    }

    /// Create a generator whose first id is `seed + 1`.
    pub fn starting_at(seed: u64) -> Self {
        Self {
            last: AtomicU64::new(seed),
        }
    }

    /// Return the next id.
    pub fn next_id(&self) -> RequestId {
        RequestId(self.last.fetch_add(1, Ordering::Relaxed) + 1)
    }
}

impl Default for RequestIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}
