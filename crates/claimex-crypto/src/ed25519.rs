//! # Ed25519 Message Signing
//!
//! Every agent message and every issued claim payload is signed with
//! Ed25519 over its canonical JSON form.
//!
//! ## Invariants
//!
//! - Signing input is `&CanonicalBytes`; raw byte slices cannot be signed.
//! - `Ed25519KeyPair` has no `Serialize` impl and never prints its secret.
//! - Public keys and signatures travel as lowercase hex strings.
//! - An agent's [`Identifier`] is derived from its verification key, so a
//!   receiver can check that a message's `identifier` matches the key that
//!   signed it.

use claimex_core::{CanonicalBytes, CryptoError, Identifier};
use ed25519_dalek::{Signer, Verifier};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// An Ed25519 verification key (32 bytes).
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Ed25519PublicKey([u8; 32]);

/// An Ed25519 signature (64 bytes).
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Ed25519Signature([u8; 64]);

/// An Ed25519 signing key pair.
pub struct Ed25519KeyPair {
    signing_key: ed25519_dalek::SigningKey,
}

// ---------------------------------------------------------------------------
// Ed25519PublicKey
// ---------------------------------------------------------------------------

impl Ed25519PublicKey {
    /// Wrap raw key bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex rendering.
    pub fn to_hex(&self) -> String {
        to_hex(&self.0)
    }

    /// Parse a 64-character hex key.
    pub fn from_hex(hex: &str) -> Result<Self, CryptoError> {
        let bytes = hex_to_array::<32>(hex).map_err(CryptoError::KeyError)?;
        Ok(Self(bytes))
    }

    /// The identifier this key signs as: hex of its first 16 bytes.
    pub fn identifier(&self) -> Identifier {
        Identifier::from_verkey(&self.0)
    }

    fn to_verifying_key(&self) -> Result<ed25519_dalek::VerifyingKey, CryptoError> {
        ed25519_dalek::VerifyingKey::from_bytes(&self.0)
            .map_err(|e| CryptoError::KeyError(format!("invalid verification key: {e}")))
    }
}

impl Serialize for Ed25519PublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Ed25519PublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let hex = String::deserialize(deserializer)?;
        Self::from_hex(&hex).map_err(serde::de::Error::custom)
    }
}

impl std::fmt::Debug for Ed25519PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Ed25519PublicKey({}...)", to_hex(&self.0[..4]))
    }
}

impl std::fmt::Display for Ed25519PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

// ---------------------------------------------------------------------------
// Ed25519Signature
// ---------------------------------------------------------------------------

impl Ed25519Signature {
    /// Wrap raw signature bytes.
    pub fn from_bytes(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    /// Raw signature bytes.
    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }

    /// Lowercase hex rendering.
    pub fn to_hex(&self) -> String {
        to_hex(&self.0)
    }

    /// Parse a 128-character hex signature.
    pub fn from_hex(hex: &str) -> Result<Self, CryptoError> {
        let bytes = hex_to_array::<64>(hex).map_err(CryptoError::VerificationFailed)?;
        Ok(Self(bytes))
    }
}

impl Serialize for Ed25519Signature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Ed25519Signature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let hex = String::deserialize(deserializer)?;
        Self::from_hex(&hex).map_err(serde::de::Error::custom)
    }
}

impl std::fmt::Debug for Ed25519Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Ed25519Signature({}...)", to_hex(&self.0[..4]))
    }
}

impl std::fmt::Display for Ed25519Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

// ---------------------------------------------------------------------------
// Ed25519KeyPair
// ---------------------------------------------------------------------------

impl Ed25519KeyPair {
    /// Generate a fresh key pair from the OS RNG.
    pub fn generate() -> Self {
        let mut csprng = rand::rngs::OsRng;
        Self {
            signing_key: ed25519_dalek::SigningKey::generate(&mut csprng),
        }
    }

    /// Deterministic key pair from a 32-byte seed.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            signing_key: ed25519_dalek::SigningKey::from_bytes(seed),
        }
    }

    /// Deterministic key pair from an arbitrary seed phrase, hashed to 32
    /// bytes. Used for agent default identities configured by name.
    pub fn from_seed_phrase(phrase: &str) -> Self {
        Self::from_seed(&crate::sha256::sha256_raw(phrase.as_bytes()))
    }

    /// The verification key.
    pub fn public_key(&self) -> Ed25519PublicKey {
        Ed25519PublicKey(self.signing_key.verifying_key().to_bytes())
    }

    /// The identifier this key pair signs as.
    pub fn identifier(&self) -> Identifier {
        self.public_key().identifier()
    }

    /// Sign canonical bytes.
    pub fn sign(&self, data: &CanonicalBytes) -> Ed25519Signature {
        Ed25519Signature(self.signing_key.sign(data.as_bytes()).to_bytes())
    }
}

impl Clone for Ed25519KeyPair {
    fn clone(&self) -> Self {
        Self::from_seed(&self.signing_key.to_bytes())
    }
}

impl std::fmt::Debug for Ed25519KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Ed25519KeyPair({})", self.identifier())
    }
}

// ---------------------------------------------------------------------------
// Verification
// ---------------------------------------------------------------------------

/// Verify a signature over canonical bytes.
///
/// # Errors
///
/// Returns [`CryptoError::KeyError`] for a malformed key and
/// [`CryptoError::VerificationFailed`] for a bad signature.
pub fn verify(
    data: &CanonicalBytes,
    signature: &Ed25519Signature,
    public_key: &Ed25519PublicKey,
) -> Result<(), CryptoError> {
    let vk = public_key.to_verifying_key()?;
    let sig = ed25519_dalek::Signature::from_bytes(&signature.0);
    vk.verify(data.as_bytes(), &sig)
        .map_err(|e| CryptoError::VerificationFailed(format!("Ed25519 verification failed: {e}")))
}

// ---------------------------------------------------------------------------
// Hex
// ---------------------------------------------------------------------------

pub(crate) fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn hex_to_array<const N: usize>(hex: &str) -> Result<[u8; N], String> {
    let hex = hex.trim();
    if hex.len() != N * 2 {
        return Err(format!("expected {} hex chars, got {}", N * 2, hex.len()));
    }
    let mut out = [0u8; N];
    for (i, byte) in out.iter_mut().enumerate() {
        let pair = hex
            .get(i * 2..i * 2 + 2)
            .ok_or_else(|| format!("invalid hex at position {}", i * 2))?;
        *byte = u8::from_str_radix(pair, 16)
            .map_err(|e| format!("invalid hex at position {}: {e}", i * 2))?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn canonical(v: serde_json::Value) -> CanonicalBytes {
        CanonicalBytes::new(&v).unwrap()
    }

    #[test]
    fn sign_and_verify_message() {
        let kp = Ed25519KeyPair::generate();
        let msg = canonical(serde_json::json!({"type": "REQ_AVAIL_CLAIMS", "nonce": "b1134a"}));
        let sig = kp.sign(&msg);
        verify(&msg, &sig, &kp.public_key()).expect("valid signature");
    }

    #[test]
    fn wrong_key_fails() {
        let kp1 = Ed25519KeyPair::generate();
        let kp2 = Ed25519KeyPair::generate();
        let msg = canonical(serde_json::json!({"x": 1}));
        let sig = kp1.sign(&msg);
        assert!(verify(&msg, &sig, &kp2.public_key()).is_err());
    }

    #[test]
    fn tampered_message_fails() {
        let kp = Ed25519KeyPair::generate();
        let sig = kp.sign(&canonical(serde_json::json!({"data": {"msg": "original"}})));
        let tampered = canonical(serde_json::json!({"data": {"msg": "tampered"}}));
        assert!(verify(&tampered, &sig, &kp.public_key()).is_err());
    }

    #[test]
    fn seed_phrase_is_deterministic() {
        let a = Ed25519KeyPair::from_seed_phrase("Faber College");
        let b = Ed25519KeyPair::from_seed_phrase("Faber College");
        let c = Ed25519KeyPair::from_seed_phrase("Acme Corp");
        assert_eq!(a.public_key(), b.public_key());
        assert_ne!(a.public_key(), c.public_key());
    }

    #[test]
    fn identifier_is_hex_of_key_prefix() {
        let kp = Ed25519KeyPair::from_seed(&[7u8; 32]);
        let id = kp.identifier();
        assert_eq!(id.as_str().len(), 32);
        assert!(kp.public_key().to_hex().starts_with(id.as_str()));
    }

    #[test]
    fn cloned_key_pair_signs_identically() {
        let kp = Ed25519KeyPair::from_seed(&[9u8; 32]);
        let msg = canonical(serde_json::json!({"reqId": 1}));
        assert_eq!(kp.sign(&msg), kp.clone().sign(&msg));
    }

    #[test]
    fn hex_serde_forms() {
        let kp = Ed25519KeyPair::generate();
        let pk_json = serde_json::to_string(&kp.public_key()).unwrap();
        assert_eq!(pk_json.len(), 64 + 2);
        let sig = kp.sign(&canonical(serde_json::json!({"y": 2})));
        let sig_json = serde_json::to_string(&sig).unwrap();
        assert_eq!(sig_json.len(), 128 + 2);
        let back: Ed25519Signature = serde_json::from_str(&sig_json).unwrap();
        assert_eq!(back, sig);
    }

    #[test]
    fn invalid_hex_is_rejected() {
        assert!(Ed25519PublicKey::from_hex("not-hex").is_err());
        assert!(Ed25519PublicKey::from_hex(&"zz".repeat(32)).is_err());
        assert!(Ed25519Signature::from_hex("aabb").is_err());
    }

    #[test]
    fn debug_never_prints_secret() {
        let kp = Ed25519KeyPair::from_seed(&[1u8; 32]);
        let dbg = format!("{kp:?}");
        assert!(dbg.starts_with("Ed25519KeyPair("));
        assert!(!dbg.contains(&to_hex(&[1u8; 32])));
    }
}
