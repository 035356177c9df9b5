//! # Signed Message Transport
//!
//! The [`Transport`] seam signs an outbound message under one of the agent's
//! identifiers and delivers it to a peer address. Inbound messages arrive
//! as [`InboundMessage`] values: the body plus the sender's name and address.
//!
//! ## Loopback network
//!
//! [`LoopbackNetwork`] connects agents in one process. Each registered agent
//! gets a bounded tokio mailbox and a [`LoopbackTransport`]. Identifiers an
//! agent signs with are published to the network's key directory, and every
//! delivery is checked against it: a message whose `signature` does not
//! verify under the key of its `identifier` is rejected before it reaches
//! the recipient.
//!
//! Signing input is the canonical JSON of the message with `identifier` set
//! and `signature` absent.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use claimex_core::{CanonicalBytes, Identifier};
use claimex_crypto::{verify, Ed25519KeyPair, Ed25519PublicKey, Ed25519Signature};
use parking_lot::{Mutex, RwLock};
use serde_json::{Map, Value};
use tokio::sync::mpsc;

use crate::error::TransportError;
use crate::message::{IDENTIFIER, SIGNATURE};

/// Who sent an inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sender {
    /// Sender's agent name.
    pub name: String,
    /// Sender's transport address.
    pub address: String,
}

/// A delivered message.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    /// Message body, envelope included.
    pub body: Value,
    /// Who sent it.
    pub sender: Sender,
}

/// Signs and delivers messages.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sign `msg` as `signer` and deliver it to address `to`.
    async fn sign_and_send(
        &self,
        msg: Map<String, Value>,
        signer: &Identifier,
        to: &str,
    ) -> Result<(), TransportError>;
}

fn signing_input(msg: &Map<String, Value>) -> Result<CanonicalBytes, TransportError> {
    let mut unsigned = msg.clone();
    unsigned.remove(SIGNATURE);
    Ok(CanonicalBytes::new(&Value::Object(unsigned))?)
}

// ---------------------------------------------------------------------------
// Loopback network
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct NetworkInner {
    mailboxes: RwLock<HashMap<String, mpsc::Sender<InboundMessage>>>,
    verkeys: RwLock<HashMap<Identifier, Ed25519PublicKey>>,
}

impl NetworkInner {
    fn check_signature(&self, body: &Value) -> Result<(), TransportError> {
        let msg = body
            .as_object()
            .ok_or_else(|| TransportError::SignatureRejected("message is not an object".into()))?;
        let identifier = msg
            .get(IDENTIFIER)
            .and_then(Value::as_str)
            .ok_or_else(|| TransportError::SignatureRejected("missing identifier".into()))?;
        let identifier = Identifier::new(identifier)
            .map_err(|e| TransportError::SignatureRejected(e.to_string()))?;
        let verkey = self
            .verkeys
            .read()
            .get(&identifier)
            .cloned()
            .ok_or_else(|| TransportError::UnknownSigner(identifier.clone()))?;
        let sig = msg
            .get(SIGNATURE)
            .and_then(Value::as_str)
            .ok_or_else(|| TransportError::SignatureRejected("missing signature".into()))?;
        let sig = Ed25519Signature::from_hex(sig)
            .map_err(|e| TransportError::SignatureRejected(e.to_string()))?;
        verify(&signing_input(msg)?, &sig, &verkey)
            .map_err(|e| TransportError::SignatureRejected(e.to_string()))
    }

    async fn deliver(&self, msg: InboundMessage, to: &str) -> Result<(), TransportError> {
        self.check_signature(&msg.body)?;
        let mailbox = self
            .mailboxes
            .read()
            .get(to)
            .cloned()
            .ok_or_else(|| TransportError::UnknownAddress(to.to_string()))?;
        mailbox
            .send(msg)
            .await
            .map_err(|_| TransportError::MailboxClosed(to.to_string()))
    }
}

/// In-process network of agents.
#[derive(Debug, Clone, Default)]
pub struct LoopbackNetwork {
    inner: Arc<NetworkInner>,
}

impl LoopbackNetwork {
    /// An empty network.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an agent at `address`, returning its transport and inbox.
    /// Registering an address again replaces the previous mailbox.
    pub fn register(
        &self,
        name: impl Into<String>,
        address: impl Into<String>,
        capacity: usize,
    ) -> (LoopbackTransport, mpsc::Receiver<InboundMessage>) {
        let address = address.into();
        let (tx, rx) = mpsc::channel(capacity.max(1));
        self.inner.mailboxes.write().insert(address.clone(), tx);
        let transport = LoopbackTransport {
            network: Arc::clone(&self.inner),
            sender: Sender {
                name: name.into(),
                address,
            },
            keyring: RwLock::new(HashMap::new()),
        };
        (transport, rx)
    }

    /// The published verification key of `identifier`.
    pub fn verkey(&self, identifier: &Identifier) -> Option<Ed25519PublicKey> {
        self.inner.verkeys.read().get(identifier).cloned()
    }
}

/// One agent's handle on the loopback network.
#[derive(Debug)]
pub struct LoopbackTransport {
    network: Arc<NetworkInner>,
    sender: Sender,
    keyring: RwLock<HashMap<Identifier, Ed25519KeyPair>>,
}

impl LoopbackTransport {
    /// This agent's sender record.
    pub fn sender(&self) -> &Sender {
        &self.sender
    }

    /// Hold `keys` for signing and publish their verification key.
    pub fn add_key(&self, keys: Ed25519KeyPair) -> Identifier {
        let identifier = keys.identifier();
        self.network
            .verkeys
            .write()
            .insert(identifier.clone(), keys.public_key());
        self.keyring.write().insert(identifier.clone(), keys);
        identifier
    }

    /// Generate and hold a fresh identifier, e.g. for a new link.
    pub fn new_identifier(&self) -> Identifier {
        self.add_key(Ed25519KeyPair::generate())
    }
}

#[async_trait]
impl Transport for LoopbackTransport {
    async fn sign_and_send(
        &self,
        mut msg: Map<String, Value>,
        signer: &Identifier,
        to: &str,
    ) -> Result<(), TransportError> {
        let keys = self
            .keyring
            .read()
            .get(signer)
            .cloned()
            .ok_or_else(|| TransportError::UnknownSigner(signer.clone()))?;
        msg.insert(IDENTIFIER.to_string(), Value::String(signer.to_string()));
        let signature = keys.sign(&signing_input(&msg)?);
        msg.insert(SIGNATURE.to_string(), Value::String(signature.to_hex()));
        let msg_type = msg
            .get("type")
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default()
            .to_string();
        tracing::debug!(from = %self.sender.name, to, msg_type = %msg_type, "sending");
        let inbound = InboundMessage {
            body: Value::Object(msg),
            sender: self.sender.clone(),
        };
        self.network.deliver(inbound, to).await
    }
}

// ---------------------------------------------------------------------------
// Recording transport
// ---------------------------------------------------------------------------

/// A sent message as captured by [`RecordingTransport`].
#[derive(Debug, Clone, PartialEq)]
pub struct SentMessage {
    /// Body with `identifier` set; unsigned.
    pub body: Value,
    /// Signer identifier.
    pub signer: Identifier,
    /// Destination address.
    pub to: String,
}

/// Captures outbound messages instead of sending them.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<SentMessage>>,
}

impl RecordingTransport {
    /// An empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// All messages sent so far, oldest first.
    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().clone()
    }

    /// Messages of type `tag`.
    pub fn sent_of_type(&self, tag: &str) -> Vec<SentMessage> {
        self.sent
            .lock()
            .iter()
            .filter(|m| m.body.get("type").and_then(Value::as_str) == Some(tag))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn sign_and_send(
        &self,
        mut msg: Map<String, Value>,
        signer: &Identifier,
        to: &str,
    ) -> Result<(), TransportError> {
        msg.insert(IDENTIFIER.to_string(), Value::String(signer.to_string()));
        self.sent.lock().push(SentMessage {
            body: Value::Object(msg),
            signer: signer.clone(),
            to: to.to_string(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn body(tag: &str) -> Map<String, Value> {
        match json!({"type": tag, "nonce": "b1134a"}) {
            Value::Object(m) => m,
            _ => unreachable!(),
        }
    }

    #[tokio::test]
    async fn signed_message_is_delivered_with_sender() {
        let net = LoopbackNetwork::new();
        let (alice, _alice_rx) = net.register("Alice", "alice:1", 4);
        let (_faber, mut faber_rx) = net.register("Faber College", "faber:1", 4);
        let id = alice.new_identifier();

        alice.sign_and_send(body("REQ_AVAIL_CLAIMS"), &id, "faber:1").await.unwrap();
        let msg = faber_rx.recv().await.unwrap();
        assert_eq!(msg.sender.name, "Alice");
        assert_eq!(msg.sender.address, "alice:1");
        assert_eq!(msg.body[IDENTIFIER], id.as_str());
        assert!(msg.body[SIGNATURE].is_string());
    }

    #[tokio::test]
    async fn message_without_type_is_still_signed_and_delivered() {
        let net = LoopbackNetwork::new();
        let (alice, _alice_rx) = net.register("Alice", "alice:1", 4);
        let (_faber, mut faber_rx) = net.register("Faber College", "faber:1", 4);
        let id = alice.new_identifier();
        let mut untyped = body("REQ_AVAIL_CLAIMS");
        untyped.remove("type");

        alice.sign_and_send(untyped, &id, "faber:1").await.unwrap();
        let msg = faber_rx.recv().await.unwrap();
        assert!(msg.body.get("type").is_none());
        assert_eq!(msg.body["nonce"], "b1134a");
        assert!(msg.body[SIGNATURE].is_string());
    }

    #[tokio::test]
    async fn unknown_signer_is_refused() {
        let net = LoopbackNetwork::new();
        let (alice, _rx) = net.register("Alice", "alice:1", 4);
        let stranger = Ed25519KeyPair::generate().identifier();
        let err = alice
            .sign_and_send(body("REQ_AVAIL_CLAIMS"), &stranger, "alice:1")
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::UnknownSigner(_)));
    }

    #[tokio::test]
    async fn unknown_address_is_refused() {
        let net = LoopbackNetwork::new();
        let (alice, _rx) = net.register("Alice", "alice:1", 4);
        let id = alice.new_identifier();
        let err = alice
            .sign_and_send(body("REQ_AVAIL_CLAIMS"), &id, "nowhere:0")
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::UnknownAddress(_)));
    }

    #[tokio::test]
    async fn forged_identifier_is_rejected_on_delivery() {
        let net = LoopbackNetwork::new();
        let (alice, _a) = net.register("Alice", "alice:1", 4);
        let (mallory, _m) = net.register("Mallory", "mallory:1", 4);
        let alice_id = alice.new_identifier();
        let mallory_id = mallory.new_identifier();

        let mut msg = body("REQ_AVAIL_CLAIMS");
        msg.insert(IDENTIFIER.to_string(), Value::String(mallory_id.to_string()));
        let sig = mallory
            .keyring
            .read()
            .get(&mallory_id)
            .unwrap()
            .sign(&signing_input(&msg).unwrap());
        msg.insert(SIGNATURE.to_string(), Value::String(sig.to_hex()));
        msg.insert(IDENTIFIER.to_string(), Value::String(alice_id.to_string()));

        let inbound = InboundMessage {
            body: Value::Object(msg),
            sender: mallory.sender().clone(),
        };
        let err = net.inner.deliver(inbound, "alice:1").await.unwrap_err();
        assert!(matches!(err, TransportError::SignatureRejected(_)));
    }

    #[tokio::test]
    async fn closed_mailbox_is_reported() {
        let net = LoopbackNetwork::new();
        let (alice, _a) = net.register("Alice", "alice:1", 4);
        let (_faber, faber_rx) = net.register("Faber College", "faber:1", 4);
        drop(faber_rx);
        let id = alice.new_identifier();
        let err = alice
            .sign_and_send(body("REQ_AVAIL_CLAIMS"), &id, "faber:1")
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::MailboxClosed(_)));
    }

    #[tokio::test]
    async fn recording_transport_captures_signer() {
        let t = RecordingTransport::new();
        let id = Identifier::new("faber").unwrap();
        t.sign_and_send(body("EVENT"), &id, "alice:1").await.unwrap();
        let sent = t.sent_of_type("EVENT");
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].signer, id);
        assert_eq!(sent[0].body[IDENTIFIER], "faber");
    }
}
