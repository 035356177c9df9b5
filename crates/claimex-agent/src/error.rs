//! Agent and transport errors.
//!
//! Protocol conditions the handlers recover from (claim not offered, no
//! matching link, duplicate proof request, link not ready) never surface
//! here as failures of a handler; they become notifications. What does
//! surface is engine failures, malformed input and transport faults.

use claimex_core::{CanonicalizationError, Identifier, ValidationError};
use claimex_engine::EngineError;
use thiserror::Error;

/// Errors from the protocol layer.
#[derive(Error, Debug)]
pub enum AgentError {
    /// No link with this name.
    #[error("link not found: {0}")]
    LinkNotFound(String),

    /// The link exists but cannot sign yet: not accepted or no endpoint.
    #[error("link {0} is not yet ready to send messages")]
    LinkNotReady(String),

    /// Inbound `type` tag is not in the routing table.
    #[error("unknown message type: {0}")]
    UnknownMessageType(String),

    /// Known message type whose body does not deserialize.
    #[error("malformed {msg_type} message: {reason}")]
    MalformedMessage {
        /// Message type tag.
        msg_type: String,
        /// What was wrong.
        reason: String,
    },

    /// Message addressed to a role this agent does not play.
    #[error("agent has no {role} role configured for {msg_type}")]
    RoleNotConfigured {
        /// Missing role.
        role: &'static str,
        /// Message type that needed it.
        msg_type: String,
    },

    /// A ledger operation was requested without a ledger.
    #[error("agent has no ledger configured")]
    NoLedger,

    /// Credential engine failure.
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),

    /// Outbound message rejected by the transport.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Invalid protocol value.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// JSON (de)serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AgentError {
    pub(crate) fn malformed(msg_type: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::MalformedMessage {
            msg_type: msg_type.into(),
            reason: reason.to_string(),
        }
    }
}

/// Errors from signing and delivering messages.
#[derive(Error, Debug)]
pub enum TransportError {
    /// No mailbox registered at the destination address.
    #[error("no agent listening at {0}")]
    UnknownAddress(String),

    /// The transport holds no key for the requested signer.
    #[error("no signing key for identifier {0}")]
    UnknownSigner(Identifier),

    /// The message signature did not verify on delivery.
    #[error("signature rejected: {0}")]
    SignatureRejected(String),

    /// The destination mailbox is closed.
    #[error("mailbox at {0} is closed")]
    MailboxClosed(String),

    /// The message could not be canonicalized for signing.
    #[error("canonicalization error: {0}")]
    Canonicalization(#[from] CanonicalizationError),
}
