#![deny(missing_docs)]

//! # claimex-agent — Claim Exchange Protocol Layer
//!
//! Orchestrates the claim and proof exchanges between an issuer, a prover
//! and a verifier. Cryptography and wallet storage sit behind the
//! `claimex-engine` traits; delivery sits behind [`Transport`].
//!
//! ## Exchanges
//!
//! ```text
//! Prover                         Issuer
//!   REQ_AVAIL_CLAIMS   ───────▶
//!                      ◀───────  AVAIL_CLAIM_LIST
//!   CLAIM_REQUEST      ───────▶
//!                      ◀───────  CLAIM | EVENT (not available)
//!
//! Verifier                       Prover
//!   PROOF_REQUEST      ───────▶
//!                      ◀───────  PROOF
//!   PROOF_STATUS       ───────▶
//! ```
//!
//! ## Modules
//!
//! - [`message`]: message catalogue, envelope fields and the routing table.
//! - [`link`]: per-counterparty state and the [`LinkStore`].
//! - [`transport`]: the signing transport seam and an in-process loopback
//!   network.
//! - [`agent`]: the [`Agent`], its builder, sending, routing and the run loop.
//! - [`issuer`], [`prover`], [`verifier`]: role handlers.
//! - [`selector`]: which received claims answer a set of attributes.
//! - [`publish`]: trust-anchor ledger writes.
//! - [`notify`]: the notification sink.
//! - [`config`]: agent configuration from the environment or YAML.

pub mod agent;
pub mod config;
pub mod error;
pub mod issuer;
pub mod link;
pub mod message;
pub mod notify;
pub mod prover;
pub mod publish;
pub mod selector;
pub mod transport;
pub mod verifier;

pub use agent::{loopback_agent, Agent, AgentBuilder, IssuerRole, PendingRequest, NO_MATCHING_LINK};
pub use config::{AgentConfig, ConfigError};
pub use error::{AgentError, TransportError};
pub use issuer::{InMemoryIssuerBackend, IssuerBackend, CLAIM_NOT_AVAILABLE};
pub use link::{InMemoryLinkStore, Link, LinkState, LinkStore, ProofResult};
pub use message::{AgentMessage, Envelope, MessageType, Role};
pub use notify::{Notifier, RecordingNotifier, TracingNotifier};
pub use publish::PendingWrites;
pub use selector::{select_claims_for_attrs, LinkClaim, LinkSelection};
pub use transport::{
    InboundMessage, LoopbackNetwork, LoopbackTransport, RecordingTransport, Sender, SentMessage,
    Transport,
};
pub use verifier::proof_status_text;
