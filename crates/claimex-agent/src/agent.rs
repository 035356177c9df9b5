//! # Agent
//!
//! An [`Agent`] owns the protocol state of one party: its link store, its
//! transport, its notification sink and the credential-engine roles it
//! plays. Role handlers live in [`crate::issuer`], [`crate::prover`] and
//! [`crate::verifier`] as further `impl Agent` blocks; this module holds the
//! shared plumbing.
//!
//! ## Sending
//!
//! Every outbound message gets a fresh `reqId`. Replies also carry the
//! `refRequestId` of the message they answer. Requests sent over a link are
//! recorded so the reply can be matched when it arrives.
//!
//! ## Receiving
//!
//! [`Agent::handle`] parses the body, checks the routing table for the
//! handling role, and dispatches. [`Agent::run`] drains an inbox, one
//! message at a time, logging per-message failures.
//!
//! ## Scheduling
//!
//! Fire-and-forget operations (`spawn_*`) always spawn onto the caller's
//! tokio runtime and return the task's `JoinHandle`. Callers that need the
//! result await the handle.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use claimex_core::{Identifier, ProofRequest, RequestId, RequestIdGenerator, SchemaKey};
use claimex_engine::{IssuerEngine, Ledger, ProverEngine, VerifierEngine};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::AgentConfig;
use crate::error::AgentError;
use crate::issuer::IssuerBackend;
use crate::link::{InMemoryLinkStore, Link, LinkStore};
use crate::message::{AgentMessage, Envelope, MessageType, Role, REF_REQUEST_ID, REQ_ID};
use crate::notify::{Notifier, TracingNotifier};
use crate::publish::PendingWrites;
use crate::transport::{InboundMessage, LoopbackNetwork, LoopbackTransport, Sender, Transport};

/// Notification for an inbound message whose signer matches no link.
pub const NO_MATCHING_LINK: &str = "No matching link found";

/// A request sent over a link, awaiting its reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRequest {
    /// Link the request was sent on.
    pub link_name: String,
    /// Type of the request.
    pub msg_type: MessageType,
}

/// The issuer role: engine plus the backend deciding what is offered.
#[derive(Clone)]
pub struct IssuerRole {
    /// Credential engine.
    pub engine: Arc<dyn IssuerEngine>,
    /// Offers and attribute data per link.
    pub backend: Arc<dyn IssuerBackend>,
}

/// Envelope and sender of the message being handled.
#[derive(Debug, Clone)]
pub(crate) struct Inbound {
    pub(crate) envelope: Envelope,
    pub(crate) sender: Sender,
}

/// One protocol party.
pub struct Agent {
    pub(crate) name: String,
    pub(crate) default_identifier: Identifier,
    pub(crate) links: Arc<dyn LinkStore>,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) notifier: Arc<dyn Notifier>,
    pub(crate) req_ids: RequestIdGenerator,
    pub(crate) pending: Mutex<HashMap<RequestId, PendingRequest>>,
    pub(crate) issuer: Option<IssuerRole>,
    pub(crate) prover: Option<Arc<dyn ProverEngine>>,
    pub(crate) verifier: Option<Arc<dyn VerifierEngine>>,
    pub(crate) ledger: Option<Arc<Ledger>>,
    pub(crate) pending_writes: PendingWrites,
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("name", &self.name)
            .field("default_identifier", &self.default_identifier)
            .field("issuer", &self.issuer.is_some())
            .field("prover", &self.prover.is_some())
            .field("verifier", &self.verifier.is_some())
            .field("ledger", &self.ledger.is_some())
            .finish_non_exhaustive()
    }
}

/// Builder for [`Agent`].
pub struct AgentBuilder {
    name: String,
    default_identifier: Identifier,
    transport: Arc<dyn Transport>,
    links: Option<Arc<dyn LinkStore>>,
    notifier: Option<Arc<dyn Notifier>>,
    req_ids: Option<RequestIdGenerator>,
    issuer: Option<IssuerRole>,
    prover: Option<Arc<dyn ProverEngine>>,
    verifier: Option<Arc<dyn VerifierEngine>>,
    ledger: Option<Arc<Ledger>>,
}

impl AgentBuilder {
    /// Use `links` instead of a fresh in-memory store.
    pub fn links(mut self, links: Arc<dyn LinkStore>) -> Self {
        self.links = Some(links);
        self
    }

    /// Use `notifier` instead of [`TracingNotifier`].
    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Use a fixed request-id generator.
    pub fn request_ids(mut self, req_ids: RequestIdGenerator) -> Self {
        self.req_ids = Some(req_ids);
        self
    }

    /// Play the issuer role.
    pub fn issuer(mut self, engine: Arc<dyn IssuerEngine>, backend: Arc<dyn IssuerBackend>) -> Self {
        self.issuer = Some(IssuerRole { engine, backend });
        self
    }

    /// Play the prover role.
    pub fn prover(mut self, engine: Arc<dyn ProverEngine>) -> Self {
        self.prover = Some(engine);
        self
    }

    /// Play the verifier role.
    pub fn verifier(mut self, engine: Arc<dyn VerifierEngine>) -> Self {
        self.verifier = Some(engine);
        self
    }

    /// Publish to `ledger`.
    pub fn ledger(mut self, ledger: Arc<Ledger>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    /// Finish.
    pub fn build(self) -> Agent {
        Agent {
            name: self.name,
            default_identifier: self.default_identifier,
            links: self
                .links
                .unwrap_or_else(|| Arc::new(InMemoryLinkStore::new())),
            transport: self.transport,
            notifier: self.notifier.unwrap_or_else(|| Arc::new(TracingNotifier)),
            req_ids: self.req_ids.unwrap_or_default(),
            pending: Mutex::new(HashMap::new()),
            issuer: self.issuer,
            prover: self.prover,
            verifier: self.verifier,
            ledger: self.ledger,
            pending_writes: PendingWrites::default(),
        }
    }
}

/// Register an agent described by `config` on `network`.
///
/// Returns the builder, the agent's transport (to mint link identifiers)
/// and its inbox. The default identifier is derived from the configured
/// seed and is already held by the transport.
pub fn loopback_agent(
    config: &AgentConfig,
    network: &LoopbackNetwork,
) -> (AgentBuilder, Arc<LoopbackTransport>, mpsc::Receiver<InboundMessage>) {
    let (transport, inbox) =
        network.register(config.name.clone(), config.endpoint(), config.inbox_capacity);
    let transport = Arc::new(transport);
    let default_identifier = transport.add_key(config.default_keys());
    let builder = Agent::builder(config.name.clone(), default_identifier, transport.clone());
    (builder, transport, inbox)
}

impl Agent {
    /// Start building an agent.
    pub fn builder(
        name: impl Into<String>,
        default_identifier: Identifier,
        transport: Arc<dyn Transport>,
    ) -> AgentBuilder {
        AgentBuilder {
            name: name.into(),
            default_identifier,
            transport,
            links: None,
            notifier: None,
            req_ids: None,
            issuer: None,
            prover: None,
            verifier: None,
            ledger: None,
        }
    }

    /// Agent name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Identifier used outside any link.
    pub fn default_identifier(&self) -> &Identifier {
        &self.default_identifier
    }

    /// The link store.
    pub fn links(&self) -> &dyn LinkStore {
        self.links.as_ref()
    }

    /// The link named `name`.
    pub fn link(&self, name: &str) -> Result<Link, AgentError> {
        self.links
            .get(name)
            .ok_or_else(|| AgentError::LinkNotFound(name.to_string()))
    }

    /// Requests awaiting a reply.
    pub fn pending_requests(&self) -> HashMap<RequestId, PendingRequest> {
        self.pending.lock().clone()
    }

    pub(crate) fn issuer_role(&self, msg_type: MessageType) -> Result<&IssuerRole, AgentError> {
        self.issuer.as_ref().ok_or_else(|| role_missing(Role::Issuer, msg_type))
    }

    pub(crate) fn prover_engine(&self, msg_type: MessageType) -> Result<&dyn ProverEngine, AgentError> {
        self.prover
            .as_deref()
            .ok_or_else(|| role_missing(Role::Prover, msg_type))
    }

    pub(crate) fn verifier_engine(
        &self,
        msg_type: MessageType,
    ) -> Result<&dyn VerifierEngine, AgentError> {
        self.verifier
            .as_deref()
            .ok_or_else(|| role_missing(Role::Verifier, msg_type))
    }

    fn plays(&self, role: Role) -> bool {
        match role {
            Role::Issuer => self.issuer.is_some(),
            Role::Prover => self.prover.is_some(),
            Role::Verifier => self.verifier.is_some(),
        }
    }

    // -----------------------------------------------------------------------
    // Sending
    // -----------------------------------------------------------------------

    /// Sign `msg` as `signer` and send it to address `to`, setting `reqId`
    /// and, for replies, `refRequestId`. Returns the assigned `reqId`.
    pub(crate) async fn sign_and_send(
        &self,
        msg: &AgentMessage,
        signer: &Identifier,
        to: &str,
        orig_req_id: Option<RequestId>,
    ) -> Result<RequestId, AgentError> {
        let req_id = self.req_ids.next_id();
        let mut map = msg.to_map()?;
        map.insert(REQ_ID.to_string(), Value::from(req_id.value()));
        if let Some(orig) = orig_req_id {
            map.insert(REF_REQUEST_ID.to_string(), Value::from(orig.value()));
        }
        self.transport.sign_and_send(map, signer, to).await?;
        tracing::debug!(
            agent = %self.name,
            msg_type = %msg.message_type(),
            req_id = req_id.value(),
            to,
            "sent"
        );
        Ok(req_id)
    }

    /// Send a message over a link, signed with the link's local identifier.
    /// `orig_req_id` is echoed as `refRequestId` when the message answers a
    /// request.
    ///
    /// # Errors
    ///
    /// [`AgentError::LinkNotFound`], or [`AgentError::LinkNotReady`] if the
    /// link is not accepted or has no endpoint.
    pub(crate) async fn sign_and_send_to_link(
        &self,
        msg: &AgentMessage,
        link_name: &str,
        orig_req_id: Option<RequestId>,
    ) -> Result<RequestId, AgentError> {
        let link = self.link(link_name)?;
        let endpoint = match (&link.remote_endpoint, link.is_ready()) {
            (Some(endpoint), true) => endpoint.clone(),
            _ => return Err(AgentError::LinkNotReady(link.name)),
        };
        let req_id = self.req_ids.next_id();
        let mut map = msg.to_map()?;
        map.insert(REQ_ID.to_string(), Value::from(req_id.value()));
        if let Some(orig) = orig_req_id {
            map.insert(REF_REQUEST_ID.to_string(), Value::from(orig.value()));
        }
        // Recorded before sending: the reply can arrive before the send returns.
        self.pending.lock().insert(
            req_id,
            PendingRequest {
                link_name: link.name.clone(),
                msg_type: msg.message_type(),
            },
        );
        if let Err(e) = self
            .transport
            .sign_and_send(map, &link.local_identifier, &endpoint)
            .await
        {
            self.pending.lock().remove(&req_id);
            return Err(e.into());
        }
        tracing::debug!(
            agent = %self.name,
            link = %link.name,
            msg_type = %msg.message_type(),
            req_id = req_id.value(),
            "sent over link"
        );
        Ok(req_id)
    }

    /// [`Self::sign_and_send_to_link`], reporting a link that is not ready
    /// to the notification sink instead of failing. `Ok(None)` means the
    /// message was not sent.
    pub(crate) async fn send_to_link_or_notify(
        &self,
        msg: &AgentMessage,
        link_name: &str,
        orig_req_id: Option<RequestId>,
    ) -> Result<Option<RequestId>, AgentError> {
        match self.sign_and_send_to_link(msg, link_name, orig_req_id).await {
            Ok(req_id) => Ok(Some(req_id)),
            Err(e @ AgentError::LinkNotReady(_)) => {
                tracing::info!(agent = %self.name, link = link_name, "link not ready");
                self.notifier.notify(&e.to_string());
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Match a reply to its request and notify. Unknown or absent
    /// `refRequestId` values are ignored.
    pub(crate) fn notify_response_from_msg(&self, envelope: &Envelope) {
        let Some(ref_id) = envelope.ref_request_id else {
            return;
        };
        let pending = self.pending.lock().remove(&ref_id);
        if let Some(req) = pending {
            self.notifier.notify_response(&req.link_name, ref_id, req.msg_type);
        }
    }

    /// The link whose counterparty signed this message. Notifies
    /// [`NO_MATCHING_LINK`] when there is none.
    pub(crate) fn link_of_sender(&self, inbound: &Inbound) -> Option<Link> {
        let link = inbound
            .envelope
            .identifier
            .as_ref()
            .and_then(|id| self.links.find_by_remote_identifier(id));
        if link.is_none() {
            tracing::warn!(
                agent = %self.name,
                from = %inbound.sender.name,
                "no link matches sender"
            );
            self.notifier.notify(NO_MATCHING_LINK);
        }
        link
    }

    // -----------------------------------------------------------------------
    // Receiving
    // -----------------------------------------------------------------------

    /// Route one inbound message to its handler.
    ///
    /// # Errors
    ///
    /// Unknown or malformed messages, messages for a role this agent does
    /// not play, engine failures and transport failures while replying.
    pub async fn handle(&self, msg: InboundMessage) -> Result<(), AgentError> {
        let (msg_type, parsed) = AgentMessage::parse(&msg.body)?;
        let role = msg_type.role();
        if !self.plays(role) {
            return Err(role_missing(role, msg_type));
        }
        let inbound = Inbound {
            envelope: Envelope::of(&msg.body),
            sender: msg.sender,
        };
        tracing::debug!(
            agent = %self.name,
            %msg_type,
            from = %inbound.sender.name,
            req_id = ?inbound.envelope.req_id,
            "received"
        );

        match parsed {
            AgentMessage::ReqAvailClaims { nonce } => {
                self.process_req_avail_claims(&inbound, &nonce).await
            }
            AgentMessage::ClaimRequest { nonce, data } => {
                self.process_req_claim(&inbound, &nonce, data).await
            }
            AgentMessage::AvailClaimList { data } => {
                self.handle_avail_claims_response(&inbound, data).await
            }
            AgentMessage::Claim { data } => self.handle_req_claim_response(&inbound, data).await,
            AgentMessage::ProofRequest { proof_request, .. } => {
                self.handle_proof_request(&inbound, proof_request).await
            }
            AgentMessage::ProofStatus { data } => {
                self.handle_proof_status_response(&inbound, data).await
            }
            AgentMessage::Event { data, .. } => self.handle_event(&inbound, data).await,
            AgentMessage::Proof {
                proof,
                proof_request,
                ..
            } => self.process_proof(&inbound, proof, proof_request).await,
        }
    }

    /// Handle messages from `inbox` until it closes.
    pub async fn run(self: Arc<Self>, mut inbox: mpsc::Receiver<InboundMessage>) {
        while let Some(msg) = inbox.recv().await {
            let from = msg.sender.name.clone();
            if let Err(e) = self.handle(msg).await {
                tracing::warn!(agent = %self.name, %from, error = %e, "message handling failed");
            }
        }
        tracing::debug!(agent = %self.name, "inbox closed");
    }

    /// Spawn [`Self::run`] onto the current runtime.
    pub fn spawn_run(self: &Arc<Self>, inbox: mpsc::Receiver<InboundMessage>) -> JoinHandle<()> {
        tokio::spawn(Arc::clone(self).run(inbox))
    }

    // -----------------------------------------------------------------------
    // Fire-and-forget entry points
    // -----------------------------------------------------------------------

    /// Spawn `op` on a clone of this agent.
    pub fn spawn<F, Fut, T>(self: &Arc<Self>, op: F) -> JoinHandle<Result<T, AgentError>>
    where
        F: FnOnce(Arc<Self>) -> Fut,
        Fut: Future<Output = Result<T, AgentError>> + Send + 'static,
        T: Send + 'static,
    {
        tokio::spawn(op(Arc::clone(self)))
    }

    /// Spawn [`Self::send_request_for_avail_claims`].
    pub fn spawn_request_for_avail_claims(
        self: &Arc<Self>,
        link_name: impl Into<String>,
    ) -> JoinHandle<Result<Option<RequestId>, AgentError>> {
        let link_name = link_name.into();
        self.spawn(|agent| async move { agent.send_request_for_avail_claims(&link_name).await })
    }

    /// Spawn [`Self::send_req_claim`].
    pub fn spawn_req_claim(
        self: &Arc<Self>,
        link_name: impl Into<String>,
        schema_key: SchemaKey,
    ) -> JoinHandle<Result<Option<RequestId>, AgentError>> {
        let link_name = link_name.into();
        self.spawn(|agent| async move { agent.send_req_claim(&link_name, &schema_key).await })
    }

    /// Spawn [`Self::send_proof`].
    pub fn spawn_send_proof(
        self: &Arc<Self>,
        link_name: impl Into<String>,
        request: ProofRequest,
    ) -> JoinHandle<Result<Option<RequestId>, AgentError>> {
        let link_name = link_name.into();
        self.spawn(|agent| async move { agent.send_proof(&link_name, &request).await })
    }

    /// Spawn [`Self::send_proof_request`].
    pub fn spawn_send_proof_request(
        self: &Arc<Self>,
        link_name: impl Into<String>,
        request: ProofRequest,
    ) -> JoinHandle<Result<Option<RequestId>, AgentError>> {
        let link_name = link_name.into();
        self.spawn(|agent| async move { agent.send_proof_request(&link_name, request).await })
    }
}

fn role_missing(role: Role, msg_type: MessageType) -> AgentError {
    AgentError::RoleNotConfigured {
        role: role.as_str(),
        msg_type: msg_type.tag().to_string(),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Fixtures shared by the role-handler tests: one agent per role on a
    //! [`RecordingTransport`], sharing a ledger with the Faber transcript
    //! schema already defined.

    use super::*;
    use crate::issuer::InMemoryIssuerBackend;
    use crate::notify::RecordingNotifier;
    use crate::transport::RecordingTransport;
    use claimex_core::{Attributes, AvailableClaim, Nonce};
    use claimex_crypto::Ed25519KeyPair;
    use claimex_engine::{MockIssuer, MockProver, MockVerifier, Schema};
    use serde_json::json;

    pub(crate) const NONCE: &str = "b1134a647eb818069c089e7694f63e6d";

    pub(crate) struct Harness {
        pub(crate) agent: Arc<Agent>,
        pub(crate) transport: Arc<RecordingTransport>,
        pub(crate) notifier: Arc<RecordingNotifier>,
    }

    pub(crate) fn ident(s: &str) -> Identifier {
        Identifier::new(s).unwrap()
    }

    pub(crate) fn transcript_attrs() -> Attributes {
        [
            ("student_name", "Alice Garcia"),
            ("ssn", "123-45-6789"),
            ("degree", "Bachelor of Science, Marketing"),
            ("year", "2015"),
            ("status", "graduated"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    pub(crate) struct World {
        pub(crate) ledger: Arc<Ledger>,
        pub(crate) faber_keys: Ed25519KeyPair,
        pub(crate) schema: Schema,
    }

    pub(crate) fn world() -> World {
        let ledger = Arc::new(Ledger::new());
        let faber_keys = Ed25519KeyPair::from_seed_phrase("Faber College");
        let issuer = MockIssuer::new(faber_keys.identifier(), faber_keys.clone(), Arc::clone(&ledger));
        let schema = issuer
            .define_schema(
                "Transcript",
                "1.2",
                &["student_name", "ssn", "degree", "year", "status"],
            )
            .unwrap();
        issuer.generate_claim_def(schema.seq_no).unwrap();
        World {
            ledger,
            faber_keys,
            schema,
        }
    }

    fn harness(builder: impl FnOnce(AgentBuilder) -> AgentBuilder, name: &str, id: Identifier) -> Harness {
        let transport = Arc::new(RecordingTransport::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let agent = builder(
            Agent::builder(name, id, transport.clone())
                .notifier(notifier.clone())
                .request_ids(RequestIdGenerator::starting_at(1000)),
        )
        .build();
        Harness {
            agent: Arc::new(agent),
            transport,
            notifier,
        }
    }

    /// Faber; its link to Alice is called "Alice" and offers the transcript.
    pub(crate) fn faber(w: &World) -> (Harness, Arc<InMemoryIssuerBackend>) {
        let engine = Arc::new(MockIssuer::new(
            w.faber_keys.identifier(),
            w.faber_keys.clone(),
            Arc::clone(&w.ledger),
        ));
        let backend = Arc::new(InMemoryIssuerBackend::new());
        backend.offer("alice-1", AvailableClaim::from(&w.schema.key()), transcript_attrs());
        let h = harness(
            |b| b.issuer(engine, backend.clone()),
            "Faber College",
            w.faber_keys.identifier(),
        );
        h.agent.links().insert(
            Link::new("Alice", ident("faberalice"), Nonce::new(NONCE).unwrap())
                .accept(ident("alicefaber"), "alice:1")
                .with_internal_id("alice-1"),
        );
        (h, backend)
    }

    /// Alice; her link to Faber is called "Faber College".
    pub(crate) fn alice(w: &World) -> Harness {
        let engine = Arc::new(MockProver::with_master_secret(Arc::clone(&w.ledger), &[7u8; 32]));
        let h = harness(|b| b.prover(engine), "Alice", ident("alicedefault"));
        h.agent.links().insert(
            Link::new("Faber College", ident("alicefaber"), Nonce::new(NONCE).unwrap())
                .accept(ident("faberalice"), "faber:1"),
        );
        h
    }

    /// Acme; its link to Alice is called "Alice".
    pub(crate) fn acme(w: &World) -> Harness {
        let engine = Arc::new(MockVerifier::new(Arc::clone(&w.ledger)));
        let h = harness(|b| b.verifier(engine), "Acme Corp", ident("acmedefault"));
        h.agent.links().insert(
            Link::new("Alice", ident("acmealice"), Nonce::new("57fbf9dc8c8e6acde33de98c6d747b28").unwrap())
                .accept(ident("aliceacme"), "alice:1"),
        );
        h
    }

    /// An inbound message as if signed by `identifier` at `address`.
    pub(crate) fn inbound(mut body: Value, identifier: &str, address: &str, req_id: u64) -> InboundMessage {
        if let Value::Object(map) = &mut body {
            map.insert("identifier".into(), json!(identifier));
            map.insert("reqId".into(), json!(req_id));
        }
        InboundMessage {
            body,
            sender: Sender {
                name: address.split(':').next().unwrap_or_default().to_string(),
                address: address.to_string(),
            },
        }
    }

    /// Re-deliver a recorded message to another harness.
    pub(crate) fn forward(sent: &crate::transport::SentMessage, from_address: &str) -> InboundMessage {
        InboundMessage {
            body: sent.body.clone(),
            sender: Sender {
                name: from_address.to_string(),
                address: from_address.to_string(),
            },
        }
    }
}
