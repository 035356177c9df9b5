//! # Issuer Role
//!
//! Answers `REQ_AVAIL_CLAIMS` and `CLAIM_REQUEST` from provers.
//!
//! A request is accepted only from the link it names: the invitation nonce
//! selects the link and the signer must be that link's counterparty. A
//! request that fails this check is answered with a notification signed by
//! the agent's default identifier, and nothing else happens.
//!
//! What is offered on a link and which attribute values back each claim is
//! decided by an [`IssuerBackend`], keyed by the link's internal id.

use std::collections::HashMap;

use async_trait::async_trait;
use claimex_core::{Attributes, AvailableClaim, Nonce, SchemaId, SchemaKey};
use parking_lot::RwLock;

use crate::agent::{Agent, Inbound};
use crate::error::AgentError;
use crate::link::Link;
use crate::message::{AgentMessage, AvailClaimListData, ClaimData, ClaimRequestData, MessageType};

/// Notification sent when the requested claim is not offered on the link.
pub const CLAIM_NOT_AVAILABLE: &str = "This claim is not yet available.";

/// Issuer-side records behind each link.
#[async_trait]
pub trait IssuerBackend: Send + Sync {
    /// Claims currently offered on `link`.
    async fn available_claims(&self, link: &Link) -> Vec<AvailableClaim>;

    /// Raw attribute values on file for `link` under `schema_key`.
    async fn attributes_for(&self, link: &Link, schema_key: &SchemaKey) -> Option<Attributes>;
}

/// Offers and attribute values in memory, keyed by link internal id.
#[derive(Debug, Default)]
pub struct InMemoryIssuerBackend {
    offers: RwLock<HashMap<String, Vec<(AvailableClaim, Attributes)>>>,
}

impl InMemoryIssuerBackend {
    /// An empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Offer `claim` backed by `attributes` to the link with `internal_id`.
    /// Offering the same claim again replaces its attributes.
    pub fn offer(&self, internal_id: impl Into<String>, claim: AvailableClaim, attributes: Attributes) {
        let mut offers = self.offers.write();
        let entries = offers.entry(internal_id.into()).or_default();
        match entries.iter_mut().find(|(c, _)| c == &claim) {
            Some(entry) => entry.1 = attributes,
            None => entries.push((claim, attributes)),
        }
    }

    fn entries(&self, link: &Link) -> Vec<(AvailableClaim, Attributes)> {
        link.internal_id
            .as_ref()
            .and_then(|id| self.offers.read().get(id).cloned())
            .unwrap_or_default()
    }
}

#[async_trait]
impl IssuerBackend for InMemoryIssuerBackend {
    async fn available_claims(&self, link: &Link) -> Vec<AvailableClaim> {
        self.entries(link).into_iter().map(|(c, _)| c).collect()
    }

    async fn attributes_for(&self, link: &Link, schema_key: &SchemaKey) -> Option<Attributes> {
        self.entries(link)
            .into_iter()
            .find(|(c, _)| &c.schema_key() == schema_key)
            .map(|(_, attrs)| attrs)
    }
}

impl Agent {
    /// The link named by `nonce`, if the message was signed by its
    /// counterparty. Otherwise notify the requester and the local sink.
    async fn verify_link(&self, inbound: &Inbound, nonce: &Nonce) -> Result<Option<Link>, AgentError> {
        let link = self.links.find_by_nonce(nonce).filter(|l| {
            l.remote_identifier.is_some() && l.remote_identifier == inbound.envelope.identifier
        });
        if link.is_some() {
            return Ok(link);
        }
        let text = format!("Link for nonce {nonce} could not be verified.");
        tracing::warn!(agent = %self.name, from = %inbound.sender.name, %nonce, "unverified link");
        self.notifier.notify(&text);
        self.sign_and_send(
            &AgentMessage::notify(text),
            &self.default_identifier,
            &inbound.sender.address,
            inbound.envelope.req_id,
        )
        .await?;
        Ok(None)
    }

    /// Reply to `REQ_AVAIL_CLAIMS` with the claims offered on the link.
    pub(crate) async fn process_req_avail_claims(
        &self,
        inbound: &Inbound,
        nonce: &Nonce,
    ) -> Result<(), AgentError> {
        let Some(link) = self.verify_link(inbound, nonce).await? else {
            return Ok(());
        };
        let issuer = self.issuer_role(MessageType::ReqAvailClaims)?;
        let claims = issuer.backend.available_claims(&link).await;
        tracing::info!(agent = %self.name, link = %link.name, offered = claims.len(), "listing available claims");
        let reply = AgentMessage::AvailClaimList {
            data: AvailClaimListData {
                available_claims_list: claims,
            },
        };
        self.sign_and_send(
            &reply,
            &link.local_identifier,
            &inbound.sender.address,
            inbound.envelope.req_id,
        )
        .await?;
        Ok(())
    }

    /// Issue the requested claim, or notify that it is not offered.
    pub(crate) async fn process_req_claim(
        &self,
        inbound: &Inbound,
        nonce: &Nonce,
        data: ClaimRequestData,
    ) -> Result<(), AgentError> {
        let Some(link) = self.verify_link(inbound, nonce).await? else {
            return Ok(());
        };
        let issuer = self.issuer_role(MessageType::ClaimRequest)?;
        let id = SchemaId::SeqNo(data.schema_seq_no);
        let schema = issuer.engine.get_schema(&id).await?;
        let key = schema.key();

        let offered = issuer.backend.available_claims(&link).await;
        if !offered.iter().any(|c| c.schema_key() == key) {
            tracing::info!(agent = %self.name, link = %link.name, schema = %key, "claim not offered");
            self.sign_and_send(
                &AgentMessage::notify(CLAIM_NOT_AVAILABLE),
                &self.default_identifier,
                &inbound.sender.address,
                inbound.envelope.req_id,
            )
            .await?;
            return Ok(());
        }

        let pk = issuer.engine.get_public_key(&id).await?;
        let request = data.blinded_ms;
        if let Some(attrs) = issuer.backend.attributes_for(&link, &key).await {
            issuer
                .engine
                .add_attributes(&key, &request.prover_did, attrs)
                .await?;
        }
        let (signature, claim) = issuer.engine.issue_claim(&id, &request).await?;

        let reply = AgentMessage::Claim {
            data: ClaimData {
                claims_signature: signature,
                identifier: self.default_identifier.clone(),
                claim: serde_json::to_string(&claim)?,
                claim_def_seq_no: pk.seq_no,
                revoc_reg_seq_no: 0,
                schema_seq_no: schema.seq_no,
            },
        };
        self.sign_and_send(
            &reply,
            &link.local_identifier,
            &inbound.sender.address,
            inbound.envelope.req_id,
        )
        .await?;
        tracing::info!(
            agent = %self.name,
            link = %link.name,
            schema_seq_no = schema.seq_no,
            "claim sent"
        );
        Ok(())
    }
}
