//! # Claim Selection
//!
//! Picks, from the claims received across all links, which ones answer a
//! set of requested attribute names.
//!
//! The cover is greedy and single-pass. Attribute names are taken in the
//! given order; a name already supplied by a chosen claim is skipped,
//! otherwise the first candidate (in link enumeration order) that has it is
//! chosen. A link enters the result at most once, in first-use order, as a
//! [`LinkSelection`] holding every claim used from it. Candidates not yet
//! received carry `None` values and never match.

use std::collections::BTreeMap;

use claimex_core::{AvailableClaim, ProofRequest, SchemaId};

use crate::agent::Agent;
use crate::error::AgentError;
use crate::message::MessageType;

/// A claim offered on a link, with its values if received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkClaim {
    /// Link the claim was offered on.
    pub link_name: String,
    /// The claim reference.
    pub claim: AvailableClaim,
    /// Attribute name → raw value; `None` until the claim is received.
    pub attrs: BTreeMap<String, Option<String>>,
}

impl LinkClaim {
    /// Whether the claim has been received.
    pub fn is_received(&self) -> bool {
        !self.attrs.is_empty() && self.attrs.values().all(Option::is_some)
    }

    /// Whether the received claim has a value for `name`.
    pub fn supplies(&self, name: &str) -> bool {
        matches!(self.attrs.get(name), Some(Some(_)))
    }
}

/// The claims used from one link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkSelection {
    /// Link the claims were offered on.
    pub link_name: String,
    /// Claims used from the link, in first-use order.
    pub claims: Vec<LinkClaim>,
}

impl LinkSelection {
    /// Whether any claim used from the link has a value for `name`.
    pub fn supplies(&self, name: &str) -> bool {
        self.claims.iter().any(|c| c.supplies(name))
    }
}

/// Select the claims that answer `attr_names`. Deterministic for a fixed
/// candidate order.
pub fn select_claims_for_attrs(
    candidates: &[LinkClaim],
    attr_names: &[String],
) -> Vec<LinkSelection> {
    let mut chosen: Vec<LinkSelection> = Vec::new();
    for name in attr_names {
        if chosen.iter().any(|s| s.supplies(name)) {
            continue;
        }
        let Some(candidate) = candidates.iter().find(|c| c.supplies(name)) else {
            continue;
        };
        match chosen.iter_mut().find(|s| s.link_name == candidate.link_name) {
            Some(selection) => selection.claims.push(candidate.clone()),
            None => chosen.push(LinkSelection {
                link_name: candidate.link_name.clone(),
                claims: vec![candidate.clone()],
            }),
        }
    }
    chosen
}

impl Agent {
    /// Every claim offered on every link, optionally only those named
    /// `claim_name`, with received values filled in.
    pub async fn get_matching_links_with_received_claim(
        &self,
        claim_name: Option<&str>,
    ) -> Result<Vec<LinkClaim>, AgentError> {
        let prover = self.prover_engine(MessageType::ProofRequest)?;
        let mut out = Vec::new();
        for link in self.links.list() {
            for claim in &link.available_claims {
                if claim_name.is_some_and(|n| n != claim.name) {
                    continue;
                }
                let key = claim.schema_key();
                let attrs = match link.received_claims.get(&key) {
                    Some(values) => values
                        .iter()
                        .map(|(name, raw)| (name.clone(), Some(raw.clone())))
                        .collect(),
                    None => prover
                        .get_schema(&SchemaId::Key(key))
                        .await?
                        .attr_names
                        .into_iter()
                        .map(|name| (name, None))
                        .collect(),
                };
                out.push(LinkClaim {
                    link_name: link.name.clone(),
                    claim: claim.clone(),
                    attrs,
                });
            }
        }
        Ok(out)
    }

    /// Received claims that supply any of `attr_names`.
    pub async fn get_matching_rcvd_claims(
        &self,
        attr_names: &[String],
    ) -> Result<Vec<LinkClaim>, AgentError> {
        Ok(self
            .get_matching_links_with_received_claim(None)
            .await?
            .into_iter()
            .filter(|c| c.is_received() && attr_names.iter().any(|n| c.supplies(n)))
            .collect())
    }

    /// The claims [`select_claims_for_attrs`] picks for `attr_names`.
    pub async fn get_claims_used_for_attrs(
        &self,
        attr_names: &[String],
    ) -> Result<Vec<LinkSelection>, AgentError> {
        let candidates = self.get_matching_links_with_received_claim(None).await?;
        Ok(select_claims_for_attrs(&candidates, attr_names))
    }

    /// The claims needed to answer `request`'s revealed attributes and
    /// predicates.
    pub async fn get_claims_for_proof_request(
        &self,
        request: &ProofRequest,
    ) -> Result<Vec<LinkSelection>, AgentError> {
        self.get_claims_used_for_attrs(&request.claim_backed_attr_names())
            .await
    }
}
