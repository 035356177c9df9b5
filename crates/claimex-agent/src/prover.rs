//! # Prover Role
//!
//! The holder side: ask a link what it offers, request claims, accept
//! issued claims, collect proof requests and answer them with proofs.
//!
//! Sends that find their link not ready are reported to the notification
//! sink and return `Ok(None)`. Inbound messages from a signer that matches
//! no link are dropped with a [`crate::agent::NO_MATCHING_LINK`]
//! notification.

use claimex_core::{Attributes, AvailableClaim, ClaimAttributes, ProofRequest, RequestId, SchemaId, SchemaKey};
use claimex_engine::ProofInput;
use serde_json::Value;

use crate::agent::{Agent, Inbound};
use crate::error::AgentError;
use crate::message::{AgentMessage, AvailClaimListData, ClaimData, ClaimRequestData, EventData, MessageType};

impl Agent {
    /// Ask the link's counterparty which claims it offers.
    pub async fn send_request_for_avail_claims(
        &self,
        link_name: &str,
    ) -> Result<Option<RequestId>, AgentError> {
        let link = self.link(link_name)?;
        let msg = AgentMessage::ReqAvailClaims {
            nonce: link.invitation_nonce,
        };
        self.send_to_link_or_notify(&msg, link_name, None).await
    }

    /// Request the claim of `schema_key` over the link.
    ///
    /// The blinded request is tied to the link's invitation nonce, which the
    /// issuer files the prover's attributes under.
    pub async fn send_req_claim(
        &self,
        link_name: &str,
        schema_key: &SchemaKey,
    ) -> Result<Option<RequestId>, AgentError> {
        let link = self.link(link_name)?;
        if !link.is_ready() {
            self.notifier
                .notify(&AgentError::LinkNotReady(link.name).to_string());
            return Ok(None);
        }
        let prover = self.prover_engine(MessageType::ClaimRequest)?;
        let id = SchemaId::Key(schema_key.clone());
        let blinded_ms = prover
            .create_claim_request(&id, link.invitation_nonce.as_str(), false)
            .await?;
        let pk = prover.get_public_key(&id).await?;
        let schema = prover.get_schema(&id).await?;
        let msg = AgentMessage::ClaimRequest {
            nonce: link.invitation_nonce,
            data: ClaimRequestData {
                schema_seq_no: schema.seq_no,
                issuer_did: schema.issuer_id,
                claim_def_seq_no: pk.seq_no,
                blinded_ms,
            },
        };
        self.send_to_link_or_notify(&msg, link_name, None).await
    }

    /// Record the claims listed on `AVAIL_CLAIM_LIST`.
    pub(crate) async fn handle_avail_claims_response(
        &self,
        inbound: &Inbound,
        data: AvailClaimListData,
    ) -> Result<(), AgentError> {
        let Some(link) = self.link_of_sender(inbound) else {
            return Ok(());
        };
        self.notify_response_from_msg(&inbound.envelope);
        let names: Vec<String> = data
            .available_claims_list
            .iter()
            .map(|c| c.name.clone())
            .collect();
        let claims = data.available_claims_list;
        self.links.update(&link.name, &mut |l| {
            l.merge_available_claims(claims.iter().cloned())
        });
        tracing::info!(agent = %self.name, link = %link.name, count = names.len(), "available claims recorded");
        self.notifier
            .notify(&format!("Available Claim(s): {}", names.join(", ")));
        Ok(())
    }

    /// Verify and store an issued claim. The claim counts as received on
    /// the link only once the engine has accepted it.
    pub(crate) async fn handle_req_claim_response(
        &self,
        inbound: &Inbound,
        data: ClaimData,
    ) -> Result<(), AgentError> {
        let Some(link) = self.link_of_sender(inbound) else {
            return Ok(());
        };
        self.notify_response_from_msg(&inbound.envelope);
        let prover = self.prover_engine(MessageType::Claim)?;
        let id = SchemaId::SeqNo(data.schema_seq_no);
        prover.get_public_key(&id).await?;
        let attrs: ClaimAttributes = serde_json::from_str(&data.claim)
            .map_err(|e| AgentError::malformed(MessageType::Claim.tag(), e))?;
        prover
            .process_claim(&id, attrs.clone(), data.claims_signature)
            .await?;
        let schema = prover.get_schema(&id).await?;

        let key = schema.key();
        let raw: Attributes = attrs.into_iter().map(|(name, v)| (name, v.raw)).collect();
        // Re-read under the store lock; the link may have changed while the
        // engine was busy.
        self.links.update(&link.name, &mut |l| {
            l.merge_available_claims([AvailableClaim::from(&key)]);
            l.received_claims.insert(key.clone(), raw.clone());
        });
        tracing::info!(
            agent = %self.name,
            link = %link.name,
            schema_seq_no = schema.seq_no,
            "claim received"
        );
        self.notifier
            .notify(&format!("Received claim \"{}\".", schema.name));
        Ok(())
    }

    /// File an inbound proof request on the link, once per name. The
    /// latest `reqId` per name is kept for the `PROOF` reply to echo.
    pub(crate) async fn handle_proof_request(
        &self,
        inbound: &Inbound,
        request: ProofRequest,
    ) -> Result<(), AgentError> {
        let Some(link) = self.link_of_sender(inbound) else {
            return Ok(());
        };
        request
            .validate()
            .map_err(|e| AgentError::malformed(MessageType::ProofRequest.tag(), e))?;
        let name = request.name.clone();
        let req_id = inbound.envelope.req_id;
        let mut added = false;
        self.links.update(&link.name, &mut |l| {
            added = l.add_proof_request(request.clone());
            if let Some(id) = req_id {
                l.proof_request_ids.insert(name.clone(), id);
            }
        });
        if added {
            tracing::info!(agent = %self.name, link = %link.name, proof_request = %name, "proof request filed");
            self.notifier
                .notify(&format!("Proof request {name} received from {}.", link.name));
        } else {
            tracing::debug!(agent = %self.name, link = %link.name, proof_request = %name, "duplicate proof request");
            self.notifier
                .notify(&format!("Proof request {name} already exist."));
        }
        Ok(())
    }

    /// Build a proof for `request` and send it over the link.
    ///
    /// Self-attested values are copied into the proof as given; they are not
    /// backed by any claim.
    pub async fn send_proof(
        &self,
        link_name: &str,
        request: &ProofRequest,
    ) -> Result<Option<RequestId>, AgentError> {
        let link = self.link(link_name)?;
        if !link.is_ready() {
            self.notifier
                .notify(&AgentError::LinkNotReady(link.name).to_string());
            return Ok(None);
        }
        let prover = self.prover_engine(MessageType::Proof)?;
        let mut proof = prover.present_proof(&ProofInput::from(request)).await?;
        proof
            .requested_proof
            .self_attested_attrs
            .extend(request.self_attested_attrs.clone());
        let msg = AgentMessage::Proof {
            nonce: link.invitation_nonce,
            proof,
            proof_request: request.clone(),
            revealed_attrs: Some(AgentMessage::revealed_attrs_field(request)?),
        };
        let orig_req_id = link.proof_request_ids.get(&request.name).copied();
        self.send_to_link_or_notify(&msg, link_name, orig_req_id).await
    }

    /// Forward the verifier's verdict.
    pub(crate) async fn handle_proof_status_response(
        &self,
        inbound: &Inbound,
        data: Value,
    ) -> Result<(), AgentError> {
        if self.link_of_sender(inbound).is_none() {
            return Ok(());
        }
        self.notify_response_from_msg(&inbound.envelope);
        match data {
            Value::String(text) => self.notifier.notify(&text),
            other => self.notifier.notify(&other.to_string()),
        }
        Ok(())
    }

    /// Forward an `EVENT` notification.
    pub(crate) async fn handle_event(&self, inbound: &Inbound, data: EventData) -> Result<(), AgentError> {
        self.notify_response_from_msg(&inbound.envelope);
        self.notifier.notify(&data.msg);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::test_support::*;
    use crate::agent::NO_MATCHING_LINK;
    use crate::issuer::CLAIM_NOT_AVAILABLE;
    use crate::link::Link;
    use crate::message::REF_REQUEST_ID;
    use claimex_core::{AttributeInfo, Nonce, Predicate};
    use serde_json::json;

    fn job_application() -> ProofRequest {
        ProofRequest::new("Job-Application", "0.2", "1871218719015472932666560146158750511756")
            .unwrap()
            .with_verifiable_attribute("attr_ssn", AttributeInfo::named("ssn"))
            .with_verifiable_attribute("attr_degree", AttributeInfo::named("degree"))
            .with_predicate("pred_year", Predicate::ge("year", 2010))
            .with_self_attested("first_name", "Alice")
    }

    fn proof_request_body(req: &ProofRequest) -> Value {
        json!({"type": "PROOF_REQUEST", "nonce": "57fbf9dc8c8e6acde33de98c6d747b28", "proofRequest": req})
    }

    /// Run the claim exchange between recording harnesses: Alice requests,
    /// Faber issues, Alice processes.
    async fn obtain_transcript(w: &World) -> (Harness, Harness) {
        let alice = alice(w);
        let (faber, _) = faber(w);
        alice
            .agent
            .send_req_claim("Faber College", &w.schema.key())
            .await
            .unwrap()
            .unwrap();
        let request = alice.transport.sent_of_type("CLAIM_REQUEST").remove(0);
        faber.agent.handle(forward(&request, "alice:1")).await.unwrap();
        let claim = faber.transport.sent_of_type("CLAIM").remove(0);
        alice.agent.handle(forward(&claim, "faber:1")).await.unwrap();
        (alice, faber)
    }

    #[tokio::test]
    async fn avail_claims_request_carries_the_invitation_nonce() {
        let w = world();
        let alice = alice(&w);
        alice
            .agent
            .send_request_for_avail_claims("Faber College")
            .await
            .unwrap();
        let sent = alice.transport.sent_of_type("REQ_AVAIL_CLAIMS");
        assert_eq!(sent[0].body["nonce"], NONCE);
        assert_eq!(sent[0].signer, ident("alicefaber"));
        assert_eq!(sent[0].to, "faber:1");
    }

    #[tokio::test]
    async fn not_ready_link_is_reported_not_raised() {
        let w = world();
        let alice = alice(&w);
        alice.agent.links().insert(Link::new(
            "Thrift Bank",
            ident("alicethrift"),
            Nonce::new("77fbf9dc8c8e6acde33de98c6d747b28").unwrap(),
        ));
        assert_eq!(alice.agent.send_request_for_avail_claims("Thrift Bank").await.unwrap(), None);
        assert_eq!(alice.agent.send_req_claim("Thrift Bank", &w.schema.key()).await.unwrap(), None);
        assert_eq!(alice.agent.send_proof("Thrift Bank", &job_application()).await.unwrap(), None);
        assert!(alice.transport.sent().is_empty());
        assert!(alice.notifier.contains("not yet ready"));
        assert!(alice.agent.pending_requests().is_empty());
    }

    #[tokio::test]
    async fn unknown_link_is_an_error() {
        let w = world();
        let alice = alice(&w);
        assert!(matches!(
            alice.agent.send_request_for_avail_claims("Nobody").await,
            Err(AgentError::LinkNotFound(_))
        ));
    }

    #[tokio::test]
    async fn avail_claim_list_is_merged_once() {
        let w = world();
        let alice = alice(&w);
        let body = json!({
            "type": "AVAIL_CLAIM_LIST",
            "data": {"availableClaimsList": [AvailableClaim::from(&w.schema.key())]}
        });
        for req_id in [1, 2] {
            alice
                .agent
                .handle(inbound(body.clone(), "faberalice", "faber:1", req_id))
                .await
                .unwrap();
        }
        let link = alice.agent.link("Faber College").unwrap();
        assert_eq!(link.available_claims.len(), 1);
        assert!(alice.notifier.contains("Available Claim(s): Transcript"));
    }

    #[tokio::test]
    async fn claim_is_received_and_readable() {
        let w = world();
        let (alice, _faber) = obtain_transcript(&w).await;
        let link = alice.agent.link("Faber College").unwrap();
        let received = &link.received_claims[&w.schema.key()];
        assert_eq!(received["student_name"], "Alice Garcia");
        assert!(link.offers(&w.schema.key()));

        let prover = alice.agent.prover_engine(MessageType::Claim).unwrap();
        let attrs = prover.get_claim(&w.schema.key().into()).await.unwrap();
        assert_eq!(attrs["ssn"].raw, "123-45-6789");
        assert!(alice.notifier.contains("Received claim \"Transcript\""));
    }

    #[tokio::test]
    async fn redelivered_claim_is_accepted_once() {
        let w = world();
        let (alice, faber) = obtain_transcript(&w).await;
        let claim = faber.transport.sent_of_type("CLAIM").remove(0);
        alice.agent.handle(forward(&claim, "faber:1")).await.unwrap();

        let link = alice.agent.link("Faber College").unwrap();
        assert_eq!(link.received_claims.len(), 1);
        assert_eq!(link.received_claims[&w.schema.key()]["ssn"], "123-45-6789");
        let prover = alice.agent.prover_engine(MessageType::Claim).unwrap();
        assert!(prover.get_claim(&w.schema.key().into()).await.is_ok());
    }

    #[tokio::test]
    async fn claim_reply_is_correlated_to_its_request() {
        let w = world();
        let (alice, faber) = obtain_transcript(&w).await;
        let request = &alice.transport.sent_of_type("CLAIM_REQUEST")[0];
        let reply = &faber.transport.sent_of_type("CLAIM")[0];
        assert_eq!(reply.body[REF_REQUEST_ID], request.body["reqId"]);
        assert!(alice.agent.pending_requests().is_empty());
        assert!(alice.notifier.contains("Response from Faber College"));
    }

    #[tokio::test]
    async fn claim_from_unknown_sender_is_dropped() {
        let w = world();
        let (faber, _) = faber(&w);
        let alice = alice(&w);
        alice
            .agent
            .send_req_claim("Faber College", &w.schema.key())
            .await
            .unwrap();
        let request = alice.transport.sent_of_type("CLAIM_REQUEST").remove(0);
        faber.agent.handle(forward(&request, "alice:1")).await.unwrap();
        let mut claim = faber.transport.sent_of_type("CLAIM").remove(0);
        claim.body["identifier"] = json!("stranger");
        alice.agent.handle(forward(&claim, "faber:1")).await.unwrap();
        assert!(alice.notifier.contains(NO_MATCHING_LINK));
        assert!(alice.agent.link("Faber College").unwrap().received_claims.is_empty());
    }

    #[tokio::test]
    async fn tampered_claim_surfaces_engine_error() {
        let w = world();
        let (faber, _) = faber(&w);
        let alice = alice(&w);
        alice
            .agent
            .send_req_claim("Faber College", &w.schema.key())
            .await
            .unwrap();
        let request = alice.transport.sent_of_type("CLAIM_REQUEST").remove(0);
        faber.agent.handle(forward(&request, "alice:1")).await.unwrap();
        let mut claim = faber.transport.sent_of_type("CLAIM").remove(0);
        let mut attrs: ClaimAttributes =
            serde_json::from_str(claim.body["data"]["claim"].as_str().unwrap()).unwrap();
        attrs.insert("degree".into(), claimex_core::AttributeValues::from_raw("PhD"));
        claim.body["data"]["claim"] = json!(serde_json::to_string(&attrs).unwrap());
        let err = alice.agent.handle(forward(&claim, "faber:1")).await.unwrap_err();
        assert!(matches!(err, AgentError::Engine(_)));
        assert!(alice.agent.link("Faber College").unwrap().received_claims.is_empty());
    }

    #[tokio::test]
    async fn not_available_event_is_forwarded() {
        let w = world();
        let alice = alice(&w);
        alice
            .agent
            .handle(inbound(
                serde_json::to_value(AgentMessage::notify(CLAIM_NOT_AVAILABLE)).unwrap(),
                "faberdefault",
                "faber:1",
                3,
            ))
            .await
            .unwrap();
        assert!(alice.notifier.contains(CLAIM_NOT_AVAILABLE));
    }

    #[tokio::test]
    async fn duplicate_proof_request_is_filed_once() {
        let w = world();
        let alice = alice(&w);
        alice.agent.links().insert(
            Link::new("Acme Corp", ident("aliceacme"), Nonce::new("57fbf9dc8c8e6acde33de98c6d747b28").unwrap())
                .accept(ident("acmealice"), "acme:1"),
        );
        let body = proof_request_body(&job_application());
        for req_id in [10, 11] {
            alice
                .agent
                .handle(inbound(body.clone(), "acmealice", "acme:1", req_id))
                .await
                .unwrap();
        }
        let link = alice.agent.link("Acme Corp").unwrap();
        assert_eq!(link.proof_requests.len(), 1);
        assert_eq!(link.proof_request_ids["Job-Application"], RequestId::new(11));
        assert!(alice.notifier.contains("Proof request Job-Application received from Acme Corp."));
        assert!(alice.notifier.contains("Proof request Job-Application already exist."));
    }

    #[tokio::test]
    async fn proof_request_from_unknown_sender_is_dropped() {
        let w = world();
        let alice = alice(&w);
        alice
            .agent
            .handle(inbound(proof_request_body(&job_application()), "acmealice", "acme:1", 1))
            .await
            .unwrap();
        assert!(alice.notifier.contains(NO_MATCHING_LINK));
    }

    #[tokio::test]
    async fn proof_carries_request_echo_and_self_attested_values() {
        let w = world();
        let (alice, _faber) = obtain_transcript(&w).await;
        alice.agent.links().insert(
            Link::new("Acme Corp", ident("aliceacme"), Nonce::new("57fbf9dc8c8e6acde33de98c6d747b28").unwrap())
                .accept(ident("acmealice"), "acme:1"),
        );
        let req = job_application();
        alice.agent.send_proof("Acme Corp", &req).await.unwrap().unwrap();
        let sent = alice.transport.sent_of_type("PROOF").remove(0);
        assert_eq!(sent.to, "acme:1");
        assert_eq!(sent.body["proofRequest"]["name"], "Job-Application");
        assert_eq!(
            sent.body["proof"]["requested_proof"]["self_attested_attrs"]["first_name"],
            "Alice"
        );
        assert_eq!(
            sent.body["proof"]["requested_proof"]["revealed_attrs"]["attr_ssn"][1],
            "123-45-6789"
        );
        let revealed: Value =
            serde_json::from_str(sent.body["revealedAttrs"].as_str().unwrap()).unwrap();
        assert_eq!(revealed["attr_degree"]["name"], "degree");
        // Never received as a message, so nothing to answer.
        assert!(sent.body.get(REF_REQUEST_ID).is_none());
    }

    #[tokio::test]
    async fn proof_answers_the_request_message_it_was_filed_from() {
        let w = world();
        let (alice, _faber) = obtain_transcript(&w).await;
        alice.agent.links().insert(
            Link::new("Acme Corp", ident("aliceacme"), Nonce::new("57fbf9dc8c8e6acde33de98c6d747b28").unwrap())
                .accept(ident("acmealice"), "acme:1"),
        );
        alice
            .agent
            .handle(inbound(proof_request_body(&job_application()), "acmealice", "acme:1", 77))
            .await
            .unwrap();
        let filed = alice.agent.link("Acme Corp").unwrap().proof_requests[0].clone();
        alice.agent.send_proof("Acme Corp", &filed).await.unwrap().unwrap();
        let sent = alice.transport.sent_of_type("PROOF").remove(0);
        assert_eq!(sent.body[REF_REQUEST_ID], 77);
    }

    #[tokio::test]
    async fn proof_status_is_forwarded_verbatim() {
        let w = world();
        let alice = alice(&w);
        let text = "Your Proof Job-Application 0.2 was received and successfully verified";
        alice
            .agent
            .handle(inbound(
                json!({"type": "PROOF_STATUS", "data": text}),
                "faberalice",
                "faber:1",
                4,
            ))
            .await
            .unwrap();
        assert_eq!(alice.notifier.messages().last().map(String::as_str), Some(text));
    }
}
