//! # Verifier Role
//!
//! Sends proof requests and checks the proofs that come back. A proof is
//! checked against the verifier's own copy of the request with the same
//! name; the prover's echo is used only when no such copy exists.

use claimex_core::{ProofRequest, RequestId};
use claimex_engine::FullProof;
use serde_json::Value;

use crate::agent::{Agent, Inbound};
use crate::error::AgentError;
use crate::link::ProofResult;
use crate::message::{AgentMessage, MessageType};

/// Verdict text sent back to the prover.
pub fn proof_status_text(request: &ProofRequest, verified: bool) -> String {
    if verified {
        format!(
            "Your Proof {} {} was received and successfully verified",
            request.name, request.version
        )
    } else {
        format!(
            "Your Proof {} {} was received but was not verified",
            request.name, request.version
        )
    }
}

impl Agent {
    /// Record `request` on the link and send it to the counterparty. A
    /// stored request with the same name is replaced, and the pending entry
    /// of the message that carried it is dropped.
    pub async fn send_proof_request(
        &self,
        link_name: &str,
        request: ProofRequest,
    ) -> Result<Option<RequestId>, AgentError> {
        request.validate()?;
        let link = self.link(link_name)?;
        if !link.is_ready() {
            self.notifier
                .notify(&AgentError::LinkNotReady(link.name).to_string());
            return Ok(None);
        }
        let name = request.name.clone();
        self.links.update(&link.name, &mut |l| {
            l.replace_proof_request(request.clone());
        });
        let msg = AgentMessage::ProofRequest {
            nonce: link.invitation_nonce,
            proof_request: request,
        };
        let Some(req_id) = self.send_to_link_or_notify(&msg, link_name, None).await? else {
            return Ok(None);
        };
        let mut superseded = None;
        self.links.update(&link.name, &mut |l| {
            superseded = l.proof_request_ids.insert(name.clone(), req_id);
        });
        if let Some(old) = superseded {
            self.pending.lock().remove(&old);
        }
        Ok(Some(req_id))
    }

    /// Verify an inbound `PROOF`, record the verdict and reply `PROOF_STATUS`.
    pub(crate) async fn process_proof(
        &self,
        inbound: &Inbound,
        proof: FullProof,
        echo: ProofRequest,
    ) -> Result<(), AgentError> {
        let Some(link) = self.link_of_sender(inbound) else {
            return Ok(());
        };
        self.notify_response_from_msg(&inbound.envelope);
        let verifier = self.verifier_engine(MessageType::Proof)?;
        let request = link.find_proof_request(&echo.name).cloned().unwrap_or(echo);
        let verified = verifier.verify(&request, &proof).await?;

        let revealed = proof
            .requested_proof
            .revealed_attrs
            .iter()
            .map(|(referent, attr)| (referent.clone(), attr.raw.clone()))
            .collect();
        let result = ProofResult { verified, revealed };
        self.links.update(&link.name, &mut |l| {
            l.verified_claim_proofs
                .insert(request.name.clone(), result.clone());
        });
        tracing::info!(
            agent = %self.name,
            link = %link.name,
            proof_request = %request.name,
            verified,
            "proof checked"
        );

        let text = proof_status_text(&request, verified);
        self.notifier
            .notify(&format!("Proof \"{}\" from {}: {}", request.name, link.name, text));
        self.sign_and_send(
            &AgentMessage::ProofStatus {
                data: Value::String(text),
            },
            &link.local_identifier,
            &inbound.sender.address,
            inbound.envelope.req_id,
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::test_support::*;
    use crate::link::Link;
    use crate::message::REF_REQUEST_ID;
    use claimex_core::{AttributeInfo, Nonce, Predicate};

    fn job_application() -> ProofRequest {
        ProofRequest::new("Job-Application", "0.2", "1871218719015472932666560146158750511756")
            .unwrap()
            .with_verifiable_attribute("attr_ssn", AttributeInfo::named("ssn"))
            .with_predicate("pred_year", Predicate::ge("year", 2010))
    }

    /// Alice (holding the transcript) linked to Acme.
    async fn alice_with_transcript(w: &World) -> Harness {
        let alice = alice(w);
        let (faber, _) = faber(w);
        alice
            .agent
            .send_req_claim("Faber College", &w.schema.key())
            .await
            .unwrap();
        let request = alice.transport.sent_of_type("CLAIM_REQUEST").remove(0);
        faber.agent.handle(forward(&request, "alice:1")).await.unwrap();
        let claim = faber.transport.sent_of_type("CLAIM").remove(0);
        alice.agent.handle(forward(&claim, "faber:1")).await.unwrap();
        alice.agent.links().insert(
            Link::new("Acme Corp", ident("aliceacme"), Nonce::new("57fbf9dc8c8e6acde33de98c6d747b28").unwrap())
                .accept(ident("acmealice"), "acme:1"),
        );
        alice
    }

    #[tokio::test]
    async fn proof_request_is_recorded_and_sent() {
        let w = world();
        let acme = acme(&w);
        acme.agent
            .send_proof_request("Alice", job_application())
            .await
            .unwrap()
            .unwrap();
        acme.agent
            .send_proof_request("Alice", job_application())
            .await
            .unwrap();
        assert_eq!(acme.agent.link("Alice").unwrap().proof_requests.len(), 1);
        // The second send supersedes the first.
        assert_eq!(acme.agent.pending_requests().len(), 1);
        let sent = acme.transport.sent_of_type("PROOF_REQUEST");
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].signer, ident("acmealice"));
        assert_eq!(sent[0].body["proofRequest"]["name"], "Job-Application");
    }

    #[tokio::test]
    async fn invalid_proof_request_is_refused() {
        let w = world();
        let acme = acme(&w);
        let mut req = job_application();
        req.nonce = "not-a-number".to_string();
        assert!(matches!(
            acme.agent.send_proof_request("Alice", req).await,
            Err(AgentError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn valid_proof_is_verified_and_acknowledged() {
        let w = world();
        let acme = acme(&w);
        let alice = alice_with_transcript(&w).await;
        acme.agent
            .send_proof_request("Alice", job_application())
            .await
            .unwrap();
        let request = acme.transport.sent_of_type("PROOF_REQUEST").remove(0);
        alice.agent.handle(forward(&request, "acme:1")).await.unwrap();

        let filed = alice.agent.link("Acme Corp").unwrap().proof_requests[0].clone();
        alice.agent.send_proof("Acme Corp", &filed).await.unwrap();
        let proof = alice.transport.sent_of_type("PROOF").remove(0);
        acme.agent.handle(forward(&proof, "alice:1")).await.unwrap();

        let link = acme.agent.link("Alice").unwrap();
        let result = &link.verified_claim_proofs["Job-Application"];
        assert!(result.verified);
        assert_eq!(result.revealed["attr_ssn"], "123-45-6789");

        let status = acme.transport.sent_of_type("PROOF_STATUS").remove(0);
        assert_eq!(status.body[REF_REQUEST_ID], proof.body["reqId"]);
        assert_eq!(
            status.body["data"],
            "Your Proof Job-Application 0.2 was received and successfully verified"
        );
    }

    #[tokio::test]
    async fn proof_round_trip_leaves_nothing_pending() {
        let w = world();
        let acme = acme(&w);
        let alice = alice_with_transcript(&w).await;
        acme.agent
            .send_proof_request("Alice", job_application())
            .await
            .unwrap();
        let request = acme.transport.sent_of_type("PROOF_REQUEST").remove(0);
        alice.agent.handle(forward(&request, "acme:1")).await.unwrap();

        let filed = alice.agent.link("Acme Corp").unwrap().proof_requests[0].clone();
        alice.agent.send_proof("Acme Corp", &filed).await.unwrap();
        let proof = alice.transport.sent_of_type("PROOF").remove(0);
        assert_eq!(proof.body[REF_REQUEST_ID], request.body["reqId"]);
        acme.agent.handle(forward(&proof, "alice:1")).await.unwrap();
        let status = acme.transport.sent_of_type("PROOF_STATUS").remove(0);
        alice.agent.handle(forward(&status, "acme:1")).await.unwrap();

        assert!(acme.agent.pending_requests().is_empty());
        assert!(alice
            .agent
            .pending_requests()
            .values()
            .all(|p| p.link_name != "Acme Corp"));
    }

    #[tokio::test]
    async fn resent_request_with_a_new_nonce_is_the_one_checked() {
        let w = world();
        let acme = acme(&w);
        let alice = alice_with_transcript(&w).await;
        acme.agent
            .send_proof_request("Alice", job_application())
            .await
            .unwrap();
        let mut renewed = job_application();
        renewed.nonce = "90210".to_string();
        acme.agent
            .send_proof_request("Alice", renewed.clone())
            .await
            .unwrap();

        let stored = acme.agent.link("Alice").unwrap();
        assert_eq!(stored.proof_requests.len(), 1);
        assert_eq!(stored.proof_requests[0].nonce, "90210");

        alice.agent.send_proof("Acme Corp", &renewed).await.unwrap();
        let proof = alice.transport.sent_of_type("PROOF").remove(0);
        acme.agent.handle(forward(&proof, "alice:1")).await.unwrap();
        assert!(acme.agent.link("Alice").unwrap().verified_claim_proofs["Job-Application"].verified);
    }

    #[tokio::test]
    async fn proof_for_a_swapped_request_fails_against_the_stored_copy() {
        let w = world();
        let acme = acme(&w);
        let alice = alice_with_transcript(&w).await;
        acme.agent
            .send_proof_request("Alice", job_application())
            .await
            .unwrap();

        // Same name, different nonce: the prover answers a request the
        // verifier never sent.
        let mut forged = job_application();
        forged.nonce = "42".to_string();
        alice.agent.send_proof("Acme Corp", &forged).await.unwrap();
        let proof = alice.transport.sent_of_type("PROOF").remove(0);
        acme.agent.handle(forward(&proof, "alice:1")).await.unwrap();

        assert!(!acme.agent.link("Alice").unwrap().verified_claim_proofs["Job-Application"].verified);
        let status = acme.transport.sent_of_type("PROOF_STATUS").remove(0);
        assert_eq!(
            status.body["data"],
            "Your Proof Job-Application 0.2 was received but was not verified"
        );
    }

    #[tokio::test]
    async fn proof_without_redundant_revealed_attrs_is_accepted() {
        let w = world();
        let acme = acme(&w);
        let alice = alice_with_transcript(&w).await;
        let req = job_application();
        acme.agent.send_proof_request("Alice", req.clone()).await.unwrap();
        alice.agent.send_proof("Acme Corp", &req).await.unwrap();
        let mut proof = alice.transport.sent_of_type("PROOF").remove(0);
        if let Value::Object(map) = &mut proof.body {
            map.remove("revealedAttrs");
        }
        acme.agent.handle(forward(&proof, "alice:1")).await.unwrap();
        assert!(acme.agent.link("Alice").unwrap().verified_claim_proofs["Job-Application"].verified);
    }
}
