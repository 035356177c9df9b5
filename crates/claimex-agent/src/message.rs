//! # Message Catalogue
//!
//! Every message an agent sends or accepts, as a closed enum tagged by the
//! `type` field, plus the routing table from tag to role.
//!
//! ## Envelope
//!
//! Handlers build message bodies; the send path adds the envelope fields
//! `reqId` (always), `refRequestId` (on replies), `identifier` and
//! `signature`. On the way in, [`Envelope`] reads those fields back out of
//! the raw JSON and [`AgentMessage::parse`] reads the body.
//!
//! Field names are protocol-significant and must not change.

use std::collections::BTreeMap;

use claimex_core::{AttributeInfo, AvailableClaim, Identifier, Nonce, ProofRequest, RequestId, SeqNo};
use claimex_engine::{ClaimRequest, ClaimSignature, FullProof};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::AgentError;

// ---------------------------------------------------------------------------
// Field names
// ---------------------------------------------------------------------------

/// Message type tag.
pub const TYPE: &str = "type";
/// Invitation nonce.
pub const NONCE: &str = "nonce";
/// Message payload.
pub const DATA: &str = "data";
/// Signer identifier.
pub const IDENTIFIER: &str = "identifier";
/// Signature over the canonical message.
pub const SIGNATURE: &str = "signature";
/// Outbound correlation id.
pub const REQ_ID: &str = "reqId";
/// Correlation id of the request being answered.
pub const REF_REQUEST_ID: &str = "refRequestId";
/// Event name carried by `EVENT`.
pub const EVENT_NAME: &str = "eventName";
/// Event name of a free-text notification.
pub const EVENT_NOTIFY_MSG: &str = "NOTIFY";

// ---------------------------------------------------------------------------
// Routing table
// ---------------------------------------------------------------------------

/// Role that handles an inbound message type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Issues claims.
    Issuer,
    /// Holds claims and presents proofs.
    Prover,
    /// Requests and verifies proofs.
    Verifier,
}

impl Role {
    /// Lowercase role name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Issuer => "issuer",
            Self::Prover => "prover",
            Self::Verifier => "verifier",
        }
    }
}

/// Message type tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    /// `REQ_AVAIL_CLAIMS`.
    ReqAvailClaims,
    /// `AVAIL_CLAIM_LIST`.
    AvailClaimList,
    /// `CLAIM_REQUEST`.
    ClaimRequest,
    /// `CLAIM`.
    Claim,
    /// `PROOF_REQUEST`.
    ProofRequest,
    /// `PROOF`.
    Proof,
    /// `EVENT`.
    Event,
    /// `PROOF_STATUS`.
    ProofStatus,
}

/// Tag → type → handling role.
pub const ROUTES: [(&str, MessageType, Role); 8] = [
    ("REQ_AVAIL_CLAIMS", MessageType::ReqAvailClaims, Role::Issuer),
    ("CLAIM_REQUEST", MessageType::ClaimRequest, Role::Issuer),
    ("AVAIL_CLAIM_LIST", MessageType::AvailClaimList, Role::Prover),
    ("CLAIM", MessageType::Claim, Role::Prover),
    ("PROOF_REQUEST", MessageType::ProofRequest, Role::Prover),
    ("PROOF_STATUS", MessageType::ProofStatus, Role::Prover),
    ("EVENT", MessageType::Event, Role::Prover),
    ("PROOF", MessageType::Proof, Role::Verifier),
];

impl MessageType {
    /// Look up a wire tag.
    pub fn from_tag(tag: &str) -> Option<Self> {
        ROUTES.iter().find(|(t, _, _)| *t == tag).map(|(_, ty, _)| *ty)
    }

    /// The wire tag.
    pub fn tag(&self) -> &'static str {
        self.route().0
    }

    /// The role that handles inbound messages of this type.
    pub fn role(&self) -> Role {
        self.route().2
    }

    fn route(&self) -> (&'static str, MessageType, Role) {
        match ROUTES.iter().find(|(_, ty, _)| ty == self) {
            Some(route) => *route,
            None => unreachable!("every message type has a route"),
        }
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

// ---------------------------------------------------------------------------
// Bodies
// ---------------------------------------------------------------------------

/// `AVAIL_CLAIM_LIST` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailClaimListData {
    /// Claims offered on the link.
    #[serde(rename = "availableClaimsList")]
    pub available_claims_list: Vec<AvailableClaim>,
}

/// `CLAIM_REQUEST` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimRequestData {
    /// Schema being requested.
    pub schema_seq_no: SeqNo,
    /// Issuer of the schema.
    pub issuer_did: Identifier,
    /// Claim definition the request is blinded against.
    pub claim_def_seq_no: SeqNo,
    /// Blinded claim request.
    pub blinded_ms: ClaimRequest,
}

/// `CLAIM` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimData {
    /// Issuer signature.
    pub claims_signature: ClaimSignature,
    /// Issuer identifier.
    pub identifier: Identifier,
    /// Attribute map serialized as a JSON string: `{name: [raw, encoded]}`.
    pub claim: String,
    /// Claim definition sequence number.
    pub claim_def_seq_no: SeqNo,
    /// Revocation registry sequence number; `0` when none.
    #[serde(alias = "revoc_ref_seq_no", default)]
    pub revoc_reg_seq_no: SeqNo,
    /// Schema sequence number.
    pub schema_seq_no: SeqNo,
}

/// `EVENT` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventData {
    /// Notification text.
    pub msg: String,
}

/// A protocol message body, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AgentMessage {
    /// Prover asks which claims are offered on the link.
    #[serde(rename = "REQ_AVAIL_CLAIMS")]
    ReqAvailClaims {
        /// Invitation nonce identifying the link.
        nonce: Nonce,
    },

    /// Issuer lists offered claims.
    #[serde(rename = "AVAIL_CLAIM_LIST")]
    AvailClaimList {
        /// Offered claims.
        data: AvailClaimListData,
    },

    /// Prover requests a claim.
    #[serde(rename = "CLAIM_REQUEST")]
    ClaimRequest {
        /// Invitation nonce identifying the link.
        nonce: Nonce,
        /// Request details.
        data: ClaimRequestData,
    },

    /// Issuer delivers a claim.
    #[serde(rename = "CLAIM")]
    Claim {
        /// Claim and signature.
        data: ClaimData,
    },

    /// Verifier asks for a proof.
    #[serde(rename = "PROOF_REQUEST")]
    ProofRequest {
        /// Invitation nonce identifying the link.
        nonce: Nonce,
        /// The request.
        #[serde(rename = "proofRequest")]
        proof_request: ProofRequest,
    },

    /// Prover presents a proof.
    #[serde(rename = "PROOF")]
    Proof {
        /// Invitation nonce identifying the link.
        nonce: Nonce,
        /// The proof.
        proof: FullProof,
        /// Copy of the request answered.
        #[serde(rename = "proofRequest")]
        proof_request: ProofRequest,
        /// Redundant JSON-string copy of the requested revealed attributes.
        #[serde(rename = "revealedAttrs", default, skip_serializing_if = "Option::is_none")]
        revealed_attrs: Option<String>,
    },

    /// Free-text notification.
    #[serde(rename = "EVENT")]
    Event {
        /// Event name ([`EVENT_NOTIFY_MSG`]).
        #[serde(rename = "eventName")]
        event_name: String,
        /// Event payload.
        data: EventData,
    },

    /// Verifier's verdict on a proof.
    #[serde(rename = "PROOF_STATUS")]
    ProofStatus {
        /// Verdict payload, forwarded verbatim.
        data: Value,
    },
}

impl AgentMessage {
    /// A `NOTIFY` event.
    pub fn notify(msg: impl Into<String>) -> Self {
        Self::Event {
            event_name: EVENT_NOTIFY_MSG.to_string(),
            data: EventData { msg: msg.into() },
        }
    }

    /// The redundant `revealedAttrs` string for a proof request.
    pub fn revealed_attrs_field(request: &ProofRequest) -> Result<String, AgentError> {
        let attrs: &BTreeMap<String, AttributeInfo> = &request.verifiable_attributes;
        Ok(serde_json::to_string(attrs)?)
    }

    /// The message's type.
    pub fn message_type(&self) -> MessageType {
        match self {
            Self::ReqAvailClaims { .. } => MessageType::ReqAvailClaims,
            Self::AvailClaimList { .. } => MessageType::AvailClaimList,
            Self::ClaimRequest { .. } => MessageType::ClaimRequest,
            Self::Claim { .. } => MessageType::Claim,
            Self::ProofRequest { .. } => MessageType::ProofRequest,
            Self::Proof { .. } => MessageType::Proof,
            Self::Event { .. } => MessageType::Event,
            Self::ProofStatus { .. } => MessageType::ProofStatus,
        }
    }

    /// Parse an inbound body: resolve the tag through [`ROUTES`], then
    /// deserialize the variant.
    ///
    /// # Errors
    ///
    /// [`AgentError::UnknownMessageType`] for a missing or unrouted tag,
    /// [`AgentError::MalformedMessage`] for a known tag with a bad body.
    pub fn parse(body: &Value) -> Result<(MessageType, Self), AgentError> {
        let tag = body
            .get(TYPE)
            .and_then(Value::as_str)
            .ok_or_else(|| AgentError::UnknownMessageType("<missing>".to_string()))?;
        let msg_type = MessageType::from_tag(tag)
            .ok_or_else(|| AgentError::UnknownMessageType(tag.to_string()))?;
        let msg: Self =
            serde_json::from_value(body.clone()).map_err(|e| AgentError::malformed(tag, e))?;
        Ok((msg_type, msg))
    }

    /// Serialize into a JSON object ready for the envelope fields.
    pub fn to_map(&self) -> Result<Map<String, Value>, AgentError> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            other => Err(AgentError::malformed(
                self.message_type().tag(),
                format!("serialized to non-object {other}"),
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// Envelope fields read from an inbound message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Envelope {
    /// Sender's correlation id for this message.
    #[serde(rename = "reqId", default)]
    pub req_id: Option<RequestId>,
    /// Correlation id of the request this message answers.
    #[serde(rename = "refRequestId", default)]
    pub ref_request_id: Option<RequestId>,
    /// Signer identifier.
    #[serde(default)]
    pub identifier: Option<Identifier>,
}

impl Envelope {
    /// Read the envelope from a raw body. Unparseable fields read as absent.
    pub fn of(body: &Value) -> Self {
        let field = |name: &str| body.get(name).cloned().unwrap_or(Value::Null);
        Self {
            req_id: serde_json::from_value(field(REQ_ID)).ok(),
            ref_request_id: serde_json::from_value(field(REF_REQUEST_ID)).ok(),
            identifier: serde_json::from_value(field(IDENTIFIER)).ok(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn routing_table_covers_every_type() {
        for (tag, ty, role) in ROUTES {
            assert_eq!(MessageType::from_tag(tag), Some(ty));
            assert_eq!(ty.tag(), tag);
            assert_eq!(ty.role(), role);
        }
        assert_eq!(MessageType::from_tag("PING"), None);
    }

    #[test]
    fn unknown_tag_is_a_distinct_error() {
        let err = AgentMessage::parse(&json!({"type": "PING"})).unwrap_err();
        assert!(matches!(err, AgentError::UnknownMessageType(t) if t == "PING"));
        let err = AgentMessage::parse(&json!({"nonce": "abc"})).unwrap_err();
        assert!(matches!(err, AgentError::UnknownMessageType(_)));
    }

    #[test]
    fn known_tag_with_bad_body_is_malformed() {
        let err = AgentMessage::parse(&json!({"type": "CLAIM_REQUEST", "nonce": "abc"})).unwrap_err();
        assert!(matches!(err, AgentError::MalformedMessage { msg_type, .. } if msg_type == "CLAIM_REQUEST"));
    }

    #[test]
    fn req_avail_claims_wire_shape() {
        let msg = AgentMessage::ReqAvailClaims {
            nonce: Nonce::new("b1134a647eb818069c089e7694f63e6d").unwrap(),
        };
        let map = msg.to_map().unwrap();
        assert_eq!(map[TYPE], "REQ_AVAIL_CLAIMS");
        assert_eq!(map[NONCE], "b1134a647eb818069c089e7694f63e6d");
    }

    #[test]
    fn claim_message_accepts_legacy_field_and_envelope() {
        let body = json!({
            "type": "CLAIM",
            "refRequestId": 1498207862797639u64,
            "reqId": 1498207879197729u64,
            "identifier": "FuN98eH2eZybECWkofW6A9BKJxxnTatBCopfUiNxo6ZB",
            "signature": "3v4CJnCpFv3on9DJKzourd9RfvX3gz5yXY1jkhxc8FktHVbvx1ghBJC7DUYMAJzApPUAYMyTzyMB6Dm8HEzhAtvM",
            "data": {
                "revoc_ref_seq_no": 0,
                "claim": "{\"ssn\": [\"123-45-6789\", \"744326867119662813058574151710572260086480987778735990385444735594385781152\"]}",
                "schema_seq_no": 13,
                "claim_def_seq_no": 14,
                "identifier": "FuN98eH2eZybECWkofW6A9BKJxxnTatBCopfUiNxo6ZB",
                "claims_signature": {
                    "nonRevocClaim": null,
                    "primaryClaim": {"m2": "1", "e": "2", "v": "3", "a": "4"}
                }
            }
        });
        let (ty, msg) = AgentMessage::parse(&body).unwrap();
        assert_eq!(ty, MessageType::Claim);
        match msg {
            AgentMessage::Claim { data } => {
                assert_eq!(data.schema_seq_no, 13);
                assert_eq!(data.claim_def_seq_no, 14);
                assert_eq!(data.revoc_reg_seq_no, 0);
            }
            other => panic!("expected CLAIM, got {other:?}"),
        }
        let env = Envelope::of(&body);
        assert_eq!(env.ref_request_id, Some(RequestId::new(1498207862797639)));
        assert_eq!(env.req_id, Some(RequestId::new(1498207879197729)));
        assert_eq!(
            env.identifier.unwrap().as_str(),
            "FuN98eH2eZybECWkofW6A9BKJxxnTatBCopfUiNxo6ZB"
        );
    }

    #[test]
    fn claim_message_serializes_current_field_name() {
        let data = ClaimData {
            claims_signature: serde_json::from_value(json!({
                "nonRevocClaim": null,
                "primaryClaim": {"m2": "1", "e": "2", "v": "3", "a": "4"}
            }))
            .unwrap(),
            identifier: Identifier::new("faber").unwrap(),
            claim: "{}".to_string(),
            claim_def_seq_no: 14,
            revoc_reg_seq_no: 0,
            schema_seq_no: 13,
        };
        let map = AgentMessage::Claim { data }.to_map().unwrap();
        assert!(map[DATA].get("revoc_reg_seq_no").is_some());
        assert!(map[DATA].get("revoc_ref_seq_no").is_none());
    }

    #[test]
    fn notify_event_wire_shape() {
        let map = AgentMessage::notify("This claim is not yet available.").to_map().unwrap();
        assert_eq!(map[TYPE], "EVENT");
        assert_eq!(map[EVENT_NAME], EVENT_NOTIFY_MSG);
        assert_eq!(map[DATA]["msg"], "This claim is not yet available.");
    }

    #[test]
    fn proof_without_revealed_attrs_parses() {
        let body = json!({
            "type": "PROOF",
            "nonce": "b1134a",
            "proof": {
                "proofs": {},
                "aggregated_proof": {"c_hash": "00"},
                "requested_proof": {}
            },
            "proofRequest": {"name": "Job-Application", "version": "0.2", "nonce": "1"}
        });
        let (_, msg) = AgentMessage::parse(&body).unwrap();
        assert!(matches!(msg, AgentMessage::Proof { revealed_attrs: None, .. }));
    }

    #[test]
    fn envelope_tolerates_missing_fields() {
        let env = Envelope::of(&json!({"type": "EVENT"}));
        assert_eq!(env, Envelope::default());
    }
}
