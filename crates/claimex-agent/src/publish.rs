//! # Trust-Anchor Publishing
//!
//! Queue a ledger write, then flush every queued write to the ledger in
//! one batch.

use claimex_core::SeqNo;
use claimex_engine::{AttribRecord, LedgerWrite, NymRecord};
use parking_lot::Mutex;

use crate::agent::Agent;
use crate::error::AgentError;

/// Ledger writes waiting to be submitted.
#[derive(Debug, Default)]
pub struct PendingWrites {
    queue: Mutex<Vec<LedgerWrite>>,
}

impl PendingWrites {
    /// Queue an identity record.
    pub fn add_trust_anchored_identity(&self, nym: NymRecord) {
        self.queue.lock().push(LedgerWrite::Nym(nym));
    }

    /// Queue an attribute record.
    pub fn add_attribute(&self, attrib: AttribRecord) {
        self.queue.lock().push(LedgerWrite::Attrib(attrib));
    }

    /// Take every queued write, oldest first.
    pub fn prepare_pending(&self) -> Vec<LedgerWrite> {
        std::mem::take(&mut *self.queue.lock())
    }

    /// Number of queued writes.
    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    /// Whether nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Agent {
    /// Publish an identity record, flushing any other queued writes.
    /// Returns the sequence numbers of every write submitted.
    pub fn publish_trust_anchor(&self, nym: NymRecord) -> Result<Vec<SeqNo>, AgentError> {
        self.pending_writes.add_trust_anchored_identity(nym);
        self.flush_pending_writes()
    }

    /// Publish an attribute record, flushing any other queued writes.
    pub fn publish_trust_anchor_attribute(
        &self,
        attrib: AttribRecord,
    ) -> Result<Vec<SeqNo>, AgentError> {
        self.pending_writes.add_attribute(attrib);
        self.flush_pending_writes()
    }

    fn flush_pending_writes(&self) -> Result<Vec<SeqNo>, AgentError> {
        let ledger = self.ledger.as_ref().ok_or(AgentError::NoLedger)?;
        let writes = self.pending_writes.prepare_pending();
        let count = writes.len();
        let seq_nos = ledger.submit(writes);
        tracing::info!(agent = %self.name, count, "ledger writes submitted");
        Ok(seq_nos)
    }
}
