//! Notification sink.
//!
//! Recoverable protocol conditions and user-facing progress are reported
//! here instead of being raised to the caller.

use claimex_core::RequestId;
use parking_lot::Mutex;

use crate::message::MessageType;

/// Receives user-visible notifications.
pub trait Notifier: Send + Sync {
    /// A free-text notification.
    fn notify(&self, msg: &str);

    /// A reply to request `req_id` on `link_name` arrived.
    fn notify_response(&self, link_name: &str, req_id: RequestId, msg_type: MessageType) {
        self.notify(&format!(
            "Response from {link_name} to request {req_id} ({msg_type}) received."
        ));
    }
}

/// Logs notifications at `info`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, msg: &str) {
        tracing::info!(target: "claimex::notify", "{msg}");
    }
}

/// Keeps every notification, for tests and interactive sessions that poll.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    /// An empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// All notifications so far, oldest first.
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().clone()
    }

    /// Whether any notification contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.messages.lock().iter().any(|m| m.contains(needle))
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, msg: &str) {
        tracing::debug!(target: "claimex::notify", "{msg}");
        self.messages.lock().push(msg.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recorder_keeps_order() {
        let n = RecordingNotifier::new();
        n.notify("one");
        n.notify("two");
        assert_eq!(n.messages(), ["one", "two"]);
        assert!(n.contains("tw"));
        assert!(!n.contains("three"));
    }

    #[test]
    fn response_notification_names_link_and_request() {
        let n = RecordingNotifier::new();
        n.notify_response("Faber College", RequestId::new(42), MessageType::Claim);
        assert!(n.contains("Faber College"));
        assert!(n.contains("42"));
        assert!(n.contains("CLAIM"));
    }
}
