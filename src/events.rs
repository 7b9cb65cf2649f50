//! Account lifecycle events
//!
//! Services publish through the injected [`EventPublisher`] capability.
//! Delivery is best effort: a full channel drops the event and bumps a
//! counter rather than blocking the request path.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::metrics::EVENTS_DROPPED_TOTAL;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum AccountEvent {
    Registered { identity_id: String, email: String },
    LoggedIn { identity_id: String },
}

impl AccountEvent {
    fn kind(&self) -> &'static str {
        match self {
            AccountEvent::Registered { .. } => "registered",
            AccountEvent::LoggedIn { .. } => "loggedIn",
        }
    }
}

/// Sink for account events
///
/// `publish` must never block and never fail the caller.
pub trait EventPublisher: Send + Sync {
    fn publish(&self, event: AccountEvent);
}

/// Publisher backed by a bounded channel
pub struct ChannelPublisher {
    sender: mpsc::Sender<AccountEvent>,
}

impl ChannelPublisher {
    pub fn new(buffer: usize) -> (Self, mpsc::Receiver<AccountEvent>) {
        let (sender, receiver) = mpsc::channel(buffer);
        (Self { sender }, receiver)
    }
}

impl EventPublisher for ChannelPublisher {
    fn publish(&self, event: AccountEvent) {
        let kind = event.kind();
        if let Err(e) = self.sender.try_send(event) {
            warn!(kind, error = %e, "dropping account event");
            EVENTS_DROPPED_TOTAL.with_label_values(&[kind]).inc();
        }
    }
}

/// Publisher that discards everything. For tests and tools.
pub struct NullPublisher;

impl EventPublisher for NullPublisher {
    fn publish(&self, _event: AccountEvent) {}
}

/// Drain events and act on them until the channel closes.
///
/// Currently the only side effect is the registration greeting; more
/// observers hang off the same loop as they appear.
pub async fn run_observer(mut receiver: mpsc::Receiver<AccountEvent>) {
    while let Some(event) = receiver.recv().await {
        match &event {
            AccountEvent::Registered { identity_id, email } => {
                info!(identity_id, email, "send welcome email");
            }
            AccountEvent::LoggedIn { identity_id } => {
                info!(identity_id, "identity logged in");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn channel_publisher_delivers_in_order() {
        let (publisher, mut receiver) = ChannelPublisher::new(8);

        publisher.publish(AccountEvent::Registered {
            identity_id: "id-1".to_string(),
            email: "a@test.com".to_string(),
        });
        publisher.publish(AccountEvent::LoggedIn {
            identity_id: "id-1".to_string(),
        });

        assert!(matches!(
            receiver.recv().await,
            Some(AccountEvent::Registered { .. })
        ));
        assert!(matches!(
            receiver.recv().await,
            Some(AccountEvent::LoggedIn { .. })
        ));
    }

    #[tokio::test]
    async fn full_channel_drops_instead_of_blocking() {
        let (publisher, receiver) = ChannelPublisher::new(1);

        publisher.publish(AccountEvent::LoggedIn {
            identity_id: "id-1".to_string(),
        });
        // buffer is full now; this must return immediately
        publisher.publish(AccountEvent::LoggedIn {
            identity_id: "id-2".to_string(),
        });

        drop(receiver);
    }

    #[test]
    fn events_serialize_with_kind_tag() {
        let json = serde_json::to_value(AccountEvent::Registered {
            identity_id: "id-1".to_string(),
            email: "a@test.com".to_string(),
        })
        .unwrap();

        assert_eq!(json["kind"], "registered");
        assert_eq!(json["identityId"], "id-1");
        assert_eq!(json["email"], "a@test.com");
    }
}
