// Copyright (c) 2022-2023 Yuki Kishimoto
// Copyright (c) 2023-2025 Rust Nostr Developers
// Distributed under the MIT software license

//! Relay subscription

use std::sync::Arc;

use nostr_proto::Event;
use tokio::sync::mpsc::UnboundedSender;

/// Subscription state
///
/// `Pending -> Active -> EoseReceived`. A closed subscription is removed from the relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubscriptionState {
    /// Registered, `REQ` not sent yet
    Pending,
    /// `REQ` sent
    Active,
    /// End of stored events received
    EoseReceived,
}

impl SubscriptionState {
    /// Check if the end of stored events has been received
    #[inline]
    pub fn is_eose_received(&self) -> bool {
        matches!(self, Self::EoseReceived)
    }
}

/// Subscription activity, for consuming a subscription as a channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionActivity {
    /// Received a verified event
    Event(Box<Event>),
    /// End of stored events
    EndOfStoredEvents,
    /// Subscription closed, with reason
    Closed(String),
}

/// Subscription observer
///
/// Callbacks are invoked from the connection task: keep them short and never block.
/// For each subscription, events are delivered in the order the relay sent them,
/// `on_eose` is called at most once and `on_close` exactly once.
pub trait SubscriptionHandler: Send + Sync {
    /// Verified event matching the subscription
    fn on_event(&self, event: Event);

    /// End of stored events
    fn on_eose(&self) {}

    /// Subscription closed by the relay, by the client or by a connection loss
    fn on_close(&self, _reason: &str) {}
}

impl<T> SubscriptionHandler for Arc<T>
where
    T: SubscriptionHandler + ?Sized,
{
    #[inline]
    fn on_event(&self, event: Event) {
        self.as_ref().on_event(event)
    }

    #[inline]
    fn on_eose(&self) {
        self.as_ref().on_eose()
    }

    #[inline]
    fn on_close(&self, reason: &str) {
        self.as_ref().on_close(reason)
    }
}

impl SubscriptionHandler for UnboundedSender<SubscriptionActivity> {
    fn on_event(&self, event: Event) {
        let _ = self.send(SubscriptionActivity::Event(Box::new(event)));
    }

    fn on_eose(&self) {
        let _ = self.send(SubscriptionActivity::EndOfStoredEvents);
    }

    fn on_close(&self, reason: &str) {
        let _ = self.send(SubscriptionActivity::Closed(reason.to_string()));
    }
}
