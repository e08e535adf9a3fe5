// Copyright (c) 2022-2023 Yuki Kishimoto
// Copyright (c) 2023-2025 Rust Nostr Developers
// Distributed under the MIT software license

//! Relay

use std::cmp;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use atomic_destructor::AtomicDestructor;
use nostr_proto::prelude::*;
use tokio::sync::{broadcast, mpsc};

mod builder;
pub mod constants;
mod error;
mod inner;
mod notification;
pub mod options;
mod outcome;
pub mod stats;
mod status;
mod subscription;

pub use self::builder::RelayBuilder;
pub use self::error::Error;
use self::inner::InnerRelay;
pub use self::notification::RelayNotification;
pub use self::options::{BackoffOptions, RelayOptions};
pub use self::outcome::PublishOutcome;
pub use self::stats::RelayConnectionStats;
pub use self::status::RelayStatus;
pub use self::subscription::{SubscriptionActivity, SubscriptionHandler, SubscriptionState};
use crate::shared::SharedState;

/// Relay
///
/// A single connection to a relay, reconnecting automatically when the transport drops.
/// The connection is closed when the last clone is dropped.
#[derive(Debug, Clone)]
pub struct Relay {
    pub(crate) inner: AtomicDestructor<InnerRelay>,
}

impl PartialEq for Relay {
    fn eq(&self, other: &Self) -> bool {
        self.inner.url == other.inner.url
    }
}

impl Eq for Relay {}

impl PartialOrd for Relay {
    fn partial_cmp(&self, other: &Self) -> Option<cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Relay {
    fn cmp(&self, other: &Self) -> cmp::Ordering {
        self.inner.url.cmp(&other.inner.url)
    }
}

impl Relay {
    /// Create new relay with **default** options
    ///
    /// Use [`Relay::builder`] for customizing the relay.
    #[inline]
    pub fn new(url: RelayUrl) -> Self {
        Self::builder(url).build()
    }

    /// Create new relay with custom options
    #[inline]
    pub fn with_opts(url: RelayUrl, opts: RelayOptions) -> Self {
        Self::builder(url).opts(opts).build()
    }

    /// Construct a new relay builder.
    #[inline]
    pub fn builder(url: RelayUrl) -> RelayBuilder {
        RelayBuilder::new(url)
    }

    #[inline]
    pub(crate) fn new_shared(url: RelayUrl, state: SharedState, opts: RelayOptions) -> Self {
        Self {
            inner: AtomicDestructor::new(InnerRelay::new(url, state, opts)),
        }
    }

    /// Get relay url
    #[inline]
    pub fn url(&self) -> &RelayUrl {
        &self.inner.url
    }

    /// Get status
    #[inline]
    pub fn status(&self) -> RelayStatus {
        self.inner.status()
    }

    /// Check if relay is connected
    #[inline]
    pub fn is_connected(&self) -> bool {
        self.status().is_connected()
    }

    /// Get options
    #[inline]
    pub fn opts(&self) -> &RelayOptions {
        &self.inner.opts
    }

    /// Get connection stats
    #[inline]
    pub fn stats(&self) -> &RelayConnectionStats {
        &self.inner.stats
    }

    /// Get new **relay** notification listener
    ///
    /// <div class="warning">When you call this method, you subscribe to the notifications channel from that precise moment. Anything received by relay/s before that moment is not included in the channel!</div>
    #[inline]
    pub fn notifications(&self) -> broadcast::Receiver<RelayNotification> {
        self.inner.internal_notification_sender.subscribe()
    }

    /// Last `AUTH` challenge received from the relay
    #[inline]
    pub async fn challenge(&self) -> Option<String> {
        self.inner.challenge().await
    }

    /// Connect to the relay
    ///
    /// Concurrent calls share the same connection attempt.
    /// If the relay is already connected, returns immediately.
    /// If it's reconnecting in background, waits for the reconnection, bounded by the connection timeout.
    #[inline]
    pub async fn connect(&self) -> Result<(), Error> {
        self.inner.connect().await
    }

    /// Subscribe to events matching any of the `filters`
    ///
    /// The relay must be connected (or reconnecting).
    /// Events are verified before being passed to the `handler`.
    pub async fn subscribe<H>(&self, filters: Vec<Filter>, handler: H) -> Result<SubscriptionId, Error>
    where
        H: SubscriptionHandler + 'static,
    {
        self.inner.subscribe(filters, Arc::new(handler)).await
    }

    /// Subscribe and receive the subscription activity through a channel
    pub async fn subscribe_with_channel(
        &self,
        filters: Vec<Filter>,
    ) -> Result<(SubscriptionId, mpsc::UnboundedReceiver<SubscriptionActivity>), Error> {
        let (tx, rx) = mpsc::unbounded_channel();
        let id: SubscriptionId = self.subscribe(filters, tx).await?;
        Ok((id, rx))
    }

    /// Close a subscription
    ///
    /// No events are delivered for `id` once this returns. Closing an unknown or already closed
    /// subscription does nothing.
    #[inline]
    pub async fn close_subscription(&self, id: &SubscriptionId) {
        self.inner.close_subscription(id).await
    }

    /// Get the state of a subscription, `None` if closed
    #[inline]
    pub async fn subscription_state(&self, id: &SubscriptionId) -> Option<SubscriptionState> {
        self.inner.subscription_state(id).await
    }

    /// Get open subscriptions
    #[inline]
    pub async fn subscriptions(&self) -> HashMap<SubscriptionId, Vec<Filter>> {
        self.inner.subscriptions().await
    }

    /// Publish an event and wait for the relay acknowledgement
    ///
    /// Never fails: a missing acknowledgement is reported as `{ok: false, message: "timeout"}`,
    /// a connection loss as `{ok: false, message: "connection-closed"}`.
    #[inline]
    pub async fn publish(&self, event: &Event) -> PublishOutcome {
        self.inner.publish(event.clone()).await
    }

    /// Send a signed authentication event and wait for the relay acknowledgement
    ///
    /// <https://github.com/nostr-protocol/nips/blob/master/42.md>
    #[inline]
    pub async fn authenticate(&self, event: &Event) -> PublishOutcome {
        self.inner.authenticate(event.clone()).await
    }

    /// Count events matching the filters
    ///
    /// <https://github.com/nostr-protocol/nips/blob/master/45.md>
    #[inline]
    pub async fn count(&self, filters: Vec<Filter>, timeout: Duration) -> Result<usize, Error> {
        self.inner.count(filters, timeout).await
    }

    /// Close the connection
    ///
    /// Pending publishes and open subscriptions are closed with `connection-closed`.
    #[inline]
    pub async fn close(&self) {
        self.inner.close().await
    }
}
