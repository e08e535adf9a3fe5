// Copyright (c) 2022-2023 Yuki Kishimoto
// Copyright (c) 2023-2025 Rust Nostr Developers
// Distributed under the MIT software license

//! Pool subscription

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_utility::task;
use futures::future;
use nostr_proto::prelude::*;
use tokio::sync::oneshot;

use super::inner::InnerRelayPool;
use crate::relay::constants::CLOSED_BY_CLIENT;
use crate::relay::{Relay, SubscriptionHandler};

#[derive(Debug, Default)]
struct MergerState {
    seen: HashSet<EventId>,
    /// Relays that haven't reported EOSE or dropped out yet
    pending_eose: HashSet<RelayUrl>,
    eose_fired: bool,
    /// Relays whose subscription is still open
    open: HashSet<RelayUrl>,
    reasons: Vec<String>,
    closing: bool,
    close_fired: bool,
}

/// Merges the activity of the per-relay subscriptions into one handler
pub(super) struct Merger {
    handler: Arc<dyn SubscriptionHandler>,
    state: Mutex<MergerState>,
}

impl Merger {
    pub(super) fn new(handler: Arc<dyn SubscriptionHandler>, urls: &[RelayUrl]) -> Self {
        Self {
            handler,
            state: Mutex::new(MergerState {
                pending_eose: urls.iter().cloned().collect(),
                open: urls.iter().cloned().collect(),
                ..Default::default()
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, MergerState> {
        // The state is always left consistent, recover from a panicking handler
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn is_closed(&self) -> bool {
        let state = self.state();
        state.closing || state.close_fired
    }

    fn on_event(&self, event: Event) {
        let first: bool = {
            let mut state = self.state();
            !state.closing && !state.close_fired && state.seen.insert(event.id)
        };

        if first {
            self.handler.on_event(event);
        }
    }

    /// Mark the relay as done for the merged EOSE
    ///
    /// Called on EOSE, on EOSE timeout and when the relay drops out.
    pub(super) fn eose_done(&self, url: &RelayUrl) {
        let fire: bool = {
            let mut state = self.state();
            state.pending_eose.remove(url);
            Self::should_fire_eose(&mut state)
        };

        if fire {
            self.handler.on_eose();
        }
    }

    /// Mark every relay still pending as done
    pub(super) fn eose_timeout(&self) {
        let fire: bool = {
            let mut state = self.state();
            for url in state.pending_eose.drain() {
                tracing::debug!(url = %url, "End of stored events timed out.");
            }
            Self::should_fire_eose(&mut state)
        };

        if fire {
            self.handler.on_eose();
        }
    }

    fn should_fire_eose(state: &mut MergerState) -> bool {
        if state.pending_eose.is_empty()
            && !state.eose_fired
            && !state.closing
            && !state.close_fired
        {
            state.eose_fired = true;
            return true;
        }
        false
    }

    /// The subscription of a relay has been closed (or never opened)
    ///
    /// When no relay is left, the pool subscription is closed with the distinct reasons.
    pub(super) fn relay_closed(&self, url: &RelayUrl, reason: &str) {
        let (fire_eose, fire_close) = {
            let mut state = self.state();

            if state.closing || state.close_fired {
                return;
            }

            state.open.remove(url);
            state.pending_eose.remove(url);

            if !state.reasons.iter().any(|r| r == reason) {
                state.reasons.push(reason.to_string());
            }

            let fire_eose: bool = Self::should_fire_eose(&mut state);

            if state.open.is_empty() {
                state.close_fired = true;
                state.seen.clear();
                (fire_eose, Some(state.reasons.join(", ")))
            } else {
                (fire_eose, None)
            }
        };

        if fire_eose {
            self.handler.on_eose();
        }

        if let Some(reason) = fire_close {
            self.handler.on_close(&reason);
        }
    }

    /// Stop deliveries. Returns `false` if already closing.
    fn begin_close(&self) -> bool {
        let mut state = self.state();
        if state.closing {
            return false;
        }
        state.closing = true;
        true
    }

    fn finish_close(&self) {
        let fire: bool = {
            let mut state = self.state();
            state.seen.clear();
            !std::mem::replace(&mut state.close_fired, true)
        };

        if fire {
            self.handler.on_close(CLOSED_BY_CLIENT);
        }
    }
}

/// Subscription of a single relay, forwarding to the [`Merger`]
pub(super) struct RelayLeg {
    pub(super) url: RelayUrl,
    pub(super) merger: Arc<Merger>,
}

impl SubscriptionHandler for RelayLeg {
    fn on_event(&self, event: Event) {
        self.merger.on_event(event);
    }

    fn on_eose(&self) {
        self.merger.eose_done(&self.url);
    }

    fn on_close(&self, reason: &str) {
        self.merger.relay_closed(&self.url, reason);
    }
}

/// Closes the pool subscription once the merged EOSE is reached
pub(super) struct CloseOnEose<H> {
    handler: H,
    signal: Mutex<Option<oneshot::Sender<()>>>,
}

impl<H> CloseOnEose<H> {
    pub(super) fn new(handler: H) -> (Self, oneshot::Receiver<()>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                handler,
                signal: Mutex::new(Some(tx)),
            },
            rx,
        )
    }

    fn signal(&self) {
        let mut signal = self.signal.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(tx) = signal.take() {
            let _ = tx.send(());
        }
    }
}

impl<H> SubscriptionHandler for CloseOnEose<H>
where
    H: SubscriptionHandler,
{
    fn on_event(&self, event: Event) {
        self.handler.on_event(event);
    }

    fn on_eose(&self) {
        self.handler.on_eose();
        self.signal();
    }

    fn on_close(&self, reason: &str) {
        self.handler.on_close(reason);
        self.signal();
    }
}

#[derive(Debug)]
struct Leg {
    relay: Relay,
    id: SubscriptionId,
}

struct InnerPoolSubscription {
    id: SubscriptionId,
    pool: InnerRelayPool,
    merger: Arc<Merger>,
    legs: HashMap<RelayUrl, Leg>,
    released: AtomicBool,
}

impl Drop for InnerPoolSubscription {
    fn drop(&mut self) {
        if self.released.swap(true, Ordering::SeqCst) {
            return;
        }

        tracing::debug!(id = %self.id, "Pool subscription dropped, closing it.");

        let pool = self.pool.clone();
        let merger = self.merger.clone();
        let legs: Vec<(RelayUrl, Leg)> = self.legs.drain().collect();
        task::spawn(async move {
            close_legs(&pool, &merger, legs.iter().map(|(url, leg)| (url, leg))).await;
        });
    }
}

async fn close_legs<'a, I>(pool: &InnerRelayPool, merger: &Merger, legs: I)
where
    I: Iterator<Item = (&'a RelayUrl, &'a Leg)>,
{
    merger.begin_close();

    future::join_all(legs.map(|(url, leg)| async move {
        leg.relay.close_subscription(&leg.id).await;
        pool.release_connection(url).await;
    }))
    .await;

    merger.finish_close();
}

/// Subscription spanning several relays
///
/// Events are deduplicated by id across relays, the end of stored events is reported once
/// every relay reported it (or dropped out). Dropping the last clone closes the subscription.
#[derive(Clone)]
pub struct PoolSubscription {
    inner: Arc<InnerPoolSubscription>,
}

impl std::fmt::Debug for PoolSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolSubscription")
            .field("id", &self.inner.id)
            .field("relays", &self.inner.legs.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl PoolSubscription {
    pub(super) fn new(
        id: SubscriptionId,
        pool: InnerRelayPool,
        merger: Arc<Merger>,
        legs: Vec<(RelayUrl, Relay, SubscriptionId)>,
    ) -> Self {
        Self {
            inner: Arc::new(InnerPoolSubscription {
                id,
                pool,
                merger,
                legs: legs
                    .into_iter()
                    .map(|(url, relay, id)| (url, Leg { relay, id }))
                    .collect(),
                released: AtomicBool::new(false),
            }),
        }
    }

    /// Pool subscription id
    #[inline]
    pub fn id(&self) -> &SubscriptionId {
        &self.inner.id
    }

    /// Relays where the subscription has been opened, with their relay subscription id
    pub fn relays(&self) -> HashMap<RelayUrl, SubscriptionId> {
        self.inner
            .legs
            .iter()
            .map(|(url, leg)| (url.clone(), leg.id.clone()))
            .collect()
    }

    /// Check if the subscription is closed
    #[inline]
    pub fn is_closed(&self) -> bool {
        self.inner.merger.is_closed()
    }

    /// Close the subscription on every relay and release the connections
    ///
    /// No events are delivered once this returns. Idempotent.
    pub async fn close(&self) {
        if self.inner.released.swap(true, Ordering::SeqCst) {
            return;
        }

        tracing::debug!(id = %self.inner.id, "Closing pool subscription.");

        close_legs(&self.inner.pool, &self.inner.merger, self.inner.legs.iter()).await;
    }
}
