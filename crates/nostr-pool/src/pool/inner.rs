// Copyright (c) 2022-2023 Yuki Kishimoto
// Copyright (c) 2023-2025 Rust Nostr Developers
// Distributed under the MIT software license

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_utility::{task, time};
use atomic_destructor::AtomicDestroyer;
use futures::future;
use nostr_proto::prelude::*;
use tokio::sync::RwLock;

use super::options::RelayPoolOptions;
use super::Error;
use crate::relay::Relay;
use crate::shared::SharedState;

/// A relay of the pool and the number of callers using it
#[derive(Debug)]
struct PoolEntry {
    relay: Relay,
    ref_count: usize,
    /// Bumped on every acquire and release: a pending idle close only runs if unchanged
    generation: u64,
}

#[derive(Debug)]
struct AtomicPrivateData {
    relays: RwLock<HashMap<RelayUrl, PoolEntry>>,
    subscription_counter: AtomicU64,
    shutdown: AtomicBool,
}

#[derive(Debug, Clone)]
pub(super) struct InnerRelayPool {
    pub(super) state: SharedState,
    atomic: Arc<AtomicPrivateData>,
    pub(super) opts: RelayPoolOptions,
}

impl AtomicDestroyer for InnerRelayPool {
    fn on_destroy(&self) {
        let pool = self.clone();
        task::spawn(async move {
            pool.close().await;
        });
    }
}

impl InnerRelayPool {
    pub(super) fn new(state: SharedState, opts: RelayPoolOptions) -> Self {
        Self {
            state,
            atomic: Arc::new(AtomicPrivateData {
                relays: RwLock::new(HashMap::new()),
                subscription_counter: AtomicU64::new(0),
                shutdown: AtomicBool::new(false),
            }),
            opts,
        }
    }

    #[inline]
    pub(super) fn is_shutdown(&self) -> bool {
        self.atomic.shutdown.load(Ordering::SeqCst)
    }

    pub(super) fn next_subscription_id(&self) -> SubscriptionId {
        let n: u64 = self.atomic.subscription_counter.fetch_add(1, Ordering::SeqCst) + 1;
        SubscriptionId::new(format!("pool:{n}"))
    }

    pub(super) async fn relays(&self) -> HashMap<RelayUrl, Relay> {
        let relays = self.atomic.relays.read().await;
        relays
            .iter()
            .map(|(url, entry)| (url.clone(), entry.relay.clone()))
            .collect()
    }

    pub(super) async fn ref_count(&self, url: &RelayUrl) -> Option<usize> {
        let relays = self.atomic.relays.read().await;
        relays.get(url).map(|entry| entry.ref_count)
    }

    /// Acquire a connected relay, creating it if needed
    ///
    /// Concurrent callers for the same url share the relay and its connection attempt.
    /// On failure the reference is released before returning.
    pub(super) async fn ensure_connection(&self, url: &RelayUrl) -> Result<Relay, Error> {
        if self.is_shutdown() {
            return Err(Error::Shutdown);
        }

        let relay: Relay = {
            let mut relays = self.atomic.relays.write().await;

            // Checked again under the lock, `close` drains the map holding it
            if self.is_shutdown() {
                return Err(Error::Shutdown);
            }

            let entry = relays.entry(url.clone()).or_insert_with(|| {
                tracing::debug!(url = %url, "Adding relay to pool.");
                PoolEntry {
                    relay: Relay::new_shared(url.clone(), self.state.clone(), self.opts.relay.clone()),
                    ref_count: 0,
                    generation: 0,
                }
            });
            entry.ref_count += 1;
            entry.generation += 1;
            entry.relay.clone()
        };

        match relay.connect().await {
            Ok(()) => Ok(relay),
            Err(e) => {
                self.release_connection(url).await;
                Err(Error::Relay(e))
            }
        }
    }

    /// Release a reference acquired with [`InnerRelayPool::ensure_connection`]
    ///
    /// The relay is closed after the idle grace period, unless acquired again in the meantime.
    pub(super) async fn release_connection(&self, url: &RelayUrl) {
        let generation: u64 = {
            let mut relays = self.atomic.relays.write().await;

            let entry: &mut PoolEntry = match relays.get_mut(url) {
                Some(entry) => entry,
                None => return,
            };

            entry.ref_count = entry.ref_count.saturating_sub(1);

            if entry.ref_count > 0 {
                return;
            }

            entry.generation += 1;
            entry.generation
        };

        tracing::debug!(
            url = %url,
            grace = ?self.opts.idle_grace_period,
            "Relay no longer referenced."
        );

        let pool = self.clone();
        let url = url.clone();
        task::spawn(async move {
            time::sleep(pool.opts.idle_grace_period).await;
            pool.close_if_idle(&url, generation).await;
        });
    }

    async fn close_if_idle(&self, url: &RelayUrl, generation: u64) {
        let relay: Relay = {
            let mut relays = self.atomic.relays.write().await;

            match relays.get(url) {
                Some(entry) if entry.ref_count == 0 && entry.generation == generation => {}
                _ => return,
            }

            match relays.remove(url) {
                Some(entry) => entry.relay,
                None => return,
            }
        };

        tracing::debug!(url = %url, "Closing idle relay.");

        relay.close().await;
    }

    pub(super) async fn close(&self) {
        if self.atomic.shutdown.swap(true, Ordering::SeqCst) {
            return;
        }

        let relays: Vec<Relay> = {
            let mut relays = self.atomic.relays.write().await;
            relays.drain().map(|(_, entry)| entry.relay).collect()
        };

        future::join_all(relays.iter().map(|relay| relay.close())).await;

        tracing::info!("Relay pool shutdown.");
    }
}
