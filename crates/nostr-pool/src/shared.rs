// Copyright (c) 2022-2023 Yuki Kishimoto
// Copyright (c) 2023-2025 Rust Nostr Developers
// Distributed under the MIT software license

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use nostr_proto::{Event, EventId, EventVerifier, Secp256k1Verifier};
use tokio::sync::Mutex;

use crate::transport::Transport;
use crate::transport::websocket::DefaultWebsocketTransport;

// LruCache pre-allocate, so keep this at a reasonable value.
// A good value may be <= 128k, considering that stored values are the 64-bit hashes of the event IDs.
const MAX_VERIFICATION_CACHE_SIZE: NonZeroUsize = match NonZeroUsize::new(128_000) {
    Some(size) => size,
    None => panic!("MAX_VERIFICATION_CACHE_SIZE must be greater than 0"),
};

/// State shared by all the relays of a pool
#[derive(Debug, Clone)]
pub(crate) struct SharedState {
    pub(crate) transport: Arc<dyn Transport>,
    verifier: Arc<dyn EventVerifier>,
    verification_cache: Arc<Mutex<LruCache<u64, ()>>>,
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new(
            Arc::new(DefaultWebsocketTransport::default()),
            Arc::new(Secp256k1Verifier),
        )
    }
}

impl SharedState {
    pub(crate) fn new(transport: Arc<dyn Transport>, verifier: Arc<dyn EventVerifier>) -> Self {
        Self {
            transport,
            verifier,
            verification_cache: Arc::new(Mutex::new(LruCache::new(MAX_VERIFICATION_CACHE_SIZE))),
        }
    }

    /// Verify the event, skipping the signature check if the same event was already verified
    ///
    /// Failed verifications are never cached.
    pub(crate) async fn verify(&self, event: &Event) -> bool {
        // Hash event ID
        let hash: u64 = hash(&event.id);

        // A cached id vouches only for the body that hashes to it
        if self.is_verified(hash).await && event.verify_id().is_ok() {
            return true;
        }

        if !self.verifier.verify(event) {
            return false;
        }

        let mut cache = self.verification_cache.lock().await;
        cache.put(hash, ());
        true
    }

    async fn is_verified(&self, hash: u64) -> bool {
        let mut cache = self.verification_cache.lock().await;
        cache.get(&hash).is_some()
    }

    #[cfg(test)]
    pub(crate) async fn is_cached(&self, id: &EventId) -> bool {
        self.is_verified(hash(id)).await
    }
}

fn hash<T>(val: &T) -> u64
where
    T: Hash,
{
    let mut hasher: DefaultHasher = DefaultHasher::new();
    val.hash(&mut hasher);
    hasher.finish()
}
