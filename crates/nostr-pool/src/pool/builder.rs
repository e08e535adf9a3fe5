// Copyright (c) 2022-2023 Yuki Kishimoto
// Copyright (c) 2023-2025 Rust Nostr Developers
// Distributed under the MIT software license

//! Relay Pool builder

use std::sync::Arc;

use nostr_proto::{EventVerifier, Secp256k1Verifier};

use super::RelayPool;
use super::options::RelayPoolOptions;
use crate::transport::websocket::DefaultWebsocketTransport;
use crate::transport::{IntoTransport, Transport};

/// Relay Pool builder
#[derive(Debug, Clone)]
pub struct RelayPoolBuilder {
    /// Transport shared by all relays
    pub transport: Arc<dyn Transport>,
    /// Event verifier
    pub verifier: Arc<dyn EventVerifier>,
    /// Options
    pub opts: RelayPoolOptions,
}

impl Default for RelayPoolBuilder {
    fn default() -> Self {
        Self {
            transport: Arc::new(DefaultWebsocketTransport::default()),
            verifier: Arc::new(Secp256k1Verifier),
            opts: RelayPoolOptions::default(),
        }
    }
}

impl RelayPoolBuilder {
    /// New default builder
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a transport
    #[inline]
    pub fn transport<T>(mut self, transport: T) -> Self
    where
        T: IntoTransport,
    {
        self.transport = transport.into_transport();
        self
    }

    /// Set an event verifier
    #[inline]
    pub fn verifier<T>(mut self, verifier: T) -> Self
    where
        T: EventVerifier + 'static,
    {
        self.verifier = Arc::new(verifier);
        self
    }

    /// Set options
    #[inline]
    pub fn opts(mut self, opts: RelayPoolOptions) -> Self {
        self.opts = opts;
        self
    }

    /// Build relay pool
    #[inline]
    pub fn build(self) -> RelayPool {
        RelayPool::from_builder(self)
    }
}
