// Copyright (c) 2022-2023 Yuki Kishimoto
// Copyright (c) 2023-2025 Rust Nostr Developers
// Distributed under the MIT software license

//! Relay builder

use std::sync::Arc;

use nostr_proto::{EventVerifier, RelayUrl, Secp256k1Verifier};

use super::Relay;
use super::options::RelayOptions;
use crate::shared::SharedState;
use crate::transport::websocket::DefaultWebsocketTransport;
use crate::transport::{IntoTransport, Transport};

/// Relay builder
#[derive(Debug, Clone)]
pub struct RelayBuilder {
    /// Relay URL
    pub url: RelayUrl,
    /// Transport
    pub transport: Arc<dyn Transport>,
    /// Event verifier
    pub verifier: Arc<dyn EventVerifier>,
    /// Relay options
    pub opts: RelayOptions,
}

impl RelayBuilder {
    /// New relay builder
    #[inline]
    pub fn new(url: RelayUrl) -> Self {
        Self {
            url,
            transport: Arc::new(DefaultWebsocketTransport::default()),
            verifier: Arc::new(Secp256k1Verifier),
            opts: RelayOptions::default(),
        }
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
    pub fn opts(mut self, opts: RelayOptions) -> Self {
        self.opts = opts;
        self
    }

    /// Build relay
    #[inline]
    pub fn build(self) -> Relay {
        let state: SharedState = SharedState::new(self.transport, self.verifier);
        Relay::new_shared(self.url, state, self.opts)
    }
}
