// Copyright (c) 2022-2023 Yuki Kishimoto
// Copyright (c) 2023-2025 Rust Nostr Developers
// Distributed under the MIT software license

//! Transport
//!
//! A persistent, ordered, message-framed duplex channel to a relay.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::{Sink, Stream};
use nostr_proto::RelayUrl;

pub mod error;
#[cfg(test)]
pub(crate) mod mock;
pub mod websocket;

use self::error::TransportError;

/// Boxed future
pub type BoxedFuture<'a, T> = BoxFuture<'a, T>;

/// Transport sink
pub type BoxSink = Box<dyn Sink<WireMessage, Error = TransportError> + Send + Unpin>;
/// Transport stream
pub type BoxStream = Box<dyn Stream<Item = Result<WireMessage, TransportError>> + Send + Unpin>;

/// Transport frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireMessage {
    /// Text frame (JSON envelopes)
    Text(String),
    /// Binary frame
    Binary(Vec<u8>),
    /// Close frame, with optional reason
    Close(Option<String>),
}

impl WireMessage {
    /// Frame size in bytes
    #[inline]
    pub fn len(&self) -> usize {
        match self {
            Self::Text(text) => text.len(),
            Self::Binary(bytes) => bytes.len(),
            Self::Close(reason) => reason.as_ref().map_or(0, |r| r.len()),
        }
    }

    /// Check if the frame is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[doc(hidden)]
pub trait IntoTransport {
    fn into_transport(self) -> Arc<dyn Transport>;
}

impl IntoTransport for Arc<dyn Transport> {
    fn into_transport(self) -> Arc<dyn Transport> {
        self
    }
}

impl<T> IntoTransport for T
where
    T: Transport + Sized + 'static,
{
    fn into_transport(self) -> Arc<dyn Transport> {
        Arc::new(self)
    }
}

impl<T> IntoTransport for Arc<T>
where
    T: Transport + 'static,
{
    fn into_transport(self) -> Arc<dyn Transport> {
        self
    }
}

/// Transport
///
/// Closing the sink closes the connection. The stream ending, or yielding
/// [`WireMessage::Close`], means the connection is gone.
pub trait Transport: fmt::Debug + Send + Sync {
    /// Open a connection to the relay
    fn connect<'a>(
        &'a self,
        url: &'a RelayUrl,
        timeout: Duration,
    ) -> BoxedFuture<'a, Result<(BoxSink, BoxStream), TransportError>>;
}
