// Copyright (c) 2022-2023 Yuki Kishimoto
// Copyright (c) 2023-2025 Rust Nostr Developers
// Distributed under the MIT software license

//! Publish outcome

use std::fmt;

use super::constants::{CONNECTION_CLOSED, TIMEOUT};
use super::error::Error;

/// Result of publishing an event (or an `AUTH`) to a single relay
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PublishOutcome {
    /// Accepted by the relay
    pub ok: bool,
    /// Relay message, or a local reason when no acknowledgement was received
    pub message: String,
}

impl PublishOutcome {
    #[inline]
    pub(crate) fn new<S>(ok: bool, message: S) -> Self
    where
        S: Into<String>,
    {
        Self {
            ok,
            message: message.into(),
        }
    }

    /// No acknowledgement received in time
    #[inline]
    pub fn timeout() -> Self {
        Self::new(false, TIMEOUT)
    }

    /// Connection lost before the acknowledgement
    #[inline]
    pub fn connection_closed() -> Self {
        Self::new(false, CONNECTION_CLOSED)
    }

    /// Publish failed before reaching the relay
    #[inline]
    pub fn failed<S>(message: S) -> Self
    where
        S: Into<String>,
    {
        Self::new(false, message)
    }

    /// Check if no acknowledgement was received in time
    #[inline]
    pub fn is_timeout(&self) -> bool {
        !self.ok && self.message == TIMEOUT
    }

    /// Convert into a [`Result`]
    pub fn into_result(self) -> Result<String, Error> {
        if self.ok {
            return Ok(self.message);
        }

        match self.message.as_str() {
            TIMEOUT => Err(Error::Timeout),
            CONNECTION_CLOSED => Err(Error::ConnectionClosed),
            _ => Err(Error::Rejected(self.message)),
        }
    }
}

impl fmt::Display for PublishOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ok {
            write!(f, "accepted")?;
        } else {
            write!(f, "rejected")?;
        }

        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }

        Ok(())
    }
}
