// Copyright (c) 2022-2023 Yuki Kishimoto
// Copyright (c) 2023-2025 Rust Nostr Developers
// Distributed under the MIT software license

//! Kind

use std::fmt;

use serde::{Deserialize, Serialize};

/// Event kind
///
/// <https://github.com/nostr-protocol/nips/blob/master/01.md>
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Kind(u16);

impl Kind {
    /// Metadata
    pub const METADATA: Self = Self(0);
    /// Short text note
    pub const TEXT_NOTE: Self = Self(1);
    /// Contact list
    pub const CONTACT_LIST: Self = Self(3);
    /// Client authentication
    ///
    /// <https://github.com/nostr-protocol/nips/blob/master/42.md>
    pub const AUTHENTICATION: Self = Self(22242);

    /// Construct a kind
    #[inline]
    pub const fn from_u16(kind: u16) -> Self {
        Self(kind)
    }

    /// Get as [`u16`]
    #[inline]
    pub const fn as_u16(&self) -> u16 {
        self.0
    }

    /// Check if it's ephemeral (`20000 <= n < 30000`)
    #[inline]
    pub fn is_ephemeral(&self) -> bool {
        (20_000..30_000).contains(&self.0)
    }
}

impl From<u16> for Kind {
    #[inline]
    fn from(kind: u16) -> Self {
        Self(kind)
    }
}

impl From<Kind> for u16 {
    #[inline]
    fn from(kind: Kind) -> Self {
        kind.0
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
