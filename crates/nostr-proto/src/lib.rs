// Copyright (c) 2022-2023 Yuki Kishimoto
// Copyright (c) 2023-2025 Rust Nostr Developers
// Distributed under the MIT software license

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(rustdoc::bare_urls)]

//! Nostr protocol types
//!
//! Events, filters, subscription ids, client/relay envelopes, relay URLs and event verification.

pub use bitcoin_hashes as hashes;
pub use secp256k1;
pub use url::{self, Url};

pub mod event;
pub mod filter;
pub mod key;
pub mod message;
pub mod nips;
pub mod prelude;
pub mod types;
pub mod verify;

pub use self::event::{Event, EventId, Kind, Tag, Tags, UnsignedEvent};
pub use self::filter::{Filter, SingleLetterTag};
pub use self::key::PublicKey;
pub use self::message::{ClientMessage, MessageHandleError, RelayMessage, SubscriptionId};
pub use self::types::{RelayUrl, Timestamp, TryIntoUrl};
pub use self::verify::{EventVerifier, Secp256k1Verifier};

/// JSON util
pub trait JsonUtil: Sized + serde::Serialize + serde::de::DeserializeOwned
where
    <Self as JsonUtil>::Err: From<serde_json::Error>,
{
    /// Error
    type Err: core::fmt::Debug;

    /// Deserialize JSON
    #[inline]
    fn from_json<T>(json: T) -> Result<Self, Self::Err>
    where
        T: AsRef<[u8]>,
    {
        Ok(serde_json::from_slice(json.as_ref())?)
    }

    /// Serialize as JSON string
    ///
    /// This method could panic! Use `try_as_json` for error propagation.
    #[inline]
    fn as_json(&self) -> String {
        self.try_as_json().unwrap()
    }

    /// Serialize as JSON string
    #[inline]
    fn try_as_json(&self) -> Result<String, Self::Err> {
        Ok(serde_json::to_string(self)?)
    }
}
