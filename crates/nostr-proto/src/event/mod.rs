// Copyright (c) 2022-2023 Yuki Kishimoto
// Copyright (c) 2023-2025 Rust Nostr Developers
// Distributed under the MIT software license

//! Event

use std::fmt;

use secp256k1::schnorr::Signature;
use secp256k1::{Message, SECP256K1};
use serde::{Deserialize, Serialize};

pub mod id;
pub mod kind;
pub mod tag;
pub mod unsigned;

pub use self::id::EventId;
pub use self::kind::Kind;
pub use self::tag::{Tag, Tags};
pub use self::unsigned::UnsignedEvent;
use crate::{JsonUtil, PublicKey, Timestamp};

/// [`Event`] error
#[derive(Debug)]
pub enum Error {
    /// The id doesn't match the event data
    InvalidId,
    /// Signature doesn't verify against the id and public key
    InvalidSignature,
    /// Secp256k1 error
    Secp256k1(secp256k1::Error),
    /// JSON error
    Json(serde_json::Error),
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidId => write!(f, "invalid event id"),
            Self::InvalidSignature => write!(f, "invalid signature"),
            Self::Secp256k1(e) => write!(f, "{e}"),
            Self::Json(e) => write!(f, "{e}"),
        }
    }
}

impl From<secp256k1::Error> for Error {
    fn from(e: secp256k1::Error) -> Self {
        Self::Secp256k1(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}

/// Event
///
/// Immutable once constructed.
///
/// <https://github.com/nostr-protocol/nips/blob/master/01.md>
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Id
    pub id: EventId,
    /// Author
    pub pubkey: PublicKey,
    /// Timestamp (seconds)
    pub created_at: Timestamp,
    /// Kind
    pub kind: Kind,
    /// Tag list
    pub tags: Tags,
    /// Content
    pub content: String,
    /// Signature
    pub sig: Signature,
}

impl Event {
    /// Iterate the tags
    #[inline]
    pub fn iter_tags(&self) -> impl Iterator<Item = &Tag> {
        self.tags.iter()
    }

    /// Recompute the id from the event data
    #[inline]
    pub fn compute_id(&self) -> EventId {
        EventId::compute(
            &self.pubkey,
            &self.created_at,
            &self.kind,
            &self.tags,
            &self.content,
        )
    }

    /// Verify that the id matches the event data
    pub fn verify_id(&self) -> Result<(), Error> {
        if self.compute_id() == self.id {
            Ok(())
        } else {
            Err(Error::InvalidId)
        }
    }

    /// Verify the schnorr signature over the id
    pub fn verify_signature(&self) -> Result<(), Error> {
        let message: Message = Message::from_digest(*self.id.as_bytes());
        SECP256K1
            .verify_schnorr(&self.sig, &message, self.pubkey.xonly())
            .map_err(|_| Error::InvalidSignature)
    }

    /// Verify both the id and the signature
    #[inline]
    pub fn verify(&self) -> Result<(), Error> {
        self.verify_id()?;
        self.verify_signature()
    }
}

impl JsonUtil for Event {
    type Err = Error;
}

#[cfg(test)]
pub(crate) mod tests {
    use secp256k1::Keypair;

    use super::*;

    pub(crate) fn keypair(seed: u8) -> Keypair {
        Keypair::from_seckey_slice(SECP256K1, &[seed; 32]).unwrap()
    }

    pub(crate) fn signed(seed: u8, created_at: u64, kind: u16, tags: Tags, content: &str) -> Event {
        UnsignedEvent::new(
            PublicKey::from(keypair(seed).x_only_public_key().0),
            Timestamp::from(created_at),
            Kind::from(kind),
            tags,
            content,
        )
        .sign_with_keypair(&keypair(seed))
    }

    #[test]
    fn test_verify_signed_event() {
        let event = signed(1, 1_700_000_000, 1, Vec::new(), "hello");
        assert!(event.verify().is_ok());
    }

    #[test]
    fn test_tampered_content_fails_id_check() {
        let mut event = signed(1, 1_700_000_000, 1, Vec::new(), "hello");
        event.content = String::from("bye");
        assert!(matches!(event.verify(), Err(Error::InvalidId)));
    }

    #[test]
    fn test_foreign_signature_fails() {
        let event = signed(1, 1_700_000_000, 1, Vec::new(), "hello");
        let other = signed(2, 1_700_000_000, 1, Vec::new(), "hello");
        let forged = Event {
            sig: other.sig,
            ..event
        };
        assert!(matches!(forged.verify(), Err(Error::InvalidSignature)));
    }

    #[test]
    fn test_json_roundtrip_preserves_id() {
        let event = signed(3, 1_700_000_000, 1, vec![Tag::custom("t", "nostr")], "tagged");
        let parsed = Event::from_json(event.as_json()).unwrap();
        assert_eq!(parsed, event);
        assert!(parsed.verify().is_ok());
    }
}
