// Copyright (c) 2022-2023 Yuki Kishimoto
// Copyright (c) 2023-2025 Rust Nostr Developers
// Distributed under the MIT software license

//! Unsigned event

use secp256k1::{Keypair, Message, SECP256K1};

use super::{Event, EventId, Kind, Tags};
use crate::{PublicKey, Timestamp};

/// Event template, not yet signed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedEvent {
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
}

impl UnsignedEvent {
    /// New unsigned event
    pub fn new<S>(pubkey: PublicKey, created_at: Timestamp, kind: Kind, tags: Tags, content: S) -> Self
    where
        S: Into<String>,
    {
        Self {
            pubkey,
            created_at,
            kind,
            tags,
            content: content.into(),
        }
    }

    /// Compute the id this event will have once signed
    #[inline]
    pub fn id(&self) -> EventId {
        EventId::compute(
            &self.pubkey,
            &self.created_at,
            &self.kind,
            &self.tags,
            &self.content,
        )
    }

    /// Sign with a secp256k1 keypair
    ///
    /// The `pubkey` is not checked against the keypair: an event signed with a
    /// foreign key will fail verification.
    pub fn sign_with_keypair(self, keypair: &Keypair) -> Event {
        let id: EventId = self.id();
        let message: Message = Message::from_digest(*id.as_bytes());
        let sig = SECP256K1.sign_schnorr_no_aux_rand(&message, keypair);
        Event {
            id,
            pubkey: self.pubkey,
            created_at: self.created_at,
            kind: self.kind,
            tags: self.tags,
            content: self.content,
            sig,
        }
    }
}
