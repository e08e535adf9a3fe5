// Copyright (c) 2022-2023 Yuki Kishimoto
// Copyright (c) 2023-2025 Rust Nostr Developers
// Distributed under the MIT software license

//! Event verification

use std::fmt::Debug;
use std::sync::Arc;

use crate::Event;

/// Event verifier
///
/// Pure and synchronous: called on every inbound event before delivery.
pub trait EventVerifier: Debug + Send + Sync {
    /// Check id and signature of the event
    fn verify(&self, event: &Event) -> bool;
}

impl<T> EventVerifier for Arc<T>
where
    T: EventVerifier + ?Sized,
{
    #[inline]
    fn verify(&self, event: &Event) -> bool {
        self.as_ref().verify(event)
    }
}

/// Default verifier: recomputes the id and checks the schnorr signature
#[derive(Debug, Clone, Copy, Default)]
pub struct Secp256k1Verifier;

impl EventVerifier for Secp256k1Verifier {
    #[inline]
    fn verify(&self, event: &Event) -> bool {
        event.verify().is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::tests::signed;

    #[test]
    fn test_default_verifier() {
        let verifier = Secp256k1Verifier;

        let event = signed(1, 1_700_000_000, 1, Vec::new(), "ok");
        assert!(verifier.verify(&event));

        let mut tampered = event.clone();
        tampered.kind = crate::Kind::METADATA;
        assert!(!verifier.verify(&tampered));
    }
}
