// Copyright (c) 2022-2023 Yuki Kishimoto
// Copyright (c) 2023-2025 Rust Nostr Developers
// Distributed under the MIT software license

//! NIP42: Authentication of clients to relays
//!
//! <https://github.com/nostr-protocol/nips/blob/master/42.md>

use crate::{Event, Kind, PublicKey, RelayUrl, Tag, Timestamp, UnsignedEvent};

/// Build the unsigned kind `22242` event answering a relay challenge
///
/// Signing is left to the caller.
pub fn auth_unsigned<S>(
    challenge: S,
    relay_url: &RelayUrl,
    public_key: PublicKey,
    created_at: Timestamp,
) -> UnsignedEvent
where
    S: Into<String>,
{
    UnsignedEvent::new(
        public_key,
        created_at,
        Kind::AUTHENTICATION,
        vec![
            Tag::custom("relay", relay_url.as_str()),
            Tag::custom("challenge", challenge),
        ],
        "",
    )
}

/// Check if the event is a valid answer to `challenge` for `relay_url`
///
/// Doesn't verify the signature.
pub fn is_valid_auth_event(event: &Event, relay_url: &RelayUrl, challenge: &str) -> bool {
    if event.kind != Kind::AUTHENTICATION {
        return false;
    }

    let relay_matches: bool = event
        .iter_tags()
        .filter(|t| t.kind() == "relay")
        .filter_map(|t| t.content())
        .filter_map(|url| RelayUrl::parse(url).ok())
        .any(|url| &url == relay_url);

    let challenge_matches: bool = event
        .iter_tags()
        .any(|t| t.kind() == "challenge" && t.content() == Some(challenge));

    relay_matches && challenge_matches
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::tests::keypair;

    #[test]
    fn test_auth_event() {
        let kp = keypair(9);
        let pk = PublicKey::from(kp.x_only_public_key().0);
        let url = RelayUrl::parse("wss://relay.example.com").unwrap();

        let event = auth_unsigned("challenge-string", &url, pk, Timestamp::from(1))
            .sign_with_keypair(&kp);

        assert!(event.verify().is_ok());
        assert!(is_valid_auth_event(&event, &url, "challenge-string"));
        assert!(!is_valid_auth_event(&event, &url, "other"));

        let other = RelayUrl::parse("wss://other.example.com").unwrap();
        assert!(!is_valid_auth_event(&event, &other, "challenge-string"));
    }
}
