// Copyright (c) 2022-2023 Yuki Kishimoto
// Copyright (c) 2023-2025 Rust Nostr Developers
// Distributed under the MIT software license

use std::fmt;

use nostr_proto::message::MessageHandleError;

use crate::transport::error::TransportError;

/// [`Relay`](super::Relay) error
#[derive(Debug)]
pub enum Error {
    /// Transport could not be established
    Connect(String),
    /// Generic timeout
    Timeout,
    /// Malformed or unparseable envelope
    Protocol(MessageHandleError),
    /// Relay explicitly declined the event
    Rejected(String),
    /// Connection lost or closed while waiting
    ConnectionClosed,
    /// Relay not connected
    NotConnected,
    /// Transport error
    Transport(TransportError),
    /// Filters empty
    FiltersEmpty,
    /// Connection attempt aborted by `close`
    TerminationRequest,
    /// Can't enqueue the message
    CantSendChannelMessage {
        /// Name of channel
        channel: String,
    },
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connect(e) => write!(f, "connection failed: {e}"),
            Self::Timeout => write!(f, "timeout"),
            Self::Protocol(e) => write!(f, "protocol error: {e}"),
            Self::Rejected(message) => write!(f, "rejected: {message}"),
            Self::ConnectionClosed => write!(f, "connection closed"),
            Self::NotConnected => write!(f, "relay not connected"),
            Self::Transport(e) => write!(f, "{e}"),
            Self::FiltersEmpty => write!(f, "filters empty"),
            Self::TerminationRequest => write!(f, "received termination request"),
            Self::CantSendChannelMessage { channel } => {
                write!(f, "Can't send message to the '{channel}' channel")
            }
        }
    }
}

impl From<MessageHandleError> for Error {
    fn from(e: MessageHandleError) -> Self {
        Self::Protocol(e)
    }
}

impl From<TransportError> for Error {
    fn from(e: TransportError) -> Self {
        Self::Transport(e)
    }
}

#[cfg(test)]
mod tests {
    use nostr_proto::RelayMessage;

    use super::*;

    #[test]
    fn test_malformed_envelope_is_protocol_error() {
        let e: Error = RelayMessage::from_json("").unwrap_err().into();
        assert!(matches!(e, Error::Protocol(MessageHandleError::EmptyMsg)));
        assert_eq!(e.to_string(), "protocol error: Received empty message");

        let e: Error = RelayMessage::from_json(r#"["EOSE"]"#).unwrap_err().into();
        assert!(matches!(e, Error::Protocol(..)));
    }
}
