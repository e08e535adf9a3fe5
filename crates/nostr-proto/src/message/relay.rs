// Copyright (c) 2022-2023 Yuki Kishimoto
// Copyright (c) 2023-2025 Rust Nostr Developers
// Distributed under the MIT software license

//! Relay messages

use serde_json::{json, Value};

use super::{MessageHandleError, SubscriptionId};
use crate::{Event, EventId};

/// Messages sent by relays, received by clients
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayMessage {
    /// Event
    Event {
        /// Subscription ID
        subscription_id: SubscriptionId,
        /// Event
        event: Box<Event>,
    },
    /// Acknowledgement of an `EVENT` or `AUTH` message
    Ok {
        /// Event ID
        event_id: EventId,
        /// Accepted
        status: bool,
        /// Message
        message: String,
    },
    /// End of stored events
    EndOfStoredEvents(SubscriptionId),
    /// Notice
    Notice(String),
    /// Subscription closed by relay
    Closed {
        /// Subscription ID
        subscription_id: SubscriptionId,
        /// Message
        message: String,
    },
    /// Auth challenge
    ///
    /// <https://github.com/nostr-protocol/nips/blob/master/42.md>
    Auth {
        /// Challenge
        challenge: String,
    },
    /// Count
    ///
    /// <https://github.com/nostr-protocol/nips/blob/master/45.md>
    Count {
        /// Subscription ID
        subscription_id: SubscriptionId,
        /// Events count
        count: usize,
    },
}

impl RelayMessage {
    /// Create `EVENT` message
    #[inline]
    pub fn event(subscription_id: SubscriptionId, event: Event) -> Self {
        Self::Event {
            subscription_id,
            event: Box::new(event),
        }
    }

    /// Create `OK` message
    #[inline]
    pub fn ok<S>(event_id: EventId, status: bool, message: S) -> Self
    where
        S: Into<String>,
    {
        Self::Ok {
            event_id,
            status,
            message: message.into(),
        }
    }

    /// Create `EOSE` message
    #[inline]
    pub fn eose(subscription_id: SubscriptionId) -> Self {
        Self::EndOfStoredEvents(subscription_id)
    }

    /// Create `CLOSED` message
    #[inline]
    pub fn closed<S>(subscription_id: SubscriptionId, message: S) -> Self
    where
        S: Into<String>,
    {
        Self::Closed {
            subscription_id,
            message: message.into(),
        }
    }

    /// Serialize as [`Value`]
    pub fn as_value(&self) -> Value {
        match self {
            Self::Event {
                subscription_id,
                event,
            } => json!(["EVENT", subscription_id, event]),
            Self::Ok {
                event_id,
                status,
                message,
            } => json!(["OK", event_id, status, message]),
            Self::EndOfStoredEvents(subscription_id) => json!(["EOSE", subscription_id]),
            Self::Notice(message) => json!(["NOTICE", message]),
            Self::Closed {
                subscription_id,
                message,
            } => json!(["CLOSED", subscription_id, message]),
            Self::Auth { challenge } => json!(["AUTH", challenge]),
            Self::Count {
                subscription_id,
                count,
            } => json!(["COUNT", subscription_id, { "count": count }]),
        }
    }

    /// Serialize as JSON string
    #[inline]
    pub fn as_json(&self) -> String {
        self.as_value().to_string()
    }

    /// Deserialize from [`Value`]
    ///
    /// **This method doesn't verify the event!**
    pub fn from_value(msg: Value) -> Result<Self, MessageHandleError> {
        let v = msg
            .as_array()
            .ok_or(MessageHandleError::InvalidMessageFormat)?;

        let tag: &str = v
            .first()
            .and_then(|t| t.as_str())
            .ok_or(MessageHandleError::InvalidMessageFormat)?;

        let v_len: usize = v.len();

        match tag {
            // ["NOTICE", <message>]
            "NOTICE" => {
                if v_len != 2 {
                    return Err(MessageHandleError::InvalidMessageFormat);
                }
                let message: String = serde_json::from_value(v[1].clone())?;
                Ok(Self::Notice(message))
            }
            // ["EVENT", <subscription_id>, <event JSON>]
            "EVENT" => {
                if v_len != 3 {
                    return Err(MessageHandleError::InvalidMessageFormat);
                }
                let subscription_id: SubscriptionId = serde_json::from_value(v[1].clone())?;
                let event: Event = serde_json::from_value(v[2].clone())?;
                Ok(Self::event(subscription_id, event))
            }
            // ["EOSE", <subscription_id>]
            "EOSE" => {
                if v_len != 2 {
                    return Err(MessageHandleError::InvalidMessageFormat);
                }
                let subscription_id: SubscriptionId = serde_json::from_value(v[1].clone())?;
                Ok(Self::eose(subscription_id))
            }
            // ["OK", <event_id>, <true|false>, <message>]
            "OK" => {
                if v_len != 4 {
                    return Err(MessageHandleError::InvalidMessageFormat);
                }
                let event_id: EventId = serde_json::from_value(v[1].clone())?;
                let status: bool = serde_json::from_value(v[2].clone())?;
                let message: String = serde_json::from_value(v[3].clone())?;
                Ok(Self::ok(event_id, status, message))
            }
            // ["CLOSED", <subscription_id>, <message>]
            "CLOSED" => {
                if v_len != 3 {
                    return Err(MessageHandleError::InvalidMessageFormat);
                }
                let subscription_id: SubscriptionId = serde_json::from_value(v[1].clone())?;
                let message: String = serde_json::from_value(v[2].clone())?;
                Ok(Self::closed(subscription_id, message))
            }
            // ["AUTH", <challenge>]
            "AUTH" => {
                if v_len != 2 {
                    return Err(MessageHandleError::InvalidMessageFormat);
                }
                let challenge: String = serde_json::from_value(v[1].clone())?;
                Ok(Self::Auth { challenge })
            }
            // ["COUNT", <subscription_id>, {"count": <integer>}]
            "COUNT" => {
                if v_len != 3 {
                    return Err(MessageHandleError::InvalidMessageFormat);
                }
                let subscription_id: SubscriptionId = serde_json::from_value(v[1].clone())?;
                let count: Value = v[2]
                    .get("count")
                    .ok_or(MessageHandleError::InvalidMessageFormat)?
                    .clone();
                let count: usize = serde_json::from_value(count)?;
                Ok(Self::Count {
                    subscription_id,
                    count,
                })
            }
            other => Err(MessageHandleError::UnknownTag(other.to_string())),
        }
    }

    /// Deserialize from JSON string
    ///
    /// **This method doesn't verify the event!**
    pub fn from_json<T>(json: T) -> Result<Self, MessageHandleError>
    where
        T: AsRef<[u8]>,
    {
        let msg: &[u8] = json.as_ref();

        if msg.is_empty() {
            return Err(MessageHandleError::EmptyMsg);
        }

        let value: Value = serde_json::from_slice(msg)?;
        Self::from_value(value)
    }
}
