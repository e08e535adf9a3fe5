// Copyright (c) 2022-2023 Yuki Kishimoto
// Copyright (c) 2023-2025 Rust Nostr Developers
// Distributed under the MIT software license

//! Client messages

use serde_json::{json, Value};

use super::{MessageHandleError, SubscriptionId};
use crate::{Event, Filter};

/// Messages sent by clients, received by relays
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    /// Event
    Event(Box<Event>),
    /// Req
    Req {
        /// Subscription ID
        subscription_id: SubscriptionId,
        /// Filters
        filters: Vec<Filter>,
    },
    /// Count
    ///
    /// <https://github.com/nostr-protocol/nips/blob/master/45.md>
    Count {
        /// Subscription ID
        subscription_id: SubscriptionId,
        /// Filters
        filters: Vec<Filter>,
    },
    /// Close
    Close(SubscriptionId),
    /// Auth
    ///
    /// <https://github.com/nostr-protocol/nips/blob/master/42.md>
    Auth(Box<Event>),
}

impl ClientMessage {
    /// Create `EVENT` message
    #[inline]
    pub fn event(event: Event) -> Self {
        Self::Event(Box::new(event))
    }

    /// Create `REQ` message
    #[inline]
    pub fn req(subscription_id: SubscriptionId, filters: Vec<Filter>) -> Self {
        Self::Req {
            subscription_id,
            filters,
        }
    }

    /// Create `COUNT` message
    #[inline]
    pub fn count(subscription_id: SubscriptionId, filters: Vec<Filter>) -> Self {
        Self::Count {
            subscription_id,
            filters,
        }
    }

    /// Create `CLOSE` message
    #[inline]
    pub fn close(subscription_id: SubscriptionId) -> Self {
        Self::Close(subscription_id)
    }

    /// Create `AUTH` message
    #[inline]
    pub fn auth(event: Event) -> Self {
        Self::Auth(Box::new(event))
    }

    /// Check if is an `EVENT` message
    #[inline]
    pub fn is_event(&self) -> bool {
        matches!(self, Self::Event(_))
    }

    /// Serialize as [`Value`]
    pub fn as_value(&self) -> Value {
        match self {
            Self::Event(event) => json!(["EVENT", event]),
            Self::Req {
                subscription_id,
                filters,
            } => tagged_with_filters("REQ", subscription_id, filters),
            Self::Count {
                subscription_id,
                filters,
            } => tagged_with_filters("COUNT", subscription_id, filters),
            Self::Close(subscription_id) => json!(["CLOSE", subscription_id]),
            Self::Auth(event) => json!(["AUTH", event]),
        }
    }

    /// Serialize as JSON string
    #[inline]
    pub fn as_json(&self) -> String {
        self.as_value().to_string()
    }

    /// Deserialize from [`Value`]
    pub fn from_value(msg: Value) -> Result<Self, MessageHandleError> {
        let v = msg
            .as_array()
            .ok_or(MessageHandleError::InvalidMessageFormat)?;

        let tag: &str = v
            .first()
            .and_then(|t| t.as_str())
            .ok_or(MessageHandleError::InvalidMessageFormat)?;

        match tag {
            // ["EVENT", <event JSON>]
            "EVENT" | "AUTH" => {
                if v.len() != 2 {
                    return Err(MessageHandleError::InvalidMessageFormat);
                }
                let event: Event = serde_json::from_value(v[1].clone())?;
                if tag == "EVENT" {
                    Ok(Self::event(event))
                } else {
                    Ok(Self::auth(event))
                }
            }
            // ["REQ", <subscription_id>, <filter JSON>...]
            "REQ" | "COUNT" => {
                if v.len() < 2 {
                    return Err(MessageHandleError::InvalidMessageFormat);
                }
                let subscription_id: SubscriptionId = serde_json::from_value(v[1].clone())?;
                let filters: Vec<Filter> = serde_json::from_value(Value::Array(v[2..].to_vec()))?;
                if tag == "REQ" {
                    Ok(Self::req(subscription_id, filters))
                } else {
                    Ok(Self::count(subscription_id, filters))
                }
            }
            // ["CLOSE", <subscription_id>]
            "CLOSE" => {
                if v.len() != 2 {
                    return Err(MessageHandleError::InvalidMessageFormat);
                }
                let subscription_id: SubscriptionId = serde_json::from_value(v[1].clone())?;
                Ok(Self::close(subscription_id))
            }
            other => Err(MessageHandleError::UnknownTag(other.to_string())),
        }
    }

    /// Deserialize from JSON string
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

fn tagged_with_filters(tag: &str, subscription_id: &SubscriptionId, filters: &[Filter]) -> Value {
    let mut json: Vec<Value> = Vec::with_capacity(2 + filters.len());
    json.push(json!(tag));
    json.push(json!(subscription_id));
    json.extend(filters.iter().map(|f| json!(f)));
    Value::Array(json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Kind;

    #[test]
    fn test_req_serialization() {
        let msg = ClientMessage::req(
            SubscriptionId::new("sub:1"),
            vec![Filter::new().kind(Kind::TEXT_NOTE).limit(10), Filter::new().kind(Kind::METADATA)],
        );
        assert_eq!(
            msg.as_json(),
            r#"["REQ","sub:1",{"kinds":[1],"limit":10},{"kinds":[0]}]"#
        );
        assert_eq!(ClientMessage::from_json(msg.as_json()).unwrap(), msg);
    }

    #[test]
    fn test_close_serialization() {
        let msg = ClientMessage::close(SubscriptionId::new("sub:7"));
        assert_eq!(msg.as_json(), r#"["CLOSE","sub:7"]"#);
    }

    #[test]
    fn test_unknown_tag() {
        assert!(matches!(
            ClientMessage::from_json(r#"["NEG-OPEN","x"]"#),
            Err(MessageHandleError::UnknownTag(_))
        ));
    }
}
