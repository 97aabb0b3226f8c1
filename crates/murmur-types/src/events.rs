use serde::de::Error as _;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};

use crate::models::{ChatMessage, ConversationKey, Notification};

pub const KIND_CHAT: &str = "chat";
pub const KIND_NOTIFICATION: &str = "notification";
pub const KIND_DENOTIFICATION: &str = "denotification";

/// Events delivered over the gateway.
///
/// On the wire every event is an envelope `{ "type": ..., "payload": ... }`.
/// The set is closed: unknown envelope types never become a `GatewayEvent`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayEvent {
    /// A direct or group chat message
    Chat(ChatMessage),

    /// A new notification for the local user
    Notification(Notification),

    /// A previously delivered notification was retracted or superseded.
    /// The server may omit the id entirely.
    DeNotification { id: Option<i64> },
}

/// Raw wire envelope, before the payload is interpreted.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub payload: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct DeNotificationPayload {
    #[serde(default)]
    id: Option<i64>,
}

impl GatewayEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Chat(_) => KIND_CHAT,
            Self::Notification(_) => KIND_NOTIFICATION,
            Self::DeNotification { .. } => KIND_DENOTIFICATION,
        }
    }

    /// The conversation a chat event belongs to. Notification-class events are
    /// not scoped to a conversation.
    pub fn conversation_key(&self) -> Option<ConversationKey> {
        match self {
            Self::Chat(msg) => msg.conversation_key(),
            Self::Notification(_) | Self::DeNotification { .. } => None,
        }
    }

    pub fn is_notification_class(&self) -> bool {
        matches!(self, Self::Notification(_) | Self::DeNotification { .. })
    }

    /// Interpret an envelope. `Ok(None)` means the type is not one this client
    /// understands.
    pub fn from_envelope(envelope: Envelope) -> Result<Option<Self>, serde_json::Error> {
        let event = match envelope.kind.as_str() {
            KIND_CHAT => {
                let payload = envelope
                    .payload
                    .ok_or_else(|| serde_json::Error::custom("chat event without payload"))?;
                Self::Chat(serde_json::from_value(payload)?)
            }
            KIND_NOTIFICATION => {
                let payload = envelope
                    .payload
                    .ok_or_else(|| serde_json::Error::custom("notification event without payload"))?;
                Self::Notification(serde_json::from_value(payload)?)
            }
            KIND_DENOTIFICATION => {
                let id = match envelope.payload {
                    Some(serde_json::Value::Null) | None => None,
                    Some(payload) => serde_json::from_value::<DeNotificationPayload>(payload)?.id,
                };
                Self::DeNotification { id }
            }
            _ => return Ok(None),
        };
        Ok(Some(event))
    }

    /// Parse one encoded envelope.
    pub fn from_json(text: &str) -> Result<Option<Self>, serde_json::Error> {
        Self::from_envelope(serde_json::from_str(text)?)
    }
}

impl Serialize for GatewayEvent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Chat(msg) => {
                let mut s = serializer.serialize_struct("Envelope", 2)?;
                s.serialize_field("type", KIND_CHAT)?;
                s.serialize_field("payload", msg)?;
                s.end()
            }
            Self::Notification(n) => {
                let mut s = serializer.serialize_struct("Envelope", 2)?;
                s.serialize_field("type", KIND_NOTIFICATION)?;
                s.serialize_field("payload", n)?;
                s.end()
            }
            Self::DeNotification { id: None } => {
                let mut s = serializer.serialize_struct("Envelope", 1)?;
                s.serialize_field("type", KIND_DENOTIFICATION)?;
                s.end()
            }
            Self::DeNotification { id: Some(id) } => {
                let mut s = serializer.serialize_struct("Envelope", 2)?;
                s.serialize_field("type", KIND_DENOTIFICATION)?;
                s.serialize_field("payload", &serde_json::json!({ "id": id }))?;
                s.end()
            }
        }
    }
}
