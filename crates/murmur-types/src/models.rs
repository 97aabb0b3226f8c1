use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// Numeric user identity. `0` is the server's "not set" sentinel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl UserId {
    pub fn is_set(self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Numeric group identity. `0` is the server's "not set" sentinel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(pub i64);

impl GroupId {
    pub fn is_set(self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Go encodes nil slices as `null`; treat that as an empty list.
pub(crate) fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserItem {
    pub id: UserId,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub profile_img: String,
    #[serde(default)]
    pub post_count: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupInfo {
    pub id: GroupId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub creator_id: UserId,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub members: Vec<UserItem>,
}

impl GroupInfo {
    pub fn member(&self, id: UserId) -> Option<&UserItem> {
        self.members.iter().find(|m| m.id == id)
    }
}

/// Canonical identity of a conversation.
///
/// Direct conversations store the two participants sorted, so a message from
/// A to B and a message from B to A resolve to the same key without a
/// symmetric comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConversationKey {
    Direct { low: UserId, high: UserId },
    Group(GroupId),
}

impl ConversationKey {
    pub fn direct(a: UserId, b: UserId) -> Self {
        if a <= b {
            Self::Direct { low: a, high: b }
        } else {
            Self::Direct { low: b, high: a }
        }
    }

    pub fn group(id: GroupId) -> Self {
        Self::Group(id)
    }

    pub fn is_group(&self) -> bool {
        matches!(self, Self::Group(_))
    }

    /// The other participant of a direct conversation, seen from `local`.
    pub fn peer_of(&self, local: UserId) -> Option<UserId> {
        match *self {
            Self::Direct { low, high } if low == local => Some(high),
            Self::Direct { low, high } if high == local => Some(low),
            _ => None,
        }
    }
}

impl fmt::Display for ConversationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Direct { low, high } => write!(f, "dm:{}-{}", low, high),
            Self::Group(id) => write!(f, "group:{}", id),
        }
    }
}

/// A chat message as carried by the gateway and the chat endpoints.
///
/// `receiver_id == 0` marks a group message and `group_id == 0` a direct
/// message. Exactly one of them is set on a well-formed message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub sender_id: UserId,
    #[serde(default)]
    pub receiver_id: UserId,
    #[serde(default)]
    pub group_id: GroupId,
    #[serde(default)]
    pub content: String,
    pub created_at: DateTime<Utc>,
    /// Correlation id of a locally-sent message, echoed back by servers that
    /// support it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<Uuid>,
}

impl ChatMessage {
    /// Resolve the conversation this message belongs to. Returns `None` for
    /// messages that are missing an identity or set both receiver and group.
    pub fn conversation_key(&self) -> Option<ConversationKey> {
        if !self.sender_id.is_set() {
            return None;
        }
        match (self.receiver_id.is_set(), self.group_id.is_set()) {
            (true, false) => Some(ConversationKey::direct(self.sender_id, self.receiver_id)),
            (false, true) => Some(ConversationKey::group(self.group_id)),
            _ => None,
        }
    }

    pub fn is_group(&self) -> bool {
        self.group_id.is_set()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    FollowRequest,
    Follow,
    GroupInvitation,
    GroupJoinRequest,
    Group,
    EventCreation,
    Post,
    Comment,
    Reaction,
    #[serde(other)]
    Other,
}

impl NotificationKind {
    /// Kinds that carry an accept/decline decision.
    pub fn needs_response(self) -> bool {
        matches!(
            self,
            Self::FollowRequest | Self::GroupInvitation | Self::GroupJoinRequest
        )
    }
}

impl Default for NotificationKind {
    fn default() -> Self {
        Self::Other
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: i64,
    #[serde(rename = "type", default)]
    pub kind: NotificationKind,
    #[serde(default)]
    pub notified_user_id: UserId,
    #[serde(default)]
    pub notifying_user_id: UserId,
    #[serde(default)]
    pub notifying_image: String,
    #[serde(default)]
    pub object_id: i64,
    #[serde(default)]
    pub object: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    /// In-app route the notification points at.
    pub fn link(&self) -> Option<String> {
        match self.kind {
            NotificationKind::Post | NotificationKind::Comment | NotificationKind::Reaction => {
                Some(format!("/posts/{}", self.object_id))
            }
            NotificationKind::Follow | NotificationKind::FollowRequest => {
                Some(format!("/u/{}", self.object))
            }
            NotificationKind::Group
            | NotificationKind::GroupInvitation
            | NotificationKind::GroupJoinRequest
            | NotificationKind::EventCreation => Some(format!("/groups/{}", self.object)),
            NotificationKind::Other => None,
        }
    }
}

/// The other side of a conversation: a user for direct chats, a group otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Peer {
    User(UserItem),
    Group(GroupInfo),
}

impl Peer {
    pub fn display_name(&self) -> &str {
        match self {
            Self::User(user) => &user.username,
            Self::Group(group) => &group.title,
        }
    }

    /// Case-insensitive substring match on the display name.
    pub fn matches(&self, query: &str) -> bool {
        self.display_name()
            .to_lowercase()
            .contains(&query.to_lowercase())
    }
}
