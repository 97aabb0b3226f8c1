use serde::{Deserialize, Serialize};

use crate::models::{ChatMessage, ConversationKey, GroupId, GroupInfo, Peer, UserItem, null_as_empty};

// -- Chats --

/// One conversation as returned by `GET /api/chats`, and the body of the
/// transcript endpoints (`GET /api/chat`, `GET /api/chat-group`).
///
/// `user_a` is always the requesting user. Direct chats set `user_b`, group
/// chats set `group`; the unused side carries id `0`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSummary {
    /// Newest-only for the list endpoint, the full history for transcripts.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub user_a: UserItem,
    #[serde(default)]
    pub user_b: UserItem,
    #[serde(default)]
    pub group: GroupInfo,
    /// Server-side unread counter for this conversation.
    #[serde(default)]
    pub notification: u32,
    #[serde(default)]
    pub allow_chat: bool,
}

impl ChatSummary {
    /// Returns `None` when both or neither of `user_b` / `group` are set.
    pub fn conversation_key(&self) -> Option<ConversationKey> {
        match (self.user_b.id.is_set(), self.group.id.is_set()) {
            (true, false) => Some(ConversationKey::direct(self.user_a.id, self.user_b.id)),
            (false, true) => Some(ConversationKey::group(self.group.id)),
            _ => None,
        }
    }

    pub fn peer(&self) -> Option<Peer> {
        match self.conversation_key()? {
            ConversationKey::Direct { .. } => Some(Peer::User(self.user_b.clone())),
            ConversationKey::Group(_) => Some(Peer::Group(self.group.clone())),
        }
    }
}

/// How the chat endpoints address a conversation: direct chats by the peer's
/// username, group chats by group id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ChatTarget {
    Direct { username: String },
    Group { id: GroupId },
}

impl From<&Peer> for ChatTarget {
    fn from(peer: &Peer) -> Self {
        match peer {
            Peer::User(user) => Self::Direct {
                username: user.username.clone(),
            },
            Peer::Group(group) => Self::Group { id: group.id },
        }
    }
}

// -- Notifications --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnreadCountResponse {
    pub unread_count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserId;

    #[test]
    fn decodes_direct_chat_row() {
        let json = r#"{
            "messages": [{"id": 7, "senderId": 2, "receiverId": 1, "groupId": 0,
                          "content": "hi", "createdAt": "2024-09-14T18:03:11Z"}],
            "userA": {"id": 1, "username": "me", "profileImg": "", "postCount": 0},
            "userB": {"id": 2, "username": "bob", "profileImg": "bob.png", "postCount": 3},
            "group": {"id": 0, "title": "", "description": "", "creator_id": 0,
                      "image": "", "created_at": "0001-01-01T00:00:00Z", "members": null, "type": ""},
            "notification": 2,
            "allowChat": true
        }"#;
        let row: ChatSummary = serde_json::from_str(json).unwrap();
        assert_eq!(row.conversation_key(), Some(ConversationKey::direct(UserId(1), UserId(2))));
        assert_eq!(row.notification, 2);
        assert_eq!(
            row.peer().map(|p| ChatTarget::from(&p)),
            Some(ChatTarget::Direct { username: "bob".into() })
        );
    }

    #[test]
    fn group_chat_row_targets_group_id() {
        let row = ChatSummary {
            user_a: UserItem { id: UserId(1), ..Default::default() },
            group: GroupInfo { id: GroupId(4), title: "hikers".into(), ..Default::default() },
            ..Default::default()
        };
        assert_eq!(row.conversation_key(), Some(ConversationKey::group(GroupId(4))));
        assert_eq!(
            row.peer().map(|p| ChatTarget::from(&p)),
            Some(ChatTarget::Group { id: GroupId(4) })
        );
    }

    #[test]
    fn row_with_both_sides_set_has_no_key() {
        let row = ChatSummary {
            user_b: UserItem { id: UserId(2), ..Default::default() },
            group: GroupInfo { id: GroupId(4), ..Default::default() },
            ..Default::default()
        };
        assert_eq!(row.conversation_key(), None);
        assert_eq!(row.peer(), None);
    }

    #[test]
    fn null_messages_decode_as_empty() {
        let row: ChatSummary = serde_json::from_str(
            r#"{"messages": null, "userA": {"id": 1}, "userB": {"id": 2}, "group": {"id": 0}}"#,
        )
        .unwrap();
        assert!(row.messages.is_empty());
    }
}
