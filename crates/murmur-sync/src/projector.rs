//! Render-ready, read-only views of [`SyncState`].

use chrono::{DateTime, Utc};

use murmur_api::FeedScope;
use murmur_types::{ChatMessage, ConversationKey, Notification, NotificationKind, Peer, UserId, UserItem};

use crate::engine::SyncState;
use crate::notifications::{Feed, Toast};
use crate::reconciler::Conversation;
use crate::transcript::{Delivery, Transcript};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationRow {
    pub key: ConversationKey,
    pub peer: Peer,
    pub name: String,
    pub preview: Option<String>,
    pub unread: u32,
    pub focused: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptLine {
    pub id: i64,
    pub sender: String,
    pub own: bool,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub delivery: Delivery,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptView {
    pub key: ConversationKey,
    pub title: String,
    pub loaded: bool,
    pub lines: Vec<TranscriptLine>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToastView {
    pub kind: NotificationKind,
    pub content: String,
    pub link: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedView {
    pub scope: FeedScope,
    pub items: Vec<Notification>,
}

/// Everything presentation needs, owned and comparable so unchanged
/// snapshots can be skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewSnapshot {
    pub conversations: Vec<ConversationRow>,
    pub transcript: Option<TranscriptView>,
    pub badge: u32,
    pub toast: Option<ToastView>,
    pub new_contacts: Vec<UserItem>,
    pub feed: Option<FeedView>,
}

impl SyncState {
    /// Transcript of the current focus. Never one of an earlier focus.
    pub fn active_transcript(&self) -> Option<&Transcript> {
        self.conversations.transcript()
    }

    /// Conversations, most recent first.
    pub fn ordered_conversations(&self) -> impl Iterator<Item = &Conversation> + '_ {
        self.conversations.ordered()
    }

    pub fn unread(&self, key: &ConversationKey) -> u32 {
        self.read_state.unread(key)
    }

    pub fn badge_count(&self) -> u32 {
        self.notifications.badge()
    }

    pub fn toast(&self) -> Option<&Toast> {
        self.notifications.toast()
    }

    pub fn new_contacts(&self) -> &[UserItem] {
        &self.new_contacts
    }

    pub fn feed(&self) -> Option<&Feed> {
        self.notifications.feed()
    }

    /// Conversations and new contacts whose name contains `query`,
    /// case-insensitively. Conversations come first, in list order.
    pub fn search(&self, query: &str) -> Vec<Peer> {
        let mut found: Vec<Peer> = self
            .ordered_conversations()
            .filter(|c| c.peer.matches(query))
            .map(|c| c.peer.clone())
            .collect();
        let extra: Vec<Peer> = self
            .new_contacts
            .iter()
            .map(|user| Peer::User(user.clone()))
            .filter(|peer| peer.matches(query) && !found.contains(peer))
            .collect();
        found.extend(extra);
        found
    }

    pub fn snapshot(&self) -> ViewSnapshot {
        let focused = self.conversations.focused_key();
        ViewSnapshot {
            conversations: self
                .ordered_conversations()
                .map(|c| ConversationRow {
                    key: c.key,
                    peer: c.peer.clone(),
                    name: c.peer.display_name().to_string(),
                    preview: c
                        .preview
                        .as_ref()
                        .map(|m| preview_text(m, &c.peer, self.local_user)),
                    unread: self.read_state.unread(&c.key),
                    focused: focused == Some(c.key),
                })
                .collect(),
            transcript: self.active_transcript().map(|t| self.transcript_view(t)),
            badge: self.badge_count(),
            toast: self.toast().map(|toast| ToastView {
                kind: toast.notification.kind,
                content: toast.notification.content.clone(),
                link: toast.notification.link(),
            }),
            new_contacts: self.new_contacts.clone(),
            feed: self.feed().map(|feed| FeedView {
                scope: feed.scope,
                items: feed.items.clone(),
            }),
        }
    }

    fn transcript_view(&self, transcript: &Transcript) -> TranscriptView {
        TranscriptView {
            key: transcript.key(),
            title: transcript.peer().display_name().to_string(),
            loaded: transcript.is_loaded(),
            lines: transcript
                .entries()
                .map(|(message, delivery)| TranscriptLine {
                    id: message.id,
                    sender: sender_name(message.sender_id, transcript.peer(), self.local_user),
                    own: message.sender_id == self.local_user,
                    content: message.content.clone(),
                    created_at: message.created_at,
                    delivery,
                })
                .collect(),
        }
    }
}

fn sender_name(sender: UserId, peer: &Peer, local_user: UserId) -> String {
    if sender == local_user {
        return "You".into();
    }
    match peer {
        Peer::User(user) => user.username.clone(),
        Peer::Group(group) => group
            .member(sender)
            .map(|member| member.username.clone())
            .unwrap_or_else(|| format!("user {}", sender)),
    }
}

/// List preview: own messages are prefixed with "You:", group messages from
/// others with the sender's name.
pub fn preview_text(message: &ChatMessage, peer: &Peer, local_user: UserId) -> String {
    if message.sender_id == local_user {
        return format!("You: {}", message.content);
    }
    match peer {
        Peer::User(_) => message.content.clone(),
        Peer::Group(group) => match group.member(message.sender_id) {
            Some(member) => format!("{}: {}", member.username, message.content),
            None => message.content.clone(),
        },
    }
}

#[cfg(test)]
mod tests {
    use murmur_api::ApiError;
    use murmur_types::{ChatSummary, GatewayEvent, GroupId, GroupInfo};

    use super::*;
    use crate::config::SyncConfig;
    use crate::engine::{Action, Completion};

    const ME: UserId = UserId(1);

    fn user(id: i64, name: &str) -> UserItem {
        UserItem {
            id: UserId(id),
            username: name.into(),
            ..Default::default()
        }
    }

    fn message(id: i64, from: i64, to: i64, group: i64, content: &str) -> ChatMessage {
        ChatMessage {
            id,
            sender_id: UserId(from),
            receiver_id: UserId(to),
            group_id: GroupId(group),
            content: content.into(),
            created_at: Utc::now(),
            client_id: None,
        }
    }

    fn hikers() -> GroupInfo {
        GroupInfo {
            id: GroupId(4),
            title: "Hikers".into(),
            members: vec![user(1, "me"), user(3, "carol")],
            ..Default::default()
        }
    }

    fn state() -> SyncState {
        let mut state = SyncState::new(ME, SyncConfig::default());
        state.start();
        state.handle_completion(Completion::Conversations {
            issued: 1,
            result: Ok(vec![
                ChatSummary {
                    messages: vec![message(10, 1, 2, 0, "see you")],
                    user_a: user(1, "me"),
                    user_b: user(2, "Bob"),
                    notification: 2,
                    ..Default::default()
                },
                ChatSummary {
                    messages: vec![message(11, 3, 0, 4, "trail at 8")],
                    user_a: user(1, "me"),
                    group: hikers(),
                    ..Default::default()
                },
            ]),
        });
        state.handle_completion(Completion::NewContacts {
            issued: 1,
            result: Ok(vec![user(5, "bobby"), user(6, "dave")]),
        });
        state
    }

    #[test]
    fn preview_labels() {
        let bob = Peer::User(user(2, "bob"));
        let group = Peer::Group(hikers());
        assert_eq!(preview_text(&message(1, 1, 2, 0, "hi"), &bob, ME), "You: hi");
        assert_eq!(preview_text(&message(1, 2, 1, 0, "hi"), &bob, ME), "hi");
        assert_eq!(preview_text(&message(1, 1, 0, 4, "go"), &group, ME), "You: go");
        assert_eq!(preview_text(&message(1, 3, 0, 4, "go"), &group, ME), "carol: go");
        assert_eq!(preview_text(&message(1, 9, 0, 4, "go"), &group, ME), "go");
    }

    #[test]
    fn snapshot_reflects_list_badge_and_focus() {
        let mut state = state();
        let bob = Peer::User(user(2, "Bob"));
        state.handle_action(Action::Focus(bob));
        state.handle_event(GatewayEvent::Chat(message(12, 2, 1, 0, "yo")));

        let snap = state.snapshot();
        let rows: Vec<_> = snap
            .conversations
            .iter()
            .map(|r| (r.name.as_str(), r.preview.as_deref(), r.unread, r.focused))
            .collect();
        assert_eq!(
            rows,
            vec![
                ("Bob", Some("yo"), 0, true),
                ("Hikers", Some("carol: trail at 8"), 0, false),
            ]
        );
        let transcript = snap.transcript.unwrap();
        assert_eq!(transcript.title, "Bob");
        assert!(!transcript.loaded);
        assert_eq!(transcript.lines.len(), 1);
        assert_eq!(transcript.lines[0].sender, "Bob");
        assert!(!transcript.lines[0].own);
        assert_eq!(snap.new_contacts.len(), 2);
    }

    #[test]
    fn snapshot_without_focus_has_no_transcript() {
        let mut state = state();
        state.handle_action(Action::Focus(Peer::Group(hikers())));
        assert!(state.snapshot().transcript.is_some());
        state.handle_action(Action::Unfocus);
        assert_eq!(state.snapshot().transcript, None);
    }

    #[test]
    fn unchanged_state_gives_equal_snapshots() {
        let mut state = state();
        let before = state.snapshot();
        state.handle_completion(Completion::Recount {
            issued: 1,
            result: Err(ApiError::Status(503)),
        });
        assert_eq!(state.snapshot(), before);
    }

    #[test]
    fn search_covers_conversations_then_new_contacts() {
        let state = state();
        let names: Vec<_> = state
            .search("BOB")
            .iter()
            .map(|p| p.display_name().to_string())
            .collect();
        assert_eq!(names, vec!["Bob", "bobby"]);
        assert_eq!(state.search("hik").len(), 1);
        assert!(state.search("zed").is_empty());
    }

    #[test]
    fn search_lists_a_peer_once() {
        let mut state = state();
        state.handle_completion(Completion::NewContacts {
            issued: 2,
            result: Ok(vec![user(2, "Bob"), user(5, "bobby")]),
        });
        let ids: Vec<_> = state
            .search("bob")
            .iter()
            .map(|p| match p {
                Peer::User(u) => u.id,
                Peer::Group(_) => panic!("no group matches"),
            })
            .collect();
        assert_eq!(ids, vec![UserId(2), UserId(5)]);
    }
}
