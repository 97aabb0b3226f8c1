use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use murmur_api::{ApiError, FeedScope};
use murmur_gateway::decode_payload;
use murmur_types::{
    ChatMessage, ChatSummary, ChatTarget, ConversationKey, GatewayEvent, GroupId, Notification, Peer, UserId,
    UserItem,
};

use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::notifications::NotificationAggregator;
use crate::read_state::ReadStateTracker;
use crate::reconciler::{MessageOutcome, Reconciler};

/// Something the user did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Focus(Peer),
    Unfocus,
    /// Already validated message text for the focused conversation.
    Send(String),
    OpenNotifications,
    ShowPreviousNotifications,
    CloseNotifications,
    /// Reload everything the server owns.
    Refresh,
}

/// A request the reducer wants made. `issued` is the sequence the request
/// was decided at; its completion is ordered against local writes by it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    FetchConversations { issued: u64 },
    FetchNewContacts { issued: u64 },
    FetchTranscript { key: ConversationKey, generation: u64, target: ChatTarget },
    MarkRead { key: ConversationKey, target: ChatTarget, issued: u64 },
    SendMessage { key: ConversationKey, message: ChatMessage },
    RecountNotifications { issued: u64 },
    FetchFeed { scope: FeedScope, issued: u64 },
    MarkNotificationsRead { issued: u64 },
    ExpireToast { generation: u64, after: Duration },
}

/// The outcome of an [`Effect`], fed back into the reducer.
#[derive(Debug)]
pub enum Completion {
    Conversations { issued: u64, result: Result<Vec<ChatSummary>, ApiError> },
    NewContacts { issued: u64, result: Result<Vec<UserItem>, ApiError> },
    Transcript { key: ConversationKey, generation: u64, result: Result<Vec<ChatMessage>, ApiError> },
    MarkRead { key: ConversationKey, issued: u64, result: Result<(), ApiError> },
    Sent { client_id: Uuid, result: Result<ChatMessage, ApiError> },
    Recount { issued: u64, result: Result<u32, ApiError> },
    Feed { scope: FeedScope, issued: u64, result: Result<Vec<Notification>, ApiError> },
    NotificationsMarked { issued: u64, result: Result<(), ApiError> },
    ToastExpired { generation: u64 },
}

/// Check composer input before it becomes an [`Action::Send`].
pub fn validate_message(content: &str, max_chars: usize) -> Result<(), SyncError> {
    if content.trim().is_empty() {
        return Err(SyncError::EmptyMessage);
    }
    let len = content.chars().count();
    if len > max_chars {
        return Err(SyncError::MessageTooLong { len, max: max_chars });
    }
    Ok(())
}

/// Canonical key of the conversation with `peer`.
pub fn key_for(local_user: UserId, peer: &Peer) -> ConversationKey {
    match peer {
        Peer::User(user) => ConversationKey::direct(local_user, user.id),
        Peer::Group(group) => ConversationKey::group(group.id),
    }
}

/// The merged client state. Every input is processed to completion and
/// answered with the requests it makes necessary; nothing here blocks or
/// touches the network.
#[derive(Debug)]
pub struct SyncState {
    pub(crate) local_user: UserId,
    pub(crate) config: SyncConfig,
    seq: u64,
    pub(crate) conversations: Reconciler,
    pub(crate) read_state: ReadStateTracker,
    pub(crate) notifications: NotificationAggregator,
    pub(crate) new_contacts: Vec<UserItem>,
    new_contacts_as_of: u64,
}

impl SyncState {
    pub fn new(local_user: UserId, config: SyncConfig) -> Self {
        Self {
            local_user,
            config,
            seq: 0,
            conversations: Reconciler::new(local_user),
            read_state: ReadStateTracker::new(),
            notifications: NotificationAggregator::new(),
            new_contacts: Vec::new(),
            new_contacts_as_of: 0,
        }
    }

    fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }

    pub fn local_user(&self) -> UserId {
        self.local_user
    }

    /// Initial load.
    pub fn start(&mut self) -> Vec<Effect> {
        self.resync()
    }

    /// The transport came back after a drop; anything may have been missed.
    pub fn handle_resumed(&mut self) -> Vec<Effect> {
        info!("Gateway resumed, resyncing");
        self.resync()
    }

    fn resync(&mut self) -> Vec<Effect> {
        let seq = self.next_seq();
        let mut effects = self.refetch(seq);
        effects.push(Effect::RecountNotifications { issued: seq });
        if let Some(scope) = self.notifications.refresh_scope() {
            effects.push(Effect::FetchFeed { scope, issued: seq });
        }
        effects
    }

    fn refetch(&mut self, seq: u64) -> Vec<Effect> {
        if self.conversations.request_refetch(seq) {
            vec![
                Effect::FetchConversations { issued: seq },
                Effect::FetchNewContacts { issued: seq },
            ]
        } else {
            debug!("Conversation reload already in flight, coalescing");
            Vec::new()
        }
    }

    /// Decode one raw gateway payload and apply its events in order.
    pub fn handle_payload(&mut self, payload: &str) -> Vec<Effect> {
        let mut effects = Vec::new();
        for event in decode_payload(payload) {
            effects.extend(self.handle_event(event));
        }
        effects
    }

    pub fn handle_event(&mut self, event: GatewayEvent) -> Vec<Effect> {
        let seq = self.next_seq();
        match event {
            GatewayEvent::Chat(message) => self.on_chat(message, seq),
            GatewayEvent::Notification(notification) => {
                let generation = self.notifications.on_notification_event(notification, seq);
                let mut effects = vec![
                    Effect::RecountNotifications { issued: seq },
                    Effect::ExpireToast {
                        generation,
                        after: self.config.toast_duration,
                    },
                ];
                effects.extend(self.feed_refresh(seq));
                effects
            }
            GatewayEvent::DeNotification { id } => {
                debug!("Notification {:?} retracted", id);
                let mut effects = vec![Effect::RecountNotifications { issued: seq }];
                effects.extend(self.feed_refresh(seq));
                effects
            }
        }
    }

    fn feed_refresh(&self, seq: u64) -> Option<Effect> {
        self.notifications
            .refresh_scope()
            .map(|scope| Effect::FetchFeed { scope, issued: seq })
    }

    fn on_chat(&mut self, message: ChatMessage, seq: u64) -> Vec<Effect> {
        let self_authored = message.sender_id == self.local_user;
        let key = match self.conversations.apply_message(message, seq) {
            MessageOutcome::Dropped => return Vec::new(),
            MessageOutcome::Matched(key) => key,
            MessageOutcome::Unknown(key) => {
                info!("Message for unknown conversation {}, reloading list", key);
                let mut effects = self.refetch(seq);
                if self.conversations.focused_key() == Some(key) {
                    effects.extend(self.message_read_state(key, self_authored, seq));
                }
                return effects;
            }
        };
        self.message_read_state(key, self_authored, seq).into_iter().collect()
    }

    fn message_read_state(&mut self, key: ConversationKey, self_authored: bool, seq: u64) -> Option<Effect> {
        let focused = self.conversations.focused_key() == Some(key);
        if self.read_state.on_message_arrived(key, self_authored, focused, seq) {
            self.mark_read(key, seq)
        } else {
            None
        }
    }

    /// Target for a mark-read of `key`: the focused peer, else the list row.
    fn target_for(&self, key: ConversationKey) -> Option<ChatTarget> {
        if let Some(transcript) = self.conversations.transcript().filter(|t| t.key() == key) {
            return Some(ChatTarget::from(transcript.peer()));
        }
        self.conversations.get(&key).map(|c| ChatTarget::from(&c.peer))
    }

    fn mark_read(&mut self, key: ConversationKey, issued: u64) -> Option<Effect> {
        match self.target_for(key) {
            Some(target) => Some(Effect::MarkRead { key, target, issued }),
            None => {
                // cannot address it; release the slot
                self.read_state.mark_read_finished(key, issued, false);
                None
            }
        }
    }

    pub fn handle_action(&mut self, action: Action) -> Vec<Effect> {
        let seq = self.next_seq();
        match action {
            Action::Focus(peer) => self.focus(peer, seq),
            Action::Unfocus => {
                self.conversations.apply_focus_change(None);
                Vec::new()
            }
            Action::Send(content) => self.send(content, seq),
            Action::OpenNotifications => {
                let scope = self.notifications.open_feed(FeedScope::New);
                vec![Effect::FetchFeed { scope, issued: seq }]
            }
            Action::ShowPreviousNotifications => {
                let scope = self.notifications.show_previous();
                vec![Effect::FetchFeed { scope, issued: seq }]
            }
            Action::CloseNotifications => {
                if self.notifications.close_feed() {
                    vec![Effect::MarkNotificationsRead { issued: seq }]
                } else {
                    Vec::new()
                }
            }
            Action::Refresh => self.resync(),
        }
    }

    fn focus(&mut self, peer: Peer, seq: u64) -> Vec<Effect> {
        let key = key_for(self.local_user, &peer);
        let target = ChatTarget::from(&peer);
        let Some(generation) = self.conversations.apply_focus_change(Some((key, peer))) else {
            return Vec::new();
        };
        debug!("Focused {} (generation {})", key, generation);

        let mut effects = vec![Effect::FetchTranscript {
            key,
            generation,
            target: target.clone(),
        }];
        if self.read_state.on_focus_change(key, seq) {
            effects.push(Effect::MarkRead { key, target, issued: seq });
        }
        effects
    }

    fn send(&mut self, content: String, seq: u64) -> Vec<Effect> {
        if let Err(e) = validate_message(&content, self.config.max_message_chars) {
            warn!("Not sending message: {}", e);
            return Vec::new();
        }
        let local_user = self.local_user;
        let Some(transcript) = self.conversations.transcript_mut() else {
            warn!("Not sending message: {}", SyncError::NoFocus);
            return Vec::new();
        };

        let key = transcript.key();
        let (receiver_id, group_id) = match transcript.peer() {
            Peer::User(user) => (user.id, GroupId::default()),
            Peer::Group(group) => (UserId::default(), group.id),
        };
        let message = ChatMessage {
            id: 0,
            sender_id: local_user,
            receiver_id,
            group_id,
            content,
            created_at: Utc::now(),
            client_id: Some(Uuid::new_v4()),
        };
        transcript.push_echo(message.clone());
        debug!("Sending message to {} at {}", key, seq);
        vec![Effect::SendMessage { key, message }]
    }

    pub fn handle_completion(&mut self, completion: Completion) -> Vec<Effect> {
        let seq = self.next_seq();
        match completion {
            Completion::Conversations { issued, result } => {
                let mut effects = Vec::new();
                match result {
                    Ok(rows) => effects.extend(self.conversations_loaded(rows, issued, seq)),
                    Err(e) => warn!("Failed to fetch conversations: {}", e),
                }
                if let Some(again) = self.conversations.refetch_finished() {
                    effects.push(Effect::FetchConversations { issued: again });
                    effects.push(Effect::FetchNewContacts { issued: again });
                }
                effects
            }
            Completion::NewContacts { issued, result } => {
                match result {
                    Ok(users) if issued >= self.new_contacts_as_of => {
                        self.new_contacts = users;
                        self.new_contacts_as_of = issued;
                    }
                    Ok(_) => debug!("Discarding stale new-contacts list (issued {})", issued),
                    Err(e) => warn!("Failed to fetch new contacts: {}", e),
                }
                Vec::new()
            }
            Completion::Transcript { key, generation, result } => {
                match result {
                    Ok(messages) => {
                        if !self.conversations.load_transcript(key, generation, messages) {
                            debug!("Discarding transcript for {} (generation {})", key, generation);
                        }
                    }
                    Err(e) => warn!("Failed to fetch transcript for {}: {}", key, e),
                }
                Vec::new()
            }
            Completion::MarkRead { key, issued, result } => {
                if let Err(e) = &result {
                    warn!("Failed to mark {} read: {}", key, e);
                }
                match self.read_state.mark_read_finished(key, issued, result.is_ok()) {
                    Some(again) => self.mark_read(key, again).into_iter().collect(),
                    None => Vec::new(),
                }
            }
            Completion::Sent { client_id, result } => match result {
                Ok(stored) => match self.conversations.confirm_sent(client_id, stored, seq) {
                    MessageOutcome::Unknown(key) => {
                        info!("First message to {}, reloading list", key);
                        self.refetch(seq)
                    }
                    _ => Vec::new(),
                },
                Err(e) => {
                    warn!("Failed to send message {}: {}", client_id, e);
                    self.conversations.fail_sent(client_id);
                    Vec::new()
                }
            },
            Completion::Recount { issued, result } => {
                match result {
                    Ok(count) => {
                        self.notifications.on_recount_complete(issued, count);
                    }
                    Err(e) => warn!("Failed to recount notifications: {}", e),
                }
                Vec::new()
            }
            Completion::Feed { scope, issued, result } => {
                match result {
                    Ok(items) => {
                        if !self.notifications.feed_loaded(scope, issued, items) {
                            debug!("Discarding {:?} notifications (issued {})", scope, issued);
                        }
                    }
                    Err(e) => warn!("Failed to fetch notifications: {}", e),
                }
                Vec::new()
            }
            Completion::NotificationsMarked { issued, result } => match result {
                Ok(()) => {
                    debug!("Notifications marked read (issued {})", issued);
                    vec![Effect::RecountNotifications { issued: seq }]
                }
                Err(e) => {
                    warn!("Failed to mark notifications read: {}", e);
                    Vec::new()
                }
            },
            Completion::ToastExpired { generation } => {
                self.notifications.expire_toast(generation);
                Vec::new()
            }
        }
    }

    fn conversations_loaded(&mut self, rows: Vec<ChatSummary>, issued: u64, seq: u64) -> Vec<Effect> {
        let focused = self.conversations.focused_key();
        let counters = self.conversations.replace_all(rows, issued);
        info!("Loaded {} conversations", counters.len());

        let mut effects = Vec::new();
        for (key, count) in counters {
            if focused == Some(key) && count > 0 {
                if self.read_state.on_focus_change(key, seq) {
                    effects.extend(self.mark_read(key, seq));
                }
            } else {
                self.read_state.apply_authoritative(key, count, issued);
            }
        }
        effects
    }

    /// Drop the focus; used on teardown.
    pub fn teardown(&mut self) {
        self.conversations.apply_focus_change(None);
    }
}
