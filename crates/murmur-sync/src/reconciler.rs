use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};
use uuid::Uuid;

use murmur_types::{ChatMessage, ChatSummary, ConversationKey, Peer, UserId};

use crate::inflight::InFlight;
use crate::transcript::{Appended, Transcript};

/// One row of the conversation list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    pub key: ConversationKey,
    pub peer: Peer,
    /// Most recent message, shown in the list.
    pub preview: Option<ChatMessage>,
    /// Sequence of the last local write; 0 when only the server has written it.
    pub touched_at: u64,
    pub allow_chat: bool,
}

/// Where an incoming message landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageOutcome {
    /// Not attributable to a conversation of the local user.
    Dropped,
    /// The conversation is not in the list; only an authoritative reload may add it.
    Unknown(ConversationKey),
    Matched(ConversationKey),
}

/// Ordered conversation list plus the focused conversation's transcript.
#[derive(Debug)]
pub struct Reconciler {
    local_user: UserId,
    conversations: HashMap<ConversationKey, Conversation>,
    /// Keys, most recent first.
    order: Vec<ConversationKey>,
    transcript: Option<Transcript>,
    focus_generation: u64,
    refetch: InFlight,
}

impl Reconciler {
    pub fn new(local_user: UserId) -> Self {
        Self {
            local_user,
            conversations: HashMap::new(),
            order: Vec::new(),
            transcript: None,
            focus_generation: 0,
            refetch: InFlight::default(),
        }
    }

    /// Fold one live message into the list and, if it belongs to the focused
    /// conversation, into its transcript.
    pub fn apply_message(&mut self, message: ChatMessage, seq: u64) -> MessageOutcome {
        let Some(key) = self.key_of(&message) else {
            debug!(
                "Dropping message {} (sender {}, receiver {}, group {})",
                message.id, message.sender_id, message.receiver_id, message.group_id
            );
            return MessageOutcome::Dropped;
        };

        let outcome = if self.touch(key, &message, seq) {
            MessageOutcome::Matched(key)
        } else {
            MessageOutcome::Unknown(key)
        };

        if let Some(transcript) = self.transcript.as_mut().filter(|t| t.key() == key) {
            match transcript.append_live(message) {
                Appended::Duplicate => debug!("Message already in transcript {}", key),
                Appended::Parked => debug!("Own message in {} held until the pending send resolves", key),
                Appended::New | Appended::EchoConfirmed => {}
            }
        }
        outcome
    }

    /// The server acknowledged a local send.
    pub fn confirm_sent(&mut self, client_id: Uuid, stored: ChatMessage, seq: u64) -> MessageOutcome {
        let Some(key) = self.key_of(&stored) else {
            return MessageOutcome::Dropped;
        };
        if let Some(transcript) = self.transcript.as_mut().filter(|t| t.key() == key) {
            transcript.confirm_echo(client_id, stored.clone());
        }
        if self.touch(key, &stored, seq) {
            MessageOutcome::Matched(key)
        } else {
            MessageOutcome::Unknown(key)
        }
    }

    pub fn fail_sent(&mut self, client_id: Uuid) -> bool {
        self.transcript
            .as_mut()
            .is_some_and(|t| t.fail_echo(client_id))
    }

    /// Replace the preview and move the conversation to the front.
    fn touch(&mut self, key: ConversationKey, message: &ChatMessage, seq: u64) -> bool {
        let Some(conversation) = self.conversations.get_mut(&key) else {
            return false;
        };
        conversation.preview = Some(message.clone());
        conversation.touched_at = seq;
        if let Some(pos) = self.order.iter().position(|k| *k == key) {
            self.order.remove(pos);
        }
        self.order.insert(0, key);
        true
    }

    fn key_of(&self, message: &ChatMessage) -> Option<ConversationKey> {
        let key = message.conversation_key()?;
        match key {
            ConversationKey::Direct { low, high } if low != self.local_user && high != self.local_user => None,
            key => Some(key),
        }
    }

    /// Switch focus. Returns the new focus generation when the focus changed
    /// to a conversation, `None` when nothing changed or focus was cleared.
    pub fn apply_focus_change(&mut self, focus: Option<(ConversationKey, Peer)>) -> Option<u64> {
        let current = self.focused_key();
        match focus {
            Some((key, _)) if current == Some(key) => None,
            Some((key, peer)) => {
                self.focus_generation += 1;
                self.transcript = Some(Transcript::new(key, peer, self.focus_generation));
                Some(self.focus_generation)
            }
            None => {
                if current.is_some() {
                    self.focus_generation += 1;
                }
                self.transcript = None;
                None
            }
        }
    }

    /// Returns `false` when the history belongs to a focus that is gone.
    pub fn load_transcript(&mut self, key: ConversationKey, generation: u64, messages: Vec<ChatMessage>) -> bool {
        match self.transcript.as_mut() {
            Some(transcript) if transcript.key() == key => transcript.load_history(generation, messages),
            _ => false,
        }
    }

    /// Authoritative reload of the whole list, requested at sequence `issued`.
    ///
    /// Conversations written locally after `issued` keep their preview and
    /// stay ahead of the server's order; everything else follows the server.
    /// Returns the server's unread counter for every accepted row.
    pub fn replace_all(&mut self, fetched: Vec<ChatSummary>, issued: u64) -> Vec<(ConversationKey, u32)> {
        let mut newer: Vec<ConversationKey> = self
            .order
            .iter()
            .copied()
            .filter(|key| self.conversations.get(key).is_some_and(|c| c.touched_at > issued))
            .collect();
        let mut previous = std::mem::take(&mut self.conversations);
        let mut seen: HashSet<ConversationKey> = HashSet::new();
        let mut server_order = Vec::with_capacity(fetched.len());
        let mut counters = Vec::with_capacity(fetched.len());

        for row in fetched {
            let (Some(key), Some(peer)) = (row.conversation_key(), row.peer()) else {
                warn!(
                    "Discarding conversation row with user {} and group {}",
                    row.user_b.id, row.group.id
                );
                continue;
            };
            if !seen.insert(key) {
                warn!("Duplicate conversation {} in list response", key);
                continue;
            }
            counters.push((key, row.notification));

            let mut conversation = Conversation {
                key,
                peer,
                preview: row.messages.last().cloned(),
                touched_at: 0,
                allow_chat: row.allow_chat,
            };
            if let Some(local) = previous.remove(&key) {
                if local.touched_at > issued {
                    conversation.preview = local.preview;
                    conversation.touched_at = local.touched_at;
                }
            }
            if conversation.touched_at <= issued {
                server_order.push(key);
            }
            self.conversations.insert(key, conversation);
        }

        // locally newer rows the server did not return yet
        for key in &newer {
            if let Some(local) = previous.remove(key) {
                self.conversations.insert(*key, local);
            }
        }
        newer.append(&mut server_order);
        self.order = newer;
        counters
    }

    /// Returns `true` when a reload should be issued now.
    pub fn request_refetch(&mut self, seq: u64) -> bool {
        self.refetch.begin(seq)
    }

    /// Returns the sequence to re-issue the reload at, if one was requested
    /// while it was in flight.
    pub fn refetch_finished(&mut self) -> Option<u64> {
        self.refetch.finish()
    }

    pub fn get(&self, key: &ConversationKey) -> Option<&Conversation> {
        self.conversations.get(key)
    }

    /// Conversations, most recent first.
    pub fn ordered(&self) -> impl Iterator<Item = &Conversation> + '_ {
        self.order.iter().filter_map(|key| self.conversations.get(key))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn focused_key(&self) -> Option<ConversationKey> {
        self.transcript.as_ref().map(Transcript::key)
    }

    pub fn transcript(&self) -> Option<&Transcript> {
        self.transcript.as_ref()
    }

    pub(crate) fn transcript_mut(&mut self) -> Option<&mut Transcript> {
        self.transcript.as_mut()
    }
}
