use std::collections::HashSet;

use uuid::Uuid;

use murmur_types::{ChatMessage, ConversationKey, Peer, UserId};

/// Delivery state of a transcript line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Confirmed,
    /// Sent locally, not yet acknowledged by the server.
    Pending,
    /// The send request failed.
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptEntry {
    pub message: ChatMessage,
    pub delivery: Delivery,
}

/// Result of appending a live message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Appended {
    New,
    /// Replaced a local echo carrying the same correlation id.
    EchoConfirmed,
    /// The server id is already in the transcript.
    Duplicate,
    /// An own message without a correlation id, held back while a send is
    /// pending; it is most likely that send's stored copy.
    Parked,
}

/// Message history of the focused conversation.
///
/// The history prefix is fetched once and stably sorted by creation time.
/// Live messages are appended behind it in arrival order and never re-sorted.
/// A transcript belongs to one focus generation; loads for another
/// generation are rejected.
///
/// The server publishes a sent message before answering the send request.
/// Such copies are parked until every pending send has resolved, so a send
/// shows as a single line whichever answer comes first.
#[derive(Debug, Clone)]
pub struct Transcript {
    key: ConversationKey,
    peer: Peer,
    generation: u64,
    history: Vec<ChatMessage>,
    loaded: bool,
    live: Vec<TranscriptEntry>,
    parked: Vec<ChatMessage>,
}

impl Transcript {
    pub fn new(key: ConversationKey, peer: Peer, generation: u64) -> Self {
        Self {
            key,
            peer,
            generation,
            history: Vec::new(),
            loaded: false,
            live: Vec::new(),
            parked: Vec::new(),
        }
    }

    pub fn key(&self) -> ConversationKey {
        self.key
    }

    pub fn peer(&self) -> &Peer {
        &self.peer
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Install the fetched history. Returns `false` if it belongs to another
    /// focus. Live entries the history already covers are dropped.
    pub fn load_history(&mut self, generation: u64, mut messages: Vec<ChatMessage>) -> bool {
        if generation != self.generation {
            return false;
        }
        messages.sort_by_key(|m| m.created_at);
        let known: HashSet<i64> = messages.iter().map(|m| m.id).filter(|id| *id != 0).collect();
        self.live
            .retain(|entry| entry.message.id == 0 || !known.contains(&entry.message.id));
        self.parked.retain(|m| !known.contains(&m.id));
        self.history = messages;
        self.loaded = true;
        true
    }

    /// Append a message received live.
    pub fn append_live(&mut self, message: ChatMessage) -> Appended {
        if let Some(client_id) = message.client_id {
            if let Some(entry) = self.echo_mut(client_id) {
                entry.message = message;
                entry.delivery = Delivery::Confirmed;
                return Appended::EchoConfirmed;
            }
        }
        if message.id != 0 && self.contains_id(message.id) {
            return Appended::Duplicate;
        }
        if message.client_id.is_none() && self.has_pending_from(message.sender_id) {
            self.parked.push(message);
            return Appended::Parked;
        }
        self.live.push(TranscriptEntry {
            message,
            delivery: Delivery::Confirmed,
        });
        Appended::New
    }

    /// Show a locally-sent message before the server has it.
    pub fn push_echo(&mut self, message: ChatMessage) {
        self.live.push(TranscriptEntry {
            message,
            delivery: Delivery::Pending,
        });
    }

    /// The server stored the echo `client_id` as `stored`. The echo is
    /// confirmed in place and a parked copy of it is discarded. If the stored
    /// copy is already shown the echo is removed instead.
    pub fn confirm_echo(&mut self, client_id: Uuid, mut stored: ChatMessage) -> bool {
        let Some(pos) = self.echo_position(client_id) else {
            return false;
        };
        let parked = self.parked.iter().position(|m| stored.id != 0 && m.id == stored.id);
        match parked {
            Some(i) => {
                self.parked.remove(i);
            }
            None if stored.id != 0 && self.contains_id(stored.id) => {
                self.live.remove(pos);
                self.release_parked();
                return true;
            }
            None => {}
        }
        stored.client_id = Some(client_id);
        self.live[pos] = TranscriptEntry {
            message: stored,
            delivery: Delivery::Confirmed,
        };
        self.release_parked();
        true
    }

    /// The send request for `client_id` failed. If a parked copy with the
    /// same text shows the server stored it anyway, that copy takes the
    /// echo's place; otherwise the echo stays visible as failed.
    pub fn fail_echo(&mut self, client_id: Uuid) -> bool {
        let Some(pos) = self.echo_position(client_id) else {
            return false;
        };
        let content = &self.live[pos].message.content;
        let delivered = self.parked.iter().position(|m| m.content == *content);
        match delivered {
            Some(i) => {
                let message = self.parked.remove(i);
                self.live[pos] = TranscriptEntry {
                    message,
                    delivery: Delivery::Confirmed,
                };
            }
            None => self.live[pos].delivery = Delivery::Failed,
        }
        self.release_parked();
        true
    }

    /// Once no send is pending, parked copies belong to no echo and are shown.
    fn release_parked(&mut self) {
        if self.live.iter().any(|e| e.delivery == Delivery::Pending) {
            return;
        }
        for message in std::mem::take(&mut self.parked) {
            if !self.contains_id(message.id) {
                self.live.push(TranscriptEntry {
                    message,
                    delivery: Delivery::Confirmed,
                });
            }
        }
    }

    /// History first, then live entries.
    pub fn entries(&self) -> impl Iterator<Item = (&ChatMessage, Delivery)> + '_ {
        self.history
            .iter()
            .map(|m| (m, Delivery::Confirmed))
            .chain(self.live.iter().map(|e| (&e.message, e.delivery)))
    }

    pub fn len(&self) -> usize {
        self.history.len() + self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn contains_id(&self, id: i64) -> bool {
        self.history.iter().any(|m| m.id == id)
            || self
                .live
                .iter()
                .any(|e| e.delivery == Delivery::Confirmed && e.message.id == id)
            || self.parked.iter().any(|m| m.id == id)
    }

    fn has_pending_from(&self, sender: UserId) -> bool {
        self.live
            .iter()
            .any(|e| e.delivery == Delivery::Pending && e.message.sender_id == sender)
    }

    fn echo_position(&self, client_id: Uuid) -> Option<usize> {
        self.live.iter().position(|e| {
            e.delivery != Delivery::Confirmed && e.message.client_id == Some(client_id)
        })
    }

    fn echo_mut(&mut self, client_id: Uuid) -> Option<&mut TranscriptEntry> {
        let pos = self.echo_position(client_id)?;
        self.live.get_mut(pos)
    }
}
