use std::collections::HashMap;

use tracing::trace;

use murmur_types::ConversationKey;

use crate::inflight::InFlight;

#[derive(Debug, Default)]
struct ReadEntry {
    unread: u32,
    /// Sequence of the last write to `unread`.
    changed_at: u64,
    mark: InFlight,
}

/// Per-conversation unread counters.
///
/// Local writes and server-confirmed writes are ordered by event sequence:
/// a server value only lands if it was requested at or after the last local
/// change. Mark-read requests are debounced to one in flight per conversation.
#[derive(Debug, Default)]
pub struct ReadStateTracker {
    entries: HashMap<ConversationKey, ReadEntry>,
}

impl ReadStateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` when a mark-read request should be issued now.
    pub fn on_message_arrived(&mut self, key: ConversationKey, self_authored: bool, focused: bool, seq: u64) -> bool {
        if focused {
            // own message into an already-read conversation changes nothing
            if self_authored && self.unread(&key) == 0 {
                return false;
            }
            return self.viewed(key, seq);
        }
        if !self_authored {
            let entry = self.entries.entry(key).or_default();
            entry.unread += 1;
            entry.changed_at = seq;
            trace!("{} unread in {}", entry.unread, key);
        }
        false
    }

    /// The conversation was opened. Returns `true` when a mark-read request
    /// should be issued now.
    pub fn on_focus_change(&mut self, key: ConversationKey, seq: u64) -> bool {
        self.viewed(key, seq)
    }

    fn viewed(&mut self, key: ConversationKey, seq: u64) -> bool {
        let entry = self.entries.entry(key).or_default();
        entry.unread = 0;
        entry.changed_at = seq;
        entry.mark.begin(seq)
    }

    /// Apply a server-confirmed counter. Ignored when the conversation changed
    /// locally after the request was issued.
    pub fn apply_authoritative(&mut self, key: ConversationKey, count: u32, as_of: u64) -> bool {
        let entry = self.entries.entry(key).or_default();
        if as_of < entry.changed_at {
            trace!("Ignoring stale counter {} for {} (as of {}, changed at {})", count, key, as_of, entry.changed_at);
            return false;
        }
        entry.unread = count;
        entry.changed_at = as_of;
        true
    }

    /// A mark-read request issued at `issued` finished. Returns the sequence
    /// to re-issue it at, if another one was needed meanwhile.
    pub fn mark_read_finished(&mut self, key: ConversationKey, issued: u64, ok: bool) -> Option<u64> {
        if ok {
            self.apply_authoritative(key, 0, issued);
        }
        self.entries.get_mut(&key).and_then(|entry| entry.mark.finish())
    }

    pub fn unread(&self, key: &ConversationKey) -> u32 {
        self.entries.get(key).map_or(0, |entry| entry.unread)
    }

    pub fn changed_at(&self, key: &ConversationKey) -> u64 {
        self.entries.get(key).map_or(0, |entry| entry.changed_at)
    }

    pub fn total_unread(&self) -> u32 {
        self.entries.values().map(|entry| entry.unread).sum()
    }
}
