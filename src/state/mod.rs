//! Bounded, self-cleaning conversation state.
//!
//! Five stores: processed-message ids (dedup), message history (deletion
//! notices), pending unanswered messages (reply matching), per-user sent
//! media URLs, and one-shot self-deletion markers. All operations are
//! infallible and non-suspending; the dispatcher task is the sole owner, so
//! no locking is needed.

use crate::bus::InboundMessage;
use indexmap::{IndexMap, IndexSet};
use std::collections::HashSet;
use tracing::debug;

pub const DEFAULT_HISTORY_CAP: usize = 1000;
pub const DEFAULT_PROCESSED_CAP: usize = 500;
pub const DEFAULT_SENT_MEDIA_CAP: usize = 50;
pub const DEFAULT_DELETION_MARKER_CAP: usize = 100;
pub const DEFAULT_REPLY_WINDOW_MS: i64 = 10 * 60 * 1000;

/// Ceilings and windows for the bounded stores.
#[derive(Debug, Clone)]
pub struct StateBounds {
    pub history_cap: usize,
    pub processed_cap: usize,
    pub sent_media_cap: usize,
    pub deletion_marker_cap: usize,
    pub reply_window_ms: i64,
}

impl Default for StateBounds {
    fn default() -> Self {
        Self {
            history_cap: DEFAULT_HISTORY_CAP,
            processed_cap: DEFAULT_PROCESSED_CAP,
            sent_media_cap: DEFAULT_SENT_MEDIA_CAP,
            deletion_marker_cap: DEFAULT_DELETION_MARKER_CAP,
            reply_window_ms: DEFAULT_REPLY_WINDOW_MS,
        }
    }
}

/// An unanswered inbound message awaiting a voice reply.
#[derive(Debug, Clone)]
pub struct PendingReply {
    pub message: InboundMessage,
    pub replied: bool,
    /// Local clock (epoch ms) at registration; drives the staleness window.
    pub registered_at: i64,
}

/// Snapshot kept for deletion notices.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub content: String,
    pub sender: String,
    pub chat_id: String,
    pub timestamp: i64,
}

pub struct ConversationState {
    bounds: StateBounds,
    history: IndexMap<String, HistoryEntry>,
    /// Keyed by message id; iteration order is insertion order, which breaks
    /// timestamp ties in `take_oldest_unanswered`.
    pending: IndexMap<String, PendingReply>,
    processed: HashSet<String>,
    sent_media: IndexMap<String, IndexSet<String>>,
    self_deletions: IndexSet<String>,
}

impl ConversationState {
    pub fn new(bounds: StateBounds) -> Self {
        Self {
            bounds,
            history: IndexMap::new(),
            pending: IndexMap::new(),
            processed: HashSet::new(),
            sent_media: IndexMap::new(),
            self_deletions: IndexSet::new(),
        }
    }

    /// Idempotence gate. Returns `false` for an already-seen id. The set is
    /// cleared wholesale at the ceiling (not LRU): idempotence only matters
    /// for closely-spaced duplicate deliveries.
    pub fn mark_processed(&mut self, id: &str) -> bool {
        if self.processed.contains(id) {
            return false;
        }
        if self.processed.len() >= self.bounds.processed_cap {
            debug!(
                size = self.processed.len(),
                "processed-id set hit its ceiling, resetting"
            );
            self.processed.clear();
        }
        self.processed.insert(id.to_string());
        true
    }

    /// Store a history snapshot and, when `pending` is set, register the
    /// message as awaiting a reply. Re-recording an id never duplicates the
    /// pending entry or refreshes its queue position.
    pub fn record_inbound(&mut self, msg: &InboundMessage, pending: bool, now: i64) {
        let snapshot = msg
            .body_text()
            .map_or_else(|| format!("[{}]", msg.kind_label()), ToOwned::to_owned);
        self.history.insert(
            msg.id.clone(),
            HistoryEntry {
                content: snapshot,
                sender: msg.sender().to_string(),
                chat_id: msg.chat_id.clone(),
                timestamp: msg.timestamp,
            },
        );
        // FIFO by insertion order, not timestamp
        while self.history.len() > self.bounds.history_cap {
            self.history.shift_remove_index(0);
        }

        if pending && !self.pending.contains_key(&msg.id) {
            self.pending.insert(
                msg.id.clone(),
                PendingReply {
                    message: msg.clone(),
                    replied: false,
                    registered_at: now,
                },
            );
        }
    }

    /// The unanswered entry with the smallest sender timestamp, ties broken
    /// by insertion order. Linear scan: the set stays small under the reply
    /// window, but this is the place a priority queue would slot in if
    /// traffic volume ever changes that.
    pub fn take_oldest_unanswered(&self) -> Option<(&str, &PendingReply)> {
        let mut oldest: Option<(&str, &PendingReply)> = None;
        for (id, entry) in &self.pending {
            if entry.replied {
                continue;
            }
            match oldest {
                Some((_, best)) if entry.message.timestamp >= best.message.timestamp => {}
                _ => oldest = Some((id.as_str(), entry)),
            }
        }
        oldest
    }

    /// Flip `replied` on a pending entry. Idempotent; unknown ids are no-ops.
    pub fn mark_answered(&mut self, id: &str) {
        if let Some(entry) = self.pending.get_mut(id) {
            entry.replied = true;
        }
    }

    /// Drop answered entries older than the reply window and trim oversized
    /// sent-media sets down to their cap (oldest first).
    pub fn prune_stale(&mut self, now: i64) {
        let window = self.bounds.reply_window_ms;
        self.pending
            .retain(|_, entry| !(entry.replied && now - entry.registered_at > window));

        let cap = self.bounds.sent_media_cap;
        for set in self.sent_media.values_mut() {
            while set.len() > cap {
                set.shift_remove_index(0);
            }
        }
    }

    /// Flag an id as deleted by the system itself, so the deletion-event
    /// handler stays silent for it. The marker is set before the transport
    /// delete call is issued; a transport that surfaces the deletion event
    /// before the command handler runs at all would still race this.
    pub fn note_self_deletion(&mut self, id: &str) {
        if self.self_deletions.len() >= self.bounds.deletion_marker_cap {
            debug!(
                size = self.self_deletions.len(),
                "self-deletion marker set hit its ceiling, resetting"
            );
            self.self_deletions.clear();
        }
        self.self_deletions.insert(id.to_string());
    }

    /// One-shot consume: returns whether the marker was present and removes
    /// it in the same step.
    pub fn consume_self_deletion(&mut self, id: &str) -> bool {
        self.self_deletions.shift_remove(id)
    }

    pub fn history(&self, id: &str) -> Option<&HistoryEntry> {
        self.history.get(id)
    }

    pub fn remove_history(&mut self, id: &str) -> Option<HistoryEntry> {
        self.history.shift_remove(id)
    }

    pub fn media_already_sent(&self, user: &str, url: &str) -> bool {
        self.sent_media.get(user).is_some_and(|set| set.contains(url))
    }

    pub fn record_sent_media(&mut self, user: &str, url: &str) {
        let cap = self.bounds.sent_media_cap;
        let set = self.sent_media.entry(user.to_string()).or_default();
        set.insert(url.to_string());
        while set.len() > cap {
            set.shift_remove_index(0);
        }
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn is_answered(&self, id: &str) -> Option<bool> {
        self.pending.get(id).map(|e| e.replied)
    }
}
