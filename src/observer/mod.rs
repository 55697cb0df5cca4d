//! Reconciliation of the host chat list with the assignment set.
//!
//! The host owns its DOM; this module only observes it (through
//! [`MutationRecord`]s supplied by the integration layer) and reapplies
//! visibility whenever either side moves. Classification is stateless
//! per entry and safe to repeat, which is what keeps virtual-list
//! recycling and SPA navigation from accumulating drift.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use anyhow::Result;

use crate::state::{ChatId, FolderState, StateStore};

pub mod classify;

pub use classify::{classify, extract_chat_id, ChatEvent, MutationRecord};

/// Delay after the last observed title mutation before the cached title
/// is persisted. Sized to outlast the host's own rename-commit latency.
pub const TITLE_DEBOUNCE: Duration = Duration::from_secs(2);

/// The reconciler's handle on the host's native chat list.
///
/// Implementations sit at the DOM boundary. Every method must tolerate
/// unknown ids and redundant calls; the reconciler reapplies flags
/// wholesale rather than diffing.
pub trait HostList {
    /// Ids of every conversation entry currently present.
    fn chat_ids(&self) -> Vec<ChatId>;

    /// Current title text of an entry, if it is present and has one.
    fn title_of(&self, chat_id: &str) -> Option<String>;

    /// Suppress or restore an entry in the native list.
    fn set_hidden(&mut self, chat_id: &str, hidden: bool);

    /// Enable or disable the entry as a drag source.
    fn set_draggable(&mut self, chat_id: &str, draggable: bool);

    /// Ask the integration layer to attach its quick-move affordance.
    /// Must be a no-op when the affordance is already attached.
    fn ensure_quick_move(&mut self, chat_id: &str);
}

#[derive(Debug, Clone)]
struct PendingTitle {
    title: String,
    due: Instant,
}

/// State machine keeping host visibility in agreement with the
/// assignment set. One per context; owns the caches the original kept
/// as free globals (tracked-set, debounce deadlines).
pub struct Reconciler {
    /// Chat ids with an active folder assignment.
    tracked: HashSet<ChatId>,
    /// Debounced title updates waiting for their window to close.
    pending_titles: HashMap<ChatId, PendingTitle>,
    debounce: Duration,
}

impl Reconciler {
    pub fn new(state: &FolderState) -> Self {
        Self {
            tracked: state.tracked_ids(),
            pending_titles: HashMap::new(),
            debounce: TITLE_DEBOUNCE,
        }
    }

    /// Override the debounce window (tests use short ones).
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Feed one host mutation through classification and the state
    /// machine.
    pub fn observe(&mut self, record: &MutationRecord, host: &mut dyn HostList) {
        self.observe_at(record, host, Instant::now());
    }

    /// Deterministic-clock variant of [`observe`](Self::observe).
    pub fn observe_at(&mut self, record: &MutationRecord, host: &mut dyn HostList, now: Instant) {
        match classify(record) {
            ChatEvent::Discovered { chat_id } => self.apply_classification(&chat_id, host),
            ChatEvent::TitleChanged { chat_id, title } => {
                // Only tracked chats cache titles; the native list is
                // its own source of truth for everything untracked.
                if self.tracked.contains(&chat_id) {
                    self.pending_titles.insert(
                        chat_id,
                        PendingTitle {
                            title,
                            due: now + self.debounce,
                        },
                    );
                }
            }
            // A removed entry may be recycled back in at any moment; it
            // re-enters as Discovered then. Pending title updates stay
            // queued and are applied for whichever chat they captured.
            ChatEvent::Removed { .. } | ChatEvent::Irrelevant => {}
        }
    }

    /// Rebuild the tracked-set from `state` and reclassify every entry
    /// the host currently shows, in one pass. Also serves as the
    /// initial pass. No diffing against the previous tracked-set;
    /// redundant reapplication is the simplicity the host's churn pays
    /// for.
    pub fn resync(&mut self, state: &FolderState, host: &mut dyn HostList) {
        self.tracked = state.tracked_ids();
        for chat_id in host.chat_ids() {
            self.apply_classification(&chat_id, host);
        }
    }

    fn apply_classification(&self, chat_id: &str, host: &mut dyn HostList) {
        if self.tracked.contains(chat_id) {
            host.set_hidden(chat_id, true);
            host.set_draggable(chat_id, false);
        } else {
            host.set_hidden(chat_id, false);
            host.set_draggable(chat_id, true);
            host.ensure_quick_move(chat_id);
        }
    }

    /// Commit every pending title whose debounce window has closed.
    /// Returns how many updates were pushed into the store.
    pub fn flush_due(&mut self, store: &mut StateStore) -> Result<usize> {
        self.flush_due_at(store, Instant::now())
    }

    /// Deterministic-clock variant of [`flush_due`](Self::flush_due).
    pub fn flush_due_at(&mut self, store: &mut StateStore, now: Instant) -> Result<usize> {
        let due: Vec<ChatId> = self
            .pending_titles
            .iter()
            .filter(|(_, p)| p.due <= now)
            .map(|(id, _)| id.clone())
            .collect();

        for chat_id in &due {
            if let Some(pending) = self.pending_titles.remove(chat_id) {
                // No-ops at the store if the assignment is gone by now.
                store.update_chat_title(chat_id, pending.title)?;
            }
        }
        Ok(due.len())
    }

    /// Number of title updates still waiting on their window.
    pub fn pending_title_count(&self) -> usize {
        self.pending_titles.len()
    }
}
