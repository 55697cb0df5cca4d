//! Folder hierarchy and chat assignment model.
//!
//! The whole state is persisted as one JSON value per user; field names
//! stay camelCase to remain readable alongside records written by the
//! browser extension this crate was extracted from.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

/// Unique identifier for a folder.
pub type FolderId = String;

/// Host-assigned identifier of a chat conversation.
pub type ChatId = String;

/// A user-created folder. Folders form a tree via `parent_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Folder {
    /// Generated at creation, immutable.
    pub id: FolderId,
    /// Display name (user-customizable).
    pub name: String,
    /// Parent folder, or None for a root-level folder.
    pub parent_id: Option<FolderId>,
    /// Whether the folder is collapsed in the tree view.
    pub is_collapsed: bool,
    /// Sibling rank among folders sharing the same parent.
    pub order: u32,
}

/// Assignment of a chat to a folder.
///
/// Presence of an assignment means the chat is tracked: hidden from the
/// host's native list and shown inside `folder_id`. Absence means the
/// chat renders natively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatAssignment {
    /// Host-assigned chat identifier (primary key).
    pub gemini_id: ChatId,
    /// Cached copy of the host's chat title, refreshed by the observer.
    pub title: String,
    /// Folder the chat is shown in.
    pub folder_id: FolderId,
}

/// The entire persisted unit. Never partially written.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderState {
    pub folders: HashMap<FolderId, Folder>,
    pub chats: HashMap<ChatId, ChatAssignment>,
}

impl FolderState {
    /// Folders directly under `parent_id`, sorted by their `order` rank.
    /// Ties keep map iteration order.
    pub fn sorted_children(&self, parent_id: Option<&str>) -> Vec<&Folder> {
        let mut children: Vec<&Folder> = self
            .folders
            .values()
            .filter(|f| f.parent_id.as_deref() == parent_id)
            .collect();
        children.sort_by_key(|f| f.order);
        children
    }

    /// Chats assigned to the given folder.
    pub fn chats_in_folder(&self, folder_id: &str) -> Vec<&ChatAssignment> {
        self.chats
            .values()
            .filter(|c| c.folder_id == folder_id)
            .collect()
    }

    /// The tracked-set: ids of every chat with an active assignment.
    pub fn tracked_ids(&self) -> HashSet<ChatId> {
        self.chats.keys().cloned().collect()
    }

    /// Whether a folder is `id` itself or sits anywhere beneath it.
    ///
    /// Used to reject reparenting a folder under its own descendant.
    /// Walks at most `folders.len()` hops so a pre-existing cycle in
    /// stored data cannot loop forever.
    pub fn is_self_or_descendant(&self, candidate: &str, id: &str) -> bool {
        if candidate == id {
            return true;
        }
        let mut current = self.folders.get(candidate).and_then(|f| f.parent_id.as_deref());
        for _ in 0..self.folders.len() {
            match current {
                Some(ancestor) if ancestor == id => return true,
                Some(ancestor) => {
                    current = self.folders.get(ancestor).and_then(|f| f.parent_id.as_deref());
                }
                None => return false,
            }
        }
        false
    }
}

pub mod store;

pub use store::{FolderUpdate, StateStore};
