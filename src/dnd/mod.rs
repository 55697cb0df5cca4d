//! Drag-and-drop transfer contract between the native list and the
//! folder tree.
//!
//! The payload rides the platform drag session as JSON under
//! [`DRAG_MIME`]. Wire field names match what the drop targets already
//! parse: `{"type":"chat","chatId":…,"title":…,"origin":…}`.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::observer::HostList;
use crate::state::StateStore;

/// MIME type the payload is attached under.
pub const DRAG_MIME: &str = "application/json";

/// Title used when a dragged entry has no readable title text.
pub const UNTITLED: &str = "Untitled Chat";

/// Where a drag began. Distinguishes native-list drags from
/// within-tree drags for styling, but never changes drop semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DragOrigin {
    Native,
    Folder,
}

/// Structured payload attached to a drag operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DragPayload {
    #[serde(rename = "chat", rename_all = "camelCase")]
    Chat {
        chat_id: String,
        title: String,
        origin: DragOrigin,
    },
}

impl DragPayload {
    pub fn chat(chat_id: impl Into<String>, title: impl Into<String>, origin: DragOrigin) -> Self {
        Self::Chat {
            chat_id: chat_id.into(),
            title: title.into(),
            origin,
        }
    }

    /// Payload for dragging an entry out of the host's native list,
    /// reading the title off the entry itself.
    pub fn for_native_entry(host: &dyn HostList, chat_id: &str) -> Self {
        let title = host.title_of(chat_id).unwrap_or_else(|| UNTITLED.to_string());
        Self::chat(chat_id, title, DragOrigin::Native)
    }

    /// Serialize for attachment under [`DRAG_MIME`].
    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self).context("Failed to serialize drag payload")
    }

    /// Parse transfer data. Malformed or non-chat payloads come back as
    /// None; drops of foreign data are somebody else's business.
    pub fn parse(raw: &str) -> Option<Self> {
        match serde_json::from_str(raw) {
            Ok(payload) => Some(payload),
            Err(err) => {
                warn!(%err, "ignoring malformed drag payload");
                None
            }
        }
    }
}

/// Apply a drop onto a folder row. Any chat-typed payload assigns the
/// chat to `target_folder_id`, overwriting a prior assignment; anything
/// unparsable is a logged no-op.
pub fn handle_drop(store: &mut StateStore, raw: &str, target_folder_id: &str) -> Result<()> {
    let Some(DragPayload::Chat { chat_id, title, .. }) = DragPayload::parse(raw) else {
        return Ok(());
    };
    store.assign_chat(chat_id, title, target_folder_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryBackend;

    #[test]
    fn wire_format_matches_the_drop_targets() {
        let payload = DragPayload::chat("abc123", "Trip planning", DragOrigin::Native);
        assert_eq!(
            payload.encode().unwrap(),
            r#"{"type":"chat","chatId":"abc123","title":"Trip planning","origin":"native"}"#
        );

        let folder_drag = DragPayload::chat("abc123", "Trip planning", DragOrigin::Folder);
        assert!(folder_drag.encode().unwrap().contains(r#""origin":"folder""#));
    }

    #[test]
    fn parse_round_trips_both_origins() {
        for origin in [DragOrigin::Native, DragOrigin::Folder] {
            let payload = DragPayload::chat("abc123", "Notes", origin);
            let parsed = DragPayload::parse(&payload.encode().unwrap()).unwrap();
            assert_eq!(parsed, payload);
        }
    }

    #[test]
    fn garbage_and_foreign_payloads_parse_to_none() {
        assert!(DragPayload::parse("not json").is_none());
        assert!(DragPayload::parse("{}").is_none());
        assert!(DragPayload::parse(r#"{"type":"bookmark","url":"x"}"#).is_none());
        assert!(DragPayload::parse(r#"{"type":"chat","chatId":"a"}"#).is_none());
    }

    #[test]
    fn drop_assigns_regardless_of_origin() {
        let mut store = StateStore::new(Box::new(MemoryBackend::new()), "gemfold_data_default");
        let f1 = store.create_folder("F1", None).unwrap();
        let f2 = store.create_folder("F2", None).unwrap();

        let from_native = DragPayload::chat("abc123", "Notes", DragOrigin::Native)
            .encode()
            .unwrap();
        handle_drop(&mut store, &from_native, &f1.id).unwrap();
        assert_eq!(store.load().unwrap().chats.get("abc123").unwrap().folder_id, f1.id);

        // Dragging between folders overwrites the assignment.
        let from_folder = DragPayload::chat("abc123", "Notes", DragOrigin::Folder)
            .encode()
            .unwrap();
        handle_drop(&mut store, &from_folder, &f2.id).unwrap();
        let state = store.load().unwrap();
        assert_eq!(state.chats.len(), 1);
        assert_eq!(state.chats.get("abc123").unwrap().folder_id, f2.id);
    }

    #[test]
    fn malformed_drop_is_a_noop() {
        let mut store = StateStore::new(Box::new(MemoryBackend::new()), "gemfold_data_default");
        let f = store.create_folder("F", None).unwrap();

        handle_drop(&mut store, "\u{1f4c1} definitely not json", &f.id).unwrap();
        assert!(store.load().unwrap().chats.is_empty());
    }

    #[test]
    fn native_entry_payload_falls_back_to_untitled() {
        struct BareHost;
        impl HostList for BareHost {
            fn chat_ids(&self) -> Vec<String> {
                vec!["abc123".into()]
            }
            fn title_of(&self, _chat_id: &str) -> Option<String> {
                None
            }
            fn set_hidden(&mut self, _chat_id: &str, _hidden: bool) {}
            fn set_draggable(&mut self, _chat_id: &str, _draggable: bool) {}
            fn ensure_quick_move(&mut self, _chat_id: &str) {}
        }

        let payload = DragPayload::for_native_entry(&BareHost, "abc123");
        assert_eq!(
            payload,
            DragPayload::chat("abc123", UNTITLED, DragOrigin::Native)
        );
    }
}
