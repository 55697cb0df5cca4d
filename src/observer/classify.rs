//! Classification of raw host mutations into chat events.
//!
//! The host markup carries no guaranteed vocabulary, so detection is
//! split from reconciliation: callers describe what the host did in
//! shape-agnostic records, and `classify` decides whether a chat entry
//! is involved. Anything unrecognized is `Irrelevant`, never an error.

use std::sync::OnceLock;

use regex::Regex;

use crate::state::ChatId;

/// One observed mutation of the host chat list, stripped down to the
/// fields the reconciler cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationRecord {
    /// An element with a conversation link appeared (fresh render, SPA
    /// navigation, or virtual-list recycling).
    NodeAdded { href: String },
    /// A conversation element left the DOM.
    NodeRemoved { href: String },
    /// Text content changed inside a conversation element's title region.
    TextChanged { href: String, text: String },
    /// Everything else the host does to its own DOM.
    Other,
}

/// What a mutation means for the reconciliation state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    /// A chat entry needs (re)classification against the tracked-set.
    Discovered { chat_id: ChatId },
    /// A chat's displayed title changed.
    TitleChanged { chat_id: ChatId, title: String },
    /// A chat entry disappeared; it may be recycled back in later.
    Removed { chat_id: ChatId },
    /// No chat entry involved.
    Irrelevant,
}

/// Map a raw mutation to a chat event. Whitespace-only titles are
/// dropped here so a half-rendered rename never reaches the store.
pub fn classify(record: &MutationRecord) -> ChatEvent {
    match record {
        MutationRecord::NodeAdded { href } => match extract_chat_id(href) {
            Some(chat_id) => ChatEvent::Discovered { chat_id },
            None => ChatEvent::Irrelevant,
        },
        MutationRecord::NodeRemoved { href } => match extract_chat_id(href) {
            Some(chat_id) => ChatEvent::Removed { chat_id },
            None => ChatEvent::Irrelevant,
        },
        MutationRecord::TextChanged { href, text } => {
            let title = text.trim();
            match extract_chat_id(href) {
                Some(chat_id) if !title.is_empty() => ChatEvent::TitleChanged {
                    chat_id,
                    title: title.to_string(),
                },
                _ => ChatEvent::Irrelevant,
            }
        }
        MutationRecord::Other => ChatEvent::Irrelevant,
    }
}

/// Pull the conversation id out of an `/app/<id>` href.
pub fn extract_chat_id(href: &str) -> Option<ChatId> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"/app/([a-zA-Z0-9]+)").expect("hardcoded pattern is valid"));
    re.captures(href).map(|c| c[1].to_string())
}
