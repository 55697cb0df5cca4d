//! gemfold library crate.
//!
//! Reconciliation core for overlaying a folder hierarchy onto the
//! Gemini chat list:
//! - Folder/chat-assignment state store with whole-state persistence
//! - Cross-context change propagation between open tabs
//! - Host-list observation, classification, and title debouncing
//! - Drag-and-drop transfer payload contract
//!
//! Rendering the folder tree, context menus, and the actual DOM hooks
//! live in the host integration layer; everything here is driveable
//! with synthetic events.

pub mod config;
pub mod dnd;
pub mod identity;
pub mod observer;
pub mod state;
pub mod storage;
pub mod sync;
