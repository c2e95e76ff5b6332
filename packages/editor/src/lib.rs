//! # Folio Editor
//!
//! The editing engine assembled from the model, view and conversion crates.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ Editor::change / undo / receive_remote      │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ model: operations, differ, markers          │
//! │  - one ChangeSet per change block           │
//! └─────────────────────────────────────────────┘
//!                     ↓ flush
//! ┌─────────────────────────────────────────────┐
//! │ UndoManager    ← undoable batches           │
//! │ Collaboration  ← local operations           │
//! │ Editing view   ← editing downcast + render  │
//! └─────────────────────────────────────────────┘
//!
//!   HTML ⇄ DataController ⇄ data downcast / upcast ⇄ model
//! ```
//!
//! ## Core Principles
//!
//! 1. **Model is source of truth**: the editing view and the data output
//!    are both derived from it
//! 2. **Operations are the only way in**: local edits, undo and remote
//!    edits all end up as operations in the document history
//! 3. **Transform, don't lock**: concurrent edits are reconciled with
//!    operational transformation, ties going to the lower client id
//!
//! ## Usage
//!
//! ### Single-user editing
//!
//! ```rust,ignore
//! use folio_editor::{Editor, EditorConfig};
//!
//! let mut editor = Editor::new(EditorConfig::default())?;
//! editor.set_data("<p>Hello</p>")?;
//! editor.change(|writer| writer.insert_text(" world", Attributes::new(), &Position::at("main", &[0], 5)))?;
//! editor.undo()?;
//! ```
//!
//! ### Collaborative editing
//!
//! ```rust,ignore
//! let outgoing = editor.session().pending().to_vec();
//! server.send(outgoing);
//!
//! editor.receive_remote(incoming, sender_client_id)?;
//! editor.session_mut().acknowledge(acked);
//! ```

pub mod config;
pub mod data;
pub mod editing;
pub mod editor;
pub mod errors;
pub mod pending_actions;
pub mod session;
pub mod undo;

pub use config::{EditorConfig, UndoConfig};
pub use data::DataController;
pub use editing::EditingController;
pub use editor::Editor;
pub use errors::{EditorError, EditorResult};
pub use pending_actions::{PendingAction, PendingActionId, PendingActions};
pub use session::CollaborationSession;
pub use undo::UndoManager;
