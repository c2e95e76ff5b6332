//! # Folio Model
//!
//! The abstract document edited through operations.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ Model::change: Writer → operations          │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ Document::apply_operation                   │
//! │  - validate and execute on the roots        │
//! │  - differ snapshots touched elements        │
//! │  - markers and selection follow the change  │
//! │  - history records the operation            │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ ChangeSet: diff entries + marker changes    │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Core Principles
//!
//! 1. **Positions are paths**: offsets from a named root, never references
//! 2. **Operations are invertible**: removal is a move into the graveyard
//! 3. **Operations transform**: any two concurrent operations converge
//! 4. **One choke point**: markers and the selection are re-targeted only
//!    in `Document::apply_operation`
//!
//! ## Usage
//!
//! ```rust,ignore
//! use folio_model::{Attributes, Model, Position};
//!
//! let mut model = Model::new();
//! model.change(|writer| {
//!     let start = Position::at_start("main", &[]);
//!     writer.insert_element("paragraph", Attributes::new(), &start)?;
//!     writer.insert_text("Hello", Attributes::new(), &start.child(0))
//! })??;
//!
//! for change_set in model.take_change_sets() {
//!     println!("{:?}", change_set.changes);
//! }
//! ```

pub mod batch;
pub mod differ;
pub mod document;
pub mod error;
pub mod fragment;
pub mod history;
pub mod markers;
pub mod model;
pub mod node;
pub mod operation;
pub mod position;
pub mod range;
pub mod schema;
pub mod selection;
pub mod treewalker;
pub mod writer;

#[cfg(test)]
mod tests_model;

pub use batch::{Batch, BatchId, BatchKind};
pub use differ::{DiffItem, Differ, MarkerDiff};
pub use document::{Document, TreeRoots, DEFAULT_ROOT_NAME, GRAVEYARD_ROOT_NAME};
pub use error::{ModelError, ModelResult, PositionError};
pub use fragment::{DocumentFragment, FRAGMENT_ROOT_NAME};
pub use history::History;
pub use markers::{transform_live_range, Marker, MarkerChange, MarkerCollection};
pub use model::{ChangeSet, Model, PostFixer};
pub use node::{Attributes, Element, Node, NodeId, Text};
pub use operation::{
    graveyard_start, transform, transform_sets, AttributeOperation, InsertOperation, MarkerOperation, MergeOperation,
    MoveOperation, NoOperation, Operation, RenameOperation, SplitOperation, TransformContext, TransformedSets,
};
pub use position::{Position, PositionRelation, Stickiness};
pub use range::Range;
pub use schema::{Schema, SchemaContext, SchemaItemDefinition, SelectionDirection};
pub use selection::{fix_selection, DocumentSelection};
pub use treewalker::{Direction, TreeWalker, TreeWalkerOptions, TreeWalkerValue, WalkerItem, WalkerValueKind};
pub use writer::Writer;
