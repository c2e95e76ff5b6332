//! Batches group the operations of one logical change, e.g. one undo step.

use crate::operation::Operation;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_BATCH_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BatchId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BatchKind {
    #[default]
    Default,
    Undo,
    Redo,
    Remote,
    /// Never recorded for undo, e.g. changes made by post-fixers on load
    Transparent,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    id: BatchId,
    kind: BatchKind,
    operations: Vec<Operation>,
}

impl Default for Batch {
    fn default() -> Self {
        Self::new(BatchKind::Default)
    }
}

impl Batch {
    pub fn new(kind: BatchKind) -> Self {
        Self {
            id: BatchId(NEXT_BATCH_ID.fetch_add(1, Ordering::Relaxed)),
            kind,
            operations: Vec::new(),
        }
    }

    pub fn id(&self) -> BatchId {
        self.id
    }

    pub fn kind(&self) -> BatchKind {
        self.kind
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn is_undoable(&self) -> bool {
        !matches!(self.kind, BatchKind::Transparent | BatchKind::Remote)
    }

    /// Base version of the first operation
    pub fn base_version(&self) -> Option<u64> {
        self.operations.iter().find_map(Operation::base_version)
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub(crate) fn add_operation(&mut self, op: Operation) {
        self.operations.push(op);
    }
}
