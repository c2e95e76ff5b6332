//! # Undo/Redo
//!
//! Selective undo over the document history.
//!
//! ## Design
//!
//! - Every undoable batch is one step. `Transparent` and `Remote` batches
//!   are never recorded
//! - Undo reverses the step's operations last to first, then transforms
//!   the reversed list over everything applied since the step, so remote
//!   and later local changes survive
//! - The reverting batch is an `Undo` batch and lands on the redo stack;
//!   redo reverts that batch the same way
//! - New `Default` steps clear the redo stack
//!
//! ## Example
//!
//! ```rust,ignore
//! let mut undo = UndoManager::new(100);
//! model.change(|writer| writer.insert_text("foo", Attributes::new(), &position))??;
//! undo.record(model.take_change_sets().iter().flat_map(|set| set.batches.iter()));
//!
//! undo.undo(&mut model)?;
//! undo.record(model.take_change_sets().iter().flat_map(|set| set.batches.iter()));
//! ```

use folio_model::{transform_sets, Batch, BatchKind, Model, ModelResult, Operation};
use tracing::{debug, instrument, trace};

/// Undo and redo stacks of batches
#[derive(Debug, Clone)]
pub struct UndoManager {
    /// Most recent last
    undo_stack: Vec<Batch>,

    /// Most recent last
    redo_stack: Vec<Batch>,

    /// Maximum number of undo levels (0 = unlimited)
    max_levels: usize,
}

impl Default for UndoManager {
    fn default() -> Self {
        Self::new(100)
    }
}

impl UndoManager {
    pub fn new(max_levels: usize) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            max_levels,
        }
    }

    /// Record finished batches, in the order they were applied
    pub fn record<'b>(&mut self, batches: impl IntoIterator<Item = &'b Batch>) {
        for batch in batches {
            if batch.is_empty() || !batch.is_undoable() {
                continue;
            }
            match batch.kind() {
                BatchKind::Undo => self.redo_stack.push(batch.clone()),
                BatchKind::Redo => self.push_undo(batch.clone()),
                _ => {
                    self.push_undo(batch.clone());
                    self.redo_stack.clear();
                }
            }
        }
    }

    fn push_undo(&mut self, batch: Batch) {
        self.undo_stack.push(batch);
        if self.max_levels > 0 && self.undo_stack.len() > self.max_levels {
            self.undo_stack.remove(0);
        }
    }

    /// Revert the most recent step; `false` when there is nothing to undo
    ///
    /// The reverting batch still has to be fed back through [`record`](Self::record).
    pub fn undo(&mut self, model: &mut Model) -> ModelResult<bool> {
        let Some(batch) = self.undo_stack.pop() else {
            return Ok(false);
        };
        revert(model, &batch, BatchKind::Undo)?;
        Ok(true)
    }

    /// Revert the most recent undo; `false` when there is nothing to redo
    pub fn redo(&mut self, model: &mut Model) -> ModelResult<bool> {
        let Some(batch) = self.redo_stack.pop() else {
            return Ok(false);
        };
        revert(model, &batch, BatchKind::Redo)?;
        Ok(true)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_count(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_count(&self) -> usize {
        self.redo_stack.len()
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }
}

/// Operations reverting `batch`, valid right after its last operation
fn reversed_operations(batch: &Batch) -> (Vec<Operation>, u64) {
    let operations = batch.operations();
    let end_version = operations
        .iter()
        .rev()
        .find_map(Operation::base_version)
        .map_or(0, |version| version + 1);
    let reversed = operations
        .iter()
        .rev()
        .enumerate()
        .map(|(index, op)| op.get_reversed().with_base_version(end_version + index as u64))
        .collect();
    (reversed, end_version)
}

#[instrument(skip_all, fields(batch = batch.id().0, kind = ?kind))]
fn revert(model: &mut Model, batch: &Batch, kind: BatchKind) -> ModelResult<()> {
    let (reversed, end_version) = reversed_operations(batch);
    let since = model.document().history().get_operations(end_version, None).to_vec();
    let operations = if since.is_empty() {
        reversed
    } else {
        trace!(since = since.len(), "Transforming reverted operations");
        transform_sets(&reversed, &since, true).operations_a
    };
    debug!(operations = operations.len(), "Reverting batch");

    let reverted: Vec<u64> = batch.operations().iter().rev().filter_map(Operation::base_version).collect();
    let applied = model.change_with(kind, |writer| -> ModelResult<Vec<u64>> {
        let mut applied = Vec::with_capacity(operations.len());
        for op in operations {
            let version = writer.document().version();
            writer.apply_operation(op.with_base_version(version))?;
            applied.push(version);
        }
        Ok(applied)
    })??;

    // Pairs only line up when the transformation kept one operation per operation
    if applied.len() == reverted.len() {
        for (undone, undoing) in reverted.into_iter().zip(applied) {
            model.set_operation_as_undone(undone, undoing);
        }
    }
    Ok(())
}
