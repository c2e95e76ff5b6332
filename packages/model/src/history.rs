//! # History
//!
//! Every operation applied to the document, in order. An operation's index
//! is its base version, so "everything applied after version N" is a slice.
//!
//! Undo records which operations reverted which, so a reverted operation is
//! not offered for undo again.

use crate::operation::Operation;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default)]
pub struct History {
    operations: Vec<Operation>,
    /// Undoing operation version -> undone operation version
    undo_pairs: BTreeMap<u64, u64>,
    undone: BTreeMap<u64, u64>,
}

impl History {
    pub(crate) fn add_operation(&mut self, op: Operation) {
        self.operations.push(op);
    }

    pub fn version(&self) -> u64 {
        self.operations.len() as u64
    }

    pub fn last_operation(&self) -> Option<&Operation> {
        self.operations.last()
    }

    pub fn get_operation(&self, base_version: u64) -> Option<&Operation> {
        self.operations.get(base_version as usize)
    }

    /// Operations with base versions in `[from, to)`
    pub fn get_operations(&self, from: u64, to: Option<u64>) -> &[Operation] {
        let len = self.operations.len();
        let from = (from as usize).min(len);
        let to = to.map_or(len, |to| (to as usize).clamp(from, len));
        &self.operations[from..to]
    }

    /// Record that `undoing` reverted `undone`
    pub fn set_operation_as_undone(&mut self, undone: u64, undoing: u64) {
        self.undo_pairs.insert(undoing, undone);
        self.undone.insert(undone, undoing);
    }

    pub fn is_undoing_operation(&self, version: u64) -> bool {
        self.undo_pairs.contains_key(&version)
    }

    pub fn is_undone_operation(&self, version: u64) -> bool {
        self.undone.contains_key(&version)
    }

    /// The operation reverted by the operation at `version`
    pub fn get_undone_operation(&self, version: u64) -> Option<&Operation> {
        self.undo_pairs
            .get(&version)
            .and_then(|undone| self.get_operation(*undone))
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history(count: u64) -> History {
        let mut history = History::default();
        for version in 0..count {
            history.add_operation(Operation::no_op(Some(version)));
        }
        history
    }

    #[test]
    fn test_operations_slice_by_version() {
        let history = history(5);
        assert_eq!(history.get_operations(2, None).len(), 3);
        assert_eq!(history.get_operations(1, Some(3)).len(), 2);
        assert_eq!(history.get_operations(7, None).len(), 0);
        assert_eq!(history.get_operation(4).and_then(Operation::base_version), Some(4));
    }

    #[test]
    fn test_undo_pairs() {
        let mut history = history(3);
        history.set_operation_as_undone(1, 2);
        assert!(history.is_undoing_operation(2));
        assert!(history.is_undone_operation(1));
        assert_eq!(history.get_undone_operation(2).and_then(Operation::base_version), Some(1));
    }
}
