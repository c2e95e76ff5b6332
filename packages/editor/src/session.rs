//! # Collaboration Session
//!
//! Keeps one client's document in step with concurrent edits from others.
//!
//! ## Design
//!
//! - Local operations stay pending until the server acknowledges them
//! - Remote operations are transformed over the pending ones before they
//!   are applied, and the pending ones over the remote ones, so both sides
//!   end up applying the same changes in a different order
//! - Ties between equal positions go to the client with the lower id
//! - Remote changes are applied in `Remote` batches, which undo never records
//!
//! ```rust,ignore
//! let mut session = CollaborationSession::new(1);
//! session.record_local(change_set.batches.iter());
//! send(session.pending());
//!
//! session.receive_remote(&mut model, remote_ops, 2)?;
//! session.acknowledge(acked);
//! ```

use folio_model::{transform_sets, Batch, BatchKind, Model, ModelResult, Operation};
use tracing::{debug, instrument};

#[derive(Debug, Clone)]
pub struct CollaborationSession {
    client_id: u32,

    /// Applied locally, not acknowledged yet
    pending: Vec<Operation>,
}

impl CollaborationSession {
    pub fn new(client_id: u32) -> Self {
        Self {
            client_id,
            pending: Vec::new(),
        }
    }

    pub fn client_id(&self) -> u32 {
        self.client_id
    }

    pub fn pending(&self) -> &[Operation] {
        &self.pending
    }

    /// Remember the operations of local batches; remote batches are skipped
    pub fn record_local<'b>(&mut self, batches: impl IntoIterator<Item = &'b Batch>) {
        for batch in batches {
            if batch.kind() == BatchKind::Remote {
                continue;
            }
            self.pending.extend(batch.operations().iter().cloned());
        }
    }

    /// Drop the `count` oldest pending operations once the server has them
    pub fn acknowledge(&mut self, count: usize) {
        let count = count.min(self.pending.len());
        self.pending.drain(..count);
        debug!(count, remaining = self.pending.len(), "Acknowledged operations");
    }

    /// Apply operations another client made without seeing the pending ones
    ///
    /// Returns how many operations were applied after transformation.
    #[instrument(skip(self, model, operations), fields(client = self.client_id, remote = operations.len()))]
    pub fn receive_remote(
        &mut self,
        model: &mut Model,
        operations: Vec<Operation>,
        remote_client_id: u32,
    ) -> ModelResult<usize> {
        let remote_is_strong = remote_client_id < self.client_id;
        let transformed = transform_sets(&operations, &self.pending, remote_is_strong);
        self.pending = transformed.operations_b;

        let count = transformed.operations_a.len();
        model.change_with(BatchKind::Remote, |writer| -> ModelResult<()> {
            for op in transformed.operations_a {
                let version = writer.document().version();
                writer.apply_operation(op.with_base_version(version))?;
            }
            Ok(())
        })??;
        debug!(applied = count, pending = self.pending.len(), "Applied remote operations");
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_model::{Attributes, Element, Node, Position};
    use pretty_assertions::assert_eq;

    fn local_ops(model: &mut Model, session: &mut CollaborationSession) {
        let change_sets = model.take_change_sets();
        session.record_local(change_sets.iter().flat_map(|set| set.batches.iter()));
    }

    fn main_children(model: &Model) -> Vec<Node> {
        model
            .document()
            .get_root("main")
            .expect("Expected the main root")
            .children()
            .to_vec()
    }

    /// Two clients with the same paragraph
    fn setup() -> (Model, CollaborationSession, Model, CollaborationSession) {
        let mut a = Model::new();
        let mut session_a = CollaborationSession::new(1);
        a.change(|writer| {
            writer.insert(
                vec![Element::new("paragraph").with_text("abc").into()],
                &Position::at("main", &[], 0),
            )
        })
        .expect("Failed to change")
        .expect("Failed to insert");
        local_ops(&mut a, &mut session_a);

        let mut b = Model::new();
        let mut session_b = CollaborationSession::new(2);
        session_b
            .receive_remote(&mut b, session_a.pending().to_vec(), 1)
            .expect("Failed to receive");
        b.take_change_sets();
        session_a.acknowledge(session_a.pending().len());

        assert_eq!(main_children(&a), main_children(&b));
        (a, session_a, b, session_b)
    }

    #[test]
    fn test_remote_batches_are_not_pending() {
        let (_, session_a, _, session_b) = setup();
        assert!(session_a.pending().is_empty());
        assert!(session_b.pending().is_empty());
    }

    #[test]
    fn test_concurrent_inserts_converge() {
        let (mut a, mut session_a, mut b, mut session_b) = setup();

        a.change(|writer| writer.insert_text("X", Attributes::new(), &Position::at("main", &[0], 1)))
            .expect("Failed to change")
            .expect("Failed to insert text");
        local_ops(&mut a, &mut session_a);

        b.change(|writer| writer.insert_text("Y", Attributes::new(), &Position::at("main", &[0], 1)))
            .expect("Failed to change")
            .expect("Failed to insert text");
        local_ops(&mut b, &mut session_b);

        let from_a = session_a.pending().to_vec();
        let from_b = session_b.pending().to_vec();
        session_a.receive_remote(&mut a, from_b, 2).expect("Failed to receive");
        session_b.receive_remote(&mut b, from_a, 1).expect("Failed to receive");

        assert_eq!(main_children(&a), main_children(&b));
        // Client 1 wins the tie, so its text comes first
        let paragraph = a.document().element_at("main", &[0]).expect("Expected the paragraph");
        assert_eq!(paragraph.text_content(), "aXYbc");
    }

    #[test]
    fn test_concurrent_remove_and_insert_converge() {
        let (mut a, mut session_a, mut b, mut session_b) = setup();

        a.change(|writer| {
            let range = folio_model::Range::new(Position::at("main", &[0], 0), Position::at("main", &[0], 2))?;
            writer.remove(&range)
        })
        .expect("Failed to change")
        .expect("Failed to remove");
        local_ops(&mut a, &mut session_a);

        b.change(|writer| writer.insert_text("Z", Attributes::new(), &Position::at("main", &[0], 3)))
            .expect("Failed to change")
            .expect("Failed to insert text");
        local_ops(&mut b, &mut session_b);

        let from_a = session_a.pending().to_vec();
        let from_b = session_b.pending().to_vec();
        session_b.receive_remote(&mut b, from_a, 1).expect("Failed to receive");
        session_a.receive_remote(&mut a, from_b, 2).expect("Failed to receive");

        assert_eq!(main_children(&a), main_children(&b));
        let paragraph = b.document().element_at("main", &[0]).expect("Expected the paragraph");
        assert_eq!(paragraph.text_content(), "cZ");
    }

    #[test]
    fn test_acknowledge_drains_oldest() {
        let (mut a, mut session_a, _, _) = setup();
        for offset in 0..3 {
            a.change(|writer| writer.insert_text("X", Attributes::new(), &Position::at("main", &[0], offset)))
                .expect("Failed to change")
                .expect("Failed to insert text");
            local_ops(&mut a, &mut session_a);
        }
        assert_eq!(session_a.pending().len(), 3);
        session_a.acknowledge(2);
        assert_eq!(session_a.pending().len(), 1);
        session_a.acknowledge(5);
        assert!(session_a.pending().is_empty());
    }
}
