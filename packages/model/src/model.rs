//! # Model
//!
//! Owns the document and the schema and hands out [`Writer`]s inside change
//! blocks.
//!
//! ## Design
//!
//! - A block runs its callback, then every change queued during it, then
//!   the post-fixers until none of them changes anything, then the
//!   selection post-fixer
//! - The outermost block produces exactly one [`ChangeSet`] and resets the
//!   differ; callers collect them with [`Model::take_change_sets`]
//! - Operations applied before a callback fails stay applied; the block is
//!   still closed so the change set matches the document
//!
//! ## Example
//!
//! ```rust,ignore
//! let mut model = Model::new();
//! model.change(|writer| {
//!     let start = Position::at_start("main", &[]);
//!     writer.insert_element("paragraph", Attributes::new(), &start)?;
//!     writer.insert_text("foo", Attributes::new(), &start.child(0))
//! })??;
//! let changes = model.take_change_sets();
//! ```

use crate::batch::{Batch, BatchKind};
use crate::differ::{DiffItem, MarkerDiff};
use crate::document::Document;
use crate::error::ModelResult;
use crate::range::Range;
use crate::schema::Schema;
use crate::selection::fix_selection;
use crate::writer::{QueuedChange, Writer};
use std::collections::VecDeque;
use tracing::{debug, instrument, warn};

/// Post-fixer rounds after which the block gives up
const MAX_POST_FIXER_ROUNDS: usize = 100;

/// Returns `true` when it changed the document
pub type PostFixer = Box<dyn FnMut(&mut Writer<'_>) -> ModelResult<bool>>;

/// Everything one outermost change block did
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    pub changes: Vec<DiffItem>,
    pub marker_changes: Vec<MarkerDiff>,
    pub markers_to_remove: Vec<(String, Range)>,
    pub markers_to_add: Vec<(String, Range)>,
    pub batches: Vec<Batch>,
    pub has_data_changes: bool,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty() && self.marker_changes.is_empty()
    }
}

pub struct Model {
    document: Document,
    schema: Schema,
    post_fixers: Vec<PostFixer>,
    queue: VecDeque<QueuedChange>,
    change_sets: Vec<ChangeSet>,
}

impl Default for Model {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Model")
            .field("document", &self.document)
            .field("post_fixers", &self.post_fixers.len())
            .finish()
    }
}

impl Model {
    /// A model with a `main` root and the built-in schema items
    pub fn new() -> Self {
        Self::with_document(Document::with_main_root(), Schema::new())
    }

    pub fn with_document(document: Document, schema: Schema) -> Self {
        Self {
            document,
            schema,
            post_fixers: Vec::new(),
            queue: VecDeque::new(),
            change_sets: Vec::new(),
        }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn schema_mut(&mut self) -> &mut Schema {
        &mut self.schema
    }

    /// Add a root outside of any change block
    pub fn create_root(&mut self, element_name: &str, root_name: &str) -> ModelResult<()> {
        self.document.create_root(element_name, root_name).map(|_| ())
    }

    pub fn register_post_fixer(&mut self, post_fixer: impl FnMut(&mut Writer<'_>) -> ModelResult<bool> + 'static) {
        self.post_fixers.push(Box::new(post_fixer));
    }

    /// Record that the operation at version `undoing` reverted the one at
    /// `undone`
    pub fn set_operation_as_undone(&mut self, undone: u64, undoing: u64) {
        self.document.history_mut().set_operation_as_undone(undone, undoing);
    }

    pub fn change<R>(&mut self, f: impl FnOnce(&mut Writer<'_>) -> R) -> ModelResult<R> {
        self.change_with(BatchKind::Default, f)
    }

    /// A change block whose operations go into a batch of `kind`
    #[instrument(skip(self, f))]
    pub fn change_with<R>(&mut self, kind: BatchKind, f: impl FnOnce(&mut Writer<'_>) -> R) -> ModelResult<R> {
        let mut batches = Vec::new();
        let mut batch = Batch::new(kind);
        let result = {
            let mut writer = Writer {
                document: &mut self.document,
                schema: &self.schema,
                batch: &mut batch,
                queue: &mut self.queue,
            };
            f(&mut writer)
        };
        batches.push(batch);
        let finished = self.finish_block(batches);
        finished.map(|()| result)
    }

    /// Queue a change; with no block running it runs right away
    pub fn enqueue_change(
        &mut self,
        kind: BatchKind,
        f: impl FnOnce(&mut Writer<'_>) -> ModelResult<()> + 'static,
    ) -> ModelResult<()> {
        self.queue.push_back((kind, Box::new(f)));
        self.finish_block(Vec::new())
    }

    /// Change sets produced since the last call, oldest first
    pub fn take_change_sets(&mut self) -> Vec<ChangeSet> {
        std::mem::take(&mut self.change_sets)
    }

    fn finish_block(&mut self, mut batches: Vec<Batch>) -> ModelResult<()> {
        let mut first_error = None;

        while let Some((kind, change)) = self.queue.pop_front() {
            let mut batch = Batch::new(kind);
            let mut writer = Writer {
                document: &mut self.document,
                schema: &self.schema,
                batch: &mut batch,
                queue: &mut self.queue,
            };
            if let Err(error) = change(&mut writer) {
                warn!(%error, "Queued change failed");
                first_error.get_or_insert(error);
            }
            batches.push(batch);
        }

        if first_error.is_none() {
            if let Err(error) = self.run_post_fixers(&mut batches) {
                first_error = Some(error);
            }
        }
        self.fix_selection();

        let roots = self.document.roots();
        let differ = self.document.differ();
        let change_set = ChangeSet {
            changes: differ.get_changes(roots, false),
            marker_changes: differ.get_marker_changes(),
            markers_to_remove: differ.get_markers_to_remove(),
            markers_to_add: differ.get_markers_to_add(),
            has_data_changes: differ.has_data_changes(roots),
            batches: batches.into_iter().filter(|batch| !batch.is_empty()).collect(),
        };
        debug!(
            changes = change_set.changes.len(),
            markers = change_set.marker_changes.len(),
            version = self.document.version(),
            "Change block finished"
        );
        self.document.differ_mut().reset();
        self.change_sets.push(change_set);

        match first_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn run_post_fixers(&mut self, batches: &mut Vec<Batch>) -> ModelResult<()> {
        if self.post_fixers.is_empty() {
            return Ok(());
        }
        if batches.is_empty() {
            batches.push(Batch::new(BatchKind::Default));
        }
        let Some(batch) = batches.last_mut() else {
            return Ok(());
        };
        for round in 0..MAX_POST_FIXER_ROUNDS {
            let mut changed = false;
            for post_fixer in &mut self.post_fixers {
                let mut writer = Writer {
                    document: &mut self.document,
                    schema: &self.schema,
                    batch: &mut *batch,
                    queue: &mut self.queue,
                };
                changed |= post_fixer(&mut writer)?;
            }
            if !changed {
                return Ok(());
            }
            debug!(round, "Post-fixers changed the document, running again");
        }
        warn!(rounds = MAX_POST_FIXER_ROUNDS, "Post-fixers did not settle");
        Ok(())
    }

    fn fix_selection(&mut self) {
        if let Some(ranges) = fix_selection(self.document.selection(), self.document.roots(), &self.schema) {
            debug!(ranges = ranges.len(), "Fixed selection");
            let backward = self.document.selection().is_backward();
            self.document.set_selection(ranges, backward);
        } else {
            self.document.refresh_selection_attributes();
        }
    }
}
