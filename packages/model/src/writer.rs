//! # Writer
//!
//! The only way to change the document. A writer exists only for the
//! duration of a change block (see [`Model::change`](crate::Model::change))
//! and turns every call into one or more operations, applied immediately
//! and recorded in the block's batch.
//!
//! ## Design
//!
//! - Structural calls take ranges and positions, never node references
//! - Removal and unwrapping move content into the graveyard, so undo can
//!   bring back the same elements
//! - Non-flat ranges are cut into minimal flat ranges first
//! - Markers not managed by operations are changed directly; they still
//!   show up in the differ

use crate::batch::{Batch, BatchKind};
use crate::document::Document;
use crate::error::{ModelError, ModelResult};
use crate::fragment::{DocumentFragment, FRAGMENT_ROOT_NAME};
use crate::node::{Attributes, Element, Node, Text};
use crate::operation::{
    graveyard_start, AttributeOperation, InsertOperation, MarkerOperation, MergeOperation, MoveOperation, Operation,
    RenameOperation, SplitOperation,
};
use crate::position::Position;
use crate::range::Range;
use crate::schema::Schema;
use serde_json::Value;
use std::collections::VecDeque;
use tracing::{debug, trace};

/// A change queued with [`Writer::enqueue_change`]
pub(crate) type QueuedChange = (BatchKind, Box<dyn FnOnce(&mut Writer<'_>) -> ModelResult<()>>);

pub struct Writer<'a> {
    pub(crate) document: &'a mut Document,
    pub(crate) schema: &'a Schema,
    pub(crate) batch: &'a mut Batch,
    pub(crate) queue: &'a mut VecDeque<QueuedChange>,
}

impl<'a> Writer<'a> {
    pub fn document(&self) -> &Document {
        self.document
    }

    pub fn schema(&self) -> &Schema {
        self.schema
    }

    pub fn batch(&self) -> &Batch {
        self.batch
    }

    /// Run `f` as part of the current block and batch
    pub fn change<R>(&mut self, f: impl FnOnce(&mut Writer<'_>) -> R) -> R {
        f(self)
    }

    /// Run `f` with its own batch once the current callback returns, still
    /// inside the outermost block
    pub fn enqueue_change(
        &mut self,
        kind: BatchKind,
        f: impl FnOnce(&mut Writer<'_>) -> ModelResult<()> + 'static,
    ) {
        self.queue.push_back((kind, Box::new(f)));
    }

    /// Apply an operation built elsewhere, e.g. by undo or a remote client
    pub fn apply_operation(&mut self, op: Operation) -> ModelResult<()> {
        let applied = self.document.apply_operation(op)?;
        trace!(op = applied.type_name(), batch = self.batch.id().0, "Recorded operation");
        self.batch.add_operation(applied);
        Ok(())
    }

    fn check_in_document(&self, position: &Position) -> ModelResult<()> {
        if position.root_name() == FRAGMENT_ROOT_NAME {
            return Err(ModelError::invalid_operation("Writer cannot change detached fragments"));
        }
        position.validate(&*self.document)
    }

    pub fn insert(&mut self, nodes: Vec<Node>, position: &Position) -> ModelResult<()> {
        self.check_in_document(position)?;
        if nodes.is_empty() {
            return Ok(());
        }
        self.apply_operation(Operation::Insert(InsertOperation::new(position.clone(), nodes)))
    }

    pub fn insert_text(&mut self, data: &str, attributes: Attributes, position: &Position) -> ModelResult<()> {
        if data.is_empty() {
            return Ok(());
        }
        self.insert(vec![Node::Text(Text::new(data).with_attributes(attributes))], position)
    }

    /// Insert an element and return the position right before it
    pub fn insert_element(&mut self, name: &str, attributes: Attributes, position: &Position) -> ModelResult<Position> {
        let element = Element::new(name).with_attributes(attributes);
        self.insert(vec![Node::Element(element)], position)?;
        Ok(position.clone())
    }

    /// Insert at the end of the element at `parent_path`
    pub fn append(&mut self, node: impl Into<Node>, root: &str, parent_path: &[usize]) -> ModelResult<()> {
        let position = Position::at_end(&*self.document, root, parent_path)?;
        self.insert(vec![node.into()], &position)
    }

    /// Insert a fragment's content and re-create its markers around it
    pub fn insert_fragment(&mut self, fragment: DocumentFragment, position: &Position) -> ModelResult<Range> {
        self.check_in_document(position)?;
        let (nodes, markers) = fragment.into_parts();
        let length = nodes.iter().map(Node::offset_size).sum();
        self.insert(nodes, position)?;
        for (name, range) in markers {
            let range = Range::new(
                rebase_fragment_position(range.start(), position)?,
                rebase_fragment_position(range.end(), position)?,
            )?;
            if self.document.markers().has(&name) {
                self.update_marker(&name, Some(range), None)?;
            } else {
                self.add_marker(&name, range, true, false)?;
            }
        }
        Ok(Range::from_position_and_shift(position, length))
    }

    pub fn remove(&mut self, range: &Range) -> ModelResult<()> {
        self.check_in_document(range.start())?;
        let flat_ranges = range.get_minimal_flat_ranges(&*self.document)?;
        // From the end so earlier ranges stay valid
        for flat in flat_ranges.iter().rev() {
            if flat.is_collapsed() {
                continue;
            }
            self.apply_operation(Operation::Move(MoveOperation::remove(flat.start().clone(), flat.flat_len())))?;
        }
        Ok(())
    }

    /// Move a flat range to `target`
    pub fn r#move(&mut self, range: &Range, target: &Position) -> ModelResult<()> {
        if !range.is_flat() {
            return Err(ModelError::RangeNotFlat);
        }
        self.check_in_document(range.start())?;
        self.check_in_document(target)?;
        if range.is_collapsed() {
            return Ok(());
        }
        self.apply_operation(Operation::Move(MoveOperation::new(
            range.start().clone(),
            range.flat_len(),
            target.clone(),
        )))
    }

    pub fn rename(&mut self, root: &str, path: &[usize], new_name: &str) -> ModelResult<()> {
        let position = Position::before(&*self.document, root, path)?;
        let old_name = self
            .document
            .element_at(root, path)
            .ok_or_else(|| ModelError::invalid_operation("Only elements can be renamed"))?
            .name()
            .to_string();
        if old_name == new_name {
            return Ok(());
        }
        self.apply_operation(Operation::Rename(RenameOperation::new(position, old_name, new_name)))
    }

    /// Set `key` on every node in `range`; one operation per run of nodes
    /// that share the old value
    pub fn set_attribute(&mut self, key: &str, value: Value, range: &Range) -> ModelResult<()> {
        self.change_attribute(key, Some(value), range)
    }

    pub fn remove_attribute(&mut self, key: &str, range: &Range) -> ModelResult<()> {
        self.change_attribute(key, None, range)
    }

    /// Set several attributes on every node in `range`
    pub fn set_attributes(&mut self, attributes: &Attributes, range: &Range) -> ModelResult<()> {
        for (key, value) in attributes {
            self.set_attribute(key, value.clone(), range)?;
        }
        Ok(())
    }

    fn change_attribute(&mut self, key: &str, value: Option<Value>, range: &Range) -> ModelResult<()> {
        self.check_in_document(range.start())?;
        let mut operations = Vec::new();
        for flat in range.get_minimal_flat_ranges(&*self.document)? {
            let parent = flat.start().parent(&*self.document)?;
            for (start, end, old_value) in attribute_runs(parent, flat.start().offset(), flat.end().offset(), key) {
                if old_value == value {
                    continue;
                }
                let run = Range::new(flat.start().with_offset(start), flat.start().with_offset(end))?;
                operations.push(Operation::Attribute(AttributeOperation::new(run, key, old_value, value.clone())));
            }
        }
        for op in operations {
            self.apply_operation(op)?;
        }
        Ok(())
    }

    /// Split the parent of `position`; returns the position between the two
    /// halves
    pub fn split(&mut self, position: &Position) -> ModelResult<Position> {
        self.check_in_document(position)?;
        let parent = position.parent(&*self.document)?;
        let how_many = parent.max_offset().saturating_sub(position.offset());
        let op = SplitOperation::new(position.clone(), how_many, None);
        let between = op.insertion_position.clone();
        self.apply_operation(Operation::Split(op))?;
        Ok(between)
    }

    /// Merge the elements on both sides of `position`
    pub fn merge(&mut self, position: &Position) -> ModelResult<()> {
        self.check_in_document(position)?;
        let before = position
            .node_before(&*self.document)?
            .and_then(Node::as_element)
            .ok_or_else(|| ModelError::invalid_operation("Node before merge position must be an element"))?;
        let after = position
            .node_after(&*self.document)?
            .and_then(Node::as_element)
            .ok_or_else(|| ModelError::invalid_operation("Node after merge position must be an element"))?;

        let target_path = position.shifted_by(-1);
        let target = target_path.child(before.max_offset());
        let source = position.child(0);
        let how_many = after.max_offset();
        debug!(position = %position, how_many, "Merging elements");
        self.apply_operation(Operation::Merge(MergeOperation::new(source, how_many, target, graveyard_start())))
    }

    /// Put the content of a flat range into a new element
    pub fn wrap(&mut self, range: &Range, element: Element) -> ModelResult<()> {
        if !range.is_flat() {
            return Err(ModelError::RangeNotFlat);
        }
        if !element.is_empty() {
            return Err(ModelError::invalid_operation("Element to wrap with must be empty"));
        }
        let insert_at = range.end().clone();
        self.insert(vec![Node::Element(element)], &insert_at)?;
        if range.is_collapsed() {
            return Ok(());
        }
        self.apply_operation(Operation::Move(MoveOperation::new(
            range.start().clone(),
            range.flat_len(),
            insert_at.child(0),
        )))
    }

    /// Replace the element at `path` with its content
    pub fn unwrap(&mut self, root: &str, path: &[usize]) -> ModelResult<()> {
        let before = Position::before(&*self.document, root, path)?;
        let how_many = self
            .document
            .element_at(root, path)
            .ok_or_else(|| ModelError::invalid_operation("Only elements can be unwrapped"))?
            .max_offset();
        if how_many > 0 {
            self.apply_operation(Operation::Move(MoveOperation::new(before.child(0), how_many, before.clone())))?;
        }
        let element_position = before.shifted_by(how_many as isize);
        self.apply_operation(Operation::Move(MoveOperation::remove(element_position, 1)))
    }

    pub fn add_marker(
        &mut self,
        name: &str,
        range: Range,
        using_operation: bool,
        affects_data: bool,
    ) -> ModelResult<()> {
        if self.document.markers().has(name) {
            return Err(ModelError::MarkerExists(name.to_string()));
        }
        if using_operation {
            self.apply_operation(Operation::Marker(MarkerOperation::new(name, None, Some(range), affects_data)))
        } else {
            self.document.set_marker_directly(name, Some(range), affects_data);
            Ok(())
        }
    }

    /// Move a marker to `range` and/or change whether it affects data
    pub fn update_marker(&mut self, name: &str, range: Option<Range>, affects_data: Option<bool>) -> ModelResult<()> {
        let marker = self
            .document
            .markers()
            .get(name)
            .ok_or_else(|| ModelError::MarkerNotFound(name.to_string()))?;
        let old_range = marker.range().clone();
        let new_range = range.unwrap_or_else(|| old_range.clone());
        let affects_data = affects_data.unwrap_or(marker.affects_data());
        if marker.managed_using_operations() {
            self.apply_operation(Operation::Marker(MarkerOperation::new(
                name,
                Some(old_range),
                Some(new_range),
                affects_data,
            )))
        } else {
            self.document.set_marker_directly(name, Some(new_range), affects_data);
            Ok(())
        }
    }

    pub fn remove_marker(&mut self, name: &str) -> ModelResult<()> {
        let marker = self
            .document
            .markers()
            .get(name)
            .ok_or_else(|| ModelError::MarkerNotFound(name.to_string()))?;
        let old_range = marker.range().clone();
        let affects_data = marker.affects_data();
        if marker.managed_using_operations() {
            self.apply_operation(Operation::Marker(MarkerOperation::new(name, Some(old_range), None, affects_data)))
        } else {
            self.document.set_marker_directly(name, None, affects_data);
            Ok(())
        }
    }

    pub fn set_selection(&mut self, ranges: Vec<Range>, backward: bool) -> ModelResult<()> {
        for range in &ranges {
            range.end().validate(&*self.document)?;
            range.start().validate(&*self.document)?;
        }
        self.document.set_selection(ranges, backward);
        Ok(())
    }

    pub fn set_selection_at(&mut self, position: Position) -> ModelResult<()> {
        self.set_selection(vec![Range::collapsed(position)], false)
    }

    pub fn set_selection_attribute(&mut self, key: &str, value: Value) {
        self.document.selection_mut().set_attribute(key, value);
    }

    pub fn remove_selection_attribute(&mut self, key: &str) {
        self.document.selection_mut().remove_attribute(key);
    }
}

/// Runs of nodes in `[start, end)` of `parent` sharing the same value of
/// `key`, as `(start, end, value)`
fn attribute_runs(parent: &Element, start: usize, end: usize, key: &str) -> Vec<(usize, usize, Option<Value>)> {
    let mut runs: Vec<(usize, usize, Option<Value>)> = Vec::new();
    let mut offset = 0;
    for child in parent.children() {
        let child_start = offset;
        let child_end = offset + child.offset_size();
        offset = child_end;
        let from = child_start.max(start);
        let to = child_end.min(end);
        if from >= to {
            continue;
        }
        let value = child.get_attribute(key).cloned();
        match runs.last_mut() {
            Some(last) if last.1 == from && last.2 == value => last.1 = to,
            _ => runs.push((from, to, value)),
        }
    }
    runs
}

/// Map a position rooted in a fragment onto the place the fragment's
/// content was inserted
fn rebase_fragment_position(position: &Position, insertion: &Position) -> ModelResult<Position> {
    let mut path = insertion.parent_path().to_vec();
    let mut rest = position.path().iter().copied();
    if let Some(first) = rest.next() {
        path.push(insertion.offset() + first);
    }
    path.extend(rest);
    Position::new(insertion.root_name(), path)
}
