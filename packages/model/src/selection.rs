//! # Document selection
//!
//! The selection of the document: a list of live ranges, a direction and
//! the attributes typed text would get. Ranges are re-targeted at the same
//! point as markers, so after any operation the selection is still valid
//! tree-wise; [`fix_selection`] then makes it valid schema-wise.

use crate::document::{TreeRoots, GRAVEYARD_ROOT_NAME};
use crate::markers::transform_live_range;
use crate::node::{Attributes, Node};
use crate::operation::Operation;
use crate::position::Position;
use crate::range::Range;
use crate::schema::{Schema, SelectionDirection};
use serde_json::Value;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentSelection {
    ranges: Vec<Range>,
    backward: bool,
    attributes: Attributes,
    /// Attributes set explicitly survive until the selection moves
    explicit_attributes: bool,
}

impl DocumentSelection {
    pub fn ranges(&self) -> &[Range] {
        &self.ranges
    }

    pub fn range_count(&self) -> usize {
        self.ranges.len()
    }

    pub fn first_range(&self) -> Option<&Range> {
        self.ranges.iter().min_by(|a, b| {
            if a.start().is_before(b.start()) {
                std::cmp::Ordering::Less
            } else {
                std::cmp::Ordering::Greater
            }
        })
    }

    pub fn last_range(&self) -> Option<&Range> {
        self.ranges.iter().max_by(|a, b| {
            if a.start().is_before(b.start()) {
                std::cmp::Ordering::Less
            } else {
                std::cmp::Ordering::Greater
            }
        })
    }

    pub fn is_backward(&self) -> bool {
        self.backward
    }

    pub fn is_collapsed(&self) -> bool {
        self.ranges.len() == 1 && self.ranges[0].is_collapsed()
    }

    /// Where the selection started
    pub fn anchor(&self) -> Option<&Position> {
        let range = self.ranges.last()?;
        Some(if self.backward { range.end() } else { range.start() })
    }

    /// Where the selection ends, the caret for collapsed selections
    pub fn focus(&self) -> Option<&Position> {
        let range = self.ranges.last()?;
        Some(if self.backward { range.start() } else { range.end() })
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn get_attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    pub fn has_attribute(&self, key: &str) -> bool {
        self.attributes.contains_key(key)
    }

    pub(crate) fn set_ranges(&mut self, ranges: Vec<Range>, backward: bool) {
        self.ranges = ranges;
        self.backward = backward && !self.ranges.is_empty();
        self.explicit_attributes = false;
    }

    pub(crate) fn set_attribute(&mut self, key: impl Into<String>, value: Value) {
        self.attributes.insert(key.into(), value);
        self.explicit_attributes = true;
    }

    pub(crate) fn remove_attribute(&mut self, key: &str) {
        self.attributes.remove(key);
        self.explicit_attributes = true;
    }

    pub(crate) fn transform_by_operation(&mut self, op: &Operation) {
        if matches!(op, Operation::Marker(_) | Operation::NoOp(_)) {
            return;
        }
        for range in &mut self.ranges {
            *range = transform_live_range(range, op);
        }
    }

    /// Take attributes from the text around a collapsed selection
    ///
    /// Text before the caret wins; at the start of a block the text after
    /// it is used.
    pub(crate) fn refresh_attributes<T: TreeRoots>(&mut self, tree: &T) {
        if self.explicit_attributes {
            return;
        }
        let Some(range) = self.ranges.first() else {
            self.attributes.clear();
            return;
        };
        let position = range.start();
        let source = if range.is_collapsed() {
            position
                .node_before(tree)
                .ok()
                .flatten()
                .filter(|node| node.is_text())
                .or_else(|| position.node_after(tree).ok().flatten().filter(|node| node.is_text()))
        } else {
            position.node_after(tree).ok().flatten().filter(|node| node.is_text())
        };
        self.attributes = source.map(Node::attributes).cloned().unwrap_or_default();
    }
}

/// Ranges that make the selection valid for `schema`, or `None` when it
/// already is
pub fn fix_selection<T: TreeRoots>(selection: &DocumentSelection, tree: &T, schema: &Schema) -> Option<Vec<Range>> {
    let mut changed = false;
    let mut fixed = Vec::with_capacity(selection.ranges().len());
    for range in selection.ranges() {
        match fix_range(range, tree, schema) {
            Some(range) => {
                changed = true;
                fixed.push(range);
            }
            None => fixed.push(range.clone()),
        }
    }
    if !changed {
        return None;
    }
    let mut merged: Vec<Range> = Vec::with_capacity(fixed.len());
    for range in fixed {
        if !merged.iter().any(|existing| *existing == range || existing.contains_range(&range, true)) {
            merged.push(range);
        }
    }
    Some(merged)
}

fn fix_range<T: TreeRoots>(range: &Range, tree: &T, schema: &Schema) -> Option<Range> {
    if range.root_name() == GRAVEYARD_ROOT_NAME {
        let position = tree_default_position(tree)?;
        return schema.get_nearest_selection_range(tree, &position, SelectionDirection::Forward);
    }
    if range.is_collapsed() {
        let start = range.start();
        if schema.can_hold_text(tree, start) {
            return None;
        }
        return schema.get_nearest_selection_range(tree, start, SelectionDirection::Both);
    }
    fix_expanded_range(range, tree, schema)
}

fn tree_default_position<T: TreeRoots>(tree: &T) -> Option<Position> {
    tree.root(crate::document::DEFAULT_ROOT_NAME)
        .map(|_| Position::at_start(crate::document::DEFAULT_ROOT_NAME, &[]))
}

fn selects_object<T: TreeRoots>(range: &Range, tree: &T, schema: &Schema) -> bool {
    range.is_flat()
        && range.flat_len() == 1
        && range
            .start()
            .node_after(tree)
            .ok()
            .flatten()
            .and_then(Node::as_element)
            .is_some_and(|element| schema.is_object(element.name()))
}

fn fix_expanded_range<T: TreeRoots>(range: &Range, tree: &T, schema: &Schema) -> Option<Range> {
    if selects_object(range, tree, schema) {
        return None;
    }

    let mut start = range.start().clone();
    let mut end = range.end().clone();
    if !schema.can_hold_text(tree, &start) {
        if let Some(nearest) = schema.get_nearest_selection_range(tree, &start, SelectionDirection::Forward) {
            start = nearest.start().clone();
        }
    }
    if !schema.can_hold_text(tree, &end) {
        if let Some(nearest) = schema.get_nearest_selection_range(tree, &end, SelectionDirection::Backward) {
            end = nearest.end().clone();
        }
    }

    // Both ends must share their limit element; otherwise grow the range
    // over the limit elements it cuts into
    loop {
        let start_limit = schema.limit_element_path(tree, &start);
        let end_limit = schema.limit_element_path(tree, &end);
        if start_limit == end_limit {
            break;
        }
        if !end.path().starts_with(&start_limit) || start_limit.len() > end_limit.len() {
            start = Position::before(tree, start.root_name(), &start_limit).ok()?;
        } else {
            end = Position::after(tree, end.root_name(), &end_limit).ok()?;
        }
    }

    if start.is_after(&end) {
        return Some(Range::collapsed(start));
    }
    let fixed = Range::new(start, end).ok()?;
    if fixed == *range {
        None
    } else {
        Some(fixed)
    }
}
