//! # Mapper
//!
//! Binds model elements to view elements and translates positions between
//! the two trees.
//!
//! ## Design
//!
//! - Bindings are keyed by node identity on both sides, so they survive
//!   sibling insertions and removals that shift paths
//! - A model position is found inside its parent's view element by walking
//!   the view children and summing their model lengths: a character of text
//!   is one, a bound element is one, a UI element is zero and any other
//!   element (an attribute element, say) counts its children
//! - View positions that end up next to a text node are moved into it, so
//!   text inserted there merges with the neighbour
//!
//! ```rust,ignore
//! let mut mapper = Mapper::new();
//! mapper.bind_roots("main", "main");
//! mapper.bind_elements(paragraph.id(), view_paragraph.id());
//! let view_position = mapper.to_view_position(&model_doc, &view_doc, &position)?;
//! ```

use crate::error::{ConversionError, ConversionResult};
use folio_model::{ModelError, NodeId, Position, Range, TreeRoots};
use folio_view::{ElementKind, ViewDocument, ViewElement, ViewNode, ViewNodeId, ViewPosition, ViewRange};
use std::collections::{BTreeMap, BTreeSet};
use tracing::trace;

#[derive(Debug, Clone, Default)]
pub struct Mapper {
    model_to_view: BTreeMap<NodeId, ViewNodeId>,
    view_to_model: BTreeMap<ViewNodeId, NodeId>,
    model_roots: BTreeMap<String, String>,
    view_roots: BTreeMap<String, String>,
    markers: BTreeMap<String, BTreeSet<ViewNodeId>>,
}

impl Mapper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind_roots(&mut self, model_root: &str, view_root: &str) {
        self.model_roots.insert(model_root.to_string(), view_root.to_string());
        self.view_roots.insert(view_root.to_string(), model_root.to_string());
    }

    pub fn bind_elements(&mut self, model: NodeId, view: ViewNodeId) {
        trace!(model = %model, view = view.0, "Binding elements");
        if let Some(old) = self.model_to_view.insert(model, view) {
            self.view_to_model.remove(&old);
        }
        self.view_to_model.insert(view, model);
    }

    /// Drop the binding of a removed view element and its marker bindings
    pub fn unbind_view_element(&mut self, view: ViewNodeId) -> Option<NodeId> {
        for elements in self.markers.values_mut() {
            elements.remove(&view);
        }
        self.markers.retain(|_, elements| !elements.is_empty());

        let model = self.view_to_model.remove(&view)?;
        if self.model_to_view.get(&model) == Some(&view) {
            self.model_to_view.remove(&model);
        }
        Some(model)
    }

    /// Unbind every element inside a removed view node
    pub fn unbind_subtree(&mut self, node: &ViewNode) {
        if let ViewNode::Element(element) = node {
            self.unbind_view_element(element.id());
            for child in element.children() {
                self.unbind_subtree(child);
            }
        }
    }

    pub fn to_view_element(&self, model: NodeId) -> Option<ViewNodeId> {
        self.model_to_view.get(&model).copied()
    }

    pub fn to_model_element(&self, view: ViewNodeId) -> Option<NodeId> {
        self.view_to_model.get(&view).copied()
    }

    pub fn to_view_root(&self, model_root: &str) -> Option<&str> {
        self.model_roots.get(model_root).map(String::as_str)
    }

    pub fn to_model_root(&self, view_root: &str) -> Option<&str> {
        self.view_roots.get(view_root).map(String::as_str)
    }

    pub fn bind_element_to_marker(&mut self, view: ViewNodeId, marker_name: &str) {
        self.markers.entry(marker_name.to_string()).or_default().insert(view);
    }

    pub fn unbind_element_from_marker(&mut self, view: ViewNodeId, marker_name: &str) {
        if let Some(elements) = self.markers.get_mut(marker_name) {
            elements.remove(&view);
            if elements.is_empty() {
                self.markers.remove(marker_name);
            }
        }
    }

    pub fn marker_name_to_elements(&self, marker_name: &str) -> Vec<ViewNodeId> {
        self.markers
            .get(marker_name)
            .map(|elements| elements.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn clear_bindings(&mut self) {
        self.model_to_view.clear();
        self.view_to_model.clear();
        self.markers.clear();
    }

    /// How many model offsets a view node stands for
    pub fn model_length(&self, node: &ViewNode) -> usize {
        match node {
            ViewNode::Text(text) => text.len(),
            ViewNode::Element(element) if self.view_to_model.contains_key(&element.id()) => 1,
            ViewNode::Element(element) if *element.kind() == ElementKind::Ui => 0,
            ViewNode::Element(element) => element.children().iter().map(|child| self.model_length(child)).sum(),
        }
    }

    pub fn to_view_position<T: TreeRoots>(
        &self,
        model: &T,
        view: &ViewDocument,
        position: &Position,
    ) -> ConversionResult<ViewPosition> {
        let view_root_name = self
            .to_view_root(position.root_name())
            .ok_or_else(|| ConversionError::UnmappedRoot(position.root_name().to_string()))?;
        let view_root = view
            .get_root(view_root_name)
            .ok_or_else(|| ConversionError::UnmappedRoot(position.root_name().to_string()))?;

        let parent_path = if position.parent_path().is_empty() {
            Vec::new()
        } else {
            let model_root = model
                .root(position.root_name())
                .ok_or_else(|| ModelError::NoSuchRoot(position.root_name().to_string()))?;
            let parent = model_root
                .element_at_path(position.parent_path())
                .ok_or_else(|| ModelError::invalid_path(position.root_name(), position.parent_path()))?;
            let view_id = self
                .to_view_element(parent.id())
                .ok_or(ConversionError::UnmappedModelElement(parent.id()))?;
            view_root
                .find_path(view_id)
                .ok_or(ConversionError::UnmappedModelElement(parent.id()))?
        };

        self.find_position_in(view_root, view_root_name, parent_path, position.offset())
            .ok_or_else(|| ConversionError::UnmappedPosition {
                position: position.to_string(),
            })
    }

    fn find_position_in(
        &self,
        root: &ViewElement,
        root_name: &str,
        parent_path: Vec<usize>,
        expected: usize,
    ) -> Option<ViewPosition> {
        let parent = root.element_at_path(&parent_path)?;
        let mut model_offset = 0;
        let mut view_offset = 0;

        while model_offset < expected {
            let child = parent.get_child(view_offset)?;
            let length = self.model_length(child);
            if model_offset + length > expected {
                let mut child_path = parent_path;
                child_path.push(view_offset);
                return match child {
                    ViewNode::Text(_) => Some(ViewPosition::at(root_name, &child_path, expected - model_offset)),
                    ViewNode::Element(_) => self.find_position_in(root, root_name, child_path, expected - model_offset),
                };
            }
            model_offset += length;
            view_offset += 1;
        }

        Some(move_to_text_node(root, root_name, parent_path, view_offset))
    }

    pub fn to_view_range<T: TreeRoots>(&self, model: &T, view: &ViewDocument, range: &Range) -> ConversionResult<ViewRange> {
        let start = self.to_view_position(model, view, range.start())?;
        if range.is_collapsed() {
            return Ok(ViewRange::collapsed(start));
        }
        let end = self.to_view_position(model, view, range.end())?;
        Ok(ViewRange::new(start, end)?)
    }

    pub fn to_model_position<T: TreeRoots>(
        &self,
        model: &T,
        view: &ViewDocument,
        position: &ViewPosition,
    ) -> ConversionResult<Position> {
        let model_root_name = self
            .to_model_root(position.root_name())
            .ok_or_else(|| ConversionError::UnmappedRoot(position.root_name().to_string()))?;
        let view_root = view
            .get_root(position.root_name())
            .ok_or_else(|| ConversionError::UnmappedRoot(position.root_name().to_string()))?;

        // Deepest bound element on the way to the position
        let mut mapped: Option<(usize, &ViewElement, NodeId)> = None;
        let mut element = view_root;
        for (depth, index) in position.parent_path().iter().enumerate() {
            match element.get_child(*index) {
                Some(ViewNode::Element(child)) => {
                    element = child;
                    if let Some(model_id) = self.to_model_element(child.id()) {
                        mapped = Some((depth + 1, child, model_id));
                    }
                }
                _ => break,
            }
        }

        let (depth, ancestor, model_parent_path) = match mapped {
            Some((depth, ancestor, model_id)) => {
                let model_root = model
                    .root(model_root_name)
                    .ok_or_else(|| ModelError::NoSuchRoot(model_root_name.to_string()))?;
                let path = model_root
                    .find_path(model_id)
                    .ok_or(ConversionError::UnmappedModelElement(model_id))?;
                (depth, ancestor, path)
            }
            None => (0, view_root, Vec::new()),
        };

        let offset = self.model_offset_in(ancestor, &position.path()[depth..]);
        Ok(Position::at(model_root_name, &model_parent_path, offset))
    }

    /// Model offset of the view path `rest` relative to `element`
    fn model_offset_in(&self, element: &ViewElement, rest: &[usize]) -> usize {
        let Some((&index, tail)) = rest.split_first() else {
            return 0;
        };
        let before: usize = element
            .children()
            .iter()
            .take(index)
            .map(|child| self.model_length(child))
            .sum();
        match (element.get_child(index), tail.is_empty()) {
            (_, true) => before,
            (Some(ViewNode::Element(child)), false) => before + self.model_offset_in(child, tail),
            (Some(ViewNode::Text(_)), false) => before + tail[0],
            (None, false) => before,
        }
    }

    pub fn to_model_range<T: TreeRoots>(&self, model: &T, view: &ViewDocument, range: &ViewRange) -> ConversionResult<Range> {
        let start = self.to_model_position(model, view, range.start())?;
        let end = self.to_model_position(model, view, range.end())?;
        Ok(Range::new(start, end)?)
    }
}

/// Move a position that touches a text node into that text node
fn move_to_text_node(root: &ViewElement, root_name: &str, parent_path: Vec<usize>, offset: usize) -> ViewPosition {
    let Some(parent) = root.element_at_path(&parent_path) else {
        return ViewPosition::at(root_name, &parent_path, offset);
    };
    let mut text_path = parent_path.clone();
    if offset > 0 {
        if let Some(ViewNode::Text(text)) = parent.get_child(offset - 1) {
            text_path.push(offset - 1);
            return ViewPosition::at(root_name, &text_path, text.len());
        }
    }
    if let Some(ViewNode::Text(_)) = parent.get_child(offset) {
        text_path.push(offset);
        return ViewPosition::at(root_name, &text_path, 0);
    }
    ViewPosition::at(root_name, &parent_path, offset)
}
