//! Detached content that is not part of the document yet.
//!
//! Upcast produces fragments and the writer inserts them. Positions inside a
//! fragment use [`FRAGMENT_ROOT_NAME`] as their root, so ranges and tree
//! walkers work on fragments the same way they work on documents.

use crate::document::TreeRoots;
use crate::error::ModelResult;
use crate::node::{Element, Node};
use crate::position::Position;
use crate::range::Range;
use std::collections::BTreeMap;

pub const FRAGMENT_ROOT_NAME: &str = "$documentFragment";

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentFragment {
    root: Element,
    /// Marker ranges rooted in this fragment
    markers: BTreeMap<String, Range>,
}

impl Default for DocumentFragment {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeRoots for DocumentFragment {
    fn root(&self, name: &str) -> Option<&Element> {
        (name == FRAGMENT_ROOT_NAME).then_some(&self.root)
    }
}

impl DocumentFragment {
    pub fn new() -> Self {
        Self {
            root: Element::new(FRAGMENT_ROOT_NAME),
            markers: BTreeMap::new(),
        }
    }

    pub fn from_nodes(nodes: impl IntoIterator<Item = Node>) -> Self {
        let mut fragment = Self::new();
        fragment.root.append(nodes.into_iter().collect());
        fragment
    }

    pub fn root_element(&self) -> &Element {
        &self.root
    }

    pub fn root_element_mut(&mut self) -> &mut Element {
        &mut self.root
    }

    pub fn children(&self) -> &[Node] {
        self.root.children()
    }

    pub fn max_offset(&self) -> usize {
        self.root.max_offset()
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    pub fn append(&mut self, node: impl Into<Node>) {
        self.root.append(vec![node.into()]);
    }

    pub fn insert(&mut self, offset: usize, nodes: Vec<Node>) -> ModelResult<()> {
        self.root.insert_at(offset, nodes)
    }

    pub fn start(&self) -> Position {
        Position::at_start(FRAGMENT_ROOT_NAME, &[])
    }

    pub fn end(&self) -> Position {
        Position::at(FRAGMENT_ROOT_NAME, &[], self.root.max_offset())
    }

    pub fn markers(&self) -> &BTreeMap<String, Range> {
        &self.markers
    }

    pub fn set_marker(&mut self, name: impl Into<String>, range: Range) {
        self.markers.insert(name.into(), range);
    }

    pub fn remove_marker(&mut self, name: &str) -> Option<Range> {
        self.markers.remove(name)
    }

    /// Children and markers, consuming the fragment
    pub fn into_parts(self) -> (Vec<Node>, BTreeMap<String, Range>) {
        let nodes = self.root.children().to_vec();
        (nodes, self.markers)
    }

    pub fn text_content(&self) -> String {
        self.root.text_content()
    }

    pub fn to_json(&self) -> ModelResult<serde_json::Value> {
        Ok(serde_json::to_value(self.root.children())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Text;

    #[test]
    fn test_positions_resolve_inside_fragment() {
        let fragment = DocumentFragment::from_nodes(vec![
            Node::from(Element::new("paragraph").with_text("foo")),
            Node::from(Text::new("bar")),
        ]);
        let position = Position::at(FRAGMENT_ROOT_NAME, &[0], 1);
        assert!(position.validate(&fragment).is_ok());
        assert_eq!(fragment.max_offset(), 4);
        assert_eq!(fragment.end().offset(), 4);
    }

    #[test]
    fn test_adjacent_text_is_merged_on_append() {
        let mut fragment = DocumentFragment::new();
        fragment.append(Text::new("ab"));
        fragment.append(Text::new("cd"));
        assert_eq!(fragment.children().len(), 1);
        assert_eq!(fragment.text_content(), "abcd");
    }
}
