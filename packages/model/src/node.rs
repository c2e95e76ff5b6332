//! # Model Tree
//!
//! Elements own their children by value; nothing holds a reference back to
//! its parent. A node's parent is whatever element the path walks through.
//!
//! ## Identity
//!
//! Elements carry a [`NodeId`] that survives moves between roots (the
//! graveyard included), which is how the mapper and the differ follow an
//! element across edits. Ids do not take part in structural equality.
//!
//! ## Canonical text
//!
//! Text nodes have no identity. After every mutation primitive, adjacent
//! text nodes with identical attributes are merged and empty ones dropped,
//! so two trees holding the same characters compare equal no matter how
//! they were edited. Offsets count characters in text and one per element.

use crate::error::{ModelError, ModelResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

pub type Attributes = BTreeMap<String, Value>;

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

/// Stable element identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl NodeId {
    pub fn next() -> Self {
        NodeId(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Element {
    #[serde(skip, default = "NodeId::next")]
    id: NodeId,
    name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    attributes: Attributes,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    children: Vec<Node>,
}

impl PartialEq for Element {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.attributes == other.attributes
            && self.children == other.children
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Text {
    data: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    attributes: Attributes,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Node {
    Element(Element),
    Text(Text),
}

impl Text {
    pub fn new(data: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            attributes: Attributes::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn with_attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn data(&self) -> &str {
        &self.data
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// Length in characters
    pub fn len(&self) -> usize {
        self.data.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn split(&self, at: usize) -> (Text, Text) {
        let byte = self
            .data
            .char_indices()
            .nth(at)
            .map(|(index, _)| index)
            .unwrap_or(self.data.len());
        (
            Text {
                data: self.data[..byte].to_string(),
                attributes: self.attributes.clone(),
            },
            Text {
                data: self.data[byte..].to_string(),
                attributes: self.attributes.clone(),
            },
        )
    }
}

impl Node {
    /// Number of offsets the node occupies in its parent
    pub fn offset_size(&self) -> usize {
        match self {
            Node::Element(_) => 1,
            Node::Text(text) => text.len(),
        }
    }

    pub fn is_element(&self) -> bool {
        matches!(self, Node::Element(_))
    }

    pub fn is_text(&self) -> bool {
        matches!(self, Node::Text(_))
    }

    /// Type check in the `is('element', 'paragraph')` style
    pub fn is(&self, kind: &str, name: Option<&str>) -> bool {
        match (self, kind) {
            (_, "node") | (_, "model:node") => name.is_none(),
            (Node::Element(element), "element") | (Node::Element(element), "model:element") => {
                name.map_or(true, |name| element.name == name)
            }
            (Node::Text(_), "text") | (Node::Text(_), "$text") | (Node::Text(_), "model:$text") => {
                name.is_none()
            }
            _ => false,
        }
    }

    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(element) => Some(element),
            Node::Text(_) => None,
        }
    }

    pub fn as_element_mut(&mut self) -> Option<&mut Element> {
        match self {
            Node::Element(element) => Some(element),
            Node::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&Text> {
        match self {
            Node::Text(text) => Some(text),
            Node::Element(_) => None,
        }
    }

    /// Name used by the schema: the element name, or `$text`
    pub fn schema_name(&self) -> &str {
        match self {
            Node::Element(element) => &element.name,
            Node::Text(_) => "$text",
        }
    }

    pub fn attributes(&self) -> &Attributes {
        match self {
            Node::Element(element) => &element.attributes,
            Node::Text(text) => &text.attributes,
        }
    }

    pub fn get_attribute(&self, key: &str) -> Option<&Value> {
        self.attributes().get(key)
    }

    fn attributes_mut(&mut self) -> &mut Attributes {
        match self {
            Node::Element(element) => &mut element.attributes,
            Node::Text(text) => &mut text.attributes,
        }
    }
}

impl From<Element> for Node {
    fn from(element: Element) -> Self {
        Node::Element(element)
    }
}

impl From<Text> for Node {
    fn from(text: Text) -> Self {
        Node::Text(text)
    }
}

impl From<&str> for Node {
    fn from(data: &str) -> Self {
        Node::Text(Text::new(data))
    }
}

/// Merge adjacent text with equal attributes and drop empty text
pub fn normalize_nodes(nodes: &mut Vec<Node>) {
    let mut normalized: Vec<Node> = Vec::with_capacity(nodes.len());
    for node in nodes.drain(..) {
        if let Node::Text(text) = &node {
            if text.is_empty() {
                continue;
            }
            if let Some(Node::Text(previous)) = normalized.last_mut() {
                if previous.attributes == text.attributes {
                    previous.data.push_str(&text.data);
                    continue;
                }
            }
        }
        normalized.push(node);
    }
    *nodes = normalized;
}

/// Total offset size of a node list
pub fn offset_size_of(nodes: &[Node]) -> usize {
    nodes.iter().map(Node::offset_size).sum()
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: NodeId::next(),
            name: name.into(),
            attributes: Attributes::new(),
            children: Vec::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn with_attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn with_child(mut self, child: impl Into<Node>) -> Self {
        self.children.push(child.into());
        normalize_nodes(&mut self.children);
        self
    }

    pub fn with_children(mut self, children: impl IntoIterator<Item = Node>) -> Self {
        self.children.extend(children);
        normalize_nodes(&mut self.children);
        self
    }

    pub fn with_text(self, data: &str) -> Self {
        self.with_child(Text::new(data))
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
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

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    pub fn get_child(&self, index: usize) -> Option<&Node> {
        self.children.get(index)
    }

    pub fn max_offset(&self) -> usize {
        offset_size_of(&self.children)
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Offset at which the child with `index` starts
    pub fn child_start_offset(&self, index: usize) -> usize {
        offset_size_of(&self.children[..index.min(self.children.len())])
    }

    /// Index and start offset of the child covering `offset`
    pub fn child_at_offset(&self, offset: usize) -> Option<(usize, usize)> {
        let mut start = 0;
        for (index, child) in self.children.iter().enumerate() {
            let end = start + child.offset_size();
            if offset < end {
                return Some((index, start));
            }
            start = end;
        }
        None
    }

    /// Index of the child covering `offset`, or the child count at the end
    pub fn offset_to_index(&self, offset: usize) -> usize {
        self.child_at_offset(offset)
            .map(|(index, _)| index)
            .unwrap_or(self.children.len())
    }

    /// The node starting exactly at `offset`
    pub fn node_after(&self, offset: usize) -> Option<&Node> {
        match self.child_at_offset(offset) {
            Some((index, start)) if start == offset => self.children.get(index),
            _ => None,
        }
    }

    /// The node ending exactly at `offset`
    pub fn node_before(&self, offset: usize) -> Option<&Node> {
        if offset == 0 {
            return None;
        }
        match self.child_at_offset(offset - 1) {
            Some((index, start)) if start + self.children[index].offset_size() == offset => {
                self.children.get(index)
            }
            _ => None,
        }
    }

    /// The text node strictly containing `offset`
    pub fn text_at(&self, offset: usize) -> Option<&Text> {
        let (index, start) = self.child_at_offset(offset)?;
        match &self.children[index] {
            Node::Text(text) if start < offset => Some(text),
            _ => None,
        }
    }

    /// Walk a path of offsets; every step has to land on an element start
    pub fn element_at_path(&self, path: &[usize]) -> Option<&Element> {
        let mut current = self;
        for &offset in path {
            current = current.node_after(offset)?.as_element()?;
        }
        Some(current)
    }

    pub fn element_at_path_mut(&mut self, path: &[usize]) -> Option<&mut Element> {
        let mut current = self;
        for &offset in path {
            let (index, start) = current.child_at_offset(offset)?;
            if start != offset {
                return None;
            }
            current = current.children[index].as_element_mut()?;
        }
        Some(current)
    }

    /// The node starting at the last offset of `path`
    pub fn node_at_path(&self, path: &[usize]) -> Option<&Node> {
        let (last, parent) = path.split_last()?;
        self.element_at_path(parent)?.node_after(*last)
    }

    /// Path of the descendant element with the given id
    pub fn find_path(&self, id: NodeId) -> Option<Vec<usize>> {
        let mut offset = 0;
        for child in &self.children {
            if let Node::Element(element) = child {
                if element.id == id {
                    return Some(vec![offset]);
                }
                if let Some(mut rest) = element.find_path(id) {
                    rest.insert(0, offset);
                    return Some(rest);
                }
            }
            offset += child.offset_size();
        }
        None
    }

    /// Ids of every element on the way down `path`, excluding `self`
    pub fn ancestor_ids(&self, path: &[usize]) -> Vec<NodeId> {
        let mut ids = Vec::new();
        let mut current = self;
        for &offset in path {
            match current.node_after(offset).and_then(Node::as_element) {
                Some(element) => {
                    ids.push(element.id);
                    current = element;
                }
                None => break,
            }
        }
        ids
    }

    pub fn text_content(&self) -> String {
        let mut content = String::new();
        for child in &self.children {
            match child {
                Node::Text(text) => content.push_str(&text.data),
                Node::Element(element) => content.push_str(&element.text_content()),
            }
        }
        content
    }

    /// Same name and attributes, fresh identity, no children
    pub fn clone_empty(&self) -> Element {
        Element {
            id: NodeId::next(),
            name: self.name.clone(),
            attributes: self.attributes.clone(),
            children: Vec::new(),
        }
    }

    pub(crate) fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn set_attribute(&mut self, key: impl Into<String>, value: Value) {
        self.attributes.insert(key.into(), value);
    }

    pub fn remove_attribute(&mut self, key: &str) -> Option<Value> {
        self.attributes.remove(key)
    }

    /// Split text so that a child boundary falls on `offset`; returns the
    /// index of the first child at or after `offset`
    fn split_at_offset(&mut self, offset: usize) -> usize {
        let Some((index, start)) = self.child_at_offset(offset) else {
            return self.children.len();
        };
        if start == offset {
            return index;
        }
        if let Node::Text(text) = &self.children[index] {
            let (left, right) = text.split(offset - start);
            self.children[index] = Node::Text(left);
            self.children.insert(index + 1, Node::Text(right));
        }
        index + 1
    }

    fn check_offset(&self, offset: usize) -> ModelResult<()> {
        let max = self.max_offset();
        if offset > max {
            return Err(ModelError::OffsetOutOfBounds { offset, max });
        }
        Ok(())
    }

    /// Insert nodes at `offset`, splitting text when needed
    pub fn insert_at(&mut self, offset: usize, nodes: Vec<Node>) -> ModelResult<()> {
        self.check_offset(offset)?;
        let index = self.split_at_offset(offset);
        self.children.splice(index..index, nodes);
        normalize_nodes(&mut self.children);
        Ok(())
    }

    pub fn append(&mut self, nodes: Vec<Node>) {
        self.children.extend(nodes);
        normalize_nodes(&mut self.children);
    }

    /// Remove `how_many` offsets starting at `offset`
    pub fn remove_range(&mut self, offset: usize, how_many: usize) -> ModelResult<Vec<Node>> {
        self.check_offset(offset + how_many)?;
        let start = self.split_at_offset(offset);
        let end = self.split_at_offset(offset + how_many);
        let mut removed: Vec<Node> = self.children.drain(start..end).collect();
        normalize_nodes(&mut self.children);
        normalize_nodes(&mut removed);
        Ok(removed)
    }

    /// Set (or remove, when `value` is `None`) an attribute on every node
    /// in `[offset, offset + how_many)`
    pub fn set_attribute_in_range(
        &mut self,
        offset: usize,
        how_many: usize,
        key: &str,
        value: Option<&Value>,
    ) -> ModelResult<()> {
        self.check_offset(offset + how_many)?;
        let start = self.split_at_offset(offset);
        let end = self.split_at_offset(offset + how_many);
        for child in &mut self.children[start..end] {
            let attributes = child.attributes_mut();
            match value {
                Some(value) => {
                    attributes.insert(key.to_string(), value.clone());
                }
                None => {
                    attributes.remove(key);
                }
            }
        }
        normalize_nodes(&mut self.children);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn paragraph(text: &str) -> Element {
        Element::new("paragraph").with_text(text)
    }

    #[test]
    fn test_insert_splits_and_merges_text() {
        let mut p = paragraph("foobar");
        p.insert_at(3, vec![Node::from("XY")]).expect("Failed to insert");

        assert_eq!(p.child_count(), 1);
        assert_eq!(p.text_content(), "fooXYbar");
        assert_eq!(p.max_offset(), 8);
    }

    #[test]
    fn test_insert_attributed_text_keeps_separate_nodes() {
        let mut p = paragraph("foobar");
        p.insert_at(3, vec![Text::new("X").with_attribute("bold", true).into()])
            .expect("Failed to insert");

        assert_eq!(p.child_count(), 3);
        assert_eq!(
            p.node_after(3).and_then(|node| node.get_attribute("bold")),
            Some(&json!(true))
        );
        assert_eq!(p.text_at(4).map(Text::data), Some("bar"));
    }

    #[test]
    fn test_remove_returns_canonical_nodes() {
        let mut p = Element::new("paragraph")
            .with_child(Text::new("ab"))
            .with_child(Text::new("cd").with_attribute("bold", true))
            .with_child(Text::new("ef"));

        let removed = p.remove_range(1, 4).expect("Failed to remove");
        assert_eq!(p.text_content(), "af");
        assert_eq!(p.child_count(), 1);
        assert_eq!(removed.len(), 3);
        assert_eq!(offset_size_of(&removed), 4);
    }

    #[test]
    fn test_remove_then_reinsert_restores_tree() {
        let original = Element::new("paragraph")
            .with_child(Text::new("ab"))
            .with_child(Text::new("cd").with_attribute("bold", true));
        let mut p = original.clone();

        let removed = p.remove_range(1, 2).expect("Failed to remove");
        p.insert_at(1, removed).expect("Failed to insert");

        assert_eq!(p, original);
    }

    #[test]
    fn test_set_attribute_in_range_merges_back() {
        let mut p = paragraph("foobar");
        p.set_attribute_in_range(2, 2, "bold", Some(&json!(true)))
            .expect("Failed to set attribute");
        assert_eq!(p.child_count(), 3);

        p.set_attribute_in_range(2, 2, "bold", None)
            .expect("Failed to remove attribute");
        assert_eq!(p, paragraph("foobar"));
    }

    #[test]
    fn test_out_of_bounds_offsets_fail() {
        let mut p = paragraph("ab");
        assert_eq!(
            p.insert_at(3, vec![Node::from("x")]),
            Err(ModelError::OffsetOutOfBounds { offset: 3, max: 2 })
        );
        assert!(p.remove_range(1, 2).is_err());
    }

    #[test]
    fn test_paths_and_ids() {
        let li = Element::new("listItem").with_text("foz");
        let li_id = li.id();
        let root = Element::new("$root")
            .with_child(paragraph("x"))
            .with_child(Element::new("list").with_child(li));

        assert_eq!(root.find_path(li_id), Some(vec![1, 0]));
        assert_eq!(root.element_at_path(&[1, 0]).map(Element::name), Some("listItem"));
        assert!(root.element_at_path(&[0, 0]).is_none());
        assert_eq!(root.ancestor_ids(&[1, 0]).len(), 2);
    }

    #[test]
    fn test_equality_ignores_ids() {
        let a = paragraph("same");
        let b = paragraph("same");
        assert_ne!(a.id(), b.id());
        assert_eq!(a, b);
    }

    #[test]
    fn test_is_predicate() {
        let node = Node::from(paragraph("x"));
        assert!(node.is("element", None));
        assert!(node.is("element", Some("paragraph")));
        assert!(!node.is("element", Some("heading")));
        assert!(Node::from("x").is("$text", None));
        assert!(node.is("node", None));
    }
}
