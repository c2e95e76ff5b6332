//! # View Tree
//!
//! A lightweight tree mirroring what ends up in the DOM. Like the model
//! tree, elements own their children by value and carry a [`ViewNodeId`]
//! that is ignored by structural equality.
//!
//! ## Element kinds
//!
//! | Kind        | Holds children | Broken by the writer | Notes                        |
//! |-------------|----------------|----------------------|------------------------------|
//! | `Container` | yes            | only explicitly      | blocks such as `<p>`         |
//! | `Attribute` | yes            | yes                  | formatting such as `<strong>` |
//! | `Empty`     | no             | no                   | `<img>`, `<br>`              |
//! | `Ui`        | no             | no                   | editing-only decorations     |
//! | `Raw`       | no             | no                   | opaque inner HTML            |
//! | `Editable`  | yes            | no                   | nested editable regions      |
//! | `Root`      | yes            | no                   | one per view root            |
//!
//! `class` and `style` are stored as a class set and a style map; reading
//! them through [`ViewElement::get_attribute`] joins them back into the
//! string forms.

use crate::error::{ViewError, ViewResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};

pub type ViewAttributes = BTreeMap<String, String>;

/// Priority given to attribute elements created without one
pub const DEFAULT_PRIORITY: i32 = 10;

static NEXT_VIEW_NODE_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ViewNodeId(pub u64);

impl ViewNodeId {
    pub fn next() -> Self {
        ViewNodeId(NEXT_VIEW_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ElementKind {
    Container,
    Attribute {
        priority: i32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
    },
    Empty,
    Ui,
    Raw {
        html: String,
    },
    Editable,
    Root,
}

impl ElementKind {
    pub fn name(&self) -> &'static str {
        match self {
            ElementKind::Container => "containerElement",
            ElementKind::Attribute { .. } => "attributeElement",
            ElementKind::Empty => "emptyElement",
            ElementKind::Ui => "uiElement",
            ElementKind::Raw { .. } => "rawElement",
            ElementKind::Editable => "editableElement",
            ElementKind::Root => "rootElement",
        }
    }

    pub fn can_hold_children(&self) -> bool {
        !matches!(self, ElementKind::Empty | ElementKind::Ui | ElementKind::Raw { .. })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewElement {
    #[serde(skip, default = "ViewNodeId::next")]
    id: ViewNodeId,
    name: String,
    #[serde(flatten)]
    kind: ElementKind,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    attributes: ViewAttributes,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    classes: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    styles: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    children: Vec<ViewNode>,
}

impl PartialEq for ViewElement {
    fn eq(&self, other: &Self) -> bool {
        self.is_similar(other) && self.children == other.children
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewText {
    data: String,
}

impl ViewText {
    pub fn new(data: impl Into<String>) -> Self {
        Self { data: data.into() }
    }

    pub fn data(&self) -> &str {
        &self.data
    }

    /// Length in characters
    pub fn len(&self) -> usize {
        self.data.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub(crate) fn split_at(&self, offset: usize) -> (ViewText, ViewText) {
        let byte = byte_offset(&self.data, offset);
        (
            ViewText::new(&self.data[..byte]),
            ViewText::new(&self.data[byte..]),
        )
    }

    pub(crate) fn insert_str(&mut self, offset: usize, data: &str) {
        let byte = byte_offset(&self.data, offset);
        self.data.insert_str(byte, data);
    }
}

pub(crate) fn byte_offset(data: &str, offset: usize) -> usize {
    data.char_indices()
        .nth(offset)
        .map(|(index, _)| index)
        .unwrap_or(data.len())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ViewNode {
    Element(ViewElement),
    Text(ViewText),
}

impl ViewNode {
    pub fn is_element(&self) -> bool {
        matches!(self, ViewNode::Element(_))
    }

    pub fn is_text(&self) -> bool {
        matches!(self, ViewNode::Text(_))
    }

    pub fn as_element(&self) -> Option<&ViewElement> {
        match self {
            ViewNode::Element(element) => Some(element),
            ViewNode::Text(_) => None,
        }
    }

    pub fn as_element_mut(&mut self) -> Option<&mut ViewElement> {
        match self {
            ViewNode::Element(element) => Some(element),
            ViewNode::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&ViewText> {
        match self {
            ViewNode::Text(text) => Some(text),
            ViewNode::Element(_) => None,
        }
    }

    pub fn is_attribute_element(&self) -> bool {
        self.as_element().is_some_and(ViewElement::is_attribute)
    }

    /// Type check in the `is('attributeElement', 'strong')` style
    pub fn is(&self, kind: &str, name: Option<&str>) -> bool {
        match self {
            ViewNode::Text(_) => kind == "$text" && name.is_none(),
            ViewNode::Element(element) => {
                let kind_matches = kind == "element" || kind == element.kind.name();
                kind_matches && name.map_or(true, |name| name == element.name)
            }
        }
    }

    pub fn text_content(&self) -> String {
        match self {
            ViewNode::Text(text) => text.data.clone(),
            ViewNode::Element(element) => element.text_content(),
        }
    }
}

impl From<ViewElement> for ViewNode {
    fn from(element: ViewElement) -> Self {
        ViewNode::Element(element)
    }
}

impl From<ViewText> for ViewNode {
    fn from(text: ViewText) -> Self {
        ViewNode::Text(text)
    }
}

impl From<&str> for ViewNode {
    fn from(data: &str) -> Self {
        ViewNode::Text(ViewText::new(data))
    }
}

/// Merge adjacent text nodes and drop empty ones
pub(crate) fn normalize_texts(nodes: &mut Vec<ViewNode>) {
    let mut result: Vec<ViewNode> = Vec::with_capacity(nodes.len());
    for node in nodes.drain(..) {
        match (result.last_mut(), node) {
            (_, ViewNode::Text(text)) if text.is_empty() => {}
            (Some(ViewNode::Text(last)), ViewNode::Text(text)) => last.data.push_str(&text.data),
            (_, node) => result.push(node),
        }
    }
    *nodes = result;
}

fn parse_styles(value: &str) -> BTreeMap<String, String> {
    value
        .split(';')
        .filter_map(|declaration| {
            let (property, value) = declaration.split_once(':')?;
            let property = property.trim();
            let value = value.trim();
            (!property.is_empty() && !value.is_empty()).then(|| (property.to_string(), value.to_string()))
        })
        .collect()
}

impl ViewElement {
    pub fn new(kind: ElementKind, name: impl Into<String>) -> Self {
        Self {
            id: ViewNodeId::next(),
            name: name.into(),
            kind,
            attributes: ViewAttributes::new(),
            classes: BTreeSet::new(),
            styles: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    pub fn container(name: impl Into<String>) -> Self {
        Self::new(ElementKind::Container, name)
    }

    pub fn attribute(name: impl Into<String>, priority: i32) -> Self {
        Self::new(ElementKind::Attribute { priority, id: None }, name)
    }

    pub fn empty(name: impl Into<String>) -> Self {
        Self::new(ElementKind::Empty, name)
    }

    pub fn ui(name: impl Into<String>) -> Self {
        Self::new(ElementKind::Ui, name)
    }

    pub fn raw(name: impl Into<String>, html: impl Into<String>) -> Self {
        Self::new(ElementKind::Raw { html: html.into() }, name)
    }

    pub fn editable(name: impl Into<String>) -> Self {
        Self::new(ElementKind::Editable, name)
    }

    pub fn root(name: impl Into<String>) -> Self {
        Self::new(ElementKind::Root, name)
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attribute(&key.into(), value.into());
        self
    }

    pub fn with_attributes<K, V>(mut self, attributes: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        for (key, value) in attributes {
            self.set_attribute(&key.into(), value.into());
        }
        self
    }

    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.classes.insert(class.into());
        self
    }

    pub fn with_style(mut self, property: impl Into<String>, value: impl Into<String>) -> Self {
        self.styles.insert(property.into(), value.into());
        self
    }

    pub fn with_child(mut self, child: impl Into<ViewNode>) -> Self {
        self.children.push(child.into());
        normalize_texts(&mut self.children);
        self
    }

    pub fn with_children(mut self, children: impl IntoIterator<Item = ViewNode>) -> Self {
        self.children.extend(children);
        normalize_texts(&mut self.children);
        self
    }

    pub fn with_text(self, data: &str) -> Self {
        self.with_child(ViewText::new(data))
    }

    /// Attribute elements with the same id are always merged by the writer
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        if let ElementKind::Attribute { id: ref mut element_id, .. } = self.kind {
            *element_id = Some(id.into());
        }
        self
    }

    pub fn id(&self) -> ViewNodeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &ElementKind {
        &self.kind
    }

    pub fn is_attribute(&self) -> bool {
        matches!(self.kind, ElementKind::Attribute { .. })
    }

    pub fn is_container(&self) -> bool {
        matches!(self.kind, ElementKind::Container)
    }

    pub fn priority(&self) -> Option<i32> {
        match self.kind {
            ElementKind::Attribute { priority, .. } => Some(priority),
            _ => None,
        }
    }

    pub fn attribute_id(&self) -> Option<&str> {
        match &self.kind {
            ElementKind::Attribute { id, .. } => id.as_deref(),
            _ => None,
        }
    }

    /// Plain attributes, without `class` and `style`
    pub fn attributes(&self) -> &ViewAttributes {
        &self.attributes
    }

    /// Every attribute including the `class` and `style` string forms
    pub fn attribute_entries(&self) -> ViewAttributes {
        let mut entries = self.attributes.clone();
        if let Some(class) = self.get_attribute("class") {
            entries.insert("class".to_string(), class);
        }
        if let Some(style) = self.get_attribute("style") {
            entries.insert("style".to_string(), style);
        }
        entries
    }

    pub fn get_attribute(&self, key: &str) -> Option<String> {
        match key {
            "class" if !self.classes.is_empty() => {
                Some(self.classes.iter().cloned().collect::<Vec<_>>().join(" "))
            }
            "style" if !self.styles.is_empty() => Some(
                self.styles
                    .iter()
                    .map(|(property, value)| format!("{property}:{value}"))
                    .collect::<Vec<_>>()
                    .join(";"),
            ),
            "class" | "style" => None,
            _ => self.attributes.get(key).cloned(),
        }
    }

    pub fn has_attribute(&self, key: &str) -> bool {
        self.get_attribute(key).is_some()
    }

    pub fn set_attribute(&mut self, key: &str, value: String) {
        match key {
            "class" => {
                self.classes = value.split_whitespace().map(str::to_string).collect();
            }
            "style" => self.styles = parse_styles(&value),
            _ => {
                self.attributes.insert(key.to_string(), value);
            }
        }
    }

    pub fn remove_attribute(&mut self, key: &str) -> bool {
        match key {
            "class" => !std::mem::take(&mut self.classes).is_empty(),
            "style" => !std::mem::take(&mut self.styles).is_empty(),
            _ => self.attributes.remove(key).is_some(),
        }
    }

    pub fn classes(&self) -> &BTreeSet<String> {
        &self.classes
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes.contains(class)
    }

    pub fn add_class(&mut self, class: impl Into<String>) {
        self.classes.insert(class.into());
    }

    pub fn remove_class(&mut self, class: &str) -> bool {
        self.classes.remove(class)
    }

    pub fn styles(&self) -> &BTreeMap<String, String> {
        &self.styles
    }

    pub fn get_style(&self, property: &str) -> Option<&str> {
        self.styles.get(property).map(String::as_str)
    }

    pub fn set_style(&mut self, property: impl Into<String>, value: impl Into<String>) {
        self.styles.insert(property.into(), value.into());
    }

    pub fn remove_style(&mut self, property: &str) -> bool {
        self.styles.remove(property).is_some()
    }

    pub fn children(&self) -> &[ViewNode] {
        &self.children
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    pub fn get_child(&self, index: usize) -> Option<&ViewNode> {
        self.children.get(index)
    }

    pub fn get_child_mut(&mut self, index: usize) -> Option<&mut ViewNode> {
        self.children.get_mut(index)
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn text_content(&self) -> String {
        self.children.iter().map(ViewNode::text_content).collect()
    }

    /// Same element without children and with a fresh id
    pub fn clone_empty(&self) -> ViewElement {
        ViewElement {
            id: ViewNodeId::next(),
            name: self.name.clone(),
            kind: self.kind.clone(),
            attributes: self.attributes.clone(),
            classes: self.classes.clone(),
            styles: self.styles.clone(),
            children: Vec::new(),
        }
    }

    /// Same name, kind, priority and attributes; children are not compared
    pub fn is_similar(&self, other: &ViewElement) -> bool {
        self.name == other.name
            && self.kind == other.kind
            && self.attributes == other.attributes
            && self.classes == other.classes
            && self.styles == other.styles
    }

    /// Whether `other` can be folded into this attribute element without
    /// losing or overriding anything
    pub fn can_be_joined_with(&self, other: &ViewElement) -> bool {
        if !self.is_attribute() || self.name != other.name || self.kind != other.kind {
            return false;
        }
        let attributes_agree = other
            .attributes
            .iter()
            .all(|(key, value)| self.attributes.get(key).map_or(true, |own| own == value));
        let styles_agree = other
            .styles
            .iter()
            .all(|(property, value)| self.styles.get(property).map_or(true, |own| own == value));
        attributes_agree && styles_agree
    }

    /// Whether every attribute, class and style of `other` is present here
    pub fn has_all_of(&self, other: &ViewElement) -> bool {
        other.attributes.iter().all(|(key, value)| self.attributes.get(key) == Some(value))
            && other.classes.is_subset(&self.classes)
            && other.styles.iter().all(|(property, value)| self.styles.get(property) == Some(value))
    }

    pub(crate) fn join_attributes_of(&mut self, other: &ViewElement) {
        for (key, value) in &other.attributes {
            self.attributes.insert(key.clone(), value.clone());
        }
        self.classes.extend(other.classes.iter().cloned());
        for (property, value) in &other.styles {
            self.styles.insert(property.clone(), value.clone());
        }
    }

    /// Drop the attributes, classes and styles `other` has; true when
    /// nothing is left
    pub(crate) fn strip_attributes_of(&mut self, other: &ViewElement) -> bool {
        for key in other.attributes.keys() {
            self.attributes.remove(key);
        }
        for class in &other.classes {
            self.classes.remove(class);
        }
        for property in other.styles.keys() {
            self.styles.remove(property);
        }
        self.attributes.is_empty() && self.classes.is_empty() && self.styles.is_empty()
    }

    pub fn insert_children(&mut self, index: usize, nodes: Vec<ViewNode>) -> ViewResult<()> {
        if !self.kind.can_hold_children() {
            return Err(ViewError::CannotInsert(self.kind.name()));
        }
        let index = index.min(self.children.len());
        self.children.splice(index..index, nodes);
        Ok(())
    }

    pub fn append_child(&mut self, node: impl Into<ViewNode>) -> ViewResult<()> {
        let end = self.children.len();
        self.insert_children(end, vec![node.into()])
    }

    pub fn remove_children(&mut self, index: usize, how_many: usize) -> Vec<ViewNode> {
        let start = index.min(self.children.len());
        let end = (index + how_many).min(self.children.len());
        self.children.drain(start..end).collect()
    }

    pub(crate) fn children_mut(&mut self) -> &mut Vec<ViewNode> {
        &mut self.children
    }

    pub(crate) fn take_children(&mut self) -> Vec<ViewNode> {
        std::mem::take(&mut self.children)
    }

    pub(crate) fn rename(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub(crate) fn normalize(&mut self) {
        normalize_texts(&mut self.children);
    }

    pub fn node_at_path(&self, path: &[usize]) -> Option<&ViewNode> {
        let (last, parents) = path.split_last()?;
        self.element_at_path(parents)?.children.get(*last)
    }

    pub fn element_at_path(&self, path: &[usize]) -> Option<&ViewElement> {
        let mut current = self;
        for index in path {
            current = current.children.get(*index)?.as_element()?;
        }
        Some(current)
    }

    pub fn element_at_path_mut(&mut self, path: &[usize]) -> Option<&mut ViewElement> {
        let mut current = self;
        for index in path {
            current = current.children.get_mut(*index)?.as_element_mut()?;
        }
        Some(current)
    }

    pub fn find_path(&self, id: ViewNodeId) -> Option<Vec<usize>> {
        if self.id == id {
            return Some(Vec::new());
        }
        for (index, child) in self.children.iter().enumerate() {
            if let ViewNode::Element(element) = child {
                if let Some(mut path) = element.find_path(id) {
                    path.insert(0, index);
                    return Some(path);
                }
            }
        }
        None
    }
}

/// Detached view content, the result of parsing data or removing content
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ViewFragment {
    children: Vec<ViewNode>,
}

impl ViewFragment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_nodes(nodes: Vec<ViewNode>) -> Self {
        let mut children = nodes;
        normalize_texts(&mut children);
        Self { children }
    }

    pub fn children(&self) -> &[ViewNode] {
        &self.children
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn push(&mut self, node: impl Into<ViewNode>) {
        self.children.push(node.into());
        normalize_texts(&mut self.children);
    }

    pub fn into_children(self) -> Vec<ViewNode> {
        self.children
    }

    pub fn text_content(&self) -> String {
        self.children.iter().map(ViewNode::text_content).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_and_style_attributes() {
        let mut element = ViewElement::container("p")
            .with_attribute("class", "b a")
            .with_attribute("style", "color: red; font-weight:bold");

        assert!(element.has_class("a"));
        assert_eq!(element.get_attribute("class").as_deref(), Some("a b"));
        assert_eq!(element.get_style("color"), Some("red"));
        assert_eq!(element.get_attribute("style").as_deref(), Some("color:red;font-weight:bold"));

        assert!(element.remove_attribute("class"));
        assert_eq!(element.get_attribute("class"), None);
    }

    #[test]
    fn test_equality_ignores_ids() {
        let a = ViewElement::container("p").with_text("foo");
        let b = ViewElement::container("p").with_text("foo");
        assert_ne!(a.id(), b.id());
        assert_eq!(a, b);
    }

    #[test]
    fn test_adjacent_text_is_merged() {
        let element = ViewElement::container("p").with_text("fo").with_text("o").with_text("");
        assert_eq!(element.child_count(), 1);
        assert_eq!(element.text_content(), "foo");
    }

    #[test]
    fn test_joining_attribute_elements() {
        let bold = ViewElement::attribute("span", DEFAULT_PRIORITY).with_style("font-weight", "bold");
        let red = ViewElement::attribute("span", DEFAULT_PRIORITY).with_style("color", "red");
        let blue = ViewElement::attribute("span", DEFAULT_PRIORITY).with_style("color", "blue");

        assert!(bold.can_be_joined_with(&red));
        assert!(!red.can_be_joined_with(&blue));
        assert!(!ViewElement::container("span").can_be_joined_with(&red));
    }

    #[test]
    fn test_empty_element_rejects_children() {
        let mut image = ViewElement::empty("img");
        assert_eq!(image.append_child("x"), Err(ViewError::CannotInsert("emptyElement")));
    }

    #[test]
    fn test_type_check() {
        let node = ViewNode::from(ViewElement::attribute("strong", DEFAULT_PRIORITY));
        assert!(node.is("attributeElement", Some("strong")));
        assert!(node.is("element", None));
        assert!(!node.is("containerElement", None));
        assert!(ViewNode::from("x").is("$text", None));
    }
}
