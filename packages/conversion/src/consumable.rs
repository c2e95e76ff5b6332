//! # Consumables
//!
//! Bookkeeping of what a conversion run has already handled.
//!
//! ## Design
//!
//! - Before a model change is dispatched, every item it touches is added to
//!   a [`ModelConsumable`] once per kind of change (`insert`,
//!   `attribute:bold`, `addMarker:comment:1`). A converter consumes the
//!   pair before acting and skips the item when that fails, which is how a
//!   higher priority converter overrides a lower one.
//! - [`ViewConsumable`] tracks the parts of each upcast view node: the
//!   element name, each attribute, each class and each style. Nodes are
//!   keyed by their path inside the converted fragment.

use folio_model::{NodeId, Range};
use folio_view::{MatchResult, ViewElement, ViewFragment, ViewNode};
use std::collections::BTreeMap;

/// A model item as the consumable sees it
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ConsumableItem {
    Element(NodeId),
    /// Text proxies and marker ranges are identified by their range
    Range(String),
    Selection,
}

impl ConsumableItem {
    pub fn range(range: &Range) -> Self {
        ConsumableItem::Range(range.to_string())
    }
}

/// `insert:paragraph` and `insert` are the same kind; so are
/// `attribute:bold:$text` and `attribute:bold`
pub fn normalize_kind(kind: &str) -> String {
    let mut parts = kind.split(':');
    match parts.next() {
        Some(first @ ("insert" | "remove")) => first.to_string(),
        Some("attribute") => match parts.next() {
            Some(key) => format!("attribute:{key}"),
            None => "attribute".to_string(),
        },
        _ => kind.to_string(),
    }
}

#[derive(Debug, Clone, Default)]
pub struct ModelConsumable {
    /// `true` while the pair is still available
    items: BTreeMap<(ConsumableItem, String), bool>,
}

impl ModelConsumable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, item: ConsumableItem, kind: &str) {
        self.items.insert((item, normalize_kind(kind)), true);
    }

    /// `None` when the pair was never added
    pub fn test(&self, item: &ConsumableItem, kind: &str) -> Option<bool> {
        self.items.get(&(item.clone(), normalize_kind(kind))).copied()
    }

    /// Returns `false` when the pair was never added or is already consumed
    pub fn consume(&mut self, item: &ConsumableItem, kind: &str) -> bool {
        match self.items.get_mut(&(item.clone(), normalize_kind(kind))) {
            Some(available) if *available => {
                *available = false;
                true
            }
            _ => false,
        }
    }

    /// Make a consumed pair available again; `None` when it was never added
    pub fn revert(&mut self, item: &ConsumableItem, kind: &str) -> Option<bool> {
        let available = self.items.get_mut(&(item.clone(), normalize_kind(kind)))?;
        let reverted = !*available;
        *available = true;
        Some(reverted)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Match result asking for the element name (or the text) only
pub fn name_only() -> MatchResult {
    MatchResult {
        name: true,
        ..MatchResult::default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct NodeConsumables {
    name: bool,
    attributes: BTreeMap<String, bool>,
    classes: BTreeMap<String, bool>,
    styles: BTreeMap<String, bool>,
}

impl NodeConsumables {
    fn of_element(element: &ViewElement) -> Self {
        Self {
            name: true,
            attributes: element.attributes().keys().map(|key| (key.clone(), true)).collect(),
            classes: element.classes().iter().map(|class| (class.clone(), true)).collect(),
            styles: element.styles().keys().map(|property| (property.clone(), true)).collect(),
        }
    }

    fn of_text() -> Self {
        Self {
            name: true,
            ..Self::default()
        }
    }

    fn test(&self, parts: &MatchResult) -> Option<bool> {
        let mut available = !parts.name || self.name;
        for (group, keys) in [
            (&self.attributes, &parts.attributes),
            (&self.classes, &parts.classes),
            (&self.styles, &parts.styles),
        ] {
            for key in keys {
                available &= *group.get(key)?;
            }
        }
        Some(available)
    }

    fn set(&mut self, parts: &MatchResult, value: bool) {
        if parts.name {
            self.name = value;
        }
        for (group, keys) in [
            (&mut self.attributes, &parts.attributes),
            (&mut self.classes, &parts.classes),
            (&mut self.styles, &parts.styles),
        ] {
            for key in keys {
                if let Some(flag) = group.get_mut(key) {
                    *flag = value;
                }
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ViewConsumable {
    nodes: BTreeMap<Vec<usize>, NodeConsumables>,
}

impl ViewConsumable {
    /// Every node of `fragment`, all parts available
    pub fn from_fragment(fragment: &ViewFragment) -> Self {
        let mut consumable = Self::default();
        for (index, child) in fragment.children().iter().enumerate() {
            consumable.add_node(vec![index], child);
        }
        consumable
    }

    fn add_node(&mut self, path: Vec<usize>, node: &ViewNode) {
        match node {
            ViewNode::Text(_) => {
                self.nodes.insert(path, NodeConsumables::of_text());
            }
            ViewNode::Element(element) => {
                for (index, child) in element.children().iter().enumerate() {
                    let mut child_path = path.clone();
                    child_path.push(index);
                    self.add_node(child_path, child);
                }
                self.nodes.insert(path, NodeConsumables::of_element(element));
            }
        }
    }

    /// `None` when the node or one of the parts is unknown
    pub fn test(&self, path: &[usize], parts: &MatchResult) -> Option<bool> {
        self.nodes.get(path)?.test(parts)
    }

    pub fn consume(&mut self, path: &[usize], parts: &MatchResult) -> bool {
        let Some(node) = self.nodes.get_mut(path) else {
            return false;
        };
        if node.test(parts) != Some(true) {
            return false;
        }
        node.set(parts, false);
        true
    }

    pub fn revert(&mut self, path: &[usize], parts: &MatchResult) {
        if let Some(node) = self.nodes.get_mut(path) {
            node.set(parts, true);
        }
    }
}
