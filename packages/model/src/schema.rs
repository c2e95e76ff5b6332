//! # Schema
//!
//! Describes which elements may contain what, which attributes they take
//! and how they behave for selection (block, inline, limit, object).
//!
//! Definitions reference each other (`allow_content_of`, `allow_where`,
//! `inherit_all_from`), so every registration recompiles the flat rule
//! tables that queries read from.
//!
//! ## Built-in items
//!
//! | Item              | Rules                                          |
//! |-------------------|------------------------------------------------|
//! | `$root`           | limit                                          |
//! | `$documentFragment` | limit                                        |
//! | `$container`      | allowed in `$root` and `$container`            |
//! | `$block`          | block, allowed in `$root` and `$container`     |
//! | `$blockObject`    | block object, allowed where `$block` is        |
//! | `$inlineObject`   | inline object, allowed where `$text` is        |
//! | `$text`           | inline content, allowed in `$block`            |

use crate::document::{TreeRoots, GRAVEYARD_ROOT_NAME};
use crate::error::{ModelError, ModelResult};
use crate::position::Position;
use crate::range::Range;
use crate::treewalker::{Direction, TreeWalker, TreeWalkerOptions, WalkerValueKind};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SchemaItemDefinition {
    pub allow_in: Vec<String>,
    pub allow_children: Vec<String>,
    pub allow_attributes: Vec<String>,
    pub allow_content_of: Vec<String>,
    pub allow_where: Vec<String>,
    pub allow_attributes_of: Vec<String>,
    pub inherit_types_from: Vec<String>,
    pub inherit_all_from: Option<String>,
    pub is_block: bool,
    pub is_inline: bool,
    pub is_limit: bool,
    pub is_object: bool,
    pub is_content: bool,
    pub is_selectable: bool,
}

impl SchemaItemDefinition {
    pub fn allow_in(mut self, parent: impl Into<String>) -> Self {
        self.allow_in.push(parent.into());
        self
    }

    pub fn allow_children(mut self, child: impl Into<String>) -> Self {
        self.allow_children.push(child.into());
        self
    }

    pub fn allow_attributes(mut self, key: impl Into<String>) -> Self {
        self.allow_attributes.push(key.into());
        self
    }

    pub fn allow_content_of(mut self, item: impl Into<String>) -> Self {
        self.allow_content_of.push(item.into());
        self
    }

    pub fn allow_where(mut self, item: impl Into<String>) -> Self {
        self.allow_where.push(item.into());
        self
    }

    pub fn allow_attributes_of(mut self, item: impl Into<String>) -> Self {
        self.allow_attributes_of.push(item.into());
        self
    }

    pub fn inherit_all_from(mut self, item: impl Into<String>) -> Self {
        self.inherit_all_from = Some(item.into());
        self
    }

    pub fn block(mut self) -> Self {
        self.is_block = true;
        self
    }

    pub fn inline(mut self) -> Self {
        self.is_inline = true;
        self
    }

    pub fn limit(mut self) -> Self {
        self.is_limit = true;
        self
    }

    pub fn object(mut self) -> Self {
        self.is_object = true;
        self
    }

    pub fn content(mut self) -> Self {
        self.is_content = true;
        self
    }

    fn merge(&mut self, other: SchemaItemDefinition) {
        self.allow_in.extend(other.allow_in);
        self.allow_children.extend(other.allow_children);
        self.allow_attributes.extend(other.allow_attributes);
        self.allow_content_of.extend(other.allow_content_of);
        self.allow_where.extend(other.allow_where);
        self.allow_attributes_of.extend(other.allow_attributes_of);
        self.inherit_types_from.extend(other.inherit_types_from);
        if other.inherit_all_from.is_some() {
            self.inherit_all_from = other.inherit_all_from;
        }
        self.is_block |= other.is_block;
        self.is_inline |= other.is_inline;
        self.is_limit |= other.is_limit;
        self.is_object |= other.is_object;
        self.is_content |= other.is_content;
        self.is_selectable |= other.is_selectable;
    }
}

/// Rules of one item after every reference was resolved
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompiledItem {
    pub allow_in: BTreeSet<String>,
    pub allow_attributes: BTreeSet<String>,
    pub is_block: bool,
    pub is_inline: bool,
    pub is_limit: bool,
    pub is_object: bool,
    pub is_content: bool,
    pub is_selectable: bool,
}

/// Names of a node's ancestors, outermost first
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaContext {
    items: Vec<String>,
}

impl SchemaContext {
    pub fn new<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            items: items.into_iter().map(Into::into).collect(),
        }
    }

    /// Ancestors of `position`, the parent element included
    pub fn from_position<T: TreeRoots>(tree: &T, position: &Position) -> Self {
        Self::from_element_path(tree, position.root_name(), position.parent_path())
    }

    /// The element at `path` and all its ancestors
    pub fn from_element_path<T: TreeRoots>(tree: &T, root: &str, path: &[usize]) -> Self {
        let Some(mut element) = tree.root(root) else {
            return Self::default();
        };
        let mut items = vec![element.name().to_string()];
        for offset in path {
            match element.node_after(*offset).and_then(|node| node.as_element()) {
                Some(child) => {
                    items.push(child.name().to_string());
                    element = child;
                }
                None => return Self::default(),
            }
        }
        Self { items }
    }

    pub fn push(&mut self, name: impl Into<String>) {
        self.items.push(name.into());
    }

    pub fn last(&self) -> Option<&str> {
        self.items.last().map(String::as_str)
    }

    pub fn items(&self) -> &[String] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionDirection {
    #[default]
    Both,
    Forward,
    Backward,
}

#[derive(Debug, Clone)]
pub struct Schema {
    definitions: BTreeMap<String, SchemaItemDefinition>,
    compiled: BTreeMap<String, CompiledItem>,
}

impl Default for Schema {
    fn default() -> Self {
        Self::new()
    }
}

impl Schema {
    /// A schema with the built-in generic items
    pub fn new() -> Self {
        let mut schema = Self {
            definitions: BTreeMap::new(),
            compiled: BTreeMap::new(),
        };
        let builtins = [
            ("$root", SchemaItemDefinition::default().limit()),
            ("$documentFragment", SchemaItemDefinition::default().limit()),
            ("$container", SchemaItemDefinition::default().allow_in("$root").allow_in("$container")),
            ("$block", SchemaItemDefinition::default().allow_in("$root").allow_in("$container").block()),
            ("$blockObject", SchemaItemDefinition::default().allow_where("$block").block().object()),
            (
                "$inlineObject",
                SchemaItemDefinition::default()
                    .allow_where("$text")
                    .allow_attributes_of("$text")
                    .inline()
                    .object(),
            ),
            ("$text", SchemaItemDefinition::default().allow_in("$block").inline().content()),
        ];
        for (name, definition) in builtins {
            schema.definitions.insert(name.to_string(), definition);
        }
        schema.compile();
        schema
    }

    pub fn register(&mut self, name: &str, definition: SchemaItemDefinition) -> ModelResult<()> {
        if self.definitions.contains_key(name) {
            return Err(ModelError::SchemaItemExists(name.to_string()));
        }
        debug!(item = name, "Registering schema item");
        self.definitions.insert(name.to_string(), definition);
        self.compile();
        Ok(())
    }

    /// Add rules to an already registered item
    pub fn extend(&mut self, name: &str, definition: SchemaItemDefinition) -> ModelResult<()> {
        let existing = self
            .definitions
            .get_mut(name)
            .ok_or_else(|| ModelError::UnknownSchemaItem(name.to_string()))?;
        existing.merge(definition);
        self.compile();
        Ok(())
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.compiled.contains_key(name)
    }

    pub fn get_definition(&self, name: &str) -> Option<&CompiledItem> {
        self.compiled.get(name)
    }

    fn compile(&mut self) {
        let mut allow_in: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        let mut attributes: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

        for (name, definition) in &self.definitions {
            allow_in
                .entry(name.clone())
                .or_default()
                .extend(definition.allow_in.iter().cloned());
            attributes
                .entry(name.clone())
                .or_default()
                .extend(definition.allow_attributes.iter().cloned());
            for child in &definition.allow_children {
                allow_in.entry(child.clone()).or_default().insert(name.clone());
            }
        }

        // References can chain, so resolve until nothing changes
        loop {
            let mut changed = false;
            for (name, definition) in &self.definitions {
                let inherited = definition.inherit_all_from.iter();
                for source in definition.allow_content_of.iter().chain(inherited.clone()) {
                    let children: Vec<String> = allow_in
                        .iter()
                        .filter(|(_, parents)| parents.contains(source))
                        .map(|(child, _)| child.clone())
                        .collect();
                    for child in children {
                        changed |= allow_in.entry(child).or_default().insert(name.clone());
                    }
                }
                for source in definition.allow_where.iter().chain(inherited.clone()) {
                    let parents = allow_in.get(source).cloned().unwrap_or_default();
                    let own = allow_in.entry(name.clone()).or_default();
                    for parent in parents {
                        changed |= own.insert(parent);
                    }
                }
                for source in definition.allow_attributes_of.iter().chain(inherited) {
                    let keys = attributes.get(source).cloned().unwrap_or_default();
                    let own = attributes.entry(name.clone()).or_default();
                    for key in keys {
                        changed |= own.insert(key);
                    }
                }
            }
            if !changed {
                break;
            }
        }

        self.compiled = self
            .definitions
            .keys()
            .map(|name| {
                let mut item = CompiledItem {
                    allow_in: allow_in.remove(name).unwrap_or_default(),
                    allow_attributes: attributes.remove(name).unwrap_or_default(),
                    ..Default::default()
                };
                self.collect_flags(name, &mut item, &mut BTreeSet::new());
                (name.clone(), item)
            })
            .collect();
    }

    fn collect_flags(&self, name: &str, item: &mut CompiledItem, visited: &mut BTreeSet<String>) {
        if !visited.insert(name.to_string()) {
            return;
        }
        let Some(definition) = self.definitions.get(name) else {
            return;
        };
        item.is_block |= definition.is_block;
        item.is_inline |= definition.is_inline;
        item.is_limit |= definition.is_limit;
        item.is_object |= definition.is_object;
        item.is_content |= definition.is_content;
        item.is_selectable |= definition.is_selectable;
        for source in definition
            .inherit_types_from
            .iter()
            .chain(definition.inherit_all_from.iter())
        {
            self.collect_flags(source, item, visited);
        }
    }

    pub fn check_child(&self, context: &SchemaContext, child: &str) -> bool {
        let Some(parent) = context.last() else {
            return false;
        };
        if parent == "$graveyard" {
            return true;
        }
        self.compiled
            .get(child)
            .is_some_and(|item| item.allow_in.contains(parent))
    }

    pub fn check_attribute(&self, context: &SchemaContext, key: &str) -> bool {
        context
            .last()
            .and_then(|name| self.compiled.get(name))
            .is_some_and(|item| item.allow_attributes.contains(key))
    }

    /// Objects are limits too
    pub fn is_limit(&self, name: &str) -> bool {
        self.compiled
            .get(name)
            .is_some_and(|item| item.is_limit || item.is_object)
    }

    pub fn is_object(&self, name: &str) -> bool {
        self.compiled.get(name).is_some_and(|item| item.is_object)
    }

    pub fn is_block(&self, name: &str) -> bool {
        self.compiled.get(name).is_some_and(|item| item.is_block)
    }

    pub fn is_inline(&self, name: &str) -> bool {
        self.compiled.get(name).is_some_and(|item| item.is_inline)
    }

    pub fn is_content(&self, name: &str) -> bool {
        self.compiled
            .get(name)
            .is_some_and(|item| item.is_content || item.is_object)
    }

    pub fn is_selectable(&self, name: &str) -> bool {
        self.compiled
            .get(name)
            .is_some_and(|item| item.is_selectable || item.is_object)
    }

    /// Whether text may be typed at `position`
    pub fn can_hold_text<T: TreeRoots>(&self, tree: &T, position: &Position) -> bool {
        self.check_child(&SchemaContext::from_position(tree, position), "$text")
    }

    /// Path of the deepest limit element holding `position`, or the root
    pub fn limit_element_path<T: TreeRoots>(&self, tree: &T, position: &Position) -> Vec<usize> {
        let context = SchemaContext::from_position(tree, position);
        let parent_path = position.parent_path();
        for depth in (0..context.items().len()).rev() {
            if self.is_limit(&context.items()[depth]) {
                return parent_path[..depth].to_vec();
            }
        }
        Vec::new()
    }

    /// Closest range around `position` where a selection may be placed
    ///
    /// Walks away from `position` inside its limit element, alternating
    /// backward and forward when `direction` is `Both`, and stops at the
    /// first object (selected whole) or the first place that accepts text.
    pub fn get_nearest_selection_range<T: TreeRoots>(
        &self,
        tree: &T,
        position: &Position,
        direction: SelectionDirection,
    ) -> Option<Range> {
        if position.root_name() == GRAVEYARD_ROOT_NAME {
            return None;
        }
        if self.can_hold_text(tree, position) {
            return Some(Range::collapsed(position.clone()));
        }

        let limit_path = self.limit_element_path(tree, position);
        let boundaries = Range::in_element(tree, position.root_name(), &limit_path).ok()?;
        let walker = |walk: Direction| {
            TreeWalker::new(
                tree,
                Some(position.clone()),
                TreeWalkerOptions {
                    direction: walk,
                    boundaries: Some(boundaries.clone()),
                    ..Default::default()
                },
            )
        };
        let mut backward = match direction {
            SelectionDirection::Both | SelectionDirection::Backward => walker(Direction::Backward),
            SelectionDirection::Forward => None,
        };
        let mut forward = match direction {
            SelectionDirection::Both | SelectionDirection::Forward => walker(Direction::Forward),
            SelectionDirection::Backward => None,
        };

        loop {
            let mut progressed = false;
            for (walker, entering) in [
                (&mut backward, WalkerValueKind::ElementEnd),
                (&mut forward, WalkerValueKind::ElementStart),
            ] {
                let Some(value) = walker.as_mut().and_then(Iterator::next) else {
                    *walker = None;
                    continue;
                };
                progressed = true;
                if value.kind == entering {
                    if let Some(element) = value.item.as_element() {
                        if self.is_object(element.name()) {
                            if let crate::treewalker::WalkerItem::Element { path, .. } = &value.item {
                                return Range::on(tree, position.root_name(), path).ok();
                            }
                        }
                    }
                }
                if self.can_hold_text(tree, &value.next_position) {
                    return Some(Range::collapsed(value.next_position));
                }
            }
            if !progressed {
                return None;
            }
        }
    }

    /// Path of the closest ancestor of `position` that accepts `name`
    ///
    /// Stops at limit elements.
    pub fn find_allowed_parent<T: TreeRoots>(&self, tree: &T, position: &Position, name: &str) -> Option<Vec<usize>> {
        let mut path = position.parent_path().to_vec();
        loop {
            let context = SchemaContext::from_element_path(tree, position.root_name(), &path);
            if self.check_child(&context, name) {
                return Some(path);
            }
            if context.last().map_or(true, |parent| self.is_limit(parent)) {
                return None;
            }
            path.pop()?;
        }
    }
}
