//! # Upcast Dispatcher
//!
//! Builds a model [`DocumentFragment`] out of a view fragment.
//!
//! ## Design
//!
//! - Each view node fires one event: `element:<name>` for elements and
//!   `text` for text. Converters run in priority order, consume the parts
//!   of the view node they handled and report the model range they
//!   produced together with the cursor for the next sibling.
//! - Inserts go through the schema. When an element is not allowed at the
//!   cursor, its ancestors are split up to the closest one that allows it;
//!   the remaining content continues in the split-off part. Split parts
//!   that stay empty are removed at the end.
//! - Text that is not allowed where it lands is wrapped in a paragraph when
//!   a paragraph would be allowed there; whitespace-only text is dropped.
//! - Marker boundaries are converted to temporary `$marker` elements and
//!   turned into fragment markers once the whole fragment is converted.
//!
//! ```rust,ignore
//! let mut dispatcher = UpcastDispatcher::new();
//! dispatcher.on("text", Priority::Lowest, convert_text);
//! let fragment = dispatcher.convert(&view_fragment, &schema, SchemaContext::new(["$root"]))?;
//! ```

use crate::consumable::{name_only, ViewConsumable};
use crate::error::ConversionResult;
use folio_common::{matches_namespace, EventInfo, HandlerList, ListenerId, Priority};
use folio_model::{
    DocumentFragment, Element, ModelError, Node, NodeId, Position, Range, Schema, SchemaContext, Text, TreeWalker,
    TreeWalkerOptions, WalkerItem, FRAGMENT_ROOT_NAME,
};
use folio_view::{ViewElement, ViewFragment, ViewNode};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, instrument, trace, warn};

/// Temporary element standing for a marker boundary during upcast
pub const MARKER_ELEMENT: &str = "$marker";
/// Attribute of a `$marker` element holding the marker name
pub const MARKER_ELEMENT_NAME_ATTRIBUTE: &str = "data-name";

pub struct UpcastData<'v> {
    pub view_item: &'v ViewNode,
    /// Path of the view item inside the converted view fragment
    pub view_path: Vec<usize>,
    pub model_cursor: Position,
    /// Set by the converter that handled the item
    pub model_range: Option<Range>,
}

pub type UpcastHandler = Box<dyn Fn(&mut EventInfo, &mut UpcastData<'_>, &mut UpcastApi<'_>) -> ConversionResult<()>>;

pub struct UpcastDispatcher {
    handlers: HandlerList<(String, UpcastHandler)>,
    paragraph_element: String,
}

impl Default for UpcastDispatcher {
    fn default() -> Self {
        Self {
            handlers: HandlerList::new(),
            paragraph_element: "paragraph".to_string(),
        }
    }
}

impl std::fmt::Debug for UpcastDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpcastDispatcher")
            .field(
                "events",
                &self.handlers.iter().map(|(event, _)| event.as_str()).collect::<Vec<_>>(),
            )
            .field("paragraph_element", &self.paragraph_element)
            .finish()
    }
}

impl UpcastDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Element used to wrap text that is not allowed where it lands
    pub fn with_paragraph_element(mut self, name: impl Into<String>) -> Self {
        self.paragraph_element = name.into();
        self
    }

    pub fn paragraph_element(&self) -> &str {
        &self.paragraph_element
    }

    pub fn on<F>(&mut self, event: impl Into<String>, priority: Priority, handler: F) -> ListenerId
    where
        F: Fn(&mut EventInfo, &mut UpcastData<'_>, &mut UpcastApi<'_>) -> ConversionResult<()> + 'static,
    {
        self.handlers.insert(priority, (event.into(), Box::new(handler)))
    }

    pub fn off(&mut self, id: ListenerId) -> bool {
        self.handlers.remove(id).is_some()
    }

    /// Convert `fragment` for insertion into `context`
    #[instrument(skip_all, fields(nodes = fragment.child_count()))]
    pub fn convert(
        &self,
        fragment: &ViewFragment,
        schema: &Schema,
        context: SchemaContext,
    ) -> ConversionResult<DocumentFragment> {
        let mut api = UpcastApi {
            dispatcher: self,
            schema,
            consumable: ViewConsumable::from_fragment(fragment),
            fragment: DocumentFragment::new(),
            context,
            split_parts: BTreeMap::new(),
            split_origin: BTreeMap::new(),
            cursor_parents: BTreeMap::new(),
        };

        let mut cursor = api.fragment.start();
        for (index, child) in fragment.children().iter().enumerate() {
            let (_, next) = api.convert_item(child, vec![index], cursor)?;
            cursor = next;
        }

        api.remove_empty_split_parts()?;
        api.extract_marker_elements()?;
        debug!(offsets = api.fragment.max_offset(), markers = api.fragment.markers().len(), "Upcast finished");
        Ok(api.fragment)
    }

    fn fire(&self, data: &mut UpcastData<'_>, api: &mut UpcastApi<'_>) -> ConversionResult<()> {
        let event = match data.view_item {
            ViewNode::Element(element) => format!("element:{}", element.name()),
            ViewNode::Text(_) => "text".to_string(),
        };
        trace!(event = %event, "Firing upcast event");
        let mut info = EventInfo::new(event.as_str());
        for (registered, handler) in self.handlers.iter() {
            if !matches_namespace(registered, &event) {
                continue;
            }
            handler(&mut info, data, api)?;
            if info.is_stopped() {
                break;
            }
        }
        Ok(())
    }
}

/// What upcast converters get to work with
pub struct UpcastApi<'a> {
    dispatcher: &'a UpcastDispatcher,
    pub schema: &'a Schema,
    pub consumable: ViewConsumable,
    pub fragment: DocumentFragment,
    context: SchemaContext,
    /// Original element to the parts split off it
    split_parts: BTreeMap<NodeId, Vec<NodeId>>,
    split_origin: BTreeMap<NodeId, NodeId>,
    /// Inserted element to the split part its next sibling goes into
    cursor_parents: BTreeMap<NodeId, NodeId>,
}

impl UpcastApi<'_> {
    /// Convert one view node at `cursor`; returns the model range it
    /// produced and the cursor for the next sibling
    pub fn convert_item(
        &mut self,
        node: &ViewNode,
        view_path: Vec<usize>,
        cursor: Position,
    ) -> ConversionResult<(Option<Range>, Position)> {
        let dispatcher = self.dispatcher;
        let mut data = UpcastData {
            view_item: node,
            view_path,
            model_cursor: cursor,
            model_range: None,
        };
        dispatcher.fire(&mut data, self)?;

        if data.model_range.is_none() {
            if let ViewNode::Element(element) = node {
                warn!(element = element.name(), "View element was not converted");
            }
        }
        Ok((data.model_range, data.model_cursor))
    }

    /// Convert the children of `element` one after another starting at `cursor`
    pub fn convert_children(
        &mut self,
        element: &ViewElement,
        view_path: &[usize],
        cursor: Position,
    ) -> ConversionResult<(Range, Position)> {
        let start = cursor.clone();
        let mut end = cursor.clone();
        let mut next = cursor;
        for (index, child) in element.children().iter().enumerate() {
            let mut child_path = view_path.to_vec();
            child_path.push(index);
            let (range, cursor) = self.convert_item(child, child_path, next.clone())?;
            if let Some(range) = range {
                end = range.end().clone();
                next = cursor;
            }
        }
        let range = Range::new(start.clone(), end).unwrap_or_else(|_| Range::collapsed(start));
        Ok((range, next))
    }

    /// Schema context of the fragment element at `parent_path`
    pub fn schema_context(&self, parent_path: &[usize]) -> SchemaContext {
        let mut context = self.context.clone();
        let mut element = self.fragment.root_element();
        for offset in parent_path {
            match element.node_after(*offset).and_then(Node::as_element) {
                Some(child) => {
                    context.push(child.name());
                    element = child;
                }
                None => break,
            }
        }
        context
    }

    pub fn check_child(&self, position: &Position, name: &str) -> bool {
        self.schema.check_child(&self.schema_context(position.parent_path()), name)
    }

    /// Fragment path of the closest ancestor of `position` that accepts `name`
    pub fn find_allowed_parent(&self, position: &Position, name: &str) -> Option<Vec<usize>> {
        let mut path = position.parent_path().to_vec();
        loop {
            let context = self.schema_context(&path);
            if self.schema.check_child(&context, name) {
                return Some(path);
            }
            if context.last().map_or(true, |parent| self.schema.is_limit(parent)) {
                return None;
            }
            path.pop()?;
        }
    }

    /// `name` could go at `position` if it was wrapped in a paragraph
    pub fn is_paragraphable(&self, position: &Position, name: &str) -> bool {
        let paragraph = self.dispatcher.paragraph_element();
        let mut context = self.schema_context(position.parent_path());
        if !self.schema.check_child(&context, paragraph) {
            return false;
        }
        context.push(paragraph);
        self.schema.check_child(&context, name)
    }

    /// Insert an empty paragraph at `position`; returns the position inside it
    pub fn wrap_in_paragraph(&mut self, position: &Position) -> ConversionResult<Position> {
        let paragraph = Element::new(self.dispatcher.paragraph_element());
        self.insert(vec![paragraph.into()], position)?;
        Ok(position.child(0))
    }

    pub fn insert(&mut self, nodes: Vec<Node>, position: &Position) -> ConversionResult<()> {
        let parent = self
            .fragment
            .root_element_mut()
            .element_at_path_mut(position.parent_path())
            .ok_or_else(|| ModelError::invalid_path(FRAGMENT_ROOT_NAME, position.path()))?;
        parent.insert_at(position.offset(), nodes)?;
        Ok(())
    }

    /// Path of an element inside the fragment
    pub fn element_path(&self, id: NodeId) -> Option<Vec<usize>> {
        self.fragment.root_element().find_path(id)
    }

    /// Insert `element` at `position`, splitting ancestors until the schema
    /// allows it; returns `false` when no ancestor does
    pub fn safe_insert(&mut self, element: Element, position: &Position) -> ConversionResult<bool> {
        let id = element.id();
        let Some((position, cursor_parent)) = self.split_to_allowed_parent(position, element.name())? else {
            debug!(element = element.name(), "Element is not allowed here");
            return Ok(false);
        };
        self.insert(vec![element.into()], &position)?;
        if let Some(cursor_parent) = cursor_parent {
            self.cursor_parents.insert(id, cursor_parent);
        }
        Ok(true)
    }

    /// Split ancestors of `position` up to the closest one allowing `name`.
    /// Returns the position to insert at and the innermost split-off element.
    pub fn split_to_allowed_parent(
        &mut self,
        position: &Position,
        name: &str,
    ) -> ConversionResult<Option<(Position, Option<NodeId>)>> {
        let Some(allowed) = self.find_allowed_parent(position, name) else {
            return Ok(None);
        };
        let mut position = position.clone();
        let mut cursor_parent = None;
        while position.parent_path().len() > allowed.len() {
            let (next, part) = self.split_at(&position)?;
            if cursor_parent.is_none() {
                cursor_parent = Some(part);
            }
            position = next;
        }
        Ok(Some((position, cursor_parent)))
    }

    /// Move everything after `position` into a copy of its parent placed
    /// right after it
    fn split_at(&mut self, position: &Position) -> ConversionResult<(Position, NodeId)> {
        let parent_path = position.parent_path();
        let Some((&parent_offset, grand_path)) = parent_path.split_last() else {
            return Err(ModelError::invalid_path(FRAGMENT_ROOT_NAME, position.path()).into());
        };
        let root = self.fragment.root_element_mut();
        let parent = root
            .element_at_path_mut(parent_path)
            .ok_or_else(|| ModelError::invalid_path(FRAGMENT_ROOT_NAME, parent_path))?;
        let tail = parent.remove_range(position.offset(), parent.max_offset() - position.offset())?;
        let mut part = parent.clone_empty();
        part.append(tail);
        let (original, part_id) = (parent.id(), part.id());

        root.element_at_path_mut(grand_path)
            .ok_or_else(|| ModelError::invalid_path(FRAGMENT_ROOT_NAME, grand_path))?
            .insert_at(parent_offset + 1, vec![part.into()])?;

        let origin = self.split_origin.get(&original).copied().unwrap_or(original);
        self.split_origin.insert(part_id, origin);
        self.split_parts.entry(origin).or_default().push(part_id);
        trace!(element = %original, part = %part_id, "Split element");
        Ok((Position::at(FRAGMENT_ROOT_NAME, grand_path, parent_offset + 1), part_id))
    }

    /// Set the range and cursor after converting into `element`, taking
    /// the parts it was split into along the way into account
    pub fn update_conversion_result(&self, element: NodeId, data: &mut UpcastData<'_>) -> ConversionResult<()> {
        let last = self
            .split_parts
            .get(&element)
            .and_then(|parts| parts.last())
            .copied()
            .unwrap_or(element);
        let (Some(first_path), Some(mut last_path)) = (self.element_path(element), self.element_path(last)) else {
            return Ok(());
        };
        if let Some(offset) = last_path.last_mut() {
            *offset += 1;
        }
        let range = Range::new(
            Position::new(FRAGMENT_ROOT_NAME, first_path)?,
            Position::new(FRAGMENT_ROOT_NAME, last_path)?,
        )?;
        data.model_cursor = self
            .cursor_parents
            .get(&element)
            .and_then(|parent| self.element_path(*parent))
            .map(|path| Position::at_start(FRAGMENT_ROOT_NAME, &path))
            .unwrap_or_else(|| range.end().clone());
        data.model_range = Some(range);
        Ok(())
    }

    /// Set `key` on every node in `range` that allows it and does not have
    /// it yet; blocks that refuse it pass it on to their content. Returns
    /// `true` when some node allowed the attribute.
    pub fn set_attribute_on(&mut self, range: &Range, key: &str, value: &Value) -> ConversionResult<bool> {
        let options = TreeWalkerOptions {
            boundaries: Some(range.clone()),
            shallow: true,
            ignore_element_end: true,
            ..TreeWalkerOptions::default()
        };
        let Some(walker) = TreeWalker::new(&self.fragment, None, options) else {
            return Ok(false);
        };

        let mut targets = Vec::new();
        let mut nested = Vec::new();
        for step in walker {
            let start = step.previous_position.clone();
            let (name, has_key, size) = match &step.item {
                WalkerItem::Element { element, .. } => (element.name().to_string(), element.get_attribute(key).is_some(), 1),
                WalkerItem::Text { attributes, .. } => ("$text".to_string(), attributes.contains_key(key), step.length),
            };
            let mut context = self.schema_context(start.parent_path());
            context.push(name.as_str());
            if self.schema.check_attribute(&context, key) {
                targets.push((start, size, has_key));
            } else if name != "$text" && !self.schema.is_object(&name) {
                nested.push(start.path().to_vec());
            }
        }

        let mut applied = false;
        for (start, size, has_key) in targets {
            applied = true;
            if has_key {
                continue;
            }
            self.fragment
                .root_element_mut()
                .element_at_path_mut(start.parent_path())
                .ok_or_else(|| ModelError::invalid_path(FRAGMENT_ROOT_NAME, start.parent_path()))?
                .set_attribute_in_range(start.offset(), size, key, Some(value))?;
        }
        for path in nested {
            let inner = Range::in_element(&self.fragment, FRAGMENT_ROOT_NAME, &path)?;
            applied |= self.set_attribute_on(&inner, key, value)?;
        }
        Ok(applied)
    }

    /// Remove split parts left empty, repeating while removals empty out more
    fn remove_empty_split_parts(&mut self) -> ConversionResult<()> {
        loop {
            let candidates: Vec<NodeId> = self
                .split_parts
                .iter()
                .flat_map(|(origin, parts)| std::iter::once(*origin).chain(parts.iter().copied()))
                .collect();
            let mut removed = false;
            for id in candidates {
                let Some(path) = self.element_path(id) else {
                    continue;
                };
                let is_empty = self
                    .fragment
                    .root_element()
                    .element_at_path(&path)
                    .is_some_and(Element::is_empty);
                if is_empty {
                    self.remove_at(&path)?;
                    removed = true;
                }
            }
            if !removed {
                return Ok(());
            }
        }
    }

    fn remove_at(&mut self, node_path: &[usize]) -> ConversionResult<()> {
        let Some((&offset, parent_path)) = node_path.split_last() else {
            return Ok(());
        };
        self.fragment
            .root_element_mut()
            .element_at_path_mut(parent_path)
            .ok_or_else(|| ModelError::invalid_path(FRAGMENT_ROOT_NAME, parent_path))?
            .remove_range(offset, 1)?;
        Ok(())
    }

    /// Replace `$marker` elements with fragment markers
    ///
    /// A marker split over several blocks leaves a boundary pair in each of
    /// them. It spans from its first boundary to its last one; a lone
    /// boundary gives a collapsed marker.
    fn extract_marker_elements(&mut self) -> ConversionResult<()> {
        let mut boundaries: BTreeMap<String, (Position, Position)> = BTreeMap::new();
        while let Some((path, name)) = find_marker_element(self.fragment.root_element(), &mut Vec::new()) {
            self.remove_at(&path)?;
            let position = Position::new(FRAGMENT_ROOT_NAME, path)?;
            boundaries
                .entry(name)
                .and_modify(|(_, last)| *last = position.clone())
                .or_insert_with(|| (position.clone(), position));
        }
        for (name, (first, last)) in boundaries {
            self.fragment.set_marker(name, Range::new(first, last)?);
        }
        Ok(())
    }
}

/// First `$marker` element in document order
fn find_marker_element(element: &Element, path: &mut Vec<usize>) -> Option<(Vec<usize>, String)> {
    let mut offset = 0;
    for child in element.children() {
        if let Node::Element(child_element) = child {
            path.push(offset);
            if child_element.name() == MARKER_ELEMENT {
                let name = child_element
                    .get_attribute(MARKER_ELEMENT_NAME_ATTRIBUTE)
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                return Some((path.clone(), name));
            }
            if let Some(found) = find_marker_element(child_element, path) {
                return Some(found);
            }
            path.pop();
        }
        offset += child.offset_size();
    }
    None
}

/// Default converter for `text`
pub fn convert_text(_: &mut EventInfo, data: &mut UpcastData<'_>, api: &mut UpcastApi<'_>) -> ConversionResult<()> {
    let ViewNode::Text(text) = data.view_item else {
        return Ok(());
    };
    if api.consumable.test(&data.view_path, &name_only()) != Some(true) {
        return Ok(());
    }

    let mut position = data.model_cursor.clone();
    if !api.check_child(&position, "$text") {
        if !api.is_paragraphable(&position, "$text") {
            warn!(text = text.data(), "Text is not allowed here");
            return Ok(());
        }
        if text.data().trim().is_empty() {
            return Ok(());
        }
        position = api.wrap_in_paragraph(&position)?;
    }

    api.consumable.consume(&data.view_path, &name_only());
    api.insert(vec![Text::new(text.data()).into()], &position)?;
    let range = Range::from_position_and_shift(&position, text.len());
    data.model_cursor = range.end().clone();
    data.model_range = Some(range);
    Ok(())
}

/// Default converter for elements nothing else claimed: their content is
/// converted in place
pub fn convert_to_model_fragment(
    _: &mut EventInfo,
    data: &mut UpcastData<'_>,
    api: &mut UpcastApi<'_>,
) -> ConversionResult<()> {
    let ViewNode::Element(element) = data.view_item else {
        return Ok(());
    };
    if !api.consumable.consume(&data.view_path, &name_only()) {
        return Ok(());
    }
    let (range, cursor) = api.convert_children(element, &data.view_path, data.model_cursor.clone())?;
    data.model_range = Some(range);
    data.model_cursor = cursor;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_model::SchemaItemDefinition;
    use pretty_assertions::assert_eq;

    fn schema() -> Schema {
        let mut schema = Schema::new();
        schema
            .register("paragraph", SchemaItemDefinition::default().inherit_all_from("$block"))
            .expect("Failed to register paragraph");
        schema
    }

    fn dispatcher() -> UpcastDispatcher {
        let mut dispatcher = UpcastDispatcher::new();
        dispatcher.on("text", Priority::Lowest, convert_text);
        dispatcher.on("element", Priority::Lowest, convert_to_model_fragment);
        dispatcher
    }

    #[test]
    fn test_text_is_auto_paragraphed() {
        let view = ViewFragment::from_nodes(vec!["foo".into(), ViewElement::container("div").with_text("bar").into()]);
        let fragment = dispatcher()
            .convert(&view, &schema(), SchemaContext::new(["$root"]))
            .expect("Failed to convert");

        assert_eq!(fragment.children().len(), 1);
        let paragraph = fragment.children()[0].as_element().expect("Expected a paragraph");
        assert_eq!(paragraph.name(), "paragraph");
        assert_eq!(paragraph.text_content(), "foobar");
    }

    #[test]
    fn test_whitespace_is_not_auto_paragraphed() {
        let view = ViewFragment::from_nodes(vec!["  ".into()]);
        let fragment = dispatcher()
            .convert(&view, &schema(), SchemaContext::new(["$root"]))
            .expect("Failed to convert");
        assert!(fragment.is_empty());
    }

    #[test]
    fn test_text_in_block_context() {
        let view = ViewFragment::from_nodes(vec!["foo".into()]);
        let fragment = dispatcher()
            .convert(&view, &schema(), SchemaContext::new(["$root", "paragraph"]))
            .expect("Failed to convert");
        assert_eq!(fragment.children(), &[Node::from("foo")]);
    }

    #[test]
    fn test_marker_elements_become_markers() {
        let mut dispatcher = dispatcher();
        dispatcher.on("element:m", Priority::Normal, |_, data, api| {
            let ViewNode::Element(element) = data.view_item else {
                return Ok(());
            };
            let name = element.get_attribute("name").unwrap_or_default();
            api.consumable.consume(&data.view_path, &name_only());
            let marker = Element::new(MARKER_ELEMENT).with_attribute(MARKER_ELEMENT_NAME_ATTRIBUTE, name);
            api.insert(vec![marker.into()], &data.model_cursor)?;
            let range = Range::from_position_and_shift(&data.model_cursor, 1);
            data.model_cursor = range.end().clone();
            data.model_range = Some(range);
            Ok(())
        });

        let view = ViewFragment::from_nodes(vec!["fo".into(), ViewElement::ui("m").with_attribute("name", "c").into(), "ob".into(), ViewElement::ui("m").with_attribute("name", "c").into(), "ar".into()]);
        let fragment = dispatcher
            .convert(&view, &schema(), SchemaContext::new(["$root", "paragraph"]))
            .expect("Failed to convert");

        assert_eq!(fragment.text_content(), "foobar");
        let range = fragment.markers().get("c").expect("Marker c");
        assert_eq!(range.start(), &Position::at(FRAGMENT_ROOT_NAME, &[], 2));
        assert_eq!(range.end(), &Position::at(FRAGMENT_ROOT_NAME, &[], 4));
    }
}
