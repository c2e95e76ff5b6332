//! # Downcast Writer
//!
//! The only way the view tree changes. Conversion gets one inside
//! [`View::change`](crate::View::change).
//!
//! ## Design
//!
//! - Structural changes happen in a container: positions inside attribute
//!   elements are first "broken" up to the nearest container, so an insert
//!   in the middle of `<strong>foo</strong>` splits it in two
//! - After every change, adjacent similar attribute elements and adjacent
//!   texts at the touched boundaries are merged again
//! - Wrapping nests attribute elements by priority: the lower priority ends
//!   up outside, ties are ordered by name and attributes
//!
//! ```text
//! <p><b>fo|o</b></p>  insert "x"  ->  <p><b>fo</b>x<b>o</b></p>
//! <p>[foo]</p>        wrap <b>    ->  <p><b>foo</b></p>
//! ```

use crate::document::ViewDocument;
use crate::error::{ViewError, ViewResult};
use crate::node::{normalize_texts, ElementKind, ViewElement, ViewFragment, ViewNode, ViewNodeId, ViewText, DEFAULT_PRIORITY};
use crate::position::{ViewPosition, ViewRange};
use tracing::trace;

pub struct DowncastWriter<'a> {
    document: &'a mut ViewDocument,
}

impl<'a> DowncastWriter<'a> {
    pub fn new(document: &'a mut ViewDocument) -> Self {
        Self { document }
    }

    pub fn document(&self) -> &ViewDocument {
        self.document
    }

    pub fn create_text(&self, data: &str) -> ViewText {
        ViewText::new(data)
    }

    pub fn create_container_element(&self, name: &str, attributes: &[(&str, &str)]) -> ViewElement {
        ViewElement::container(name).with_attributes(attributes.iter().copied())
    }

    pub fn create_attribute_element(
        &self,
        name: &str,
        attributes: &[(&str, &str)],
        priority: Option<i32>,
        id: Option<&str>,
    ) -> ViewElement {
        let element = ViewElement::attribute(name, priority.unwrap_or(DEFAULT_PRIORITY))
            .with_attributes(attributes.iter().copied());
        match id {
            Some(id) => element.with_id(id),
            None => element,
        }
    }

    pub fn create_empty_element(&self, name: &str, attributes: &[(&str, &str)]) -> ViewElement {
        ViewElement::empty(name).with_attributes(attributes.iter().copied())
    }

    pub fn create_ui_element(&self, name: &str, attributes: &[(&str, &str)]) -> ViewElement {
        ViewElement::ui(name).with_attributes(attributes.iter().copied())
    }

    pub fn create_raw_element(&self, name: &str, attributes: &[(&str, &str)], html: &str) -> ViewElement {
        ViewElement::raw(name, html).with_attributes(attributes.iter().copied())
    }

    pub fn create_editable_element(&self, name: &str, attributes: &[(&str, &str)]) -> ViewElement {
        ViewElement::editable(name).with_attributes(attributes.iter().copied())
    }

    /// Insert nodes, breaking attribute elements at `position` first.
    /// Returns the range the nodes ended up in after merging.
    pub fn insert(&mut self, position: &ViewPosition, nodes: Vec<ViewNode>) -> ViewResult<ViewRange> {
        let mut nodes = nodes;
        normalize_texts(&mut nodes);
        trace!(%position, count = nodes.len(), "View insert");

        let root = self.document.root_mut(position.root_name())?;
        position.validate(root)?;
        let insertion = break_attributes(root, position)?;
        let length = nodes.len();

        let parent = element_mut(root, &insertion, insertion.parent_path())?;
        if !parent.kind().can_hold_children() {
            return Err(ViewError::CannotInsert(parent.kind().name()));
        }
        parent.insert_children(insertion.offset(), nodes)?;

        let start = merge_attributes(root, &insertion)?;
        if length == 0 {
            return Ok(ViewRange::collapsed(start));
        }
        let mut end = insertion.shifted_by(length as isize);
        if start != insertion {
            end = end.shifted_by(-1);
        }
        let end = merge_attributes(root, &end)?;
        ViewRange::new(start, end)
    }

    /// Remove the content of a range whose ends share a container
    pub fn remove(&mut self, range: &ViewRange) -> ViewResult<ViewFragment> {
        trace!(%range, "View remove");
        let root = self.document.root_mut(range.root_name())?;
        let broken = break_attributes_range(root, range)?;
        if broken.is_collapsed() {
            return Ok(ViewFragment::new());
        }

        let start = broken.start();
        let count = broken.end().offset() - start.offset();
        let removed = element_mut(root, start, start.parent_path())?.remove_children(start.offset(), count);
        merge_attributes(root, start)?;
        Ok(ViewFragment::from_nodes(removed))
    }

    /// Remove a single element (a marker's UI element, for example)
    pub fn remove_element(&mut self, id: ViewNodeId) -> ViewResult<ViewNode> {
        let (root_name, path) = self.locate(id)?;
        let position = ViewPosition::before(&root_name, &path)?;
        let root = self.document.root_mut(&root_name)?;
        let mut removed = element_mut(root, &position, position.parent_path())?.remove_children(position.offset(), 1);
        merge_attributes(root, &position)?;
        removed.pop().ok_or(ViewError::UnknownElement(id.0))
    }

    pub fn r#move(&mut self, source: &ViewRange, target: &ViewPosition) -> ViewResult<ViewRange> {
        if source.is_collapsed() {
            return Ok(ViewRange::collapsed(target.clone()));
        }
        if source.root_name() != target.root_name() || !target.is_after(source.end()) {
            let nodes = self.remove(source)?.into_children();
            return self.insert(target, nodes);
        }

        // Content before the target goes away, so the target is fixed up by
        // however much the source container shrank.
        let root = self.document.root_mut(target.root_name())?;
        let target = break_attributes(root, target)?;
        let container = container_path(root, source.start());
        let count_before = element_mut(root, source.start(), &container)?.child_count();
        let nodes = self.remove(source)?.into_children();

        let root = self.document.root_mut(target.root_name())?;
        let count_after = element_mut(root, &target, &container)?.child_count();
        let target = if target.path().len() > container.len() && target.path().starts_with(&container) {
            target.shifted_at_depth(container.len(), count_after as isize - count_before as isize)
        } else {
            target
        };
        self.insert(&target, nodes)
    }

    /// Wrap a range whose ends share a container in an attribute element
    pub fn wrap(&mut self, range: &ViewRange, attribute: &ViewElement) -> ViewResult<ViewRange> {
        if !attribute.is_attribute() {
            return Err(ViewError::InvalidWrapper);
        }
        if range.is_collapsed() {
            return Ok(range.clone());
        }
        trace!(%range, wrapper = attribute.name(), "View wrap");

        let root = self.document.root_mut(range.root_name())?;
        let broken = break_attributes_range(root, range)?;
        let parent_path = broken.start().parent_path().to_vec();
        let (start, end) = wrap_children(
            root,
            range.root_name(),
            &parent_path,
            broken.start().offset(),
            broken.end().offset(),
            attribute,
        )?;
        finish_range(root, range.root_name(), &parent_path, start, end)
    }

    /// Remove an attribute element (or its attributes) from a range
    pub fn unwrap(&mut self, range: &ViewRange, attribute: &ViewElement) -> ViewResult<ViewRange> {
        if !attribute.is_attribute() {
            return Err(ViewError::InvalidWrapper);
        }
        if range.is_collapsed() {
            return Ok(range.clone());
        }
        trace!(%range, wrapper = attribute.name(), "View unwrap");

        let root = self.document.root_mut(range.root_name())?;
        let broken = break_attributes_range(root, range)?;
        let parent_path = broken.start().parent_path().to_vec();
        let (start, end) = unwrap_children(
            root,
            range.root_name(),
            &parent_path,
            broken.start().offset(),
            broken.end().offset(),
            attribute,
        )?;
        finish_range(root, range.root_name(), &parent_path, start, end)
    }

    pub fn rename(&mut self, id: ViewNodeId, new_name: &str) -> ViewResult<()> {
        self.with_element(id, |element| element.rename(new_name))
    }

    pub fn set_attribute(&mut self, key: &str, value: &str, id: ViewNodeId) -> ViewResult<()> {
        self.with_element(id, |element| element.set_attribute(key, value.to_string()))
    }

    pub fn remove_attribute(&mut self, key: &str, id: ViewNodeId) -> ViewResult<()> {
        self.with_element(id, |element| {
            element.remove_attribute(key);
        })
    }

    pub fn add_class(&mut self, class: &str, id: ViewNodeId) -> ViewResult<()> {
        self.with_element(id, |element| element.add_class(class))
    }

    pub fn remove_class(&mut self, class: &str, id: ViewNodeId) -> ViewResult<()> {
        self.with_element(id, |element| {
            element.remove_class(class);
        })
    }

    pub fn set_style(&mut self, property: &str, value: &str, id: ViewNodeId) -> ViewResult<()> {
        self.with_element(id, |element| element.set_style(property, value))
    }

    pub fn remove_style(&mut self, property: &str, id: ViewNodeId) -> ViewResult<()> {
        self.with_element(id, |element| {
            element.remove_style(property);
        })
    }

    /// Split attribute elements up to the nearest container
    pub fn break_attributes(&mut self, position: &ViewPosition) -> ViewResult<ViewPosition> {
        let root = self.document.root_mut(position.root_name())?;
        break_attributes(root, position)
    }

    /// Split the container `position` is in; returns the position between
    /// the two halves
    pub fn break_container(&mut self, position: &ViewPosition) -> ViewResult<ViewPosition> {
        let root = self.document.root_mut(position.root_name())?;
        let parent = element_mut(root, position, position.parent_path())?;
        if !parent.is_container() {
            return Err(ViewError::CannotBreak(parent.kind().name()));
        }
        let Some(before_container) = position.parent_position() else {
            return Err(ViewError::CannotBreak(ElementKind::Root.name()));
        };

        let offset = position.offset();
        let count = parent.child_count();
        if offset == 0 {
            return Ok(before_container);
        }
        if offset >= count {
            return Ok(before_container.shifted_by(1));
        }

        let moved = parent.remove_children(offset, count - offset);
        let mut clone = parent.clone_empty();
        clone.insert_children(0, moved)?;
        let grand_parent = element_mut(root, position, before_container.parent_path())?;
        grand_parent.insert_children(before_container.offset() + 1, vec![clone.into()])?;
        Ok(before_container.shifted_by(1))
    }

    pub fn merge_attributes(&mut self, position: &ViewPosition) -> ViewResult<ViewPosition> {
        let root = self.document.root_mut(position.root_name())?;
        merge_attributes(root, position)
    }

    /// Merge the containers on both sides of `position`; returns the position
    /// where they were joined
    pub fn merge_containers(&mut self, position: &ViewPosition) -> ViewResult<ViewPosition> {
        let root = self.document.root_mut(position.root_name())?;
        let offset = position.offset();
        let parent = element_mut(root, position, position.parent_path())?;
        let before_is_container = offset > 0
            && parent
                .get_child(offset - 1)
                .and_then(ViewNode::as_element)
                .is_some_and(ViewElement::is_container);
        let after_is_container = parent
            .get_child(offset)
            .and_then(ViewNode::as_element)
            .is_some_and(ViewElement::is_container);
        if !before_is_container || !after_is_container {
            return Err(ViewError::CannotBreak(ElementKind::Container.name()));
        }

        let children = match parent.remove_children(offset, 1).pop() {
            Some(ViewNode::Element(mut next)) => next.take_children(),
            _ => Vec::new(),
        };
        let before_path = child_path(position.parent_path(), offset - 1);
        let before = element_mut(root, position, &before_path)?;
        let joint = before.child_count();
        before.insert_children(joint, children)?;
        merge_attributes(root, &ViewPosition::at(position.root_name(), &before_path, joint))
    }

    pub fn set_selection(&mut self, ranges: Vec<ViewRange>, backward: bool) {
        self.document.selection_mut().set_to(ranges, backward);
    }

    /// A fake selection hides the DOM selection and exposes `label` to
    /// assistive technology instead
    pub fn set_fake_selection(&mut self, label: Option<&str>) {
        self.document.selection_mut().set_fake(label.is_some(), label.unwrap_or_default());
    }

    fn locate(&self, id: ViewNodeId) -> ViewResult<(String, Vec<usize>)> {
        self.document.find_element(id).ok_or(ViewError::UnknownElement(id.0))
    }

    fn with_element(&mut self, id: ViewNodeId, f: impl FnOnce(&mut ViewElement)) -> ViewResult<()> {
        let (root_name, path) = self.locate(id)?;
        let root = self.document.root_mut(&root_name)?;
        let element = root
            .element_at_path_mut(&path)
            .ok_or_else(|| ViewError::invalid_path(&root_name, &path))?;
        f(element);
        Ok(())
    }
}

fn child_path(parent_path: &[usize], index: usize) -> Vec<usize> {
    let mut path = parent_path.to_vec();
    path.push(index);
    path
}

fn element_mut<'r>(root: &'r mut ViewElement, position: &ViewPosition, path: &[usize]) -> ViewResult<&'r mut ViewElement> {
    root.element_at_path_mut(path)
        .ok_or_else(|| ViewError::invalid_path(position.root_name(), path))
}

/// Path of the nearest ancestor that is neither text nor an attribute element
fn container_path(root: &ViewElement, position: &ViewPosition) -> Vec<usize> {
    let mut path = position.parent_path().to_vec();
    while !path.is_empty() {
        match root.node_at_path(&path) {
            Some(ViewNode::Text(_)) => {}
            Some(ViewNode::Element(element)) if element.is_attribute() => {}
            _ => break,
        }
        path.pop();
    }
    path
}

/// Split the text node `position` is in, if any
fn break_text(root: &mut ViewElement, position: &ViewPosition) -> ViewResult<ViewPosition> {
    if !position.is_in_text(root) {
        return Ok(position.clone());
    }
    let text_path = position.parent_path();
    let Some((&index, parent_path)) = text_path.split_last() else {
        return Ok(position.clone());
    };
    let before_text = ViewPosition::at(position.root_name(), parent_path, index);

    let Some(ViewNode::Text(text)) = root.node_at_path(text_path) else {
        return Err(ViewError::invalid_path(position.root_name(), text_path));
    };
    let offset = position.offset();
    if offset == 0 {
        return Ok(before_text);
    }
    if offset >= text.len() {
        return Ok(before_text.shifted_by(1));
    }

    let (left, right) = text.split_at(offset);
    let parent = element_mut(root, position, parent_path)?;
    parent.remove_children(index, 1);
    parent.insert_children(index, vec![left.into(), right.into()])?;
    Ok(before_text.shifted_by(1))
}

fn break_attributes(root: &mut ViewElement, position: &ViewPosition) -> ViewResult<ViewPosition> {
    let mut position = break_text(root, position)?;
    loop {
        let parent = element_mut(root, &position, position.parent_path())?;
        match parent.kind() {
            ElementKind::Attribute { .. } => {}
            ElementKind::Empty | ElementKind::Ui | ElementKind::Raw { .. } => {
                return Err(ViewError::CannotBreak(parent.kind().name()));
            }
            _ => return Ok(position),
        }
        let Some(before_parent) = position.parent_position() else {
            return Ok(position);
        };

        let offset = position.offset();
        let count = parent.child_count();
        position = if offset == 0 {
            before_parent
        } else if offset >= count {
            before_parent.shifted_by(1)
        } else {
            let moved = parent.remove_children(offset, count - offset);
            let mut clone = parent.clone_empty();
            clone.insert_children(0, moved)?;
            let grand_parent = element_mut(root, &before_parent, before_parent.parent_path())?;
            grand_parent.insert_children(before_parent.offset() + 1, vec![clone.into()])?;
            before_parent.shifted_by(1)
        };
    }
}

/// Break both ends; the result is a flat range in the shared container
fn break_attributes_range(root: &mut ViewElement, range: &ViewRange) -> ViewResult<ViewRange> {
    if container_path(root, range.start()) != container_path(root, range.end()) {
        return Err(ViewError::InvalidRangeContainer);
    }
    if range.is_collapsed() {
        let position = break_attributes(root, range.start())?;
        return Ok(ViewRange::collapsed(position));
    }

    let end = break_attributes(root, range.end())?;
    let count = element_mut(root, &end, end.parent_path())?.child_count();
    let start = break_attributes(root, range.start())?;
    let grown = element_mut(root, &end, end.parent_path())?.child_count() - count;
    ViewRange::new(start, end.shifted_by(grown as isize))
}

/// Join similar attribute elements and texts meeting at `position`
fn merge_attributes(root: &mut ViewElement, position: &ViewPosition) -> ViewResult<ViewPosition> {
    if position.is_in_text(root) {
        return Ok(position.clone());
    }
    let parent_path = position.parent_path().to_vec();
    let parent = element_mut(root, position, &parent_path)?;

    if parent.is_attribute() && parent.is_empty() {
        if let Some(before_parent) = position.parent_position() {
            element_mut(root, position, before_parent.parent_path())?.remove_children(before_parent.offset(), 1);
            return merge_attributes(root, &before_parent);
        }
    }

    let offset = position.offset();
    if offset == 0 {
        return Ok(position.clone());
    }
    let before_path = child_path(&parent_path, offset - 1);

    match (parent.get_child(offset - 1), parent.get_child(offset)) {
        (Some(ViewNode::Text(before)), Some(ViewNode::Text(after))) => {
            let joint = before.len();
            let data = after.data().to_string();
            parent.remove_children(offset, 1);
            if let Some(ViewNode::Text(before)) = parent.get_child_mut(offset - 1) {
                before.insert_str(joint, &data);
            }
            Ok(ViewPosition::at(position.root_name(), &before_path, joint))
        }
        (Some(ViewNode::Element(before)), Some(ViewNode::Element(after)))
            if before.is_attribute() && before.is_similar(after) =>
        {
            let joint = before.child_count();
            let children = match parent.remove_children(offset, 1).pop() {
                Some(ViewNode::Element(mut after)) => after.take_children(),
                _ => Vec::new(),
            };
            element_mut(root, position, &before_path)?.insert_children(joint, children)?;
            merge_attributes(root, &ViewPosition::at(position.root_name(), &before_path, joint))
        }
        _ => Ok(position.clone()),
    }
}

/// Merge at both ends of a freshly wrapped or unwrapped span
fn finish_range(root: &mut ViewElement, root_name: &str, parent_path: &[usize], start: usize, end: usize) -> ViewResult<ViewRange> {
    let range_start = ViewPosition::at(root_name, parent_path, start);
    let merged_start = merge_attributes(root, &range_start)?;
    let end = if merged_start != range_start { end - 1 } else { end };
    let merged_end = merge_attributes(root, &ViewPosition::at(root_name, parent_path, end))?;
    ViewRange::new(merged_start, merged_end)
}

fn identity(element: &ViewElement) -> String {
    format!("{}{:?}{:?}{:?}", element.name(), element.classes(), element.styles(), element.attributes())
}

/// Whether `a` must be placed outside `b` when both wrap the same content
fn should_be_outside(a: &ViewElement, b: &ViewElement) -> bool {
    let (a_priority, b_priority) = (a.priority().unwrap_or(DEFAULT_PRIORITY), b.priority().unwrap_or(DEFAULT_PRIORITY));
    if a_priority != b_priority {
        return a_priority < b_priority;
    }
    identity(a) < identity(b)
}

enum WrapAction {
    Joined,
    Wrap,
    Descend(usize),
}

fn wrap_children(
    root: &mut ViewElement,
    root_name: &str,
    parent_path: &[usize],
    start: usize,
    end: usize,
    wrapper: &ViewElement,
) -> ViewResult<(usize, usize)> {
    let mut end = end;
    let mut wrap_positions = Vec::new();
    let here = ViewPosition::at(root_name, parent_path, start);

    for index in start..end {
        let parent = element_mut(root, &here, parent_path)?;
        let action = match parent.get_child_mut(index) {
            Some(ViewNode::Element(child)) if child.is_attribute() && child.can_be_joined_with(wrapper) => {
                child.join_attributes_of(wrapper);
                WrapAction::Joined
            }
            Some(ViewNode::Element(child)) if child.is_attribute() && !should_be_outside(wrapper, child) => {
                WrapAction::Descend(child.child_count())
            }
            Some(_) => WrapAction::Wrap,
            None => return Err(ViewError::invalid_path(root_name, &child_path(parent_path, index))),
        };

        match action {
            WrapAction::Joined => wrap_positions.push(index),
            WrapAction::Wrap => {
                let child = parent.remove_children(index, 1);
                let mut wrapped = wrapper.clone_empty();
                wrapped.insert_children(0, child)?;
                parent.insert_children(index, vec![wrapped.into()])?;
                wrap_positions.push(index);
            }
            WrapAction::Descend(count) => {
                wrap_children(root, root_name, &child_path(parent_path, index), 0, count, wrapper)?;
            }
        }
    }

    let mut merged = 0;
    for index in wrap_positions {
        let offset = index - merged;
        if offset == start {
            continue;
        }
        let position = ViewPosition::at(root_name, parent_path, offset);
        if merge_attributes(root, &position)? != position {
            merged += 1;
            end -= 1;
        }
    }
    Ok((start, end))
}

enum UnwrapAction {
    Skip,
    Unwrap,
    Strip,
    Descend(usize),
}

fn unwrap_children(
    root: &mut ViewElement,
    root_name: &str,
    parent_path: &[usize],
    start: usize,
    end: usize,
    wrapper: &ViewElement,
) -> ViewResult<(usize, usize)> {
    let mut end = end;
    let mut unwrap_positions = Vec::new();
    let here = ViewPosition::at(root_name, parent_path, start);
    let mut index = start;

    while index < end {
        let parent = element_mut(root, &here, parent_path)?;
        let action = match parent.get_child_mut(index) {
            Some(ViewNode::Element(child)) if child.is_attribute() => {
                if child.is_similar(wrapper) {
                    UnwrapAction::Unwrap
                } else if child.can_be_joined_with(wrapper) && child.has_all_of(wrapper) {
                    child.strip_attributes_of(wrapper);
                    UnwrapAction::Strip
                } else {
                    UnwrapAction::Descend(child.child_count())
                }
            }
            _ => UnwrapAction::Skip,
        };

        match action {
            UnwrapAction::Skip => index += 1,
            UnwrapAction::Unwrap => {
                let children = match parent.remove_children(index, 1).pop() {
                    Some(ViewNode::Element(mut child)) => child.take_children(),
                    _ => Vec::new(),
                };
                let count = children.len();
                parent.insert_children(index, children)?;
                unwrap_positions.push(index);
                unwrap_positions.push(index + count);
                index += count;
                end = end + count - 1;
            }
            UnwrapAction::Strip => {
                unwrap_positions.push(index);
                unwrap_positions.push(index + 1);
                index += 1;
            }
            UnwrapAction::Descend(count) => {
                unwrap_children(root, root_name, &child_path(parent_path, index), 0, count, wrapper)?;
                index += 1;
            }
        }
    }

    let mut merged = 0;
    for index in unwrap_positions {
        let offset = index - merged;
        if offset == start || offset == end {
            continue;
        }
        let position = ViewPosition::at(root_name, parent_path, offset);
        if merge_attributes(root, &position)? != position {
            merged += 1;
            end -= 1;
        }
    }
    Ok((start, end))
}
