//! View positions and ranges.
//!
//! A view position is a root name plus a path of child indexes. The last
//! component is the offset in the parent, which may be an element (child
//! index) or a text node (character offset).

use crate::error::{ViewError, ViewResult};
use crate::node::{ViewElement, ViewNode};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ViewPosition {
    root: String,
    path: Vec<usize>,
}

impl fmt::Display for ViewPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:?}", self.root, self.path)
    }
}

impl ViewPosition {
    pub fn new(root: impl Into<String>, path: Vec<usize>) -> ViewResult<Self> {
        let root = root.into();
        if path.is_empty() {
            return Err(ViewError::invalid_path(&root, &path));
        }
        Ok(Self { root, path })
    }

    pub fn at(root: impl Into<String>, parent_path: &[usize], offset: usize) -> Self {
        let mut path = parent_path.to_vec();
        path.push(offset);
        Self {
            root: root.into(),
            path,
        }
    }

    /// The position before the node at `node_path`
    pub fn before(root: impl Into<String>, node_path: &[usize]) -> ViewResult<Self> {
        Self::new(root, node_path.to_vec())
    }

    /// The position after the node at `node_path`
    pub fn after(root: impl Into<String>, node_path: &[usize]) -> ViewResult<Self> {
        Self::new(root, node_path.to_vec()).map(|position| position.shifted_by(1))
    }

    pub fn root_name(&self) -> &str {
        &self.root
    }

    pub fn path(&self) -> &[usize] {
        &self.path
    }

    pub fn parent_path(&self) -> &[usize] {
        &self.path[..self.path.len() - 1]
    }

    pub fn offset(&self) -> usize {
        self.path[self.path.len() - 1]
    }

    pub fn with_offset(&self, offset: usize) -> Self {
        let mut path = self.path.clone();
        let last = path.len() - 1;
        path[last] = offset;
        Self {
            root: self.root.clone(),
            path,
        }
    }

    pub fn shifted_by(&self, shift: isize) -> Self {
        self.with_offset(self.offset().saturating_add_signed(shift))
    }

    /// Move the path component at `depth` by `shift`
    pub(crate) fn shifted_at_depth(&self, depth: usize, shift: isize) -> Self {
        let mut path = self.path.clone();
        if let Some(component) = path.get_mut(depth) {
            *component = component.saturating_add_signed(shift);
        }
        Self {
            root: self.root.clone(),
            path,
        }
    }

    /// A position inside the node this position is before
    pub fn child(&self, offset: usize) -> Self {
        let mut path = self.path.clone();
        path.push(offset);
        Self {
            root: self.root.clone(),
            path,
        }
    }

    /// The position before this position's parent
    pub fn parent_position(&self) -> Option<Self> {
        (self.path.len() > 1).then(|| Self {
            root: self.root.clone(),
            path: self.parent_path().to_vec(),
        })
    }

    /// Document order; `None` for positions in different roots
    pub fn compare(&self, other: &ViewPosition) -> Option<Ordering> {
        (self.root == other.root).then(|| self.path.cmp(&other.path))
    }

    pub fn is_before(&self, other: &ViewPosition) -> bool {
        self.compare(other) == Some(Ordering::Less)
    }

    pub fn is_after(&self, other: &ViewPosition) -> bool {
        self.compare(other) == Some(Ordering::Greater)
    }

    /// The node holding this position: an element or a text node
    pub fn parent<'a>(&self, root: &'a ViewElement) -> ViewResult<&'a ViewNode> {
        root.node_at_path(self.parent_path())
            .ok_or_else(|| ViewError::invalid_path(&self.root, &self.path))
    }

    pub fn parent_element<'a>(&self, root: &'a ViewElement) -> ViewResult<&'a ViewElement> {
        root.element_at_path(self.parent_path())
            .ok_or_else(|| ViewError::invalid_path(&self.root, &self.path))
    }

    pub fn is_in_text(&self, root: &ViewElement) -> bool {
        !self.parent_path().is_empty() && root.node_at_path(self.parent_path()).is_some_and(ViewNode::is_text)
    }

    pub fn node_after<'a>(&self, root: &'a ViewElement) -> Option<&'a ViewNode> {
        root.element_at_path(self.parent_path())?.get_child(self.offset())
    }

    pub fn node_before<'a>(&self, root: &'a ViewElement) -> Option<&'a ViewNode> {
        let offset = self.offset().checked_sub(1)?;
        root.element_at_path(self.parent_path())?.get_child(offset)
    }

    pub fn is_at_start(&self) -> bool {
        self.offset() == 0
    }

    pub fn is_at_end(&self, root: &ViewElement) -> bool {
        match root.node_at_path(self.parent_path()) {
            Some(ViewNode::Text(text)) => self.offset() == text.len(),
            Some(ViewNode::Element(element)) => self.offset() == element.child_count(),
            None if self.parent_path().is_empty() => self.offset() == root.child_count(),
            None => false,
        }
    }

    pub fn validate(&self, root: &ViewElement) -> ViewResult<()> {
        let max = if self.parent_path().is_empty() {
            Some(root.child_count())
        } else {
            match root.node_at_path(self.parent_path()) {
                Some(ViewNode::Text(text)) => Some(text.len()),
                Some(ViewNode::Element(element)) => Some(element.child_count()),
                None => None,
            }
        };
        match max {
            Some(max) if self.offset() <= max => Ok(()),
            _ => Err(ViewError::invalid_path(&self.root, &self.path)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewRange {
    start: ViewPosition,
    end: ViewPosition,
}

impl fmt::Display for ViewRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}

impl ViewRange {
    pub fn new(start: ViewPosition, end: ViewPosition) -> ViewResult<Self> {
        match start.compare(&end) {
            Some(Ordering::Greater) => Err(ViewError::InvalidRange),
            None => Err(ViewError::InvalidRangeContainer),
            _ => Ok(Self { start, end }),
        }
    }

    pub fn collapsed(position: ViewPosition) -> Self {
        Self {
            start: position.clone(),
            end: position,
        }
    }

    /// A range spanning exactly the node at `node_path`
    pub fn on(root: impl Into<String>, node_path: &[usize]) -> ViewResult<Self> {
        let start = ViewPosition::before(root, node_path)?;
        let end = start.shifted_by(1);
        Ok(Self { start, end })
    }

    /// A range spanning the whole content of the element at `element_path`
    pub fn in_element(root: &ViewElement, root_name: &str, element_path: &[usize]) -> ViewResult<Self> {
        let element = root
            .element_at_path(element_path)
            .ok_or_else(|| ViewError::invalid_path(root_name, element_path))?;
        Ok(Self {
            start: ViewPosition::at(root_name, element_path, 0),
            end: ViewPosition::at(root_name, element_path, element.child_count()),
        })
    }

    pub fn start(&self) -> &ViewPosition {
        &self.start
    }

    pub fn end(&self) -> &ViewPosition {
        &self.end
    }

    pub fn root_name(&self) -> &str {
        self.start.root_name()
    }

    pub fn is_collapsed(&self) -> bool {
        self.start == self.end
    }

    pub fn is_flat(&self) -> bool {
        self.start.parent_path() == self.end.parent_path()
    }

    pub fn contains_position(&self, position: &ViewPosition) -> bool {
        position.is_after(&self.start) && position.is_before(&self.end)
    }
}
