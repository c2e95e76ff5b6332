//! # Position
//!
//! A location in a tree, stored as a root name plus a path of offsets. The
//! last path component is the offset inside the parent; every earlier
//! component is the offset of an ancestor element inside its own parent.
//!
//! Positions are values. Every "modification" returns a new position.
//!
//! ## Transformation
//!
//! The transformation helpers answer "where is this location after the
//! tree changed?". Deletion can make a position disappear; that is an
//! `Option`, not an error. Ties are decided by [`Stickiness`]: a position
//! sticking to the next node travels with it, one sticking to the previous
//! node stays behind.

use crate::document::TreeRoots;
use crate::error::{ModelError, ModelResult, PositionError};
use crate::node::{Element, Node, Text};
use crate::operation::{MergeOperation, Operation, SplitOperation};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a position behaves when something is inserted exactly at it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Stickiness {
    #[default]
    ToNone,
    ToNext,
    ToPrevious,
}

impl Stickiness {
    fn is_to_none(&self) -> bool {
        *self == Stickiness::ToNone
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionRelation {
    Same,
    Before,
    After,
    Different,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PathRelation {
    Same,
    /// The first path is a prefix of the second
    Prefix,
    /// The first path extends the second
    Extension,
    /// Index of the first differing component
    Diverge(usize),
}

pub(crate) fn compare_paths(a: &[usize], b: &[usize]) -> PathRelation {
    for (index, (x, y)) in a.iter().zip(b.iter()).enumerate() {
        if x != y {
            return PathRelation::Diverge(index);
        }
    }
    match a.len().cmp(&b.len()) {
        std::cmp::Ordering::Equal => PathRelation::Same,
        std::cmp::Ordering::Less => PathRelation::Prefix,
        std::cmp::Ordering::Greater => PathRelation::Extension,
    }
}

#[derive(Debug, Clone, Eq, Serialize, Deserialize)]
#[serde(try_from = "PositionData")]
pub struct Position {
    root: String,
    path: Vec<usize>,
    #[serde(default, skip_serializing_if = "Stickiness::is_to_none")]
    stickiness: Stickiness,
}

#[derive(Deserialize)]
struct PositionData {
    root: String,
    path: Vec<usize>,
    #[serde(default)]
    stickiness: Stickiness,
}

impl TryFrom<PositionData> for Position {
    type Error = PositionError;

    fn try_from(data: PositionData) -> Result<Self, Self::Error> {
        if data.path.is_empty() {
            return Err(PositionError::EmptyPath);
        }
        Ok(Position {
            root: data.root,
            path: data.path,
            stickiness: data.stickiness,
        })
    }
}

impl PartialEq for Position {
    fn eq(&self, other: &Self) -> bool {
        self.root == other.root && self.path == other.path
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{:?}", self.root, self.path)
    }
}

impl Position {
    pub fn new(root: impl Into<String>, path: Vec<usize>) -> ModelResult<Self> {
        if path.is_empty() {
            return Err(PositionError::EmptyPath.into());
        }
        Ok(Self {
            root: root.into(),
            path,
            stickiness: Stickiness::ToNone,
        })
    }

    /// Position at `offset` inside the element found at `parent_path`
    pub fn at(root: impl Into<String>, parent_path: &[usize], offset: usize) -> Self {
        let mut path = parent_path.to_vec();
        path.push(offset);
        Self {
            root: root.into(),
            path,
            stickiness: Stickiness::ToNone,
        }
    }

    /// Position right before the node at `node_path`
    pub fn before<T: TreeRoots>(tree: &T, root: &str, node_path: &[usize]) -> ModelResult<Self> {
        if node_path.is_empty() {
            return Err(PositionError::BeforeRoot.into());
        }
        lookup_node(tree, root, node_path)?;
        Self::new(root, node_path.to_vec())
    }

    /// Position right after the node at `node_path`
    pub fn after<T: TreeRoots>(tree: &T, root: &str, node_path: &[usize]) -> ModelResult<Self> {
        if node_path.is_empty() {
            return Err(PositionError::AfterRoot.into());
        }
        let size = lookup_node(tree, root, node_path)?.offset_size();
        let mut path = node_path.to_vec();
        if let Some(last) = path.last_mut() {
            *last += size;
        }
        Self::new(root, path)
    }

    pub fn at_start(root: impl Into<String>, parent_path: &[usize]) -> Self {
        Self::at(root, parent_path, 0)
    }

    pub fn at_end<T: TreeRoots>(tree: &T, root: &str, parent_path: &[usize]) -> ModelResult<Self> {
        let parent = lookup_element(tree, root, parent_path)?;
        Ok(Self::at(root, parent_path, parent.max_offset()))
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

    pub fn depth(&self) -> usize {
        self.path.len()
    }

    pub fn stickiness(&self) -> Stickiness {
        self.stickiness
    }

    pub fn with_stickiness(&self, stickiness: Stickiness) -> Self {
        let mut position = self.clone();
        position.stickiness = stickiness;
        position
    }

    pub fn with_offset(&self, offset: usize) -> Self {
        let mut position = self.clone();
        position.set_offset(offset);
        position
    }

    /// Offset moved by `shift`, clamped at zero
    pub fn shifted_by(&self, shift: isize) -> Self {
        let offset = if shift < 0 {
            self.offset().saturating_sub(shift.unsigned_abs())
        } else {
            self.offset().saturating_add(shift as usize)
        };
        self.with_offset(offset)
    }

    /// Same root, path extended by one component
    pub fn child(&self, offset: usize) -> Self {
        let mut position = self.clone();
        position.path.push(offset);
        position
    }

    /// Position before the parent element, `None` for a root's direct children
    pub fn parent_position(&self) -> Option<Self> {
        if self.path.len() < 2 {
            return None;
        }
        let mut position = self.clone();
        position.path.pop();
        Some(position)
    }

    fn set_offset(&mut self, offset: usize) {
        let last = self.path.len() - 1;
        self.path[last] = offset;
    }

    pub fn is_at_start(&self) -> bool {
        self.offset() == 0
    }

    pub fn is_at_end<T: TreeRoots>(&self, tree: &T) -> ModelResult<bool> {
        Ok(self.offset() == self.parent(tree)?.max_offset())
    }

    pub fn parent<'a, T: TreeRoots>(&self, tree: &'a T) -> ModelResult<&'a Element> {
        lookup_element(tree, &self.root, self.parent_path())
    }

    pub fn node_after<'a, T: TreeRoots>(&self, tree: &'a T) -> ModelResult<Option<&'a Node>> {
        Ok(self.parent(tree)?.node_after(self.offset()))
    }

    pub fn node_before<'a, T: TreeRoots>(&self, tree: &'a T) -> ModelResult<Option<&'a Node>> {
        Ok(self.parent(tree)?.node_before(self.offset()))
    }

    /// The text node this position is strictly inside of
    pub fn text_node<'a, T: TreeRoots>(&self, tree: &'a T) -> ModelResult<Option<&'a Text>> {
        Ok(self.parent(tree)?.text_at(self.offset()))
    }

    /// Check that the parent exists and the offset fits in it
    pub fn validate<T: TreeRoots>(&self, tree: &T) -> ModelResult<()> {
        let max = self.parent(tree)?.max_offset();
        if self.offset() > max {
            return Err(ModelError::OffsetOutOfBounds {
                offset: self.offset(),
                max,
            });
        }
        Ok(())
    }

    pub fn compare_with(&self, other: &Position) -> PositionRelation {
        if self.root != other.root {
            return PositionRelation::Different;
        }
        match compare_paths(&self.path, &other.path) {
            PathRelation::Same => PositionRelation::Same,
            PathRelation::Prefix => PositionRelation::Before,
            PathRelation::Extension => PositionRelation::After,
            PathRelation::Diverge(index) => {
                if self.path[index] < other.path[index] {
                    PositionRelation::Before
                } else {
                    PositionRelation::After
                }
            }
        }
    }

    pub fn is_before(&self, other: &Position) -> bool {
        self.compare_with(other) == PositionRelation::Before
    }

    pub fn is_after(&self, other: &Position) -> bool {
        self.compare_with(other) == PositionRelation::After
    }

    pub fn has_same_parent_as(&self, other: &Position) -> bool {
        self.root == other.root && self.parent_path() == other.parent_path()
    }

    pub fn common_path(&self, other: &Position) -> Vec<usize> {
        if self.root != other.root {
            return Vec::new();
        }
        match compare_paths(&self.path, &other.path) {
            PathRelation::Same | PathRelation::Prefix => self.path.clone(),
            PathRelation::Extension => other.path.clone(),
            PathRelation::Diverge(index) => self.path[..index].to_vec(),
        }
    }

    /// True when no whole node lies between the two positions
    ///
    /// The end of an element touches the position right after it, and the
    /// position right before an element touches its start.
    pub fn is_touching<T: TreeRoots>(&self, other: &Position, tree: &T) -> ModelResult<bool> {
        let (mut left, mut right) = match self.compare_with(other) {
            PositionRelation::Same => return Ok(true),
            PositionRelation::Before => (self.clone(), other.clone()),
            PositionRelation::After => (other.clone(), self.clone()),
            PositionRelation::Different => return Ok(false),
        };
        let root = tree
            .root(&left.root)
            .ok_or_else(|| ModelError::NoSuchRoot(left.root.clone()))?;

        while !left.path.is_empty() && !right.path.is_empty() {
            if left == right {
                return Ok(true);
            }
            if left.path.len() > right.path.len() {
                let parent = root
                    .element_at_path(left.parent_path())
                    .ok_or_else(|| ModelError::invalid_path(&left.root, &left.path))?;
                if left.offset() != parent.max_offset() {
                    return Ok(false);
                }
                left.path.pop();
                if left.path.is_empty() {
                    return Ok(false);
                }
                let offset = left.offset() + 1;
                left.set_offset(offset);
            } else {
                if right.offset() != 0 {
                    return Ok(false);
                }
                right.path.pop();
            }
        }
        Ok(false)
    }

    fn transform_by_insertion(&self, insert: &Position, how_many: usize, shift_on_tie: bool) -> Self {
        let mut transformed = self.clone();
        if self.root != insert.root {
            return transformed;
        }
        match compare_paths(insert.parent_path(), self.parent_path()) {
            PathRelation::Same => {
                if insert.offset() < self.offset()
                    || (insert.offset() == self.offset() && shift_on_tie)
                {
                    transformed.set_offset(self.offset() + how_many);
                }
            }
            PathRelation::Prefix => {
                let index = insert.path.len() - 1;
                if insert.offset() <= self.path[index] {
                    transformed.path[index] += how_many;
                }
            }
            _ => {}
        }
        transformed
    }

    /// Position after `how_many` offsets were inserted at `insert`
    ///
    /// When the insertion happens exactly at this position, it shifts only
    /// if `insert_before` is set. Insertions in an ancestor shift the path
    /// whenever they land at or before the ancestor holding this position.
    pub fn get_transformed_by_insertion(
        &self,
        insert: &Position,
        how_many: usize,
        insert_before: bool,
    ) -> Self {
        self.transform_by_insertion(insert, how_many, insert_before)
    }

    /// Stickiness-driven variant used by operations and live ranges
    pub(crate) fn transformed_by_insertion(&self, insert: &Position, how_many: usize) -> Self {
        self.transform_by_insertion(insert, how_many, self.stickiness != Stickiness::ToPrevious)
    }

    /// Position after `how_many` offsets were removed at `deletion`;
    /// `None` when it pointed inside the removed content
    pub fn get_transformed_by_deletion(&self, deletion: &Position, how_many: usize) -> Option<Self> {
        let mut transformed = self.clone();
        if self.root != deletion.root {
            return Some(transformed);
        }
        match compare_paths(deletion.parent_path(), self.parent_path()) {
            PathRelation::Same => {
                if deletion.offset() < self.offset() {
                    if deletion.offset() + how_many > self.offset() {
                        return None;
                    }
                    transformed.set_offset(self.offset() - how_many);
                }
            }
            PathRelation::Prefix => {
                let index = deletion.path.len() - 1;
                if deletion.offset() <= self.path[index] {
                    if deletion.offset() + how_many > self.path[index] {
                        return None;
                    }
                    transformed.path[index] -= how_many;
                }
            }
            _ => {}
        }
        Some(transformed)
    }

    /// Position after `how_many` offsets moved from `source` to `target`
    ///
    /// `target` is given in coordinates from before the move. Positions at
    /// either boundary of the moved range follow it only when `is_sticky`.
    pub fn get_transformed_by_move(
        &self,
        source: &Position,
        target: &Position,
        how_many: usize,
        is_sticky: bool,
    ) -> Self {
        let stickiness = if !is_sticky {
            Stickiness::ToNone
        } else if self == source {
            Stickiness::ToNext
        } else if *self == source.shifted_by(how_many as isize) {
            Stickiness::ToPrevious
        } else {
            self.stickiness
        };
        self.with_stickiness(stickiness)
            .transformed_by_move(source, target, how_many)
            .with_stickiness(self.stickiness)
    }

    pub(crate) fn transformed_by_move(&self, source: &Position, target: &Position, how_many: usize) -> Self {
        let target = target
            .get_transformed_by_deletion(source, how_many)
            .unwrap_or_else(|| target.clone());

        if *source == target {
            return self.clone();
        }

        let transformed = self.get_transformed_by_deletion(source, how_many);
        let sticks_to_start = self == source && self.stickiness == Stickiness::ToNext;
        let sticks_to_end = *self == source.shifted_by(how_many as isize)
            && self.stickiness == Stickiness::ToPrevious;

        match transformed {
            Some(transformed) if !sticks_to_start && !sticks_to_end => {
                transformed.transformed_by_insertion(&target, how_many)
            }
            _ => self.combined(source, &target),
        }
    }

    /// Re-root this position, which lies in the range starting at `source`,
    /// onto the same relative place starting at `target`
    pub(crate) fn combined(&self, source: &Position, target: &Position) -> Self {
        let index = source.path.len() - 1;
        let mut path = target.path.clone();
        let last = path.len() - 1;
        path[last] = (path[last] + self.path[index]).saturating_sub(source.offset());
        path.extend_from_slice(&self.path[index + 1..]);
        Self {
            root: target.root.clone(),
            path,
            stickiness: self.stickiness,
        }
    }

    pub(crate) fn transformed_by_split(&self, op: &SplitOperation) -> Self {
        let moved = op.moved_range();
        let contained = moved.contains_position(self)
            || (moved.start() == self && self.stickiness == Stickiness::ToNext);

        if contained {
            return self.combined(&op.split_position, &op.move_target_position());
        }
        match &op.graveyard_position {
            Some(graveyard) => self.transformed_by_move(graveyard, &op.insertion_position, 1),
            None => self.transformed_by_insertion(&op.insertion_position, 1),
        }
    }

    pub(crate) fn transformed_by_merge(&self, op: &MergeOperation) -> Self {
        let moved = op.moved_range();
        let deletion = op.deletion_position();
        let contained = moved.contains_position(self) || moved.start() == self;

        if contained {
            let combined = self.combined(&op.source_position, &op.target_position);
            if op.source_position.is_before(&op.target_position) {
                return combined
                    .get_transformed_by_deletion(&deletion, 1)
                    .unwrap_or(combined);
            }
            combined
        } else if *self == deletion {
            deletion.with_stickiness(self.stickiness)
        } else {
            self.transformed_by_move(&deletion, &op.graveyard_position, 1)
        }
    }

    pub fn get_transformed_by_operation(&self, op: &Operation) -> Self {
        match op {
            Operation::Insert(insert) => {
                self.transformed_by_insertion(&insert.position, insert.how_many())
            }
            Operation::Move(mv) => {
                self.transformed_by_move(&mv.source_position, &mv.target_position, mv.how_many)
            }
            Operation::Split(split) => self.transformed_by_split(split),
            Operation::Merge(merge) => self.transformed_by_merge(merge),
            _ => self.clone(),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    /// Deserialize and check the root against `tree`
    pub fn from_json<T: TreeRoots>(value: serde_json::Value, tree: &T) -> ModelResult<Self> {
        let position: Position = serde_json::from_value(value)?;
        if tree.root(&position.root).is_none() {
            return Err(ModelError::NoSuchRoot(position.root));
        }
        Ok(position)
    }
}

fn lookup_element<'a, T: TreeRoots>(tree: &'a T, root: &str, path: &[usize]) -> ModelResult<&'a Element> {
    tree.root(root)
        .ok_or_else(|| ModelError::NoSuchRoot(root.to_string()))?
        .element_at_path(path)
        .ok_or_else(|| ModelError::invalid_path(root, path))
}

fn lookup_node<'a, T: TreeRoots>(tree: &'a T, root: &str, path: &[usize]) -> ModelResult<&'a Node> {
    tree.root(root)
        .ok_or_else(|| ModelError::NoSuchRoot(root.to_string()))?
        .node_at_path(path)
        .ok_or_else(|| ModelError::invalid_path(root, path))
}
