//! # Operations
//!
//! Atomic, invertible edits of the model tree. Every operation can be:
//!
//! - validated and executed against a set of roots
//! - reversed ([`Operation::get_reversed`]); executing an operation and
//!   then its reverse restores the tree exactly, text merging included
//! - transformed against any concurrently applied operation (see
//!   [`transform`])
//!
//! Removal is a move into the graveyard root and re-insertion is a move out
//! of it, so removed elements keep their identity for undo.
//!
//! ## Positions in moves
//!
//! A move's `target_position` is expressed in coordinates from before the
//! moved nodes were taken out. [`MoveOperation::moved_range_start`] gives
//! where the nodes actually land.

pub mod transform;

pub use transform::{transform, transform_sets, TransformContext, TransformedSets};

use crate::document::{TreeRoots, GRAVEYARD_ROOT_NAME};
use crate::error::{ModelError, ModelResult};
use crate::node::{offset_size_of, normalize_nodes, Element, Node};
use crate::position::{Position, Stickiness};
use crate::range::Range;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

type Roots = BTreeMap<String, Element>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertOperation {
    pub position: Position,
    pub nodes: Vec<Node>,
    /// Inserted nodes pick up attributes set concurrently around them
    #[serde(default)]
    pub should_receive_attributes: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_version: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveOperation {
    pub source_position: Position,
    pub how_many: usize,
    pub target_position: Position,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_version: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeOperation {
    /// Always flat
    pub range: Range,
    pub key: String,
    pub old_value: Option<Value>,
    pub new_value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_version: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameOperation {
    /// Position right before the renamed element
    pub position: Position,
    pub old_name: String,
    pub new_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_version: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkerOperation {
    pub name: String,
    pub old_range: Option<Range>,
    pub new_range: Option<Range>,
    #[serde(default)]
    pub affects_data: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_version: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitOperation {
    pub split_position: Position,
    /// Offsets moved out of the split element
    pub how_many: usize,
    /// Where the new element goes, right after the split one
    pub insertion_position: Position,
    /// When set, the new element is taken back from the graveyard
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graveyard_position: Option<Position>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_version: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeOperation {
    /// Start of the merged element's content
    pub source_position: Position,
    pub how_many: usize,
    /// End of the element receiving the content
    pub target_position: Position,
    /// Where the emptied element is moved
    pub graveyard_position: Position,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_version: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct NoOperation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_version: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Operation {
    Insert(InsertOperation),
    Move(MoveOperation),
    Attribute(AttributeOperation),
    Rename(RenameOperation),
    Marker(MarkerOperation),
    Split(SplitOperation),
    Merge(MergeOperation),
    #[serde(rename = "noop")]
    NoOp(NoOperation),
}

pub fn graveyard_start() -> Position {
    Position::at(GRAVEYARD_ROOT_NAME, &[], 0)
}

impl InsertOperation {
    pub fn new(position: Position, mut nodes: Vec<Node>) -> Self {
        normalize_nodes(&mut nodes);
        Self {
            position: position.with_stickiness(Stickiness::ToNone),
            nodes,
            should_receive_attributes: false,
            base_version: None,
        }
    }

    pub fn how_many(&self) -> usize {
        offset_size_of(&self.nodes)
    }
}

impl MoveOperation {
    pub fn new(source_position: Position, how_many: usize, target_position: Position) -> Self {
        Self {
            source_position: source_position.with_stickiness(Stickiness::ToNext),
            how_many,
            target_position: target_position.with_stickiness(Stickiness::ToNone),
            base_version: None,
        }
    }

    /// Removal: a move into the graveyard
    pub fn remove(source_position: Position, how_many: usize) -> Self {
        Self::new(source_position, how_many, graveyard_start())
    }

    /// Where the moved nodes start once the move is done
    pub fn moved_range_start(&self) -> Position {
        self.target_position
            .get_transformed_by_deletion(&self.source_position, self.how_many)
            .unwrap_or_else(|| self.target_position.clone())
    }

    pub fn source_range(&self) -> Range {
        Range::from_position_and_shift(&self.source_position, self.how_many)
    }

    pub fn is_remove(&self) -> bool {
        self.target_position.root_name() == GRAVEYARD_ROOT_NAME
            && self.source_position.root_name() != GRAVEYARD_ROOT_NAME
    }

    pub fn is_reinsert(&self) -> bool {
        self.source_position.root_name() == GRAVEYARD_ROOT_NAME
            && self.target_position.root_name() != GRAVEYARD_ROOT_NAME
    }
}

impl AttributeOperation {
    pub fn new(range: Range, key: impl Into<String>, old_value: Option<Value>, new_value: Option<Value>) -> Self {
        Self {
            range,
            key: key.into(),
            old_value,
            new_value,
            base_version: None,
        }
    }
}

impl RenameOperation {
    pub fn new(position: Position, old_name: impl Into<String>, new_name: impl Into<String>) -> Self {
        Self {
            position: position.with_stickiness(Stickiness::ToNext),
            old_name: old_name.into(),
            new_name: new_name.into(),
            base_version: None,
        }
    }
}

impl MarkerOperation {
    pub fn new(name: impl Into<String>, old_range: Option<Range>, new_range: Option<Range>, affects_data: bool) -> Self {
        Self {
            name: name.into(),
            old_range,
            new_range,
            affects_data,
            base_version: None,
        }
    }
}

impl SplitOperation {
    pub fn new(split_position: Position, how_many: usize, graveyard_position: Option<Position>) -> Self {
        let insertion_position = Self::insertion_position_for(&split_position);
        Self {
            split_position: split_position.with_stickiness(Stickiness::ToNext),
            how_many,
            insertion_position,
            graveyard_position,
            base_version: None,
        }
    }

    /// Position right after the element being split
    pub fn insertion_position_for(split_position: &Position) -> Position {
        match split_position.parent_position() {
            Some(parent) => parent.shifted_by(1).with_stickiness(Stickiness::ToNone),
            None => split_position.clone(),
        }
    }

    /// Where the moved content starts, inside the new element
    pub fn move_target_position(&self) -> Position {
        self.insertion_position.child(0)
    }

    /// Everything from the split point to the end of the split element
    pub fn moved_range(&self) -> Range {
        Range::from_positions(
            self.split_position.clone(),
            self.split_position.with_offset(usize::MAX),
        )
    }
}

impl MergeOperation {
    pub fn new(source_position: Position, how_many: usize, target_position: Position, graveyard_position: Position) -> Self {
        Self {
            source_position: source_position.with_stickiness(Stickiness::ToPrevious),
            how_many,
            target_position: target_position.with_stickiness(Stickiness::ToNext),
            graveyard_position,
            base_version: None,
        }
    }

    /// Position right before the merged element
    pub fn deletion_position(&self) -> Position {
        self.source_position
            .parent_position()
            .unwrap_or_else(|| self.source_position.clone())
            .with_stickiness(Stickiness::ToNone)
    }

    /// The whole content of the merged element
    pub fn moved_range(&self) -> Range {
        Range::from_positions(
            self.source_position.clone(),
            self.source_position.with_offset(usize::MAX),
        )
    }
}

fn element_mut<'a>(roots: &'a mut Roots, root: &str, path: &[usize]) -> ModelResult<&'a mut Element> {
    roots
        .get_mut(root)
        .ok_or_else(|| ModelError::NoSuchRoot(root.to_string()))?
        .element_at_path_mut(path)
        .ok_or_else(|| ModelError::invalid_path(root, path))
}

fn element<'a, T: TreeRoots>(tree: &'a T, root: &str, path: &[usize]) -> ModelResult<&'a Element> {
    tree.root(root)
        .ok_or_else(|| ModelError::NoSuchRoot(root.to_string()))?
        .element_at_path(path)
        .ok_or_else(|| ModelError::invalid_path(root, path))
}

/// Take nodes out at `source` and put them at `target` (pre-move coordinates)
fn move_nodes(roots: &mut Roots, source: &Position, how_many: usize, target: &Position) -> ModelResult<()> {
    let landing = target
        .get_transformed_by_deletion(source, how_many)
        .ok_or_else(|| ModelError::invalid_operation("Trying to move a range of nodes into itself"))?;
    let removed = element_mut(roots, source.root_name(), source.parent_path())?
        .remove_range(source.offset(), how_many)?;
    element_mut(roots, landing.root_name(), landing.parent_path())?.insert_at(landing.offset(), removed)
}

fn validate_move<T: TreeRoots>(tree: &T, source: &Position, how_many: usize, target: &Position) -> ModelResult<()> {
    let source_parent = element(tree, source.root_name(), source.parent_path())?;
    if source.offset() + how_many > source_parent.max_offset() {
        return Err(ModelError::invalid_operation("Source range is out of bounds"));
    }
    target.validate(tree)?;
    if target.get_transformed_by_deletion(source, how_many).is_none() {
        return Err(ModelError::invalid_operation("Trying to move a range of nodes into itself"));
    }
    Ok(())
}

impl Operation {
    pub fn base_version(&self) -> Option<u64> {
        match self {
            Operation::Insert(op) => op.base_version,
            Operation::Move(op) => op.base_version,
            Operation::Attribute(op) => op.base_version,
            Operation::Rename(op) => op.base_version,
            Operation::Marker(op) => op.base_version,
            Operation::Split(op) => op.base_version,
            Operation::Merge(op) => op.base_version,
            Operation::NoOp(op) => op.base_version,
        }
    }

    pub fn set_base_version(&mut self, version: u64) {
        let slot = match self {
            Operation::Insert(op) => &mut op.base_version,
            Operation::Move(op) => &mut op.base_version,
            Operation::Attribute(op) => &mut op.base_version,
            Operation::Rename(op) => &mut op.base_version,
            Operation::Marker(op) => &mut op.base_version,
            Operation::Split(op) => &mut op.base_version,
            Operation::Merge(op) => &mut op.base_version,
            Operation::NoOp(op) => &mut op.base_version,
        };
        *slot = Some(version);
    }

    pub fn with_base_version(mut self, version: u64) -> Self {
        self.set_base_version(version);
        self
    }

    pub fn no_op(base_version: Option<u64>) -> Self {
        Operation::NoOp(NoOperation { base_version })
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Operation::Insert(_) => "insert",
            Operation::Move(op) if op.is_remove() => "remove",
            Operation::Move(op) if op.is_reinsert() => "reinsert",
            Operation::Move(_) => "move",
            Operation::Attribute(_) => "attribute",
            Operation::Rename(_) => "rename",
            Operation::Marker(_) => "marker",
            Operation::Split(_) => "split",
            Operation::Merge(_) => "merge",
            Operation::NoOp(_) => "noop",
        }
    }

    pub fn is_no_op(&self) -> bool {
        matches!(self, Operation::NoOp(_))
    }

    /// Re-apply the boundary stickiness each operation kind relies on
    pub fn normalized(self) -> Self {
        match self {
            Operation::Insert(mut op) => {
                op.position = op.position.with_stickiness(Stickiness::ToNone);
                Operation::Insert(op)
            }
            Operation::Move(mut op) => {
                op.source_position = op.source_position.with_stickiness(Stickiness::ToNext);
                op.target_position = op.target_position.with_stickiness(Stickiness::ToNone);
                Operation::Move(op)
            }
            Operation::Rename(mut op) => {
                op.position = op.position.with_stickiness(Stickiness::ToNext);
                Operation::Rename(op)
            }
            Operation::Split(mut op) => {
                op.split_position = op.split_position.with_stickiness(Stickiness::ToNext);
                op.insertion_position = op.insertion_position.with_stickiness(Stickiness::ToNone);
                Operation::Split(op)
            }
            Operation::Merge(mut op) => {
                op.source_position = op.source_position.with_stickiness(Stickiness::ToPrevious);
                op.target_position = op.target_position.with_stickiness(Stickiness::ToNext);
                Operation::Merge(op)
            }
            other => other,
        }
    }

    /// Every position the operation refers to
    pub fn positions(&self) -> Vec<&Position> {
        match self {
            Operation::Insert(op) => vec![&op.position],
            Operation::Move(op) => vec![&op.source_position, &op.target_position],
            Operation::Attribute(op) => vec![op.range.start(), op.range.end()],
            Operation::Rename(op) => vec![&op.position],
            Operation::Marker(op) => op
                .old_range
                .iter()
                .chain(op.new_range.iter())
                .flat_map(|range| [range.start(), range.end()])
                .collect(),
            Operation::Split(op) => {
                let mut positions = vec![&op.split_position, &op.insertion_position];
                positions.extend(op.graveyard_position.iter());
                positions
            }
            Operation::Merge(op) => vec![&op.source_position, &op.target_position, &op.graveyard_position],
            Operation::NoOp(_) => Vec::new(),
        }
    }

    /// Check the operation can be executed against `tree`
    pub fn validate<T: TreeRoots>(&self, tree: &T) -> ModelResult<()> {
        match self {
            Operation::Insert(op) => op.position.validate(tree),
            Operation::Move(op) => validate_move(tree, &op.source_position, op.how_many, &op.target_position),
            Operation::Attribute(op) => {
                if !op.range.is_flat() {
                    return Err(ModelError::RangeNotFlat);
                }
                op.range.end().validate(tree)
            }
            Operation::Rename(op) => {
                let node = op
                    .position
                    .node_after(tree)?
                    .and_then(Node::as_element)
                    .ok_or_else(|| ModelError::invalid_operation("Given position is invalid or node after it is not an element"))?;
                if node.name() != op.old_name {
                    return Err(ModelError::invalid_operation(format!(
                        "Element to rename has name {} instead of {}",
                        node.name(),
                        op.old_name
                    )));
                }
                Ok(())
            }
            Operation::Split(op) => {
                if op.split_position.parent_position().is_none() {
                    return Err(ModelError::invalid_operation("Cannot split a root element"));
                }
                let parent = op.split_position.parent(tree)?;
                if op.split_position.offset() > parent.max_offset() {
                    return Err(ModelError::invalid_operation("Split position is invalid"));
                }
                if op.how_many != parent.max_offset() - op.split_position.offset() {
                    return Err(ModelError::invalid_operation("Split operation specifies wrong number of nodes to move"));
                }
                op.insertion_position.validate(tree)?;
                if let Some(graveyard) = &op.graveyard_position {
                    graveyard
                        .node_after(tree)?
                        .and_then(Node::as_element)
                        .ok_or_else(|| ModelError::invalid_operation("Graveyard position is invalid"))?;
                }
                Ok(())
            }
            Operation::Merge(op) => {
                if op.source_position.parent_position().is_none() {
                    return Err(ModelError::invalid_operation("Cannot merge a root element"));
                }
                let source = op.source_position.parent(tree)?;
                if op.how_many != source.max_offset() {
                    return Err(ModelError::invalid_operation("Merge operation specifies wrong number of nodes to move"));
                }
                op.target_position.validate(tree)?;
                op.graveyard_position.validate(tree)?;
                if op.source_position.parent_path() == op.target_position.parent_path()
                    && op.source_position.root_name() == op.target_position.root_name()
                {
                    return Err(ModelError::invalid_operation("Cannot merge an element into itself"));
                }
                Ok(())
            }
            Operation::Marker(_) | Operation::NoOp(_) => Ok(()),
        }
    }

    /// Execute against the roots; markers and no-ops have nothing to do here
    pub(crate) fn execute(&self, roots: &mut Roots) -> ModelResult<()> {
        match self {
            Operation::Insert(op) => {
                element_mut(roots, op.position.root_name(), op.position.parent_path())?
                    .insert_at(op.position.offset(), op.nodes.clone())
            }
            Operation::Move(op) => move_nodes(roots, &op.source_position, op.how_many, &op.target_position),
            Operation::Attribute(op) => {
                let start = op.range.start();
                element_mut(roots, start.root_name(), start.parent_path())?.set_attribute_in_range(
                    start.offset(),
                    op.range.flat_len(),
                    &op.key,
                    op.new_value.as_ref(),
                )
            }
            Operation::Rename(op) => {
                element_mut(roots, op.position.root_name(), op.position.path())?.set_name(op.new_name.clone());
                Ok(())
            }
            Operation::Split(op) => {
                match &op.graveyard_position {
                    Some(graveyard) => move_nodes(roots, graveyard, 1, &op.insertion_position)?,
                    None => {
                        let split = op.split_position.parent_path().to_vec();
                        let clone = element_mut(roots, op.split_position.root_name(), &split)?.clone_empty();
                        let insertion = &op.insertion_position;
                        element_mut(roots, insertion.root_name(), insertion.parent_path())?
                            .insert_at(insertion.offset(), vec![Node::Element(clone)])?;
                    }
                }
                move_nodes(roots, &op.split_position, op.how_many, &op.move_target_position())
            }
            Operation::Merge(op) => {
                move_nodes(roots, &op.source_position, op.how_many, &op.target_position)?;
                move_nodes(roots, &op.deletion_position(), 1, &op.graveyard_position)
            }
            Operation::Marker(_) | Operation::NoOp(_) => Ok(()),
        }
    }

    /// The exact inverse, based on the version right after this operation
    pub fn get_reversed(&self) -> Operation {
        let next_version = self.base_version().map(|version| version + 1);
        let mut reversed = match self {
            Operation::Insert(op) => Operation::Move(MoveOperation::remove(op.position.clone(), op.how_many())),
            Operation::Move(op) => {
                let new_target = op
                    .source_position
                    .with_stickiness(Stickiness::ToNone)
                    .transformed_by_insertion(&op.moved_range_start(), op.how_many);
                Operation::Move(MoveOperation::new(op.moved_range_start(), op.how_many, new_target))
            }
            Operation::Attribute(op) => Operation::Attribute(AttributeOperation::new(
                op.range.clone(),
                op.key.clone(),
                op.new_value.clone(),
                op.old_value.clone(),
            )),
            Operation::Rename(op) => Operation::Rename(RenameOperation::new(
                op.position.clone(),
                op.new_name.clone(),
                op.old_name.clone(),
            )),
            Operation::Marker(op) => Operation::Marker(MarkerOperation::new(
                op.name.clone(),
                op.new_range.clone(),
                op.old_range.clone(),
                op.affects_data,
            )),
            Operation::Split(op) => Operation::Merge(MergeOperation::new(
                op.move_target_position(),
                op.how_many,
                op.split_position.clone(),
                graveyard_start(),
            )),
            Operation::Merge(op) => {
                let split_position = op.target_position.transformed_by_merge(op);
                let insertion_position = op.deletion_position().transformed_by_merge(op);
                Operation::Split(SplitOperation {
                    split_position: split_position.with_stickiness(Stickiness::ToNext),
                    how_many: op.how_many,
                    insertion_position: insertion_position.with_stickiness(Stickiness::ToNone),
                    graveyard_position: Some(op.graveyard_position.clone()),
                    base_version: None,
                })
            }
            Operation::NoOp(_) => Operation::no_op(None),
        };
        if let Some(version) = next_version {
            reversed.set_base_version(version);
        }
        reversed
    }

    pub fn to_json(&self) -> ModelResult<Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Deserialize and check that every referenced root exists in `tree`
    pub fn from_json<T: TreeRoots>(value: Value, tree: &T) -> ModelResult<Self> {
        let op: Operation = serde_json::from_value(value)?;
        for position in op.positions() {
            if tree.root(position.root_name()).is_none() {
                return Err(ModelError::NoSuchRoot(position.root_name().to_string()));
            }
        }
        Ok(op.normalized())
    }
}

#[cfg(test)]
mod tests;
