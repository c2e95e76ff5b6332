//! # Range
//!
//! A pair of positions in one root with `start <= end`. A non-collapsed
//! range's start sticks to the next node and its end to the previous one,
//! so content inserted exactly at a boundary stays outside. A collapsed
//! range behaves like a single position.

use crate::document::TreeRoots;
use crate::error::{ModelError, ModelResult, PositionError};
use crate::operation::{MergeOperation, Operation, SplitOperation};
use crate::position::{Position, PositionRelation, Stickiness};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RangeData")]
pub struct Range {
    start: Position,
    end: Position,
}

#[derive(Deserialize)]
struct RangeData {
    start: Position,
    end: Position,
}

impl TryFrom<RangeData> for Range {
    type Error = ModelError;

    fn try_from(data: RangeData) -> Result<Self, Self::Error> {
        Range::new(data.start, data.end)
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{:?}-{:?}", self.start.root_name(), self.start.path(), self.end.path())
    }
}

impl Range {
    pub fn new(start: Position, end: Position) -> ModelResult<Self> {
        if start.root_name() != end.root_name() {
            return Err(PositionError::DifferentRoots(
                start.root_name().to_string(),
                end.root_name().to_string(),
            )
            .into());
        }
        if start.is_after(&end) {
            return Err(ModelError::InvalidRange);
        }
        Ok(Self::from_positions(start, end))
    }

    /// Build without validation, applying the boundary stickiness rule
    pub(crate) fn from_positions(start: Position, end: Position) -> Self {
        if start == end {
            Self {
                start: start.with_stickiness(Stickiness::ToNone),
                end: end.with_stickiness(Stickiness::ToNone),
            }
        } else {
            Self {
                start: start.with_stickiness(Stickiness::ToNext),
                end: end.with_stickiness(Stickiness::ToPrevious),
            }
        }
    }

    pub fn collapsed(position: Position) -> Self {
        Self::from_positions(position.clone(), position)
    }

    pub fn from_position_and_shift(position: &Position, shift: usize) -> Self {
        Self::from_positions(position.clone(), position.shifted_by(shift as isize))
    }

    /// Range spanning exactly the node at `node_path`
    pub fn on<T: TreeRoots>(tree: &T, root: &str, node_path: &[usize]) -> ModelResult<Self> {
        let start = Position::before(tree, root, node_path)?;
        let end = Position::after(tree, root, node_path)?;
        Ok(Self::from_positions(start, end))
    }

    /// Range spanning the whole content of the element at `element_path`
    pub fn in_element<T: TreeRoots>(tree: &T, root: &str, element_path: &[usize]) -> ModelResult<Self> {
        let start = Position::at_start(root, element_path);
        let end = Position::at_end(tree, root, element_path)?;
        Ok(Self::from_positions(start, end))
    }

    pub fn start(&self) -> &Position {
        &self.start
    }

    pub fn end(&self) -> &Position {
        &self.end
    }

    pub fn root_name(&self) -> &str {
        self.start.root_name()
    }

    pub fn is_collapsed(&self) -> bool {
        self.start == self.end
    }

    /// Both boundaries share a parent
    pub fn is_flat(&self) -> bool {
        self.start.has_same_parent_as(&self.end)
    }

    /// Offset length of a flat range
    pub fn flat_len(&self) -> usize {
        self.end.offset().saturating_sub(self.start.offset())
    }

    /// Strictly inside, boundaries excluded
    pub fn contains_position(&self, position: &Position) -> bool {
        position.is_after(&self.start) && position.is_before(&self.end)
    }

    /// With `loose`, shared boundaries count as contained
    pub fn contains_range(&self, other: &Range, loose: bool) -> bool {
        let loose = loose && !other.is_collapsed();
        let contains_start = self.contains_position(&other.start) || (loose && self.start == other.start);
        let contains_end = self.contains_position(&other.end) || (loose && self.end == other.end);
        contains_start && contains_end
    }

    pub fn is_intersecting(&self, other: &Range) -> bool {
        self.start.is_before(&other.end) && self.end.is_after(&other.start)
    }

    /// Parts of this range not covered by `other` (zero, one or two)
    pub fn get_difference(&self, other: &Range) -> Vec<Range> {
        if !self.is_intersecting(other) {
            return vec![self.clone()];
        }
        let mut ranges = Vec::new();
        if self.contains_position(&other.start) {
            ranges.push(Range::from_positions(self.start.clone(), other.start.clone()));
        }
        if self.contains_position(&other.end) {
            ranges.push(Range::from_positions(other.end.clone(), self.end.clone()));
        }
        ranges
    }

    pub fn get_intersection(&self, other: &Range) -> Option<Range> {
        if !self.is_intersecting(other) {
            return None;
        }
        let start = if self.contains_position(&other.start) {
            other.start.clone()
        } else {
            self.start.clone()
        };
        let end = if self.contains_position(&other.end) {
            other.end.clone()
        } else {
            self.end.clone()
        };
        Some(Range::from_positions(start, end))
    }

    /// Path of the deepest element containing the whole range
    pub fn common_ancestor_path(&self) -> Vec<usize> {
        let common = self.start.common_path(&self.end);
        let depth = common
            .len()
            .min(self.start.depth() - 1)
            .min(self.end.depth() - 1);
        common[..depth].to_vec()
    }

    /// Smallest set of flat ranges covering this range
    pub fn get_minimal_flat_ranges<T: TreeRoots>(&self, tree: &T) -> ModelResult<Vec<Range>> {
        let mut ranges = Vec::new();
        let diff_at = self.start.common_path(&self.end).len();
        let mut position = self.start.clone();

        while position.depth() > diff_at + 1 {
            let max_offset = position.parent(tree)?.max_offset();
            let how_many = max_offset.saturating_sub(position.offset());
            if how_many != 0 {
                ranges.push(Range::from_position_and_shift(&position, how_many));
            }
            let parent = position
                .parent_position()
                .ok_or_else(|| ModelError::invalid_path(position.root_name(), position.path()))?;
            position = parent.shifted_by(1);
        }

        while position.depth() <= self.end.depth() {
            let offset = self.end.path()[position.depth() - 1];
            let how_many = offset.saturating_sub(position.offset());
            if how_many != 0 {
                ranges.push(Range::from_position_and_shift(&position, how_many));
            }
            position = position.with_offset(offset).child(0);
        }
        Ok(ranges)
    }

    /// Join ranges that touch the first one into a single range
    pub fn from_ranges(ranges: &[Range]) -> Option<Range> {
        let reference = ranges.first()?;
        if ranges.len() == 1 {
            return Some(reference.clone());
        }

        let mut sorted = ranges.to_vec();
        sorted.sort_by(|a, b| match a.start.compare_with(&b.start) {
            PositionRelation::Before => std::cmp::Ordering::Less,
            PositionRelation::After => std::cmp::Ordering::Greater,
            _ => std::cmp::Ordering::Equal,
        });
        let reference_index = sorted.iter().position(|range| range == reference)?;

        let mut start = reference.start.clone();
        let mut end = reference.end.clone();
        for range in sorted[..reference_index].iter().rev() {
            if range.end == start {
                start = range.start.clone();
            } else {
                break;
            }
        }
        for range in &sorted[reference_index + 1..] {
            if range.start == end {
                end = range.end.clone();
            } else {
                break;
            }
        }
        Some(Range::from_positions(start, end))
    }

    pub(crate) fn transformed_by_insertion(&self, insert: &Position, how_many: usize, spread: bool) -> Vec<Range> {
        if spread && self.contains_position(insert) {
            return vec![
                Range::from_positions(self.start.clone(), insert.clone()),
                Range::from_positions(
                    insert.shifted_by(how_many as isize),
                    self.end.transformed_by_insertion(insert, how_many),
                ),
            ];
        }
        vec![Range::from_positions(
            self.start.transformed_by_insertion(insert, how_many),
            self.end.transformed_by_insertion(insert, how_many),
        )]
    }

    pub(crate) fn transformed_by_deletion(&self, deletion: &Position, how_many: usize) -> Option<Range> {
        let start = self.start.get_transformed_by_deletion(deletion, how_many);
        let end = self.end.get_transformed_by_deletion(deletion, how_many);
        if start.is_none() && end.is_none() {
            return None;
        }
        Some(Range::from_positions(
            start.unwrap_or_else(|| deletion.clone()),
            end.unwrap_or_else(|| deletion.clone()),
        ))
    }

    pub(crate) fn transformed_by_move(
        &self,
        source: &Position,
        target: &Position,
        how_many: usize,
        spread: bool,
    ) -> Vec<Range> {
        if self.is_collapsed() {
            let position = self.start.transformed_by_move(source, target, how_many);
            return vec![Range::collapsed(position)];
        }

        let move_range = Range::from_position_and_shift(source, how_many);
        let insert_position = target
            .get_transformed_by_deletion(source, how_many)
            .unwrap_or_else(|| target.clone());

        if self.contains_position(target)
            && !spread
            && (move_range.contains_position(&self.start) || move_range.contains_position(&self.end))
        {
            let start = self.start.transformed_by_move(source, target, how_many);
            let end = self.end.transformed_by_move(source, target, how_many);
            return vec![Range::from_positions(start, end)];
        }

        let difference_set = self.get_difference(&move_range);
        let common = self.get_intersection(&move_range);
        let after_deletion = |position: &Position| {
            position
                .get_transformed_by_deletion(source, how_many)
                .unwrap_or_else(|| source.clone())
        };

        let difference = match difference_set.len() {
            1 => Some(Range::from_positions(
                after_deletion(&difference_set[0].start),
                after_deletion(&difference_set[0].end),
            )),
            2 => Some(Range::from_positions(self.start.clone(), after_deletion(&self.end))),
            _ => None,
        };

        let mut result = match difference {
            Some(difference) => {
                difference.transformed_by_insertion(&insert_position, how_many, common.is_some() || spread)
            }
            None => Vec::new(),
        };

        if let Some(common) = common {
            let moved = Range::from_positions(
                common.start.combined(&move_range.start, &insert_position),
                common.end.combined(&move_range.start, &insert_position),
            );
            if result.len() == 2 {
                result.insert(1, moved);
            } else {
                result.push(moved);
            }
        }
        result
    }

    pub(crate) fn transformed_by_split(&self, op: &SplitOperation) -> Range {
        let start = self.start.transformed_by_split(op);
        let mut end = self.end.transformed_by_split(op);

        if self.end == op.insertion_position {
            end = self.end.shifted_by(1);
        }
        if start.root_name() != end.root_name() {
            end = self.end.shifted_by(-1);
        }
        Range::from_positions(start, end)
    }

    pub(crate) fn transformed_by_merge(&self, op: &MergeOperation) -> Range {
        let deletion = op.deletion_position();
        if self.start == op.target_position && self.end == deletion {
            return Range::collapsed(self.start.clone());
        }

        let mut start = self.start.transformed_by_merge(op);
        let mut end = self.end.transformed_by_merge(op);

        if start.root_name() != end.root_name() {
            end = self.end.shifted_by(-1);
        }

        if start.is_after(&end) {
            if op.source_position.is_before(&op.target_position) {
                start = end.with_offset(0);
            } else {
                if deletion != start {
                    end = deletion;
                }
                start = op.target_position.clone();
            }
        }
        Range::from_positions(start, end)
    }

    /// Ranges this range becomes after `op`; a move can cut it in pieces
    pub fn get_transformed_by_operation(&self, op: &Operation) -> Vec<Range> {
        match op {
            Operation::Insert(insert) => {
                self.transformed_by_insertion(&insert.position, insert.how_many(), false)
            }
            Operation::Move(mv) => {
                self.transformed_by_move(&mv.source_position, &mv.target_position, mv.how_many, false)
            }
            Operation::Split(split) => vec![self.transformed_by_split(split)],
            Operation::Merge(merge) => vec![self.transformed_by_merge(merge)],
            _ => vec![self.clone()],
        }
    }

    pub fn get_transformed_by_operations<'a>(&self, ops: impl IntoIterator<Item = &'a Operation>) -> Vec<Range> {
        let mut ranges = vec![self.clone()];
        for op in ops {
            ranges = ranges
                .iter()
                .flat_map(|range| range.get_transformed_by_operation(op))
                .collect();
        }
        ranges
    }

    pub fn from_json<T: TreeRoots>(value: serde_json::Value, tree: &T) -> ModelResult<Self> {
        let range: Range = serde_json::from_value(value)?;
        if tree.root(range.root_name()).is_none() {
            return Err(ModelError::NoSuchRoot(range.root_name().to_string()));
        }
        Ok(range)
    }
}
