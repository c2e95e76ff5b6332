//! # Operation transformation
//!
//! `transform(a, b, context)` rewrites `a` so it can be applied after `b`,
//! where both were created against the same document version. The result
//! is one or more operations; an operation that lost all meaning becomes a
//! single `NoOp` so version counting stays aligned.
//!
//! ## Tie-breaking
//!
//! When both operations touch the exact same spot the stronger one wins.
//! `context.a_is_strong` decides; callers pass opposite values for the two
//! directions so both sides agree. Removal always beats a plain move of the
//! same content.

use super::{
    AttributeOperation, InsertOperation, MarkerOperation, MergeOperation, MoveOperation, Operation,
    RenameOperation, SplitOperation,
};
use crate::document::GRAVEYARD_ROOT_NAME;
use crate::markers::transform_live_range;
use crate::position::{compare_paths, PathRelation, Position, Stickiness};
use crate::range::Range;
use serde_json::Value;
use tracing::{instrument, trace};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransformContext {
    /// `a` wins ties against `b`
    pub a_is_strong: bool,
}

impl TransformContext {
    pub fn strong() -> Self {
        Self { a_is_strong: true }
    }

    pub fn weak() -> Self {
        Self { a_is_strong: false }
    }

    fn flipped(&self) -> Self {
        Self {
            a_is_strong: !self.a_is_strong,
        }
    }
}

/// Both sets, each rewritten to follow the other one
#[derive(Debug, Clone, PartialEq)]
pub struct TransformedSets {
    /// `operations_a` rewritten to apply after `operations_b`
    pub operations_a: Vec<Operation>,
    /// `operations_b` rewritten to apply after `operations_a`
    pub operations_b: Vec<Operation>,
}

/// Rewrite `a` to apply on top of `b`
pub fn transform(a: &Operation, b: &Operation, context: &TransformContext) -> Vec<Operation> {
    let a = a.clone().normalized();
    let b = b.clone().normalized();
    let base_version = a.base_version();

    let transformed = match (a, &b) {
        (a, Operation::NoOp(_)) | (a @ Operation::NoOp(_), _) => vec![a],

        (Operation::Insert(a), Operation::Insert(b)) => insert_by_insert(a, b, context),
        (Operation::Insert(mut a), b) => {
            a.position = a.position.get_transformed_by_operation(b);
            vec![Operation::Insert(a)]
        }

        (Operation::Move(a), Operation::Insert(b)) => move_by_insert(a, b),
        (Operation::Move(a), Operation::Move(b)) => move_by_move(a, b, context),
        (Operation::Move(a), Operation::Split(b)) => move_by_split(a, b),
        (Operation::Move(a), Operation::Merge(b)) => move_by_merge(a, b),
        (a @ Operation::Move(_), _) => vec![a],

        (Operation::Attribute(a), Operation::Insert(b)) => attribute_by_insert(a, b),
        (Operation::Attribute(a), Operation::Move(b)) => attribute_by_move(a, b),
        (Operation::Attribute(a), Operation::Attribute(b)) => attribute_by_attribute(a, b, context),
        (Operation::Attribute(a), Operation::Split(b)) => attribute_by_split(a, b),
        (Operation::Attribute(a), Operation::Merge(b)) => attribute_by_merge(a, b),
        (a @ Operation::Attribute(_), _) => vec![a],

        (Operation::Rename(a), Operation::Rename(b)) => rename_by_rename(a, b, context),
        (Operation::Rename(a), Operation::Split(b)) => rename_by_split(a, b),
        (Operation::Rename(a), Operation::Merge(b)) => rename_by_merge(a, b),
        (Operation::Rename(mut a), b @ (Operation::Insert(_) | Operation::Move(_))) => {
            a.position = a.position.get_transformed_by_operation(b);
            vec![Operation::Rename(a)]
        }
        (a @ Operation::Rename(_), _) => vec![a],

        (Operation::Marker(a), Operation::Marker(b)) => marker_by_marker(a, b, context),
        (Operation::Marker(a), b) => marker_by_structure(a, b),

        (Operation::Split(a), Operation::Insert(b)) => split_by_insert(a, b),
        (Operation::Split(a), Operation::Move(b)) => split_by_move(a, b),
        (Operation::Split(a), Operation::Split(b)) => split_by_split(a, b),
        (Operation::Split(a), Operation::Merge(b)) => split_by_merge(a, b),
        (a @ Operation::Split(_), _) => vec![a],

        (Operation::Merge(a), Operation::Insert(b)) => merge_by_insert(a, b),
        (Operation::Merge(a), Operation::Move(b)) => merge_by_move(a, b),
        (Operation::Merge(a), Operation::Split(b)) => merge_by_split(a, b),
        (Operation::Merge(a), Operation::Merge(b)) => merge_by_merge(a, b, context),
        (a @ Operation::Merge(_), _) => vec![a],
    };

    let mut transformed: Vec<Operation> = transformed.into_iter().map(Operation::normalized).collect();
    if transformed.is_empty() {
        transformed.push(Operation::no_op(None));
    }
    if let Some(version) = base_version {
        for op in &mut transformed {
            op.set_base_version(version);
        }
    }
    trace!(count = transformed.len(), against = b.type_name(), "Transformed operation");
    transformed
}

/// Transform two concurrent operation lists against each other
///
/// Versions are renumbered so each rewritten list continues right after the
/// list it now follows.
#[instrument(skip_all, fields(a = operations_a.len(), b = operations_b.len()))]
pub fn transform_sets(operations_a: &[Operation], operations_b: &[Operation], a_is_strong: bool) -> TransformedSets {
    let context = TransformContext { a_is_strong };
    let (mut transformed_a, mut transformed_b) = transform_lists(operations_a, operations_b, &context);
    renumber(&mut transformed_a, operations_b, operations_a);
    renumber(&mut transformed_b, operations_a, operations_b);
    TransformedSets {
        operations_a: transformed_a,
        operations_b: transformed_b,
    }
}

fn transform_lists(a: &[Operation], b: &[Operation], context: &TransformContext) -> (Vec<Operation>, Vec<Operation>) {
    if a.is_empty() || b.is_empty() {
        return (a.to_vec(), b.to_vec());
    }
    if a.len() == 1 && b.len() == 1 {
        return (transform(&a[0], &b[0], context), transform(&b[0], &a[0], &context.flipped()));
    }
    if a.len() > 1 {
        let (first, b_after_first) = transform_lists(&a[..1], b, context);
        let (rest, b_after_all) = transform_lists(&a[1..], &b_after_first, context);
        let mut transformed_a = first;
        transformed_a.extend(rest);
        (transformed_a, b_after_all)
    } else {
        let (a_after_first, first) = transform_lists(a, &b[..1], context);
        let (a_after_all, rest) = transform_lists(&a_after_first, &b[1..], context);
        let mut transformed_b = first;
        transformed_b.extend(rest);
        (a_after_all, transformed_b)
    }
}

fn renumber(ops: &mut [Operation], applied_first: &[Operation], original: &[Operation]) {
    if applied_first.is_empty() {
        return;
    }
    let base = applied_first
        .first()
        .and_then(Operation::base_version)
        .or_else(|| original.first().and_then(Operation::base_version));
    if let Some(base) = base {
        let start = base + applied_first.len() as u64;
        for (index, op) in ops.iter_mut().enumerate() {
            op.set_base_version(start + index as u64);
        }
    }
}

fn single(ranges: Vec<Range>, fallback: Range) -> Range {
    ranges.into_iter().next().unwrap_or(fallback)
}

fn targets_graveyard(op: &MoveOperation) -> bool {
    op.target_position.root_name() == GRAVEYARD_ROOT_NAME
}

/// Moves that carry each flat range to `target`, one after another
fn move_ops_from_ranges(ranges: Vec<Range>, target: Position) -> Vec<Operation> {
    let mut ranges: Vec<Range> = ranges.into_iter().filter(|range| !range.is_collapsed()).collect();
    let mut target = target.with_stickiness(Stickiness::ToNone);
    let mut operations = Vec::with_capacity(ranges.len());

    for index in 0..ranges.len() {
        let range = ranges[index].clone();
        let op = MoveOperation::new(range.start().clone(), range.flat_len(), target.clone());
        for later in ranges.iter_mut().skip(index + 1) {
            let fallback = later.clone();
            *later = single(
                later.transformed_by_move(&op.source_position, &op.target_position, op.how_many, false),
                fallback,
            );
        }
        target = target.transformed_by_move(&op.source_position, &op.target_position, op.how_many);
        operations.push(Operation::Move(op));
    }
    operations
}

fn with_range(op: &AttributeOperation, range: Range) -> Operation {
    Operation::Attribute(AttributeOperation {
        range,
        key: op.key.clone(),
        old_value: op.old_value.clone(),
        new_value: op.new_value.clone(),
        base_version: op.base_version,
    })
}

fn insert_by_insert(mut a: InsertOperation, b: &InsertOperation, context: &TransformContext) -> Vec<Operation> {
    if a.position == b.position && context.a_is_strong {
        return vec![Operation::Insert(a)];
    }
    a.position = a.position.transformed_by_insertion(&b.position, b.how_many());
    vec![Operation::Insert(a)]
}

fn move_by_insert(mut a: MoveOperation, b: &InsertOperation) -> Vec<Operation> {
    let move_range = a.source_range();
    let transformed = single(
        move_range.transformed_by_insertion(&b.position, b.how_many(), false),
        move_range,
    );
    a.source_position = transformed.start().clone();
    a.how_many = transformed.flat_len();
    if a.target_position != b.position {
        a.target_position = a.target_position.transformed_by_insertion(&b.position, b.how_many());
    }
    vec![Operation::Move(a)]
}

fn target_inside_moved(a: &MoveOperation, b: &MoveOperation) -> bool {
    a.target_position
        .get_transformed_by_deletion(&b.source_position, b.how_many)
        .is_none()
}

fn move_by_move(a: MoveOperation, b: &MoveOperation, context: &TransformContext) -> Vec<Operation> {
    let range_a = a.source_range();
    let range_b = b.source_range();
    let insert_before = !context.a_is_strong;

    let new_target = if a.target_position == b.target_position && insert_before {
        a.target_position
            .get_transformed_by_deletion(&b.source_position, b.how_many)
            .unwrap_or_else(|| a.target_position.clone())
    } else {
        a.target_position
            .transformed_by_move(&b.source_position, &b.target_position, b.how_many)
    };

    // Each one moves into the other's range: undo `b` instead
    if target_inside_moved(&a, b) && target_inside_moved(b, &a) {
        return vec![Operation::Move(b.clone()).get_reversed()];
    }

    // `a` moves the whole of `b` along with its target
    if range_a.contains_position(&b.target_position) && range_a.contains_range(&range_b, true) {
        let start = range_a
            .start()
            .transformed_by_move(&b.source_position, &b.target_position, b.how_many);
        let end = range_a
            .end()
            .transformed_by_move(&b.source_position, &b.target_position, b.how_many);
        return move_ops_from_ranges(vec![Range::from_positions(start, end)], new_target);
    }

    // `b` moved the whole of `a` into a new place
    if range_b.contains_position(&a.target_position) && range_b.contains_range(&range_a, true) {
        let moved_start = b.moved_range_start();
        let start = range_a.start().combined(&b.source_position, &moved_start);
        let end = range_a.end().combined(&b.source_position, &moved_start);
        return move_ops_from_ranges(vec![Range::from_positions(start, end)], new_target);
    }

    // Ranges in nested parents never overlap partially
    let nested = a.source_position.root_name() == b.source_position.root_name()
        && matches!(
            compare_paths(a.source_position.parent_path(), b.source_position.parent_path()),
            PathRelation::Prefix | PathRelation::Extension
        );
    if nested {
        let start = range_a
            .start()
            .transformed_by_move(&b.source_position, &b.target_position, b.how_many);
        let end = range_a
            .end()
            .transformed_by_move(&b.source_position, &b.target_position, b.how_many);
        return move_ops_from_ranges(vec![Range::from_positions(start, end)], new_target);
    }

    // `b` drops its nodes inside `range_a`: they travel with `a`
    let b_targets_into_a = target_inside_moved(b, &a);

    // `a` drops its nodes inside `range_b`: the shared part follows `a`
    // there, as `b` carries the rest along
    let a_is_strong = target_inside_moved(&a, b)
        || match (targets_graveyard(&a), targets_graveyard(b)) {
            (true, false) => true,
            (false, true) => false,
            _ => context.a_is_strong,
        };

    let moved_start = b.moved_range_start();
    let mut ranges = Vec::new();
    for range in range_a.get_difference(&range_b) {
        let start = range
            .start()
            .get_transformed_by_deletion(&b.source_position, b.how_many)
            .unwrap_or_else(|| b.source_position.clone());
        let end = range
            .end()
            .get_transformed_by_deletion(&b.source_position, b.how_many)
            .unwrap_or_else(|| b.source_position.clone());
        let spread = !b_targets_into_a && start.has_same_parent_as(&moved_start);
        ranges.extend(Range::from_positions(start, end).transformed_by_insertion(&moved_start, b.how_many, spread));
    }

    if let Some(common) = range_a.get_intersection(&range_b) {
        if a_is_strong && !b_targets_into_a {
            let common = Range::from_positions(
                common.start().combined(&b.source_position, &moved_start),
                common.end().combined(&b.source_position, &moved_start),
            );
            match ranges.len() {
                0 => ranges.push(common),
                1 => {
                    if !range_b.start().is_after(range_a.start()) {
                        ranges.insert(0, common);
                    } else {
                        ranges.push(common);
                    }
                }
                _ => ranges.insert(1, common),
            }
        }
    }

    if ranges.is_empty() {
        return vec![Operation::no_op(a.base_version)];
    }
    move_ops_from_ranges(ranges, new_target)
}

fn move_by_split(mut a: MoveOperation, b: &SplitOperation) -> Vec<Operation> {
    let new_target = a.target_position.transformed_by_split(b);
    let move_range = a.source_range();

    // The last moved element got split: take the new half along
    if *move_range.end() == b.insertion_position {
        if b.graveyard_position.is_none() {
            a.how_many += 1;
        }
        a.target_position = new_target;
        return vec![Operation::Move(a)];
    }

    // The split cut the moved range in two
    if move_range.start().has_same_parent_as(&b.split_position) && move_range.contains_position(&b.split_position) {
        let right = Range::from_positions(b.split_position.clone(), move_range.end().clone()).transformed_by_split(b);
        let left = Range::from_positions(move_range.start().clone(), b.split_position.clone());
        return move_ops_from_ranges(vec![left, right], new_target);
    }

    let mut ranges = vec![move_range.transformed_by_split(b)];
    if let Some(graveyard) = &b.graveyard_position {
        let moves_graveyard_element = move_range.start() == graveyard || move_range.contains_position(graveyard);
        if a.how_many > 1 && moves_graveyard_element {
            ranges.push(Range::from_position_and_shift(&b.insertion_position, 1));
        }
    }
    move_ops_from_ranges(ranges, new_target)
}

fn move_by_merge(mut a: MoveOperation, b: &MergeOperation) -> Vec<Operation> {
    let move_range = a.source_range();
    let deletion = b.deletion_position();

    if deletion.has_same_parent_as(&a.source_position) && move_range.contains_position(&b.source_position) {
        if targets_graveyard(&a) {
            // Removal wins: the merged content is taken back out of the
            // target and removed together with its element
            let mut results = Vec::new();
            let mut graveyard_source = b.graveyard_position.clone();
            let mut content_source = b.target_position.transformed_by_merge(b);
            if a.how_many > 1 {
                let rest = MoveOperation::new(a.source_position.clone(), a.how_many - 1, a.target_position.clone());
                graveyard_source =
                    graveyard_source.transformed_by_move(&rest.source_position, &rest.target_position, rest.how_many);
                content_source =
                    content_source.transformed_by_move(&rest.source_position, &rest.target_position, rest.how_many);
                results.push(Operation::Move(rest));
            }
            let graveyard_target = deletion.combined(&a.source_position, &a.target_position);
            let element_move = MoveOperation::new(graveyard_source.clone(), 1, graveyard_target.clone());
            let content_target = element_move.moved_range_start().child(0);
            content_source = content_source
                .with_stickiness(Stickiness::ToNone)
                .transformed_by_move(&graveyard_source, &graveyard_target, 1);
            let content_move = MoveOperation::new(content_source, b.how_many, content_target);
            results.push(Operation::Move(element_move));
            results.push(Operation::Move(content_move));
            return results;
        }
        if a.how_many == 1 {
            // The merged element itself was moved; the merge already took it
            return vec![Operation::no_op(a.base_version)];
        }
    }

    let transformed = move_range.transformed_by_merge(b);
    a.source_position = transformed.start().clone();
    a.how_many = transformed.flat_len();
    a.target_position = a.target_position.transformed_by_merge(b);
    vec![Operation::Move(a)]
}

fn complementary_attribute_operation(insert: &InsertOperation, key: &str, new_value: Option<&Value>) -> Option<Operation> {
    let insert_value = insert.nodes.first()?.get_attribute(key);
    if insert_value == new_value {
        return None;
    }
    Some(Operation::Attribute(AttributeOperation::new(
        Range::from_position_and_shift(&insert.position, insert.how_many()),
        key,
        insert_value.cloned(),
        new_value.cloned(),
    )))
}

fn attribute_by_insert(mut a: AttributeOperation, b: &InsertOperation) -> Vec<Operation> {
    if a.range.start().has_same_parent_as(&b.position) && a.range.contains_position(&b.position) {
        let ranges = a
            .range
            .transformed_by_insertion(&b.position, b.how_many(), !b.should_receive_attributes);
        let mut result: Vec<Operation> = ranges.into_iter().map(|range| with_range(&a, range)).collect();
        if b.should_receive_attributes {
            if let Some(op) = complementary_attribute_operation(b, &a.key, a.old_value.as_ref()) {
                result.insert(0, op);
            }
        }
        return result;
    }
    let fallback = a.range.clone();
    a.range = single(a.range.transformed_by_insertion(&b.position, b.how_many(), false), fallback);
    vec![Operation::Attribute(a)]
}

/// Pieces of `range` after `b`, split where the move cut through it
fn break_range_by_move(range: &Range, b: &MoveOperation) -> Vec<Range> {
    let move_range = b.source_range();
    let (difference, common) = if move_range.contains_range(range, true) {
        (Vec::new(), Some(range.clone()))
    } else if range.start().has_same_parent_as(move_range.start()) {
        (range.get_difference(&move_range), range.get_intersection(&move_range))
    } else {
        (vec![range.clone()], None)
    };

    let target = b.moved_range_start();
    let mut result = Vec::new();
    for part in difference {
        let Some(part) = part.transformed_by_deletion(&b.source_position, b.how_many) else {
            continue;
        };
        let spread = part.start().has_same_parent_as(&target);
        result.extend(part.transformed_by_insertion(&target, b.how_many, spread));
    }
    if let Some(common) = common {
        let fallback = common.clone();
        result.push(single(
            common.transformed_by_move(&b.source_position, &b.target_position, b.how_many, false),
            fallback,
        ));
    }
    result
}

fn attribute_by_move(a: AttributeOperation, b: &MoveOperation) -> Vec<Operation> {
    break_range_by_move(&a.range, b)
        .into_iter()
        .map(|range| with_range(&a, range))
        .collect()
}

fn attribute_by_attribute(a: AttributeOperation, b: &AttributeOperation, context: &TransformContext) -> Vec<Operation> {
    if a.key != b.key || !a.range.start().has_same_parent_as(b.range.start()) {
        return vec![Operation::Attribute(a)];
    }
    let mut operations: Vec<Operation> = a
        .range
        .get_difference(&b.range)
        .into_iter()
        .map(|range| with_range(&a, range))
        .collect();
    if let Some(common) = a.range.get_intersection(&b.range) {
        if context.a_is_strong {
            operations.push(Operation::Attribute(AttributeOperation::new(
                common,
                b.key.clone(),
                b.new_value.clone(),
                a.new_value.clone(),
            )));
        }
    }
    if operations.is_empty() {
        return vec![Operation::no_op(a.base_version)];
    }
    operations
}

fn attribute_by_split(mut a: AttributeOperation, b: &SplitOperation) -> Vec<Operation> {
    // The range ended right after the split element: cover the new half too
    if *a.range.end() == b.insertion_position {
        if b.graveyard_position.is_none() {
            a.range = Range::from_positions(a.range.start().clone(), a.range.end().shifted_by(1));
        }
        return vec![Operation::Attribute(a)];
    }

    if a.range.start().has_same_parent_as(&b.split_position) && a.range.contains_position(&b.split_position) {
        let second = Range::from_positions(
            b.move_target_position(),
            a.range.end().combined(&b.split_position, &b.move_target_position()),
        );
        let first = Range::from_positions(a.range.start().clone(), b.split_position.clone());
        return vec![with_range(&a, first), with_range(&a, second)];
    }

    a.range = a.range.transformed_by_split(b);
    vec![Operation::Attribute(a)]
}

fn attribute_by_merge(a: AttributeOperation, b: &MergeOperation) -> Vec<Operation> {
    let deletion = b.deletion_position();
    let mut ranges = Vec::new();

    // The merged element keeps the attribute in the graveyard
    if a.range.start().has_same_parent_as(&deletion)
        && (a.range.contains_position(&deletion) || *a.range.start() == deletion)
    {
        ranges.push(Range::from_position_and_shift(&b.graveyard_position, 1));
    }
    let range = a.range.transformed_by_merge(b);
    if !range.is_collapsed() {
        ranges.push(range);
    }
    if ranges.is_empty() {
        return vec![Operation::no_op(a.base_version)];
    }
    ranges.into_iter().map(|range| with_range(&a, range)).collect()
}

fn rename_by_rename(mut a: RenameOperation, b: &RenameOperation, context: &TransformContext) -> Vec<Operation> {
    if a.position == b.position {
        if !context.a_is_strong {
            return vec![Operation::no_op(a.base_version)];
        }
        a.old_name = b.new_name.clone();
    }
    vec![Operation::Rename(a)]
}

fn rename_by_split(mut a: RenameOperation, b: &SplitOperation) -> Vec<Operation> {
    // The renamed element was split: rename the new half as well
    let splits_renamed = a.position.root_name() == b.split_position.root_name()
        && a.position.path() == b.split_position.parent_path();
    if splits_renamed && b.graveyard_position.is_none() {
        let extra = RenameOperation::new(a.position.shifted_by(1), a.old_name.clone(), a.new_name.clone());
        return vec![Operation::Rename(a), Operation::Rename(extra)];
    }
    a.position = a.position.transformed_by_split(b);
    vec![Operation::Rename(a)]
}

fn rename_by_merge(mut a: RenameOperation, b: &MergeOperation) -> Vec<Operation> {
    if a.position == b.deletion_position() {
        a.position = b.graveyard_position.with_stickiness(Stickiness::ToNext);
        return vec![Operation::Rename(a)];
    }
    a.position = a.position.transformed_by_merge(b);
    vec![Operation::Rename(a)]
}

fn marker_by_marker(mut a: MarkerOperation, b: &MarkerOperation, context: &TransformContext) -> Vec<Operation> {
    if a.name == b.name {
        if !context.a_is_strong {
            return vec![Operation::no_op(a.base_version)];
        }
        a.old_range = b.new_range.clone();
    }
    vec![Operation::Marker(a)]
}

fn marker_by_structure(mut a: MarkerOperation, b: &Operation) -> Vec<Operation> {
    a.old_range = a.old_range.map(|range| transform_live_range(&range, b));
    a.new_range = a.new_range.map(|range| transform_live_range(&range, b));
    vec![Operation::Marker(a)]
}

/// The new element always goes right after the split one
fn finish_split(mut a: SplitOperation) -> Operation {
    a.insertion_position = SplitOperation::insertion_position_for(&a.split_position);
    Operation::Split(a)
}

fn split_by_insert(mut a: SplitOperation, b: &InsertOperation) -> Vec<Operation> {
    if a.split_position.has_same_parent_as(&b.position) && a.split_position.offset() < b.position.offset() {
        a.how_many += b.how_many();
    }
    a.split_position = a.split_position.transformed_by_insertion(&b.position, b.how_many());
    vec![finish_split(a)]
}

fn split_by_move(mut a: SplitOperation, b: &MoveOperation) -> Vec<Operation> {
    let range_to_move = b.source_range();

    if let Some(graveyard) = a.graveyard_position.clone() {
        // The element the split wanted back was moved: move the content into it instead
        if *range_to_move.start() == graveyard || range_to_move.contains_position(&graveyard) {
            let source = a
                .split_position
                .transformed_by_move(&b.source_position, &b.target_position, b.how_many);
            let parent = graveyard.transformed_by_move(&b.source_position, &b.target_position, b.how_many);
            return vec![Operation::Move(MoveOperation::new(source, a.how_many, parent.child(0)))];
        }
        a.graveyard_position = Some(graveyard.transformed_by_move(&b.source_position, &b.target_position, b.how_many));
    }

    // Part of the content after the split point was moved away
    if a.split_position.has_same_parent_as(&b.source_position) && range_to_move.contains_position(&a.split_position) {
        let removed = b.how_many - (a.split_position.offset() - b.source_position.offset());
        a.how_many = a.how_many.saturating_sub(removed);
        if a.split_position.has_same_parent_as(&b.target_position) && a.split_position.offset() < b.target_position.offset() {
            a.how_many += b.how_many;
        }
        a.split_position = range_to_move
            .end()
            .with_stickiness(Stickiness::ToNone)
            .transformed_by_move(&b.source_position, &b.target_position, b.how_many);
        return vec![finish_split(a)];
    }

    if a.split_position.has_same_parent_as(&b.source_position) && a.split_position.offset() <= b.source_position.offset() {
        a.how_many = a.how_many.saturating_sub(b.how_many);
    }
    if a.split_position.has_same_parent_as(&b.target_position) && a.split_position.offset() < b.target_position.offset() {
        a.how_many += b.how_many;
    }
    a.split_position = a
        .split_position
        .with_stickiness(Stickiness::ToNone)
        .transformed_by_move(&b.source_position, &b.target_position, b.how_many);
    vec![finish_split(a)]
}

fn split_by_split(mut a: SplitOperation, b: &SplitOperation) -> Vec<Operation> {
    if a.split_position == b.split_position {
        let same_source = match (&a.graveyard_position, &b.graveyard_position) {
            (None, None) => true,
            (Some(x), Some(y)) => x == y,
            _ => false,
        };
        if same_source {
            return vec![Operation::no_op(a.base_version)];
        }
    }
    if a.split_position.has_same_parent_as(&b.split_position) && a.split_position.offset() < b.split_position.offset() {
        a.how_many = a.how_many.saturating_sub(b.how_many);
    }
    a.split_position = a.split_position.transformed_by_split(b);
    if let Some(graveyard) = a.graveyard_position.take() {
        a.graveyard_position = Some(match &b.graveyard_position {
            Some(taken) => graveyard.get_transformed_by_deletion(taken, 1).unwrap_or(graveyard),
            None => graveyard,
        });
    }
    vec![finish_split(a)]
}

fn split_by_merge(mut a: SplitOperation, b: &MergeOperation) -> Vec<Operation> {
    let deletion = b.deletion_position();
    if a.split_position.has_same_parent_as(&b.source_position) {
        // Split inside the merged element: the tail now ends the target
    } else if a.split_position.has_same_parent_as(&b.target_position)
        && a.split_position.offset() <= b.target_position.offset()
    {
        a.how_many += b.how_many;
    } else if a.split_position.has_same_parent_as(&deletion) && a.split_position.offset() <= deletion.offset() {
        a.how_many = a.how_many.saturating_sub(1);
    }
    a.split_position = a.split_position.transformed_by_merge(b);
    if let Some(graveyard) = a.graveyard_position.take() {
        a.graveyard_position = Some(graveyard.transformed_by_insertion(&b.graveyard_position, 1));
    }
    vec![finish_split(a)]
}

fn merge_by_insert(mut a: MergeOperation, b: &InsertOperation) -> Vec<Operation> {
    if a.source_position.has_same_parent_as(&b.position) {
        a.how_many += b.how_many();
    }
    a.source_position = a.source_position.transformed_by_insertion(&b.position, b.how_many());
    a.target_position = a.target_position.transformed_by_insertion(&b.position, b.how_many());
    vec![Operation::Merge(a)]
}

fn merge_by_move(mut a: MergeOperation, b: &MoveOperation) -> Vec<Operation> {
    let removed_range = b.source_range();
    if targets_graveyard(b)
        && a.deletion_position().has_same_parent_as(&b.source_position)
        && removed_range.contains_position(&a.source_position)
    {
        return vec![Operation::no_op(a.base_version)];
    }

    if a.source_position.has_same_parent_as(&b.target_position) {
        a.how_many += b.how_many;
    }
    if a.source_position.has_same_parent_as(&b.source_position) {
        a.how_many = a.how_many.saturating_sub(b.how_many);
    }
    a.source_position = a
        .source_position
        .transformed_by_move(&b.source_position, &b.target_position, b.how_many);
    a.target_position = a
        .target_position
        .transformed_by_move(&b.source_position, &b.target_position, b.how_many);
    if a.graveyard_position != b.target_position {
        a.graveyard_position = a
            .graveyard_position
            .transformed_by_move(&b.source_position, &b.target_position, b.how_many);
    }
    vec![Operation::Merge(a)]
}

fn merge_by_split(mut a: MergeOperation, b: &SplitOperation) -> Vec<Operation> {
    if let Some(graveyard) = &b.graveyard_position {
        if a.deletion_position() == *graveyard {
            a.how_many = b.how_many;
        }
        a.graveyard_position = a
            .graveyard_position
            .get_transformed_by_deletion(graveyard, 1)
            .unwrap_or_else(|| a.graveyard_position.clone());
    }
    if a.source_position.has_same_parent_as(&b.split_position) {
        a.how_many = b.split_position.offset();
    }
    a.source_position = a.source_position.transformed_by_split(b);
    a.target_position = a.target_position.transformed_by_split(b);
    vec![Operation::Merge(a)]
}

fn merge_by_merge(mut a: MergeOperation, b: &MergeOperation, context: &TransformContext) -> Vec<Operation> {
    if a.source_position == b.source_position {
        if a.target_position == b.target_position {
            return vec![Operation::no_op(a.base_version)];
        }
        // Same element merged into different targets
        let a_to_graveyard = a.target_position.root_name() == GRAVEYARD_ROOT_NAME;
        let b_to_graveyard = b.target_position.root_name() == GRAVEYARD_ROOT_NAME;
        let force_move = (b_to_graveyard && !a_to_graveyard) || (!(a_to_graveyard && !b_to_graveyard) && context.a_is_strong);
        if force_move {
            let source = b.target_position.transformed_by_merge(b);
            let target = a.target_position.transformed_by_merge(b);
            return vec![Operation::Move(MoveOperation::new(source, a.how_many, target))];
        }
        return vec![Operation::no_op(a.base_version)];
    }

    if a.source_position.has_same_parent_as(&b.target_position) {
        a.how_many += b.how_many;
    }
    a.source_position = a.source_position.transformed_by_merge(b);
    a.target_position = a.target_position.transformed_by_merge(b);
    if a.graveyard_position != b.graveyard_position || !context.a_is_strong {
        a.graveyard_position = a.graveyard_position.transformed_by_merge(b);
    }
    vec![Operation::Merge(a)]
}
