//! # Markers
//!
//! Named live ranges over the document. A marker follows every structural
//! operation; when its content is removed it collapses at the removal point
//! instead of travelling into the graveyard.
//!
//! Marker changes are reported as `(old_range, new_range)` pairs so the
//! differ can fold repeated changes of the same marker into one.

use crate::document::GRAVEYARD_ROOT_NAME;
use crate::operation::Operation;
use crate::range::Range;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Marker {
    name: String,
    range: Range,
    /// Changes of this marker are expressed as `MarkerOperation`s
    managed_using_operations: bool,
    /// Changes of this marker count as data changes
    affects_data: bool,
}

impl Marker {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn range(&self) -> &Range {
        &self.range
    }

    pub fn managed_using_operations(&self) -> bool {
        self.managed_using_operations
    }

    pub fn affects_data(&self) -> bool {
        self.affects_data
    }

    /// Marker group, the part of the name before the first `:`
    pub fn group(&self) -> &str {
        self.name.split(':').next().unwrap_or(&self.name)
    }
}

/// A marker whose range changed as a side effect of an operation
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerChange {
    pub name: String,
    pub old_range: Option<Range>,
    pub new_range: Option<Range>,
    pub affects_data: bool,
}

/// Where a live range ends up after `op`
///
/// Pieces cut apart by a move are joined back around the piece that
/// contains the original start. If that lands in the graveyard while the
/// range itself did not live there, the range collapses at the place the
/// content was removed from.
pub fn transform_live_range(range: &Range, op: &Operation) -> Range {
    let ranges = range.get_transformed_by_operation(op);
    let Some(result) = Range::from_ranges(&ranges) else {
        return range.clone();
    };

    let moved_to_graveyard =
        result.root_name() == GRAVEYARD_ROOT_NAME && range.root_name() != GRAVEYARD_ROOT_NAME;
    if !moved_to_graveyard {
        return result;
    }

    let collapse_at = match op {
        Operation::Move(mv) => mv.source_position.clone(),
        Operation::Merge(merge) => merge.deletion_position(),
        _ => result.start().clone(),
    };
    Range::collapsed(collapse_at)
}

#[derive(Debug, Clone, Default)]
pub struct MarkerCollection {
    markers: BTreeMap<String, Marker>,
}

impl MarkerCollection {
    pub fn get(&self, name: &str) -> Option<&Marker> {
        self.markers.get(name)
    }

    pub fn has(&self, name: &str) -> bool {
        self.markers.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Marker> {
        self.markers.values()
    }

    /// Markers whose name starts with `prefix`
    pub fn get_markers_group<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = &'a Marker> + 'a {
        self.markers
            .values()
            .filter(move |marker| marker.name.starts_with(prefix))
    }

    /// Markers whose range contains or touches `position`
    pub fn get_markers_at_position<'a>(
        &'a self,
        position: &'a crate::position::Position,
    ) -> impl Iterator<Item = &'a Marker> + 'a {
        self.markers.values().filter(move |marker| {
            let range = &marker.range;
            range.contains_position(position) || range.start() == position || range.end() == position
        })
    }

    /// Markers whose range intersects `range`
    pub fn get_markers_intersecting_range<'a>(&'a self, range: &'a Range) -> impl Iterator<Item = &'a Marker> + 'a {
        self.markers.values().filter(move |marker| {
            marker.range.is_intersecting(range)
                || (marker.range.is_collapsed() && range.contains_position(marker.range.start()))
        })
    }

    /// Create or update a marker; returns the previous range
    pub fn set(&mut self, name: &str, range: Range, managed_using_operations: bool, affects_data: bool) -> Option<Range> {
        debug!(marker = name, range = %range, "Setting marker");
        let previous = self.markers.insert(
            name.to_string(),
            Marker {
                name: name.to_string(),
                range,
                managed_using_operations,
                affects_data,
            },
        );
        previous.map(|marker| marker.range)
    }

    pub fn remove(&mut self, name: &str) -> Option<Marker> {
        let removed = self.markers.remove(name);
        if removed.is_some() {
            debug!(marker = name, "Removed marker");
        }
        removed
    }

    /// Re-target every marker after `op` was applied
    pub fn transform_by_operation(&mut self, op: &Operation) -> Vec<MarkerChange> {
        if matches!(op, Operation::Marker(_) | Operation::NoOp(_) | Operation::Attribute(_) | Operation::Rename(_)) {
            return Vec::new();
        }
        let mut changes = Vec::new();
        for marker in self.markers.values_mut() {
            let new_range = transform_live_range(&marker.range, op);
            if new_range != marker.range {
                let old_range = std::mem::replace(&mut marker.range, new_range.clone());
                changes.push(MarkerChange {
                    name: marker.name.clone(),
                    old_range: Some(old_range),
                    new_range: Some(new_range),
                    affects_data: marker.affects_data,
                });
            }
        }
        changes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Element;
    use crate::operation::{MergeOperation, MoveOperation};
    use crate::position::Position;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;

    fn range(start: &[usize], end: &[usize]) -> Range {
        Range::new(
            Position::new("main", start.to_vec()).expect("Failed to create start"),
            Position::new("main", end.to_vec()).expect("Failed to create end"),
        )
        .expect("Failed to create range")
    }

    #[test]
    fn test_marker_collapses_when_content_removed() {
        let mut markers = MarkerCollection::default();
        markers.set("comment:1", range(&[0, 2], &[0, 4]), true, false);

        let remove = Operation::Move(MoveOperation::remove(
            Position::new("main", vec![0, 1]).expect("Failed to create position"),
            5,
        ));
        let changes = markers.transform_by_operation(&remove);

        assert_eq!(changes.len(), 1);
        let marker = markers.get("comment:1").expect("Marker should survive");
        assert!(marker.range().is_collapsed());
        assert_eq!(marker.range().start().path(), &[0, 1]);
    }

    #[test]
    fn test_marker_follows_merge_into_previous_element() {
        let mut roots = BTreeMap::new();
        roots.insert(
            "main".to_string(),
            Element::new("$root")
                .with_child(Element::new("paragraph").with_text("foo"))
                .with_child(Element::new("paragraph").with_text("bar")),
        );
        let mut markers = MarkerCollection::default();
        markers.set("search", range(&[1, 0], &[1, 2]), false, false);

        let merge = Operation::Merge(MergeOperation::new(
            Position::new("main", vec![1, 0]).expect("Failed to create source"),
            3,
            Position::new("main", vec![0, 3]).expect("Failed to create target"),
            crate::operation::graveyard_start(),
        ));
        markers.transform_by_operation(&merge);

        let marker = markers.get("search").expect("Marker should survive");
        assert_eq!(marker.range().start().path(), &[0, 3]);
        assert_eq!(marker.range().end().path(), &[0, 5]);
    }

    #[test]
    fn test_attribute_change_leaves_markers_alone() {
        let mut markers = MarkerCollection::default();
        markers.set("a", range(&[0, 0], &[0, 1]), false, false);
        let op = Operation::Attribute(crate::operation::AttributeOperation::new(
            range(&[0, 0], &[0, 1]),
            "bold",
            None,
            Some(serde_json::json!(true)),
        ));
        assert!(markers.transform_by_operation(&op).is_empty());
    }

    #[test]
    fn test_group_is_name_prefix() {
        let mut markers = MarkerCollection::default();
        markers.set("comment:thread-1", range(&[0, 0], &[0, 1]), true, true);
        let marker = markers.get("comment:thread-1").expect("Marker should exist");
        assert_eq!(marker.group(), "comment");
        assert_eq!(markers.get_markers_group("comment").count(), 1);
    }
}
