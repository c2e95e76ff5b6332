//! # Differ
//!
//! Collects what changed in the document between two flushes.
//!
//! ## Design
//!
//! Before an operation touches an element's children, the differ stores a
//! snapshot of that element's content (one unit per character or child
//! element). Snapshots are keyed by element identity and only the first one
//! per flush is kept. `get_changes` compares each snapshot with the current
//! content of the same element, so a change undone within the flush
//! produces no entry at all.
//!
//! Entries use running ("mixed") coordinates: within one parent, each entry
//! is positioned as if all earlier entries of that parent were already
//! applied to the old content. Changes inside an element that is itself
//! inserted are folded into that insertion.

use crate::document::{TreeRoots, GRAVEYARD_ROOT_NAME};
use crate::node::{Attributes, Element, Node, NodeId};
use crate::operation::Operation;
use crate::position::{Position, PositionRelation};
use crate::range::Range;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use tracing::trace;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum DiffItem {
    #[serde(rename_all = "camelCase")]
    Insert {
        position: Position,
        name: String,
        length: usize,
        attributes: Attributes,
    },
    #[serde(rename_all = "camelCase")]
    Remove {
        position: Position,
        name: String,
        length: usize,
        attributes: Attributes,
    },
    #[serde(rename_all = "camelCase")]
    Attribute {
        range: Range,
        attribute_key: String,
        attribute_old_value: Option<Value>,
        attribute_new_value: Option<Value>,
    },
}

impl DiffItem {
    pub fn position(&self) -> &Position {
        match self {
            DiffItem::Insert { position, .. } | DiffItem::Remove { position, .. } => position,
            DiffItem::Attribute { range, .. } => range.start(),
        }
    }

    pub fn root_name(&self) -> &str {
        self.position().root_name()
    }

    pub fn kind(&self) -> &'static str {
        match self {
            DiffItem::Insert { .. } => "insert",
            DiffItem::Remove { .. } => "remove",
            DiffItem::Attribute { .. } => "attribute",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MarkerDiff {
    pub name: String,
    pub old_range: Option<Range>,
    pub new_range: Option<Range>,
    pub affects_data: bool,
}

#[derive(Debug, Clone, PartialEq)]
enum Unit {
    Char { ch: char, attributes: Attributes },
    Element { id: NodeId, name: String, attributes: Attributes },
}

impl Unit {
    fn same_item(&self, other: &Unit) -> bool {
        match (self, other) {
            (Unit::Char { ch: a, .. }, Unit::Char { ch: b, .. }) => a == b,
            (Unit::Element { id: a, name: x, .. }, Unit::Element { id: b, name: y, .. }) => a == b && x == y,
            _ => false,
        }
    }

    fn attributes(&self) -> &Attributes {
        match self {
            Unit::Char { attributes, .. } | Unit::Element { attributes, .. } => attributes,
        }
    }

    fn name(&self) -> &str {
        match self {
            Unit::Char { .. } => "$text",
            Unit::Element { name, .. } => name,
        }
    }
}

fn units_of(element: &Element) -> Vec<Unit> {
    let mut units = Vec::with_capacity(element.max_offset());
    for child in element.children() {
        match child {
            Node::Text(text) => units.extend(text.data().chars().map(|ch| Unit::Char {
                ch,
                attributes: text.attributes().clone(),
            })),
            Node::Element(child) => units.push(Unit::Element {
                id: child.id(),
                name: child.name().to_string(),
                attributes: child.attributes().clone(),
            }),
        }
    }
    units
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Action {
    Equal(usize, usize),
    Insert(usize),
    Delete(usize),
}

/// Middles larger than this many table cells are replaced wholesale
const MAX_LCS_CELLS: usize = 1 << 20;

/// Edit script from `old` to `new`
///
/// The common prefix and suffix are matched directly; only the changed
/// middle goes through a longest-common-subsequence table.
fn edit_script(old: &[Unit], new: &[Unit]) -> Vec<Action> {
    let prefix = old.iter().zip(new).take_while(|(a, b)| a.same_item(b)).count();
    let suffix = old[prefix..]
        .iter()
        .rev()
        .zip(new[prefix..].iter().rev())
        .take_while(|(a, b)| a.same_item(b))
        .count();
    let (old_end, new_end) = (old.len() - suffix, new.len() - suffix);

    let mut actions = Vec::with_capacity(old.len().max(new.len()));
    actions.extend((0..prefix).map(|i| Action::Equal(i, i)));
    middle_script(&old[prefix..old_end], &new[prefix..new_end], prefix, &mut actions);
    actions.extend((0..suffix).map(|k| Action::Equal(old_end + k, new_end + k)));
    actions
}

fn middle_script(old: &[Unit], new: &[Unit], base: usize, actions: &mut Vec<Action>) {
    let (n, m) = (old.len(), new.len());
    if n == 0 || m == 0 || n.saturating_mul(m) > MAX_LCS_CELLS {
        actions.extend((0..n).map(|i| Action::Delete(base + i)));
        actions.extend((0..m).map(|j| Action::Insert(base + j)));
        return;
    }

    let mut table = vec![vec![0usize; m + 1]; n + 1];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            table[i][j] = if old[i].same_item(&new[j]) {
                table[i + 1][j + 1] + 1
            } else {
                table[i + 1][j].max(table[i][j + 1])
            };
        }
    }

    let (mut i, mut j) = (0, 0);
    while i < n || j < m {
        if i < n && j < m && old[i].same_item(&new[j]) {
            actions.push(Action::Equal(base + i, base + j));
            i += 1;
            j += 1;
        } else if i < n && (j == m || table[i + 1][j] >= table[i][j + 1]) {
            actions.push(Action::Delete(base + i));
            i += 1;
        } else {
            actions.push(Action::Insert(base + j));
            j += 1;
        }
    }
}

#[derive(Debug, Clone)]
struct Snapshot {
    units: Vec<Unit>,
}

#[derive(Debug, Clone, Default)]
pub struct Differ {
    snapshots: BTreeMap<NodeId, Snapshot>,
    markers: BTreeMap<String, MarkerDiff>,
}

impl Differ {
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty() && self.get_marker_changes().is_empty()
    }

    /// Remember the content of every element `op` is about to change
    pub fn buffer_operation<T: TreeRoots>(&mut self, op: &Operation, tree: &T) {
        let parents: Vec<&Position> = match op {
            Operation::Insert(insert) => vec![&insert.position],
            Operation::Move(mv) => vec![&mv.source_position, &mv.target_position],
            Operation::Attribute(attribute) => vec![attribute.range.start()],
            Operation::Rename(rename) => vec![&rename.position],
            Operation::Split(split) => {
                let mut positions = vec![&split.split_position, &split.insertion_position];
                positions.extend(split.graveyard_position.iter());
                positions
            }
            Operation::Merge(merge) => vec![&merge.source_position, &merge.target_position, &merge.graveyard_position],
            Operation::Marker(_) | Operation::NoOp(_) => Vec::new(),
        };
        for position in parents {
            self.snapshot_parent(tree, position.root_name(), position.parent_path());
        }
        if let Operation::Merge(merge) = op {
            let deletion = merge.deletion_position();
            self.snapshot_parent(tree, deletion.root_name(), deletion.parent_path());
        }
    }

    fn snapshot_parent<T: TreeRoots>(&mut self, tree: &T, root: &str, path: &[usize]) {
        let Some(element) = tree.root(root).and_then(|root| root.element_at_path(path)) else {
            return;
        };
        self.snapshots.entry(element.id()).or_insert_with(|| {
            trace!(element = %element.id(), root, "Snapshotting element content");
            Snapshot {
                units: units_of(element),
            }
        });
    }

    /// Record a marker change; the first old range and the latest new range
    /// are kept
    pub fn buffer_marker_change(&mut self, name: &str, old_range: Option<Range>, new_range: Option<Range>, affects_data: bool) {
        match self.markers.get_mut(name) {
            Some(existing) => {
                existing.new_range = new_range;
                existing.affects_data |= affects_data;
            }
            None => {
                self.markers.insert(
                    name.to_string(),
                    MarkerDiff {
                        name: name.to_string(),
                        old_range,
                        new_range,
                        affects_data,
                    },
                );
            }
        }
    }

    /// Marker changes that did not cancel out
    pub fn get_marker_changes(&self) -> Vec<MarkerDiff> {
        self.markers
            .values()
            .filter(|change| change.old_range != change.new_range)
            .cloned()
            .collect()
    }

    pub fn get_markers_to_remove(&self) -> Vec<(String, Range)> {
        self.get_marker_changes()
            .into_iter()
            .filter_map(|change| change.old_range.map(|range| (change.name, range)))
            .collect()
    }

    pub fn get_markers_to_add(&self) -> Vec<(String, Range)> {
        self.get_marker_changes()
            .into_iter()
            .filter_map(|change| change.new_range.map(|range| (change.name, range)))
            .collect()
    }

    /// Whether anything changed that ends up in the editor data
    pub fn has_data_changes(&self, roots: &BTreeMap<String, Element>) -> bool {
        !self.get_changes(roots, false).is_empty() || self.markers.values().any(|change| change.affects_data && change.old_range != change.new_range)
    }

    /// Changes since the last reset, sorted by root and position
    pub fn get_changes(&self, roots: &BTreeMap<String, Element>, include_graveyard: bool) -> Vec<DiffItem> {
        struct Located<'a> {
            root: &'a str,
            path: Vec<usize>,
            snapshot: &'a Snapshot,
            current: Vec<Unit>,
            actions: Vec<Action>,
        }

        let mut located = Vec::new();
        for (id, snapshot) in &self.snapshots {
            let Some((root, path, element)) = locate(roots, *id) else {
                continue;
            };
            if root == GRAVEYARD_ROOT_NAME && !include_graveyard {
                continue;
            }
            let current = units_of(element);
            let actions = edit_script(&snapshot.units, &current);
            located.push(Located {
                root,
                path,
                snapshot,
                current,
                actions,
            });
        }

        // Elements that (re)appeared somewhere carry their content with them
        let mut inserted: BTreeSet<NodeId> = BTreeSet::new();
        for entry in &located {
            for action in &entry.actions {
                if let Action::Insert(j) = action {
                    if let Unit::Element { id, .. } = &entry.current[*j] {
                        inserted.insert(*id);
                    }
                }
            }
        }

        let mut changes = Vec::new();
        for entry in located {
            let Some(root_element) = roots.get(entry.root) else {
                continue;
            };
            let inside_inserted = root_element
                .ancestor_ids(&entry.path)
                .iter()
                .any(|id| inserted.contains(id));
            if inside_inserted {
                continue;
            }
            changes.extend(changes_for_parent(
                entry.root,
                &entry.path,
                &entry.snapshot.units,
                &entry.current,
                &entry.actions,
            ));
        }

        changes.sort_by(|a, b| {
            a.root_name().cmp(b.root_name()).then_with(|| match a.position().compare_with(b.position()) {
                PositionRelation::Before => std::cmp::Ordering::Less,
                PositionRelation::After => std::cmp::Ordering::Greater,
                _ => std::cmp::Ordering::Equal,
            })
        });
        changes
    }

    pub fn reset(&mut self) {
        self.snapshots.clear();
        self.markers.clear();
    }
}

fn locate(roots: &BTreeMap<String, Element>, id: NodeId) -> Option<(&str, Vec<usize>, &Element)> {
    for (name, root) in roots {
        if root.id() == id {
            return Some((name.as_str(), Vec::new(), root));
        }
        if let Some(path) = root.find_path(id) {
            let element = root.element_at_path(&path)?;
            return Some((name.as_str(), path, element));
        }
    }
    None
}

fn changes_for_parent(root: &str, path: &[usize], old: &[Unit], new: &[Unit], actions: &[Action]) -> Vec<DiffItem> {
    let mut changes: Vec<DiffItem> = Vec::new();
    let mut offset = 0;

    for action in actions {
        match *action {
            Action::Equal(i, j) => {
                let (before, after) = (old[i].attributes(), new[j].attributes());
                if before != after {
                    let keys: BTreeSet<&String> = before.keys().chain(after.keys()).collect();
                    for key in keys {
                        let (old_value, new_value) = (before.get(key), after.get(key));
                        if old_value != new_value {
                            push_attribute(&mut changes, root, path, offset, key, old_value, new_value);
                        }
                    }
                }
                offset += 1;
            }
            Action::Insert(j) => {
                push_structural(&mut changes, true, root, path, offset, &new[j]);
                offset += 1;
            }
            Action::Delete(i) => {
                push_structural(&mut changes, false, root, path, offset, &old[i]);
            }
        }
    }
    changes
}

fn push_structural(changes: &mut Vec<DiffItem>, insert: bool, root: &str, path: &[usize], offset: usize, unit: &Unit) {
    if let Unit::Char { attributes, .. } = unit {
        match changes.last_mut() {
            Some(DiffItem::Insert {
                position,
                name,
                length,
                attributes: previous,
            }) if insert
                && name == "$text"
                && previous == attributes
                && position.parent_path() == path
                && position.offset() + *length == offset =>
            {
                *length += 1;
                return;
            }
            Some(DiffItem::Remove {
                position,
                name,
                length,
                attributes: previous,
            }) if !insert && name == "$text" && previous == attributes && position.parent_path() == path && position.offset() == offset => {
                *length += 1;
                return;
            }
            _ => {}
        }
    }
    let position = Position::at(root, path, offset);
    let name = unit.name().to_string();
    let attributes = unit.attributes().clone();
    changes.push(if insert {
        DiffItem::Insert {
            position,
            name,
            length: 1,
            attributes,
        }
    } else {
        DiffItem::Remove {
            position,
            name,
            length: 1,
            attributes,
        }
    });
}

fn push_attribute(
    changes: &mut Vec<DiffItem>,
    root: &str,
    path: &[usize],
    offset: usize,
    key: &str,
    old_value: Option<&Value>,
    new_value: Option<&Value>,
) {
    // Extend a matching change that ends right here
    for change in changes.iter_mut().rev() {
        if let DiffItem::Attribute {
            range,
            attribute_key,
            attribute_old_value,
            attribute_new_value,
        } = change
        {
            if attribute_key == key
                && attribute_old_value.as_ref() == old_value
                && attribute_new_value.as_ref() == new_value
                && range.end().parent_path() == path
                && range.end().offset() == offset
            {
                *range = Range::from_positions(range.start().clone(), range.end().shifted_by(1));
                return;
            }
        }
        if !matches!(change, DiffItem::Attribute { .. }) {
            break;
        }
    }
    changes.push(DiffItem::Attribute {
        range: Range::from_positions(Position::at(root, path, offset), Position::at(root, path, offset + 1)),
        attribute_key: key.to_string(),
        attribute_old_value: old_value.cloned(),
        attribute_new_value: new_value.cloned(),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Text;
    use pretty_assertions::assert_eq;

    fn roots(root: Element) -> BTreeMap<String, Element> {
        let mut roots = BTreeMap::new();
        roots.insert("main".to_string(), root);
        roots
    }

    #[test]
    fn test_edit_script_prefers_equal_runs() {
        let old = units_of(&Element::new("p").with_text("abc"));
        let new = units_of(&Element::new("p").with_text("aXc"));
        let actions = edit_script(&old, &new);
        assert_eq!(
            actions,
            vec![Action::Equal(0, 0), Action::Delete(1), Action::Insert(1), Action::Equal(2, 2)]
        );
    }

    #[test]
    fn test_edit_script_in_long_paragraph_only_diffs_the_edit() {
        let text = "a".repeat(100_000);
        let old = units_of(&Element::new("p").with_text(&text));
        let new = units_of(&Element::new("p").with_text(&format!("{}X{}", &text[..50_000], &text[50_000..])));

        let actions = edit_script(&old, &new);
        assert_eq!(actions.len(), 100_001);
        let edits: Vec<Action> = actions
            .into_iter()
            .filter(|action| !matches!(action, Action::Equal(..)))
            .collect();
        assert_eq!(edits, vec![Action::Insert(50_000)]);
    }

    #[test]
    fn test_edit_script_replaces_oversized_middle() {
        let old = units_of(&Element::new("p").with_text(&format!("<{}>", "a".repeat(1_100))));
        let new = units_of(&Element::new("p").with_text(&format!("<{}>", "b".repeat(1_100))));

        let actions = edit_script(&old, &new);
        assert_eq!(actions.first(), Some(&Action::Equal(0, 0)));
        assert_eq!(actions.last(), Some(&Action::Equal(1_101, 1_101)));
        assert_eq!(actions.iter().filter(|action| matches!(action, Action::Delete(_))).count(), 1_100);
        assert_eq!(actions.iter().filter(|action| matches!(action, Action::Insert(_))).count(), 1_100);
        assert_eq!(actions[1], Action::Delete(1));
        assert_eq!(actions[1_101], Action::Insert(1));
    }

    #[test]
    fn test_inserted_text_is_grouped() {
        let before = Element::new("$root").with_child(Element::new("paragraph").with_text("ab"));
        let mut after = before.clone();
        after
            .element_at_path_mut(&[0])
            .expect("Paragraph should exist")
            .insert_at(1, vec![Node::from("XYZ")])
            .expect("Failed to insert");

        let mut differ = Differ::default();
        differ.snapshot_parent(&roots(before), "main", &[0]);
        let changes = differ.get_changes(&roots(after), false);

        assert_eq!(
            changes,
            vec![DiffItem::Insert {
                position: Position::at("main", &[0], 1),
                name: "$text".to_string(),
                length: 3,
                attributes: Attributes::new(),
            }]
        );
    }

    #[test]
    fn test_attribute_changes_are_coalesced() {
        let before = Element::new("$root").with_child(Element::new("paragraph").with_text("abcd"));
        let mut after = before.clone();
        after
            .element_at_path_mut(&[0])
            .expect("Paragraph should exist")
            .set_attribute_in_range(1, 2, "bold", Some(&serde_json::json!(true)))
            .expect("Failed to set attribute");

        let mut differ = Differ::default();
        differ.snapshot_parent(&roots(before), "main", &[0]);
        let changes = differ.get_changes(&roots(after), false);

        assert_eq!(changes.len(), 1);
        match &changes[0] {
            DiffItem::Attribute { range, attribute_key, attribute_new_value, .. } => {
                assert_eq!(range.start().path(), &[0, 1]);
                assert_eq!(range.end().path(), &[0, 3]);
                assert_eq!(attribute_key, "bold");
                assert_eq!(attribute_new_value, &Some(serde_json::json!(true)));
            }
            other => panic!("Expected attribute change, got {:?}", other),
        }
    }

    #[test]
    fn test_unchanged_snapshot_reports_nothing() {
        let root = Element::new("$root").with_child(Element::new("paragraph").with_child(Text::new("ab")));
        let tree = roots(root);
        let mut differ = Differ::default();
        differ.snapshot_parent(&tree, "main", &[0]);
        assert!(differ.get_changes(&tree, false).is_empty());
    }

    #[test]
    fn test_marker_changes_fold_to_first_and_last() {
        let range = |offset: usize| Range::collapsed(Position::at("main", &[0], offset));
        let mut differ = Differ::default();
        differ.buffer_marker_change("m", Some(range(0)), Some(range(1)), false);
        differ.buffer_marker_change("m", Some(range(1)), Some(range(0)), false);
        assert!(differ.get_marker_changes().is_empty());

        differ.buffer_marker_change("n", None, Some(range(2)), true);
        assert_eq!(differ.get_markers_to_add(), vec![("n".to_string(), range(2))]);
        assert!(differ.get_markers_to_remove().is_empty());
    }
}
