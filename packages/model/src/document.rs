//! # Document
//!
//! Owns the roots (the graveyard included) and every piece of state that
//! has to follow the tree: version, history, differ buffer, markers and
//! the document selection.
//!
//! [`Document::apply_operation`] is the only place the attached tree
//! changes. It validates, lets the differ snapshot what is about to change,
//! executes, then re-targets markers and the selection in one pass.

use crate::differ::{DiffItem, Differ};
use crate::error::{ModelError, ModelResult};
use crate::history::History;
use crate::markers::MarkerCollection;
use crate::node::{Element, NodeId};
use crate::operation::{MarkerOperation, Operation};
use crate::position::Position;
use crate::selection::DocumentSelection;
use std::collections::BTreeMap;
use tracing::{debug, instrument};

pub const GRAVEYARD_ROOT_NAME: &str = "$$graveyard";
pub const DEFAULT_ROOT_NAME: &str = "main";

/// Anything positions can be resolved against
pub trait TreeRoots {
    fn root(&self, name: &str) -> Option<&Element>;
}

impl TreeRoots for BTreeMap<String, Element> {
    fn root(&self, name: &str) -> Option<&Element> {
        self.get(name)
    }
}

#[derive(Debug)]
pub struct Document {
    roots: BTreeMap<String, Element>,
    version: u64,
    history: History,
    differ: Differ,
    selection: DocumentSelection,
    markers: MarkerCollection,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeRoots for Document {
    fn root(&self, name: &str) -> Option<&Element> {
        self.roots.get(name)
    }
}

impl Document {
    /// A document holding only the graveyard
    pub fn new() -> Self {
        Self::with_roots(Vec::new())
    }

    /// A document with a single `$root` element called `main`
    pub fn with_main_root() -> Self {
        Self::with_roots(vec![(DEFAULT_ROOT_NAME.to_string(), Element::new("$root"))])
    }

    fn with_roots(roots: Vec<(String, Element)>) -> Self {
        let mut roots: BTreeMap<String, Element> = roots.into_iter().collect();
        roots.insert(GRAVEYARD_ROOT_NAME.to_string(), Element::new("$graveyard"));
        Self {
            roots,
            version: 0,
            history: History::default(),
            differ: Differ::default(),
            selection: DocumentSelection::default(),
            markers: MarkerCollection::default(),
        }
    }

    pub fn create_root(&mut self, element_name: &str, root_name: &str) -> ModelResult<&Element> {
        if self.roots.contains_key(root_name) {
            return Err(ModelError::RootExists(root_name.to_string()));
        }
        debug!(root = root_name, element = element_name, "Creating root");
        Ok(self
            .roots
            .entry(root_name.to_string())
            .or_insert_with(|| Element::new(element_name)))
    }

    pub fn get_root(&self, name: &str) -> Option<&Element> {
        self.roots.get(name)
    }

    /// Every root, the graveyard included
    pub fn roots(&self) -> &BTreeMap<String, Element> {
        &self.roots
    }

    /// Names of every root except the graveyard
    pub fn root_names(&self) -> impl Iterator<Item = &str> {
        self.roots
            .keys()
            .map(String::as_str)
            .filter(|name| *name != GRAVEYARD_ROOT_NAME)
    }

    pub fn graveyard(&self) -> &Element {
        // The graveyard is created with the document and never removed
        &self.roots[GRAVEYARD_ROOT_NAME]
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn differ(&self) -> &Differ {
        &self.differ
    }

    /// Buffered changes since the last flush
    pub fn get_changes(&self, include_graveyard: bool) -> Vec<DiffItem> {
        self.differ.get_changes(&self.roots, include_graveyard)
    }

    pub fn selection(&self) -> &DocumentSelection {
        &self.selection
    }

    pub fn markers(&self) -> &MarkerCollection {
        &self.markers
    }

    pub(crate) fn differ_mut(&mut self) -> &mut Differ {
        &mut self.differ
    }

    pub(crate) fn selection_mut(&mut self) -> &mut DocumentSelection {
        &mut self.selection
    }

    pub(crate) fn set_selection(&mut self, ranges: Vec<crate::range::Range>, backward: bool) {
        self.selection.set_ranges(ranges, backward);
        self.selection.refresh_attributes(&self.roots);
    }

    pub(crate) fn refresh_selection_attributes(&mut self) {
        self.selection.refresh_attributes(&self.roots);
    }

    pub(crate) fn history_mut(&mut self) -> &mut History {
        &mut self.history
    }

    /// Root name and path of the element with `id`
    pub fn find_element(&self, id: NodeId) -> Option<(String, Vec<usize>)> {
        for (name, root) in &self.roots {
            if root.id() == id {
                return Some((name.clone(), Vec::new()));
            }
            if let Some(path) = root.find_path(id) {
                return Some((name.clone(), path));
            }
        }
        None
    }

    pub fn element_at(&self, root: &str, path: &[usize]) -> Option<&Element> {
        self.roots.get(root)?.element_at_path(path)
    }

    /// First position in the first non-graveyard root
    pub fn default_position(&self) -> Option<Position> {
        self.root_names()
            .next()
            .map(|name| Position::at_start(name, &[]))
    }

    #[instrument(skip(self, op), fields(op = op.type_name()))]
    pub(crate) fn apply_operation(&mut self, mut op: Operation) -> ModelResult<Operation> {
        match op.base_version() {
            Some(version) if version != self.version => {
                return Err(ModelError::OperationVersion {
                    expected: self.version,
                    actual: version,
                });
            }
            Some(_) => {}
            None => op.set_base_version(self.version),
        }

        op.validate(&self.roots)?;
        self.differ.buffer_operation(&op, &self.roots);

        match &op {
            Operation::Marker(marker) => self.apply_marker_operation(marker),
            Operation::NoOp(_) => {}
            _ => op.execute(&mut self.roots)?,
        }

        for change in self.markers.transform_by_operation(&op) {
            self.differ.buffer_marker_change(
                &change.name,
                change.old_range,
                change.new_range,
                change.affects_data,
            );
        }
        self.selection.transform_by_operation(&op);

        debug!(version = self.version, "Applied operation");
        self.history.add_operation(op.clone());
        self.version += 1;
        Ok(op)
    }

    fn apply_marker_operation(&mut self, op: &MarkerOperation) {
        let old_range = self.markers.get(&op.name).map(|marker| marker.range().clone());
        match &op.new_range {
            Some(range) => {
                self.markers
                    .set(&op.name, range.clone(), true, op.affects_data);
            }
            None => {
                self.markers.remove(&op.name);
            }
        }
        self.differ
            .buffer_marker_change(&op.name, old_range, op.new_range.clone(), op.affects_data);
    }

    /// Marker changes that bypass operations
    pub(crate) fn set_marker_directly(
        &mut self,
        name: &str,
        range: Option<crate::range::Range>,
        affects_data: bool,
    ) {
        let old_range = self.markers.get(name).map(|marker| marker.range().clone());
        match &range {
            Some(range) => {
                self.markers.set(name, range.clone(), false, affects_data);
            }
            None => {
                self.markers.remove(name);
            }
        }
        self.differ
            .buffer_marker_change(name, old_range, range, affects_data);
    }

    /// Non-graveyard roots as JSON
    pub fn to_json(&self) -> serde_json::Value {
        let roots: BTreeMap<&str, &Element> = self
            .roots
            .iter()
            .filter(|(name, _)| name.as_str() != GRAVEYARD_ROOT_NAME)
            .map(|(name, root)| (name.as_str(), root))
            .collect();
        serde_json::to_value(roots).unwrap_or(serde_json::Value::Null)
    }
}
