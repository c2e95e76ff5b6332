//! # View Document
//!
//! Roots, the view selection, the focus/composition/read-only state and the
//! event bus observers fire normalized DOM events on.

use crate::error::{ViewError, ViewResult};
use crate::node::{ViewElement, ViewNodeId};
use crate::observer::DomEventData;
use crate::position::ViewPosition;
use crate::selection::ViewSelection;
use folio_common::{Emitter, EventInfo, ListenerId, Observable, Priority};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

#[derive(Debug, Default)]
pub struct ViewDocument {
    roots: BTreeMap<String, ViewElement>,
    selection: ViewSelection,
    is_composing: Observable<bool>,
    is_focused: Observable<bool>,
    is_read_only: Observable<bool>,
    events: Emitter<DomEventData>,
    changed_roots: BTreeSet<String>,
}

impl ViewDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_root(&mut self, root_name: &str, element_name: &str) -> ViewResult<&ViewElement> {
        if self.roots.contains_key(root_name) {
            return Err(ViewError::RootExists(root_name.to_string()));
        }
        debug!(root = root_name, element = element_name, "Creating view root");
        self.changed_roots.insert(root_name.to_string());
        Ok(self
            .roots
            .entry(root_name.to_string())
            .or_insert_with(|| ViewElement::root(element_name)))
    }

    pub fn get_root(&self, name: &str) -> Option<&ViewElement> {
        self.roots.get(name)
    }

    pub fn roots(&self) -> &BTreeMap<String, ViewElement> {
        &self.roots
    }

    pub fn root_names(&self) -> impl Iterator<Item = &str> {
        self.roots.keys().map(String::as_str)
    }

    pub(crate) fn root_mut(&mut self, name: &str) -> ViewResult<&mut ViewElement> {
        self.changed_roots.insert(name.to_string());
        self.roots
            .get_mut(name)
            .ok_or_else(|| ViewError::NoSuchRoot(name.to_string()))
    }

    /// Root name and path of the element with `id`
    pub fn find_element(&self, id: ViewNodeId) -> Option<(String, Vec<usize>)> {
        self.roots
            .iter()
            .find_map(|(name, root)| root.find_path(id).map(|path| (name.clone(), path)))
    }

    pub fn element(&self, id: ViewNodeId) -> Option<&ViewElement> {
        let (root, path) = self.find_element(id)?;
        self.roots.get(&root)?.element_at_path(&path)
    }

    /// The position before the element with `id`; `None` for roots
    pub fn position_before(&self, id: ViewNodeId) -> Option<ViewPosition> {
        let (root, path) = self.find_element(id)?;
        ViewPosition::before(root, &path).ok()
    }

    pub fn position_after(&self, id: ViewNodeId) -> Option<ViewPosition> {
        self.position_before(id).map(|position| position.shifted_by(1))
    }

    pub fn position_at(&self, id: ViewNodeId, offset: usize) -> Option<ViewPosition> {
        let (root, path) = self.find_element(id)?;
        Some(ViewPosition::at(root, &path, offset))
    }

    pub fn selection(&self) -> &ViewSelection {
        &self.selection
    }

    pub(crate) fn selection_mut(&mut self) -> &mut ViewSelection {
        &mut self.selection
    }

    pub fn is_composing(&self) -> bool {
        *self.is_composing.get()
    }

    pub(crate) fn set_composing(&mut self, composing: bool) -> bool {
        self.is_composing.set(composing)
    }

    pub fn on_composing_change(&mut self, listener: impl FnMut(&bool, &bool) + 'static) -> ListenerId {
        self.is_composing.on_change(listener)
    }

    pub fn is_focused(&self) -> bool {
        *self.is_focused.get()
    }

    pub(crate) fn set_focused(&mut self, focused: bool) -> bool {
        self.is_focused.set(focused)
    }

    pub fn on_focus_change(&mut self, listener: impl FnMut(&bool, &bool) + 'static) -> ListenerId {
        self.is_focused.on_change(listener)
    }

    pub fn is_read_only(&self) -> bool {
        *self.is_read_only.get()
    }

    pub fn set_read_only(&mut self, read_only: bool) -> bool {
        self.is_read_only.set(read_only)
    }

    pub fn on_read_only_change(&mut self, listener: impl FnMut(&bool, &bool) + 'static) -> ListenerId {
        self.is_read_only.on_change(listener)
    }

    /// Listen to a normalized DOM event (`"keydown"`, `"compositionstart"`, ...)
    pub fn on<F>(&mut self, name: impl Into<String>, priority: Priority, listener: F) -> ListenerId
    where
        F: FnMut(&mut EventInfo, &mut DomEventData) + 'static,
    {
        self.events.on(name, priority, listener)
    }

    pub fn off(&mut self, id: ListenerId) -> bool {
        self.events.off(id)
    }

    pub fn fire(&mut self, name: &str, data: &mut DomEventData) -> EventInfo {
        self.events.fire(name, data)
    }

    pub(crate) fn mark_changed(&mut self, root: &str) {
        self.changed_roots.insert(root.to_string());
    }

    pub(crate) fn take_changed_roots(&mut self) -> BTreeSet<String> {
        std::mem::take(&mut self.changed_roots)
    }
}
