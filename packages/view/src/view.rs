//! # View
//!
//! Owns the view document, the observers, the DOM listener bookkeeping and
//! the renderer.
//!
//! ## Design
//!
//! - Observers are registered once per kind and live until the view is
//!   dropped; disabling only removes their DOM listeners
//! - DOM events for detached roots, unknown event types or disabled
//!   observers are ignored
//! - [`View::change`] renders right after the writer callback returns and
//!   queues the patches for the host

use crate::document::ViewDocument;
use crate::dom_context::{DomContext, DomListener};
use crate::error::{ViewError, ViewResult};
use crate::observer::{DomEvent, DomEventSource, ObservedEvent, Observer, ObserverKind};
use crate::renderer::{DomNode, Renderer, RootPatches};
use crate::writer::DowncastWriter;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, trace};

#[derive(Debug)]
struct ObserverEntry {
    observer: Observer,
    enabled: bool,
}

#[derive(Debug)]
pub struct View {
    document: ViewDocument,
    observers: BTreeMap<ObserverKind, ObserverEntry>,
    dom: DomContext,
    renderer: Renderer,
    attached_roots: BTreeSet<String>,
    patches: Vec<RootPatches>,
}

impl Default for View {
    fn default() -> Self {
        Self::new()
    }
}

impl View {
    /// A view with the key, composition and focus observers added
    pub fn new() -> Self {
        let mut view = Self {
            document: ViewDocument::new(),
            observers: BTreeMap::new(),
            dom: DomContext::new(),
            renderer: Renderer::new(),
            attached_roots: BTreeSet::new(),
            patches: Vec::new(),
        };
        for kind in [ObserverKind::Key, ObserverKind::Composition, ObserverKind::Focus] {
            view.add_observer(kind);
        }
        view
    }

    pub fn document(&self) -> &ViewDocument {
        &self.document
    }

    pub fn document_mut(&mut self) -> &mut ViewDocument {
        &mut self.document
    }

    pub fn dom_context(&self) -> &DomContext {
        &self.dom
    }

    /// Start listening on the DOM element of an existing view root
    pub fn attach_dom_root(&mut self, root_name: &str) -> ViewResult<()> {
        if self.document.get_root(root_name).is_none() {
            return Err(ViewError::NoSuchRoot(root_name.to_string()));
        }
        if !self.attached_roots.insert(root_name.to_string()) {
            return Ok(());
        }
        debug!(root = root_name, "Attaching DOM root");

        let enabled: Vec<ObserverKind> = self
            .observers
            .iter()
            .filter(|(_, entry)| entry.enabled)
            .map(|(kind, _)| *kind)
            .collect();
        for kind in enabled {
            self.listen(kind, root_name);
        }
        self.document.mark_changed(root_name);
        Ok(())
    }

    pub fn detach_dom_root(&mut self, root_name: &str) -> bool {
        if !self.attached_roots.remove(root_name) {
            return false;
        }
        let removed = self.dom.remove_where(|listener| listener.root == root_name);
        debug!(root = root_name, removed, "Detached DOM root");
        true
    }

    pub fn attached_roots(&self) -> impl Iterator<Item = &str> {
        self.attached_roots.iter().map(String::as_str)
    }

    /// Add an observer of `kind`; adding it again returns the existing one
    pub fn add_observer(&mut self, kind: ObserverKind) -> &Observer {
        if !self.observers.contains_key(&kind) {
            trace!(observer = ?kind, "Adding observer");
            self.observers.insert(
                kind,
                ObserverEntry {
                    observer: Observer::new(kind),
                    enabled: true,
                },
            );
            let roots: Vec<String> = self.attached_roots.iter().cloned().collect();
            for root in roots {
                self.listen(kind, &root);
            }
        }
        &self.observers[&kind].observer
    }

    pub fn get_observer(&self, kind: ObserverKind) -> Option<&Observer> {
        self.observers.get(&kind).map(|entry| &entry.observer)
    }

    pub fn is_observer_enabled(&self, kind: ObserverKind) -> bool {
        self.observers.get(&kind).is_some_and(|entry| entry.enabled)
    }

    /// Remove every observer DOM listener; the observers themselves stay
    pub fn disable_observers(&mut self) {
        let mut removed = 0;
        for (kind, entry) in self.observers.iter_mut() {
            if entry.enabled {
                entry.enabled = false;
                removed += self.dom.remove_where(|listener| listener.observer == *kind);
            }
        }
        debug!(removed, "Disabled observers");
    }

    /// Restore the listeners [`View::disable_observers`] removed
    pub fn enable_observers(&mut self) {
        let disabled: Vec<ObserverKind> = self
            .observers
            .iter()
            .filter(|(_, entry)| !entry.enabled)
            .map(|(kind, _)| *kind)
            .collect();
        let roots: Vec<String> = self.attached_roots.iter().cloned().collect();

        for kind in &disabled {
            if let Some(entry) = self.observers.get_mut(kind) {
                entry.enabled = true;
            }
            for root in &roots {
                self.listen(*kind, root);
            }
        }
        debug!(enabled = disabled.len(), "Enabled observers");
    }

    fn listen(&mut self, kind: ObserverKind, root: &str) {
        let Some(entry) = self.observers.get(&kind) else {
            return;
        };
        for event_type in entry.observer.dom_event_types() {
            self.dom.add_listener(DomListener::new(root, *event_type, kind));
        }
    }

    /// Route a DOM event to the observer listening for it
    pub fn handle_dom_event(&mut self, event: &DomEvent) -> Option<ObservedEvent> {
        let kind = self
            .dom
            .listeners()
            .find(|listener| listener.root == event.root && listener.event_type == event.event_type)
            .map(|listener| listener.observer);
        let Some(kind) = kind else {
            trace!(event = %event.event_type, root = %event.root, "No DOM listener for event");
            return None;
        };

        let entry = self.observers.get_mut(&kind)?;
        Some(entry.observer.on_dom_event(event, &mut self.document))
    }

    /// Run `callback` with a writer, then render what it changed
    pub fn change<R>(&mut self, callback: impl FnOnce(&mut DowncastWriter<'_>) -> R) -> R {
        let result = {
            let mut writer = DowncastWriter::new(&mut self.document);
            callback(&mut writer)
        };
        self.render();
        result
    }

    /// Render changed roots and queue their patches; returns the number of patches
    pub fn render(&mut self) -> usize {
        let rendered = self.renderer.render(&mut self.document);
        let count = rendered.iter().map(|root| root.patches.len()).sum();
        self.patches.extend(rendered);
        count
    }

    pub fn take_patches(&mut self) -> Vec<RootPatches> {
        std::mem::take(&mut self.patches)
    }

    pub fn dom_root(&self, name: &str) -> Option<&DomNode> {
        self.renderer.dom_root(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::ViewPosition;
    use crate::renderer::DomPatch;
    use folio_common::Priority;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn attached_view() -> View {
        let mut view = View::new();
        view.document_mut()
            .create_root("main", "div")
            .expect("Failed to create root");
        view.attach_dom_root("main").expect("Failed to attach root");
        view
    }

    #[test]
    fn test_attach_requires_existing_root() {
        let mut view = View::new();
        assert!(matches!(view.attach_dom_root("main"), Err(ViewError::NoSuchRoot(_))));
    }

    #[test]
    fn test_add_observer_is_idempotent() {
        let mut view = attached_view();
        let before = view.dom_context().listener_count();
        view.add_observer(ObserverKind::Click);
        view.add_observer(ObserverKind::Click);
        assert_eq!(view.dom_context().listener_count(), before + 1);
        assert!(view.get_observer(ObserverKind::Click).is_some());
        assert!(view.get_observer(ObserverKind::Touch).is_none());
    }

    #[test]
    fn test_disable_and_enable_restore_same_listeners() {
        let mut view = attached_view();
        let original: Vec<DomListener> = view.dom_context().listeners().cloned().collect();
        let registrations = view.dom_context().registration_count();

        view.disable_observers();
        view.disable_observers();
        assert_eq!(view.dom_context().listener_count(), 0);
        assert!(view
            .handle_dom_event(&DomEvent::new("keydown", "main").with_key_code(13))
            .is_none());

        view.enable_observers();
        view.enable_observers();
        let restored: Vec<DomListener> = view.dom_context().listeners().cloned().collect();
        assert_eq!(restored, original);
        assert_eq!(view.dom_context().registration_count(), registrations * 2);
    }

    #[test]
    fn test_dom_event_reaches_document_listeners() {
        let mut view = attached_view();
        let keys = Rc::new(RefCell::new(Vec::new()));
        let log = Rc::clone(&keys);
        view.document_mut().on("keydown", Priority::Normal, move |_, data| {
            log.borrow_mut().push(data.keystroke.map(|k| k.key_code));
        });

        view.handle_dom_event(&DomEvent::new("keydown", "main").with_key_code(13))
            .expect("Key observer is listening");
        assert!(view
            .handle_dom_event(&DomEvent::new("keydown", "other"))
            .is_none());
        assert!(view.handle_dom_event(&DomEvent::new("click", "main")).is_none());
        assert_eq!(*keys.borrow(), vec![Some(13)]);
    }

    #[test]
    fn test_change_renders_patches() {
        let mut view = attached_view();
        view.render();
        view.take_patches();

        view.change(|writer| {
            let paragraph = writer.create_container_element("p", &[]);
            let position = ViewPosition::at("main", &[], 0);
            writer.insert(&position, vec![paragraph.into()])
        })
        .expect("Failed to insert");

        let patches = view.take_patches();
        assert_eq!(patches.len(), 1);
        assert!(patches[0]
            .patches
            .iter()
            .any(|patch| matches!(patch, DomPatch::ReplaceNode { path, .. } | DomPatch::CreateNode { path, .. } if path == &vec![0])));
        assert!(view.take_patches().is_empty());
    }
}
