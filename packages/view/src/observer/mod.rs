//! # DOM Observers
//!
//! Observers turn raw DOM events into [`DomEventData`] and fire a
//! same-named event on the [`ViewDocument`] bus.
//!
//! ## Design
//!
//! - One small struct per DOM event family, all implementing
//!   [`DomEventSource`]
//! - [`Observer`] is the closed set of those structs; the view stores and
//!   dispatches through it by [`ObserverKind`]
//! - Events are fired synchronously from [`DomEventSource::on_dom_event`]
//! - Observers hold no DOM handles; registration lives in
//!   [`crate::dom_context::DomContext`] so disabling never tears an observer
//!   down
//!
//! ```rust,ignore
//! let mut view = View::new();
//! view.add_observer(ObserverKind::Key);
//! view.document_mut().on("keydown", Priority::Normal, |_, data| {
//!     if data.keystroke.is_some_and(|k| k.matches("ctrl+b")) {
//!         data.prevent_default();
//!     }
//! });
//! ```

mod composition;
mod focus;
mod key;
mod pointer;

pub use composition::{CompositionObserver, CompositionState};
pub use focus::FocusObserver;
pub use key::KeyObserver;
pub use pointer::{ClickObserver, MouseObserver, PointerObserver, TouchObserver};

use crate::document::ViewDocument;
use crate::keyboard::KeystrokeInfo;
use crate::node::{ViewElement, ViewNode};
use folio_common::EventInfo;
use serde::{Deserialize, Serialize};
use tracing::trace;

/// A raw DOM event as delivered by the host
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub root: String,
    /// Index path of the target node below the root's DOM element
    #[serde(default)]
    pub target: Option<Vec<usize>>,
    #[serde(default)]
    pub key_code: Option<u32>,
    #[serde(default)]
    pub ctrl_key: bool,
    #[serde(default)]
    pub alt_key: bool,
    #[serde(default)]
    pub shift_key: bool,
    #[serde(default)]
    pub meta_key: bool,
    /// Composition text for composition events
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default)]
    pub button: Option<u8>,
    #[serde(default)]
    pub pointer_type: Option<String>,
}

impl DomEvent {
    pub fn new(event_type: impl Into<String>, root: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            root: root.into(),
            ..Default::default()
        }
    }

    pub fn with_target(mut self, path: Vec<usize>) -> Self {
        self.target = Some(path);
        self
    }

    pub fn with_key_code(mut self, key_code: u32) -> Self {
        self.key_code = Some(key_code);
        self
    }

    pub fn with_ctrl(mut self) -> Self {
        self.ctrl_key = true;
        self
    }

    pub fn with_shift(mut self) -> Self {
        self.shift_key = true;
        self
    }

    pub fn with_alt(mut self) -> Self {
        self.alt_key = true;
        self
    }

    pub fn with_meta(mut self) -> Self {
        self.meta_key = true;
        self
    }

    pub fn with_data(mut self, data: impl Into<String>) -> Self {
        self.data = Some(data.into());
        self
    }

    pub fn with_button(mut self, button: u8) -> Self {
        self.button = Some(button);
        self
    }

    pub fn with_pointer_type(mut self, pointer_type: impl Into<String>) -> Self {
        self.pointer_type = Some(pointer_type.into());
        self
    }
}

/// Normalized payload of every view document DOM event
#[derive(Debug, Clone, PartialEq)]
pub struct DomEventData {
    pub dom_event: DomEvent,
    pub dom_target: Option<Vec<usize>>,
    pub keystroke: Option<KeystrokeInfo>,
    pub composition_data: Option<String>,
    default_prevented: bool,
}

impl DomEventData {
    pub fn new(dom_event: &DomEvent) -> Self {
        Self {
            dom_target: dom_event.target.clone(),
            dom_event: dom_event.clone(),
            keystroke: None,
            composition_data: None,
            default_prevented: false,
        }
    }

    pub fn with_keystroke(mut self, keystroke: Option<KeystrokeInfo>) -> Self {
        self.keystroke = keystroke;
        self
    }

    pub fn with_composition_data(mut self, data: Option<String>) -> Self {
        self.composition_data = data;
        self
    }

    pub fn event_type(&self) -> &str {
        &self.dom_event.event_type
    }

    pub fn prevent_default(&mut self) {
        self.default_prevented = true;
    }

    pub fn is_default_prevented(&self) -> bool {
        self.default_prevented
    }

    /// The view element the DOM target maps to, resolved on demand.
    ///
    /// Text targets and filler nodes resolve to their parent element.
    pub fn view_target<'d>(&self, document: &'d ViewDocument) -> Option<&'d ViewElement> {
        let path = self.dom_target.as_ref()?;
        let mut current = document.get_root(&self.dom_event.root)?;
        for index in path {
            match current.get_child(*index) {
                Some(ViewNode::Element(child)) => current = child,
                _ => break,
            }
        }
        Some(current)
    }
}

/// An event fired on the view document together with its final payload
#[derive(Debug, Clone, PartialEq)]
pub struct ObservedEvent {
    pub info: EventInfo,
    pub data: DomEventData,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ObserverKind {
    Click,
    Mouse,
    Key,
    Pointer,
    Touch,
    Composition,
    Focus,
}

/// Something that listens to DOM event types and fires view events
pub trait DomEventSource {
    fn kind(&self) -> ObserverKind;

    fn dom_event_types(&self) -> &'static [&'static str];

    fn on_dom_event(&mut self, event: &DomEvent, document: &mut ViewDocument) -> ObservedEvent;

    fn handles(&self, event_type: &str) -> bool {
        self.dom_event_types().contains(&event_type)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Observer {
    Click(ClickObserver),
    Mouse(MouseObserver),
    Key(KeyObserver),
    Pointer(PointerObserver),
    Touch(TouchObserver),
    Composition(CompositionObserver),
    Focus(FocusObserver),
}

impl Observer {
    pub fn new(kind: ObserverKind) -> Self {
        match kind {
            ObserverKind::Click => Observer::Click(ClickObserver),
            ObserverKind::Mouse => Observer::Mouse(MouseObserver),
            ObserverKind::Key => Observer::Key(KeyObserver),
            ObserverKind::Pointer => Observer::Pointer(PointerObserver),
            ObserverKind::Touch => Observer::Touch(TouchObserver),
            ObserverKind::Composition => Observer::Composition(CompositionObserver::default()),
            ObserverKind::Focus => Observer::Focus(FocusObserver),
        }
    }

    fn source(&self) -> &dyn DomEventSource {
        match self {
            Observer::Click(o) => o,
            Observer::Mouse(o) => o,
            Observer::Key(o) => o,
            Observer::Pointer(o) => o,
            Observer::Touch(o) => o,
            Observer::Composition(o) => o,
            Observer::Focus(o) => o,
        }
    }

    fn source_mut(&mut self) -> &mut dyn DomEventSource {
        match self {
            Observer::Click(o) => o,
            Observer::Mouse(o) => o,
            Observer::Key(o) => o,
            Observer::Pointer(o) => o,
            Observer::Touch(o) => o,
            Observer::Composition(o) => o,
            Observer::Focus(o) => o,
        }
    }
}

impl DomEventSource for Observer {
    fn kind(&self) -> ObserverKind {
        self.source().kind()
    }

    fn dom_event_types(&self) -> &'static [&'static str] {
        self.source().dom_event_types()
    }

    fn on_dom_event(&mut self, event: &DomEvent, document: &mut ViewDocument) -> ObservedEvent {
        self.source_mut().on_dom_event(event, document)
    }
}

/// Fire `data` on the document under the DOM event's own name
pub(crate) fn fire(document: &mut ViewDocument, mut data: DomEventData) -> ObservedEvent {
    let name = data.dom_event.event_type.clone();
    trace!(event = %name, root = %data.dom_event.root, "Firing view event");
    let info = document.fire(&name, &mut data);
    ObservedEvent { info, data }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::ViewElement;
    use folio_common::Priority;

    fn document_with_paragraph() -> ViewDocument {
        let mut document = ViewDocument::new();
        document.create_root("main", "div").expect("Failed to create root");
        document
            .root_mut("main")
            .expect("Root exists")
            .append_child(ViewElement::container("p").with_attribute("id", "first").with_text("foo"))
            .expect("Failed to append");
        document
    }

    #[test]
    fn test_view_target_resolves_lazily_to_element() {
        let document = document_with_paragraph();
        let data = DomEventData::new(&DomEvent::new("click", "main").with_target(vec![0, 0]));
        let target = data.view_target(&document).expect("Target resolves");
        assert_eq!(target.name(), "p");
        assert_eq!(target.get_attribute("id").as_deref(), Some("first"));

        let untargeted = DomEventData::new(&DomEvent::new("click", "main"));
        assert!(untargeted.view_target(&document).is_none());
    }

    #[test]
    fn test_observer_dispatch_by_kind() {
        let mut document = document_with_paragraph();
        let mut observer = Observer::new(ObserverKind::Click);
        assert_eq!(observer.kind(), ObserverKind::Click);
        assert!(observer.handles("click"));
        assert!(!observer.handles("keydown"));

        document.on("click", Priority::Normal, |info, data| {
            data.prevent_default();
            info.stop();
        });
        let observed = observer.on_dom_event(&DomEvent::new("click", "main"), &mut document);
        assert!(observed.info.is_stopped());
        assert!(observed.data.is_default_prevented());
    }
}
