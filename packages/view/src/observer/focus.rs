//! Focus observer

use super::{fire, DomEvent, DomEventData, DomEventSource, ObservedEvent, ObserverKind};
use crate::document::ViewDocument;
use tracing::debug;

/// Tracks `focus`/`blur` into [`ViewDocument::is_focused`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FocusObserver;

impl DomEventSource for FocusObserver {
    fn kind(&self) -> ObserverKind {
        ObserverKind::Focus
    }

    fn dom_event_types(&self) -> &'static [&'static str] {
        &["focus", "blur"]
    }

    fn on_dom_event(&mut self, event: &DomEvent, document: &mut ViewDocument) -> ObservedEvent {
        let focused = event.event_type == "focus";
        if document.set_focused(focused) {
            debug!(root = %event.root, focused, "View focus changed");
        }
        fire(document, DomEventData::new(event))
    }
}
