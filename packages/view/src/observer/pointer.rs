//! Click, mouse, pointer and touch observers. None of them keep state.

use super::{fire, DomEvent, DomEventData, DomEventSource, ObservedEvent, ObserverKind};
use crate::document::ViewDocument;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClickObserver;

impl DomEventSource for ClickObserver {
    fn kind(&self) -> ObserverKind {
        ObserverKind::Click
    }

    fn dom_event_types(&self) -> &'static [&'static str] {
        &["click"]
    }

    fn on_dom_event(&mut self, event: &DomEvent, document: &mut ViewDocument) -> ObservedEvent {
        fire(document, DomEventData::new(event))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MouseObserver;

impl DomEventSource for MouseObserver {
    fn kind(&self) -> ObserverKind {
        ObserverKind::Mouse
    }

    fn dom_event_types(&self) -> &'static [&'static str] {
        &["mousedown", "mouseup", "mouseover", "mouseout"]
    }

    fn on_dom_event(&mut self, event: &DomEvent, document: &mut ViewDocument) -> ObservedEvent {
        fire(document, DomEventData::new(event))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PointerObserver;

impl DomEventSource for PointerObserver {
    fn kind(&self) -> ObserverKind {
        ObserverKind::Pointer
    }

    fn dom_event_types(&self) -> &'static [&'static str] {
        &["pointerdown", "pointerup", "pointermove"]
    }

    fn on_dom_event(&mut self, event: &DomEvent, document: &mut ViewDocument) -> ObservedEvent {
        fire(document, DomEventData::new(event))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TouchObserver;

impl DomEventSource for TouchObserver {
    fn kind(&self) -> ObserverKind {
        ObserverKind::Touch
    }

    fn dom_event_types(&self) -> &'static [&'static str] {
        &["touchstart", "touchend", "touchmove"]
    }

    fn on_dom_event(&mut self, event: &DomEvent, document: &mut ViewDocument) -> ObservedEvent {
        fire(document, DomEventData::new(event))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_common::Priority;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_mouse_events_keep_their_names() {
        let mut document = ViewDocument::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let log = Rc::clone(&seen);
        document.on("mousedown", Priority::Normal, move |info, data| {
            log.borrow_mut().push((info.name.clone(), data.dom_event.button));
        });

        let mut observer = MouseObserver;
        observer.on_dom_event(&DomEvent::new("mousedown", "main").with_button(2), &mut document);
        observer.on_dom_event(&DomEvent::new("mouseup", "main"), &mut document);

        assert_eq!(*seen.borrow(), vec![("mousedown".to_string(), Some(2))]);
    }

    #[test]
    fn test_pointer_type_is_carried() {
        let mut document = ViewDocument::new();
        let observed = PointerObserver.on_dom_event(
            &DomEvent::new("pointerdown", "main").with_pointer_type("pen"),
            &mut document,
        );
        assert_eq!(observed.data.dom_event.pointer_type.as_deref(), Some("pen"));
        assert!(!observed.info.is_stopped());
    }
}
